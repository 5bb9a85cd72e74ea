use anyhow::{anyhow, ensure, Context};
use zclient_core::CoreConfig;
use zclient_crypto::{
    AesContext, AesMode, CryptoParams, DhContext, HashAlgorithm, RsaKeyPair, RsaPadding, RsaPublicKey, TaggedBuf,
    AES_BLOCK_SIZE,
};

pub type TestResult<T> = anyhow::Result<T>;

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let level = CoreConfig::from_env().map(|c| c.log_level).unwrap_or_else(|_| "debug".into());
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter(level).try_init();
}

/// One side of the exchange: an ephemeral DH context plus a long-term RSA
/// identity.
pub struct Party {
    pub name: String,
    dh: DhContext<'static>,
    identity: RsaKeyPair,
}

/// Signed ephemeral public value sent to the peer.
pub struct Offer {
    pub dh_public: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Party {
    pub fn new(name: &str, params: &CryptoParams) -> TestResult<Self> {
        let dh = DhContext::from_group(params.dh_group)?;
        let identity = RsaKeyPair::generate_with_params(params)?;
        tracing::info!(party = name, rsa_bits = params.rsa_key_bits, "party created");
        Ok(Self { name: name.to_string(), dh, identity })
    }

    pub fn identity(&self) -> &RsaPublicKey<'static> {
        self.identity.public()
    }

    /// Fresh ephemeral key pair, signed with PSS.
    pub fn offer(&mut self) -> TestResult<Offer> {
        self.dh.generate_key_pair()?;
        let mut dh_public = vec![0u8; self.dh.key_len()];
        let n = self.dh.get_public_key(&mut dh_public)?;
        dh_public.truncate(n);
        let signature = self.identity.private().sign_to_vec(&dh_public, RsaPadding::Pss)?;
        Ok(Offer { dh_public, signature })
    }

    /// Verify the peer's offer and derive a session.
    pub fn accept(&mut self, peer: &RsaPublicKey<'_>, offer: &Offer) -> TestResult<Session> {
        peer.verify(&offer.dh_public, &offer.signature, RsaPadding::Pss)
            .with_context(|| format!("{}: peer offer signature rejected", self.name))?;
        self.dh.compute_shared_key(&offer.dh_public)?;
        let mut shared = vec![0u8; self.dh.key_len()];
        let n = self.dh.get_shared_key(&mut shared)?;
        let digest = HashAlgorithm::Sha512.digest(&shared[..n]);
        shared.fill(0);
        Session::from_secret(&digest)
    }
}

/// AES-256-CBC session keyed from the shared secret; the IV is the second
/// half of the digest.
pub struct Session {
    cipher: AesContext<'static>,
}

impl Session {
    fn from_secret(digest: &[u8]) -> TestResult<Self> {
        ensure!(digest.len() >= 48, "digest too short");
        let key = TaggedBuf::copied(&digest[..32]);
        let iv = TaggedBuf::copied(&digest[32..48]);
        Ok(Self { cipher: AesContext::init(key, AesMode::Cbc, Some(iv))? })
    }

    /// Zero-pad to a whole number of blocks and encrypt.
    pub fn seal(&self, plaintext: &[u8]) -> TestResult<Vec<u8>> {
        let padded_len = (plaintext.len() / AES_BLOCK_SIZE + 1) * AES_BLOCK_SIZE;
        let mut block = plaintext.to_vec();
        block.resize(padded_len, 0);
        Ok(self.cipher.encrypt_to_vec(&block)?)
    }

    pub fn open(&self, ciphertext: &[u8]) -> TestResult<Vec<u8>> {
        let mut plain = self.cipher.decrypt_to_vec(ciphertext)?;
        let end = plain.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        plain.truncate(end);
        Ok(plain)
    }

    pub fn close(&mut self) {
        self.cipher.cleanup();
    }

    pub fn is_closed(&self) -> bool {
        self.cipher.is_released()
    }
}

/// Run the full exchange between two fresh parties.
pub fn establish(params: &CryptoParams) -> TestResult<(Party, Session, Party, Session)> {
    let mut alice = Party::new("alice", params)?;
    let mut bob = Party::new("bob", params)?;
    let a_offer = alice.offer()?;
    let b_offer = bob.offer()?;
    let a_session = alice.accept(bob.identity(), &b_offer).map_err(|e| anyhow!("alice: {e:#}"))?;
    let b_session = bob.accept(alice.identity(), &a_offer).map_err(|e| anyhow!("bob: {e:#}"))?;
    Ok((alice, a_session, bob, b_session))
}
