#![forbid(unsafe_code)]

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::dh::DhGroup;
use crate::{Error, Result};

/// Hash used by the RSA padding schemes (OAEP label hash and MGF1, PKCS#1
/// DigestInfo, PSS).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

// DER prefixes of DigestInfo, RFC 8017 §9.2 note 1
const SHA256_DIGEST_INFO: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05,
    0x00, 0x04, 0x20,
];
const SHA384_DIGEST_INFO: [u8; 19] = [
    0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02, 0x05,
    0x00, 0x04, 0x30,
];
const SHA512_DIGEST_INFO: [u8; 19] = [
    0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03, 0x05,
    0x00, 0x04, 0x40,
];

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Hash the concatenation of `parts`.
    pub fn digest_parts(self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut h = D::new();
            for p in parts {
                h.update(p);
            }
            h.finalize().to_vec()
        }
        match self {
            HashAlgorithm::Sha256 => run::<Sha256>(parts),
            HashAlgorithm::Sha384 => run::<Sha384>(parts),
            HashAlgorithm::Sha512 => run::<Sha512>(parts),
        }
    }

    /// Hash a single message.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    /// DER-encoded `DigestInfo` prefix preceding the raw digest in
    /// EMSA-PKCS1-v1_5.
    pub fn digest_info_prefix(self) -> &'static [u8] {
        match self {
            HashAlgorithm::Sha256 => &SHA256_DIGEST_INFO,
            HashAlgorithm::Sha384 => &SHA384_DIGEST_INFO,
            HashAlgorithm::Sha512 => &SHA512_DIGEST_INFO,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// Smallest and largest RSA modulus accepted by key generation.
pub const RSA_MIN_BITS: usize = 512;
/// See [`RSA_MIN_BITS`].
pub const RSA_MAX_BITS: usize = 8192;

/// Engine defaults shared by the RSA and DH contexts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CryptoParams {
    /// Hash for OAEP, PKCS#1 v1.5 signatures and PSS.
    pub rsa_hash: HashAlgorithm,
    /// PSS salt length in bytes; `None` means the hash length.
    pub pss_salt_len: Option<usize>,
    /// Modulus size used by key generation.
    pub rsa_key_bits: usize,
    /// Group used for key exchange.
    pub dh_group: DhGroup,
}

impl Default for CryptoParams {
    fn default() -> Self {
        Self { rsa_hash: HashAlgorithm::Sha256, pss_salt_len: None, rsa_key_bits: 2048, dh_group: DhGroup::Modp2048 }
    }
}

impl CryptoParams {
    /// Parse and validate a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(data: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(data).map_err(|e| Error::config(format!("toml parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a TOML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| Error::config(format!("read error: {e}")))?;
        Self::from_toml_str(&data)
    }

    /// Defaults overridden by `ZCLIENT_RSA_HASH`, `ZCLIENT_PSS_SALT_LEN`,
    /// `ZCLIENT_RSA_KEY_BITS` and `ZCLIENT_DH_GROUP`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = lookup("ZCLIENT_RSA_HASH") {
            cfg.rsa_hash = HashAlgorithm::parse(&v).ok_or_else(|| Error::config(format!("invalid rsa_hash: {v}")))?;
        }
        if let Some(v) = lookup("ZCLIENT_PSS_SALT_LEN") {
            let n = v.parse().map_err(|_| Error::config(format!("invalid pss_salt_len: {v}")))?;
            cfg.pss_salt_len = Some(n);
        }
        if let Some(v) = lookup("ZCLIENT_RSA_KEY_BITS") {
            cfg.rsa_key_bits = v.parse().map_err(|_| Error::config(format!("invalid rsa_key_bits: {v}")))?;
        }
        if let Some(v) = lookup("ZCLIENT_DH_GROUP") {
            cfg.dh_group = match v.to_ascii_lowercase().as_str() {
                "oakley768" => DhGroup::Oakley768,
                "oakley1024" => DhGroup::Oakley1024,
                "modp2048" => DhGroup::Modp2048,
                _ => return Err(Error::config(format!("invalid dh_group: {v}"))),
            };
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check key size range and salt length against the hash.
    pub fn validate(&self) -> Result<()> {
        if !(RSA_MIN_BITS..=RSA_MAX_BITS).contains(&self.rsa_key_bits) || self.rsa_key_bits % 64 != 0 {
            return Err(Error::config(format!("invalid rsa_key_bits: {}", self.rsa_key_bits)));
        }
        if let Some(salt) = self.pss_salt_len {
            if salt > self.rsa_hash.output_len() {
                return Err(Error::config(format!("pss_salt_len {salt} exceeds hash length")));
            }
        }
        Ok(())
    }

    /// Effective PSS salt length.
    pub fn salt_len(&self) -> usize {
        self.pss_salt_len.unwrap_or_else(|| self.rsa_hash.output_len())
    }
}
