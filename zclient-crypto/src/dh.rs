#![forbid(unsafe_code)]

//! Finite-field Diffie-Hellman.
//!
//! ```text
//! Initialized --generate_key_pair()--> KeysGenerated --compute_shared_key(peer)--> SharedKeyComputed
//!      \______________________________________ cleanup() ______________________________/--> Released
//! ```
//!
//! Key material lives inside the phase that owns it, so a shared key can only
//! exist next to the private key that produced it. Keys are exported
//! big-endian, left-padded to the byte length of the prime.

use hex_literal::hex;
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bigint::{byte_len, i2osp, mod_exp, os2ip};
use crate::memory::{MemoryState, TaggedBuf};
use crate::{ensure_capacity, Error, Result};

/// Oakley group 1 (RFC 2409 §6.1), 768-bit.
const OAKLEY_GROUP_1: [u8; 96] = hex!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1"
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD"
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245"
    "E485B576625E7EC6F44C42E9A63A3620FFFFFFFFFFFFFFFF"
);

/// Oakley group 2 (RFC 2409 §6.2), 1024-bit.
const OAKLEY_GROUP_2: [u8; 128] = hex!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1"
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD"
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245"
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED"
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381"
    "FFFFFFFFFFFFFFFF"
);

/// MODP group 14 (RFC 3526 §3), 2048-bit.
const MODP_GROUP_14: [u8; 256] = hex!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1"
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD"
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245"
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED"
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D"
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F"
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D"
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B"
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9"
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510"
    "15728E5A8AACAA68FFFFFFFFFFFFFFFF"
);

/// Well-known MODP groups, all with generator 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DhGroup {
    /// RFC 2409 Oakley group 1 (768-bit). Test use only.
    Oakley768,
    /// RFC 2409 Oakley group 2 (1024-bit).
    Oakley1024,
    /// RFC 3526 group 14 (2048-bit).
    #[default]
    Modp2048,
}

impl DhGroup {
    /// Big-endian prime of the group.
    pub fn prime(self) -> Vec<u8> {
        match self {
            DhGroup::Oakley768 => OAKLEY_GROUP_1.to_vec(),
            DhGroup::Oakley1024 => OAKLEY_GROUP_2.to_vec(),
            DhGroup::Modp2048 => MODP_GROUP_14.to_vec(),
        }
    }

    /// Generator of the group.
    pub fn generator(self) -> Vec<u8> {
        vec![2]
    }

    /// Size of the prime in bits.
    pub fn bits(self) -> usize {
        match self {
            DhGroup::Oakley768 => 768,
            DhGroup::Oakley1024 => 1024,
            DhGroup::Modp2048 => 2048,
        }
    }
}

/// Externally visible lifecycle phase of a [`DhContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DhPhase {
    /// Group parameters stored, no keys yet.
    Initialized,
    /// Private/public key pair available.
    KeysGenerated,
    /// Shared secret derived from a peer public key.
    SharedKeyComputed,
    /// Context cleaned up.
    Released,
}

enum DhState {
    Initialized,
    KeysGenerated {
        private: TaggedBuf<'static>,
        public: TaggedBuf<'static>,
    },
    SharedKeyComputed {
        private: TaggedBuf<'static>,
        public: TaggedBuf<'static>,
        shared: TaggedBuf<'static>,
    },
    Released,
}

impl DhState {
    fn phase(&self) -> DhPhase {
        match self {
            DhState::Initialized => DhPhase::Initialized,
            DhState::KeysGenerated { .. } => DhPhase::KeysGenerated,
            DhState::SharedKeyComputed { .. } => DhPhase::SharedKeyComputed,
            DhState::Released => DhPhase::Released,
        }
    }

    fn keys(&self) -> Option<(&TaggedBuf<'static>, &TaggedBuf<'static>)> {
        match self {
            DhState::KeysGenerated { private, public }
            | DhState::SharedKeyComputed { private, public, .. } => Some((private, public)),
            DhState::Initialized | DhState::Released => None,
        }
    }
}

/// Diffie-Hellman key exchange context.
///
/// Prime and generator are tagged buffers (borrowed or owned); generated
/// private, public and shared keys are always owned and wiped on release.
pub struct DhContext<'a> {
    prime: TaggedBuf<'a>,
    generator: TaggedBuf<'a>,
    state: DhState,
}

impl<'a> DhContext<'a> {
    /// Store group parameters.
    ///
    /// # Errors
    /// `InvalidParameters` if either buffer is empty.
    pub fn init(prime: TaggedBuf<'a>, generator: TaggedBuf<'a>) -> Result<Self> {
        if prime.is_empty() || generator.is_empty() {
            warn!("rejecting DH parameters with empty prime or generator");
            return Err(Error::invalid_params("prime and generator must be non-empty"));
        }
        debug!(prime_bits = prime.len() * 8, "DH context initialized");
        Ok(Self { prime, generator, state: DhState::Initialized })
    }

    /// Borrowing convenience over [`DhContext::init`].
    pub fn new(prime: &'a [u8], generator: &'a [u8]) -> Result<Self> {
        Self::init(TaggedBuf::borrowed(prime), TaggedBuf::borrowed(generator))
    }

    /// Context over one of the well-known groups (owned parameters).
    pub fn from_group(group: DhGroup) -> Result<DhContext<'static>> {
        DhContext::init(TaggedBuf::owned(group.prime()), TaggedBuf::owned(group.generator()))
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> DhPhase {
        self.state.phase()
    }

    /// Ownership tag of the prime buffer.
    pub fn prime_state(&self) -> MemoryState {
        self.prime.state()
    }

    /// Byte width of exported keys (length of the prime without leading zeros).
    pub fn key_len(&self) -> usize {
        byte_len(&os2ip(self.prime.as_bytes()))
    }

    /// Generate a fresh key pair from the OS CSPRNG.
    pub fn generate_key_pair(&mut self) -> Result<()> {
        self.generate_key_pair_with_rng(&mut OsRng)
    }

    /// Generate a fresh key pair: `x` uniform in `[2, p-2]`, `y = g^x mod p`.
    ///
    /// Any earlier key pair or shared key is wiped and replaced.
    ///
    /// # Errors
    /// - `InvalidContext` after cleanup
    /// - `InternalFailure` for a degenerate group (`p < 5`, `g mod p` in `{0, 1}`)
    pub fn generate_key_pair_with_rng<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        if matches!(self.state, DhState::Released) {
            return Err(Error::InvalidContext);
        }
        let p = os2ip(self.prime.as_bytes());
        if p < BigUint::from(5u32) {
            warn!(prime_bits = p.bits(), "degenerate DH prime");
            return Err(Error::internal("degenerate DH prime"));
        }
        let g = os2ip(self.generator.as_bytes()) % &p;
        if g.is_zero() || g.is_one() {
            warn!("degenerate DH generator");
            return Err(Error::internal("degenerate DH generator"));
        }
        let width = byte_len(&p);

        let low = BigUint::from(2u32);
        let high = &p - 1u32; // exclusive bound: x <= p-2
        let x = rng.gen_biguint_range(&low, &high);
        let y = mod_exp(&g, &x, &p)?;

        let private = TaggedBuf::owned(i2osp(&x, width)?);
        let public = TaggedBuf::owned(i2osp(&y, width)?);
        // dropping the previous state wipes its owned buffers
        self.state = DhState::KeysGenerated { private, public };
        info!(prime_bits = p.bits(), "DH key pair generated");
        Ok(())
    }

    /// Derive the shared secret `peer^x mod p`.
    ///
    /// # Errors
    /// - `InvalidContext` after cleanup
    /// - `InvalidState` before a key pair exists
    /// - `InvalidParameters` for an empty peer key or one outside `[2, p-2]`
    pub fn compute_shared_key(&mut self, peer_public_key: &[u8]) -> Result<()> {
        if matches!(self.state, DhState::Released) {
            return Err(Error::InvalidContext);
        }
        if peer_public_key.is_empty() {
            return Err(Error::invalid_params("peer public key is empty"));
        }
        let p = os2ip(self.prime.as_bytes());
        let width = byte_len(&p);
        let shared = {
            let Some((private, _)) = self.state.keys() else {
                return Err(Error::invalid_state("key pair must be generated first"));
            };
            let peer = os2ip(peer_public_key);
            let upper = &p - 2u32;
            if peer < BigUint::from(2u32) || peer > upper {
                warn!("rejecting out-of-range DH peer public key");
                return Err(Error::invalid_params("peer public key out of range"));
            }
            let x = os2ip(private.as_bytes());
            let z = mod_exp(&peer, &x, &p)?;
            TaggedBuf::owned(i2osp(&z, width)?)
        };

        let previous = core::mem::replace(&mut self.state, DhState::Released);
        self.state = match previous {
            DhState::KeysGenerated { private, public } => DhState::SharedKeyComputed { private, public, shared },
            DhState::SharedKeyComputed { private, public, shared: mut old } => {
                old.release();
                DhState::SharedKeyComputed { private, public, shared }
            }
            other => other,
        };
        debug!("DH shared key computed");
        Ok(())
    }

    /// Public key bytes, if generated.
    pub fn public_key(&self) -> Option<&[u8]> {
        self.state.keys().map(|(_, public)| public.as_bytes())
    }

    /// Copy the public key into `out`, returning the written length.
    ///
    /// # Errors
    /// - `InvalidState` before key generation
    /// - `BufferTooSmall` if `out` is too short; `out` is left untouched
    pub fn get_public_key(&self, out: &mut [u8]) -> Result<usize> {
        let Some((_, public)) = self.state.keys() else {
            return Err(self.missing("public key not generated"));
        };
        copy_out(public.as_bytes(), out)
    }

    /// Copy the shared key into `out`, returning the written length.
    ///
    /// # Errors
    /// - `InvalidState` before the shared key is computed
    /// - `BufferTooSmall` if `out` is too short; `out` is left untouched
    pub fn get_shared_key(&self, out: &mut [u8]) -> Result<usize> {
        let DhState::SharedKeyComputed { shared, .. } = &self.state else {
            return Err(self.missing("shared key not computed"));
        };
        copy_out(shared.as_bytes(), out)
    }

    /// Wipe private and shared key material and release every buffer.
    /// Idempotent.
    pub fn cleanup(&mut self) {
        if !matches!(self.state, DhState::Released) {
            debug!(phase = ?self.phase(), "DH context released");
        }
        // owned key buffers are wiped by their Drop
        self.state = DhState::Released;
        self.prime.release();
        self.generator.release();
    }

    fn missing(&self, what: &str) -> Error {
        match self.state {
            DhState::Released => Error::InvalidContext,
            _ => Error::invalid_state(what),
        }
    }
}

fn copy_out(src: &[u8], out: &mut [u8]) -> Result<usize> {
    ensure_capacity(src.len(), out.len())?;
    out[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

impl Drop for DhContext<'_> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl core::fmt::Debug for DhContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DhContext")
            .field("prime_bits", &(self.prime.len() * 8))
            .field("prime_state", &self.prime.state())
            .field("phase", &self.phase())
            .finish()
    }
}
