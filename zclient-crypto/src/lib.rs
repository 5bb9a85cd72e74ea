//!
//! zclient cryptographic core (unsafe-forbid).
//! - Memory: tri-state tagged buffers (freed / owned-heap / borrowed), owned secrets zeroized on release
//! - AES: ECB / CBC / CTR mode drivers over the AES-128/192/256 block transform
//! - DH: finite-field Diffie-Hellman context with an explicit phase machine
//! - RSA: role-split public/private keys, PKCS#1 v1.5 / OAEP / PSS, key generation
//! - Params: TOML/env loadable engine defaults
#![forbid(unsafe_code)]
#![warn(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unreachable,
    clippy::todo,
    clippy::unimplemented
)]
#![warn(missing_docs)]

//! Cryptographic context layer for zclient.
//!
//! Every engine follows the same lifecycle: construct a context (borrowing or
//! owning its key material through [`memory::TaggedBuf`]), call any number of
//! operations, then `cleanup()` it (or let it drop). Owned secrets are wiped
//! exactly once; borrowed buffers are never touched.

/// AES block cipher contexts (ECB, CBC, CTR).
pub mod aes;
/// Octet-string / integer conversion and checked modular exponentiation.
pub mod bigint;
/// Finite-field Diffie-Hellman key exchange.
pub mod dh;
/// Ownership-tagged byte buffers.
pub mod memory;
/// Engine defaults loadable from TOML or the environment.
pub mod params;
/// RSA keys, padding schemes and key generation.
pub mod rsa;

pub use aes::{AesContext, AesMode, AES_BLOCK_SIZE, AES_MAX_KEY_SIZE};
pub use dh::{DhContext, DhGroup, DhPhase};
pub use memory::{MemoryState, TaggedBuf};
pub use params::{CryptoParams, HashAlgorithm};
pub use rsa::{RsaKeyPair, RsaPadding, RsaPrivateKey, RsaPublicKey};

/// Error type for every cryptographic operation in this crate.
///
/// `InvalidPadding` and `VerificationFailed` deliberately carry no detail:
/// callers must not be able to tell which structural check failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid parameters: {0}")]
    /// Malformed or inconsistent input (lengths, mode/IV mismatch, empty buffers)
    InvalidParameters(String),
    #[error("invalid state: {0}")]
    /// Operation invoked out of lifecycle order
    InvalidState(String),
    #[error("invalid context: already released")]
    /// Context was cleaned up and can no longer be used
    InvalidContext,
    #[error("buffer too small: {required} bytes required, {provided} provided")]
    /// Caller-supplied output capacity is insufficient; retry with `required` bytes
    BufferTooSmall {
        /// Capacity needed for the operation to succeed
        required: usize,
        /// Capacity the caller supplied
        provided: usize,
    },
    #[error("invalid padding")]
    /// Decrypted block does not carry a well-formed padding structure
    InvalidPadding,
    #[error("signature verification failed")]
    /// Signature does not match the message
    VerificationFailed,
    #[error("internal failure: {0}")]
    /// Randomness exhaustion or arithmetic degeneracy
    InternalFailure(String),
    #[error("config: {0}")]
    /// Parameter file or environment could not be parsed or validated
    Config(String),
}

impl Error {
    pub(crate) fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::InternalFailure(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the caller can retry the same call with different buffers.
    ///
    /// Only [`Error::BufferTooSmall`] is retryable; every other failure is a
    /// property of the inputs or the context state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BufferTooSmall { .. })
    }
}

/// Convenient Result alias for this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Fail with [`Error::BufferTooSmall`] unless `provided >= required`.
pub(crate) fn ensure_capacity(required: usize, provided: usize) -> Result<()> {
    if provided < required {
        return Err(Error::BufferTooSmall { required, provided });
    }
    Ok(())
}
