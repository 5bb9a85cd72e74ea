#![forbid(unsafe_code)]

//! RSA with role-split keys.
//!
//! [`RsaPublicKey`] `(n, e)` can only encrypt and verify; [`RsaPrivateKey`]
//! `(n, d)` can only decrypt and sign. Every operation works on
//! caller-supplied output slices and returns the number of bytes written.

use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::bigint::{byte_len, i2osp, i2osp_into, mod_exp, os2ip};
use crate::memory::{MemoryState, TaggedBuf};
use crate::params::{CryptoParams, HashAlgorithm};
use crate::{ensure_capacity, Error, Result};

mod keygen;
pub mod padding;

pub use keygen::RsaKeyPair;

/// Padding / signature scheme selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RsaPadding {
    /// Raw RSA on a full-width block (encrypt/decrypt only).
    None,
    /// PKCS#1 v1.5: EME for encryption, EMSA with DigestInfo for signatures.
    Pkcs1,
    /// EME-OAEP with MGF1 and an empty label (encrypt/decrypt only).
    Oaep,
    /// EMSA-PSS with MGF1 and a random salt (sign/verify only).
    Pss,
}

/// Modulus, exponent and hash settings shared by both key roles.
struct KeyMaterial<'a> {
    modulus: TaggedBuf<'a>,
    n: BigUint,
    exponent: TaggedBuf<'a>,
    hash: HashAlgorithm,
    pss_salt_len: Option<usize>,
}

impl<'a> KeyMaterial<'a> {
    fn init(modulus: TaggedBuf<'a>, exponent: TaggedBuf<'a>) -> Result<Self> {
        if modulus.is_empty() || exponent.is_empty() {
            warn!("rejecting RSA key with empty modulus or exponent");
            return Err(Error::invalid_params("modulus and exponent must be non-empty"));
        }
        let n = os2ip(modulus.as_bytes());
        if n.is_zero() {
            return Err(Error::invalid_params("modulus is zero"));
        }
        Ok(Self { modulus, n, exponent, hash: HashAlgorithm::default(), pss_salt_len: None })
    }

    fn live(&self) -> Result<()> {
        if self.modulus.is_freed() {
            return Err(Error::InvalidContext);
        }
        Ok(())
    }

    /// Modulus length in bytes (`k`).
    fn size(&self) -> usize {
        byte_len(&self.n)
    }

    fn bits(&self) -> usize {
        self.n.bits() as usize
    }

    fn salt_len(&self) -> usize {
        self.pss_salt_len.unwrap_or_else(|| self.hash.output_len())
    }

    /// `x^exponent mod n`.
    fn apply(&self, x: &BigUint) -> Result<BigUint> {
        mod_exp(x, &os2ip(self.exponent.as_bytes()), &self.n)
    }

    fn release(&mut self) {
        self.exponent.release();
        self.modulus.release();
        self.n.set_zero();
    }
}

macro_rules! key_accessors {
    ($ty:ident) => {
        impl<'a> $ty<'a> {
            /// Builder: hash used by OAEP, PKCS#1 signatures and PSS.
            pub fn with_hash(mut self, hash: HashAlgorithm) -> Self {
                self.inner.hash = hash;
                self
            }

            /// Builder: take hash and PSS salt length from engine parameters.
            pub fn with_params(mut self, params: &CryptoParams) -> Self {
                self.inner.hash = params.rsa_hash;
                self.inner.pss_salt_len = params.pss_salt_len;
                self
            }

            /// Hash used by the hash-based schemes.
            pub fn hash(&self) -> HashAlgorithm {
                self.inner.hash
            }

            /// Modulus length in bytes; every ciphertext and signature has this size.
            pub fn size(&self) -> usize {
                self.inner.size()
            }

            /// Modulus length in bits.
            pub fn bits(&self) -> usize {
                self.inner.bits()
            }

            /// Big-endian modulus (empty once released).
            pub fn modulus(&self) -> &[u8] {
                self.inner.modulus.as_bytes()
            }

            /// Ownership tag of the exponent buffer.
            pub fn exponent_state(&self) -> MemoryState {
                self.inner.exponent.state()
            }

            /// Whether [`cleanup`](Self::cleanup) has run.
            pub fn is_released(&self) -> bool {
                self.inner.modulus.is_freed()
            }

            /// Zeroize owned exponent storage and release both buffers.
            /// Idempotent; later operations fail with `InvalidContext`.
            pub fn cleanup(&mut self) {
                if !self.is_released() {
                    debug!(key = stringify!($ty), "RSA key released");
                }
                self.inner.release();
            }
        }

        impl Drop for $ty<'_> {
            fn drop(&mut self) {
                self.cleanup();
            }
        }

        impl core::fmt::Debug for $ty<'_> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("bits", &self.bits())
                    .field("hash", &self.inner.hash)
                    .field("exponent", &self.inner.exponent)
                    .finish()
            }
        }
    };
}

/// RSA public key `(n, e)`.
pub struct RsaPublicKey<'a> {
    inner: KeyMaterial<'a>,
}

/// RSA private key `(n, d)`.
pub struct RsaPrivateKey<'a> {
    inner: KeyMaterial<'a>,
}

key_accessors!(RsaPublicKey);
key_accessors!(RsaPrivateKey);

impl<'a> RsaPublicKey<'a> {
    /// Validate and wrap a public key.
    ///
    /// # Errors
    /// `InvalidParameters` for an empty buffer or a zero modulus.
    pub fn init(modulus: TaggedBuf<'a>, exponent: TaggedBuf<'a>) -> Result<Self> {
        Ok(Self { inner: KeyMaterial::init(modulus, exponent)? })
    }

    /// Borrowing convenience over [`RsaPublicKey::init`].
    pub fn new(modulus: &'a [u8], exponent: &'a [u8]) -> Result<Self> {
        Self::init(TaggedBuf::borrowed(modulus), TaggedBuf::borrowed(exponent))
    }

    /// Big-endian public exponent.
    pub fn exponent(&self) -> &[u8] {
        self.inner.exponent.as_bytes()
    }

    /// Largest plaintext `encrypt` accepts under `padding`, or `None` if the
    /// scheme cannot encrypt with this key.
    pub fn max_message_len(&self, padding: RsaPadding) -> Option<usize> {
        let k = self.size();
        match padding {
            RsaPadding::None => Some(k),
            RsaPadding::Pkcs1 => padding::pkcs1_max_message_len(k),
            RsaPadding::Oaep => padding::oaep_max_message_len(self.inner.hash, k),
            RsaPadding::Pss => None,
        }
    }

    /// Encrypt with randomness from the OS CSPRNG.
    pub fn encrypt(&self, input: &[u8], output: &mut [u8], padding: RsaPadding) -> Result<usize> {
        self.encrypt_with_rng(input, output, padding, &mut OsRng)
    }

    /// Pad `input` and write the `k`-byte ciphertext `m^e mod n` to `output`.
    ///
    /// # Errors
    /// - `InvalidContext` after cleanup
    /// - `InvalidParameters` for `Pss`, oversize input, or a `None` block
    ///   that is not exactly `k` bytes below the modulus
    /// - `BufferTooSmall` if `output` is shorter than `k`
    pub fn encrypt_with_rng<R: RngCore + CryptoRng + ?Sized>(
        &self,
        input: &[u8],
        output: &mut [u8],
        padding: RsaPadding,
        rng: &mut R,
    ) -> Result<usize> {
        self.inner.live()?;
        let k = self.size();
        let em = Zeroizing::new(match padding {
            RsaPadding::None => {
                if input.len() != k {
                    return Err(Error::invalid_params(format!("raw block must be {k} bytes")));
                }
                input.to_vec()
            }
            RsaPadding::Pkcs1 => padding::pkcs1_encrypt_pad(input, k, rng)?,
            RsaPadding::Oaep => padding::oaep_encode(self.inner.hash, input, k, rng)?,
            RsaPadding::Pss => return Err(Error::invalid_params("PSS cannot encrypt")),
        });
        let m = os2ip(&em);
        if m >= self.inner.n {
            return Err(Error::invalid_params("message representative out of range"));
        }
        ensure_capacity(k, output.len())?;
        let c = self.inner.apply(&m)?;
        i2osp_into(&c, &mut output[..k])?;
        debug!(bits = self.bits(), ?padding, "RSA encrypt");
        Ok(k)
    }

    /// Encrypt into a freshly allocated `k`-byte vector.
    pub fn encrypt_to_vec(&self, input: &[u8], padding: RsaPadding) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.size()];
        let n = self.encrypt(input, &mut out, padding)?;
        out.truncate(n);
        Ok(out)
    }

    /// Check `signature` over `message`.
    ///
    /// # Errors
    /// - `InvalidParameters` for `None` / `Oaep`
    /// - `VerificationFailed` for any mismatch, including a signature of the
    ///   wrong length or out of range
    pub fn verify(&self, message: &[u8], signature: &[u8], padding: RsaPadding) -> Result<()> {
        self.inner.live()?;
        if matches!(padding, RsaPadding::None | RsaPadding::Oaep) {
            return Err(Error::invalid_params("scheme cannot verify"));
        }
        let k = self.size();
        let s = os2ip(signature);
        if signature.len() != k || s >= self.inner.n {
            return Err(Error::VerificationFailed);
        }
        let m = self.inner.apply(&s)?;
        let hash = self.inner.hash;
        let outcome = match padding {
            RsaPadding::Pkcs1 => {
                let em = i2osp(&m, k).map_err(|_| Error::VerificationFailed)?;
                let expected = padding::pkcs1_sign_encode(hash, message, k).map_err(|_| Error::VerificationFailed)?;
                if bool::from(subtle::ConstantTimeEq::ct_eq(&em[..], &expected[..])) {
                    Ok(())
                } else {
                    Err(Error::VerificationFailed)
                }
            }
            _ => {
                let em_bits = self.bits() - 1;
                let em = i2osp(&m, em_bits.div_ceil(8)).map_err(|_| Error::VerificationFailed)?;
                padding::pss_verify(hash, message, &em, em_bits, self.inner.salt_len())
            }
        };
        debug!(bits = self.bits(), ?padding, ok = outcome.is_ok(), "RSA verify");
        outcome
    }
}

impl<'a> RsaPrivateKey<'a> {
    /// Validate and wrap a private key.
    ///
    /// # Errors
    /// `InvalidParameters` for an empty buffer or a zero modulus.
    pub fn init(modulus: TaggedBuf<'a>, exponent: TaggedBuf<'a>) -> Result<Self> {
        Ok(Self { inner: KeyMaterial::init(modulus, exponent)? })
    }

    /// Borrowing convenience over [`RsaPrivateKey::init`].
    pub fn new(modulus: &'a [u8], exponent: &'a [u8]) -> Result<Self> {
        Self::init(TaggedBuf::borrowed(modulus), TaggedBuf::borrowed(exponent))
    }

    /// Largest plaintext `decrypt` can recover under `padding`, or `None` if
    /// the scheme cannot decrypt with this key.
    pub fn max_message_len(&self, padding: RsaPadding) -> Option<usize> {
        let k = self.size();
        match padding {
            RsaPadding::None => Some(k),
            RsaPadding::Pkcs1 => padding::pkcs1_max_message_len(k),
            RsaPadding::Oaep => padding::oaep_max_message_len(self.inner.hash, k),
            RsaPadding::Pss => None,
        }
    }

    /// Decrypt a `k`-byte ciphertext and strip `padding`, returning the
    /// plaintext length.
    ///
    /// `output` must hold [`max_message_len`](Self::max_message_len) bytes
    /// whatever the ciphertext carries, so a short buffer is rejected before
    /// the ciphertext is touched.
    ///
    /// # Errors
    /// - `InvalidContext` after cleanup
    /// - `InvalidParameters` for `Pss`
    /// - `InvalidPadding` for a malformed ciphertext or padding, or a modulus
    ///   too small for the scheme
    /// - `BufferTooSmall` if `output` is shorter than the scheme's bound
    pub fn decrypt(&self, input: &[u8], output: &mut [u8], padding: RsaPadding) -> Result<usize> {
        self.inner.live()?;
        if padding == RsaPadding::Pss {
            return Err(Error::invalid_params("PSS cannot decrypt"));
        }
        let k = self.size();
        let bound = self.max_message_len(padding).ok_or(Error::InvalidPadding)?;
        ensure_capacity(bound, output.len())?;
        let c = os2ip(input);
        if input.len() != k || c >= self.inner.n {
            return Err(Error::InvalidPadding);
        }
        let m = self.inner.apply(&c)?;
        let em = Zeroizing::new(i2osp(&m, k)?);
        let plain = Zeroizing::new(match padding {
            RsaPadding::None => em.to_vec(),
            RsaPadding::Pkcs1 => padding::pkcs1_encrypt_unpad(&em)?,
            _ => padding::oaep_decode(self.inner.hash, &em)?,
        });
        output[..plain.len()].copy_from_slice(&plain);
        debug!(bits = self.bits(), ?padding, "RSA decrypt");
        Ok(plain.len())
    }

    /// Decrypt into a freshly allocated vector.
    pub fn decrypt_to_vec(&self, input: &[u8], padding: RsaPadding) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.size()];
        let n = self.decrypt(input, &mut out, padding)?;
        out.truncate(n);
        Ok(out)
    }

    /// Sign with salt from the OS CSPRNG.
    pub fn sign(&self, message: &[u8], output: &mut [u8], padding: RsaPadding) -> Result<usize> {
        self.sign_with_rng(message, output, padding, &mut OsRng)
    }

    /// Hash and encode `message`, then write the `k`-byte signature
    /// `em^d mod n` to `output`.
    ///
    /// # Errors
    /// - `InvalidContext` after cleanup
    /// - `InvalidParameters` for `None` / `Oaep` or a modulus too small for
    ///   the encoding
    /// - `BufferTooSmall` if `output` is shorter than `k`
    pub fn sign_with_rng<R: RngCore + CryptoRng + ?Sized>(
        &self,
        message: &[u8],
        output: &mut [u8],
        padding: RsaPadding,
        rng: &mut R,
    ) -> Result<usize> {
        self.inner.live()?;
        let k = self.size();
        let hash = self.inner.hash;
        let em = match padding {
            RsaPadding::Pkcs1 => padding::pkcs1_sign_encode(hash, message, k)?,
            RsaPadding::Pss => padding::pss_encode(hash, message, self.bits() - 1, self.inner.salt_len(), rng)?,
            RsaPadding::None | RsaPadding::Oaep => return Err(Error::invalid_params("scheme cannot sign")),
        };
        ensure_capacity(k, output.len())?;
        let s = self.inner.apply(&os2ip(&em))?;
        i2osp_into(&s, &mut output[..k])?;
        debug!(bits = self.bits(), ?padding, "RSA sign");
        Ok(k)
    }

    /// Sign into a freshly allocated `k`-byte vector.
    pub fn sign_to_vec(&self, message: &[u8], padding: RsaPadding) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.size()];
        let n = self.sign(message, &mut out, padding)?;
        out.truncate(n);
        Ok(out)
    }
}
