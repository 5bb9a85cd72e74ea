#![forbid(unsafe_code)]

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::{RsaPrivateKey, RsaPublicKey};
use crate::bigint::{byte_len, i2osp};
use crate::memory::TaggedBuf;
use crate::params::{CryptoParams, RSA_MAX_BITS, RSA_MIN_BITS};
use crate::{Error, Result};

const PUBLIC_EXPONENT: u32 = 65_537;
const MILLER_RABIN_ROUNDS: usize = 24;

const SMALL_PRIMES: [u32; 54] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97, 101, 103, 107, 109,
    113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257,
];

/// Freshly generated key pair; both halves own their buffers.
pub struct RsaKeyPair {
    public: RsaPublicKey<'static>,
    private: RsaPrivateKey<'static>,
}

impl RsaKeyPair {
    /// Generate a `bits`-bit key pair from the OS CSPRNG.
    pub fn generate(bits: usize) -> Result<Self> {
        Self::generate_with_rng(bits, &mut OsRng)
    }

    /// Generate with the modulus size and hash from `params`.
    pub fn generate_with_params(params: &CryptoParams) -> Result<Self> {
        let pair = Self::generate(params.rsa_key_bits)?;
        Ok(Self { public: pair.public.with_params(params), private: pair.private.with_params(params) })
    }

    /// Generate a `bits`-bit key pair: two probable primes with their top two
    /// bits set, `e = 65537`, `d = e^-1 mod lcm(p-1, q-1)`.
    ///
    /// # Errors
    /// `InvalidParameters` unless `bits` is a multiple of 64 in `512..=8192`.
    pub fn generate_with_rng<R: RngCore + CryptoRng + ?Sized>(bits: usize, rng: &mut R) -> Result<Self> {
        if !(RSA_MIN_BITS..=RSA_MAX_BITS).contains(&bits) || bits % 64 != 0 {
            return Err(Error::invalid_params(format!("unsupported modulus size: {bits}")));
        }
        let e = BigUint::from(PUBLIC_EXPONENT);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let p = random_prime(bits / 2, rng);
            let q = random_prime(bits - bits / 2, rng);
            if p == q {
                continue;
            }
            let n = &p * &q;
            if n.bits() as usize != bits {
                continue;
            }
            let Some(d) = private_exponent(&p, &q, &e) else {
                continue;
            };
            let k = byte_len(&n);
            let modulus = i2osp(&n, k)?;
            let d_bytes = Zeroizing::new(i2osp(&d, k)?);
            let public = RsaPublicKey::init(TaggedBuf::copied(&modulus), TaggedBuf::owned(e.to_bytes_be()))?;
            let private = RsaPrivateKey::init(TaggedBuf::owned(modulus), TaggedBuf::copied(&d_bytes))?;
            info!(bits, attempts, "RSA key pair generated");
            return Ok(Self { public, private });
        }
    }

    /// Public half.
    pub fn public(&self) -> &RsaPublicKey<'static> {
        &self.public
    }

    /// Private half.
    pub fn private(&self) -> &RsaPrivateKey<'static> {
        &self.private
    }

    /// Split into the two keys.
    pub fn into_parts(self) -> (RsaPublicKey<'static>, RsaPrivateKey<'static>) {
        (self.public, self.private)
    }
}

impl core::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RsaKeyPair").field("public", &self.public).field("private", &self.private).finish()
    }
}

fn random_prime<R: RngCore + CryptoRng + ?Sized>(bits: usize, rng: &mut R) -> BigUint {
    let top = (BigUint::one() << (bits - 1)) | (BigUint::one() << (bits - 2));
    let mut candidates = 0u32;
    loop {
        candidates += 1;
        let candidate = rng.gen_biguint(bits as u64) | &top | BigUint::one();
        if is_probable_prime(&candidate, rng) {
            debug!(bits, candidates, "probable prime found");
            return candidate;
        }
    }
}

/// Trial division by small primes, then Miller-Rabin with random bases.
pub(crate) fn is_probable_prime<R: RngCore + CryptoRng + ?Sized>(n: &BigUint, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if *n < two {
        return false;
    }
    if n.is_even() {
        return *n == two;
    }
    for &sp in &SMALL_PRIMES {
        let sp = BigUint::from(sp);
        if *n == sp {
            return true;
        }
        if (n % &sp).is_zero() {
            return false;
        }
    }

    let n_minus_1 = n - 1u32;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> s;
    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let a = rng.gen_biguint_range(&two, &n_minus_1);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_1 {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_1 {
                continue 'witness;
            }
            if x.is_one() {
                return false;
            }
        }
        return false;
    }
    true
}

/// `d = e^-1 mod lcm(p-1, q-1)`, or `None` when `e` shares a factor with it.
pub(crate) fn private_exponent(p: &BigUint, q: &BigUint, e: &BigUint) -> Option<BigUint> {
    let lambda = (p - 1u32).lcm(&(q - 1u32));
    e.modinv(&lambda)
}
