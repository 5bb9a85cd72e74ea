#![forbid(unsafe_code)]

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::{Error, Result};

/// Byte length of the big-endian encoding of `n` (0 for zero).
pub fn byte_len(n: &BigUint) -> usize {
    (n.bits() as usize).div_ceil(8)
}

/// Octet string to integer (RFC 8017 OS2IP), big-endian.
pub fn os2ip(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Integer to octet string of exactly `len` bytes (RFC 8017 I2OSP), big-endian
/// and left-padded with zeros.
pub fn i2osp(x: &BigUint, len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    i2osp_into(x, &mut out)?;
    Ok(out)
}

/// I2OSP into a caller buffer whose length is the target width.
pub fn i2osp_into(x: &BigUint, out: &mut [u8]) -> Result<()> {
    if x.is_zero() {
        out.fill(0);
        return Ok(());
    }
    let raw = x.to_bytes_be();
    if raw.len() > out.len() {
        return Err(Error::internal("integer too large for target width"));
    }
    let pad = out.len() - raw.len();
    out[..pad].fill(0);
    out[pad..].copy_from_slice(&raw);
    Ok(())
}

/// `base^exponent mod modulus` by square-and-multiply.
///
/// Rejects a zero or unit modulus instead of panicking / returning a
/// meaningless zero.
pub fn mod_exp(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> Result<BigUint> {
    if modulus.is_zero() || modulus.is_one() {
        return Err(Error::internal("degenerate modulus"));
    }
    Ok(base.modpow(exponent, modulus))
}
