#![forbid(unsafe_code)]

//! RFC 8017 encoding methods: EME-PKCS1-v1_5, EME-OAEP, EMSA-PKCS1-v1_5 and
//! EMSA-PSS, plus the MGF1 mask generator they share.
//!
//! Decoding and verification collect every structural check into a single
//! [`subtle::Choice`] before branching, so the outcome reveals nothing about
//! which check failed.

use rand_core::{CryptoRng, RngCore};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};
use tracing::warn;
use zeroize::Zeroizing;

use crate::params::HashAlgorithm;
use crate::{Error, Result};

/// `00 02 PS 00` framing with at least eight PS bytes.
pub const PKCS1_ENCRYPT_OVERHEAD: usize = 11;
/// Fixed trailer byte of an EMSA-PSS encoding.
pub const PSS_TRAILER: u8 = 0xbc;

/// MGF1 (RFC 8017 B.2.1): `len` bytes of `Hash(seed || counter)` blocks.
pub fn mgf1(hash: HashAlgorithm, seed: &[u8], len: usize) -> Vec<u8> {
    let mut mask = Vec::with_capacity(len + hash.output_len());
    let mut counter: u32 = 0;
    while mask.len() < len {
        mask.extend_from_slice(&hash.digest_parts(&[seed, &counter.to_be_bytes()[..]]));
        counter = counter.wrapping_add(1);
    }
    mask.truncate(len);
    mask
}

fn xor_in_place(dst: &mut [u8], mask: &[u8]) {
    for (d, m) in dst.iter_mut().zip(mask) {
        *d ^= m;
    }
}

/// Largest message EME-OAEP can carry in a `k`-byte modulus.
pub fn oaep_max_message_len(hash: HashAlgorithm, k: usize) -> Option<usize> {
    k.checked_sub(2 * hash.output_len() + 2)
}

/// Largest message EME-PKCS1-v1_5 can carry in a `k`-byte modulus.
pub fn pkcs1_max_message_len(k: usize) -> Option<usize> {
    k.checked_sub(PKCS1_ENCRYPT_OVERHEAD)
}

/// EME-PKCS1-v1_5 encoding: `00 02 PS 00 M` with non-zero random PS.
pub fn pkcs1_encrypt_pad<R: RngCore + CryptoRng + ?Sized>(message: &[u8], k: usize, rng: &mut R) -> Result<Vec<u8>> {
    let max = pkcs1_max_message_len(k).ok_or_else(|| Error::invalid_params("modulus too small for PKCS#1 v1.5"))?;
    if message.len() > max {
        return Err(Error::invalid_params(format!("message too long: {} > {max}", message.len())));
    }
    let ps_len = k - message.len() - 3;
    let mut em = vec![0u8; k];
    em[1] = 0x02;
    let ps = &mut em[2..2 + ps_len];
    rng.try_fill_bytes(ps).map_err(|e| Error::internal(format!("rng failure: {e}")))?;
    for byte in ps.iter_mut() {
        while *byte == 0 {
            let mut one = [0u8; 1];
            rng.try_fill_bytes(&mut one).map_err(|e| Error::internal(format!("rng failure: {e}")))?;
            *byte = one[0];
        }
    }
    em[k - message.len()..].copy_from_slice(message);
    Ok(em)
}

/// Inverse of [`pkcs1_encrypt_pad`]. Every malformed input yields
/// [`Error::InvalidPadding`].
pub fn pkcs1_encrypt_unpad(em: &[u8]) -> Result<Vec<u8>> {
    if em.len() < PKCS1_ENCRYPT_OVERHEAD {
        return Err(Error::InvalidPadding);
    }
    let mut good = em[0].ct_eq(&0x00) & em[1].ct_eq(&0x02);
    let mut found = Choice::from(0);
    let mut separator: u32 = 0;
    for (i, byte) in em.iter().enumerate().skip(2) {
        let is_zero = byte.ct_eq(&0);
        separator.conditional_assign(&(i as u32), is_zero & !found);
        found |= is_zero;
    }
    good &= found;
    // PS spans em[2..separator] and must be at least eight bytes
    good &= !separator.ct_lt(&10);
    if bool::from(good) {
        Ok(em[separator as usize + 1..].to_vec())
    } else {
        Err(Error::InvalidPadding)
    }
}

/// EME-OAEP encoding (RFC 8017 §7.1.1) with an empty label.
pub fn oaep_encode<R: RngCore + CryptoRng + ?Sized>(
    hash: HashAlgorithm,
    message: &[u8],
    k: usize,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let h_len = hash.output_len();
    let max = oaep_max_message_len(hash, k).ok_or_else(|| Error::invalid_params("modulus too small for OAEP"))?;
    if message.len() > max {
        return Err(Error::invalid_params(format!("message too long: {} > {max}", message.len())));
    }
    let db_len = k - h_len - 1;
    let mut db = Zeroizing::new(vec![0u8; db_len]);
    db[..h_len].copy_from_slice(&hash.digest(b""));
    db[db_len - message.len() - 1] = 0x01;
    db[db_len - message.len()..].copy_from_slice(message);

    let mut seed = Zeroizing::new(vec![0u8; h_len]);
    rng.try_fill_bytes(&mut seed).map_err(|e| Error::internal(format!("rng failure: {e}")))?;
    xor_in_place(&mut db, &mgf1(hash, &seed, db_len));
    xor_in_place(&mut seed, &mgf1(hash, &db, h_len));

    let mut em = vec![0u8; k];
    em[1..=h_len].copy_from_slice(&seed);
    em[h_len + 1..].copy_from_slice(&db);
    Ok(em)
}

/// EME-OAEP decoding (RFC 8017 §7.1.2) with an empty label. Every malformed
/// input yields [`Error::InvalidPadding`].
pub fn oaep_decode(hash: HashAlgorithm, em: &[u8]) -> Result<Vec<u8>> {
    let h_len = hash.output_len();
    let k = em.len();
    if k < 2 * h_len + 2 {
        return Err(Error::InvalidPadding);
    }
    let mut seed = Zeroizing::new(em[1..=h_len].to_vec());
    let mut db = Zeroizing::new(em[h_len + 1..].to_vec());
    xor_in_place(&mut seed, &mgf1(hash, &db, h_len));
    xor_in_place(&mut db, &mgf1(hash, &seed, k - h_len - 1));

    let mut good = em[0].ct_eq(&0x00);
    good &= db[..h_len].ct_eq(&hash.digest(b"")[..]);

    // PS (zeros) then 0x01; anything else before the first 0x01 is invalid
    let mut looking = Choice::from(1);
    let mut index: u32 = 0;
    let mut stray = Choice::from(0);
    for (i, byte) in db[h_len..].iter().enumerate() {
        let is_zero = byte.ct_eq(&0x00);
        let is_one = byte.ct_eq(&0x01);
        index.conditional_assign(&(i as u32), looking & is_one);
        stray |= looking & !is_zero & !is_one;
        looking &= !is_one;
    }
    good &= !stray & !looking;

    if bool::from(good) {
        Ok(db[h_len + index as usize + 1..].to_vec())
    } else {
        Err(Error::InvalidPadding)
    }
}

/// EMSA-PKCS1-v1_5 (RFC 8017 §9.2): `00 01 FF.. 00 DigestInfo || Hash(M)`.
pub fn pkcs1_sign_encode(hash: HashAlgorithm, message: &[u8], em_len: usize) -> Result<Vec<u8>> {
    let prefix = hash.digest_info_prefix();
    let t_len = prefix.len() + hash.output_len();
    if em_len < t_len + PKCS1_ENCRYPT_OVERHEAD {
        warn!(em_len, "modulus too small for PKCS#1 v1.5 signature");
        return Err(Error::invalid_params("modulus too small for PKCS#1 v1.5 signature"));
    }
    let mut em = vec![0xffu8; em_len];
    em[0] = 0x00;
    em[1] = 0x01;
    em[em_len - t_len - 1] = 0x00;
    em[em_len - t_len..em_len - hash.output_len()].copy_from_slice(prefix);
    em[em_len - hash.output_len()..].copy_from_slice(&hash.digest(message));
    Ok(em)
}

fn pss_m_prime_hash(hash: HashAlgorithm, m_hash: &[u8], salt: &[u8]) -> Vec<u8> {
    hash.digest_parts(&[&[0u8; 8][..], m_hash, salt])
}

/// EMSA-PSS encoding (RFC 8017 §9.1.1) of `message` into `ceil(em_bits/8)`
/// bytes.
pub fn pss_encode<R: RngCore + CryptoRng + ?Sized>(
    hash: HashAlgorithm,
    message: &[u8],
    em_bits: usize,
    salt_len: usize,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let h_len = hash.output_len();
    let em_len = em_bits.div_ceil(8);
    if em_len < h_len + salt_len + 2 {
        return Err(Error::invalid_params("modulus too small for PSS with this salt"));
    }
    let m_hash = hash.digest(message);
    let mut salt = vec![0u8; salt_len];
    rng.try_fill_bytes(&mut salt).map_err(|e| Error::internal(format!("rng failure: {e}")))?;
    let h = pss_m_prime_hash(hash, &m_hash, &salt);

    let db_len = em_len - h_len - 1;
    let mut em = vec![0u8; em_len];
    em[db_len - salt_len - 1] = 0x01;
    em[db_len - salt_len..db_len].copy_from_slice(&salt);
    xor_in_place(&mut em[..db_len], &mgf1(hash, &h, db_len));
    em[0] &= 0xffu8 >> (8 * em_len - em_bits);
    em[db_len..em_len - 1].copy_from_slice(&h);
    em[em_len - 1] = PSS_TRAILER;
    Ok(em)
}

/// EMSA-PSS verification (RFC 8017 §9.1.2). Any mismatch yields
/// [`Error::VerificationFailed`].
pub fn pss_verify(hash: HashAlgorithm, message: &[u8], em: &[u8], em_bits: usize, salt_len: usize) -> Result<()> {
    let h_len = hash.output_len();
    let em_len = em_bits.div_ceil(8);
    if em.len() != em_len || em_len < h_len + salt_len + 2 {
        return Err(Error::VerificationFailed);
    }
    let db_len = em_len - h_len - 1;
    let top_mask = !(0xffu8 >> (8 * em_len - em_bits));
    let h = &em[db_len..em_len - 1];

    let mut good = em[em_len - 1].ct_eq(&PSS_TRAILER);
    good &= (em[0] & top_mask).ct_eq(&0);

    let mut db = em[..db_len].to_vec();
    xor_in_place(&mut db, &mgf1(hash, h, db_len));
    db[0] &= !top_mask;

    let ps_len = db_len - salt_len - 1;
    for byte in &db[..ps_len] {
        good &= byte.ct_eq(&0);
    }
    good &= db[ps_len].ct_eq(&0x01);

    let h_prime = pss_m_prime_hash(hash, &hash.digest(message), &db[db_len - salt_len..]);
    good &= h.ct_eq(&h_prime[..]);

    if bool::from(good) {
        Ok(())
    } else {
        Err(Error::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use rand::rngs::OsRng;

    #[test]
    fn mgf1_sha256_known_answer() {
        // MGF1-SHA256("bar", 50)
        let mask = mgf1(HashAlgorithm::Sha256, b"bar", 50);
        assert_eq!(
            mask,
            hex!(
                "382576a7841021cc28fc4c0948753fb8312090cea942ea4c4e735d10dc724b15"
                "5f9f6069f289d61daca0cb814502ef04eae1"
            )
            .to_vec()
        );
        assert_eq!(mgf1(HashAlgorithm::Sha256, b"bar", 0), Vec::<u8>::new());
    }

    #[test]
    fn pkcs1_pad_layout() {
        let em = pkcs1_encrypt_pad(b"hello", 64, &mut OsRng).unwrap();
        assert_eq!(em.len(), 64);
        assert_eq!(&em[..2], &[0x00, 0x02]);
        assert!(em[2..64 - 6].iter().all(|&b| b != 0));
        assert_eq!(em[64 - 6], 0);
        assert_eq!(pkcs1_encrypt_unpad(&em).unwrap(), b"hello");
    }

    #[test]
    fn pkcs1_pad_size_limits() {
        assert!(pkcs1_encrypt_pad(&[1u8; 53], 64, &mut OsRng).is_ok());
        assert!(matches!(pkcs1_encrypt_pad(&[1u8; 54], 64, &mut OsRng), Err(Error::InvalidParameters(_))));
        assert!(pkcs1_encrypt_pad(&[], 64, &mut OsRng).is_ok());
    }

    #[test]
    fn pkcs1_unpad_rejects_malformed() {
        let good = pkcs1_encrypt_pad(b"msg", 32, &mut OsRng).unwrap();

        let mut bad_lead = good.clone();
        bad_lead[0] = 1;
        assert_eq!(pkcs1_encrypt_unpad(&bad_lead), Err(Error::InvalidPadding));

        let mut bad_type = good.clone();
        bad_type[1] = 1;
        assert_eq!(pkcs1_encrypt_unpad(&bad_type), Err(Error::InvalidPadding));

        let mut short_ps = good.clone();
        short_ps[5] = 0;
        assert_eq!(pkcs1_encrypt_unpad(&short_ps), Err(Error::InvalidPadding));

        let mut no_sep = vec![0x00, 0x02];
        no_sep.extend_from_slice(&[0x11; 30]);
        assert_eq!(pkcs1_encrypt_unpad(&no_sep), Err(Error::InvalidPadding));

        assert_eq!(pkcs1_encrypt_unpad(&[0, 2, 1]), Err(Error::InvalidPadding));
    }

    #[test]
    fn pkcs1_unpad_accepts_minimum_ps() {
        let mut em = vec![0x00, 0x02];
        em.extend_from_slice(&[0x33; 8]);
        em.push(0x00);
        em.extend_from_slice(b"xy");
        assert_eq!(pkcs1_encrypt_unpad(&em).unwrap(), b"xy");
    }

    #[test]
    fn oaep_roundtrip_and_limits() {
        let k = 128;
        let max = oaep_max_message_len(HashAlgorithm::Sha256, k).unwrap();
        assert_eq!(max, 62);
        for len in [0usize, 1, 31, max] {
            let msg = vec![0xA5u8; len];
            let em = oaep_encode(HashAlgorithm::Sha256, &msg, k, &mut OsRng).unwrap();
            assert_eq!(em[0], 0);
            assert_eq!(oaep_decode(HashAlgorithm::Sha256, &em).unwrap(), msg);
        }
        assert!(matches!(
            oaep_encode(HashAlgorithm::Sha256, &[0u8; 63], k, &mut OsRng),
            Err(Error::InvalidParameters(_))
        ));
        assert!(oaep_max_message_len(HashAlgorithm::Sha512, 100).is_none());
    }

    #[test]
    fn oaep_decode_rejects_tampering() {
        let em = oaep_encode(HashAlgorithm::Sha256, b"secret", 128, &mut OsRng).unwrap();
        for pos in [0usize, 1, 40, 127] {
            let mut bad = em.clone();
            bad[pos] ^= 0x01;
            assert_eq!(oaep_decode(HashAlgorithm::Sha256, &bad), Err(Error::InvalidPadding), "pos {pos}");
        }
        assert_eq!(oaep_decode(HashAlgorithm::Sha384, &em), Err(Error::InvalidPadding));
        assert_eq!(oaep_decode(HashAlgorithm::Sha256, &em[..60]), Err(Error::InvalidPadding));
    }

    #[test]
    fn pkcs1_signature_encoding_layout() {
        let em = pkcs1_sign_encode(HashAlgorithm::Sha256, b"abc", 128).unwrap();
        assert_eq!(&em[..2], &[0x00, 0x01]);
        let t_len = 19 + 32;
        assert!(em[2..128 - t_len - 1].iter().all(|&b| b == 0xff));
        assert_eq!(em[128 - t_len - 1], 0x00);
        assert_eq!(&em[128 - t_len..128 - 32], HashAlgorithm::Sha256.digest_info_prefix());
        assert_eq!(
            &em[128 - 32..],
            &hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert!(matches!(pkcs1_sign_encode(HashAlgorithm::Sha512, b"abc", 64), Err(Error::InvalidParameters(_))));
    }

    #[test]
    fn pss_roundtrip_with_odd_em_bits() {
        for em_bits in [1023usize, 1020, 1016] {
            let em = pss_encode(HashAlgorithm::Sha256, b"message", em_bits, 32, &mut OsRng).unwrap();
            assert_eq!(em.len(), em_bits.div_ceil(8));
            assert_eq!(*em.last().unwrap(), PSS_TRAILER);
            pss_verify(HashAlgorithm::Sha256, b"message", &em, em_bits, 32).unwrap();
            assert_eq!(
                pss_verify(HashAlgorithm::Sha256, b"messagf", &em, em_bits, 32),
                Err(Error::VerificationFailed)
            );
            assert_eq!(
                pss_verify(HashAlgorithm::Sha256, b"message", &em, em_bits, 20),
                Err(Error::VerificationFailed)
            );
        }
    }

    #[test]
    fn pss_zero_salt_is_deterministic() {
        let a = pss_encode(HashAlgorithm::Sha256, b"m", 1023, 0, &mut OsRng).unwrap();
        let b = pss_encode(HashAlgorithm::Sha256, b"m", 1023, 0, &mut OsRng).unwrap();
        assert_eq!(a, b);
        pss_verify(HashAlgorithm::Sha256, b"m", &a, 1023, 0).unwrap();
    }

    #[test]
    fn pss_verify_rejects_any_bit_flip() {
        let em = pss_encode(HashAlgorithm::Sha384, b"payload", 1535, 48, &mut OsRng).unwrap();
        for pos in 0..em.len() {
            let mut bad = em.clone();
            bad[pos] ^= 0x80;
            assert_eq!(
                pss_verify(HashAlgorithm::Sha384, b"payload", &bad, 1535, 48),
                Err(Error::VerificationFailed),
                "pos {pos}"
            );
        }
    }

    #[test]
    fn pss_encode_rejects_small_modulus() {
        assert!(matches!(
            pss_encode(HashAlgorithm::Sha512, b"m", 511, 64, &mut OsRng),
            Err(Error::InvalidParameters(_))
        ));
    }
}
