#![forbid(unsafe_code)]

use std::sync::OnceLock;

use zclient_crypto::rsa::padding;
use zclient_crypto::{CryptoParams, Error, HashAlgorithm, RsaKeyPair, RsaPadding};

fn key_1024() -> &'static RsaKeyPair {
    static KEY: OnceLock<RsaKeyPair> = OnceLock::new();
    KEY.get_or_init(|| RsaKeyPair::generate(1024).unwrap())
}

#[test]
fn encryption_roundtrips_up_to_scheme_limit() {
    let pair = key_1024();
    for scheme in [RsaPadding::Pkcs1, RsaPadding::Oaep] {
        let max = pair.public().max_message_len(scheme).unwrap();
        for len in [0usize, 1, max / 2, max] {
            let msg: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let ct = pair.public().encrypt_to_vec(&msg, scheme).unwrap();
            assert_eq!(ct.len(), 128);
            assert_eq!(pair.private().decrypt_to_vec(&ct, scheme).unwrap(), msg, "{scheme:?} len {len}");
        }
        let too_long = vec![0u8; max + 1];
        assert!(matches!(pair.public().encrypt_to_vec(&too_long, scheme), Err(Error::InvalidParameters(_))));
    }
    assert_eq!(pair.public().max_message_len(RsaPadding::Pkcs1), Some(117));
    assert_eq!(pair.public().max_message_len(RsaPadding::Oaep), Some(62));
}

#[test]
fn randomized_padding_gives_fresh_ciphertexts() {
    let pair = key_1024();
    for scheme in [RsaPadding::Pkcs1, RsaPadding::Oaep] {
        let a = pair.public().encrypt_to_vec(b"same", scheme).unwrap();
        let b = pair.public().encrypt_to_vec(b"same", scheme).unwrap();
        assert_ne!(a, b);
    }
}

#[test]
fn decrypt_with_wrong_scheme_is_invalid_padding() {
    let pair = key_1024();
    let pkcs1 = pair.public().encrypt_to_vec(b"v1.5 payload", RsaPadding::Pkcs1).unwrap();
    assert_eq!(pair.private().decrypt_to_vec(&pkcs1, RsaPadding::Oaep), Err(Error::InvalidPadding));
    let ct = pair.public().encrypt_to_vec(b"oaep payload", RsaPadding::Oaep).unwrap();
    let mut tampered = ct.clone();
    tampered[64] ^= 0x04;
    assert_eq!(pair.private().decrypt_to_vec(&tampered, RsaPadding::Oaep), Err(Error::InvalidPadding));
}

#[test]
fn short_output_is_rejected_alike_for_valid_and_tampered_ciphertexts() {
    let pair = key_1024();
    for (scheme, bound) in [(RsaPadding::Pkcs1, 117usize), (RsaPadding::Oaep, 62)] {
        assert_eq!(pair.private().max_message_len(scheme), Some(bound));
        let ct = pair.public().encrypt_to_vec(&[7u8; 40], scheme).unwrap();
        let mut tampered = ct.clone();
        tampered[64] ^= 0x01;
        let expected = Err(Error::BufferTooSmall { required: bound, provided: 16 });
        let mut out = [0u8; 16];
        assert_eq!(pair.private().decrypt(&ct, &mut out, scheme), expected, "{scheme:?} valid");
        assert_eq!(pair.private().decrypt(&tampered, &mut out, scheme), expected, "{scheme:?} tampered");
        assert_eq!(out, [0u8; 16]);

        // with room for the bound, padding validity decides
        let mut exact = vec![0u8; bound];
        assert_eq!(pair.private().decrypt(&ct, &mut exact, scheme), Ok(40));
        assert_eq!(pair.private().decrypt(&tampered, &mut exact, scheme), Err(Error::InvalidPadding));
    }
}

#[test]
fn signatures_verify_and_detect_bit_flips() {
    let pair = key_1024();
    let message = b"transfer 100 units to account 42";
    for scheme in [RsaPadding::Pkcs1, RsaPadding::Pss] {
        let sig = pair.private().sign_to_vec(message, scheme).unwrap();
        assert_eq!(sig.len(), 128);
        pair.public().verify(message, &sig, scheme).unwrap();

        for bit in [0usize, 7, 100, 8 * message.len() - 1] {
            let mut m = message.to_vec();
            m[bit / 8] ^= 1 << (bit % 8);
            assert_eq!(pair.public().verify(&m, &sig, scheme), Err(Error::VerificationFailed), "{scheme:?} msg bit {bit}");
        }
        for bit in [0usize, 9, 512, 1023] {
            let mut s = sig.clone();
            s[bit / 8] ^= 1 << (bit % 8);
            assert_eq!(pair.public().verify(message, &s, scheme), Err(Error::VerificationFailed), "{scheme:?} sig bit {bit}");
        }
    }
}

#[test]
fn pkcs1_signatures_are_deterministic_and_pss_is_not() {
    let pair = key_1024();
    let a = pair.private().sign_to_vec(b"m", RsaPadding::Pkcs1).unwrap();
    let b = pair.private().sign_to_vec(b"m", RsaPadding::Pkcs1).unwrap();
    assert_eq!(a, b);
    let c = pair.private().sign_to_vec(b"m", RsaPadding::Pss).unwrap();
    let d = pair.private().sign_to_vec(b"m", RsaPadding::Pss).unwrap();
    assert_ne!(c, d);
}

#[test]
fn sign_output_capacity_is_checked() {
    let pair = key_1024();
    let mut out = [0u8; 127];
    assert_eq!(
        pair.private().sign(b"m", &mut out, RsaPadding::Pss),
        Err(Error::BufferTooSmall { required: 128, provided: 127 })
    );
    assert!(out.iter().all(|&b| b == 0));
}

#[test]
fn hash_choice_must_match_between_signer_and_verifier() {
    let (public, private) = RsaKeyPair::generate(1024).unwrap().into_parts();
    let private = private.with_hash(HashAlgorithm::Sha512);
    let sig = private.sign_to_vec(b"doc", RsaPadding::Pkcs1).unwrap();
    assert_eq!(public.verify(b"doc", &sig, RsaPadding::Pkcs1), Err(Error::VerificationFailed));
    let public = public.with_hash(HashAlgorithm::Sha512);
    public.verify(b"doc", &sig, RsaPadding::Pkcs1).unwrap();
}

#[test]
fn params_drive_hash_and_salt() {
    let params = CryptoParams::from_toml_str("rsa_hash = \"sha384\"\npss_salt_len = 0\nrsa_key_bits = 1024").unwrap();
    let pair = RsaKeyPair::generate_with_params(&params).unwrap();
    assert_eq!(pair.public().bits(), 1024);
    assert_eq!(pair.private().hash(), HashAlgorithm::Sha384);
    let a = pair.private().sign_to_vec(b"m", RsaPadding::Pss).unwrap();
    let b = pair.private().sign_to_vec(b"m", RsaPadding::Pss).unwrap();
    // empty salt makes PSS deterministic
    assert_eq!(a, b);
    pair.public().verify(b"m", &a, RsaPadding::Pss).unwrap();
}

#[test]
fn padding_helpers_agree_with_key_operations() {
    let pair = key_1024();
    let k = pair.public().size();
    let em = padding::pkcs1_sign_encode(HashAlgorithm::Sha256, b"abc", k).unwrap();
    // raw private operation over the EMSA encoding equals a PKCS#1 signature
    let raw = pair.private().decrypt_to_vec(&pair.public().encrypt_to_vec(&em, RsaPadding::None).unwrap(), RsaPadding::None).unwrap();
    assert_eq!(raw, em);
    let sig = pair.private().sign_to_vec(b"abc", RsaPadding::Pkcs1).unwrap();
    assert_eq!(pair.public().encrypt_to_vec(&sig, RsaPadding::None).unwrap(), em);
}
