#![no_main]

use libfuzzer_sys::fuzz_target;
use zclient_crypto::rsa::padding;
use zclient_crypto::{Error, HashAlgorithm};

fuzz_target!(|data: &[u8]| {
    // Decoders must never panic and may only fail with InvalidPadding
    match padding::pkcs1_encrypt_unpad(data) {
        Ok(m) => assert!(m.len() + padding::PKCS1_ENCRYPT_OVERHEAD <= data.len()),
        Err(e) => assert_eq!(e, Error::InvalidPadding),
    }
    for hash in [HashAlgorithm::Sha256, HashAlgorithm::Sha512] {
        if let Err(e) = padding::oaep_decode(hash, data) {
            assert_eq!(e, Error::InvalidPadding);
        }
    }
});
