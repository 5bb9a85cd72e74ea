#![no_main]

use libfuzzer_sys::fuzz_target;
use zclient_crypto::rsa::padding;
use zclient_crypto::{Error, HashAlgorithm};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let salt_len = usize::from(data[0] % 65);
    let split = usize::from(data[1]).min(data.len() - 2);
    let (message, em) = data[2..].split_at(split);
    if em.is_empty() {
        return;
    }
    // byte-aligned and unaligned emBits
    for em_bits in [em.len() * 8, em.len() * 8 - 1] {
        if let Err(e) = padding::pss_verify(HashAlgorithm::Sha256, message, em, em_bits, salt_len) {
            assert_eq!(e, Error::VerificationFailed);
        }
    }
});
