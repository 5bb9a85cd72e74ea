#![no_main]

use libfuzzer_sys::fuzz_target;
use zclient_crypto::{AesContext, AesMode, Error};

fuzz_target!(|data: &[u8]| {
    if data.len() < 49 {
        return;
    }
    let mode = match data[0] % 3 {
        0 => AesMode::Ecb,
        1 => AesMode::Cbc,
        _ => AesMode::Ctr,
    };
    let key = &data[1..33];
    let iv = &data[33..49];
    let body = &data[49..];
    let Ok(ctx) = AesContext::new(key, mode, mode.requires_iv().then_some(iv)) else {
        return;
    };
    match ctx.encrypt_to_vec(body) {
        Ok(ct) => assert_eq!(ctx.decrypt_to_vec(&ct).ok().as_deref(), Some(body)),
        Err(e) => assert!(matches!(e, Error::InvalidParameters(_))),
    }
});
