// End-to-end session flow: signed DH exchange, AES session, RSA transport.

use zclient_crypto::{CryptoParams, DhGroup, Error, RsaKeyPair, RsaPadding};
use zclient_integration_tests::{establish, init_test_tracing, Party, TestResult};

fn fast_params() -> CryptoParams {
    CryptoParams { rsa_key_bits: 1024, dh_group: DhGroup::Oakley1024, ..CryptoParams::default() }
}

#[test]
fn authenticated_exchange_yields_matching_sessions() -> TestResult<()> {
    init_test_tracing();
    let (_alice, a_session, _bob, b_session) = establish(&fast_params())?;

    let sealed = a_session.seal(b"hello bob")?;
    assert_eq!(sealed.len() % 16, 0);
    assert_eq!(b_session.open(&sealed)?, b"hello bob");

    let reply = b_session.seal(b"hello alice, 32 bytes of reply!!")?;
    assert_eq!(a_session.open(&reply)?, b"hello alice, 32 bytes of reply!!");
    Ok(())
}

#[test]
fn forged_offer_is_rejected() -> TestResult<()> {
    init_test_tracing();
    let params = fast_params();
    let mut alice = Party::new("alice", &params)?;
    let mut bob = Party::new("bob", &params)?;
    let mallory = Party::new("mallory", &params)?;

    let mut offer = bob.offer()?;
    offer.dh_public[10] ^= 0x01;
    let err = alice.accept(bob.identity(), &offer).err().ok_or_else(|| anyhow::anyhow!("forged offer accepted"))?;
    assert_eq!(err.downcast_ref::<Error>(), Some(&Error::VerificationFailed));

    let honest = bob.offer()?;
    assert!(alice.accept(mallory.identity(), &honest).is_err());
    Ok(())
}

#[test]
fn closed_session_refuses_traffic() -> TestResult<()> {
    let (_a, mut session, _b, _peer) = establish(&fast_params())?;
    session.close();
    session.close();
    assert!(session.is_closed());
    let err = session.seal(b"late").err().ok_or_else(|| anyhow::anyhow!("sealed after close"))?;
    assert_eq!(err.downcast_ref::<Error>(), Some(&Error::InvalidContext));
    Ok(())
}

#[test]
fn rsa_key_transport_of_session_key() -> TestResult<()> {
    init_test_tracing();
    let (public, private) = RsaKeyPair::generate(1024)?.into_parts();
    let session_key = [0x42u8; 32];
    for scheme in [RsaPadding::Oaep, RsaPadding::Pkcs1] {
        let wrapped = public.encrypt_to_vec(&session_key, scheme)?;
        let mut out = [0u8; 128];
        let n = private.decrypt(&wrapped, &mut out, scheme)?;
        assert_eq!(&out[..n], &session_key);
    }
    Ok(())
}
