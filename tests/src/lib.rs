// Integration harness for zclient end-to-end tests
//
// Two simulated parties run an authenticated Diffie-Hellman exchange (public
// values signed with RSA), derive an AES session key from the shared secret
// and exchange encrypted payloads.

pub mod test_harness;

pub use test_harness::{establish, init_test_tracing, Offer, Party, Session, TestResult};
