//! RSA key model and attack suite.

pub mod attacks;
pub mod key;

pub use attacks::{
  bleichenbacher_signature_forgery, blinding, common_primes, factors_from_d, faulty, hastad, parity, small_e_msg,
  wiener, BlindingOracle, GarbagePosition, BLEICHENBACHER_MIDDLE_MAX_ATTEMPTS, BLEICHENBACHER_SUFFIX_DELTA_RADIUS,
};
pub use key::{RsaKey, TextPair};
