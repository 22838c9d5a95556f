//! Recovers a deliberately small RSA private exponent via Wiener's continued-fraction
//! attack, given only the public key.
//!
//! Run with: cargo run --example rsa_wiener_demo

use num_bigint::BigUint;
use num_traits::One;

use crypto_attacks::rsa::{wiener, RsaKey};

fn main() {
  env_logger::init();

  // Two primes large enough that d = 7 still satisfies Wiener's bound
  // (d < n^(1/4) / 3), i.e. a key nobody sane would actually issue.
  let p = BigUint::parse_bytes(b"104723", 10).unwrap();
  let q = BigUint::parse_bytes(b"104759", 10).unwrap();
  let n = &p * &q;
  let phi = (&p - BigUint::one()) * (&q - BigUint::one());
  let d = BigUint::from(7u32);
  let e = crypto_attacks::math::inv_mod(&d, &phi).expect("d must be invertible mod phi(n)");

  let key = RsaKey::new_public(n, e, "weak-key");
  println!("attacking {key}");

  let broken = wiener(&key).expect("Wiener's attack should recover this deliberately weak key");
  println!("recovered d = {}", broken.d.expect("private key has d"));
}
