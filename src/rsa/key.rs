//! RSA key model: raw (un-padded) encrypt/decrypt plus the `texts` scratchpad the
//! attacks in [`super::attacks`] read from and write into.

use std::fmt;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::RngCore;

use crate::error::{CryptoAttackError, Result};
use crate::math::{inv_mod, pow_mod};

/// One known (ciphertext, plaintext) pair, either or both present.
///
/// Attacks fill in whichever side is missing: `cipher` present with `plain` absent
/// asks "decrypt this"; `plain` present with `cipher` absent asks "sign/encrypt this".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextPair {
  pub cipher: Option<BigUint>,
  pub plain: Option<BigUint>,
}

/// An RSA key, public or private, with a scratchpad of known texts attacks
/// populate as they recover material.
#[derive(Debug, Clone)]
pub struct RsaKey {
  pub n: BigUint,
  pub e: BigUint,
  pub d: Option<BigUint>,
  pub p: Option<BigUint>,
  pub q: Option<BigUint>,
  /// Modulus size in bits, rounded up to a whole byte.
  pub size: u64,
  pub identifier: String,
  pub texts: Vec<TextPair>,
}

impl RsaKey {
  fn size_of(n: &BigUint) -> u64 {
    ((n.bits() + 7) / 8) * 8
  }

  /// A public-only key: `n` and `e`.
  pub fn new_public(n: BigUint, e: BigUint, identifier: impl Into<String>) -> Self {
    let size = Self::size_of(&n);
    Self {
      n,
      e,
      d: None,
      p: None,
      q: None,
      size,
      identifier: identifier.into(),
      texts: Vec::new(),
    }
  }

  /// A private key from its two factors. Derives `d = e^-1 mod (p-1)(q-1)`.
  pub fn new_private_from_pq(
    n: BigUint,
    e: BigUint,
    p: BigUint,
    q: BigUint,
    identifier: impl Into<String>,
  ) -> Result<Self> {
    if &p * &q != n {
      return Err(CryptoAttackError::InvalidKey(
        "p * q does not equal n".into(),
      ));
    }
    let phi = (&p - BigUint::one()) * (&q - BigUint::one());
    let d = inv_mod(&e, &phi)
      .ok_or_else(|| CryptoAttackError::InvalidKey("e is not invertible mod (p-1)(q-1)".into()))?;
    let size = Self::size_of(&n);
    Ok(Self {
      n,
      e,
      d: Some(d),
      p: Some(p),
      q: Some(q),
      size,
      identifier: identifier.into(),
      texts: Vec::new(),
    })
  }

  /// A private key recovered from a leaked/derived `d`, factoring `n` along the way.
  pub fn new_private_from_d(
    n: BigUint,
    e: BigUint,
    d: BigUint,
    rng: &mut impl RngCore,
    identifier: impl Into<String>,
  ) -> Result<Self> {
    let (p, q) = super::attacks::factors_from_d(&n, &e, &d, rng)?;
    Self::new_private_from_pq(n, e, p, q, identifier)
  }

  /// Minimum seam an external PEM/PKCS parser can call into: `n`/`e` plus an
  /// optional leaked/parsed factor `p` (with `q = n / p` derived), or a
  /// public-only key when `p` is absent.
  pub fn from_parts(n: BigUint, e: BigUint, p: Option<BigUint>, identifier: impl Into<String>) -> Result<Self> {
    match p {
      Some(p) => {
        if !(&n % &p).is_zero() {
          return Err(CryptoAttackError::InvalidKey("p does not divide n".into()));
        }
        let q = &n / &p;
        Self::new_private_from_pq(n, e, p, q, identifier)
      }
      None => Ok(Self::new_public(n, e, identifier)),
    }
  }

  pub fn has_private(&self) -> bool {
    self.d.is_some()
  }

  /// The public half of this key, carrying over the known texts.
  pub fn public_key(&self, identifier: impl Into<String>) -> Self {
    Self {
      n: self.n.clone(),
      e: self.e.clone(),
      d: None,
      p: None,
      q: None,
      size: self.size,
      identifier: identifier.into(),
      texts: self.texts.clone(),
    }
  }

  /// Raw (un-padded) RSA encryption: `plaintext^e mod n`.
  pub fn encrypt(&self, plaintext: &BigUint) -> BigUint {
    pow_mod(plaintext, &self.e, &self.n)
  }

  /// Raw (un-padded) RSA decryption: `ciphertext^d mod n`. Requires a private key.
  pub fn decrypt(&self, ciphertext: &BigUint) -> Result<BigUint> {
    let d = self
      .d
      .as_ref()
      .ok_or_else(|| CryptoAttackError::InvalidKey("key has no private exponent".into()))?;
    Ok(pow_mod(ciphertext, d, &self.n))
  }

  pub fn add_ciphertext(&mut self, ciphertext: BigUint) {
    self.texts.push(TextPair {
      cipher: Some(ciphertext),
      plain: None,
    });
  }

  pub fn add_plaintext(&mut self, plaintext: BigUint) {
    self.texts.push(TextPair {
      cipher: None,
      plain: Some(plaintext),
    });
  }

  pub fn add_text_pair(&mut self, ciphertext: Option<BigUint>, plaintext: Option<BigUint>) {
    self.texts.push(TextPair {
      cipher: ciphertext,
      plain: plaintext,
    });
  }

  pub fn clear_texts(&mut self) {
    self.texts.clear();
  }

  /// Ciphertexts with no matching known plaintext yet — the inputs attacks consume.
  pub fn unsolved_ciphertexts(&self) -> Vec<BigUint> {
    self
      .texts
      .iter()
      .filter(|t| t.cipher.is_some() && t.plain.is_none())
      .filter_map(|t| t.cipher.clone())
      .collect()
  }
}

impl fmt::Display for RsaKey {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let n_bytes = self.n.to_bytes_be();
    let n_prefix = hex::encode(&n_bytes[..n_bytes.len().min(8)]);
    if self.has_private() {
      write!(f, "{} (private, n={n_prefix}...)", self.identifier)
    } else {
      write!(f, "{} (public, n={n_prefix}...)", self.identifier)
    }
  }
}

impl PartialEq for RsaKey {
  fn eq(&self, other: &Self) -> bool {
    self.identifier == other.identifier && self.n == other.n && self.e == other.e
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn small_key() -> RsaKey {
    // p=61, q=53, n=3233, e=17, d=2753 (textbook RSA example).
    RsaKey::new_private_from_pq(
      BigUint::from(3233u32),
      BigUint::from(17u32),
      BigUint::from(61u32),
      BigUint::from(53u32),
      "test",
    )
    .unwrap()
  }

  #[test]
  fn encrypt_decrypt_round_trip() {
    let key = small_key();
    let plaintext = BigUint::from(65u32);
    let ciphertext = key.encrypt(&plaintext);
    assert_eq!(key.decrypt(&ciphertext).unwrap(), plaintext);
  }

  #[test]
  fn public_key_strips_private_material() {
    let key = small_key();
    let public = key.public_key("test-pub");
    assert!(!public.has_private());
    assert!(public.decrypt(&BigUint::from(1u32)).is_err());
  }

  #[test]
  fn rejects_mismatched_factors() {
    let err = RsaKey::new_private_from_pq(
      BigUint::from(3233u32),
      BigUint::from(17u32),
      BigUint::from(61u32),
      BigUint::from(59u32),
      "bad",
    )
    .unwrap_err();
    assert!(matches!(err, CryptoAttackError::InvalidKey(_)));
  }

  #[test]
  fn from_parts_derives_q_when_p_given() {
    let key = RsaKey::from_parts(
      BigUint::from(3233u32),
      BigUint::from(17u32),
      Some(BigUint::from(61u32)),
      "imported",
    )
    .unwrap();
    assert_eq!(key.q, Some(BigUint::from(53u32)));
    assert_eq!(key.d, Some(BigUint::from(2753u32)));
  }

  #[test]
  fn from_parts_without_p_is_public_only() {
    let key = RsaKey::from_parts(BigUint::from(3233u32), BigUint::from(17u32), None, "imported-pub").unwrap();
    assert!(!key.has_private());
  }
}
