//! RSA attack suite: key recovery from a leaked private exponent, small-exponent
//! broadcast/root attacks, Wiener, shared-factor recovery, faulty-signature (BDL),
//! and the oracle-driven attacks (parity, blinding, Bleichenbacher forgery).

use std::collections::HashMap;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};
use rand::RngCore;

use crate::asn1::HashAlgorithm;
use crate::bytes::{b2i, i2b};
use crate::error::{CryptoAttackError, Result};
use crate::math::{continued_fractions, convergents, crt, gcd, inv_mod, iroot, isqrt, power_of_two, pow_mod, random_in_range};

use super::key::RsaKey;

/// Recover `p, q` from a known `(n, e, d)` triple, via the standard
/// Miller-Rabin-flavoured randomized square-root search on `k = ed - 1`.
pub fn factors_from_d(n: &BigUint, e: &BigUint, d: &BigUint, rng: &mut impl RngCore) -> Result<(BigUint, BigUint)> {
  let k = e * d - BigUint::one();
  if k.is_zero() {
    return Err(CryptoAttackError::InvalidKey("e*d - 1 must not be zero".into()));
  }
  let two = BigUint::from(2u32);
  let n_minus_1 = n - BigUint::one();

  let mut attempt = 0u64;
  loop {
    attempt += 1;
    log::trace!("factors_from_d: attempt {attempt}");
    let g = random_in_range(rng, &two, &n_minus_1);
    let mut b = &k >> power_of_two(&k);
    while &b < &k {
      let gb = pow_mod(&g, &b, n);
      if gb != BigUint::one() && gb != n_minus_1 && pow_mod(&gb, &two, n) == BigUint::one() {
        let minus_one = &gb - BigUint::one();
        let plus_one = (&gb + BigUint::one()) % n;
        let candidate = gcd(&minus_one, n);
        let p = if candidate != BigUint::one() { candidate } else { gcd(&plus_one, n) };
        if p != BigUint::one() && &p != n {
          let q = n / &p;
          log::debug!("factors_from_d converged after {attempt} attempt(s)");
          return Ok((p, q));
        }
      }
      b <<= 1;
    }
  }
}

/// Recover plaintexts whose `e`-th power exceeded the modulus only slightly
/// (small `e`, small plaintext).
pub fn small_e_msg(key: &RsaKey, ciphertexts: Option<&[BigUint]>, max_times: u32) -> Vec<BigUint> {
  let ciphertexts = match ciphertexts {
    Some(cs) => cs.to_vec(),
    None => key.unsolved_ciphertexts(),
  };
  let Some(e) = key.e.to_u32() else {
    return Vec::new();
  };

  let mut recovered = Vec::new();
  for ciphertext in ciphertexts {
    let mut times = BigUint::zero();
    for _ in 0..max_times {
      let candidate = &ciphertext + &times;
      let (msg, exact) = iroot(&candidate, e);
      if exact && pow_mod(&msg, &key.e, &key.n) == ciphertext {
        recovered.push(msg);
        break;
      }
      times += &key.n;
    }
  }
  recovered
}

/// Find keys sharing a common factor in their moduli and recover the private
/// exponent for each.
pub fn common_primes(keys: &[RsaKey]) -> Vec<RsaKey> {
  let mut recovered = Vec::new();
  let mut seen: Vec<&str> = Vec::new();

  for i in 0..keys.len() {
    for j in (i + 1)..keys.len() {
      let prime = gcd(&keys[i].n, &keys[j].n);
      if prime == BigUint::one() {
        continue;
      }
      log::debug!(
        "keys {} and {} share factor {}",
        keys[i].identifier,
        keys[j].identifier,
        hex::encode(prime.to_bytes_be())
      );
      for key in [&keys[i], &keys[j]] {
        if seen.contains(&key.identifier.as_str()) {
          continue;
        }
        let q = &key.n / &prime;
        if let Ok(mut new_key) = RsaKey::new_private_from_pq(
          key.n.clone(),
          key.e.clone(),
          prime.clone(),
          q,
          format!("{}-private", key.identifier),
        ) {
          new_key.texts = key.texts.clone();
          recovered.push(new_key);
          seen.push(&key.identifier);
        }
      }
    }
  }
  recovered
}

/// Wiener's small-private-exponent attack: `d` is recoverable whenever
/// `d < (1/3) n^(1/4)`, via the continued-fraction convergents of `e/n`.
pub fn wiener(key: &RsaKey) -> Option<RsaKey> {
  let cf = continued_fractions(&key.e, &key.n);
  let convergents = convergents(&cf);
  log::debug!("wiener: trying {} convergents of e/n", convergents.len());
  for (numerator, d_candidate) in convergents {
    if numerator.is_zero() {
      continue;
    }
    let ed = &key.e * &d_candidate;
    if ed.is_zero() {
      continue;
    }
    let ed_minus_1 = &ed - BigUint::one();
    if &ed_minus_1 % &numerator != BigUint::zero() {
      continue;
    }
    let phi = &ed_minus_1 / &numerator;

    // b = n - phi + 1, delta = b^2 - 4n; both may go negative for a bad convergent.
    let b = BigInt::from(key.n.clone()) - BigInt::from(phi) + BigInt::one();
    let delta = &b * &b - BigInt::from(4u32) * BigInt::from(key.n.clone());
    if delta <= BigInt::zero() {
      continue;
    }
    let delta_u = delta.to_biguint().expect("delta checked positive above");
    let sqrt_delta = isqrt(&delta_u);
    if &sqrt_delta * &sqrt_delta == delta_u && &sqrt_delta % 2u32 == BigUint::zero() {
      // b == p + q and sqrt_delta == |p - q|, so both factors fall out directly
      // without a second randomized search.
      let b_u = b.to_biguint().expect("p + q is positive for a valid RSA modulus");
      let p = (&b_u + &sqrt_delta) / 2u32;
      let q = (&b_u - &sqrt_delta) / 2u32;
      return RsaKey::new_private_from_pq(
        key.n.clone(),
        key.e.clone(),
        p,
        q,
        format!("{}-private", key.identifier),
      )
      .ok();
    }
  }
  None
}

/// Håstad's broadcast attack: the same plaintext encrypted under `>= e` distinct
/// moduli with the same small `e` lets the plaintext be recovered via CRT + integer
/// root, with no factoring required.
pub fn hastad(keys: &[RsaKey], ciphertexts: Option<&[BigUint]>) -> Option<BigUint> {
  let e = keys.first()?.e.to_u32()?;

  let (mut moduli, mut texts): (Vec<BigUint>, Vec<BigUint>) = match ciphertexts {
    Some(cs) => (keys.iter().map(|k| k.n.clone()).collect(), cs.to_vec()),
    None => {
      let mut moduli = Vec::new();
      let mut texts = Vec::new();
      for key in keys {
        if key.e.to_u32() != Some(e) {
          continue;
        }
        if let Some(pair) = key.texts.first() {
          if let Some(cipher) = &pair.cipher {
            if !moduli.contains(&key.n) && !texts.contains(cipher) {
              moduli.push(key.n.clone());
              texts.push(cipher.clone());
            }
          }
        }
      }
      (moduli, texts)
    }
  };

  if moduli.len() < e as usize {
    return None;
  }
  if moduli.len() > e as usize {
    moduli.truncate(e as usize);
    texts.truncate(e as usize);
  }

  let result = crt(&texts, &moduli);
  let (plaintext, exact) = iroot(&result, e);
  if exact {
    Some(plaintext)
  } else {
    None
  }
}

/// Boneh-DeMillo-Lipton faulty-CRT-signature attack: a single bit-flipped CRT
/// signature (or two signatures of the same unknown message) leaks a factor of `n`
/// via a gcd.
pub fn faulty(key: &RsaKey, padding: Option<fn(&BigUint) -> BigUint>) -> Option<RsaKey> {
  let e_u32 = key.e.to_u32()?;

  for pair in &key.texts {
    if let (Some(cipher), Some(plain)) = (&pair.cipher, &pair.plain) {
      let message = match padding {
        Some(f) => f(plain),
        None => plain.clone(),
      };
      // Deliberately NOT reduced mod n: a faulty CRT half only matches `message`
      // mod one of the two factors, so the full power must stay unreduced.
      let full_power = cipher.pow(e_u32);
      let diff = signed_abs_diff(&full_power, &message);
      let p = gcd(&diff, &key.n);
      if p != BigUint::one() && &p != &key.n {
        log::debug!("faulty signature leaked factor {}", hex::encode(p.to_bytes_be()));
        let q = &key.n / &p;
        if let Ok(mut new_key) =
          RsaKey::new_private_from_pq(key.n.clone(), key.e.clone(), p, q, format!("{}-private", key.identifier))
        {
          new_key.texts = key.texts.clone();
          return Some(new_key);
        }
      }
    }
  }

  let signatures: Vec<&BigUint> = key.texts.iter().filter_map(|t| t.cipher.as_ref()).collect();
  for i in 0..signatures.len() {
    for j in (i + 1)..signatures.len() {
      let diff = signed_abs_diff(signatures[i], signatures[j]);
      let p = gcd(&diff, &key.n);
      if p != BigUint::one() && &p != &key.n {
        let q = &key.n / &p;
        if let Ok(mut new_key) =
          RsaKey::new_private_from_pq(key.n.clone(), key.e.clone(), p, q, format!("{}-private", key.identifier))
        {
          new_key.texts = key.texts.clone();
          return Some(new_key);
        }
      }
    }
  }
  None
}

fn signed_abs_diff(a: &BigUint, b: &BigUint) -> BigUint {
  let diff = BigInt::from(a.clone()) - BigInt::from(b.clone());
  diff.magnitude().clone()
}

/// Decrypt a single ciphertext given an oracle that returns the least-significant
/// bit (parity) of the corresponding plaintext, via binary search over `[0, n)`.
pub fn parity(key: &RsaKey, ciphertext: &BigUint, oracle: &mut dyn FnMut(&BigUint) -> bool) -> BigUint {
  let two_encrypted = key.encrypt(&BigUint::from(2u32));
  let mut cipher = ciphertext.clone();
  let mut numerator = BigUint::zero();
  let mut denominator = BigUint::one();
  let mut lower_bound = BigUint::zero();
  let mut upper_bound = key.n.clone();

  while &lower_bound + BigUint::one() < upper_bound {
    cipher = (&two_encrypted * &cipher) % &key.n;
    denominator *= 2u32;
    numerator *= 2u32;

    if oracle(&cipher) {
      numerator += BigUint::one();
    }
    lower_bound = (&key.n * &numerator) / &denominator;
    upper_bound = (&key.n * (&numerator + BigUint::one())) / &denominator;
  }
  log::debug!("parity oracle converged to {}", hex::encode(upper_bound.to_bytes_be()));
  upper_bound
}

/// Which blinding oracle is available: a signing oracle (blind a plaintext, sign,
/// unblind) or a decryption oracle (blind a ciphertext, decrypt, unblind).
pub enum BlindingOracle<'a> {
  Signing(&'a mut dyn FnMut(&BigUint) -> Option<BigUint>),
  Decryption(&'a mut dyn FnMut(&BigUint) -> Option<BigUint>),
}

/// RSA blinding: recover a signature or plaintext from an oracle that refuses to
/// operate on the exact value requested, by multiplicatively blinding it first.
pub fn blinding(key: &mut RsaKey, oracle: BlindingOracle, rng: &mut impl RngCore) -> Result<HashMap<usize, BigUint>> {
  let mut recovered = HashMap::new();
  let low = BigUint::from(2u32);
  let high = BigUint::from(100u32);

  match oracle {
    BlindingOracle::Signing(sign) => {
      for idx in 0..key.texts.len() {
        let (plain, has_cipher) = (key.texts[idx].plain.clone(), key.texts[idx].cipher.is_some());
        if let (Some(plain), false) = (plain, has_cipher) {
          let blind = random_in_range(rng, &low, &high);
          let blind_enc = key.encrypt(&blind);
          let blinded_plaintext = (&plain * &blind_enc) % &key.n;
          let blinded_signature = sign(&blinded_plaintext)
            .ok_or_else(|| CryptoAttackError::AttackFailed("signing oracle refused the blinded plaintext".into()))?;
          let blind_inv = inv_mod(&blind, &key.n)
            .ok_or_else(|| CryptoAttackError::InvalidKey("blinding factor not invertible mod n".into()))?;
          let signature = (&blind_inv * &blinded_signature) % &key.n;
          key.texts[idx].cipher = Some(signature.clone());
          recovered.insert(idx, signature);
        }
      }
    }
    BlindingOracle::Decryption(decrypt) => {
      for idx in 0..key.texts.len() {
        let (cipher, has_plain) = (key.texts[idx].cipher.clone(), key.texts[idx].plain.is_some());
        if let (Some(cipher), false) = (cipher, has_plain) {
          let blind = random_in_range(rng, &low, &high);
          let blind_enc = key.encrypt(&blind);
          let blinded_ciphertext = (&cipher * &blind_enc) % &key.n;
          let blinded_plaintext = decrypt(&blinded_ciphertext)
            .ok_or_else(|| CryptoAttackError::AttackFailed("decryption oracle refused the blinded ciphertext".into()))?;
          let blind_inv = inv_mod(&blind, &key.n)
            .ok_or_else(|| CryptoAttackError::InvalidKey("blinding factor not invertible mod n".into()))?;
          let plaintext = (&blind_inv * &blinded_plaintext) % &key.n;
          key.texts[idx].plain = Some(plaintext.clone());
          recovered.insert(idx, plaintext);
        }
      }
    }
  }
  Ok(recovered)
}

/// Where the verifier's leftover garbage bytes end up in a forged PKCS#1 v1.5
/// signature, depending on how sloppy its `00 01 ff...ff 00 ASN.1 HASH` check is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarbagePosition {
  /// `00 01 ff 00 ASN.1 HASH <garbage>` — the verifier only checks a prefix.
  Suffix,
  /// `00 01 ff <garbage> 00 ASN.1 HASH` — the verifier only checks ends, and that
  /// no `00` byte appears inside the garbage run.
  Middle,
}

/// Radius searched around the exact integer `e`-th root when forging a suffix-garbage
/// signature; the root itself is rarely exactly right, but a nearby integer usually
/// still re-encrypts to a value sharing the needed prefix.
pub const BLEICHENBACHER_SUFFIX_DELTA_RADIUS: i64 = 5;

/// Bounded retry count for the middle-garbage variant's randomized prefix search.
pub const BLEICHENBACHER_MIDDLE_MAX_ATTEMPTS: u32 = 10_000;

/// Bleichenbacher's low-exponent signature forgery against a verifier that doesn't
/// fully validate the PKCS#1 v1.5 padding structure.
pub fn bleichenbacher_signature_forgery(
  key: &mut RsaKey,
  garbage: GarbagePosition,
  hash_algorithm: HashAlgorithm,
  rng: &mut impl RngCore,
) -> Result<HashMap<usize, BigUint>> {
  let size_bytes = (key.size / 8) as usize;
  let e = key
    .e
    .to_u32()
    .ok_or_else(|| CryptoAttackError::InvalidKey("e too large for this attack".into()))?;

  log::debug!("forging {} signature(s) for key {}", key.texts.len(), key.identifier);
  let mut signatures = HashMap::new();
  match garbage {
    GarbagePosition::Suffix => {
      for idx in 0..key.texts.len() {
        let (plain, has_cipher) = (key.texts[idx].plain.clone(), key.texts[idx].cipher.is_some());
        let Some(plain) = plain else { continue };
        if has_cipher {
          continue;
        }

        let message_bytes = i2b(&plain, None)?;
        let digest_info = hash_algorithm.digest_info(&message_bytes);
        let mut plaintext_prefix = vec![0x00u8, 0x01, 0xff, 0x00];
        plaintext_prefix.extend_from_slice(&digest_info);
        if plaintext_prefix.len() > size_bytes {
          return Err(CryptoAttackError::InvalidKey(
            "key is too small to hold this hash algorithm's DigestInfo".into(),
          ));
        }
        let mut plaintext_bytes = plaintext_prefix.clone();
        plaintext_bytes.resize(size_bytes, 0u8);
        let plaintext = b2i(&plaintext_bytes);

        let (root, _) = iroot(&plaintext, e);
        let mut found = None;
        for delta in -BLEICHENBACHER_SUFFIX_DELTA_RADIUS..BLEICHENBACHER_SUFFIX_DELTA_RADIUS {
          let candidate_int = BigInt::from(root.clone()) + BigInt::from(delta);
          let Some(candidate) = candidate_int.to_biguint() else { continue };
          let test = pow_mod(&candidate, &key.e, &key.n);
          let test_bytes = i2b(&test, Some(size_bytes))?;
          if test_bytes[..plaintext_prefix.len()] == plaintext_prefix[..] {
            found = Some(candidate);
            break;
          }
        }
        let signature = found.ok_or_else(|| {
          CryptoAttackError::AttackFailed(format!(
            "no signature matched within +/-{BLEICHENBACHER_SUFFIX_DELTA_RADIUS} of the exact root"
          ))
        })?;
        key.texts[idx].cipher = Some(signature.clone());
        signatures.insert(idx, signature);
      }
    }
    GarbagePosition::Middle => {
      for idx in 0..key.texts.len() {
        let (plain, has_cipher) = (key.texts[idx].plain.clone(), key.texts[idx].cipher.is_some());
        let Some(plain) = plain else { continue };
        if has_cipher {
          continue;
        }

        let message_bytes = i2b(&plain, None)?;
        let digest_info = hash_algorithm.digest_info(&message_bytes);
        let mut plaintext_suffix = vec![0x00u8];
        plaintext_suffix.extend_from_slice(&digest_info);
        if !b2i(&plaintext_suffix).bit(0) {
          return Err(CryptoAttackError::AttackFailed(
            "plaintext suffix is even, can't compute a cube-root-shaped signature".into(),
          ));
        }

        let suffix_bits = plaintext_suffix.len() * 8;
        let suffix_target = b2i(&plaintext_suffix);
        let mut signature_suffix = BigUint::one();
        for b in 0..suffix_bits {
          let bit_mask = BigUint::one() << b;
          if (&signature_suffix.pow(3) & &bit_mask) != (&suffix_target & &bit_mask) {
            signature_suffix |= &bit_mask;
          }
        }
        let signature_suffix_bytes = {
          let full = i2b(&signature_suffix, None)?;
          let start = full.len().saturating_sub(plaintext_suffix.len());
          full[start..].to_vec()
        };

        let mut forged = None;
        for _ in 0..BLEICHENBACHER_MIDDLE_MAX_ATTEMPTS {
          let mut plaintext_prefix = vec![0x00u8, 0x01, 0xff];
          let mut garbage_bytes = vec![0u8; size_bytes - 3];
          rng.fill_bytes(&mut garbage_bytes);
          plaintext_prefix.extend_from_slice(&garbage_bytes);

          let (signature_prefix_full, _) = iroot(&b2i(&plaintext_prefix), e);
          let signature_prefix_bytes = i2b(&signature_prefix_full, Some(size_bytes))?;
          let prefix_len = size_bytes - signature_suffix_bytes.len();
          let mut signature_bytes = signature_prefix_bytes[..prefix_len].to_vec();
          signature_bytes.extend_from_slice(&signature_suffix_bytes);
          let signature = b2i(&signature_bytes);

          let test_plaintext = i2b(&pow_mod(&signature, &key.e, &key.n), Some(size_bytes))?;
          let garbage_region = &test_plaintext[2..size_bytes - plaintext_suffix.len()];
          if garbage_region.contains(&0u8) {
            continue;
          }
          if test_plaintext[..3] == plaintext_prefix[..3]
            && test_plaintext[size_bytes - plaintext_suffix.len()..] == plaintext_suffix[..]
          {
            forged = Some(signature);
          }
          break;
        }

        let signature = forged.ok_or_else(|| {
          CryptoAttackError::AttackFailed("middle-garbage search did not converge on a valid signature".into())
        })?;
        key.texts[idx].cipher = Some(signature.clone());
        signatures.insert(idx, signature);
      }
    }
  }
  Ok(signatures)
}
