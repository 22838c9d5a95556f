//! Arbitrary-precision integer substrate: modular exponentiation, gcd/modinv, CRT,
//! integer roots, and the continued-fraction machinery Wiener's attack needs.

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::{Integer, Roots};
use num_traits::{One, Signed, Zero};
use rand::RngCore;

/// `base^exp mod modulus`, via `BigUint::modpow` (square-and-multiply under the hood).
/// Kept as a thin named wrapper so call sites read like the spec's contract list.
pub fn pow_mod(base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
  base.modpow(exp, modulus)
}

/// Greatest common divisor, via `num_integer::Integer::gcd`.
pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
  a.gcd(b)
}

/// Extended Euclidean algorithm: returns `(s, t, g)` with `s*a + t*b == g == gcd(a, b)`.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
  let (mut old_r, mut r) = (a.clone(), b.clone());
  let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
  let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

  while !r.is_zero() {
    let q = &old_r / &r;
    (old_r, r) = (r.clone(), old_r - &q * &r);
    (old_s, s) = (s.clone(), old_s - &q * &s);
    (old_t, t) = (t.clone(), old_t - &q * &t);
  }
  (old_s, old_t, old_r)
}

/// Modular inverse of `a` mod `m`. Returns `None` if `a` and `m` are not coprime.
pub fn inv_mod(a: &BigUint, m: &BigUint) -> Option<BigUint> {
  let m_signed = BigInt::from_biguint(Sign::Plus, m.clone());
  let a_signed = BigInt::from_biguint(Sign::Plus, a.clone());
  let (x, _, g) = extended_gcd(&a_signed, &m_signed);
  if g.abs() != BigInt::one() {
    return None;
  }
  let inverse = ((x % &m_signed) + &m_signed) % &m_signed;
  inverse.to_biguint()
}

/// Chinese Remainder Theorem: given pairwise-coprime `moduli` and `residues`,
/// reconstruct the unique residue modulo their product.
pub fn crt(residues: &[BigUint], moduli: &[BigUint]) -> BigUint {
  assert_eq!(residues.len(), moduli.len(), "crt: mismatched slice lengths");
  let product: BigUint = moduli.iter().product();
  let mut sum = BigUint::zero();
  for (residue, modulus) in residues.iter().zip(moduli.iter()) {
    let partial = &product / modulus;
    let inverse = inv_mod(&partial, modulus).expect("crt: moduli must be pairwise coprime");
    sum += residue * &partial * inverse;
  }
  sum % product
}

/// Floor integer `n`-th root of `x`, plus whether it is exact. Binary search, the
/// same shape as the teacher's `cbrt` generalized from a fixed cube to arbitrary `n`.
pub fn iroot(x: &BigUint, n: u32) -> (BigUint, bool) {
  if x.is_zero() {
    return (BigUint::zero(), true);
  }
  if n == 1 {
    return (x.clone(), true);
  }
  let mut low = BigUint::one();
  let mut high = x.clone();
  while &low < &high {
    let mid = (&low + &high + BigUint::one()) >> 1;
    if mid.pow(n) <= *x {
      low = mid;
    } else {
      high = &mid - BigUint::one();
    }
  }
  let exact = low.pow(n) == *x;
  (low, exact)
}

/// Floor integer square root, via `num_integer::Roots::sqrt`.
pub fn isqrt(x: &BigUint) -> BigUint {
  x.sqrt()
}

/// Largest `v` such that `2^v` divides `x` (trailing zero count, 0 for `x == 0`).
pub fn power_of_two(x: &BigUint) -> u64 {
  if x.is_zero() {
    return 0;
  }
  x.trailing_zeros().unwrap_or(0)
}

/// Finite continued-fraction expansion of `a / b` (partial quotients), via the
/// Euclidean algorithm.
pub fn continued_fractions(a: &BigUint, b: &BigUint) -> Vec<BigUint> {
  let (mut a, mut b) = (a.clone(), b.clone());
  let mut terms = Vec::new();
  while !b.is_zero() {
    let (q, r) = (&a / &b, &a % &b);
    terms.push(q);
    a = b;
    b = r;
  }
  terms
}

/// Successive convergents `(h_k, k_k)` of a continued fraction's partial quotients.
pub fn convergents(cf: &[BigUint]) -> Vec<(BigUint, BigUint)> {
  let mut result = Vec::with_capacity(cf.len());
  let (mut h_prev2, mut h_prev1) = (BigUint::zero(), BigUint::one());
  let (mut k_prev2, mut k_prev1) = (BigUint::one(), BigUint::zero());
  for a in cf {
    let h = a * &h_prev1 + &h_prev2;
    let k = a * &k_prev1 + &k_prev2;
    result.push((h.clone(), k.clone()));
    h_prev2 = h_prev1;
    h_prev1 = h;
    k_prev2 = k_prev1;
    k_prev1 = k;
  }
  result
}

/// Uniform random integer in `[lo, hi]` (inclusive), using an injected RNG.
pub fn random_in_range(rng: &mut impl RngCore, lo: &BigUint, hi: &BigUint) -> BigUint {
  rng.gen_biguint_range(lo, &(hi + BigUint::one()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pow_mod_matches_naive() {
    let base = BigUint::from(7u32);
    let exp = BigUint::from(13u32);
    let modulus = BigUint::from(97u32);
    assert_eq!(pow_mod(&base, &exp, &modulus), BigUint::from(61u32));
  }

  #[test]
  fn inv_mod_simple() {
    let a = BigUint::from(3u32);
    let m = BigUint::from(7u32);
    assert_eq!(inv_mod(&a, &m), Some(BigUint::from(5u32)));
  }

  #[test]
  fn inv_mod_none_when_not_coprime() {
    let a = BigUint::from(2u32);
    let m = BigUint::from(4u32);
    assert_eq!(inv_mod(&a, &m), None);
  }

  #[test]
  fn crt_reconstructs_residue() {
    let residues = vec![BigUint::from(2u32), BigUint::from(3u32), BigUint::from(2u32)];
    let moduli = vec![BigUint::from(3u32), BigUint::from(5u32), BigUint::from(7u32)];
    // x = 23 mod 105 satisfies x%3==2, x%5==3, x%7==2
    assert_eq!(crt(&residues, &moduli), BigUint::from(23u32));
  }

  #[test]
  fn iroot_exact_cube() {
    let n = BigUint::from(1_000_000_000u64);
    let (root, exact) = iroot(&n, 3);
    assert!(exact);
    assert_eq!(root, BigUint::from(1000u32));
  }

  #[test]
  fn iroot_floors_inexact_root() {
    let n = BigUint::from(1000u32);
    let (root, exact) = iroot(&n, 3);
    assert!(!exact);
    assert_eq!(root, BigUint::from(9u32)); // 9^3 = 729 <= 1000 < 1000 = 10^3
  }

  #[test]
  fn isqrt_of_perfect_square() {
    assert_eq!(isqrt(&BigUint::from(144u32)), BigUint::from(12u32));
  }

  #[test]
  fn power_of_two_counts_trailing_zero_bits() {
    assert_eq!(power_of_two(&BigUint::from(96u32)), 5); // 96 = 3 * 2^5
    assert_eq!(power_of_two(&BigUint::from(1u32)), 0);
  }

  #[test]
  fn convergents_approximate_continued_fraction() {
    let cf = continued_fractions(&BigUint::from(649u32), &BigUint::from(200u32));
    let conv = convergents(&cf);
    let (h, k) = conv.last().unwrap();
    assert_eq!(h, &BigUint::from(649u32));
    assert_eq!(k, &BigUint::from(200u32));
  }
}
