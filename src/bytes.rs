//! Byte <-> integer substrate: block chunking, XOR, big-endian conversion, PKCS#7 padding.

use num_bigint::BigUint;

use crate::error::{CryptoAttackError, Result};

/// Partition `data` into `ceil(|data| / block_size)` blocks; the last block may be shorter.
pub fn chunks(data: &[u8], block_size: usize) -> Vec<&[u8]> {
  if data.is_empty() {
    return Vec::new();
  }
  data.chunks(block_size).collect()
}

/// XOR `a` against `b`, cyclically extending whichever operand is shorter to the
/// length of the longer one. A single-byte operand acts as a mask broadcast across
/// the other operand's length, which falls out of this rule automatically.
pub fn xor_cyclic(a: &[u8], b: &[u8]) -> Vec<u8> {
  let len = a.len().max(b.len());
  (0..len)
    .map(|i| {
      let av = if a.is_empty() { 0 } else { a[i % a.len()] };
      let bv = if b.is_empty() { 0 } else { b[i % b.len()] };
      av ^ bv
    })
    .collect()
}

/// Variadic XOR over more than two byte strings, folded pairwise via [`xor_cyclic`].
pub fn xor_many(operands: &[&[u8]]) -> Vec<u8> {
  match operands.split_first() {
    None => Vec::new(),
    Some((first, rest)) => rest
      .iter()
      .fold(first.to_vec(), |acc, &next| xor_cyclic(&acc, next)),
  }
}

/// Big-endian byte string to unsigned integer.
pub fn b2i(bytes: &[u8]) -> BigUint {
  BigUint::from_bytes_be(bytes)
}

/// Unsigned integer to big-endian byte string, left-padded with `0x00` to `size`
/// bytes when given. Errors if `value` doesn't fit in `size` bytes.
pub fn i2b(value: &BigUint, size: Option<usize>) -> Result<Vec<u8>> {
  let raw = value.to_bytes_be();
  match size {
    None => Ok(raw),
    Some(size) => {
      if raw.len() > size {
        return Err(CryptoAttackError::InvalidArgument(format!(
          "value needs {} bytes, size requested is {}",
          raw.len(),
          size
        )));
      }
      let mut padded = vec![0u8; size - raw.len()];
      padded.extend_from_slice(&raw);
      Ok(padded)
    }
  }
}

/// Append `k` bytes of value `k` so the result is a multiple of `block_size`,
/// where `k in [1, block_size]` (always at least one byte of padding).
pub fn pkcs7_pad(data: &[u8], block_size: u8) -> Vec<u8> {
  let block_size = block_size as usize;
  let remainder = data.len() % block_size;
  let pad_len = block_size - remainder;
  let mut out = data.to_vec();
  out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
  out
}

/// Validate PKCS#7 padding and return the padding length on success.
pub fn pkcs7_validate(data: &[u8], block_size: u8) -> Result<usize> {
  let bad = || CryptoAttackError::InvalidArgument("invalid PKCS#7 padding".into());
  let &pad_len = data.last().ok_or_else(bad)?;
  if pad_len == 0 || pad_len > block_size {
    return Err(bad());
  }
  let start = data.len().checked_sub(pad_len as usize).ok_or_else(bad)?;
  if data[start..].iter().any(|&b| b != pad_len) {
    return Err(bad());
  }
  Ok(pad_len as usize)
}
