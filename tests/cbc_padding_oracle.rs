//! Integration tests for the CBC padding-oracle engine against a *real*
//! AES-128-CBC cipher (RustCrypto `aes`/`cbc`, dev-dependencies only — the engine
//! under test never implements a block cipher itself).

use aes::{
  cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit},
  Aes128,
};

use crypto_attacks::bytes::{pkcs7_pad, pkcs7_validate};
use crypto_attacks::cbc::{decrypt, fake_ciphertext};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK_SIZE: usize = 16;
const KEY: [u8; 16] = [0x42; 16];

fn encrypt(plaintext: &[u8], iv: &[u8; 16]) -> Vec<u8> {
  Aes128CbcEnc::new(KEY.as_slice().into(), iv.as_slice().into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Real padding-valid/invalid oracle: attempts AES-128-CBC decryption + PKCS#7
/// unpadding under a fixed server-side key, reporting only whether it succeeded.
fn oracle(iv: &[u8], payload: &[u8]) -> bool {
  let mut buf = payload.to_vec();
  Aes128CbcDec::new(KEY.as_slice().into(), iv.into())
    .decrypt_padded_mut::<Pkcs7>(&mut buf)
    .is_ok()
}

#[test]
fn decrypts_two_block_message_via_real_aes_cbc_oracle() {
  let _ = env_logger::builder().is_test(true).try_init();

  let iv = [0x24u8; 16];
  let plaintext = b"YELLOW SUBMARINEYELLOW SUBMARINE";
  let ciphertext = encrypt(plaintext, &iv);

  let mut full = iv.to_vec();
  full.extend_from_slice(&ciphertext);

  let mut call_oracle = |iv: &[u8], payload: &[u8]| oracle(iv, payload);
  let recovered = decrypt(&full, BLOCK_SIZE, None, true, 0, None, &mut call_oracle).unwrap();

  let pad_len = pkcs7_validate(&recovered, BLOCK_SIZE as u8).unwrap();
  assert_eq!(&recovered[..recovered.len() - pad_len], plaintext.as_slice());
}

#[test]
fn decrypts_message_that_is_exactly_one_block_long() {
  let iv = [0x11u8; 16];
  let plaintext = b"short message!!!"; // 16 bytes, forces a full extra padding block
  let ciphertext = encrypt(plaintext, &iv);

  let mut full = iv.to_vec();
  full.extend_from_slice(&ciphertext);

  let mut call_oracle = |iv: &[u8], payload: &[u8]| oracle(iv, payload);
  let recovered = decrypt(&full, BLOCK_SIZE, None, true, 0, None, &mut call_oracle).unwrap();

  let pad_len = pkcs7_validate(&recovered, BLOCK_SIZE as u8).unwrap();
  assert_eq!(&recovered[..recovered.len() - pad_len], plaintext.as_slice());
}

#[test]
fn decrypts_only_the_last_block_when_amount_is_given() {
  let iv = [0x33u8; 16];
  let plaintext = b"0123456789ABCDEFGHIJ"; // 20 bytes: one full block + 4 bytes
  let ciphertext = encrypt(plaintext, &iv);

  let mut full = iv.to_vec();
  full.extend_from_slice(&ciphertext);

  let mut call_oracle = |iv: &[u8], payload: &[u8]| oracle(iv, payload);
  let recovered = decrypt(&full, BLOCK_SIZE, None, true, 1, None, &mut call_oracle).unwrap();

  // Only the last data block comes back: the trailing 4 real bytes plus the
  // 12-byte PKCS#7 pad that filled out that block.
  assert_eq!(recovered.len(), BLOCK_SIZE);
  assert_eq!(&recovered[..4], &plaintext[16..20]);
  assert_eq!(&recovered[4..], &[12u8; 12]);
}

#[test]
fn fake_ciphertext_forges_chosen_plaintext() {
  let new_plaintext = pkcs7_pad(b"evil plaintext!", BLOCK_SIZE as u8);
  assert_eq!(new_plaintext.len(), BLOCK_SIZE);

  let mut call_oracle = |iv: &[u8], payload: &[u8]| oracle(iv, payload);
  let forged = fake_ciphertext(&new_plaintext, BLOCK_SIZE, None, None, None, &mut call_oracle).unwrap();

  let (forged_iv, forged_ct) = forged.split_at(BLOCK_SIZE);
  let mut buf = forged_ct.to_vec();
  let recovered = Aes128CbcDec::new(KEY.as_slice().into(), forged_iv.into())
    .decrypt_padded_mut::<Pkcs7>(&mut buf)
    .unwrap();

  assert_eq!(recovered, b"evil plaintext!");
}
