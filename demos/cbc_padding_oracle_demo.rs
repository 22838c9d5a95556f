//! Recovers an AES-128-CBC plaintext using only a padding-valid/invalid oracle,
//! then forges a ciphertext for chosen plaintext under the same unknown key.
//!
//! Run with: cargo run --example cbc_padding_oracle_demo

use aes::{
  cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit},
  Aes128,
};

use crypto_attacks::bytes::{pkcs7_pad, pkcs7_validate};
use crypto_attacks::cbc::{decrypt, fake_ciphertext};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK_SIZE: usize = 16;
const KEY: [u8; 16] = *b"super secret key";

fn encrypt(plaintext: &[u8], iv: &[u8; 16]) -> Vec<u8> {
  Aes128CbcEnc::new(KEY.as_slice().into(), iv.as_slice().into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

fn padding_oracle(iv: &[u8], payload: &[u8]) -> bool {
  let mut buf = payload.to_vec();
  Aes128CbcDec::new(KEY.as_slice().into(), iv.into())
    .decrypt_padded_mut::<Pkcs7>(&mut buf)
    .is_ok()
}

fn main() {
  env_logger::init();

  let iv = [0x24u8; 16];
  let plaintext = b"attack at dawn, bring the usual crew";
  let ciphertext = encrypt(plaintext, &iv);

  let mut full = iv.to_vec();
  full.extend_from_slice(&ciphertext);

  let mut oracle = |iv: &[u8], payload: &[u8]| padding_oracle(iv, payload);
  let recovered = decrypt(&full, BLOCK_SIZE, None, true, 0, None, &mut oracle).expect("decrypt should succeed");
  let pad_len = pkcs7_validate(&recovered, BLOCK_SIZE as u8).expect("recovered plaintext should be padded");
  println!(
    "recovered plaintext: {:?}",
    String::from_utf8_lossy(&recovered[..recovered.len() - pad_len])
  );

  let forged_message = pkcs7_pad(b"stand down, abort", BLOCK_SIZE as u8);
  let mut oracle = |iv: &[u8], payload: &[u8]| padding_oracle(iv, payload);
  let forged = fake_ciphertext(&forged_message, BLOCK_SIZE, None, None, None, &mut oracle).expect("forgery should succeed");

  let (forged_iv, forged_ct) = forged.split_at(BLOCK_SIZE);
  let mut buf = forged_ct.to_vec();
  let recovered_forgery = Aes128CbcDec::new(KEY.as_slice().into(), forged_iv.into())
    .decrypt_padded_mut::<Pkcs7>(&mut buf)
    .expect("forged ciphertext should decrypt cleanly under the same key");
  println!("forged plaintext: {:?}", String::from_utf8_lossy(recovered_forgery));
}
