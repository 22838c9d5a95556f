//! Bit-exact ASN.1 DigestInfo prefixes used by the Bleichenbacher signature forgery.

use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use sha2::Digest;

/// Hash algorithm selectable for a PKCS#1 v1.5 `DigestInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
  Md5,
  Sha1,
  Sha256,
  Sha384,
  Sha512,
}

impl HashAlgorithm {
  /// Literal ASN.1 `DigestInfo` prefix (everything before the raw digest bytes).
  pub const fn asn1_prefix(self) -> &'static [u8] {
    match self {
      Self::Md5 => &[
        0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x05, 0x05,
        0x00, 0x04, 0x10,
      ],
      Self::Sha1 => &[
        0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
      ],
      Self::Sha256 => &[
        0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
        0x05, 0x00, 0x04, 0x20,
      ],
      Self::Sha384 => &[
        0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02,
        0x05, 0x00, 0x04, 0x30,
      ],
      Self::Sha512 => &[
        0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03,
        0x05, 0x00, 0x04, 0x40,
      ],
    }
  }

  /// Hash `message` with this algorithm.
  pub fn digest(self, message: &[u8]) -> Vec<u8> {
    match self {
      Self::Md5 => Md5::digest(message).to_vec(),
      Self::Sha1 => Sha1::digest(message).to_vec(),
      Self::Sha256 => Sha256::digest(message).to_vec(),
      Self::Sha384 => Sha384::digest(message).to_vec(),
      Self::Sha512 => Sha512::digest(message).to_vec(),
    }
  }

  /// The full `DigestInfo`: ASN.1 prefix followed by the raw digest.
  pub fn digest_info(self, message: &[u8]) -> Vec<u8> {
    [self.asn1_prefix(), &self.digest(message)].concat()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sha1_digest_info_matches_known_vector() {
    let info = HashAlgorithm::Sha1.digest_info(b"hi mom");
    assert_eq!(&info[..15], HashAlgorithm::Sha1.asn1_prefix());
    assert_eq!(info.len(), 15 + 20);
  }

  #[test]
  fn each_prefix_has_the_length_the_digest_size_implies() {
    assert_eq!(HashAlgorithm::Md5.digest_info(b"x").len(), 18 + 16);
    assert_eq!(HashAlgorithm::Sha256.digest_info(b"x").len(), 19 + 32);
    assert_eq!(HashAlgorithm::Sha384.digest_info(b"x").len(), 19 + 48);
    assert_eq!(HashAlgorithm::Sha512.digest_info(b"x").len(), 19 + 64);
  }
}
