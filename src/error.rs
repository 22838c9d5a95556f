use std::fmt;

/// Error type shared by every fallible operation in this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum CryptoAttackError {
  /// Out-of-range size, non-block-multiple length, or inconsistent lengths between
  /// two values that are required to match.
  InvalidArgument(String),
  /// Contradictory `(n, p, q)` or a `d` not coprime to `(p-1)(q-1)`.
  InvalidKey(String),
  /// The padding oracle returned `false` for all 256 guesses at one position, with
  /// no `is_correct` fallback available.
  OracleExhausted,
  /// `is_correct=true` decrypt path found a padding length outside `[1, block_size]`.
  BadPadding(u64),
  /// The attack's search space was exhausted without finding a solution, in a case
  /// where the spec calls for an explicit error rather than an absent/empty result
  /// (the original scripting source looped forever instead).
  AttackFailed(String),
}

impl fmt::Display for CryptoAttackError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
      Self::InvalidKey(msg) => write!(f, "invalid key: {msg}"),
      Self::OracleExhausted => {
        write!(f, "oracle returned false for all 256 guesses at one position")
      }
      Self::BadPadding(value) => {
        write!(f, "padding value {value} is outside [1, block_size]")
      }
      Self::AttackFailed(msg) => write!(f, "attack failed: {msg}"),
    }
  }
}

impl std::error::Error for CryptoAttackError {}

pub type Result<T> = std::result::Result<T, CryptoAttackError>;
