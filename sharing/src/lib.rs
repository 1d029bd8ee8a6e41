//! Split secrets into shares over GF(2^8) and reconstruct them from any threshold.
//!
//! A secret of `L` bytes is split into `N` shares of `L` bytes each. Any `K` of
//! them reconstruct the secret exactly, while any `K - 1` reveal nothing about it
//! (every byte of every share is an evaluation of a fresh, uniformly random
//! polynomial of degree `K - 1` whose constant term is the corresponding secret
//! byte).
//!
//! # Example
//!
//! ```rust
//! use scatter_sharing::{reconstruct, split, Config};
//! use rand::rngs::OsRng;
//!
//! // Require 3 of 5 shares
//! let config = Config::new(3, 5).unwrap();
//!
//! // Split the secret
//! let secret = b"correct horse battery staple";
//! let shares = split(&mut OsRng, &config, secret, 0).unwrap();
//!
//! // Any 3 shares recover it
//! let recovered = reconstruct(&shares[2..]).unwrap();
//! assert_eq!(recovered, secret);
//!
//! // 2 shares are not enough
//! assert!(reconstruct(&shares[..2]).is_err());
//! ```

pub mod field;
pub mod poly;
mod reconstruct;
pub mod share;
mod split;

pub use reconstruct::reconstruct;
pub use share::{Checksum, Kind, Location, SecretId, Share, ShareId};
pub use split::{split, Config};
use thiserror::Error;

/// The smallest threshold that protects a secret.
pub const MIN_THRESHOLD: u8 = 2;

/// The largest number of shares a secret can be split into (one per non-zero field element).
pub const MAX_SHARES: usize = 255;

/// Errors that can occur when splitting or reconstructing a secret.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid threshold: {0} of {1}")]
    InvalidThreshold(usize, usize),
    #[error("insecure random source")]
    InsecureRandomSource,
    #[error("division by zero")]
    DivisionByZero,
    #[error("insufficient shares: {0}/{1}")]
    InsufficientShares(usize, usize),
    #[error("mismatched share length")]
    MismatchedShareLength,
    #[error("duplicate index: {0}")]
    DuplicateIndex(u8),
    #[error("invalid index: {0}")]
    InvalidIndex(u8),
    #[error("shares belong to different secrets")]
    MismatchedSecret,
    #[error("integrity check failed for index {0}")]
    Integrity(u8),
}
