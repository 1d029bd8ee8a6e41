//! Distribute the shares of a secret across independent storage backends and recover it.
//!
//! A secret is split (with [scatter_sharing]) into `N` shares, any `K` of which reconstruct
//! it. The [coordinator::Coordinator] places those shares on a set of [backend::Backend]s so
//! that no single backend holds enough of them to reconstruct the secret (or, if lost, to
//! prevent its reconstruction). The caller retains only a [RecoveryInfo], which the
//! [recovery::Recovery] manager uses to collect `K` valid shares from whichever backends
//! still hold them.
//!
//! [engine::Engine] wires these components together around a runtime context and a
//! cryptographically secure random number generator.
//!
//! # Example
//!
//! ```rust
//! use commonware_runtime::{deterministic, Runner};
//! use rand::{rngs::StdRng, SeedableRng};
//! use scatter_vault::{backend::{Backend, Volatile}, engine::{Config, Engine}};
//! use scatter_sharing::Kind;
//! use std::sync::Arc;
//!
//! let executor = deterministic::Runner::default();
//! executor.start(|context| async move {
//!     // Create three independent backends
//!     let backends: Vec<Arc<dyn Backend>> = (0..3)
//!         .map(|i| Arc::new(Volatile::new(Kind::Volatile, format!("memory-{i}"))) as Arc<dyn Backend>)
//!         .collect();
//!
//!     // Protect a secret with 2-of-3 sharing
//!     let mut engine = Engine::new(
//!         context,
//!         StdRng::seed_from_u64(0),
//!         backends,
//!         Config::new(2, 3),
//!     ).unwrap();
//!     let info = engine.protect_str("hunter2").await.unwrap();
//!
//!     // Recover it
//!     assert_eq!(engine.recover_string(&info).await.unwrap(), "hunter2");
//! });
//! ```

pub mod backend;
pub mod coordinator;
pub mod engine;
pub mod placement;
pub mod recovery;
mod types;

pub use types::{Assignment, Distribution, Outcome, RecoveryInfo};

use thiserror::Error;

/// Errors that can occur when distributing or recovering a secret.
#[derive(Error, Debug)]
pub enum Error {
    #[error("sharing error: {0}")]
    Sharing(#[from] scatter_sharing::Error),
    #[error("runtime error: {0}")]
    Runtime(#[from] commonware_runtime::Error),
    #[error("codec error: {0}")]
    Codec(#[from] commonware_codec::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("session ended")]
    SessionEnded,
    #[error("insufficient successful writes: {stored}/{required}")]
    InsufficientSuccessfulWrites {
        stored: usize,
        required: usize,
        distribution: Box<Distribution>,
    },
    #[error("insufficient valid shares: {0}/{1}")]
    InsufficientValidShares(usize, usize),
    #[error("invalid shares: {0}")]
    InvalidShares(&'static str),
    #[error("no backends")]
    NoBackends,
    #[error("duplicate backend: {0}")]
    DuplicateBackend(String),
    #[error("invalid utf-8")]
    InvalidUtf8,
}
