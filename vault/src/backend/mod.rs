//! Storage for individual shares.
//!
//! A [Backend] stores, retrieves and deletes shares by [ShareId] and can list every share it
//! holds for a given [SecretId]. The coordinator and recovery manager only interact with
//! backends through this trait (as `Arc<dyn Backend>`), so remote backends plug in by
//! implementing it with [Kind::Remote].
//!
//! Backends are not trusted to return valid shares: everything read back is verified before
//! it is used.

use crate::Error;
use futures::future::BoxFuture;
use scatter_sharing::{Kind, Location, SecretId, Share, ShareId};

pub mod durable;
pub use durable::Durable;
pub mod session;
pub use session::{Session, SessionBackend};
pub mod volatile;
pub use volatile::Volatile;

#[cfg(test)]
pub mod mocks;

/// Interface for a store of shares.
///
/// Implementations guard their own state and may be called concurrently.
pub trait Backend: Send + Sync + 'static {
    /// The durability class of the backend.
    fn kind(&self) -> Kind;

    /// A name that uniquely identifies this backend among those an engine uses.
    fn name(&self) -> &str;

    /// Describes where `share` is stored once placed on this backend.
    fn locate(&self, share: &ShareId) -> Location {
        let _ = share;
        Location::new(self.kind(), self.name())
    }

    /// Prepares the backend for use (for example, by loading any persisted state).
    ///
    /// Calling `init` more than once is allowed.
    fn init(&self) -> BoxFuture<'_, Result<(), Error>>;

    /// Stores `share`, replacing any share with the same [ShareId].
    fn store(&self, share: Share) -> BoxFuture<'_, Result<(), Error>>;

    /// Retrieves the share with the given [ShareId], if present.
    fn retrieve(&self, id: ShareId) -> BoxFuture<'_, Result<Option<Share>, Error>>;

    /// Retrieves all shares of the secret with the given [SecretId].
    fn retrieve_by_secret(&self, secret: SecretId) -> BoxFuture<'_, Result<Vec<Share>, Error>>;

    /// Deletes the share with the given [ShareId], returning whether it was present.
    fn delete(&self, id: ShareId) -> BoxFuture<'_, Result<bool, Error>>;
}
