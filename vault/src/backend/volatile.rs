//! A backend that keeps shares in process memory.

use super::Backend;
use crate::Error;
use futures::future::{self, BoxFuture, FutureExt};
use scatter_sharing::{Kind, SecretId, Share, ShareId};
use std::{collections::HashMap, sync::Mutex};
use tracing::debug;

/// Stores shares in an in-memory map, discarded when the process exits.
pub struct Volatile {
    kind: Kind,
    name: String,
    shares: Mutex<HashMap<ShareId, Share>>,
}

impl Volatile {
    /// Creates an empty backend.
    ///
    /// `kind` is reported to placement (a volatile map may stand in for any class of
    /// backend in tests).
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            shares: Mutex::new(HashMap::new()),
        }
    }

    /// Number of shares held.
    pub fn len(&self) -> usize {
        self.shares.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards all shares.
    pub fn clear(&self) {
        let mut shares = self.shares.lock().unwrap();
        debug!(backend = %self.name, count = shares.len(), "clearing shares");
        shares.clear();
    }
}

impl Backend for Volatile {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> BoxFuture<'_, Result<(), Error>> {
        future::ready(Ok(())).boxed()
    }

    fn store(&self, share: Share) -> BoxFuture<'_, Result<(), Error>> {
        self.shares.lock().unwrap().insert(share.id, share);
        future::ready(Ok(())).boxed()
    }

    fn retrieve(&self, id: ShareId) -> BoxFuture<'_, Result<Option<Share>, Error>> {
        let share = self.shares.lock().unwrap().get(&id).cloned();
        future::ready(Ok(share)).boxed()
    }

    fn retrieve_by_secret(&self, secret: SecretId) -> BoxFuture<'_, Result<Vec<Share>, Error>> {
        let shares = self
            .shares
            .lock()
            .unwrap()
            .values()
            .filter(|share| share.secret == secret)
            .cloned()
            .collect();
        future::ready(Ok(shares)).boxed()
    }

    fn delete(&self, id: ShareId) -> BoxFuture<'_, Result<bool, Error>> {
        let removed = self.shares.lock().unwrap().remove(&id).is_some();
        future::ready(Ok(removed)).boxed()
    }
}
