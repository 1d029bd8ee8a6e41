//! A backend whose shares live only as long as a [Session].
//!
//! A [Session] is an exclusive handle: ending it (explicitly with [Session::end] or by
//! dropping it) discards every share stored through its [SessionBackend]s, after which
//! all of their operations fail with [Error::SessionEnded].

use super::Backend;
use crate::Error;
use futures::future::{self, BoxFuture, FutureExt};
use scatter_sharing::{Kind, SecretId, Share, ShareId};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// Shares held by a session (`None` once the session has ended).
type State = Arc<Mutex<Option<HashMap<ShareId, Share>>>>;

/// Handle controlling the lifetime of session-scoped shares.
pub struct Session {
    name: String,
    state: State,
}

impl Session {
    /// Starts a new session.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(Some(HashMap::new()))),
        }
    }

    /// Returns a backend that stores shares in this session.
    pub fn backend(&self) -> SessionBackend {
        SessionBackend {
            name: self.name.clone(),
            state: self.state.clone(),
        }
    }

    /// Ends the session, discarding all of its shares.
    pub fn end(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        if let Some(shares) = state.take() {
            debug!(session = %self.name, count = shares.len(), "session ended");
        }
    }
}

/// Stores shares for the lifetime of a [Session].
#[derive(Clone)]
pub struct SessionBackend {
    name: String,
    state: State,
}

impl SessionBackend {
    /// Runs `f` over the session's shares, failing if the session has ended.
    fn with<T>(&self, f: impl FnOnce(&mut HashMap<ShareId, Share>) -> T) -> Result<T, Error> {
        let mut state = self.state.lock().unwrap();
        let shares = state.as_mut().ok_or(Error::SessionEnded)?;
        Ok(f(shares))
    }

    /// Returns true while the session is active.
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().is_some()
    }
}

impl Backend for SessionBackend {
    fn kind(&self) -> Kind {
        Kind::Session
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> BoxFuture<'_, Result<(), Error>> {
        future::ready(self.with(|_| ())).boxed()
    }

    fn store(&self, share: Share) -> BoxFuture<'_, Result<(), Error>> {
        let result = self.with(|shares| {
            shares.insert(share.id, share);
        });
        future::ready(result).boxed()
    }

    fn retrieve(&self, id: ShareId) -> BoxFuture<'_, Result<Option<Share>, Error>> {
        future::ready(self.with(|shares| shares.get(&id).cloned())).boxed()
    }

    fn retrieve_by_secret(&self, secret: SecretId) -> BoxFuture<'_, Result<Vec<Share>, Error>> {
        let result = self.with(|shares| {
            shares
                .values()
                .filter(|share| share.secret == secret)
                .cloned()
                .collect()
        });
        future::ready(result).boxed()
    }

    fn delete(&self, id: ShareId) -> BoxFuture<'_, Result<bool, Error>> {
        future::ready(self.with(|shares| shares.remove(&id).is_some())).boxed()
    }
}
