//! Backends that misbehave on purpose.

use super::{Backend, Volatile};
use crate::Error;
use futures::future::{self, BoxFuture, FutureExt};
use scatter_sharing::{Kind, SecretId, Share, ShareId};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A backend that fails every operation.
pub struct Unavailable {
    kind: Kind,
    name: String,
}

impl Unavailable {
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    fn error(&self) -> Error {
        Error::Storage(format!("{} unavailable", self.name))
    }
}

impl Backend for Unavailable {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> BoxFuture<'_, Result<(), Error>> {
        future::ready(Err(self.error())).boxed()
    }

    fn store(&self, _: Share) -> BoxFuture<'_, Result<(), Error>> {
        future::ready(Err(self.error())).boxed()
    }

    fn retrieve(&self, _: ShareId) -> BoxFuture<'_, Result<Option<Share>, Error>> {
        future::ready(Err(self.error())).boxed()
    }

    fn retrieve_by_secret(&self, _: SecretId) -> BoxFuture<'_, Result<Vec<Share>, Error>> {
        future::ready(Err(self.error())).boxed()
    }

    fn delete(&self, _: ShareId) -> BoxFuture<'_, Result<bool, Error>> {
        future::ready(Err(self.error())).boxed()
    }
}

/// A [Volatile] backend whose first `failures` stores fail.
pub struct Flaky {
    inner: Volatile,
    failures: AtomicUsize,
}

impl Flaky {
    pub fn new(kind: Kind, name: impl Into<String>, failures: usize) -> Self {
        Self {
            inner: Volatile::new(kind, name),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Backend for Flaky {
    fn kind(&self) -> Kind {
        self.inner.kind()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn init(&self) -> BoxFuture<'_, Result<(), Error>> {
        self.inner.init()
    }

    fn store(&self, share: Share) -> BoxFuture<'_, Result<(), Error>> {
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            let error = Error::Storage(format!("{} rejected share {}", self.name(), share.index));
            return future::ready(Err(error)).boxed();
        }
        self.inner.store(share)
    }

    fn retrieve(&self, id: ShareId) -> BoxFuture<'_, Result<Option<Share>, Error>> {
        self.inner.retrieve(id)
    }

    fn retrieve_by_secret(&self, secret: SecretId) -> BoxFuture<'_, Result<Vec<Share>, Error>> {
        self.inner.retrieve_by_secret(secret)
    }

    fn delete(&self, id: ShareId) -> BoxFuture<'_, Result<bool, Error>> {
        self.inner.delete(id)
    }
}

/// A [Volatile] backend whose share listings never complete.
pub struct Stalled {
    inner: Volatile,
}

impl Stalled {
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            inner: Volatile::new(kind, name),
        }
    }
}

impl Backend for Stalled {
    fn kind(&self) -> Kind {
        self.inner.kind()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn init(&self) -> BoxFuture<'_, Result<(), Error>> {
        self.inner.init()
    }

    fn store(&self, share: Share) -> BoxFuture<'_, Result<(), Error>> {
        self.inner.store(share)
    }

    fn retrieve(&self, id: ShareId) -> BoxFuture<'_, Result<Option<Share>, Error>> {
        self.inner.retrieve(id)
    }

    fn retrieve_by_secret(&self, _: SecretId) -> BoxFuture<'_, Result<Vec<Share>, Error>> {
        future::pending().boxed()
    }

    fn delete(&self, id: ShareId) -> BoxFuture<'_, Result<bool, Error>> {
        self.inner.delete(id)
    }
}
