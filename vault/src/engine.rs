//! Protect secrets by splitting them across backends and recover them later.
//!
//! [Engine] owns everything it uses (a runtime context, a random number generator and the
//! set of backends) and holds no global state, so any number of independent engines can be
//! constructed side by side.

use crate::{
    backend::Backend,
    coordinator::{self, Coordinator},
    placement::Placement,
    recovery::Recovery,
    Distribution, Error, RecoveryInfo,
};
use commonware_runtime::{Clock, Metrics};
use commonware_utils::SystemTimeExt;
use futures::future::join_all;
use rand::{CryptoRng, RngCore};
use scatter_sharing::{split, Config as SplitConfig, Share, ShareId};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, info, warn};

/// Configuration for [Engine].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of shares required to recover a secret.
    pub threshold: usize,

    /// Number of shares each secret is split into.
    pub total: usize,

    /// How shares are assigned to backends.
    pub placement: Placement,

    /// Whether to delete stored shares when too few stores succeed.
    pub rollback_on_failure: bool,
}

impl Config {
    /// Creates a `threshold`-of-`total` configuration with default placement and rollback.
    pub fn new(threshold: usize, total: usize) -> Self {
        let coordinator = coordinator::Config::default();
        Self {
            threshold,
            total,
            placement: coordinator.placement,
            rollback_on_failure: coordinator.rollback_on_failure,
        }
    }
}

/// Splits, distributes and recovers secrets.
pub struct Engine<E: Clock + Metrics, R: RngCore + CryptoRng> {
    context: E,
    rng: R,
    sharing: SplitConfig,
    backends: Vec<Arc<dyn Backend>>,

    coordinator: Coordinator<E>,
    recovery: Recovery,
}

impl<E: Clock + Metrics, R: RngCore + CryptoRng> Engine<E, R> {
    /// Creates an engine over a non-empty set of uniquely named `backends`.
    pub fn new(
        context: E,
        rng: R,
        backends: Vec<Arc<dyn Backend>>,
        cfg: Config,
    ) -> Result<Self, Error> {
        let sharing = SplitConfig::new(cfg.threshold, cfg.total)?;
        let coordinator = Coordinator::new(
            context.with_label("coordinator"),
            backends.clone(),
            coordinator::Config {
                placement: cfg.placement,
                rollback_on_failure: cfg.rollback_on_failure,
            },
        )?;
        let recovery = Recovery::new(context.with_label("recovery"), backends.clone());
        Ok(Self {
            context,
            rng,
            sharing,
            backends,
            coordinator,
            recovery,
        })
    }

    /// The backends shares are distributed across.
    pub fn backends(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    /// Initializes every backend, returning the first failure (if any).
    pub async fn init(&self) -> Result<(), Error> {
        let results = join_all(self.backends.iter().map(|backend| backend.init())).await;
        for (backend, result) in self.backends.iter().zip(results) {
            if let Err(err) = result {
                warn!(backend = backend.name(), ?err, "failed to initialize backend");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Splits `secret` into shares without storing them.
    pub fn split(&mut self, secret: &[u8]) -> Result<Vec<Share>, Error> {
        let created_at = self.context.current().epoch_millis();
        Ok(split(&mut self.rng, &self.sharing, secret, created_at)?)
    }

    /// Stores `shares` across the backends.
    pub async fn distribute(
        &self,
        shares: Vec<Share>,
    ) -> Result<(Distribution, RecoveryInfo), Error> {
        self.coordinator.distribute(shares).await
    }

    /// Deletes the stored shares of a distribution, returning the number deleted.
    pub async fn rollback(&self, distribution: &Distribution) -> usize {
        self.coordinator.rollback(distribution).await
    }

    /// Splits `secret` and distributes its shares, returning what is needed to recover it.
    pub async fn protect(&mut self, secret: &[u8]) -> Result<RecoveryInfo, Error> {
        let shares = self.split(secret)?;
        let (distribution, info) = self.distribute(shares).await?;
        debug!(
            secret = %info.secret,
            stored = distribution.stored(),
            total = distribution.total,
            "protected secret"
        );
        Ok(info)
    }

    /// Protects a UTF-8 string.
    pub async fn protect_str(&mut self, secret: &str) -> Result<RecoveryInfo, Error> {
        self.protect(secret.as_bytes()).await
    }

    /// Collects at least `threshold` valid shares of the secret described by `info`.
    pub async fn retrieve(&self, info: &RecoveryInfo) -> Result<Vec<Share>, Error> {
        self.recovery.retrieve(info).await
    }

    /// Recovers the secret described by `info`.
    pub async fn recover_secret(&self, info: &RecoveryInfo) -> Result<Vec<u8>, Error> {
        self.recovery.recover_secret(info).await
    }

    /// Recovers a secret protected with [Engine::protect_str].
    pub async fn recover_string(&self, info: &RecoveryInfo) -> Result<String, Error> {
        let secret = self.recover_secret(info).await?;
        String::from_utf8(secret).map_err(|_| Error::InvalidUtf8)
    }

    /// Deletes every share of the secret described by `info` from every backend.
    ///
    /// Returns the number of shares deleted. Every backend is attempted even if some fail,
    /// in which case the first failure is returned.
    pub async fn forget(&self, info: &RecoveryInfo) -> Result<usize, Error> {
        let results = join_all(
            self.backends
                .iter()
                .map(|backend| self.forget_on(backend, info)),
        )
        .await;
        let mut deleted = 0;
        let mut failure = None;
        for (backend, result) in self.backends.iter().zip(results) {
            match result {
                Ok(count) => deleted += count,
                Err(err) => {
                    warn!(backend = backend.name(), ?err, "failed to forget shares");
                    failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }
        info!(secret = %info.secret, deleted, "forgot secret");
        Ok(deleted)
    }

    async fn forget_on(
        &self,
        backend: &Arc<dyn Backend>,
        info: &RecoveryInfo,
    ) -> Result<usize, Error> {
        // Delete both listed shares (which may no longer be readable) and any others held
        let mut ids = info
            .assignments
            .iter()
            .filter(|assignment| assignment.location.identifier == backend.name())
            .map(|assignment| assignment.share)
            .collect::<BTreeSet<ShareId>>();
        ids.extend(
            backend
                .retrieve_by_secret(info.secret)
                .await?
                .into_iter()
                .map(|share| share.id),
        );
        let mut deleted = 0;
        for id in ids {
            if backend.delete(id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
