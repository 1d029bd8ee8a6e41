//! Place the shares of a secret on a set of backends.
//!
//! Every share is sent to the backend selected by the configured [Placement], with all
//! stores in flight concurrently. A failed store never prevents the others from completing.
//! Once every store has resolved, the secret is considered distributed if at least
//! `threshold` shares were stored. Otherwise, [Error::InsufficientSuccessfulWrites] is
//! returned (after deleting any stored shares, if [Config::rollback_on_failure] is set).

use crate::{backend::Backend, placement::Placement, Distribution, Error, Outcome, RecoveryInfo};
use commonware_runtime::{Clock, Metrics};
use commonware_utils::SystemTimeExt;
use futures::future::join_all;
use prometheus_client::metrics::counter::Counter;
use scatter_sharing::Share;
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info, warn};

/// Configuration for [Coordinator].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// How shares are assigned to backends.
    pub placement: Placement,

    /// Whether to delete stored shares when too few stores succeed.
    pub rollback_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            placement: Placement::default(),
            rollback_on_failure: true,
        }
    }
}

/// Distributes shares across backends.
pub struct Coordinator<E: Clock + Metrics> {
    context: E,
    cfg: Config,
    backends: Vec<Arc<dyn Backend>>,

    stored: Counter,
    failed: Counter,
    rejected: Counter,
}

impl<E: Clock + Metrics> Coordinator<E> {
    /// Creates a coordinator over `backends`, which must be non-empty and uniquely named.
    pub fn new(context: E, backends: Vec<Arc<dyn Backend>>, cfg: Config) -> Result<Self, Error> {
        if backends.is_empty() {
            return Err(Error::NoBackends);
        }
        {
            let mut names = HashSet::new();
            for backend in &backends {
                if !names.insert(backend.name()) {
                    return Err(Error::DuplicateBackend(backend.name().to_string()));
                }
            }
        }

        let stored = Counter::default();
        let failed = Counter::default();
        let rejected = Counter::default();
        context.register("stored", "Number of shares stored", stored.clone());
        context.register("failed", "Number of shares that failed to store", failed.clone());
        context.register(
            "rejected",
            "Number of distributions with too few stored shares",
            rejected.clone(),
        );

        Ok(Self {
            context,
            cfg,
            backends,
            stored,
            failed,
            rejected,
        })
    }

    /// Stores `shares` (all shares of a single secret) across the backends.
    ///
    /// Returns the outcome of every store and the [RecoveryInfo] needed to recover the
    /// secret.
    pub async fn distribute(
        &self,
        mut shares: Vec<Share>,
    ) -> Result<(Distribution, RecoveryInfo), Error> {
        // Validate the shares
        let first = shares.first().ok_or(Error::InvalidShares("no shares"))?;
        let (secret, threshold, created_at) = (first.secret, first.threshold, first.created_at);
        if shares
            .iter()
            .any(|share| share.secret != secret || share.threshold != threshold)
        {
            return Err(Error::InvalidShares("shares belong to different secrets"));
        }
        if shares.iter().any(|share| share.index == 0) {
            return Err(Error::InvalidShares("zero index"));
        }
        if shares.iter().any(|share| !share.verify()) {
            return Err(Error::InvalidShares("checksum mismatch"));
        }
        shares.sort_by_key(|share| share.index);
        if shares.windows(2).any(|pair| pair[0].index == pair[1].index) {
            return Err(Error::InvalidShares("duplicate index"));
        }
        let total = shares.last().map_or(0, |share| share.index);

        // Store all shares concurrently
        let assignment = self.cfg.placement.assign(&self.backends, shares.len());
        let stores = shares
            .into_iter()
            .zip(assignment)
            .map(|(share, position)| self.store(self.backends[position].clone(), share));
        let outcomes = join_all(stores).await;
        let distribution = Distribution {
            secret,
            threshold,
            total,
            created_at,
            outcomes,
        };

        // Ensure the secret can be recovered
        let stored = distribution.stored();
        if !distribution.is_recoverable() {
            self.rejected.inc();
            warn!(
                %secret,
                stored,
                required = threshold,
                "insufficient successful writes"
            );
            if self.cfg.rollback_on_failure {
                self.rollback(&distribution).await;
            }
            return Err(Error::InsufficientSuccessfulWrites {
                stored,
                required: threshold as usize,
                distribution: Box::new(distribution),
            });
        }
        info!(%secret, stored, total, "distributed secret");
        let info = distribution.recovery_info();
        Ok((distribution, info))
    }

    async fn store(&self, backend: Arc<dyn Backend>, share: Share) -> Outcome {
        let location = backend.locate(&share.id);
        let (id, index) = (share.id, share.index);
        let result = backend.store(share.located(location.clone())).await;
        let error = match result {
            Ok(()) => {
                self.stored.inc();
                debug!(share = %id, index, backend = backend.name(), "stored share");
                None
            }
            Err(err) => {
                self.failed.inc();
                warn!(share = %id, index, backend = backend.name(), ?err, "failed to store share");
                Some(err.to_string())
            }
        };
        Outcome {
            share: id,
            index,
            backend: backend.kind(),
            identifier: backend.name().to_string(),
            location,
            timestamp: self.context.current().epoch_millis(),
            error,
        }
    }

    /// Deletes every successfully stored share of `distribution`, returning the number deleted.
    ///
    /// Failures are logged and skipped.
    pub async fn rollback(&self, distribution: &Distribution) -> usize {
        let deletes = distribution
            .outcomes
            .iter()
            .filter(|outcome| outcome.success())
            .filter_map(|outcome| {
                let Some(backend) = self
                    .backends
                    .iter()
                    .find(|backend| backend.name() == outcome.identifier)
                else {
                    warn!(backend = %outcome.identifier, "unknown backend: skipping rollback");
                    return None;
                };
                Some(async move {
                    match backend.delete(outcome.share).await {
                        Ok(deleted) => deleted,
                        Err(err) => {
                            warn!(
                                share = %outcome.share,
                                backend = backend.name(),
                                ?err,
                                "failed to roll back share"
                            );
                            false
                        }
                    }
                })
            });
        let deleted = join_all(deletes)
            .await
            .into_iter()
            .filter(|deleted| *deleted)
            .count();
        debug!(secret = %distribution.secret, deleted, "rolled back distribution");
        deleted
    }
}
