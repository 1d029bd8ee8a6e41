//! Collect valid shares of a secret and reconstruct it.
//!
//! Every backend is asked for the shares it holds of the secret concurrently. Results are
//! consumed as they complete and requests still outstanding are dropped as soon as
//! `threshold` valid shares (with distinct indices) have been collected.
//!
//! A share is valid if its checksum verifies, it belongs to the expected secret, it
//! carries the expected threshold and its index is within `1..=total`. Invalid shares are
//! discarded and never count towards the threshold. Backends that fail are skipped.

use crate::{backend::Backend, Error, RecoveryInfo};
use commonware_runtime::Metrics;
use futures::{stream::FuturesUnordered, StreamExt};
use prometheus_client::metrics::counter::Counter;
use scatter_sharing::{reconstruct, Share};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, warn};

/// Retrieves and verifies shares.
pub struct Recovery {
    backends: Vec<Arc<dyn Backend>>,

    recovered: Counter,
    corrupted: Counter,
    unavailable: Counter,
}

impl Recovery {
    /// Creates a recovery manager over `backends`.
    pub fn new<E: Metrics>(context: E, backends: Vec<Arc<dyn Backend>>) -> Self {
        let recovered = Counter::default();
        let corrupted = Counter::default();
        let unavailable = Counter::default();
        context.register(
            "recovered",
            "Number of secrets for which enough valid shares were found",
            recovered.clone(),
        );
        context.register("corrupted", "Number of invalid shares discarded", corrupted.clone());
        context.register(
            "unavailable",
            "Number of failed backend requests",
            unavailable.clone(),
        );
        Self {
            backends,
            recovered,
            corrupted,
            unavailable,
        }
    }

    fn valid(info: &RecoveryInfo, share: &Share) -> bool {
        share.secret == info.secret
            && share.threshold == info.threshold
            && share.index >= 1
            && share.index <= info.total
            && share.verify()
    }

    /// Collects at least `threshold` valid shares of the secret described by `info`.
    ///
    /// Shares are returned in index order.
    pub async fn retrieve(&self, info: &RecoveryInfo) -> Result<Vec<Share>, Error> {
        let required = info.threshold as usize;
        let mut pending = self
            .backends
            .iter()
            .map(|backend| async move { (backend, backend.retrieve_by_secret(info.secret).await) })
            .collect::<FuturesUnordered<_>>();

        let mut found = BTreeMap::new();
        while let Some((backend, result)) = pending.next().await {
            let shares = match result {
                Ok(shares) => shares,
                Err(err) => {
                    self.unavailable.inc();
                    warn!(backend = backend.name(), ?err, "failed to retrieve shares");
                    continue;
                }
            };
            for share in shares {
                if !Self::valid(info, &share) {
                    self.corrupted.inc();
                    warn!(
                        backend = backend.name(),
                        share = %share.id,
                        index = share.index,
                        "discarding invalid share"
                    );
                    continue;
                }
                found.entry(share.index).or_insert(share);
            }
            if found.len() >= required {
                debug!(
                    secret = %info.secret,
                    found = found.len(),
                    outstanding = pending.len(),
                    "collected enough shares"
                );
                break;
            }
        }

        if found.len() < required {
            warn!(
                secret = %info.secret,
                found = found.len(),
                required,
                "insufficient valid shares"
            );
            return Err(Error::InsufficientValidShares(found.len(), required));
        }
        self.recovered.inc();
        Ok(found.into_values().collect())
    }

    /// Retrieves enough valid shares to reconstruct the secret described by `info`.
    pub async fn recover_secret(&self, info: &RecoveryInfo) -> Result<Vec<u8>, Error> {
        let shares = self.retrieve(info).await?;
        Ok(reconstruct(&shares)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{
            mocks::{Stalled, Unavailable},
            Volatile,
        },
        Assignment,
    };
    use commonware_macros::test_traced;
    use commonware_runtime::{deterministic, Runner};
    use rand::{rngs::StdRng, SeedableRng};
    use scatter_sharing::{split, Config, Kind, Location};

    const SECRET: &[u8] = b"recover me if you can";

    /// Splits [SECRET] and places share `i` on backend `i mod stores.len()`.
    async fn setup(seed: u64, threshold: usize, stores: &[Arc<Volatile>]) -> RecoveryInfo {
        let mut rng = StdRng::seed_from_u64(seed);
        let total = stores.len();
        let shares = split(&mut rng, &Config::new(threshold, total).unwrap(), SECRET, 0).unwrap();
        let info = RecoveryInfo {
            secret: shares[0].secret,
            threshold: threshold as u8,
            total: total as u8,
            created_at: 0,
            assignments: shares
                .iter()
                .zip(stores)
                .map(|(share, store)| Assignment {
                    share: share.id,
                    index: share.index,
                    location: Location::new(store.kind(), store.name()),
                })
                .collect(),
        };
        for (share, store) in shares.into_iter().zip(stores) {
            store.store(share).await.unwrap();
        }
        info
    }

    fn stores(count: usize) -> Vec<Arc<Volatile>> {
        (0..count)
            .map(|i| Arc::new(Volatile::new(Kind::Volatile, format!("store-{i}"))))
            .collect()
    }

    fn backends(stores: &[Arc<Volatile>]) -> Vec<Arc<dyn Backend>> {
        stores
            .iter()
            .map(|store| store.clone() as Arc<dyn Backend>)
            .collect()
    }

    #[test_traced]
    fn test_recover() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let stores = stores(5);
            let info = setup(0, 3, &stores).await;
            let recovery = Recovery::new(context.clone(), backends(&stores));
            assert_eq!(recovery.recover_secret(&info).await.unwrap(), SECRET);

            let buffer = context.encode();
            assert!(buffer.contains("recovered_total 1"));
            assert!(buffer.contains("corrupted_total 0"));
        });
    }

    #[test_traced]
    fn test_recover_missing_shares() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let stores = stores(5);
            let info = setup(1, 3, &stores).await;
            stores[0].clear();
            stores[3].clear();
            let recovery = Recovery::new(context, backends(&stores));
            let shares = recovery.retrieve(&info).await.unwrap();
            assert_eq!(
                shares.iter().map(|share| share.index).collect::<Vec<_>>(),
                vec![2, 3, 5]
            );
            assert_eq!(recovery.recover_secret(&info).await.unwrap(), SECRET);

            // One more loss makes the secret unrecoverable
            stores[1].clear();
            assert!(matches!(
                recovery.recover_secret(&info).await,
                Err(Error::InsufficientValidShares(2, 3))
            ));
        });
    }

    #[test_traced]
    fn test_recover_discards_corrupted() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let stores = stores(3);
            let info = setup(2, 2, &stores).await;

            // Flip a single bit of share 1
            let mut share = stores[0]
                .retrieve(info.assignments[0].share)
                .await
                .unwrap()
                .unwrap();
            share.payload[3] ^= 0x10;
            stores[0].store(share).await.unwrap();

            let recovery = Recovery::new(context.clone(), backends(&stores));
            let shares = recovery.retrieve(&info).await.unwrap();
            assert!(shares.iter().all(|share| share.index != 1));
            assert_eq!(recovery.recover_secret(&info).await.unwrap(), SECRET);

            // Corrupting another share leaves too few
            let mut share = stores[1]
                .retrieve(info.assignments[1].share)
                .await
                .unwrap()
                .unwrap();
            share.threshold = 3;
            stores[1].store(share).await.unwrap();
            assert!(matches!(
                recovery.retrieve(&info).await,
                Err(Error::InsufficientValidShares(1, 2))
            ));

            let buffer = context.encode();
            assert!(buffer.contains("corrupted_total"));
        });
    }

    #[test_traced]
    fn test_recover_skips_unavailable() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let stores = stores(3);
            let info = setup(3, 2, &stores).await;
            stores[2].clear();

            let mut backends = backends(&stores);
            backends.insert(0, Arc::new(Unavailable::new(Kind::Remote, "remote")));
            let recovery = Recovery::new(context.clone(), backends);
            assert_eq!(recovery.recover_secret(&info).await.unwrap(), SECRET);

            let buffer = context.encode();
            assert!(buffer.contains("unavailable_total"));
        });
    }

    #[test_traced]
    fn test_recover_stops_early() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            // A single backend holds every share
            let store = Arc::new(Volatile::new(Kind::Volatile, "all"));
            let info = setup(4, 3, &[store.clone(), store.clone(), store.clone()]).await;

            // A backend that never answers does not block recovery
            let backends = vec![
                Arc::new(Stalled::new(Kind::Remote, "stalled")) as Arc<dyn Backend>,
                store as Arc<dyn Backend>,
            ];
            let recovery = Recovery::new(context, backends);
            assert_eq!(recovery.recover_secret(&info).await.unwrap(), SECRET);
        });
    }

    #[test_traced]
    fn test_recover_filters_by_secret_and_index() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let stores = stores(3);
            let info = setup(5, 3, &stores).await;

            // A different secret is invisible to this recovery
            let other = setup(6, 3, &stores).await;
            stores[0].clear();
            let recovery = Recovery::new(context, backends(&stores));
            assert!(matches!(
                recovery.retrieve(&info).await,
                Err(Error::InsufficientValidShares(2, 3))
            ));
            assert!(matches!(
                recovery.retrieve(&other).await,
                Err(Error::InsufficientValidShares(2, 3))
            ));

            // An index beyond the recorded total is rejected
            let mut narrowed = info.clone();
            narrowed.total = 2;
            let mut share = stores[1]
                .retrieve(info.assignments[1].share)
                .await
                .unwrap()
                .unwrap();
            share.location = None;
            assert!(Recovery::valid(&info, &share));
            let mut outside = share.clone();
            outside.index = 3;
            assert!(!Recovery::valid(&narrowed, &outside));
        });
    }
}
