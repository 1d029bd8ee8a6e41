//! A backend that persists shares to a [commonware_runtime::Storage] partition.
//!
//! # Format
//!
//! Each share is stored in its own blob (named by its [ShareId]):
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+---+---+
//! |        Share (codec)          |  CRC32(u32)   |
//! +---+---+---+---+---+---+---+---+---+---+---+---+
//! ```
//!
//! _The CRC32 detects partial writes before a share is decoded. Shares carry their own
//! checksum as well, which recovery verifies independently._
//!
//! # Recovery
//!
//! On [Durable::init] (and [Backend::init]), the partition is scanned and an index from
//! [ShareId] to [SecretId] is rebuilt. Blobs that cannot be read, fail their CRC32 or do not
//! decode are skipped (and left in place for inspection). Listing the shares of a secret
//! skips such blobs the same way.
//!
//! Opening a blob creates it if it does not exist, so an empty blob found for a share that
//! is not tracked (for example, one deleted while it was being read) is removed.

use super::Backend;
use crate::Error;
use bytes::{Buf, BufMut};
use commonware_codec::{Decode, Encode, FixedSize};
use commonware_runtime::{Blob, Error as RError, Metrics, Storage};
use commonware_utils::hex;
use futures::future::{BoxFuture, FutureExt};
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use scatter_sharing::{share::ID_LENGTH, Kind, Location, SecretId, Share, ShareId};
use std::{collections::HashMap, sync::Mutex};
use tracing::{debug, warn};

/// Configuration for [Durable].
#[derive(Clone, Debug)]
pub struct Config {
    /// The [commonware_runtime::Storage] partition to store shares in.
    pub partition: String,

    /// The maximum payload length of a share (the length of the secret).
    pub max_payload: usize,
}

/// Persists each share as its own blob.
pub struct Durable<E: Storage + Metrics> {
    context: E,
    cfg: Config,

    index: Mutex<HashMap<ShareId, SecretId>>,

    tracked: Gauge,
    stored: Counter,
    deleted: Counter,
}

impl<E: Storage + Metrics> Durable<E> {
    /// Opens the partition and loads the index of stored shares.
    pub async fn init(context: E, cfg: Config) -> Result<Self, Error> {
        let tracked = Gauge::default();
        let stored = Counter::default();
        let deleted = Counter::default();
        context.register("tracked", "Number of shares tracked", tracked.clone());
        context.register("stored", "Number of shares stored", stored.clone());
        context.register("deleted", "Number of shares deleted", deleted.clone());

        let durable = Self {
            context,
            cfg,
            index: Mutex::new(HashMap::new()),
            tracked,
            stored,
            deleted,
        };
        durable.load().await?;
        Ok(durable)
    }

    /// Number of shares in the partition.
    pub fn len(&self) -> usize {
        self.index.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn load(&self) -> Result<(), Error> {
        let names = match self.context.scan(&self.cfg.partition).await {
            Ok(names) => names,
            Err(RError::PartitionMissing(_)) => Vec::new(),
            Err(err) => return Err(Error::Runtime(err)),
        };

        let mut index = HashMap::new();
        for name in names {
            let Ok(raw) = <[u8; ID_LENGTH]>::try_from(name.as_slice()) else {
                warn!(
                    partition = %self.cfg.partition,
                    blob = %hex(&name),
                    "unexpected blob name: skipping"
                );
                continue;
            };
            let id = ShareId::from(raw);
            match self.read(id).await {
                Ok(Some(share)) => {
                    index.insert(id, share.secret);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        partition = %self.cfg.partition,
                        share = %id,
                        ?err,
                        "unreadable blob: skipping"
                    );
                }
            }
        }

        let loaded = index.len();
        self.tracked.set(loaded as i64);
        *self.index.lock().unwrap() = index;
        debug!(partition = %self.cfg.partition, loaded, "loaded shares");
        Ok(())
    }

    /// Reads the blob of `id`, returning `None` if it does not hold a valid share.
    async fn read(&self, id: ShareId) -> Result<Option<Share>, Error> {
        let (blob, len) = self.context.open(&self.cfg.partition, id.as_ref()).await?;
        if len == 0 {
            drop(blob);
            let tracked = self.index.lock().unwrap().contains_key(&id);
            if !tracked {
                self.context
                    .remove(&self.cfg.partition, Some(id.as_ref()))
                    .await?;
                debug!(partition = %self.cfg.partition, share = %id, "removed empty blob");
            }
            return Ok(None);
        }
        let Ok(len) = usize::try_from(len) else {
            warn!(share = %id, len, "blob too large: skipping");
            return Ok(None);
        };
        if len < u32::SIZE {
            warn!(share = %id, len, "blob too short: skipping");
            return Ok(None);
        }
        let buf = blob.read_at(vec![0u8; len], 0).await?;
        let (item, mut checksum) = buf.as_ref().split_at(len - u32::SIZE);

        // Verify integrity
        let stored = checksum.get_u32();
        let computed = crc32fast::hash(item);
        if stored != computed {
            warn!(share = %id, stored, computed, "checksum mismatch: skipping");
            return Ok(None);
        }

        // Decode
        let share = match Share::decode_cfg(item, &self.cfg.max_payload) {
            Ok(share) => share,
            Err(err) => {
                warn!(share = %id, ?err, "invalid share: skipping");
                return Ok(None);
            }
        };
        if share.id != id {
            warn!(share = %id, found = %share.id, "share stored under wrong name: skipping");
            return Ok(None);
        }
        Ok(Some(share))
    }

    async fn put(&self, share: Share) -> Result<(), Error> {
        if share.payload.len() > self.cfg.max_payload {
            return Err(Error::InvalidShares("payload exceeds maximum"));
        }

        // Serialize with a trailing checksum
        let mut buf = share.encode().to_vec();
        let checksum = crc32fast::hash(&buf);
        buf.put_u32(checksum);
        let size = buf.len() as u64;

        // Overwrite the blob
        let (blob, len) = self
            .context
            .open(&self.cfg.partition, share.id.as_ref())
            .await?;
        blob.write_at(buf, 0).await?;
        if len > size {
            blob.resize(size).await?;
        }
        blob.sync().await?;

        let replaced = self
            .index
            .lock()
            .unwrap()
            .insert(share.id, share.secret)
            .is_some();
        if !replaced {
            self.tracked.inc();
        }
        self.stored.inc();
        debug!(
            partition = %self.cfg.partition,
            share = %share.id,
            secret = %share.secret,
            index = share.index,
            "stored share"
        );
        Ok(())
    }

    async fn get(&self, id: ShareId) -> Result<Option<Share>, Error> {
        let tracked = self.index.lock().unwrap().contains_key(&id);
        if !tracked {
            return Ok(None);
        }
        self.read(id).await
    }

    async fn get_all(&self, secret: SecretId) -> Result<Vec<Share>, Error> {
        let ids = self
            .index
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| **s == secret)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        let mut shares = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read(id).await {
                Ok(Some(share)) => shares.push(share),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        partition = %self.cfg.partition,
                        share = %id,
                        ?err,
                        "unreadable blob: skipping"
                    );
                }
            }
        }
        Ok(shares)
    }

    async fn remove(&self, id: ShareId) -> Result<bool, Error> {
        let removed = self.index.lock().unwrap().remove(&id);
        let Some(secret) = removed else {
            return Ok(false);
        };
        if let Err(err) = self
            .context
            .remove(&self.cfg.partition, Some(id.as_ref()))
            .await
        {
            self.index.lock().unwrap().insert(id, secret);
            return Err(Error::Runtime(err));
        }
        self.tracked.dec();
        self.deleted.inc();
        debug!(partition = %self.cfg.partition, share = %id, "deleted share");
        Ok(true)
    }
}

impl<E: Storage + Metrics> Backend for Durable<E> {
    fn kind(&self) -> Kind {
        Kind::Durable
    }

    fn name(&self) -> &str {
        &self.cfg.partition
    }

    fn locate(&self, share: &ShareId) -> Location {
        Location::new(Kind::Durable, self.cfg.partition.clone())
            .with_metadata("partition", self.cfg.partition.clone())
            .with_metadata("blob", hex(share.as_ref()))
    }

    fn init(&self) -> BoxFuture<'_, Result<(), Error>> {
        self.load().boxed()
    }

    fn store(&self, share: Share) -> BoxFuture<'_, Result<(), Error>> {
        self.put(share).boxed()
    }

    fn retrieve(&self, id: ShareId) -> BoxFuture<'_, Result<Option<Share>, Error>> {
        self.get(id).boxed()
    }

    fn retrieve_by_secret(&self, secret: SecretId) -> BoxFuture<'_, Result<Vec<Share>, Error>> {
        self.get_all(secret).boxed()
    }

    fn delete(&self, id: ShareId) -> BoxFuture<'_, Result<bool, Error>> {
        self.remove(id).boxed()
    }
}
