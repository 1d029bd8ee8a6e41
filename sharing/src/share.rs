//! Shares of a secret and the descriptors that locate them.
//!
//! # Format
//!
//! A [Share] is serialized as:
//!
//! ```text
//! +--------+---------+-------+-----------+------------------+----------+---------+------------+
//! | id(16) | sid(16) | index | threshold | payload          | checksum | created | location?  |
//! |        |         | (u8)  |   (u8)    | (length-prefixed)|   (32)   |  (u64)  | (flag+loc) |
//! +--------+---------+-------+-----------+------------------+----------+---------+------------+
//! ```
//!
//! The checksum is a BLAKE3 digest over a namespace, the secret identifier, the
//! index, the threshold and the payload. The [Location] is assigned after
//! splitting and is not covered by the checksum.

use bytes::{Buf, BufMut};
use commonware_codec::{
    EncodeSize, Error as CodecError, FixedSize, Read, ReadExt, ReadRangeExt as _, Write,
};
use commonware_utils::hex;
use rand::{CryptoRng, RngCore};
use std::collections::BTreeMap;

/// Namespace mixed into every share checksum.
const CHECKSUM_NAMESPACE: &[u8] = b"_SCATTER_SHARE";

/// Length of [SecretId] and [ShareId].
pub const ID_LENGTH: usize = 16;

/// Length of a [Checksum].
pub const CHECKSUM_LENGTH: usize = 32;

/// Maximum length of a [Location] identifier, metadata key, or metadata value.
pub const MAX_LOCATION_FIELD: usize = 1024;

/// Maximum number of metadata entries attached to a [Location].
pub const MAX_LOCATION_METADATA: usize = 64;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; ID_LENGTH]);

        impl $name {
            /// Draws a new identifier from `rng`.
            pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, crate::Error> {
                let mut id = [0u8; ID_LENGTH];
                rng.try_fill_bytes(&mut id)
                    .map_err(|_| crate::Error::InsecureRandomSource)?;
                Ok(Self(id))
            }
        }

        impl From<[u8; ID_LENGTH]> for $name {
            fn from(value: [u8; ID_LENGTH]) -> Self {
                Self(value)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", hex(&self.0))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", hex(&self.0))
            }
        }

        impl Write for $name {
            fn write(&self, buf: &mut impl BufMut) {
                self.0.write(buf);
            }
        }

        impl Read for $name {
            type Cfg = ();

            fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
                Ok(Self(<[u8; ID_LENGTH]>::read(buf)?))
            }
        }

        impl FixedSize for $name {
            const SIZE: usize = ID_LENGTH;
        }
    };
}

identifier!(
    /// Identifies a secret across all of its shares.
    ///
    /// The identifier is random and carries no information about the secret.
    SecretId
);

identifier!(
    /// Identifies a single share.
    ShareId
);

/// A digest binding a share's payload to its metadata.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; CHECKSUM_LENGTH]);

impl Checksum {
    /// Computes the checksum of a share's contents.
    pub fn compute(secret: &SecretId, index: u8, threshold: u8, payload: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(CHECKSUM_NAMESPACE);
        hasher.update(secret.as_ref());
        hasher.update(&[index, threshold]);
        hasher.update(&(payload.len() as u64).to_be_bytes());
        hasher.update(payload);
        Self(*hasher.finalize().as_bytes())
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl Write for Checksum {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for Checksum {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Ok(Self(<[u8; CHECKSUM_LENGTH]>::read(buf)?))
    }
}

impl FixedSize for Checksum {
    const SIZE: usize = CHECKSUM_LENGTH;
}

/// The kind of backend a share is stored in.
///
/// Variants are ordered from most to least durable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    /// Survives process and device restarts.
    Durable,
    /// Held by another machine or service.
    Remote,
    /// Cleared when the owning session ends.
    Session,
    /// Cleared when the process exits.
    Volatile,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Durable => "durable",
            Kind::Remote => "remote",
            Kind::Session => "session",
            Kind::Volatile => "volatile",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Write for Kind {
    fn write(&self, buf: &mut impl BufMut) {
        let discriminant = match self {
            Kind::Durable => 0u8,
            Kind::Remote => 1u8,
            Kind::Session => 2u8,
            Kind::Volatile => 3u8,
        };
        discriminant.write(buf);
    }
}

impl Read for Kind {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let discriminant = u8::read(buf)?;
        match discriminant {
            0 => Ok(Kind::Durable),
            1 => Ok(Kind::Remote),
            2 => Ok(Kind::Session),
            3 => Ok(Kind::Volatile),
            _ => Err(CodecError::InvalidEnum(discriminant)),
        }
    }
}

impl FixedSize for Kind {
    const SIZE: usize = u8::SIZE;
}

fn write_str(value: &str, buf: &mut impl BufMut) {
    value.as_bytes().to_vec().write(buf);
}

fn str_size(value: &str) -> usize {
    value.as_bytes().to_vec().encode_size()
}

fn read_str(buf: &mut impl Buf, context: &'static str) -> Result<String, CodecError> {
    let bytes = Vec::<u8>::read_range(buf, 0..=MAX_LOCATION_FIELD)?;
    String::from_utf8(bytes).map_err(|_| CodecError::Invalid(context, "invalid UTF-8"))
}

/// Where a share is (or should be) stored.
///
/// Carries no secret material.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub kind: Kind,
    /// Name of the backend instance (for example, a storage partition).
    pub identifier: String,
    /// Backend-specific details.
    pub metadata: BTreeMap<String, String>,
}

impl Location {
    pub fn new(kind: Kind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl Write for Location {
    fn write(&self, buf: &mut impl BufMut) {
        self.kind.write(buf);
        write_str(&self.identifier, buf);
        (self.metadata.len() as u32).write(buf);
        for (key, value) in &self.metadata {
            write_str(key, buf);
            write_str(value, buf);
        }
    }
}

impl EncodeSize for Location {
    fn encode_size(&self) -> usize {
        self.kind.encode_size()
            + str_size(&self.identifier)
            + u32::SIZE
            + self
                .metadata
                .iter()
                .map(|(key, value)| str_size(key) + str_size(value))
                .sum::<usize>()
    }
}

impl Read for Location {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let kind = Kind::read(buf)?;
        let identifier = read_str(buf, "Location")?;
        let entries = u32::read(buf)? as usize;
        if entries > MAX_LOCATION_METADATA {
            return Err(CodecError::Invalid("Location", "too many metadata entries"));
        }
        let mut metadata = BTreeMap::new();
        for _ in 0..entries {
            let key = read_str(buf, "Location")?;
            let value = read_str(buf, "Location")?;
            if metadata.insert(key, value).is_some() {
                return Err(CodecError::Invalid("Location", "duplicate metadata key"));
            }
        }
        Ok(Self {
            kind,
            identifier,
            metadata,
        })
    }
}

/// One of the `N` pieces of a split secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    pub id: ShareId,
    pub secret: SecretId,
    /// The non-zero evaluation point of this share.
    pub index: u8,
    /// Number of shares required to reconstruct the secret.
    pub threshold: u8,
    /// One polynomial evaluation per byte of the secret.
    pub payload: Vec<u8>,
    pub checksum: Checksum,
    /// Milliseconds since the UNIX epoch.
    pub created_at: u64,
    pub location: Option<Location>,
}

// Omits payload bytes
impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("id", &self.id)
            .field("secret", &self.secret)
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("len", &self.payload.len())
            .field("created_at", &self.created_at)
            .field("location", &self.location)
            .finish()
    }
}

impl Share {
    /// Creates a share, computing its checksum.
    pub fn new(
        id: ShareId,
        secret: SecretId,
        index: u8,
        threshold: u8,
        payload: Vec<u8>,
        created_at: u64,
    ) -> Self {
        let checksum = Checksum::compute(&secret, index, threshold, &payload);
        Self {
            id,
            secret,
            index,
            threshold,
            payload,
            checksum,
            created_at,
            location: None,
        }
    }

    /// Returns true if the stored checksum matches the share's contents.
    pub fn verify(&self) -> bool {
        Checksum::compute(&self.secret, self.index, self.threshold, &self.payload) == self.checksum
    }

    /// Returns the share with its location set.
    pub fn located(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl Write for Share {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        self.secret.write(buf);
        self.index.write(buf);
        self.threshold.write(buf);
        self.payload.write(buf);
        self.checksum.write(buf);
        self.created_at.write(buf);
        match &self.location {
            Some(location) => {
                true.write(buf);
                location.write(buf);
            }
            None => false.write(buf),
        }
    }
}

impl EncodeSize for Share {
    fn encode_size(&self) -> usize {
        ShareId::SIZE
            + SecretId::SIZE
            + u8::SIZE
            + u8::SIZE
            + self.payload.encode_size()
            + Checksum::SIZE
            + u64::SIZE
            + bool::SIZE
            + self.location.as_ref().map_or(0, |l| l.encode_size())
    }
}

impl Read for Share {
    /// The maximum payload length accepted.
    type Cfg = usize;

    fn read_cfg(buf: &mut impl Buf, max_payload: &usize) -> Result<Self, CodecError> {
        let id = ShareId::read(buf)?;
        let secret = SecretId::read(buf)?;
        let index = u8::read(buf)?;
        if index == 0 {
            return Err(CodecError::Invalid("Share", "index must be non-zero"));
        }
        let threshold = u8::read(buf)?;
        if threshold < crate::MIN_THRESHOLD {
            return Err(CodecError::Invalid("Share", "threshold too small"));
        }
        let payload = Vec::<u8>::read_range(buf, 0..=*max_payload)?;
        let checksum = Checksum::read(buf)?;
        let created_at = u64::read(buf)?;
        let location = if bool::read(buf)? {
            Some(Location::read(buf)?)
        } else {
            None
        };
        Ok(Self {
            id,
            secret,
            index,
            threshold,
            payload,
            checksum,
            created_at,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{Decode, Encode};
    use rand::{rngs::StdRng, SeedableRng};

    fn sample(rng: &mut StdRng) -> Share {
        let secret = SecretId::random(rng).unwrap();
        let id = ShareId::random(rng).unwrap();
        Share::new(id, secret, 3, 2, vec![1, 2, 3, 4], 1_700_000_000_000)
    }

    #[test]
    fn test_verify() {
        let mut rng = StdRng::seed_from_u64(0);
        let share = sample(&mut rng);
        assert!(share.verify());

        // Flipping any single bit of the payload is detected
        for byte in 0..share.payload.len() {
            for bit in 0..8 {
                let mut tampered = share.clone();
                tampered.payload[byte] ^= 1 << bit;
                assert!(!tampered.verify());
            }
        }

        // Metadata is covered
        let mut tampered = share.clone();
        tampered.index = 4;
        assert!(!tampered.verify());
        let mut tampered = share.clone();
        tampered.threshold = 3;
        assert!(!tampered.verify());
        let mut tampered = share;
        tampered.secret = SecretId::from([0u8; ID_LENGTH]);
        assert!(!tampered.verify());
    }

    #[test]
    fn test_location_not_covered() {
        let mut rng = StdRng::seed_from_u64(1);
        let share = sample(&mut rng).located(Location::new(Kind::Volatile, "memory"));
        assert!(share.verify());
    }

    #[test]
    fn test_codec() {
        let mut rng = StdRng::seed_from_u64(2);
        let share = sample(&mut rng).located(
            Location::new(Kind::Durable, "vault_0")
                .with_metadata("partition", "vault_0")
                .with_metadata("node", "a"),
        );
        let encoded = share.encode();
        assert_eq!(encoded.len(), share.encode_size());
        let decoded = Share::decode_cfg(encoded, &1024).unwrap();
        assert_eq!(decoded, share);
        assert!(decoded.verify());

        let bare = sample(&mut rng);
        let decoded = Share::decode_cfg(bare.encode(), &1024).unwrap();
        assert_eq!(decoded, bare);
    }

    #[test]
    fn test_codec_payload_limit() {
        let mut rng = StdRng::seed_from_u64(3);
        let share = sample(&mut rng);
        assert!(Share::decode_cfg(share.encode(), &3).is_err());
    }

    #[test]
    fn test_codec_rejects_zero_index() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut share = sample(&mut rng);
        share.index = 0;
        assert!(matches!(
            Share::decode_cfg(share.encode(), &1024),
            Err(CodecError::Invalid("Share", _))
        ));
    }

    #[test]
    fn test_kind_order() {
        assert!(Kind::Durable < Kind::Remote);
        assert!(Kind::Remote < Kind::Session);
        assert!(Kind::Session < Kind::Volatile);
    }

    #[test]
    fn test_debug_hides_payload() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut share = sample(&mut rng);
        share.payload = vec![0xAB; 4];
        let printed = format!("{share:?}");
        assert!(!printed.contains("payload"));
        assert!(printed.contains("len: 4"));
    }
}
