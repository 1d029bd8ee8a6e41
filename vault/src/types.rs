//! Results of distributing a secret and the descriptor used to recover it.

use bytes::{Buf, BufMut};
use commonware_codec::{
    EncodeSize, Error as CodecError, FixedSize, Read, ReadExt, ReadRangeExt as _, Write,
};
use scatter_sharing::{Kind, Location, SecretId, ShareId, MAX_SHARES};

/// The result of storing one share.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub share: ShareId,
    pub index: u8,
    pub backend: Kind,
    /// Name of the backend the share was sent to.
    pub identifier: String,
    /// Where the share was stored.
    pub location: Location,
    /// Milliseconds since the UNIX epoch at which the store completed.
    pub timestamp: u64,
    /// Why the store failed (if it did).
    pub error: Option<String>,
}

impl Outcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// The outcomes of distributing every share of a secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Distribution {
    pub secret: SecretId,
    pub threshold: u8,
    pub total: u8,
    /// Milliseconds since the UNIX epoch at which the secret was split.
    pub created_at: u64,
    /// One outcome per share, in index order.
    pub outcomes: Vec<Outcome>,
}

impl Distribution {
    /// Number of shares stored successfully.
    pub fn stored(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success()).count()
    }

    /// Returns true if enough shares were stored to reconstruct the secret.
    pub fn is_recoverable(&self) -> bool {
        self.stored() >= self.threshold as usize
    }

    /// Builds the descriptor needed to recover the secret (listing only stored shares).
    pub fn recovery_info(&self) -> RecoveryInfo {
        RecoveryInfo {
            secret: self.secret,
            threshold: self.threshold,
            total: self.total,
            created_at: self.created_at,
            assignments: self
                .outcomes
                .iter()
                .filter(|o| o.success())
                .map(|o| Assignment {
                    share: o.share,
                    index: o.index,
                    location: o.location.clone(),
                })
                .collect(),
        }
    }
}

/// Where a single share of a secret was stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub share: ShareId,
    pub index: u8,
    pub location: Location,
}

impl Write for Assignment {
    fn write(&self, buf: &mut impl BufMut) {
        self.share.write(buf);
        self.index.write(buf);
        self.location.write(buf);
    }
}

impl EncodeSize for Assignment {
    fn encode_size(&self) -> usize {
        ShareId::SIZE + u8::SIZE + self.location.encode_size()
    }
}

impl Read for Assignment {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let share = ShareId::read(buf)?;
        let index = u8::read(buf)?;
        if index == 0 {
            return Err(CodecError::Invalid("Assignment", "index must be non-zero"));
        }
        let location = Location::read(buf)?;
        Ok(Self {
            share,
            index,
            location,
        })
    }
}

/// Everything needed to recover a distributed secret.
///
/// Contains no secret material and is the only artifact a caller must retain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryInfo {
    pub secret: SecretId,
    pub threshold: u8,
    pub total: u8,
    pub created_at: u64,
    pub assignments: Vec<Assignment>,
}

impl Write for RecoveryInfo {
    fn write(&self, buf: &mut impl BufMut) {
        self.secret.write(buf);
        self.threshold.write(buf);
        self.total.write(buf);
        self.created_at.write(buf);
        self.assignments.write(buf);
    }
}

impl EncodeSize for RecoveryInfo {
    fn encode_size(&self) -> usize {
        SecretId::SIZE
            + u8::SIZE
            + u8::SIZE
            + u64::SIZE
            + self.assignments.encode_size()
    }
}

impl Read for RecoveryInfo {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let secret = SecretId::read(buf)?;
        let threshold = u8::read(buf)?;
        let total = u8::read(buf)?;
        if threshold < scatter_sharing::MIN_THRESHOLD || threshold > total {
            return Err(CodecError::Invalid("RecoveryInfo", "invalid threshold"));
        }
        let created_at = u64::read(buf)?;
        let assignments = Vec::<Assignment>::read_range(buf, 0..=MAX_SHARES)?;
        if assignments.iter().any(|a| a.index > total) {
            return Err(CodecError::Invalid("RecoveryInfo", "index exceeds total"));
        }
        Ok(Self {
            secret,
            threshold,
            total,
            created_at,
            assignments,
        })
    }
}
