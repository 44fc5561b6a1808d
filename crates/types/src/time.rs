//! Block time
//!
//! Block timestamps are microseconds since the Unix epoch, supplied by the
//! block-processing driver. The big-endian byte form is the sort encoding
//! used for time-keyed storage: byte order equals calendar order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Block timestamp in microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(MICROS_PER_SEC))
    }

    /// Add a delay in microseconds, saturating at [`Timestamp::MAX`].
    pub const fn saturating_add_micros(self, us: u64) -> Self {
        Self(self.0.saturating_add(us))
    }

    /// Fixed-width big-endian encoding; lexicographic order of the bytes is
    /// the chronological order of the timestamps.
    pub const fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(u64::from_be_bytes(raw)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}s",
            self.0 / MICROS_PER_SEC,
            self.0 % MICROS_PER_SEC
        )
    }
}
