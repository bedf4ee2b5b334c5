use core::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a station for the lifetime of a session. The
/// default value is [`ConstantId::INVALID`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ConstantId(pub u64);

impl ConstantId {
    pub const INVALID: ConstantId = ConstantId(0);

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ConstantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Slot index of a station inside the current session. Indices are reused
/// after a station leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationIndex(pub u8);

impl StationIndex {
    pub const INVALID: StationIndex = StationIndex(u8::MAX);

    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl fmt::Display for StationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of one station in the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationInfo {
    pub constant_id: ConstantId,
    pub index: StationIndex,
    pub is_host: bool,
    pub is_local: bool,
    /// Round-trip time to this station, `None` for the local station.
    pub rtt_ms: Option<u32>,
}
