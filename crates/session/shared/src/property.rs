//! Point-in-time snapshots returned by the synchronous engine getters.

use serde::{Deserialize, Serialize};

use crate::settings::AttributeValue;
use crate::station::ConstantId;

/// Snapshot of a session as last reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionProperty {
    pub session_id: u32,
    pub host: ConstantId,
    pub game_mode: u32,
    pub participants: u16,
    pub min_participants: u16,
    pub max_participants: u16,
    pub opened: bool,
    pub attributes: Vec<AttributeValue>,
    pub matchmake_keyword: Option<String>,
    pub user_password_set: bool,
    pub application_data: Vec<u8>,
}

impl SessionProperty {
    pub fn is_full(&self) -> bool {
        self.participants >= self.max_participants
    }

    pub fn vacancies(&self) -> u16 {
        self.max_participants.saturating_sub(self.participants)
    }
}

/// Snapshot of the joint session grouping the current session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JointSessionProperty {
    pub joint_session_id: u32,
    pub host: ConstantId,
    pub participants: u16,
    pub max_participants: u16,
    pub opened: bool,
    pub application_data: Vec<u8>,
}

/// Network diagnostics. Reading them never starts an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkDiagnostics {
    /// Average round-trip time across connected stations.
    pub rtt_ms: Option<u32>,
    pub memory_used_bytes: u64,
    pub memory_peak_bytes: u64,
}
