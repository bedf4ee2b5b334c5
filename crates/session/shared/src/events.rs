use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::station::{ConstantId, StationIndex};

/// Kinds of membership/topology changes reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum SessionEventType {
    StationJoined,
    StationLeft,
    HostChanged,
    HostMigrationStarted,
    UserPasswordChanged,
    JointSessionStarted,
    JointSessionStationJoined,
    JointSessionStationLeft,
    JointSessionHostChanged,
    JointSessionEnded,
}

impl SessionEventType {
    pub const fn is_joint_session(self) -> bool {
        matches!(
            self,
            SessionEventType::JointSessionStarted
                | SessionEventType::JointSessionStationJoined
                | SessionEventType::JointSessionStationLeft
                | SessionEventType::JointSessionHostChanged
                | SessionEventType::JointSessionEnded
        )
    }
}

/// A single notification, delivered in engine emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub event_type: SessionEventType,
    pub station_constant_id: ConstantId,
    pub station_index: StationIndex,
}

impl SessionEvent {
    pub const fn new(
        event_type: SessionEventType,
        station_constant_id: ConstantId,
        station_index: StationIndex,
    ) -> Self {
        Self {
            event_type,
            station_constant_id,
            station_index,
        }
    }
}
