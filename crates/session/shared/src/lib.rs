//! Shared session types for the session control layer.
//!
//! This crate hosts the plain data that crosses the engine boundary:
//! - result: outcome values, result codes and the handling-type ladder
//! - state: lifecycle stages and their forward/backward naming
//! - process: async operation categories and their polled state
//! - events: membership/topology notifications emitted by the engine
//! - station / property: point-in-time snapshots
//! - settings: parameter objects with set-time validation
//!
//! Keep this crate free of engine knowledge. Everything that talks to an
//! engine lives in `session_control`.

/// Session membership and topology notifications
pub mod events;
/// Async operation categories and polled completion state
pub mod process;
/// Session / joint-session property snapshots and network diagnostics
pub mod property;
/// Outcome values returned by every engine-crossing call
pub mod result;
/// Settings objects used to create, search, update and join sessions
pub mod settings;
/// Lifecycle stages
pub mod state;
/// Station identifiers and snapshots
pub mod station;

pub use events::{SessionEvent, SessionEventType};
pub use process::{AsyncProcessId, AsyncState};
pub use property::{JointSessionProperty, NetworkDiagnostics, SessionProperty};
pub use result::{EngineFailure, EngineResult, HandlingType, ResultCode, ViewerType};
pub use state::{Direction, State};
pub use station::{ConstantId, StationIndex, StationInfo};

/// Convenience prelude for downstream crates.
pub mod prelude {
    pub use crate::settings::{
        CreateJointSessionSetting, CreateSessionSetting, JoinRandomSessionSetting,
        JoinSessionSetting, SessionSearchCriteria, UpdateJointSessionSetting,
        UpdateSessionSetting,
    };
    pub use crate::{
        AsyncProcessId, AsyncState, Direction, EngineResult, HandlingType, ResultCode,
        SessionEvent, SessionEventType, State,
    };
}
