//! Session control layer.
//!
//! Drives a peer-to-peer session engine through its lifecycle
//! (network startup, login, session startup, join, joint sessions, browse
//! matchmaking and the matching teardown), tracks asynchronous operations
//! per category, escalates failures to remediation plans and buffers
//! session events per frame.
//!
//! Start with [`SessionContext`]; [`LoopbackEngine`] provides an in-process
//! engine for singleplayer runs and tests.

/// TOML configuration and its validation
pub mod config;
/// The context callers talk to
pub mod context;
/// Engine boundary and the loopback engine
pub mod engine;
/// Handling-type ladder, fallback stages and remediation plans
pub mod escalation;
/// Per-frame session event buffer
pub mod events;
/// Lifecycle state machine
pub mod lifecycle;
mod recovery;
/// Per-category async operation slots
pub mod tracker;

#[cfg(feature = "bevy")]
pub mod bevy;

pub use config::{ConfigError, ControlConfig, ProgrammingErrorPolicy};
pub use context::SessionContext;
pub use engine::{EngineNotice, EngineRequest, FailurePoint, LoopbackEngine, SessionEngine};
pub use escalation::{target_state_for, RemediationStep};
pub use events::DrainedEvents;
pub use lifecycle::LifecycleStep;
pub use recovery::RecoveryPhase;
pub use tracker::Completion;

pub use session_shared as shared;
