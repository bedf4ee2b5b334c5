//! Engine boundary.
//!
//! The control layer never talks to a network stack directly. It hands
//! [`EngineRequest`]s to a [`SessionEngine`], which acknowledges them
//! synchronously and reports completions, background failures and session
//! events from [`SessionEngine::step`].

pub mod loopback;

pub use loopback::{FailurePoint, LoopbackEngine};

use serde::{Deserialize, Serialize};
use session_shared::settings::{
    CreateJointSessionSetting, CreateSessionSetting, JoinRandomSessionSetting,
    JoinSessionSetting, SessionSearchCriteria, UpdateJointSessionSetting, UpdateSessionSetting,
};
use session_shared::{
    AsyncProcessId, EngineResult, JointSessionProperty, NetworkDiagnostics, SessionEvent,
    SessionProperty, StationInfo,
};

use crate::escalation::RemediationStep;
use crate::lifecycle::LifecycleStep;

/// Work handed to the engine. Each request belongs to exactly one
/// [`AsyncProcessId`] category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineRequest {
    Lifecycle(LifecycleStep),
    Remediate(RemediationStep),
    CreateSession(CreateSessionSetting),
    JoinSession(JoinSessionSetting),
    JoinRandomSession(JoinRandomSessionSetting),
    BrowseSession(SessionSearchCriteria),
    OpenSession,
    CloseSession,
    UpdateSessionSetting(UpdateSessionSetting),
    RequestSessionProperty,
    CreateJointSession(CreateJointSessionSetting),
    JoinJointSession { joint_session_id: u32 },
    OpenJointSession,
    CloseJointSession,
    UpdateJointSessionSetting(UpdateJointSessionSetting),
    RequestJointSessionProperty,
}

impl EngineRequest {
    pub fn process_id(&self) -> AsyncProcessId {
        match self {
            EngineRequest::Lifecycle(_) => AsyncProcessId::ChangeState,
            EngineRequest::Remediate(_) => AsyncProcessId::HandleError,
            EngineRequest::CreateSession(_) => AsyncProcessId::CreateSession,
            EngineRequest::JoinSession(_) => AsyncProcessId::JoinSession,
            EngineRequest::JoinRandomSession(_) => AsyncProcessId::JoinRandomSession,
            EngineRequest::BrowseSession(_) => AsyncProcessId::BrowseSession,
            EngineRequest::OpenSession => AsyncProcessId::OpenSession,
            EngineRequest::CloseSession => AsyncProcessId::CloseSession,
            EngineRequest::UpdateSessionSetting(_) => AsyncProcessId::UpdateSessionSetting,
            EngineRequest::RequestSessionProperty => AsyncProcessId::RequestSessionProperty,
            EngineRequest::CreateJointSession(_) => AsyncProcessId::CreateJointSession,
            EngineRequest::JoinJointSession { .. } => AsyncProcessId::JoinJointSession,
            EngineRequest::OpenJointSession => AsyncProcessId::OpenJointSession,
            EngineRequest::CloseJointSession => AsyncProcessId::CloseJointSession,
            EngineRequest::UpdateJointSessionSetting(_) => {
                AsyncProcessId::UpdateJointSessionSetting
            }
            EngineRequest::RequestJointSessionProperty => {
                AsyncProcessId::RequestJointSessionProperty
            }
        }
    }
}

/// Everything an engine reports from a step.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    /// The running request of `id` finished.
    Completed {
        id: AsyncProcessId,
        result: EngineResult,
    },
    /// A failure not tied to a request, e.g. a lost connection.
    Failure(EngineResult),
    Event(SessionEvent),
}

/// A session networking engine driven by the control layer.
pub trait SessionEngine {
    /// Accepts or rejects a request. A success acknowledgement promises a
    /// later [`EngineNotice::Completed`] for the request's category.
    fn start(&mut self, request: EngineRequest) -> EngineResult;

    /// Abandons the running request of `id` without completing it.
    fn cancel(&mut self, id: AsyncProcessId);

    /// Advances the engine and appends what happened, in emission order.
    fn step(&mut self, notices: &mut Vec<EngineNotice>);

    fn session_property(&self) -> Option<SessionProperty>;

    fn joint_session_property(&self) -> Option<JointSessionProperty>;

    /// Results of the last completed browse.
    fn browse_results(&self) -> Vec<SessionProperty>;

    fn stations(&self) -> Vec<StationInfo>;

    fn diagnostics(&self) -> NetworkDiagnostics;
}
