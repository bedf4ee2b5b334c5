use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter};

use crate::result::EngineResult;

/// Category of an asynchronous operation. Each category has exactly one
/// in-flight slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, Serialize, Deserialize,
)]
pub enum AsyncProcessId {
    ChangeState,
    HandleError,
    CreateSession,
    JoinSession,
    JoinRandomSession,
    BrowseSession,
    OpenSession,
    CloseSession,
    UpdateSessionSetting,
    RequestSessionProperty,
    CreateJointSession,
    JoinJointSession,
    OpenJointSession,
    CloseJointSession,
    UpdateJointSessionSetting,
    RequestJointSessionProperty,
}

impl AsyncProcessId {
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Operations that can move the lifecycle. At most one of them may be
    /// in flight at a time.
    pub const fn affects_lifecycle(self) -> bool {
        matches!(
            self,
            AsyncProcessId::ChangeState
                | AsyncProcessId::HandleError
                | AsyncProcessId::CreateSession
                | AsyncProcessId::JoinSession
                | AsyncProcessId::JoinRandomSession
                | AsyncProcessId::CreateJointSession
                | AsyncProcessId::JoinJointSession
        )
    }

    pub const fn is_joint_session(self) -> bool {
        matches!(
            self,
            AsyncProcessId::CreateJointSession
                | AsyncProcessId::JoinJointSession
                | AsyncProcessId::OpenJointSession
                | AsyncProcessId::CloseJointSession
                | AsyncProcessId::UpdateJointSessionSetting
                | AsyncProcessId::RequestJointSessionProperty
        )
    }
}

/// Polled view of an operation slot.
///
/// `is_completed == false` means the operation is still running or was
/// never started; `result` is only meaningful once completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncState {
    pub is_completed: bool,
    pub result: EngineResult,
}

impl AsyncState {
    pub const fn pending() -> Self {
        Self {
            is_completed: false,
            result: EngineResult::SUCCESS,
        }
    }

    pub const fn completed(result: EngineResult) -> Self {
        Self {
            is_completed: true,
            result,
        }
    }

    /// Completed with a success result.
    pub const fn succeeded(&self) -> bool {
        self.is_completed && self.result.is_success()
    }

    /// Completed with a failure result.
    pub const fn failed(&self) -> bool {
        self.is_completed && self.result.is_failure()
    }
}

impl Default for AsyncState {
    fn default() -> Self {
        Self::pending()
    }
}
