//! Outcome values for engine-crossing calls.
//!
//! Every call that reaches the engine yields exactly one [`EngineResult`].
//! The value is immutable; failures carry a [`HandlingType`] that tells the
//! caller how much of the lifecycle has to be torn down before retrying.

use core::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use thiserror::Error;

/// Domain result codes. `Success` is the zero sentinel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[repr(u32)]
pub enum ResultCode {
    Success = 0,
    // Caller contract violations.
    InvalidArgument = 1,
    InvalidState = 2,
    NotInitialized = 3,
    NotImplemented = 4,
    // Transient conditions.
    BufferFull = 10,
    TemporarilyUnavailable = 11,
    Timeout = 12,
    Cancelled = 13,
    // Session / network loss.
    SessionNotFound = 20,
    SessionFull = 21,
    SessionClosed = 22,
    WrongUserPassword = 23,
    HostMigrationFailed = 24,
    ConnectionLost = 30,
    AuthenticationFailed = 31,
    NetworkUnavailable = 32,
    // Forwarded as-is.
    EngineInternal = 99,
}

impl ResultCode {
    pub const fn raw(self) -> u32 {
        self as u32
    }

    pub const fn is_success(self) -> bool {
        matches!(self, ResultCode::Success)
    }

    /// Codes that only a misbehaving caller can produce.
    pub const fn is_contract_violation(self) -> bool {
        matches!(
            self,
            ResultCode::InvalidArgument
                | ResultCode::InvalidState
                | ResultCode::NotInitialized
                | ResultCode::NotImplemented
        )
    }
}

/// Whether a platform error viewer should be shown for a result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, Serialize, Deserialize,
)]
pub enum ViewerType {
    ShouldUse,
    MayUse,
    #[default]
    ShouldNotUse,
}

impl ViewerType {
    pub const fn allows_viewer(self) -> bool {
        !matches!(self, ViewerType::ShouldNotUse)
    }
}

/// Severity ladder for failures.
///
/// Ordered from least to most severe. A level implies the remediation of
/// every level below it: `ShutdownNetwork` means cleanup, leave and logout
/// happen before the network goes down. `ProgrammingError` is terminal and
/// never remediated automatically.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum HandlingType {
    #[default]
    Ignorable,
    Retry,
    Cleanup,
    CleanupWithLeave,
    LogoutWithLeave,
    ShutdownNetwork,
    Finalize,
    ProgrammingError,
}

impl HandlingType {
    /// True when `self` includes the remediation of `other`.
    pub fn subsumes(self, other: HandlingType) -> bool {
        self >= other
    }

    /// Levels that can be handled without touching the lifecycle.
    pub const fn is_transient(self) -> bool {
        matches!(self, HandlingType::Ignorable | HandlingType::Retry)
    }

    pub const fn is_programming_error(self) -> bool {
        matches!(self, HandlingType::ProgrammingError)
    }
}

/// Immutable outcome of an engine-crossing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub struct EngineResult {
    code: ResultCode,
    error_code: u32,
    viewer: ViewerType,
    handling: HandlingType,
}

impl EngineResult {
    pub const SUCCESS: EngineResult = EngineResult {
        code: ResultCode::Success,
        error_code: 0,
        viewer: ViewerType::ShouldNotUse,
        handling: HandlingType::Ignorable,
    };

    pub const fn new(code: ResultCode, handling: HandlingType) -> Self {
        Self {
            code,
            error_code: 0,
            viewer: ViewerType::ShouldNotUse,
            handling,
        }
    }

    pub const fn success() -> Self {
        Self::SUCCESS
    }

    /// Contract violation: a parameter was rejected.
    pub const fn invalid_argument() -> Self {
        Self::new(ResultCode::InvalidArgument, HandlingType::ProgrammingError)
    }

    /// Contract violation: the call is not allowed right now.
    pub const fn invalid_state() -> Self {
        Self::new(ResultCode::InvalidState, HandlingType::ProgrammingError)
    }

    pub const fn not_initialized() -> Self {
        Self::new(ResultCode::NotInitialized, HandlingType::ProgrammingError)
    }

    pub const fn not_implemented() -> Self {
        Self::new(ResultCode::NotImplemented, HandlingType::ProgrammingError)
    }

    /// An in-flight transition that was abandoned in favour of a terminate request.
    pub const fn cancelled() -> Self {
        Self::new(ResultCode::Cancelled, HandlingType::Ignorable)
    }

    /// Attaches the opaque platform error code used for the error viewer.
    pub const fn with_error_code(mut self, error_code: u32) -> Self {
        self.error_code = error_code;
        self
    }

    pub const fn with_viewer(mut self, viewer: ViewerType) -> Self {
        self.viewer = viewer;
        self
    }

    pub const fn code(&self) -> ResultCode {
        self.code
    }

    pub const fn error_code(&self) -> u32 {
        self.error_code
    }

    pub const fn viewer_type(&self) -> ViewerType {
        self.viewer
    }

    pub const fn handling_type(&self) -> HandlingType {
        self.handling
    }

    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    pub const fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Converts into a `Result` so callers can use `?`.
    pub fn into_result(self) -> Result<(), EngineFailure> {
        if self.is_success() {
            Ok(())
        } else {
            Err(EngineFailure(self))
        }
    }
}

impl Default for EngineResult {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl fmt::Display for EngineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            return write!(f, "Success");
        }
        write!(f, "{} (handling: {}", self.code, self.handling)?;
        if self.error_code != 0 {
            write!(f, ", error code {:#010x}", self.error_code)?;
        }
        write!(f, ")")
    }
}

/// A failed [`EngineResult`] lifted into the error world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("engine call failed: {0}")]
pub struct EngineFailure(pub EngineResult);

impl EngineFailure {
    pub const fn result(&self) -> EngineResult {
        self.0
    }

    pub const fn handling_type(&self) -> HandlingType {
        self.0.handling_type()
    }
}

impl From<EngineFailure> for EngineResult {
    fn from(failure: EngineFailure) -> Self {
        failure.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ladder_is_totally_ordered() {
        let levels: Vec<_> = HandlingType::iter().collect();
        for pair in levels.windows(2) {
            assert!(pair[0] < pair[1], "{} should be below {}", pair[0], pair[1]);
        }
        assert!(HandlingType::ShutdownNetwork.subsumes(HandlingType::CleanupWithLeave));
        assert!(!HandlingType::Cleanup.subsumes(HandlingType::LogoutWithLeave));
    }

    #[test]
    fn contract_violations_are_programming_errors() {
        for result in [
            EngineResult::invalid_argument(),
            EngineResult::invalid_state(),
            EngineResult::not_initialized(),
            EngineResult::not_implemented(),
        ] {
            assert!(result.is_failure());
            assert!(result.code().is_contract_violation());
            assert_eq!(result.handling_type(), HandlingType::ProgrammingError);
        }
    }

    #[test]
    fn success_converts_to_ok() {
        assert!(EngineResult::success().into_result().is_ok());
        let failure = EngineResult::new(ResultCode::ConnectionLost, HandlingType::ShutdownNetwork)
            .into_result()
            .unwrap_err();
        assert_eq!(failure.handling_type(), HandlingType::ShutdownNetwork);
        assert_eq!(failure.result().code(), ResultCode::ConnectionLost);
    }

    #[test]
    fn display_includes_error_code_when_present() {
        let result = EngineResult::new(ResultCode::Timeout, HandlingType::Retry)
            .with_error_code(0x0102_0304)
            .with_viewer(ViewerType::MayUse);
        let text = result.to_string();
        assert!(text.contains("Timeout"));
        assert!(text.contains("0x01020304"));
        assert!(result.viewer_type().allows_viewer());
        assert_eq!(EngineResult::success().to_string(), "Success");
    }
}
