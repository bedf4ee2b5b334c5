//! Bookkeeping for automatic error recovery.
//!
//! With `recovery.auto_handle_errors` enabled the context handles failures
//! on its own: first the remediation, then a transition to the fallback
//! stage. This type only remembers where that process stands.

use session_shared::{AsyncProcessId, EngineResult, HandlingType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPhase {
    #[default]
    Idle,
    Remediating,
    Transitioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingFailure {
    pub source: Option<AsyncProcessId>,
    pub result: EngineResult,
}

#[derive(Debug, Default)]
pub(crate) struct AutoRecovery {
    phase: RecoveryPhase,
    pending: Option<PendingFailure>,
}

impl AutoRecovery {
    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: RecoveryPhase) {
        self.phase = phase;
    }

    /// Remembers the most severe failure that needs lifecycle work. Failures
    /// during remediation are folded in by the resolver instead.
    pub fn note_failure(&mut self, source: Option<AsyncProcessId>, result: EngineResult) {
        let handling = result.handling_type();
        if self.phase == RecoveryPhase::Remediating
            || handling < HandlingType::Cleanup
            || handling.is_programming_error()
        {
            return;
        }
        match self.pending {
            Some(current) if current.result.handling_type() > handling => {}
            _ => self.pending = Some(PendingFailure { source, result }),
        }
    }

    pub fn take_pending(&mut self) -> Option<PendingFailure> {
        self.pending.take()
    }

    pub fn restore(&mut self, pending: PendingFailure) {
        if self.pending.is_none() {
            self.pending = Some(pending);
        }
    }
}
