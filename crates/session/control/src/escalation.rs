//! Error escalation.
//!
//! A failed [`EngineResult`] carries a [`HandlingType`]. This module maps that
//! level to the stage a caller should fall back to and to the ordered engine
//! remediation steps that prepare the fallback. Remediation only cleans up
//! engine-side resources; moving the lifecycle is a separate transition
//! request towards [`target_state_for`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use session_shared::{EngineResult, HandlingType, State};
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, info, warn};

/// Engine-side cleanup action run while handling an error.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum RemediationStep {
    LeaveSession,
    CleanupSession,
    Logout,
    ShutdownNetwork,
    Finalize,
}

impl RemediationStep {
    /// Lowest handling level that requires this step.
    pub const fn required_from(self) -> HandlingType {
        match self {
            RemediationStep::LeaveSession => HandlingType::CleanupWithLeave,
            RemediationStep::CleanupSession => HandlingType::Cleanup,
            RemediationStep::Logout => HandlingType::LogoutWithLeave,
            RemediationStep::ShutdownNetwork => HandlingType::ShutdownNetwork,
            RemediationStep::Finalize => HandlingType::Finalize,
        }
    }

    /// Ordered steps for `handling`. Empty for transient levels and for
    /// programming errors.
    pub fn plan(handling: HandlingType) -> Vec<RemediationStep> {
        if handling.is_programming_error() {
            return Vec::new();
        }
        RemediationStep::iter()
            .filter(|step| handling.subsumes(step.required_from()))
            .collect()
    }
}

/// Stage a caller should request after handling a failure of level
/// `handling` while at `current`.
///
/// Never returns a stage above `current`. Transient levels and programming
/// errors keep the current stage.
///
/// `CleanupWithLeave` falls back to [`State::SESSION_CLEANED_UP`] like
/// `Cleanup`, not to `SessionStartedUp`, so a more severe level never tears
/// down less than a milder one. The two levels differ only in their
/// remediation plan: `CleanupWithLeave` also leaves the session.
pub fn target_state_for(handling: HandlingType, current: State) -> State {
    let fallback = match handling {
        HandlingType::Ignorable | HandlingType::Retry | HandlingType::ProgrammingError => {
            return current;
        }
        HandlingType::Cleanup | HandlingType::CleanupWithLeave => State::SESSION_CLEANED_UP,
        HandlingType::LogoutWithLeave => State::LOGGED_OUT,
        HandlingType::ShutdownNetwork => State::NETWORK_CLEANED_UP,
        HandlingType::Finalize => State::NotInitialized,
    };
    current.min(fallback)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// Issue this step to the engine.
    Next(RemediationStep),
    /// Remediation is over. Success when every step succeeded, otherwise the
    /// last failing step's result.
    Finished(EngineResult),
}

/// Runs one remediation at a time and folds in failures that arrive while it
/// is running.
#[derive(Debug, Default)]
pub struct ErrorResolver {
    handling_result: Option<EngineResult>,
    remaining: VecDeque<RemediationStep>,
    performed: Vec<RemediationStep>,
    in_flight: Option<RemediationStep>,
    step_failure: Option<EngineResult>,
}

impl ErrorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The failure currently driving remediation, after escalation.
    pub fn current_handling_result(&self) -> Option<EngineResult> {
        self.handling_result
    }

    pub fn in_flight(&self) -> Option<RemediationStep> {
        self.in_flight
    }

    /// Starts handling `result` and returns the first step, or `None` when
    /// nothing has to be done.
    pub fn begin(&mut self, result: EngineResult) -> Result<Option<RemediationStep>, EngineResult> {
        if result.is_success() || result.handling_type().is_programming_error() {
            return Err(EngineResult::invalid_argument());
        }
        if self.is_active() {
            return Err(EngineResult::invalid_state());
        }

        self.handling_result = Some(result);
        self.remaining = RemediationStep::plan(result.handling_type()).into();
        self.performed.clear();
        self.step_failure = None;
        info!(%result, steps = self.remaining.len(), "handling error");
        Ok(self.advance())
    }

    /// Offers a failure that arrived while remediation is running.
    ///
    /// The failure replaces the handled result when its level is at least as
    /// severe; steps it adds that were not yet performed are appended.
    /// Returns whether the failure was taken over.
    pub fn escalate(&mut self, result: EngineResult) -> bool {
        if !self.is_active() || result.is_success() || result.handling_type().is_programming_error() {
            return false;
        }
        let Some(current) = self.handling_result else {
            return false;
        };
        if result.handling_type() < current.handling_type() {
            debug!(%result, handling = %current, "failure below current handling level");
            return false;
        }

        if result.handling_type() > current.handling_type() {
            warn!(from = %current.handling_type(), to = %result.handling_type(), "error handling escalated");
        }
        self.handling_result = Some(result);
        self.remaining = RemediationStep::plan(result.handling_type())
            .into_iter()
            .filter(|step| !self.performed.contains(step) && self.in_flight != Some(*step))
            .collect();
        true
    }

    /// Feeds the engine's completion of the in-flight step.
    pub fn on_step_completed(&mut self, result: EngineResult) -> RemediationOutcome {
        if result.is_failure() {
            warn!(step = ?self.in_flight, %result, "remediation step failed");
            self.escalate(result);
            self.step_failure = Some(result);
        }
        if let Some(step) = self.in_flight.take() {
            self.performed.push(step);
        }

        match self.advance() {
            Some(step) => RemediationOutcome::Next(step),
            None => {
                let outcome = self.step_failure.unwrap_or(EngineResult::success());
                info!(%outcome, performed = ?self.performed, "error handling finished");
                RemediationOutcome::Finished(outcome)
            }
        }
    }

    fn advance(&mut self) -> Option<RemediationStep> {
        self.in_flight = self.remaining.pop_front();
        self.in_flight
    }
}
