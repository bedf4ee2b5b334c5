//! Lifecycle state machine.
//!
//! The machine walks one stage at a time towards a requested target. Every
//! stage change is an engine request (a [`LifecycleStep`]); the next step is
//! only issued after the engine reported the previous one as completed during
//! dispatch. On failure the machine stays on the last stage it entered.

use serde::{Deserialize, Serialize};
use session_shared::{Direction, EngineResult, State};
use strum::{Display, EnumIter};
use tracing::{debug, info, warn};

/// A single engine action that moves the lifecycle by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum LifecycleStep {
    StartupNetwork,
    Login,
    InitializeSession,
    StartupSession,
    JoinSession,
    JoinJointSession,
    StartBrowseMatchmake,
    CleanupNetwork,
    Logout,
    FinalizeSession,
    CleanupSession,
    LeaveSession,
    LeaveJointSession,
    StopBrowseMatchmake,
}

// Indexed by the ordinal of the stage being left.
const FORWARD_STEPS: [LifecycleStep; 7] = [
    LifecycleStep::StartupNetwork,
    LifecycleStep::Login,
    LifecycleStep::InitializeSession,
    LifecycleStep::StartupSession,
    LifecycleStep::JoinSession,
    LifecycleStep::JoinJointSession,
    LifecycleStep::StartBrowseMatchmake,
];

// Indexed by the ordinal of the stage being entered.
const BACKWARD_STEPS: [LifecycleStep; 7] = [
    LifecycleStep::CleanupNetwork,
    LifecycleStep::Logout,
    LifecycleStep::FinalizeSession,
    LifecycleStep::CleanupSession,
    LifecycleStep::LeaveSession,
    LifecycleStep::LeaveJointSession,
    LifecycleStep::StopBrowseMatchmake,
];

impl LifecycleStep {
    /// The step that leaves `from` in `direction`.
    pub fn leaving(from: State, direction: Direction) -> Option<LifecycleStep> {
        let ordinal = from.ordinal() as usize;
        match direction {
            Direction::Forward => FORWARD_STEPS.get(ordinal).copied(),
            Direction::Backward => ordinal
                .checked_sub(1)
                .and_then(|index| BACKWARD_STEPS.get(index))
                .copied(),
        }
    }

    pub fn direction(self) -> Direction {
        if FORWARD_STEPS.contains(&self) {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

/// What happened after the engine completed the in-flight step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Entered an intermediate stage; `next` has to be issued.
    Advanced { next: LifecycleStep },
    /// The target stage was entered.
    Reached(State),
    /// The step failed. The machine stays on the last entered stage.
    Failed(EngineResult),
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    target: State,
    direction: Direction,
    step: LifecycleStep,
}

#[derive(Debug)]
pub struct LifecycleMachine {
    current: State,
    entered_via: Direction,
    transition: Option<Transition>,
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self {
            current: State::NotInitialized,
            entered_via: Direction::Forward,
            transition: None,
        }
    }

    pub fn current(&self) -> State {
        self.current
    }

    /// Direction the current stage was entered from.
    pub fn entered_via(&self) -> Direction {
        self.entered_via
    }

    /// Current stage under its directional name (`SessionLeft` rather than
    /// `SessionStartedUp` after leaving a session).
    pub fn label(&self) -> &'static str {
        self.current.label(self.entered_via)
    }

    pub fn target(&self) -> Option<State> {
        self.transition.map(|t| t.target)
    }

    pub fn in_flight_step(&self) -> Option<LifecycleStep> {
        self.transition.map(|t| t.step)
    }

    pub fn in_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Validates a request and returns the direction of travel, `None` when
    /// `target` is the current stage.
    ///
    /// Fails with `InvalidState` while a transition is running.
    pub fn check(&self, target: State) -> Result<Option<Direction>, EngineResult> {
        if self.transition.is_some() {
            return Err(EngineResult::invalid_state());
        }
        Ok(self.current.direction_to(target))
    }

    /// Starts a transition and returns the first step to issue. Returns
    /// `None` without starting anything when `target` is the current stage.
    pub fn begin(&mut self, target: State) -> Result<Option<LifecycleStep>, EngineResult> {
        let Some(direction) = self.check(target)? else {
            return Ok(None);
        };
        let step = LifecycleStep::leaving(self.current, direction)
            .ok_or(EngineResult::invalid_argument())?;
        self.transition = Some(Transition {
            target,
            direction,
            step,
        });
        debug!(from = %self.current, to = %target, %direction, first = %step, "transition started");
        Ok(Some(step))
    }

    /// Feeds the engine's completion of the in-flight step.
    ///
    /// Returns `None` when no transition is running.
    pub fn on_step_completed(&mut self, result: EngineResult) -> Option<StepOutcome> {
        let mut transition = self.transition.take()?;

        if result.is_failure() {
            warn!(
                step = %transition.step,
                stage = %self.current,
                target = %transition.target,
                %result,
                "lifecycle step failed"
            );
            return Some(StepOutcome::Failed(result));
        }

        let Some(next_stage) = self.current.next(transition.direction) else {
            return Some(StepOutcome::Failed(EngineResult::invalid_state()));
        };
        self.enter(next_stage, transition.direction);

        if next_stage == transition.target {
            return Some(StepOutcome::Reached(next_stage));
        }

        match LifecycleStep::leaving(next_stage, transition.direction) {
            Some(step) => {
                transition.step = step;
                self.transition = Some(transition);
                Some(StepOutcome::Advanced { next: step })
            }
            None => Some(StepOutcome::Failed(EngineResult::invalid_state())),
        }
    }

    /// Drops the running transition and returns the step that was in flight.
    pub fn abort(&mut self) -> Option<LifecycleStep> {
        self.transition.take().map(|t| {
            debug!(step = %t.step, stage = %self.current, "transition aborted");
            t.step
        })
    }

    /// Records a stage entered outside of a transition (session create/join).
    pub fn enter(&mut self, stage: State, direction: Direction) {
        info!(stage = stage.label(direction), "lifecycle stage entered");
        self.current = stage;
        self.entered_via = direction;
    }
}
