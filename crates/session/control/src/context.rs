//! The session context.
//!
//! [`SessionContext`] owns an engine and is the only entry point callers use.
//! Everything is driven from one thread: requests return an acknowledgement
//! immediately, the outcome shows up in [`SessionContext::poll`] after a later
//! [`SessionContext::dispatch`]. A dispatch steps the engine once, applies
//! the completions it reported to the lifecycle machine and the error
//! resolver, and refills the event queue.

use session_shared::settings::{
    CreateJointSessionSetting, CreateSessionSetting, JoinRandomSessionSetting,
    JoinSessionSetting, SessionSearchCriteria, UpdateJointSessionSetting, UpdateSessionSetting,
};
use session_shared::{
    AsyncProcessId, AsyncState, Direction, EngineResult, HandlingType, JointSessionProperty,
    NetworkDiagnostics, SessionProperty, State, StationInfo,
};
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

use crate::config::{ControlConfig, ProgrammingErrorPolicy};
use crate::engine::{EngineNotice, EngineRequest, LoopbackEngine, SessionEngine};
use crate::escalation::{target_state_for, ErrorResolver, RemediationOutcome};
use crate::events::{DrainedEvents, SessionEventQueue};
use crate::lifecycle::{LifecycleMachine, StepOutcome};
use crate::recovery::{AutoRecovery, RecoveryPhase};
use crate::tracker::{AsyncTracker, Completion};

/// Stage requirement of a session operation.
#[derive(Debug, Clone, Copy)]
enum Requirement {
    Exactly(State),
    AtLeast(State),
}

impl Requirement {
    fn allows(self, stage: State) -> bool {
        match self {
            Requirement::Exactly(required) => stage == required,
            Requirement::AtLeast(required) => stage >= required,
        }
    }
}

pub struct SessionContext<E> {
    engine: E,
    config: ControlConfig,
    lifecycle: LifecycleMachine,
    tracker: AsyncTracker,
    resolver: ErrorResolver,
    events: SessionEventQueue,
    recovery: AutoRecovery,
    last_failure: Option<EngineResult>,
    notices: Vec<EngineNotice>,
}

impl SessionContext<LoopbackEngine> {
    /// Context backed by an in-process loopback engine.
    pub fn loopback(config: ControlConfig) -> Self {
        let engine = LoopbackEngine::new(config.loopback.clone());
        Self::new(engine, config)
    }
}

impl<E: SessionEngine> SessionContext<E> {
    pub fn new(engine: E, config: ControlConfig) -> Self {
        let events = SessionEventQueue::new(config.events.warn_on_dropped);
        Self {
            engine,
            config,
            lifecycle: LifecycleMachine::new(),
            tracker: AsyncTracker::new(),
            resolver: ErrorResolver::new(),
            events,
            recovery: AutoRecovery::default(),
            last_failure: None,
            notices: Vec::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Tears the context down and hands the engine back.
    pub fn into_engine(self) -> E {
        if self.lifecycle.current() != State::NotInitialized {
            warn!(stage = self.lifecycle.label(), "context dropped before terminating");
        }
        self.engine
    }

    /* --------------------------------------------------------------------- */
    /* Lifecycle                                                             */
    /* --------------------------------------------------------------------- */

    pub fn state(&self) -> State {
        self.lifecycle.current()
    }

    /// Current stage under its directional name, e.g. `SessionLeft`.
    pub fn state_label(&self) -> &'static str {
        self.lifecycle.label()
    }

    pub fn entered_via(&self) -> Direction {
        self.lifecycle.entered_via()
    }

    /// Target of the running transition.
    pub fn target_state(&self) -> Option<State> {
        self.lifecycle.target()
    }

    /// Starts walking the lifecycle towards `target`, one stage per engine
    /// step. Progress and outcome are tracked under
    /// [`AsyncProcessId::ChangeState`].
    ///
    /// Requesting the current stage completes at once with success.
    /// Requesting [`State::NotInitialized`] while a transition is running
    /// abandons that transition (its result becomes `Cancelled`) and tears
    /// down from the last entered stage. Any other operation still in flight
    /// blocks that request with `InvalidState`.
    pub fn request_transition(&mut self, target: State) -> EngineResult {
        const ID: AsyncProcessId = AsyncProcessId::ChangeState;

        if target == State::NotInitialized {
            if let Some(busy) = self.terminate_blocker() {
                debug!(blocked_by = %busy, "terminate blocked");
                return self.reject(ID, EngineResult::invalid_state());
            }
            if self.tracker.is_pending(ID) {
                return self.terminate();
            }
        }

        let admitted = self.tracker.can_begin(ID);
        if admitted.is_failure() {
            return self.reject(ID, admitted);
        }
        if let Some(busy) = self.lifecycle_busy(ID) {
            debug!(blocked_by = %busy, "transition blocked");
            return self.reject(ID, EngineResult::invalid_state());
        }

        let step = match self.lifecycle.begin(target) {
            Ok(Some(step)) => step,
            Ok(None) => {
                self.tracker.start(ID);
                self.finish(ID, EngineResult::success());
                debug!(stage = self.lifecycle.label(), "already at requested stage");
                return EngineResult::success();
            }
            Err(rejected) => return self.reject(ID, rejected),
        };
        let ack = self.engine.start(EngineRequest::Lifecycle(step));
        if ack.is_failure() {
            self.lifecycle.abort();
            return self.reject(ID, ack);
        }
        self.tracker.start(ID);
        info!(from = self.lifecycle.label(), to = %target, "lifecycle transition requested");
        EngineResult::success()
    }

    fn terminate(&mut self) -> EngineResult {
        const ID: AsyncProcessId = AsyncProcessId::ChangeState;

        if let Some(step) = self.lifecycle.abort() {
            self.engine.cancel(ID);
            info!(%step, stage = self.lifecycle.label(), "transition cancelled for terminate");
        }
        self.tracker.restart(ID, EngineResult::cancelled());

        let step = match self.lifecycle.begin(State::NotInitialized) {
            Ok(Some(step)) => step,
            Ok(None) => {
                self.finish(ID, EngineResult::success());
                return EngineResult::success();
            }
            Err(rejected) => {
                self.finish(ID, rejected);
                return self.reject(ID, rejected);
            }
        };
        let ack = self.engine.start(EngineRequest::Lifecycle(step));
        if ack.is_failure() {
            self.lifecycle.abort();
            self.finish(ID, ack);
            return self.reject(ID, ack);
        }
        EngineResult::success()
    }

    /* --------------------------------------------------------------------- */
    /* Async operation tracking                                              */
    /* --------------------------------------------------------------------- */

    /// Reads the state of `id` and marks a completed result as observed,
    /// which allows starting `id` again.
    pub fn poll(&mut self, id: AsyncProcessId) -> AsyncState {
        self.tracker.poll(id)
    }

    /// Like [`Self::poll`] without marking the result as observed.
    pub fn peek(&self, id: AsyncProcessId) -> AsyncState {
        self.tracker.peek(id)
    }

    pub fn last_started_id(&self) -> Option<AsyncProcessId> {
        self.tracker.last_started_id()
    }

    /// Handle resolving when the running operation of `id` completes.
    pub fn completion(&mut self, id: AsyncProcessId) -> Option<Completion> {
        self.tracker.watch(id)
    }

    /* --------------------------------------------------------------------- */
    /* Error handling                                                        */
    /* --------------------------------------------------------------------- */

    /// Fallback stage for a failure of level `handling` at the current stage.
    pub fn target_state_for(&self, handling: HandlingType) -> State {
        target_state_for(handling, self.lifecycle.current())
    }

    /// Runs the engine-side remediation for `result`, tracked under
    /// [`AsyncProcessId::HandleError`]. The lifecycle stage does not change;
    /// request a transition to [`Self::target_state_for`] afterwards.
    pub fn handle_error_async(&mut self, result: EngineResult) -> EngineResult {
        const ID: AsyncProcessId = AsyncProcessId::HandleError;

        if result.handling_type().is_programming_error() {
            error!(%result, "programming errors are not remediated");
        }
        let admitted = self.tracker.can_begin(ID);
        if admitted.is_failure() {
            return self.reject(ID, admitted);
        }
        if let Some(busy) = self.lifecycle_busy(ID) {
            debug!(blocked_by = %busy, "error handling blocked");
            return self.reject(ID, EngineResult::invalid_state());
        }

        match self.resolver.begin(result) {
            Err(rejected) => self.reject(ID, rejected),
            Ok(first) => {
                self.tracker.start(ID);
                match first {
                    Some(step) => self.run_remediation(RemediationOutcome::Next(step)),
                    None => self.finish(ID, EngineResult::success()),
                }
                EngineResult::success()
            }
        }
    }

    /// The failure the running or last remediation handled, after
    /// escalation.
    pub fn current_handling_result(&self) -> Option<EngineResult> {
        self.resolver.current_handling_result()
    }

    /// Most recent failure reported during dispatch.
    pub fn last_failure(&self) -> Option<EngineResult> {
        self.last_failure
    }

    pub fn recovery_phase(&self) -> RecoveryPhase {
        self.recovery.phase()
    }

    /* --------------------------------------------------------------------- */
    /* Session operations                                                    */
    /* --------------------------------------------------------------------- */

    pub fn create_session_async(&mut self, setting: &CreateSessionSetting) -> EngineResult {
        self.start_operation(
            EngineRequest::CreateSession(setting.clone()),
            Requirement::Exactly(State::SessionStartedUp),
        )
    }

    pub fn join_session_async(&mut self, setting: &JoinSessionSetting) -> EngineResult {
        self.start_operation(
            EngineRequest::JoinSession(setting.clone()),
            Requirement::Exactly(State::SessionStartedUp),
        )
    }

    pub fn join_random_session_async(&mut self, setting: &JoinRandomSessionSetting) -> EngineResult {
        self.start_operation(
            EngineRequest::JoinRandomSession(setting.clone()),
            Requirement::Exactly(State::SessionStartedUp),
        )
    }

    /// Searches for sessions. Results are read with [`Self::browse_results`].
    pub fn browse_session_async(&mut self, criteria: &SessionSearchCriteria) -> EngineResult {
        self.start_operation(
            EngineRequest::BrowseSession(criteria.clone()),
            Requirement::AtLeast(State::SessionStartedUp),
        )
    }

    pub fn open_session_async(&mut self) -> EngineResult {
        self.start_operation(
            EngineRequest::OpenSession,
            Requirement::AtLeast(State::SessionJoined),
        )
    }

    pub fn close_session_async(&mut self) -> EngineResult {
        self.start_operation(
            EngineRequest::CloseSession,
            Requirement::AtLeast(State::SessionJoined),
        )
    }

    pub fn update_session_setting_async(&mut self, setting: &UpdateSessionSetting) -> EngineResult {
        self.start_operation(
            EngineRequest::UpdateSessionSetting(setting.clone()),
            Requirement::AtLeast(State::SessionJoined),
        )
    }

    pub fn request_session_property_async(&mut self) -> EngineResult {
        self.start_operation(
            EngineRequest::RequestSessionProperty,
            Requirement::AtLeast(State::SessionJoined),
        )
    }

    pub fn create_joint_session_async(&mut self, setting: &CreateJointSessionSetting) -> EngineResult {
        self.start_operation(
            EngineRequest::CreateJointSession(setting.clone()),
            Requirement::Exactly(State::SessionJoined),
        )
    }

    pub fn join_joint_session_async(&mut self, joint_session_id: u32) -> EngineResult {
        self.start_operation(
            EngineRequest::JoinJointSession { joint_session_id },
            Requirement::Exactly(State::SessionJoined),
        )
    }

    pub fn open_joint_session_async(&mut self) -> EngineResult {
        self.start_operation(
            EngineRequest::OpenJointSession,
            Requirement::AtLeast(State::JointSessionJoined),
        )
    }

    pub fn close_joint_session_async(&mut self) -> EngineResult {
        self.start_operation(
            EngineRequest::CloseJointSession,
            Requirement::AtLeast(State::JointSessionJoined),
        )
    }

    pub fn update_joint_session_setting_async(
        &mut self,
        setting: &UpdateJointSessionSetting,
    ) -> EngineResult {
        self.start_operation(
            EngineRequest::UpdateJointSessionSetting(setting.clone()),
            Requirement::AtLeast(State::JointSessionJoined),
        )
    }

    pub fn request_joint_session_property_async(&mut self) -> EngineResult {
        self.start_operation(
            EngineRequest::RequestJointSessionProperty,
            Requirement::AtLeast(State::JointSessionJoined),
        )
    }

    /* --------------------------------------------------------------------- */
    /* Queries                                                               */
    /* --------------------------------------------------------------------- */

    pub fn session_property(&self) -> Option<SessionProperty> {
        self.engine.session_property()
    }

    pub fn joint_session_property(&self) -> Option<JointSessionProperty> {
        self.engine.joint_session_property()
    }

    pub fn browse_results(&self) -> Vec<SessionProperty> {
        self.engine.browse_results()
    }

    pub fn stations(&self) -> Vec<StationInfo> {
        self.engine.stations()
    }

    pub fn diagnostics(&self) -> NetworkDiagnostics {
        self.engine.diagnostics()
    }

    /* --------------------------------------------------------------------- */
    /* Dispatch                                                              */
    /* --------------------------------------------------------------------- */

    /// Steps the engine once and applies what it reported. Call at least
    /// once per frame.
    pub fn dispatch(&mut self) {
        let mut notices = std::mem::take(&mut self.notices);
        notices.clear();
        self.engine.step(&mut notices);

        let mut events = Vec::new();
        for notice in notices.drain(..) {
            match notice {
                EngineNotice::Completed { id, result } => self.on_completed(id, result),
                EngineNotice::Failure(result) => self.on_failure(None, result),
                EngineNotice::Event(event) => events.push(event),
            }
        }
        self.notices = notices;
        self.events.refill(events);

        if self.config.recovery.auto_handle_errors {
            self.drive_recovery();
        }
    }

    /// Events of the last dispatch. Events are lost if not drained before
    /// the next dispatch.
    pub fn drain_events(&mut self) -> DrainedEvents {
        self.events.drain()
    }

    /* --------------------------------------------------------------------- */
    /* Internals                                                             */
    /* --------------------------------------------------------------------- */

    fn start_operation(&mut self, request: EngineRequest, requirement: Requirement) -> EngineResult {
        let id = request.process_id();

        let admitted = self.tracker.can_begin(id);
        if admitted.is_failure() {
            return self.reject(id, admitted);
        }
        if id.affects_lifecycle() {
            if let Some(busy) = self.lifecycle_busy(id) {
                debug!(operation = %id, blocked_by = %busy, "operation blocked");
                return self.reject(id, EngineResult::invalid_state());
            }
        }
        let stage = self.lifecycle.current();
        if stage == State::NotInitialized {
            return self.reject(id, EngineResult::not_initialized());
        }
        if !requirement.allows(stage) {
            debug!(operation = %id, ?requirement, stage = self.lifecycle.label(), "wrong stage");
            return self.reject(id, EngineResult::invalid_state());
        }

        let ack = self.engine.start(request);
        if ack.is_failure() {
            return self.reject(id, ack);
        }
        self.tracker.start(id);
        EngineResult::success()
    }

    /// A lifecycle-affecting operation other than `except` that is running.
    fn lifecycle_busy(&self, except: AsyncProcessId) -> Option<AsyncProcessId> {
        AsyncProcessId::iter()
            .find(|id| *id != except && id.affects_lifecycle() && self.tracker.is_pending(*id))
    }

    /// Any in-flight operation other than a transition blocks teardown to
    /// `NotInitialized`.
    fn terminate_blocker(&self) -> Option<AsyncProcessId> {
        self.tracker
            .pending()
            .find(|id| *id != AsyncProcessId::ChangeState)
    }

    fn reject(&self, operation: AsyncProcessId, result: EngineResult) -> EngineResult {
        if result.handling_type().is_programming_error() {
            error!(
                %operation,
                code = %result.code(),
                stage = self.lifecycle.label(),
                "programming error"
            );
            if self.config.recovery.programming_error_policy == ProgrammingErrorPolicy::Panic {
                panic!("{operation} rejected at {}: {result}", self.lifecycle.label());
            }
        } else {
            warn!(%operation, %result, "request rejected by engine");
        }
        result
    }

    fn finish(&mut self, id: AsyncProcessId, result: EngineResult) {
        if !self.tracker.complete(id, result) {
            warn!(operation = %id, %result, "completion for an operation that is not running");
        }
    }

    fn on_completed(&mut self, id: AsyncProcessId, result: EngineResult) {
        match id {
            AsyncProcessId::ChangeState => self.on_lifecycle_step(result),
            AsyncProcessId::HandleError => self.on_remediation_step(result),
            _ => {
                if result.is_success() {
                    self.enter_after(id);
                } else {
                    self.on_failure(Some(id), result);
                }
                self.finish(id, result);
            }
        }
    }

    // Session creation and joining move the lifecycle one stage up.
    fn enter_after(&mut self, id: AsyncProcessId) {
        let (from, to) = match id {
            AsyncProcessId::CreateSession
            | AsyncProcessId::JoinSession
            | AsyncProcessId::JoinRandomSession => (State::SessionStartedUp, State::SessionJoined),
            AsyncProcessId::CreateJointSession | AsyncProcessId::JoinJointSession => {
                (State::SessionJoined, State::JointSessionJoined)
            }
            _ => return,
        };
        if self.lifecycle.current() == from {
            self.lifecycle.enter(to, Direction::Forward);
        }
    }

    fn on_lifecycle_step(&mut self, result: EngineResult) {
        const ID: AsyncProcessId = AsyncProcessId::ChangeState;

        match self.lifecycle.on_step_completed(result) {
            None => warn!(%result, "lifecycle completion without a running transition"),
            Some(StepOutcome::Advanced { next }) => {
                let ack = self.engine.start(EngineRequest::Lifecycle(next));
                if ack.is_failure() {
                    self.lifecycle.abort();
                    self.on_failure(Some(ID), ack);
                    self.finish(ID, ack);
                }
            }
            Some(StepOutcome::Reached(_)) => {
                info!(stage = self.lifecycle.label(), "lifecycle transition finished");
                self.finish(ID, EngineResult::success());
            }
            Some(StepOutcome::Failed(failure)) => {
                self.on_failure(Some(ID), failure);
                self.finish(ID, failure);
            }
        }
    }

    fn on_remediation_step(&mut self, result: EngineResult) {
        if !self.resolver.is_active() {
            warn!(%result, "remediation completion without a running remediation");
            return;
        }
        let outcome = self.resolver.on_step_completed(result);
        self.run_remediation(outcome);
    }

    fn run_remediation(&mut self, mut outcome: RemediationOutcome) {
        loop {
            match outcome {
                RemediationOutcome::Next(step) => {
                    let ack = self.engine.start(EngineRequest::Remediate(step));
                    if ack.is_success() {
                        debug!(%step, "remediation step started");
                        return;
                    }
                    outcome = self.resolver.on_step_completed(ack);
                }
                RemediationOutcome::Finished(result) => {
                    self.finish(AsyncProcessId::HandleError, result);
                    return;
                }
            }
        }
    }

    fn on_failure(&mut self, source: Option<AsyncProcessId>, result: EngineResult) {
        match source {
            Some(id) => warn!(operation = %id, %result, "operation failed"),
            None => warn!(%result, "engine reported a failure"),
        }
        if result.handling_type().is_programming_error() {
            let _ = self.reject(source.unwrap_or(AsyncProcessId::ChangeState), result);
        }
        self.last_failure = Some(result);
        self.resolver.escalate(result);
        if self.config.recovery.auto_handle_errors {
            self.recovery.note_failure(source, result);
        }
    }

    fn drive_recovery(&mut self) {
        match self.recovery.phase() {
            RecoveryPhase::Idle => {
                let Some(pending) = self.recovery.take_pending() else {
                    return;
                };
                if let Some(id) = pending.source {
                    self.tracker.poll(id);
                }
                if self.tracker.is_pending(AsyncProcessId::HandleError)
                    || self.lifecycle_busy(AsyncProcessId::HandleError).is_some()
                {
                    self.recovery.restore(pending);
                    return;
                }
                // The context owns the HandleError slot while recovering.
                self.tracker.poll(AsyncProcessId::HandleError);
                info!(result = %pending.result, "automatic recovery started");
                if self.handle_error_async(pending.result).is_success() {
                    self.recovery.set_phase(RecoveryPhase::Remediating);
                }
            }
            RecoveryPhase::Remediating => {
                if !self.tracker.peek(AsyncProcessId::HandleError).is_completed {
                    return;
                }
                self.tracker.poll(AsyncProcessId::HandleError);
                let handling = self
                    .resolver
                    .current_handling_result()
                    .map_or(HandlingType::Ignorable, |r| r.handling_type());
                let target = self.target_state_for(handling);
                if target == State::NotInitialized {
                    if let Some(busy) = self.terminate_blocker() {
                        debug!(waiting_for = %busy, "recovery teardown deferred");
                        return;
                    }
                }
                if target == self.lifecycle.current() {
                    info!(stage = self.lifecycle.label(), "automatic recovery finished");
                    self.recovery.set_phase(RecoveryPhase::Idle);
                    return;
                }
                self.tracker.poll(AsyncProcessId::ChangeState);
                if self.request_transition(target).is_success() {
                    self.recovery.set_phase(RecoveryPhase::Transitioning);
                } else {
                    self.recovery.set_phase(RecoveryPhase::Idle);
                }
            }
            RecoveryPhase::Transitioning => {
                let state = self.tracker.peek(AsyncProcessId::ChangeState);
                if !state.is_completed {
                    return;
                }
                self.tracker.poll(AsyncProcessId::ChangeState);
                info!(
                    stage = self.lifecycle.label(),
                    result = %state.result,
                    "automatic recovery finished"
                );
                self.recovery.set_phase(RecoveryPhase::Idle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FailurePoint;
    use crate::lifecycle::LifecycleStep;
    use session_shared::ResultCode;

    fn context() -> SessionContext<LoopbackEngine> {
        SessionContext::loopback(ControlConfig::default())
    }

    fn settle(ctx: &mut SessionContext<LoopbackEngine>, id: AsyncProcessId) -> AsyncState {
        for _ in 0..64 {
            ctx.dispatch();
            if ctx.peek(id).is_completed {
                return ctx.poll(id);
            }
        }
        panic!("{id} did not complete");
    }

    fn goto(ctx: &mut SessionContext<LoopbackEngine>, target: State) {
        assert!(ctx.request_transition(target).is_success());
        assert!(settle(ctx, AsyncProcessId::ChangeState).succeeded());
        assert_eq!(ctx.state(), target);
    }

    #[test]
    fn transition_walks_one_stage_per_dispatch() {
        let mut ctx = context();
        assert!(ctx.request_transition(State::LoggedIn).is_success());
        assert_eq!(ctx.target_state(), Some(State::LoggedIn));
        ctx.dispatch();
        assert_eq!(ctx.state(), State::NetworkStartedUp);
        assert!(!ctx.peek(AsyncProcessId::ChangeState).is_completed);
        ctx.dispatch();
        assert_eq!(ctx.state(), State::LoggedIn);
        assert!(ctx.poll(AsyncProcessId::ChangeState).succeeded());
        assert!(ctx.engine().is_logged_in());
    }

    #[test]
    fn requesting_current_stage_completes_at_once() {
        let mut ctx = context();
        assert!(ctx.request_transition(State::NotInitialized).is_success());
        assert_eq!(ctx.last_started_id(), Some(AsyncProcessId::ChangeState));
        assert!(ctx.poll(AsyncProcessId::ChangeState).succeeded());
        assert_eq!(ctx.engine().in_flight_count(), 0);
    }

    #[test]
    fn session_operations_check_the_stage() {
        let mut ctx = context();
        assert_eq!(ctx.open_session_async(), EngineResult::not_initialized());
        goto(&mut ctx, State::SessionStartedUp);
        assert_eq!(ctx.open_session_async(), EngineResult::invalid_state());
        assert_eq!(
            ctx.join_joint_session_async(1),
            EngineResult::invalid_state()
        );
        assert!(ctx
            .browse_session_async(&SessionSearchCriteria::new())
            .is_success());
        assert_eq!(ctx.last_started_id(), Some(AsyncProcessId::BrowseSession));
    }

    #[test]
    fn create_session_enters_joined() {
        let mut ctx = context();
        goto(&mut ctx, State::SessionStartedUp);
        assert!(ctx
            .create_session_async(&CreateSessionSetting::new())
            .is_success());
        assert!(settle(&mut ctx, AsyncProcessId::CreateSession).succeeded());
        assert_eq!(ctx.state(), State::SessionJoined);
        assert_eq!(ctx.stations().len(), 1);

        assert!(ctx
            .create_joint_session_async(&CreateJointSessionSetting::new())
            .is_success());
        assert!(settle(&mut ctx, AsyncProcessId::CreateJointSession).succeeded());
        assert_eq!(ctx.state(), State::JointSessionJoined);
        assert!(ctx.open_joint_session_async().is_success());
    }

    #[test]
    fn lifecycle_operations_are_exclusive() {
        let mut ctx = context();
        goto(&mut ctx, State::SessionStartedUp);
        assert!(ctx
            .create_session_async(&CreateSessionSetting::new())
            .is_success());
        assert_eq!(
            ctx.request_transition(State::LoggedIn),
            EngineResult::invalid_state()
        );
        assert_eq!(
            ctx.join_session_async(&JoinSessionSetting::new()),
            EngineResult::invalid_state()
        );
    }

    #[test]
    fn engine_rejection_is_returned_and_not_tracked() {
        let mut ctx = context();
        let busy = EngineResult::new(ResultCode::TemporarilyUnavailable, HandlingType::Retry);
        ctx.engine_mut()
            .reject_next(FailurePoint::Lifecycle(LifecycleStep::StartupNetwork), busy);
        assert_eq!(ctx.request_transition(State::LoggedIn), busy);
        assert_eq!(ctx.target_state(), None);
        assert!(ctx.request_transition(State::LoggedIn).is_success());
    }

    #[test]
    fn failed_step_keeps_last_stage() {
        let mut ctx = context();
        let denied = EngineResult::new(ResultCode::AuthenticationFailed, HandlingType::ShutdownNetwork);
        ctx.engine_mut()
            .fail_next(FailurePoint::Lifecycle(LifecycleStep::Login), denied);
        assert!(ctx.request_transition(State::SessionStartedUp).is_success());
        let state = settle(&mut ctx, AsyncProcessId::ChangeState);
        assert_eq!(state, AsyncState::completed(denied));
        assert_eq!(ctx.state(), State::NetworkStartedUp);
        assert_eq!(ctx.last_failure(), Some(denied));
        assert_eq!(
            ctx.target_state_for(denied.handling_type()),
            State::NETWORK_CLEANED_UP
        );
    }

    #[test]
    fn handle_error_rejects_programming_errors() {
        let mut ctx = context();
        assert_eq!(
            ctx.handle_error_async(EngineResult::invalid_state()),
            EngineResult::invalid_argument()
        );
        assert_eq!(
            ctx.handle_error_async(EngineResult::success()),
            EngineResult::invalid_argument()
        );
        assert!(!ctx.peek(AsyncProcessId::HandleError).is_completed);
    }

    #[test]
    fn transient_failures_complete_immediately() {
        let mut ctx = context();
        let retry = EngineResult::new(ResultCode::Timeout, HandlingType::Retry);
        assert!(ctx.handle_error_async(retry).is_success());
        assert!(ctx.poll(AsyncProcessId::HandleError).succeeded());
        assert_eq!(ctx.current_handling_result(), Some(retry));
    }

    #[test]
    #[should_panic(expected = "rejected")]
    fn panic_policy_halts_on_contract_violation() {
        let mut config = ControlConfig::default();
        config.recovery.programming_error_policy = ProgrammingErrorPolicy::Panic;
        let mut ctx = SessionContext::loopback(config);
        let _ = ctx.open_session_async();
    }

    #[test]
    fn terminate_from_not_initialized_completes_at_once() {
        let mut ctx = context();
        assert!(ctx.request_transition(State::NetworkStartedUp).is_success());
        assert!(ctx.request_transition(State::NotInitialized).is_success());
        assert!(ctx.poll(AsyncProcessId::ChangeState).succeeded());
        assert_eq!(ctx.engine().in_flight_count(), 0);
        ctx.dispatch();
        assert_eq!(ctx.state(), State::NotInitialized);
    }
}
