//! Integration tests for error handling: remediation, escalation and
//! automatic recovery.

use session_control::shared::settings::CreateSessionSetting;
use session_control::shared::{
    AsyncProcessId, AsyncState, EngineResult, HandlingType, ResultCode, State,
};
use session_control::{
    ControlConfig, FailurePoint, LoopbackEngine, RecoveryPhase, RemediationStep, SessionContext,
};

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

fn failure(code: ResultCode, handling: HandlingType) -> EngineResult {
    EngineResult::new(code, handling)
}

#[test]
fn test_failed_create_is_recovered_and_retried() {
    let mut ctx = SessionContext::loopback(ControlConfig::default());
    goto(&mut ctx, State::SessionStartedUp);

    let lost = failure(ResultCode::ConnectionLost, HandlingType::CleanupWithLeave);
    ctx.engine_mut()
        .fail_next(FailurePoint::Operation(AsyncProcessId::CreateSession), lost);
    let setting = CreateSessionSetting::new();
    assert!(ctx.create_session_async(&setting).is_success());
    assert_eq!(
        settle(&mut ctx, AsyncProcessId::CreateSession),
        AsyncState::completed(lost)
    );
    assert_eq!(ctx.state(), State::SessionStartedUp);
    assert_eq!(ctx.last_failure(), Some(lost));

    assert!(ctx.handle_error_async(lost).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::HandleError).succeeded());
    assert_eq!(ctx.current_handling_result(), Some(lost));

    assert!(ctx.request_transition(State::SessionStartedUp).is_success());
    assert!(ctx.poll(AsyncProcessId::ChangeState).succeeded());

    assert!(ctx.create_session_async(&setting).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::CreateSession).succeeded());
    assert_eq!(ctx.state(), State::SessionJoined);
}

#[test]
fn test_failure_during_remediation_escalates() {
    let mut config = ControlConfig::default();
    config.loopback.latency_steps = 2;
    let mut ctx = SessionContext::loopback(config);
    goto(&mut ctx, State::SessionJoined);

    let closed = failure(ResultCode::SessionClosed, HandlingType::Cleanup);
    assert!(ctx.handle_error_async(closed).is_success());
    assert_eq!(
        ctx.handle_error_async(closed),
        EngineResult::invalid_state()
    );

    let lost = failure(ResultCode::ConnectionLost, HandlingType::LogoutWithLeave);
    ctx.engine_mut().inject_failure(lost);
    let state = settle(&mut ctx, AsyncProcessId::HandleError);
    assert!(state.succeeded());
    assert_eq!(ctx.current_handling_result(), Some(lost));
    assert!(!ctx.engine().is_logged_in());
    assert!(ctx.engine().is_network_up());

    // Remediation leaves the stage alone.
    assert_eq!(ctx.state(), State::SessionJoined);
    let target = ctx.target_state_for(lost.handling_type());
    assert_eq!(target, State::LOGGED_OUT);
    goto(&mut ctx, target);
    assert_eq!(ctx.state_label(), "LoggedOut");
}

#[test]
fn test_milder_failure_does_not_replace_handled_one() {
    let mut config = ControlConfig::default();
    config.loopback.latency_steps = 2;
    let mut ctx = SessionContext::loopback(config);
    goto(&mut ctx, State::SessionJoined);

    let lost = failure(ResultCode::ConnectionLost, HandlingType::CleanupWithLeave);
    assert!(ctx.handle_error_async(lost).is_success());
    ctx.engine_mut()
        .inject_failure(failure(ResultCode::Timeout, HandlingType::Retry));
    assert!(settle(&mut ctx, AsyncProcessId::HandleError).succeeded());
    assert_eq!(ctx.current_handling_result(), Some(lost));
}

#[test]
fn test_failing_remediation_step_is_reported() {
    let mut ctx = SessionContext::loopback(ControlConfig::default());
    goto(&mut ctx, State::SessionJoined);

    let broken = failure(ResultCode::EngineInternal, HandlingType::ShutdownNetwork);
    ctx.engine_mut().fail_next(
        FailurePoint::Remediation(RemediationStep::CleanupSession),
        broken,
    );
    assert!(ctx
        .handle_error_async(failure(ResultCode::SessionClosed, HandlingType::Cleanup))
        .is_success());

    let state = settle(&mut ctx, AsyncProcessId::HandleError);
    assert_eq!(state, AsyncState::completed(broken));
    assert_eq!(ctx.current_handling_result(), Some(broken));
    assert!(!ctx.engine().is_network_up());
    assert_eq!(
        ctx.target_state_for(broken.handling_type()),
        State::NotInitialized
    );
}

#[test]
fn test_transient_handling_completes_without_engine_work() {
    let mut ctx = SessionContext::loopback(ControlConfig::default());
    goto(&mut ctx, State::SessionJoined);

    let busy = failure(ResultCode::TemporarilyUnavailable, HandlingType::Retry);
    assert!(ctx.handle_error_async(busy).is_success());
    assert!(ctx.poll(AsyncProcessId::HandleError).succeeded());
    assert_eq!(ctx.engine().in_flight_count(), 0);
    assert_eq!(ctx.target_state_for(busy.handling_type()), State::SessionJoined);
}

#[test]
fn test_automatic_recovery_after_connection_loss() {
    let mut config = ControlConfig::default();
    config.recovery.auto_handle_errors = true;
    let mut ctx = SessionContext::loopback(config);
    goto(&mut ctx, State::SessionJoined);

    ctx.engine_mut().simulate_connection_loss();
    ctx.dispatch();
    assert_eq!(ctx.recovery_phase(), RecoveryPhase::Remediating);

    for _ in 0..32 {
        if ctx.recovery_phase() == RecoveryPhase::Idle {
            break;
        }
        ctx.dispatch();
    }
    assert_eq!(ctx.recovery_phase(), RecoveryPhase::Idle);
    assert_eq!(ctx.state(), State::SESSION_CLEANED_UP);
    assert_eq!(ctx.state_label(), "SessionCleanedUp");
    assert_eq!(
        ctx.last_failure().map(|r| r.code()),
        Some(ResultCode::ConnectionLost)
    );

    // The context consumed its own results; callers can continue at once.
    goto(&mut ctx, State::SessionStartedUp);
    assert!(ctx
        .create_session_async(&CreateSessionSetting::new())
        .is_success());
}

#[test]
fn test_automatic_recovery_skips_transient_and_programming_errors() {
    let mut config = ControlConfig::default();
    config.recovery.auto_handle_errors = true;
    let mut ctx = SessionContext::loopback(config);
    goto(&mut ctx, State::SessionJoined);

    ctx.engine_mut()
        .inject_failure(failure(ResultCode::Timeout, HandlingType::Retry));
    ctx.engine_mut().inject_failure(EngineResult::invalid_state());
    ctx.dispatch();
    ctx.dispatch();
    assert_eq!(ctx.recovery_phase(), RecoveryPhase::Idle);
    assert_eq!(ctx.state(), State::SessionJoined);
    assert_eq!(ctx.last_failure(), Some(EngineResult::invalid_state()));
}
