//! Integration tests for lifecycle transitions against the loopback engine.

use session_control::shared::settings::SessionSearchCriteria;
use session_control::shared::{AsyncProcessId, AsyncState, Direction, EngineResult, State};
use session_control::{ControlConfig, LoopbackEngine, SessionContext};
use strum::IntoEnumIterator;

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
    let state = settle(ctx, AsyncProcessId::ChangeState);
    assert!(state.succeeded(), "transition to {target} failed: {state:?}");
    assert_eq!(ctx.state(), target);
}

#[test]
fn test_every_stage_reaches_every_other_stage() {
    for from in State::iter() {
        for to in State::iter() {
            let mut ctx = context();
            goto(&mut ctx, from);
            assert!(
                ctx.request_transition(to).is_success(),
                "{from} -> {to} was rejected"
            );
            let state = settle(&mut ctx, AsyncProcessId::ChangeState);
            assert!(state.succeeded(), "{from} -> {to} failed: {state:?}");
            assert_eq!(ctx.state(), to);
        }
    }
}

#[test]
fn test_one_stage_per_dispatch() {
    let mut ctx = context();
    assert!(ctx
        .request_transition(State::SessionStartedBrowseMatchmake)
        .is_success());

    let mut visited = Vec::new();
    while !ctx.peek(AsyncProcessId::ChangeState).is_completed {
        ctx.dispatch();
        visited.push(ctx.state());
    }
    assert_eq!(visited, State::iter().skip(1).collect::<Vec<_>>());
    assert!(ctx.engine().is_browsing());
}

#[test]
fn test_teardown_uses_backward_names() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionJoined);
    assert_eq!(ctx.state_label(), "SessionJoined");

    goto(&mut ctx, State::SESSION_LEFT);
    assert_eq!(ctx.state(), State::SessionStartedUp);
    assert_eq!(ctx.entered_via(), Direction::Backward);
    assert_eq!(ctx.state_label(), "SessionLeft");
    assert!(ctx.stations().is_empty());

    goto(&mut ctx, State::LOGGED_OUT);
    assert_eq!(ctx.state_label(), "LoggedOut");
    assert!(!ctx.engine().is_logged_in());
    assert!(ctx.engine().is_network_up());
}

#[test]
fn test_second_request_while_running_is_invalid_state() {
    let mut ctx = context();
    assert!(ctx.request_transition(State::LoggedIn).is_success());
    assert_eq!(
        ctx.request_transition(State::SessionStartedUp),
        EngineResult::invalid_state()
    );
    assert_eq!(ctx.target_state(), Some(State::LoggedIn));
    assert_eq!(ctx.state(), State::NotInitialized);

    // The finished result has to be polled before the next request.
    while !ctx.peek(AsyncProcessId::ChangeState).is_completed {
        ctx.dispatch();
    }
    assert_eq!(
        ctx.request_transition(State::SessionStartedUp),
        EngineResult::invalid_state()
    );
    assert!(ctx.poll(AsyncProcessId::ChangeState).succeeded());
    assert!(ctx.request_transition(State::SessionStartedUp).is_success());
}

#[test]
fn test_terminate_cancels_running_transition() {
    let mut config = ControlConfig::default();
    config.loopback.latency_steps = 3;
    let mut ctx = SessionContext::loopback(config);

    assert!(ctx.request_transition(State::SessionStartedUp).is_success());
    let mut first = ctx
        .completion(AsyncProcessId::ChangeState)
        .expect("transition is running");
    for _ in 0..4 {
        ctx.dispatch();
    }
    assert_eq!(ctx.state(), State::NetworkStartedUp);

    assert!(ctx.request_transition(State::NotInitialized).is_success());
    assert_eq!(first.try_take(), Some(EngineResult::cancelled()));
    assert_eq!(ctx.target_state(), Some(State::NotInitialized));

    let state = settle(&mut ctx, AsyncProcessId::ChangeState);
    assert!(state.succeeded());
    assert_eq!(ctx.state(), State::NETWORK_CLEANED_UP);
    assert_eq!(ctx.state_label(), "NetworkCleanedUp");
    assert!(!ctx.engine().is_network_up());
    assert!(!ctx.engine().is_logged_in());
}

#[test]
fn test_terminate_is_blocked_by_session_operation() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    assert!(ctx
        .create_session_async(&Default::default())
        .is_success());
    assert_eq!(
        ctx.request_transition(State::NotInitialized),
        EngineResult::invalid_state()
    );
}

#[test]
fn test_terminate_waits_for_pending_browse() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    assert!(ctx
        .browse_session_async(&SessionSearchCriteria::new())
        .is_success());

    assert_eq!(
        ctx.request_transition(State::NotInitialized),
        EngineResult::invalid_state()
    );
    assert_eq!(ctx.state(), State::SessionStartedUp);
    assert_eq!(ctx.target_state(), None);
    assert!(ctx.engine().is_network_up());

    assert!(settle(&mut ctx, AsyncProcessId::BrowseSession).succeeded());
    goto(&mut ctx, State::NotInitialized);
    assert!(!ctx.engine().is_network_up());
}

#[tokio::test]
async fn test_completion_handle_resolves_after_dispatch() {
    let mut ctx = context();
    assert!(ctx.request_transition(State::LoggedIn).is_success());
    let completion = ctx
        .completion(AsyncProcessId::ChangeState)
        .expect("transition is running");
    for _ in 0..2 {
        ctx.dispatch();
    }
    assert_eq!(completion.wait().await, Some(EngineResult::success()));
    // Handles do not mark the result as observed.
    assert!(ctx.peek(AsyncProcessId::ChangeState).succeeded());
    assert_eq!(
        ctx.request_transition(State::NotInitialized),
        EngineResult::invalid_state()
    );
}
