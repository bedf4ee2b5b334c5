//! Integration tests for session operations and the per-frame event queue.

use session_control::shared::settings::{
    CreateJointSessionSetting, JoinSessionSetting, SessionSearchCriteria,
    UpdateJointSessionSetting, UpdateSessionSetting,
};
use session_control::shared::{
    AsyncProcessId, AsyncState, EngineResult, HandlingType, ResultCode, SessionEventType,
    SessionProperty, State,
};
use session_control::{ControlConfig, LoopbackEngine, SessionContext};

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

fn remote_session(game_mode: u32) -> SessionProperty {
    SessionProperty {
        game_mode,
        max_participants: 4,
        opened: true,
        ..Default::default()
    }
}

fn join(ctx: &mut SessionContext<LoopbackEngine>, session_id: u32) -> AsyncState {
    let mut setting = JoinSessionSetting::new();
    setting.set_session_id(session_id);
    assert!(ctx.join_session_async(&setting).is_success());
    settle(ctx, AsyncProcessId::JoinSession)
}

#[test]
fn test_operations_before_startup_are_not_initialized() {
    let mut ctx = context();
    assert_eq!(
        ctx.create_session_async(&Default::default()),
        EngineResult::not_initialized()
    );
    assert_eq!(
        ctx.browse_session_async(&SessionSearchCriteria::new()),
        EngineResult::not_initialized()
    );
    assert_eq!(ctx.last_started_id(), None);
}

#[test]
fn test_same_category_is_rejected_while_pending() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    assert!(ctx.create_session_async(&Default::default()).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::CreateSession).succeeded());

    assert!(ctx.open_session_async().is_success());
    assert_eq!(ctx.open_session_async(), EngineResult::invalid_state());

    // Other categories are independent.
    let mut update = UpdateSessionSetting::new();
    update.set_max_participants(6);
    assert!(ctx.update_session_setting_async(&update).is_success());
    assert!(ctx.request_session_property_async().is_success());

    ctx.dispatch();
    for id in [
        AsyncProcessId::OpenSession,
        AsyncProcessId::UpdateSessionSetting,
        AsyncProcessId::RequestSessionProperty,
    ] {
        assert!(ctx.poll(id).succeeded(), "{id}");
    }
    let property = ctx.session_property().expect("session is hosted");
    assert_eq!(property.max_participants, 6);
    assert!(property.opened);
}

#[test]
fn test_engine_rejection_at_submission_is_not_tracked() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    assert_eq!(
        ctx.join_session_async(&JoinSessionSetting::new()),
        EngineResult::invalid_argument()
    );
    assert!(!ctx.peek(AsyncProcessId::JoinSession).is_completed);

    let unknown = join(&mut ctx, 4242);
    assert_eq!(
        unknown,
        AsyncState::completed(EngineResult::new(
            ResultCode::SessionNotFound,
            HandlingType::Retry
        ))
    );
    assert_eq!(ctx.state(), State::SessionStartedUp);
}

#[test]
fn test_browse_then_join_advertised_session() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    let wanted = ctx.engine_mut().advertise(remote_session(7), None);
    ctx.engine_mut().advertise(remote_session(3), None);

    let mut criteria = SessionSearchCriteria::new();
    criteria.set_game_mode(7);
    assert!(ctx.browse_session_async(&criteria).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::BrowseSession).succeeded());
    let found = ctx.browse_results();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].session_id, wanted);

    assert!(join(&mut ctx, wanted).succeeded());
    assert_eq!(ctx.state(), State::SessionJoined);
    let joined: Vec<_> = ctx.drain_events().collect();
    assert_eq!(joined.len(), 2);
    assert!(joined
        .iter()
        .all(|e| e.event_type == SessionEventType::StationJoined));

    let stations = ctx.stations();
    assert_eq!(stations.len(), 2);
    assert!(stations.iter().any(|s| s.is_local && !s.is_host));
    assert_eq!(ctx.session_property().map(|p| p.participants), Some(2));
    assert_eq!(ctx.diagnostics().rtt_ms, Some(30));
}

#[test]
fn test_wrong_password_is_retryable() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    let session_id = ctx
        .engine_mut()
        .advertise(remote_session(1), Some("secret"));

    let state = join(&mut ctx, session_id);
    assert_eq!(state.result.code(), ResultCode::WrongUserPassword);
    assert_eq!(state.result.handling_type(), HandlingType::Retry);
    assert_eq!(ctx.state(), State::SessionStartedUp);

    let mut setting = JoinSessionSetting::new();
    setting.set_session_id(session_id);
    assert!(setting.set_user_password("secret").is_success());
    assert!(ctx.join_session_async(&setting).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::JoinSession).succeeded());
    assert_eq!(ctx.state(), State::SessionJoined);
}

#[test]
fn test_events_are_drained_once() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    assert!(ctx.create_session_async(&Default::default()).is_success());
    ctx.dispatch();

    let events: Vec<_> = ctx.drain_events().collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, SessionEventType::StationJoined);
    assert_eq!(events[0].station_constant_id, ctx.engine().local_id());
    assert_eq!(ctx.drain_events().count(), 0);
}

#[test]
fn test_undrained_events_are_dropped_on_next_dispatch() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    assert!(ctx.create_session_async(&Default::default()).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::CreateSession).succeeded());

    let guest = ctx.engine_mut().simulate_station_join();
    assert!(guest.is_some());
    ctx.dispatch();
    ctx.dispatch();
    assert_eq!(ctx.drain_events().count(), 0);
    assert_eq!(ctx.stations().len(), 2);
}

#[test]
fn test_host_leaving_migrates_host() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    let session_id = ctx.engine_mut().advertise(remote_session(0), None);
    assert!(join(&mut ctx, session_id).succeeded());
    let host = ctx.session_property().expect("session joined").host;

    assert!(ctx.engine_mut().simulate_station_leave(host));
    ctx.dispatch();
    let kinds: Vec<_> = ctx.drain_events().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            SessionEventType::StationLeft,
            SessionEventType::HostMigrationStarted,
            SessionEventType::HostChanged,
        ]
    );
    let local = ctx.engine().local_id();
    assert_eq!(ctx.session_property().map(|p| p.host), Some(local));
    assert!(ctx.stations().iter().all(|s| s.is_host == s.is_local));
    assert_eq!(ctx.diagnostics().rtt_ms, None);
}

#[test]
fn test_joint_session_operations() {
    let mut ctx = context();
    goto(&mut ctx, State::SessionStartedUp);
    assert_eq!(
        ctx.open_joint_session_async(),
        EngineResult::invalid_state()
    );
    assert!(ctx.create_session_async(&Default::default()).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::CreateSession).succeeded());

    let mut joint = CreateJointSessionSetting::new();
    joint.set_max_participants(8);
    assert!(ctx.create_joint_session_async(&joint).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::CreateJointSession).succeeded());
    assert_eq!(ctx.state(), State::JointSessionJoined);
    assert_eq!(
        ctx.drain_events().map(|e| e.event_type).collect::<Vec<_>>(),
        vec![SessionEventType::JointSessionStarted]
    );

    let mut update = UpdateJointSessionSetting::new();
    update.set_opened(false);
    assert!(ctx.update_joint_session_setting_async(&update).is_success());
    assert!(settle(&mut ctx, AsyncProcessId::UpdateJointSessionSetting).succeeded());
    let property = ctx.joint_session_property().expect("joint session exists");
    assert_eq!(property.max_participants, 8);
    assert!(!property.opened);

    assert!(ctx.open_joint_session_async().is_success());
    assert!(ctx.request_joint_session_property_async().is_success());
    ctx.dispatch();
    assert!(ctx.poll(AsyncProcessId::OpenJointSession).succeeded());
    assert!(ctx
        .poll(AsyncProcessId::RequestJointSessionProperty)
        .succeeded());

    goto(&mut ctx, State::JOINT_SESSION_LEFT);
    assert_eq!(ctx.joint_session_property(), None);
    assert!(ctx.session_property().is_some());
}
