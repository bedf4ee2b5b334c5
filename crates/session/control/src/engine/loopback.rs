//! Loopback engine for in-process sessions.
//!
//! Simulates a session network without touching any socket. Requests are
//! completed after a configurable number of steps and mutate a small
//! simulated world (network, login, the hosted or joined session, a joint
//! session and the stations in it). Remote sessions can be advertised for
//! browsing and joining, remote stations can be made to join and leave, and
//! failures can be scripted for any request. Used for singleplayer runs and
//! tests.

use std::collections::VecDeque;

use session_shared::settings::{
    CreateJointSessionSetting, CreateSessionSetting, JoinRandomSessionSetting,
    JoinSessionSetting, SessionSearchCriteria, UpdateJointSessionSetting, UpdateSessionSetting,
};
use session_shared::{
    AsyncProcessId, ConstantId, EngineResult, HandlingType, JointSessionProperty,
    NetworkDiagnostics, ResultCode, SessionEvent, SessionEventType, SessionProperty,
    StationIndex, StationInfo,
};
use tracing::{debug, trace, warn};

use super::{EngineNotice, EngineRequest, SessionEngine};
use crate::config::LoopbackConfig;
use crate::escalation::RemediationStep;
use crate::lifecycle::LifecycleStep;

const BASE_MEMORY_BYTES: u64 = 64 * 1024;
const STATION_MEMORY_BYTES: u64 = 4 * 1024;
const REQUEST_MEMORY_BYTES: u64 = 1024;
const FIRST_REMOTE_STATION_ID: u64 = 0x0200_0000_0000_0001;

/// Request selector for scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    Lifecycle(LifecycleStep),
    Remediation(RemediationStep),
    /// Any request of this category.
    Operation(AsyncProcessId),
}

impl FailurePoint {
    fn matches(&self, request: &EngineRequest) -> bool {
        match (self, request) {
            (FailurePoint::Lifecycle(step), EngineRequest::Lifecycle(other)) => step == other,
            (FailurePoint::Remediation(step), EngineRequest::Remediate(other)) => step == other,
            (FailurePoint::Operation(id), request) => *id == request.process_id(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Ack,
    Completion,
}

#[derive(Debug)]
struct ScriptedFailure {
    point: FailurePoint,
    stage: Stage,
    result: EngineResult,
}

#[derive(Debug)]
struct InFlight {
    request: EngineRequest,
    remaining: u32,
}

#[derive(Debug, Clone)]
struct RemoteSession {
    property: SessionProperty,
    password: Option<String>,
}

#[derive(Debug, Default)]
struct World {
    network_up: bool,
    logged_in: bool,
    session_initialized: bool,
    session_started: bool,
    browsing: bool,
    session: Option<SessionProperty>,
    joint: Option<JointSessionProperty>,
    stations: Vec<StationInfo>,
    browse_results: Vec<SessionProperty>,
}

#[derive(Debug)]
pub struct LoopbackEngine {
    config: LoopbackConfig,
    steps: u64,
    in_flight: Vec<InFlight>,
    scripted: Vec<ScriptedFailure>,
    background: VecDeque<EngineResult>,
    outbox: VecDeque<SessionEvent>,
    remote_sessions: Vec<RemoteSession>,
    world: World,
    next_session_id: u32,
    next_remote_id: u64,
    memory_peak: u64,
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl LoopbackEngine {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            steps: 0,
            in_flight: Vec::new(),
            scripted: Vec::new(),
            background: VecDeque::new(),
            outbox: VecDeque::new(),
            remote_sessions: Vec::new(),
            world: World::default(),
            next_session_id: 0,
            next_remote_id: FIRST_REMOTE_STATION_ID,
            memory_peak: BASE_MEMORY_BYTES,
        }
    }

    pub fn local_id(&self) -> ConstantId {
        ConstantId(self.config.local_station_id)
    }

    /// Completes the next matching request with `result` instead of
    /// performing it.
    pub fn fail_next(&mut self, point: FailurePoint, result: EngineResult) {
        self.scripted.push(ScriptedFailure {
            point,
            stage: Stage::Completion,
            result,
        });
    }

    /// Rejects the next matching request when it is submitted.
    pub fn reject_next(&mut self, point: FailurePoint, result: EngineResult) {
        self.scripted.push(ScriptedFailure {
            point,
            stage: Stage::Ack,
            result,
        });
    }

    /// Reports `result` as a background failure on the next step.
    pub fn inject_failure(&mut self, result: EngineResult) {
        self.background.push_back(result);
    }

    /// Emits `event` on the next step.
    pub fn inject_event(&mut self, event: SessionEvent) {
        self.outbox.push_back(event);
    }

    /// Makes a remote session visible to browse and join requests. Returns
    /// its session id.
    pub fn advertise(&mut self, mut property: SessionProperty, password: Option<&str>) -> u32 {
        if property.session_id == 0 {
            property.session_id = self.allocate_session_id();
        }
        if !property.host.is_valid() {
            property.host = self.allocate_remote_id();
        }
        property.participants = property.participants.max(1);
        property.user_password_set = password.is_some();
        let session_id = property.session_id;
        debug!(session_id, host = %property.host, "remote session advertised");
        self.remote_sessions.push(RemoteSession {
            property,
            password: password.map(str::to_owned),
        });
        session_id
    }

    /// A remote station joins the current session. `None` without a session
    /// or when it is full.
    pub fn simulate_station_join(&mut self) -> Option<ConstantId> {
        let session = self.world.session.as_ref()?;
        if session.is_full() {
            return None;
        }
        let constant_id = self.allocate_remote_id();
        let index = self.free_station_index();
        let station = StationInfo {
            constant_id,
            index,
            is_host: false,
            is_local: false,
            rtt_ms: Some(self.rtt_for(index)),
        };
        self.world.stations.push(station);
        self.sync_participants();
        self.queue_event(SessionEventType::StationJoined, constant_id, index);
        if self.world.joint.is_some() {
            self.queue_event(SessionEventType::JointSessionStationJoined, constant_id, index);
        }
        Some(constant_id)
    }

    /// A remote station leaves. Migrates the host when the host left.
    pub fn simulate_station_leave(&mut self, constant_id: ConstantId) -> bool {
        let Some(position) = self
            .world
            .stations
            .iter()
            .position(|s| s.constant_id == constant_id && !s.is_local)
        else {
            return false;
        };
        let station = self.world.stations.remove(position);
        self.sync_participants();
        self.queue_event(SessionEventType::StationLeft, station.constant_id, station.index);
        if self.world.joint.is_some() {
            self.queue_event(
                SessionEventType::JointSessionStationLeft,
                station.constant_id,
                station.index,
            );
        }
        if station.is_host {
            self.migrate_host();
        }
        true
    }

    /// Every remote station vanishes and a `ConnectionLost` failure is
    /// reported on the next step.
    pub fn simulate_connection_loss(&mut self) {
        let remote: Vec<_> = self
            .world
            .stations
            .iter()
            .filter(|s| !s.is_local)
            .map(|s| s.constant_id)
            .collect();
        for constant_id in remote {
            self.simulate_station_leave(constant_id);
        }
        self.inject_failure(EngineResult::new(
            ResultCode::ConnectionLost,
            HandlingType::CleanupWithLeave,
        ));
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_network_up(&self) -> bool {
        self.world.network_up
    }

    pub fn is_logged_in(&self) -> bool {
        self.world.logged_in
    }

    pub fn is_session_started(&self) -> bool {
        self.world.session_initialized && self.world.session_started
    }

    pub fn is_browsing(&self) -> bool {
        self.world.browsing
    }

    fn take_scripted(&mut self, request: &EngineRequest, stage: Stage) -> Option<EngineResult> {
        let index = self
            .scripted
            .iter()
            .position(|s| s.stage == stage && s.point.matches(request))?;
        Some(self.scripted.remove(index).result)
    }

    fn allocate_session_id(&mut self) -> u32 {
        self.next_session_id += 1;
        self.next_session_id
    }

    fn allocate_remote_id(&mut self) -> ConstantId {
        let id = ConstantId(self.next_remote_id);
        self.next_remote_id += 1;
        id
    }

    fn free_station_index(&self) -> StationIndex {
        (0..u8::MAX)
            .map(StationIndex)
            .find(|index| self.world.stations.iter().all(|s| s.index != *index))
            .unwrap_or(StationIndex::INVALID)
    }

    fn rtt_for(&self, index: StationIndex) -> u32 {
        self.config
            .base_rtt_ms
            .saturating_add(5 * u32::from(index.raw()))
    }

    fn local_station(&self, index: StationIndex, is_host: bool) -> StationInfo {
        StationInfo {
            constant_id: self.local_id(),
            index,
            is_host,
            is_local: true,
            rtt_ms: None,
        }
    }

    fn local_index(&self) -> StationIndex {
        self.world
            .stations
            .iter()
            .find(|s| s.is_local)
            .map(|s| s.index)
            .unwrap_or(StationIndex::INVALID)
    }

    fn sync_participants(&mut self) {
        let count = self.world.stations.len() as u16;
        if let Some(session) = self.world.session.as_mut() {
            session.participants = count;
        }
        if let Some(joint) = self.world.joint.as_mut() {
            joint.participants = count;
        }
    }

    fn queue_event(&mut self, event_type: SessionEventType, id: ConstantId, index: StationIndex) {
        self.outbox
            .push_back(SessionEvent::new(event_type, id, index));
    }

    fn migrate_host(&mut self) {
        let Some(next) = self.world.stations.iter_mut().min_by_key(|s| s.index) else {
            return;
        };
        next.is_host = true;
        let (id, index) = (next.constant_id, next.index);
        if let Some(session) = self.world.session.as_mut() {
            session.host = id;
        }
        debug!(host = %id, "host migrated");
        self.queue_event(SessionEventType::HostMigrationStarted, id, index);
        self.queue_event(SessionEventType::HostChanged, id, index);
    }

    fn validate(&self, request: &EngineRequest) -> EngineResult {
        match request {
            EngineRequest::JoinSession(setting) if setting.session_id().is_none() => {
                EngineResult::invalid_argument()
            }
            EngineRequest::CreateSession(setting) => {
                match (setting.min_participants(), setting.max_participants()) {
                    (Some(min), Some(max)) if min > max => EngineResult::invalid_argument(),
                    (_, Some(max)) if max < 2 => EngineResult::invalid_argument(),
                    _ => EngineResult::success(),
                }
            }
            _ => EngineResult::success(),
        }
    }

    fn perform(&mut self, request: &EngineRequest, notices: &mut Vec<EngineNotice>) -> EngineResult {
        match request {
            EngineRequest::Lifecycle(step) => self.perform_lifecycle(*step, notices),
            EngineRequest::Remediate(step) => self.perform_remediation(*step, notices),
            EngineRequest::CreateSession(setting) => self.host_session(setting, notices),
            EngineRequest::JoinSession(setting) => self.join_session(setting, notices),
            EngineRequest::JoinRandomSession(setting) => self.join_random_session(setting, notices),
            EngineRequest::BrowseSession(criteria) => self.browse(criteria),
            EngineRequest::OpenSession => self.set_session_opened(true),
            EngineRequest::CloseSession => self.set_session_opened(false),
            EngineRequest::UpdateSessionSetting(update) => self.update_session(update, notices),
            EngineRequest::RequestSessionProperty => match self.world.session {
                Some(_) => EngineResult::success(),
                None => EngineResult::new(ResultCode::SessionClosed, HandlingType::Cleanup),
            },
            EngineRequest::CreateJointSession(setting) => self.create_joint(setting, notices),
            EngineRequest::JoinJointSession { joint_session_id } => {
                self.join_joint(*joint_session_id, notices)
            }
            EngineRequest::OpenJointSession => self.set_joint_opened(true),
            EngineRequest::CloseJointSession => self.set_joint_opened(false),
            EngineRequest::UpdateJointSessionSetting(update) => self.update_joint(update),
            EngineRequest::RequestJointSessionProperty => match self.world.joint {
                Some(_) => EngineResult::success(),
                None => EngineResult::new(ResultCode::SessionClosed, HandlingType::Retry),
            },
        }
    }

    fn perform_lifecycle(
        &mut self,
        step: LifecycleStep,
        notices: &mut Vec<EngineNotice>,
    ) -> EngineResult {
        match step {
            LifecycleStep::StartupNetwork => self.world.network_up = true,
            LifecycleStep::Login => {
                if !self.world.network_up {
                    return EngineResult::new(
                        ResultCode::NetworkUnavailable,
                        HandlingType::ShutdownNetwork,
                    );
                }
                self.world.logged_in = true;
            }
            LifecycleStep::InitializeSession => self.world.session_initialized = true,
            LifecycleStep::StartupSession => self.world.session_started = true,
            LifecycleStep::JoinSession => {
                if self.world.session.is_none() {
                    return self.matchmake(notices);
                }
            }
            LifecycleStep::JoinJointSession => {
                if self.world.joint.is_none() {
                    return self.create_joint(&CreateJointSessionSetting::default(), notices);
                }
            }
            LifecycleStep::StartBrowseMatchmake => self.world.browsing = true,
            LifecycleStep::StopBrowseMatchmake => self.world.browsing = false,
            LifecycleStep::LeaveJointSession => self.end_joint(notices),
            LifecycleStep::LeaveSession => self.leave_session(notices),
            LifecycleStep::CleanupSession => {
                self.drop_session();
                self.world.session_started = false;
            }
            LifecycleStep::FinalizeSession => self.world.session_initialized = false,
            LifecycleStep::Logout => self.world.logged_in = false,
            LifecycleStep::CleanupNetwork => self.world.network_up = false,
        }
        EngineResult::success()
    }

    // Remediation only releases engine resources. Every step succeeds when
    // there is nothing left to release.
    fn perform_remediation(
        &mut self,
        step: RemediationStep,
        notices: &mut Vec<EngineNotice>,
    ) -> EngineResult {
        match step {
            RemediationStep::LeaveSession => self.leave_session(notices),
            RemediationStep::CleanupSession => self.drop_session(),
            RemediationStep::Logout => {
                self.drop_session();
                self.world.logged_in = false;
            }
            RemediationStep::ShutdownNetwork => {
                self.drop_session();
                self.world.logged_in = false;
                self.world.network_up = false;
            }
            RemediationStep::Finalize => self.world = World::default(),
        }
        EngineResult::success()
    }

    fn host_session(
        &mut self,
        setting: &CreateSessionSetting,
        notices: &mut Vec<EngineNotice>,
    ) -> EngineResult {
        let max_participants = setting.max_participants().unwrap_or(self.config.max_stations);
        let session_id = self.allocate_session_id();
        let local = self.local_station(StationIndex(0), true);
        self.world.session = Some(SessionProperty {
            session_id,
            host: local.constant_id,
            game_mode: setting.game_mode().unwrap_or_default(),
            participants: 1,
            min_participants: setting.min_participants().unwrap_or(2),
            max_participants,
            opened: setting.open_on_create().unwrap_or(true),
            attributes: setting.attributes().map(<[_]>::to_vec).unwrap_or_default(),
            matchmake_keyword: setting.matchmake_keyword().map(str::to_owned),
            user_password_set: setting.user_password().is_some(),
            application_data: setting
                .application_data()
                .map(<[_]>::to_vec)
                .unwrap_or_default(),
        });
        self.world.stations = vec![local.clone()];
        debug!(session_id, "session hosted");
        push_event(notices, SessionEventType::StationJoined, &local);
        EngineResult::success()
    }

    fn join_session(
        &mut self,
        setting: &JoinSessionSetting,
        notices: &mut Vec<EngineNotice>,
    ) -> EngineResult {
        let Some(session_id) = setting.session_id() else {
            return EngineResult::invalid_argument();
        };
        let Some(position) = self
            .remote_sessions
            .iter()
            .position(|r| r.property.session_id == session_id)
        else {
            return EngineResult::new(ResultCode::SessionNotFound, HandlingType::Retry);
        };
        let remote = &self.remote_sessions[position];
        if !remote.property.opened {
            return EngineResult::new(ResultCode::SessionClosed, HandlingType::Retry);
        }
        if remote.property.is_full() {
            return EngineResult::new(ResultCode::SessionFull, HandlingType::Retry);
        }
        if remote.password.is_some() && remote.password.as_deref() != setting.user_password() {
            return EngineResult::new(ResultCode::WrongUserPassword, HandlingType::Retry);
        }
        self.join_remote(position, notices)
    }

    fn join_random_session(
        &mut self,
        setting: &JoinRandomSessionSetting,
        notices: &mut Vec<EngineNotice>,
    ) -> EngineResult {
        let criteria = setting.search_criteria();
        let candidate = self.remote_sessions.iter().position(|r| {
            r.password.is_none()
                && r.property.opened
                && !r.property.is_full()
                && (criteria.is_empty() || criteria.iter().any(|c| criteria_match(c, &r.property)))
        });
        match (candidate, setting.create_setting()) {
            (Some(position), _) => self.join_remote(position, notices),
            (None, Some(create)) => self.host_session(create, notices),
            (None, None) => EngineResult::new(ResultCode::SessionNotFound, HandlingType::Retry),
        }
    }

    fn matchmake(&mut self, notices: &mut Vec<EngineNotice>) -> EngineResult {
        let mut setting = JoinRandomSessionSetting::new();
        setting.set_create_setting(CreateSessionSetting::default());
        self.join_random_session(&setting, notices)
    }

    fn join_remote(&mut self, position: usize, notices: &mut Vec<EngineNotice>) -> EngineResult {
        let mut property = self.remote_sessions[position].property.clone();
        let mut stations = Vec::with_capacity(usize::from(property.participants) + 1);
        for slot in 0..property.participants {
            let index = StationIndex(slot as u8);
            let constant_id = if slot == 0 {
                property.host
            } else {
                self.allocate_remote_id()
            };
            stations.push(StationInfo {
                constant_id,
                index,
                is_host: slot == 0,
                is_local: false,
                rtt_ms: Some(self.rtt_for(index)),
            });
        }
        let local = self.local_station(StationIndex(property.participants as u8), false);
        stations.push(local);

        property.participants += 1;
        self.remote_sessions[position].property.participants = property.participants;
        debug!(session_id = property.session_id, stations = stations.len(), "session joined");
        for station in &stations {
            push_event(notices, SessionEventType::StationJoined, station);
        }
        self.world.session = Some(property);
        self.world.stations = stations;
        EngineResult::success()
    }

    fn browse(&mut self, criteria: &SessionSearchCriteria) -> EngineResult {
        let matching = self
            .remote_sessions
            .iter()
            .map(|r| &r.property)
            .filter(|p| criteria_match(criteria, p));
        self.world.browse_results = match criteria.result_range() {
            Some(range) => matching
                .skip(usize::from(range.offset))
                .take(usize::from(range.size))
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        };
        trace!(found = self.world.browse_results.len(), "browse finished");
        EngineResult::success()
    }

    fn set_session_opened(&mut self, opened: bool) -> EngineResult {
        match self.world.session.as_mut() {
            Some(session) => {
                session.opened = opened;
                EngineResult::success()
            }
            None => EngineResult::new(ResultCode::SessionClosed, HandlingType::Cleanup),
        }
    }

    fn update_session(
        &mut self,
        update: &UpdateSessionSetting,
        notices: &mut Vec<EngineNotice>,
    ) -> EngineResult {
        let local = self.local_station(self.local_index(), false);
        let Some(session) = self.world.session.as_mut() else {
            return EngineResult::new(ResultCode::SessionClosed, HandlingType::Cleanup);
        };
        if let Some(max) = update.max_participants() {
            if max < session.participants {
                return EngineResult::invalid_argument();
            }
            session.max_participants = max;
        }
        if let Some(min) = update.min_participants() {
            session.min_participants = min;
        }
        if let Some(game_mode) = update.game_mode() {
            session.game_mode = game_mode;
        }
        if let Some(attributes) = update.attributes() {
            session.attributes = attributes.to_vec();
            session.matchmake_keyword = None;
        }
        if let Some(keyword) = update.matchmake_keyword() {
            session.matchmake_keyword = Some(keyword.to_owned());
            session.attributes.clear();
        }
        if let Some(data) = update.application_data() {
            session.application_data = data.to_vec();
        }
        if let Some(opened) = update.opened() {
            session.opened = opened;
        }
        if update.user_password().is_some() {
            session.user_password_set = true;
            push_event(notices, SessionEventType::UserPasswordChanged, &local);
        }
        EngineResult::success()
    }

    fn create_joint(
        &mut self,
        setting: &CreateJointSessionSetting,
        notices: &mut Vec<EngineNotice>,
    ) -> EngineResult {
        let Some(session) = self.world.session.as_ref() else {
            return EngineResult::new(ResultCode::SessionClosed, HandlingType::Cleanup);
        };
        let participants = session.participants;
        let joint_session_id = self.allocate_session_id();
        let local = self.local_station(self.local_index(), true);
        self.world.joint = Some(JointSessionProperty {
            joint_session_id,
            host: local.constant_id,
            participants,
            max_participants: setting
                .max_participants()
                .unwrap_or(self.config.max_stations.saturating_mul(2)),
            opened: setting.open_on_create().unwrap_or(true),
            application_data: setting
                .application_data()
                .map(<[_]>::to_vec)
                .unwrap_or_default(),
        });
        push_event(notices, SessionEventType::JointSessionStarted, &local);
        EngineResult::success()
    }

    fn join_joint(&mut self, joint_session_id: u32, notices: &mut Vec<EngineNotice>) -> EngineResult {
        let Some(session) = self.world.session.as_ref() else {
            return EngineResult::new(ResultCode::SessionClosed, HandlingType::Cleanup);
        };
        let joint = JointSessionProperty {
            joint_session_id,
            host: session.host,
            participants: session.participants,
            max_participants: self.config.max_stations.saturating_mul(2),
            opened: true,
            application_data: Vec::new(),
        };
        self.world.joint = Some(joint);
        let local = self.local_station(self.local_index(), false);
        push_event(notices, SessionEventType::JointSessionStationJoined, &local);
        EngineResult::success()
    }

    fn set_joint_opened(&mut self, opened: bool) -> EngineResult {
        match self.world.joint.as_mut() {
            Some(joint) => {
                joint.opened = opened;
                EngineResult::success()
            }
            None => EngineResult::new(ResultCode::SessionClosed, HandlingType::Retry),
        }
    }

    fn update_joint(&mut self, update: &UpdateJointSessionSetting) -> EngineResult {
        let Some(joint) = self.world.joint.as_mut() else {
            return EngineResult::new(ResultCode::SessionClosed, HandlingType::Retry);
        };
        if let Some(max) = update.max_participants() {
            if max < joint.participants {
                return EngineResult::invalid_argument();
            }
            joint.max_participants = max;
        }
        if let Some(data) = update.application_data() {
            joint.application_data = data.to_vec();
        }
        if let Some(opened) = update.opened() {
            joint.opened = opened;
        }
        EngineResult::success()
    }

    fn end_joint(&mut self, notices: &mut Vec<EngineNotice>) {
        if self.world.joint.take().is_some() {
            let local = self.local_station(self.local_index(), false);
            push_event(notices, SessionEventType::JointSessionEnded, &local);
        }
    }

    fn leave_session(&mut self, notices: &mut Vec<EngineNotice>) {
        self.end_joint(notices);
        if self.world.session.take().is_some() {
            if let Some(local) = self.world.stations.iter().find(|s| s.is_local) {
                push_event(notices, SessionEventType::StationLeft, local);
            }
        }
        self.world.stations.clear();
    }

    fn drop_session(&mut self) {
        self.world.joint = None;
        self.world.session = None;
        self.world.stations.clear();
        self.world.browsing = false;
    }

    fn memory_used(&self) -> u64 {
        BASE_MEMORY_BYTES
            + STATION_MEMORY_BYTES * self.world.stations.len() as u64
            + REQUEST_MEMORY_BYTES * self.in_flight.len() as u64
    }
}

fn push_event(notices: &mut Vec<EngineNotice>, event_type: SessionEventType, station: &StationInfo) {
    notices.push(EngineNotice::Event(SessionEvent::new(
        event_type,
        station.constant_id,
        station.index,
    )));
}

impl SessionEngine for LoopbackEngine {
    fn start(&mut self, request: EngineRequest) -> EngineResult {
        if let Some(result) = self.take_scripted(&request, Stage::Ack) {
            debug!(?request, %result, "request rejected by script");
            return result;
        }
        let id = request.process_id();
        if self.in_flight.iter().any(|op| op.request.process_id() == id) {
            warn!(operation = %id, "request of a running category");
            return EngineResult::invalid_state();
        }
        let checked = self.validate(&request);
        if checked.is_failure() {
            return checked;
        }
        trace!(?request, "request accepted");
        self.in_flight.push(InFlight {
            request,
            remaining: self.config.latency_steps.max(1),
        });
        EngineResult::success()
    }

    fn cancel(&mut self, id: AsyncProcessId) {
        let before = self.in_flight.len();
        self.in_flight.retain(|op| op.request.process_id() != id);
        if self.in_flight.len() != before {
            debug!(operation = %id, "request cancelled");
        }
    }

    fn step(&mut self, notices: &mut Vec<EngineNotice>) {
        self.steps += 1;
        notices.extend(self.background.drain(..).map(EngineNotice::Failure));
        notices.extend(self.outbox.drain(..).map(EngineNotice::Event));

        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .map(|mut op| {
                op.remaining = op.remaining.saturating_sub(1);
                op
            })
            .partition(|op| op.remaining == 0);
        self.in_flight = waiting;

        for op in ready {
            let id = op.request.process_id();
            let result = match self.take_scripted(&op.request, Stage::Completion) {
                Some(result) => {
                    debug!(request = ?op.request, %result, "request failed by script");
                    result
                }
                None => self.perform(&op.request, notices),
            };
            notices.push(EngineNotice::Completed { id, result });
        }

        self.memory_peak = self.memory_peak.max(self.memory_used());
    }

    fn session_property(&self) -> Option<SessionProperty> {
        self.world.session.clone()
    }

    fn joint_session_property(&self) -> Option<JointSessionProperty> {
        self.world.joint.clone()
    }

    fn browse_results(&self) -> Vec<SessionProperty> {
        self.world.browse_results.clone()
    }

    fn stations(&self) -> Vec<StationInfo> {
        self.world.stations.clone()
    }

    fn diagnostics(&self) -> NetworkDiagnostics {
        let rtts: Vec<u64> = self
            .world
            .stations
            .iter()
            .filter_map(|s| s.rtt_ms.map(u64::from))
            .collect();
        let rtt_ms = (!rtts.is_empty()).then(|| {
            let average = rtts.iter().sum::<u64>() / rtts.len() as u64;
            u32::try_from(average).unwrap_or(u32::MAX)
        });
        let used = self.memory_used();
        NetworkDiagnostics {
            rtt_ms,
            memory_used_bytes: used,
            memory_peak_bytes: self.memory_peak.max(used),
        }
    }
}

/// Checks a session snapshot against every criterion that was set. Unset
/// criteria match anything.
fn criteria_match(criteria: &SessionSearchCriteria, session: &SessionProperty) -> bool {
    if let Some(range) = criteria.min_participants() {
        if !range.contains(session.min_participants) {
            return false;
        }
    }
    if let Some(range) = criteria.max_participants() {
        if !range.contains(session.max_participants) {
            return false;
        }
    }
    if let Some(game_mode) = criteria.game_mode() {
        if session.game_mode != game_mode {
            return false;
        }
    }
    if let Some(wanted) = criteria.attributes() {
        if session.attributes.len() < wanted.len() {
            return false;
        }
        let matched = wanted
            .iter()
            .zip(session.attributes.iter())
            .all(|(filter, value)| filter.matches(*value));
        if !matched {
            return false;
        }
    }
    if let Some(keyword) = criteria.matchmake_keyword() {
        if session.matchmake_keyword.as_deref() != Some(keyword) {
            return false;
        }
    }
    if criteria.vacant_only() == Some(true) && session.is_full() {
        return false;
    }
    if criteria.exclude_locked() == Some(true) && !session.opened {
        return false;
    }
    if criteria.exclude_user_password_set() == Some(true) && session.user_password_set {
        return false;
    }
    true
}
