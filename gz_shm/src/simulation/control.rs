//! Simulator half of the simulation channel.

use super::iface::{read_state, write_state};
use super::{ModelState, SimTimes};
use crate::error::{ShmError, ShmResult};
use crate::interface::{Blocking, Interface};
use crate::platform::is_process_alive;
use crate::server::Server;
use gz_common::data::simulation::{MAX_CHILD_INTERFACES, SIM_NAME_LEN, SIMULATION_MAX_REQUESTS};
use gz_common::data::{
    Pose, SimRequestKind, SimState, Simulation, SimulationRequest, Vec3, cstr_fits,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// The simulator's model of the world, as seen by the request handler.
///
/// Names are model names as clients send them. Setters return whether the
/// target existed; getters return `None` for unknown targets, which clients
/// receive as a failed response.
pub trait World {
    /// Stop advancing physics.
    fn pause(&mut self);
    /// Resume physics.
    fn unpause(&mut self);
    /// Restore the initial world.
    fn reset(&mut self);
    /// Persist the world.
    fn save(&mut self) {}

    /// Pose of `model`.
    fn model_pose(&self, model: &str) -> Option<Pose>;
    /// Move `model`.
    fn set_model_pose(&mut self, model: &str, pose: Pose) -> bool;
    /// Type name of `model`.
    fn model_type(&self, model: &str) -> Option<String>;
    /// Names of the top-level models, in a stable order.
    fn model_names(&self) -> Vec<String>;

    /// Move `body` of `model`.
    fn set_body_pose(&mut self, _model: &str, _body: &str, _pose: Pose) -> bool {
        false
    }

    /// Pose and motion of `model`. Defaults to a model at rest.
    fn model_state(&self, model: &str) -> Option<ModelState> {
        self.model_pose(model).map(|pose| ModelState {
            pose,
            ..ModelState::default()
        })
    }

    /// Overwrite pose and motion of `model`. Defaults to moving it.
    fn set_model_state(&mut self, model: &str, state: &ModelState) -> bool {
        self.set_model_pose(model, state.pose)
    }

    /// Names of the child models of `model`.
    fn child_names(&self, _model: &str) -> Option<Vec<String>> {
        None
    }

    /// Fiducial id of `model`.
    fn fiducial_id(&self, _model: &str) -> Option<u32> {
        None
    }

    /// Bounding box extent of `model`.
    fn model_extent(&self, _model: &str) -> Option<Vec3> {
        None
    }

    /// Interface ids created by `model`.
    fn model_interfaces(&self, _model: &str) -> Option<Vec<String>> {
        None
    }

    /// Kind tag of interface `iface_id`.
    fn interface_type(&self, _iface_id: &str) -> Option<String> {
        None
    }
}

/// What one [`SimulationControl::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The lock was held elsewhere; nothing was read or written.
    pub skipped: bool,
    /// Requests consumed.
    pub processed: usize,
    /// Responses appended, `Go` completions included.
    pub responses: usize,
    /// Requests left for the next tick because the response ring was full.
    pub deferred: usize,
    /// `Go` runs that reached their deadline.
    pub completed_go: usize,
    /// Uncollected responses removed because they aged out or their
    /// requester died.
    pub expired: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingGo {
    token: u64,
    seq: u32,
    deadline: f64,
}

/// Owned copy of the fields a handler needs from a request record.
struct Call {
    kind: SimRequestKind,
    token: u64,
    model: String,
    body: String,
    pose: Pose,
    state: ModelState,
    index: u32,
    run_time_us: u32,
}

impl Call {
    fn read(kind: SimRequestKind, request: &SimulationRequest) -> Self {
        Self {
            kind,
            token: request.token(),
            model: request.model_name(),
            body: request.body_name(),
            pose: request.model_pose,
            state: read_state(request),
            index: request.uint_value,
            run_time_us: request.run_time,
        }
    }
}

enum Reply {
    Failed,
    Pose(Pose),
    State(ModelState),
    Text(String),
    Count(u32),
    Extent(Vec3),
    Names(Vec<String>),
}

impl<T> From<Option<T>> for Reply
where
    T: Into<Reply>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Reply::Failed, Into::into)
    }
}

impl From<Pose> for Reply {
    fn from(pose: Pose) -> Self {
        Reply::Pose(pose)
    }
}

impl From<ModelState> for Reply {
    fn from(state: ModelState) -> Self {
        Reply::State(state)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<u32> for Reply {
    fn from(count: u32) -> Self {
        Reply::Count(count)
    }
}

impl From<Vec3> for Reply {
    fn from(extent: Vec3) -> Self {
        Reply::Extent(extent)
    }
}

/// Write times of the responses in the ring, oldest first.
struct ResponseLog {
    next_serial: u32,
    written: VecDeque<(u32, Instant)>,
    ttl: Duration,
}

impl ResponseLog {
    fn new(ttl: Duration) -> Self {
        Self {
            next_serial: 0,
            written: VecDeque::new(),
            ttl,
        }
    }

    /// Number a fresh response slot and remember when it was written.
    fn stamp(&mut self, slot: &mut SimulationRequest) {
        slot.serial = self.next_serial;
        self.written.push_back((self.next_serial, Instant::now()));
        self.next_serial = self.next_serial.wrapping_add(1);
    }

    /// Serials written more than `ttl` ago.
    fn expired(&mut self, now: Instant) -> Vec<u32> {
        let mut serials = Vec::new();
        while let Some(&(serial, at)) = self.written.front() {
            if now.duration_since(at) < self.ttl {
                break;
            }
            serials.push(serial);
            self.written.pop_front();
        }
        serials
    }
}

/// Simulator-side driver of the `simulation` interface.
///
/// Call [`tick`](Self::tick) once per simulation step. Responses nobody
/// collects are removed after twice the namespace's response timeout, or as
/// soon as the requesting process is gone.
pub struct SimulationControl {
    iface: Interface<Simulation>,
    state: SimState,
    pending_go: Vec<PendingGo>,
    log: ResponseLog,
}

impl SimulationControl {
    /// Create the simulation interface `id` in the server's namespace.
    pub fn create(server: &Server, id: &str) -> ShmResult<Self> {
        let iface = Interface::<Simulation>::create(server, id)?;
        debug!(interface = id, "simulation control created");
        let ttl = server.config().response_timeout() * 2;
        Ok(Self {
            iface,
            state: SimState::NotStarted,
            pending_go: Vec::new(),
            log: ResponseLog::new(ttl),
        })
    }

    /// Current run state.
    pub fn state(&self) -> SimState {
        self.state
    }

    /// The underlying interface.
    pub fn interface(&self) -> &Interface<Simulation> {
        &self.iface
    }

    /// Change the run state and publish it.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for edges outside
    /// `NotStarted -> Running <-> Paused -> Exiting`.
    pub fn set_run_state(&mut self, next: SimState) -> ShmResult<()> {
        if next == self.state {
            return Ok(());
        }
        if !self.state.can_transition_to(next) {
            return Err(ShmError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{next:?}"),
            });
        }
        {
            let Some(mut guard) = self.iface.lock(Blocking::Wait)? else {
                return Err(ShmError::NotLocked {
                    name: self.iface.id().to_string(),
                });
            };
            guard.state = next as u32;
            guard.unlock()?;
        }
        debug!(from = ?self.state, to = ?next, "simulation state changed");
        self.state = next;
        self.iface.post()
    }

    /// Publish the clocks and serve pending requests against `world`.
    ///
    /// A contended lock skips the whole tick.
    pub fn tick<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        times: SimTimes,
    ) -> ShmResult<TickReport> {
        let mut report = TickReport::default();
        let Some(mut guard) = self.iface.lock(Blocking::Try)? else {
            trace!(interface = self.iface.id(), "simulation tick skipped");
            report.skipped = true;
            return Ok(report);
        };
        guard.sim_time = times.sim;
        guard.pause_time = times.pause;
        guard.real_time = times.real;

        // Responses and runs nobody is left to collect.
        let mut dead = Vec::new();
        for pid in guard.responses().iter().map(|r| r.pid) {
            if !dead.contains(&pid) && !is_process_alive(pid) {
                dead.push(pid);
            }
        }
        self.pending_go.retain(|run| {
            let alive = is_process_alive(requester_pid(run.token));
            if !alive {
                debug!(token = run.token, "dropping go of exited requester");
            }
            alive
        });
        let aged = self.log.expired(Instant::now());
        report.expired =
            guard.remove_responses(|r| dead.contains(&r.pid) || aged.contains(&r.serial));
        if report.expired > 0 {
            warn!(expired = report.expired, "removed uncollected simulation responses");
        }

        // Runs whose deadline passed; a full ring keeps them for later.
        let mut index = 0;
        while index < self.pending_go.len() {
            let run = self.pending_go[index];
            if times.sim < run.deadline {
                index += 1;
                continue;
            }
            let Some(slot) = guard.push_response() else {
                break;
            };
            slot.kind = SimRequestKind::Go as u32;
            slot.set_token(run.token);
            slot.uint_value = run.seq;
            slot.ok = 1;
            self.log.stamp(slot);
            self.pending_go.remove(index);
            report.responses += 1;
            report.completed_go += 1;
            world.pause();
            advance(&mut self.state, SimState::Paused);
            debug!(token = run.token, seq = run.seq, sim_time = times.sim, "go finished");
        }

        let count = guard.requests().len();
        for position in 0..count {
            let request = &guard.requests[position];
            let Some(kind) = request.request_kind() else {
                warn!(raw = request.kind, "dropping request with unknown tag");
                report.processed += 1;
                continue;
            };
            let replies_now = kind.expects_response() && kind != SimRequestKind::Go;
            if replies_now && guard.responses().len() >= SIMULATION_MAX_REQUESTS {
                report.deferred = count - position;
                break;
            }
            let call = Call::read(kind, request);
            report.processed += 1;

            let reply = serve(world, &call, &mut self.state, &mut self.pending_go, times.sim);
            if kind == SimRequestKind::CancelGo {
                let go = SimRequestKind::Go as u32;
                guard.remove_responses(|r| r.kind == go && r.token() == call.token);
            }
            if let Some(reply) = reply {
                let Some(slot) = guard.push_response() else {
                    break;
                };
                write_reply(slot, &call, reply);
                self.log.stamp(slot);
                report.responses += 1;
            }
        }
        guard.retain_unprocessed(report.processed);
        if report.deferred > 0 {
            warn!(
                deferred = report.deferred,
                "simulation response ring full, requests left for next tick"
            );
        }

        guard.state = self.state as u32;
        guard.set_time(times.sim);
        guard.unlock()?;
        self.iface.post()?;
        Ok(report)
    }
}

impl std::fmt::Debug for SimulationControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationControl")
            .field("id", &self.iface.id())
            .field("state", &self.state)
            .field("pending_go", &self.pending_go.len())
            .finish()
    }
}

/// Move `state` to `next` when the edge is allowed.
fn advance(state: &mut SimState, next: SimState) {
    if *state != next && state.can_transition_to(next) {
        *state = next;
    }
}

/// Apply one request to `world`. Returns the reply for queries.
fn serve<W: World + ?Sized>(
    world: &mut W,
    call: &Call,
    state: &mut SimState,
    pending_go: &mut Vec<PendingGo>,
    sim_time: f64,
) -> Option<Reply> {
    let model = call.model.as_str();
    match call.kind {
        SimRequestKind::Pause => {
            world.pause();
            advance(state, SimState::Paused);
            None
        }
        SimRequestKind::Unpause => {
            world.unpause();
            advance(state, SimState::Running);
            None
        }
        SimRequestKind::Reset => {
            world.reset();
            None
        }
        SimRequestKind::Save => {
            world.save();
            None
        }
        SimRequestKind::SetPose3D => {
            report_missing(world.set_model_pose(model, call.pose), call);
            None
        }
        SimRequestKind::SetPose2D => {
            let (x, y, yaw) = call.pose.to_2d();
            let moved = world
                .model_pose(model)
                .is_some_and(|current| world.set_model_pose(model, current.with_2d(x, y, yaw)));
            report_missing(moved, call);
            None
        }
        SimRequestKind::SetBodyPose2D => {
            report_missing(world.set_body_pose(model, &call.body, call.pose), call);
            None
        }
        SimRequestKind::SetState => {
            report_missing(world.set_model_state(model, &call.state), call);
            None
        }
        SimRequestKind::Go => {
            pending_go.retain(|run| run.token != call.token);
            pending_go.push(PendingGo {
                token: call.token,
                seq: call.index,
                deadline: sim_time + f64::from(call.run_time_us) / 1e6,
            });
            world.unpause();
            advance(state, SimState::Running);
            None
        }
        SimRequestKind::CancelGo => {
            pending_go.retain(|run| run.token != call.token);
            trace!(token = call.token, "go cancelled");
            None
        }
        SimRequestKind::GetPose3D => Some(world.model_pose(model).into()),
        SimRequestKind::GetPose2D => Some(world.model_pose(model).into()),
        SimRequestKind::GetState => Some(world.model_state(model).into()),
        SimRequestKind::GetModelType => Some(world.model_type(model).into()),
        SimRequestKind::GetNumModels => Some(Reply::Count(world.model_names().len() as u32)),
        SimRequestKind::GetNumChildren => {
            Some(world.child_names(model).map(|names| names.len() as u32).into())
        }
        SimRequestKind::GetChildName => Some(
            world
                .child_names(model)
                .and_then(|names| names.into_iter().nth(call.index as usize))
                .into(),
        ),
        SimRequestKind::GetModelName => Some(
            world
                .model_names()
                .into_iter()
                .nth(call.index as usize)
                .into(),
        ),
        SimRequestKind::GetModelFiducialId => Some(world.fiducial_id(model).into()),
        SimRequestKind::GetModelExtent => Some(world.model_extent(model).into()),
        SimRequestKind::GetModelInterfaces => {
            Some(world.model_interfaces(model).map_or(Reply::Failed, Reply::Names))
        }
        SimRequestKind::GetInterfaceType => Some(world.interface_type(model).into()),
    }
}

fn requester_pid(token: u64) -> u32 {
    (token >> 32) as u32
}

fn report_missing(found: bool, call: &Call) {
    if !found {
        debug!(kind = ?call.kind, model = %call.model, "request names an unknown target");
    }
}

fn write_reply(slot: &mut SimulationRequest, call: &Call, reply: Reply) {
    slot.kind = call.kind as u32;
    slot.set_token(call.token);
    slot.ok = 1;
    match reply {
        Reply::Failed => slot.ok = 0,
        Reply::Pose(pose) => slot.model_pose = pose,
        Reply::State(state) => write_state(slot, &state),
        Reply::Count(count) => slot.uint_value = count,
        Reply::Extent(extent) => slot.vec3_value = extent,
        Reply::Text(text) => {
            if cstr_fits(SIM_NAME_LEN, &text) {
                slot.set_str_value(&text);
            } else {
                warn!(kind = ?call.kind, len = text.len(), "reply text too long");
                slot.ok = 0;
            }
        }
        Reply::Names(names) => {
            let fits = names.len() <= MAX_CHILD_INTERFACES
                && names.iter().all(|name| cstr_fits(SIM_NAME_LEN, name));
            if fits {
                slot.set_child_interfaces(&names);
            } else {
                warn!(kind = ?call.kind, count = names.len(), "reply names exceed capacity");
                slot.ok = 0;
            }
        }
    }
}
