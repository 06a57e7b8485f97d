//! Client half of the simulation channel.

use super::completion::{Callback, GoCompletion, GoOutcome, Shared};
use super::{ModelState, SimTimes, SimulationStatus};
use crate::client::Client;
use crate::error::{ShmError, ShmResult};
use crate::interface::{Blocking, Interface};
use crate::platform::get_current_pid;
use gz_common::data::simulation::{SIM_NAME_LEN, SIMULATION_MAX_REQUESTS};
use gz_common::data::{Pose, SimRequestKind, Simulation, SimulationRequest, Vec3, cstr_fits};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const KIND_COUNT: usize = SimRequestKind::GetInterfaceType as usize + 1;

static HANDLE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Latest `go` registration of a handle.
#[derive(Default)]
struct GoTracker {
    pending: Mutex<Option<(u32, Arc<Shared>)>>,
    next_seq: AtomicU32,
}

impl GoTracker {
    /// Settle the registration `seq` if it is still the latest one.
    fn complete(&self, seq: u32) -> bool {
        let matched = {
            let mut pending = self.pending.lock();
            match pending.as_ref() {
                Some((latest, _)) if *latest == seq => pending.take(),
                _ => None,
            }
        };
        match matched {
            Some((_, shared)) => {
                shared.resolve(GoOutcome::Completed);
                true
            }
            None => false,
        }
    }
}

struct Watcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Client handle on the `simulation` interface.
///
/// Every handle carries its own token (process id and a per-process handle
/// number); the simulator echoes it in responses so concurrent clients never
/// consume each other's answers. Queries on one handle are serialised.
///
/// Dropping a handle cancels its pending `go` with the simulator and
/// removes its unread responses from the ring.
pub struct SimulationIface {
    iface: Arc<Interface<Simulation>>,
    token: u64,
    timeout: Duration,
    poll: Duration,
    /// Per-kind count of timed out queries whose responses may still arrive.
    stale: Mutex<[u32; KIND_COUNT]>,
    go: Arc<GoTracker>,
    watcher: Mutex<Option<Watcher>>,
}

impl SimulationIface {
    /// Open the simulation interface `id` published by the client's server.
    pub fn open(client: &Client, id: &str) -> ShmResult<Self> {
        let iface = Interface::<Simulation>::open(client, id)?;
        let handle = HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let token = (u64::from(get_current_pid()) << 32) | u64::from(handle);
        Ok(Self {
            iface: Arc::new(iface),
            token,
            timeout: client.config().response_timeout(),
            poll: client.config().poll_interval(),
            stale: Mutex::new([0; KIND_COUNT]),
            go: Arc::new(GoTracker::default()),
            watcher: Mutex::new(None),
        })
    }

    /// Correlation token echoed in this handle's responses.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Underlying interface handle.
    pub fn interface(&self) -> &Interface<Simulation> {
        &self.iface
    }

    /// Clock, run state and queue depth as last published.
    pub fn status(&self) -> ShmResult<SimulationStatus> {
        let Some(guard) = self.iface.lock(Blocking::Wait)? else {
            return Err(ShmError::NotLocked {
                name: self.iface.id().to_string(),
            });
        };
        Ok(SimulationStatus {
            times: SimTimes {
                sim: guard.sim_time,
                pause: guard.pause_time,
                real: guard.real_time,
            },
            state: guard.sim_state().unwrap_or_default(),
            pending_requests: guard.request_count,
        })
    }

    // ─── Fire and forget ─────────────────────────────────────────────

    /// Ask the simulator to pause.
    pub fn pause(&self) -> ShmResult<()> {
        self.enqueue(SimRequestKind::Pause, |_| {})
    }

    /// Ask the simulator to resume.
    pub fn unpause(&self) -> ShmResult<()> {
        self.enqueue(SimRequestKind::Unpause, |_| {})
    }

    /// Ask the simulator to reset the world.
    pub fn reset(&self) -> ShmResult<()> {
        self.enqueue(SimRequestKind::Reset, |_| {})
    }

    /// Ask the simulator to save the world.
    pub fn save(&self) -> ShmResult<()> {
        self.enqueue(SimRequestKind::Save, |_| {})
    }

    /// Move `model` to `pose`.
    pub fn set_pose3d(&self, model: &str, pose: Pose) -> ShmResult<()> {
        check_name(model)?;
        self.enqueue(SimRequestKind::SetPose3D, |request| {
            request.set_model_name(model);
            request.model_pose = pose;
        })
    }

    /// Move `model` in the plane; height, roll and pitch are kept.
    pub fn set_pose2d(&self, model: &str, x: f32, y: f32, yaw: f32) -> ShmResult<()> {
        check_name(model)?;
        self.enqueue(SimRequestKind::SetPose2D, |request| {
            request.set_model_name(model);
            request.model_pose = Pose::new_2d(x, y, yaw);
        })
    }

    /// Move `body` of `model` in the plane.
    pub fn set_body_pose2d(
        &self,
        model: &str,
        body: &str,
        x: f32,
        y: f32,
        yaw: f32,
    ) -> ShmResult<()> {
        check_name(model)?;
        check_name(body)?;
        self.enqueue(SimRequestKind::SetBodyPose2D, |request| {
            request.set_model_name(model);
            request.set_body_name(body);
            request.model_pose = Pose::new_2d(x, y, yaw);
        })
    }

    /// Overwrite pose and motion of `model`.
    pub fn set_state(&self, model: &str, state: &ModelState) -> ShmResult<()> {
        check_name(model)?;
        self.enqueue(SimRequestKind::SetState, |request| {
            request.set_model_name(model);
            write_state(request, state);
        })
    }

    // ─── Queries ─────────────────────────────────────────────────────

    /// Pose of `model`.
    pub fn get_pose3d(&self, model: &str) -> ShmResult<Option<Pose>> {
        self.query_model(SimRequestKind::GetPose3D, model, |r| r.model_pose)
    }

    /// Planar pose `(x, y, yaw)` of `model`.
    pub fn get_pose2d(&self, model: &str) -> ShmResult<Option<(f32, f32, f32)>> {
        self.query_model(SimRequestKind::GetPose2D, model, |r| r.model_pose.to_2d())
    }

    /// Pose and motion of `model`.
    pub fn get_state(&self, model: &str) -> ShmResult<Option<ModelState>> {
        self.query_model(SimRequestKind::GetState, model, read_state)
    }

    /// Type name of `model`.
    pub fn get_model_type(&self, model: &str) -> ShmResult<Option<String>> {
        self.query_model(SimRequestKind::GetModelType, model, SimulationRequest::str_value)
    }

    /// Number of top-level models.
    pub fn get_num_models(&self) -> ShmResult<Option<u32>> {
        self.query(SimRequestKind::GetNumModels, |_| {}, |r| r.uint_value)
    }

    /// Number of child models of `model`.
    pub fn get_num_children(&self, model: &str) -> ShmResult<Option<u32>> {
        self.query_model(SimRequestKind::GetNumChildren, model, |r| r.uint_value)
    }

    /// Name of child `index` of `model`.
    pub fn get_child_name(&self, model: &str, index: u32) -> ShmResult<Option<String>> {
        check_name(model)?;
        self.query(
            SimRequestKind::GetChildName,
            |request| {
                request.set_model_name(model);
                request.uint_value = index;
            },
            SimulationRequest::str_value,
        )
    }

    /// Name of top-level model `index`.
    pub fn get_model_name(&self, index: u32) -> ShmResult<Option<String>> {
        self.query(
            SimRequestKind::GetModelName,
            |request| request.uint_value = index,
            SimulationRequest::str_value,
        )
    }

    /// Fiducial id attached to `model`.
    pub fn get_model_fiducial_id(&self, model: &str) -> ShmResult<Option<u32>> {
        self.query_model(SimRequestKind::GetModelFiducialId, model, |r| r.uint_value)
    }

    /// Bounding box extent of `model`.
    pub fn get_model_extent(&self, model: &str) -> ShmResult<Option<Vec3>> {
        self.query_model(SimRequestKind::GetModelExtent, model, |r| r.vec3_value)
    }

    /// Interface ids created by `model`.
    pub fn get_child_interfaces(&self, model: &str) -> ShmResult<Option<Vec<String>>> {
        self.query_model(
            SimRequestKind::GetModelInterfaces,
            model,
            SimulationRequest::child_interfaces,
        )
    }

    /// Kind tag of interface `iface_id`.
    pub fn get_interface_type(&self, iface_id: &str) -> ShmResult<Option<String>> {
        self.query_model(
            SimRequestKind::GetInterfaceType,
            iface_id,
            SimulationRequest::str_value,
        )
    }

    // ─── Go ──────────────────────────────────────────────────────────

    /// Run the simulation for `run_time_us` simulated microseconds, then
    /// pause. Supersedes any earlier `go` of this handle.
    pub fn go(&self, run_time_us: u32) -> ShmResult<GoCompletion> {
        self.register_go(run_time_us, None)
    }

    /// Like [`go`](Self::go), running `callback` once the outcome is known.
    /// Completions run it on the watcher thread, supersession on the thread
    /// calling the newer `go`.
    pub fn go_with(
        &self,
        run_time_us: u32,
        callback: impl FnOnce(GoOutcome) + Send + 'static,
    ) -> ShmResult<GoCompletion> {
        self.register_go(run_time_us, Some(Box::new(callback)))
    }

    fn register_go(&self, run_time_us: u32, callback: Option<Callback>) -> ShmResult<GoCompletion> {
        self.ensure_watcher()?;
        let seq = self.go.next_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let shared = Shared::new(callback);
        let previous = self.go.pending.lock().replace((seq, Arc::clone(&shared)));
        if let Some((old_seq, old)) = previous {
            debug!(token = self.token, old_seq, seq, "go superseded");
            old.resolve(GoOutcome::Superseded);
        }

        if let Err(e) = self.enqueue(SimRequestKind::Go, |request| {
            request.run_time = run_time_us;
            request.uint_value = seq;
        }) {
            {
                let mut pending = self.go.pending.lock();
                if pending.as_ref().is_some_and(|(latest, _)| *latest == seq) {
                    *pending = None;
                }
            }
            shared.resolve(GoOutcome::Cancelled);
            return Err(e);
        }
        debug!(token = self.token, seq, run_time_us, "go requested");
        Ok(GoCompletion::new(shared))
    }

    fn ensure_watcher(&self) -> ShmResult<()> {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return Ok(());
        }
        let stop = Arc::new(AtomicBool::new(false));
        let iface = Arc::clone(&self.iface);
        let go = Arc::clone(&self.go);
        let flag = Arc::clone(&stop);
        let token = self.token;
        let poll = self.poll;
        let handle = thread::Builder::new()
            .name(format!("gz-go-{}", self.iface.id()))
            .spawn(move || watch_go(&iface, &go, token, poll, &flag))?;
        *watcher = Some(Watcher { stop, handle });
        Ok(())
    }

    // ─── Ring access ─────────────────────────────────────────────────

    fn enqueue(
        &self,
        kind: SimRequestKind,
        fill: impl FnOnce(&mut SimulationRequest),
    ) -> ShmResult<()> {
        {
            let Some(mut guard) = self.iface.lock(Blocking::Wait)? else {
                return Err(ShmError::NotLocked {
                    name: self.iface.id().to_string(),
                });
            };
            let request = guard.push_request().ok_or(ShmError::CapacityExceeded {
                what: "simulation request ring",
                capacity: SIMULATION_MAX_REQUESTS,
            })?;
            request.kind = kind as u32;
            request.set_token(self.token);
            fill(request);
            guard.unlock()?;
        }
        trace!(token = self.token, ?kind, "request queued");
        self.iface.post()
    }

    fn query_model<T>(
        &self,
        kind: SimRequestKind,
        model: &str,
        extract: impl Fn(&SimulationRequest) -> T,
    ) -> ShmResult<Option<T>> {
        check_name(model)?;
        self.query(kind, |request| request.set_model_name(model), extract)
    }

    /// Enqueue one request and poll for its response.
    ///
    /// `Ok(None)` when the simulator answered with a failure.
    fn query<T>(
        &self,
        kind: SimRequestKind,
        fill: impl FnOnce(&mut SimulationRequest),
        extract: impl Fn(&SimulationRequest) -> T,
    ) -> ShmResult<Option<T>> {
        let mut stale = self.stale.lock();
        self.enqueue(kind, fill)?;

        let deadline = Instant::now() + self.timeout;
        let raw = kind as u32;
        let token = self.token;
        loop {
            if let Some(mut guard) = self.iface.lock(Blocking::Wait)? {
                loop {
                    let Some((ok, value)) = guard.take_response(
                        |r| r.token() == token && r.kind == raw,
                        |r| (r.succeeded(), extract(r)),
                    ) else {
                        break;
                    };
                    let late = &mut stale[kind as usize];
                    if *late > 0 {
                        *late -= 1;
                        trace!(token, ?kind, "discarded late response");
                        continue;
                    }
                    guard.unlock()?;
                    return Ok(ok.then_some(value));
                }
                guard.unlock()?;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                stale[kind as usize] += 1;
                return Err(ShmError::ResponseTimeout {
                    request: format!("{kind:?}"),
                });
            }
            self.iface.wait_post(Some(remaining.min(self.poll)))?;
        }
    }
}

impl SimulationIface {
    /// Remove every response addressed to this handle.
    fn discard_responses(&self) -> ShmResult<usize> {
        let Some(mut guard) = self.iface.lock(Blocking::Wait)? else {
            return Ok(0);
        };
        let token = self.token;
        let removed = guard.remove_responses(|r| r.token() == token);
        guard.unlock()?;
        Ok(removed)
    }
}

impl Drop for SimulationIface {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.stop.store(true, Ordering::Release);
            if watcher.handle.join().is_err() {
                warn!(token = self.token, "go watcher panicked");
            }
        }
        let pending = self.go.pending.lock().take();
        if let Some((_, shared)) = pending {
            if let Err(e) = self.enqueue(SimRequestKind::CancelGo, |_| {}) {
                warn!(token = self.token, error = %e, "could not cancel pending go");
            }
            shared.resolve(GoOutcome::Cancelled);
        }
        match self.discard_responses() {
            Ok(0) => {}
            Ok(removed) => debug!(token = self.token, removed, "discarded unread responses"),
            Err(e) => warn!(token = self.token, error = %e, "could not discard responses"),
        }
    }
}

impl std::fmt::Debug for SimulationIface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationIface")
            .field("id", &self.iface.id())
            .field("token", &self.token)
            .finish()
    }
}

/// Consume `Go` responses for `token` until `stop` is raised.
fn watch_go(
    iface: &Interface<Simulation>,
    go: &GoTracker,
    token: u64,
    poll: Duration,
    stop: &AtomicBool,
) {
    debug!(token, "go watcher started");
    while !stop.load(Ordering::Acquire) {
        match drain_go(iface, token) {
            Ok(finished) => {
                for seq in finished {
                    if !go.complete(seq) {
                        trace!(token, seq, "dropped response to superseded go");
                    }
                }
            }
            Err(e) => warn!(token, error = %e, "go watcher failed to read responses"),
        }
        if let Err(e) = iface.wait_post(Some(poll)) {
            warn!(token, error = %e, "go watcher wait failed");
            thread::sleep(poll);
        }
    }
    debug!(token, "go watcher stopped");
}

/// Take every `Go` response for `token`; empty when the lock is contended.
fn drain_go(iface: &Interface<Simulation>, token: u64) -> ShmResult<Vec<u32>> {
    let Some(mut guard) = iface.lock(Blocking::Try)? else {
        return Ok(Vec::new());
    };
    let raw = SimRequestKind::Go as u32;
    let mut finished = Vec::new();
    while let Some(seq) =
        guard.take_response(|r| r.token() == token && r.kind == raw, |r| r.uint_value)
    {
        finished.push(seq);
    }
    guard.unlock()?;
    Ok(finished)
}

fn check_name(name: &str) -> ShmResult<()> {
    if cstr_fits(SIM_NAME_LEN, name) {
        Ok(())
    } else {
        Err(ShmError::CapacityExceeded {
            what: "simulation name field",
            capacity: SIM_NAME_LEN - 1,
        })
    }
}

pub(super) fn write_state(request: &mut SimulationRequest, state: &ModelState) {
    request.model_pose = state.pose;
    request.model_linear_vel = state.linear_vel;
    request.model_angular_vel = state.angular_vel;
    request.model_linear_accel = state.linear_accel;
    request.model_angular_accel = state.angular_accel;
}

pub(super) fn read_state(request: &SimulationRequest) -> ModelState {
    ModelState {
        pose: request.model_pose,
        linear_vel: request.model_linear_vel,
        angular_vel: request.model_angular_vel,
        linear_accel: request.model_linear_accel,
        angular_accel: request.model_angular_accel,
    }
}
