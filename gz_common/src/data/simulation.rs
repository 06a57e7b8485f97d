//! `simulation` interface: global clock, run state and the control ring.
//!
//! Clients append [`SimulationRequest`] records to `requests`; the simulator
//! drains them in order on its next tick and appends one record to
//! `responses` for every query it answers. Both arrays are bounded by
//! [`SIMULATION_MAX_REQUESTS`]: a full ring is reported to the caller, it
//! never wraps around.

use super::geom::{Pose, Vec3};
use super::{Device, DeviceKind, read_cstr, shm_payload, write_cstr};
use static_assertions::const_assert_eq;

/// Capacity of the request ring and of the response ring.
pub const SIMULATION_MAX_REQUESTS: usize = 128;

/// Maximum number of child interface names in one response.
pub const MAX_CHILD_INTERFACES: usize = 256;

/// Capacity of every name field in a request record.
pub const SIM_NAME_LEN: usize = 512;

/// Device marker for the `simulation` kind.
pub enum Simulation {}

impl Device for Simulation {
    const KIND: DeviceKind = DeviceKind::Simulation;
    type Payload = SimulationData;
}

/// Request tags, stored as `u32` in [`SimulationRequest::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SimRequestKind {
    Pause = 0,
    Unpause,
    Reset,
    Save,
    GetPose3D,
    GetPose2D,
    SetPose3D,
    SetPose2D,
    SetBodyPose2D,
    SetState,
    GetState,
    Go,
    GetModelType,
    GetNumModels,
    GetNumChildren,
    GetChildName,
    GetModelName,
    GetModelFiducialId,
    GetModelExtent,
    GetModelInterfaces,
    GetInterfaceType,
    /// Drop the requester's pending `Go` run and its unread `Go` response.
    CancelGo,
}

impl SimRequestKind {
    const ALL: [SimRequestKind; 22] = [
        Self::Pause,
        Self::Unpause,
        Self::Reset,
        Self::Save,
        Self::GetPose3D,
        Self::GetPose2D,
        Self::SetPose3D,
        Self::SetPose2D,
        Self::SetBodyPose2D,
        Self::SetState,
        Self::GetState,
        Self::Go,
        Self::GetModelType,
        Self::GetNumModels,
        Self::GetNumChildren,
        Self::GetChildName,
        Self::GetModelName,
        Self::GetModelFiducialId,
        Self::GetModelExtent,
        Self::GetModelInterfaces,
        Self::GetInterfaceType,
        Self::CancelGo,
    ];

    /// Decode a raw tag.
    pub fn from_u32(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Whether the simulator answers this request with a response record.
    pub const fn expects_response(self) -> bool {
        matches!(
            self,
            Self::GetPose3D
                | Self::GetPose2D
                | Self::GetState
                | Self::Go
                | Self::GetModelType
                | Self::GetNumModels
                | Self::GetNumChildren
                | Self::GetChildName
                | Self::GetModelName
                | Self::GetModelFiducialId
                | Self::GetModelExtent
                | Self::GetModelInterfaces
                | Self::GetInterfaceType
        )
    }
}

/// Run state of the simulation, stored as `u32` in [`SimulationData::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum SimState {
    #[default]
    NotStarted = 0,
    Running = 1,
    Paused = 2,
    Exiting = 3,
}

impl SimState {
    pub const fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::NotStarted),
            1 => Some(Self::Running),
            2 => Some(Self::Paused),
            3 => Some(Self::Exiting),
            _ => None,
        }
    }

    /// Allowed edges: start (running or paused), pause/unpause, and exit from
    /// any started state. `Exiting` is terminal.
    pub const fn can_transition_to(self, next: SimState) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Running)
                | (Self::NotStarted, Self::Paused)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running, Self::Exiting)
                | (Self::Paused, Self::Exiting)
        )
    }
}

/// One request or response record.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct SimulationRequest {
    /// Raw [`SimRequestKind`].
    pub kind: u32,
    /// Requester process id, echoed in the response.
    pub pid: u32,
    /// Requester handle number within `pid`, echoed in the response.
    pub handle: u32,
    /// 1 when the request succeeded (responses only).
    pub ok: u32,
    /// Simulator-assigned response number (responses only).
    pub serial: u32,
    pub model_name: [u8; SIM_NAME_LEN],
    pub body_name: [u8; SIM_NAME_LEN],
    pub str_value: [u8; SIM_NAME_LEN],
    pub vec3_value: Vec3,
    pub uint_value: u32,
    pub model_pose: Pose,
    pub model_linear_vel: Vec3,
    pub model_angular_vel: Vec3,
    pub model_linear_accel: Vec3,
    pub model_angular_accel: Vec3,
    /// Run time for [`SimRequestKind::Go`], in microseconds.
    pub run_time: u32,
    /// Number of valid entries in `child_interfaces`.
    pub n_child_interfaces: i32,
    pub child_interfaces: [[u8; SIM_NAME_LEN]; MAX_CHILD_INTERFACES],
}

impl SimulationRequest {
    /// Reset every field to zero.
    pub fn clear(&mut self) {
        // SAFETY: plain numeric record, all-zero is a valid value.
        unsafe { std::ptr::write_bytes(self as *mut Self, 0, 1) }
    }

    /// Requester correlation id: `pid` in the high half, `handle` in the low.
    pub const fn token(&self) -> u64 {
        ((self.pid as u64) << 32) | self.handle as u64
    }

    pub fn set_token(&mut self, token: u64) {
        self.pid = (token >> 32) as u32;
        self.handle = token as u32;
    }

    pub fn request_kind(&self) -> Option<SimRequestKind> {
        SimRequestKind::from_u32(self.kind)
    }

    pub fn succeeded(&self) -> bool {
        self.ok != 0
    }

    pub fn model_name(&self) -> String {
        read_cstr(&self.model_name)
    }

    /// # Panics
    ///
    /// Panics if `name` does not fit [`SIM_NAME_LEN`].
    pub fn set_model_name(&mut self, name: &str) {
        write_cstr(&mut self.model_name, name);
    }

    pub fn body_name(&self) -> String {
        read_cstr(&self.body_name)
    }

    /// # Panics
    ///
    /// Panics if `name` does not fit [`SIM_NAME_LEN`].
    pub fn set_body_name(&mut self, name: &str) {
        write_cstr(&mut self.body_name, name);
    }

    pub fn str_value(&self) -> String {
        read_cstr(&self.str_value)
    }

    /// # Panics
    ///
    /// Panics if `value` does not fit [`SIM_NAME_LEN`].
    pub fn set_str_value(&mut self, value: &str) {
        write_cstr(&mut self.str_value, value);
    }

    /// Valid child interface names.
    pub fn child_interfaces(&self) -> Vec<String> {
        let count = (self.n_child_interfaces.max(0) as usize).min(MAX_CHILD_INTERFACES);
        self.child_interfaces[..count]
            .iter()
            .map(|name| read_cstr(name))
            .collect()
    }

    /// # Panics
    ///
    /// Panics if more than [`MAX_CHILD_INTERFACES`] names are given or any
    /// name does not fit [`SIM_NAME_LEN`].
    pub fn set_child_interfaces<S: AsRef<str>>(&mut self, names: &[S]) {
        assert!(
            names.len() <= MAX_CHILD_INTERFACES,
            "{} child interfaces exceed capacity {MAX_CHILD_INTERFACES}",
            names.len()
        );
        for (field, name) in self.child_interfaces.iter_mut().zip(names) {
            write_cstr(field, name.as_ref());
        }
        self.n_child_interfaces = names.len() as i32;
    }
}

/// Payload of a `simulation` segment.
///
/// About 34 MB; allocate with [`zeroed_box`](super::zeroed_box).
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SimulationData {
    /// Elapsed simulated time (s).
    pub sim_time: f64,
    /// Accumulated paused time (s).
    pub pause_time: f64,
    /// Elapsed wall clock time (s).
    pub real_time: f64,
    /// Raw [`SimState`].
    pub state: u32,
    /// Number of pending requests.
    pub request_count: u32,
    pub requests: [SimulationRequest; SIMULATION_MAX_REQUESTS],
    /// Number of unconsumed responses.
    pub response_count: u32,
    pub _pad: u32,
    pub responses: [SimulationRequest; SIMULATION_MAX_REQUESTS],
}

const_assert_eq!(size_of::<SimulationRequest>(), 132_724);
const_assert_eq!(
    size_of::<SimulationData>(),
    40 + 2 * SIMULATION_MAX_REQUESTS * size_of::<SimulationRequest>()
);

shm_payload!(SimulationData);

impl SimulationData {
    pub fn sim_state(&self) -> Option<SimState> {
        SimState::from_u32(self.state)
    }

    /// Pending requests, oldest first.
    pub fn requests(&self) -> &[SimulationRequest] {
        &self.requests[..bounded(self.request_count)]
    }

    /// Unconsumed responses, oldest first.
    pub fn responses(&self) -> &[SimulationRequest] {
        &self.responses[..bounded(self.response_count)]
    }

    /// Append a zeroed request record; `None` when the ring is full.
    pub fn push_request(&mut self) -> Option<&mut SimulationRequest> {
        push_slot(&mut self.requests, &mut self.request_count)
    }

    /// Append a zeroed response record; `None` when the ring is full.
    pub fn push_response(&mut self) -> Option<&mut SimulationRequest> {
        push_slot(&mut self.responses, &mut self.response_count)
    }

    /// Remove the oldest response matching `pred`, returning what `extract`
    /// reads from it. Later responses keep their order.
    pub fn take_response<T>(
        &mut self,
        pred: impl Fn(&SimulationRequest) -> bool,
        extract: impl FnOnce(&SimulationRequest) -> T,
    ) -> Option<T> {
        let count = bounded(self.response_count);
        let index = self.responses[..count].iter().position(pred)?;
        let value = extract(&self.responses[index]);
        self.responses.copy_within(index + 1..count, index);
        self.response_count = (count - 1) as u32;
        Some(value)
    }

    /// Remove every response matching `pred`, keeping the order of the rest.
    /// Returns how many were removed.
    pub fn remove_responses(&mut self, pred: impl Fn(&SimulationRequest) -> bool) -> usize {
        let count = bounded(self.response_count);
        let mut kept = 0;
        for index in 0..count {
            if pred(&self.responses[index]) {
                continue;
            }
            if kept != index {
                self.responses[kept] = self.responses[index];
            }
            kept += 1;
        }
        self.response_count = kept as u32;
        count - kept
    }

    /// Drop the first `processed` requests and move the rest to the front.
    pub fn retain_unprocessed(&mut self, processed: usize) {
        let count = bounded(self.request_count);
        let processed = processed.min(count);
        self.requests.copy_within(processed..count, 0);
        self.request_count = (count - processed) as u32;
    }
}

fn bounded(count: u32) -> usize {
    (count as usize).min(SIMULATION_MAX_REQUESTS)
}

fn push_slot<'a>(
    ring: &'a mut [SimulationRequest; SIMULATION_MAX_REQUESTS],
    count: &mut u32,
) -> Option<&'a mut SimulationRequest> {
    let index = *count as usize;
    if index >= SIMULATION_MAX_REQUESTS {
        return None;
    }
    *count += 1;
    let slot = &mut ring[index];
    slot.clear();
    Some(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::zeroed_box;

    fn push(data: &mut SimulationData, kind: SimRequestKind, token: u64) {
        let slot = data.push_request().unwrap();
        slot.kind = kind as u32;
        slot.set_token(token);
    }

    #[test]
    fn request_tags_are_stable() {
        assert_eq!(SimRequestKind::Pause as u32, 0);
        assert_eq!(SimRequestKind::Go as u32, 11);
        assert_eq!(SimRequestKind::GetInterfaceType as u32, 20);
        assert_eq!(SimRequestKind::from_u32(7), Some(SimRequestKind::SetPose2D));
        assert_eq!(SimRequestKind::from_u32(21), Some(SimRequestKind::CancelGo));
        assert_eq!(SimRequestKind::from_u32(22), None);
        assert!(!SimRequestKind::CancelGo.expects_response());
        assert!(!SimRequestKind::SetPose2D.expects_response());
        assert!(SimRequestKind::GetPose2D.expects_response());
    }

    #[test]
    fn state_machine_edges() {
        use SimState::*;
        assert!(NotStarted.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Paused.can_transition_to(Exiting));
        assert!(!Exiting.can_transition_to(Running));
        assert!(!Running.can_transition_to(NotStarted));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn request_ring_is_bounded() {
        let mut data = zeroed_box::<SimulationData>();
        for token in 0..SIMULATION_MAX_REQUESTS as u64 {
            push(&mut data, SimRequestKind::Pause, token);
        }
        assert!(data.push_request().is_none());
        assert_eq!(data.requests().len(), SIMULATION_MAX_REQUESTS);
    }

    #[test]
    fn pushed_slots_are_cleared() {
        let mut data = zeroed_box::<SimulationData>();
        data.push_request().unwrap().set_model_name("robot1");
        data.request_count = 0;
        let slot = data.push_request().unwrap();
        assert_eq!(slot.model_name(), "");
    }

    #[test]
    fn retain_unprocessed_shifts_tail() {
        let mut data = zeroed_box::<SimulationData>();
        for token in 0..5 {
            push(&mut data, SimRequestKind::Save, token);
        }
        data.retain_unprocessed(3);
        let tokens: Vec<u64> = data.requests().iter().map(|r| r.token()).collect();
        assert_eq!(tokens, vec![3, 4]);
    }

    #[test]
    fn take_response_preserves_order() {
        let mut data = zeroed_box::<SimulationData>();
        for (token, value) in [(1, 11), (2, 22), (1, 13)] {
            let slot = data.push_response().unwrap();
            slot.kind = SimRequestKind::GetNumModels as u32;
            slot.set_token(token);
            slot.uint_value = value;
        }
        let got = data.take_response(|r| r.token() == 1, |r| r.uint_value);
        assert_eq!(got, Some(11));
        let remaining: Vec<u32> = data.responses().iter().map(|r| r.uint_value).collect();
        assert_eq!(remaining, vec![22, 13]);
        assert_eq!(data.take_response(|r| r.token() == 9, |r| r.uint_value), None);
    }

    #[test]
    fn token_splits_into_pid_and_handle() {
        let mut data = zeroed_box::<SimulationData>();
        let slot = data.push_request().unwrap();
        slot.set_token((4242 << 32) | 257);
        assert_eq!((slot.pid, slot.handle), (4242, 257));
        assert_eq!(slot.token(), (4242 << 32) | 257);
    }

    #[test]
    fn remove_responses_compacts_survivors() {
        let mut data = zeroed_box::<SimulationData>();
        for serial in 0..6 {
            let slot = data.push_response().unwrap();
            slot.serial = serial;
            slot.set_token(u64::from(serial % 2));
        }
        assert_eq!(data.remove_responses(|r| r.token() == 1), 3);
        let serials: Vec<u32> = data.responses().iter().map(|r| r.serial).collect();
        assert_eq!(serials, vec![0, 2, 4]);
        assert_eq!(data.remove_responses(|r| r.serial > 100), 0);
        assert_eq!(data.responses().len(), 3);
    }

    #[test]
    fn child_interface_names() {
        let mut data = zeroed_box::<SimulationData>();
        let slot = data.push_response().unwrap();
        slot.set_child_interfaces(&["pioneer::laser", "pioneer::position"]);
        assert_eq!(
            data.responses()[0].child_interfaces(),
            vec!["pioneer::laser".to_string(), "pioneer::position".to_string()]
        );
    }
}
