//! `actarray` interface: array of linear/rotary actuators.

use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Maximum number of actuators per array.
pub const ACTARRAY_MAX_ACTUATORS: usize = 16;

/// Actuator state codes.
pub mod actuator_state {
    pub const IDLE: u8 = 1;
    pub const MOVING: u8 = 2;
    pub const BRAKED: u8 = 3;
    pub const STALLED: u8 = 4;
}

/// Actuator type codes.
pub mod actuator_type {
    pub const LINEAR: u8 = 1;
    pub const ROTARY: u8 = 2;
}

/// Joint control modes.
pub mod joint_mode {
    pub const POSITION: u32 = 0;
    pub const SPEED: u32 = 1;
    pub const CURRENT: u32 = 2;
}

/// Device marker for the `actarray` kind.
pub enum Actarray {}

impl Device for Actarray {
    const KIND: DeviceKind = DeviceKind::Actarray;
    type Payload = ActarrayData;
}

/// Live state of one actuator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct ActarrayActuator {
    pub position: f32,
    pub speed: f32,
    /// One of [`actuator_state`].
    pub state: u8,
    pub _pad: [u8; 3],
}

/// Static geometry of one actuator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct ActarrayActuatorGeom {
    /// One of [`actuator_type`].
    pub kind: u8,
    pub _pad0: [u8; 3],
    pub min: f32,
    pub center: f32,
    pub max: f32,
    pub home: f32,
    pub config_speed: f32,
    pub max_speed: f32,
    /// Non-zero when the joint has brakes.
    pub has_brakes: u8,
    pub _pad1: [u8; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct ActarrayState {
    /// Number of valid actuators.
    pub actuators_count: u32,
    pub actuators: [ActarrayActuator; ACTARRAY_MAX_ACTUATORS],
    pub actuator_geoms: [ActarrayActuatorGeom; ACTARRAY_MAX_ACTUATORS],
    /// Set by the simulator when the last command was rejected.
    pub bad_cmd: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct ActarrayCmd {
    pub cmd_pos: [f32; ACTARRAY_MAX_ACTUATORS],
    pub cmd_speed: [f32; ACTARRAY_MAX_ACTUATORS],
    /// Non-zero when the arrays above carry an unconsumed command.
    pub new_cmd: u8,
    pub _pad: [u8; 3],
    /// Per-joint [`joint_mode`].
    pub joint_mode: [u32; ACTARRAY_MAX_ACTUATORS],
}

/// Payload of an `actarray` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct ActarrayData {
    pub state: ActarrayState,
    pub cmd: ActarrayCmd,
}

impl ActarrayState {
    /// Publish live actuator readings.
    ///
    /// # Panics
    ///
    /// Panics if more than [`ACTARRAY_MAX_ACTUATORS`] actuators are given.
    pub fn set_actuators(&mut self, actuators: &[ActarrayActuator]) {
        assert!(
            actuators.len() <= ACTARRAY_MAX_ACTUATORS,
            "{} actuators exceed capacity {ACTARRAY_MAX_ACTUATORS}",
            actuators.len()
        );
        self.actuators[..actuators.len()].copy_from_slice(actuators);
        self.actuators_count = actuators.len() as u32;
    }

    /// Valid actuator readings.
    pub fn actuators(&self) -> &[ActarrayActuator] {
        &self.actuators[..(self.actuators_count as usize).min(ACTARRAY_MAX_ACTUATORS)]
    }
}

impl ActarrayData {
    /// Command every joint to a position at the given speed.
    ///
    /// # Panics
    ///
    /// Panics if more than [`ACTARRAY_MAX_ACTUATORS`] targets are given.
    pub fn command_positions(&mut self, targets: &[f32], speed: f32) {
        assert!(
            targets.len() <= ACTARRAY_MAX_ACTUATORS,
            "{} actuator targets exceed capacity {ACTARRAY_MAX_ACTUATORS}",
            targets.len()
        );
        for (joint, &target) in targets.iter().enumerate() {
            self.cmd.cmd_pos[joint] = target;
            self.cmd.cmd_speed[joint] = speed;
            self.cmd.joint_mode[joint] = joint_mode::POSITION;
        }
        self.cmd.new_cmd = 1;
    }
}

const_assert_eq!(size_of::<ActarrayActuator>(), 12);
const_assert_eq!(size_of::<ActarrayActuatorGeom>(), 32);
const_assert_eq!(size_of::<ActarrayState>(), 712);
const_assert_eq!(size_of::<ActarrayCmd>(), 196);
const_assert_eq!(size_of::<ActarrayData>(), 908);

shm_payload!(ActarrayData);
