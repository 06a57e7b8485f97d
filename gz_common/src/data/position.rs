//! `position` interface: mobile base odometry and velocity commands.

use super::geom::Pose;
use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Device marker for the `position` kind.
pub enum Position {}

impl Device for Position {
    const KIND: DeviceKind = DeviceKind::Position;
    type Payload = PositionData;
}

/// Odometry published by the simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct PositionState {
    /// Pose, usually in the global frame.
    pub pose: Pose,
    /// Velocity in the robot frame.
    pub velocity: Pose,
    /// Motor stall flag (0 = free, 1 = stalled).
    pub stall: i32,
}

/// Commands written by clients.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct PositionCmd {
    /// Enable the motors (0 = off, 1 = on).
    pub enable_motors: i32,
    /// Commanded velocity in the robot frame.
    pub velocity: Pose,
}

/// Payload of a `position` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct PositionData {
    /// Simulator-owned state.
    pub state: PositionState,
    /// Client-owned command.
    pub cmd: PositionCmd,
}

const_assert_eq!(size_of::<PositionState>(), 52);
const_assert_eq!(size_of::<PositionCmd>(), 28);
const_assert_eq!(size_of::<PositionData>(), 80);

shm_payload!(PositionData);

impl PositionCmd {
    /// Whether the client asked for the motors to be powered.
    pub fn motors_enabled(&self) -> bool {
        self.enable_motors != 0
    }
}
