//! `imu` interface.

use super::geom::Pose;
use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Device marker for the `imu` kind.
pub enum Imu {}

impl Device for Imu {
    const KIND: DeviceKind = DeviceKind::Imu;
    type Payload = ImuData;
}

/// Inertial readings published by the simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct ImuState {
    /// Linear (pos) and angular (roll/pitch/yaw) velocity.
    pub velocity: Pose,
}

/// Payload of an `imu` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct ImuData {
    /// Simulator-owned state.
    pub state: ImuState,
}

const_assert_eq!(size_of::<ImuData>(), 24);

shm_payload!(ImuData);
