//! `ptz` interface: pan-tilt-zoom unit.

use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// `control_mode` value: drive to the commanded angles.
pub const PTZ_POSITION_CONTROL: u32 = 0;
/// `control_mode` value: drive at the commanded speeds.
pub const PTZ_VELOCITY_CONTROL: u32 = 1;

/// Device marker for the `ptz` kind.
pub enum Ptz {}

impl Device for Ptz {
    const KIND: DeviceKind = DeviceKind::Ptz;
    type Payload = PtzData;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct PtzState {
    /// Pan angle (rad).
    pub pan: f32,
    /// Tilt angle (rad).
    pub tilt: f32,
    /// Field of view (rad).
    pub zoom: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct PtzCmd {
    pub pan: f32,
    pub tilt: f32,
    pub zoom: f32,
    pub pan_speed: f32,
    pub tilt_speed: f32,
    /// [`PTZ_POSITION_CONTROL`] or [`PTZ_VELOCITY_CONTROL`].
    pub control_mode: u32,
}

/// Payload of a `ptz` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct PtzData {
    pub state: PtzState,
    pub cmd: PtzCmd,
}

const_assert_eq!(size_of::<PtzState>(), 12);
const_assert_eq!(size_of::<PtzCmd>(), 24);
const_assert_eq!(size_of::<PtzData>(), 36);

shm_payload!(PtzData);
