//! `laser` interface: scanning range finder.

use super::geom::{Pose, Vec3};
use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Maximum number of range readings per scan.
pub const LASER_MAX_RANGES: usize = 1024;

/// Device marker for the `laser` kind.
pub enum Laser {}

impl Device for Laser {
    const KIND: DeviceKind = DeviceKind::Laser;
    type Payload = LaserData;
}

/// One scan plus its geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct LaserState {
    /// Start angle of the scan (rad).
    pub min_angle: f32,
    /// End angle of the scan (rad).
    pub max_angle: f32,
    /// Angular resolution (rad).
    pub res_angle: f32,
    /// Range resolution (m).
    pub res_range: f32,
    /// Maximum range (m).
    pub max_range: f32,
    /// Number of valid entries in `ranges` and `intensity`.
    pub range_count: i32,
    /// Range readings (m).
    pub ranges: [f32; LASER_MAX_RANGES],
    /// Intensity readings.
    pub intensity: [i32; LASER_MAX_RANGES],
    /// Sensor pose relative to its model.
    pub pose: Pose,
    /// Sensor bounding box.
    pub size: Vec3,
}

impl Default for LaserState {
    fn default() -> Self {
        Self {
            min_angle: 0.0,
            max_angle: 0.0,
            res_angle: 0.0,
            res_range: 0.0,
            max_range: 0.0,
            range_count: 0,
            ranges: [0.0; LASER_MAX_RANGES],
            intensity: [0; LASER_MAX_RANGES],
            pose: Pose::default(),
            size: Vec3::default(),
        }
    }
}

impl LaserState {
    /// Store a scan; intensities default to zero when shorter than `ranges`.
    ///
    /// # Panics
    ///
    /// Panics if either slice exceeds [`LASER_MAX_RANGES`].
    pub fn set_scan(&mut self, ranges: &[f32], intensity: &[i32]) {
        assert!(
            ranges.len() <= LASER_MAX_RANGES && intensity.len() <= LASER_MAX_RANGES,
            "scan of {} ranges exceeds capacity {LASER_MAX_RANGES}",
            ranges.len().max(intensity.len())
        );
        self.ranges[..ranges.len()].copy_from_slice(ranges);
        self.ranges[ranges.len()..].fill(0.0);
        self.intensity[..intensity.len()].copy_from_slice(intensity);
        self.intensity[intensity.len()..].fill(0);
        self.range_count = ranges.len() as i32;
    }

    /// Valid range readings.
    pub fn ranges(&self) -> &[f32] {
        let count = (self.range_count.max(0) as usize).min(LASER_MAX_RANGES);
        &self.ranges[..count]
    }
}

/// Scan reconfiguration requested by a client.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct LaserCmd {
    /// Non-zero when the angle fields carry a new request.
    pub new_angle: i32,
    /// Non-zero when `range_count` carries a new request.
    pub new_length: i32,
    /// Requested maximum range.
    pub max_range: f32,
    /// Requested start angle.
    pub min_angle: f32,
    /// Requested end angle.
    pub max_angle: f32,
    /// Requested number of readings.
    pub range_count: i32,
}

/// Payload of a `laser` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct LaserData {
    /// Simulator-owned state.
    pub state: LaserState,
    /// Client-owned command.
    pub cmd: LaserCmd,
}

const_assert_eq!(size_of::<LaserState>(), 8252);
const_assert_eq!(size_of::<LaserCmd>(), 24);
const_assert_eq!(size_of::<LaserData>(), 8276);

shm_payload!(LaserData);
