//! Interface payload catalogue.
//!
//! Every interface segment is a [`HEADER_SIZE`](crate::consts::HEADER_SIZE)
//! byte header followed by exactly one payload struct from this module. The
//! payload structs are the binary contract other processes code against:
//!
//! - `#[repr(C)]`, fixed size, no `String`/`Vec`/pointers
//! - only integer and float fields (or arrays of them): every bit pattern is
//!   a valid value and the all-zero pattern is the initial state
//! - explicit `_pad` fields, no implicit padding (checked by
//!   `const_assert_eq!` on every struct)
//! - a `state` sub-record written by the simulator and, where the device
//!   accepts commands, a `cmd` sub-record written by clients
//!
//! ## Kind Summary
//!
//! | Kind tag     | Device marker  | Payload struct     | Capacity constants                |
//! |--------------|----------------|--------------------|-----------------------------------|
//! | `simulation` | [`Simulation`] | `SimulationData`   | `SIMULATION_MAX_REQUESTS`         |
//! | `position`   | [`Position`]   | `PositionData`     |                                   |
//! | `imu`        | [`Imu`]        | `ImuData`          |                                   |
//! | `laser`      | [`Laser`]      | `LaserData`        | `LASER_MAX_RANGES`                |
//! | `fiducial`   | [`Fiducial`]   | `FiducialData`     | `FIDUCIAL_MAX_FIDS`               |
//! | `factory`    | [`Factory`]    | `FactoryData`      | `FACTORY_MAX_XML`                 |
//! | `gripper`    | [`Gripper`]    | `GripperData`      |                                   |
//! | `actarray`   | [`Actarray`]   | `ActarrayData`     | `ACTARRAY_MAX_ACTUATORS`          |
//! | `ptz`        | [`Ptz`]        | `PtzData`          |                                   |
//! | `bumper`     | [`Bumper`]     | `BumperData`       | `BUMPER_MAX_COUNT`                |
//! | `opaque`     | [`Opaque`]     | `OpaqueData`       | `OPAQUE_MAX_DATA`                 |
//! | `irarray`    | [`Ir`]         | `IrData`           | `IR_MAX_RANGES`                   |
//! | `camera`     | [`Camera`]     | `CameraData`       | `CAMERA_MAX_IMAGE`                |
//!
//! Writing past a capacity is a caller defect: the typed setters assert.

use crate::consts::KIND_TAG_LEN;
use std::fmt;

pub mod actarray;
pub mod bumper;
pub mod camera;
pub mod factory;
pub mod fiducial;
pub mod geom;
pub mod gripper;
pub mod imu;
pub mod ir;
pub mod laser;
pub mod opaque;
pub mod position;
pub mod ptz;
pub mod simulation;

pub use actarray::{Actarray, ActarrayData};
pub use bumper::{Bumper, BumperData};
pub use camera::{Camera, CameraData};
pub use factory::{Factory, FactoryData};
pub use fiducial::{Fiducial, FiducialData};
pub use geom::{Color, Pose, Vec2, Vec3};
pub use gripper::{Gripper, GripperData};
pub use imu::{Imu, ImuData};
pub use ir::{Ir, IrData};
pub use laser::{Laser, LaserData};
pub use opaque::{Opaque, OpaqueData};
pub use position::{Position, PositionData};
pub use ptz::{Ptz, PtzData};
pub use simulation::{SimRequestKind, SimState, Simulation, SimulationData, SimulationRequest};

/// Marker for structs that may live inside a mapped segment.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, contain only integer/float fields or
/// fixed arrays of them, have no implicit padding, and treat every bit
/// pattern (in particular all zeroes) as a valid value.
pub unsafe trait ShmPayload: Copy + Send + Sync + 'static {}

/// Type-level descriptor of one device kind.
///
/// Ties a [`DeviceKind`] tag to its payload struct so that the interface
/// engine can be written once, generically.
pub trait Device: 'static {
    /// Runtime tag of this kind.
    const KIND: DeviceKind;
    /// Payload layout following the segment header.
    type Payload: ShmPayload;
}

macro_rules! shm_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: plain repr(C) numeric struct, padding is explicit and
            // checked by the const_assert_eq! next to its definition.
            unsafe impl $crate::data::ShmPayload for $ty {}
        )*
    };
}
pub(crate) use shm_payload;

/// Allocate a zero-initialised payload on the heap.
///
/// Payloads run up to several megabytes; never build them on the stack.
pub fn zeroed_box<T: ShmPayload>() -> Box<T> {
    // SAFETY: ShmPayload guarantees the all-zero bit pattern is valid.
    unsafe { Box::<T>::new_zeroed().assume_init() }
}

/// Device kinds known to this protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Simulation control and request ring.
    Simulation,
    /// Mobile base odometry and velocity commands.
    Position,
    /// Inertial measurement unit.
    Imu,
    /// Scanning laser range finder.
    Laser,
    /// Fiducial (barcode) detector.
    Fiducial,
    /// Runtime model spawn/delete requests.
    Factory,
    /// Two degree of freedom gripper.
    Gripper,
    /// Actuator array.
    Actarray,
    /// Pan-tilt-zoom unit.
    Ptz,
    /// Bumper / contact sensors.
    Bumper,
    /// Arbitrary byte transfer.
    Opaque,
    /// Infrared range array.
    Ir,
    /// Monocular camera.
    Camera,
}

impl DeviceKind {
    /// Every kind, in catalogue order.
    pub const ALL: [DeviceKind; 13] = [
        DeviceKind::Simulation,
        DeviceKind::Position,
        DeviceKind::Imu,
        DeviceKind::Laser,
        DeviceKind::Fiducial,
        DeviceKind::Factory,
        DeviceKind::Gripper,
        DeviceKind::Actarray,
        DeviceKind::Ptz,
        DeviceKind::Bumper,
        DeviceKind::Opaque,
        DeviceKind::Ir,
        DeviceKind::Camera,
    ];

    /// Kind tag stored in the segment header.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Simulation => "simulation",
            Self::Position => "position",
            Self::Imu => "imu",
            Self::Laser => "laser",
            Self::Fiducial => "fiducial",
            Self::Factory => "factory",
            Self::Gripper => "gripper",
            Self::Actarray => "actarray",
            Self::Ptz => "ptz",
            Self::Bumper => "bumper",
            Self::Opaque => "opaque",
            Self::Ir => "irarray",
            Self::Camera => "camera",
        }
    }

    /// Look a kind up by its tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Declared payload size in bytes.
    pub const fn payload_size(self) -> usize {
        match self {
            Self::Simulation => size_of::<SimulationData>(),
            Self::Position => size_of::<PositionData>(),
            Self::Imu => size_of::<ImuData>(),
            Self::Laser => size_of::<LaserData>(),
            Self::Fiducial => size_of::<FiducialData>(),
            Self::Factory => size_of::<FactoryData>(),
            Self::Gripper => size_of::<GripperData>(),
            Self::Actarray => size_of::<ActarrayData>(),
            Self::Ptz => size_of::<PtzData>(),
            Self::Bumper => size_of::<BumperData>(),
            Self::Opaque => size_of::<OpaqueData>(),
            Self::Ir => size_of::<IrData>(),
            Self::Camera => size_of::<CameraData>(),
        }
    }

    /// Tag encoded as the NUL-padded header field.
    pub fn encode_tag(self) -> [u8; KIND_TAG_LEN] {
        let mut field = [0u8; KIND_TAG_LEN];
        write_cstr(&mut field, self.tag());
        field
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Copy `text` into a fixed, NUL-terminated byte field and zero the rest.
///
/// # Panics
///
/// Panics if `text` does not fit with its terminator.
pub fn write_cstr(field: &mut [u8], text: &str) {
    assert!(
        cstr_fits(field.len(), text),
        "string of {} bytes exceeds field capacity {}",
        text.len(),
        field.len().saturating_sub(1)
    );
    field[..text.len()].copy_from_slice(text.as_bytes());
    field[text.len()..].fill(0);
}

/// Whether `text` fits a field of `capacity` bytes including the terminator.
pub const fn cstr_fits(capacity: usize, text: &str) -> bool {
    text.len() < capacity
}

/// Read a NUL-terminated byte field (lossy UTF-8).
pub fn read_cstr(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_and_fit_header_field() {
        for kind in DeviceKind::ALL {
            assert_eq!(DeviceKind::from_tag(kind.tag()), Some(kind));
            assert!(cstr_fits(KIND_TAG_LEN, kind.tag()), "{kind} tag too long");
            assert_eq!(read_cstr(&kind.encode_tag()), kind.tag());
        }
        assert_eq!(DeviceKind::from_tag("sonar"), None);
    }

    #[test]
    fn tags_are_unique() {
        for (i, a) in DeviceKind::ALL.iter().enumerate() {
            for b in &DeviceKind::ALL[i + 1..] {
                assert_ne!(a.tag(), b.tag());
            }
        }
    }

    #[test]
    fn payload_sizes_match_catalogue() {
        assert_eq!(DeviceKind::Position.payload_size(), 80);
        assert_eq!(DeviceKind::Laser.payload_size(), 8276);
        assert_eq!(DeviceKind::Fiducial.payload_size(), 11232);
        assert_eq!(DeviceKind::Opaque.payload_size(), 4 + 8 * 1024 * 1024);
        assert!(DeviceKind::Simulation.payload_size() > DeviceKind::Opaque.payload_size());
    }

    #[test]
    fn cstr_helpers() {
        let mut field = [0xFFu8; 8];
        write_cstr(&mut field, "robot");
        assert_eq!(&field, b"robot\0\0\0");
        assert_eq!(read_cstr(&field), "robot");

        write_cstr(&mut field, "");
        assert_eq!(read_cstr(&field), "");

        // Unterminated field reads to its end.
        assert_eq!(read_cstr(b"abc"), "abc");
    }

    #[test]
    #[should_panic(expected = "exceeds field capacity")]
    fn cstr_overflow_is_a_defect() {
        let mut field = [0u8; 4];
        write_cstr(&mut field, "four");
    }

    #[test]
    fn zeroed_box_is_zero() {
        let data = zeroed_box::<PositionData>();
        assert_eq!(data.state.stall, 0);
        assert_eq!(data.cmd.velocity, Pose::default());
    }
}
