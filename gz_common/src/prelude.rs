//! Prelude module for common re-exports.
//!
//! Consumers can do `use gz_common::prelude::*;` and get the configuration
//! types, the device catalogue and the geometry records without listing
//! individual paths.
//!
//! # Usage
//!
//! ```rust
//! use gz_common::prelude::*;
//!
//! let kind = <Laser as Device>::KIND;
//! assert_eq!(kind.tag(), "laser");
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig, ShmConfig};

// ─── Protocol Constants ─────────────────────────────────────────────
pub use crate::consts::{
    CLIENT_ID_PLAYER, CLIENT_ID_USER_FIRST, CLIENT_ID_USER_LAST, CLIENT_ID_VIEWER, MAX_CLIENTS,
    PROTOCOL_VERSION,
};

// ─── Device Catalogue ───────────────────────────────────────────────
pub use crate::data::{
    Actarray, Bumper, Camera, Color, Device, DeviceKind, Factory, Fiducial, Gripper, Imu, Ir,
    Laser, Opaque, Pose, Position, Ptz, ShmPayload, SimRequestKind, SimState, Simulation, Vec2,
    Vec3, zeroed_box,
};

/// Default pause between simulator ticks when a driver has no clock of its
/// own (10 ms).
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);
