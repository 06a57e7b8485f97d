//! Simulator interface common library
//!
//! This crate provides the protocol constants, configuration loading and the
//! binary schema catalogue shared by every process that touches the
//! simulator's shared memory interfaces.
//!
//! # Module Structure
//!
//! - [`consts`] - Protocol version, magic values, capacities, client ids
//! - [`config`] - Configuration loading traits and types
//! - [`data`] - Fixed-layout payload structs, one family per device kind
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use gz_common::data::{DeviceKind, Pose};
//! use gz_common::config::{ConfigLoader, ShmConfig};
//!
//! assert_eq!(DeviceKind::from_tag("laser"), Some(DeviceKind::Laser));
//! let pose = Pose::new_2d(1.0, 2.0, 0.5);
//! assert_eq!(pose.pos.y, 2.0);
//! ```

pub mod config;
pub mod consts;
pub mod data;
pub mod prelude;
