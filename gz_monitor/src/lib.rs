//! # Namespace Monitor
//!
//! Library half of the `gz_monitor` binary: configuration, report rendering
//! and a static stand-in world that lets the binary act as a minimal
//! simulator for client development.

pub mod config;
pub mod report;
pub mod stage;

pub use config::MonitorConfig;
pub use stage::{Stage, StaticWorld};
