//! # Simulator Shared Memory Interfaces
//!
//! Typed, process-shared interfaces between a robot simulator and its client
//! programs. Every interface is one memory-mapped file holding a fixed header
//! and a device payload; a per-server control block carries liveness, client
//! slots and a broadcast "data changed" channel.
//!
//! ## Architecture Overview
//!
//! ```text
//! <root>/gz-<server_id>/
//! ├── .server              control block: owner pid, running flag,
//! │                        broadcast word, 16 client slots
//! ├── sim                  [SegmentHeader | SimulationData]
//! ├── pioneer::position    [SegmentHeader | PositionData]
//! └── pioneer::laser       [SegmentHeader | LaserData]
//! ```
//!
//! The simulator process owns a [`Server`] and creates interfaces; client
//! processes [`Client::connect`] and open them by id. Access to a payload goes
//! through the interface lock ([`Interface::lock`]); writers announce fresh
//! data with [`Interface::post`], which wakes every waiter on the segment and
//! on the server channel.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gz_common::config::ShmConfig;
//! use gz_common::data::Laser;
//! use gz_shm::{Blocking, Client, Interface};
//!
//! # fn main() -> Result<(), gz_shm::ShmError> {
//! let config = ShmConfig::default();
//! let client = Client::connect_wait(&config, 0, 0)?;
//! let laser = Interface::<Laser>::open(&client, "pioneer::laser")?;
//! loop {
//!     client.wait()?;
//!     if let Some(scan) = laser.lock(Blocking::Try)? {
//!         println!("{} ranges at t={}", scan.state.ranges().len(), laser.time());
//!     }
//! }
//! # }
//! ```
//!
//! ## Simulation Control
//!
//! The `simulation` interface carries the clock, the run state and a bounded
//! request ring; see [`simulation`].
//!
//! ## Thread Safety
//!
//! - **Interface**: `Send + Sync`; the lock word serialises access across
//!   threads and processes alike
//! - **Server / Client**: `Send + Sync`
//! - **SimulationIface**: queries on one handle are serialised; `go`
//!   completions are fulfilled by a per-handle watcher thread
//!
//! ## Platform Support
//!
//! Linux futexes back the lock and broadcast words. Other Unix hosts fall
//! back to short sleeps.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod control;
pub mod discovery;
pub mod error;
pub mod header;
pub mod interface;
pub mod namespace;
pub mod platform;
pub mod segment;
pub mod server;
pub mod simulation;
pub mod sync;

pub use client::Client;
pub use discovery::{DiscoveryStats, InterfaceDiscovery, InterfaceInfo};
pub use error::{ShmError, ShmResult};
pub use header::{ModelOwner, SegmentHeader};
pub use interface::{
    ActarrayIface, Blocking, BumperIface, CameraIface, FactoryIface, FiducialIface, GripperIface,
    IfaceGuard, ImuIface, Interface, IrIface, LaserIface, OpaqueIface, PositionIface, PtzIface,
    SimulationInterface,
};
pub use namespace::Namespace;
pub use server::Server;
pub use simulation::{
    GoCompletion, GoOutcome, ModelState, SimTimes, SimulationControl, SimulationIface,
    SimulationStatus, TickReport, World,
};

/// Initialize tracing for tools and tests
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
