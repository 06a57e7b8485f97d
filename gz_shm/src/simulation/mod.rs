//! Simulation control channel.
//!
//! The `simulation` interface carries the global clock, the run state and a
//! bounded request/response ring. Clients talk to it through
//! [`SimulationIface`]; the simulator drives it with [`SimulationControl`],
//! answering requests from its own [`World`] model.
//!
//! ```text
//!  client                              simulator
//!  ------                              ---------
//!  lock, push request, unlock, post
//!                                      tick: try-lock
//!                                            drain requests in order
//!                                            push responses
//!                                            unlock, post
//!  wait post, lock, take response
//! ```

mod completion;
mod control;
mod iface;

pub use completion::{GoCompletion, GoOutcome};
pub use control::{SimulationControl, TickReport, World};
pub use iface::SimulationIface;

use gz_common::data::{Pose, SimState, Vec3};

/// Pose and motion of a model, as carried by `SetState`/`GetState`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelState {
    /// Model pose.
    pub pose: Pose,
    /// Linear velocity.
    pub linear_vel: Vec3,
    /// Angular velocity.
    pub angular_vel: Vec3,
    /// Linear acceleration.
    pub linear_accel: Vec3,
    /// Angular acceleration.
    pub angular_accel: Vec3,
}

/// Clock values published on every tick, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimTimes {
    /// Elapsed simulated time.
    pub sim: f64,
    /// Accumulated paused time.
    pub pause: f64,
    /// Elapsed wall clock time.
    pub real: f64,
}

/// Snapshot of the simulation interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationStatus {
    /// Clock values of the last tick.
    pub times: SimTimes,
    /// Run state.
    pub state: SimState,
    /// Requests waiting for the next tick.
    pub pending_requests: u32,
}
