//! Stand-in simulator for exercising clients without a physics engine.
//!
//! Models sit on the x axis one metre apart. Each gets a `position`
//! interface whose velocity command is integrated every step while the
//! motors are enabled and the stage is running.

use gz_common::data::{Pose, Position, SimState, Vec3};
use gz_shm::{
    Interface, ModelOwner, Server, ShmResult, SimTimes, SimulationControl, TickReport, World,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const MODEL_TYPE: &str = "static_box";

#[derive(Debug, Clone, Copy, PartialEq)]
struct Body {
    id: u32,
    home: Pose,
    pose: Pose,
}

/// A world of named boxes that only move when told to.
#[derive(Debug, Default)]
pub struct StaticWorld {
    paused: bool,
    models: BTreeMap<String, Body>,
}

impl StaticWorld {
    /// Place `names` along the x axis, starting at the origin.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let models = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let home = Pose::new_2d(index as f32, 0.0, 0.0);
                let body = Body {
                    id: index as u32,
                    home,
                    pose: home,
                };
                (name.as_ref().to_string(), body)
            })
            .collect();
        Self {
            paused: false,
            models,
        }
    }

    /// Whether physics is halted.
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl World for StaticWorld {
    fn pause(&mut self) {
        self.paused = true;
    }

    fn unpause(&mut self) {
        self.paused = false;
    }

    fn reset(&mut self) {
        for body in self.models.values_mut() {
            body.pose = body.home;
        }
    }

    fn save(&mut self) {
        for body in self.models.values_mut() {
            body.home = body.pose;
        }
    }

    fn model_pose(&self, model: &str) -> Option<Pose> {
        self.models.get(model).map(|body| body.pose)
    }

    fn set_model_pose(&mut self, model: &str, pose: Pose) -> bool {
        self.models
            .get_mut(model)
            .map(|body| body.pose = pose)
            .is_some()
    }

    fn model_type(&self, model: &str) -> Option<String> {
        self.models
            .contains_key(model)
            .then(|| MODEL_TYPE.to_string())
    }

    fn model_names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    fn child_names(&self, model: &str) -> Option<Vec<String>> {
        self.models.contains_key(model).then(Vec::new)
    }

    fn fiducial_id(&self, model: &str) -> Option<u32> {
        self.models.get(model).map(|body| body.id)
    }

    fn model_extent(&self, model: &str) -> Option<Vec3> {
        self.models
            .contains_key(model)
            .then(|| Vec3::new(0.5, 0.5, 0.5))
    }

    fn model_interfaces(&self, model: &str) -> Option<Vec<String>> {
        self.models
            .contains_key(model)
            .then(|| vec![position_id(model)])
    }

    fn interface_type(&self, iface_id: &str) -> Option<String> {
        let model = iface_id.strip_suffix("::position")?;
        self.models
            .contains_key(model)
            .then(|| "position".to_string())
    }
}

fn position_id(model: &str) -> String {
    format!("{model}::position")
}

/// A [`StaticWorld`] served over a namespace.
pub struct Stage {
    world: StaticWorld,
    control: SimulationControl,
    positions: Vec<(String, Interface<Position>)>,
    started: Instant,
    times: SimTimes,
}

impl Stage {
    /// Create the simulation interface `sim_id` and one `position`
    /// interface per model, then start running.
    pub fn new<S: AsRef<str>>(server: &Server, sim_id: &str, models: &[S]) -> ShmResult<Self> {
        let world = StaticWorld::new(models);
        let mut control = SimulationControl::create(server, sim_id)?;

        let mut positions = Vec::with_capacity(models.len());
        for (name, body) in &world.models {
            let owner = ModelOwner::new(MODEL_TYPE, body.id as i32, -1)?;
            let iface = Interface::<Position>::create_owned(server, &position_id(name), &owner)?;
            positions.push((name.clone(), iface));
        }

        control.set_run_state(SimState::Running)?;
        info!(
            simulation = sim_id,
            models = positions.len(),
            "stage running"
        );
        Ok(Self {
            world,
            control,
            positions,
            started: Instant::now(),
            times: SimTimes::default(),
        })
    }

    /// Advance the clocks by `dt`, serve requests and publish odometry.
    pub fn step(&mut self, dt: Duration) -> ShmResult<TickReport> {
        let dt_s = dt.as_secs_f64();
        if self.world.is_paused() {
            self.times.pause += dt_s;
        } else {
            self.times.sim += dt_s;
        }
        self.times.real = self.started.elapsed().as_secs_f64();

        let report = self.control.tick(&mut self.world, self.times)?;
        if report.processed > 0 || report.completed_go > 0 {
            debug!(
                processed = report.processed,
                responses = report.responses,
                "stage served requests"
            );
        }

        let running = !self.world.is_paused();
        for (name, iface) in &self.positions {
            let Some(body) = self.world.models.get_mut(name) else {
                continue;
            };
            iface.publish(self.times.sim, |data| {
                if running && data.cmd.motors_enabled() {
                    body.pose = drive(body.pose, data.cmd.velocity, dt_s as f32);
                    data.state.velocity = data.cmd.velocity;
                } else {
                    data.state.velocity = Pose::default();
                }
                data.state.pose = body.pose;
            })?;
        }
        Ok(report)
    }

    /// Publish the exiting state.
    pub fn finish(mut self) -> ShmResult<()> {
        self.control.set_run_state(SimState::Exiting)
    }
}

/// Integrate a robot-frame planar velocity over `dt`.
fn drive(pose: Pose, velocity: Pose, dt: f32) -> Pose {
    let (x, y, yaw) = pose.to_2d();
    let (sin, cos) = yaw.sin_cos();
    let vx = velocity.pos.x * cos - velocity.pos.y * sin;
    let vy = velocity.pos.x * sin + velocity.pos.y * cos;
    pose.with_2d(x + vx * dt, y + vy * dt, yaw + velocity.yaw * dt)
}
