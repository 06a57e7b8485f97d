//! The stand-in stage served over a real namespace
//!
//! A background thread steps the stage while the test talks to it the way a
//! controller would: simulation requests plus position commands.

use gz_common::config::ShmConfig;
use gz_common::data::{Pose, Position, SimState};
use gz_monitor::Stage;
use gz_shm::{Blocking, Client, Interface, Server, ShmResult, SimulationIface};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const SIM_ID: &str = "default::sim";

struct Served {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<ShmResult<()>>>,
}

impl Served {
    fn spawn(mut stage: Stage) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || -> ShmResult<()> {
            while !flag.load(Ordering::Acquire) {
                stage.step(Duration::from_millis(10))?;
                thread::sleep(Duration::from_millis(1));
            }
            stage.finish()
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for Served {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Fixture {
    _served: Served,
    sim: SimulationIface,
    client: Client,
    _server: Server,
    _dir: TempDir,
}

fn fixture(server_id: u32, models: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = ShmConfig::with_root(dir.path());
    let server = Server::init(&config, server_id, false).unwrap();
    let stage = Stage::new(&server, SIM_ID, models).unwrap();
    let served = Served::spawn(stage);
    let client = Client::connect(&config, server_id).unwrap();
    let sim = SimulationIface::open(&client, SIM_ID).unwrap();
    Fixture {
        _served: served,
        sim,
        client,
        _server: server,
        _dir: dir,
    }
}

fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn answers_catalogue_queries() {
    let fx = fixture(30, &["alpha", "beta"]);

    assert_eq!(fx.sim.get_num_models().unwrap(), Some(2));
    assert_eq!(fx.sim.get_model_name(0).unwrap().as_deref(), Some("alpha"));
    assert_eq!(fx.sim.get_pose2d("beta").unwrap(), Some((1.0, 0.0, 0.0)));
    assert_eq!(
        fx.sim.get_child_interfaces("alpha").unwrap(),
        Some(vec!["alpha::position".to_string()])
    );
    assert_eq!(
        fx.sim.get_interface_type("beta::position").unwrap().as_deref(),
        Some("position")
    );
    assert_eq!(fx.sim.get_model_fiducial_id("beta").unwrap(), Some(1));
    assert_eq!(fx.sim.get_pose2d("gamma").unwrap(), None);
}

#[test]
fn position_interfaces_carry_model_owner() {
    let fx = fixture(31, &["alpha", "beta"]);

    let beta = Interface::<Position>::open(&fx.client, "beta::position").unwrap();
    let owner = beta.owner();
    assert_eq!(owner.model_type.as_str(), "static_box");
    assert_eq!(owner.model_id, 1);
    assert_eq!(owner.parent_model_id, -1);

    assert!(eventually(|| {
        let guard = beta.lock(Blocking::Wait).unwrap().unwrap();
        guard.state.pose.to_2d() == (1.0, 0.0, 0.0)
    }));
}

#[test]
fn velocity_command_moves_model_until_reset() {
    let fx = fixture(32, &["alpha"]);
    let alpha = Interface::<Position>::open(&fx.client, "alpha::position").unwrap();

    {
        let mut guard = alpha.lock(Blocking::Wait).unwrap().unwrap();
        guard.cmd.enable_motors = 1;
        guard.cmd.velocity = Pose::new_2d(1.0, 0.0, 0.0);
    }
    assert!(eventually(|| {
        let guard = alpha.lock(Blocking::Wait).unwrap().unwrap();
        guard.state.pose.pos.x > 0.05 && guard.state.velocity.pos.x == 1.0
    }));

    {
        let mut guard = alpha.lock(Blocking::Wait).unwrap().unwrap();
        guard.cmd.enable_motors = 0;
    }
    fx.sim.reset().unwrap();
    assert!(eventually(|| {
        fx.sim.get_pose2d("alpha").unwrap() == Some((0.0, 0.0, 0.0))
    }));
}

#[test]
fn set_pose_then_pause_freezes_clock() {
    let fx = fixture(33, &["alpha"]);

    fx.sim.set_pose2d("alpha", 2.0, -1.0, 0.25).unwrap();
    assert_eq!(fx.sim.get_pose2d("alpha").unwrap(), Some((2.0, -1.0, 0.25)));

    fx.sim.pause().unwrap();
    assert!(eventually(|| fx.sim.status().unwrap().state == SimState::Paused));

    let frozen = fx.sim.status().unwrap().times.sim;
    thread::sleep(Duration::from_millis(50));
    let later = fx.sim.status().unwrap();
    assert_eq!(later.times.sim, frozen);
    assert!(later.times.pause > 0.0);

    fx.sim.unpause().unwrap();
    assert!(eventually(|| fx.sim.status().unwrap().times.sim > frozen));
}
