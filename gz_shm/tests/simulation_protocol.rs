//! Simulation request/response protocol tests
//!
//! A background thread plays the simulator: it ticks a `SimulationControl`
//! against an in-memory world while client handles talk to it through their
//! own mappings.

use gz_common::config::ShmConfig;
use gz_common::data::{Pose, SimState, Vec3};
use gz_shm::{
    Client, GoOutcome, ModelState, Server, ShmError, ShmResult, SimTimes, SimulationControl,
    SimulationIface, World,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

const SIM_ID: &str = "default::sim";
const STEP: f64 = 0.01;

#[derive(Debug, Default)]
struct Arena {
    paused: bool,
    resets: u32,
    models: BTreeMap<String, ModelState>,
}

impl Arena {
    fn with_robots() -> Self {
        let mut arena = Self::default();
        let robot = ModelState {
            pose: Pose::new(Vec3::new(0.0, 0.0, 0.15), 0.0, 0.0, 0.0),
            ..ModelState::default()
        };
        arena.models.insert("robot1".into(), robot);
        arena.models.insert("robot2".into(), ModelState::default());
        arena
    }
}

impl World for Arena {
    fn pause(&mut self) {
        self.paused = true;
    }

    fn unpause(&mut self) {
        self.paused = false;
    }

    fn reset(&mut self) {
        self.resets += 1;
    }

    fn model_pose(&self, model: &str) -> Option<Pose> {
        self.models.get(model).map(|state| state.pose)
    }

    fn set_model_pose(&mut self, model: &str, pose: Pose) -> bool {
        self.models
            .get_mut(model)
            .map(|state| state.pose = pose)
            .is_some()
    }

    fn model_state(&self, model: &str) -> Option<ModelState> {
        self.models.get(model).copied()
    }

    fn set_model_state(&mut self, model: &str, state: &ModelState) -> bool {
        self.models
            .get_mut(model)
            .map(|slot| *slot = *state)
            .is_some()
    }

    fn model_type(&self, model: &str) -> Option<String> {
        self.models
            .contains_key(model)
            .then(|| "pioneer2dx".to_string())
    }

    fn model_names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    fn model_extent(&self, model: &str) -> Option<Vec3> {
        self.models
            .contains_key(model)
            .then_some(Vec3::new(0.44, 0.38, 0.22))
    }

    fn model_interfaces(&self, model: &str) -> Option<Vec<String>> {
        self.models.contains_key(model).then(|| {
            vec![
                format!("{model}::position_iface_0"),
                format!("{model}::laser_iface_0"),
            ]
        })
    }
}

struct Simulator {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<ShmResult<Arena>>>,
}

impl Simulator {
    fn spawn(mut control: SimulationControl, mut world: Arena) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || -> ShmResult<Arena> {
            let mut times = SimTimes::default();
            while !flag.load(Ordering::Acquire) {
                if control.state() == SimState::Running {
                    times.sim += STEP;
                } else {
                    times.pause += STEP;
                }
                times.real += STEP;
                control.tick(&mut world, times)?;
                thread::sleep(Duration::from_millis(1));
            }
            Ok(world)
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    fn finish(mut self) -> Arena {
        self.stop.store(true, Ordering::Release);
        self.handle
            .take()
            .expect("simulator already joined")
            .join()
            .expect("simulator panicked")
            .expect("simulator failed")
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// Fields drop in order: simulator first, namespace root last.
struct Fixture {
    simulator: Simulator,
    client: Client,
    _server: Server,
    _dir: TempDir,
}

fn fixture(server_id: u32) -> ShmResult<Fixture> {
    let dir = TempDir::new()?;
    let cfg = ShmConfig::with_root(dir.path());
    let server = Server::init(&cfg, server_id, false)?;
    let mut control = SimulationControl::create(&server, SIM_ID)?;
    control.set_run_state(SimState::Paused)?;
    let simulator = Simulator::spawn(control, Arena::with_robots());
    let client = Client::connect(&cfg, server_id)?;
    Ok(Fixture {
        simulator,
        client,
        _server: server,
        _dir: dir,
    })
}

#[test]
fn test_set_pose2d_visible_to_other_handle() -> ShmResult<()> {
    let fx = fixture(0)?;
    let writer = SimulationIface::open(&fx.client, SIM_ID)?;
    let reader = SimulationIface::open(&fx.client, SIM_ID)?;

    writer.set_pose2d("robot1", 1.0, 2.0, 0.5)?;
    assert_eq!(reader.get_pose2d("robot1")?, Some((1.0, 2.0, 0.5)));
    let pose = reader.get_pose3d("robot1")?.expect("robot1 exists");
    assert_eq!(pose.pos.z, 0.15);

    drop((writer, reader));
    let world = fx.simulator.finish();
    assert_eq!(world.models["robot1"].pose.to_2d(), (1.0, 2.0, 0.5));
    Ok(())
}

#[test]
fn test_queries_answer_from_world() -> ShmResult<()> {
    let fx = fixture(1)?;
    let sim = SimulationIface::open(&fx.client, SIM_ID)?;

    assert_eq!(sim.get_num_models()?, Some(2));
    assert_eq!(sim.get_model_name(1)?.as_deref(), Some("robot2"));
    assert_eq!(sim.get_model_name(5)?, None);
    assert_eq!(sim.get_model_type("robot1")?.as_deref(), Some("pioneer2dx"));
    assert_eq!(sim.get_model_type("ghost")?, None);
    assert_eq!(
        sim.get_model_extent("robot2")?,
        Some(Vec3::new(0.44, 0.38, 0.22))
    );
    assert_eq!(
        sim.get_child_interfaces("robot1")?,
        Some(vec![
            "robot1::position_iface_0".to_string(),
            "robot1::laser_iface_0".to_string()
        ])
    );
    // Not provided by this world.
    assert_eq!(sim.get_num_children("robot1")?, None);
    assert_eq!(sim.get_model_fiducial_id("robot1")?, None);
    Ok(())
}

#[test]
fn test_state_round_trip() -> ShmResult<()> {
    let fx = fixture(2)?;
    let sim = SimulationIface::open(&fx.client, SIM_ID)?;
    let state = ModelState {
        pose: Pose::new_2d(3.0, 1.0, -0.5),
        linear_vel: Vec3::new(0.2, 0.0, 0.0),
        angular_vel: Vec3::new(0.0, 0.0, 0.1),
        ..ModelState::default()
    };
    sim.set_state("robot2", &state)?;
    assert_eq!(sim.get_state("robot2")?, Some(state));
    Ok(())
}

#[test]
fn test_pause_unpause_reset() -> ShmResult<()> {
    let fx = fixture(3)?;
    let sim = SimulationIface::open(&fx.client, SIM_ID)?;

    sim.unpause()?;
    sim.reset()?;
    // A query is answered after everything queued before it.
    sim.get_num_models()?;
    assert_eq!(sim.status()?.state, SimState::Running);

    sim.pause()?;
    sim.get_num_models()?;
    let status = sim.status()?;
    assert_eq!(status.state, SimState::Paused);
    assert_eq!(status.pending_requests, 0);

    drop(sim);
    let world = fx.simulator.finish();
    assert!(world.paused);
    assert_eq!(world.resets, 1);
    Ok(())
}

#[test]
fn test_go_completes_after_run_time() -> ShmResult<()> {
    let fx = fixture(4)?;
    let sim = SimulationIface::open(&fx.client, SIM_ID)?;
    let before = sim.status()?.times.sim;

    let completion = sim.go(50_000)?;
    assert_eq!(
        completion.wait_timeout(Duration::from_secs(5)),
        Some(GoOutcome::Completed)
    );
    let status = sim.status()?;
    assert_eq!(status.state, SimState::Paused);
    assert!(status.times.sim - before >= 0.05 - 1e-9);
    Ok(())
}

#[test]
fn test_newer_go_supersedes_older() -> ShmResult<()> {
    let fx = fixture(5)?;
    let sim = SimulationIface::open(&fx.client, SIM_ID)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let first = sim.go_with(10_000_000, move |outcome| {
        let _ = tx.send(outcome);
    })?;
    let second = sim.go(20_000)?;

    assert_eq!(first.try_outcome(), Some(GoOutcome::Superseded));
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(1)).ok(),
        Some(GoOutcome::Superseded)
    );
    assert_eq!(
        second.wait_timeout(Duration::from_secs(5)),
        Some(GoOutcome::Completed)
    );
    Ok(())
}

#[test]
fn test_cancelled_go_stays_cancelled() -> ShmResult<()> {
    let fx = fixture(6)?;
    let sim = SimulationIface::open(&fx.client, SIM_ID)?;
    let completion = sim.go(30_000)?;
    assert!(completion.cancel());
    // Let the run finish on the simulator side.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(completion.try_outcome(), Some(GoOutcome::Cancelled));
    Ok(())
}

#[test]
fn test_request_ring_capacity() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let cfg = ShmConfig::with_root(dir.path());
    let server = Server::init(&cfg, 7, false)?;
    let mut control = SimulationControl::create(&server, SIM_ID)?;
    let client = Client::connect(&cfg, 7)?;
    let sim = SimulationIface::open(&client, SIM_ID)?;

    for _ in 0..gz_common::data::simulation::SIMULATION_MAX_REQUESTS {
        sim.save()?;
    }
    assert!(matches!(
        sim.save(),
        Err(ShmError::CapacityExceeded { .. })
    ));

    let mut world = Arena::with_robots();
    let report = control.tick(&mut world, SimTimes::default())?;
    assert_eq!(report.processed, 128);
    sim.save()?;
    Ok(())
}

#[tokio::test]
async fn test_go_completion_can_be_awaited() -> ShmResult<()> {
    let fx = fixture(8)?;
    let sim = SimulationIface::open(&fx.client, SIM_ID)?;
    let completion = sim.go(20_000)?;
    let outcome = tokio::time::timeout(Duration::from_secs(5), completion)
        .await
        .expect("go did not complete in time");
    assert_eq!(outcome, GoOutcome::Completed);
    Ok(())
}

#[test]
fn test_dropped_go_handles_leave_ring_usable() -> ShmResult<()> {
    let fx = fixture(9)?;
    let max = gz_common::data::simulation::SIMULATION_MAX_REQUESTS;

    for _ in 0..max + 8 {
        let sim = SimulationIface::open(&fx.client, SIM_ID)?;
        sim.go(1)?;
    }
    // Let every run pass its deadline.
    thread::sleep(Duration::from_millis(50));

    let sim = SimulationIface::open(&fx.client, SIM_ID)?;
    assert_eq!(sim.get_num_models()?, Some(2));
    assert_eq!(sim.status()?.pending_requests, 0);
    Ok(())
}

#[test]
fn test_abandoned_query_answers_expire() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let cfg = ShmConfig {
        response_timeout_ms: 20,
        ..ShmConfig::with_root(dir.path())
    };
    let server = Server::init(&cfg, 10, false)?;
    let mut control = SimulationControl::create(&server, SIM_ID)?;
    let client = Client::connect(&cfg, 10)?;
    let mut world = Arena::with_robots();
    let max = gz_common::data::simulation::SIMULATION_MAX_REQUESTS;

    // Each handle gives up before the simulator ticks, then goes away.
    let mut expired = 0;
    for _ in 0..max {
        let sim = SimulationIface::open(&client, SIM_ID)?;
        assert!(matches!(
            sim.get_num_models(),
            Err(ShmError::ResponseTimeout { .. })
        ));
        drop(sim);
        let report = control.tick(&mut world, SimTimes::default())?;
        assert_eq!(report.deferred, 0);
        expired += report.expired;
    }
    thread::sleep(Duration::from_millis(60));
    expired += control.tick(&mut world, SimTimes::default())?.expired;
    assert_eq!(expired, max);

    let simulator = Simulator::spawn(control, world);
    let sim = SimulationIface::open(&client, SIM_ID)?;
    assert_eq!(sim.get_num_models()?, Some(2));
    drop(sim);
    simulator.finish();
    Ok(())
}
