//! Basic functionality tests for the interface engine

use gz_common::config::ShmConfig;
use gz_common::data::{DeviceKind, Imu, Laser, Pose, Position};
use gz_shm::{Blocking, Client, Interface, ModelOwner, Server, ShmError, ShmResult};
use tempfile::TempDir;

fn config(dir: &TempDir) -> ShmConfig {
    ShmConfig::with_root(dir.path())
}

#[test]
fn test_create_write_open_read() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let server = Server::init(&config(&dir), 0, false)?;
    let odom = Interface::<Position>::create(&server, "pioneer::position")?;
    assert!(odom.publish(1.5, |data| {
        data.state.pose = Pose::new_2d(1.0, -2.0, 0.25);
        data.state.stall = 1;
    })?);

    let client = Client::connect(&config(&dir), 0)?;
    let view = Interface::<Position>::open(&client, "pioneer::position")?;
    assert_eq!(view.time(), 1.5);
    assert_eq!(view.kind(), DeviceKind::Position);
    let guard = view.lock(Blocking::Wait)?.expect("blocking lock");
    assert_eq!(guard.state.pose.to_2d(), (1.0, -2.0, 0.25));
    assert_eq!(guard.state.stall, 1);
    Ok(())
}

#[test]
fn test_open_with_wrong_kind_fails() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let server = Server::init(&config(&dir), 1, false)?;
    let _laser = Interface::<Laser>::create(&server, "laser")?;
    let client = Client::connect(&config(&dir), 1)?;

    match Interface::<Imu>::open(&client, "laser") {
        Err(ShmError::TypeMismatch { expected, found, .. }) => {
            assert_eq!(expected, "imu");
            assert_eq!(found, "laser");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    assert!(matches!(
        Interface::<Imu>::open(&client, "missing"),
        Err(ShmError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_open_count_tracks_handles() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let server = Server::init(&config(&dir), 2, false)?;
    let imu = Interface::<Imu>::create(&server, "imu")?;
    let client = Client::connect(&config(&dir), 2)?;

    let a = Interface::<Imu>::open(&client, "imu")?;
    let b = Interface::<Imu>::open(&client, "imu")?;
    assert_eq!(imu.open_count(), 2);
    a.close()?;
    assert_eq!(imu.open_count(), 1);
    drop(b);
    assert_eq!(imu.open_count(), 0);
    Ok(())
}

#[test]
fn test_destroy_rules() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let server = Server::init(&config(&dir), 3, false)?;
    let imu = Interface::<Imu>::create(&server, "imu")?;
    let client = Client::connect(&config(&dir), 3)?;

    let viewer = Interface::<Imu>::open(&client, "imu")?;
    assert!(matches!(viewer.destroy(), Err(ShmError::NotCreator { .. })));
    assert!(client.interface_exists("imu"));
    assert_eq!(imu.open_count(), 0);

    imu.destroy()?;
    assert!(!client.interface_exists("imu"));
    Ok(())
}

#[test]
fn test_owner_recorded_in_header() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let server = Server::init(&config(&dir), 4, false)?;
    let owner = ModelOwner::new("pioneer2dx", 7, 2)?;
    let _pos = Interface::<Position>::create_owned(&server, "robot::position", &owner)?;

    let client = Client::connect(&config(&dir), 4)?;
    let view = Interface::<Position>::open(&client, "robot::position")?;
    assert_eq!(view.owner(), owner);
    assert!(!view.is_creator());
    Ok(())
}

#[test]
fn test_invalid_ids_rejected() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let server = Server::init(&config(&dir), 5, false)?;
    for id in ["", ".server", "a/b", &"x".repeat(256)] {
        assert!(
            matches!(
                Interface::<Imu>::create(&server, id),
                Err(ShmError::InvalidId { .. })
            ),
            "id {id:?} accepted"
        );
    }
    Ok(())
}

#[test]
fn test_server_lifecycle() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let cfg = config(&dir);
    assert!(!Client::query(&cfg, 6));

    let server = Server::init(&cfg, 6, false)?;
    assert!(Client::query(&cfg, 6));
    assert!(matches!(
        Server::init(&cfg, 6, false),
        Err(ShmError::AlreadyRunning { server_id: 6 })
    ));
    let forced = Server::init(&cfg, 6, true)?;
    drop(server);

    forced.fini()?;
    assert!(!Client::query(&cfg, 6));
    assert!(matches!(
        Client::connect(&cfg, 6),
        Err(ShmError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_client_slots() -> ShmResult<()> {
    let dir = TempDir::new()?;
    let cfg = config(&dir);
    let _server = Server::init(&cfg, 7, false)?;

    let viewer = Client::connect_wait(&cfg, 7, gz_common::consts::CLIENT_ID_VIEWER)?;
    assert_eq!(viewer.client_id(), Some(8));
    assert!(matches!(
        Client::connect_wait(&cfg, 7, 8),
        Err(ShmError::IdInUse { client_id: 8 })
    ));
    assert!(matches!(
        Client::connect_wait(&cfg, 7, 16),
        Err(ShmError::InvalidClientId { client_id: 16 })
    ));
    viewer.disconnect()?;
    let again = Client::connect_wait(&cfg, 7, 8)?;
    assert_eq!(again.server_id(), 7);
    Ok(())
}
