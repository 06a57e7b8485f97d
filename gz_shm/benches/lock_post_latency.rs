//! Lock, publish and post latency benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use gz_common::config::ShmConfig;
use gz_common::data::{Laser, Pose, Position};
use gz_shm::{Blocking, Client, Interface, Server};
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

/// Uncontended lock/unlock round trip
fn bench_lock_unlock(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let server = Server::init(&ShmConfig::with_root(dir.path()), 0, false).unwrap();
    let pos = Interface::<Position>::create(&server, "pos").unwrap();

    c.bench_function("lock_unlock_uncontended", |b| {
        b.iter(|| {
            let guard = pos.lock(Blocking::Wait).unwrap().unwrap();
            black_box(guard.state.stall);
            guard.unlock().unwrap();
        });
    });
}

/// Post with no waiters and a full laser publish
fn bench_publish(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let server = Server::init(&ShmConfig::with_root(dir.path()), 1, false).unwrap();
    let laser = Interface::<Laser>::create(&server, "laser").unwrap();
    let scan = vec![2.5f32; 361];
    let mut time = 0.0;

    c.bench_function("post_no_waiters", |b| {
        b.iter(|| laser.post().unwrap());
    });

    c.bench_function("publish_laser_361", |b| {
        b.iter(|| {
            time += 0.01;
            laser
                .publish(time, |data| {
                    data.state.pose = Pose::new_2d(0.1, 0.0, 0.0);
                    data.state.set_scan(black_box(&scan), &[]);
                })
                .unwrap()
        });
    });
}

/// Lock round trip while another handle hammers the same segment
fn bench_contended_lock(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let cfg = ShmConfig::with_root(dir.path());
    let server = Server::init(&cfg, 2, false).unwrap();
    let pos = Interface::<Position>::create(&server, "pos").unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let ready = Arc::new(Barrier::new(2));
    let rival = {
        let cfg = cfg.clone();
        let stop = Arc::clone(&stop);
        let ready = Arc::clone(&ready);
        thread::spawn(move || {
            let client = Client::connect(&cfg, 2).unwrap();
            let pos = Interface::<Position>::open(&client, "pos").unwrap();
            ready.wait();
            while !stop.load(Ordering::Relaxed) {
                let mut guard = pos.lock(Blocking::Wait).unwrap().unwrap();
                guard.state.stall += 1;
            }
        })
    };
    ready.wait();

    c.bench_function("lock_unlock_contended", |b| {
        b.iter(|| {
            let mut guard = pos.lock(Blocking::Wait).unwrap().unwrap();
            guard.state.stall -= 1;
        });
    });

    stop.store(true, Ordering::Relaxed);
    rival.join().unwrap();
}

criterion_group!(benches, bench_lock_unlock, bench_publish, bench_contended_lock);
criterion_main!(benches);
