//! Schema catalogue tests.
//!
//! The payload layouts are a binary contract shared with processes built
//! from other sources, so these tests pin the sizes and offsets that the
//! header's `payload_size` field advertises.

use gz_common::consts::HEADER_SIZE;
use gz_common::data::camera::CAMERA_MAX_IMAGE;
use gz_common::data::laser::LaserState;
use gz_common::data::simulation::{SIMULATION_MAX_REQUESTS, SimulationRequest};
use gz_common::prelude::*;
use std::mem::offset_of;

fn descriptor_size<D: Device>() -> usize {
    size_of::<D::Payload>()
}

#[test]
fn descriptors_agree_with_runtime_kinds() {
    let pairs: [(DeviceKind, usize); 13] = [
        (Simulation::KIND, descriptor_size::<Simulation>()),
        (Position::KIND, descriptor_size::<Position>()),
        (Imu::KIND, descriptor_size::<Imu>()),
        (Laser::KIND, descriptor_size::<Laser>()),
        (Fiducial::KIND, descriptor_size::<Fiducial>()),
        (Factory::KIND, descriptor_size::<Factory>()),
        (Gripper::KIND, descriptor_size::<Gripper>()),
        (Actarray::KIND, descriptor_size::<Actarray>()),
        (Ptz::KIND, descriptor_size::<Ptz>()),
        (Bumper::KIND, descriptor_size::<Bumper>()),
        (Opaque::KIND, descriptor_size::<Opaque>()),
        (Ir::KIND, descriptor_size::<Ir>()),
        (Camera::KIND, descriptor_size::<Camera>()),
    ];
    for (kind, size) in pairs {
        assert_eq!(kind.payload_size(), size, "{kind}");
    }
    let kinds: Vec<_> = pairs.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(kinds, DeviceKind::ALL.to_vec());
}

#[test]
fn payloads_fit_header_alignment() {
    // The payload starts right after the header.
    assert_eq!(HEADER_SIZE % align_of::<gz_common::data::SimulationData>(), 0);
    assert_eq!(HEADER_SIZE % align_of::<gz_common::data::IrData>(), 0);
    assert_eq!(HEADER_SIZE % align_of::<gz_common::data::CameraData>(), 0);
}

#[test]
fn field_offsets_are_pinned() {
    assert_eq!(offset_of!(LaserState, ranges), 24);
    assert_eq!(offset_of!(LaserState, intensity), 24 + 4 * 1024);
    assert_eq!(offset_of!(SimulationRequest, handle), 8);
    assert_eq!(offset_of!(SimulationRequest, serial), 16);
    assert_eq!(offset_of!(SimulationRequest, model_name), 20);
    assert_eq!(offset_of!(SimulationRequest, run_time), 1644);
    assert_eq!(offset_of!(gz_common::data::SimulationData, requests), 32);
    assert_eq!(
        offset_of!(gz_common::data::SimulationData, responses),
        40 + SIMULATION_MAX_REQUESTS * size_of::<SimulationRequest>()
    );
    assert_eq!(offset_of!(gz_common::data::camera::CameraState, image), 56);
    assert_eq!(size_of::<gz_common::data::CameraData>(), 56 + CAMERA_MAX_IMAGE + 8);
}

#[test]
fn every_payload_can_start_zeroed() {
    let sim = zeroed_box::<gz_common::data::SimulationData>();
    assert_eq!(sim.sim_state(), Some(SimState::NotStarted));
    assert!(sim.requests().is_empty());

    let opaque = zeroed_box::<gz_common::data::OpaqueData>();
    assert!(opaque.data().is_empty());

    let camera = zeroed_box::<gz_common::data::CameraData>();
    assert!(camera.state.image().is_empty());
}
