//! `fiducial` interface: barcode detections.

use super::geom::Pose;
use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Maximum number of detections per frame.
pub const FIDUCIAL_MAX_FIDS: usize = 401;

/// Device marker for the `fiducial` kind.
pub enum Fiducial {}

impl Device for Fiducial {
    const KIND: DeviceKind = DeviceKind::Fiducial;
    type Payload = FiducialData;
}

/// A single detected fiducial.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct FiducialFid {
    /// Fiducial id, `-1` when unidentified.
    pub id: i32,
    /// Pose relative to the detector.
    pub pose: Pose,
}

/// Detections published by the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct FiducialState {
    /// Number of valid entries in `fids`.
    pub count: i32,
    /// Detections.
    pub fids: [FiducialFid; FIDUCIAL_MAX_FIDS],
}

impl Default for FiducialState {
    fn default() -> Self {
        Self {
            count: 0,
            fids: [FiducialFid::default(); FIDUCIAL_MAX_FIDS],
        }
    }
}

impl FiducialState {
    /// Drop all detections.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Append a detection.
    ///
    /// # Panics
    ///
    /// Panics when [`FIDUCIAL_MAX_FIDS`] detections are already stored.
    pub fn push(&mut self, fid: FiducialFid) {
        let count = self.count.max(0) as usize;
        assert!(
            count < FIDUCIAL_MAX_FIDS,
            "fiducial list exceeds capacity {FIDUCIAL_MAX_FIDS}"
        );
        self.fids[count] = fid;
        self.count += 1;
    }

    /// Valid detections.
    pub fn fids(&self) -> &[FiducialFid] {
        let count = (self.count.max(0) as usize).min(FIDUCIAL_MAX_FIDS);
        &self.fids[..count]
    }
}

/// Payload of a `fiducial` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct FiducialData {
    /// Simulator-owned state.
    pub state: FiducialState,
}

const_assert_eq!(size_of::<FiducialFid>(), 28);
const_assert_eq!(size_of::<FiducialData>(), 11232);

shm_payload!(FiducialData);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::zeroed_box;

    #[test]
    fn push_and_clear() {
        let mut data = zeroed_box::<FiducialData>();
        data.state.push(FiducialFid {
            id: 7,
            pose: Pose::new_2d(1.0, 0.0, 0.0),
        });
        assert_eq!(data.state.fids().len(), 1);
        assert_eq!(data.state.fids()[0].id, 7);
        data.state.clear();
        assert!(data.state.fids().is_empty());
    }

    #[test]
    #[should_panic(expected = "exceeds capacity")]
    fn overflow_panics() {
        let mut data = zeroed_box::<FiducialData>();
        for id in 0..=FIDUCIAL_MAX_FIDS as i32 {
            data.state.push(FiducialFid {
                id,
                pose: Pose::default(),
            });
        }
    }
}
