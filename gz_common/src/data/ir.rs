//! `irarray` interface: infrared range sensors.

use super::geom::Pose;
use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Maximum number of IR beams.
pub const IR_MAX_RANGES: usize = 32;

/// Device marker for the `irarray` kind.
pub enum Ir {}

impl Device for Ir {
    const KIND: DeviceKind = DeviceKind::Ir;
    type Payload = IrData;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct IrState {
    /// Number of IR emitters.
    pub ir_count: i32,
    /// Number of valid entries in `ranges` and `poses`.
    pub range_count: i32,
    pub ranges: [f64; IR_MAX_RANGES],
    /// Beam poses relative to the model.
    pub poses: [Pose; IR_MAX_RANGES],
}

impl IrState {
    /// Store one reading per beam.
    ///
    /// # Panics
    ///
    /// Panics if more than [`IR_MAX_RANGES`] readings are given or the
    /// slices differ in length.
    pub fn set_ranges(&mut self, ranges: &[f64], poses: &[Pose]) {
        assert_eq!(ranges.len(), poses.len(), "one pose per IR range");
        assert!(
            ranges.len() <= IR_MAX_RANGES,
            "{} IR ranges exceed capacity {IR_MAX_RANGES}",
            ranges.len()
        );
        self.ranges[..ranges.len()].copy_from_slice(ranges);
        self.poses[..poses.len()].copy_from_slice(poses);
        self.range_count = ranges.len() as i32;
        self.ir_count = self.range_count;
    }

    /// Valid readings.
    pub fn ranges(&self) -> &[f64] {
        &self.ranges[..(self.range_count.max(0) as usize).min(IR_MAX_RANGES)]
    }
}

/// Payload of an `irarray` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct IrData {
    pub state: IrState,
}

const_assert_eq!(size_of::<IrData>(), 8 + 8 * IR_MAX_RANGES + 24 * IR_MAX_RANGES);

shm_payload!(IrData);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_follow_count() {
        let mut state = IrState::default();
        state.set_ranges(&[0.5, 1.5], &[Pose::default(); 2]);
        assert_eq!(state.ranges(), &[0.5, 1.5]);
        assert_eq!(state.ir_count, 2);
    }

    #[test]
    #[should_panic(expected = "exceed capacity")]
    fn too_many_beams() {
        let mut state = IrState::default();
        state.set_ranges(&[0.0; IR_MAX_RANGES + 1], &[Pose::default(); IR_MAX_RANGES + 1]);
    }
}
