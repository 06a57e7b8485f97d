//! `bumper` interface: contact sensors.

use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Maximum number of bumpers per interface.
pub const BUMPER_MAX_COUNT: usize = 128;

/// Device marker for the `bumper` kind.
pub enum Bumper {}

impl Device for Bumper {
    const KIND: DeviceKind = DeviceKind::Bumper;
    type Payload = BumperData;
}

/// Contact flags published by the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct BumperState {
    /// Per-bumper contact flag (0 = free, 1 = pressed).
    pub bumpers: [u8; BUMPER_MAX_COUNT],
    /// Number of valid entries in `bumpers`.
    pub bumper_count: u32,
}

impl Default for BumperState {
    fn default() -> Self {
        Self {
            bumpers: [0; BUMPER_MAX_COUNT],
            bumper_count: 0,
        }
    }
}

impl BumperState {
    /// Store contact flags.
    ///
    /// # Panics
    ///
    /// Panics if more than [`BUMPER_MAX_COUNT`] flags are given.
    pub fn set_bumpers(&mut self, pressed: &[bool]) {
        assert!(
            pressed.len() <= BUMPER_MAX_COUNT,
            "{} bumpers exceed capacity {BUMPER_MAX_COUNT}",
            pressed.len()
        );
        for (slot, &flag) in self.bumpers.iter_mut().zip(pressed) {
            *slot = u8::from(flag);
        }
        self.bumpers[pressed.len()..].fill(0);
        self.bumper_count = pressed.len() as u32;
    }

    /// Whether any valid bumper reports contact.
    pub fn any_pressed(&self) -> bool {
        let count = (self.bumper_count as usize).min(BUMPER_MAX_COUNT);
        self.bumpers[..count].iter().any(|&b| b != 0)
    }
}

/// Payload of a `bumper` segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct BumperData {
    pub state: BumperState,
}

const_assert_eq!(size_of::<BumperData>(), 132);

shm_payload!(BumperData);
