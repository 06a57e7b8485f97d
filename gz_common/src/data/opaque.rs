//! `opaque` interface: raw byte transfer.

use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Capacity of the opaque buffer (8 MiB).
pub const OPAQUE_MAX_DATA: usize = 8 * 1024 * 1024;

/// Device marker for the `opaque` kind.
pub enum Opaque {}

impl Device for Opaque {
    const KIND: DeviceKind = DeviceKind::Opaque;
    type Payload = OpaqueData;
}

/// Payload of an `opaque` segment.
///
/// Too large for the stack; allocate with [`zeroed_box`](super::zeroed_box).
#[derive(Clone, Copy)]
#[repr(C)]
pub struct OpaqueData {
    /// Number of valid bytes in `data`.
    pub data_count: u32,
    pub data: [u8; OPAQUE_MAX_DATA],
}

impl OpaqueData {
    /// Replace the buffer contents.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` exceeds [`OPAQUE_MAX_DATA`].
    pub fn set_data(&mut self, bytes: &[u8]) {
        assert!(
            bytes.len() <= OPAQUE_MAX_DATA,
            "{} bytes exceed opaque capacity {OPAQUE_MAX_DATA}",
            bytes.len()
        );
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.data_count = bytes.len() as u32;
    }

    /// Valid bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..(self.data_count as usize).min(OPAQUE_MAX_DATA)]
    }
}

impl std::fmt::Debug for OpaqueData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueData")
            .field("data_count", &self.data_count)
            .finish_non_exhaustive()
    }
}

const_assert_eq!(size_of::<OpaqueData>(), 4 + OPAQUE_MAX_DATA);

shm_payload!(OpaqueData);
