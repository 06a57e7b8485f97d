//! `camera` interface: monocular image stream.

use super::geom::Pose;
use super::{Device, DeviceKind, shm_payload};
use static_assertions::const_assert_eq;

/// Capacity of the image buffer (640x480 RGB).
pub const CAMERA_MAX_IMAGE: usize = 640 * 480 * 3;

/// Device marker for the `camera` kind.
pub enum Camera {}

impl Device for Camera {
    const KIND: DeviceKind = DeviceKind::Camera;
    type Payload = CameraData;
}

/// Latest frame published by the simulator.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct CameraState {
    pub width: u32,
    pub height: u32,
    /// Bits per pixel.
    pub depth: u32,
    /// Number of valid bytes in `image`.
    pub image_size: u32,
    /// Horizontal field of view (rad).
    pub hfov: f64,
    /// Vertical field of view (rad).
    pub vfov: f64,
    pub camera_pose: Pose,
    pub image: [u8; CAMERA_MAX_IMAGE],
}

impl CameraState {
    /// Store a frame.
    ///
    /// # Panics
    ///
    /// Panics if `pixels` exceeds [`CAMERA_MAX_IMAGE`].
    pub fn set_image(&mut self, width: u32, height: u32, depth: u32, pixels: &[u8]) {
        assert!(
            pixels.len() <= CAMERA_MAX_IMAGE,
            "image of {} bytes exceeds capacity {CAMERA_MAX_IMAGE}",
            pixels.len()
        );
        self.width = width;
        self.height = height;
        self.depth = depth;
        self.image[..pixels.len()].copy_from_slice(pixels);
        self.image_size = pixels.len() as u32;
    }

    /// Valid image bytes.
    pub fn image(&self) -> &[u8] {
        &self.image[..(self.image_size as usize).min(CAMERA_MAX_IMAGE)]
    }
}

impl std::fmt::Debug for CameraState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraState")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.depth)
            .field("image_size", &self.image_size)
            .field("hfov", &self.hfov)
            .field("vfov", &self.vfov)
            .field("camera_pose", &self.camera_pose)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct CameraCmd {
    /// Non-zero asks the simulator to save frames to disk.
    pub save_frames: i32,
    pub _pad: u32,
}

/// Payload of a `camera` segment.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CameraData {
    pub state: CameraState,
    pub cmd: CameraCmd,
}

const_assert_eq!(size_of::<CameraState>(), 921_656);
const_assert_eq!(size_of::<CameraCmd>(), 8);
const_assert_eq!(size_of::<CameraData>(), 921_664);

shm_payload!(CameraData);
