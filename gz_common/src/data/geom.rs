//! Geometry records shared by several payloads.
//!
//! All fields are `f32`; positions in metres, angles in radians.

use static_assertions::const_assert_eq;

/// 2D vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Vec2 {
    /// X value.
    pub x: f32,
    /// Y value.
    pub y: f32,
}

/// 3D vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Vec3 {
    /// X value.
    pub x: f32,
    /// Y value.
    pub y: f32,
    /// Z value.
    pub z: f32,
}

impl Vec3 {
    /// Build a vector from its components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Position plus Euler orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Pose {
    /// 3D position.
    pub pos: Vec3,
    /// Roll angle.
    pub roll: f32,
    /// Pitch angle.
    pub pitch: f32,
    /// Yaw angle.
    pub yaw: f32,
}

impl Pose {
    /// Build a full 3D pose.
    pub const fn new(pos: Vec3, roll: f32, pitch: f32, yaw: f32) -> Self {
        Self {
            pos,
            roll,
            pitch,
            yaw,
        }
    }

    /// Planar pose: z, roll and pitch are zero.
    pub const fn new_2d(x: f32, y: f32, yaw: f32) -> Self {
        Self::new(Vec3::new(x, y, 0.0), 0.0, 0.0, yaw)
    }

    /// Planar projection `(x, y, yaw)`.
    pub const fn to_2d(&self) -> (f32, f32, f32) {
        (self.pos.x, self.pos.y, self.yaw)
    }

    /// Replace the planar components, keeping z, roll and pitch.
    pub const fn with_2d(self, x: f32, y: f32, yaw: f32) -> Self {
        Self::new(Vec3::new(x, y, self.pos.z), self.roll, self.pitch, yaw)
    }
}

/// RGBA color.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

const_assert_eq!(size_of::<Vec2>(), 8);
const_assert_eq!(size_of::<Vec3>(), 12);
const_assert_eq!(size_of::<Pose>(), 24);
const_assert_eq!(size_of::<Color>(), 16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_update_keeps_out_of_plane_components() {
        let pose = Pose::new(Vec3::new(0.0, 0.0, 0.3), 0.1, 0.2, 0.0);
        let moved = pose.with_2d(1.0, 2.0, 0.5);
        assert_eq!(moved.to_2d(), (1.0, 2.0, 0.5));
        assert_eq!(moved.pos.z, 0.3);
        assert_eq!((moved.roll, moved.pitch), (0.1, 0.2));
    }

    #[test]
    fn new_2d_is_flat() {
        let pose = Pose::new_2d(3.0, -1.0, 1.5);
        assert_eq!(pose.pos.z, 0.0);
        assert_eq!(pose.roll, 0.0);
        assert_eq!(pose.to_2d(), (3.0, -1.0, 1.5));
    }
}
