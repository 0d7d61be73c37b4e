//! # Pose Composition
//!
//! Tracked objects carry two layers of transform: the raw pose reported by
//! the sensing rig this update, and calibration offsets correcting drift
//! and scale. The renderable pose is always derived:
//!
//! ```text
//! position    = raw_position * scale + offset_position [+ parent_position]
//! orientation = offset_orientation * raw_orientation
//! ```
//!
//! The offset pre-multiplies because it is a world-space drift correction
//! applied before the sensor's own rotation. `offset_orientation` is itself
//! derived from `yaw_offset`, a rotation about world up; recalibration
//! mutates `yaw_offset` and `offset_position`, never the composed fields.
//!
//! The parent position (an avatar carrying a wand) is supplied by the
//! caller at composition time rather than stored here - a cached parent
//! would go stale the moment the avatar moves.

use glam::{EulerRot, Quat, Vec3};

/// World up axis.
pub const UP: Vec3 = Vec3::Y;

/// Sensor-space pose plus calibration offsets for one tracked object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedPose {
    /// Unfiltered position reported by the tracking rig this update.
    pub raw_position: Vec3,
    /// Unfiltered orientation reported by the IMU this update.
    pub raw_orientation: Quat,
    /// Virtual position offset applied on top of the scaled raw reading.
    pub offset_position: Vec3,
    /// Yaw drift correction, radians about world up.
    pub yaw_offset: f32,
    /// Scale applied to raw positions before offsetting.
    ///
    /// The rig reports positions in its own units; scale maps them to
    /// world units. Avatars keep 1.0.
    pub scale: f32,
}

impl TrackedPose {
    /// Identity pose: no offsets, unit scale.
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw_position: Vec3::ZERO,
            raw_orientation: Quat::IDENTITY,
            offset_position: Vec3::ZERO,
            yaw_offset: 0.0,
            scale: 1.0,
        }
    }

    /// The drift-correction quaternion derived from `yaw_offset`.
    #[inline]
    #[must_use]
    pub fn offset_orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw_offset)
    }

    /// Composes the in-game position from the raw reading and offsets.
    #[inline]
    #[must_use]
    pub fn compose_position(&self, parent: Option<Vec3>) -> Vec3 {
        let local = self.raw_position * self.scale + self.offset_position;
        match parent {
            Some(p) => local + p,
            None => local,
        }
    }

    /// Composes the in-game orientation from the raw reading and yaw offset.
    #[inline]
    #[must_use]
    pub fn compose_orientation(&self) -> Quat {
        self.offset_orientation() * self.raw_orientation
    }

    /// The raw forward axis: local -Z rotated by the raw orientation.
    ///
    /// Calibration gestures classify on this, deliberately ignoring the
    /// yaw offset - the gesture is about how the physical wand is held.
    #[inline]
    #[must_use]
    pub fn raw_forward(&self) -> Vec3 {
        self.raw_orientation * Vec3::NEG_Z
    }
}

impl Default for TrackedPose {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the yaw component of an orientation.
///
/// YXZ order, matching the camera-rig convention: yaw first, then pitch,
/// then roll.
#[inline]
#[must_use]
pub fn yaw_of(orientation: Quat) -> f32 {
    orientation.to_euler(EulerRot::YXZ).0
}
