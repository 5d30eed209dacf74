//! Vehicle pose and body frame.
//!
//! World axes are y-up with +z forward and +x to the right. Attitude is held
//! as Euler angles in degrees and composed as yaw about Y, then pitch about X,
//! then roll about Z. Under that composition a positive pitch drops the nose
//! and a positive roll lifts the right side.

use nalgebra::{UnitQuaternion, Vector3};

use crate::smoothing::normalize_signed;

/// Position plus attitude of the vehicle body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehiclePose {
    pub position: Vector3<f32>,
    /// Degrees about the body X axis.
    pub pitch: f32,
    /// Degrees about the world Y axis.
    pub yaw: f32,
    /// Degrees about the body Z axis.
    pub roll: f32,
}

impl Default for VehiclePose {
    fn default() -> Self {
        Self::at(Vector3::zeros())
    }
}

impl VehiclePose {
    /// A level pose facing +z at `position`.
    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
        }
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }

    /// Body-to-world rotation.
    pub fn orientation(&self) -> UnitQuaternion<f32> {
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.yaw.to_radians());
        let pitch = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.pitch.to_radians());
        let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.roll.to_radians());
        yaw * pitch * roll
    }

    /// Unit vector along the body's nose, in world coordinates.
    pub fn forward(&self) -> Vector3<f32> {
        self.orientation() * Vector3::z()
    }

    /// Express a world-frame direction in the body frame.
    pub fn to_local(&self, world: Vector3<f32>) -> Vector3<f32> {
        self.orientation().inverse_transform_vector(&world)
    }

    /// Pitch/roll the body should lean to for a world-frame `velocity`:
    /// pitch follows forward speed, roll opposes lateral speed.
    pub fn tilt_targets(&self, velocity: Vector3<f32>, tilt_amount: f32) -> (f32, f32) {
        let local = self.to_local(velocity);
        (local.z * tilt_amount, -local.x * tilt_amount)
    }

    /// Pitch and roll mapped into `[-180, 180)`.
    pub fn signed_tilt(&self) -> (f32, f32) {
        (normalize_signed(self.pitch), normalize_signed(self.roll))
    }
}
