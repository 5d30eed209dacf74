//! Generic `Rotor` trait for propeller meshes or motors.
//!
//! Drivers implement this trait and register themselves with a
//! [`RotorRegistry`][crate::registry::RotorRegistry]. The flight core only
//! ever talks to the trait, so a render-side propeller and a real ESC can be
//! swapped without touching control logic.

use nalgebra::Vector3;
use skyloop_types::SkyError;

/// A spinning rotor that accepts incremental rotations.
pub trait Rotor: Send + Sync {
    /// Stable identifier, e.g. `"rotor_front_left"`.
    fn id(&self) -> &str;

    /// Rotate the rotor by `angle_deg` degrees about `axis` (rotor-local).
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::HardwareFault`] if the rotor cannot be driven.
    fn rotate(&mut self, axis: Vector3<f32>, angle_deg: f32) -> Result<(), SkyError>;

    /// Accumulated rotation about the spin axis in degrees, wrapped to
    /// `[0, 360)`.
    fn angle(&self) -> f32;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockRotor {
        id: String,
        angle: f32,
    }

    impl Rotor for MockRotor {
        fn id(&self) -> &str {
            &self.id
        }

        fn rotate(&mut self, _axis: Vector3<f32>, angle_deg: f32) -> Result<(), SkyError> {
            self.angle = (self.angle + angle_deg).rem_euclid(360.0);
            Ok(())
        }

        fn angle(&self) -> f32 {
            self.angle
        }
    }

    #[test]
    fn mock_rotor_accumulates_and_wraps() {
        let mut rotor = MockRotor {
            id: "rotor_fl".to_string(),
            angle: 0.0,
        };
        assert_eq!(rotor.id(), "rotor_fl");
        rotor.rotate(Vector3::y(), 300.0).unwrap();
        rotor.rotate(Vector3::y(), 100.0).unwrap();
        assert!((rotor.angle() - 40.0).abs() < 1e-4);
    }
}
