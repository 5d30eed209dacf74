//! Tunable constants of the motion controller.

use serde::{Deserialize, Serialize};
use skyloop_hal::LayerMask;
use skyloop_types::SkyError;

/// What the descent does when the ground probe finds nothing in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundLossPolicy {
    /// Keep sinking at the full landing rate until ground shows up. With no
    /// ground at all the vehicle never reaches `Landed`.
    #[default]
    KeepDescending,
    /// Hold the current altitude until the probe reacquires the ground.
    HoldAltitude,
}

/// Flight controller configuration. Distances are world units, angles are
/// degrees, times are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Maximum horizontal/vertical tracking speed.
    pub move_speed: f32,
    /// Descent rate while landing.
    pub land_speed: f32,
    /// Cruise altitude for every non-landing target.
    pub hover_height: f32,
    /// Collision layers the landing probe may hit.
    pub ground_layer: u32,
    /// Degrees of body tilt per unit of local velocity.
    pub tilt_amount: f32,
    /// Attitude interpolation rate (per second).
    pub tilt_speed: f32,
    /// Position smoothing time constant.
    pub smooth_time: f32,
    /// Yaw smoothing time constant.
    pub yaw_smooth_time: f32,
    /// Idle bobbing frequency (rad/s).
    pub bob_frequency: f32,
    /// Idle bobbing half-height.
    pub bob_amplitude: f32,
    /// Base rotor spin rate in degrees per second.
    pub prop_speed: f32,
    /// Distance below which a `MovingToTarget` episode counts as arrived.
    pub arrival_tolerance: f32,
    /// Forward distance covered by one `MOVE_NEXT`.
    pub move_step: f32,
    /// Landing probe range.
    pub probe_range: f32,
    /// Distance from the vehicle origin to its skids; the probe starts this
    /// far above the vehicle and clearance subtracts it again.
    pub body_offset: f32,
    /// Clearance at or below which the vehicle is considered landed.
    pub landing_threshold: f32,
    /// Clearance below which the descent rate is halved.
    pub final_approach_height: f32,
    /// A vehicle created above this altitude starts in `Hovering`.
    pub airborne_threshold: f32,
    pub ground_loss: GroundLossPolicy,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            land_speed: 2.0,
            hover_height: 10.0,
            ground_layer: LayerMask::ALL.0,
            tilt_amount: 3.0,
            tilt_speed: 4.0,
            smooth_time: 0.3,
            yaw_smooth_time: 0.1,
            bob_frequency: 1.5,
            bob_amplitude: 0.01,
            prop_speed: 1000.0,
            arrival_tolerance: 0.2,
            move_step: 10.0,
            probe_range: 50.0,
            body_offset: 1.0,
            landing_threshold: 0.1,
            final_approach_height: 1.0,
            airborne_threshold: 1.0,
            ground_loss: GroundLossPolicy::default(),
        }
    }
}

impl FlightConfig {
    pub fn ground_mask(&self) -> LayerMask {
        LayerMask(self.ground_layer)
    }

    /// Reject values that would stall or destabilise the controller.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SkyError> {
        let positive = [
            ("move_speed", self.move_speed),
            ("land_speed", self.land_speed),
            ("smooth_time", self.smooth_time),
            ("yaw_smooth_time", self.yaw_smooth_time),
            ("arrival_tolerance", self.arrival_tolerance),
            ("probe_range", self.probe_range),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SkyError::Config(format!(
                    "flight.{name} must be a positive number, got {value}"
                )));
            }
        }
        let non_negative = [
            ("tilt_amount", self.tilt_amount),
            ("tilt_speed", self.tilt_speed),
            ("bob_amplitude", self.bob_amplitude),
            ("prop_speed", self.prop_speed),
            ("body_offset", self.body_offset),
            ("landing_threshold", self.landing_threshold),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SkyError::Config(format!(
                    "flight.{name} must not be negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}
