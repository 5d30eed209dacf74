//! [`MotionController`] – the flight state machine.
//!
//! One controller owns one vehicle: its pose, its [`FlightState`], the
//! current [`MotionTarget`] and the auxiliary smoothing integrators. The
//! owner calls [`MotionController::tick`] once per simulation step and feeds
//! commands in between through [`MotionController::receive_command`]; both
//! take `&mut self`, so state is only ever mutated from a single logical
//! thread.
//!
//! # Per-tick behaviour
//!
//! | State | Step |
//! |---|---|
//! | `Hovering` | follow the target plus an idle bob, level the body |
//! | `MovingToTarget` | follow the target, check arrival, tilt with velocity |
//! | `Landing` | probe-controlled descent, level the body |
//! | `Landed` | nothing; rotors spin down |
//!
//! The rotor step runs first on every tick, whatever the state.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Vector3;
//! use skyloop_flight::{FlightConfig, MotionController, VehiclePose};
//! use skyloop_hal::sim::FlatGround;
//! use skyloop_types::FlightState;
//!
//! let mut ctl = MotionController::new(FlightConfig::default(), VehiclePose::default());
//! ctl.receive_command("TAKEOFF");
//! assert_eq!(ctl.state(), FlightState::MovingToTarget);
//! assert_eq!(ctl.target().position, Vector3::new(0.0, 10.0, 0.0));
//!
//! let ground = FlatGround::new(0.0);
//! for _ in 0..600 {
//!     ctl.tick(1.0 / 60.0, &ground);
//! }
//! assert_eq!(ctl.state(), FlightState::Hovering);
//! ```

use nalgebra::Vector3;
use skyloop_hal::{GroundProbe, RotorRegistry, StatusSink};
use skyloop_types::{FlightCommand, FlightState, FlightTelemetry, SkyError};
use tracing::{debug, info, warn};

use crate::config::{FlightConfig, GroundLossPolicy};
use crate::pose::VehiclePose;
use crate::smoothing::{lerp, lerp_angle, smooth_damp, smooth_damp_angle, wrap_degrees};

/// Rotor rate multipliers relative to [`FlightConfig::prop_speed`].
const MOVING_ROTOR_FACTOR: f32 = 1.5;
const LANDING_ROTOR_FACTOR: f32 = 0.8;

/// Where the controller is steering the vehicle. Always in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTarget {
    pub position: Vector3<f32>,
    pub yaw: f32,
}

/// Integrator state of the smoothing laws. Not physical truth.
#[derive(Debug, Clone, Copy, Default)]
struct SmoothingState {
    velocity: Vector3<f32>,
    yaw_rate: f32,
}

/// Finite-state motion controller for a single vehicle.
pub struct MotionController {
    config: FlightConfig,
    pose: VehiclePose,
    state: FlightState,
    target: MotionTarget,
    smoothing: SmoothingState,
    /// Rotor spin rate in degrees per second, persisted so the idle
    /// spin-down decays over time.
    rotor_speed: f32,
    rotors: RotorRegistry,
    status: Option<Box<dyn StatusSink>>,
    sim_time: f32,
    rotor_fault: Option<SkyError>,
    unreported_fault: Option<SkyError>,
}

impl MotionController {
    /// Seed a controller from the pose the vehicle currently has.
    ///
    /// The vehicle starts `Landed` unless it is already higher than
    /// [`FlightConfig::airborne_threshold`], in which case it starts
    /// `Hovering` in place.
    pub fn new(config: FlightConfig, pose: VehiclePose) -> Self {
        let state = if pose.position.y > config.airborne_threshold {
            FlightState::Hovering
        } else {
            FlightState::Landed
        };
        Self {
            target: MotionTarget {
                position: pose.position,
                yaw: pose.yaw,
            },
            config,
            pose,
            state,
            smoothing: SmoothingState::default(),
            rotor_speed: 0.0,
            rotors: RotorRegistry::new(),
            status: None,
            sim_time: 0.0,
            rotor_fault: None,
            unreported_fault: None,
        }
    }

    /// Drive these rotors on every tick.
    pub fn with_rotors(mut self, rotors: RotorRegistry) -> Self {
        self.rotors = rotors;
        self
    }

    /// Report state changes to `sink`. The current state is shown at once.
    pub fn with_status_sink(mut self, mut sink: Box<dyn StatusSink>) -> Self {
        sink.display_state(self.state.status_text());
        self.status = Some(sink);
        self
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn pose(&self) -> &VehiclePose {
        &self.pose
    }

    pub fn target(&self) -> &MotionTarget {
        &self.target
    }

    /// Velocity estimate of the position smoother.
    pub fn velocity(&self) -> Vector3<f32> {
        self.smoothing.velocity
    }

    pub fn rotor_speed(&self) -> f32 {
        self.rotor_speed
    }

    pub fn rotors(&self) -> &RotorRegistry {
        &self.rotors
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    /// Seconds of simulated time since construction.
    pub fn sim_time(&self) -> f32 {
        self.sim_time
    }

    /// Snapshot for the bus and the world-transform owner.
    pub fn telemetry(&self) -> FlightTelemetry {
        let p = self.pose.position;
        let t = self.target.position;
        FlightTelemetry {
            position: [p.x, p.y, p.z],
            pitch_deg: self.pose.pitch,
            yaw_deg: self.pose.yaw,
            roll_deg: self.pose.roll,
            target: [t.x, t.y, t.z],
            state: self.state,
            rotor_speed_dps: self.rotor_speed,
            sim_time: self.sim_time,
        }
    }

    /// A rotor fault not yet handed out. Each distinct fault is returned once.
    pub fn take_rotor_fault(&mut self) -> Option<SkyError> {
        self.unreported_fault.take()
    }

    // ── Commands ────────────────────────────────────────────────────────────

    /// Apply a free-form text command.
    ///
    /// Unrecognised text is ignored. See [`FlightCommand::parse`] for the
    /// matching rules.
    pub fn receive_command(&mut self, text: &str) {
        match FlightCommand::parse(text) {
            Some(command) => {
                self.apply(command);
            }
            None => debug!(text, "no command keyword, ignoring"),
        }
    }

    /// Apply a parsed command. Returns `false` when it was ignored because
    /// the vehicle is on the ground.
    ///
    /// A new command replaces whatever the previous one was doing.
    pub fn apply(&mut self, command: FlightCommand) -> bool {
        if self.state == FlightState::Landed && command != FlightCommand::Takeoff {
            debug!(%command, "landed, ignoring");
            return false;
        }
        info!(%command, state = %self.state, "command received");

        let position = self.pose.position;
        let hover = self.config.hover_height;
        match command {
            FlightCommand::Takeoff => {
                self.target.position = Vector3::new(position.x, hover, position.z);
                self.set_state(FlightState::MovingToTarget);
            }
            FlightCommand::Land => {
                self.set_state(FlightState::Landing);
            }
            FlightCommand::Hover => {
                self.target.position = position;
                self.set_state(FlightState::Hovering);
            }
            FlightCommand::MoveNext => {
                let mut next = position + self.pose.forward() * self.config.move_step;
                next.y = hover;
                self.target.position = next;
                self.set_state(FlightState::MovingToTarget);
            }
            FlightCommand::Return => {
                self.target.position = Vector3::new(0.0, hover, 0.0);
                self.set_state(FlightState::MovingToTarget);
            }
        }
        true
    }

    // ── Tick ────────────────────────────────────────────────────────────────

    /// Advance the vehicle by `dt` seconds. Non-positive steps are ignored.
    pub fn tick(&mut self, dt: f32, ground: &dyn GroundProbe) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        self.sim_time += dt;
        self.spin_rotors(dt);

        match self.state {
            FlightState::Hovering => {
                self.follow_target(dt);
                self.level(dt);
            }
            FlightState::MovingToTarget => {
                self.follow_target(dt);
                self.check_arrival();
                self.apply_tilt(dt);
            }
            FlightState::Landing => {
                self.descend(dt, ground);
                self.level(dt);
            }
            FlightState::Landed => {}
        }
    }

    fn follow_target(&mut self, dt: f32) {
        let mut goal = self.target.position;
        if self.state == FlightState::Hovering {
            goal.y += self.config.bob_amplitude * (self.sim_time * self.config.bob_frequency).sin();
        }
        self.pose.position = smooth_damp(
            self.pose.position,
            goal,
            &mut self.smoothing.velocity,
            self.config.smooth_time,
            self.config.move_speed,
            dt,
        );

        let yaw = smooth_damp_angle(
            self.pose.yaw,
            self.target.yaw,
            &mut self.smoothing.yaw_rate,
            self.config.yaw_smooth_time,
            f32::INFINITY,
            dt,
        );
        self.pose.yaw = wrap_degrees(yaw);
    }

    fn check_arrival(&mut self) {
        let distance = (self.pose.position - self.target.position).norm();
        if distance < self.config.arrival_tolerance {
            debug!(distance, "target reached");
            self.set_state(FlightState::Hovering);
        }
    }

    fn apply_tilt(&mut self, dt: f32) {
        let (pitch, roll) = self.pose.signed_tilt();
        let (target_pitch, target_roll) = self
            .pose
            .tilt_targets(self.smoothing.velocity, self.config.tilt_amount);
        let t = dt * self.config.tilt_speed;
        self.pose.pitch = lerp(pitch, target_pitch, t);
        self.pose.roll = lerp(roll, target_roll, t);
    }

    fn level(&mut self, dt: f32) {
        let t = dt * self.config.tilt_speed;
        self.pose.pitch = lerp_angle(self.pose.pitch, 0.0, t);
        self.pose.roll = lerp_angle(self.pose.roll, 0.0, t);
    }

    fn descend(&mut self, dt: f32, ground: &dyn GroundProbe) {
        let offset = self.config.body_offset;
        let origin = self.pose.position + Vector3::y() * offset;
        let hit = ground.raycast_down(origin, self.config.probe_range, self.config.ground_mask());

        let step = match hit {
            Some(distance) => {
                let clearance = distance - offset;
                if clearance <= self.config.landing_threshold {
                    info!(clearance, "touchdown");
                    self.set_state(FlightState::Landed);
                    return;
                }
                let step = self.config.land_speed * dt;
                if clearance < self.config.final_approach_height {
                    step * 0.5
                } else {
                    step
                }
            }
            None => match self.config.ground_loss {
                GroundLossPolicy::KeepDescending => self.config.land_speed * dt,
                GroundLossPolicy::HoldAltitude => {
                    debug!("no ground in range, holding altitude");
                    0.0
                }
            },
        };
        self.pose.position.y -= step;
        self.target.position = self.pose.position;
    }

    fn spin_rotors(&mut self, dt: f32) {
        let base = self.config.prop_speed;
        self.rotor_speed = match self.state {
            FlightState::Hovering => base,
            FlightState::MovingToTarget => base * MOVING_ROTOR_FACTOR,
            FlightState::Landing => base * LANDING_ROTOR_FACTOR,
            FlightState::Landed => lerp(self.rotor_speed, 0.0, dt),
        };
        if self.rotors.is_empty() {
            return;
        }

        match self.rotors.spin_all(Vector3::y(), self.rotor_speed * dt) {
            Ok(()) => self.rotor_fault = None,
            Err(e) => {
                if self.rotor_fault.as_ref() != Some(&e) {
                    warn!(error = %e, "rotor fault");
                    self.unreported_fault = Some(e.clone());
                }
                self.rotor_fault = Some(e);
            }
        }
    }

    fn set_state(&mut self, next: FlightState) {
        if next == self.state {
            return;
        }
        info!(from = %self.state, to = %next, "flight state change");
        self.state = next;
        if let Some(sink) = self.status.as_mut() {
            sink.display_state(next.status_text());
        }
    }
}
