//! `skyloop-flight` – The Motion Core
//!
//! Turns discrete flight commands into continuous, physically plausible
//! motion, one simulation tick at a time.
//!
//! # Modules
//!
//! - [`controller`] – [`MotionController`][controller::MotionController]:
//!   the four-state flight state machine (`Hovering`, `MovingToTarget`,
//!   `Landing`, `Landed`) with its per-state dynamics and the keyword command
//!   entry point.
//! - [`smoothing`] – critically-damped position/angle smoothing and the
//!   angle helpers used to interpolate attitude without wraparound artefacts.
//! - [`pose`] – [`VehiclePose`][pose::VehiclePose]: position plus
//!   pitch/yaw/roll, the body frame and the tilt law derived from it.
//! - [`config`] – [`FlightConfig`][config::FlightConfig]: every tunable
//!   constant of the controller.

pub mod config;
pub mod controller;
pub mod pose;
pub mod smoothing;

pub use config::{FlightConfig, GroundLossPolicy};
pub use controller::{MotionController, MotionTarget};
pub use pose::VehiclePose;
