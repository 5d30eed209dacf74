//! `skyloop-hal` – Hardware Abstraction Layer
//!
//! The narrow contracts through which the flight core talks to collaborators
//! it does not own: the render/camera pipeline, the physics engine's ground
//! detection, the rotor meshes and the on-screen status display.
//!
//! # Modules
//!
//! - [`camera`] – [`Camera`][camera::Camera]: still-frame capture.
//! - [`ground`] – [`GroundProbe`][ground::GroundProbe]: downward raycast
//!   against a collision layer.
//! - [`rotor`] – [`Rotor`][rotor::Rotor]: incremental propeller rotation.
//! - [`registry`] – [`RotorRegistry`][registry::RotorRegistry]: the set of
//!   registered rotors driven together.
//! - [`status`] – [`StatusSink`][status::StatusSink]: purely observational
//!   status text output.
//! - [`sim`] – in-process simulated drivers for headless runs and CI.

pub mod camera;
pub mod ground;
pub mod registry;
pub mod rotor;
pub mod sim;
pub mod status;

pub use camera::{Camera, CameraFrame};
pub use ground::{GroundProbe, LayerMask};
pub use registry::RotorRegistry;
pub use rotor::Rotor;
pub use status::StatusSink;
