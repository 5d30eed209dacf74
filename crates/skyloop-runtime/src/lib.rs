//! `skyloop-runtime` – The Loops
//!
//! The asynchronous machinery around the motion core: a fixed-rate tick
//! scheduler that owns the controller, and a perception loop that asks an
//! external decision service what to do next.
//!
//! # Modules
//!
//! - [`flight_loop`] – [`FlightLoop`][flight_loop::FlightLoop]: ticks the
//!   [`MotionController`][skyloop_flight::MotionController] at a fixed rate,
//!   applies queued commands between ticks and publishes telemetry and state
//!   changes on the event bus.
//! - [`perception_loop`] – [`PerceptionLoop`][perception_loop::PerceptionLoop]:
//!   the capture → encode → send → await → decode cycle, with at most one
//!   request outstanding at any time.
//! - [`vision_client`] – [`VisionClient`][vision_client::VisionClient]: the
//!   `reqwest` transport to the decision service behind the
//!   [`DecisionService`][vision_client::DecisionService] trait, and the
//!   response decoding rules.
//! - [`encode`] – JPEG + base64 encoding of captured frames.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.
//!
//! # Wiring
//!
//! ```text
//! PerceptionLoop ──(command string, mpsc)──▶ FlightLoop ──▶ MotionController
//!        │                                       │
//!        └──────────── EventBus ◀────────────────┘
//! ```

pub mod encode;
pub mod flight_loop;
pub mod perception_loop;
pub mod telemetry;
pub mod vision_client;

#[cfg(test)]
mod test_support;

pub use flight_loop::{FlightLoop, FlightLoopConfig};
pub use perception_loop::{PerceptionConfig, PerceptionError, PerceptionLoop};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use vision_client::{DecisionService, VisionClient, decode_command};
