//! `skyloop-pilot` – The Decision Service
//!
//! The HTTP endpoint the perception loop posts its frames to. Each frame is
//! shown to a local vision-language model with a two-option terrain
//! question; open grass means land, anything else means move on.
//!
//! # Modules
//!
//! - [`server`] – [`PilotServer`][server::PilotServer]: minimal HTTP/1.1
//!   server exposing `POST /pilot`.
//! - [`vlm`] – [`VisionModel`][vlm::VisionModel] trait and the
//!   [`OllamaVision`][vlm::OllamaVision] client for Ollama's
//!   `/api/generate`.
//! - [`classify`] – the terrain prompt and answer → command mapping.
//! - [`config`] – [`PilotConfig`][config::PilotConfig].

pub mod classify;
pub mod config;
pub mod server;
pub mod vlm;

pub use classify::{TERRAIN_PROMPT, classify};
pub use config::PilotConfig;
pub use server::{DEFAULT_PORT, PilotServer};
pub use vlm::{OllamaVision, PilotError, VisionModel};
