//! [`PerceptionLoop`] – capture → encode → send → await → decode → forward.
//!
//! The loop wakes on a fixed cadence. On each wake-up it tries to claim the
//! single in-flight slot without blocking; when the slot is free it captures
//! a frame and spawns the rest of the cycle as its own task, then goes back
//! to sleep whatever that task is doing. When the slot is taken the
//! iteration does nothing. At most one cycle is ever outstanding, and a slow
//! decision service never delays the cadence or the flight tick.
//!
//! The slot is released by dropping an RAII guard held by the cycle task, so
//! it frees up on every exit path, panics included.
//!
//! Cycle failures end that cycle only. They are logged and published on
//! [`Topic::SystemAlerts`]; the next free iteration simply tries again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skyloop_hal::{Camera, CameraFrame};
use skyloop_middleware::{EventBus, Topic};
use skyloop_types::{Event, EventPayload, SkyError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::encode::encode_frame;
use crate::vision_client::DecisionService;

const SOURCE: &str = "skyloop-runtime::perception_loop";

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Ways a perception cycle can fail.
#[derive(Error, Debug)]
pub enum PerceptionError {
    /// Transport failure, timeout or non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Malformed frame: {0}")]
    BadFrame(String),
    #[error("Capture failed: {0}")]
    Capture(#[from] SkyError),
    /// The service answered, but with no command keyword in it.
    #[error("Unrecognised command in response: {0:?}")]
    UnrecognizedCommand(String),
    #[error("Command channel closed")]
    CommandChannelClosed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for [`PerceptionLoop`] and its HTTP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Decision service URL.
    pub endpoint: String,
    /// Delay between loop iterations, in milliseconds.
    pub interval_ms: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
    /// Per-request timeout in seconds. `0` waits indefinitely.
    pub request_timeout_secs: u64,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/pilot".to_string(),
            interval_ms: 1000,
            frame_width: 512,
            frame_height: 512,
            jpeg_quality: 75,
            request_timeout_secs: 30,
        }
    }
}

impl PerceptionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-flight guard
// ─────────────────────────────────────────────────────────────────────────────

/// Holds the single in-flight slot; dropping it frees the slot.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn try_claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PerceptionLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Periodic perception driver. See the [module docs](self).
pub struct PerceptionLoop {
    config: PerceptionConfig,
    camera: Box<dyn Camera>,
    service: Arc<dyn DecisionService>,
    commands: mpsc::Sender<String>,
    bus: EventBus,
    in_flight: Arc<AtomicBool>,
}

impl PerceptionLoop {
    /// Decoded commands are forwarded on `commands`.
    pub fn new(
        config: PerceptionConfig,
        camera: Box<dyn Camera>,
        service: Arc<dyn DecisionService>,
        commands: mpsc::Sender<String>,
    ) -> Self {
        Self {
            config,
            camera,
            service,
            commands,
            bus: EventBus::default(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publish issued commands and faults on `bus`.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// `true` while a cycle is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run until `shutdown` is raised or the command receiver goes away.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!(
            endpoint = %self.config.endpoint,
            interval_ms = self.config.interval_ms,
            "perception loop started"
        );
        while !shutdown.load(Ordering::Relaxed) {
            if self.commands.is_closed() {
                info!("command channel closed, perception loop stopping");
                break;
            }
            self.poll_once();
            tokio::time::sleep(self.config.interval()).await;
        }
        info!("perception loop stopped");
    }

    /// One loop iteration without the trailing delay.
    ///
    /// Returns `true` if a cycle was started, `false` if one was already
    /// outstanding. Must be called from within a Tokio runtime.
    pub fn poll_once(&mut self) -> bool {
        let Some(guard) = InFlight::try_claim(&self.in_flight) else {
            debug!("decision request outstanding, skipping capture");
            return false;
        };

        let frame = match self
            .camera
            .capture(self.config.frame_width, self.config.frame_height)
        {
            Ok(frame) => frame,
            Err(e) => {
                report_fault(&self.bus, &PerceptionError::Capture(e));
                return true;
            }
        };
        debug!(camera = self.camera.id(), "frame captured, sending to decision service");

        let service = Arc::clone(&self.service);
        let commands = self.commands.clone();
        let bus = self.bus.clone();
        let quality = self.config.jpeg_quality;
        tokio::spawn(async move {
            let _guard = guard;
            match run_cycle(frame, quality, service.as_ref(), &commands, &bus).await {
                Ok(command) => info!(%command, "decision forwarded"),
                Err(e) => report_fault(&bus, &e),
            }
        });
        true
    }
}

async fn run_cycle(
    frame: CameraFrame,
    quality: u8,
    service: &dyn DecisionService,
    commands: &mpsc::Sender<String>,
    bus: &EventBus,
) -> Result<String, PerceptionError> {
    let image = encode_frame(&frame, quality)?;
    let command = service.decide(image).await?;
    commands
        .send(command.clone())
        .await
        .map_err(|_| PerceptionError::CommandChannelClosed)?;
    let _ = bus.publish_to(
        Topic::Commands,
        Event::new(SOURCE, EventPayload::CommandIssued(command.clone())),
    );
    Ok(command)
}

fn report_fault(bus: &EventBus, error: &PerceptionError) {
    warn!(%error, "perception cycle failed");
    let _ = bus.publish_to(
        Topic::SystemAlerts,
        Event::new(SOURCE, EventPayload::PerceptionFault(error.to_string())),
    );
}
