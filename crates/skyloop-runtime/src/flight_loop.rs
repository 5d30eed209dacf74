//! [`FlightLoop`] – the fixed-rate tick scheduler that owns the controller.
//!
//! The [`MotionController`] lives inside this task and nowhere else. Commands
//! arrive as strings over an `mpsc` channel and are applied between ticks in
//! receipt order, so controller state only ever has one writer.
//!
//! Each tick:
//!
//! 1. drain pending commands without waiting,
//! 2. advance the controller by the fixed `dt`,
//! 3. publish state changes, rotor faults and (every `telemetry_every`
//!    ticks) a telemetry snapshot on the [`EventBus`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skyloop_flight::MotionController;
use skyloop_hal::GroundProbe;
use skyloop_middleware::{EventBus, Topic};
use skyloop_types::{Event, EventPayload, FlightState, SkyError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

const SOURCE: &str = "skyloop-runtime::flight_loop";

/// Shortest tick period the scheduler accepts.
const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Tick scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightLoopConfig {
    /// Ticks per second.
    pub tick_hz: f32,
    /// Publish a telemetry snapshot every this many ticks. `0` disables it.
    pub telemetry_every: u32,
}

impl Default for FlightLoopConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60.0,
            telemetry_every: 6,
        }
    }
}

impl FlightLoopConfig {
    /// Seconds per tick.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz
    }

    /// Wall-clock time between ticks, `None` when it does not fit a
    /// [`Duration`].
    pub fn period(&self) -> Option<Duration> {
        Duration::try_from_secs_f32(self.dt()).ok()
    }

    /// # Errors
    ///
    /// [`SkyError::Config`] when `tick_hz` is not a positive finite number
    /// or asks for ticks closer together than one millisecond.
    pub fn validate(&self) -> Result<(), SkyError> {
        if !(self.tick_hz.is_finite() && self.tick_hz > 0.0) {
            return Err(SkyError::Config(format!(
                "tick_hz must be a positive number, got {}",
                self.tick_hz
            )));
        }
        match self.period() {
            Some(period) if period >= MIN_TICK_PERIOD => Ok(()),
            Some(_) => Err(SkyError::Config(format!(
                "tick_hz {} exceeds the 1000 Hz scheduler limit",
                self.tick_hz
            ))),
            None => Err(SkyError::Config(format!(
                "tick_hz {} gives a tick period too long to schedule",
                self.tick_hz
            ))),
        }
    }
}

/// Owns a [`MotionController`] and ticks it at a fixed rate.
pub struct FlightLoop {
    config: FlightLoopConfig,
    controller: MotionController,
    ground: Box<dyn GroundProbe>,
    commands: mpsc::Receiver<String>,
    bus: EventBus,
    last_state: FlightState,
    ticks: u64,
    commands_closed: bool,
}

impl FlightLoop {
    pub fn new(
        controller: MotionController,
        ground: Box<dyn GroundProbe>,
        commands: mpsc::Receiver<String>,
    ) -> Self {
        Self {
            config: FlightLoopConfig::default(),
            last_state: controller.state(),
            controller,
            ground,
            commands,
            bus: EventBus::default(),
            ticks: 0,
            commands_closed: false,
        }
    }

    pub fn with_config(mut self, config: FlightLoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn controller(&self) -> &MotionController {
        &self.controller
    }

    /// Ticks executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Tick until `shutdown` is raised or every command sender is gone.
    /// Hands the controller back for inspection.
    ///
    /// # Errors
    ///
    /// [`SkyError::Config`] if the tick rate is invalid.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) -> Result<MotionController, SkyError> {
        self.config.validate()?;
        let period = self.config.period().unwrap_or(MIN_TICK_PERIOD);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_hz = self.config.tick_hz, state = %self.last_state, "flight loop started");

        loop {
            ticker.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.step();
            if self.commands_closed {
                info!("all command senders dropped, flight loop stopping");
                break;
            }
        }
        info!(ticks = self.ticks, state = %self.controller.state(), "flight loop stopped");
        Ok(self.controller)
    }

    /// Apply pending commands and advance one tick.
    pub fn step(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(text) => {
                    self.controller.receive_command(&text);
                    self.publish_state_change();
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.commands_closed = true;
                    break;
                }
            }
        }

        self.controller.tick(self.config.dt(), self.ground.as_ref());
        self.ticks += 1;
        self.publish_state_change();

        if let Some(fault) = self.controller.take_rotor_fault() {
            let (component, message) = match fault {
                SkyError::HardwareFault { component, details } => (component, details),
                other => ("rotors".to_string(), other.to_string()),
            };
            self.publish(Topic::SystemAlerts, EventPayload::HardwareFault { component, message });
        }

        let every = u64::from(self.config.telemetry_every);
        if every > 0 && self.ticks % every == 0 {
            self.publish(Topic::Telemetry, EventPayload::Telemetry(self.controller.telemetry()));
        }
    }

    fn publish_state_change(&mut self) {
        let now = self.controller.state();
        if now == self.last_state {
            return;
        }
        let from = std::mem::replace(&mut self.last_state, now);
        self.publish(Topic::FlightStatus, EventPayload::StateChanged { from, to: now });
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        if self.bus.publish_to(topic, Event::new(SOURCE, payload)).is_err() {
            debug!(?topic, "no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use skyloop_flight::{FlightConfig, VehiclePose};
    use skyloop_hal::sim::FlatGround;

    use super::*;

    fn grounded_loop() -> (FlightLoop, mpsc::Sender<String>) {
        let controller = MotionController::new(FlightConfig::default(), VehiclePose::default());
        let (tx, rx) = mpsc::channel(8);
        (FlightLoop::new(controller, Box::new(FlatGround::new(0.0)), rx), tx)
    }

    #[test]
    fn tick_rate_must_be_positive() {
        assert!(FlightLoopConfig::default().validate().is_ok());
        let bad = FlightLoopConfig {
            tick_hz: 0.0,
            ..FlightLoopConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn tick_rate_is_capped_at_one_kilohertz() {
        let at_limit = FlightLoopConfig {
            tick_hz: 1000.0,
            ..FlightLoopConfig::default()
        };
        assert!(at_limit.validate().is_ok());

        let huge = FlightLoopConfig {
            tick_hz: 1e10,
            ..FlightLoopConfig::default()
        };
        assert!(matches!(huge.validate(), Err(SkyError::Config(_))));

        let glacial = FlightLoopConfig {
            tick_hz: 1e-38,
            ..FlightLoopConfig::default()
        };
        assert!(matches!(glacial.validate(), Err(SkyError::Config(_))));
    }

    #[tokio::test]
    async fn run_rejects_a_sub_millisecond_period() {
        let (flight, _tx) = grounded_loop();
        let flight = flight.with_config(FlightLoopConfig {
            tick_hz: 1e10,
            ..FlightLoopConfig::default()
        });
        let result = flight.run(Arc::new(AtomicBool::new(false))).await;
        assert!(matches!(result, Err(SkyError::Config(_))));
    }

    #[tokio::test]
    async fn commands_apply_in_receipt_order() {
        let (mut flight, tx) = grounded_loop();
        tx.send("TAKEOFF".into()).await.unwrap();
        tx.send("LAND".into()).await.unwrap();
        tx.send("HOVER".into()).await.unwrap();
        flight.step();
        // The last command wins; nothing is queued behind it.
        assert_eq!(flight.controller().state(), FlightState::Hovering);
    }

    #[tokio::test]
    async fn state_changes_are_published() {
        let (flight, tx) = grounded_loop();
        let bus = EventBus::default();
        let mut status = bus.subscribe_to(Topic::FlightStatus);
        let mut flight = flight.with_bus(bus);

        tx.send("TAKEOFF".into()).await.unwrap();
        for _ in 0..60 * 10 {
            flight.step();
        }

        let first = status.try_recv().unwrap();
        assert!(matches!(
            first.payload,
            EventPayload::StateChanged { from: FlightState::Landed, to: FlightState::MovingToTarget }
        ));
        let second = status.try_recv().unwrap();
        assert!(matches!(
            second.payload,
            EventPayload::StateChanged { from: FlightState::MovingToTarget, to: FlightState::Hovering }
        ));
        assert!(status.try_recv().is_none());
    }

    #[tokio::test]
    async fn telemetry_is_throttled() {
        let (flight, _tx) = grounded_loop();
        let bus = EventBus::default();
        let mut telemetry = bus.subscribe_to(Topic::Telemetry);
        let mut flight = flight
            .with_bus(bus)
            .with_config(FlightLoopConfig {
                tick_hz: 60.0,
                telemetry_every: 10,
            });

        for _ in 0..35 {
            flight.step();
        }
        let mut snapshots = 0;
        while let Some(event) = telemetry.try_recv() {
            assert!(matches!(event.payload, EventPayload::Telemetry(_)));
            snapshots += 1;
        }
        assert_eq!(snapshots, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_flies_until_shutdown() {
        let (flight, tx) = grounded_loop();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(flight.run(Arc::clone(&shutdown)));

        tx.send("TAKEOFF".into()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(8)).await;
        shutdown.store(true, Ordering::SeqCst);

        let controller = handle.await.unwrap().unwrap();
        assert_eq!(controller.state(), FlightState::Hovering);
        let error = (controller.pose().position - Vector3::new(0.0, 10.0, 0.0)).norm();
        assert!(error < 0.2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ends_when_senders_are_gone() {
        let (flight, tx) = grounded_loop();
        drop(tx);
        let controller = flight
            .run(Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        assert_eq!(controller.state(), FlightState::Landed);
    }
}
