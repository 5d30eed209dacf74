//! `skyloop-cli` – SkyLoop Command Line Interface
//!
//! Usage:
//!
//! - `skyloop` / `skyloop fly` – fly the simulated quadcopter. The flight
//!   loop ticks the motion controller while the perception loop posts camera
//!   frames to the decision service and feeds its answers back as commands.
//! - `skyloop pilot` – run the decision service in front of a local Ollama.
//!
//! Settings come from `~/.skyloop/config.toml` (written with defaults on
//! first run) plus `SKYLOOP_*` environment overrides. **Ctrl-C** raises the
//! shared shutdown flag and both modes wind down cleanly.

mod config;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use config::SkyloopConfig;
use skyloop_flight::{MotionController, VehiclePose};
use skyloop_hal::sim::SimAirframe;
use skyloop_hal::status::LogStatusSink;
use skyloop_middleware::{EventBus, Topic, TopicReceiver};
use skyloop_runtime::{FlightLoop, FlightLoopConfig, PerceptionLoop, VisionClient, init_tracing};
use skyloop_types::{Event, EventPayload};

/// How often `pilot` mode checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

enum Mode {
    Fly,
    Pilot,
}

#[tokio::main]
async fn main() {
    let mode = match std::env::args().nth(1).as_deref() {
        None | Some("fly") => Mode::Fly,
        Some("pilot") => Mode::Pilot,
        Some(other) => {
            eprintln!("{} unknown mode `{}`", "error:".red().bold(), other);
            eprintln!("usage: skyloop [fly|pilot]");
            std::process::exit(2);
        }
    };

    let service = match mode {
        Mode::Fly => "skyloop-fly",
        Mode::Pilot => "skyloop-pilot",
    };
    let _otel_guard = init_tracing(service);

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let cfg = load_config();

    let outcome = match mode {
        Mode::Fly => fly(cfg, shutdown).await,
        Mode::Pilot => pilot(cfg, shutdown).await,
    };
    if let Err(e) = outcome {
        println!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> SkyloopConfig {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = SkyloopConfig::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = SkyloopConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fly mode
// ─────────────────────────────────────────────────────────────────────────────

async fn fly(cfg: SkyloopConfig, shutdown: Arc<AtomicBool>) -> Result<(), String> {
    cfg.flight.validate().map_err(|e| e.to_string())?;
    let loop_config = FlightLoopConfig {
        tick_hz: cfg.tick_hz,
        ..FlightLoopConfig::default()
    };
    loop_config.validate().map_err(|e| e.to_string())?;

    let hardware = SimAirframe::new()
        .with_quad_rotors()
        .with_camera("forward_rgb")
        .with_flat_ground(0.0)
        .build();
    let (Some(camera), Some(ground)) = (hardware.camera, hardware.ground) else {
        return Err("simulated airframe is missing its camera or ground plane".to_string());
    };

    let controller = MotionController::new(cfg.flight.clone(), VehiclePose::default())
        .with_rotors(hardware.rotors)
        .with_status_sink(Box::new(LogStatusSink));

    let bus = EventBus::new(256);
    let monitor = tokio::spawn(watch_bus(
        bus.subscribe_to(Topic::FlightStatus),
        bus.subscribe_to(Topic::SystemAlerts),
    ));

    let client = VisionClient::new(&cfg.perception.endpoint, cfg.perception.request_timeout())
        .map_err(|e| format!("Failed to build decision client: {}", e))?;
    println!("  Decision service: {}\n", client.endpoint().dimmed());

    let (commands_tx, commands_rx) = mpsc::channel(16);
    if cfg.auto_takeoff {
        commands_tx
            .send("TAKEOFF".to_string())
            .await
            .map_err(|e| format!("Failed to queue takeoff: {}", e))?;
    }

    let perception = PerceptionLoop::new(cfg.perception, camera, Arc::new(client), commands_tx)
        .with_bus(bus.clone());
    let flight = FlightLoop::new(controller, ground, commands_rx)
        .with_config(loop_config)
        .with_bus(bus);

    let perception_task = tokio::spawn(perception.run(shutdown.clone()));
    let flight_result = flight.run(shutdown.clone()).await;

    shutdown.store(true, Ordering::SeqCst);
    if let Err(e) = perception_task.await {
        warn!(error = %e, "perception task ended abnormally");
    }
    monitor.abort();

    let controller = flight_result.map_err(|e| e.to_string())?;
    let pose = controller.pose();
    println!(
        "\n  {} {} at ({:.2}, {:.2}, {:.2}) after {:.1}s",
        "Final state:".bold(),
        controller.state().status_text().cyan(),
        pose.position.x,
        pose.position.y,
        pose.position.z,
        controller.sim_time()
    );
    Ok(())
}

/// Print state transitions and alerts as they appear on the bus.
async fn watch_bus(mut status: TopicReceiver, mut alerts: TopicReceiver) {
    loop {
        let event: Option<Event> = tokio::select! {
            e = status.recv() => e,
            e = alerts.recv() => e,
        };
        let Some(event) = event else { break };
        match event.payload {
            EventPayload::StateChanged { from, to } => {
                println!("  {} {} → {}", "●".green(), from, to.to_string().bold());
            }
            EventPayload::PerceptionFault(message) => {
                println!("  {} perception: {}", "!".yellow().bold(), message.dimmed());
            }
            EventPayload::HardwareFault { component, message } => {
                println!("  {} {}: {}", "✗".red().bold(), component.bold(), message);
            }
            _ => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pilot mode
// ─────────────────────────────────────────────────────────────────────────────

async fn pilot(cfg: SkyloopConfig, shutdown: Arc<AtomicBool>) -> Result<(), String> {
    let server = cfg
        .pilot
        .build_server()
        .map_err(|e| format!("Failed to build pilot server: {}", e))?;
    println!(
        "  Pilot listening on port {} (model {} at {})\n",
        server.port().to_string().bold(),
        cfg.pilot.model.as_str().bold(),
        cfg.pilot.ollama_url.as_str().dimmed()
    );

    tokio::select! {
        served = server.run() => served.map_err(|e| format!("Pilot server failed: {}", e)),
        _ = wait_for(shutdown) => {
            info!("pilot shutting down");
            Ok(())
        }
    }
}

async fn wait_for(flag: Arc<AtomicBool>) {
    while !flag.load(Ordering::Relaxed) {
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _____ __         __                "#.bold().cyan());
    println!("{}", r#"  / ___// /____  __/ /   ____  ____   "#.bold().cyan());
    println!("{}", r#"  \__ \/ //_/ / / / /   / __ \/ __ \  "#.bold().cyan());
    println!("{}", r#" ___/ / ,< / /_/ / /___/ /_/ / /_/ / "#.bold().cyan());
    println!("{}", r#"/____/_/|_|\__, /_____/\____/ .___/  "#.bold().cyan());
    println!("{}", r#"          /____/            /_/       "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "SkyLoop".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Vision-guided landing for a simulated quadcopter");
    println!();
}
