//! Configuration Vault – reads/writes `~/.skyloop/config.toml`.

use serde::{Deserialize, Serialize};
use skyloop_flight::FlightConfig;
use skyloop_pilot::PilotConfig;
use skyloop_runtime::PerceptionConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted configuration stored in `~/.skyloop/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyloopConfig {
    /// Flight loop rate in ticks per second.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f32,

    /// Send `TAKEOFF` as soon as the simulated vehicle is up.
    #[serde(default = "default_auto_takeoff")]
    pub auto_takeoff: bool,

    #[serde(default)]
    pub flight: FlightConfig,

    #[serde(default)]
    pub perception: PerceptionConfig,

    #[serde(default)]
    pub pilot: PilotConfig,
}

fn default_tick_hz() -> f32 {
    60.0
}
fn default_auto_takeoff() -> bool {
    true
}

impl Default for SkyloopConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            auto_takeoff: default_auto_takeoff(),
            flight: FlightConfig::default(),
            perception: PerceptionConfig::default(),
            pilot: PilotConfig::default(),
        }
    }
}

/// Return the path to `~/.skyloop/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".skyloop").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<SkyloopConfig>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<SkyloopConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: SkyloopConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SKYLOOP_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SKYLOOP_PILOT_URL` | `perception.endpoint` |
/// | `SKYLOOP_OLLAMA_URL` | `pilot.ollama_url` |
/// | `SKYLOOP_MODEL` | `pilot.model` |
/// | `SKYLOOP_PILOT_PORT` | `pilot.port` |
/// | `SKYLOOP_HOVER_HEIGHT` | `flight.hover_height` |
/// | `SKYLOOP_TICK_HZ` | `tick_hz` |
///
/// Values that do not parse, or numbers that are not positive and finite,
/// leave the field untouched.
pub fn apply_env_overrides(cfg: &mut SkyloopConfig) {
    if let Ok(v) = std::env::var("SKYLOOP_PILOT_URL") {
        cfg.perception.endpoint = v;
    }
    if let Ok(v) = std::env::var("SKYLOOP_OLLAMA_URL") {
        cfg.pilot.ollama_url = v;
    }
    if let Ok(v) = std::env::var("SKYLOOP_MODEL") {
        cfg.pilot.model = v;
    }
    if let Ok(v) = std::env::var("SKYLOOP_PILOT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.pilot.port = port;
    }
    if let Some(height) = positive_env("SKYLOOP_HOVER_HEIGHT") {
        cfg.flight.hover_height = height;
    }
    if let Some(hz) = positive_env("SKYLOOP_TICK_HZ") {
        cfg.tick_hz = hz;
    }
}

fn positive_env(name: &str) -> Option<f32> {
    std::env::var(name)
        .ok()?
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Save the config to disk, creating `~/.skyloop/` if necessary.
pub fn save(cfg: &SkyloopConfig) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &SkyloopConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
