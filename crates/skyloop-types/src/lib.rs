use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The finite set of flight states. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightState {
    /// Holding position with a gentle idle bob.
    Hovering,
    /// Tracking a target point, body tilted along the direction of travel.
    MovingToTarget,
    /// Descending toward the ground under probe control.
    Landing,
    /// On the ground; rotors spinning down.
    Landed,
}

impl FlightState {
    /// Human-readable label pushed to the on-screen status display.
    pub fn status_text(self) -> &'static str {
        match self {
            FlightState::Hovering => "Searching for landing site",
            FlightState::MovingToTarget => "Unsafe landing site, moving on",
            FlightState::Landing => "Landing",
            FlightState::Landed => "Landed",
        }
    }

    /// `true` while the vehicle is off the ground.
    pub fn is_airborne(self) -> bool {
        !matches!(self, FlightState::Landed)
    }
}

impl std::fmt::Display for FlightState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightState::Hovering => write!(f, "hovering"),
            FlightState::MovingToTarget => write!(f, "moving_to_target"),
            FlightState::Landing => write!(f, "landing"),
            FlightState::Landed => write!(f, "landed"),
        }
    }
}

/// A discrete high-level flight command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightCommand {
    Takeoff,
    Land,
    Hover,
    MoveNext,
    Return,
}

impl FlightCommand {
    /// Keyword table in match-priority order.
    ///
    /// `TAKEOFF` must precede `LAND` and `HOVER` so that free text carrying
    /// several keywords resolves deterministically.
    pub const KEYWORDS: [(&'static str, FlightCommand); 5] = [
        ("TAKEOFF", FlightCommand::Takeoff),
        ("LAND", FlightCommand::Land),
        ("HOVER", FlightCommand::Hover),
        ("MOVE_NEXT", FlightCommand::MoveNext),
        ("RETURN", FlightCommand::Return),
    ];

    /// Resolve free-form text to a command.
    ///
    /// Matching is case-insensitive substring containment, first keyword in
    /// [`KEYWORDS`](Self::KEYWORDS) order wins. Returns `None` when no keyword
    /// occurs in `text`.
    pub fn parse(text: &str) -> Option<FlightCommand> {
        let upper = text.trim().to_uppercase();
        Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| upper.contains(keyword))
            .map(|(_, command)| *command)
    }

    /// The canonical keyword for this command.
    pub fn keyword(self) -> &'static str {
        match self {
            FlightCommand::Takeoff => "TAKEOFF",
            FlightCommand::Land => "LAND",
            FlightCommand::Hover => "HOVER",
            FlightCommand::MoveNext => "MOVE_NEXT",
            FlightCommand::Return => "RETURN",
        }
    }
}

impl std::fmt::Display for FlightCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Per-tick vehicle snapshot published to the world-transform owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightTelemetry {
    pub position: [f32; 3],
    pub pitch_deg: f32,
    pub yaw_deg: f32,
    pub roll_deg: f32,
    pub target: [f32; 3],
    pub state: FlightState,
    pub rotor_speed_dps: f32,
    /// Simulation time in seconds since the controller was created.
    pub sim_time: f32,
}

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "skyloop-runtime::flight_loop"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Telemetry(FlightTelemetry),
    StateChanged { from: FlightState, to: FlightState },
    /// A cleaned command string forwarded by the perception loop.
    CommandIssued(String),
    /// A perception cycle ended in failure.
    PerceptionFault(String),
    HardwareFault {
        component: String,
        message: String,
    },
}

/// Global error type spanning hardware faults, channel and configuration
/// failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkyError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(FlightCommand::parse("takeoff"), Some(FlightCommand::Takeoff));
        assert_eq!(FlightCommand::parse("  Hover\n"), Some(FlightCommand::Hover));
        assert_eq!(FlightCommand::parse("move_next"), Some(FlightCommand::MoveNext));
    }

    #[test]
    fn parse_tolerates_wrapper_text() {
        assert_eq!(
            FlightCommand::parse("{command: LAND}"),
            Some(FlightCommand::Land)
        );
        assert_eq!(
            FlightCommand::parse("please RETURN home"),
            Some(FlightCommand::Return)
        );
    }

    #[test]
    fn parse_uses_priority_order_for_multiple_keywords() {
        // LAND is checked before HOVER regardless of position in the text.
        assert_eq!(FlightCommand::parse("HOVER then LAND"), Some(FlightCommand::Land));
        assert_eq!(
            FlightCommand::parse("LAND after TAKEOFF"),
            Some(FlightCommand::Takeoff)
        );
    }

    #[test]
    fn parse_unknown_returns_none() {
        assert_eq!(FlightCommand::parse("barrel roll"), None);
        assert_eq!(FlightCommand::parse(""), None);
    }

    #[test]
    fn keyword_round_trips_through_parse() {
        for (_, command) in FlightCommand::KEYWORDS {
            assert_eq!(FlightCommand::parse(command.keyword()), Some(command));
        }
    }

    #[test]
    fn flight_command_serializes_as_keyword() {
        let json = serde_json::to_string(&FlightCommand::MoveNext).unwrap();
        assert_eq!(json, "\"MOVE_NEXT\"");
    }

    #[test]
    fn only_landed_is_grounded() {
        assert!(FlightState::Hovering.is_airborne());
        assert!(FlightState::MovingToTarget.is_airborne());
        assert!(FlightState::Landing.is_airborne());
        assert!(!FlightState::Landed.is_airborne());
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "skyloop-runtime::flight_loop",
            EventPayload::StateChanged {
                from: FlightState::Landed,
                to: FlightState::MovingToTarget,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert!(matches!(
            back.payload,
            EventPayload::StateChanged {
                from: FlightState::Landed,
                to: FlightState::MovingToTarget
            }
        ));
    }

    #[test]
    fn sky_error_display() {
        let err = SkyError::HardwareFault {
            component: "rotor_fl".to_string(),
            details: "stalled".to_string(),
        };
        assert!(err.to_string().contains("rotor_fl"));
        assert!(SkyError::Channel("closed".into()).to_string().contains("Channel"));
    }
}
