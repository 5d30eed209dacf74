//! Terrain prompt and the mapping from the model's answer to a command.

use skyloop_types::FlightCommand;

/// Two-option terrain question put to the vision model.
pub const TERRAIN_PROMPT: &str = "\
Look at the image closely and choose the best description.
Do NOT describe, just answer.

Option A: Green grass ground
Option B: Dense forest or Mountain Cliffs

Answer with just one letter in A or B.
Answer:";

/// Map a raw model answer to a flight command.
///
/// Option A (open grass) means it is safe to land. Option B, and anything the
/// model says that is neither, means move on to the next spot.
pub fn classify(answer: &str) -> FlightCommand {
    let answer = answer.trim().to_uppercase();
    if answer.starts_with('A') || answer.contains("OPTION A") {
        FlightCommand::Land
    } else {
        FlightCommand::MoveNext
    }
}
