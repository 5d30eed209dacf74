//! Observational status output.

use tracing::info;

/// Receives human-readable flight status text, e.g. an on-screen label.
///
/// Purely observational: the flight core behaves identically with or without
/// a sink attached.
pub trait StatusSink: Send + Sync {
    fn display_state(&mut self, text: &str);
}

/// A [`StatusSink`] that writes every status line to the `tracing` log.
#[derive(Debug, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn display_state(&mut self, text: &str) {
        info!(status = text, "flight status");
    }
}
