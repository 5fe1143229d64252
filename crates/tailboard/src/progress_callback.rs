//! Round callback that reports polling progress through `tracing`.

use tailboard_core::{RoundCallback, RoundSummary};
use tracing::{debug, info};

/// Logs every productive round at debug level and a heartbeat at info
/// level every `heartbeat_rounds` rounds.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    heartbeat_rounds: u64,
    events_applied: u64,
}

impl ProgressLog {
    /// Create a progress log with the given heartbeat period.
    pub const fn new(heartbeat_rounds: u64) -> Self {
        Self {
            heartbeat_rounds,
            events_applied: 0,
        }
    }
}

impl RoundCallback for ProgressLog {
    fn on_round(&mut self, summary: &RoundSummary) {
        self.events_applied = self
            .events_applied
            .saturating_add(summary.advanced as u64);

        if summary.progressed() {
            debug!(
                round = summary.round,
                advanced = summary.advanced,
                skipped = summary.skipped,
                throughput_rows = ?summary.aggregate.throughput_rows,
                action_rows = ?summary.aggregate.action_rows,
                "Round applied records"
            );
        }

        if summary.round.checked_rem(self.heartbeat_rounds) == Some(0) {
            info!(
                round = summary.round,
                active_sources = summary.active_sources,
                events_applied = self.events_applied,
                "Polling heartbeat"
            );
        }
    }
}
