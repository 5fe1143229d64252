//! Round-robin polling loop.
//!
//! The [`Scheduler`] owns every [`SourcePoller`] and the [`Aggregator`]. One
//! round visits each active source once, in registration order, then hands
//! the sources that advanced to the aggregator. Rounds follow each other
//! immediately while any source makes progress; once a round finds nothing
//! new anywhere, the loop sleeps for the idle interval.
//!
//! [`Scheduler::run`] keeps going until the [`ShutdownSignal`] fires or
//! every source has been retired by its record budget.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::aggregator::{AggregateReport, Aggregator, RunUpdate};
use crate::error::EngineError;
use crate::media::MediaRenderer;
use crate::panels::PanelTemplates;
use crate::poller::{Collaborators, PollOutcome, SourcePoller};
use crate::render::Renderer;
use crate::shutdown::ShutdownSignal;

/// Errors that can end the polling loop.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A round failed in a collaborator.
    #[error("round error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: EngineError,
    },
}

/// Why [`Scheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The caller fired the shutdown signal.
    ShutdownRequested,
    /// Every source reached its record budget.
    AllSourcesRetired,
}

/// Outcome of a single round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// 1-based round number.
    pub round: u64,
    /// Sources that applied a record.
    pub advanced: usize,
    /// Sources that consumed a record but dropped it.
    pub skipped: usize,
    /// Sources still being polled after this round.
    pub active_sources: usize,
    /// What the aggregator drew.
    pub aggregate: AggregateReport,
}

impl RoundSummary {
    /// Whether any cursor moved. A round that moved nothing leads to sleep.
    pub const fn progressed(&self) -> bool {
        self.advanced > 0 || self.skipped > 0
    }
}

/// Result of [`Scheduler::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Why the loop stopped.
    pub end_reason: EndReason,
    /// Rounds executed.
    pub total_rounds: u64,
    /// Rounds that found nothing and were followed by a sleep.
    pub idle_rounds: u64,
    /// Records applied across all sources.
    pub events_applied: u64,
    /// The last completed round, if any.
    pub final_round: Option<RoundSummary>,
    /// When the loop started.
    pub started_at: DateTime<Utc>,
    /// When the loop stopped.
    pub finished_at: DateTime<Utc>,
}

/// Callback invoked after each round completes.
pub trait RoundCallback {
    /// Called after a round completes successfully.
    fn on_round(&mut self, summary: &RoundSummary);
}

/// A callback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl RoundCallback for NoOpCallback {
    fn on_round(&mut self, _summary: &RoundSummary) {}
}

/// Drives the sources and the aggregator.
#[derive(Debug)]
pub struct Scheduler {
    pollers: Vec<SourcePoller>,
    aggregator: Aggregator,
    panels: PanelTemplates,
    idle_interval: Duration,
    rounds: u64,
}

impl Scheduler {
    /// Create a scheduler over `pollers`, polled in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Panel`] if the panel templates fail to compile.
    pub fn new(
        pollers: Vec<SourcePoller>,
        aggregator: Aggregator,
        idle_interval: Duration,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            pollers,
            aggregator,
            panels: PanelTemplates::new()?,
            idle_interval,
            rounds: 0,
        })
    }

    /// The sources, in polling order.
    pub fn pollers(&self) -> &[SourcePoller] {
        &self.pollers
    }

    /// The aggregator.
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Sources not yet retired.
    pub fn active_sources(&self) -> usize {
        self.pollers
            .iter()
            .filter(|poller| !poller.is_retired())
            .count()
    }

    /// Poll every active source once, then aggregate the sources that
    /// advanced.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if a renderer or media renderer fails. The
    /// round stops at the failing source.
    pub fn round(
        &mut self,
        renderer: &mut dyn Renderer,
        media: &mut dyn MediaRenderer,
    ) -> Result<RoundSummary, EngineError> {
        self.rounds = self.rounds.saturating_add(1);
        let mut advanced = Vec::new();
        let mut skipped = 0_usize;

        let mut ctx = Collaborators {
            renderer,
            media,
            panels: &self.panels,
        };
        for (index, poller) in self.pollers.iter_mut().enumerate() {
            match poller.poll(&mut ctx)? {
                PollOutcome::Advanced(event) => advanced.push((index, event)),
                PollOutcome::Skipped => skipped = skipped.saturating_add(1),
                PollOutcome::Idle | PollOutcome::Retired => {}
            }
        }

        let updates: Vec<RunUpdate<'_>> = advanced
            .iter()
            .filter_map(|(index, event)| {
                self.pollers.get(*index).map(|poller| RunUpdate {
                    state: poller.state(),
                    event,
                })
            })
            .collect();
        let aggregate = self.aggregator.aggregate(&updates, ctx.renderer)?;

        Ok(RoundSummary {
            round: self.rounds,
            advanced: advanced.len(),
            skipped,
            active_sources: self.active_sources(),
            aggregate,
        })
    }

    /// Run rounds until the shutdown signal fires or every source is
    /// retired.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if a round fails; renderer failures are
    /// not retried.
    pub async fn run(
        &mut self,
        renderer: &mut dyn Renderer,
        media: &mut dyn MediaRenderer,
        shutdown: &ShutdownSignal,
        callback: &mut dyn RoundCallback,
    ) -> Result<RunSummary, SchedulerError> {
        let started_at = Utc::now();
        let mut total_rounds: u64 = 0;
        let mut idle_rounds: u64 = 0;
        let mut events_applied: u64 = 0;
        let mut final_round: Option<RoundSummary> = None;

        info!(
            sources = self.pollers.len(),
            idle_interval = ?self.idle_interval,
            "Polling started"
        );

        let end_reason = loop {
            // --- Check stop request (before round) ---
            if shutdown.is_stop_requested() {
                info!("Shutdown requested");
                break EndReason::ShutdownRequested;
            }

            // --- Check remaining sources ---
            if self.active_sources() == 0 {
                info!("All sources retired");
                break EndReason::AllSourcesRetired;
            }

            // --- Execute round ---
            let summary = self.round(renderer, media)?;
            total_rounds = total_rounds.saturating_add(1);
            events_applied = events_applied.saturating_add(summary.advanced as u64);
            callback.on_round(&summary);
            final_round = Some(summary);

            // --- Drain bursts without sleeping ---
            if summary.progressed() {
                continue;
            }

            // --- Idle until the interval passes or a stop arrives ---
            idle_rounds = idle_rounds.saturating_add(1);
            debug!(round = summary.round, "Nothing new, sleeping");
            tokio::select! {
                () = tokio::time::sleep(self.idle_interval) => {}
                () = shutdown.stopped() => {}
            }
        };

        Ok(RunSummary {
            end_reason,
            total_rounds,
            idle_rounds,
            events_applied,
            final_round,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Log the end of a polling session.
pub fn log_run_end(summary: &RunSummary) {
    let elapsed = summary.finished_at.signed_duration_since(summary.started_at);
    info!(
        reason = ?summary.end_reason,
        total_rounds = summary.total_rounds,
        idle_rounds = summary.idle_rounds,
        events_applied = summary.events_applied,
        elapsed_ms = elapsed.num_milliseconds(),
        "Polling ended"
    );

    if summary.final_round.is_none() {
        warn!("Polling ended before any round ran");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use tailboard_store::StoreError;
    use tailboard_types::LogRecord;

    use super::*;
    use crate::media::UnavailableMediaRenderer;
    use crate::poller::{PollerSettings, RUN_SCORE_TITLE};
    use crate::render::MemoryRenderer;
    use crate::run_state::RunState;
    use crate::testing::{ScriptedReader, record};

    fn simple(id: u64, step: u64, elapsed: f64) -> Result<Option<LogRecord>, StoreError> {
        record(
            id,
            "SimpleTest",
            &json!({
                "glsteps": step, "avgscore": 1.0, "stdscore": 0.1,
                "avglength": 10.0, "tpassed": elapsed
            }),
        )
    }

    fn source(
        name: &str,
        script: Vec<Result<Option<LogRecord>, StoreError>>,
        settings: PollerSettings,
    ) -> SourcePoller {
        let reader = ScriptedReader::new(format!("{name}.jsonl"), script);
        SourcePoller::new(Box::new(reader), RunState::new(name, "cache"), settings)
    }

    fn scheduler(pollers: Vec<SourcePoller>) -> Scheduler {
        Scheduler::new(pollers, Aggregator::default(), Duration::from_millis(5)).unwrap()
    }

    fn score_points(renderer: &MemoryRenderer, run: &str) -> usize {
        renderer
            .find(run, RUN_SCORE_TITLE)
            .and_then(|artifact| artifact.points(run))
            .map_or(0, <[[f64; 2]]>::len)
    }

    #[derive(Default)]
    struct Recorder {
        rounds: Vec<RoundSummary>,
    }

    impl RoundCallback for Recorder {
        fn on_round(&mut self, summary: &RoundSummary) {
            self.rounds.push(*summary);
        }
    }

    #[test]
    fn round_takes_one_record_per_source() {
        let mut scheduler = scheduler(vec![
            source("A", vec![simple(1, 10, 1.0), simple(2, 20, 2.0)], PollerSettings::default()),
            source("B", vec![simple(1, 10, 1.0)], PollerSettings::default()),
        ]);
        let mut renderer = MemoryRenderer::new();

        let first = scheduler.round(&mut renderer, &mut UnavailableMediaRenderer).unwrap();
        assert_eq!(first.advanced, 2);
        assert_eq!(first.aggregate.throughput_rows, Some(2));

        let second = scheduler.round(&mut renderer, &mut UnavailableMediaRenderer).unwrap();
        assert_eq!(second.advanced, 1);

        let third = scheduler.round(&mut renderer, &mut UnavailableMediaRenderer).unwrap();
        assert!(!third.progressed());
    }

    #[test]
    fn retired_source_leaves_others_running() {
        let one_record = PollerSettings {
            max_events: 1,
            ..PollerSettings::default()
        };
        let mut scheduler = scheduler(vec![
            source("A", vec![simple(1, 10, 1.0), simple(2, 20, 1.0), simple(3, 30, 1.0)], one_record),
            source(
                "B",
                vec![simple(1, 10, 1.0), simple(2, 20, 1.0), simple(3, 30, 1.0)],
                PollerSettings::default(),
            ),
        ]);
        let mut renderer = MemoryRenderer::new();

        let first = scheduler.round(&mut renderer, &mut UnavailableMediaRenderer).unwrap();
        assert_eq!(first.advanced, 2);
        assert_eq!(score_points(&renderer, "A"), 1);
        assert_eq!(score_points(&renderer, "B"), 1);

        let second = scheduler.round(&mut renderer, &mut UnavailableMediaRenderer).unwrap();
        assert_eq!(second.advanced, 1);
        assert_eq!(second.active_sources, 1);
        assert!(scheduler.pollers().first().unwrap().is_retired());

        let third = scheduler.round(&mut renderer, &mut UnavailableMediaRenderer).unwrap();
        assert_eq!(third.advanced, 1);
        assert_eq!(score_points(&renderer, "A"), 1);
        assert_eq!(score_points(&renderer, "B"), 3);
        assert_eq!(
            scheduler.pollers().first().map(|p| p.state().events_consumed()),
            Some(1)
        );
    }

    #[test]
    fn unknown_kind_counts_as_progress_only() {
        let mut scheduler = scheduler(vec![source(
            "A",
            vec![record(1, "Mystery", &json!({}))],
            PollerSettings::default(),
        )]);
        let mut renderer = MemoryRenderer::new();

        let summary = scheduler.round(&mut renderer, &mut UnavailableMediaRenderer).unwrap();
        assert_eq!(summary.advanced, 0);
        assert_eq!(summary.skipped, 1);
        assert!(summary.progressed());
        assert_eq!(summary.aggregate, AggregateReport::default());
        assert!(renderer.is_empty());
    }

    #[tokio::test]
    async fn run_stops_when_all_sources_retire() {
        let budget = PollerSettings {
            max_events: 2,
            ..PollerSettings::default()
        };
        let mut scheduler = scheduler(vec![
            source("A", vec![simple(1, 10, 1.0), simple(2, 20, 1.0), simple(3, 30, 1.0)], budget.clone()),
            source("B", vec![simple(1, 10, 1.0), simple(2, 20, 1.0)], budget),
        ]);
        let mut renderer = MemoryRenderer::new();
        let shutdown = ShutdownSignal::new();
        let mut recorder = Recorder::default();

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(
                &mut renderer,
                &mut UnavailableMediaRenderer,
                &shutdown,
                &mut recorder,
            ),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(summary.end_reason, EndReason::AllSourcesRetired);
        assert_eq!(summary.events_applied, 4);
        assert!(summary.idle_rounds >= 1);
        assert_eq!(summary.total_rounds, recorder.rounds.len() as u64);
        assert_eq!(scheduler.active_sources(), 0);
        assert_eq!(
            scheduler.pollers().first().map(|p| p.state().events_consumed()),
            Some(2)
        );
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let mut scheduler = scheduler(vec![source(
            "A",
            vec![simple(1, 10, 1.0)],
            PollerSettings::default(),
        )]);
        let mut renderer = MemoryRenderer::new();
        let shutdown = ShutdownSignal::new();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            shutdown.request_stop();
        };
        let mut media = UnavailableMediaRenderer;
        let mut callback = NoOpCallback;
        let runner = scheduler.run(&mut renderer, &mut media, &shutdown, &mut callback);
        let (result, ()) = tokio::join!(runner, stopper);

        let summary = result.unwrap();
        assert_eq!(summary.end_reason, EndReason::ShutdownRequested);
        assert_eq!(summary.events_applied, 1);
        assert!(summary.finished_at >= summary.started_at);
    }

    #[tokio::test]
    async fn already_fired_signal_runs_no_round() {
        let mut scheduler = scheduler(vec![source(
            "A",
            vec![simple(1, 10, 1.0)],
            PollerSettings::default(),
        )]);
        let shutdown = ShutdownSignal::new();
        shutdown.request_stop();

        let result = scheduler
            .run(
                &mut MemoryRenderer::new(),
                &mut UnavailableMediaRenderer,
                &shutdown,
                &mut NoOpCallback,
            )
            .await;
        assert_eq!(result.unwrap().total_rounds, 0);
    }
}
