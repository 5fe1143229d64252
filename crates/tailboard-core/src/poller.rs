//! One log source: cursor, run state, and the run's own panels.
//!
//! A [`SourcePoller`] advances its cursor by at most one record per
//! [`poll`](SourcePoller::poll). The record is decoded and filtered, folded
//! into the [`RunState`], and drawn into the run's environment. Problems
//! local to the source (corrupt or unknown records, a backend that is
//! temporarily unreadable) are logged and absorbed here so one bad log
//! never stalls the others.

use tailboard_store::LogReader;
use tailboard_types::{
    ArtifactData, DecodeError, Event, EventId, EventPayload, HeavySample, SeriesPoint,
    SimpleSample,
};
use tracing::{debug, info, warn};

use crate::config::{AgentVideoPolicy, DashboardConfig};
use crate::error::EngineError;
use crate::media::MediaRenderer;
use crate::panels::{ARGUMENTS_TITLE, PanelTemplates, video_title};
use crate::render::Renderer;
use crate::run_state::RunState;
use crate::window::WindowRegistry;

/// Title of the per-run score line.
pub const RUN_SCORE_TITLE: &str = "Average Score";
/// Title of the per-run entropy line.
pub const RUN_ENTROPY_TITLE: &str = "Average Entropy";

/// Per-source limits and media selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    /// Records a source may consume before it is retired.
    pub max_events: u64,
    /// Samples at or beyond this step count are skipped.
    pub max_steps: u64,
    /// Which heavy samples get an agent-view video.
    pub agent_videos: AgentVideoPolicy,
}

impl PollerSettings {
    /// Settings taken from a loaded configuration.
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            max_events: config.polling.max_events,
            max_steps: config.polling.max_steps,
            agent_videos: config.media.agent_videos.clone(),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

/// The collaborators a poll draws through.
pub struct Collaborators<'a> {
    /// Receives every chart and panel.
    pub renderer: &'a mut dyn Renderer,
    /// Produces agent-view videos.
    pub media: &'a mut dyn MediaRenderer,
    /// Compiled text panel templates.
    pub panels: &'a PanelTemplates,
}

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A record was consumed and applied.
    Advanced(Event),
    /// A record was consumed but dropped (corrupt, unknown kind, or past
    /// the step limit).
    Skipped,
    /// Nothing new, or the backend could not be read this time.
    Idle,
    /// The source hit its record budget and is no longer read.
    Retired,
}

impl PollOutcome {
    /// Whether the cursor moved.
    pub const fn progressed(&self) -> bool {
        matches!(self, Self::Advanced(_) | Self::Skipped)
    }
}

/// A log cursor plus everything derived from it.
pub struct SourcePoller {
    reader: Box<dyn LogReader>,
    state: RunState,
    windows: WindowRegistry,
    settings: PollerSettings,
    backend_failing: bool,
    retired: bool,
}

impl std::fmt::Debug for SourcePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourcePoller")
            .field("path", &self.reader.path())
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

impl SourcePoller {
    /// Wrap a cursor. The run's panels live in an environment named after
    /// the run.
    pub fn new(reader: Box<dyn LogReader>, state: RunState, settings: PollerSettings) -> Self {
        let windows = WindowRegistry::new(state.name());
        Self {
            reader,
            state,
            windows,
            settings,
            backend_failing: false,
            retired: false,
        }
    }

    /// The run name.
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// The run's state.
    pub const fn state(&self) -> &RunState {
        &self.state
    }

    /// The run's own artifact registry.
    pub const fn windows(&self) -> &WindowRegistry {
        &self.windows
    }

    /// Whether the source has been retired.
    pub const fn is_retired(&self) -> bool {
        self.retired
    }

    /// Consume at most one record and apply it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only when a collaborator fails while the
    /// record is being drawn. The record still counts as consumed.
    pub fn poll(&mut self, ctx: &mut Collaborators<'_>) -> Result<PollOutcome, EngineError> {
        if self.retired {
            return Ok(PollOutcome::Retired);
        }
        if self.state.events_consumed() >= self.settings.max_events {
            self.retire();
            return Ok(PollOutcome::Retired);
        }

        let record = match self.reader.next_record() {
            Ok(Some(record)) => {
                self.recovered();
                record
            }
            Ok(None) => {
                self.recovered();
                return Ok(PollOutcome::Idle);
            }
            Err(err) if err.is_corrupt_record() => {
                warn!(run = %self.name(), error = %err, "Skipping corrupt record");
                self.state.note_consumed(None);
                return Ok(PollOutcome::Skipped);
            }
            Err(err) => {
                if self.backend_failing {
                    debug!(run = %self.name(), error = %err, "Log still unreadable");
                } else {
                    warn!(run = %self.name(), error = %err, "Log unreadable, will retry");
                    self.backend_failing = true;
                }
                return Ok(PollOutcome::Idle);
            }
        };

        self.state.note_consumed(Some(record.id));
        let event = match Event::decode(record) {
            Ok(event) => event,
            Err(DecodeError::UnknownKind { id, kind }) => {
                warn!(run = %self.name(), id = %id, kind = %kind, "Ignoring record of unknown kind");
                return Ok(PollOutcome::Skipped);
            }
            Err(err) => {
                warn!(run = %self.name(), error = %err, "Ignoring malformed record");
                return Ok(PollOutcome::Skipped);
            }
        };

        let max_steps = self.settings.max_steps;
        if let Some(step_count) = event.step_count().filter(|step| *step >= max_steps) {
            debug!(run = %self.name(), step_count, "Sample beyond step limit");
            return Ok(PollOutcome::Skipped);
        }

        self.apply(&event, ctx)?;
        Ok(PollOutcome::Advanced(event))
    }

    fn apply(&mut self, event: &Event, ctx: &mut Collaborators<'_>) -> Result<(), EngineError> {
        match &event.payload {
            EventPayload::ArgsAnnounced(args) => {
                self.state.record_args(args);
                let html = ctx.panels.arguments(&args.args)?;
                self.windows
                    .observe(ctx.renderer, ARGUMENTS_TITLE, &ArtifactData::text(html))?;
            }
            EventPayload::SimpleSample(sample) => self.apply_simple(sample, ctx)?,
            EventPayload::HeavySample(sample) => self.apply_heavy(event.id, sample, ctx)?,
        }
        Ok(())
    }

    fn apply_simple(
        &mut self,
        sample: &SimpleSample,
        ctx: &mut Collaborators<'_>,
    ) -> Result<(), EngineError> {
        self.state.record_simple(sample);

        #[allow(clippy::cast_precision_loss)]
        let x = sample.step_count as f64;
        let score = SeriesPoint::new(self.state.name(), x, sample.avg_score);
        self.windows
            .observe(ctx.renderer, RUN_SCORE_TITLE, &ArtifactData::Line(score))?;

        if let Some(entropy) = sample.avg_entropy {
            let point = SeriesPoint::new(self.state.name(), x, entropy);
            self.windows
                .observe(ctx.renderer, RUN_ENTROPY_TITLE, &ArtifactData::Line(point))?;
        }
        Ok(())
    }

    fn apply_heavy(
        &mut self,
        id: EventId,
        sample: &HeavySample,
        ctx: &mut Collaborators<'_>,
    ) -> Result<(), EngineError> {
        self.state.record_heavy(sample);

        let with_agent_video = self.settings.agent_videos.selects(id);
        let videos = self
            .state
            .resolve_heavy_media(sample, with_agent_video, ctx.media)?;

        let title = video_title(sample.step_count, sample.score, id.into_inner());
        let html = ctx.panels.videos(&videos)?;
        self.windows
            .observe(ctx.renderer, &title, &ArtifactData::text(html))?;
        Ok(())
    }

    fn recovered(&mut self) {
        if self.backend_failing {
            info!(run = %self.name(), "Log readable again");
            self.backend_failing = false;
        }
    }

    fn retire(&mut self) {
        info!(
            run = %self.name(),
            events = self.state.events_consumed(),
            "Record budget reached, retiring source"
        );
        self.retired = true;
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
    use crate::render::MemoryRenderer;
    use crate::testing::{ScriptedReader, record};

    fn simple(id: u64, step: u64) -> Result<Option<LogRecord>, StoreError> {
        record(
            id,
            "SimpleTest",
            &json!({
                "glsteps": step, "avgscore": 1.5, "stdscore": 0.5,
                "avglength": 100.0, "tpassed": 10.0, "avgentropy": 0.7
            }),
        )
    }

    fn poller(
        script: Vec<Result<Option<LogRecord>, StoreError>>,
        settings: PollerSettings,
    ) -> SourcePoller {
        let reader = ScriptedReader::new("run-a.jsonl", script);
        let cache = std::env::temp_dir().join(format!("tailboard-poll-{}", uuid::Uuid::new_v4()));
        SourcePoller::new(Box::new(reader), RunState::new("run-a", cache), settings)
    }

    struct Harness {
        renderer: MemoryRenderer,
        media: UnavailableMediaRenderer,
        panels: PanelTemplates,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                renderer: MemoryRenderer::new(),
                media: UnavailableMediaRenderer,
                panels: PanelTemplates::new().unwrap(),
            }
        }

        fn try_poll(&mut self, poller: &mut SourcePoller) -> Result<PollOutcome, EngineError> {
            let mut ctx = Collaborators {
                renderer: &mut self.renderer,
                media: &mut self.media,
                panels: &self.panels,
            };
            poller.poll(&mut ctx)
        }

        fn poll(&mut self, poller: &mut SourcePoller) -> PollOutcome {
            self.try_poll(poller).unwrap()
        }
    }

    #[test]
    fn simple_sample_draws_run_lines() {
        let mut harness = Harness::new();
        let mut source = poller(vec![simple(1, 100), simple(2, 200)], PollerSettings::default());

        assert!(matches!(harness.poll(&mut source), PollOutcome::Advanced(_)));
        assert!(matches!(harness.poll(&mut source), PollOutcome::Advanced(_)));
        assert_eq!(harness.poll(&mut source), PollOutcome::Idle);

        let score = harness.renderer.find("run-a", RUN_SCORE_TITLE);
        assert_eq!(
            score.and_then(|artifact| artifact.points("run-a")),
            Some(&[[100.0, 1.5], [200.0, 1.5]][..])
        );
        assert!(harness.renderer.find("run-a", RUN_ENTROPY_TITLE).is_some());
        assert_eq!(source.state().throughput(), Some(20.0));
        assert_eq!(source.windows().len(), 2);
    }

    #[test]
    fn unknown_kind_is_skipped() {
        let mut harness = Harness::new();
        let mut source = poller(
            vec![record(1, "Checkpoint", &json!({})), simple(2, 100)],
            PollerSettings::default(),
        );

        assert_eq!(harness.poll(&mut source), PollOutcome::Skipped);
        assert!(harness.renderer.is_empty());
        assert!(matches!(harness.poll(&mut source), PollOutcome::Advanced(_)));
        assert_eq!(source.state().events_consumed(), 2);
    }

    #[test]
    fn corrupt_record_is_skipped() {
        let mut harness = Harness::new();
        let corrupt = Err(StoreError::Decode {
            location: "byte 0".to_owned(),
            message: "expected value".to_owned(),
        });
        let mut source = poller(vec![corrupt, simple(2, 100)], PollerSettings::default());

        assert_eq!(harness.poll(&mut source), PollOutcome::Skipped);
        assert!(matches!(harness.poll(&mut source), PollOutcome::Advanced(_)));
    }

    #[test]
    fn backend_failure_reads_as_idle() {
        let mut harness = Harness::new();
        let broken = || Err(StoreError::Io(std::io::Error::other("locked")));
        let mut source = poller(vec![broken(), broken(), simple(1, 5)], PollerSettings::default());

        assert_eq!(harness.poll(&mut source), PollOutcome::Idle);
        assert_eq!(harness.poll(&mut source), PollOutcome::Idle);
        assert!(matches!(harness.poll(&mut source), PollOutcome::Advanced(_)));
        assert_eq!(source.state().events_consumed(), 1);
    }

    #[test]
    fn samples_past_step_limit_are_skipped() {
        let mut harness = Harness::new();
        let settings = PollerSettings {
            max_steps: 1000,
            ..PollerSettings::default()
        };
        let mut source = poller(vec![simple(1, 999), simple(2, 1000)], settings);

        assert!(matches!(harness.poll(&mut source), PollOutcome::Advanced(_)));
        assert_eq!(harness.poll(&mut source), PollOutcome::Skipped);
        let score = harness.renderer.find("run-a", RUN_SCORE_TITLE);
        assert_eq!(score.map(|artifact| artifact.revision), Some(0));
    }

    #[test]
    fn source_retires_after_budget() {
        let mut harness = Harness::new();
        let settings = PollerSettings {
            max_events: 2,
            ..PollerSettings::default()
        };
        let mut source = poller(vec![simple(1, 1), simple(2, 2), simple(3, 3)], settings);

        assert!(harness.poll(&mut source).progressed());
        assert!(harness.poll(&mut source).progressed());
        assert_eq!(harness.poll(&mut source), PollOutcome::Retired);
        assert!(source.is_retired());
        assert_eq!(harness.poll(&mut source), PollOutcome::Retired);
        assert_eq!(source.state().events_consumed(), 2);
    }

    #[test]
    fn args_draw_argument_panel() {
        let mut harness = Harness::new();
        let args = record(
            1,
            "ExperimentArgs",
            &json!({"args": {"env_name": "Pong", "lr": 0.01}, "action_names": ["noop", "fire"]}),
        );
        let mut source = poller(vec![args], PollerSettings::default());

        assert!(matches!(harness.poll(&mut source), PollOutcome::Advanced(_)));
        let panel = harness.renderer.find("run-a", ARGUMENTS_TITLE);
        let html = panel.and_then(|artifact| artifact.html.clone()).unwrap_or_default();
        assert!(html.contains("env_name : Pong"));
        assert_eq!(source.state().action_names().map(<[String]>::len), Some(2));
    }

    #[test]
    fn heavy_sample_draws_video_panel() {
        let mut harness = Harness::new();
        let heavy = record(
            7,
            "HeavyTest",
            &json!({
                "glsteps": 2_000_000, "score": 21.0,
                "action_distr": [[0.2, 0.8], [0.6, 0.4]],
                "video_path": "episodes/ep-7.mp4",
            }),
        );
        let mut source = poller(vec![heavy], PollerSettings::default());

        assert!(matches!(harness.poll(&mut source), PollOutcome::Advanced(_)));
        let panel = harness.renderer.find("run-a", "Step: 2.0M, Score: 21.0 ID: 7");
        let html = panel.and_then(|artifact| artifact.html.clone()).unwrap_or_default();
        assert_eq!(html.matches("<video").count(), 1);
        assert!(html.contains("ep-7.mp4"));
        assert_eq!(source.state().last_action_distribution().map(<[Vec<f64>]>::len), Some(2));
    }

    #[test]
    fn missing_media_renderer_surfaces_as_error() {
        let mut harness = Harness::new();
        let heavy = record(
            3,
            "HeavyTest",
            &json!({"glsteps": 10, "score": 1.0, "action_distr": [[1.0]]}),
        );
        let settings = PollerSettings {
            agent_videos: AgentVideoPolicy::All,
            ..PollerSettings::default()
        };
        let mut source = poller(vec![heavy], settings);

        assert!(matches!(
            harness.try_poll(&mut source),
            Err(EngineError::Media { .. })
        ));
        assert_eq!(source.state().events_consumed(), 1);
    }
}
