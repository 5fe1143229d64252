//! Mutable per-run bookkeeping.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use tailboard_types::{
    ActionMatrix, EventId, ExperimentArgs, HeavySample, MediaKind, SimpleSample,
};
use tracing::debug;

use crate::error::MediaError;
use crate::media::{MediaCache, MediaRenderer, VideoJob, store_recorded};

/// What the engine knows about one watched run.
#[derive(Debug, Clone)]
pub struct RunState {
    name: String,
    args: Option<BTreeMap<String, Value>>,
    action_names: Option<Vec<String>>,
    throughput: Option<f64>,
    last_action_distribution: Option<ActionMatrix>,
    media: MediaCache,
    events_consumed: u64,
    last_event_id: Option<EventId>,
}

impl RunState {
    /// Fresh state for run `name`, caching media under `cache_root`.
    pub fn new(name: impl Into<String>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            args: None,
            action_names: None,
            throughput: None,
            last_action_distribution: None,
            media: MediaCache::new(cache_root),
            events_consumed: 0,
            last_event_id: None,
        }
    }

    /// Seed action labels known before any event arrives.
    #[must_use]
    pub fn with_action_names(mut self, names: Option<Vec<String>>) -> Self {
        self.action_names = names;
        self
    }

    /// The run name, also the environment its own panels live in.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments announced by the run, if any.
    pub const fn args(&self) -> Option<&BTreeMap<String, Value>> {
        self.args.as_ref()
    }

    /// Action labels, if known.
    pub fn action_names(&self) -> Option<&[String]> {
        self.action_names.as_deref()
    }

    /// Latest steps-per-second measurement.
    pub const fn throughput(&self) -> Option<f64> {
        self.throughput
    }

    /// Action probabilities of the most recent heavy sample.
    pub fn last_action_distribution(&self) -> Option<&[Vec<f64>]> {
        self.last_action_distribution.as_deref()
    }

    /// Records consumed from the source, including skipped ones.
    pub const fn events_consumed(&self) -> u64 {
        self.events_consumed
    }

    /// Id of the most recent record consumed.
    pub const fn last_event_id(&self) -> Option<EventId> {
        self.last_event_id
    }

    /// Count one consumed record.
    pub fn note_consumed(&mut self, id: Option<EventId>) {
        self.events_consumed = self.events_consumed.saturating_add(1);
        if id.is_some() {
            self.last_event_id = id;
        }
    }

    /// Remember announced arguments. Action labels are set once: the first
    /// event (or the caller) that supplies them wins.
    pub fn record_args(&mut self, args: &ExperimentArgs) {
        self.args = Some(args.args.clone());
        self.adopt_action_names(args.action_names.as_deref());
    }

    /// Take the throughput of a simple sample. Samples without a usable
    /// elapsed time keep the previous value.
    pub fn record_simple(&mut self, sample: &SimpleSample) -> Option<f64> {
        let throughput = sample.throughput();
        if throughput.is_some() {
            self.throughput = throughput;
        }
        throughput
    }

    /// Take the action distribution of a heavy sample, and its labels if
    /// none are known yet.
    pub fn record_heavy(&mut self, sample: &HeavySample) {
        self.last_action_distribution = Some(sample.action_distribution.clone());
        self.adopt_action_names(sample.action_names.as_deref());
    }

    fn adopt_action_names(&mut self, names: Option<&[String]>) {
        if self.action_names.is_some() {
            return;
        }
        if let Some(names) = names {
            debug!(run = %self.name, count = names.len(), "Action names learned");
            self.action_names = Some(names.to_vec());
        }
    }

    /// Resolve the videos for a heavy sample through the media cache.
    ///
    /// The recorded video is materialized when the sample carries one. The
    /// agent-view video is rendered only when `with_agent_video` is set.
    /// Each `(kind, step)` pair is produced at most once per run.
    pub fn resolve_heavy_media(
        &mut self,
        sample: &HeavySample,
        with_agent_video: bool,
        renderer: &mut dyn MediaRenderer,
    ) -> Result<Vec<PathBuf>, MediaError> {
        let step_count = sample.step_count;
        let mut videos = Vec::new();

        if let Some(source) = sample.media_source() {
            let (path, outcome) = self.media.resolve(MediaKind::Recorded, step_count, |target| {
                store_recorded(source, target)
            })?;
            debug!(run = %self.name, step_count, ?outcome, "Recorded video resolved");
            videos.push(path);
        }

        if with_agent_video {
            let (path, outcome) = self.media.resolve(MediaKind::Agent, step_count, |target| {
                renderer.render_video(&VideoJob {
                    step_count,
                    frames: &sample.frames,
                    predicted_values: &sample.predicted_values,
                    action_distribution: &sample.action_distribution,
                    output: target,
                })
            })?;
            debug!(run = %self.name, step_count, ?outcome, "Agent video resolved");
            videos.push(path);
        }

        Ok(videos)
    }
}
