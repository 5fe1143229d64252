//! Enumeration types shared by the store, the engine, and the front end.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The kind of a log record.
///
/// On the wire the kinds use the names written by the training loggers
/// (`ExperimentArgs`, `SimpleTest`, `HeavyTest`). Anything else decodes to
/// an unknown-kind error and is skipped by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// Experiment arguments announced once at the start of a run.
    #[serde(rename = "ExperimentArgs")]
    ArgsAnnounced,
    /// Cheap periodic evaluation summary.
    #[serde(rename = "SimpleTest")]
    SimpleSample,
    /// Expensive evaluation carrying video and per-step action data.
    #[serde(rename = "HeavyTest")]
    HeavySample,
}

impl EventKind {
    /// Every kind, in wire-name order.
    pub const ALL: [Self; 3] = [Self::ArgsAnnounced, Self::SimpleSample, Self::HeavySample];

    /// The name this kind carries in log records.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::ArgsAnnounced => "ExperimentArgs",
            Self::SimpleSample => "SimpleTest",
            Self::HeavySample => "HeavyTest",
        }
    }

    /// Look up a kind by its wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ---------------------------------------------------------------------------
// Artifact kinds
// ---------------------------------------------------------------------------

/// The visual type of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ArtifactKind {
    /// One or more named line series, appended point by point.
    Line,
    /// Grouped or stacked bar chart, replaced wholesale on update.
    Bar,
    /// Two-dimensional scatter with named series.
    Scatter,
    /// Rich text (HTML) panel.
    Text,
}

/// Which media file a cache entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Video recorded by the environment and shipped with the sample.
    Recorded,
    /// Video synthesized from the agent's frames and predictions.
    Agent,
}

impl MediaKind {
    /// File-name prefix used for cached media of this kind.
    pub const fn file_prefix(self) -> &'static str {
        match self {
            Self::Recorded => "real",
            Self::Agent => "agent",
        }
    }
}
