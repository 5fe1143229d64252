//! Log records and the typed events decoded from them.
//!
//! A [`LogRecord`] is what a store hands back: an id, a kind name, a loose
//! field mapping and a timestamp. [`Event::decode`] turns it into a tagged
//! [`EventPayload`] with a fixed field set per kind, so nothing downstream
//! has to probe for key presence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::EventKind;
use crate::ids::EventId;

/// Per-step action probabilities, shaped `steps x actions`.
pub type ActionMatrix = Vec<Vec<f64>>;

/// Errors raised while decoding a [`LogRecord`] into an [`Event`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The record's kind name is not one the engine understands.
    #[error("record {id}: unknown event kind '{kind}'")]
    UnknownKind {
        /// Id of the offending record.
        id: EventId,
        /// The kind name as found in the log.
        kind: String,
    },

    /// The kind is known but its fields do not match the expected shape.
    #[error("record {id}: invalid {kind} fields: {source}")]
    InvalidFields {
        /// Id of the offending record.
        id: EventId,
        /// The decoded kind.
        kind: EventKind,
        /// The underlying deserialization error.
        source: serde_json::Error,
    },
}

/// A raw record as stored in an append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Store-assigned id, strictly increasing within one log.
    pub id: EventId,
    /// Kind name (see [`EventKind::wire_name`]).
    pub kind: String,
    /// Kind-specific payload.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Seconds since the Unix epoch when the producer wrote the record.
    #[serde(default)]
    pub timestamp: f64,
}

/// A decoded, immutable event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Store-assigned id.
    pub id: EventId,
    /// Seconds since the Unix epoch when the producer wrote the record.
    pub timestamp: f64,
    /// Typed payload.
    pub payload: EventPayload,
}

impl Event {
    /// Decode a raw record.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownKind`] for unrecognized kind names and
    /// [`DecodeError::InvalidFields`] when the fields do not fit the kind.
    pub fn decode(record: LogRecord) -> Result<Self, DecodeError> {
        let LogRecord {
            id,
            kind,
            fields,
            timestamp,
        } = record;

        let Some(event_kind) = EventKind::from_wire(&kind) else {
            return Err(DecodeError::UnknownKind { id, kind });
        };

        let value = Value::Object(fields);
        let invalid = |source| DecodeError::InvalidFields {
            id,
            kind: event_kind,
            source,
        };

        let payload = match event_kind {
            EventKind::ArgsAnnounced => {
                EventPayload::ArgsAnnounced(serde_json::from_value(value).map_err(invalid)?)
            }
            EventKind::SimpleSample => {
                EventPayload::SimpleSample(serde_json::from_value(value).map_err(invalid)?)
            }
            EventKind::HeavySample => {
                EventPayload::HeavySample(serde_json::from_value(value).map_err(invalid)?)
            }
        };

        Ok(Self {
            id,
            timestamp,
            payload,
        })
    }

    /// The kind of this event.
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Training step count carried by sample events.
    pub const fn step_count(&self) -> Option<u64> {
        match &self.payload {
            EventPayload::ArgsAnnounced(_) => None,
            EventPayload::SimpleSample(sample) => Some(sample.step_count),
            EventPayload::HeavySample(sample) => Some(sample.step_count),
        }
    }
}

/// Typed payload, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Experiment arguments.
    ArgsAnnounced(ExperimentArgs),
    /// Periodic evaluation summary.
    SimpleSample(SimpleSample),
    /// Heavy evaluation with media.
    HeavySample(HeavySample),
}

impl EventPayload {
    /// The kind of this payload.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ArgsAnnounced(_) => EventKind::ArgsAnnounced,
            Self::SimpleSample(_) => EventKind::SimpleSample,
            Self::HeavySample(_) => EventKind::HeavySample,
        }
    }

    /// Serialize the payload into the loose field mapping stored in logs.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be represented as JSON (for
    /// example a non-finite float).
    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let value = match self {
            Self::ArgsAnnounced(args) => serde_json::to_value(args)?,
            Self::SimpleSample(sample) => serde_json::to_value(sample)?,
            Self::HeavySample(sample) => serde_json::to_value(sample)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            other => {
                let mut map = Map::new();
                map.insert(String::from("value"), other);
                Ok(map)
            }
        }
    }
}

/// Arguments a run was started with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentArgs {
    /// Free-form argument mapping (name to value).
    pub args: BTreeMap<String, Value>,
    /// Human-readable action names, if the producer knows them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_names: Option<Vec<String>>,
}

/// Periodic evaluation summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleSample {
    /// Cumulative training steps.
    #[serde(rename = "glsteps")]
    pub step_count: u64,
    /// Mean episode score.
    #[serde(rename = "avgscore")]
    pub avg_score: f64,
    /// Standard deviation of the episode score.
    #[serde(rename = "stdscore")]
    pub std_score: f64,
    /// Mean episode length in steps.
    #[serde(rename = "avglength")]
    pub avg_length: f64,
    /// Wall-clock seconds since the run started.
    #[serde(rename = "tpassed")]
    pub elapsed_secs: f64,
    /// Mean policy entropy, when the producer computes it.
    #[serde(
        rename = "avgentropy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub avg_entropy: Option<f64>,
}

impl SimpleSample {
    /// Steps per second, or `None` when the elapsed time is not positive.
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput(&self) -> Option<f64> {
        if self.elapsed_secs.is_finite() && self.elapsed_secs > 0.0 {
            Some(self.step_count as f64 / self.elapsed_secs)
        } else {
            None
        }
    }
}

/// Heavy evaluation: one recorded episode with media and action data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeavySample {
    /// Cumulative training steps at evaluation time.
    #[serde(rename = "glsteps")]
    pub step_count: u64,
    /// Score of the recorded episode.
    pub score: f64,
    /// Action probabilities for every step of the episode.
    #[serde(rename = "action_distr")]
    pub action_distribution: ActionMatrix,
    /// Recorded video bytes embedded in the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Vec<u8>>,
    /// Path to a recorded video stored outside the log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
    /// Observation frames, passed through untouched to the media renderer.
    #[serde(rename = "states", default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Value>,
    /// Value estimates for every step.
    #[serde(rename = "predvalues", default, skip_serializing_if = "Vec::is_empty")]
    pub predicted_values: Vec<f64>,
    /// Human-readable action names, if the producer knows them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_names: Option<Vec<String>>,
}

/// Where the recorded video of a heavy sample lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSource<'a> {
    /// Bytes embedded in the record.
    Embedded(&'a [u8]),
    /// Path of a file written by the producer.
    External(&'a str),
}

impl HeavySample {
    /// Episode length, taken as the number of recorded steps.
    pub fn episode_length(&self) -> usize {
        self.action_distribution.len()
    }

    /// The recorded video source; embedded bytes win over a reference.
    pub fn media_source(&self) -> Option<MediaSource<'_>> {
        if let Some(bytes) = self.video.as_deref() {
            return Some(MediaSource::Embedded(bytes));
        }
        self.video_path.as_deref().map(MediaSource::External)
    }
}
