//! Artifact payloads exchanged between the engine and a renderer.
//!
//! Every visual object the dashboard shows is described by an
//! [`ArtifactData`] value. Line and scatter data carry a single point that
//! is appended to a named series; bar and text data replace the artifact's
//! contents. [`StoredArtifact`] implements that merge rule so every
//! renderer that keeps artifacts around applies it the same way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::ArtifactKind;
use crate::ids::ArtifactHandle;

/// A single `(x, y)` point belonging to a named series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SeriesPoint {
    /// Series (legend entry) the point belongs to.
    pub series: String,
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl SeriesPoint {
    /// Build a point for the given series.
    pub fn new(series: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            series: series.into(),
            x,
            y,
        }
    }
}

/// A grouped or stacked bar chart.
///
/// `values` has one entry per row; each entry holds one value per bar
/// group (a single value for plain bar charts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BarChart {
    /// Row labels.
    pub rows: Vec<String>,
    /// Values, shaped `rows x groups`.
    pub values: Vec<Vec<f64>>,
    /// Group labels; empty when unknown.
    pub legend: Vec<String>,
    /// Whether the groups are stacked within a row.
    pub stacked: bool,
}

/// Contents of an artifact, used for both creation and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ArtifactData {
    /// Append a point to a line series.
    Line(SeriesPoint),
    /// Replace the bar chart.
    Bar(BarChart),
    /// Append a point to a scatter series.
    Scatter(SeriesPoint),
    /// Replace the panel's HTML.
    Text {
        /// Panel body.
        html: String,
    },
}

impl ArtifactData {
    /// The visual kind of this payload.
    pub const fn kind(&self) -> ArtifactKind {
        match self {
            Self::Line(_) => ArtifactKind::Line,
            Self::Bar(_) => ArtifactKind::Bar,
            Self::Scatter(_) => ArtifactKind::Scatter,
            Self::Text { .. } => ArtifactKind::Text,
        }
    }

    /// Convenience constructor for a text panel.
    pub fn text(html: impl Into<String>) -> Self {
        Self::Text { html: html.into() }
    }
}

/// Presentation options passed alongside artifact data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ArtifactOptions {
    /// Title shown above the artifact; also its identity key.
    pub title: String,
}

impl ArtifactOptions {
    /// Options with just a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Accumulated state of one artifact as a renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StoredArtifact {
    /// Renderer handle.
    pub handle: ArtifactHandle,
    /// Namespace the artifact lives in (`main` or a run name).
    pub env: String,
    /// Visual kind, fixed at creation.
    pub kind: ArtifactKind,
    /// Latest title.
    pub title: String,
    /// Line or scatter points per series, in arrival order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub series: BTreeMap<String, Vec<[f64; 2]>>,
    /// Latest bar chart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar: Option<BarChart>,
    /// Latest text panel body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Number of updates applied after creation.
    pub revision: u64,
}

impl StoredArtifact {
    /// Create an artifact from its initial data.
    pub fn create(
        handle: ArtifactHandle,
        env: &str,
        data: &ArtifactData,
        options: &ArtifactOptions,
    ) -> Self {
        let mut artifact = Self {
            handle,
            env: env.to_owned(),
            kind: data.kind(),
            title: options.title.clone(),
            series: BTreeMap::new(),
            bar: None,
            html: None,
            revision: 0,
        };
        artifact.merge(data);
        artifact
    }

    /// Apply an update: points are appended, bars and text are replaced.
    pub fn apply(&mut self, data: &ArtifactData, options: &ArtifactOptions) {
        self.title.clone_from(&options.title);
        self.merge(data);
        self.revision = self.revision.saturating_add(1);
    }

    fn merge(&mut self, data: &ArtifactData) {
        match data {
            ArtifactData::Line(point) | ArtifactData::Scatter(point) => {
                self.series
                    .entry(point.series.clone())
                    .or_default()
                    .push([point.x, point.y]);
            }
            ArtifactData::Bar(chart) => self.bar = Some(chart.clone()),
            ArtifactData::Text { html } => self.html = Some(html.clone()),
        }
    }

    /// Points of one series, if it exists.
    pub fn points(&self, series: &str) -> Option<&[[f64; 2]]> {
        self.series.get(series).map(Vec::as_slice)
    }
}
