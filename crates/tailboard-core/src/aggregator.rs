//! Cross-run recomputation.
//!
//! After each scheduler round the [`Aggregator`] receives the runs that
//! advanced and redraws the shared views in the [`MAIN_ENV`] environment:
//!
//! - line series per run (score, score spread, episode length, entropy)
//! - a scatter of episode length against score, one point per heavy sample
//! - a throughput bar chart, once two or more runs have reported throughput
//! - a stacked action-usage chart, once two or more runs have reported an
//!   action distribution
//!
//! The throughput and action-distribution maps persist across rounds and
//! are owned by the aggregator alone. Each entry is overwritten by the
//! run's latest sample.

use std::collections::BTreeMap;

use tailboard_types::{
    ActionMatrix, ArtifactData, BarChart, Event, EventPayload, HeavySample, SeriesPoint,
    SimpleSample,
};
use tracing::debug;

use crate::error::RenderError;
use crate::render::Renderer;
use crate::run_state::RunState;
use crate::window::WindowRegistry;

/// Environment holding the cross-run views.
pub const MAIN_ENV: &str = "main";

/// Shared score line.
pub const SCORE_TITLE: &str = "Average Score";
/// Shared score spread line.
pub const SPREAD_TITLE: &str = "Average Std";
/// Shared episode length line.
pub const LENGTH_TITLE: &str = "Average Game Length";
/// Shared entropy line.
pub const ENTROPY_TITLE: &str = "Average Entropy";
/// Episode length against score.
pub const LENGTH_VS_SCORE_TITLE: &str = "Length vs Score";
/// Steps per second per run.
pub const THROUGHPUT_TITLE: &str = "Steps/S";
/// Normalized action usage per run.
pub const ACTION_USAGE_TITLE: &str = "Used Actions";

/// Runs needed before a comparison chart is drawn.
const MIN_COMPARED_RUNS: usize = 2;

/// A run that advanced this round, with the event it advanced by.
#[derive(Debug, Clone, Copy)]
pub struct RunUpdate<'a> {
    /// The run's state after the event was applied.
    pub state: &'a RunState,
    /// The event consumed this round.
    pub event: &'a Event,
}

impl RunUpdate<'_> {
    /// The run name.
    pub fn run(&self) -> &str {
        self.state.name()
    }
}

/// What one aggregation step drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateReport {
    /// Runs in the round's snapshot.
    pub runs: usize,
    /// Rows of the throughput chart, if it was drawn.
    pub throughput_rows: Option<usize>,
    /// Rows of the action-usage chart, if it was drawn.
    pub action_rows: Option<usize>,
}

/// Owner of the shared views and the maps behind them.
#[derive(Debug, Clone)]
pub struct Aggregator {
    windows: WindowRegistry,
    throughput: BTreeMap<String, f64>,
    action_distributions: BTreeMap<String, ActionMatrix>,
    action_names: Option<Vec<String>>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Aggregator {
    /// Create an aggregator. `action_names` labels the action-usage chart;
    /// without it the labels are learned from the first run that has them.
    pub fn new(action_names: Option<Vec<String>>) -> Self {
        Self {
            windows: WindowRegistry::new(MAIN_ENV),
            throughput: BTreeMap::new(),
            action_distributions: BTreeMap::new(),
            action_names,
        }
    }

    /// Latest throughput per run.
    pub const fn throughput(&self) -> &BTreeMap<String, f64> {
        &self.throughput
    }

    /// Latest action distribution per run.
    pub const fn action_distributions(&self) -> &BTreeMap<String, ActionMatrix> {
        &self.action_distributions
    }

    /// The shared artifact registry.
    pub const fn windows(&self) -> &WindowRegistry {
        &self.windows
    }

    /// Fold this round's snapshot into the shared views.
    ///
    /// An empty snapshot draws nothing.
    ///
    /// # Errors
    ///
    /// Returns the first [`RenderError`] raised by the renderer.
    pub fn aggregate(
        &mut self,
        updates: &[RunUpdate<'_>],
        renderer: &mut dyn Renderer,
    ) -> Result<AggregateReport, RenderError> {
        if updates.is_empty() {
            return Ok(AggregateReport::default());
        }

        for update in updates {
            if self.action_names.is_none() {
                self.action_names = update.state.action_names().map(<[String]>::to_vec);
            }
            match &update.event.payload {
                EventPayload::SimpleSample(sample) => {
                    self.fold_simple(update.run(), sample, renderer)?;
                }
                EventPayload::HeavySample(sample) => {
                    self.fold_heavy(update.run(), sample, renderer)?;
                }
                EventPayload::ArgsAnnounced(_) => {}
            }
        }

        let report = AggregateReport {
            runs: updates.len(),
            throughput_rows: self.draw_throughput(renderer)?,
            action_rows: self.draw_action_usage(renderer)?,
        };
        debug!(
            runs = report.runs,
            throughput_rows = ?report.throughput_rows,
            action_rows = ?report.action_rows,
            "Aggregation step complete"
        );
        Ok(report)
    }

    fn fold_simple(
        &mut self,
        run: &str,
        sample: &SimpleSample,
        renderer: &mut dyn Renderer,
    ) -> Result<(), RenderError> {
        #[allow(clippy::cast_precision_loss)]
        let x = sample.step_count as f64;
        let mut lines = vec![
            (SCORE_TITLE, sample.avg_score),
            (SPREAD_TITLE, sample.std_score),
            (LENGTH_TITLE, sample.avg_length),
        ];
        if let Some(entropy) = sample.avg_entropy {
            lines.push((ENTROPY_TITLE, entropy));
        }
        for (title, y) in lines {
            let point = ArtifactData::Line(SeriesPoint::new(run, x, y));
            self.windows.observe(renderer, title, &point)?;
        }

        if let Some(throughput) = sample.throughput() {
            self.throughput.insert(run.to_owned(), throughput);
        }
        Ok(())
    }

    fn fold_heavy(
        &mut self,
        run: &str,
        sample: &HeavySample,
        renderer: &mut dyn Renderer,
    ) -> Result<(), RenderError> {
        #[allow(clippy::cast_precision_loss)]
        let length = sample.episode_length() as f64;
        let point = ArtifactData::Scatter(SeriesPoint::new(run, length, sample.score));
        self.windows.observe(renderer, LENGTH_VS_SCORE_TITLE, &point)?;

        self.action_distributions
            .insert(run.to_owned(), sample.action_distribution.clone());
        Ok(())
    }

    fn draw_throughput(&mut self, renderer: &mut dyn Renderer) -> Result<Option<usize>, RenderError> {
        if self.throughput.len() < MIN_COMPARED_RUNS {
            return Ok(None);
        }
        let chart = BarChart {
            rows: self.throughput.keys().cloned().collect(),
            values: self.throughput.values().map(|tp| vec![*tp]).collect(),
            legend: Vec::new(),
            stacked: false,
        };
        let rows = chart.rows.len();
        self.windows
            .observe(renderer, THROUGHPUT_TITLE, &ArtifactData::Bar(chart))?;
        Ok(Some(rows))
    }

    fn draw_action_usage(&mut self, renderer: &mut dyn Renderer) -> Result<Option<usize>, RenderError> {
        if self.action_distributions.len() < MIN_COMPARED_RUNS {
            return Ok(None);
        }
        let chart = BarChart {
            rows: self.action_distributions.keys().cloned().collect(),
            values: action_usage(&self.action_distributions),
            legend: self.action_names.clone().unwrap_or_default(),
            stacked: true,
        };
        let rows = chart.rows.len();
        self.windows
            .observe(renderer, ACTION_USAGE_TITLE, &ArtifactData::Bar(chart))?;
        Ok(Some(rows))
    }
}

/// Index of the largest value in `row`; the first one wins a tie. `NaN`
/// entries never win, and an empty or all-`NaN` row has no choice.
pub fn chosen_action(row: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, value) in row.iter().copied().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Count how often each of `width` actions was chosen across the rows of
/// `matrix`.
pub fn tally_actions(matrix: &[Vec<f64>], width: usize) -> Vec<u64> {
    let mut counts = vec![0_u64; width];
    for row in matrix {
        if let Some(slot) = chosen_action(row).and_then(|index| counts.get_mut(index)) {
            *slot = slot.saturating_add(1);
        }
    }
    counts
}

/// Scale `counts` so they sum to 100. A zero total yields all zeros.
pub fn normalize_percent(counts: &[u64]) -> Vec<f64> {
    let total = counts.iter().copied().fold(0_u64, u64::saturating_add);
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    #[allow(clippy::cast_precision_loss)]
    let unit = total as f64 / 100.0;
    #[allow(clippy::cast_precision_loss)]
    counts.iter().map(|count| *count as f64 / unit).collect()
}

/// Normalized action-usage histogram per run, in the map's order.
///
/// Every histogram has one slot per action, where the action count is the
/// widest row across all runs.
pub fn action_usage(distributions: &BTreeMap<String, ActionMatrix>) -> Vec<Vec<f64>> {
    let width = distributions
        .values()
        .flat_map(|matrix| matrix.iter().map(Vec::len))
        .max()
        .unwrap_or(0);
    distributions
        .values()
        .map(|matrix| normalize_percent(&tally_actions(matrix, width)))
        .collect()
}
