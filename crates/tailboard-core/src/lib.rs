//! Polling, per-run state, and cross-run aggregation for Tailboard.
//!
//! This crate turns a set of append-only experiment logs into a live set of
//! charts and panels. It never draws anything itself: every view goes
//! through a [`Renderer`], and every agent-view video through a
//! [`MediaRenderer`].
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `tailboard.yaml` into
//!   strongly-typed structs.
//! - [`error`] -- Render, media and engine errors.
//! - [`render`] -- [`Renderer`] trait and [`MemoryRenderer`].
//! - [`window`] -- Title-to-handle identity for artifacts.
//! - [`media`] -- [`MediaRenderer`] trait and the per-run media cache.
//! - [`panels`] -- HTML text panels rendered with `minijinja`.
//! - [`run_state`] -- Mutable per-run bookkeeping.
//! - [`poller`] -- One log source and the run's own panels.
//! - [`aggregator`] -- Cross-run views and the action-usage histogram.
//! - [`scheduler`] -- The round-robin polling loop.
//! - [`shutdown`] -- Caller-controlled cancellation.
//!
//! [`Renderer`]: render::Renderer
//! [`MemoryRenderer`]: render::MemoryRenderer
//! [`MediaRenderer`]: media::MediaRenderer

pub mod aggregator;
pub mod config;
pub mod error;
pub mod media;
pub mod panels;
pub mod poller;
pub mod render;
pub mod run_state;
pub mod scheduler;
pub mod shutdown;
pub mod window;

#[cfg(test)]
mod testing;

pub use aggregator::{AggregateReport, Aggregator, RunUpdate};
pub use config::{AgentVideoPolicy, ConfigError, DashboardConfig};
pub use error::{EngineError, MediaError, RenderError};
pub use media::{MediaCache, MediaRenderer, UnavailableMediaRenderer, VideoJob};
pub use poller::{PollOutcome, PollerSettings, SourcePoller};
pub use render::{MemoryRenderer, Renderer};
pub use run_state::RunState;
pub use scheduler::{
    EndReason, NoOpCallback, RoundCallback, RoundSummary, RunSummary, Scheduler, SchedulerError,
};
pub use shutdown::ShutdownSignal;
pub use window::WindowRegistry;
