//! Shared type definitions for the Tailboard dashboard engine.
//!
//! This crate holds the event model read out of experiment logs and the
//! artifact model handed to renderers. Artifact types flow downstream to
//! `TypeScript` via `ts-rs` for the monitoring front end.
//!
//! # Modules
//!
//! - [`ids`] -- Record ids and opaque artifact handles
//! - [`enums`] -- Event, artifact and media kinds
//! - [`event`] -- Raw log records and decoded, typed events
//! - [`artifact`] -- Artifact payloads and the shared merge rule

pub mod artifact;
pub mod enums;
pub mod event;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use artifact::{ArtifactData, ArtifactOptions, BarChart, SeriesPoint, StoredArtifact};
pub use enums::{ArtifactKind, EventKind, MediaKind};
pub use event::{
    ActionMatrix, DecodeError, Event, EventPayload, ExperimentArgs, HeavySample, LogRecord,
    MediaSource, SimpleSample,
};
pub use ids::{ArtifactHandle, EventId};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for front-end facing types.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are exported. Files land in `bindings/`
        // relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::ArtifactHandle::export_all();
        let _ = crate::enums::EventKind::export_all();
        let _ = crate::enums::ArtifactKind::export_all();
        let _ = crate::artifact::SeriesPoint::export_all();
        let _ = crate::artifact::BarChart::export_all();
        let _ = crate::artifact::ArtifactData::export_all();
        let _ = crate::artifact::ArtifactOptions::export_all();
        let _ = crate::artifact::StoredArtifact::export_all();
    }
}
