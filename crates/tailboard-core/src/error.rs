//! Error types for the engine.
//!
//! Source-level problems (idle logs, corrupt records, unknown kinds) never
//! show up here: the poller absorbs them. What remains are failures of the
//! collaborators the engine cannot recover from itself, so they are
//! surfaced to whoever drives the engine.

use tailboard_types::ArtifactHandle;

/// A renderer failed to create or update an artifact.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The renderer does not know the handle it was asked to update.
    #[error("unknown artifact handle {0}")]
    UnknownHandle(ArtifactHandle),

    /// The rendering backend rejected or failed the request.
    #[error("render backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// Persisting an artifact failed.
    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An artifact could not be serialized.
    #[error("render serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The media renderer or the media cache failed.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Writing or checking a cached file failed.
    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The media renderer ran but did not produce a video.
    #[error("video rendering failed: {message}")]
    Renderer {
        /// Description of the failure.
        message: String,
    },

    /// No media renderer is configured.
    #[error("no media renderer configured")]
    Unavailable,
}

/// Errors surfaced by a poll or aggregation step.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A renderer call failed.
    #[error("render error: {source}")]
    Render {
        /// The underlying render error.
        #[from]
        source: RenderError,
    },

    /// Media caching or rendering failed.
    #[error("media error: {source}")]
    Media {
        /// The underlying media error.
        #[from]
        source: MediaError,
    },

    /// A text panel template failed to render.
    #[error("panel template error: {source}")]
    Panel {
        /// The underlying template error.
        #[from]
        source: minijinja::Error,
    },
}
