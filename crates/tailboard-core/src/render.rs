//! Renderer trait and in-memory implementation.
//!
//! The engine never draws anything itself. Every chart or text panel is
//! handed to a [`Renderer`], which hands back an opaque [`ArtifactHandle`]
//! on creation and accepts incremental updates against that handle later.
//! What an update means depends on the payload kind: line and scatter
//! points append, bars and text replace (see [`StoredArtifact::apply`]).
//!
//! [`MemoryRenderer`] keeps everything in a map and is what the tests and
//! headless runs use.

use std::collections::BTreeMap;

use tailboard_types::{ArtifactData, ArtifactHandle, ArtifactOptions, StoredArtifact};

use crate::error::RenderError;

/// A sink for visualization artifacts.
pub trait Renderer {
    /// Create a new artifact in `env` and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the backend cannot create the artifact.
    fn create_artifact(
        &mut self,
        env: &str,
        data: &ArtifactData,
        options: &ArtifactOptions,
    ) -> Result<ArtifactHandle, RenderError>;

    /// Apply `data` to an artifact previously returned by
    /// [`Renderer::create_artifact`].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownHandle`] for handles this renderer did
    /// not issue, or a backend error.
    fn update_artifact(
        &mut self,
        env: &str,
        handle: &ArtifactHandle,
        data: &ArtifactData,
        options: &ArtifactOptions,
    ) -> Result<(), RenderError>;
}

/// A renderer that keeps every artifact in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderer {
    artifacts: BTreeMap<ArtifactHandle, StoredArtifact>,
    created: u64,
    updated: u64,
}

impl MemoryRenderer {
    /// Create an empty renderer.
    pub const fn new() -> Self {
        Self {
            artifacts: BTreeMap::new(),
            created: 0,
            updated: 0,
        }
    }

    /// Look up an artifact by handle.
    pub fn get(&self, handle: &ArtifactHandle) -> Option<&StoredArtifact> {
        self.artifacts.get(handle)
    }

    /// Find the artifact with this title in `env`.
    pub fn find(&self, env: &str, title: &str) -> Option<&StoredArtifact> {
        self.artifacts
            .values()
            .find(|artifact| artifact.env == env && artifact.title == title)
    }

    /// Number of artifacts across all environments.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether no artifact has been created yet.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Number of `create_artifact` calls served.
    pub const fn created(&self) -> u64 {
        self.created
    }

    /// Number of `update_artifact` calls served.
    pub const fn updated(&self) -> u64 {
        self.updated
    }
}

impl Renderer for MemoryRenderer {
    fn create_artifact(
        &mut self,
        env: &str,
        data: &ArtifactData,
        options: &ArtifactOptions,
    ) -> Result<ArtifactHandle, RenderError> {
        self.created = self.created.saturating_add(1);
        let handle = ArtifactHandle::new(format!("win_{}", self.created));
        let artifact = StoredArtifact::create(handle.clone(), env, data, options);
        self.artifacts.insert(handle.clone(), artifact);
        Ok(handle)
    }

    fn update_artifact(
        &mut self,
        _env: &str,
        handle: &ArtifactHandle,
        data: &ArtifactData,
        options: &ArtifactOptions,
    ) -> Result<(), RenderError> {
        let artifact = self
            .artifacts
            .get_mut(handle)
            .ok_or_else(|| RenderError::UnknownHandle(handle.clone()))?;
        artifact.apply(data, options);
        self.updated = self.updated.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tailboard_types::{ArtifactKind, SeriesPoint};

    use super::*;

    #[test]
    fn create_issues_distinct_handles() {
        let mut renderer = MemoryRenderer::new();
        let data = ArtifactData::text("<p>hi</p>");
        let a = renderer.create_artifact("main", &data, &ArtifactOptions::titled("A"));
        let b = renderer.create_artifact("main", &data, &ArtifactOptions::titled("B"));
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_ne!(a.ok(), b.ok());
        assert_eq!(renderer.len(), 2);
        assert_eq!(renderer.created(), 2);
    }

    #[test]
    fn updates_append_points() {
        let mut renderer = MemoryRenderer::new();
        let options = ArtifactOptions::titled("Average Score");
        let first = ArtifactData::Line(SeriesPoint::new("run-a", 1.0, 2.0));
        let handle = renderer.create_artifact("run-a", &first, &options);
        let handle = handle.unwrap();

        let second = ArtifactData::Line(SeriesPoint::new("run-a", 2.0, 3.0));
        assert!(renderer.update_artifact("run-a", &handle, &second, &options).is_ok());

        let stored = renderer.find("run-a", "Average Score");
        let stored = stored.unwrap();
        assert_eq!(stored.kind, ArtifactKind::Line);
        assert_eq!(stored.points("run-a"), Some(&[[1.0, 2.0], [2.0, 3.0]][..]));
        assert_eq!(stored.revision, 1);
        assert_eq!(renderer.updated(), 1);
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let mut renderer = MemoryRenderer::new();
        let result = renderer.update_artifact(
            "main",
            &ArtifactHandle::new("nope"),
            &ArtifactData::text(""),
            &ArtifactOptions::titled("x"),
        );
        assert!(matches!(result, Err(RenderError::UnknownHandle(_))));
    }
}
