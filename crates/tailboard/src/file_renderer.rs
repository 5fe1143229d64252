//! Renderer that persists each artifact as a JSON file.
//!
//! Artifacts land at `<root>/<env>/<handle>.json` and are rewritten in full
//! on every update, so a front end polling the directory always sees the
//! merged state. Files are written to a temporary name and renamed into
//! place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tailboard_core::{RenderError, Renderer};
use tailboard_types::{ArtifactData, ArtifactHandle, ArtifactOptions, StoredArtifact};
use tracing::debug;
use uuid::Uuid;

/// Writes artifacts below a root directory.
#[derive(Debug)]
pub struct FileRenderer {
    root: PathBuf,
    artifacts: BTreeMap<ArtifactHandle, StoredArtifact>,
}

impl FileRenderer {
    /// Create a renderer writing below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            artifacts: BTreeMap::new(),
        }
    }
}

fn artifact_path(root: &Path, env: &str, handle: &ArtifactHandle) -> PathBuf {
    root.join(env).join(format!("{handle}.json"))
}

fn write_artifact(root: &Path, artifact: &StoredArtifact) -> Result<(), RenderError> {
    let path = artifact_path(root, &artifact.env, &artifact.handle);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, serde_json::to_vec_pretty(artifact)?)?;
    std::fs::rename(&staging, &path)?;
    debug!(path = %path.display(), revision = artifact.revision, "Artifact written");
    Ok(())
}

impl Renderer for FileRenderer {
    fn create_artifact(
        &mut self,
        env: &str,
        data: &ArtifactData,
        options: &ArtifactOptions,
    ) -> Result<ArtifactHandle, RenderError> {
        let handle = ArtifactHandle::new(Uuid::now_v7().to_string());
        let artifact = StoredArtifact::create(handle.clone(), env, data, options);
        write_artifact(&self.root, &artifact)?;
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
        write_artifact(&self.root, artifact)
    }
}
