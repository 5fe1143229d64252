//! Video production and the per-run media cache.
//!
//! Heavy samples may carry a recorded episode video and may be selected for
//! an agent-view video rendered from their frames. Both are expensive, so
//! each run keeps a [`MediaCache`] keyed by media kind and step count: a
//! key that resolved once is never produced again, and a file already on
//! disk from an earlier session is reused as is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tailboard_types::{MediaKind, MediaSource};
use tracing::debug;

use crate::error::MediaError;

/// File extension used for every cached video.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Everything a media renderer needs to draw an agent-view video.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VideoJob<'a> {
    /// Step count of the heavy sample.
    pub step_count: u64,
    /// Observed frames, one per episode step.
    pub frames: &'a [Value],
    /// Predicted state values, one per episode step.
    pub predicted_values: &'a [f64],
    /// Action probabilities, one row per episode step.
    pub action_distribution: &'a [Vec<f64>],
    /// Where the finished video must be written.
    pub output: &'a Path,
}

/// Produces agent-view videos.
pub trait MediaRenderer {
    /// Render `job` and return the path of the finished video, normally
    /// `job.output`.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError`] if no video could be produced.
    fn render_video(&mut self, job: &VideoJob<'_>) -> Result<PathBuf, MediaError>;
}

/// A media renderer for deployments without a video pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableMediaRenderer;

impl MediaRenderer for UnavailableMediaRenderer {
    fn render_video(&mut self, _job: &VideoJob<'_>) -> Result<PathBuf, MediaError> {
        Err(MediaError::Unavailable)
    }
}

/// How a cache lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Already resolved during this session.
    Cached,
    /// Found on disk from an earlier session.
    OnDisk,
    /// Produced by this call.
    Produced,
}

/// Per-run cache of produced videos.
#[derive(Debug, Clone)]
pub struct MediaCache {
    root: PathBuf,
    entries: BTreeMap<(MediaKind, u64), PathBuf>,
}

impl MediaCache {
    /// Create a cache rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Where the video for `(kind, step_count)` lives in the cache.
    pub fn path_for(&self, kind: MediaKind, step_count: u64) -> PathBuf {
        self.root.join(format!(
            "{}-{step_count}.{VIDEO_EXTENSION}",
            kind.file_prefix()
        ))
    }

    /// The resolved path for a key, if it was resolved this session.
    pub fn get(&self, kind: MediaKind, step_count: u64) -> Option<&Path> {
        self.entries.get(&(kind, step_count)).map(PathBuf::as_path)
    }

    /// Number of resolved keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a key, calling `produce` with the target path only when the
    /// key is neither cached nor present on disk.
    ///
    /// A failed `produce` leaves the key unresolved.
    pub fn resolve(
        &mut self,
        kind: MediaKind,
        step_count: u64,
        produce: impl FnOnce(&Path) -> Result<PathBuf, MediaError>,
    ) -> Result<(PathBuf, CacheOutcome), MediaError> {
        if let Some(path) = self.entries.get(&(kind, step_count)) {
            return Ok((path.clone(), CacheOutcome::Cached));
        }

        let target = self.path_for(kind, step_count);
        let (path, outcome) = if target.is_file() {
            (target, CacheOutcome::OnDisk)
        } else {
            std::fs::create_dir_all(&self.root)?;
            let produced = produce(&target)?;
            debug!(kind = ?kind, step_count, path = %produced.display(), "Media produced");
            (produced, CacheOutcome::Produced)
        };

        self.entries.insert((kind, step_count), path.clone());
        Ok((path, outcome))
    }
}

/// Materialize a recorded episode video at `target`.
///
/// Embedded bytes are written out; an external reference is used in place.
/// The bytes go to a staging file first, so `target` only ever holds a
/// complete video.
pub fn store_recorded(source: MediaSource<'_>, target: &Path) -> Result<PathBuf, MediaError> {
    match source {
        MediaSource::Embedded(bytes) => {
            let staging = target.with_extension(format!("{VIDEO_EXTENSION}.tmp"));
            std::fs::write(&staging, bytes)?;
            std::fs::rename(&staging, target)?;
            Ok(target.to_path_buf())
        }
        MediaSource::External(reference) => Ok(PathBuf::from(reference)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("tailboard-media-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn paths_follow_kind_and_step() {
        let cache = MediaCache::new("cache/env/run");
        assert_eq!(
            cache.path_for(MediaKind::Recorded, 2000),
            PathBuf::from("cache/env/run/real-2000.mp4")
        );
        assert_eq!(
            cache.path_for(MediaKind::Agent, 7),
            PathBuf::from("cache/env/run/agent-7.mp4")
        );
    }

    #[test]
    fn resolve_produces_once() {
        let root = temp_root();
        let mut cache = MediaCache::new(&root);
        let mut calls = 0_u32;

        for _ in 0..3 {
            let result = cache.resolve(MediaKind::Recorded, 10, |target| {
                calls = calls.saturating_add(1);
                store_recorded(MediaSource::Embedded(b"mp4"), target)
            });
            assert!(result.is_ok(), "{result:?}");
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(MediaKind::Recorded, 10),
            Some(root.join("real-10.mp4").as_path())
        );
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn existing_file_is_reused() {
        let root = temp_root();
        assert!(std::fs::create_dir_all(&root).is_ok());
        assert!(std::fs::write(root.join("agent-5.mp4"), b"old").is_ok());

        let mut cache = MediaCache::new(&root);
        let result = cache.resolve(MediaKind::Agent, 5, |_| {
            Err(MediaError::Renderer {
                message: "should not run".to_owned(),
            })
        });
        assert!(matches!(result, Ok((_, CacheOutcome::OnDisk))));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn failed_production_is_retried() {
        let root = temp_root();
        let mut cache = MediaCache::new(&root);

        let failed = cache.resolve(MediaKind::Agent, 1, |_| Err(MediaError::Unavailable));
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let retried = cache.resolve(MediaKind::Agent, 1, |target| {
            std::fs::write(target, b"ok")?;
            Ok(target.to_path_buf())
        });
        assert!(matches!(retried, Ok((_, CacheOutcome::Produced))));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn external_reference_is_used_in_place() {
        let target = PathBuf::from("unused.mp4");
        let result = store_recorded(MediaSource::External("videos/ep1.mp4"), &target);
        assert_eq!(result.ok(), Some(PathBuf::from("videos/ep1.mp4")));
    }

    #[test]
    fn embedded_video_is_staged_then_renamed() {
        let root = temp_root();
        std::fs::create_dir_all(&root).unwrap();
        let target = root.join("real-3.mp4");
        let staging = root.join("real-3.mp4.tmp");
        std::fs::write(&staging, b"half").unwrap();

        let mut cache = MediaCache::new(&root);
        let (path, outcome) = cache
            .resolve(MediaKind::Recorded, 3, |target| {
                store_recorded(MediaSource::Embedded(b"full"), target)
            })
            .unwrap();

        assert_eq!(outcome, CacheOutcome::Produced);
        assert_eq!(path, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"full");
        assert!(!staging.exists());
        std::fs::remove_dir_all(&root).unwrap();
    }
}
