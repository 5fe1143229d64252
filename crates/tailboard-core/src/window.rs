//! Title-keyed artifact identity.
//!
//! A [`WindowRegistry`] remembers which artifact a title was drawn into, so
//! the first observation of a title creates an artifact and every later one
//! updates that same artifact. Each run owns a registry for its own
//! environment, and the aggregator owns one for the shared environment.

use std::collections::BTreeMap;

use tailboard_types::{ArtifactData, ArtifactHandle, ArtifactOptions};
use tracing::debug;

use crate::error::RenderError;
use crate::render::Renderer;

/// Maps artifact titles to renderer handles within one environment.
#[derive(Debug, Clone)]
pub struct WindowRegistry {
    env: String,
    windows: BTreeMap<String, ArtifactHandle>,
}

impl WindowRegistry {
    /// Create an empty registry for `env`.
    pub fn new(env: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            windows: BTreeMap::new(),
        }
    }

    /// Draw `data` under `title`: create the artifact the first time the
    /// title is seen, update it afterwards.
    ///
    /// A failed create leaves the title unregistered, so the next
    /// observation tries to create it again.
    pub fn observe(
        &mut self,
        renderer: &mut dyn Renderer,
        title: &str,
        data: &ArtifactData,
    ) -> Result<ArtifactHandle, RenderError> {
        let options = ArtifactOptions::titled(title);
        if let Some(handle) = self.windows.get(title) {
            renderer.update_artifact(&self.env, handle, data, &options)?;
            return Ok(handle.clone());
        }

        let handle = renderer.create_artifact(&self.env, data, &options)?;
        debug!(env = %self.env, title, handle = %handle, "Artifact created");
        self.windows.insert(title.to_owned(), handle.clone());
        Ok(handle)
    }

    /// The handle registered for `title`, if any.
    pub fn handle(&self, title: &str) -> Option<&ArtifactHandle> {
        self.windows.get(title)
    }

    /// Number of registered titles.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether nothing has been drawn yet.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
