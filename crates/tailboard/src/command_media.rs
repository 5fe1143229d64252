//! Media renderer that shells out to an external video tool.
//!
//! The job is serialized to `<output>.job.json` next to the requested
//! output, then the configured program runs as
//! `<program> [args...] <job.json> <output.mp4>`. The program must write
//! the output file and exit successfully.
//!
//! Encoding can take seconds. On a multi-threaded tokio runtime the wait is
//! wrapped in `block_in_place`, so the worker's other tasks (the Ctrl-C
//! listener among them) move to another thread meanwhile.

use std::path::{Path, PathBuf};
use std::process::Command;

use tailboard_core::{MediaError, MediaRenderer, VideoJob};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

/// Runs an external program for every agent-view video.
#[derive(Debug, Clone)]
pub struct CommandMediaRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandMediaRenderer {
    /// Create a renderer running `program` with leading `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

fn job_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".job.json");
    PathBuf::from(name)
}

/// Run a blocking call without stalling the async runtime it is called from.
fn run_blocking<T>(call: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(call),
        _ => call(),
    }
}

impl MediaRenderer for CommandMediaRenderer {
    fn render_video(&mut self, job: &VideoJob<'_>) -> Result<PathBuf, MediaError> {
        let job_file = job_path(job.output);
        let payload = serde_json::to_vec(job).map_err(|e| MediaError::Renderer {
            message: format!("failed to encode video job: {e}"),
        })?;
        std::fs::write(&job_file, payload)?;

        debug!(
            program = %self.program,
            step_count = job.step_count,
            frames = job.frames.len(),
            "Rendering agent video"
        );
        let result = run_blocking(|| {
            Command::new(&self.program)
                .args(&self.args)
                .arg(&job_file)
                .arg(job.output)
                .output()
        });

        if let Err(e) = std::fs::remove_file(&job_file) {
            warn!(path = %job_file.display(), error = %e, "Failed to remove video job file");
        }

        let output = result?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(MediaError::Renderer {
                message: format!("{} exited with {}: {stderr}", self.program, output.status),
            });
        }
        if !job.output.is_file() {
            return Err(MediaError::Renderer {
                message: format!("{} wrote no file at {}", self.program, job.output.display()),
            });
        }
        Ok(job.output.to_path_buf())
    }
}
