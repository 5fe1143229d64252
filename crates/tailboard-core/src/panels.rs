//! Text panel rendering via `minijinja`.
//!
//! Two panels are rendered as HTML: the argument list announced at the
//! start of a run, and the video strip attached to each heavy sample.
//! Templates are `.html`, so interpolated values are HTML-escaped.

use std::collections::BTreeMap;
use std::path::PathBuf;

use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;

use crate::media::VIDEO_EXTENSION;

/// Title of the per-run argument panel.
pub const ARGUMENTS_TITLE: &str = "Arguments Info";

/// Pixel size of embedded videos.
pub const VIDEO_WIDTH: u32 = 242;
/// Pixel size of embedded videos.
pub const VIDEO_HEIGHT: u32 = 274;

/// Argument keys that are never shown.
const HIDDEN_ARGS: [&str; 3] = ["temp_dir", "tboard_log_dir", "db_path"];

/// Argument key rendered as a link.
const SOURCE_URL_KEY: &str = "source_url";

const ARGUMENTS_TEMPLATE: &str = "<ul>
{% for item in items %}  <li><strong>{{ item.key }} : {% if item.link %}<a href=\"{{ item.value }}\">code</a>{% else %}{{ item.value }}{% endif %}</strong></li>
{% endfor %}</ul>
";

const VIDEOS_TEMPLATE: &str = "{% for path in paths %}<video controls width=\"{{ width }}\" height=\"{{ height }}\">
  <source src=\"static/{{ path }}\" type=\"video/{{ ext }}\">
  Try Firefox or Chrome
</video>
{% endfor %}";

#[derive(Debug, Serialize)]
struct ArgumentItem {
    key: String,
    value: String,
    link: bool,
}

/// Compiled panel templates.
#[derive(Debug)]
pub struct PanelTemplates {
    env: Environment<'static>,
}

impl PanelTemplates {
    /// Compile the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns a template error if a built-in template fails to parse.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("arguments.html", ARGUMENTS_TEMPLATE)?;
        env.add_template("videos.html", VIDEOS_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Render the argument list panel.
    ///
    /// `env_name` comes first, `source_url` second (as a link), the rest in
    /// key order. Bookkeeping paths are left out.
    pub fn arguments(&self, args: &BTreeMap<String, Value>) -> Result<String, minijinja::Error> {
        let mut items: Vec<(u8, ArgumentItem)> = args
            .iter()
            .filter(|(key, _)| !HIDDEN_ARGS.contains(&key.as_str()))
            .map(|(key, value)| {
                let item = ArgumentItem {
                    key: key.clone(),
                    value: display_value(value),
                    link: key == SOURCE_URL_KEY,
                };
                (argument_priority(key), item)
            })
            .collect();
        items.sort_by_key(|(priority, _)| *priority);
        let items: Vec<ArgumentItem> = items.into_iter().map(|(_, item)| item).collect();

        self.env
            .get_template("arguments.html")?
            .render(context! { items => items })
    }

    /// Render a strip of videos served from the static cache directory.
    pub fn videos(&self, paths: &[PathBuf]) -> Result<String, minijinja::Error> {
        let paths: Vec<String> = paths
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        self.env.get_template("videos.html")?.render(context! {
            paths => paths,
            width => VIDEO_WIDTH,
            height => VIDEO_HEIGHT,
            ext => VIDEO_EXTENSION,
        })
    }
}

fn argument_priority(key: &str) -> u8 {
    match key {
        "env_name" => 0,
        SOURCE_URL_KEY => 1,
        _ => 100,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Title of the video panel for one heavy sample.
pub fn video_title(step_count: u64, score: f64, id: u64) -> String {
    format!("Step: {}, Score: {score:?} ID: {id}", human_format(step_count))
}

/// Compact step count: plain below 1000, otherwise one decimal and a
/// K/M/G/T/P suffix (`1234` is `1.2K`, `2_500_000` is `2.5M`).
pub fn human_format(value: u64) -> String {
    const SUFFIXES: [&str; 5] = ["K", "M", "G", "T", "P"];

    if value < 1000 {
        return value.to_string();
    }

    #[allow(clippy::cast_precision_loss)]
    let mut scaled = value as f64;
    let mut suffix = "";
    for candidate in SUFFIXES {
        if scaled < 1000.0 {
            break;
        }
        scaled /= 1000.0;
        suffix = candidate;
    }
    format!("{scaled:.1}{suffix}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn templates() -> PanelTemplates {
        PanelTemplates::new().unwrap()
    }

    #[test]
    fn human_format_scales() {
        assert_eq!(human_format(0), "0");
        assert_eq!(human_format(999), "999");
        assert_eq!(human_format(1234), "1.2K");
        assert_eq!(human_format(2_500_000), "2.5M");
        assert_eq!(human_format(7_000_000_000), "7.0G");
    }

    #[test]
    fn video_title_uses_compact_step() {
        assert_eq!(video_title(2_000_000, 21.0, 42), "Step: 2.0M, Score: 21.0 ID: 42");
        assert_eq!(video_title(999, -3.25, 7), "Step: 999, Score: -3.25 ID: 7");
    }

    #[test]
    fn arguments_are_ordered_and_filtered() {
        let args: BTreeMap<String, Value> = [
            ("lr", json!(0.001)),
            ("db_path", json!("/tmp/run.sqlite3")),
            ("source_url", json!("https://example.com/commit/abc")),
            ("env_name", json!("PongNoFrameskip-v4")),
            ("batch", json!(32)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect();

        let html = templates().arguments(&args);
        assert!(html.is_ok(), "{html:?}");
        let html = html.unwrap_or_default();

        assert!(!html.contains("db_path"));
        assert!(html.contains(">code</a>"));
        assert!(html.contains("env_name : PongNoFrameskip-v4"));
        assert!(html.contains("batch : 32"));

        let env_pos = html.find("env_name");
        let url_pos = html.find("source_url");
        let batch_pos = html.find("batch");
        let lr_pos = html.find("lr :");
        assert!(env_pos < url_pos);
        assert!(url_pos < batch_pos);
        assert!(batch_pos < lr_pos);
    }

    #[test]
    fn argument_values_are_escaped() {
        let args: BTreeMap<String, Value> =
            std::iter::once(("note".to_owned(), json!("<script>"))).collect();
        let html = templates().arguments(&args).unwrap_or_default();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn videos_render_one_tag_per_path() {
        let paths = vec![
            PathBuf::from("real-2000.mp4"),
            PathBuf::from("agent-2000.mp4"),
        ];
        let html = templates().videos(&paths).unwrap_or_default();
        assert_eq!(html.matches("<video").count(), 2);
        assert!(html.contains("real-2000.mp4"));
        assert!(html.contains("agent-2000.mp4"));
        assert!(html.contains("width=\"242\""));
        assert!(html.contains("video/mp4"));
    }

    #[test]
    fn no_videos_render_empty() {
        let html = templates().videos(&[]).unwrap_or_default();
        assert!(html.trim().is_empty());
    }
}
