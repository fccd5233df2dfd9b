//! HTML bundle export
//!
//! A bundle is a directory a static web server can publish as is:
//! - `wwt_figure.json`: the serialized state document
//! - `index.html`: a page that loads the engine and replays the document
//! - `<data_dir>/<id>.csv` or `<data_dir>/<id>.fits`: one file per layer

use html_escape::{encode_double_quoted_attribute, encode_safe};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::WwtClient;
use crate::error::WwtResult;
use crate::state::HtmlSettings;

/// Name of the state document inside a bundle
pub const FIGURE_FILE: &str = "wwt_figure.json";

/// Bundle export options
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BundleOptions {
    /// Page title
    pub title: Option<String>,

    /// Largest width the viewer may take, pixels
    pub max_width: Option<u32>,

    /// Largest height the viewer may take, pixels
    pub max_height: Option<u32>,
}

impl BundleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    fn html_settings(&self) -> HtmlSettings {
        HtmlSettings {
            title: self.title.clone(),
            max_width: self.max_width,
            max_height: self.max_height,
        }
    }
}

/// Files written by [`save_html_bundle`]
#[derive(Clone, Debug)]
pub struct BundleResult {
    pub figure_path: PathBuf,
    pub index_path: PathBuf,
    pub data_files: Vec<PathBuf>,
}

fn index_html(settings: &HtmlSettings, engine_script_url: &str) -> String {
    let title = encode_safe(settings.title.as_deref().unwrap_or("WorldWide Telescope"));
    let size = |value: Option<u32>| {
        value
            .map(|v| format!("{}px", v))
            .unwrap_or_else(|| "100%".to_string())
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <script src="{script}"></script>
  <style>
    html, body {{ margin: 0; height: 100%; }}
    #wwt-canvas {{ width: 100%; height: 100%; max-width: {width}; max-height: {height}; }}
  </style>
</head>
<body>
  <div id="wwt-canvas"></div>
  <script>
    fetch("{figure}")
      .then(function (response) {{ return response.json(); }})
      .then(function (figure) {{ wwtFigure.load("wwt-canvas", figure); }});
  </script>
</body>
</html>
"#,
        title = title,
        script = encode_double_quoted_attribute(engine_script_url),
        width = size(settings.max_width),
        height = size(settings.max_height),
        figure = FIGURE_FILE,
    )
}

/// Write a publishable bundle of the client's current view into `dir`
pub fn save_html_bundle(
    client: &WwtClient,
    dir: impl AsRef<Path>,
    options: &BundleOptions,
) -> WwtResult<BundleResult> {
    let dir = dir.as_ref();
    let layers = client.layers();
    let data_dir = dir.join(layers.data_dir());
    fs::create_dir_all(&data_dir)?;

    let mut data_files = Vec::with_capacity(layers.len());
    for layer in layers {
        let path = data_dir.join(layer.data_file_name());
        layer.write_data_file(&path)?;
        data_files.push(path);
    }

    let settings = options.html_settings();
    let document = client.serialize(settings.clone());
    let figure_path = dir.join(FIGURE_FILE);
    fs::write(&figure_path, document.to_json()?)?;

    let index_path = dir.join("index.html");
    fs::write(&index_path, index_html(&settings, &client.config().export.engine_script_url))?;

    tracing::info!(
        "saved HTML bundle to {} ({} data file(s))",
        dir.display(),
        data_files.len()
    );
    Ok(BundleResult {
        figure_path,
        index_path,
        data_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_escapes_markup_in_title_and_script() {
        let settings = BundleOptions::new()
            .with_title("M31 & <M32> 'core'")
            .html_settings();
        let html = index_html(&settings, "engine.js?a=1&b=\"2\"");
        assert!(html.contains("<title>M31 &amp; &lt;M32&gt; "));
        assert!(!html.contains("'core'"));
        assert!(html.contains("<script src=\"engine.js?a=1&amp;b=&quot;2&quot;\"></script>"));
    }

    #[test]
    fn test_index_uses_title_and_size() {
        let settings = BundleOptions::new()
            .with_title("Crab \"Nebula\"")
            .with_max_size(800, 600)
            .html_settings();
        let html = index_html(&settings, "https://example.org/engine.js");
        assert!(html.contains("<title>Crab &quot;Nebula&quot;</title>"));
        assert!(html.contains("max-width: 800px; max-height: 600px;"));
        assert!(html.contains("fetch(\"wwt_figure.json\")"));
    }
}
