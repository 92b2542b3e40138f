//! Results persistence module

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use serde_json::to_string_pretty;

use crate::present::{FeedView, GraphSummary, GraphView, RecommendationView};

/// Everything exported for one user
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub summary: GraphSummary,
    pub view: GraphView,
    pub feed: FeedView,
    pub recommendations: RecommendationView,
}

/// Write `value` as pretty JSON to `dir/name`
pub fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut file = File::create(&path)?;
    file.write_all(to_string_pretty(value)?.as_bytes())?;
    log::debug!("Wrote {}", path.display());
    Ok(path)
}

/// Save export results to the specified directory
pub fn save_results<P: AsRef<Path>>(bundle: &ExportBundle, output_dir: P) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    log::info!("Saving results to {}", output_dir.display());

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;

    let written = vec![
        write_json(output_dir, "summary.json", &bundle.summary)?,
        write_json(output_dir, "graph_view.json", &bundle.view)?,
        write_json(output_dir, "feed.json", &bundle.feed)?,
        write_json(output_dir, "recommendations.json", &bundle.recommendations)?,
    ];

    log::info!("Results saved successfully");
    Ok(written)
}
