//! Chart decision and rendering for a result set.
//!
//! Every failure here degrades to "no chart"; nothing is propagated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use askdata_charts::{ChartRenderer, ChartTopic, TopicClassifier, chart_file_name};
use askdata_shared::ResultSet;

/// A chart worth drawing: a topic and the scalar to plot.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub topic: ChartTopic,
    pub value: f64,
}

/// Rendered chart bytes and, when persisted, where the copy lives.
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    pub image: Vec<u8>,
    pub reference: Option<PathBuf>,
}

/// Decide whether `result` gets a chart.
///
/// Only the cell at row 0, column 0 is considered; an empty result or a
/// non-numeric scalar yields `None`.
pub fn select_chart(
    classifier: &TopicClassifier,
    question: &str,
    result: &ResultSet,
) -> Option<ChartRequest> {
    let value = result.first_scalar()?.as_f64()?;
    if !value.is_finite() {
        return None;
    }
    Some(ChartRequest {
        topic: classifier.classify(question),
        value,
    })
}

/// Render the chart on the blocking pool and optionally persist a copy.
#[instrument(skip_all, fields(label = %request.topic.label, value = request.value))]
pub async fn render_chart(
    renderer: Arc<dyn ChartRenderer>,
    request: &ChartRequest,
    output_dir: Option<&Path>,
) -> Option<ChartArtifact> {
    let ChartTopic { label, title } = request.topic.clone();
    let value = request.value;
    let file_label = label.clone();

    let rendered =
        tokio::task::spawn_blocking(move || renderer.render(&label, value, &title)).await;

    let image = match rendered {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!(error = %e, "chart rendering failed");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "chart renderer panicked");
            return None;
        }
    };

    let reference = match output_dir {
        Some(dir) => persist(dir, &file_label, &image).await,
        None => None,
    };

    debug!(bytes = image.len(), persisted = reference.is_some(), "chart ready");
    Some(ChartArtifact { image, reference })
}

async fn persist(dir: &Path, label: &str, image: &[u8]) -> Option<PathBuf> {
    let path = dir.join(chart_file_name(label, Local::now()));
    match tokio::fs::write(&path, image).await {
        Ok(()) => {
            info!(path = %path.display(), "chart saved");
            Some(path)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to save chart");
            None
        }
    }
}
