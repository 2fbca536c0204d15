pub mod bpm;
pub mod difficulty;
pub mod error;
pub mod fraction;
pub mod math;
pub mod notes;
pub mod overrides;
pub mod parse;
pub mod radar;
pub mod report;
pub mod simfile;
pub mod speed;
pub mod timing;

// Re-export the primary data structures for library users
pub use bpm::{BpmSegment, Stop};
pub use difficulty::{Difficulty, Mode};
pub use error::{ParseError, SimfileError};
pub use notes::{Arrow, Freeze};
pub use radar::{ChartMetrics, GrooveRadar, MetricsOptions};
pub use simfile::{ChartDetail, ChartModel, ChartType, open, parse};

use serde::Serialize;

/// Metrics of one chart of a song.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartAnalysis {
    pub chart_type: ChartType,
    pub metrics: ChartMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongAnalysis {
    pub model: ChartModel,
    pub charts: Vec<ChartAnalysis>,
}

/// Parses simfile text and computes metrics for every chart in it.
pub fn analyze(text: &str, options: &MetricsOptions) -> Result<SongAnalysis, SimfileError> {
    let model = parse(text)?;
    let charts = model
        .charts_with_types()
        .map(|(ty, chart)| ChartAnalysis {
            chart_type: ty.clone(),
            metrics: radar::compute_chart_metrics(chart, ty.mode, options),
        })
        .collect();
    Ok(SongAnalysis { model, charts })
}
