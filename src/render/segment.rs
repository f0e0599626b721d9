//! Splits a message buffer into markdown prose and embedded chart directives.
//!
//! Charts are fenced code blocks tagged `json:chart` whose body is a JSON
//! object `{"type": kind, "data": series, "options": overrides}`. The split
//! is recomputed from the whole buffer on every call; a fence that has not
//! been closed yet (mid-stream) never matches and stays plain markdown.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::LazyLock;

use crate::core::error::ChartParseError;

/// Language tag that marks a fenced block as a chart directive.
pub const CHART_FENCE_TAG: &str = "json:chart";

static CHART_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?s)```{}\n(.*?)\n```", regex::escape(CHART_FENCE_TAG));
    Regex::new(&pattern).expect("chart fence pattern is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Line,
    #[default]
    Bar,
    Pie,
    Doughnut,
    Radar,
    PolarArea,
}

impl ChartKind {
    /// Kinds drawn against x/y axes.
    pub fn has_axes(self) -> bool {
        matches!(self, ChartKind::Line | ChartKind::Bar)
    }

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::Radar => "radar",
            ChartKind::PolarArea => "polarArea",
        }
    }
}

/// A typed chart directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type", default)]
    pub kind: ChartKind,
    #[serde(rename = "data")]
    pub series: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl ChartSpec {
    pub fn parse(body: &str) -> Result<Self, ChartParseError> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| ChartParseError::Json(e.to_string()))?;
        if value.get("data").is_none() {
            return Err(ChartParseError::MissingData);
        }
        serde_json::from_value(value).map_err(|e| ChartParseError::Json(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentSegment {
    /// Prose, passed verbatim to the markdown renderer
    Markdown { text: String, span: Range<usize> },
    /// A parsed chart fence; `span` covers the whole fence
    Chart { spec: ChartSpec, span: Range<usize> },
}

impl ContentSegment {
    /// Byte range of this segment's source text in the buffer.
    pub fn span(&self) -> Range<usize> {
        match self {
            ContentSegment::Markdown { span, .. } | ContentSegment::Chart { span, .. } => {
                span.clone()
            }
        }
    }

    pub fn is_chart(&self) -> bool {
        matches!(self, ContentSegment::Chart { .. })
    }

    fn markdown(buffer: &str, span: Range<usize>) -> Self {
        ContentSegment::Markdown {
            text: buffer[span.clone()].to_string(),
            span,
        }
    }
}

/// Segment `buffer` into markdown and chart pieces, in order.
pub fn segment(buffer: &str) -> Vec<ContentSegment> {
    let mut segments = Vec::new();
    let mut last_end = 0;

    for caps in CHART_FENCE.captures_iter(buffer) {
        let (Some(fence), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        if fence.start() > last_end {
            segments.push(ContentSegment::markdown(buffer, last_end..fence.start()));
        }

        match ChartSpec::parse(body.as_str()) {
            Ok(spec) => segments.push(ContentSegment::Chart {
                spec,
                span: fence.range(),
            }),
            Err(e) => {
                tracing::debug!(error = %e, "chart fence kept as markdown");
                segments.push(ContentSegment::markdown(buffer, fence.range()));
            }
        }

        last_end = fence.end();
    }

    if last_end < buffer.len() {
        segments.push(ContentSegment::markdown(buffer, last_end..buffer.len()));
    }

    if segments.is_empty() {
        segments.push(ContentSegment::markdown(buffer, 0..buffer.len()));
    }
    segments
}
