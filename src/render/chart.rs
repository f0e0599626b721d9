//! Chart regions and the backend that draws them.
//!
//! A [`ChartView`] owns at most one live [`ChartHandle`] per [`RegionId`].
//! When the directive mounted into a region changes identity the old handle
//! is destroyed before the backend is asked for a new one, and regions that
//! were not mounted during a frame are destroyed at the end of it.

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::segment::{ChartKind, ChartSpec};
use crate::core::config::Theme;
use crate::core::error::ChartRenderError;

/// Where a chart lives: a message (or the streaming slot) and the index of
/// the chart segment within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionId {
    pub owner: RegionOwner,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegionOwner {
    Message(String),
    Streaming,
}

impl RegionId {
    pub fn message(id: impl Into<String>, index: usize) -> Self {
        Self {
            owner: RegionOwner::Message(id.into()),
            index,
        }
    }

    pub fn streaming(index: usize) -> Self {
        Self {
            owner: RegionOwner::Streaming,
            index,
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            RegionOwner::Message(id) => write!(f, "{id}#{}", self.index),
            RegionOwner::Streaming => write!(f, "streaming#{}", self.index),
        }
    }
}

/// Drawing style resolved from the theme when a chart is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartStyle {
    pub theme: Theme,
    pub grid: Color,
    pub label: Color,
    /// Axis scales; only line and bar charts get them
    pub axes: bool,
    pub width: u16,
}

impl ChartStyle {
    pub fn new(theme: Theme, kind: ChartKind, width: u16) -> Self {
        let (grid, label) = match theme {
            // rgba(255,255,255,0.1) over the dark surface, #a1a1aa
            Theme::Dark => (Color::Rgb(45, 45, 60), Color::Rgb(161, 161, 170)),
            // rgba(0,0,0,0.1) over the light surface, #71717a
            Theme::Light => (Color::Rgb(212, 212, 220), Color::Rgb(113, 113, 122)),
        };
        Self {
            theme,
            grid,
            label,
            axes: kind.has_axes(),
            width: width.max(MIN_WIDTH),
        }
    }
}

/// A drawn chart. Must be destroyed before it is dropped or replaced.
pub trait ChartHandle: Send {
    fn lines(&self) -> &[Line<'static>];
    fn destroy(&mut self);
}

/// Something that can draw a chart directive into a region.
pub trait ChartBackend: Send {
    fn render(
        &self,
        region: &RegionId,
        spec: &ChartSpec,
        style: &ChartStyle,
    ) -> Result<Box<dyn ChartHandle>, ChartRenderError>;
}

struct Mounted {
    identity: u64,
    state: Result<Box<dyn ChartHandle>, ChartRenderError>,
}

impl Mounted {
    fn release(&mut self) {
        if let Ok(handle) = &mut self.state {
            handle.destroy();
        }
    }
}

pub struct ChartView {
    backend: Box<dyn ChartBackend>,
    live: HashMap<RegionId, Mounted>,
    seen: HashSet<RegionId>,
}

impl ChartView {
    pub fn new(backend: Box<dyn ChartBackend>) -> Self {
        Self {
            backend,
            live: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Mount `spec` into `region` and return its drawn lines. A failure is
    /// remembered for the same identity so it is reported once; callers
    /// show the directive source instead.
    pub fn mount(
        &mut self,
        region: RegionId,
        spec: &ChartSpec,
        style: &ChartStyle,
    ) -> Result<&[Line<'static>], ChartRenderError> {
        let identity = identity(spec, style);
        self.seen.insert(region.clone());

        let mounted = match self.live.entry(region) {
            Entry::Occupied(entry) if entry.get().identity == identity => entry.into_mut(),
            Entry::Occupied(mut entry) => {
                entry.get_mut().release();
                let state = draw(self.backend.as_ref(), entry.key(), spec, style);
                *entry.get_mut() = Mounted { identity, state };
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                let state = draw(self.backend.as_ref(), entry.key(), spec, style);
                entry.insert(Mounted { identity, state })
            }
        };

        match &mounted.state {
            Ok(handle) => Ok(handle.lines()),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn begin_frame(&mut self) {
        self.seen.clear();
    }

    /// Destroy every region that was not mounted since [`begin_frame`].
    ///
    /// [`begin_frame`]: ChartView::begin_frame
    pub fn end_frame(&mut self) {
        let seen = &self.seen;
        self.live.retain(|region, mounted| {
            if seen.contains(region) {
                return true;
            }
            tracing::debug!(region = %region, "chart region unmounted");
            mounted.release();
            false
        });
    }

    pub fn clear(&mut self) {
        for mounted in self.live.values_mut() {
            mounted.release();
        }
        self.live.clear();
        self.seen.clear();
    }

    /// Number of regions holding a drawn chart.
    pub fn live_handles(&self) -> usize {
        self.live.values().filter(|m| m.state.is_ok()).count()
    }
}

impl Drop for ChartView {
    fn drop(&mut self) {
        self.clear();
    }
}

fn draw(
    backend: &dyn ChartBackend,
    region: &RegionId,
    spec: &ChartSpec,
    style: &ChartStyle,
) -> Result<Box<dyn ChartHandle>, ChartRenderError> {
    let result = backend.render(region, spec, style);
    match &result {
        Ok(_) => tracing::debug!(region = %region, kind = spec.kind.label(), "chart drawn"),
        Err(e) => tracing::warn!(region = %region, error = %e, "chart failed to draw, showing source"),
    }
    result
}

/// Directive identity: kind, series, options and the style drawn with.
fn identity(spec: &ChartSpec, style: &ChartStyle) -> u64 {
    let mut hasher = DefaultHasher::new();
    spec.kind.hash(&mut hasher);
    spec.series.to_string().hash(&mut hasher);
    spec.options.as_ref().map(|o| o.to_string()).hash(&mut hasher);
    style.theme.is_dark().hash(&mut hasher);
    style.width.hash(&mut hasher);
    hasher.finish()
}

// ─── Terminal backend ────────────────────────────────

const MIN_WIDTH: u16 = 24;
const PLOT_HEIGHT: usize = 8;
const MAX_LABEL_WIDTH: usize = 12;

const SERIES_COLORS: [Color; 6] = [
    Color::Rgb(140, 80, 255),
    Color::Rgb(80, 200, 120),
    Color::Rgb(100, 160, 255),
    Color::Rgb(230, 190, 60),
    Color::Rgb(230, 80, 80),
    Color::Rgb(80, 200, 200),
];

fn series_color(i: usize) -> Color {
    SERIES_COLORS[i % SERIES_COLORS.len()]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub values: Vec<f64>,
}

/// Chart.js-shaped data: `{"labels": [...], "datasets": [{"label", "data"}]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl Series {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ChartRenderError> {
        let datasets = value
            .get("datasets")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ChartRenderError::Series("expected a `datasets` array".into()))?;

        let datasets = datasets
            .iter()
            .enumerate()
            .map(|(i, ds)| {
                let label = ds
                    .get("label")
                    .and_then(|l| l.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Series {}", i + 1));
                let data = ds.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
                    ChartRenderError::Series(format!("dataset {} has no `data` array", i + 1))
                })?;
                let values = data
                    .iter()
                    .map(point_value)
                    .collect::<Option<Vec<f64>>>()
                    .ok_or_else(|| {
                        ChartRenderError::Series(format!("dataset {} has a non-numeric value", i + 1))
                    })?;
                Ok(Dataset { label, values })
            })
            .collect::<Result<Vec<_>, ChartRenderError>>()?;

        let points = datasets.iter().map(|d| d.values.len()).max().unwrap_or(0);
        if points == 0 {
            return Err(ChartRenderError::Empty);
        }

        let mut labels: Vec<String> = value
            .get("labels")
            .and_then(|l| l.as_array())
            .map(|l| l.iter().map(display_label).collect())
            .unwrap_or_default();
        while labels.len() < points {
            labels.push((labels.len() + 1).to_string());
        }
        labels.truncate(points);

        Ok(Self { labels, datasets })
    }

    fn max(&self) -> f64 {
        self.datasets
            .iter()
            .flat_map(|d| d.values.iter().copied())
            .fold(f64::MIN, f64::max)
    }

    fn min(&self) -> f64 {
        self.datasets
            .iter()
            .flat_map(|d| d.values.iter().copied())
            .fold(f64::MAX, f64::min)
    }
}

fn point_value(point: &serde_json::Value) -> Option<f64> {
    match point {
        serde_json::Value::Null => Some(0.0),
        serde_json::Value::Object(map) => map.get("y").and_then(|y| y.as_f64()),
        other => other.as_f64(),
    }
}

fn display_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn fmt_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{v:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn fit(label: &str, width: usize) -> String {
    let count = label.chars().count();
    if count > width {
        let mut s: String = label.chars().take(width.saturating_sub(1)).collect();
        s.push('\u{2026}');
        s
    } else {
        format!("{label}{}", " ".repeat(width - count))
    }
}

fn title_of(spec: &ChartSpec) -> Option<String> {
    let options = spec.options.as_ref()?;
    options
        .pointer("/plugins/title/text")
        .or_else(|| options.pointer("/title/text"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
}

/// Draws charts as styled text lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalChartBackend;

impl TerminalChartBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ChartBackend for TerminalChartBackend {
    fn render(
        &self,
        _region: &RegionId,
        spec: &ChartSpec,
        style: &ChartStyle,
    ) -> Result<Box<dyn ChartHandle>, ChartRenderError> {
        let series = Series::from_value(&spec.series)?;
        let label_style = Style::default().fg(style.label);

        let mut lines = Vec::new();
        let heading = title_of(spec).unwrap_or_else(|| format!("{} chart", spec.kind.label()));
        lines.push(Line::from(Span::styled(heading, label_style)));

        let body = match spec.kind {
            ChartKind::Bar => bar_lines(&series, style),
            ChartKind::Line => line_plot(&series, style),
            ChartKind::Pie | ChartKind::Doughnut | ChartKind::PolarArea => share_lines(&series, style)?,
            ChartKind::Radar => radar_lines(&series, style),
        };
        lines.extend(body);

        if series.datasets.len() > 1 || spec.kind.has_axes() {
            let mut legend = Vec::new();
            for (i, ds) in series.datasets.iter().enumerate() {
                legend.push(Span::styled("\u{25A0} ", Style::default().fg(series_color(i))));
                legend.push(Span::styled(format!("{}  ", ds.label), label_style));
            }
            lines.push(Line::from(legend));
        }

        Ok(Box::new(TextChart { lines }))
    }
}

struct TextChart {
    lines: Vec<Line<'static>>,
}

impl ChartHandle for TextChart {
    fn lines(&self) -> &[Line<'static>] {
        &self.lines
    }

    fn destroy(&mut self) {
        self.lines.clear();
    }
}

fn label_width(series: &Series) -> usize {
    series
        .labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(1)
        .clamp(1, MAX_LABEL_WIDTH)
}

fn bar_lines(series: &Series, style: &ChartStyle) -> Vec<Line<'static>> {
    let label_w = label_width(series);
    let bar_w = (style.width as usize).saturating_sub(label_w + 10).max(8);
    let max = series.max().max(0.0);
    let scale = if max > 0.0 { max } else { 1.0 };
    let grid = Style::default().fg(style.grid);
    let label_style = Style::default().fg(style.label);

    let mut lines = Vec::new();
    for (i, label) in series.labels.iter().enumerate() {
        for (j, ds) in series.datasets.iter().enumerate() {
            let value = ds.values.get(i).copied().unwrap_or(0.0);
            let len = ((value.max(0.0) / scale) * bar_w as f64).round() as usize;
            let name = if j == 0 { fit(label, label_w) } else { " ".repeat(label_w) };
            lines.push(Line::from(vec![
                Span::styled(name, label_style),
                Span::styled(" \u{2502}", grid),
                Span::styled("\u{2588}".repeat(len), Style::default().fg(series_color(j))),
                Span::styled(format!(" {}", fmt_value(value)), label_style),
            ]));
        }
    }

    if style.axes {
        lines.push(Line::from(Span::styled(
            format!("{} \u{2514}{}", " ".repeat(label_w), "\u{2500}".repeat(bar_w)),
            grid,
        )));
        let max_label = fmt_value(max);
        let pad = bar_w.saturating_sub(max_label.chars().count());
        lines.push(Line::from(Span::styled(
            format!("{}  0{}{max_label}", " ".repeat(label_w), " ".repeat(pad.saturating_sub(1))),
            label_style,
        )));
    }
    lines
}

fn line_plot(series: &Series, style: &ChartStyle) -> Vec<Line<'static>> {
    let points = series.labels.len();
    let axis_w = 7;
    let plot_w = (style.width as usize).saturating_sub(axis_w + 1).max(points);
    let col_w = (plot_w / points).max(1);
    let cols = col_w * points;

    let max = series.max();
    let min = series.min().min(0.0);
    let range = if max > min { max - min } else { 1.0 };

    let mut cells: Vec<Vec<Option<usize>>> = vec![vec![None; cols]; PLOT_HEIGHT];
    for (j, ds) in series.datasets.iter().enumerate() {
        for (i, value) in ds.values.iter().enumerate().take(points) {
            let level = (((value - min) / range) * (PLOT_HEIGHT - 1) as f64).round() as usize;
            let row = PLOT_HEIGHT - 1 - level.min(PLOT_HEIGHT - 1);
            cells[row][i * col_w + col_w / 2] = Some(j);
        }
    }

    let grid = Style::default().fg(style.grid);
    let label_style = Style::default().fg(style.label);
    let mut lines = Vec::new();
    for (r, row) in cells.iter().enumerate() {
        let tick = match r {
            0 => fmt_value(max),
            r if r == PLOT_HEIGHT - 1 => fmt_value(min),
            _ => String::new(),
        };
        let mut spans = vec![
            Span::styled(format!("{:>w$}", tick, w = axis_w - 1), label_style),
            Span::styled(" \u{2524}", grid),
        ];
        for cell in row {
            spans.push(match cell {
                Some(j) => Span::styled("\u{25CF}", Style::default().fg(series_color(*j))),
                None => Span::raw(" "),
            });
        }
        lines.push(Line::from(spans));
    }

    if style.axes {
        lines.push(Line::from(Span::styled(
            format!("{} \u{2514}{}", " ".repeat(axis_w - 1), "\u{2500}".repeat(cols)),
            grid,
        )));
        let x_labels: String = series
            .labels
            .iter()
            .map(|l| fit(l, col_w))
            .collect();
        lines.push(Line::from(Span::styled(
            format!("{}  {x_labels}", " ".repeat(axis_w - 1)),
            label_style,
        )));
    }
    lines
}

fn share_lines(series: &Series, style: &ChartStyle) -> Result<Vec<Line<'static>>, ChartRenderError> {
    let values = &series.datasets[0].values;
    let total: f64 = values.iter().map(|v| v.max(0.0)).sum();
    if total <= 0.0 {
        return Err(ChartRenderError::Empty);
    }

    let label_w = label_width(series);
    let bar_w = (style.width as usize).saturating_sub(label_w + 10).max(8);
    let label_style = Style::default().fg(style.label);

    Ok(series
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let share = values.get(i).copied().unwrap_or(0.0).max(0.0) / total;
            let filled = (share * bar_w as f64).round() as usize;
            Line::from(vec![
                Span::styled(format!("{} ", fit(label, label_w)), label_style),
                Span::styled("\u{2588}".repeat(filled), Style::default().fg(series_color(i))),
                Span::styled(
                    "\u{2591}".repeat(bar_w.saturating_sub(filled)),
                    Style::default().fg(style.grid),
                ),
                Span::styled(format!(" {:5.1}%", share * 100.0), label_style),
            ])
        })
        .collect())
}

fn radar_lines(series: &Series, style: &ChartStyle) -> Vec<Line<'static>> {
    let label_w = label_width(series);
    let bar_w = (style.width as usize).saturating_sub(label_w + 10).max(8);
    let scale = series.max().max(1e-9);
    let label_style = Style::default().fg(style.label);

    let mut lines = Vec::new();
    for (i, axis) in series.labels.iter().enumerate() {
        for (j, ds) in series.datasets.iter().enumerate() {
            let value = ds.values.get(i).copied().unwrap_or(0.0);
            let len = ((value.max(0.0) / scale) * bar_w as f64).round() as usize;
            let name = if j == 0 { fit(axis, label_w) } else { " ".repeat(label_w) };
            lines.push(Line::from(vec![
                Span::styled(format!("{name} \u{258F}"), label_style),
                Span::styled("\u{2588}".repeat(len), Style::default().fg(series_color(j))),
                Span::styled(format!(" {}", fmt_value(value)), label_style),
            ]));
        }
    }
    lines
}
