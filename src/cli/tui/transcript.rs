//! Mixed-content lines for the chat view.
//!
//! Markdown segments are rendered once per message and theme and shown
//! plain on the first frame; code highlighting is applied afterwards by
//! [`Transcript::highlight_pending`]. Chart segments are mounted into the
//! [`ChartView`] on every frame so that regions which disappear get swept.

use ratatui::text::{Line, Span};
use std::collections::HashMap;

use crate::core::config::Theme;
use crate::render::{
    render_lines, segment, ChartSpec, ChartStyle, ChartView, ContentSegment, RegionId,
    RenderedMarkdown,
};

pub const INDENT: &str = "    ";

enum Piece {
    Text(RenderedMarkdown),
    Chart {
        index: usize,
        spec: ChartSpec,
        /// Fence source, shown when the chart cannot be drawn
        fallback: RenderedMarkdown,
    },
}

impl Piece {
    fn rendered_mut(&mut self) -> &mut RenderedMarkdown {
        match self {
            Piece::Text(rendered) => rendered,
            Piece::Chart { fallback, .. } => fallback,
        }
    }
}

pub struct Transcript {
    theme: Theme,
    messages: HashMap<String, Vec<Piece>>,
    streaming: Option<(String, Vec<Piece>)>,
}

impl Transcript {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            messages: HashMap::new(),
            streaming: None,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if self.theme != theme {
            self.theme = theme;
            self.messages.clear();
            self.streaming = None;
        }
    }

    pub fn message_lines(
        &mut self,
        charts: &mut ChartView,
        id: &str,
        content: &str,
        width: u16,
    ) -> Vec<Line<'static>> {
        let theme = self.theme;
        let pieces = self
            .messages
            .entry(id.to_string())
            .or_insert_with(|| build_pieces(content, theme));
        assemble(pieces, charts, |i| RegionId::message(id, i), theme, width)
    }

    /// Lines for the in-flight reply. The whole buffer is segmented again
    /// whenever it changed since the last frame.
    pub fn streaming_lines(
        &mut self,
        charts: &mut ChartView,
        buffer: &str,
        width: u16,
    ) -> Vec<Line<'static>> {
        let theme = self.theme;
        if self.streaming.as_ref().is_some_and(|(seen, _)| seen != buffer) {
            self.streaming = None;
        }
        let (_, pieces) = self
            .streaming
            .get_or_insert_with(|| (buffer.to_string(), build_pieces(buffer, theme)));
        assemble(pieces, charts, RegionId::streaming, theme, width)
    }

    pub fn clear_streaming(&mut self) {
        self.streaming = None;
    }

    /// Highlight code blocks of everything built so far. Returns whether
    /// any visible lines changed.
    pub fn highlight_pending(&mut self) -> bool {
        let theme = self.theme;
        let mut changed = false;
        let pieces = self
            .messages
            .values_mut()
            .chain(self.streaming.as_mut().map(|(_, pieces)| pieces));
        for piece in pieces.flatten() {
            let rendered = piece.rendered_mut();
            if !rendered.is_highlighted() {
                rendered.highlight(theme);
                changed |= !rendered.code_blocks.is_empty();
            }
        }
        changed
    }
}

fn build_pieces(buffer: &str, theme: Theme) -> Vec<Piece> {
    let mut index = 0;
    segment(buffer)
        .into_iter()
        .map(|part| match part {
            ContentSegment::Markdown { text, .. } => Piece::Text(render_lines(&text, theme)),
            ContentSegment::Chart { spec, span } => {
                let piece = Piece::Chart {
                    index,
                    spec,
                    fallback: render_lines(&buffer[span], theme),
                };
                index += 1;
                piece
            }
        })
        .collect()
}

fn indented(line: &Line<'static>) -> Line<'static> {
    let mut spans = Vec::with_capacity(line.spans.len() + 1);
    spans.push(Span::raw(INDENT));
    spans.extend(line.spans.iter().cloned());
    Line::from(spans)
}

fn assemble(
    pieces: &[Piece],
    charts: &mut ChartView,
    region: impl Fn(usize) -> RegionId,
    theme: Theme,
    width: u16,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Text(text) => lines.extend(text.lines.iter().map(indented)),
            Piece::Chart {
                index,
                spec,
                fallback,
            } => {
                let style = ChartStyle::new(theme, spec.kind, width.saturating_sub(INDENT.len() as u16));
                match charts.mount(region(*index), spec, &style) {
                    Ok(drawn) => lines.extend(drawn.iter().map(indented)),
                    Err(_) => lines.extend(fallback.lines.iter().map(indented)),
                }
                lines.push(Line::default());
            }
        }
    }
    lines
}
