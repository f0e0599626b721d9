//! Markdown rendering for the transcript and the HTML export.
//!
//! Both renderers sanitize first and highlight second: raw HTML is shown as
//! text, dangerous link schemes are neutralised and terminal control
//! characters are dropped. Code highlighting is a separate pass over the
//! already rendered output.

use linkify::{LinkFinder, LinkKind};
use pulldown_cmark::{
    html, CodeBlockKind, CowStr, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd,
    TextMergeStream,
};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme as SyntaxTheme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use super::segment::{segment, ChartSpec, ContentSegment};
use super::Palette;
use crate::core::config::Theme;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

static HTML_CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<pre><code class="language-([^"]+)">(.*?)</code></pre>"#)
        .expect("code block pattern is valid")
});

static LINK_FINDER: LazyLock<LinkFinder> = LazyLock::new(|| {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]).url_must_have_scheme(false);
    finder
});

const BLOCKED_SCHEMES: &[&str] = &["javascript:", "vbscript:", "file:", "data:"];

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Parse with bare `http(s)://` and `www.` text turned into links.
fn parse(text: &str) -> impl Iterator<Item = Event<'_>> {
    let mut autolinker = Autolinker::default();
    TextMergeStream::new(Parser::new_ext(text, markdown_options()))
        .flat_map(move |event| autolinker.expand(event))
}

#[derive(Default)]
struct Autolinker {
    /// Nesting of links, images and code blocks; their text is left alone
    depth: usize,
}

impl Autolinker {
    fn expand<'a>(&mut self, event: Event<'a>) -> Vec<Event<'a>> {
        match &event {
            Event::Start(Tag::Link { .. } | Tag::Image { .. } | Tag::CodeBlock(_)) => self.depth += 1,
            Event::End(TagEnd::Link | TagEnd::Image | TagEnd::CodeBlock) => {
                self.depth = self.depth.saturating_sub(1)
            }
            Event::Text(text) if self.depth == 0 => return linkify_text(text),
            _ => {}
        }
        vec![event]
    }
}

fn linkify_text<'a>(text: &str) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut plain = String::new();
    for span in LINK_FINDER.spans(text) {
        let Some(dest) = span.kind().and_then(|_| autolink_target(span.as_str())) else {
            plain.push_str(span.as_str());
            continue;
        };
        if !plain.is_empty() {
            events.push(Event::Text(std::mem::take(&mut plain).into()));
        }
        events.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: dest.into(),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        events.push(Event::Text(span.as_str().to_string().into()));
        events.push(Event::End(TagEnd::Link));
    }
    if !plain.is_empty() || events.is_empty() {
        events.push(Event::Text(plain.into()));
    }
    events
}

/// GFM extended autolinks: explicit http(s) URLs, and `www.` hosts
/// which get an `http://` target.
fn autolink_target(found: &str) -> Option<String> {
    let lower = found.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        Some(found.to_string())
    } else if lower.starts_with("www.") {
        Some(format!("http://{found}"))
    } else {
        None
    }
}

fn syntax_for(lang: &str) -> Option<&'static SyntaxReference> {
    // "json:chart" and friends highlight as their base language
    let token = lang.split([':', ' ', ',']).next().unwrap_or(lang);
    if token.is_empty() {
        return None;
    }
    SYNTAX_SET.find_syntax_by_token(token)
}

fn syntax_theme(theme: Theme) -> Option<&'static SyntaxTheme> {
    let name = match theme {
        Theme::Dark => "base16-ocean.dark",
        Theme::Light => "InspiredGitHub",
    };
    THEME_SET.themes.get(name)
}

// ─── HTML ────────────────────────────────────────────

/// HTML produced by [`render_markdown`]; never contains raw HTML from the
/// input or executable link targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedHtml(String);

impl SanitizedHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Render commonmark + GFM tables, strikethrough, task lists and bare URL
/// autolinks to HTML.
/// Single newlines are significant and become `<br />`.
pub fn render_markdown(text: &str) -> SanitizedHtml {
    let parser = parse(text).map(sanitize_event);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    SanitizedHtml(out)
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::SoftBreak => Event::HardBreak,
        // Shown literally; push_html escapes Text
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: clean_url(dest_url, false),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: clean_url(dest_url, true),
            title,
            id,
        }),
        other => other,
    }
}

fn clean_url(url: CowStr<'_>, image: bool) -> CowStr<'_> {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if image && normalized.starts_with("data:image/") {
        return url;
    }
    if BLOCKED_SCHEMES.iter().any(|s| normalized.starts_with(s)) {
        tracing::debug!(url = %url, "neutralised link target");
        return CowStr::Borrowed("#");
    }
    url
}

/// Highlight fenced code blocks of an already sanitized HTML document.
/// Blocks in unknown languages are left untouched.
pub fn highlight_code_blocks(html: &str, theme: Theme) -> String {
    let Some(syntax_theme) = syntax_theme(theme) else {
        return html.to_string();
    };

    HTML_CODE_BLOCK
        .replace_all(html, |caps: &regex::Captures| {
            let original = caps[0].to_string();
            let Some(syntax) = syntax_for(&caps[1]) else {
                return original;
            };
            let code = unescape_html(&caps[2]);
            highlighted_html_for_string(&code, &SYNTAX_SET, syntax, syntax_theme)
                .unwrap_or(original)
        })
        .into_owned()
}

/// Render a whole message to an HTML fragment: markdown segments through
/// [`render_markdown`], chart segments as a `<figure>` carrying the
/// directive, then highlighting over the assembled document.
pub fn render_document(buffer: &str, theme: Theme) -> String {
    let parts = segment(buffer);
    tracing::debug!(
        segments = parts.len(),
        charts = parts.iter().filter(|p| p.is_chart()).count(),
        "rendering document"
    );
    let mut body = String::new();
    for part in parts {
        match part {
            ContentSegment::Markdown { text, .. } => {
                body.push_str("<div class=\"markdown-body\">\n");
                body.push_str(render_markdown(&text).as_str());
                body.push_str("</div>\n");
            }
            ContentSegment::Chart { spec, .. } => body.push_str(&chart_figure(&spec)),
        }
    }
    highlight_code_blocks(&body, theme)
}

fn chart_figure(spec: &ChartSpec) -> String {
    let json = serde_json::to_string_pretty(spec).unwrap_or_default();
    format!(
        "<figure class=\"chart\" data-kind=\"{}\">\n<pre class=\"chart-spec\">{}</pre>\n</figure>\n",
        spec.kind.label(),
        escape_html(&json)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

// ─── Terminal ────────────────────────────────────────

/// A fenced code block inside [`RenderedMarkdown::lines`].
#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub lang: Option<String>,
    /// Indices of the body lines (frame lines excluded)
    pub body: Range<usize>,
    pub source: String,
}

/// Terminal rendition of a markdown segment.
#[derive(Debug, Clone)]
pub struct RenderedMarkdown {
    pub lines: Vec<Line<'static>>,
    pub code_blocks: Vec<CodeBlock>,
    palette: Palette,
    highlighted: bool,
}

impl RenderedMarkdown {
    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    /// Replace plain code block lines with syntax-highlighted ones.
    pub fn highlight(&mut self, theme: Theme) {
        if self.highlighted {
            return;
        }
        self.highlighted = true;
        let Some(syntax_theme) = syntax_theme(theme) else {
            return;
        };

        for block in &self.code_blocks {
            let Some(syntax) = block.lang.as_deref().and_then(syntax_for) else {
                continue;
            };
            let mut highlighter = HighlightLines::new(syntax, syntax_theme);
            for (offset, line) in LinesWithEndings::from(&block.source).enumerate() {
                let idx = block.body.start + offset;
                if idx >= block.body.end {
                    break;
                }
                let Ok(ranges) = highlighter.highlight_line(line, &SYNTAX_SET) else {
                    break;
                };
                let mut spans = vec![Span::styled("\u{2502} ", Style::default().fg(self.palette.dim))];
                spans.extend(ranges.into_iter().map(|(style, text)| {
                    let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
                    Span::styled(
                        sanitize_text(text.trim_end_matches('\n')),
                        Style::default().fg(fg).bg(self.palette.code_bg),
                    )
                }));
                self.lines[idx] = Line::from(spans);
            }
        }
    }
}

/// Render markdown to terminal lines. Code blocks come out plain; call
/// [`RenderedMarkdown::highlight`] once the lines are placed.
pub fn render_lines(text: &str, theme: Theme) -> RenderedMarkdown {
    let mut builder = LineBuilder::new(Palette::for_theme(theme));
    for event in parse(text) {
        builder.event(event);
    }
    builder.finish()
}

/// Drop control characters so model output cannot drive the terminal.
pub fn sanitize_text(s: &str) -> String {
    s.chars()
        .filter_map(|c| match c {
            '\t' => Some("    ".to_string()),
            c if c.is_control() => None,
            c => Some(c.to_string()),
        })
        .collect()
}

#[derive(Debug)]
enum Open {
    Paragraph,
    Heading(HeadingLevel),
    BlockQuote,
    CodeBlock,
    List,
    Item,
    Emphasis,
    Strong,
    Strikethrough,
    Link,
    Image,
    Table,
    TableHead,
    TableRow,
    TableCell,
    Other,
}

struct CodeState {
    lang: Option<String>,
    source: String,
}

struct LineBuilder {
    palette: Palette,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    stack: Vec<Open>,
    /// Next ordinal per open list; `None` for bullet lists
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    code: Option<CodeState>,
    code_blocks: Vec<CodeBlock>,
    table_rows: Vec<Vec<String>>,
    header_rows: usize,
}

impl LineBuilder {
    fn new(palette: Palette) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            spans: Vec::new(),
            stack: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            code: None,
            code_blocks: Vec::new(),
            table_rows: Vec::new(),
            header_rows: 0,
        }
    }

    fn has(&self, pred: impl Fn(&Open) -> bool) -> bool {
        self.stack.iter().any(pred)
    }

    fn inline_style(&self) -> Style {
        let p = &self.palette;
        let mut style = Style::default().fg(p.text);
        for open in &self.stack {
            style = match open {
                Open::Heading(HeadingLevel::H1) => {
                    style.fg(p.h1).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
                }
                Open::Heading(_) => style.fg(p.h2).add_modifier(Modifier::BOLD),
                Open::Strong => style.fg(p.bold).add_modifier(Modifier::BOLD),
                Open::Emphasis => style.add_modifier(Modifier::ITALIC),
                Open::Strikethrough => style.add_modifier(Modifier::CROSSED_OUT),
                Open::Link | Open::Image => style.fg(p.link).add_modifier(Modifier::UNDERLINED),
                Open::BlockQuote => style.fg(p.dim),
                _ => style,
            };
        }
        style
    }

    fn prefix(&self) -> Vec<Span<'static>> {
        let mut prefix = Vec::new();
        if self.quote_depth > 0 {
            prefix.push(Span::styled(
                "\u{258E} ".repeat(self.quote_depth),
                Style::default().fg(self.palette.accent),
            ));
        }
        prefix
    }

    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = self.prefix();
        spans.append(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|l| l.spans.is_empty()) || self.lines.is_empty() {
            return;
        }
        self.lines.push(Line::default());
    }

    fn push_text(&mut self, text: &str, style: Style) {
        let mut parts = text.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                self.spans.push(Span::styled(sanitize_text(part), style));
            }
            if parts.peek().is_some() {
                self.flush();
            }
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => {
                if let Some(open) = self.stack.pop() {
                    self.end(open);
                }
            }
            Event::Text(text) => {
                if let Some(code) = &mut self.code {
                    code.source.push_str(&text);
                } else if self.has(|o| matches!(o, Open::TableCell)) {
                    if let Some(cell) = self.table_rows.last_mut().and_then(|r| r.last_mut()) {
                        cell.push_str(&sanitize_text(&text));
                    }
                } else {
                    let style = self.inline_style();
                    self.push_text(&text, style);
                }
            }
            Event::Code(code) => {
                if let Some(cell) = self
                    .has(|o| matches!(o, Open::TableCell))
                    .then(|| self.table_rows.last_mut().and_then(|r| r.last_mut()))
                    .flatten()
                {
                    cell.push_str(&sanitize_text(&code));
                    return;
                }
                self.spans.push(Span::styled(
                    format!(" {} ", sanitize_text(&code)),
                    Style::default()
                        .fg(self.palette.inline_code_fg)
                        .bg(self.palette.inline_code_bg),
                ));
            }
            Event::Html(raw) | Event::InlineHtml(raw) => {
                let style = Style::default().fg(self.palette.dim);
                self.push_text(&raw, style);
            }
            Event::SoftBreak | Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "\u{2500}".repeat(24),
                    Style::default().fg(self.palette.dim),
                )));
                self.blank();
            }
            Event::TaskListMarker(checked) => {
                let mark = if checked { "[x] " } else { "[ ] " };
                self.spans
                    .push(Span::styled(mark, Style::default().fg(self.palette.bullet)));
            }
            Event::FootnoteReference(name) => {
                self.spans.push(Span::styled(
                    format!("[{}]", sanitize_text(&name)),
                    Style::default().fg(self.palette.dim),
                ));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let open = match tag {
            Tag::Paragraph => Open::Paragraph,
            Tag::Heading { level, .. } => {
                self.flush();
                self.blank();
                Open::Heading(level)
            }
            Tag::BlockQuote(..) => {
                self.flush();
                self.quote_depth += 1;
                Open::BlockQuote
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) if !info.trim().is_empty() => {
                        Some(sanitize_text(info.trim()))
                    }
                    _ => None,
                };
                let label = lang.clone().unwrap_or_else(|| "code".to_string());
                self.lines.push(Line::from(Span::styled(
                    format!("\u{250C}\u{2500}\u{2500} {label} \u{2500}\u{2500}"),
                    Style::default().fg(self.palette.dim),
                )));
                self.code = Some(CodeState {
                    lang,
                    source: String::new(),
                });
                Open::CodeBlock
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
                Open::List
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let m = format!("{n}. ");
                        *n += 1;
                        m
                    }
                    _ => "\u{2022} ".to_string(),
                };
                self.spans.push(Span::styled(
                    format!("{}{marker}", "  ".repeat(depth)),
                    Style::default().fg(self.palette.bullet),
                ));
                Open::Item
            }
            Tag::Emphasis => Open::Emphasis,
            Tag::Strong => Open::Strong,
            Tag::Strikethrough => Open::Strikethrough,
            Tag::Link { .. } => Open::Link,
            Tag::Image { .. } => {
                self.spans
                    .push(Span::styled("[image] ", Style::default().fg(self.palette.dim)));
                Open::Image
            }
            Tag::Table(_) => {
                self.flush();
                self.table_rows.clear();
                self.header_rows = 0;
                Open::Table
            }
            Tag::TableHead => {
                self.table_rows.push(Vec::new());
                Open::TableHead
            }
            Tag::TableRow => {
                self.table_rows.push(Vec::new());
                Open::TableRow
            }
            Tag::TableCell => {
                if let Some(row) = self.table_rows.last_mut() {
                    row.push(String::new());
                }
                Open::TableCell
            }
            _ => Open::Other,
        };
        self.stack.push(open);
    }

    fn end(&mut self, open: Open) {
        match open {
            Open::Paragraph => {
                self.flush();
                if !self.has(|o| matches!(o, Open::Item)) {
                    self.blank();
                }
            }
            Open::Heading(_) => {
                self.flush();
                self.blank();
            }
            Open::BlockQuote => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            Open::CodeBlock => {
                if let Some(code) = self.code.take() {
                    let start = self.lines.len();
                    for line in code.source.lines() {
                        self.lines.push(Line::from(vec![
                            Span::styled("\u{2502} ", Style::default().fg(self.palette.dim)),
                            Span::styled(
                                sanitize_text(line),
                                Style::default()
                                    .fg(self.palette.code_fg)
                                    .bg(self.palette.code_bg),
                            ),
                        ]));
                    }
                    let end = self.lines.len();
                    self.code_blocks.push(CodeBlock {
                        lang: code.lang,
                        body: start..end,
                        source: code.source,
                    });
                }
                self.lines.push(Line::from(Span::styled(
                    "\u{2514}\u{2500}\u{2500}\u{2500}",
                    Style::default().fg(self.palette.dim),
                )));
                self.blank();
            }
            Open::List => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Open::Item => self.flush(),
            Open::TableHead => self.header_rows = self.table_rows.len(),
            Open::Table => {
                self.render_table();
                self.blank();
            }
            _ => {}
        }
    }

    fn render_table(&mut self) {
        let rows = std::mem::take(&mut self.table_rows);
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let sep = Style::default().fg(self.palette.dim);
        for (r, row) in rows.iter().enumerate() {
            let is_header = r < self.header_rows;
            let cell_style = if is_header {
                Style::default().fg(self.palette.bold).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.palette.text)
            };
            let mut spans = self.prefix();
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::styled(" \u{2502} ", sep));
                }
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let pad = width.saturating_sub(cell.chars().count());
                spans.push(Span::styled(format!("{cell}{}", " ".repeat(pad)), cell_style));
            }
            self.lines.push(Line::from(spans));

            if is_header && r + 1 == self.header_rows {
                let rule = widths
                    .iter()
                    .map(|w| "\u{2500}".repeat(*w))
                    .collect::<Vec<_>>()
                    .join("\u{2500}\u{253C}\u{2500}");
                let mut spans = self.prefix();
                spans.push(Span::styled(rule, sep));
                self.lines.push(Line::from(spans));
            }
        }
    }

    fn finish(mut self) -> RenderedMarkdown {
        // Unterminated code block while streaming
        if self.code.is_some() {
            self.end(Open::CodeBlock);
        }
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        RenderedMarkdown {
            lines: self.lines,
            code_blocks: self.code_blocks,
            palette: self.palette,
            highlighted: false,
        }
    }
}
