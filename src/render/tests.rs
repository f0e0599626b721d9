use super::chart::*;
use super::markdown::*;
use super::segment::*;
use crate::core::config::Theme;
use crate::core::error::ChartRenderError;
use ratatui::text::Line;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn line_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

fn texts(rendered: &RenderedMarkdown) -> Vec<String> {
    rendered.lines.iter().map(line_text).collect()
}

// ─── Segmentation ────────────────────────────────────

#[test]
fn test_segment_text_chart_text() {
    let buffer = "A\n```json:chart\n{\"type\":\"bar\",\"data\":{}}\n```\nB";
    let segments = segment(buffer);

    assert_eq!(segments.len(), 3);
    assert_eq!(
        segments[0],
        ContentSegment::Markdown {
            text: "A\n".into(),
            span: 0..2
        }
    );
    match &segments[1] {
        ContentSegment::Chart { spec, .. } => {
            assert_eq!(spec.kind, ChartKind::Bar);
            assert_eq!(spec.series, json!({}));
            assert!(spec.options.is_none());
        }
        other => panic!("expected chart, got {other:?}"),
    }
    match &segments[2] {
        ContentSegment::Markdown { text, .. } => assert_eq!(text, "\nB"),
        other => panic!("expected markdown, got {other:?}"),
    }
}

#[test]
fn test_segment_plain_text_is_single_markdown() {
    let segments = segment("just **words**\n\n- and a list");
    assert_eq!(segments.len(), 1);
    assert!(!segments[0].is_chart());
    assert_eq!(segments[0].span(), 0..28);
}

#[test]
fn test_segment_empty_buffer() {
    let segments = segment("");
    assert_eq!(
        segments,
        vec![ContentSegment::Markdown {
            text: String::new(),
            span: 0..0
        }]
    );
}

#[test]
fn test_segment_unterminated_fence_stays_markdown() {
    let buffer = "Look:\n```json:chart\n{\"type\":\"line\",\"data\":{\"labels\":[";
    let segments = segment(buffer);
    assert_eq!(segments.len(), 1);
    match &segments[0] {
        ContentSegment::Markdown { text, .. } => assert_eq!(text, buffer),
        other => panic!("expected markdown, got {other:?}"),
    }
}

#[test]
fn test_segment_malformed_fence_falls_back_to_markdown() {
    let fence = "```json:chart\n{not json}\n```";
    let buffer = format!("before\n{fence}\nafter");
    let segments = segment(&buffer);

    assert!(segments.iter().all(|s| !s.is_chart()));
    let fence_segment = segments
        .iter()
        .find(|s| matches!(s, ContentSegment::Markdown { text, .. } if text == fence));
    assert!(fence_segment.is_some(), "fence kept verbatim: {segments:?}");
}

#[test]
fn test_segment_missing_data_and_unknown_kind_fall_back() {
    for body in [r#"{"type":"bar"}"#, r#"{"type":"scatter","data":{}}"#] {
        let buffer = format!("```json:chart\n{body}\n```");
        let segments = segment(&buffer);
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].is_chart(), "{body} should not parse");
    }
}

#[test]
fn test_segment_type_defaults_to_bar() {
    let segments = segment("```json:chart\n{\"data\":{\"datasets\":[]}}\n```");
    match &segments[0] {
        ContentSegment::Chart { spec, .. } => assert_eq!(spec.kind, ChartKind::Bar),
        other => panic!("expected chart, got {other:?}"),
    }
}

#[test]
fn test_segment_all_kinds_and_options() {
    let kinds = [
        ("line", ChartKind::Line),
        ("bar", ChartKind::Bar),
        ("pie", ChartKind::Pie),
        ("doughnut", ChartKind::Doughnut),
        ("radar", ChartKind::Radar),
        ("polarArea", ChartKind::PolarArea),
    ];
    for (tag, kind) in kinds {
        let buffer = format!(
            "```json:chart\n{{\"type\":\"{tag}\",\"data\":{{}},\"options\":{{\"responsive\":true}}}}\n```"
        );
        match &segment(&buffer)[0] {
            ContentSegment::Chart { spec, .. } => {
                assert_eq!(spec.kind, kind);
                assert_eq!(spec.options, Some(json!({"responsive": true})));
            }
            other => panic!("{tag}: expected chart, got {other:?}"),
        }
    }
}

#[test]
fn test_segment_spans_cover_buffer_in_order() {
    let buffer = "intro\n```json:chart\n{\"type\":\"pie\",\"data\":{}}\n```\n```json:chart\n{\"data\":{}}\n```\nmid\n```json:chart\nbroken\n```\nend";
    let segments = segment(buffer);

    let mut cursor = 0;
    let mut rebuilt = String::new();
    for s in &segments {
        let span = s.span();
        assert_eq!(span.start, cursor);
        cursor = span.end;
        rebuilt.push_str(&buffer[span]);
    }
    assert_eq!(cursor, buffer.len());
    assert_eq!(rebuilt, buffer);
    assert_eq!(segments.iter().filter(|s| s.is_chart()).count(), 2);
}

#[test]
fn test_segment_is_pure_over_every_prefix() {
    let buffer = "Here 📊:\n```json:chart\n{\"type\":\"bar\",\"data\":{\"labels\":[\"a\"]}}\n```\ndone";
    for (end, _) in buffer.char_indices().chain(std::iter::once((buffer.len(), ' '))) {
        let prefix = &buffer[..end];
        let first = segment(prefix);
        assert_eq!(first, segment(prefix));
        let covered: usize = first.iter().map(|s| s.span().len()).sum();
        assert_eq!(covered, prefix.len());
    }
}

#[test]
fn test_segment_fence_must_be_tagged_exactly() {
    let buffer = "```json\n{\"type\":\"bar\",\"data\":{}}\n```";
    assert!(!segment(buffer)[0].is_chart());
}

// ─── HTML rendering ──────────────────────────────────

#[test]
fn test_render_markdown_escapes_raw_html() {
    let html = render_markdown("<script>alert(1)</script>\n\nhi <b onclick=\"x()\">there</b>");
    let html = html.as_str();
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<b onclick"));
}

#[test]
fn test_render_markdown_neutralises_dangerous_links() {
    let html = render_markdown("[click](javascript:alert(1)) [v](VBScript:x) [f](file:///etc/passwd)")
        .into_string();
    assert!(!html.to_lowercase().contains("javascript:"));
    assert!(!html.to_lowercase().contains("vbscript:"));
    assert!(!html.contains("file:"));
    assert_eq!(html.matches("href=\"#\"").count(), 3);
}

#[test]
fn test_render_markdown_data_urls() {
    let html = render_markdown("![dot](data:image/png;base64,AAAA) [x](data:text/html;base64,PHM+)")
        .into_string();
    assert!(html.contains("src=\"data:image/png;base64,AAAA\""));
    assert!(html.contains("href=\"#\""));
    assert!(!html.contains("data:text/html"));
}

#[test]
fn test_render_markdown_keeps_safe_links() {
    let html = render_markdown("[docs](https://example.com/a?b=1) <https://example.org>").into_string();
    assert!(html.contains("href=\"https://example.com/a?b=1\""));
    assert!(html.contains("href=\"https://example.org\""));
}

#[test]
fn test_render_markdown_autolinks_bare_urls() {
    let html = render_markdown("see https://example.com and www.example.org.").into_string();
    assert!(html.contains("<a href=\"https://example.com\">https://example.com</a>"));
    assert!(html.contains("<a href=\"http://www.example.org\">www.example.org</a>."));
    assert!(html.starts_with("<p>see "));
}

#[test]
fn test_render_markdown_autolinks_skip_code_and_links() {
    let html = render_markdown(
        "`https://a.example` [https://b.example](https://c.example) example.com\n\n```\nhttps://d.example\n```",
    )
    .into_string();
    assert!(!html.contains("href=\"https://a.example\""));
    assert!(!html.contains("href=\"https://b.example\""));
    assert_eq!(html.matches("<a ").count(), 1);
    assert!(html.contains("example.com"));
    assert!(!html.contains("href=\"https://d.example\""));
}

#[test]
fn test_render_lines_styles_bare_urls_as_links() {
    let rendered = render_lines("visit https://example.com now", Theme::Dark);
    let url = rendered.lines[0]
        .spans
        .iter()
        .find(|s| s.content == "https://example.com")
        .expect("url span");
    assert!(url.style.add_modifier.contains(ratatui::style::Modifier::UNDERLINED));
}

#[test]
fn test_render_markdown_gfm_features() {
    let html = render_markdown(
        "| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~\n\n- [x] done\n- [ ] todo",
    )
    .into_string();
    assert!(html.contains("<table>"));
    assert!(html.contains("<del>old</del>"));
    assert_eq!(html.matches("checkbox").count(), 2);
}

#[test]
fn test_render_markdown_single_newline_breaks() {
    let html = render_markdown("line one\nline two").into_string();
    assert!(html.contains("line one<br />"));
}

#[test]
fn test_highlight_code_blocks() {
    let html = render_markdown("```rust\nfn main() { let x = 1 < 2; }\n```").into_string();
    assert!(html.contains("language-rust"));

    let highlighted = highlight_code_blocks(&html, Theme::Dark);
    assert!(!highlighted.contains("language-rust"));
    assert!(highlighted.contains("<pre style=\"background-color:"));
    assert!(highlighted.contains("main"));
}

#[test]
fn test_highlight_leaves_unknown_language() {
    let html = render_markdown("```nosuchlang\nabc\n```").into_string();
    assert_eq!(highlight_code_blocks(&html, Theme::Light), html);
}

#[test]
fn test_render_document_mixes_charts_and_markdown() {
    let buffer = "# Sales\n```json:chart\n{\"type\":\"pie\",\"data\":{\"labels\":[\"<a>\"]}}\n```\n<i>end</i>";
    let html = render_document(buffer, Theme::Dark);

    assert!(html.contains("<h1>Sales</h1>"));
    assert!(html.contains("<figure class=\"chart\" data-kind=\"pie\">"));
    assert!(html.contains("&lt;a&gt;"));
    assert!(!html.contains("<i>"));
}

// ─── Terminal rendering ──────────────────────────────

#[test]
fn test_render_lines_headings_and_paragraphs() {
    let rendered = render_lines("# Title\n\nSome *body* text.", Theme::Dark);
    let lines = texts(&rendered);
    assert_eq!(lines[0], "Title");
    assert!(lines.contains(&"Some body text.".to_string()));
    assert!(rendered.code_blocks.is_empty());
}

#[test]
fn test_render_lines_lists() {
    let lines = texts(&render_lines("- one\n- two\n\n1. first\n2. second", Theme::Dark));
    assert!(lines.contains(&"\u{2022} one".to_string()));
    assert!(lines.contains(&"\u{2022} two".to_string()));
    assert!(lines.contains(&"1. first".to_string()));
    assert!(lines.contains(&"2. second".to_string()));
}

#[test]
fn test_render_lines_table() {
    let lines = texts(&render_lines("| a | bb |\n|---|---|\n| 1 | 2 |", Theme::Light));
    assert!(lines.contains(&"a \u{2502} bb".to_string()));
    assert!(lines.contains(&"1 \u{2502} 2 ".to_string()));
}

#[test]
fn test_render_lines_code_block_and_highlight() {
    let mut rendered = render_lines("```rust\nfn main() {}\nlet x = 1;\n```", Theme::Dark);
    assert_eq!(rendered.code_blocks.len(), 1);
    let block = rendered.code_blocks[0].clone();
    assert_eq!(block.lang.as_deref(), Some("rust"));
    assert_eq!(block.body.len(), 2);
    assert_eq!(line_text(&rendered.lines[block.body.start]), "\u{2502} fn main() {}");

    let before = rendered.lines.len();
    rendered.highlight(Theme::Dark);
    assert!(rendered.is_highlighted());
    assert_eq!(rendered.lines.len(), before);
    assert_eq!(line_text(&rendered.lines[block.body.start]), "\u{2502} fn main() {}");
    assert!(rendered.lines[block.body.start].spans.len() > 2);
}

#[test]
fn test_render_lines_unterminated_code_block() {
    let rendered = render_lines("```python\nprint(1)", Theme::Dark);
    assert_eq!(rendered.code_blocks.len(), 1);
    assert!(texts(&rendered).contains(&"\u{2502} print(1)".to_string()));
}

#[test]
fn test_render_lines_strip_control_characters() {
    let rendered = render_lines("red \u{1b}[31mtext\u{7}", Theme::Dark);
    for line in texts(&rendered) {
        assert!(!line.chars().any(|c| c.is_control()), "{line:?}");
    }
    assert_eq!(sanitize_text("a\tb\u{1b}c"), "a    bc");
}

#[test]
fn test_render_lines_raw_html_is_literal() {
    let lines = texts(&render_lines("<script>x</script>", Theme::Dark));
    assert!(lines.iter().any(|l| l.contains("<script>")));
}

// ─── Chart view ──────────────────────────────────────

#[derive(Default)]
struct Counters {
    rendered: AtomicUsize,
    destroyed: AtomicUsize,
}

struct CountingBackend {
    counters: Arc<Counters>,
    fail: bool,
}

struct CountingHandle {
    counters: Arc<Counters>,
    lines: Vec<Line<'static>>,
    destroyed: bool,
}

impl ChartHandle for CountingHandle {
    fn lines(&self) -> &[Line<'static>] {
        &self.lines
    }

    fn destroy(&mut self) {
        assert!(!self.destroyed, "handle destroyed twice");
        self.destroyed = true;
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ChartBackend for CountingBackend {
    fn render(
        &self,
        region: &RegionId,
        spec: &ChartSpec,
        _style: &ChartStyle,
    ) -> Result<Box<dyn ChartHandle>, ChartRenderError> {
        self.counters.rendered.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ChartRenderError::Series("bad".into()));
        }
        Ok(Box::new(CountingHandle {
            counters: self.counters.clone(),
            lines: vec![Line::from(format!("{region} {}", spec.kind.label()))],
            destroyed: false,
        }))
    }
}

fn counting_view(fail: bool) -> (ChartView, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let backend = CountingBackend {
        counters: counters.clone(),
        fail,
    };
    (ChartView::new(Box::new(backend)), counters)
}

fn spec(kind: ChartKind, series: serde_json::Value) -> ChartSpec {
    ChartSpec {
        kind,
        series,
        options: None,
    }
}

fn style(theme: Theme) -> ChartStyle {
    ChartStyle::new(theme, ChartKind::Bar, 60)
}

#[test]
fn test_chart_view_reuses_same_identity() {
    let (mut view, counters) = counting_view(false);
    let region = RegionId::message("m1", 0);
    let s = spec(ChartKind::Bar, json!({"a": 1}));

    for _ in 0..3 {
        let lines = view.mount(region.clone(), &s, &style(Theme::Dark)).unwrap();
        assert_eq!(line_text(&lines[0]), "m1#0 bar");
    }
    assert_eq!(counters.rendered.load(Ordering::SeqCst), 1);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);
    assert_eq!(view.live_handles(), 1);
}

#[test]
fn test_chart_view_destroys_before_replacing() {
    let (mut view, counters) = counting_view(false);
    let region = RegionId::streaming(0);

    view.mount(region.clone(), &spec(ChartKind::Bar, json!({"a": 1})), &style(Theme::Dark))
        .unwrap();
    view.mount(region.clone(), &spec(ChartKind::Line, json!({"a": 1})), &style(Theme::Dark))
        .unwrap();
    view.mount(region.clone(), &spec(ChartKind::Line, json!({"a": 2})), &style(Theme::Dark))
        .unwrap();

    assert_eq!(counters.rendered.load(Ordering::SeqCst), 3);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
    assert_eq!(view.live_handles(), 1);
}

#[test]
fn test_chart_view_theme_change_recreates() {
    let (mut view, counters) = counting_view(false);
    let region = RegionId::message("m1", 0);
    let s = spec(ChartKind::Pie, json!({}));

    view.mount(region.clone(), &s, &style(Theme::Dark)).unwrap();
    view.mount(region.clone(), &s, &style(Theme::Light)).unwrap();
    assert_eq!(counters.rendered.load(Ordering::SeqCst), 2);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_chart_view_end_frame_sweeps_unmounted_regions() {
    let (mut view, counters) = counting_view(false);
    let s = spec(ChartKind::Bar, json!({}));

    view.begin_frame();
    view.mount(RegionId::streaming(0), &s, &style(Theme::Dark)).unwrap();
    view.mount(RegionId::message("m1", 0), &s, &style(Theme::Dark)).unwrap();
    view.end_frame();
    assert_eq!(view.live_handles(), 2);

    // streaming slot promoted to a final message
    view.begin_frame();
    view.mount(RegionId::message("m1", 0), &s, &style(Theme::Dark)).unwrap();
    view.mount(RegionId::message("m2", 0), &s, &style(Theme::Dark)).unwrap();
    view.end_frame();

    assert_eq!(view.live_handles(), 2);
    assert_eq!(counters.rendered.load(Ordering::SeqCst), 3);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_chart_view_drop_destroys_everything() {
    let (mut view, counters) = counting_view(false);
    let s = spec(ChartKind::Bar, json!({}));
    view.mount(RegionId::message("a", 0), &s, &style(Theme::Dark)).unwrap();
    view.mount(RegionId::message("a", 1), &s, &style(Theme::Dark)).unwrap();
    drop(view);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_chart_view_failure_is_remembered() {
    let (mut view, counters) = counting_view(true);
    let region = RegionId::message("m1", 0);
    let s = spec(ChartKind::Bar, json!({}));

    assert!(view.mount(region.clone(), &s, &style(Theme::Dark)).is_err());
    assert!(view.mount(region, &s, &style(Theme::Dark)).is_err());
    assert_eq!(counters.rendered.load(Ordering::SeqCst), 1);
    assert_eq!(view.live_handles(), 0);
}

#[test]
fn test_chart_style_axes_only_for_line_and_bar() {
    assert!(ChartStyle::new(Theme::Dark, ChartKind::Line, 40).axes);
    assert!(ChartStyle::new(Theme::Dark, ChartKind::Bar, 40).axes);
    for kind in [ChartKind::Pie, ChartKind::Doughnut, ChartKind::Radar, ChartKind::PolarArea] {
        assert!(!ChartStyle::new(Theme::Light, kind, 40).axes);
    }
    let dark = ChartStyle::new(Theme::Dark, ChartKind::Bar, 40);
    let light = ChartStyle::new(Theme::Light, ChartKind::Bar, 40);
    assert_ne!(dark.label, light.label);
    assert_eq!(ChartStyle::new(Theme::Dark, ChartKind::Bar, 3).width, 24);
}

// ─── Terminal chart backend ──────────────────────────

fn sales() -> serde_json::Value {
    json!({
        "labels": ["Jan", "Feb", "Mar"],
        "datasets": [
            {"label": "2024", "data": [10, 20, 5]},
            {"label": "2025", "data": [12, null, {"x": 3, "y": 7.5}]}
        ]
    })
}

fn draw(kind: ChartKind, series: serde_json::Value) -> Result<Vec<String>, ChartRenderError> {
    let backend = TerminalChartBackend::new();
    let s = ChartSpec {
        kind,
        series,
        options: Some(json!({"plugins": {"title": {"text": "Sales"}}})),
    };
    let handle = backend.render(&RegionId::streaming(0), &s, &ChartStyle::new(Theme::Dark, kind, 60))?;
    Ok(handle.lines().iter().map(line_text).collect())
}

#[test]
fn test_series_parsing() {
    let series = Series::from_value(&sales()).unwrap();
    assert_eq!(series.labels, vec!["Jan", "Feb", "Mar"]);
    assert_eq!(series.datasets[1].values, vec![12.0, 0.0, 7.5]);

    let unlabeled = Series::from_value(&json!({"datasets": [{"data": [1, 2]}]})).unwrap();
    assert_eq!(unlabeled.labels, vec!["1", "2"]);
    assert_eq!(unlabeled.datasets[0].label, "Series 1");
}

#[test]
fn test_series_errors() {
    assert!(matches!(Series::from_value(&json!({})), Err(ChartRenderError::Series(_))));
    assert!(matches!(
        Series::from_value(&json!({"datasets": [{"data": ["x"]}]})),
        Err(ChartRenderError::Series(_))
    ));
    assert_eq!(
        Series::from_value(&json!({"datasets": []})),
        Err(ChartRenderError::Empty)
    );
}

#[test]
fn test_terminal_bar_chart() {
    let lines = draw(ChartKind::Bar, sales()).unwrap();
    assert_eq!(lines[0], "Sales");
    assert!(lines.iter().any(|l| l.starts_with("Jan") && l.ends_with(" 10")));
    assert!(lines.iter().any(|l| l.contains('\u{2514}')));
    assert!(lines.last().unwrap().contains("2025"));
}

#[test]
fn test_terminal_line_chart() {
    let lines = draw(ChartKind::Line, sales()).unwrap();
    assert!(lines.iter().any(|l| l.contains('\u{25CF}')));
    assert!(lines.iter().any(|l| l.contains("Jan")));
    assert!(lines.iter().any(|l| l.trim_start().starts_with("20")));
}

#[test]
fn test_terminal_share_charts() {
    for kind in [ChartKind::Pie, ChartKind::Doughnut, ChartKind::PolarArea] {
        let lines = draw(kind, sales()).unwrap();
        assert!(lines.iter().any(|l| l.starts_with("Feb") && l.ends_with("57.1%")), "{lines:?}");
        assert!(!lines.iter().any(|l| l.contains('\u{2514}')));
    }
    assert_eq!(
        draw(ChartKind::Pie, json!({"datasets": [{"data": [0, 0]}]})).unwrap_err(),
        ChartRenderError::Empty
    );
}

#[test]
fn test_terminal_radar_chart() {
    let lines = draw(ChartKind::Radar, sales()).unwrap();
    assert!(lines.iter().any(|l| l.starts_with("Mar") && l.ends_with(" 5")));
}

#[test]
fn test_terminal_handle_destroy_clears() {
    let backend = TerminalChartBackend::new();
    let s = spec(ChartKind::Bar, sales());
    let mut handle = backend
        .render(&RegionId::streaming(0), &s, &style(Theme::Light))
        .unwrap();
    assert!(!handle.lines().is_empty());
    handle.destroy();
    assert!(handle.lines().is_empty());
}
