use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use super::transcript::INDENT;
use super::{TuiApp, View};
use crate::core::message::Role;
use crate::render::Palette;

const SIDEBAR_WIDTH: u16 = 18;

pub fn spinner(tick: u64) -> &'static str {
    const FRAMES: &[&str] = &[
        "\u{280B}", "\u{2819}", "\u{2839}", "\u{2838}", "\u{283C}", "\u{2834}", "\u{2826}", "\u{2827}",
        "\u{2807}", "\u{280F}",
    ];
    FRAMES[(tick as usize) % FRAMES.len()]
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

pub fn ui(f: &mut Frame, app: &mut TuiApp) {
    let p = Palette::for_theme(app.transcript.theme());
    let area = f.area();
    f.render_widget(Paragraph::new("").style(Style::default().bg(p.bg)), area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(30)])
        .split(area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(5),    // Body
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status
        ])
        .split(columns[1]);

    render_sidebar(f, app, &p, columns[0]);
    render_header(f, app, &p, rows[0]);
    match app.view {
        View::Chat => render_chat(f, app, &p, rows[1]),
        View::Settings => render_settings(f, app, &p, rows[1]),
    }
    render_input(f, app, &p, rows[2]);
    render_status(f, app, &p, rows[3]);

    if let Some(notice) = &app.notice {
        render_notice(f, notice, &p, area);
    }
}

fn render_sidebar(f: &mut Frame, app: &TuiApp, p: &Palette, area: Rect) {
    let entry = |label: &'static str, view: View| {
        if app.view == view {
            Line::from(Span::styled(
                format!(" \u{25B8} {label}"),
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            ))
        } else {
            Line::from(Span::styled(format!("   {label}"), Style::default().fg(p.text)))
        }
    };

    let theme = if app.transcript.theme().is_dark() { "dark" } else { "light" };
    let mut lines = vec![
        Line::from(""),
        entry("Chat", View::Chat),
        entry("Settings", View::Settings),
        Line::from(""),
        Line::from(Span::styled(format!("   theme: {theme}"), Style::default().fg(p.dim))),
    ];
    if app.store.is_listening() {
        lines.push(Line::from(Span::styled(
            format!("   {} listening", spinner(app.tick)),
            Style::default().fg(p.warn),
        )));
    }

    let block = Block::default()
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(p.border))
        .title(Span::styled(
            " Jenny ",
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
        ));
    f.render_widget(
        Paragraph::new(lines).block(block).style(Style::default().bg(p.surface)),
        area,
    );
}

fn render_header(f: &mut Frame, app: &TuiApp, p: &Palette, area: Rect) {
    let title = match app.view {
        View::Chat => "Chat",
        View::Settings => "Settings",
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {title}"),
            Style::default().fg(p.bold).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  \u{2502}  ", Style::default().fg(p.border)),
        Span::styled(app.config.model.as_str(), Style::default().fg(p.link)),
        Span::styled(
            format!("  \u{2502}  {}", app.config.gateway_url),
            Style::default().fg(p.dim),
        ),
    ]);
    f.render_widget(Paragraph::new(line).style(Style::default().bg(p.surface)), area);
}

fn role_header(role: Role, time: String, p: &Palette) -> Line<'static> {
    let (glyph, name, color) = match role {
        Role::User => ("\u{25B6}", "You", p.user),
        Role::Assistant => ("\u{2728}", "Jenny", p.accent),
    };
    Line::from(vec![
        Span::styled(format!("  {glyph} "), Style::default().fg(color)),
        Span::styled(name, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {time}"), Style::default().fg(p.dim)),
    ])
}

fn render_chat(f: &mut Frame, app: &mut TuiApp, p: &Palette, area: Rect) {
    let width = area.width.saturating_sub(2);
    let mut lines: Vec<Line> = Vec::new();

    app.charts.begin_frame();
    for msg in app.store.messages() {
        lines.push(Line::from(""));
        lines.push(role_header(msg.role, msg.local_time(), p));
        lines.extend(
            app.transcript
                .message_lines(&mut app.charts, &msg.id, &msg.content, width),
        );
    }

    if app.store.is_loading() {
        let buffer = app.store.streaming_buffer();
        if buffer.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("  {} {}", spinner(app.tick), app.status_message),
                Style::default().fg(p.warn),
            )));
        } else {
            lines.push(Line::from(""));
            lines.push(role_header(Role::Assistant, chrono::Local::now().format("%H:%M").to_string(), p));
            lines.extend(app.transcript.streaming_lines(&mut app.charts, buffer, width));
            lines.push(Line::from(Span::styled(
                format!("{INDENT}\u{2588}"),
                Style::default().fg(p.accent),
            )));
        }
    }
    app.charts.end_frame();

    let chat = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.border)),
        );
    app.total_content_height = overflow(&chat, area);
    if app.follow {
        app.scroll_offset = app.total_content_height;
    }
    app.scroll_offset = app.scroll_offset.min(app.total_content_height);
    f.render_widget(chat.scroll((app.scroll_offset, 0)), area);

    if app.total_content_height > 0 {
        let sb = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_style(Style::default().fg(p.accent))
            .track_style(Style::default().fg(p.border));
        let mut state =
            ScrollbarState::new(app.total_content_height as usize).position(app.scroll_offset as usize);
        f.render_stateful_widget(
            sb,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut state,
        );
    }
}

/// Rows of wrapped content that do not fit in `area`. The paragraph is
/// drawn with a full border, so it wraps two columns narrower.
fn overflow(paragraph: &Paragraph, area: Rect) -> u16 {
    let rows = paragraph.line_count(area.width.saturating_sub(2));
    let rows = u16::try_from(rows).unwrap_or(u16::MAX);
    rows.saturating_sub(area.height)
}

fn render_settings(f: &mut Frame, app: &TuiApp, p: &Palette, area: Rect) {
    let label = Style::default().fg(p.dim);
    let value = Style::default().fg(p.text);
    let row = |name: &str, text: String, style: Style| {
        Line::from(vec![
            Span::styled(format!("  {name:<14}"), label),
            Span::styled(text, style),
        ])
    };
    let section = |title: &str| {
        Line::from(Span::styled(
            format!("  {title}"),
            Style::default().fg(p.h2).add_modifier(Modifier::BOLD),
        ))
    };

    let auth = if app.config.has_api_token() {
        "bearer token"
    } else {
        "none"
    };
    let mut lines = vec![
        Line::from(""),
        section("Gateway"),
        row("URL", app.config.gateway_url.clone(), value),
        row("Auth", auth.to_string(), value),
        row("Model", app.config.model.clone(), value),
        row(
            "Streaming",
            if app.config.stream { "on" } else { "off" }.to_string(),
            value,
        ),
        Line::from(""),
        section("Status"),
    ];

    match (app.store.gateway_status(), &app.status_error) {
        (Some(status), _) => {
            let or_unknown = |v: Option<String>| v.unwrap_or_else(|| "unknown".into());
            lines.push(row("Host platform", or_unknown(status.host_platform()), value));
            lines.push(row("Port", or_unknown(status.port()), value));
            lines.push(row("Version", or_unknown(status.version()), value));
        }
        (None, Some(error)) => {
            lines.push(row("Unavailable", error.clone(), Style::default().fg(p.error)));
        }
        (None, None) => {
            lines.push(row(
                "Fetching",
                spinner(app.tick).to_string(),
                Style::default().fg(p.warn),
            ));
        }
    }

    let theme = if app.transcript.theme().is_dark() { "dark" } else { "light" };
    let voice = app
        .config
        .voice_command
        .as_ref()
        .map(|argv| argv.join(" "))
        .unwrap_or_else(|| "not configured".into());
    lines.extend([
        Line::from(""),
        section("Appearance"),
        row("Theme", format!("{theme}  (Ctrl+T)"), value),
        Line::from(""),
        section("Voice"),
        row("Command", voice, value),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.border));
    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn render_input(f: &mut Frame, app: &TuiApp, p: &Palette, area: Rect) {
    let busy = app.store.is_loading() || app.store.is_listening();
    let border = if busy { p.border } else { p.accent };

    let title = if app.store.is_loading() {
        format!(" {} Streaming... Ctrl+C cancel ", spinner(app.tick))
    } else if app.store.is_listening() {
        format!(" {} Listening... ", spinner(app.tick))
    } else {
        " Message \u{2502} Enter send \u{2502} Ctrl+R voice ".to_string()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(title, Style::default().fg(p.accent)));

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(p.text))
        .block(block);
    f.render_widget(input, area);

    if app.notice.is_none() {
        let cx = area.x + 1 + app.input[..app.input_cursor].chars().count() as u16;
        f.set_cursor_position((cx.min(area.x + area.width.saturating_sub(2)), area.y + 1));
    }
}

fn render_status(f: &mut Frame, app: &TuiApp, p: &Palette, area: Rect) {
    let status_fg = if app.store.is_loading() { p.warn } else { p.user };
    let sep = Span::styled(" \u{2502} ", Style::default().fg(p.border));

    let line = Line::from(vec![
        Span::styled(format!(" {} ", app.status_message), Style::default().fg(status_fg)),
        sep.clone(),
        Span::styled(
            format!("{} messages", app.store.messages().len()),
            Style::default().fg(p.dim),
        ),
        sep,
        Span::styled(
            "Tab view  ^T theme  ^R voice  ^C quit",
            Style::default().fg(p.dim),
        ),
    ]);
    f.render_widget(Paragraph::new(line).style(Style::default().bg(p.surface)), area);
}

fn render_notice(f: &mut Frame, notice: &str, p: &Palette, area: Rect) {
    let width = (notice.chars().count() as u16 + 6).clamp(30, 70);
    let dialog = centered_rect(width, 7, area);
    f.render_widget(Clear, dialog);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(notice.to_string(), Style::default().fg(p.text))),
        Line::from(""),
        Line::from(Span::styled("Press any key", Style::default().fg(p.dim))),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.warn))
        .style(Style::default().bg(p.surface))
        .title(Span::styled(
            " Notice ",
            Style::default().fg(p.warn).add_modifier(Modifier::BOLD),
        ));
    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .alignment(ratatui::layout::Alignment::Center)
            .wrap(Wrap { trim: true }),
        dialog,
    );
}
