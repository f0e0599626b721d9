mod transcript;
mod view;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::chat;
use crate::core::config::AppConfig;
use crate::core::error::{GatewayError, VoiceError};
use crate::gateway::{create_gateway, Gateway, GatewayStatus};
use crate::render::{ChartView, TerminalChartBackend};
use crate::store::ConversationStore;
use crate::voice::{CommandRecognizer, SpeechRecognizer};

use transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Chat,
    Settings,
}

/// Results of background work, delivered to the event loop.
enum AppEvent {
    Chunk { turn: u64, text: String },
    Finished { turn: u64, result: Result<String, GatewayError> },
    Status(Result<GatewayStatus, GatewayError>),
    Voice(Result<String, VoiceError>),
}

// ─── App State ───────────────────────────────────────

struct TuiApp {
    config: AppConfig,
    gateway: Arc<dyn Gateway>,
    recognizer: Arc<dyn SpeechRecognizer>,
    store: ConversationStore,
    view: View,
    input: String,
    input_cursor: usize,
    scroll_offset: u16,
    total_content_height: u16,
    /// Keep the newest line in view
    follow: bool,
    status_message: String,
    status_error: Option<String>,
    notice: Option<String>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    cancel_token: Option<CancellationToken>,
    turn: u64,
    transcript: Transcript,
    charts: ChartView,
    should_quit: bool,
    tick: u64,
}

impl TuiApp {
    fn new(config: AppConfig, gateway: Arc<dyn Gateway>, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let theme = config.theme;
        Self {
            config,
            gateway,
            recognizer,
            store: ConversationStore::new(),
            view: View::Chat,
            input: String::new(),
            input_cursor: 0,
            scroll_offset: 0,
            total_content_height: 0,
            follow: true,
            status_message: "Ready".into(),
            status_error: None,
            notice: None,
            events_tx,
            events_rx,
            cancel_token: None,
            turn: 0,
            transcript: Transcript::new(theme),
            charts: ChartView::new(Box::new(TerminalChartBackend::new())),
            should_quit: false,
            tick: 0,
        }
    }

    fn fetch_status(&self) {
        let gateway = self.gateway.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(AppEvent::Status(gateway.fetch_status().await));
        });
    }

    fn scroll_by(&mut self, delta: i32) {
        let offset = (self.scroll_offset as i32 + delta).clamp(0, self.total_content_height as i32);
        self.scroll_offset = offset as u16;
        self.follow = self.scroll_offset >= self.total_content_height;
    }
}

// ─── Entry Point ─────────────────────────────────────

pub async fn run(config: AppConfig) -> Result<()> {
    let gateway = create_gateway(&config);
    let recognizer: Arc<dyn SpeechRecognizer> = Arc::new(CommandRecognizer::from_config(&config));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = TuiApp::new(config, gateway, recognizer);
    app.fetch_status();
    let result = run_event_loop(&mut terminal, &mut app).await;

    if let Some(token) = app.cancel_token.take() {
        token.cancel();
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

// ─── Event Loop ──────────────────────────────────────

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
) -> Result<()> {
    let mut event_reader = EventStream::new();
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(80));

    loop {
        terminal.draw(|f| view::ui(f, app))?;
        if app.should_quit {
            return Ok(());
        }

        tokio::select! {
            biased;

            Some(event) = app.events_rx.recv() => {
                handle_app_event(app, event);
            }

            Some(Ok(event)) = event_reader.next() => {
                if let Event::Key(key) = event {
                    if key.kind == KeyEventKind::Press {
                        handle_key_event(app, key);
                    }
                }
            }

            _ = tick_interval.tick() => {
                app.tick += 1;
                // lines drawn last frame get their code highlighted now
                app.transcript.highlight_pending();
            }
        }
    }
}

fn handle_app_event(app: &mut TuiApp, event: AppEvent) {
    match event {
        AppEvent::Chunk { turn, text } => {
            if turn == app.turn && app.store.is_loading() {
                chat::apply_chunk(&mut app.store, &text);
                app.status_message = "Generating...".into();
            }
        }
        AppEvent::Finished { turn, result } => {
            // a cancelled turn was already closed by the key handler
            if turn != app.turn || !app.store.is_loading() {
                return;
            }
            chat::finish_turn(&mut app.store, &result);
            app.transcript.clear_streaming();
            app.cancel_token = None;
            app.status_message = if result.is_ok() { "Ready" } else { "Error" }.into();
            app.follow = true;
        }
        AppEvent::Status(Ok(status)) => {
            app.store.set_gateway_status(status);
            app.status_error = None;
        }
        AppEvent::Status(Err(e)) => {
            tracing::warn!(error = %e, "gateway status unavailable");
            app.status_error = Some(e.to_string());
        }
        AppEvent::Voice(result) => {
            app.store.set_listening(false);
            match result {
                Ok(transcript) => submit(app, &transcript),
                Err(VoiceError::Unsupported) => show_voice_unsupported(app),
                Err(e) => {
                    tracing::info!(error = %e, "voice input failed");
                    app.status_message = e.to_string();
                }
            }
        }
    }
}

// ─── Actions ─────────────────────────────────────────

fn submit(app: &mut TuiApp, input: &str) {
    let Some(history) = chat::begin_turn(&mut app.store, input) else {
        return;
    };
    app.turn += 1;
    let turn = app.turn;
    let cancel = CancellationToken::new();
    app.cancel_token = Some(cancel.clone());
    app.view = View::Chat;
    app.follow = true;
    app.status_message = "Thinking...".into();

    let gateway = app.gateway.clone();
    let tx = app.events_tx.clone();
    let stream = app.config.stream;
    tokio::spawn(async move {
        let chunk_tx = tx.clone();
        let mut on_chunk = move |text: &str| {
            let _ = chunk_tx.send(AppEvent::Chunk {
                turn,
                text: text.to_string(),
            });
        };
        let result = if stream {
            gateway.send_message(&history, Some(&mut on_chunk), Some(&cancel)).await
        } else {
            gateway.send_message(&history, None, Some(&cancel)).await
        };
        let _ = tx.send(AppEvent::Finished { turn, result });
    });
}

fn cancel_turn(app: &mut TuiApp) {
    if let Some(token) = app.cancel_token.take() {
        token.cancel();
    }
    chat::finish_turn(&mut app.store, &Err(GatewayError::Cancelled));
    app.transcript.clear_streaming();
    app.status_message = "Cancelled".into();
}

fn start_listening(app: &mut TuiApp) {
    if !app.recognizer.is_available() {
        show_voice_unsupported(app);
        return;
    }
    app.store.set_listening(true);
    app.status_message = "Listening...".into();
    let recognizer = app.recognizer.clone();
    let tx = app.events_tx.clone();
    tokio::spawn(async move {
        let _ = tx.send(AppEvent::Voice(recognizer.listen().await));
    });
}

fn show_voice_unsupported(app: &mut TuiApp) {
    app.notice = Some(format!(
        "{}. Configure voice_command or set JENNY_VOICE_COMMAND.",
        VoiceError::Unsupported
    ));
}

fn toggle_theme(app: &mut TuiApp) {
    let theme = app.transcript.theme().toggled();
    app.transcript.set_theme(theme);
    app.status_message = if theme.is_dark() { "Dark mode" } else { "Light mode" }.into();
}

// ─── Key Handling ────────────────────────────────────

fn handle_key_event(app: &mut TuiApp, key: KeyEvent) {
    if app.notice.is_some() {
        app.notice = None;
        return;
    }

    let busy = app.store.is_loading() || app.store.is_listening();
    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            if app.store.is_loading() {
                cancel_turn(app);
            } else {
                app.should_quit = true;
            }
        }
        (KeyCode::Char('d'), KeyModifiers::CONTROL) if !app.store.is_loading() => {
            app.should_quit = true;
        }
        (KeyCode::Tab, _) | (KeyCode::F(2), _) => {
            app.view = match app.view {
                View::Chat => View::Settings,
                View::Settings => View::Chat,
            };
        }
        (KeyCode::Char('t'), KeyModifiers::CONTROL) => toggle_theme(app),
        (KeyCode::Char('r'), KeyModifiers::CONTROL) if !busy => start_listening(app),
        (KeyCode::Enter, KeyModifiers::NONE) if !busy => {
            let input = std::mem::take(&mut app.input);
            app.input_cursor = 0;
            submit(app, &input);
        }
        // Text editing
        (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
            app.input.insert(app.input_cursor, c);
            app.input_cursor += c.len_utf8();
        }
        (KeyCode::Backspace, _) if app.input_cursor > 0 => {
            let prev = app.input[..app.input_cursor]
                .chars()
                .last()
                .map(|c| c.len_utf8())
                .unwrap_or(1);
            app.input_cursor -= prev;
            app.input.remove(app.input_cursor);
        }
        (KeyCode::Delete, _) if app.input_cursor < app.input.len() => {
            app.input.remove(app.input_cursor);
        }
        (KeyCode::Left, _) if app.input_cursor > 0 => {
            let prev = app.input[..app.input_cursor]
                .chars()
                .last()
                .map(|c| c.len_utf8())
                .unwrap_or(1);
            app.input_cursor -= prev;
        }
        (KeyCode::Right, _) if app.input_cursor < app.input.len() => {
            let next = app.input[app.input_cursor..]
                .chars()
                .next()
                .map(|c| c.len_utf8())
                .unwrap_or(1);
            app.input_cursor += next;
        }
        (KeyCode::Home, _) | (KeyCode::Char('a'), KeyModifiers::CONTROL) => app.input_cursor = 0,
        (KeyCode::End, _) | (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
            app.input_cursor = app.input.len()
        }
        (KeyCode::Up, _) => app.scroll_by(-3),
        (KeyCode::Down, _) => app.scroll_by(3),
        (KeyCode::PageUp, _) => app.scroll_by(-20),
        (KeyCode::PageDown, _) => app.scroll_by(20),
        _ => {}
    }
}
