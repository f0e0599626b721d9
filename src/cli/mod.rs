mod export;
mod noninteractive;
mod tui;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::core::config::{load_config, AppConfig, Theme};
use crate::core::error::JennyError;

#[derive(Parser, Debug)]
#[command(name = "jenny", version, about = "Chat client with streaming markdown and charts")]
pub struct Cli {
    /// One-shot mode: send a prompt and stream the reply to stdout
    #[arg(short, long)]
    prompt: Option<String>,

    /// Render a markdown document (or `-` for stdin) to sanitized HTML
    #[arg(long, value_name = "FILE")]
    render_html: Option<String>,

    /// Working directory (for the local jenny.json)
    #[arg(short = 'c', long = "cwd")]
    working_dir: Option<PathBuf>,

    /// Output format for one-shot mode
    #[arg(short = 'f', long, default_value = "text")]
    output_format: OutputFormat,

    /// Suppress progress indicators
    #[arg(short, long)]
    quiet: bool,

    /// Gateway base URL (overrides config)
    #[arg(long)]
    gateway: Option<String>,

    /// Model to request (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Ask for a single JSON reply instead of a token stream
    #[arg(long)]
    no_stream: bool,

    /// Start with the light theme
    #[arg(long)]
    light: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.gateway {
            config.gateway_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if self.no_stream {
            config.stream = false;
        }
        if self.light {
            config.theme = Theme::Light;
        }
        if self.debug {
            config.debug = true;
        }
    }

    fn is_interactive(&self) -> bool {
        self.prompt.is_none() && self.render_html.is_none()
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.working_dir.clone()).map_err(JennyError::from)?;
    cli.apply(&mut config);
    init_tracing(config.debug, cli.is_interactive());

    if let Some(source) = &cli.render_html {
        export::run(source, config.theme)
    } else if let Some(prompt) = cli.prompt {
        noninteractive::run(config, prompt, cli.output_format, cli.quiet).await
    } else {
        tui::run(config).await
    }
}

/// Logs go to stderr, or to a file while the terminal UI owns the screen.
fn init_tracing(debug: bool, to_file: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match to_file.then(open_log_file).flatten() {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        None if to_file => builder.with_writer(std::io::sink).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn open_log_file() -> Option<std::fs::File> {
    let dir = dirs::cache_dir()?.join("jenny");
    std::fs::create_dir_all(&dir).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("jenny.log"))
        .ok()
}
