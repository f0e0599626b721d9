use anyhow::Result;
use std::io::{self, Write};
use tokio_util::sync::CancellationToken;

use crate::chat;
use crate::core::config::AppConfig;
use crate::core::error::{GatewayError, JennyError};
use crate::gateway::create_gateway;
use crate::store::ConversationStore;

pub async fn run(
    config: AppConfig,
    prompt: String,
    output_format: super::OutputFormat,
    quiet: bool,
) -> Result<()> {
    let gateway = create_gateway(&config);
    let mut store = ConversationStore::empty();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let show_progress = !quiet && matches!(output_format, super::OutputFormat::Text);
    if show_progress {
        eprint!("\x1b[90mThinking...\x1b[0m");
        io::stderr().flush().ok();
    }

    // Text output prints each cumulative chunk's new suffix as it arrives
    let mut printed = 0usize;
    let mut on_update = |text: &str| {
        if !matches!(output_format, super::OutputFormat::Text) {
            return;
        }
        if printed == 0 && show_progress {
            eprint!("\r\x1b[K");
        }
        if let Some(new) = text.get(printed..) {
            print!("{new}");
            io::stdout().flush().ok();
            printed = text.len();
        }
    };

    let result = chat::run_turn(
        &mut store,
        gateway.as_ref(),
        &prompt,
        config.stream,
        &mut on_update,
        Some(&cancel),
    )
    .await
    .ok_or_else(|| anyhow::anyhow!("prompt is empty"))?;

    match output_format {
        super::OutputFormat::Text => {
            if show_progress && printed == 0 {
                eprint!("\r\x1b[K");
            }
            match result {
                Ok(reply) => {
                    match reply.get(printed..) {
                        Some(rest) => println!("{rest}"),
                        None => println!(),
                    }
                    Ok(())
                }
                Err(GatewayError::Cancelled) => {
                    if printed > 0 {
                        println!();
                    }
                    eprintln!("\x1b[90m(cancelled)\x1b[0m");
                    Ok(())
                }
                Err(e) => Err(JennyError::from(e).into()),
            }
        }
        super::OutputFormat::Json => {
            let output = match result {
                Ok(reply) => serde_json::json!({
                    "model": config.model,
                    "content": reply,
                }),
                Err(e) => serde_json::json!({
                    "error": e.to_string(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}
