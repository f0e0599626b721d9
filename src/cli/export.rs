use anyhow::{Context, Result};
use std::io::Read;

use crate::core::config::Theme;
use crate::render::render_document;

/// Render `source` (a path, or `-` for stdin) and print a standalone page.
pub fn run(source: &str, theme: Theme) -> Result<()> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read {source}"))?
    };

    tracing::debug!(bytes = text.len(), source, "read document");
    println!("{}", page(&render_document(&text, theme), theme));
    Ok(())
}

fn page(body: &str, theme: Theme) -> String {
    let (bg, fg, muted) = match theme {
        Theme::Dark => ("#18181b", "#e4e4e7", "#a1a1aa"),
        Theme::Light => ("#ffffff", "#18181b", "#71717a"),
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Jenny</title>\n\
<style>\nbody {{ background: {bg}; color: {fg}; font-family: system-ui, sans-serif; \
max-width: 48rem; margin: 2rem auto; line-height: 1.5; }}\n\
pre {{ padding: 0.75rem; overflow-x: auto; border-radius: 6px; }}\n\
table {{ border-collapse: collapse; }} td, th {{ border: 1px solid {muted}; padding: 0.25rem 0.5rem; }}\n\
figure.chart {{ border: 1px solid {muted}; border-radius: 6px; margin: 1rem 0; }}\n\
</style>\n</head>\n<body>\n{body}</body>\n</html>"
    )
}
