pub mod chart;
pub mod markdown;
pub mod segment;

pub use chart::{
    ChartBackend, ChartHandle, ChartStyle, ChartView, RegionId, RegionOwner, Series, TerminalChartBackend,
};
pub use markdown::{render_document, render_lines, render_markdown, RenderedMarkdown, SanitizedHtml};
pub use segment::{segment, ChartKind, ChartSpec, ContentSegment, CHART_FENCE_TAG};

use ratatui::style::Color;

use crate::core::config::Theme;

/// Colors shared by the markdown renderer and the terminal views.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub bg: Color,
    pub surface: Color,
    pub border: Color,
    pub text: Color,
    pub bold: Color,
    pub dim: Color,
    pub accent: Color,
    pub link: Color,
    pub h1: Color,
    pub h2: Color,
    pub bullet: Color,
    pub code_fg: Color,
    pub code_bg: Color,
    pub inline_code_fg: Color,
    pub inline_code_bg: Color,
    pub user: Color,
    pub error: Color,
    pub warn: Color,
}

const DARK: Palette = Palette {
    bg: Color::Rgb(15, 15, 25),
    surface: Color::Rgb(22, 22, 36),
    border: Color::Rgb(50, 50, 70),
    text: Color::Rgb(210, 210, 225),
    bold: Color::Rgb(240, 240, 255),
    dim: Color::Rgb(120, 120, 140),
    accent: Color::Rgb(140, 80, 255),
    link: Color::Rgb(100, 160, 255),
    h1: Color::Rgb(140, 80, 255),
    h2: Color::Rgb(100, 160, 255),
    bullet: Color::Rgb(140, 80, 255),
    code_fg: Color::Rgb(180, 220, 160),
    code_bg: Color::Rgb(30, 30, 50),
    inline_code_fg: Color::Rgb(220, 180, 120),
    inline_code_bg: Color::Rgb(35, 35, 55),
    user: Color::Rgb(80, 200, 120),
    error: Color::Rgb(230, 80, 80),
    warn: Color::Rgb(230, 190, 60),
};

const LIGHT: Palette = Palette {
    bg: Color::Rgb(250, 250, 252),
    surface: Color::Rgb(236, 236, 242),
    border: Color::Rgb(200, 200, 212),
    text: Color::Rgb(40, 40, 52),
    bold: Color::Rgb(10, 10, 20),
    dim: Color::Rgb(113, 113, 122),
    accent: Color::Rgb(110, 50, 220),
    link: Color::Rgb(30, 90, 200),
    h1: Color::Rgb(110, 50, 220),
    h2: Color::Rgb(30, 90, 200),
    bullet: Color::Rgb(110, 50, 220),
    code_fg: Color::Rgb(40, 90, 40),
    code_bg: Color::Rgb(238, 238, 245),
    inline_code_fg: Color::Rgb(150, 80, 20),
    inline_code_bg: Color::Rgb(232, 232, 240),
    user: Color::Rgb(20, 140, 70),
    error: Color::Rgb(200, 40, 40),
    warn: Color::Rgb(170, 120, 0),
};

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => DARK,
            Theme::Light => LIGHT,
        }
    }
}

#[cfg(test)]
mod tests;
