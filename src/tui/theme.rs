//! Colour themes. The choice lives only for the session.

use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub gutter: Color,
    pub editor_title: Color,
    pub output_title: Color,
    pub success: Color,
    pub failure: Color,
    pub pending: Color,
    pub gauge: Color,
    pub status_bg: Color,
    pub status_fg: Color,
}

impl Theme {
    /// Accepts `dark`/`light` in any case; anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                background: Color::Reset,
                text: Color::White,
                gutter: Color::DarkGray,
                editor_title: Color::Cyan,
                output_title: Color::Green,
                success: Color::Cyan,
                failure: Color::Red,
                pending: Color::Yellow,
                gauge: Color::Green,
                status_bg: Color::DarkGray,
                status_fg: Color::White,
            },
            Theme::Light => Palette {
                background: Color::White,
                text: Color::Black,
                gutter: Color::Gray,
                editor_title: Color::Blue,
                output_title: Color::Green,
                success: Color::Black,
                failure: Color::Red,
                pending: Color::Magenta,
                gauge: Color::Magenta,
                status_bg: Color::Gray,
                status_fg: Color::Black,
            },
        }
    }
}
