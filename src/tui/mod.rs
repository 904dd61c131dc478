//! Interactive editor shell built on Ratatui.

pub mod app;
pub mod events;
pub mod handler;
pub mod theme;
pub mod ui;

pub use handler::run_tui;
pub use theme::Theme;
