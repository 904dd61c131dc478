//! Natural Python editor shell: edit natural-language Python in the terminal
//! and run it on a remote execution service.

pub mod batch;
pub mod config;
pub mod editor;
pub mod execution;
pub mod logging;
pub mod output;
pub mod tui;
