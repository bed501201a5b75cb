// src/display/mod.rs
//! Renderers for the local terminal

pub mod terminal;

pub use terminal::{ChartSettings, TerminalDisplay};
