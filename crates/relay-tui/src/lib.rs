//! relay-tui: Terminal chat widgets
//!
//! Rendering pieces for the relay chat screen, built on ratatui and
//! crossterm. The event loop itself lives in the binary.

pub mod input;
pub mod theme;
pub mod widgets;

pub use input::Action;
pub use theme::Theme;
