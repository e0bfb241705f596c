//! Shared building blocks for the terminal radio player: playlist parsing,
//! the player control-channel wire format, ICY metadata decoding, platform
//! paths and configuration.

pub mod catalog;
pub mod config;
pub mod history;
pub mod icy;
pub mod platform;
pub mod protocol;
