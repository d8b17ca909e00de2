//! Configuration module for the audio injector.
//!
//! Provides CLI argument parsing and configuration management.

#[allow(clippy::module_inception)]
mod config;

pub use config::{AppConfig, CancelMode, Command, parse_ratio};
