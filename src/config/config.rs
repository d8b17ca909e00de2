//! Application configuration and CLI argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::injector::DEFAULT_LIBRARY_NAME;

/// How the cancel command is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CancelMode {
    /// Report success without calling the library (the injector client's historical behaviour)
    #[default]
    Stub,
    /// Call the library's CancelInjection entry point
    Library,
}

impl std::fmt::Display for CancelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelMode::Stub => write!(f, "stub"),
            CancelMode::Library => write!(f, "library"),
        }
    }
}

/// Commands understood by the injector.
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// List active audio capture devices and exit
    Devices {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start injecting an audio file into a capture device
    Start {
        /// Capture device name (defaults to the first listed device)
        #[arg(long, short = 'd')]
        device: Option<String>,

        /// Audio file to inject (.wav, .mp3, .aac, .flac)
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Cancel audio injection
    Cancel {
        /// Capture device name (defaults to the first listed device)
        #[arg(long, short = 'd')]
        device: Option<String>,
    },

    /// Interactive menu (default)
    Interactive,
}

/// Audio injector application configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "audio-injector")]
#[command(author, version, about = "Relay audio injection requests to AudioInjectorClient", long_about = None)]
pub struct AppConfig {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path or file name of the injector client library
    #[arg(long, short = 'l', global = true, env = "AUDIO_INJECTOR_LIBRARY", default_value = DEFAULT_LIBRARY_NAME)]
    pub library: PathBuf,

    /// Cancel behaviour: 'stub' reports success without calling the library, 'library' calls CancelInjection
    #[arg(long, global = true, value_enum, env = "AUDIO_INJECTOR_CANCEL_MODE", default_value = "stub")]
    pub cancel_mode: CancelMode,

    /// Mix ratio between capture and file audio (0.0 - 1.0)
    #[arg(long, short = 'r', global = true, default_value = "0.5", value_parser = parse_ratio)]
    pub ratio: f32,

    /// Give up waiting for the injector library after this many milliseconds (0 = wait forever)
    #[arg(long, global = true, default_value = "30000")]
    pub call_timeout_ms: u64,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Command to run, defaulting to the interactive menu.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Interactive)
    }

    /// Timeout for a single library call, if any.
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.library.as_os_str().is_empty() {
            anyhow::bail!("Injector library path must not be empty");
        }

        if !(0.0..=1.0).contains(&self.ratio) {
            anyhow::bail!("Mix ratio must be between 0.0 and 1.0");
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Injector library: {}", self.library.display());
        info!("  Cancel mode: {}", self.cancel_mode);
        info!("  Mix ratio: {}", self.ratio);
        match self.call_timeout() {
            Some(timeout) => info!("  Call timeout: {}ms", timeout.as_millis()),
            None => info!("  Call timeout: none"),
        }
    }
}

/// Parse and validate a mix ratio (0.0-1.0).
pub fn parse_ratio(s: &str) -> Result<f32, String> {
    let value: f32 = s.trim().parse().map_err(|_| format!("'{}' is not a valid float", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("mix ratio must be between 0.0 and 1.0, got {}", value))
    }
}
