//! Audio Injector - lists audio capture devices and relays injection requests.
//!
//! Audio injection itself is performed by the external AudioInjectorClient
//! library. This program picks the capture device and the audio file, calls
//! the library's entry points and reports their status codes.

mod audio;
mod config;
mod injector;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use audio::{CpalDeviceSource, DeviceList, DeviceSource, select_audio_file};
use config::{AppConfig, Command};
use injector::{InjectionRelay, NativeInjector, Operation, RelayError, RelayOutcome, run_detached};
use session::{InjectorSession, run_menu};

/// Print the active capture devices.
///
/// # Returns
/// `true` if the devices could be listed (even if there are none).
fn list_devices(json: bool) -> Result<bool> {
    let mut devices = DeviceList::new();
    if let Err(e) = devices.refresh(&CpalDeviceSource) {
        println!("{}", e);
        return Ok(false);
    }

    if json {
        let listing = serde_json::to_string_pretty(devices.devices()).context("Failed to serialize device listing")?;
        println!("{}", listing);
    } else if devices.is_empty() {
        println!("No active capture devices found.");
    } else {
        for device in devices.devices() {
            let default = if device.is_default { " (default)" } else { "" };
            println!("{}{}", device.name, default);
        }
    }

    Ok(true)
}

/// Resolve the device for a one-shot command.
///
/// An explicit name is used as given; otherwise the first listed device is
/// taken, as the listing preselects it.
fn resolve_device(explicit: Option<String>, source: &dyn DeviceSource) -> Option<String> {
    let mut devices = DeviceList::new();
    let refreshed = devices.refresh(source);

    match explicit {
        Some(name) => {
            if refreshed.is_ok() && devices.devices().iter().all(|d| d.name != name) {
                warn!("\"{}\" is not an active capture device; passing it to the injector anyway", name);
            }
            Some(name)
        }
        None => {
            if let Err(e) = refreshed {
                println!("{}", e);
            }
            devices.selected().map(|d| d.name.clone())
        }
    }
}

/// Print a relay result.
///
/// # Returns
/// `true` if the operation succeeded.
fn report(result: Result<RelayOutcome, RelayError>) -> bool {
    match result {
        Ok(outcome) => {
            println!("{}", outcome);
            outcome.is_success()
        }
        Err(e) => {
            println!("{}", e);
            false
        }
    }
}

async fn start_once(
    config: &AppConfig,
    relay: Arc<InjectionRelay>,
    source: &dyn DeviceSource,
    device: Option<String>,
    file: Option<PathBuf>,
) -> bool {
    // Validate the file before touching devices, matching the relay's precondition order
    let file = match file {
        Some(path) => match select_audio_file(&path) {
            Ok(selected) => Some(selected.path().to_path_buf()),
            Err(e) => return report(Err(e.into())),
        },
        None => None,
    };
    let device = if file.is_some() { resolve_device(device, source) } else { device };
    let ratio = config.ratio;

    let result = run_detached(Operation::Injection, config.call_timeout(), move || {
        relay.start(device.as_deref(), file.as_deref(), ratio)
    })
    .await;
    report(result)
}

async fn cancel_once(config: &AppConfig, relay: Arc<InjectionRelay>, source: &dyn DeviceSource, device: Option<String>) -> bool {
    let device = resolve_device(device, source);
    let result = run_detached(Operation::Cancellation, config.call_timeout(), move || relay.cancel(device.as_deref())).await;
    report(result)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info.
    // Logs go to stderr so stdout only carries messages and listings.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| if config.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("info") })
        .context("Invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(2);
    }

    info!("🎙️ Audio Injector v{}", env!("CARGO_PKG_VERSION"));
    config.log_config();

    let backend = Arc::new(NativeInjector::new(config.library.clone()));
    let relay = Arc::new(InjectionRelay::new(backend, config.cancel_mode));

    let ok = match config.command() {
        Command::Devices { json } => list_devices(json)?,
        Command::Start { device, file } => start_once(&config, relay, &CpalDeviceSource, device, file).await,
        Command::Cancel { device } => cancel_once(&config, relay, &CpalDeviceSource, device).await,
        Command::Interactive => {
            let (mut session, loaded) = InjectorSession::new(Box::new(CpalDeviceSource), relay, config.ratio, config.call_timeout());
            run_menu(&mut session, loaded).await;
            true
        }
    };

    // Exit without waiting on a library call that timed out and still holds a worker
    std::process::exit(if ok { 0 } else { 1 });
}
