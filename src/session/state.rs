//! Injector session state: device listing, selected file and mix ratio.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::audio::{CaptureDevice, DeviceError, DeviceList, DeviceSource, FileError, SelectedFile, select_audio_file};
use crate::injector::{InjectionRelay, Operation, RelayError, RelayOutcome, run_detached};

/// State behind one interactive session.
pub struct InjectorSession {
    source: Box<dyn DeviceSource>,     // Where device listings come from
    devices: DeviceList,               // Current listing and selection
    selected_file: Option<SelectedFile>,
    mix_ratio: f32,
    relay: Arc<InjectionRelay>,
    call_timeout: Option<Duration>,    // Bound on a single library call
}

impl InjectorSession {
    /// Create a session and load its device listing.
    ///
    /// The session is usable even when the first refresh fails; the returned
    /// result is what the caller reports to the user.
    pub fn new(
        source: Box<dyn DeviceSource>,
        relay: Arc<InjectionRelay>,
        mix_ratio: f32,
        call_timeout: Option<Duration>,
    ) -> (Self, Result<usize, DeviceError>) {
        let mut session = Self { source, devices: DeviceList::new(), selected_file: None, mix_ratio, relay, call_timeout };
        let loaded = session.refresh_devices();
        (session, loaded)
    }

    /// Re-query the capture devices. A failure leaves the listing empty.
    pub fn refresh_devices(&mut self) -> Result<usize, DeviceError> {
        self.devices.refresh(self.source.as_ref())
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    /// Select a device by 1-based position or by name.
    pub fn select_device(&mut self, selector: &str) -> Result<&CaptureDevice, DeviceError> {
        let selector = selector.trim();
        match selector.parse::<usize>() {
            Ok(position) if position >= 1 => self.devices.select_index(position - 1),
            _ => self.devices.select_name(selector),
        }
    }

    /// Select the audio file to inject. The previous selection is kept on error.
    pub fn select_file(&mut self, path: &Path) -> Result<&SelectedFile, FileError> {
        let file = select_audio_file(path)?;
        Ok(&*self.selected_file.insert(file))
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected_file.as_ref()
    }

    pub fn mix_ratio(&self) -> f32 {
        self.mix_ratio
    }

    pub fn set_mix_ratio(&mut self, ratio: f32) {
        debug!("Mix ratio set to {}", ratio);
        self.mix_ratio = ratio;
    }

    /// Start injecting the selected file into the selected device.
    pub async fn start(&self) -> Result<RelayOutcome, RelayError> {
        let relay = self.relay.clone();
        let device = self.devices.selected().map(|d| d.name.clone());
        let file = self.selected_file.as_ref().map(|f| f.path().to_path_buf());
        let ratio = self.mix_ratio;

        run_detached(Operation::Injection, self.call_timeout, move || {
            relay.start(device.as_deref(), file.as_deref(), ratio)
        })
        .await
    }

    /// Cancel injection on the selected device.
    pub async fn cancel(&self) -> Result<RelayOutcome, RelayError> {
        let relay = self.relay.clone();
        let device = self.devices.selected().map(|d| d.name.clone());

        run_detached(Operation::Cancellation, self.call_timeout, move || relay.cancel(device.as_deref())).await
    }
}
