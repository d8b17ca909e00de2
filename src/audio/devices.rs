//! Capture device enumeration.
//!
//! Every refresh re-queries the audio host. Nothing is cached between refreshes.

use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// An active audio capture endpoint, identified by its friendly name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDevice {
    pub name: String,       // Friendly name, matched by the injector library
    pub is_default: bool,   // System default input device
}

/// Errors raised while listing or selecting capture devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Error loading audio devices: {0}")]
    Enumeration(String),

    #[error("No capture device at position {index} ({count} listed)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Capture device '{0}' is not in the current listing")]
    UnknownDevice(String),
}

/// Source of capture devices.
///
/// Implemented by the cpal host in production and by fakes in tests.
pub trait DeviceSource {
    /// Query the currently active capture devices.
    fn capture_devices(&self) -> Result<Vec<CaptureDevice>, DeviceError>;
}

/// Device source backed by the default cpal host (WASAPI on Windows).
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDeviceSource;

impl DeviceSource for CpalDeviceSource {
    fn capture_devices(&self) -> Result<Vec<CaptureDevice>, DeviceError> {
        let host = cpal::default_host();
        debug!("Enumerating capture devices on host {:?}", host.id());

        let default_name = host.default_input_device().as_ref().and_then(get_device_name);
        let devices = host.input_devices().map_err(|e| DeviceError::Enumeration(e.to_string()))?;

        let mut result = Vec::new();
        for (index, device) in devices.enumerate() {
            // The injector resolves devices by friendly name, so unnamed ones are unusable
            let Some(name) = get_device_name(&device) else {
                debug!("Skipping capture device {} without a readable name", index);
                continue;
            };
            let is_default = default_name.as_deref() == Some(name.as_str());
            result.push(CaptureDevice { name, is_default });
        }

        Ok(result)
    }
}

/// Get a human-readable device name, if the host exposes one.
fn get_device_name(device: &Device) -> Option<String> {
    device.description().ok().map(|desc| desc.name().to_string())
}

/// The current device listing and its selection.
#[derive(Debug, Default)]
pub struct DeviceList {
    devices: Vec<CaptureDevice>,
    selected: Option<usize>,
}

impl DeviceList {
    /// Create an empty listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-query `source` and replace the listing.
    ///
    /// The listing is cleared before querying, so a failed refresh leaves it
    /// empty. On success the first device is selected.
    ///
    /// # Returns
    /// Number of devices listed.
    pub fn refresh(&mut self, source: &dyn DeviceSource) -> Result<usize, DeviceError> {
        self.devices.clear();
        self.selected = None;

        self.devices = source.capture_devices()?;
        if !self.devices.is_empty() {
            self.selected = Some(0);
        }

        info!("Found {} capture device(s)", self.devices.len());
        Ok(self.devices.len())
    }

    /// Select a device by its zero-based position in the listing.
    pub fn select_index(&mut self, index: usize) -> Result<&CaptureDevice, DeviceError> {
        if index >= self.devices.len() {
            return Err(DeviceError::IndexOutOfRange { index, count: self.devices.len() });
        }
        self.selected = Some(index);
        Ok(&self.devices[index])
    }

    /// Select a device by name. Exact matches win over case-insensitive ones.
    pub fn select_name(&mut self, name: &str) -> Result<&CaptureDevice, DeviceError> {
        let index = self
            .devices
            .iter()
            .position(|d| d.name == name)
            .or_else(|| self.devices.iter().position(|d| d.name.eq_ignore_ascii_case(name)))
            .ok_or_else(|| DeviceError::UnknownDevice(name.to_string()))?;
        self.select_index(index)
    }

    /// Currently selected device.
    pub fn selected(&self) -> Option<&CaptureDevice> {
        self.selected.map(|i| &self.devices[i])
    }

    pub fn devices(&self) -> &[CaptureDevice] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
