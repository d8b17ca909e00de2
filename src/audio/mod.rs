//! Audio-side inputs for an injection request.
//!
//! Lists capture devices through cpal and validates the audio file path.
//! No audio is captured, decoded or played here.

mod devices;
mod file;

pub use devices::{CaptureDevice, CpalDeviceSource, DeviceError, DeviceList, DeviceSource};
pub use file::{AUDIO_EXTENSIONS, FileError, SelectedFile, select_audio_file};

#[cfg(test)]
pub(crate) use devices::tests::FakeSource;
#[cfg(test)]
pub(crate) use file::tests::temp_file;
