//! Injection command relay.
//!
//! Checks the preconditions of a start or cancel request, forwards it to the
//! injector backend and turns the status code into a user-facing outcome.
//! Result codes are never interpreted beyond zero versus nonzero.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::CancelMode;

use super::error::{InjectorError, Operation, RelayError};
use super::library::HResult;

/// A single injection request, passed by value to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionRequest {
    pub device_name: String, // Capture device friendly name
    pub file_path: PathBuf,  // Absolute path of the audio file
    pub mix_ratio: f32,      // 0.0 (capture only) to 1.0 (file only)
}

/// The external injector, as seen by the relay.
pub trait InjectionBackend: Send + Sync {
    /// Ask the injector to start feeding the file into the device.
    fn start_injection(&self, request: &InjectionRequest) -> Result<HResult, InjectorError>;

    /// Ask the injector to stop injecting.
    fn cancel_injection(&self, device_name: &str) -> Result<HResult, InjectorError>;
}

/// Successful relay result: the backend was reached and answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Started,
    Cancelled,
    Failed { op: Operation, code: HResult },
}

impl RelayOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RelayOutcome::Failed { .. })
    }
}

impl std::fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayOutcome::Started => write!(f, "Audio injection initiated successfully using AudioInjectorClient."),
            RelayOutcome::Cancelled => write!(f, "Audio injection cancelled."),
            RelayOutcome::Failed { op, code } => {
                write!(f, "Audio {} failed with error code: {} (0x{:08X})", op, code, *code as u32)
            }
        }
    }
}

/// Forwards start and cancel commands to an [`InjectionBackend`].
pub struct InjectionRelay {
    backend: Arc<dyn InjectionBackend>,
    cancel_mode: CancelMode,
}

impl InjectionRelay {
    pub fn new(backend: Arc<dyn InjectionBackend>, cancel_mode: CancelMode) -> Self {
        Self { backend, cancel_mode }
    }

    /// Start injecting `file` into `device`.
    ///
    /// # Errors
    /// - [`RelayError::MissingAudioFile`] if no file is given (checked first)
    /// - [`RelayError::MissingDevice`] if no device is given
    /// - [`RelayError::Boundary`] if the library or entry point is missing
    pub fn start(&self, device: Option<&str>, file: Option<&Path>, mix_ratio: f32) -> Result<RelayOutcome, RelayError> {
        let file = file.filter(|f| !f.as_os_str().is_empty()).ok_or(RelayError::MissingAudioFile)?;
        let device = device.filter(|d| !d.is_empty()).ok_or(RelayError::MissingDevice)?;

        let request = InjectionRequest { device_name: device.to_string(), file_path: file.to_path_buf(), mix_ratio };

        info!("Starting injection of {} into \"{}\" (mix ratio {})", file.display(), device, mix_ratio);
        let code = self.backend.start_injection(&request).map_err(|source| boundary(Operation::Injection, source))?;

        Ok(Self::outcome(Operation::Injection, code))
    }

    /// Cancel injection on `device`.
    ///
    /// In [`CancelMode::Stub`] the backend is never called and success is
    /// always reported once a device is given.
    pub fn cancel(&self, device: Option<&str>) -> Result<RelayOutcome, RelayError> {
        let device = device.filter(|d| !d.is_empty()).ok_or(RelayError::MissingDevice)?;

        let code = match self.cancel_mode {
            CancelMode::Stub => {
                warn!("Cancel is not wired to the injector library (use --cancel-mode library); reporting success for \"{}\"", device);
                0
            }
            CancelMode::Library => {
                info!("Cancelling injection on \"{}\"", device);
                self.backend.cancel_injection(device).map_err(|source| boundary(Operation::Cancellation, source))?
            }
        };

        Ok(Self::outcome(Operation::Cancellation, code))
    }

    fn outcome(op: Operation, code: HResult) -> RelayOutcome {
        if code == 0 {
            debug!("Audio {} returned 0", op);
            match op {
                Operation::Injection => RelayOutcome::Started,
                Operation::Cancellation => RelayOutcome::Cancelled,
            }
        } else {
            warn!("Audio {} returned HRESULT 0x{:08X}", op, code as u32);
            RelayOutcome::Failed { op, code }
        }
    }
}

fn boundary(op: Operation, source: InjectorError) -> RelayError {
    match source.reason() {
        Some(reason) => warn!("Audio {} failed at the library boundary: {}", op, reason),
        None => warn!("Audio {} rejected before the library call: {}", op, source),
    }
    RelayError::Boundary { op, source }
}

/// Run a relay call on a blocking worker, optionally bounded by `timeout`.
///
/// The native call cannot be interrupted: on timeout it keeps running on its
/// worker and only the caller stops waiting.
pub async fn run_detached<F>(op: Operation, timeout: Option<Duration>, call: F) -> Result<RelayOutcome, RelayError>
where
    F: FnOnce() -> Result<RelayOutcome, RelayError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(call);

    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, handle).await.map_err(|_| {
            warn!("Audio {} did not return within {:?}", op, limit);
            RelayError::TimedOut { op, after: limit }
        })?,
        None => handle.await,
    };

    joined.map_err(|e| RelayError::Worker { op, reason: e.to_string() })?
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use parking_lot::Mutex;

    /// Backend that records calls and answers with fixed results.
    pub(crate) struct RecordingBackend {
        pub start_result: Result<HResult, fn() -> InjectorError>,
        pub cancel_result: HResult,
        pub delay: Duration,
        pub starts: Mutex<Vec<InjectionRequest>>,
        pub cancels: Mutex<Vec<String>>,
    }

    impl RecordingBackend {
        pub(crate) fn returning(code: HResult) -> Self {
            Self {
                start_result: Ok(code),
                cancel_result: code,
                delay: Duration::ZERO,
                starts: Mutex::new(Vec::new()),
                cancels: Mutex::new(Vec::new()),
            }
        }
    }

    impl InjectionBackend for RecordingBackend {
        fn start_injection(&self, request: &InjectionRequest) -> Result<HResult, InjectorError> {
            std::thread::sleep(self.delay);
            self.starts.lock().push(request.clone());
            self.start_result.map_err(|make| make())
        }

        fn cancel_injection(&self, device_name: &str) -> Result<HResult, InjectorError> {
            self.cancels.lock().push(device_name.to_string());
            Ok(self.cancel_result)
        }
    }

    fn relay(backend: &Arc<RecordingBackend>, mode: CancelMode) -> InjectionRelay {
        InjectionRelay::new(backend.clone(), mode)
    }

    #[test]
    fn test_start_without_file_never_calls_backend() {
        let backend = Arc::new(RecordingBackend::returning(0));
        let relay = relay(&backend, CancelMode::Stub);

        let err = relay.start(Some("Microphone"), None, 0.5).unwrap_err();
        assert_eq!(err.to_string(), "Please select an audio file first.");

        let err = relay.start(Some("Microphone"), Some(Path::new("")), 0.5).unwrap_err();
        assert!(matches!(err, RelayError::MissingAudioFile));

        // File is checked before device
        let err = relay.start(None, None, 0.5).unwrap_err();
        assert!(matches!(err, RelayError::MissingAudioFile));

        assert!(backend.starts.lock().is_empty());
    }

    #[test]
    fn test_start_without_device_never_calls_backend() {
        let backend = Arc::new(RecordingBackend::returning(0));
        let relay = relay(&backend, CancelMode::Stub);

        let err = relay.start(None, Some(Path::new("/music/a.wav")), 0.5).unwrap_err();
        assert_eq!(err.to_string(), "Please select a capture device.");
        let err = relay.start(Some(""), Some(Path::new("/music/a.wav")), 0.5).unwrap_err();
        assert!(matches!(err, RelayError::MissingDevice));

        assert!(backend.starts.lock().is_empty());
    }

    #[test]
    fn test_start_success() {
        let backend = Arc::new(RecordingBackend::returning(0));
        let relay = relay(&backend, CancelMode::Stub);

        let outcome = relay.start(Some("Microphone"), Some(Path::new("/music/a.wav")), 0.25).unwrap();
        assert_eq!(outcome, RelayOutcome::Started);
        assert!(outcome.is_success());
        assert_eq!(outcome.to_string(), "Audio injection initiated successfully using AudioInjectorClient.");

        let starts = backend.starts.lock();
        assert_eq!(starts.len(), 1);
        assert_eq!(
            starts[0],
            InjectionRequest { device_name: "Microphone".into(), file_path: PathBuf::from("/music/a.wav"), mix_ratio: 0.25 }
        );
    }

    #[test]
    fn test_start_failure_code_is_passed_through() {
        // E_INVALIDARG
        let code = 0x8007_0057_u32 as i32;
        let backend = Arc::new(RecordingBackend::returning(code));
        let relay = relay(&backend, CancelMode::Stub);

        let outcome = relay.start(Some("Microphone"), Some(Path::new("/music/a.wav")), 0.5).unwrap();
        assert_eq!(outcome, RelayOutcome::Failed { op: Operation::Injection, code });
        assert!(!outcome.is_success());
        let message = outcome.to_string();
        assert!(message.starts_with("Audio injection failed with error code: "));
        assert!(message.contains(&code.to_string()));
        assert!(message.contains("0x80070057"));

        let backend = Arc::new(RecordingBackend::returning(7));
        let outcome = InjectionRelay::new(backend, CancelMode::Stub).start(Some("Mic"), Some(Path::new("a.wav")), 0.5).unwrap();
        assert!(outcome.to_string().contains(": 7 "));
    }

    #[test]
    fn test_start_boundary_error() {
        let mut backend = RecordingBackend::returning(0);
        backend.start_result = Err(|| InjectorError::EntryPointNotFound {
            symbol: "StartInjection",
            library: "AudioInjectorClient.dll".into(),
            reason: "undefined symbol".into(),
        });
        let relay = InjectionRelay::new(Arc::new(backend), CancelMode::Stub);

        let err = relay.start(Some("Microphone"), Some(Path::new("/music/a.wav")), 0.5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error during audio injection: The StartInjection function was not found in AudioInjectorClient.dll."
        );
    }

    #[test]
    fn test_stub_cancel_always_succeeds() {
        let backend = Arc::new(RecordingBackend::returning(5));
        let relay = relay(&backend, CancelMode::Stub);

        assert_eq!(relay.cancel(Some("Any Device At All")).unwrap(), RelayOutcome::Cancelled);
        assert!(backend.cancels.lock().is_empty());
    }

    #[test]
    fn test_cancel_without_device() {
        let backend = Arc::new(RecordingBackend::returning(0));
        for mode in [CancelMode::Stub, CancelMode::Library] {
            let err = relay(&backend, mode).cancel(None).unwrap_err();
            assert_eq!(err.to_string(), "Please select a capture device.");
            assert!(matches!(relay(&backend, mode).cancel(Some("")), Err(RelayError::MissingDevice)));
        }
        assert!(backend.cancels.lock().is_empty());
    }

    #[test]
    fn test_library_cancel_reaches_backend() {
        let backend = Arc::new(RecordingBackend::returning(0));
        assert_eq!(relay(&backend, CancelMode::Library).cancel(Some("Microphone")).unwrap(), RelayOutcome::Cancelled);
        assert_eq!(backend.cancels.lock().as_slice(), ["Microphone".to_string()]);

        let backend = Arc::new(RecordingBackend::returning(-1));
        let outcome = relay(&backend, CancelMode::Library).cancel(Some("Microphone")).unwrap();
        assert!(outcome.to_string().starts_with("Audio cancellation failed with error code: -1"));
    }

    #[tokio::test]
    async fn test_detached_call_returns_outcome() {
        let backend = Arc::new(RecordingBackend::returning(0));
        let relay = Arc::new(relay(&backend, CancelMode::Stub));

        let outcome = run_detached(Operation::Injection, Some(Duration::from_secs(5)), move || {
            relay.start(Some("Microphone"), Some(Path::new("/music/a.wav")), 0.5)
        })
        .await
        .unwrap();
        assert_eq!(outcome, RelayOutcome::Started);
    }

    #[tokio::test]
    async fn test_detached_call_times_out() {
        let mut backend = RecordingBackend::returning(0);
        backend.delay = Duration::from_millis(500);
        let relay = Arc::new(InjectionRelay::new(Arc::new(backend), CancelMode::Stub));

        let err = run_detached(Operation::Injection, Some(Duration::from_millis(20)), move || {
            relay.start(Some("Microphone"), Some(Path::new("/music/a.wav")), 0.5)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::TimedOut { op: Operation::Injection, .. }));
    }

    #[tokio::test]
    async fn test_detached_call_propagates_relay_error() {
        let backend = Arc::new(RecordingBackend::returning(0));
        let relay = Arc::new(relay(&backend, CancelMode::Stub));

        let err = run_detached(Operation::Cancellation, None, move || relay.cancel(None)).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingDevice));
    }
}
