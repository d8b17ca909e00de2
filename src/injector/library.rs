//! Dynamic binding to the AudioInjectorClient native library.
//!
//! The library is loaded with libloading on first use. Entry points are looked
//! up on every call so that a missing `CancelInjection` never affects start.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::error::InjectorError;
use super::relay::{InjectionBackend, InjectionRequest};

/// Status code returned by the entry points (a Windows HRESULT).
pub type HResult = i32;

/// Default library file name.
pub const DEFAULT_LIBRARY_NAME: &str = "AudioInjectorClient.dll";

const START_SYMBOL: &str = "StartInjection";
const CANCEL_SYMBOL: &str = "CancelInjection";

/// `HRESULT StartInjection(LPCWSTR deviceName, LPCWSTR filePath, float ratio)`
type StartInjectionFn = unsafe extern "C" fn(device_name: *const u16, file_path: *const u16, ratio: f32) -> HResult;

/// `HRESULT CancelInjection()`
type CancelInjectionFn = unsafe extern "C" fn() -> HResult;

/// Injector backend calling into the native library.
pub struct NativeInjector {
    path: PathBuf,                         // Configured library path or bare file name
    library: Mutex<Option<Arc<Library>>>,  // Loaded lazily, kept for the process lifetime
}

impl NativeInjector {
    /// Create a backend for the library at `path`. Nothing is loaded yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), library: Mutex::new(None) }
    }

    /// File name used in user-facing messages.
    fn display_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| DEFAULT_LIBRARY_NAME.to_string())
    }

    /// Get the loaded library, loading it if needed.
    ///
    /// Failed loads are not cached, so a library installed later is picked up
    /// on the next call.
    fn library(&self) -> Result<Arc<Library>, InjectorError> {
        let mut slot = self.library.lock();
        if let Some(library) = slot.as_ref() {
            return Ok(library.clone());
        }

        let path = resolve_library_path(&self.path);
        debug!("Loading injector library from {}", path.display());

        // SAFETY: loading runs the library's initialisers; the injector client has no
        // requirements beyond being loaded once per process, which the slot guarantees.
        let library = unsafe { Library::new(&path) }
            .map_err(|e| InjectorError::LibraryNotFound { library: self.display_name(), reason: e.to_string() })?;

        info!("Loaded injector library from {}", path.display());
        let library = Arc::new(library);
        *slot = Some(library.clone());
        Ok(library)
    }

    fn entry_point_error(&self, symbol: &'static str, e: libloading::Error) -> InjectorError {
        InjectorError::EntryPointNotFound { symbol, library: self.display_name(), reason: e.to_string() }
    }
}

impl InjectionBackend for NativeInjector {
    fn start_injection(&self, request: &InjectionRequest) -> Result<HResult, InjectorError> {
        let device_name = to_wide(&request.device_name, "device name")?;
        let file_path = path_to_wide(&request.file_path, "file path")?;

        let library = self.library()?;

        // SAFETY: the signature matches the exported StartInjection declaration. Both strings
        // are NUL-terminated and outlive the call.
        unsafe {
            let start = library
                .get::<StartInjectionFn>(symbol_name(START_SYMBOL).as_bytes())
                .map_err(|e| self.entry_point_error(START_SYMBOL, e))?;
            debug!("Calling {}(\"{}\", \"{}\", {})", START_SYMBOL, request.device_name, request.file_path.display(), request.mix_ratio);
            Ok(start(device_name.as_ptr(), file_path.as_ptr(), request.mix_ratio))
        }
    }

    fn cancel_injection(&self, device_name: &str) -> Result<HResult, InjectorError> {
        let library = self.library()?;

        // SAFETY: the signature matches the exported CancelInjection declaration.
        unsafe {
            let cancel = library
                .get::<CancelInjectionFn>(symbol_name(CANCEL_SYMBOL).as_bytes())
                .map_err(|e| self.entry_point_error(CANCEL_SYMBOL, e))?;
            // The library cancels every active injection; the device only scopes the request
            debug!("Calling {}() for device \"{}\"", CANCEL_SYMBOL, device_name);
            Ok(cancel())
        }
    }
}

/// NUL-terminated symbol name for `Library::get`.
fn symbol_name(symbol: &str) -> String {
    format!("{symbol}\0")
}

/// Encode `value` as a NUL-terminated UTF-16 string.
///
/// # Errors
/// Returns [`InjectorError::InvalidString`] if `value` contains a NUL, which
/// would silently truncate the string on the other side.
pub fn to_wide(value: &str, field: &'static str) -> Result<Vec<u16>, InjectorError> {
    if value.contains('\0') {
        return Err(InjectorError::InvalidString { field });
    }
    Ok(value.encode_utf16().chain(std::iter::once(0)).collect())
}

/// Encode a path as a NUL-terminated UTF-16 string without going through `str`.
///
/// On Windows the native wide form is passed through unchanged, so paths that
/// are not valid Unicode still name the same file.
#[cfg(windows)]
pub fn path_to_wide(path: &Path, field: &'static str) -> Result<Vec<u16>, InjectorError> {
    use std::os::windows::ffi::OsStrExt;

    let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
    if wide.contains(&0) {
        return Err(InjectorError::InvalidString { field });
    }
    wide.push(0);
    Ok(wide)
}

/// Encode a path as a NUL-terminated UTF-16 string.
///
/// Other platforms have no wide path form; the library only exists on Windows.
#[cfg(not(windows))]
pub fn path_to_wide(path: &Path, field: &'static str) -> Result<Vec<u16>, InjectorError> {
    to_wide(&path.to_string_lossy(), field)
}

/// Resolve where to load the library from.
///
/// Paths with a directory component are used as given. A bare file name is
/// looked up next to the executable, then in the working directory, and
/// finally left to the platform loader's search order.
pub fn resolve_library_path(configured: &Path) -> PathBuf {
    let has_dir = configured.parent().is_some_and(|p| !p.as_os_str().is_empty());
    if has_dir {
        return configured.to_path_buf();
    }

    let search_paths = [
        std::env::current_exe().ok().and_then(|p| p.parent().map(|dir| dir.join(configured))),
        std::env::current_dir().ok().map(|dir| dir.join(configured)),
    ];

    for path in search_paths.iter().flatten() {
        if path.exists() {
            return path.clone();
        }
    }

    configured.to_path_buf()
}
