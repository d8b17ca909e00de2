//! Injector module: the AudioInjectorClient boundary and the command relay.
//!
//! The injection engine itself lives in the external library and is opaque.

mod error;
mod library;
mod relay;

pub use error::{Operation, RelayError};
pub use library::{DEFAULT_LIBRARY_NAME, NativeInjector};
pub use relay::{InjectionRelay, RelayOutcome, run_detached};

#[cfg(test)]
pub(crate) use relay::tests::RecordingBackend;
