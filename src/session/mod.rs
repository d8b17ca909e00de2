//! Session module: the device/file selection state and the interactive menu.

mod menu;
mod state;

pub use menu::run_menu;
pub use state::InjectorSession;
