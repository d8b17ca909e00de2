//! Interactive numbered menu over an [`InjectorSession`].
//!
//! Every failure is printed and the menu stays usable. Ctrl+C or end of input
//! leaves the menu.

use std::borrow::Cow;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::state::InjectorSession;
use crate::audio::{AUDIO_EXTENSIONS, CaptureDevice, DeviceError};
use crate::config::parse_ratio;

/// One menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Refresh,
    SelectDevice,
    SelectFile,
    SetRatio,
    Start,
    Cancel,
    Exit,
}

impl FromStr for MenuChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "refresh" => Ok(MenuChoice::Refresh),
            "2" | "device" => Ok(MenuChoice::SelectDevice),
            "3" | "file" => Ok(MenuChoice::SelectFile),
            "4" | "ratio" => Ok(MenuChoice::SetRatio),
            "5" | "start" => Ok(MenuChoice::Start),
            "6" | "cancel" => Ok(MenuChoice::Cancel),
            "7" | "exit" | "quit" | "q" => Ok(MenuChoice::Exit),
            _ => Err(()),
        }
    }
}

/// Session-wide Ctrl+C flag.
///
/// A single listener is installed for the whole session. Once tokio owns
/// SIGINT the default handler is gone, so every wait in the menu has to go
/// through this flag or a Ctrl+C is lost.
struct Interrupt {
    hit: watch::Receiver<bool>,
}

impl Interrupt {
    fn ctrl_c() -> Self {
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            loop {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        println!();
                        info!("🛑 Received Ctrl+C, exiting...");
                        tx.send_replace(true);
                    }
                    Err(e) => {
                        warn!("Failed to listen for Ctrl+C: {}", e);
                        break;
                    }
                }
            }
            // Keep the sender alive so waiters are not woken by its drop
            std::future::pending::<()>().await;
        });

        Self { hit: rx }
    }

    /// Run `fut` unless Ctrl+C arrives first. `None` means interrupted.
    async fn guard<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            out = fut => Some(out),
            Ok(_) = self.hit.wait_for(|hit| *hit) => None,
        }
    }
}

/// Line source for the menu.
///
/// Stdin is read on a dedicated thread so that a pending read never holds up
/// runtime shutdown.
struct Input {
    lines: mpsc::Receiver<String>,
    interrupt: Interrupt,
}

impl Input {
    fn from_stdin(interrupt: Interrupt) -> Self {
        let (tx, rx) = mpsc::channel::<String>(1);

        std::thread::spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match stdin.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        break;
                    }
                }
                if tx.blocking_send(decode_line(&buf)).is_err() {
                    break;
                }
            }
            debug!("Input thread exiting");
        });

        Self { lines: rx, interrupt }
    }

    /// Print `text` and wait for a line. `None` means the user is leaving.
    async fn prompt(&mut self, text: &str) -> Option<String> {
        if let Err(e) = write_prompt(&mut std::io::stdout(), text) {
            debug!("Failed to write prompt: {}", e);
        }

        self.interrupt.guard(self.lines.recv()).await.flatten().map(|l| l.trim().to_string())
    }
}

/// Decode one raw input line. Invalid UTF-8 is replaced rather than ending the session.
fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    if matches!(line, Cow::Owned(_)) {
        warn!("Input line is not valid UTF-8; invalid bytes were replaced");
    }
    line.trim_end_matches(['\r', '\n']).to_string()
}

fn write_prompt(out: &mut impl Write, text: &str) -> std::io::Result<()> {
    write!(out, "{}", text)?;
    out.flush()
}

/// Run the menu until the user exits.
///
/// `initial` is the device refresh done when the session was created.
pub async fn run_menu(session: &mut InjectorSession, initial: Result<usize, DeviceError>) {
    let mut input = Input::from_stdin(Interrupt::ctrl_c());

    report_refresh(initial);

    loop {
        print_menu(session);

        let Some(line) = input.prompt("Choice: ").await else { break };
        let Ok(choice) = line.parse::<MenuChoice>() else {
            println!("Invalid choice");
            continue;
        };

        match choice {
            MenuChoice::Refresh => report_refresh(session.refresh_devices()),
            MenuChoice::SelectDevice => {
                print_devices(session);
                if session.devices().is_empty() {
                    continue;
                }
                let Some(selector) = input.prompt("Device number or name: ").await else { break };
                if selector.is_empty() {
                    continue;
                }
                match session.select_device(&selector) {
                    Ok(device) => println!("Selected device: {}", device.name),
                    Err(e) => println!("{}", e),
                }
            }
            MenuChoice::SelectFile => {
                let prompt = format!("Audio file path ({}): ", AUDIO_EXTENSIONS.iter().map(|e| format!(".{e}")).collect::<Vec<_>>().join(", "));
                let Some(path) = input.prompt(&prompt).await else { break };
                // Empty input keeps the current file, like dismissing a file dialog
                if path.is_empty() {
                    continue;
                }
                match session.select_file(&PathBuf::from(strip_quotes(&path))) {
                    Ok(file) => println!("Selected file: {}", file),
                    Err(e) => println!("{}", e),
                }
            }
            MenuChoice::SetRatio => {
                let Some(value) = input.prompt("Mix ratio (0.0-1.0): ").await else { break };
                match parse_ratio(&value) {
                    Ok(ratio) => session.set_mix_ratio(ratio),
                    Err(e) => println!("Invalid mix ratio: {}", e),
                }
            }
            MenuChoice::Start => {
                let Some(result) = input.interrupt.guard(session.start()).await else { break };
                match result {
                    Ok(outcome) => println!("{}", outcome),
                    Err(e) => println!("{}", e),
                }
            }
            MenuChoice::Cancel => {
                let Some(result) = input.interrupt.guard(session.cancel()).await else { break };
                match result {
                    Ok(outcome) => println!("{}", outcome),
                    Err(e) => println!("{}", e),
                }
            }
            MenuChoice::Exit => break,
        }
    }

    println!("Exiting...");
}

fn report_refresh(result: Result<usize, DeviceError>) {
    match result {
        Ok(0) => println!("No active capture devices found."),
        Ok(count) => println!("Found {} capture device(s).", count),
        Err(e) => println!("{}", e),
    }
}

fn print_menu(session: &InjectorSession) {
    let device = session.devices().selected().map(|d| d.name.as_str()).unwrap_or("none");
    let file = session.selected_file().map(|f| f.to_string()).unwrap_or_else(|| "No audio selected".to_string());

    println!();
    println!("Audio Injector");
    println!("{}", "─".repeat(40));
    println!("Device:    {}", device);
    println!("File:      {}", file);
    println!("Mix ratio: {}", session.mix_ratio());
    println!("{}", "─".repeat(40));
    println!("1. Refresh devices");
    println!("2. Select device");
    println!("3. Select audio file");
    println!("4. Set mix ratio");
    println!("5. Start injection");
    println!("6. Cancel injection");
    println!("7. Exit");
}

fn print_devices(session: &InjectorSession) {
    let devices = session.devices();
    if devices.is_empty() {
        println!("No capture devices listed. Refresh first.");
        return;
    }

    let selected = devices.selected();
    for (i, device) in devices.devices().iter().enumerate() {
        println!("{}", device_line(i, device, selected == Some(device)));
    }
}

/// One line of the device listing, numbered from 1.
pub fn device_line(index: usize, device: &CaptureDevice, selected: bool) -> String {
    let marker = if selected { "*" } else { " " };
    let default = if device.is_default { " (default)" } else { "" };
    format!("{} {:>2}. {}{}", marker, index + 1, device.name, default)
}

/// Remove one pair of surrounding quotes, as added by "Copy as path".
pub fn strip_quotes(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_choice_parsing() {
        assert_eq!("1".parse::<MenuChoice>(), Ok(MenuChoice::Refresh));
        assert_eq!(" 5 ".parse::<MenuChoice>(), Ok(MenuChoice::Start));
        assert_eq!("Cancel".parse::<MenuChoice>(), Ok(MenuChoice::Cancel));
        assert_eq!("q".parse::<MenuChoice>(), Ok(MenuChoice::Exit));
        assert_eq!("8".parse::<MenuChoice>(), Err(()));
        assert_eq!("".parse::<MenuChoice>(), Err(()));
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"C:\\Music\\speech.wav\""), "C:\\Music\\speech.wav");
        assert_eq!(strip_quotes("'/tmp/a b.wav'"), "/tmp/a b.wav");
        assert_eq!(strip_quotes("  /tmp/a.wav "), "/tmp/a.wav");
        assert_eq!(strip_quotes("\"unbalanced"), "\"unbalanced");
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"5\r\n"), "5");
        assert_eq!(decode_line(b"exit"), "exit");

        // Invalid bytes do not end the session; the rest of the line survives
        let line = decode_line(b"C:\\Music\\\xFFspeech.wav\n");
        assert_eq!(line, "C:\\Music\\\u{FFFD}speech.wav");
    }

    struct FailingFlush(Vec<u8>);

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_write_prompt() {
        let mut out = Vec::new();
        write_prompt(&mut out, "Choice: ").unwrap();
        assert_eq!(out, b"Choice: ");

        let mut out = FailingFlush(Vec::new());
        let err = write_prompt(&mut out, "Choice: ").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        assert_eq!(out.0, b"Choice: ");
    }

    fn manual_interrupt() -> (watch::Sender<bool>, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (tx, Interrupt { hit: rx })
    }

    #[tokio::test]
    async fn test_interrupt_passes_through_results() {
        let (_tx, mut interrupt) = manual_interrupt();
        assert_eq!(interrupt.guard(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_interrupt_during_pending_call() {
        let (tx, mut interrupt) = manual_interrupt();

        // Ctrl+C arrives while a library call is still running
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            tx.send_replace(true);
            tx
        });
        assert_eq!(interrupt.guard(std::future::pending::<()>()).await, None);

        // Later waits still see it
        let _tx = trigger.await.unwrap();
        assert_eq!(interrupt.guard(std::future::pending::<()>()).await, None);
        assert_eq!(interrupt.guard(std::future::pending::<()>()).await, None);
    }

    #[tokio::test]
    async fn test_closed_listener_does_not_interrupt() {
        let (tx, mut interrupt) = manual_interrupt();
        drop(tx);

        let waited = tokio::time::timeout(std::time::Duration::from_millis(50), interrupt.guard(std::future::pending::<()>())).await;
        assert!(waited.is_err());
        assert_eq!(interrupt.guard(async { 1 }).await, Some(1));
    }

    #[test]
    fn test_device_line() {
        let device = CaptureDevice { name: "Microphone".to_string(), is_default: true };
        assert_eq!(device_line(0, &device, true), "*  1. Microphone (default)");

        let device = CaptureDevice { name: "Line In".to_string(), is_default: false };
        assert_eq!(device_line(11, &device, false), "  12. Line In");
    }
}
