//! Last-resort reporting of fatal OS errors.
//!
//! A failure is rendered as exactly one line on stderr:
//!
//! - Unix: `<program>: <operation>: [<errno>] <strerror>`
//! - Windows: `<operation>: [0x<code as 8 hex digits>] <system message>`
//!
//! after which the process exits with [`WatchError::exit_code`].

use std::io::{self, Write};
use std::process;

use crate::error::WatchError;

/// Prints the diagnostic line for `err` and terminates the process.
///
/// If the system cannot describe the error code, or stderr is unusable, the
/// process still exits with the error's status, just without the line.
pub fn report(program: &str, err: &WatchError) -> ! {
    let code = err.exit_code();
    if let Some(line) = render(program, err) {
        let mut stderr = io::stderr().lock();
        if writeln!(stderr, "{line}").and_then(|()| stderr.flush()).is_err() {
            log::debug!("Could not write diagnostic to stderr");
        }
    }
    process::exit(code)
}

/// The diagnostic line for `err`, without a trailing newline.
///
/// Returns `None` when the OS has no description for the error code.
pub fn render(program: &str, err: &WatchError) -> Option<String> {
    let prefix = prefix(program, &err.step().operation());
    match err.os_code() {
        Some(code) => {
            let description = describe(code)?;
            Some(format!("{prefix}: [{}] {description}", format_code(code)))
        }
        None => {
            let source = std::error::Error::source(err)?;
            Some(format!("{prefix}: {source}"))
        }
    }
}

#[cfg(unix)]
fn prefix(program: &str, operation: &str) -> String {
    format!("{program}: {operation}")
}

#[cfg(windows)]
fn prefix(_program: &str, operation: &str) -> String {
    operation.to_string()
}

#[cfg(unix)]
fn format_code(code: i32) -> String {
    code.to_string()
}

#[cfg(windows)]
fn format_code(code: i32) -> String {
    format!("0x{:08x}", code as u32)
}

#[cfg(unix)]
fn describe(code: i32) -> Option<String> {
    Some(nix::errno::Errno::from_raw(code).desc().to_string())
}

#[cfg(windows)]
fn describe(code: i32) -> Option<String> {
    let message = windows::core::HRESULT::from_win32(code as u32).message();
    let message = message.trim_end();
    (!message.is_empty()).then(|| message.to_string())
}
