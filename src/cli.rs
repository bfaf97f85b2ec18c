//! Turning the watcher's own invocation into "show help" or "launch this".

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;

use anstyle::Style;
use clap::Parser;

use crate::cmdline;

/// Help tokens accepted as the first argument of a pre-split argument vector.
pub const HELP_FLAGS: &[&str] = &["-h", "--help"];

/// Help tokens accepted as the complete tail of a raw command line.
pub const HELP_SWITCHES: &[&str] = &["-?", "-h", "-H", "/?", "/h", "/H"];

const DEFAULT_NAME: &str = "startwaittree";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation<T> {
    Help,
    Launch(T),
}

/// Everything after our own name, passed through to the target untouched.
///
/// Help and version flags are disabled so `-h`/`--version` further down the
/// line reach the target program instead of being eaten here.
#[derive(Parser, Debug)]
#[command(name = "startwaittree")]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Args {
    /// Program to run, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<OsString>,
}

/// Interprets a pre-split argument vector (including our own name at index 0).
///
/// Help is shown when there is no target, or when the first argument is one
/// of [`HELP_FLAGS`]. Everything from index 1 on is the target's argument
/// vector verbatim, including any `--`.
pub fn parse_args<I, T>(args: I) -> Invocation<Vec<OsString>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    match args.get(1) {
        None => return Invocation::Help,
        Some(first) if HELP_FLAGS.iter().any(|flag| first.as_os_str() == *flag) => {
            return Invocation::Help;
        }
        Some(_) => {}
    }

    // clap only ever sees the separator inserted here, so a `--` typed by
    // the user reaches the target untouched.
    let mut args = args.into_iter();
    let own_name = args.next().unwrap_or_else(|| DEFAULT_NAME.into());
    let parsed = Args::parse_from([own_name, "--".into()].into_iter().chain(args));
    if parsed.command.is_empty() {
        Invocation::Help
    } else {
        Invocation::Launch(parsed.command)
    }
}

/// Interprets a raw UTF-16 command line (including our own name).
///
/// The returned tail is exactly what followed our name, minus the separating
/// spaces. Help is shown for an empty tail or a tail that is exactly one of
/// [`HELP_SWITCHES`].
pub fn parse_command_line(line: &[u16]) -> Invocation<Vec<u16>> {
    let tail = cmdline::wide_tail(line);
    if tail.is_empty() || is_help_switch(tail) {
        Invocation::Help
    } else {
        Invocation::Launch(tail.to_vec())
    }
}

fn is_help_switch(tail: &[u16]) -> bool {
    HELP_SWITCHES
        .iter()
        .any(|switch| switch.encode_utf16().eq(tail.iter().copied()))
}

/// Our own name, for the usage and diagnostic lines.
pub fn program_name() -> String {
    display_name(std::env::args_os().next())
}

/// Unix shows `argv[0]` exactly as invoked; Windows shows the file name.
fn display_name(argv0: Option<OsString>) -> String {
    let argv0 = argv0.filter(|name| !name.is_empty());
    let name = if cfg!(windows) {
        argv0
            .as_deref()
            .map(Path::new)
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    } else {
        argv0.map(|name| name.to_string_lossy().into_owned())
    };
    name.unwrap_or_else(|| DEFAULT_NAME.to_string())
}

/// The usage text: a synopsis line, a blank separator and a description.
pub fn usage(program: &str) -> String {
    let bold = Style::new().bold();
    format!(
        "{bold}Usage:{bold:#} {program} PROGRAM [ARGUMENT...]\n\n\
         Starts a program with the given arguments and waits until it and all its descendants have terminated."
    )
}

pub fn print_usage(program: &str) -> std::io::Result<()> {
    let mut stdout = anstream::stdout();
    writeln!(stdout, "{}", usage(program))?;
    stdout.flush()
}
