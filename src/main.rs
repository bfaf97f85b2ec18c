use std::process;

use startwaittree::cli::{self, Invocation};
use startwaittree::{PlatformWatcher, TreeWatcher, WatchError, diagnostic, start_and_wait};

fn main() {
    // Diagnostics are a single line by contract; extra logging is opt-in.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();

    let program = cli::program_name();
    if let Err(e) = run(&program) {
        match e.downcast_ref::<WatchError>() {
            Some(err) => diagnostic::report(&program, err),
            None => {
                eprintln!("{program}: {e:#}");
                process::exit(1);
            }
        }
    }
}

fn run(program: &str) -> anyhow::Result<()> {
    match invocation() {
        Invocation::Help => cli::print_usage(program)?,
        Invocation::Launch(target) => {
            log::debug!("Starting tree watch");
            start_and_wait::<PlatformWatcher>(&target)?;
            log::debug!("Process tree finished");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn invocation() -> Invocation<<PlatformWatcher as TreeWatcher>::Target> {
    cli::parse_args(std::env::args_os())
}

#[cfg(windows)]
fn invocation() -> Invocation<<PlatformWatcher as TreeWatcher>::Target> {
    cli::parse_command_line(&startwaittree::tree::windows::command_line())
}
