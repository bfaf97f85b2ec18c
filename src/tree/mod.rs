//! Launching a program and waiting for its whole process tree.
//!
//! Each platform has exactly one way of noticing that a process and all of
//! its descendants are gone, so [`TreeWatcher`] has one implementation per
//! build, exported as [`PlatformWatcher`]:
//!
//! - Unix ([`unix::PipeWatcher`]): the target inherits the write end of a
//!   pipe, and so does everything it spawns. Once the last holder exits the
//!   read end reports end-of-file.
//! - Windows ([`windows::JobWatcher`]): the target is started suspended,
//!   placed in a job object whose completion port reports when the job's
//!   active process count drops to zero, and only then resumed.
//!
//! In both cases tracking is in place before the target runs a single
//! instruction, so nothing it spawns can slip through.

use crate::error::WatchError;

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub type PlatformWatcher = unix::PipeWatcher;
#[cfg(windows)]
pub type PlatformWatcher = windows::JobWatcher;

#[cfg(not(any(unix, windows)))]
compile_error!("startwaittree only supports Unix and Windows");

/// Launch-and-wait sequence shared by the platform implementations.
///
/// Resources are owned by the watcher and released when it is dropped, in
/// reverse order of acquisition, on every path.
pub trait TreeWatcher: Sized {
    /// What to launch: an argument vector or a raw command-line tail.
    type Target;

    /// Creates the tracking objects. Nothing has been launched yet.
    fn prepare() -> Result<Self, WatchError>;

    /// Starts the target so that it is tracked before it can run.
    fn launch(&mut self, target: &Self::Target) -> Result<(), WatchError>;

    /// Blocks until the target and every descendant have exited.
    ///
    /// There is no timeout and no way to cancel.
    fn wait(self) -> Result<(), WatchError>;
}

/// Runs `target` and returns once its entire process tree has terminated.
pub fn start_and_wait<W: TreeWatcher>(target: &W::Target) -> Result<(), WatchError> {
    let mut watcher = W::prepare()?;
    watcher.launch(target)?;
    watcher.wait()
}
