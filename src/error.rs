//! Error types for launching and watching a process tree.
//!
//! Every failure is fatal, so there is a single error type, [`WatchError`],
//! carrying the [`Step`] that failed and the underlying OS error. The step
//! knows which [`Stage`] of the launch-and-wait sequence it belongs to and the
//! fixed text that prefixes the diagnostic line.

use std::borrow::Cow;
use std::fmt;
use std::io;

/// Where in the launch-and-wait sequence a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Creating the tracking objects (pipe, job object, completion port).
    Setup,
    /// Starting the target program.
    Launch,
    /// Putting the launched process under tracking.
    Assign,
    /// Waiting for the tree to finish.
    Wait,
}

/// The individual operation that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    #[cfg(unix)]
    CreatePipe,
    #[cfg(unix)]
    InheritWriteEnd,
    #[cfg(unix)]
    Execute { program: String },
    #[cfg(unix)]
    ReadPipe,
    #[cfg(unix)]
    StrayData,
    #[cfg(unix)]
    ReapChild { program: String },

    #[cfg(windows)]
    CreateJob,
    #[cfg(windows)]
    CreatePort,
    #[cfg(windows)]
    AssociatePort,
    #[cfg(windows)]
    CheckVersion,
    #[cfg(windows)]
    StartProcess,
    #[cfg(windows)]
    AssignProcess,
    #[cfg(windows)]
    ResumeProcess,
    #[cfg(windows)]
    DequeueCompletion,
}

impl Step {
    pub fn stage(&self) -> Stage {
        match self {
            #[cfg(unix)]
            Step::CreatePipe | Step::InheritWriteEnd => Stage::Setup,
            #[cfg(unix)]
            Step::Execute { .. } => Stage::Launch,
            #[cfg(unix)]
            Step::ReadPipe | Step::StrayData | Step::ReapChild { .. } => Stage::Wait,

            #[cfg(windows)]
            Step::CreateJob | Step::CreatePort | Step::AssociatePort | Step::CheckVersion => {
                Stage::Setup
            }
            #[cfg(windows)]
            Step::StartProcess => Stage::Launch,
            #[cfg(windows)]
            Step::AssignProcess | Step::ResumeProcess => Stage::Assign,
            #[cfg(windows)]
            Step::DequeueCompletion => Stage::Wait,
        }
    }

    /// Fixed text naming the operation; the diagnostic line starts with it.
    ///
    /// On Unix this is `<call>: <what failed>`, the program name is added by
    /// the reporter.
    pub fn operation(&self) -> Cow<'static, str> {
        match self {
            #[cfg(unix)]
            Step::CreatePipe => "pipe: failed to create pipe".into(),
            #[cfg(unix)]
            Step::InheritWriteEnd => "fcntl: failed to make write end of pipe inheritable".into(),
            #[cfg(unix)]
            Step::Execute { program } => format!("execvp: failed to execute {program}").into(),
            #[cfg(unix)]
            Step::ReadPipe => "read: failed to read from pipe".into(),
            #[cfg(unix)]
            Step::StrayData => "read: unexpected data on the tracking pipe".into(),
            #[cfg(unix)]
            Step::ReapChild { program } => format!("waitpid: failed to reap {program}").into(),

            #[cfg(windows)]
            Step::CreateJob => "Could not create job object".into(),
            #[cfg(windows)]
            Step::CreatePort => "Could not create completion port".into(),
            #[cfg(windows)]
            Step::AssociatePort => "Could not assign job object to completion port".into(),
            #[cfg(windows)]
            Step::CheckVersion => {
                "Failed to detect whether Windows is older than Windows 8".into()
            }
            #[cfg(windows)]
            Step::StartProcess => "Could not start process".into(),
            #[cfg(windows)]
            Step::AssignProcess => "Failed to assign process to job object".into(),
            #[cfg(windows)]
            Step::ResumeProcess => "Failed to awaken the newly started process".into(),
            #[cfg(windows)]
            Step::DequeueCompletion => "Failed to get queued completion status".into(),
        }
    }
}

/// A fatal failure while setting up, launching or waiting on the tree.
#[derive(Debug)]
pub struct WatchError {
    step: Step,
    source: io::Error,
}

impl WatchError {
    pub fn new(step: Step, source: io::Error) -> Self {
        Self { step, source }
    }

    /// Builds the error from `errno`/`GetLastError` right after a failed call.
    pub fn last_os_error(step: Step) -> Self {
        Self::new(step, io::Error::last_os_error())
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn stage(&self) -> Stage {
        self.step.stage()
    }

    pub fn os_code(&self) -> Option<i32> {
        self.source.raw_os_error()
    }

    /// Exit status the whole process terminates with.
    ///
    /// Unix always uses 1; Windows hands back the raw system error code so
    /// callers can tell failures apart.
    pub fn exit_code(&self) -> i32 {
        if cfg!(windows) {
            match self.os_code() {
                Some(code) if code != 0 => code,
                _ => 1,
            }
        } else {
            1
        }
    }
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step.operation(), self.source)
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
