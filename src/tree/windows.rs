//! Job-object tree watcher.
//!
//! Every process created by a member of a job object is itself a member, so
//! a job whose active process count drops to zero means the whole tree is
//! gone. The job reports that through an associated I/O completion port as
//! `JOB_OBJECT_MSG_ACTIVE_PROCESS_ZERO`.
//!
//! Ordering matters: the port is associated before anything joins the job,
//! and the target is created suspended, assigned, and only then resumed, so
//! it cannot spawn anything while untracked.

#![allow(unsafe_code)]

use std::io;
use std::mem;
use std::ptr;

use windows::Win32::Foundation::{
    CloseHandle, ERROR_OLD_WIN_VERSION, HANDLE, INVALID_HANDLE_VALUE, WIN32_ERROR,
};
use windows::Win32::System::Environment::GetCommandLineW;
use windows::Win32::System::IO::{CreateIoCompletionPort, GetQueuedCompletionStatus, OVERLAPPED};
use windows::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JOBOBJECT_ASSOCIATE_COMPLETION_PORT,
    JobObjectAssociateCompletionPortInformation, SetInformationJobObject,
};
use windows::Win32::System::SystemInformation::{
    OSVERSIONINFOEXW, VER_MAJORVERSION, VER_MINORVERSION, VER_SERVICEPACKMAJOR,
    VerSetConditionMask, VerifyVersionInfoW,
};
use windows::Win32::System::SystemServices::{JOB_OBJECT_MSG_ACTIVE_PROCESS_ZERO, VER_LESS};
use windows::Win32::System::Threading::{
    CREATE_BREAKAWAY_FROM_JOB, CREATE_SUSPENDED, CreateProcessW, INFINITE, PROCESS_INFORMATION,
    ResumeThread, STARTUPINFOW, TerminateProcess,
};
use windows::core::{PCWSTR, PWSTR};

use super::TreeWatcher;
use crate::error::{Step, WatchError};

/// Our own command line as UTF-16, without the terminating NUL.
pub fn command_line() -> Vec<u16> {
    // SAFETY: GetCommandLineW returns a pointer to a NUL-terminated string
    // owned by the process that lives until exit.
    unsafe { GetCommandLineW().as_wide() }.to_vec()
}

/// A kernel handle closed exactly once, on drop.
#[derive(Debug)]
struct KernelHandle(HANDLE);

impl KernelHandle {
    fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for KernelHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by a successful create call and is
        // owned by this guard alone.
        if let Err(e) = unsafe { CloseHandle(self.0) } {
            log::debug!("CloseHandle failed: {e}");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Associated,
    ChildAssigned,
    ChildResumed,
    AwaitingMessage,
    Done,
}

/// Tracks a process tree through a job object and its completion port.
///
/// Field order is release order: the port first, then the job.
#[derive(Debug)]
pub struct JobWatcher {
    port: KernelHandle,
    job: KernelHandle,
    state: State,
}

impl JobWatcher {
    fn transition(&mut self, next: State) {
        log::debug!("Job watcher: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Completion key the job posts its notifications under.
    fn job_key(&self) -> usize {
        self.job.raw().0 as usize
    }
}

impl TreeWatcher for JobWatcher {
    type Target = Vec<u16>;

    fn prepare() -> Result<Self, WatchError> {
        // SAFETY: no security attributes and an unnamed job.
        let job = unsafe { CreateJobObjectW(None, PCWSTR::null()) }
            .map(KernelHandle)
            .map_err(|e| WatchError::new(Step::CreateJob, os_error(e)))?;

        // SAFETY: INVALID_HANDLE_VALUE asks for a fresh port not bound to a file.
        let port = unsafe { CreateIoCompletionPort(INVALID_HANDLE_VALUE, None, 0, 1) }
            .map(KernelHandle)
            .map_err(|e| WatchError::new(Step::CreatePort, os_error(e)))?;

        let mut watcher = Self {
            port,
            job,
            state: State::Created,
        };

        let association = JOBOBJECT_ASSOCIATE_COMPLETION_PORT {
            CompletionKey: watcher.job.raw().0,
            CompletionPort: watcher.port.raw(),
        };
        // SAFETY: the pointer and size describe `association`, which outlives
        // the call.
        unsafe {
            SetInformationJobObject(
                watcher.job.raw(),
                JobObjectAssociateCompletionPortInformation,
                (&raw const association).cast(),
                mem::size_of::<JOBOBJECT_ASSOCIATE_COMPLETION_PORT>() as u32,
            )
        }
        .map_err(|e| WatchError::new(Step::AssociatePort, os_error(e)))?;
        watcher.transition(State::Associated);

        Ok(watcher)
    }

    fn launch(&mut self, target: &Self::Target) -> Result<(), WatchError> {
        debug_assert_eq!(self.state, State::Associated);

        // CreateProcessW may write into the command line, so it gets its own
        // NUL-terminated copy of the tail.
        let mut command_line: Vec<u16> = target.iter().copied().chain([0]).collect();

        // Before Windows 8 a process can only be in one job. Break away from
        // any job we are in ourselves so the child can join ours.
        let mut flags = CREATE_SUSPENDED;
        if is_older_than_windows_8()? {
            log::debug!("Pre-Windows 8 kernel, creating the process outside our own job");
            flags |= CREATE_BREAKAWAY_FROM_JOB;
        }

        let startup = STARTUPINFOW {
            cb: mem::size_of::<STARTUPINFOW>() as u32,
            ..Default::default()
        };
        let mut info = PROCESS_INFORMATION::default();
        // SAFETY: `command_line` is a writable NUL-terminated buffer, and
        // `startup`/`info` are valid for the duration of the call.
        unsafe {
            CreateProcessW(
                PCWSTR::null(),
                Some(PWSTR(command_line.as_mut_ptr())),
                None,
                None,
                true,
                flags,
                None,
                PCWSTR::null(),
                &startup,
                &mut info,
            )
        }
        .map_err(|e| WatchError::new(Step::StartProcess, os_error(e)))?;
        log::debug!("Started process {} suspended", info.dwProcessId);

        // Dropped in reverse: thread handle first, then process handle.
        let process = KernelHandle(info.hProcess);
        let thread = KernelHandle(info.hThread);

        // SAFETY: both handles are live and owned by us.
        if let Err(e) = unsafe { AssignProcessToJobObject(self.job.raw(), process.raw()) } {
            let err = WatchError::new(Step::AssignProcess, os_error(e));
            discard(&process);
            return Err(err);
        }
        self.transition(State::ChildAssigned);

        // SAFETY: `thread` is the suspended primary thread of the new process.
        if unsafe { ResumeThread(thread.raw()) } == u32::MAX {
            let err = WatchError::last_os_error(Step::ResumeProcess);
            discard(&process);
            return Err(err);
        }
        self.transition(State::ChildResumed);

        Ok(())
    }

    fn wait(mut self) -> Result<(), WatchError> {
        debug_assert_eq!(self.state, State::ChildResumed);
        self.transition(State::AwaitingMessage);

        let job_key = self.job_key();
        loop {
            let mut code = 0u32;
            let mut key = 0usize;
            let mut overlapped: *mut OVERLAPPED = ptr::null_mut();
            // SAFETY: all out-pointers refer to live locals.
            unsafe {
                GetQueuedCompletionStatus(
                    self.port.raw(),
                    &mut code,
                    &mut key,
                    &mut overlapped,
                    INFINITE,
                )
            }
            .map_err(|e| WatchError::new(Step::DequeueCompletion, os_error(e)))?;

            if is_tree_finished(key, job_key, code) {
                break;
            }
            log::trace!("Ignoring completion packet {code} for key {key:#x}");
        }

        self.transition(State::Done);
        Ok(())
    }
}

/// Whether a completion packet says the job has no active processes left.
fn is_tree_finished(key: usize, job_key: usize, code: u32) -> bool {
    key == job_key && code == JOB_OBJECT_MSG_ACTIVE_PROCESS_ZERO
}

/// Kills a process that never ran any of its own code; failure is moot
/// since we are aborting anyway.
fn discard(process: &KernelHandle) {
    // SAFETY: `process` is a live process handle owned by us.
    if let Err(e) = unsafe { TerminateProcess(process.raw(), 1) } {
        log::debug!("Could not terminate the suspended process: {e}");
    }
}

/// Checks for a kernel older than 6.2 (Windows 8) by asking the system to
/// compare itself against that release.
fn is_older_than_windows_8() -> Result<bool, WatchError> {
    let mut target = OSVERSIONINFOEXW {
        dwOSVersionInfoSize: mem::size_of::<OSVERSIONINFOEXW>() as u32,
        dwMajorVersion: 6,
        dwMinorVersion: 2,
        wServicePackMajor: 0,
        ..Default::default()
    };

    // SAFETY: pure computation on the mask value.
    let mask = unsafe {
        let mask = VerSetConditionMask(0, VER_MAJORVERSION, VER_LESS as u8);
        let mask = VerSetConditionMask(mask, VER_MINORVERSION, VER_LESS as u8);
        VerSetConditionMask(mask, VER_SERVICEPACKMAJOR, VER_LESS as u8)
    };

    // SAFETY: `target` is a properly sized OSVERSIONINFOEXW.
    match unsafe {
        VerifyVersionInfoW(
            &mut target,
            VER_MAJORVERSION | VER_MINORVERSION | VER_SERVICEPACKMAJOR,
            mask,
        )
    } {
        Ok(()) => Ok(true),
        Err(e) if WIN32_ERROR::from_error(&e) == Some(ERROR_OLD_WIN_VERSION) => Ok(false),
        Err(e) => Err(WatchError::new(Step::CheckVersion, os_error(e))),
    }
}

/// Converts to an `io::Error` carrying the plain Win32 code, not the HRESULT.
fn os_error(err: windows::core::Error) -> io::Error {
    let code = WIN32_ERROR::from_error(&err).map_or(err.code().0, |code| code.0 as i32);
    io::Error::from_raw_os_error(code)
}
