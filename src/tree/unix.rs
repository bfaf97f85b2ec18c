//! Pipe-inheritance tree watcher.
//!
//! The pipe is created with close-on-exec on both ends; only the write end
//! gets the flag cleared, so the launched program and everything it spawns
//! hold a copy of it while our read end stays private. After the launch we
//! drop our own write end. From then on every open write end belongs to a
//! descendant, and `read` returns end-of-file exactly when the last one has
//! exited (or closed it).

use std::ffi::OsString;
use std::io::{self, PipeReader, PipeWriter, Read};
use std::process::{Child, Command};

use nix::fcntl::{FcntlArg, FdFlag, fcntl};

use super::TreeWatcher;
use crate::error::{Step, WatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    PipeOpen,
    ChildLaunched,
    ParentWriteEndClosed,
    Done,
}

/// Tracks a process tree through inherited pipe write ends.
///
/// Field order is release order: the child record, then our write end (if we
/// still hold it), then the read end.
#[derive(Debug)]
pub struct PipeWatcher {
    child: Option<LaunchedChild>,
    writer: Option<PipeWriter>,
    reader: PipeReader,
    state: State,
}

#[derive(Debug)]
struct LaunchedChild {
    program: String,
    process: Child,
}

impl PipeWatcher {
    fn transition(&mut self, next: State) {
        log::debug!("Pipe watcher: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

impl TreeWatcher for PipeWatcher {
    type Target = Vec<OsString>;

    fn prepare() -> Result<Self, WatchError> {
        let (reader, writer) = io::pipe().map_err(|e| WatchError::new(Step::CreatePipe, e))?;
        fcntl(&writer, FcntlArg::F_SETFD(FdFlag::empty()))
            .map_err(|errno| WatchError::new(Step::InheritWriteEnd, errno.into()))?;

        log::debug!("Created tracking pipe");
        Ok(Self {
            child: None,
            writer: Some(writer),
            reader,
            state: State::PipeOpen,
        })
    }

    fn launch(&mut self, target: &Self::Target) -> Result<(), WatchError> {
        debug_assert_eq!(self.state, State::PipeOpen);

        let Some((program, args)) = target.split_first() else {
            return Err(WatchError::new(
                Step::Execute {
                    program: String::new(),
                },
                io::Error::new(io::ErrorKind::InvalidInput, "no program given"),
            ));
        };
        let program_display = program.to_string_lossy().into_owned();

        // Stdio is inherited; the write end rides along because it is not
        // close-on-exec. Exec failures come back synchronously from spawn.
        log::debug!("Launching {program_display} with {} argument(s)", args.len());
        let process = Command::new(program).args(args).spawn().map_err(|e| {
            WatchError::new(
                Step::Execute {
                    program: program_display.clone(),
                },
                e,
            )
        })?;
        log::debug!("Launched {program_display} as pid {}", process.id());

        self.child = Some(LaunchedChild {
            program: program_display,
            process,
        });
        self.transition(State::ChildLaunched);

        // Until our own copy is gone the read below could never see EOF.
        drop(self.writer.take());
        self.transition(State::ParentWriteEndClosed);
        Ok(())
    }

    fn wait(mut self) -> Result<(), WatchError> {
        debug_assert_eq!(self.state, State::ParentWriteEndClosed);

        let mut byte = [0u8; 1];
        let outcome = loop {
            match self.reader.read(&mut byte) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        settle(outcome)?;
        log::debug!("All write ends closed");

        // The direct child has exited or closed its copy of the write end;
        // either way reaping it cannot block on the rest of the tree.
        if let Some(mut child) = self.child.take() {
            let status = child.process.wait().map_err(|e| {
                WatchError::new(
                    Step::ReapChild {
                        program: child.program.clone(),
                    },
                    e,
                )
            })?;
            log::debug!("{} exited with {status}", child.program);
        }

        self.transition(State::Done);
        Ok(())
    }
}

/// Interprets the result of the one-byte read on the tracking pipe.
///
/// Only end-of-file means the tree is gone. Nobody is supposed to write to
/// the pipe, so data is an error rather than a completion signal.
fn settle(outcome: io::Result<usize>) -> Result<(), WatchError> {
    match outcome {
        Ok(0) => Ok(()),
        Ok(count) => Err(WatchError::new(
            Step::StrayData,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("read {count} byte(s) instead of end-of-file"),
            ),
        )),
        Err(e) => Err(WatchError::new(Step::ReadPipe, e)),
    }
}
