//! The "process one item" operation run by every worker.
//!
//! The pool only needs something implementing [`Processor`]. Closures with
//! the right signature implement it directly, which keeps tests and embedders
//! free of boilerplate; [`CommandProcessor`] covers the common case of
//! handing each item to an external program.

use crate::{
    channel::{Completion, Outcome},
    error::InvocationError,
    item::WorkItem,
};
use core::time::Duration;
use std::{
    ffi::OsString,
    process::{Child, Command, Stdio},
    thread,
    time::Instant,
};

/// A synchronous, possibly long-running operation applied to one item.
///
/// Implementations are shared by every worker thread, hence `Send + Sync`.
/// Returning `Err` means the operation could not be invoked; anything the
/// operation itself considers a failure belongs in the [`Completion`].
pub trait Processor: Send + Sync + 'static {
    fn process(&self, item: &WorkItem) -> Outcome;
}

impl<F> Processor for F
where
    F: Fn(&WorkItem) -> Outcome + Send + Sync + 'static,
{
    fn process(&self, item: &WorkItem) -> Outcome {
        self(item)
    }
}

const DEFAULT_EXIT_POLL: Duration = Duration::from_millis(50);

/// Runs `program [args...] <item>` as a child process per item.
///
/// The child inherits stdout and stderr, and gets a null stdin. Without a
/// timeout the worker waits for the child however long it takes; with
/// [`with_timeout`](Self::with_timeout) the child is killed once the timeout
/// elapses and the item completes as [`Completion::TimedOut`].
#[derive(Clone, Debug)]
pub struct CommandProcessor {
    program: OsString,
    args: Vec<OsString>,
    timeout: Option<Duration>,
    exit_poll: Duration,
}

impl CommandProcessor {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            exit_poll: DEFAULT_EXIT_POLL,
        }
    }

    /// Appends a fixed argument placed before the item name.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kills children that run longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn command(&self, item: &WorkItem) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(item.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        command
    }

    fn wait(&self, child: &mut Child) -> Outcome {
        let status = child.wait().map_err(|source| InvocationError::Wait {
            program: self.program_name(),
            source,
        })?;
        Ok(Completion::Exited {
            code: status.code(),
        })
    }

    fn wait_with_deadline(&self, child: &mut Child, deadline: Instant) -> Outcome {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Completion::Exited { code: status.code() }),
                Ok(None) => {}
                Err(source) => {
                    return Err(InvocationError::Wait {
                        program: self.program_name(),
                        source,
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return self.kill(child);
            }
            thread::sleep(self.exit_poll.min(deadline - now));
        }
    }

    fn kill(&self, child: &mut Child) -> Outcome {
        if let Err(source) = child.kill() {
            // The child may have exited between the last poll and the kill.
            if let Ok(Some(status)) = child.try_wait() {
                return Ok(Completion::Exited { code: status.code() });
            }
            return Err(InvocationError::Kill {
                program: self.program_name(),
                source,
            });
        }
        // Reap the killed child so it does not linger as a zombie.
        child.wait().map_err(|source| InvocationError::Wait {
            program: self.program_name(),
            source,
        })?;
        Ok(Completion::TimedOut)
    }
}

impl Processor for CommandProcessor {
    fn process(&self, item: &WorkItem) -> Outcome {
        #[cfg(feature = "tracing")]
        tracing::debug!("Launching {} for {item}", self.program_name());

        let mut child = self
            .command(item)
            .spawn()
            .map_err(|source| InvocationError::Launch {
                program: self.program_name(),
                source,
            })?;

        // A timeout too large to represent as a deadline never fires.
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        match deadline {
            Some(deadline) => self.wait_with_deadline(&mut child, deadline),
            None => self.wait(&mut child),
        }
    }
}
