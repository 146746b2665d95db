//! Piping stdout of one command into another command or a writer

use std::fmt;
use std::sync::Arc;

use futures::io::AsyncWrite;
use tracing::debug;

use crate::error::{Error, Result};
use crate::future::{CommandFuture, Phase};
use crate::io::Sink;

/// Where [`CommandFuture::pipe`] sends stdout
pub enum PipeTarget {
    /// Stdin of another command
    Command(CommandFuture),
    /// Any async writer; closed when the source's stdout ends
    Writer(Sink),
}

impl PipeTarget {
    /// Pipe into an async writer
    pub fn writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        PipeTarget::Writer(Box::new(writer))
    }
}

impl fmt::Debug for PipeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeTarget::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
            PipeTarget::Writer(_) => f.write_str("Writer"),
        }
    }
}

impl From<CommandFuture> for PipeTarget {
    fn from(cmd: CommandFuture) -> Self {
        PipeTarget::Command(cmd)
    }
}

impl From<&CommandFuture> for PipeTarget {
    fn from(cmd: &CommandFuture) -> Self {
        PipeTarget::Command(cmd.clone())
    }
}

impl CommandFuture {
    /// Send this command's stdout to `target`
    ///
    /// Piping into a command returns that command; awaiting it starts both,
    /// this one first. Piping into a writer returns this command. Either way
    /// this command's captured stdout stays empty, though it is still echoed.
    ///
    /// Fails when this command already finished, or when the destination
    /// command already started without a piped stdin.
    ///
    /// ```no_run
    /// # smol::block_on(async {
    /// use lazy_command::sh;
    ///
    /// let sorted = sh!("printf 'b\\na\\n'").pipe(sh!("sort"))?.await?;
    /// assert_eq!(sorted.stdout(), "a\nb\n");
    /// # Ok::<_, lazy_command::Error>(())
    /// # });
    /// ```
    pub fn pipe(&self, target: impl Into<PipeTarget>) -> Result<CommandFuture> {
        if self.inner.phase() == Phase::Finished {
            return Err(Error::pipe_misuse(format!(
                "`{}` already finished; its output can no longer be piped",
                self.command()
            )));
        }
        match target.into() {
            PipeTarget::Command(dest) => self.pipe_into_command(dest),
            PipeTarget::Writer(sink) => {
                self.inner.hold_stdout();
                let source = Arc::downgrade(&self.inner);
                self.inner.on_started(Box::new(move || {
                    if let Some(source) = source.upgrade() {
                        source.attach(sink);
                    }
                }))?;
                debug!(command = %self.command(), "piping stdout into writer");
                Ok(self.clone())
            }
        }
    }

    fn pipe_into_command(&self, dest: CommandFuture) -> Result<CommandFuture> {
        if Arc::ptr_eq(&self.inner, &dest.inner) {
            return Err(Error::pipe_misuse("a command cannot be piped into itself"));
        }

        let dest_phase = dest.inner.phase();
        if dest_phase == Phase::Unstarted {
            let source = Arc::clone(&self.inner);
            let pre_start = Box::new(move || source.force_start());

            let source = Arc::clone(&self.inner);
            let target = Arc::downgrade(&dest.inner);
            let post_start = Box::new(move || {
                let Some(target) = target.upgrade() else {
                    return;
                };
                match target.take_stdin() {
                    Some(stdin) => source.attach(Box::new(stdin)),
                    None => debug!("pipe destination has no stdin; dropping output"),
                }
            });

            dest.inner.set_pipe_hooks(pre_start, post_start)?;
            self.inner.hold_stdout();
            debug!(from = %self.command(), to = %dest.command(), "piping");
            return Ok(dest);
        }

        let stdin = match dest_phase {
            Phase::Started => dest.inner.take_stdin(),
            _ => None,
        };
        let Some(stdin) = stdin else {
            return Err(Error::pipe_misuse(format!(
                "`{}` already started without a piped stdin",
                dest.command()
            )));
        };

        self.inner.hold_stdout();
        let source = Arc::downgrade(&self.inner);
        self.inner.on_started(Box::new(move || {
            if let Some(source) = source.upgrade() {
                source.attach(Box::new(stdin));
            }
        }))?;
        self.inner.force_start();
        debug!(from = %self.command(), to = %dest.command(), "piping into running command");
        Ok(dest)
    }
}
