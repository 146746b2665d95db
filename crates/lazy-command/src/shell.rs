//! The shell that commands run in

use std::fmt;
use std::panic::Location;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use process_tree::{ProcessTable, SystemProcessTable};
use tracing::debug;

use crate::command::{CommandSpec, quote};
use crate::config::Config;
use crate::echo;
use crate::error::{Error, Result};
use crate::future::CommandFuture;
use crate::modifiers::Retry;

static GLOBAL: OnceLock<Shell> = OnceLock::new();

/// Configuration plus the process table used to stop command trees
///
/// Cloning is cheap; clones share both.
#[derive(Clone)]
pub struct Shell {
    config: Arc<Config>,
    processes: Arc<dyn ProcessTable>,
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Shell {
    /// A shell backed by the operating system's process table
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            processes: Arc::new(SystemProcessTable),
        }
    }

    /// Use another process table when killing commands
    pub fn with_process_table(mut self, processes: impl ProcessTable + 'static) -> Self {
        self.processes = Arc::new(processes);
        self
    }

    /// The shell installed by [`init`], or a default one
    pub fn global() -> &'static Shell {
        GLOBAL.get_or_init(Shell::default)
    }

    /// Settings of this shell
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn processes(&self) -> &dyn ProcessTable {
        &*self.processes
    }

    /// Create a command; it starts when awaited, piped, or after the
    /// configured auto-start delay
    #[track_caller]
    pub fn run(&self, spec: CommandSpec) -> CommandFuture {
        self.run_at(spec, Location::caller())
    }

    pub(crate) fn run_at(&self, spec: CommandSpec, location: &'static Location<'static>) -> CommandFuture {
        CommandFuture::new(self.clone(), spec.assemble(), location)
    }

    /// Run commands from this shell up to `count` times
    pub fn retry(&self, count: usize, delay: Duration) -> Retry {
        Retry::new(self.clone(), count, delay)
    }

    /// Change the working directory of the host process
    ///
    /// Affects every later command unless [`Config::cwd`] is set.
    pub fn cd(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::env::set_current_dir(path)?;
        debug!(path = %path.display(), "changed directory");
        if self.config.verbose {
            echo::print_command(&format!("cd {}", quote(&path.to_string_lossy())));
        }
        Ok(())
    }
}

/// Install the global shell used by [`sh!`](crate::sh)
///
/// Must happen before the global shell is first used; fails with
/// [`Error::AlreadyInitialized`] afterwards.
pub fn init(config: Config) -> Result<&'static Shell> {
    let mut installed = false;
    let shell = GLOBAL.get_or_init(|| {
        installed = true;
        Shell::new(config)
    });
    if installed { Ok(shell) } else { Err(Error::AlreadyInitialized) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_once() {
        let first = init(Config::new().verbose(false));
        let shell = Shell::global();
        assert!(!shell.config().verbose || first.is_err());
        assert!(matches!(init(Config::new()), Err(Error::AlreadyInitialized)));
    }
}
