//! Process-wide execution settings

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

/// Shell used when none is configured
pub const DEFAULT_SHELL: &str = "bash";

/// Strict-mode preamble prepended to every command run by [`DEFAULT_SHELL`]
pub const STRICT_PREFIX: &str = "set -euo pipefail;";

/// How long a command waits for an explicit trigger before starting itself
pub const DEFAULT_AUTOSTART_DELAY: Duration = Duration::from_millis(10);

/// Settings read when commands are assembled and spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Echo command lines and their output to the console
    pub verbose: bool,
    /// Shell binary, invoked as `<shell> -c <prefix><command>`
    pub shell: String,
    /// Text prepended to every command line
    pub prefix: String,
    /// Working directory for spawned commands; the host's current directory
    /// at spawn time when unset
    pub cwd: Option<PathBuf>,
    /// Delay before an unawaited command starts on its own
    pub autostart_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: true,
            shell: DEFAULT_SHELL.to_string(),
            prefix: STRICT_PREFIX.to_string(),
            cwd: None,
            autostart_delay: DEFAULT_AUTOSTART_DELAY,
        }
    }
}

impl Config {
    /// The default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from command line flags
    pub fn from_flags(flags: &Flags) -> Self {
        let mut config = Self::default().verbose(!flags.quiet);
        if let Some(shell) = &flags.shell {
            config = config.shell(shell.clone());
        }
        if let Some(prefix) = &flags.prefix {
            config = config.prefix(prefix.clone());
        }
        config
    }

    /// The prefix used for `shell` unless one is set explicitly
    pub fn default_prefix(shell: &str) -> &'static str {
        if shell == DEFAULT_SHELL { STRICT_PREFIX } else { "" }
    }

    /// Set verbosity
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the shell binary; also resets the prefix to that shell's default
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self.prefix = Self::default_prefix(&self.shell).to_string();
        self
    }

    /// Set the command prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the working directory of spawned commands
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the auto-start delay
    pub fn autostart_delay(mut self, delay: Duration) -> Self {
        self.autostart_delay = delay;
        self
    }
}

/// Command line flags understood by scripts
///
/// Flatten into a binary's own parser:
///
/// ```
/// use clap::Parser;
/// use lazy_command::{Config, Flags};
///
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     flags: Flags,
/// }
///
/// let cli = Cli::parse_from(["script", "--quiet", "--shell=zsh"]);
/// let config = Config::from_flags(&cli.flags);
/// assert!(!config.verbose);
/// assert_eq!(config.prefix, "");
/// ```
#[derive(Debug, Clone, Default, Args)]
pub struct Flags {
    /// Don't echo commands
    #[arg(long)]
    pub quiet: bool,

    /// Custom shell binary
    #[arg(long, value_name = "PATH")]
    pub shell: Option<String>,

    /// Prefix all commands
    #[arg(long, value_name = "COMMAND")]
    pub prefix: Option<String>,
}
