//! # Lazy Command
//!
//! Shell scripting from async Rust. Commands are written as templates whose
//! substituted values are quoted automatically, run through a configurable
//! shell, and start lazily: building a command does not run it, awaiting it
//! (or piping from it, or simply waiting a moment) does.
//!
//! ## Usage
//!
//! ```no_run
//! use lazy_command::{Config, sh};
//!
//! # smol::block_on(async {
//! lazy_command::init(Config::new().verbose(false))?;
//!
//! let dir = "my dir";
//! sh!("mkdir -p /tmp/" {dir}).await?;
//!
//! let branch = sh!("git branch --show-current").await?;
//! sh!("echo building " {&branch}).await?;
//!
//! let count = sh!("ls /tmp").pipe(sh!("wc -l"))?.await?;
//! println!("{} entries", count.trimmed_stdout());
//! # Ok::<_, lazy_command::Error>(())
//! # });
//! ```
//!
//! Commands that exit nonzero fail with [`Error::NonZeroExit`] unless marked
//! with [`CommandFuture::no_throw`].

#![warn(missing_docs)]

pub mod command;
pub mod config;
mod echo;
pub mod error;
mod future;
mod io;
pub mod modifiers;
pub mod output;
mod pipe;
pub mod shell;

pub use command::{ArgValue, CommandSpec, CommandSpecBuilder, quote};
pub use config::{Config, Flags};
pub use error::{Error, Result};
pub use future::CommandFuture;
pub use io::Sink;
pub use modifiers::{Retry, all, no_throw, quiet, retry, sanitize, sleep};
pub use output::{ProcessResult, ProcessResultBuilder, exit_code_info};
pub use pipe::PipeTarget;
pub use shell::{Shell, init};

pub use process_tree::Signal;

/// Run a command on the global shell
///
/// Takes the same template as [`cmd!`]: string literals are copied as is,
/// `{expr}` blocks are substituted and quoted. Prefix with `in shell;` to
/// run on a specific [`Shell`].
///
/// ```no_run
/// use lazy_command::{Config, Shell, sh};
///
/// # smol::block_on(async {
/// let file = "notes.txt";
/// sh!("touch " {file}).await?;
///
/// let quiet = Shell::new(Config::new().verbose(false));
/// sh!(in quiet; "cat " {file}).await?;
/// # Ok::<_, lazy_command::Error>(())
/// # });
/// ```
#[macro_export]
macro_rules! sh {
    (in $shell:expr; $($tokens:tt)*) => {
        $shell.run($crate::cmd!($($tokens)*))
    };
    ($($tokens:tt)*) => {
        $crate::Shell::global().run($crate::cmd!($($tokens)*))
    };
}
