//! Free-standing combinators over commands

use std::future::Future;
use std::panic::Location;
use std::time::Duration;

use tracing::debug;

use crate::command::CommandSpec;
use crate::error::Result;
use crate::future::CommandFuture;
use crate::output::ProcessResult;
use crate::shell::Shell;

/// Resolve `cmd` successfully regardless of its exit code
pub fn no_throw(cmd: CommandFuture) -> CommandFuture {
    cmd.no_throw()
}

/// Don't echo `cmd` or its output
pub fn quiet(cmd: CommandFuture) -> CommandFuture {
    cmd.quiet()
}

/// Redact `keys` from what `cmd` echoes
pub fn sanitize<I, S>(cmd: CommandFuture, keys: I) -> CommandFuture
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    cmd.sanitize(keys)
}

/// Reruns a failing command
///
/// `count` is the total number of attempts, so `retry(5, delay)` sleeps
/// `delay` four times before giving up with the last failure.
#[derive(Debug, Clone)]
pub struct Retry {
    shell: Shell,
    attempts: usize,
    delay: Duration,
}

impl Retry {
    /// At most `count` attempts, waiting `delay` between them
    pub fn new(shell: Shell, count: usize, delay: Duration) -> Self {
        Self {
            shell,
            attempts: count.max(1),
            delay,
        }
    }

    /// Run `spec` until it succeeds or attempts run out
    ///
    /// Only failures of the command itself are retried; spawn errors are
    /// returned right away.
    #[track_caller]
    pub fn run(&self, spec: CommandSpec) -> impl Future<Output = Result<ProcessResult>> + Send + 'static {
        let location = Location::caller();
        let Retry { shell, attempts, delay } = self.clone();
        async move {
            let mut attempt = 1;
            loop {
                match shell.run_at(spec.clone(), location).await {
                    Err(e) if e.is_retryable() && attempt < attempts => {
                        debug!(attempt, attempts, command = %spec, "attempt failed; retrying");
                        attempt += 1;
                        sleep(delay).await;
                    }
                    outcome => return outcome,
                }
            }
        }
    }
}

/// A [`Retry`] on the global shell
pub fn retry(count: usize, delay: Duration) -> Retry {
    Shell::global().retry(count, delay)
}

/// Wait for `duration`
pub async fn sleep(duration: Duration) {
    smol::Timer::after(duration).await;
}

/// Wait for every command, failing with the first failure in order
pub async fn all<I>(commands: I) -> Result<Vec<ProcessResult>>
where
    I: IntoIterator<Item = CommandFuture>,
{
    futures::future::join_all(commands)
        .await
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Error, cmd};
    use std::time::Instant;

    fn shell() -> Shell {
        Shell::new(Config::new().verbose(false))
    }

    #[smol_potat::test]
    async fn test_retry_counts_total_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("attempts");
        let started = Instant::now();
        let err = shell()
            .retry(3, Duration::from_millis(20))
            .run(cmd!("echo x >> " {&log} "; exit 9"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(9));
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "x\nx\nx\n");
    }

    #[smol_potat::test]
    async fn test_retry_stops_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("attempts");
        let result = shell()
            .retry(5, Duration::from_millis(1))
            .run(cmd!("echo x >> " {&log} "; [ $(wc -l < " {&log} ") -ge 2 ]"))
            .await
            .unwrap();
        assert_eq!(result.exit_code(), Some(0));
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "x\nx\n");
    }

    #[smol_potat::test]
    async fn test_all_collects_in_order() {
        let shell = shell();
        let results = all([shell.run(cmd!("echo a")), shell.run(cmd!("sleep 0.1; echo b"))])
            .await
            .unwrap();
        let out: Vec<_> = results.iter().map(ProcessResult::stdout).collect();
        assert_eq!(out, ["a\n", "b\n"]);

        let err = all([shell.run(cmd!("true")), shell.run(cmd!("exit 4"))])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NonZeroExit(_)));
    }

    #[smol_potat::test]
    async fn test_sleep() {
        let started = Instant::now();
        sleep(Duration::from_millis(30)).await;
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
