//! Lazily started commands
//!
//! A [`CommandFuture`] describes a command that has not necessarily started
//! yet. It starts the first time one of these happens:
//!
//! - it is awaited, or [`CommandFuture::wait`] is called
//! - one of its streams is requested
//! - a command it pipes into starts
//! - the shell's auto-start delay elapses
//!
//! Every clone refers to the same process; the process is spawned at most once
//! and every clone observes the same outcome.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_channel::{Receiver, Sender};
use async_process::{Child, ChildStdin};
use futures::future::BoxFuture;
use futures_lite::{AsyncRead, AsyncReadExt};
use process_tree::Signal;
use tracing::{debug, warn};

use crate::echo::{OutputSource, Presentation};
use crate::error::{Error, Result};
use crate::io::{IoState, Sink};
use crate::output::ProcessResult;
use crate::shell::Shell;

pub(crate) type Hook = Box<dyn FnOnce() + Send>;

const READ_CHUNK: usize = 8192;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Unstarted,
    Starting,
    Started,
    Finished,
}

struct State {
    phase: Phase,
    no_throw: bool,
    quiet: bool,
    sanitize: Vec<String>,
    inherit_stdin: bool,
    pre_start: Option<Hook>,
    post_start: Option<Hook>,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            phase: Phase::Unstarted,
            no_throw: false,
            quiet: false,
            sanitize: Vec::new(),
            inherit_stdin: true,
            pre_start: None,
            post_start: None,
            pid: None,
            stdin: None,
        }
    }
}

pub(crate) struct Inner {
    command: String,
    shell: Shell,
    location: &'static Location<'static>,
    state: Mutex<State>,
    io: Mutex<IoState>,
    outcome: Mutex<Option<Result<ProcessResult>>>,
    finished_tx: Mutex<Option<Sender<()>>>,
    finished_rx: Receiver<()>,
    observed: AtomicBool,
}

/// Handle to a lazily started shell command
///
/// Awaiting it yields the [`ProcessResult`], or an error when the command
/// exits nonzero (unless [`no_throw`](Self::no_throw) was applied).
///
/// ```no_run
/// # smol::block_on(async {
/// use lazy_command::sh;
///
/// let result = sh!("echo hello").await?;
/// assert_eq!(result.stdout(), "hello\n");
/// # Ok::<_, lazy_command::Error>(())
/// # });
/// ```
pub struct CommandFuture {
    pub(crate) inner: Arc<Inner>,
    waiting: Option<BoxFuture<'static, Result<ProcessResult>>>,
}

impl Clone for CommandFuture {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            waiting: None,
        }
    }
}

impl fmt::Debug for CommandFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFuture")
            .field("command", &self.inner.command)
            .field("phase", &self.inner.phase())
            .finish()
    }
}

impl CommandFuture {
    pub(crate) fn new(shell: Shell, command: String, location: &'static Location<'static>) -> Self {
        let (finished_tx, finished_rx) = async_channel::bounded(1);
        let delay = shell.config().autostart_delay;
        let inner = Arc::new(Inner {
            command,
            shell,
            location,
            state: Mutex::new(State::default()),
            io: Mutex::new(IoState::default()),
            outcome: Mutex::new(None),
            finished_tx: Mutex::new(Some(finished_tx)),
            finished_rx,
            observed: AtomicBool::new(false),
        });

        let scheduled = Arc::clone(&inner);
        smol::spawn(async move {
            smol::Timer::after(delay).await;
            scheduled.force_start();
        })
        .detach();

        Self {
            inner,
            waiting: None,
        }
    }

    /// The assembled command line
    pub fn command(&self) -> &str {
        &self.inner.command
    }

    /// Start the command now if it has not started yet
    pub fn start(&self) {
        self.inner.force_start();
    }

    /// Whether the process has been spawned (or failed to spawn)
    pub fn is_started(&self) -> bool {
        self.inner.phase() != Phase::Unstarted
    }

    /// Whether the outcome is known
    pub fn is_finished(&self) -> bool {
        self.inner.phase() == Phase::Finished
    }

    /// OS process id of the shell running the command, once spawned
    pub fn pid(&self) -> Option<u32> {
        lock(&self.inner.state).pid
    }

    /// Start the command and wait for its outcome
    pub async fn wait(&self) -> Result<ProcessResult> {
        self.inner.force_start();
        self.inner.wait().await
    }

    /// Start the command and wait for its exit code
    ///
    /// Never fails on a nonzero exit; `None` when the process was killed by
    /// a signal or could not be spawned.
    pub async fn exit_code(&self) -> Option<i32> {
        match self.wait().await {
            Ok(result) => result.exit_code(),
            Err(e) => e.exit_code(),
        }
    }

    /// Resolve successfully regardless of the exit code
    pub fn no_throw(self) -> Self {
        lock(&self.inner.state).no_throw = true;
        self
    }

    /// Don't echo the command line or its output
    ///
    /// Has no effect once the command has started.
    pub fn quiet(self) -> Self {
        lock(&self.inner.state).quiet = true;
        self
    }

    /// Replace each of `keys` with `***` in the echoed command line and output
    ///
    /// Captured output is left untouched.
    pub fn sanitize<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.inner.state)
            .sanitize
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Writable stdin of the process
    ///
    /// Starts the command with a piped stdin if it has not started yet.
    /// `None` when stdin was inherited, already taken, or the command is
    /// done.
    pub fn stdin(&self) -> Option<ChildStdin> {
        {
            let mut state = lock(&self.inner.state);
            if state.phase == Phase::Unstarted {
                state.inherit_stdin = false;
            }
        }
        self.inner.force_start();
        self.inner.take_stdin()
    }

    /// Live stdout chunks, starting with everything captured so far
    ///
    /// Starts the command. The channel closes at end of stream.
    pub fn stdout(&self) -> Receiver<Vec<u8>> {
        self.inner.force_start();
        lock(&self.inner.io).subscribe(OutputSource::Stdout)
    }

    /// Live stderr chunks, starting with everything captured so far
    pub fn stderr(&self) -> Receiver<Vec<u8>> {
        self.inner.force_start();
        lock(&self.inner.io).subscribe(OutputSource::Stderr)
    }

    /// Send SIGTERM to the process and all its descendants
    ///
    /// Does nothing when the command has not started or already finished.
    pub async fn kill(&self) -> Result<()> {
        self.kill_with(Signal::Term).await
    }

    /// Send `signal` to the process and all its descendants
    pub async fn kill_with(&self, signal: Signal) -> Result<()> {
        // a killed command's failure counts as observed
        self.inner.observed.store(true, Ordering::Relaxed);
        let pid = {
            let state = lock(&self.inner.state);
            match state.phase {
                Phase::Started => state.pid,
                _ => None,
            }
        };
        let Some(pid) = pid else {
            debug!(command = %self.inner.command, "not running; nothing to kill");
            return Ok(());
        };
        debug!(pid, %signal, command = %self.inner.command, "killing process tree");
        process_tree::signal_tree(self.inner.shell.processes(), pid, signal).await?;
        Ok(())
    }
}

impl Future for CommandFuture {
    type Output = Result<ProcessResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let inner = Arc::clone(&this.inner);
        let waiting = this.waiting.get_or_insert_with(|| {
            Box::pin(async move {
                inner.force_start();
                inner.wait().await
            })
        });
        waiting.as_mut().poll(cx)
    }
}

impl Inner {
    pub(crate) fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    pub(crate) fn take_stdin(&self) -> Option<ChildStdin> {
        lock(&self.state).stdin.take()
    }

    pub(crate) fn hold_stdout(&self) {
        lock(&self.io).hold();
    }

    pub(crate) fn attach(&self, sink: Sink) {
        lock(&self.io).attach(sink);
    }

    /// As a pipe destination, read stdin from the pipe and run the given hooks
    pub(crate) fn set_pipe_hooks(&self, pre_start: Hook, post_start: Hook) -> Result<()> {
        let mut state = lock(&self.state);
        if state.phase != Phase::Unstarted {
            return Err(Error::pipe_misuse(
                "destination command started before it could be connected",
            ));
        }
        if state.pre_start.is_some() {
            return Err(Error::pipe_misuse(
                "destination command already reads from another command",
            ));
        }
        state.inherit_stdin = false;
        state.pre_start = Some(pre_start);
        let previous = state.post_start.take();
        state.post_start = Some(Box::new(move || {
            if let Some(previous) = previous {
                previous();
            }
            post_start();
        }));
        Ok(())
    }

    /// How this command presents itself given its current modifiers
    fn presentation(&self, state: &State) -> Presentation {
        let echo = self.shell.config().verbose && !state.quiet;
        Presentation::new(echo, state.sanitize.clone())
    }

    /// Run `hook` once the process is spawned, right away if it already is
    pub(crate) fn on_started(&self, hook: Hook) -> Result<()> {
        let mut state = lock(&self.state);
        match state.phase {
            Phase::Unstarted | Phase::Starting => {
                let previous = state.post_start.take();
                state.post_start = Some(Box::new(move || {
                    if let Some(previous) = previous {
                        previous();
                    }
                    hook();
                }));
                Ok(())
            }
            Phase::Started => {
                drop(state);
                hook();
                Ok(())
            }
            Phase::Finished => Err(Error::pipe_misuse("command already finished")),
        }
    }

    /// Spawn the process unless that already happened
    pub(crate) fn force_start(self: &Arc<Self>) {
        let (pre_start, presentation, inherit_stdin) = {
            let mut state = lock(&self.state);
            if state.phase != Phase::Unstarted {
                return;
            }
            state.phase = Phase::Starting;
            (
                state.pre_start.take(),
                self.presentation(&state),
                state.inherit_stdin,
            )
        };

        if let Some(hook) = pre_start {
            hook();
        }
        presentation.command(&self.command);

        let mut child = match self.spawn(inherit_stdin) {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %self.command, "{}", e);
                self.finish(Err(e));
                return;
            }
        };
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let post_start = {
            let mut state = lock(&self.state);
            state.phase = Phase::Started;
            state.pid = Some(pid);
            state.stdin = child.stdin.take();
            state.post_start.take()
        };
        debug!(pid, command = %self.command, "spawned");

        smol::spawn(Arc::clone(self).drive(child, stdout, stderr, presentation)).detach();

        if let Some(hook) = post_start {
            hook();
        }
    }

    fn spawn(&self, inherit_stdin: bool) -> Result<Child> {
        let config = self.shell.config();
        let mut cmd = async_process::Command::new(&config.shell);
        cmd.arg("-c").arg(format!("{}{}", config.prefix, self.command));
        if let Some(dir) = &config.cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(if inherit_stdin { Stdio::inherit() } else { Stdio::piped() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.spawn().map_err(|e| {
            Error::spawn_failed(format!("failed to start {}: {}", config.shell, e))
        })
    }

    async fn drive<O, E>(self: Arc<Self>, mut child: Child, stdout: Option<O>, stderr: Option<E>, presentation: Presentation)
    where
        O: AsyncRead + Unpin,
        E: AsyncRead + Unpin,
    {
        let out = self.pump(stdout, OutputSource::Stdout, &presentation);
        let err = self.pump(stderr, OutputSource::Stderr, &presentation);
        let (status, (), ()) = futures::join!(child.status(), out, err);

        let outcome = status
            .map_err(Error::from)
            .map(|status| self.build_result(status));
        self.finish(outcome);
    }

    async fn pump<R>(&self, reader: Option<R>, source: OutputSource, presentation: &Presentation)
    where
        R: AsyncRead + Unpin,
    {
        let Some(mut reader) = reader else {
            return;
        };
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(command = %self.command, ?source, "read failed: {}", e);
                    break;
                }
            };
            let chunk = &buf[..n];
            presentation.output(source, chunk);

            let forward = lock(&self.io).accept(source, chunk);
            if let Some(tx) = forward {
                if tx.send(chunk.to_vec()).await.is_err() {
                    // the destination is gone; closing our end lets the
                    // process see a broken pipe like it would in a shell
                    lock(&self.io).stop_forwarding();
                    break;
                }
            }
        }
        lock(&self.io).close(source);
    }

    fn build_result(&self, status: ExitStatus) -> ProcessResult {
        let io = lock(&self.io);
        ProcessResult::builder()
            .exit_code(status.code())
            .signal(exit_signal(&status))
            .stdout(io.stdout())
            .stderr(io.stderr())
            .combined(io.combined())
            .location(self.location)
            .build()
    }

    fn finish(&self, outcome: Result<ProcessResult>) {
        let (outcome, hooks, stdin) = {
            let mut state = lock(&self.state);
            state.phase = Phase::Finished;
            let hooks = (state.pre_start.take(), state.post_start.take());
            let outcome = outcome.and_then(|result| classify(result, state.no_throw));
            (outcome, hooks, state.stdin.take())
        };
        drop(hooks);
        drop(stdin);

        match &outcome {
            Ok(result) => debug!(
                command = %self.command,
                exit_code = ?result.exit_code(),
                signal = ?result.signal(),
                "finished"
            ),
            Err(e) => debug!(command = %self.command, "failed: {}", e),
        }
        *lock(&self.outcome) = Some(outcome);
        // waiters wake up when the channel closes
        lock(&self.finished_tx).take();
    }

    async fn wait(&self) -> Result<ProcessResult> {
        let _ = self.finished_rx.recv().await;
        self.observed.store(true, Ordering::Relaxed);
        lock(&self.outcome)
            .clone()
            .unwrap_or_else(|| Err(Error::spawn_failed("command ended without an outcome")))
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if *self.observed.get_mut() {
            return;
        }
        let outcome = self.outcome.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(Err(e)) = outcome {
            warn!(command = %self.command, "command failed and nobody awaited it: {}", e);
        }
    }
}

fn classify(result: ProcessResult, no_throw: bool) -> Result<ProcessResult> {
    if result.success() || no_throw {
        Ok(result)
    } else if result.signal().is_some() {
        Err(Error::Signaled(Box::new(result)))
    } else {
        Err(Error::NonZeroExit(Box::new(result)))
    }
}

fn exit_signal(status: &ExitStatus) -> Option<String> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(process_tree::signal_name)
    }
    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}
