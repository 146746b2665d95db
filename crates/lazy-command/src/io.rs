//! Output capture and routing for a running command
//!
//! Stdout of a command is either captured, held until a pipe destination is
//! ready to receive it, or forwarded to an attached writer. Stderr is always
//! captured. Subscribers see every chunk regardless of route.

use async_channel::{Receiver, Sender};
use futures::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::echo::OutputSource;

/// A destination for piped stdout
pub type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Where stdout chunks go
#[derive(Debug)]
enum Route {
    /// Accumulate into the captured stdout
    Capture,
    /// Buffer until a sink is attached
    Hold(Vec<u8>),
    /// Hand to the writer task of an attached sink
    Forward(Sender<Vec<u8>>),
    /// The sink went away; drop stdout
    Discard,
}

/// Captured bytes and routing state of one command
#[derive(Debug)]
pub(crate) struct IoState {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    combined: Vec<u8>,
    route: Route,
    stdout_closed: bool,
    stderr_closed: bool,
    stdout_subscribers: Vec<Sender<Vec<u8>>>,
    stderr_subscribers: Vec<Sender<Vec<u8>>>,
}

impl Default for IoState {
    fn default() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            combined: Vec::new(),
            route: Route::Capture,
            stdout_closed: false,
            stderr_closed: false,
            stdout_subscribers: Vec::new(),
            stderr_subscribers: Vec::new(),
        }
    }
}

impl IoState {
    /// Record a chunk read from the process
    ///
    /// Returns the channel to forward the chunk on when stdout is routed to a
    /// sink; sending happens outside the lock.
    pub(crate) fn accept(&mut self, source: OutputSource, chunk: &[u8]) -> Option<Sender<Vec<u8>>> {
        let subscribers = match source {
            OutputSource::Stdout => &mut self.stdout_subscribers,
            OutputSource::Stderr => &mut self.stderr_subscribers,
        };
        subscribers.retain(|tx| tx.try_send(chunk.to_vec()).is_ok());

        match source {
            OutputSource::Stderr => {
                self.stderr.extend_from_slice(chunk);
                self.combined.extend_from_slice(chunk);
                None
            }
            OutputSource::Stdout => match &mut self.route {
                Route::Capture => {
                    self.stdout.extend_from_slice(chunk);
                    self.combined.extend_from_slice(chunk);
                    None
                }
                Route::Hold(pending) => {
                    pending.extend_from_slice(chunk);
                    None
                }
                Route::Forward(tx) => Some(tx.clone()),
                Route::Discard => None,
            },
        }
    }

    /// End of stream on `source`
    pub(crate) fn close(&mut self, source: OutputSource) {
        match source {
            OutputSource::Stdout => {
                self.stdout_closed = true;
                self.stdout_subscribers.clear();
                if matches!(self.route, Route::Forward(_)) {
                    // dropping the sender lets the writer task drain and close its sink
                    self.route = Route::Discard;
                }
            }
            OutputSource::Stderr => {
                self.stderr_closed = true;
                self.stderr_subscribers.clear();
            }
        }
    }

    /// The attached sink stopped accepting data
    pub(crate) fn stop_forwarding(&mut self) {
        if matches!(self.route, Route::Forward(_)) {
            self.route = Route::Discard;
        }
    }

    /// Stop capturing stdout and hold it for a pipe destination
    ///
    /// Anything captured so far moves into the hold buffer.
    pub(crate) fn hold(&mut self) {
        if matches!(self.route, Route::Capture) {
            self.route = Route::Hold(std::mem::take(&mut self.stdout));
        }
    }

    /// Route stdout into `sink`, starting with whatever was held back
    pub(crate) fn attach(&mut self, sink: Sink) {
        let pending = match std::mem::replace(&mut self.route, Route::Discard) {
            Route::Hold(pending) => pending,
            Route::Capture => std::mem::take(&mut self.stdout),
            Route::Discard => Vec::new(),
            forward @ Route::Forward(_) => {
                debug!("stdout is already piped; ignoring additional destination");
                self.route = forward;
                return;
            }
        };
        let rx = if self.stdout_closed {
            None
        } else {
            let (tx, rx) = async_channel::bounded(16);
            self.route = Route::Forward(tx);
            Some(rx)
        };
        smol::spawn(forward(sink, pending, rx)).detach();
    }

    /// A live view of `source`, replaying what was captured so far
    pub(crate) fn subscribe(&mut self, source: OutputSource) -> Receiver<Vec<u8>> {
        let (tx, rx) = async_channel::unbounded();
        let (replay, closed, subscribers) = match source {
            OutputSource::Stdout => {
                let replay = match &self.route {
                    Route::Capture => self.stdout.as_slice(),
                    Route::Hold(pending) => pending.as_slice(),
                    Route::Forward(_) | Route::Discard => &[],
                };
                (replay, self.stdout_closed, &mut self.stdout_subscribers)
            }
            OutputSource::Stderr => (
                self.stderr.as_slice(),
                self.stderr_closed,
                &mut self.stderr_subscribers,
            ),
        };
        if !replay.is_empty() {
            let _ = tx.try_send(replay.to_vec());
        }
        if !closed {
            subscribers.push(tx);
        }
        rx
    }

    pub(crate) fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub(crate) fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub(crate) fn combined(&self) -> String {
        String::from_utf8_lossy(&self.combined).into_owned()
    }
}

/// Writer task of an attached sink
async fn forward(mut sink: Sink, pending: Vec<u8>, rx: Option<Receiver<Vec<u8>>>) {
    if !pending.is_empty() && sink.write_all(&pending).await.is_err() {
        return;
    }
    if let Some(rx) = rx {
        while let Ok(chunk) = rx.recv().await {
            if let Err(e) = sink.write_all(&chunk).await {
                debug!("pipe destination stopped accepting input: {}", e);
                return;
            }
        }
    }
    let _ = sink.flush().await;
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;

    #[test]
    fn test_capture_and_combined() {
        let mut io = IoState::default();
        assert!(io.accept(OutputSource::Stdout, b"out\n").is_none());
        assert!(io.accept(OutputSource::Stderr, b"err\n").is_none());
        assert_eq!(io.stdout(), "out\n");
        assert_eq!(io.stderr(), "err\n");
        assert_eq!(io.combined(), "out\nerr\n");
    }

    #[test]
    fn test_hold_moves_captured_stdout() {
        let mut io = IoState::default();
        io.accept(OutputSource::Stdout, b"early ");
        io.hold();
        io.accept(OutputSource::Stdout, b"late");
        assert_eq!(io.stdout(), "");

        let rx = io.subscribe(OutputSource::Stdout);
        assert_eq!(rx.try_recv().ok(), Some(b"early late".to_vec()));
    }

    #[test]
    fn test_subscribers_end_on_close() {
        let mut io = IoState::default();
        io.accept(OutputSource::Stderr, b"a");
        let rx = io.subscribe(OutputSource::Stderr);
        io.accept(OutputSource::Stderr, b"b");
        io.close(OutputSource::Stderr);

        assert_eq!(rx.try_recv().ok(), Some(b"a".to_vec()));
        assert_eq!(rx.try_recv().ok(), Some(b"b".to_vec()));
        assert!(rx.is_closed());
        assert!(rx.try_recv().is_err());

        let late = io.subscribe(OutputSource::Stderr);
        assert_eq!(late.try_recv().ok(), Some(b"ab".to_vec()));
        assert!(late.try_recv().is_err());
    }

    #[derive(Clone, Default)]
    struct Collect {
        bytes: Arc<Mutex<Vec<u8>>>,
        closed: Arc<AtomicBool>,
    }

    impl AsyncWrite for Collect {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.bytes.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            self.closed.store(true, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    #[smol_potat::test]
    async fn test_attach_flushes_held_output() {
        let sink = Collect::default();
        let mut io = IoState::default();
        io.hold();
        io.accept(OutputSource::Stdout, b"held ");
        io.attach(Box::new(sink.clone()));

        let tx = io.accept(OutputSource::Stdout, b"live").expect("forwarding");
        tx.send(b"live".to_vec()).await.expect("writer alive");
        drop(tx);
        io.close(OutputSource::Stdout);

        for _ in 0..100 {
            if sink.closed.load(Ordering::SeqCst) {
                break;
            }
            smol::Timer::after(Duration::from_millis(10)).await;
        }
        assert!(sink.closed.load(Ordering::SeqCst));
        assert_eq!(sink.bytes.lock().unwrap().as_slice(), b"held live");
    }

    #[smol_potat::test]
    async fn test_attach_after_close_writes_everything() {
        let sink = Collect::default();
        let mut io = IoState::default();
        io.hold();
        io.accept(OutputSource::Stdout, b"all of it");
        io.close(OutputSource::Stdout);
        io.attach(Box::new(sink.clone()));

        for _ in 0..100 {
            if sink.closed.load(Ordering::SeqCst) {
                break;
            }
            smol::Timer::after(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.bytes.lock().unwrap().as_slice(), b"all of it");
    }
}
