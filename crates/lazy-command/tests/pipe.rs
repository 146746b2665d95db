//! Piping stdout between commands and into writers

mod common;

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use common::test_shell;
use futures::io::AsyncWrite;
use lazy_command::{Error, PipeTarget, sh};

#[smol_potat::test]
async fn test_pipe_into_command() {
    let shell = test_shell();
    let source = sh!(in shell; "echo hello; echo world");
    let dest = source.pipe(sh!(in shell; "tr a-z A-Z")).unwrap();

    let result = dest.await.unwrap();
    assert_eq!(result.stdout(), "HELLO\nWORLD\n");

    let source = source.await.unwrap();
    assert_eq!(source.stdout(), "");
}

#[smol_potat::test]
async fn test_pipe_chain() {
    let shell = test_shell();
    let result = sh!(in shell; "printf 'c\\nb\\na\\n'")
        .pipe(sh!(in shell; "sort"))
        .unwrap()
        .pipe(sh!(in shell; "head -n 2"))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(result.stdout(), "a\nb\n");
}

#[smol_potat::test]
async fn test_pipe_from_started_source_keeps_early_output() {
    let shell = test_shell();
    let source = sh!(in shell; "echo early; sleep 0.2; echo late");
    source.start();
    smol::Timer::after(Duration::from_millis(100)).await;

    let result = source.pipe(sh!(in shell; "cat")).unwrap().await.unwrap();
    assert_eq!(result.stdout(), "early\nlate\n");
}

#[smol_potat::test]
async fn test_pipe_after_finish_fails() {
    let shell = test_shell();
    let source = sh!(in shell; "echo done");
    source.wait().await.unwrap();

    let dest = sh!(in shell; "true");
    let err = source.pipe(&dest).unwrap_err();
    assert!(matches!(err, Error::PipeMisuse { .. }));
    dest.await.unwrap();
}

#[smol_potat::test]
async fn test_pipe_into_started_destination_without_stdin_fails() {
    let shell = test_shell();
    let dest = sh!(in shell; "true");
    dest.wait().await.unwrap();

    let source = sh!(in shell; "echo unused");
    let err = source.pipe(&dest).unwrap_err();
    assert!(matches!(err, Error::PipeMisuse { .. }));
    source.await.unwrap();
}

#[smol_potat::test]
async fn test_pipe_into_itself_fails() {
    let shell = test_shell();
    let cmd = sh!(in shell; "true");
    assert!(matches!(cmd.pipe(&cmd), Err(Error::PipeMisuse { .. })));
    cmd.await.unwrap();
}

#[smol_potat::test]
async fn test_downstream_exit_stops_upstream() {
    let shell = test_shell();
    let result = sh!(in shell; "yes")
        .no_throw()
        .pipe(sh!(in shell; "head -n 3"))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(result.stdout(), "y\ny\ny\n");
}

#[derive(Clone, Default)]
struct Collect {
    bytes: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl AsyncWrite for Collect {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
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
async fn test_pipe_into_writer() {
    let shell = test_shell();
    let sink = Collect::default();
    let source = sh!(in shell; "echo one; echo two")
        .pipe(PipeTarget::writer(sink.clone()))
        .unwrap();
    let result = source.await.unwrap();
    assert_eq!(result.stdout(), "");

    for _ in 0..100 {
        if sink.closed.load(Ordering::SeqCst) {
            break;
        }
        smol::Timer::after(Duration::from_millis(10)).await;
    }
    assert!(sink.closed.load(Ordering::SeqCst), "sink was never closed");
    assert_eq!(sink.bytes.lock().unwrap().as_slice(), b"one\ntwo\n");
}

#[smol_potat::test]
async fn test_pipe_into_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let file = async_fs_file(&path);

    let shell = test_shell();
    sh!(in shell; "echo to file")
        .pipe(PipeTarget::writer(file))
        .unwrap()
        .await
        .unwrap();

    for _ in 0..100 {
        if std::fs::read_to_string(&path).unwrap() == "to file\n" {
            return;
        }
        smol::Timer::after(Duration::from_millis(10)).await;
    }
    panic!("file never received the output");
}

fn async_fs_file(path: &std::path::Path) -> smol::Unblock<std::fs::File> {
    smol::Unblock::new(std::fs::File::create(path).unwrap())
}

#[smol_potat::test]
async fn test_destination_keeps_its_writer_when_a_source_is_added() {
    let shell = test_shell();
    let sink = Collect::default();
    let upper = sh!(in shell; "tr a-z A-Z");
    upper.pipe(PipeTarget::writer(sink.clone())).unwrap();

    let result = sh!(in shell; "echo hello").pipe(&upper).unwrap().await.unwrap();
    assert_eq!(result.stdout(), "");

    for _ in 0..100 {
        if sink.closed.load(Ordering::SeqCst) {
            break;
        }
        smol::Timer::after(Duration::from_millis(10)).await;
    }
    assert!(sink.closed.load(Ordering::SeqCst), "sink was never closed");
    assert_eq!(sink.bytes.lock().unwrap().as_slice(), b"HELLO\n");
}

#[smol_potat::test]
async fn test_second_source_into_one_destination_fails() {
    let shell = test_shell();
    let dest = sh!(in shell; "cat");
    let first = sh!(in shell; "echo first");
    first.pipe(&dest).unwrap();

    let second = sh!(in shell; "echo second");
    let err = second.pipe(&dest).unwrap_err();
    assert!(matches!(err, Error::PipeMisuse { .. }));

    assert_eq!(dest.await.unwrap().stdout(), "first\n");
    assert_eq!(second.await.unwrap().stdout(), "second\n");
}
