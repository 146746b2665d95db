//! Shared helpers for integration tests

#![allow(dead_code)]

use std::time::Duration;

use lazy_command::{Config, Shell};
use process_tree::{ProcessTable, SystemProcessTable};

/// A shell that doesn't echo to the test output
pub fn test_shell() -> Shell {
    Shell::new(Config::new().verbose(false))
}

/// Poll until `pid` has exited (or is a zombie awaiting its reaper)
pub async fn gone(pid: u32) -> bool {
    let table = SystemProcessTable;
    for _ in 0..50 {
        match table.find(pid).await.unwrap() {
            None => return true,
            Some(p) if p.status.starts_with('Z') => return true,
            Some(_) => smol::Timer::after(Duration::from_millis(50)).await,
        };
    }
    false
}
