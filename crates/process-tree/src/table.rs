//! Process table trait and the host implementation

use async_process::Stdio;
use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::parse;
use crate::signal::Signal;
use crate::tree::{ProcessInfo, ProcessTreeNode, build_tree};

/// Access to the processes of a host
///
/// Implementors only have to list processes and deliver signals; tree
/// resolution is provided on top of the listing.
#[async_trait]
pub trait ProcessTable: Send + Sync {
    /// List every process currently running
    async fn list(&self) -> Result<Vec<ProcessInfo>>;

    /// Deliver `signal` to a single process
    ///
    /// Returns [`Error::NoSuchProcess`] when the process has already exited.
    async fn signal(&self, pid: u32, signal: Signal) -> Result<()>;

    /// Look up a single process
    async fn find(&self, pid: u32) -> Result<Option<ProcessInfo>> {
        Ok(self.list().await?.into_iter().find(|p| p.pid == pid))
    }

    /// The trees of processes descending from `pid`
    async fn tree(&self, pid: u32) -> Result<Vec<ProcessTreeNode>> {
        Ok(build_tree(&self.list().await?, pid))
    }

    /// Pids of every descendant of `pid`, children before their parents
    async fn descendants(&self, pid: u32) -> Result<Vec<u32>> {
        Ok(self
            .tree(pid)
            .await?
            .iter()
            .flat_map(ProcessTreeNode::pids_leaves_first)
            .collect())
    }
}

/// The processes of the machine this program runs on
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessTable;

#[cfg(windows)]
const LISTING: &[&str] = &[
    "wmic.exe",
    "process",
    "get",
    "Name,ParentProcessId,ProcessId,Status",
    "/format:csv",
];

#[cfg(not(windows))]
const LISTING: &[&str] = &["ps", "-A", "-o", "ppid=,pid=,stat=,comm="];

impl SystemProcessTable {
    async fn run_listing(&self) -> Result<Vec<ProcessInfo>> {
        let output = async_process::Command::new(LISTING[0])
            .args(&LISTING[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::list_failed(format!("failed to run {}: {}", LISTING[0], e)))?;

        if !output.status.success() {
            return Err(Error::list_failed(format!(
                "{} exited with {}: {}",
                LISTING[0],
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        if cfg!(windows) {
            parse::parse_wmic_csv(&text)
        } else {
            parse::parse_ps(&text)
        }
    }
}

#[async_trait]
impl ProcessTable for SystemProcessTable {
    async fn list(&self) -> Result<Vec<ProcessInfo>> {
        #[cfg(target_os = "linux")]
        {
            match parse::read_proc_dir(std::path::Path::new("/proc")) {
                Ok(processes) if !processes.is_empty() => return Ok(processes),
                Ok(_) => tracing::debug!("/proc listed no processes, falling back to {}", LISTING[0]),
                Err(e) => tracing::debug!("failed to read /proc, falling back to {}: {}", LISTING[0], e),
            }
        }

        self.run_listing().await
    }

    async fn signal(&self, pid: u32, signal: Signal) -> Result<()> {
        if pid == 0 {
            return Err(Error::signal_failed(pid, signal, "refusing to signal pid 0"));
        }

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::unistd::Pid;

            let raw = i32::try_from(pid)
                .map_err(|_| Error::signal_failed(pid, signal, "pid out of range"))?;
            match nix::sys::signal::kill(Pid::from_raw(raw), signal.to_nix()) {
                Ok(()) => Ok(()),
                Err(Errno::ESRCH) => Err(Error::NoSuchProcess { pid }),
                Err(e) => Err(Error::signal_failed(pid, signal, e.to_string())),
            }
        }

        #[cfg(not(unix))]
        {
            let mut cmd = async_process::Command::new("taskkill");
            if signal == Signal::Kill {
                cmd.arg("/f");
            }
            let output = cmd
                .arg("/pid")
                .arg(pid.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()
                .await?;

            if output.status.success() {
                Ok(())
            } else {
                let reason = String::from_utf8_lossy(&output.stderr).trim().to_string();
                if reason.contains("not found") {
                    Err(Error::NoSuchProcess { pid })
                } else {
                    Err(Error::signal_failed(pid, signal, reason))
                }
            }
        }
    }
}
