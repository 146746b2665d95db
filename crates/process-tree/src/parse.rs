//! Parsers for the platform process listings
//!
//! All parsers are compiled on every platform so they can be tested anywhere;
//! [`SystemProcessTable`](crate::SystemProcessTable) picks the one matching
//! the host.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};
use crate::tree::ProcessInfo;

/// Parse `ps -A -o ppid=,pid=,stat=,comm=` output
///
/// The command column comes last so that names containing spaces survive.
pub fn parse_ps(output: &str) -> Result<Vec<ProcessInfo>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_ps_line)
        .collect()
}

fn parse_ps_line(line: &str) -> Result<ProcessInfo> {
    let mut rest = line.trim_start();
    let mut fields = [""; 3];
    for field in fields.iter_mut() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        *field = &rest[..end];
        rest = rest[end..].trim_start();
    }
    let command = rest.trim_end();
    if fields.iter().any(|f| f.is_empty()) || command.is_empty() {
        return Err(Error::parse(line));
    }

    Ok(ProcessInfo {
        command: command.to_string(),
        parent_pid: fields[0].parse().map_err(|_| Error::parse(line))?,
        pid: fields[1].parse().map_err(|_| Error::parse(line))?,
        status: fields[2].to_string(),
    })
}

/// Parse `wmic process get Name,ParentProcessId,ProcessId,Status /format:csv`
///
/// Column positions are taken from the header row, which wmic emits in its
/// own order regardless of the requested one.
pub fn parse_wmic_csv(output: &str) -> Result<Vec<ProcessInfo>> {
    let mut lines = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let header = lines
        .next()
        .ok_or_else(|| Error::list_failed("empty wmic output"))?;
    let columns: Vec<&str> = header.split(',').collect();
    let position = |name: &str| {
        columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::parse(header))
    };
    let name_at = position("Name")?;
    let ppid_at = position("ParentProcessId")?;
    let pid_at = position("ProcessId")?;
    let status_at = position("Status")?;

    lines
        .map(|line| {
            let cells: Vec<&str> = line.split(',').collect();
            let cell = |at: usize| cells.get(at).copied().ok_or_else(|| Error::parse(line));
            Ok(ProcessInfo {
                command: cell(name_at)?.to_string(),
                parent_pid: cell(ppid_at)?.parse().map_err(|_| Error::parse(line))?,
                pid: cell(pid_at)?.parse().map_err(|_| Error::parse(line))?,
                status: cell(status_at)?.to_string(),
            })
        })
        .collect()
}

/// Parse the contents of a `/proc/<pid>/stat` file
pub fn parse_proc_stat(contents: &str) -> Result<ProcessInfo> {
    let contents = contents.trim_end();
    let open = contents.find('(').ok_or_else(|| Error::parse(contents))?;
    // the command may itself contain parentheses
    let close = contents.rfind(')').ok_or_else(|| Error::parse(contents))?;
    if close < open {
        return Err(Error::parse(contents));
    }

    let pid = contents[..open]
        .trim()
        .parse()
        .map_err(|_| Error::parse(contents))?;
    let command = &contents[open + 1..close];
    let mut rest = contents[close + 1..].split_whitespace();
    let status = rest.next().ok_or_else(|| Error::parse(contents))?;
    let parent_pid = rest
        .next()
        .and_then(|ppid| ppid.parse().ok())
        .ok_or_else(|| Error::parse(contents))?;

    Ok(ProcessInfo {
        command: command.to_string(),
        parent_pid,
        pid,
        status: status.to_string(),
    })
}

/// Read every process from a procfs mount such as `/proc`
///
/// Processes that exit while the directory is being walked are skipped.
pub fn read_proc_dir(root: &Path) -> Result<Vec<ProcessInfo>> {
    let mut processes = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let is_pid = entry
            .file_name()
            .to_str()
            .is_some_and(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()));
        if !is_pid {
            continue;
        }

        match fs::read_to_string(entry.path().join("stat")) {
            Ok(contents) => processes.push(parse_proc_stat(&contents)?),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {}
            // ESRCH
            Err(e) if e.raw_os_error() == Some(3) => {}
            Err(e) => return Err(e.into()),
        }
    }
    processes.sort_by_key(|p| p.pid);
    Ok(processes)
}
