//! Captured outcome of a finished command

use std::fmt;
use std::panic::Location;

/// Immutable snapshot of a finished process
///
/// Returned on success and carried by [`Error::NonZeroExit`] and
/// [`Error::Signaled`](crate::Error::Signaled) on failure.
///
/// [`Error::NonZeroExit`]: crate::Error::NonZeroExit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    exit_code: Option<i32>,
    signal: Option<String>,
    stdout: String,
    stderr: String,
    combined: String,
    message: String,
}

impl ProcessResult {
    /// Start building a result by hand (useful for tests and fakes)
    pub fn builder() -> ProcessResultBuilder {
        ProcessResultBuilder::default()
    }

    /// Exit code, absent when the process was killed by a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Name of the signal that terminated the process, e.g. `SIGTERM`
    pub fn signal(&self) -> Option<&str> {
        self.signal.as_deref()
    }

    /// Everything the process wrote to stdout
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Everything the process wrote to stderr
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// stdout and stderr interleaved in arrival order
    pub fn combined(&self) -> &str {
        &self.combined
    }

    /// Human-readable summary: captured stderr, call site, exit code, signal
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the process exited with code zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout without its trailing newline, as used for substitution
    pub fn trimmed_stdout(&self) -> &str {
        self.stdout.strip_suffix('\n').unwrap_or(&self.stdout)
    }
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.combined)
    }
}

/// Builder for [`ProcessResult`]
#[derive(Debug, Default)]
pub struct ProcessResultBuilder {
    exit_code: Option<i32>,
    signal: Option<String>,
    stdout: String,
    stderr: String,
    combined: Option<String>,
    location: Option<&'static Location<'static>>,
}

impl ProcessResultBuilder {
    /// Set the exit code
    pub fn exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Set the terminating signal name
    pub fn signal(mut self, signal: Option<String>) -> Self {
        self.signal = signal;
        self
    }

    /// Set captured stdout
    pub fn stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Set captured stderr
    pub fn stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Set the combined stream; defaults to stdout followed by stderr
    pub fn combined(mut self, combined: impl Into<String>) -> Self {
        self.combined = Some(combined.into());
        self
    }

    /// Set the call site reported in the message
    pub fn location(mut self, location: &'static Location<'static>) -> Self {
        self.location = Some(location);
        self
    }

    /// Build the result, composing its message
    pub fn build(self) -> ProcessResult {
        let message = compose_message(
            &self.stderr,
            self.location,
            self.exit_code,
            self.signal.as_deref(),
        );
        let combined = self
            .combined
            .unwrap_or_else(|| format!("{}{}", self.stdout, self.stderr));

        ProcessResult {
            exit_code: self.exit_code,
            signal: self.signal,
            stdout: self.stdout,
            stderr: self.stderr,
            combined,
            message,
        }
    }
}

fn compose_message(
    stderr: &str,
    location: Option<&'static Location<'static>>,
    exit_code: Option<i32>,
    signal: Option<&str>,
) -> String {
    let mut message = if stderr.is_empty() {
        "\n".to_string()
    } else {
        stderr.to_string()
    };
    if let Some(location) = location {
        message.push_str(&format!("    at {}", location));
    }

    match exit_code {
        Some(code) => {
            message.push_str(&format!("\n    exit code: {}", code));
            if let Some(info) = exit_code_info(code) {
                message.push_str(&format!(" ({})", info));
            }
        }
        None => message.push_str("\n    exit code: none"),
    }
    if let Some(signal) = signal {
        message.push_str(&format!("\n    signal: {}", signal));
    }
    message
}

/// Conventional meaning of a shell exit code
pub fn exit_code_info(code: i32) -> Option<&'static str> {
    let info = match code {
        2 => "Misuse of shell builtins",
        126 => "Invoked command cannot execute",
        127 => "Command not found",
        128 => "Invalid exit argument",
        129 => "Hangup",
        130 => "Interrupt",
        131 => "Quit and dump core",
        132 => "Illegal instruction",
        133 => "Trace/breakpoint trap",
        134 => "Process aborted",
        135 => "Bus error: \"access to undefined portion of memory object\"",
        136 => "Floating point exception: \"erroneous arithmetic operation\"",
        137 => "Kill (terminate immediately)",
        138 => "User-defined 1",
        139 => "Segmentation violation",
        140 => "User-defined 2",
        141 => "Write to pipe with no one reading",
        142 => "Signal raised by alarm",
        143 => "Termination (request to terminate)",
        145 => "Child process terminated, stopped (or continued*)",
        146 => "Continue if stopped",
        147 => "Stop executing temporarily",
        148 => "Terminal stop signal",
        149 => "Background process attempting to read from tty (\"in\")",
        150 => "Background process attempting to write to tty (\"out\")",
        151 => "Urgent data available on socket",
        152 => "CPU time limit exceeded",
        153 => "File size limit exceeded",
        154 => "Signal raised by timer counting virtual time: \"virtual timer expired\"",
        155 => "Profiling timer expired",
        157 => "Pollable event",
        159 => "Bad syscall",
        _ => return None,
    };
    Some(info)
}
