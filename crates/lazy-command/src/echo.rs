//! Console echo of command lines and live output

use std::borrow::Cow;
use std::io::{self, Write};

use colored::Colorize;

/// Source of a chunk of process output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// How one command presents itself on the console
#[derive(Debug, Clone, Default)]
pub(crate) struct Presentation {
    echo: bool,
    sanitize: Vec<String>,
}

impl Presentation {
    pub(crate) fn new(echo: bool, sanitize: Vec<String>) -> Self {
        Self { echo, sanitize }
    }

    /// Replace every sanitize key in `text` with `***`
    pub(crate) fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut text = Cow::Borrowed(text);
        for key in self.sanitize.iter().filter(|key| !key.is_empty()) {
            if text.contains(key.as_str()) {
                text = Cow::Owned(text.replace(key.as_str(), "***"));
            }
        }
        text
    }

    pub(crate) fn is_echoing(&self) -> bool {
        self.echo
    }

    pub(crate) fn command(&self, line: &str) {
        if self.echo {
            // echo is best effort; a closed console must not fail the command
            let _ = self.write_command(&mut std::io::stdout().lock(), line);
        }
    }

    pub(crate) fn output(&self, source: OutputSource, chunk: &[u8]) {
        if !self.echo {
            return;
        }
        let _ = match source {
            OutputSource::Stdout => self.write_output(&mut std::io::stdout().lock(), chunk),
            OutputSource::Stderr => self.write_output(&mut std::io::stderr().lock(), chunk),
        };
    }

    /// Write the redacted command line to `out`
    pub(crate) fn write_command(&self, out: &mut impl Write, line: &str) -> io::Result<()> {
        write_command(out, &self.redact(line))
    }

    /// Write a redacted chunk of output to `out`
    pub(crate) fn write_output(&self, out: &mut impl Write, chunk: &[u8]) -> io::Result<()> {
        if self.sanitize.is_empty() {
            return out.write_all(chunk);
        }
        out.write_all(self.redact(&String::from_utf8_lossy(chunk)).as_bytes())
    }
}

/// Print `$ command`, continuation lines prefixed with `>`
pub(crate) fn print_command(line: &str) {
    let _ = write_command(&mut std::io::stdout().lock(), line);
}

fn write_command(out: &mut impl Write, line: &str) -> io::Result<()> {
    for (i, part) in line.split('\n').enumerate() {
        let marker = if i == 0 { "$" } else { ">" };
        writeln!(out, "{} {}", marker, highlight_program(part))?;
    }
    Ok(())
}

/// Highlight the leading program name of a command line
fn highlight_program(line: &str) -> String {
    let end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        .unwrap_or(line.len());
    let rest = &line[end..];
    if end == 0 || !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return line.to_string();
    }
    format!("{}{}", line[..end].bright_green(), rest)
}
