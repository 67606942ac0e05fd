// xarf-schema-tools/src/report.rs

use crossterm::style::{style, Stylize};
use std::io::Write;

/// Severity of one console status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status { Info, Progress, Success, Warning, Error, Plain }

/// Sink for the human-readable status lines the tools print.
pub trait Reporter {
    fn line(&mut self, status: Status, message: &str);

    fn blank(&mut self) { self.line(Status::Plain, ""); }
}

/// Writes status lines to stdout, colorized unless disabled.
pub struct ConsoleReporter { color: bool }

impl ConsoleReporter {
    pub fn new(color: bool) -> Self { Self { color } }
}

impl Reporter for ConsoleReporter {
    fn line(&mut self, status: Status, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = if !self.color {
            writeln!(out, "{message}")
        } else {
            match status {
                Status::Info => writeln!(out, "{}", style(message).blue()),
                Status::Progress => writeln!(out, "{}", style(message).cyan()),
                Status::Success => writeln!(out, "{}", style(message).green()),
                Status::Warning => writeln!(out, "{}", style(message).yellow()),
                Status::Error => writeln!(out, "{}", style(message).red()),
                Status::Plain => writeln!(out, "{message}"),
            }
        };
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct BufferReporter { pub lines: Vec<(Status, String)> }

impl BufferReporter {
    pub fn new() -> Self { Self::default() }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, l)| l.contains(needle))
    }

    pub fn with_status(&self, status: Status) -> impl Iterator<Item = &str> {
        self.lines.iter().filter(move |(s, _)| *s == status).map(|(_, l)| l.as_str())
    }
}

impl Reporter for BufferReporter {
    fn line(&mut self, status: Status, message: &str) {
        self.lines.push((status, message.to_string()));
    }
}
