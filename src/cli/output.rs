//! Styled run summaries
//!
//! Everything goes to stderr so stdout stays free for JSON-lines records and
//! machine-readable command output.

use console::{Term, style};
use std::fmt::Display;

/// Output handler for consistent CLI formatting
pub struct Output {
    term: Term,
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            verbose,
            quiet,
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.line(format!("{} {}", style("✔").green(), message));
        }
    }

    /// Errors are shown even in quiet mode.
    pub fn error(&self, message: &str) {
        self.line(format!("{} {}", style("✖").red(), message));
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            self.line(format!("{} {}", style("⚠").yellow(), message));
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.line(format!("{} {}", style("ℹ").blue(), message));
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            self.line(format!("{} {}", style("ℹ").dim(), style(message).dim()));
        }
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            self.line(format!("\n{}", style(title).bold().underlined()));
        }
    }

    pub fn step(&self, step: &str) {
        if !self.quiet {
            self.line(format!("{} {}", style("❯").cyan(), step));
        }
    }

    pub fn table_row(&self, key: &str, value: impl Display) {
        if !self.quiet {
            self.line(format!("  {:<20} {}", style(key).dim(), value));
        }
    }

    /// Green when the run produced what it was asked for, red otherwise.
    pub fn task_summary(&self, message: &str, success: bool) {
        if self.quiet {
            return;
        }
        if success {
            self.line(format!("{} {}", style("✔").green().bold(), style(message).green()));
        } else {
            self.line(format!("{} {}", style("✖").red().bold(), style(message).red()));
        }
    }

    fn line(&self, text: String) {
        // stderr may be closed
        let _ = self.term.write_line(&text);
    }
}
