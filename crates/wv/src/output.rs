//! Colored terminal output utilities.

use console::{Style, Term};
use wv_directives::{Notice, Severity};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    red_bold: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            red_bold: Style::new().red().bold(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a status bar notice styled by severity.
    pub(crate) fn notice(&self, notice: &Notice) {
        let line = format!("[{}] {}", notice.severity, notice.message);
        match notice.severity {
            Severity::Info => self.info(&line),
            Severity::Warn => self.warning(&line),
            Severity::Error => self.error(&line),
            Severity::Fatal => {
                let _ = self
                    .term
                    .write_line(&self.red_bold.apply_to(line).to_string());
            }
        }
    }
}
