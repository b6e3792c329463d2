use std::path::PathBuf;

use super::{Diagnostic, DiagnosticKind, LineRange};

/// Builds located diagnostics, one `build_*` per kind.
#[derive(Debug, Clone)]
pub struct DiagnosticBuilder {
    filename: PathBuf,
    lines: LineRange,
}

impl DiagnosticBuilder {
    pub fn new(filename: impl Into<PathBuf>, lines: LineRange) -> Self {
        Self {
            filename: filename.into(),
            lines,
        }
    }

    /// Builds a diagnostic of the given kind.
    ///
    /// Building a [`DiagnosticKind::Info`] drops the location and the code, so the result is the
    /// same as [`Diagnostic::echo`] with the message.
    pub fn build(self, kind: DiagnosticKind, code: u32, message: impl Into<String>) -> Diagnostic {
        if kind == DiagnosticKind::Info {
            return Diagnostic::echo(message);
        }
        Diagnostic {
            kind,
            location: Some((self.filename, self.lines)),
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn build_fatal(self, code: u32, message: impl Into<String>) -> Diagnostic {
        self.build(DiagnosticKind::FatalError, code, message)
    }

    pub fn build_error(self, code: u32, message: impl Into<String>) -> Diagnostic {
        self.build(DiagnosticKind::Error, code, message)
    }

    pub fn build_warning(self, code: u32, message: impl Into<String>) -> Diagnostic {
        self.build(DiagnosticKind::Warning, code, message)
    }
}
