pub mod builder;
pub mod pattern;

use std::{
    fmt::{Debug, Display},
    path::{Path, PathBuf},
};

pub use builder::DiagnosticBuilder;
pub use pattern::{DiagnosticPattern, Matcher, PatternError};

/// The line (or inclusive range of lines) a diagnostic points at.
///
/// `end` is `None` when the compiler reported a single line.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct LineRange {
    start: u32,
    end: Option<u32>,
}

impl Debug for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}..={}", self.start, end),
            None => write!(f, "{}", self.start),
        }
    }
}

impl Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "({} -- {})", self.start, end),
            None => write!(f, "({})", self.start),
        }
    }
}

impl LineRange {
    /// A single line.
    pub fn line(line: u32) -> Self {
        Self {
            start: line,
            end: None,
        }
    }

    /// An inclusive range of lines, as printed by `(<start> -- <end>)`.
    pub fn range(start: u32, end: u32) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    /// The last line of a multi-line range, `None` for a single line.
    pub fn end(&self) -> Option<u32> {
        self.end
    }

    /// The last line covered, which is `start` for a single line.
    pub fn last(&self) -> u32 {
        self.end.unwrap_or(self.start)
    }
}

/// Specifies the possible kinds of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// `fatal error`: the compiler stopped at this point.
    FatalError,
    /// `error`: the compiler carries on, but no artifact should be trusted.
    Error,
    /// `warning`: never fails an invocation.
    Warning,
    /// A line that is not a diagnostic at all (banners, sizes, abort notes).
    Info,
}

impl DiagnosticKind {
    /// Returns `true` for [`DiagnosticKind::Error`] and [`DiagnosticKind::FatalError`].
    pub fn is_error(&self) -> bool {
        matches!(self, DiagnosticKind::FatalError | DiagnosticKind::Error)
    }

    /// The keyword the compiler uses for this kind, `None` for [`DiagnosticKind::Info`].
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            DiagnosticKind::FatalError => Some("fatal error"),
            DiagnosticKind::Error => Some("error"),
            DiagnosticKind::Warning => Some("warning"),
            DiagnosticKind::Info => None,
        }
    }

    pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "fatal error" => Some(DiagnosticKind::FatalError),
            "error" => Some(DiagnosticKind::Error),
            "warning" => Some(DiagnosticKind::Warning),
            _ => None,
        }
    }
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword().unwrap_or("info"))
    }
}

/// A single line of compiler output, classified.
///
/// Diagnostics of kind [`DiagnosticKind::Info`] only carry a message, which is the raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    location: Option<(PathBuf, LineRange)>,
    code: Option<u32>,
    message: String,
}

impl Diagnostic {
    /// Wraps a line that isn't a diagnostic.
    ///
    /// ```
    /// # use smac_lib::diagnostic::*;
    /// let d = Diagnostic::echo("Header size:            560 bytes");
    ///
    /// assert_eq!(d.kind(), DiagnosticKind::Info);
    /// assert!(d.filename().is_none());
    /// assert_eq!(d.to_string(), "Header size:            560 bytes");
    /// ```
    pub fn echo(line: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Info,
            location: None,
            code: None,
            message: line.into(),
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn filename(&self) -> Option<&Path> {
        self.location.as_ref().map(|(f, _)| f.as_path())
    }

    pub fn lines(&self) -> Option<LineRange> {
        self.location.as_ref().map(|(_, l)| *l)
    }

    pub fn code(&self) -> Option<u32> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }
}

/// Formats the diagnostic the way the compiler printed it.
impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.location, self.kind.keyword()) {
            (Some((file, lines)), Some(keyword)) => {
                write!(f, "{}{} : {}", file.display(), lines, keyword)?;
                if let Some(code) = self.code {
                    write!(f, " {code}")?;
                }
                write!(f, ": {}", self.message)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

/// The outcome of one compiler invocation.
///
/// A result is built once per invocation and always carries every diagnostic the compiler
/// printed, in output order, whether the invocation succeeded or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    artifact_name: String,
    artifact_path: PathBuf,
    diagnostics: Vec<Diagnostic>,
    aborted: bool,
    had_error: bool,
    exit_code: Option<i32>,
    stderr: Vec<String>,
}

impl CompileResult {
    pub(crate) fn new(
        artifact_path: PathBuf,
        diagnostics: Vec<Diagnostic>,
        aborted: bool,
        had_error: bool,
    ) -> Self {
        let artifact_name = artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            artifact_name,
            artifact_path,
            diagnostics,
            aborted,
            had_error,
            exit_code: None,
            stderr: Vec::new(),
        }
    }

    pub(crate) fn set_exit_code(&mut self, exit_code: Option<i32>) {
        self.exit_code = exit_code;
    }

    pub(crate) fn set_stderr(&mut self, stderr: Vec<String>) {
        self.stderr = stderr;
    }

    /// The file name of the artifact, e.g. `foo.amxx` for `foo.sma`.
    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Returns `true` if the output contained one of the abort phrases.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Returns `true` if any diagnostic is an error or a fatal error.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    /// Returns `true` if the invocation should be rejected.
    ///
    /// Errors and aborts are independent signals, either one is enough.
    pub fn is_failure(&self) -> bool {
        self.had_error || self.aborted
    }

    /// The exit code of the compiler, if it exited normally.
    ///
    /// Only informative: the compiler's exit code does not take part in deciding success.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Lines the compiler wrote to its standard error. These are never parsed as diagnostics.
    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// Returns an iterator over the errors and fatal errors.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics_of(DiagnosticKind::Warning)
    }
}
