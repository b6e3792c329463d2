//! Turns the raw standard output of one compiler run into diagnostics.

use std::{borrow::Cow, path::PathBuf};

use crate::{
    compile::CompileRequest,
    diagnostic::{CompileResult, Diagnostic, DiagnosticKind, Matcher},
};

/// Line prefixes the compiler prints when it gives up, with or without an error line before them.
///
/// These are matched against the compiler's English output and will miss localised or reworded
/// builds of the compiler.
pub const ABORT_PHRASES: [&str; 2] = ["Compilation aborted.", "Could not locate output file"];

/// Receives every diagnostic as soon as it is classified, e.g. to print it.
pub trait Observer: Send + Sync {
    fn on_diagnostic(&self, diagnostic: &Diagnostic);

    /// Called before anything is done for `request`.
    fn on_start(&self, _request: &CompileRequest) {}

    /// Called once per invocation with its outcome.
    fn on_finish(&self, _outcome: &crate::Result<CompileResult>) {}
}

/// An [`Observer`] that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_diagnostic(&self, _: &Diagnostic) {}
}

impl<F> Observer for F
where
    F: Fn(&Diagnostic) + Send + Sync,
{
    fn on_diagnostic(&self, diagnostic: &Diagnostic) {
        self(diagnostic)
    }
}

/// Collects standard output chunks in arrival order.
///
/// Nothing is parsed until [`OutputAccumulator::finish`], so a line split over two chunks is seen
/// whole.
#[derive(Debug, Default)]
pub struct OutputAccumulator {
    buffer: Vec<u8>,
    chunks: usize,
}

impl OutputAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(chunk);
        self.chunks += 1;
    }

    /// Number of non-empty chunks received so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The output received so far, invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Classifies everything received and builds the result for `artifact_path`.
    pub fn finish(
        self,
        artifact_path: PathBuf,
        matcher: &Matcher,
        observer: &dyn Observer,
    ) -> CompileResult {
        classify_output(&self.text(), matcher, observer).into_result(artifact_path)
    }
}

/// The classified output of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub diagnostics: Vec<Diagnostic>,
    pub aborted: bool,
    pub had_error: bool,
}

impl Classification {
    pub fn into_result(self, artifact_path: PathBuf) -> CompileResult {
        CompileResult::new(artifact_path, self.diagnostics, self.aborted, self.had_error)
    }
}

/// Splits `output` into lines and classifies each of them.
///
/// Both `\n` and `\r\n` end a line. A terminator at the very end doesn't produce an extra
/// diagnostic, but blank lines in between do (as [`DiagnosticKind::Info`] with an empty message),
/// so every line the compiler printed is accounted for.
pub fn classify_output(output: &str, matcher: &Matcher, observer: &dyn Observer) -> Classification {
    let mut res = Classification::default();

    for line in output.lines() {
        let diagnostic = matcher.classify(line);

        match diagnostic.kind() {
            DiagnosticKind::FatalError | DiagnosticKind::Error => res.had_error = true,
            DiagnosticKind::Info if is_abort_line(line) => res.aborted = true,
            _ => {}
        }

        observer.on_diagnostic(&diagnostic);
        res.diagnostics.push(diagnostic);
    }

    res
}

fn is_abort_line(line: &str) -> bool {
    ABORT_PHRASES.iter().any(|phrase| line.starts_with(phrase))
}
