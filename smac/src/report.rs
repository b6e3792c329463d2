use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use codespan_reporting::{
    diagnostic::{Diagnostic as Report, Label, Severity},
    files::{Files, SimpleFiles},
    term::{
        self,
        termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor},
    },
};
use smac_lib::{
    diagnostic::{Diagnostic, DiagnosticKind, LineRange},
    output::Observer,
    CompileRequest, CompileResult, Error,
};

/// Colors for the lines the reporter prints itself.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Compiler output that isn't a diagnostic.
    pub data: ColorSpec,
    pub debug: ColorSpec,
    pub info: ColorSpec,
    pub warn: ColorSpec,
    pub error: ColorSpec,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            data: color(Color::Black, true),
            debug: color(Color::Blue, false),
            info: color(Color::Green, false),
            warn: color(Color::Yellow, false),
            error: color(Color::Red, false),
        }
    }
}

fn color(fg: Color, intense: bool) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(fg)).set_intense(intense);
    spec
}

/// Prints diagnostics to stderr as they come in, with the offending source lines when the file
/// can be read.
pub struct Reporter {
    out: Mutex<StandardStream>,
    config: term::Config,
    theme: Theme,
    echo: bool,
    sources: Mutex<Sources>,
}

impl Reporter {
    pub fn new(choice: ColorChoice, echo: bool) -> Self {
        Self::with_theme(choice, echo, Theme::default())
    }

    pub fn with_theme(choice: ColorChoice, echo: bool, theme: Theme) -> Self {
        let config = term::Config {
            chars: term::Chars {
                single_primary_caret: '─',
                single_secondary_caret: '─',
                multi_primary_caret_start: '╯',
                multi_secondary_caret_start: '╯',
                multi_primary_caret_end: '╯',
                multi_secondary_caret_end: '╯',
                ..term::Chars::box_drawing()
            },

            ..Default::default()
        };

        Self {
            out: Mutex::new(StandardStream::stderr(choice)),
            config,
            theme,
            echo,
            sources: Mutex::new(Sources::default()),
        }
    }

    /// Prints a line of its own, e.g. a summary.
    pub fn status(&self, spec: &ColorSpec, msg: &str) {
        if let Err(err) = write_line(&mut lock(&self.out), spec, msg) {
            tracing::debug!(%err, "failed to write to stderr");
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    fn to_report(&self, d: &Diagnostic) -> Report<usize> {
        let severity = match d.kind() {
            DiagnosticKind::FatalError | DiagnosticKind::Error => Severity::Error,
            DiagnosticKind::Warning => Severity::Warning,
            DiagnosticKind::Info => Severity::Note,
        };

        let mut report = Report::new(severity).with_message(d.message());
        if let Some(code) = d.code() {
            report = report.with_code(code.to_string());
        }

        if let (Some(file), Some(lines)) = (d.filename(), d.lines()) {
            report = match lock(&self.sources).label(file, lines) {
                Some(label) => report.with_labels(vec![label]),
                None => report.with_notes(vec![format!("at {}{lines}", file.display())]),
            };
        }

        if d.kind() == DiagnosticKind::FatalError {
            report = report.with_notes(vec!["fatal error, the compiler stopped here".to_owned()]);
        }

        report
    }
}

impl Observer for Reporter {
    fn on_diagnostic(&self, d: &Diagnostic) {
        if d.kind() == DiagnosticKind::Info {
            if self.echo {
                self.status(&self.theme.data, d.message());
            }
            return;
        }

        let report = self.to_report(d);
        let sources = lock(&self.sources);
        let mut out = lock(&self.out);
        if let Err(err) = term::emit(&mut *out, &self.config, &sources.files, &report) {
            tracing::debug!(%err, "failed to render diagnostic");
        }
    }

    fn on_start(&self, request: &CompileRequest) {
        let msg = format!("Building plugin '{}'...", request.source().display());
        self.status(&self.theme.debug, &msg);
    }

    fn on_finish(&self, outcome: &smac_lib::Result<CompileResult>) {
        match outcome {
            Ok(res) if res.warnings().next().is_some() => {
                let msg = format!(
                    "Plugin {} updated with {} warning(s).",
                    res.artifact_name(),
                    res.warnings().count()
                );
                self.status(&self.theme.warn, &msg);
            }
            Ok(res) => {
                let msg = format!("Plugin {} updated.", res.artifact_name());
                self.status(&self.theme.info, &msg);
            }
            Err(Error::Compile(res)) => {
                let msg = format!("Failed to compile plugin {}.", res.artifact_name());
                self.status(&self.theme.error, &msg);
            }
            Err(err) => self.status(&self.theme.error, &err.to_string()),
        }
    }
}

/// Source files read so far, `None` for the ones that couldn't be.
struct Sources {
    files: SimpleFiles<String, String>,
    ids: HashMap<PathBuf, Option<usize>>,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            files: SimpleFiles::new(),
            ids: HashMap::new(),
        }
    }
}

impl Sources {
    fn id(&mut self, path: &Path) -> Option<usize> {
        if let Some(id) = self.ids.get(path) {
            return *id;
        }

        let id = std::fs::read(path).ok().map(|bytes| {
            let source = String::from_utf8_lossy(&bytes).into_owned();
            self.files.add(path.display().to_string(), source)
        });
        self.ids.insert(path.to_path_buf(), id);
        id
    }

    /// Labels the whole of `lines` (1-based), without the final line break.
    fn label(&mut self, path: &Path, lines: LineRange) -> Option<Label<usize>> {
        let id = self.id(path)?;
        let first = self.files.line_range(id, lines.start().checked_sub(1)? as usize).ok()?;
        let last = self.files.line_range(id, lines.last().checked_sub(1)? as usize).ok()?;

        let source = self.files.get(id).ok()?.source();
        let end = last.end.max(first.start);
        let text = source.get(first.start..end)?.trim_end_matches(['\r', '\n']);

        Some(Label::primary(id, first.start..first.start + text.len()))
    }
}

fn write_line(out: &mut StandardStream, spec: &ColorSpec, msg: &str) -> std::io::Result<()> {
    out.set_color(spec)?;
    write!(out, "{msg}")?;
    out.reset()?;
    writeln!(out)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
