//! Recognises compiler diagnostic lines.
//!
//! The compiler prints diagnostics as
//!
//! ```text
//! <file>(<line>) : <kind> <code>: <message>
//! <file>(<start> -- <end>) : <kind> <code>: <message>
//! ```
//!
//! where `<kind>` is one of `fatal error`, `error` or `warning`. Every part of the line has its
//! own sub-pattern in [`DiagnosticPattern`] so a single part can be swapped out (a narrower file
//! name class for instance) without touching the others.
//!
//! The file name is anything up to the first `(<line>) : <kind> <code>: ` that follows it, so
//! paths with any character in them, non-ASCII or parentheses included, still count.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

use super::{Diagnostic, DiagnosticBuilder, DiagnosticKind, LineRange};
use crate::util::Ice;

const FILENAME: &str = r".+?";
const LINE_RANGE: &str = r"\((?P<start>[0-9]+)(?:\s*--?\s*(?P<end>[0-9]+))?\)";
const KIND: &str = r"(?:fatal\s)?error|warning";
const CODE: &str = r"[0-9]+";
const MESSAGE: &str = r".*";

static STANDARD: Lazy<Matcher> = Lazy::new(|| DiagnosticPattern::default().compile().ice());

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid diagnostic pattern: {0}")]
    Invalid(#[from] regex::Error),
    #[error("the line range pattern must define a `{0}` capture group")]
    MissingGroup(&'static str),
}

/// The sub-patterns making up one diagnostic line.
///
/// The line range sub-pattern has to name its first line `start` and may name its last line
/// `end`. The other sub-patterns are wrapped in their own groups and shouldn't name any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticPattern {
    filename: String,
    line_range: String,
    kind: String,
    code: String,
    message: String,
}

impl Default for DiagnosticPattern {
    fn default() -> Self {
        Self {
            filename: FILENAME.to_owned(),
            line_range: LINE_RANGE.to_owned(),
            kind: KIND.to_owned(),
            code: CODE.to_owned(),
            message: MESSAGE.to_owned(),
        }
    }
}

impl DiagnosticPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, pattern: impl Into<String>) -> Self {
        self.filename = pattern.into();
        self
    }

    pub fn with_line_range(mut self, pattern: impl Into<String>) -> Self {
        self.line_range = pattern.into();
        self
    }

    pub fn with_kind(mut self, pattern: impl Into<String>) -> Self {
        self.kind = pattern.into();
        self
    }

    pub fn with_code(mut self, pattern: impl Into<String>) -> Self {
        self.code = pattern.into();
        self
    }

    pub fn with_message(mut self, pattern: impl Into<String>) -> Self {
        self.message = pattern.into();
        self
    }

    /// The full pattern, anchored at both ends of the line.
    pub fn as_regex_source(&self) -> String {
        format!(
            r"^(?P<filename>{}){}\s:\s(?P<kind>{})\s(?P<code>{}):\s(?P<message>{})$",
            self.filename, self.line_range, self.kind, self.code, self.message
        )
    }

    pub fn compile(&self) -> Result<Matcher, PatternError> {
        let regex = Regex::new(&self.as_regex_source())?;
        if !regex.capture_names().flatten().any(|n| n == "start") {
            return Err(PatternError::MissingGroup("start"));
        }
        Ok(Matcher { regex })
    }
}

/// A compiled [`DiagnosticPattern`].
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::standard().clone()
    }
}

impl Matcher {
    /// The matcher for the compiler's own format, shared by every caller.
    pub fn standard() -> &'static Matcher {
        &STANDARD
    }

    /// Returns `true` if the line has the shape of a diagnostic.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Classifies one line of output (without its terminator).
    ///
    /// Lines that don't match become [`DiagnosticKind::Info`] diagnostics holding the line as is.
    /// A line that matches but carries a number that doesn't fit is logged and treated the same
    /// way, it never aborts the classification.
    ///
    /// ```
    /// # use smac_lib::diagnostic::*;
    /// let d = Matcher::standard().classify("foo.sma(10) : error 123: undefined symbol");
    ///
    /// assert_eq!(d.kind(), DiagnosticKind::Error);
    /// assert_eq!(d.code(), Some(123));
    /// assert_eq!(d.lines().map(|l| l.start()), Some(10));
    /// assert_eq!(d.message(), "undefined symbol");
    /// ```
    pub fn classify(&self, line: &str) -> Diagnostic {
        let Some(caps) = self.regex.captures(line) else {
            return Diagnostic::echo(line);
        };
        match parse_captures(&caps) {
            Ok(diagnostic) => diagnostic,
            Err(field) => {
                tracing::warn!(line, field, "diagnostic-like line with a malformed field");
                Diagnostic::echo(line)
            }
        }
    }
}

/// Turns the captures of a matching line into a diagnostic, or names the field that didn't
/// parse.
fn parse_captures(caps: &Captures<'_>) -> Result<Diagnostic, &'static str> {
    let number = |name: &'static str| -> Result<Option<u32>, &'static str> {
        caps.name(name)
            .map(|m| m.as_str().parse::<u32>().map_err(|_| name))
            .transpose()
    };

    let start = number("start")?.ok_or("start")?;
    let lines = match number("end")? {
        Some(end) => LineRange::range(start, end),
        None => LineRange::line(start),
    };
    let code = number("code")?.ok_or("code")?;

    let keyword = caps.name("kind").map_or("", |m| m.as_str());
    let keyword = keyword.split_whitespace().collect::<Vec<_>>().join(" ");
    let kind = DiagnosticKind::from_keyword(&keyword).ok_or("kind")?;

    let filename = caps.name("filename").map_or("", |m| m.as_str());
    let message = caps.name("message").map_or("", |m| m.as_str());

    Ok(DiagnosticBuilder::new(filename, lines).build(kind, code, message))
}
