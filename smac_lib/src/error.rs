//! Error types for compiler invocations.

use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::CompileResult;

/// Ways a single invocation can be rejected.
#[derive(Debug, Error)]
pub enum Error {
    /// The compiler could not be launched at all.
    #[error("failed to launch compiler `{}`: {source}", .compiler.display())]
    Spawn {
        compiler: PathBuf,
        #[source]
        source: std::io::Error,
        /// Whatever output had been collected, classified. Empty in practice.
        partial: Box<CompileResult>,
    },

    /// The compiler ran and reported an error, or aborted.
    #[error("{}", describe_failure(.0))]
    Compile(Box<CompileResult>),

    /// The destination directory could not be created.
    #[error("failed to create destination directory `{}`: {source}", .path.display())]
    DestDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the compiler's output or waiting for it failed.
    #[error("lost track of compiler `{}`: {source}", .compiler.display())]
    Io {
        compiler: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// The result attached to the error, if the compiler got far enough to produce one.
    pub fn result(&self) -> Option<&CompileResult> {
        match self {
            Error::Spawn { partial, .. } => Some(partial.as_ref()),
            Error::Compile(res) => Some(res.as_ref()),
            Error::DestDir { .. } | Error::Io { .. } => None,
        }
    }
}

fn describe_failure(res: &CompileResult) -> String {
    match res.errors().count() {
        0 => format!("failed to compile plugin {} (compilation aborted)", res.artifact_name()),
        1 => format!("failed to compile plugin {} (1 error)", res.artifact_name()),
        n => format!("failed to compile plugin {} ({n} errors)", res.artifact_name()),
    }
}

/// Result type alias for compiler invocations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from [`crate::compile::CompileRequestBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("no compiler path given")]
    MissingCompiler,
    #[error("no source file given")]
    MissingSource,
    #[error("no destination directory given")]
    MissingDestDir,
    #[error("source path `{}` has no file name", .0.display())]
    NoFileName(PathBuf),
}
