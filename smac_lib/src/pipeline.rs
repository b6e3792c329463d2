//! Feeds a sequence of source files through the compiler.
//!
//! Files that compile are passed on unchanged. The first failure stops the pipeline unless
//! [`Settings::ignore_errors`] is set, in which case failing files are passed on as well.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;
use tokio::{sync::Semaphore, task::JoinSet};
use walkdir::WalkDir;

use crate::{
    compile::{CompileRequest, Compiler},
    error::{Error, RequestError},
    settings::Settings,
};

/// Extension of compiler source files.
pub const SOURCE_EXTENSION: &str = "sma";

/// What backs a [`PipelineFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contents {
    /// Nothing, e.g. a directory entry. Passed on without compiling.
    Null,
    /// The file at [`PipelineFile::path`].
    OnDisk,
    /// Only readable as a stream, which the compiler can't take.
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFile {
    pub path: PathBuf,
    /// The path relative to the directory the files were collected from.
    pub relative: PathBuf,
    pub contents: Contents,
}

impl PipelineFile {
    pub fn new(path: impl Into<PathBuf>, relative: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            relative: relative.into(),
            contents: Contents::OnDisk,
        }
    }

    pub fn with_contents(mut self, contents: Contents) -> Self {
        self.contents = contents;
        self
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("streaming not supported: `{}`", .0.display())]
    StreamingNotSupported(PathBuf),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("`{}`: {source}", .path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: Error,
    },

    #[error("compile task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Arc<Settings>,
    compiler: Compiler,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            compiler: Compiler::default(),
        }
    }

    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The directory the artifact of `file` goes to.
    pub fn dest_dir_for(&self, file: &PipelineFile) -> PathBuf {
        if self.settings.ignore_sub_dirs {
            return self.settings.dest.clone();
        }
        match file.relative.parent() {
            Some(sub_dir) => self.settings.dest.join(sub_dir),
            None => self.settings.dest.clone(),
        }
    }

    pub fn request_for(&self, file: &PipelineFile) -> Result<CompileRequest, RequestError> {
        CompileRequest::builder()
            .compiler(&self.settings.compiler)
            .source(&file.path)
            .include_dirs(&self.settings.include_dirs)
            .dest_dir(self.dest_dir_for(file))
            .build()
    }

    /// Compiles a single file, handing it back if it may continue down the pipeline.
    pub async fn process(&self, file: PipelineFile) -> Result<PipelineFile, PipelineError> {
        match file.contents {
            Contents::Null => return Ok(file),
            Contents::Stream => return Err(PipelineError::StreamingNotSupported(file.path)),
            Contents::OnDisk => {}
        }

        let request = self.request_for(&file)?;
        match self.compiler.compile(&request).await {
            Ok(_) => Ok(file),
            Err(err) if self.settings.ignore_errors => {
                tracing::warn!(path = %file.path.display(), %err, "ignoring failed compile");
                Ok(file)
            }
            Err(source) => Err(PipelineError::Compile {
                path: file.path,
                source,
            }),
        }
    }

    /// Compiles every file, running at most [`Settings::jobs`] compilers at once.
    ///
    /// Returns the files that passed, in input order. On an error that isn't ignored the
    /// remaining compiles are abandoned (running compilers are left to finish on their own).
    pub async fn run<I>(&self, files: I) -> Result<Vec<PipelineFile>, PipelineError>
    where
        I: IntoIterator<Item = PipelineFile>,
    {
        let permits = Arc::new(Semaphore::new(self.settings.jobs.get()));
        let mut tasks = JoinSet::new();
        let mut passed = Vec::new();

        for (index, file) in files.into_iter().enumerate() {
            let pipeline = self.clone();
            let permits = Arc::clone(&permits);
            passed.push(None);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, pipeline.process(file).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, res) = joined?;
            passed[index] = Some(res?);
        }

        Ok(passed.into_iter().flatten().collect())
    }
}

/// Collects every file with the given extension under `root`, sorted by path.
pub fn discover_sources(
    root: &Path,
    extension: &str,
) -> Result<Vec<PipelineFile>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.path().extension() != Some(OsStr::new(extension)) {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        files.push(PipelineFile::new(entry.path(), relative));
    }
    Ok(files)
}
