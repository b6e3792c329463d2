use std::{
    ffi::OsString,
    fmt::Debug,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::{ChildStderr, Command},
};

use crate::{
    diagnostic::{CompileResult, Matcher},
    error::{Error, RequestError, Result},
    output::{NoopObserver, Observer, OutputAccumulator},
    util,
};

/// Extension of the compiled plugin.
pub const ARTIFACT_EXTENSION: &str = "amxx";

const CHUNK_SIZE: usize = 8 * 1024;

/// Everything needed to compile one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    compiler: PathBuf,
    source: PathBuf,
    include_dirs: Vec<PathBuf>,
    dest_dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct CompileRequestBuilder {
    compiler: Option<PathBuf>,
    source: Option<PathBuf>,
    include_dirs: Vec<PathBuf>,
    dest_dir: Option<PathBuf>,
}

impl CompileRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = Some(compiler.into());
        self
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds one include directory after the ones already added.
    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn include_dirs<I>(mut self, dirs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        self.include_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn dest_dir(mut self, dest_dir: impl Into<PathBuf>) -> Self {
        self.dest_dir = Some(dest_dir.into());
        self
    }

    pub fn build(self) -> std::result::Result<CompileRequest, RequestError> {
        let compiler = self.compiler.ok_or(RequestError::MissingCompiler)?;
        let source = self.source.ok_or(RequestError::MissingSource)?;
        let dest_dir = self.dest_dir.ok_or(RequestError::MissingDestDir)?;
        if source.file_stem().is_none() {
            return Err(RequestError::NoFileName(source));
        }
        Ok(CompileRequest {
            compiler,
            source,
            include_dirs: self.include_dirs,
            dest_dir,
        })
    }
}

impl CompileRequest {
    pub fn builder() -> CompileRequestBuilder {
        CompileRequestBuilder::new()
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// `<file stem of the source>.amxx`
    pub fn artifact_name(&self) -> String {
        let stem = self.source.file_stem().unwrap_or_default();
        format!("{}.{ARTIFACT_EXTENSION}", stem.to_string_lossy())
    }

    pub fn dest_path(&self) -> PathBuf {
        self.dest_dir.join(self.artifact_name())
    }

    /// The compiler's arguments: the source, then `-o<dest>`, then one `-i<dir>` per include
    /// directory in order.
    ///
    /// ```
    /// # use smac_lib::compile::CompileRequest;
    /// let req = CompileRequest::builder()
    ///     .compiler("amxxpc")
    ///     .source("foo.sma")
    ///     .include_dirs(["a", "b"])
    ///     .dest_dir("out")
    ///     .build()
    ///     .unwrap();
    /// let args: Vec<_> = req.args().into_iter().map(|a| a.into_string().unwrap()).collect();
    ///
    /// assert_eq!(args[0], "foo.sma");
    /// assert_eq!(&args[2..], ["-ia", "-ib"]);
    /// ```
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(2 + self.include_dirs.len());
        args.push(self.source.clone().into_os_string());
        args.push(flag("-o", &self.dest_path()));
        args.extend(self.include_dirs.iter().map(|dir| flag("-i", dir)));
        args
    }

    /// The directory the compiler runs in: the one holding the executable.
    ///
    /// `None` for a bare program name, which is looked up on `PATH` and runs in the caller's
    /// working directory.
    pub fn working_dir(&self) -> Option<&Path> {
        self.compiler.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Makes every path absolute, since the compiler doesn't run in the caller's directory.
    fn resolved(&self) -> CompileRequest {
        let compiler = match self.working_dir() {
            Some(_) => util::absolute(&self.compiler),
            None => self.compiler.clone(),
        };
        CompileRequest {
            compiler,
            source: util::absolute(&self.source),
            include_dirs: self.include_dirs.iter().map(|d| util::absolute(d)).collect(),
            dest_dir: util::absolute(&self.dest_dir),
        }
    }
}

fn flag(prefix: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(path);
    arg
}

/// Runs the external compiler. Clones share the matcher and the observer.
#[derive(Clone)]
pub struct Compiler {
    matcher: Arc<Matcher>,
    observer: Arc<dyn Observer>,
}

impl Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            matcher: Arc::new(Matcher::standard().clone()),
            observer: Arc::new(NoopObserver),
        }
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Sets the observer that sees each diagnostic as it is classified.
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn with_shared_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Compiles one file.
    ///
    /// Resolves once the compiler has exited. The compiler's exit code is not trusted: the result
    /// is rejected with [`Error::Compile`] if the output holds an error or an abort phrase, and
    /// accepted otherwise. Dropping the future doesn't kill the compiler.
    pub async fn compile(&self, request: &CompileRequest) -> Result<CompileResult> {
        self.observer.on_start(request);
        let outcome = self.run(request.resolved()).await;
        self.observer.on_finish(&outcome);
        outcome
    }

    async fn run(&self, request: CompileRequest) -> Result<CompileResult> {
        let dest_path = request.dest_path();

        tracing::info!(source = %request.source.display(), "building plugin");

        tokio::fs::create_dir_all(&request.dest_dir)
            .await
            .map_err(|source| Error::DestDir {
                path: request.dest_dir.clone(),
                source,
            })?;

        let mut command = Command::new(&request.compiler);
        command
            .args(request.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        if let Some(dir) = request.working_dir() {
            command.current_dir(dir);
        }
        tracing::trace!(?command, "spawning compiler");

        let mut output = OutputAccumulator::new();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                tracing::debug!(
                    compiler = %request.compiler.display(),
                    %source,
                    "failed to launch compiler"
                );
                let partial = output.finish(dest_path, &self.matcher, self.observer.as_ref());
                return Err(Error::Spawn {
                    compiler: request.compiler,
                    source,
                    partial: Box::new(partial),
                });
            }
        };
        tracing::debug!(pid = child.id(), "compiler spawned");

        let stderr = child.stderr.take().map(|s| tokio::spawn(drain_stderr(s)));
        let lost = |source: std::io::Error| Error::Io {
            compiler: request.compiler.clone(),
            source,
        };

        if let Some(mut stdout) = child.stdout.take() {
            let mut chunk = vec![0; CHUNK_SIZE];
            loop {
                let n = stdout.read(&mut chunk).await.map_err(lost)?;
                if n == 0 {
                    break;
                }
                tracing::trace!(bytes = n, "compiler output");
                output.push(&chunk[..n]);
            }
        }

        let status = child.wait().await.map_err(lost)?;
        let stderr = match stderr {
            Some(task) => task.await.unwrap_or_else(|err| {
                tracing::warn!(%err, "lost the compiler's standard error");
                Vec::new()
            }),
            None => Vec::new(),
        };
        tracing::debug!(%status, chunks = output.chunks(), bytes = output.len(), "compiler exited");

        let mut res = output.finish(dest_path, &self.matcher, self.observer.as_ref());
        res.set_exit_code(status.code());
        res.set_stderr(stderr);

        if res.is_failure() {
            tracing::info!(
                plugin = res.artifact_name(),
                errors = res.errors().count(),
                aborted = res.aborted(),
                "failed to compile plugin"
            );
            return Err(Error::Compile(Box::new(res)));
        }

        tracing::info!(
            plugin = res.artifact_name(),
            warnings = res.warnings().count(),
            "plugin updated"
        );
        Ok(res)
    }
}

/// Compiles one file with the standard matcher and no observer.
pub async fn compile(request: &CompileRequest) -> Result<CompileResult> {
    Compiler::default().compile(request).await
}

/// Reads stderr to the end, one line at a time. Bytes that aren't UTF-8 are replaced, they must
/// not stop the draining or the compiler would be left writing to a closed pipe.
async fn drain_stderr(stderr: ChildStderr) -> Vec<String> {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']).to_owned();
                tracing::warn!(target: "smac::compiler", "{line}");
                out.push(line);
            }
            Err(err) => {
                tracing::warn!(%err, "failed to read the compiler's standard error");
                break;
            }
        }
    }
    out
}
