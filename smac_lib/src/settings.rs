use std::{num::NonZeroUsize, path::PathBuf};

/// Settings shared by every compile of a [`crate::pipeline::Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub compiler: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub dest: PathBuf,
    /// Put every artifact straight into `dest`, instead of mirroring the source's sub directory.
    pub ignore_sub_dirs: bool,
    /// Pass failed files on instead of stopping the pipeline.
    pub ignore_errors: bool,
    /// How many compilers may run at the same time.
    pub jobs: NonZeroUsize,
}

impl Settings {
    pub fn new(compiler: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.into(),
            include_dirs: Vec::new(),
            dest: dest.into(),
            ignore_sub_dirs: true,
            ignore_errors: false,
            jobs: default_jobs(),
        }
    }
}

pub fn default_jobs() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}
