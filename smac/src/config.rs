//! The optional `smac.toml` build configuration.

use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use crate::util::OneOrMany;

/// Looked up in the working directory when `--config` isn't given.
pub const DEFAULT_CONFIG: &str = "smac.toml";

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub compiler: Option<PathBuf>,
    pub src: Option<PathBuf>,
    pub dest: Option<PathBuf>,
    /// Either `include = "dir"` or `include = ["a", "b"]`.
    pub include: OneOrMany<PathBuf>,
    pub ignore_sub_dirs: Option<bool>,
    pub ignore_errors: Option<bool>,
    pub jobs: Option<NonZeroUsize>,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Reads the file at `path`, resolving its relative paths against the file's directory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file `{}`", path.display()))?;
        let config = Self::from_toml_str(&s)
            .with_context(|| format!("Invalid config file `{}`", path.display()))?;

        Ok(match path.parent() {
            Some(dir) => config.rebase(dir),
            None => config,
        })
    }

    /// Loads `explicit` if given, else [`DEFAULT_CONFIG`] if it exists, else nothing.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let path = Path::new(DEFAULT_CONFIG);
        if path.is_file() {
            tracing::debug!("using {DEFAULT_CONFIG}");
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn include_dirs(&self) -> Vec<PathBuf> {
        self.include.clone().into()
    }

    fn rebase(self, dir: &Path) -> Self {
        let join = |p: PathBuf| dir.join(p);
        Self {
            compiler: self.compiler.map(join),
            src: self.src.map(join),
            dest: self.dest.map(join),
            include: OneOrMany::Many(Vec::from(self.include).into_iter().map(join).collect()),
            ..self
        }
    }
}
