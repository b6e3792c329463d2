use std::path::{Path, PathBuf};

pub trait Ice {
    type Target;

    /// Unwraps `self` or panics with an ICE (Internal Compiler-driver Error), with a message
    /// based on error data contained in `self`.
    fn ice(self) -> Self::Target;
}

impl<T, M: std::fmt::Display> Ice for std::result::Result<T, M> {
    type Target = T;

    fn ice(self) -> T {
        self.map_err(|msg| format!("ICE: {msg}")).unwrap()
    }
}

/// Makes `path` absolute against the current working directory, without touching the file system.
///
/// Falls back to `path` itself when the working directory can't be determined.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
