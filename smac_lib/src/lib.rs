//! Drives an external AMX Mod X style script compiler and makes sense of what it prints.
//!
//! [`compile::Compiler`] runs the compiler for one [`compile::CompileRequest`] and classifies
//! every line of its output into a [`diagnostic::Diagnostic`]. [`pipeline::Pipeline`] does the
//! same for a whole set of files.

pub mod compile;
pub mod diagnostic;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod settings;
mod util;

pub use compile::{CompileRequest, Compiler};
pub use diagnostic::{CompileResult, Diagnostic, DiagnosticKind};
pub use error::{Error, Result};
