//! Core infrastructure shared by every compiler stage.
//!
//! - [`error`] - error enum and failure classes
//! - [`config`] - compile options and debug switches
//! - [`session`] - caller-owned compilation context and statistics

pub mod config;
pub mod error;
pub mod session;

pub use config::{CompileOptions, DebugFlags};
pub use error::{CompileError, CompileResult, ErrorKind};
pub use session::{CompilationSession, SessionStats};
