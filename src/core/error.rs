// This module defines error types for the qpuc compiler using the thiserror crate for
// idiomatic Rust error handling. CompileError is the main error enum covering the ways a
// shader compile can fail: opcodes that do not exist, IR that breaks the opcode table's
// shape rules, running out of physical registers, clobbering the r4 accumulator while it
// still holds a live value, reading a temporary that was never written, and syntax errors
// in textual QIR. Each variant carries the instruction position and opcode name so the
// failure can be traced back to the IR dump. ErrorKind groups the variants into the
// classes callers care about (internal bug, resource exhaustion, undefined value, bad
// input). CompileResult<T> is the usual alias for Result<T, CompileError>.

//! Error types for the qpuc compiler.

use thiserror::Error;

/// Main error type for shader compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Unknown QIR opcode: {name}")]
    UnknownOpcode { name: String },

    #[error("Malformed QIR at instruction {inst}: {reason}")]
    MalformedIr { inst: usize, reason: String },

    #[error("Register pool exhausted at instruction {inst} ({op}): no free register for t{temp}")]
    RegisterPoolExhausted {
        inst: usize,
        op: &'static str,
        temp: u32,
    },

    #[error("Instruction {inst} ({op}) overwrites r4 while t{temp} is still live in it")]
    AccumulatorClobbered {
        inst: usize,
        op: &'static str,
        temp: u32,
    },

    #[error("Instruction {inst} ({op}) reads t{temp} before it is written")]
    UndefinedTemp {
        inst: usize,
        op: &'static str,
        temp: u32,
    },

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Broad failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The IR handed to the backend is inconsistent. Always a bug upstream.
    Internal,
    /// The shader needs more registers than the hardware has.
    ResourceExhausted,
    /// A temporary was read without a prior write.
    UndefinedValue,
    /// Textual input could not be parsed.
    Input,
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::UnknownOpcode { .. } | CompileError::MalformedIr { .. } => {
                ErrorKind::Internal
            }
            CompileError::RegisterPoolExhausted { .. }
            | CompileError::AccumulatorClobbered { .. } => ErrorKind::ResourceExhausted,
            CompileError::UndefinedTemp { .. } => ErrorKind::UndefinedValue,
            CompileError::Parse { .. } => ErrorKind::Input,
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
