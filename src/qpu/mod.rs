//! VideoCore IV QPU instruction set.
//!
//! - [`defines`] - field layout, opcodes and magic addresses
//! - [`inst`] - operand type, word builders and inspection helpers

pub mod defines;
pub mod inst;

pub use defines::*;
pub use inst::QpuReg;
