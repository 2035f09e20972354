//! QPU code generation.
//!
//! [`emit::QpuEmitter`] turns allocated QIR into instruction words and the
//! uniform stream; [`serialize`] makes the word sequence hazard free and
//! frames it as a complete thread.

pub mod emit;
pub mod serialize;

pub use emit::{EmittedCode, QpuEmitter};
pub use serialize::{finalize, serialize, Serialized};
