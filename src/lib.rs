//! qpuc - shader compiler backend for the VideoCore IV QPU.
//!
//! Lowers a straight-line shader IR (QIR) into 64-bit QPU instruction words
//! plus the uniform layout the driver must upload alongside them.
//!
//! # Primary Usage
//!
//! ```
//! use qpuc::core::{CompilationSession, CompileOptions};
//! use qpuc::{compile_shader, parse_qir};
//!
//! let ir = parse_qir(
//!     "stage frag
//!      uniform const 0x3f800000
//!      t0 = fadd u0, u0
//!      tlb_color_write t0",
//! )?;
//! let mut session = CompilationSession::new(CompileOptions::default());
//! let shader = compile_shader(&mut session, ir)?;
//! assert_eq!(shader.uniforms.len(), 1);
//! # Ok::<(), qpuc::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`qir`] - IR data model, opcode table, builder helpers and text parser
//! - [`opt`] - peephole passes run to a fixpoint
//! - [`regalloc`] - linear-scan register allocation
//! - [`qpu`] - instruction encoding
//! - [`codegen`] - per-opcode emission, hazard serialization and framing
//! - [`core`] - errors, options and the compilation session

pub mod codegen;
pub mod compile;
pub mod core;
pub mod opt;
pub mod qir;
pub mod qpu;
pub mod regalloc;

pub use crate::core::{
    CompilationSession, CompileError, CompileOptions, CompileResult, DebugFlags, ErrorKind,
    SessionStats,
};
pub use compile::{compile_shader, CompiledShader};
pub use qir::{parse_qir, QInst, QOp, QReg, QStage, ShaderIr};
