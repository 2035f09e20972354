// This module is the backend entry point. compile_shader takes one QIR program through
// the whole pipeline against a caller-owned CompilationSession: validation, the optional
// optimizer fixpoint, linear-scan register allocation, per-opcode QPU emission, hazard
// serialization and thread-end framing. The uniform layout of the result is rebuilt from
// the order in which the emitted words actually consume uniforms, since the optimizer may
// have duplicated or dropped reads. Statistics are recorded into the session and the
// debug dumps selected in its options go to the log.

//! Shader compilation pipeline.

use crate::codegen::{finalize, serialize, QpuEmitter};
use crate::core::{CompilationSession, CompileError, CompileResult};
use crate::opt::optimize;
use crate::qir::{QStage, ShaderIr, UniformInfo};
use crate::regalloc::{allocate, UndefinedRead};

/// A finished QPU program.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub stage: QStage,
    pub insts: Vec<u64>,
    /// Uniforms in the order the program reads them.
    pub uniforms: UniformInfo,
    pub num_inputs: u32,
    pub num_texture_samples: u32,
    /// Reads of never-written temporaries tolerated in lenient mode.
    pub undefined_reads: Vec<UndefinedRead>,
}

impl CompiledShader {
    /// Program as little-endian bytes, ready for upload.
    pub fn code_bytes(&self) -> Vec<u8> {
        self.insts.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

/// Compile `ir` to a QPU program.
pub fn compile_shader(
    session: &mut CompilationSession,
    mut ir: ShaderIr,
) -> CompileResult<CompiledShader> {
    ir.validate()?;
    let options = session.options().clone();
    let stage = ir.stage;

    session.begin_shader(stage, ir.instructions.len());
    if options.debug.dump_qir {
        log::info!("{} QIR:\n{}", stage.name(), ir);
    }

    if options.optimize {
        let rounds = optimize(&mut ir, options.max_opt_iterations);
        log::debug!("optimizer made progress in {} rounds", rounds);
        if options.debug.dump_qir {
            log::info!("{} QIR after optimization:\n{}", stage.name(), ir);
        }
    }
    session.record_optimized(ir.instructions.len());
    for inst in &ir.instructions {
        session.record_op(inst.op.name());
    }

    let alloc = allocate(&ir, options.strict_undefined)?;
    session.record_allocation(alloc.max_live, alloc.undefined_reads.len());

    let emitted = QpuEmitter::new(&ir, &alloc).emit();
    let mut program = serialize(&emitted.insts);
    let framing_nops = finalize(&mut program.insts, stage);

    let mut uniforms = UniformInfo::default();
    for &index in &emitted.uniform_stream {
        let (contents, data) = ir.uniforms.get(index).ok_or_else(|| CompileError::MalformedIr {
            inst: 0,
            reason: format!("read of uniform u{} which was never declared", index),
        })?;
        uniforms.push(contents, data);
    }

    session.record_output(
        program.insts.len(),
        program.nops_inserted,
        framing_nops,
        uniforms.len(),
    );

    if options.debug.dump_qpu {
        let listing: Vec<String> = program
            .insts
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:4}: 0x{:016x}", i, w))
            .collect();
        log::info!("{} QPU:\n{}", stage.name(), listing.join("\n"));
    }
    if options.debug.shaderdb {
        log::info!(
            "SHADER-DB: {} prog: {} inst, {} uniforms, {} hazard nops, {} framing nops",
            stage.name(),
            program.insts.len(),
            uniforms.len(),
            program.nops_inserted,
            framing_nops
        );
    }

    Ok(CompiledShader {
        stage,
        insts: program.insts,
        uniforms,
        num_inputs: ir.num_inputs,
        num_texture_samples: ir.num_texture_samples,
        undefined_reads: alloc.undefined_reads,
    })
}
