// This module provides the compilation session for qpuc. CompilationSession is the
// caller-owned context that every compile runs against: it owns the CompileOptions and
// accumulates SessionStats across all shaders compiled with it. There is no process-wide
// state; callers create a session, compile any number of shaders through it, and call
// finish() to get the statistics back. SessionStats tracks shader counts per stage, QIR
// sizes before and after optimization, emitted QPU word counts, NOPs inserted for
// hazards and for thread-end framing (kept apart), uniforms, register usage and undefined-read diagnostics, plus a per-opcode
// breakdown, and renders them through Display.

//! Compilation session management.

use std::collections::HashMap;
use std::fmt;

use super::config::CompileOptions;
use crate::qir::QStage;

/// Compilation context passed to every compile.
pub struct CompilationSession {
    options: CompileOptions,
    stats: SessionStats,
}

/// Statistics accumulated over a session.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub shaders_compiled: usize,
    pub vertex_shaders: usize,
    pub coordinate_shaders: usize,
    pub fragment_shaders: usize,
    /// QIR instructions handed to the backend.
    pub qir_instructions_in: usize,
    /// QIR instructions left after optimization.
    pub qir_instructions_out: usize,
    pub qpu_instructions: usize,
    /// NOPs the serializer inserted to break hazards.
    pub hazard_nops: usize,
    /// NOPs added by program framing: delay slots and scoreboard padding.
    pub framing_nops: usize,
    pub uniforms: usize,
    /// Highest number of simultaneously live registers seen in any shader.
    pub max_registers_live: usize,
    pub undefined_reads: usize,
    /// Per-opcode count of instructions that reached code generation.
    pub op_counts: HashMap<&'static str, usize>,
}

impl CompilationSession {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            stats: SessionStats::default(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Record the start of a shader compile.
    pub fn begin_shader(&mut self, stage: QStage, qir_len: usize) {
        self.stats.shaders_compiled += 1;
        match stage {
            QStage::Vert => self.stats.vertex_shaders += 1,
            QStage::Coord => self.stats.coordinate_shaders += 1,
            QStage::Frag => self.stats.fragment_shaders += 1,
        }
        self.stats.qir_instructions_in += qir_len;
    }

    pub fn record_optimized(&mut self, qir_len: usize) {
        self.stats.qir_instructions_out += qir_len;
    }

    pub fn record_op(&mut self, name: &'static str) {
        *self.stats.op_counts.entry(name).or_insert(0) += 1;
    }

    pub fn record_allocation(&mut self, max_live: usize, undefined_reads: usize) {
        self.stats.max_registers_live = self.stats.max_registers_live.max(max_live);
        self.stats.undefined_reads += undefined_reads;
    }

    pub fn record_output(
        &mut self,
        qpu_len: usize,
        hazard_nops: usize,
        framing_nops: usize,
        uniforms: usize,
    ) {
        self.stats.qpu_instructions += qpu_len;
        self.stats.hazard_nops += hazard_nops;
        self.stats.framing_nops += framing_nops;
        self.stats.uniforms += uniforms;
    }

    /// End the session and hand back its statistics.
    pub fn finish(self) -> SessionStats {
        log::debug!("session finished: {} shaders", self.stats.shaders_compiled);
        self.stats
    }
}

impl Default for CompilationSession {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(
            f,
            "  Shaders compiled: {} (vs {}, cs {}, fs {})",
            self.shaders_compiled,
            self.vertex_shaders,
            self.coordinate_shaders,
            self.fragment_shaders
        )?;
        writeln!(
            f,
            "  QIR instructions: {} in, {} after optimization",
            self.qir_instructions_in, self.qir_instructions_out
        )?;
        writeln!(f, "  QPU instructions: {}", self.qpu_instructions)?;
        writeln!(
            f,
            "  NOPs inserted: {} for hazards, {} for framing",
            self.hazard_nops, self.framing_nops
        )?;
        writeln!(f, "  Uniforms: {}", self.uniforms)?;
        writeln!(f, "  Max live registers: {}", self.max_registers_live)?;
        if self.undefined_reads > 0 {
            writeln!(f, "  Undefined reads: {}", self.undefined_reads)?;
        }

        if !self.op_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.op_counts.iter().collect();
            sorted.sort_by_key(|(name, count)| (std::cmp::Reverse(**count), **name));

            for (name, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", name, count)?;
            }
        }

        Ok(())
    }
}
