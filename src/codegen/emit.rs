// This module lowers allocated QIR to QPU instruction words. QpuEmitter walks the
// instruction list once and, for each QIR instruction, queues the one to six words that
// implement it: plain ALU ops go to the add or mul pipeline, comparisons become a flag
// setting subtract followed by two conditional immediate loads, selects and cmp become
// conditional moves, SFU ops write the SFU register and move the result out of r4, and
// the VPM, TLB and TMU ops become moves to or from the matching peripheral address or a
// signal-only NOP. Before any word that reads two operands it resolves register file read
// port conflicts, either by moving a FIFO read to the other file's port or by staging one
// operand through r3. Every word that reads uniforms appends the uniform's index to the
// uniform stream, which becomes the draw-time uniform layout for the shader.

//! Per-opcode QPU code generation.

use crate::qir::{AluOp, QFile, QInst, QOp, QReg, QStage, ShaderIr};
use crate::qpu::inst::{self, QpuReg};
use crate::qpu::{
    Cond, Mux, OpAdd, Pack, Sig, Unpack, FRAG_PAYLOAD_ZW, R_VPM, R_XY_PIXEL_COORD,
    W_SFU_EXP, W_SFU_LOG, W_SFU_RECIP, W_SFU_RECIPSQRT, W_TMU0_B, W_TMU0_R, W_TMU0_S,
    W_TMU0_T, W_VPM,
};
use crate::regalloc::RegAllocation;

/// Instruction words in program order, before hazard serialization.
#[derive(Debug, Clone, Default)]
pub struct EmittedCode {
    pub insts: Vec<u64>,
    /// IR uniform index read by each uniform-consuming word, in order.
    pub uniform_stream: Vec<u32>,
}

/// A resolved source: the physical operand and, for uniform reads, which
/// IR uniform it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Operand {
    reg: QpuReg,
    uniform: Option<u32>,
}

impl Operand {
    fn reg(reg: QpuReg) -> Self {
        Self { reg, uniform: None }
    }
}

fn regfile_conflict(a: &Operand, b: &Operand) -> bool {
    if let (Some(x), Some(y)) = (a.uniform, b.uniform) {
        return x != y;
    }
    matches!((a.reg.mux, b.reg.mux), (Mux::A, Mux::A) | (Mux::B, Mux::B)) && a.reg.addr != b.reg.addr
}

fn other_file(mux: Mux) -> Mux {
    if mux == Mux::A {
        Mux::B
    } else {
        Mux::A
    }
}

pub struct QpuEmitter<'a> {
    ir: &'a ShaderIr,
    alloc: &'a RegAllocation,
    code: EmittedCode,
    discard: bool,
}

impl<'a> QpuEmitter<'a> {
    pub fn new(ir: &'a ShaderIr, alloc: &'a RegAllocation) -> Self {
        Self {
            ir,
            alloc,
            code: EmittedCode::default(),
            discard: false,
        }
    }

    pub fn emit(mut self) -> EmittedCode {
        match self.ir.stage {
            QStage::Vert | QStage::Coord => {
                let num_inputs = self.ir.num_inputs;
                let vr = 0x0000_1a00u32.wrapping_add(0x0010_0000u32.wrapping_mul(num_inputs));
                self.queue(inst::load_imm_ui(QpuReg::vr_setup(), vr), &[]);
                self.queue(inst::load_imm_ui(QpuReg::vw_setup(), 0x0000_1a00), &[]);
            }
            QStage::Frag => {}
        }

        let ir = self.ir;
        for qinst in &ir.instructions {
            log::trace!("emit: {}", qinst);
            self.emit_inst(qinst);
        }
        self.code
    }

    /// Append a word, recording the uniforms it consumes.
    fn queue(&mut self, word: u64, reads: &[Operand]) {
        let mut seen: Option<u32> = None;
        for u in reads.iter().filter_map(|r| r.uniform) {
            if seen != Some(u) {
                debug_assert!(seen.is_none(), "two different uniforms in one word");
                self.code.uniform_stream.push(u);
                seen = Some(u);
            }
        }
        self.code.insts.push(word);
    }

    fn operand(&self, src: QReg) -> Operand {
        match src.file {
            QFile::Null => Operand::reg(QpuReg::rn(0)),
            // Undefined reads were reported by the allocator; read r0.
            QFile::Temp => Operand::reg(self.alloc.reg(src.index).unwrap_or(QpuReg::rn(0))),
            QFile::Unif => Operand {
                reg: QpuReg::unif(),
                uniform: Some(src.index),
            },
            QFile::Vary => Operand::reg(QpuReg::vary()),
        }
    }

    fn dst(&self, qinst: &QInst) -> QpuReg {
        match qinst.dst.file {
            QFile::Temp => self.alloc.reg(qinst.dst.index).unwrap_or(QpuReg::nop()),
            _ => QpuReg::nop(),
        }
    }

    /// Stage `op` through r3 so later words can read it without a port conflict.
    fn stage_r3(&mut self, op: Operand) -> Operand {
        self.queue(inst::a_mov(QpuReg::r3(), op.reg), &[op]);
        Operand::reg(QpuReg::r3())
    }

    /// Make `a` and `b` readable by a single word.
    fn fixup_raddr_conflict(&mut self, a: &mut Operand, b: &mut Operand) {
        if !regfile_conflict(a, b) {
            return;
        }
        let both_uniforms = a.uniform.is_some() && b.uniform.is_some();
        if !both_uniforms && b.reg.is_fifo_read() {
            b.reg.mux = other_file(a.reg.mux);
        } else if !both_uniforms && a.reg.is_fifo_read() {
            a.reg.mux = other_file(b.reg.mux);
        } else {
            *b = self.stage_r3(*b);
        }
    }

    fn emit_inst(&mut self, qinst: &QInst) {
        let dst = self.dst(qinst);
        let mut src = [Operand::reg(QpuReg::rn(0)); 4];
        for (slot, reg) in src.iter_mut().zip(qinst.srcs()) {
            *slot = self.operand(*reg);
        }

        match qinst.op {
            QOp::Mov => {
                if dst.is_accumulator() && dst == src[0].reg {
                    return;
                }
                self.queue(inst::a_mov(dst, src[0].reg), &[src[0]]);
            }

            QOp::FAdd
            | QOp::FSub
            | QOp::FMul
            | QOp::Mul24
            | QOp::FMin
            | QOp::FMax
            | QOp::FMinAbs
            | QOp::FMaxAbs
            | QOp::FToI
            | QOp::IToF
            | QOp::Add
            | QOp::Sub
            | QOp::Shl
            | QOp::Shr
            | QOp::Asr
            | QOp::Min
            | QOp::Max
            | QOp::And
            | QOp::Or
            | QOp::Xor
            | QOp::Not => {
                let (mut a, mut b) = (src[0], src[if qinst.op.nsrc() == 1 { 0 } else { 1 }]);
                self.fixup_raddr_conflict(&mut a, &mut b);
                let word = match qinst.op.alu() {
                    Some(AluOp::Add(op)) => inst::a_alu2(op, dst, a.reg, b.reg),
                    Some(AluOp::Mul(op)) => inst::m_alu2(op, dst, a.reg, b.reg),
                    None => return,
                };
                self.queue(word, &[a, b]);
            }

            QOp::Seq | QOp::Sne | QOp::Sge | QOp::Slt => {
                let (mut a, mut b) = (src[0], src[1]);
                self.fixup_raddr_conflict(&mut a, &mut b);
                let sub = inst::a_alu2(OpAdd::FSub, QpuReg::nop(), a.reg, b.reg);
                self.queue(inst::set_sf(sub), &[a, b]);

                let cond = match qinst.op {
                    QOp::Seq => Cond::Zs,
                    QOp::Sne => Cond::Zc,
                    QOp::Slt => Cond::Ns,
                    _ => Cond::Nc,
                };
                self.queue(inst::set_cond_add(inst::load_imm_f(dst, 1.0), cond), &[]);
                self.queue(
                    inst::set_cond_add(inst::load_imm_f(dst, 0.0), cond.invert()),
                    &[],
                );
            }

            QOp::Cmp => {
                self.queue(inst::set_sf(inst::a_mov(QpuReg::nop(), src[0].reg)), &[src[0]]);
                let (mut x, mut y) = (src[1], src[2]);
                if dst.is_accumulator() {
                    self.fixup_raddr_conflict(&mut x, &mut y);
                    let add = inst::set_cond_add(inst::a_mov(dst, x.reg), Cond::Ns);
                    let mul = inst::set_cond_mul(inst::m_mov(dst, y.reg), Cond::Nc);
                    self.queue(inst::merge(add, mul), &[x, y]);
                } else if dst == x.reg {
                    self.queue(inst::set_cond_add(inst::a_mov(dst, y.reg), Cond::Nc), &[y]);
                } else {
                    self.queue(inst::a_mov(dst, y.reg), &[y]);
                    self.queue(inst::set_cond_add(inst::a_mov(dst, x.reg), Cond::Ns), &[x]);
                }
            }

            QOp::Sf => {
                self.queue(inst::set_sf(inst::a_mov(QpuReg::nop(), src[0].reg)), &[src[0]]);
            }

            QOp::SelX0Zs | QOp::SelX0Zc | QOp::SelX0Ns | QOp::SelX0Nc => {
                let cond = match qinst.op {
                    QOp::SelX0Zs => Cond::Zs,
                    QOp::SelX0Zc => Cond::Zc,
                    QOp::SelX0Ns => Cond::Ns,
                    _ => Cond::Nc,
                };
                self.queue(inst::set_cond_add(inst::a_mov(dst, src[0].reg), cond), &[src[0]]);
                self.queue(
                    inst::set_cond_add(inst::load_imm_ui(dst, 0), cond.invert()),
                    &[],
                );
            }

            QOp::SelXYZs | QOp::SelXYZc | QOp::SelXYNs | QOp::SelXYNc => {
                let cond = match qinst.op {
                    QOp::SelXYZs => Cond::Zs,
                    QOp::SelXYZc => Cond::Zc,
                    QOp::SelXYNs => Cond::Ns,
                    _ => Cond::Nc,
                };
                self.queue(inst::set_cond_add(inst::a_mov(dst, src[0].reg), cond), &[src[0]]);
                self.queue(
                    inst::set_cond_add(inst::a_mov(dst, src[1].reg), cond.invert()),
                    &[src[1]],
                );
            }

            QOp::Rcp | QOp::Rsq | QOp::Exp2 | QOp::Log2 => {
                let sfu = match qinst.op {
                    QOp::Rcp => W_SFU_RECIP,
                    QOp::Rsq => W_SFU_RECIPSQRT,
                    QOp::Exp2 => W_SFU_EXP,
                    _ => W_SFU_LOG,
                };
                self.queue(inst::a_mov(QpuReg::rb(sfu), src[0].reg), &[src[0]]);
                self.queue(inst::a_mov(dst, QpuReg::r4()), &[]);
            }

            QOp::PackScaled => {
                let lo = inst::set_pack(inst::a_mov(dst, src[0].reg), Pack::A16);
                self.queue(lo, &[src[0]]);
                let hi = inst::set_pack(inst::a_mov(dst, src[1].reg), Pack::B16);
                self.queue(hi, &[src[1]]);
            }

            QOp::PackColors => {
                for (i, s) in src.iter().enumerate() {
                    let word = inst::set_mul_pack(inst::m_mov(QpuReg::r3(), s.reg), Pack::mul_8(i));
                    self.queue(word, &[*s]);
                }
                self.queue(inst::a_mov(dst, QpuReg::r3()), &[]);
            }

            QOp::VpmWrite => {
                self.queue(inst::a_mov(QpuReg::ra(W_VPM), src[0].reg), &[src[0]]);
            }

            QOp::VpmRead => {
                self.queue(inst::a_mov(dst, QpuReg::ra(R_VPM)), &[]);
            }

            QOp::TlbDiscardSetup => {
                self.discard = true;
                self.queue(inst::set_sf(inst::a_mov(QpuReg::nop(), src[0].reg)), &[src[0]]);
            }

            QOp::TlbPassthroughZWrite => {
                let word = inst::a_mov(QpuReg::tlb_z(), QpuReg::rb(FRAG_PAYLOAD_ZW));
                let word = self.discard_cond(word);
                self.queue(word, &[]);
            }

            QOp::TlbColorWrite => {
                let word = self.discard_cond(inst::a_mov(QpuReg::tlb_color_all(), src[0].reg));
                self.queue(word, &[src[0]]);
            }

            QOp::TlbColorRead => {
                self.queue(inst::set_sig(inst::nop(), Sig::ColorLoad), &[]);
            }

            QOp::VaryAddC => {
                let word = inst::a_alu2(OpAdd::FAdd, dst, src[0].reg, QpuReg::r5());
                self.queue(word, &[src[0]]);
            }

            QOp::FragX => {
                let xy = QpuReg::ra(R_XY_PIXEL_COORD);
                self.queue(inst::a_alu2(OpAdd::IToF, dst, xy, xy), &[]);
            }

            QOp::FragY => {
                let xy = QpuReg::rb(R_XY_PIXEL_COORD);
                self.queue(inst::a_alu2(OpAdd::IToF, dst, xy, xy), &[]);
            }

            // The allocator pins these to the payload registers.
            QOp::FragZ | QOp::FragRcpW => {}

            QOp::TexS | QOp::TexT | QOp::TexR | QOp::TexB => {
                let tmu = match qinst.op {
                    QOp::TexS => W_TMU0_S,
                    QOp::TexT => W_TMU0_T,
                    QOp::TexR => W_TMU0_R,
                    _ => W_TMU0_B,
                };
                let mut coord = src[0];
                if coord.uniform.is_some() {
                    coord = self.stage_r3(coord);
                }
                // The TMU pulls the config uniform itself.
                self.queue(inst::a_mov(QpuReg::rb(tmu), coord.reg), &[coord, src[1]]);
            }

            QOp::TexResult => {
                self.queue(inst::set_sig(inst::nop(), Sig::LoadTmu0), &[]);
            }

            QOp::R4UnpackA | QOp::R4UnpackB | QOp::R4UnpackC | QOp::R4UnpackD => {
                let lane = match qinst.op {
                    QOp::R4UnpackA => 0,
                    QOp::R4UnpackB => 1,
                    QOp::R4UnpackC => 2,
                    _ => 3,
                };
                let word = inst::a_mov(dst, QpuReg::r4());
                self.queue(inst::set_r4_unpack(word, Unpack::lane_8(lane)), &[]);
            }
        }
    }

    fn discard_cond(&self, word: u64) -> u64 {
        if self.discard {
            inst::set_cond_add(word, Cond::Zs)
        } else {
            word
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qir::parse_qir;
    use crate::qpu::*;
    use crate::regalloc::allocate;

    fn emit(text: &str) -> EmittedCode {
        let ir = parse_qir(text).unwrap();
        let alloc = allocate(&ir, true).unwrap();
        QpuEmitter::new(&ir, &alloc).emit()
    }

    #[test]
    fn test_vertex_prologue() {
        let code = emit("stage vert\ninputs 3\nt0 = vpm_read\nvpm_write t0");
        assert_eq!(code.insts.len(), 4);
        assert!(inst::is_load_imm(code.insts[0]));
        assert_eq!(LOAD_IMM.get(code.insts[0]), 0x1a00 + 0x0010_0000 * 3);
        assert_eq!(WADDR_ADD.get(code.insts[0]), W_VPMVCD_SETUP as u32);
        assert_eq!(WS.get(code.insts[0]), 0);
        assert_eq!(LOAD_IMM.get(code.insts[1]), 0x1a00);
        assert_eq!(WS.get(code.insts[1]), 1);
    }

    #[test]
    fn test_same_uniform_twice_is_one_word() {
        let code = emit("uniform const 0x3f800000\nt0 = fadd u0, u0\ntlb_color_write t0");
        assert_eq!(code.insts.len(), 2);
        assert_eq!(code.uniform_stream, vec![0]);
        assert_eq!(RADDR_A.get(code.insts[0]), R_UNIF as u32);
    }

    #[test]
    fn test_two_uniforms_stage_through_r3() {
        let code = emit(
            "uniform const 0x3f800000
             uniform const 0x40000000
             t0 = fadd u0, u1
             tlb_color_write t0",
        );
        assert_eq!(code.insts.len(), 3);
        assert_eq!(WADDR_ADD.get(code.insts[0]), 35, "staging move writes r3");
        assert_eq!(ADD_B.get(code.insts[1]), Mux::R3 as u32);
        assert_eq!(code.uniform_stream, vec![1, 0]);
    }

    #[test]
    fn test_fifo_read_moves_to_other_file() {
        let code = emit(
            "uniform const 0
             t0 = mov u0
             t1 = mov u0
             t2 = mov u0
             t3 = mov u0
             t4 = fadd t3, u0
             vpm_write t0
             vpm_write t1
             vpm_write t2
             vpm_write t4",
        );
        // t3 lands in ra0 after r0-r2 are taken
        let fadd = code.insts[4];
        assert_eq!(RADDR_A.get(fadd), 0);
        assert_eq!(RADDR_B.get(fadd), R_UNIF as u32);
        assert_eq!(ADD_B.get(fadd), Mux::B as u32);
        assert_eq!(code.insts.len(), 9);
    }

    #[test]
    fn test_comparison_sequence() {
        let code = emit(
            "uniform const 0
             uniform const 0x3f800000
             t0 = mov u0
             t1 = mov u1
             t2 = slt t0, t1
             vpm_write t2",
        );
        let seq = &code.insts[2..5];
        assert_eq!(SF.get(seq[0]), 1);
        assert_eq!(OP_ADD.get(seq[0]), OpAdd::FSub as u32);
        assert_eq!(COND_ADD.get(seq[1]), Cond::Ns as u32);
        assert_eq!(LOAD_IMM.get(seq[1]), 0x3f80_0000);
        assert_eq!(COND_ADD.get(seq[2]), Cond::Nc as u32);
        assert_eq!(LOAD_IMM.get(seq[2]), 0);
    }

    #[test]
    fn test_cmp_into_accumulator_is_one_word() {
        let code = emit(
            "uniform const 0
             uniform const 0x3f800000
             t0 = mov u0
             t1 = mov u1
             t2 = cmp t0, t1, t0
             vpm_write t2",
        );
        assert_eq!(code.insts.len(), 5);
        let word = code.insts[3];
        assert_eq!(COND_ADD.get(word), Cond::Ns as u32);
        assert_eq!(COND_MUL.get(word), Cond::Nc as u32);
    }

    #[test]
    fn test_sfu_and_pack_colors() {
        let code = emit(
            "uniform const 0x3f800000
             t0 = mov u0
             t1 = rcp t0
             t2 = pack_colors t1, t1, t1, t1
             tlb_color_write t2",
        );
        assert_eq!(WADDR_ADD.get(code.insts[1]), W_SFU_RECIP as u32);
        assert_eq!(ADD_A.get(code.insts[2]), Mux::R4 as u32);
        for i in 0..4 {
            let word = code.insts[3 + i];
            assert_eq!(PM.get(word), 1);
            assert_eq!(PACK.get(word), Pack::mul_8(i) as u32);
            assert_eq!(WADDR_MUL.get(word), 35);
        }
        assert_eq!(ADD_A.get(code.insts[7]), Mux::R3 as u32);
    }

    #[test]
    fn test_discard_conditions_tlb_writes() {
        let code = emit(
            "stage frag
             uniform const 0
             t0 = mov u0
             tlb_discard_setup t0
             tlb_passthrough_z_write
             tlb_color_write t0",
        );
        assert_eq!(SF.get(code.insts[1]), 1);
        assert_eq!(COND_ADD.get(code.insts[2]), Cond::Zs as u32);
        assert_eq!(WADDR_ADD.get(code.insts[2]), W_TLB_Z as u32);
        assert_eq!(RADDR_B.get(code.insts[2]), FRAG_PAYLOAD_ZW as u32);
        assert_eq!(COND_ADD.get(code.insts[3]), Cond::Zs as u32);
    }

    #[test]
    fn test_texture_uniforms_in_stream() {
        let code = emit(
            "stage frag
             uniform texture_config_p0 0
             uniform texture_config_p1 0
             uniform const 0x3f000000
             t0 = mov u2
             tex_t t0, u0
             tex_s u2, u1
             t1 = tex_result
             t2 = r4_unpack_b t1
             tlb_color_write t2",
        );
        assert_eq!(code.uniform_stream, vec![2, 0, 2, 1]);
        let unpack = code.insts[code.insts.len() - 2];
        assert_eq!(PM.get(unpack), 1);
        assert_eq!(UNPACK.get(unpack), Unpack::B8 as u32);
    }
}
