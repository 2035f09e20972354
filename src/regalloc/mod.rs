// This module implements the linear-scan register allocator. One forward scan over the
// optimized instruction list assigns each temporary a physical register for its whole
// lifetime. The lifetime is bounded by a use counter computed up front (one count per
// write and per source slot that reads the temporary): sources are released as their
// counters reach zero before the destination is placed, so an instruction's result can
// reuse the register of an operand that dies there. Placement obeys per-opcode
// constraints: TMU and TLB loads must land in r4, the fragment payload ops are pinned to
// ra15/rb15, pack_scaled writes through the regfile A pack unit and must not alias its
// sources, and nothing else may use r4. Running out of registers, clobbering a live r4,
// and reading a never-written temporary are reported as errors (the last one can be
// downgraded to a logged diagnostic for tolerant callers).

//! Linear-scan register allocation.

pub mod register_file;

pub use register_file::{PoolReg, RegBank, RegBitSet, RegisterFile};

use crate::core::{CompileError, CompileResult};
use crate::qir::{QOp, QStage, ShaderIr};
use crate::qpu::{QpuReg, FRAG_PAYLOAD_ZW};

/// A read of a temporary that has no prior write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndefinedRead {
    pub inst: usize,
    pub op: &'static str,
    pub temp: u32,
}

/// Result of register allocation: one register per temporary.
#[derive(Debug, Clone, Default)]
pub struct RegAllocation {
    temp_regs: Vec<Option<QpuReg>>,
    pub undefined_reads: Vec<UndefinedRead>,
    /// Highest number of simultaneously occupied registers.
    pub max_live: usize,
}

impl RegAllocation {
    /// Register assigned to temporary `temp`, if it was ever written.
    pub fn reg(&self, temp: u32) -> Option<QpuReg> {
        self.temp_regs.get(temp as usize).copied().flatten()
    }
}

/// Registers instruction `op` may write in `stage`.
fn allowed_dst(op: QOp, stage: QStage) -> RegBitSet {
    let payload_a = PoolReg::new(RegBank::A, FRAG_PAYLOAD_ZW);
    let payload_b = PoolReg::new(RegBank::B, FRAG_PAYLOAD_ZW);

    let mut allowed = match op {
        QOp::TexResult | QOp::TlbColorRead => return RegBitSet::single(PoolReg::r4()),
        QOp::FragZ => return RegBitSet::single(payload_b),
        QOp::FragRcpW => return RegBitSet::single(payload_a),
        QOp::PackScaled => RegBitSet::all_in_bank(RegBank::A),
        _ => {
            let mut set = RegBitSet::all();
            set.clear(PoolReg::r4());
            set
        }
    };
    if stage == QStage::Frag {
        allowed.clear(payload_a);
        allowed.clear(payload_b);
    }
    allowed
}

/// Assign a physical register to every temporary of `ir`.
pub fn allocate(ir: &ShaderIr, strict_undefined: bool) -> CompileResult<RegAllocation> {
    let num_temps = ir.num_temps as usize;

    let mut uses = vec![0u32; num_temps];
    for inst in &ir.instructions {
        if inst.dst.is_temp() {
            uses[inst.dst.index as usize] += 1;
        }
        for src in inst.srcs() {
            if src.is_temp() {
                uses[src.index as usize] += 1;
            }
        }
    }

    let mut file = RegisterFile::new();
    let mut pool_regs: Vec<Option<PoolReg>> = vec![None; num_temps];
    let mut alloc = RegAllocation {
        temp_regs: vec![None; num_temps],
        ..RegAllocation::default()
    };

    for (ip, inst) in ir.instructions.iter().enumerate() {
        let name = inst.op.name();

        let mut src_regs = RegBitSet::new();
        for src in inst.srcs() {
            if !src.is_temp() {
                continue;
            }
            let t = src.index as usize;
            let Some(reg) = pool_regs[t] else {
                if strict_undefined {
                    return Err(CompileError::UndefinedTemp {
                        inst: ip,
                        op: name,
                        temp: src.index,
                    });
                }
                log::warn!("instruction {} ({}) reads undefined t{}", ip, name, src.index);
                alloc.undefined_reads.push(UndefinedRead {
                    inst: ip,
                    op: name,
                    temp: src.index,
                });
                continue;
            };
            src_regs.set(reg);
            uses[t] -= 1;
            if uses[t] == 0 {
                file.free(reg);
            }
        }

        if inst.op.writes_r4() && file.is_used(PoolReg::r4()) {
            return Err(CompileError::AccumulatorClobbered {
                inst: ip,
                op: name,
                temp: file.owner(PoolReg::r4()).unwrap_or(0),
            });
        }

        if !inst.dst.is_temp() {
            continue;
        }
        let t = inst.dst.index as usize;

        let reg = match pool_regs[t] {
            Some(reg) => reg,
            None => {
                let mut allowed = allowed_dst(inst.op, ir.stage);
                if inst.op == QOp::PackScaled {
                    allowed.subtract(&src_regs);
                }
                let reg = file.allocate(&allowed, inst.dst.index).ok_or(
                    CompileError::RegisterPoolExhausted {
                        inst: ip,
                        op: name,
                        temp: inst.dst.index,
                    },
                )?;
                log::trace!("t{} -> {} at {} ({})", t, reg.to_qpu(), ip, name);
                pool_regs[t] = Some(reg);
                alloc.temp_regs[t] = Some(reg.to_qpu());
                reg
            }
        };
        alloc.max_live = alloc.max_live.max(file.live_count());

        uses[t] -= 1;
        if uses[t] == 0 {
            file.free(reg);
        }
    }

    Ok(alloc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::qir::parse_qir;

    #[test]
    fn test_accumulators_first() {
        let ir = parse_qir(
            "uniform const 0
             t0 = mov u0
             t1 = fadd t0, t0
             t2 = fadd t1, t0
             vpm_write t2",
        )
        .unwrap();
        let alloc = allocate(&ir, true).unwrap();
        assert_eq!(alloc.reg(0), Some(QpuReg::rn(0)));
        assert_eq!(alloc.reg(1), Some(QpuReg::rn(1)));
        // t0 and t1 both die at the second fadd, so t2 reuses r0
        assert_eq!(alloc.reg(2), Some(QpuReg::rn(0)));
    }

    #[test]
    fn test_constraints() {
        let ir = parse_qir(
            "stage frag
             uniform const 0
             t0 = frag_z
             t1 = frag_rcp_w
             t2 = fmul t0, t1
             t3 = tlb_color_read
             t4 = r4_unpack_a t3
             t5 = pack_scaled t2, t4
             tlb_color_write t5",
        )
        .unwrap();
        let alloc = allocate(&ir, true).unwrap();
        assert_eq!(alloc.reg(0), Some(QpuReg::rb(15)));
        assert_eq!(alloc.reg(1), Some(QpuReg::ra(15)));
        assert_eq!(alloc.reg(3), Some(QpuReg::r4()));
        let packed = alloc.reg(5).unwrap();
        assert_eq!(packed.mux, crate::qpu::Mux::A);
        assert_ne!(Some(packed), alloc.reg(2));
        assert_ne!(Some(packed), alloc.reg(4));
    }

    #[test]
    fn test_frag_stage_avoids_payload_registers() {
        let mut text = String::from("stage frag\nuniform const 0\n");
        for t in 0..40 {
            text.push_str(&format!("t{} = mov u0\n", t));
        }
        for t in 0..40 {
            text.push_str(&format!("vpm_write t{}\n", t));
        }
        let ir = parse_qir(&text).unwrap();
        let alloc = allocate(&ir, true).unwrap();
        for t in 0..40 {
            let reg = alloc.reg(t).unwrap();
            assert!(reg.addr != 15 || reg.is_accumulator(), "t{} got {}", t, reg);
        }
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut text = String::from("stage vert\nuniform const 0\n");
        for t in 0..69 {
            text.push_str(&format!("t{} = mov u0\n", t));
        }
        for t in 0..69 {
            text.push_str(&format!("vpm_write t{}\n", t));
        }
        let ir = parse_qir(&text).unwrap();
        let err = allocate(&ir, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(
            err,
            CompileError::RegisterPoolExhausted {
                inst: 67,
                op: "mov",
                temp: 67
            }
        );
    }

    #[test]
    fn test_r4_clobber() {
        let ir = parse_qir(
            "uniform const 0
             t0 = tlb_color_read
             t1 = mov u0
             t2 = rcp t1
             t3 = r4_unpack_a t0
             tlb_color_write t3",
        )
        .unwrap();
        let err = allocate(&ir, true).unwrap_err();
        assert_eq!(
            err,
            CompileError::AccumulatorClobbered {
                inst: 2,
                op: "rcp",
                temp: 0
            }
        );
    }

    #[test]
    fn test_undefined_read() {
        let ir = parse_qir("t1 = fadd t0, t0\nvpm_write t1").unwrap();
        let err = allocate(&ir, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedValue);

        let alloc = allocate(&ir, false).unwrap();
        assert_eq!(alloc.undefined_reads.len(), 2);
        assert_eq!(alloc.undefined_reads[0].temp, 0);
        assert_eq!(alloc.reg(0), None);
        assert!(alloc.reg(1).is_some());
    }
}
