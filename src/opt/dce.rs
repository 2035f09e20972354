//! Dead code elimination.
//!
//! One backward walk. An instruction whose destination temporary has no
//! later reader and which has no side effects is unlinked; everything else
//! marks its sources live.

use crate::qir::ShaderIr;

pub struct DeadCodePass {
    used: Vec<bool>,
    progress: bool,
}

impl DeadCodePass {
    pub fn new() -> Self {
        Self {
            used: Vec::new(),
            progress: false,
        }
    }

    pub fn run(&mut self, ir: &mut ShaderIr) -> bool {
        self.used = vec![false; ir.num_temps as usize];

        let mut cur = ir.instructions.last();
        while let Some(id) = cur {
            cur = ir.instructions.prev(id);
            let Some(inst) = ir.instructions.get(id) else {
                continue;
            };

            let dead = inst.dst.is_temp()
                && !inst.op.has_side_effects()
                && !self.used.get(inst.dst.index as usize).copied().unwrap_or(false);
            if dead {
                log::trace!("dce: removing {}", inst);
                ir.instructions.remove(id);
                self.progress = true;
                continue;
            }

            for src in inst.srcs() {
                if src.is_temp() {
                    if let Some(slot) = self.used.get_mut(src.index as usize) {
                        *slot = true;
                    }
                }
            }
        }
        self.progress
    }
}

impl Default for DeadCodePass {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qir::{parse_qir, QOp};

    #[test]
    fn test_removes_unused_chain() {
        let mut ir = parse_qir(
            "uniform const 0
             t0 = mov u0
             t1 = fadd t0, t0
             t2 = fmul t1, t1
             t3 = mov u0
             tlb_color_write t3",
        )
        .unwrap();
        assert!(DeadCodePass::new().run(&mut ir));
        let ops: Vec<_> = ir.instructions.iter().map(|i| i.op).collect();
        assert_eq!(ops, vec![QOp::Mov, QOp::TlbColorWrite]);
        assert!(!DeadCodePass::new().run(&mut ir), "second run is a no-op");
    }

    #[test]
    fn test_keeps_side_effects_and_flag_setters() {
        let mut ir = parse_qir(
            "uniform const 0
             uniform texture_config_p0 0
             uniform texture_config_p1 0
             t0 = mov u0
             sf t0
             t1 = vpm_read
             tex_t t0, u1
             tex_s t0, u2
             t2 = tex_result
             t3 = tlb_color_read",
        )
        .unwrap();
        assert!(!DeadCodePass::new().run(&mut ir));
        assert_eq!(ir.instructions.len(), 7);
    }
}
