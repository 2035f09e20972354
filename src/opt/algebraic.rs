//! Algebraic simplification.
//!
//! Rewrites selects whose two value operands are the same register into a
//! plain move, which copy propagation can then fold away.

use crate::qir::{QInst, QOp, ShaderIr};

pub struct AlgebraicPass {
    progress: bool,
}

impl AlgebraicPass {
    pub fn new() -> Self {
        Self { progress: false }
    }

    fn simplify(inst: &QInst) -> Option<QInst> {
        let same = match inst.op {
            // cmp d, c, x, x
            QOp::Cmp => inst.src[1] == inst.src[2],
            QOp::SelXYZs | QOp::SelXYZc | QOp::SelXYNs | QOp::SelXYNc => {
                inst.src[0] == inst.src[1]
            }
            _ => false,
        };
        if !same {
            return None;
        }
        let value = inst.srcs()[inst.op.nsrc() - 1];
        Some(QInst::new(QOp::Mov, inst.dst, &[value]))
    }

    pub fn run(&mut self, ir: &mut ShaderIr) -> bool {
        let mut cur = ir.instructions.first();
        while let Some(id) = cur {
            cur = ir.instructions.next(id);
            let Some(inst) = ir.instructions.get_mut(id) else {
                continue;
            };
            if let Some(simplified) = Self::simplify(inst) {
                log::trace!("algebraic: {} -> {}", inst, simplified);
                *inst = simplified;
                self.progress = true;
            }
        }
        self.progress
    }
}

impl Default for AlgebraicPass {
    fn default() -> Self {
        Self::new()
    }
}
