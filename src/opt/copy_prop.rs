// Copy propagation over QIR. Every temporary is written exactly once and there is no
// control flow, so after `mov tD, S` every later read of tD can read S directly. The pass
// walks the list once: it first rewrites an instruction's sources through the alias map
// (so chains of moves collapse in a single walk) and then, if the instruction is a move
// of a temporary or a uniform into a temporary, records the alias. Varying reads are
// never propagated because each read pops the varying FIFO; duplicating or moving one
// would change which value every other read sees. Neither are temporaries that live in
// r4 (SFU, texture and colour-load results): the move is what copies them out before the
// next r4 write. The dead moves left behind are removed by dead code elimination.

//! Copy propagation.

use hashbrown::{HashMap, HashSet};

use crate::qir::{QFile, QOp, QReg, ShaderIr};

pub struct CopyPropPass {
    movs: HashMap<u32, QReg>,
    /// Temporaries defined by an op that writes r4.
    r4_temps: HashSet<u32>,
    progress: bool,
}

impl CopyPropPass {
    pub fn new() -> Self {
        Self {
            movs: HashMap::new(),
            r4_temps: HashSet::new(),
            progress: false,
        }
    }

    fn is_propagatable(&self, src: &QReg) -> bool {
        match src.file {
            QFile::Temp => !self.r4_temps.contains(&src.index),
            QFile::Unif => true,
            QFile::Vary | QFile::Null => false,
        }
    }

    pub fn run(&mut self, ir: &mut ShaderIr) -> bool {
        let mut cur = ir.instructions.first();
        while let Some(id) = cur {
            cur = ir.instructions.next(id);
            let Some(inst) = ir.instructions.get_mut(id) else {
                continue;
            };

            for src in inst.srcs_mut() {
                if !src.is_temp() {
                    continue;
                }
                if let Some(alias) = self.movs.get(&src.index) {
                    log::trace!("copy_prop: {} -> {}", src, alias);
                    *src = *alias;
                    self.progress = true;
                }
            }

            if inst.dst.is_temp() && inst.op.writes_r4() {
                self.r4_temps.insert(inst.dst.index);
            }
            if inst.op == QOp::Mov && inst.dst.is_temp() && self.is_propagatable(&inst.src[0]) {
                self.movs.insert(inst.dst.index, inst.src[0]);
            }
        }
        self.progress
    }
}

impl Default for CopyPropPass {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qir::parse_qir;

    fn text(ir: &ShaderIr) -> Vec<String> {
        ir.instructions.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_chain_collapses_in_one_walk() {
        let mut ir = parse_qir(
            "uniform const 0
             t0 = mov u0
             t1 = mov t0
             t2 = mov t1
             t3 = fadd t2, t1
             tlb_color_write t3",
        )
        .unwrap();
        assert!(CopyPropPass::new().run(&mut ir));
        assert_eq!(text(&ir)[3], "t3 = fadd u0, u0");
        assert!(!CopyPropPass::new().run(&mut ir));
    }

    #[test]
    fn test_varying_reads_stay_put() {
        let mut ir = parse_qir(
            "t0 = mov v0
             t1 = vary_add_c t0
             t2 = mov v1
             t3 = fadd t2, t1
             tlb_color_write t3",
        )
        .unwrap();
        assert!(!CopyPropPass::new().run(&mut ir));
        assert_eq!(text(&ir)[1], "t1 = vary_add_c t0");
    }

    #[test]
    fn test_r4_results_are_copied_out() {
        let mut ir = parse_qir(
            "uniform const 0
             t0 = tlb_color_read
             t1 = mov t0
             t2 = rcp u0
             t3 = fadd t1, t2
             tlb_color_write t3",
        )
        .unwrap();
        assert!(!CopyPropPass::new().run(&mut ir));
        assert_eq!(text(&ir)[1], "t1 = mov t0");
        assert_eq!(text(&ir)[3], "t3 = fadd t1, t2");
    }

    #[test]
    fn test_only_arity_slots_rewritten() {
        let mut ir = parse_qir("uniform const 0\nt0 = mov u0\nt1 = rcp t0").unwrap();
        let id = ir.instructions.last().unwrap();
        ir.instructions.get_mut(id).unwrap().src[1] = QReg::temp(0);
        CopyPropPass::new().run(&mut ir);
        let inst = ir.instructions.get(id).unwrap();
        assert_eq!(inst.src[0], QReg::unif(0));
        assert_eq!(inst.src[1], QReg::temp(0));
    }
}
