//! Property tests over randomly generated straight-line QIR: the optimizer
//! must preserve observable results and reach a fixpoint, the allocator must
//! never share a register between overlapping lifetimes, and every compiled
//! program must satisfy the hardware scheduling rules.

mod common;

use common::{check_hazards, interpret};
use proptest::prelude::*;
use qpuc::core::{CompilationSession, CompileOptions};
use qpuc::opt::{optimize, DeadCodePass};
use qpuc::qir::{QOp, QReg, UniformContents};
use qpuc::regalloc::allocate;
use qpuc::{compile_shader, QStage, ShaderIr};

const NUM_UNIFORMS: usize = 3;

type Step = (u8, usize, usize, usize);

fn build(steps: &[Step], outputs: &[usize]) -> ShaderIr {
    let mut ir = ShaderIr::new(QStage::Vert);
    let mut values: Vec<QReg> = (0..NUM_UNIFORMS as u32)
        .map(|i| ir.add_uniform(UniformContents::Constant, i))
        .collect();

    for &(op, a, b, c) in steps {
        let n = values.len();
        let (a, b, c) = (values[a % n], values[b % n], values[c % n]);
        let result = match op % 12 {
            0..=2 => ir.mov(a),
            3 => ir.fadd(a, b),
            4 => ir.fmul(a, b),
            5 => ir.add(a, b),
            6 => ir.xor(a, b),
            7 => ir.min(a, b),
            8 => ir.cmp(a, b, c),
            9 => {
                ir.sf(a);
                ir.sel_x_y_zs(b, c)
            }
            10 => {
                ir.sf(a);
                ir.sel_x_0_ns(b)
            }
            _ => ir.sub(a, b),
        };
        values.push(result);
    }

    for &o in outputs {
        let v = values[o % values.len()];
        ir.emit_void(QOp::VpmWrite, &[v]);
    }
    ir
}

fn program() -> impl Strategy<Value = (Vec<Step>, Vec<usize>)> {
    (
        proptest::collection::vec((any::<u8>(), 0..64usize, 0..64usize, 0..64usize), 1..40),
        proptest::collection::vec(0..64usize, 1..8),
    )
}

/// Definition point and last read of every temporary, by instruction position.
fn lifetimes(ir: &ShaderIr) -> Vec<Option<(usize, usize)>> {
    let mut ranges: Vec<Option<(usize, usize)>> = vec![None; ir.num_temps as usize];
    for (ip, inst) in ir.instructions.iter().enumerate() {
        for src in inst.srcs() {
            if src.is_temp() {
                if let Some((_, last)) = ranges[src.index as usize].as_mut() {
                    *last = ip;
                }
            }
        }
        if inst.dst.is_temp() {
            ranges[inst.dst.index as usize] = Some((ip, ip));
        }
    }
    ranges
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        rng_algorithm: proptest::test_runner::RngAlgorithm::ChaCha,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0x0C_A4_C7),
        .. ProptestConfig::default()
    })]

    #[test]
    fn optimizer_preserves_results((steps, outputs) in program(), uniforms in any::<[u32; NUM_UNIFORMS]>()) {
        let mut ir = build(&steps, &outputs);
        let before = interpret(&ir, &uniforms);
        optimize(&mut ir, 64);
        let after = interpret(&ir, &uniforms);
        prop_assert_eq!(before, after);
        prop_assert!(ir.validate().is_ok());
    }

    #[test]
    fn optimizer_reaches_fixpoint((steps, outputs) in program()) {
        let mut ir = build(&steps, &outputs);
        optimize(&mut ir, 64);
        let len = ir.instructions.len();
        prop_assert_eq!(optimize(&mut ir, 64), 0);
        prop_assert!(!DeadCodePass::new().run(&mut ir));
        prop_assert_eq!(ir.instructions.len(), len);
        prop_assert!(ir.instructions.iter().all(|i| i.op != QOp::Mov || !i.src[0].is_temp()));
    }

    #[test]
    fn dce_leaves_only_live_instructions((steps, outputs) in program(), uniforms in any::<[u32; NUM_UNIFORMS]>()) {
        let mut ir = build(&steps, &outputs);
        let before = interpret(&ir, &uniforms);
        DeadCodePass::new().run(&mut ir);
        prop_assert_eq!(interpret(&ir, &uniforms), before);

        let ranges = lifetimes(&ir);
        for inst in &ir.instructions {
            if inst.dst.is_temp() && !inst.op.has_side_effects() {
                let (def, last) = ranges[inst.dst.index as usize].unwrap();
                prop_assert!(last > def, "{} is never read", inst);
            }
        }
    }

    #[test]
    fn allocation_is_injective_over_live_ranges((steps, outputs) in program()) {
        let ir = build(&steps, &outputs);
        let alloc = allocate(&ir, true).unwrap();
        let ranges = lifetimes(&ir);

        for (t, rt) in ranges.iter().enumerate() {
            for (u, ru) in ranges.iter().enumerate().skip(t + 1) {
                let (Some((dt, lt)), Some((du, lu))) = (rt, ru) else { continue };
                let overlap = (du < dt && dt < lu) || (dt < du && du < lt);
                if overlap {
                    prop_assert_ne!(alloc.reg(t as u32), alloc.reg(u as u32), "t{} and t{}", t, u);
                }
            }
        }
    }

    #[test]
    fn compiled_programs_obey_hazard_rules((steps, outputs) in program(), opt in any::<bool>()) {
        let ir = build(&steps, &outputs);
        let mut session = CompilationSession::new(CompileOptions::default().with_optimize(opt));
        let shader = compile_shader(&mut session, ir).unwrap();
        prop_assert!(check_hazards(&shader.insts, QStage::Vert).is_ok(), "{:?}", check_hazards(&shader.insts, QStage::Vert));
    }
}
