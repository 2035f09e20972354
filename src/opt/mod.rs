// This module drives the QIR peephole optimizer. Three cheap passes are run in a loop:
// algebraic simplification turns degenerate selects into moves, copy propagation makes
// readers of a move read its source directly, and dead code elimination removes the moves
// and other pure instructions nobody reads anymore. Each pass reports whether it changed
// anything; the loop stops on the first round where none did, or when the configured
// iteration cap is reached (which is logged, since the passes are expected to converge
// within a few rounds on any real shader).

//! Optimization passes over QIR.

pub mod algebraic;
pub mod copy_prop;
pub mod dce;

pub use algebraic::AlgebraicPass;
pub use copy_prop::CopyPropPass;
pub use dce::DeadCodePass;

use crate::qir::ShaderIr;

/// Run all passes until none makes progress. Returns the number of rounds
/// that changed something.
pub fn optimize(ir: &mut ShaderIr, max_iterations: usize) -> usize {
    let mut rounds = 0;
    loop {
        if rounds >= max_iterations {
            log::warn!(
                "optimizer stopped after {} rounds without reaching a fixpoint",
                rounds
            );
            break;
        }

        let mut progress = false;
        progress |= AlgebraicPass::new().run(ir);
        progress |= CopyPropPass::new().run(ir);
        progress |= DeadCodePass::new().run(ir);
        log::debug!(
            "optimizer round {}: progress={} ({} instructions)",
            rounds,
            progress,
            ir.instructions.len()
        );

        if !progress {
            break;
        }
        rounds += 1;
    }
    rounds
}
