//! Hazard serialization and program framing.
//!
//! [`serialize`] copies the emitted words into the final program, inserting
//! NOPs where the hardware would otherwise misbehave:
//!
//! - a register file location written by one word can't be read by the next;
//! - r4 can't be read, or written again, within two words of an SFU write or
//!   a TMU or TLB colour load.
//!
//! [`finalize`] then frames the program: program-end signal and its two
//! delay slots, and for fragment shaders the scoreboard wait and unlock.

use crate::qir::QStage;
use crate::qpu::inst;
use crate::qpu::{Sig, REGFILE_SIZE, W_VPM};

/// Words between an r4 producer and its next reader or producer.
const R4_LATENCY: usize = 3;

/// Slot of the scoreboard wait in fragment shaders.
const SCOREBOARD_WAIT_SLOT: usize = 2;

/// Hazard-free program and how many NOPs were needed.
#[derive(Debug, Clone, Default)]
pub struct Serialized {
    pub insts: Vec<u64>,
    pub nops_inserted: usize,
}

/// Whether `next` reads a register file location `prev` writes.
fn raw_hazard(prev: u64, next: u64) -> bool {
    let (wa, wb) = inst::regfile_waddrs(prev);
    let (ra, rb) = inst::regfile_raddrs(next);
    let hit = |read: Option<u8>, write: u8| {
        matches!(read, Some(addr) if addr < REGFILE_SIZE && addr == write)
    };
    hit(ra, wa) || hit(rb, wb)
}

pub fn serialize(queue: &[u64]) -> Serialized {
    let mut out = Serialized {
        insts: Vec::with_capacity(queue.len()),
        nops_inserted: 0,
    };
    let mut last_r4_producer: Option<usize> = None;

    for &word in queue {
        if let Some(&prev) = out.insts.last() {
            if raw_hazard(prev, word) {
                log::trace!("serialize: regfile read-after-write at {}", out.insts.len());
                out.push_nop();
            }
        }

        let produces = inst::produces_r4(word);
        if produces || inst::reads_r4(word) {
            if let Some(at) = last_r4_producer {
                while out.insts.len() - at < R4_LATENCY {
                    out.push_nop();
                }
            }
        }
        if produces {
            last_r4_producer = Some(out.insts.len());
        }
        out.insts.push(word);
    }
    out
}

impl Serialized {
    fn push_nop(&mut self) {
        self.insts.push(inst::nop());
        self.nops_inserted += 1;
    }
}

/// Add the thread-end framing to a serialized program. Returns the number of
/// NOPs added.
pub fn finalize(insts: &mut Vec<u64>, stage: QStage) -> usize {
    let start_len = insts.len();
    if insts.is_empty() {
        insts.push(inst::nop());
    }

    if stage == QStage::Frag {
        // Nothing may touch the tile buffer before the scoreboard wait.
        if let Some(first_tlb) = insts.iter().position(|w| inst::accesses_tlb(*w)) {
            for _ in first_tlb..SCOREBOARD_WAIT_SLOT {
                insts.insert(0, inst::nop());
            }
        }
        if insts.len() > SCOREBOARD_WAIT_SLOT && inst::has_signal(insts[SCOREBOARD_WAIT_SLOT]) {
            insts.insert(SCOREBOARD_WAIT_SLOT, inst::nop());
        }
    }

    // The final word can't write the VPM or carry a signal of its own.
    let needs_pad = insts
        .last()
        .is_some_and(|&w| inst::writes_addr(w, W_VPM) || inst::has_signal(w));
    if needs_pad {
        insts.push(inst::nop());
    }
    if stage == QStage::Frag {
        // Program end must come after the scoreboard wait slot.
        while insts.len() <= SCOREBOARD_WAIT_SLOT + 1 {
            insts.push(inst::nop());
        }
    }

    if let Some(last) = insts.last_mut() {
        *last = inst::set_sig(*last, Sig::ProgEnd);
    }
    insts.push(inst::nop());
    insts.push(inst::nop());

    if stage == QStage::Frag {
        insts[SCOREBOARD_WAIT_SLOT] = inst::set_sig(insts[SCOREBOARD_WAIT_SLOT], Sig::WaitForScoreboard);
        if let Some(last) = insts.last_mut() {
            *last = inst::set_sig(*last, Sig::ScoreboardUnlock);
        }
    }

    insts.len() - start_len
}
