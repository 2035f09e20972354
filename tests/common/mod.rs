//! Shared helpers for the integration tests: a hazard checker for finished
//! programs and a reference interpreter for straight-line QIR.

#![allow(dead_code)]

use qpuc::qir::{QFile, QInst, QOp, QReg, ShaderIr};
use qpuc::qpu::inst;
use qpuc::qpu::{Sig, REGFILE_SIZE};
use qpuc::QStage;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Check every hardware rule the serializer and framing must uphold.
pub fn check_hazards(insts: &[u64], stage: QStage) -> Result<(), String> {
    if insts.len() < 3 {
        return Err(format!("program too short: {} words", insts.len()));
    }

    for (i, pair) in insts.windows(2).enumerate() {
        let (wa, wb) = inst::regfile_waddrs(pair[0]);
        let (ra, rb) = inst::regfile_raddrs(pair[1]);
        for (read, write) in [(ra, wa), (rb, wb)] {
            if let Some(addr) = read {
                if addr < REGFILE_SIZE && addr == write {
                    return Err(format!("word {} reads regfile {} written by word {}", i + 1, addr, i));
                }
            }
        }
    }

    let mut last_producer: Option<usize> = None;
    for (i, &w) in insts.iter().enumerate() {
        if inst::reads_r4(w) || inst::produces_r4(w) {
            if let Some(p) = last_producer {
                if i - p < 3 {
                    return Err(format!("word {} touches r4 {} words after producer {}", i, i - p, p));
                }
            }
        }
        if inst::produces_r4(w) {
            last_producer = Some(i);
        }
    }

    let end = insts.len() - 3;
    let prog_ends: Vec<usize> = insts
        .iter()
        .enumerate()
        .filter(|(_, w)| inst::sig(**w) == Sig::ProgEnd as u32)
        .map(|(i, _)| i)
        .collect();
    if prog_ends != vec![end] {
        return Err(format!("program end at {:?}, expected [{}]", prog_ends, end));
    }
    for &w in &insts[end + 1..] {
        if !inst::active_muxes(w).is_empty() || inst::writes_addr(w, qpuc::qpu::W_VPM) {
            return Err("delay slot does work".into());
        }
    }

    if stage == QStage::Frag {
        if inst::sig(insts[2]) != Sig::WaitForScoreboard as u32 {
            return Err("missing scoreboard wait in slot 2".into());
        }
        if inst::sig(insts[insts.len() - 1]) != Sig::ScoreboardUnlock as u32 {
            return Err("missing scoreboard unlock on last word".into());
        }
        if insts[..2].iter().any(|w| inst::accesses_tlb(*w)) {
            return Err("tile buffer access before scoreboard wait".into());
        }
    }
    Ok(())
}

/// Flags produced by `sf`.
#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    zero: bool,
    negative: bool,
}

/// Reference semantics for the pure subset of QIR, over raw 32-bit values.
/// Returns the values passed to `vpm_write`, in order.
pub fn interpret(ir: &ShaderIr, uniforms: &[u32]) -> Vec<u32> {
    let mut temps = vec![0u32; ir.num_temps as usize];
    let mut flags = Flags::default();
    let mut out = Vec::new();

    let read = |temps: &Vec<u32>, reg: QReg| -> u32 {
        match reg.file {
            QFile::Temp => temps[reg.index as usize],
            QFile::Unif => uniforms[reg.index as usize],
            QFile::Vary | QFile::Null => 0,
        }
    };
    let f = f32::from_bits;
    let fb = |x: f32| x.to_bits();

    for inst in &ir.instructions {
        let QInst { op, dst, src } = *inst;
        let a = read(&temps, src[0]);
        let b = read(&temps, src[1]);
        let c = read(&temps, src[2]);
        let sel = |cond: bool, x: u32, y: u32| if cond { x } else { y };

        let value = match op {
            QOp::Mov => a,
            QOp::FAdd => fb(f(a) + f(b)),
            QOp::FSub => fb(f(a) - f(b)),
            QOp::FMul => fb(f(a) * f(b)),
            QOp::Add => a.wrapping_add(b),
            QOp::Sub => a.wrapping_sub(b),
            QOp::And => a & b,
            QOp::Or => a | b,
            QOp::Xor => a ^ b,
            QOp::Not => !a,
            QOp::Min => (a as i32).min(b as i32) as u32,
            QOp::Max => (a as i32).max(b as i32) as u32,
            QOp::Cmp => sel((a as i32) < 0, b, c),
            QOp::Sf => {
                flags = Flags {
                    zero: a == 0,
                    negative: (a as i32) < 0,
                };
                continue;
            }
            QOp::SelXYZs => sel(flags.zero, a, b),
            QOp::SelXYNc => sel(!flags.negative, a, b),
            QOp::SelX0Ns => sel(flags.negative, a, 0),
            QOp::VpmWrite => {
                out.push(a);
                continue;
            }
            other => panic!("interpreter does not model {}", other),
        };
        if dst.is_temp() {
            temps[dst.index as usize] = value;
        }
    }
    out
}
