// This module defines the closed set of QIR opcodes and the static table that describes
// each one: printable name, destination count, source count and whether the instruction
// has effects beyond writing its destination (VPM, TLB and TMU traffic). Every pass and
// the code generator dispatch on QOp with exhaustive matches, so adding an opcode without
// teaching each stage about it fails to build. The hazard helpers (flag producers and
// consumers, r4 producers and consumers, SFU ops) and the add/mul ALU mapping for the
// simple arithmetic ops live here too so the table is the single source of truth.

//! QIR opcode table.

use std::str::FromStr;

use crate::core::{CompileError, CompileResult};
use crate::qpu::{OpAdd, OpMul};

/// QIR operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QOp {
    Mov,
    FAdd,
    FSub,
    FMul,
    Mul24,
    FMin,
    FMax,
    FMinAbs,
    FMaxAbs,
    FToI,
    IToF,
    Add,
    Sub,
    Shl,
    Shr,
    Asr,
    Min,
    Max,
    And,
    Or,
    Xor,
    Not,

    Seq,
    Sne,
    Sge,
    Slt,
    Cmp,

    Sf,
    SelX0Zs,
    SelX0Zc,
    SelX0Ns,
    SelX0Nc,
    SelXYZs,
    SelXYZc,
    SelXYNs,
    SelXYNc,

    Rcp,
    Rsq,
    Exp2,
    Log2,

    PackScaled,
    PackColors,

    VpmWrite,
    VpmRead,
    TlbDiscardSetup,
    TlbPassthroughZWrite,
    TlbColorWrite,
    TlbColorRead,
    VaryAddC,

    FragX,
    FragY,
    FragZ,
    FragRcpW,

    TexS,
    TexT,
    TexR,
    TexB,
    TexResult,
    R4UnpackA,
    R4UnpackB,
    R4UnpackC,
    R4UnpackD,
}

/// Static description of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub name: &'static str,
    pub ndst: u8,
    pub nsrc: u8,
    pub has_side_effects: bool,
}

const fn info(name: &'static str, ndst: u8, nsrc: u8, has_side_effects: bool) -> OpInfo {
    OpInfo {
        name,
        ndst,
        nsrc,
        has_side_effects,
    }
}

impl QOp {
    /// Every opcode, in declaration order.
    pub const ALL: [QOp; 62] = {
        use QOp::*;
        [
            Mov, FAdd, FSub, FMul, Mul24, FMin, FMax, FMinAbs, FMaxAbs, FToI, IToF, Add, Sub,
            Shl, Shr, Asr, Min, Max, And, Or, Xor, Not, Seq, Sne, Sge, Slt, Cmp, Sf, SelX0Zs,
            SelX0Zc, SelX0Ns, SelX0Nc, SelXYZs, SelXYZc, SelXYNs, SelXYNc, Rcp, Rsq, Exp2,
            Log2, PackScaled, PackColors, VpmWrite, VpmRead, TlbDiscardSetup,
            TlbPassthroughZWrite, TlbColorWrite, TlbColorRead, VaryAddC, FragX, FragY, FragZ,
            FragRcpW, TexS, TexT, TexR, TexB, TexResult, R4UnpackA, R4UnpackB, R4UnpackC,
            R4UnpackD,
        ]
    };

    pub const fn info(self) -> OpInfo {
        use QOp::*;
        match self {
            Mov => info("mov", 1, 1, false),
            FAdd => info("fadd", 1, 2, false),
            FSub => info("fsub", 1, 2, false),
            FMul => info("fmul", 1, 2, false),
            Mul24 => info("mul24", 1, 2, false),
            FMin => info("fmin", 1, 2, false),
            FMax => info("fmax", 1, 2, false),
            FMinAbs => info("fminabs", 1, 2, false),
            FMaxAbs => info("fmaxabs", 1, 2, false),
            FToI => info("ftoi", 1, 1, false),
            IToF => info("itof", 1, 1, false),
            Add => info("add", 1, 2, false),
            Sub => info("sub", 1, 2, false),
            Shl => info("shl", 1, 2, false),
            Shr => info("shr", 1, 2, false),
            Asr => info("asr", 1, 2, false),
            Min => info("min", 1, 2, false),
            Max => info("max", 1, 2, false),
            And => info("and", 1, 2, false),
            Or => info("or", 1, 2, false),
            Xor => info("xor", 1, 2, false),
            Not => info("not", 1, 1, false),

            Seq => info("seq", 1, 2, false),
            Sne => info("sne", 1, 2, false),
            Sge => info("sge", 1, 2, false),
            Slt => info("slt", 1, 2, false),
            Cmp => info("cmp", 1, 3, false),

            Sf => info("sf", 0, 1, false),
            SelX0Zs => info("sel_x_0_zs", 1, 1, false),
            SelX0Zc => info("sel_x_0_zc", 1, 1, false),
            SelX0Ns => info("sel_x_0_ns", 1, 1, false),
            SelX0Nc => info("sel_x_0_nc", 1, 1, false),
            SelXYZs => info("sel_x_y_zs", 1, 2, false),
            SelXYZc => info("sel_x_y_zc", 1, 2, false),
            SelXYNs => info("sel_x_y_ns", 1, 2, false),
            SelXYNc => info("sel_x_y_nc", 1, 2, false),

            Rcp => info("rcp", 1, 1, false),
            Rsq => info("rsq", 1, 1, false),
            Exp2 => info("exp2", 1, 1, false),
            Log2 => info("log2", 1, 1, false),

            PackScaled => info("pack_scaled", 1, 2, false),
            PackColors => info("pack_colors", 1, 4, false),

            VpmWrite => info("vpm_write", 0, 1, true),
            VpmRead => info("vpm_read", 1, 0, true),
            TlbDiscardSetup => info("tlb_discard_setup", 0, 1, true),
            TlbPassthroughZWrite => info("tlb_passthrough_z_write", 0, 0, true),
            TlbColorWrite => info("tlb_color_write", 0, 1, true),
            TlbColorRead => info("tlb_color_read", 1, 0, true),
            VaryAddC => info("vary_add_c", 1, 1, false),

            FragX => info("frag_x", 1, 0, false),
            FragY => info("frag_y", 1, 0, false),
            FragZ => info("frag_z", 1, 0, false),
            FragRcpW => info("frag_rcp_w", 1, 0, false),

            TexS => info("tex_s", 0, 2, true),
            TexT => info("tex_t", 0, 2, true),
            TexR => info("tex_r", 0, 2, true),
            TexB => info("tex_b", 0, 2, true),
            TexResult => info("tex_result", 1, 0, true),
            R4UnpackA => info("r4_unpack_a", 1, 1, false),
            R4UnpackB => info("r4_unpack_b", 1, 1, false),
            R4UnpackC => info("r4_unpack_c", 1, 1, false),
            R4UnpackD => info("r4_unpack_d", 1, 1, false),
        }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn nsrc(self) -> usize {
        self.info().nsrc as usize
    }

    pub fn has_side_effects(self) -> bool {
        self.info().has_side_effects
    }

    /// Whether the op sets the condition flags.
    pub fn writes_flags(self) -> bool {
        use QOp::*;
        matches!(self, Sf | Seq | Sne | Sge | Slt | Cmp | TlbDiscardSetup)
    }

    /// Whether the op consumes condition flags set by an earlier instruction.
    pub fn reads_flags(self) -> bool {
        use QOp::*;
        matches!(
            self,
            SelX0Zs | SelX0Zc | SelX0Ns | SelX0Nc | SelXYZs | SelXYZc | SelXYNs | SelXYNc
        )
    }

    pub fn is_sfu(self) -> bool {
        matches!(self, QOp::Rcp | QOp::Rsq | QOp::Exp2 | QOp::Log2)
    }

    /// Whether executing the op overwrites accumulator r4.
    pub fn writes_r4(self) -> bool {
        self.is_sfu() || matches!(self, QOp::TexResult | QOp::TlbColorRead)
    }

    pub fn reads_r4(self) -> bool {
        use QOp::*;
        matches!(self, R4UnpackA | R4UnpackB | R4UnpackC | R4UnpackD)
    }

    /// ALU slot and hardware opcode for ops that lower to one ALU instruction.
    pub fn alu(self) -> Option<AluOp> {
        use QOp::*;
        let alu = match self {
            FAdd => AluOp::Add(OpAdd::FAdd),
            FSub => AluOp::Add(OpAdd::FSub),
            FMin => AluOp::Add(OpAdd::FMin),
            FMax => AluOp::Add(OpAdd::FMax),
            FMinAbs => AluOp::Add(OpAdd::FMinAbs),
            FMaxAbs => AluOp::Add(OpAdd::FMaxAbs),
            FToI => AluOp::Add(OpAdd::FToI),
            IToF => AluOp::Add(OpAdd::IToF),
            Add => AluOp::Add(OpAdd::Add),
            Sub => AluOp::Add(OpAdd::Sub),
            Shl => AluOp::Add(OpAdd::Shl),
            Shr => AluOp::Add(OpAdd::Shr),
            Asr => AluOp::Add(OpAdd::Asr),
            Min => AluOp::Add(OpAdd::Min),
            Max => AluOp::Add(OpAdd::Max),
            And => AluOp::Add(OpAdd::And),
            Or => AluOp::Add(OpAdd::Or),
            Xor => AluOp::Add(OpAdd::Xor),
            Not => AluOp::Add(OpAdd::Not),
            FMul => AluOp::Mul(OpMul::FMul),
            Mul24 => AluOp::Mul(OpMul::Mul24),
            _ => return None,
        };
        Some(alu)
    }
}

/// Which ALU executes a simple op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add(OpAdd),
    Mul(OpMul),
}

impl std::fmt::Display for QOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info().name)
    }
}

impl FromStr for QOp {
    type Err = CompileError;

    fn from_str(s: &str) -> CompileResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.info().name == s)
            .ok_or_else(|| CompileError::UnknownOpcode { name: s.to_string() })
    }
}

/// Look up an opcode by its raw index into [`QOp::ALL`].
impl TryFrom<u32> for QOp {
    type Error = CompileError;

    fn try_from(index: u32) -> CompileResult<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| CompileError::UnknownOpcode {
                name: format!("#{}", index),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_shape() {
        for op in QOp::ALL {
            let info = op.info();
            assert!(info.nsrc <= 4, "{} has {} sources", info.name, info.nsrc);
            assert!(info.ndst <= 1, "{} has {} destinations", info.name, info.ndst);
            assert_eq!(info.name.parse::<QOp>().unwrap(), op);
        }
    }

    #[test]
    fn test_names_unique() {
        let mut names: Vec<_> = QOp::ALL.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), QOp::ALL.len());
    }

    #[test]
    fn test_unknown_opcodes() {
        assert_eq!(QOp::try_from(0).unwrap(), QOp::Mov);
        let err = QOp::try_from(QOp::ALL.len() as u32).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Internal);

        let err = "frobnicate".parse::<QOp>().unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownOpcode {
                name: "frobnicate".into()
            }
        );
    }

    #[test]
    fn test_hazard_classes() {
        assert!(QOp::Rcp.writes_r4());
        assert!(QOp::TexResult.writes_r4());
        assert!(!QOp::FAdd.writes_r4());
        assert!(QOp::R4UnpackC.reads_r4());
        assert!(QOp::SelXYNs.reads_flags());
        assert!(QOp::Sf.writes_flags());
        assert!(QOp::TlbColorWrite.has_side_effects());
        assert!(!QOp::Sf.has_side_effects());
    }

    #[test]
    fn test_alu_mapping() {
        assert_eq!(QOp::FMul.alu(), Some(AluOp::Mul(OpMul::FMul)));
        assert_eq!(QOp::Shl.alu(), Some(AluOp::Add(OpAdd::Shl)));
        assert_eq!(QOp::Mov.alu(), None);
        assert_eq!(QOp::Cmp.alu(), None);
    }
}
