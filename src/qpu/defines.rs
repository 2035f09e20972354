// This module describes the VideoCore IV QPU instruction word. It defines the bit fields
// of the 64-bit ALU instruction format, the signal, condition, pack and unpack codes, the
// add and mul pipeline opcodes, the input mux selectors, and the magic read and write
// addresses that reach peripherals (uniforms, varyings, VPM, TLB, TMU, SFU) through the
// register file address space. Only the codes the compiler emits or inspects are listed;
// values match the VideoCore IV 3D architecture reference.

//! QPU instruction encoding constants.

/// A bit field inside an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    shift: u32,
    width: u32,
}

impl Field {
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    pub const fn mask(self) -> u64 {
        (((1u128 << self.width) - 1) as u64) << self.shift
    }

    pub const fn get(self, inst: u64) -> u32 {
        ((inst & self.mask()) >> self.shift) as u32
    }

    pub const fn set(self, inst: u64, value: u32) -> u64 {
        (inst & !self.mask()) | (((value as u64) << self.shift) & self.mask())
    }
}

pub const SIG: Field = Field::new(60, 4);
pub const UNPACK: Field = Field::new(57, 3);
pub const PM: Field = Field::new(56, 1);
pub const PACK: Field = Field::new(52, 4);
pub const COND_ADD: Field = Field::new(49, 3);
pub const COND_MUL: Field = Field::new(46, 3);
pub const SF: Field = Field::new(45, 1);
pub const WS: Field = Field::new(44, 1);
pub const WADDR_ADD: Field = Field::new(38, 6);
pub const WADDR_MUL: Field = Field::new(32, 6);
pub const OP_MUL: Field = Field::new(29, 3);
pub const OP_ADD: Field = Field::new(24, 5);
pub const RADDR_A: Field = Field::new(18, 6);
pub const RADDR_B: Field = Field::new(12, 6);
pub const ADD_A: Field = Field::new(9, 3);
pub const ADD_B: Field = Field::new(6, 3);
pub const MUL_A: Field = Field::new(3, 3);
pub const MUL_B: Field = Field::new(0, 3);
pub const LOAD_IMM: Field = Field::new(0, 32);

/// Signalling bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Sig {
    None = 1,
    ProgEnd = 3,
    WaitForScoreboard = 4,
    ScoreboardUnlock = 5,
    CoverageLoad = 7,
    ColorLoad = 8,
    ColorLoadEnd = 9,
    LoadTmu0 = 10,
    LoadTmu1 = 11,
    AlphaMaskLoad = 12,
    LoadImm = 14,
}

/// Write conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Cond {
    Never = 0,
    Always = 1,
    Zs = 2,
    Zc = 3,
    Ns = 4,
    Nc = 5,
    Cs = 6,
    Cc = 7,
}

impl Cond {
    /// The condition that holds exactly when `self` does not.
    pub const fn invert(self) -> Self {
        match self {
            Cond::Never => Cond::Always,
            Cond::Always => Cond::Never,
            Cond::Zs => Cond::Zc,
            Cond::Zc => Cond::Zs,
            Cond::Ns => Cond::Nc,
            Cond::Nc => Cond::Ns,
            Cond::Cs => Cond::Cc,
            Cond::Cc => Cond::Cs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OpAdd {
    Nop = 0,
    FAdd = 1,
    FSub = 2,
    FMin = 3,
    FMax = 4,
    FMinAbs = 5,
    FMaxAbs = 6,
    FToI = 7,
    IToF = 8,
    Add = 12,
    Sub = 13,
    Shr = 14,
    Asr = 15,
    Shl = 17,
    Min = 18,
    Max = 19,
    And = 20,
    Or = 21,
    Xor = 22,
    Not = 23,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OpMul {
    Nop = 0,
    FMul = 1,
    Mul24 = 2,
    V8Min = 4,
}

/// Pack modes. With PM clear these apply to regfile A writes; with PM set
/// the byte lane modes pack the mul result into an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Pack {
    A16 = 1,
    B16 = 2,
    A8 = 4,
    B8 = 5,
    C8 = 6,
    D8 = 7,
}

impl Pack {
    /// Mul pipeline byte lane pack for channel `i` (0..4).
    pub const fn mul_8(i: usize) -> Pack {
        match i {
            0 => Pack::A8,
            1 => Pack::B8,
            2 => Pack::C8,
            _ => Pack::D8,
        }
    }
}

/// Byte lane unpack modes. With PM set the unpack applies to r4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Unpack {
    A8 = 4,
    B8 = 5,
    C8 = 6,
    D8 = 7,
}

impl Unpack {
    /// Byte lane unpack for channel `i` (0..4).
    pub const fn lane_8(i: usize) -> Unpack {
        match i {
            0 => Unpack::A8,
            1 => Unpack::B8,
            2 => Unpack::C8,
            _ => Unpack::D8,
        }
    }
}

/// ALU input mux selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum Mux {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    A = 6,
    B = 7,
}

impl Mux {
    pub const fn from_bits(bits: u32) -> Mux {
        match bits & 7 {
            0 => Mux::R0,
            1 => Mux::R1,
            2 => Mux::R2,
            3 => Mux::R3,
            4 => Mux::R4,
            5 => Mux::R5,
            6 => Mux::A,
            _ => Mux::B,
        }
    }

    pub const fn accumulator(n: u8) -> Mux {
        Mux::from_bits(n as u32)
    }

    pub const fn is_accumulator(self) -> bool {
        (self as u32) < 6
    }
}

/// Number of registers in each of the A and B files.
pub const REGFILE_SIZE: u8 = 32;

// Write addresses.
pub const W_ACC0: u8 = 32;
pub const W_ACC5: u8 = 37;
pub const W_NOP: u8 = 39;
pub const W_TLB_STENCIL_SETUP: u8 = 43;
pub const W_TLB_Z: u8 = 44;
pub const W_TLB_COLOR_ALL: u8 = 46;
pub const W_TLB_ALPHA_MASK: u8 = 47;
pub const W_VPM: u8 = 48;
/// VR_SETUP through file A, VW_SETUP through file B.
pub const W_VPMVCD_SETUP: u8 = 49;
pub const W_SFU_RECIP: u8 = 52;
pub const W_SFU_RECIPSQRT: u8 = 53;
pub const W_SFU_EXP: u8 = 54;
pub const W_SFU_LOG: u8 = 55;
pub const W_TMU0_S: u8 = 56;
pub const W_TMU0_T: u8 = 57;
pub const W_TMU0_R: u8 = 58;
pub const W_TMU0_B: u8 = 59;

// Read addresses.
pub const R_UNIF: u8 = 32;
pub const R_VARY: u8 = 35;
pub const R_NOP: u8 = 39;
pub const R_XY_PIXEL_COORD: u8 = 41;
pub const R_VPM: u8 = 48;

/// Fragment payload register: ra15 holds 1/W, rb15 holds Z.
pub const FRAG_PAYLOAD_ZW: u8 = 15;
