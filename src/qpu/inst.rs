// This module builds and inspects individual QPU instruction words. QpuReg names a
// physical operand (an accumulator or an address in regfile A or B, including the magic
// peripheral addresses), and the builder functions assemble add-pipeline and
// mul-pipeline ALU words, merge an add half with a mul half into one dual-issue word,
// emit load-immediate words and NOPs, and patch condition, flag, signal and pack fields
// in place. The inspection helpers answer the questions the serializer asks: which
// register file addresses a word writes, which ones its active muxes read, and whether
// it touches r4, the SFU, the VPM or the TLB.

//! QPU instruction word builders.

use super::defines::*;

/// A physical operand: an accumulator (addr unused) or a register file address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QpuReg {
    pub mux: Mux,
    pub addr: u8,
}

impl QpuReg {
    pub const fn ra(addr: u8) -> Self {
        Self { mux: Mux::A, addr }
    }

    pub const fn rb(addr: u8) -> Self {
        Self { mux: Mux::B, addr }
    }

    /// Accumulator `rN`.
    pub const fn rn(n: u8) -> Self {
        Self {
            mux: Mux::accumulator(n),
            addr: 0,
        }
    }

    pub const fn r3() -> Self {
        Self::rn(3)
    }

    pub const fn r4() -> Self {
        Self::rn(4)
    }

    pub const fn r5() -> Self {
        Self::rn(5)
    }

    pub const fn unif() -> Self {
        Self::ra(R_UNIF)
    }

    pub const fn vary() -> Self {
        Self::ra(R_VARY)
    }

    pub const fn nop() -> Self {
        Self::ra(W_NOP)
    }

    pub const fn vr_setup() -> Self {
        Self::ra(W_VPMVCD_SETUP)
    }

    pub const fn vw_setup() -> Self {
        Self::rb(W_VPMVCD_SETUP)
    }

    pub const fn tlb_color_all() -> Self {
        Self::ra(W_TLB_COLOR_ALL)
    }

    pub const fn tlb_z() -> Self {
        Self::ra(W_TLB_Z)
    }

    pub const fn is_accumulator(&self) -> bool {
        self.mux.is_accumulator()
    }

    /// Plain register file entry (not a peripheral address).
    pub const fn is_regfile(&self) -> bool {
        matches!(self.mux, Mux::A | Mux::B) && self.addr < REGFILE_SIZE
    }

    /// Whether this operand reads the uniform or varying FIFO.
    pub const fn is_fifo_read(&self) -> bool {
        matches!(self.mux, Mux::A | Mux::B) && (self.addr == R_UNIF || self.addr == R_VARY)
    }

    /// Write address for this register on either pipeline.
    fn waddr(&self) -> u32 {
        match self.mux {
            Mux::A | Mux::B => self.addr as u32,
            Mux::R5 => W_ACC5 as u32,
            acc => {
                debug_assert!(acc != Mux::R4, "r4 is not writable by the ALUs");
                W_ACC0 as u32 + acc as u32
            }
        }
    }
}

impl std::fmt::Display for QpuReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mux {
            Mux::A => write!(f, "ra{}", self.addr),
            Mux::B => write!(f, "rb{}", self.addr),
            acc => write!(f, "r{}", acc as u32),
        }
    }
}

fn a_dst(dst: QpuReg) -> u64 {
    let mut inst = WADDR_ADD.set(0, dst.waddr());
    if dst.mux == Mux::B {
        inst = WS.set(inst, 1);
    }
    inst
}

fn m_dst(dst: QpuReg) -> u64 {
    let mut inst = WADDR_MUL.set(0, dst.waddr());
    if dst.mux == Mux::A {
        inst = WS.set(inst, 1);
    }
    inst
}

fn set_src_raddr(inst: u64, src: QpuReg) -> u64 {
    match src.mux {
        Mux::A => {
            debug_assert!(
                RADDR_A.get(inst) == R_NOP as u32 || RADDR_A.get(inst) == src.addr as u32,
                "conflicting regfile A reads"
            );
            RADDR_A.set(inst, src.addr as u32)
        }
        Mux::B => {
            debug_assert!(
                RADDR_B.get(inst) == R_NOP as u32 || RADDR_B.get(inst) == src.addr as u32,
                "conflicting regfile B reads"
            );
            RADDR_B.set(inst, src.addr as u32)
        }
        _ => inst,
    }
}

/// A word with every field in its idle state.
fn idle() -> u64 {
    let mut inst = SIG.set(0, Sig::None as u32);
    inst = OP_ADD.set(inst, OpAdd::Nop as u32);
    inst = OP_MUL.set(inst, OpMul::Nop as u32);
    inst = WADDR_ADD.set(inst, W_NOP as u32);
    inst = WADDR_MUL.set(inst, W_NOP as u32);
    inst = RADDR_A.set(inst, R_NOP as u32);
    RADDR_B.set(inst, R_NOP as u32)
}

pub fn nop() -> u64 {
    idle()
}

/// Add pipeline operation `dst = op(src0, src1)`.
pub fn a_alu2(op: OpAdd, dst: QpuReg, src0: QpuReg, src1: QpuReg) -> u64 {
    let mut inst = idle();
    inst = OP_ADD.set(inst, op as u32);
    inst = WADDR_ADD.set(inst, 0) | a_dst(dst);
    inst = COND_ADD.set(inst, Cond::Always as u32);
    inst = ADD_A.set(inst, src0.mux as u32);
    inst = set_src_raddr(inst, src0);
    inst = ADD_B.set(inst, src1.mux as u32);
    set_src_raddr(inst, src1)
}

/// Mul pipeline operation `dst = op(src0, src1)`.
pub fn m_alu2(op: OpMul, dst: QpuReg, src0: QpuReg, src1: QpuReg) -> u64 {
    let mut inst = idle();
    inst = OP_MUL.set(inst, op as u32);
    inst = WADDR_MUL.set(inst, 0) | m_dst(dst);
    inst = COND_MUL.set(inst, Cond::Always as u32);
    inst = MUL_A.set(inst, src0.mux as u32);
    inst = set_src_raddr(inst, src0);
    inst = MUL_B.set(inst, src1.mux as u32);
    set_src_raddr(inst, src1)
}

pub fn a_mov(dst: QpuReg, src: QpuReg) -> u64 {
    a_alu2(OpAdd::Or, dst, src, src)
}

pub fn m_mov(dst: QpuReg, src: QpuReg) -> u64 {
    m_alu2(OpMul::V8Min, dst, src, src)
}

/// Combine an add-pipeline word with a mul-pipeline word.
pub fn merge(add: u64, mul: u64) -> u64 {
    let mut inst = add;
    for field in [OP_MUL, WADDR_MUL, COND_MUL, MUL_A, MUL_B] {
        inst = field.set(inst, field.get(mul));
    }

    if SIG.get(add) == Sig::None as u32 {
        inst = SIG.set(inst, SIG.get(mul));
    } else {
        debug_assert!(SIG.get(mul) == Sig::None as u32, "both halves carry a signal");
    }

    for field in [RADDR_A, RADDR_B] {
        if field.get(add) == R_NOP as u32 {
            inst = field.set(inst, field.get(mul));
        } else {
            debug_assert!(
                field.get(mul) == R_NOP as u32 || field.get(mul) == field.get(add),
                "both halves read different addresses from one file"
            );
        }
    }

    for field in [WS, SF, PM, PACK, UNPACK] {
        inst = field.set(inst, field.get(add) | field.get(mul));
    }
    inst
}

/// Load the 32-bit immediate `value` into `dst`.
pub fn load_imm_ui(dst: QpuReg, value: u32) -> u64 {
    let mut inst = idle();
    inst = SIG.set(inst, Sig::LoadImm as u32);
    inst = WADDR_ADD.set(inst, 0) | a_dst(dst);
    inst = COND_ADD.set(inst, Cond::Always as u32);
    inst = COND_MUL.set(inst, Cond::Never as u32);
    LOAD_IMM.set(inst, value)
}

pub fn load_imm_f(dst: QpuReg, value: f32) -> u64 {
    load_imm_ui(dst, value.to_bits())
}

pub fn set_sig(inst: u64, sig: Sig) -> u64 {
    SIG.set(inst, sig as u32)
}

pub fn set_cond_add(inst: u64, cond: Cond) -> u64 {
    COND_ADD.set(inst, cond as u32)
}

pub fn set_cond_mul(inst: u64, cond: Cond) -> u64 {
    COND_MUL.set(inst, cond as u32)
}

pub fn set_sf(inst: u64) -> u64 {
    SF.set(inst, 1)
}

/// Set the regfile A pack mode of an add-pipeline result.
pub fn set_pack(inst: u64, pack: Pack) -> u64 {
    PACK.set(inst, pack as u32)
}

/// Set a mul-pipeline pack mode (PM set).
pub fn set_mul_pack(inst: u64, pack: Pack) -> u64 {
    PM.set(PACK.set(inst, pack as u32), 1)
}

/// Unpack r4 on read (PM set).
pub fn set_r4_unpack(inst: u64, unpack: Unpack) -> u64 {
    PM.set(UNPACK.set(inst, unpack as u32), 1)
}

pub fn sig(inst: u64) -> u32 {
    SIG.get(inst)
}

/// Whether the word carries any signal other than "none".
pub fn has_signal(inst: u64) -> bool {
    SIG.get(inst) != Sig::None as u32
}

pub fn is_load_imm(inst: u64) -> bool {
    SIG.get(inst) == Sig::LoadImm as u32
}

/// Register file A and B write addresses, taking the WS swap into account.
pub fn regfile_waddrs(inst: u64) -> (u8, u8) {
    let add = WADDR_ADD.get(inst) as u8;
    let mul = WADDR_MUL.get(inst) as u8;
    if WS.get(inst) != 0 {
        (mul, add)
    } else {
        (add, mul)
    }
}

/// Whether either pipeline writes the given peripheral address.
pub fn writes_addr(inst: u64, addr: u8) -> bool {
    WADDR_ADD.get(inst) == addr as u32 || WADDR_MUL.get(inst) == addr as u32
}

/// Input muxes that the word actually consumes.
pub fn active_muxes(inst: u64) -> Vec<Mux> {
    let mut muxes = Vec::with_capacity(4);
    if is_load_imm(inst) {
        return muxes;
    }
    if OP_ADD.get(inst) != OpAdd::Nop as u32 {
        muxes.push(Mux::from_bits(ADD_A.get(inst)));
        muxes.push(Mux::from_bits(ADD_B.get(inst)));
    }
    if OP_MUL.get(inst) != OpMul::Nop as u32 {
        muxes.push(Mux::from_bits(MUL_A.get(inst)));
        muxes.push(Mux::from_bits(MUL_B.get(inst)));
    }
    muxes
}

/// The regfile A and B addresses the word reads through its active muxes.
pub fn regfile_raddrs(inst: u64) -> (Option<u8>, Option<u8>) {
    let muxes = active_muxes(inst);
    let a = muxes
        .contains(&Mux::A)
        .then(|| RADDR_A.get(inst) as u8);
    let b = muxes
        .contains(&Mux::B)
        .then(|| RADDR_B.get(inst) as u8);
    (a, b)
}

pub fn reads_r4(inst: u64) -> bool {
    active_muxes(inst).contains(&Mux::R4)
}

pub fn writes_sfu(inst: u64) -> bool {
    (W_SFU_RECIP..=W_SFU_LOG).any(|w| writes_addr(inst, w))
}

/// Whether the word causes r4 to be overwritten: an SFU write or a TMU or
/// TLB colour load.
pub fn produces_r4(inst: u64) -> bool {
    writes_sfu(inst)
        || matches!(
            SIG.get(inst),
            s if s == Sig::LoadTmu0 as u32 || s == Sig::LoadTmu1 as u32 || s == Sig::ColorLoad as u32
        )
}

/// Whether the word accesses the tile buffer.
pub fn accesses_tlb(inst: u64) -> bool {
    (W_TLB_STENCIL_SETUP..=W_TLB_ALPHA_MASK).any(|w| writes_addr(inst, w))
        || matches!(
            SIG.get(inst),
            s if s == Sig::ColorLoad as u32
                || s == Sig::ColorLoadEnd as u32
                || s == Sig::CoverageLoad as u32
                || s == Sig::AlphaMaskLoad as u32
        )
}
