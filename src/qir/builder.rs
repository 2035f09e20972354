//! Helpers for emitting QIR.
//!
//! Each ALU helper allocates a fresh temporary, appends the instruction and
//! returns the result, so shader code reads as nested expressions.

use super::{QInst, QOp, QReg, ShaderIr, UniformContents};

macro_rules! alu1 {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, a: QReg) -> QReg {
                self.alu(QOp::$op, &[a])
            }
        )*
    };
}

macro_rules! alu2 {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, a: QReg, b: QReg) -> QReg {
                self.alu(QOp::$op, &[a, b])
            }
        )*
    };
}

impl ShaderIr {
    /// Emit `op` into a new temporary.
    pub fn alu(&mut self, op: QOp, srcs: &[QReg]) -> QReg {
        let dst = self.get_temp();
        self.emit(QInst::new(op, dst, srcs));
        dst
    }

    /// Emit an instruction with no destination.
    pub fn emit_void(&mut self, op: QOp, srcs: &[QReg]) {
        self.emit(QInst::new(op, QReg::NULL, srcs));
    }

    alu1! {
        mov => Mov,
        ftoi => FToI,
        itof => IToF,
        not => Not,
        rcp => Rcp,
        rsq => Rsq,
        exp2 => Exp2,
        log2 => Log2,
        vary_add_c => VaryAddC,
        sel_x_0_zs => SelX0Zs,
        sel_x_0_zc => SelX0Zc,
        sel_x_0_ns => SelX0Ns,
        sel_x_0_nc => SelX0Nc,
    }

    alu2! {
        fadd => FAdd,
        fsub => FSub,
        fmul => FMul,
        mul24 => Mul24,
        fmin => FMin,
        fmax => FMax,
        fminabs => FMinAbs,
        fmaxabs => FMaxAbs,
        add => Add,
        sub => Sub,
        shl => Shl,
        shr => Shr,
        asr => Asr,
        min => Min,
        max => Max,
        and => And,
        or => Or,
        xor => Xor,
        seq => Seq,
        sne => Sne,
        sge => Sge,
        slt => Slt,
        sel_x_y_zs => SelXYZs,
        sel_x_y_zc => SelXYZc,
        sel_x_y_ns => SelXYNs,
        sel_x_y_nc => SelXYNc,
        pack_scaled => PackScaled,
    }

    /// `cond < 0 ? a : b`
    pub fn cmp(&mut self, cond: QReg, a: QReg, b: QReg) -> QReg {
        self.alu(QOp::Cmp, &[cond, a, b])
    }

    /// Set the condition flags from `src`.
    pub fn sf(&mut self, src: QReg) {
        self.emit_void(QOp::Sf, &[src]);
    }

    /// Temporary holding the given uniform, shared by every request for the
    /// same contents and data.
    pub fn uniform_temp(&mut self, contents: UniformContents, data: u32) -> QReg {
        if let Some(reg) = self.uniform_temps.get(&(contents, data)) {
            return *reg;
        }
        let u = self.add_uniform(contents, data);
        let t = self.mov(u);
        self.uniform_temps.insert((contents, data), t);
        t
    }

    pub fn uniform_ui(&mut self, value: u32) -> QReg {
        self.uniform_temp(UniformContents::Constant, value)
    }

    pub fn uniform_f(&mut self, value: f32) -> QReg {
        self.uniform_ui(value.to_bits())
    }

    /// Fractional part: `x - floor(x)`.
    pub fn frc(&mut self, src: QReg) -> QReg {
        let trunc = self.itof_trunc(src);
        let diff = self.fsub(src, trunc);
        self.sf(diff);
        let one = self.uniform_f(1.0);
        let wrapped = self.fadd(diff, one);
        self.sel_x_y_ns(wrapped, diff)
    }

    /// Round toward negative infinity.
    pub fn flr(&mut self, src: QReg) -> QReg {
        let trunc = self.itof_trunc(src);
        // trunc rounds toward zero, so correct when trunc > src.
        let diff = self.fsub(src, trunc);
        self.sf(diff);
        let one = self.uniform_f(1.0);
        let lowered = self.fsub(trunc, one);
        self.sel_x_y_ns(lowered, trunc)
    }

    fn itof_trunc(&mut self, src: QReg) -> QReg {
        let i = self.ftoi(src);
        self.itof(i)
    }

    /// 32x32 bit integer multiply built from 24-bit multiplies.
    pub fn umul(&mut self, a: QReg, b: QReg) -> QReg {
        let sixteen = self.uniform_ui(16);
        let a_hi = self.shr(a, sixteen);
        let b_hi = self.shr(b, sixteen);

        let lo = self.mul24(a, b);
        let hi_a = self.mul24(a_hi, b);
        let hi_b = self.mul24(a, b_hi);
        let hi = self.add(hi_a, hi_b);
        let hi = self.shl(hi, sixteen);
        self.add(lo, hi)
    }
}
