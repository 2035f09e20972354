// This module emits the fixed QIR sequences every shader stage begins or ends with. On the
// vertex side that is reading attributes out of the VPM and writing the clip-space
// position back as scaled and packed screen coordinates, depth and 1/W, followed by the
// varyings (the coordinate shader writes raw position first). On the fragment side it
// covers reading varyings and the fragment coordinate, sampling textures through the
// TMU (including rect scaling, bias, projection and shadow comparison), kill, and the
// end-of-shader tile buffer write: reading the destination colour when blending or a
// colour mask needs it, evaluating the blend equation in shader code since the hardware
// has no blender, applying the mask and the render target's channel swizzle, setting up
// discard, passing depth through and packing the four channels into one TLB write.

//! Stage entry and exit sequences.

use super::{QOp, QReg, ShaderIr, UniformContents};

/// Channel selector used by format and texture swizzles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swizzle {
    X,
    Y,
    Z,
    W,
    Zero,
    One,
}

impl Swizzle {
    pub const IDENTITY: [Swizzle; 4] = [Swizzle::X, Swizzle::Y, Swizzle::Z, Swizzle::W];
    /// Channel order of BGRA8888 render targets.
    pub const BGRA: [Swizzle; 4] = [Swizzle::Z, Swizzle::Y, Swizzle::X, Swizzle::W];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    One,
    Zero,
    SrcColor,
    SrcAlpha,
    DstAlpha,
    DstColor,
    SrcAlphaSaturate,
    ConstColor,
    ConstAlpha,
    InvSrcColor,
    InvSrcAlpha,
    InvDstAlpha,
    InvDstColor,
    InvConstColor,
    InvConstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFunc {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub enable: bool,
    pub rgb_func: BlendFunc,
    pub rgb_src_factor: BlendFactor,
    pub rgb_dst_factor: BlendFactor,
    pub alpha_func: BlendFunc,
    pub alpha_src_factor: BlendFactor,
    pub alpha_dst_factor: BlendFactor,
    /// Bit `i` enables writes of channel `i`.
    pub colormask: u8,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enable: false,
            rgb_func: BlendFunc::Add,
            rgb_src_factor: BlendFactor::One,
            rgb_dst_factor: BlendFactor::Zero,
            alpha_func: BlendFunc::Add,
            alpha_src_factor: BlendFactor::One,
            alpha_dst_factor: BlendFactor::Zero,
            colormask: 0xf,
        }
    }
}

/// Render state the fragment epilogue depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentKey {
    pub blend: BlendState,
    /// Swizzle from RGBA to the render target's channel order.
    pub color_swizzle: [Swizzle; 4],
    pub depth_enabled: bool,
}

impl Default for FragmentKey {
    fn default() -> Self {
        Self {
            blend: BlendState::default(),
            color_swizzle: Swizzle::BGRA,
            depth_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LEqual,
    Greater,
    NotEqual,
    GEqual,
    Always,
}

/// One texture lookup.
#[derive(Debug, Clone, Copy)]
pub struct TexRequest {
    pub unit: u32,
    pub s: QReg,
    pub t: QReg,
    /// LOD bias (TXB).
    pub bias: Option<QReg>,
    /// Projective divisor (TXP).
    pub projector: Option<QReg>,
    /// Unnormalized rectangle coordinates.
    pub rect: bool,
    /// Depth texture: the reference value and compare function, if shadow
    /// comparison is enabled.
    pub depth: Option<(QReg, Option<CompareFunc>)>,
}

impl TexRequest {
    pub fn new(unit: u32, s: QReg, t: QReg) -> Self {
        Self {
            unit,
            s,
            t,
            bias: None,
            projector: None,
            rect: false,
            depth: None,
        }
    }
}

impl ShaderIr {
    /// Pick `swiz` out of `channels`, materializing constant 0/1.
    pub fn swizzled_channel(&mut self, channels: &[QReg; 4], swiz: Swizzle) -> QReg {
        match swiz {
            Swizzle::X => channels[0],
            Swizzle::Y => channels[1],
            Swizzle::Z => channels[2],
            Swizzle::W => channels[3],
            Swizzle::Zero => self.uniform_f(0.0),
            Swizzle::One => self.uniform_f(1.0),
        }
    }

    /// Read `attrs` four-component vertex attributes from the VPM.
    pub fn emit_vertex_inputs(&mut self, attrs: usize) -> Vec<[QReg; 4]> {
        (0..attrs)
            .map(|_| {
                let mut comps = [QReg::NULL; 4];
                for c in comps.iter_mut() {
                    *c = self.alu(QOp::VpmRead, &[]);
                    self.num_inputs += 1;
                }
                comps
            })
            .collect()
    }

    /// Interpolated varying component `index`.
    pub fn emit_fragment_varying(&mut self, index: u32) -> QReg {
        let vary = self.mov(QReg::vary(index));
        self.vary_add_c(vary)
    }

    /// Four components of fragment input attribute `attr`.
    pub fn emit_fragment_input(&mut self, attr: u32) -> [QReg; 4] {
        let mut comps = [QReg::NULL; 4];
        for (i, c) in comps.iter_mut().enumerate() {
            *c = self.emit_fragment_varying(attr * 4 + i as u32);
            self.num_inputs += 1;
        }
        comps
    }

    /// gl_FragCoord: pixel x and y, normalized z, and 1/w.
    pub fn emit_fragcoord_input(&mut self) -> [QReg; 4] {
        let x = self.alu(QOp::FragX, &[]);
        let y = self.alu(QOp::FragY, &[]);
        let z = self.alu(QOp::FragZ, &[]);
        let scale = self.uniform_f(1.0 / 0xffffff as f32);
        let z = self.fmul(z, scale);
        let w = self.alu(QOp::FragRcpW, &[]);
        [x, y, z, w]
    }

    /// Kill the fragment if `cond` is negative. Returns the updated discard
    /// value to pass to [`ShaderIr::emit_frag_end`].
    pub fn discard_if(&mut self, discard: Option<QReg>, cond: QReg) -> QReg {
        let discard = match discard {
            Some(d) => d,
            None => self.uniform_f(0.0),
        };
        self.sf(cond);
        let one = self.uniform_f(1.0);
        self.sel_x_y_ns(one, discard)
    }

    /// Sample a texture and return the four unpacked channels.
    pub fn emit_tex(&mut self, req: &TexRequest) -> [QReg; 4] {
        let unit = req.unit;
        let (mut s, mut t) = (req.s, req.t);

        let proj = req.projector.map(|p| self.rcp(p));
        if let Some(proj) = proj {
            s = self.fmul(s, proj);
            t = self.fmul(t, proj);
        }

        if req.rect {
            let sx = self.uniform_temp(UniformContents::TexrectScaleX, unit);
            let sy = self.uniform_temp(UniformContents::TexrectScaleY, unit);
            s = self.fmul(s, sx);
            t = self.fmul(t, sy);
        }

        let p0 = self.add_uniform(UniformContents::TextureConfigP0, unit);
        self.emit_void(QOp::TexT, &[t, p0]);

        let p1 = self.add_uniform(UniformContents::TextureConfigP1, unit);
        match req.bias {
            Some(bias) => {
                self.emit_void(QOp::TexB, &[bias, p1]);
                let zero = self.add_uniform(UniformContents::Constant, 0);
                self.emit_void(QOp::TexS, &[s, zero]);
            }
            None => self.emit_void(QOp::TexS, &[s, p1]),
        }

        self.num_texture_samples += 1;
        let r4 = self.alu(QOp::TexResult, &[]);

        match req.depth {
            Some((compare, func)) => {
                let eight = self.uniform_ui(8);
                let depth = self.shr(r4, eight);
                let depthf = self.itof(depth);
                let scale = self.uniform_f(1.0 / 0xffffff as f32);
                let normalized = self.fmul(depthf, scale);

                let compare = match proj {
                    Some(proj) => self.fmul(compare, proj),
                    None => compare,
                };
                let out = match func {
                    Some(func) => self.depth_compare(func, compare, normalized),
                    None => normalized,
                };
                [out; 4]
            }
            None => [
                self.alu(QOp::R4UnpackA, &[r4]),
                self.alu(QOp::R4UnpackB, &[r4]),
                self.alu(QOp::R4UnpackC, &[r4]),
                self.alu(QOp::R4UnpackD, &[r4]),
            ],
        }
    }

    fn depth_compare(&mut self, func: CompareFunc, compare: QReg, depth: QReg) -> QReg {
        let one = self.uniform_f(1.0);
        match func {
            CompareFunc::Never => self.uniform_f(0.0),
            CompareFunc::Always => one,
            CompareFunc::Equal | CompareFunc::NotEqual | CompareFunc::Greater | CompareFunc::Less => {
                let diff = self.fsub(compare, depth);
                self.sf(diff);
                match func {
                    CompareFunc::Equal => self.sel_x_0_zs(one),
                    CompareFunc::NotEqual => self.sel_x_0_zc(one),
                    CompareFunc::Greater => self.sel_x_0_nc(one),
                    _ => self.sel_x_0_ns(one),
                }
            }
            CompareFunc::GEqual | CompareFunc::LEqual => {
                let diff = self.fsub(depth, compare);
                self.sf(diff);
                if func == CompareFunc::GEqual {
                    self.sel_x_0_ns(one)
                } else {
                    self.sel_x_0_nc(one)
                }
            }
        }
    }

    fn blend_channel(
        &mut self,
        dst: &[QReg; 4],
        src: &[QReg; 4],
        val: QReg,
        factor: BlendFactor,
        channel: usize,
    ) -> QReg {
        match factor {
            BlendFactor::One => val,
            BlendFactor::Zero => self.uniform_f(0.0),
            BlendFactor::SrcColor => self.fmul(val, src[channel]),
            BlendFactor::SrcAlpha => self.fmul(val, src[3]),
            BlendFactor::DstAlpha => self.fmul(val, dst[3]),
            BlendFactor::DstColor => self.fmul(val, dst[channel]),
            BlendFactor::SrcAlphaSaturate => {
                let one = self.uniform_f(1.0);
                let inv = self.fsub(one, dst[3]);
                let f = self.fmin(src[3], inv);
                self.fmul(val, f)
            }
            BlendFactor::ConstColor | BlendFactor::ConstAlpha => {
                let c = if factor == BlendFactor::ConstAlpha { 3 } else { channel };
                let k = self.uniform_temp(UniformContents::BlendConstColor, c as u32);
                self.fmul(val, k)
            }
            BlendFactor::InvSrcColor
            | BlendFactor::InvSrcAlpha
            | BlendFactor::InvDstAlpha
            | BlendFactor::InvDstColor
            | BlendFactor::InvConstColor
            | BlendFactor::InvConstAlpha => {
                let f = match factor {
                    BlendFactor::InvSrcColor => src[channel],
                    BlendFactor::InvSrcAlpha => src[3],
                    BlendFactor::InvDstAlpha => dst[3],
                    BlendFactor::InvDstColor => dst[channel],
                    BlendFactor::InvConstColor => {
                        self.uniform_temp(UniformContents::BlendConstColor, channel as u32)
                    }
                    _ => self.uniform_temp(UniformContents::BlendConstColor, 3),
                };
                let one = self.uniform_f(1.0);
                let inv = self.fsub(one, f);
                self.fmul(val, inv)
            }
        }
    }

    fn blend_func(&mut self, src: QReg, dst: QReg, func: BlendFunc) -> QReg {
        match func {
            BlendFunc::Add => self.fadd(src, dst),
            BlendFunc::Subtract => self.fsub(src, dst),
            BlendFunc::ReverseSubtract => self.fsub(dst, src),
            BlendFunc::Min => self.fmin(src, dst),
            BlendFunc::Max => self.fmax(src, dst),
        }
    }

    fn blend(&mut self, blend: &BlendState, dst: &[QReg; 4], src: &[QReg; 4]) -> [QReg; 4] {
        if !blend.enable {
            return *src;
        }

        let mut result = [QReg::NULL; 4];
        for (i, out) in result.iter_mut().enumerate() {
            let (func, src_factor, dst_factor) = if i < 3 {
                (blend.rgb_func, blend.rgb_src_factor, blend.rgb_dst_factor)
            } else {
                (blend.alpha_func, blend.alpha_src_factor, blend.alpha_dst_factor)
            };
            let s = self.blend_channel(dst, src, src[i], src_factor, i);
            let d = self.blend_channel(dst, src, dst[i], dst_factor, i);
            *out = self.blend_func(s, d, func);
        }
        result
    }

    /// Fragment shader epilogue. `color` holds the RGBA output channels;
    /// channels left `None` are written as zero.
    pub fn emit_frag_end(
        &mut self,
        key: &FragmentKey,
        color: [Option<QReg>; 4],
        discard: Option<QReg>,
    ) {
        let needs_dst = key.blend.enable || key.blend.colormask != 0xf;
        let color_written = color.iter().any(Option::is_some);

        let mut dst_color = [QReg::NULL; 4];
        if needs_dst {
            let r4 = self.alu(QOp::TlbColorRead, &[]);
            let tlb = [
                self.alu(QOp::R4UnpackA, &[r4]),
                self.alu(QOp::R4UnpackB, &[r4]),
                self.alu(QOp::R4UnpackC, &[r4]),
                self.alu(QOp::R4UnpackD, &[r4]),
            ];
            for (i, d) in dst_color.iter_mut().enumerate() {
                *d = self.swizzled_channel(&tlb, key.color_swizzle[i]);
            }
        }

        let mut src_color = [QReg::NULL; 4];
        for (i, c) in src_color.iter_mut().enumerate() {
            *c = match color[i] {
                Some(reg) => reg,
                None => self.uniform_f(0.0),
            };
        }

        let mut blended = self.blend(&key.blend, &dst_color, &src_color);
        for (i, b) in blended.iter_mut().enumerate() {
            if key.blend.colormask & (1 << i) == 0 {
                *b = dst_color[i];
            }
        }

        let mut swizzled = [QReg::NULL; 4];
        for (i, s) in swizzled.iter_mut().enumerate() {
            *s = self.swizzled_channel(&blended, key.color_swizzle[i]);
        }

        if let Some(discard) = discard {
            self.emit_void(QOp::TlbDiscardSetup, &[discard]);
        }

        if key.depth_enabled {
            self.emit_void(QOp::TlbPassthroughZWrite, &[]);
        }

        let packed = if color_written || needs_dst {
            self.alu(QOp::PackColors, &swizzled)
        } else {
            self.uniform_ui(0)
        };
        self.emit_void(QOp::TlbColorWrite, &[packed]);
    }

    fn emit_scaled_viewport_write(&mut self, position: &[QReg; 4], rcp_w: QReg) {
        let mut xyi = [QReg::NULL; 2];
        for (i, out) in xyi.iter_mut().enumerate() {
            let contents = if i == 0 {
                UniformContents::ViewportXScale
            } else {
                UniformContents::ViewportYScale
            };
            let scale = self.add_uniform(contents, 0);
            let scaled = self.fmul(position[i], scale);
            let projected = self.fmul(scaled, rcp_w);
            *out = self.ftoi(projected);
        }
        let packed = self.pack_scaled(xyi[0], xyi[1]);
        self.emit_void(QOp::VpmWrite, &[packed]);
    }

    fn emit_zs_write(&mut self, position: &[QReg; 4], rcp_w: QReg) {
        let zscale = self.add_uniform(UniformContents::ViewportZScale, 0);
        let zoffset = self.add_uniform(UniformContents::ViewportZOffset, 0);
        let z = self.fmul(position[2], zscale);
        let z = self.fadd(z, zoffset);
        let z = self.fmul(z, rcp_w);
        self.emit_void(QOp::VpmWrite, &[z]);
    }

    fn emit_position_tail(&mut self, position: &[QReg; 4], rcp_w: QReg) {
        self.emit_scaled_viewport_write(position, rcp_w);
        self.emit_zs_write(position, rcp_w);
        self.emit_void(QOp::VpmWrite, &[rcp_w]);
    }

    /// Vertex shader epilogue. `outputs[0..4]` is the clip position; the rest
    /// are varyings written in order.
    pub fn emit_vert_end(&mut self, outputs: &[QReg]) {
        let position = position_of(outputs);
        let rcp_w = self.rcp(position[3]);
        self.emit_position_tail(&position, rcp_w);
        for out in outputs.iter().skip(4) {
            self.emit_void(QOp::VpmWrite, &[*out]);
        }
    }

    /// Coordinate shader epilogue: raw position, then the screen-space block.
    pub fn emit_coord_end(&mut self, outputs: &[QReg]) {
        let position = position_of(outputs);
        let rcp_w = self.rcp(position[3]);
        for out in position {
            self.emit_void(QOp::VpmWrite, &[out]);
        }
        self.emit_position_tail(&position, rcp_w);
    }
}

fn position_of(outputs: &[QReg]) -> [QReg; 4] {
    let mut position = [QReg::NULL; 4];
    for (p, out) in position.iter_mut().zip(outputs) {
        *p = *out;
    }
    position
}
