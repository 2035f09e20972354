// This module is the QIR data model: the straight-line intermediate representation the
// backend consumes. A QReg names a value by file (null, temporary, varying, uniform) and
// index; a QInst is an opcode, a destination and up to four sources, of which only the
// first nsrc are meaningful; a ShaderIr owns one stage's instruction list together with
// the temporary count, the uniform table (what each uniform slot is filled with at draw
// time), the vertex input count and the number of texture samples. validate() checks the
// shape rules from the opcode table before anything downstream relies on them, and the
// Display impls print the same text format the parser reads.

//! Straight-line shader IR.

pub mod builder;
pub mod epilogue;
pub mod list;
pub mod op;
pub mod parser;

use std::fmt;

use hashbrown::HashMap;

use crate::core::{CompileError, CompileResult};

pub use list::{InstId, InstList};
pub use op::{AluOp, OpInfo, QOp};
pub use parser::parse_qir;

/// Register file of a QIR operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QFile {
    Null,
    Temp,
    Vary,
    Unif,
}

/// A QIR operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QReg {
    pub file: QFile,
    pub index: u32,
}

impl QReg {
    pub const NULL: QReg = QReg {
        file: QFile::Null,
        index: 0,
    };

    pub const fn temp(index: u32) -> Self {
        Self {
            file: QFile::Temp,
            index,
        }
    }

    pub const fn unif(index: u32) -> Self {
        Self {
            file: QFile::Unif,
            index,
        }
    }

    pub const fn vary(index: u32) -> Self {
        Self {
            file: QFile::Vary,
            index,
        }
    }

    pub fn is_temp(&self) -> bool {
        self.file == QFile::Temp
    }

    pub fn is_null(&self) -> bool {
        self.file == QFile::Null
    }
}

impl fmt::Display for QReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file {
            QFile::Null => write!(f, "_"),
            QFile::Temp => write!(f, "t{}", self.index),
            QFile::Vary => write!(f, "v{}", self.index),
            QFile::Unif => write!(f, "u{}", self.index),
        }
    }
}

/// One QIR instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QInst {
    pub op: QOp,
    pub dst: QReg,
    pub src: [QReg; 4],
}

impl QInst {
    /// Build an instruction; unused source slots are null.
    pub fn new(op: QOp, dst: QReg, srcs: &[QReg]) -> Self {
        let mut src = [QReg::NULL; 4];
        for (slot, reg) in src.iter_mut().zip(srcs) {
            *slot = *reg;
        }
        Self { op, dst, src }
    }

    /// The sources this opcode reads.
    pub fn srcs(&self) -> &[QReg] {
        &self.src[..self.op.nsrc()]
    }

    pub fn srcs_mut(&mut self) -> &mut [QReg] {
        let n = self.op.nsrc();
        &mut self.src[..n]
    }
}

impl fmt::Display for QInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op.info().ndst > 0 {
            write!(f, "{} = ", self.dst)?;
        }
        write!(f, "{}", self.op)?;
        for (i, src) in self.srcs().iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, src)?;
        }
        Ok(())
    }
}

/// Shader stage being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QStage {
    Vert,
    Coord,
    Frag,
}

impl QStage {
    pub fn name(self) -> &'static str {
        match self {
            QStage::Vert => "vert",
            QStage::Coord => "coord",
            QStage::Frag => "frag",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "vert" => Some(QStage::Vert),
            "coord" => Some(QStage::Coord),
            "frag" => Some(QStage::Frag),
            _ => None,
        }
    }
}

/// What the driver loads into a uniform slot at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformContents {
    /// `data` is the literal bit pattern.
    Constant,
    /// `data` indexes the user-supplied uniform array.
    Uniform,
    ViewportXScale,
    ViewportYScale,
    ViewportZScale,
    ViewportZOffset,
    /// `data` is the texture unit.
    TextureConfigP0,
    TextureConfigP1,
    TexrectScaleX,
    TexrectScaleY,
    /// `data` is the colour channel.
    BlendConstColor,
}

impl UniformContents {
    const NAMES: [(UniformContents, &'static str); 11] = [
        (UniformContents::Constant, "const"),
        (UniformContents::Uniform, "user"),
        (UniformContents::ViewportXScale, "viewport_x_scale"),
        (UniformContents::ViewportYScale, "viewport_y_scale"),
        (UniformContents::ViewportZScale, "viewport_z_scale"),
        (UniformContents::ViewportZOffset, "viewport_z_offset"),
        (UniformContents::TextureConfigP0, "texture_config_p0"),
        (UniformContents::TextureConfigP1, "texture_config_p1"),
        (UniformContents::TexrectScaleX, "texrect_scale_x"),
        (UniformContents::TexrectScaleY, "texrect_scale_y"),
        (UniformContents::BlendConstColor, "blend_const_color"),
    ];

    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(c, _)| *c == self)
            .map(|(_, n)| *n)
            .unwrap_or("?")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES.iter().find(|(_, n)| *n == name).map(|(c, _)| *c)
    }
}

/// Uniform slots in the order the shader reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformInfo {
    pub contents: Vec<UniformContents>,
    pub data: Vec<u32>,
}

impl UniformInfo {
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn push(&mut self, contents: UniformContents, data: u32) -> u32 {
        self.contents.push(contents);
        self.data.push(data);
        (self.contents.len() - 1) as u32
    }

    pub fn get(&self, index: u32) -> Option<(UniformContents, u32)> {
        let i = index as usize;
        Some((*self.contents.get(i)?, *self.data.get(i)?))
    }
}

/// One shader stage in QIR form.
#[derive(Debug, Clone)]
pub struct ShaderIr {
    pub stage: QStage,
    pub instructions: InstList,
    pub num_temps: u32,
    pub uniforms: UniformInfo,
    /// Number of 32-bit vertex attribute components read from the VPM.
    pub num_inputs: u32,
    pub num_texture_samples: u32,
    uniform_temps: HashMap<(UniformContents, u32), QReg>,
}

impl ShaderIr {
    pub fn new(stage: QStage) -> Self {
        Self {
            stage,
            instructions: InstList::new(),
            num_temps: 0,
            uniforms: UniformInfo::default(),
            num_inputs: 0,
            num_texture_samples: 0,
            uniform_temps: HashMap::new(),
        }
    }

    /// Allocate a fresh temporary.
    pub fn get_temp(&mut self) -> QReg {
        let reg = QReg::temp(self.num_temps);
        self.num_temps += 1;
        reg
    }

    pub fn emit(&mut self, inst: QInst) -> InstId {
        self.instructions.push_back(inst)
    }

    /// Append a uniform slot and return the operand that reads it.
    pub fn add_uniform(&mut self, contents: UniformContents, data: u32) -> QReg {
        QReg::unif(self.uniforms.push(contents, data))
    }

    /// Check every instruction against the opcode table.
    pub fn validate(&self) -> CompileResult<()> {
        for (ip, inst) in self.instructions.iter().enumerate() {
            let malformed = |reason: String| CompileError::MalformedIr { inst: ip, reason };
            let info = inst.op.info();

            match (info.ndst, inst.dst.file) {
                (0, QFile::Null) => {}
                (1, QFile::Temp) if inst.dst.index < self.num_temps => {}
                _ => {
                    return Err(malformed(format!(
                        "{} cannot write {}",
                        info.name, inst.dst
                    )))
                }
            }

            for (i, src) in inst.srcs().iter().enumerate() {
                let ok = match src.file {
                    QFile::Null => false,
                    QFile::Temp => src.index < self.num_temps,
                    QFile::Unif => (src.index as usize) < self.uniforms.len(),
                    QFile::Vary => true,
                };
                if !ok {
                    return Err(malformed(format!(
                        "source {} of {} is out of range: {}",
                        i, info.name, src
                    )));
                }
            }

            match inst.op {
                QOp::TexS | QOp::TexT | QOp::TexR | QOp::TexB
                    if inst.src[1].file != QFile::Unif =>
                {
                    return Err(malformed(format!(
                        "{} needs a texture config uniform, got {}",
                        info.name, inst.src[1]
                    )));
                }
                QOp::R4UnpackA | QOp::R4UnpackB | QOp::R4UnpackC | QOp::R4UnpackD
                    if !inst.src[0].is_temp() =>
                {
                    return Err(malformed(format!(
                        "{} must unpack a temporary held in r4",
                        info.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for ShaderIr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "stage {}", self.stage.name())?;
        if self.num_inputs > 0 {
            writeln!(f, "inputs {}", self.num_inputs)?;
        }
        if self.num_texture_samples > 0 {
            writeln!(f, "samples {}", self.num_texture_samples)?;
        }
        for (contents, data) in self.uniforms.contents.iter().zip(&self.uniforms.data) {
            writeln!(f, "uniform {} {:#x}", contents.name(), data)?;
        }
        for inst in &self.instructions {
            writeln!(f, "{}", inst)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_srcs_respects_arity() {
        let mut inst = QInst::new(QOp::Mov, QReg::temp(1), &[QReg::temp(0)]);
        inst.src[1] = QReg::temp(99);
        inst.src[3] = QReg::vary(7);
        assert_eq!(inst.srcs(), &[QReg::temp(0)]);
        assert_eq!(inst.to_string(), "t1 = mov t0");
    }

    #[test]
    fn test_display_without_dst() {
        let inst = QInst::new(QOp::TlbColorWrite, QReg::NULL, &[QReg::temp(4)]);
        assert_eq!(inst.to_string(), "tlb_color_write t4");
        let inst = QInst::new(QOp::TlbPassthroughZWrite, QReg::NULL, &[]);
        assert_eq!(inst.to_string(), "tlb_passthrough_z_write");
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let mut ir = ShaderIr::new(QStage::Frag);
        let t = ir.get_temp();
        ir.emit(QInst::new(QOp::Mov, t, &[QReg::unif(0)]));
        let err = ir.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let mut ir = ShaderIr::new(QStage::Frag);
        let u = ir.add_uniform(UniformContents::Constant, 0);
        ir.emit(QInst::new(QOp::VpmWrite, QReg::temp(0), &[u]));
        assert!(ir.validate().is_err());

        let mut ir = ShaderIr::new(QStage::Frag);
        let t = ir.get_temp();
        ir.emit(QInst::new(QOp::TexS, QReg::NULL, &[t, t]));
        assert!(ir.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let mut ir = ShaderIr::new(QStage::Frag);
        let u = ir.add_uniform(UniformContents::Constant, 0x3f80_0000);
        let t = ir.get_temp();
        ir.emit(QInst::new(QOp::Mov, t, &[u]));
        ir.emit(QInst::new(QOp::TlbColorWrite, QReg::NULL, &[t]));
        assert!(ir.validate().is_ok());
    }

    #[test]
    fn test_uniform_contents_names() {
        for (contents, name) in UniformContents::NAMES {
            assert_eq!(UniformContents::from_name(name), Some(contents));
            assert_eq!(contents.name(), name);
        }
    }
}
