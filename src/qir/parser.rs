//! Textual QIR parser.
//!
//! One directive or instruction per line, `;` starts a comment:
//!
//! ```text
//! stage frag
//! uniform const 0x3f800000
//! t0 = mov u0
//! t1 = fadd t0, v0
//! tlb_color_write t1
//! ```

use super::{QInst, QOp, QReg, QStage, ShaderIr, UniformContents};
use crate::core::{CompileError, CompileResult};

/// Largest register index accepted in text. Temp indices size per-temp tables.
const MAX_REG_INDEX: u32 = 0xffff;

pub fn parse_qir(text: &str) -> CompileResult<ShaderIr> {
    let mut ir = ShaderIr::new(QStage::Frag);
    let mut max_temp: Option<u32> = None;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let err = |reason: String| CompileError::Parse {
            line: line_no,
            reason,
        };

        let mut cur = Cursor::new(line);
        cur.skip_whitespace();
        if cur.is_eof() {
            continue;
        }

        let word = cur.read_identifier().map_err(&err)?;
        match word {
            "stage" => {
                let name = cur.read_identifier().map_err(&err)?;
                ir.stage = QStage::from_name(name)
                    .ok_or_else(|| err(format!("unknown stage '{}'", name)))?;
            }
            "inputs" => ir.num_inputs = cur.read_number().map_err(&err)?,
            "samples" => ir.num_texture_samples = cur.read_number().map_err(&err)?,
            "uniform" => {
                let kind = cur.read_identifier().map_err(&err)?;
                let contents = UniformContents::from_name(kind)
                    .ok_or_else(|| err(format!("unknown uniform kind '{}'", kind)))?;
                let data = cur.read_number().map_err(&err)?;
                ir.uniforms.push(contents, data);
            }
            _ => {
                let inst = parse_inst(&mut cur, word, line_no)?;
                for reg in std::iter::once(&inst.dst).chain(inst.srcs()) {
                    if reg.is_temp() {
                        max_temp = Some(max_temp.map_or(reg.index, |m| m.max(reg.index)));
                    }
                }
                ir.emit(inst);
            }
        }

        cur.skip_whitespace();
        if !cur.is_eof() {
            return Err(err(format!("trailing input '{}'", cur.rest())));
        }
    }

    ir.num_temps = max_temp.map_or(0, |m| m + 1);
    Ok(ir)
}

fn parse_inst(cur: &mut Cursor<'_>, first: &str, line: usize) -> CompileResult<QInst> {
    let err = |reason: String| CompileError::Parse { line, reason };

    let (dst, op_name) = if cur.try_read('=') {
        let dst = parse_reg(first).map_err(&err)?;
        (dst, cur.read_identifier().map_err(&err)?)
    } else {
        (QReg::NULL, first)
    };

    let op: QOp = op_name.parse()?;
    let info = op.info();
    if info.ndst == 0 && !dst.is_null() {
        return Err(err(format!("{} has no destination", info.name)));
    }
    if info.ndst == 1 && dst.is_null() {
        return Err(err(format!("{} needs a destination", info.name)));
    }

    let mut srcs = Vec::with_capacity(4);
    cur.skip_whitespace();
    if !cur.is_eof() {
        loop {
            let name = cur.read_identifier().map_err(&err)?;
            srcs.push(parse_reg(name).map_err(&err)?);
            if !cur.try_read(',') {
                break;
            }
        }
    }

    if srcs.len() != info.nsrc as usize {
        return Err(err(format!(
            "{} takes {} sources, got {}",
            info.name,
            info.nsrc,
            srcs.len()
        )));
    }
    Ok(QInst::new(op, dst, &srcs))
}

fn parse_reg(name: &str) -> Result<QReg, String> {
    if name == "_" {
        return Ok(QReg::NULL);
    }
    let mut chars = name.chars();
    let prefix = chars.next();
    let index: u32 = chars
        .as_str()
        .parse()
        .map_err(|_| format!("bad register '{}'", name))?;
    if index > MAX_REG_INDEX {
        return Err(format!("register index too large in '{}'", name));
    }
    match prefix {
        Some('t') => Ok(QReg::temp(index)),
        Some('u') => Ok(QReg::unif(index)),
        Some('v') => Ok(QReg::vary(index)),
        _ => Err(format!("bad register '{}'", name)),
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch == ';' {
                // Comment runs to end of line
                self.pos = self.text.len();
            } else if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn try_read(&mut self, ch: char) -> bool {
        self.skip_whitespace();
        if self.current_char() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn read_identifier(&mut self) -> Result<&'a str, String> {
        self.skip_whitespace();
        let start = self.pos;

        match self.current_char() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            Some(ch) => return Err(format!("Expected identifier but found '{}'", ch)),
            None => return Err("Expected identifier but found end of line".to_string()),
        }

        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        Ok(&self.text[start..self.pos])
    }

    fn read_number(&mut self) -> Result<u32, String> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }

        let token = &self.text[start..self.pos];
        let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => token.parse(),
        };
        parsed.map_err(|_| format!("Expected number but found '{}'", token))
    }
}
