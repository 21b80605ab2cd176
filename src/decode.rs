//! Table-driven decoder for the 8086/80186 instruction set as emitted by
//! mid-1980s Microsoft C, including all real-mode addressing forms,
//! segment-override and repeat prefixes, and the overlay-manager trap.
//!
//! Decoding is total: unknown opcodes and truncated tails come back as
//! one-byte raw-data records instead of errors, so a range sweep always
//! covers every byte exactly once.

pub mod mnemonic;
mod modrm;
pub mod operand;

use std::fmt;

use anyhow::{anyhow, Result};

pub use mnemonic::Mnemonic;
pub use operand::{MemRef, Operand, Reg16, Reg8, SegReg, Width};

/// Software-interrupt vector claimed by the overlay manager.
pub const OVERLAY_INT: u8 = 0x3F;

const ALU_OPS: [Mnemonic; 8] = [
    Mnemonic::Add,
    Mnemonic::Or,
    Mnemonic::Adc,
    Mnemonic::Sbb,
    Mnemonic::And,
    Mnemonic::Sub,
    Mnemonic::Xor,
    Mnemonic::Cmp,
];

const SHIFT_OPS: [Mnemonic; 8] = [
    Mnemonic::Rol,
    Mnemonic::Ror,
    Mnemonic::Rcl,
    Mnemonic::Rcr,
    Mnemonic::Shl,
    Mnemonic::Shr,
    Mnemonic::Sal,
    Mnemonic::Sar,
];

const GROUP3_OPS: [Mnemonic; 8] = [
    Mnemonic::Test,
    Mnemonic::Test,
    Mnemonic::Not,
    Mnemonic::Neg,
    Mnemonic::Mul,
    Mnemonic::Imul,
    Mnemonic::Div,
    Mnemonic::Idiv,
];

const COND_JUMPS: [Mnemonic; 16] = [
    Mnemonic::Jo,
    Mnemonic::Jno,
    Mnemonic::Jb,
    Mnemonic::Jae,
    Mnemonic::Je,
    Mnemonic::Jne,
    Mnemonic::Jbe,
    Mnemonic::Ja,
    Mnemonic::Js,
    Mnemonic::Jns,
    Mnemonic::Jp,
    Mnemonic::Jnp,
    Mnemonic::Jl,
    Mnemonic::Jge,
    Mnemonic::Jle,
    Mnemonic::Jg,
];

/// Repeat prefix attached to a string primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rep {
    /// F3: unconditional repeat, or repeat-while-zero on compare/scan.
    Rep,
    /// F2: repeat-while-not-zero.
    Repnz,
}

impl fmt::Display for Rep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rep::Rep => f.write_str("rep"),
            Rep::Repnz => f.write_str("repnz"),
        }
    }
}

/// Resolved payload of an overlay-manager trap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayTarget {
    pub module: u8,
    pub entry: u16,
}

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ins {
    /// File offset where decoding began.
    pub offset: usize,
    /// Address relative to the start of the decode window.
    pub addr: usize,
    /// Total byte length, prefixes included.
    pub len: usize,
    /// The raw instruction bytes.
    pub raw: Vec<u8>,
    pub mnemonic: Mnemonic,
    pub op1: Option<Operand>,
    pub op2: Option<Operand>,
    pub rep: Option<Rep>,
    pub seg_override: Option<SegReg>,
    /// Set only on the five-byte overlay trap.
    pub overlay: Option<OverlayTarget>,
}

impl fmt::Display for Ins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rep) = self.rep {
            write!(f, "{rep} ")?;
        }
        write!(f, "{}", self.mnemonic)?;
        if let Some(op1) = &self.op1 {
            write!(f, " {op1}")?;
            if let Some(op2) = &self.op2 {
                write!(f, ", {op2}")?;
            }
        }
        Ok(())
    }
}

/// Instruction decoder over one code window.
///
/// `base` is the file offset of the window start; instruction offsets are
/// reported as `base` plus the window-relative position.
pub struct Decoder<'a> {
    data: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, base, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn u8(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| anyhow!("truncated instruction"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn s8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    fn u16(&mut self) -> Result<u16> {
        let lo = self.u8()?;
        let hi = self.u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn s16(&mut self) -> Result<i16> {
        Ok(self.u16()? as i16)
    }

    /// Resolve a relative branch: next-instruction address plus the
    /// sign-extended delta, modulo 0x10000.
    fn rel_target(&self, delta: i32) -> u16 {
        (self.pos as i64 + i64::from(delta)) as u16
    }

    /// Decode a single instruction at the cursor, or `None` at end of data.
    ///
    /// Never fails: a truncated or otherwise undecodable sequence yields a
    /// one-byte raw-data record and the cursor advances by one.
    pub fn decode_one(&mut self) -> Option<Ins> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        match self.try_decode(start) {
            Ok(ins) => Some(ins),
            Err(_) => {
                self.pos = start;
                let byte = self.data[start];
                self.pos += 1;
                Some(Ins {
                    offset: self.base + start,
                    addr: start,
                    len: 1,
                    raw: vec![byte],
                    mnemonic: Mnemonic::Db,
                    op1: Some(Operand::Imm8(byte)),
                    op2: None,
                    rep: None,
                    seg_override: None,
                    overlay: None,
                })
            }
        }
    }

    /// Decode every instruction in `[start, end)` of the window.
    pub fn decode_range(&mut self, start: usize, end: usize) -> Vec<Ins> {
        self.pos = start;
        let mut instructions = Vec::new();
        while self.pos < end {
            match self.decode_one() {
                Some(ins) => instructions.push(ins),
                None => break,
            }
        }
        instructions
    }

    /// Decode the whole window.
    pub fn decode_all(&mut self) -> Vec<Ins> {
        self.decode_range(0, self.data.len())
    }

    fn try_decode(&mut self, start: usize) -> Result<Ins> {
        let mut seg_override = None;
        let mut rep = None;
        while let Some(&byte) = self.data.get(self.pos) {
            match byte {
                0x26 => seg_override = Some(SegReg::Es),
                0x2E => seg_override = Some(SegReg::Cs),
                0x36 => seg_override = Some(SegReg::Ss),
                0x3E => seg_override = Some(SegReg::Ds),
                0xF2 => rep = Some(Rep::Repnz),
                0xF3 => rep = Some(Rep::Rep),
                // bus-lock prefix, consumed but ignored
                0xF0 => {}
                _ => break,
            }
            self.pos += 1;
        }

        let opcode = self.u8()?;
        let mut ins = Ins {
            offset: self.base + start,
            addr: start,
            len: 0,
            raw: Vec::new(),
            mnemonic: Mnemonic::Db,
            op1: None,
            op2: None,
            rep,
            seg_override,
            overlay: None,
        };
        self.dispatch(opcode, seg_override, &mut ins)?;
        ins.len = self.pos - start;
        ins.raw = self.data[start..self.pos].to_vec();
        Ok(ins)
    }

    fn dispatch(
        &mut self,
        opcode: u8,
        seg: Option<SegReg>,
        ins: &mut Ins,
    ) -> Result<()> {
        match opcode {
            // The eight ALU operations, six encodings each.
            0x00..=0x3F if opcode & 0x07 <= 0x05 => {
                ins.mnemonic = ALU_OPS[(opcode >> 3) as usize];
                match opcode & 0x07 {
                    0x00 => {
                        let m = self.modrm(Width::Byte, seg)?;
                        ins.op1 = Some(m.rm);
                        ins.op2 = Some(m.reg);
                    }
                    0x01 => {
                        let m = self.modrm(Width::Word, seg)?;
                        ins.op1 = Some(m.rm);
                        ins.op2 = Some(m.reg);
                    }
                    0x02 => {
                        let m = self.modrm(Width::Byte, seg)?;
                        ins.op1 = Some(m.reg);
                        ins.op2 = Some(m.rm);
                    }
                    0x03 => {
                        let m = self.modrm(Width::Word, seg)?;
                        ins.op1 = Some(m.reg);
                        ins.op2 = Some(m.rm);
                    }
                    0x04 => {
                        ins.op1 = Some(Operand::Reg8(Reg8::Al));
                        ins.op2 = Some(Operand::Imm8(self.u8()?));
                    }
                    _ => {
                        ins.op1 = Some(Operand::Reg16(Reg16::Ax));
                        ins.op2 = Some(Operand::Imm16(self.u16()?));
                    }
                }
            }

            0x06 | 0x0E | 0x16 | 0x1E => {
                ins.mnemonic = Mnemonic::Push;
                ins.op1 =
                    Some(Operand::Seg(SegReg::try_from((opcode >> 3) & 3)?));
            }
            0x07 | 0x17 | 0x1F => {
                ins.mnemonic = Mnemonic::Pop;
                ins.op1 =
                    Some(Operand::Seg(SegReg::try_from((opcode >> 3) & 3)?));
            }

            0x27 => ins.mnemonic = Mnemonic::Daa,
            0x2F => ins.mnemonic = Mnemonic::Das,
            0x37 => ins.mnemonic = Mnemonic::Aaa,
            0x3F => ins.mnemonic = Mnemonic::Aas,

            0x40..=0x47 => {
                ins.mnemonic = Mnemonic::Inc;
                ins.op1 = Some(Operand::Reg16(Reg16::try_from(opcode - 0x40)?));
            }
            0x48..=0x4F => {
                ins.mnemonic = Mnemonic::Dec;
                ins.op1 = Some(Operand::Reg16(Reg16::try_from(opcode - 0x48)?));
            }
            0x50..=0x57 => {
                ins.mnemonic = Mnemonic::Push;
                ins.op1 = Some(Operand::Reg16(Reg16::try_from(opcode - 0x50)?));
            }
            0x58..=0x5F => {
                ins.mnemonic = Mnemonic::Pop;
                ins.op1 = Some(Operand::Reg16(Reg16::try_from(opcode - 0x58)?));
            }

            0x60 => ins.mnemonic = Mnemonic::Pusha,
            0x61 => ins.mnemonic = Mnemonic::Popa,

            0x68 => {
                ins.mnemonic = Mnemonic::Push;
                ins.op1 = Some(Operand::Imm16(self.u16()?));
            }
            0x69 => {
                let m = self.modrm(Width::Word, seg)?;
                ins.mnemonic = Mnemonic::Imul;
                ins.op1 = Some(m.reg);
                ins.op2 = Some(Operand::Imm16(self.u16()?));
            }
            // push imm8, sign-extended to 16 bits
            0x6A => {
                ins.mnemonic = Mnemonic::Push;
                ins.op1 = Some(Operand::Imm16(self.s8()? as u16));
            }
            0x6B => {
                let m = self.modrm(Width::Word, seg)?;
                ins.mnemonic = Mnemonic::Imul;
                ins.op1 = Some(m.reg);
                ins.op2 = Some(Operand::Imm16(self.s8()? as u16));
            }

            0x70..=0x7F => {
                ins.mnemonic = COND_JUMPS[(opcode - 0x70) as usize];
                let delta = self.s8()?;
                ins.op1 = Some(Operand::Rel8(self.rel_target(delta.into())));
            }

            // Group 1: ALU r/m, imm, selected by the ModR/M reg field.
            0x80..=0x83 => {
                let wide = opcode == 0x81 || opcode == 0x83;
                let width = if wide { Width::Word } else { Width::Byte };
                let m = self.modrm(width, seg)?;
                ins.mnemonic = ALU_OPS[m.reg_field as usize];
                ins.op1 = Some(m.rm);
                ins.op2 = Some(if opcode == 0x83 {
                    Operand::Imm16(self.s8()? as u16)
                } else if wide {
                    Operand::Imm16(self.u16()?)
                } else {
                    Operand::Imm8(self.u8()?)
                });
            }

            0x84 | 0x85 => {
                let width = if opcode == 0x85 { Width::Word } else { Width::Byte };
                let m = self.modrm(width, seg)?;
                ins.mnemonic = Mnemonic::Test;
                ins.op1 = Some(m.rm);
                ins.op2 = Some(m.reg);
            }
            0x86 | 0x87 => {
                let width = if opcode == 0x87 { Width::Word } else { Width::Byte };
                let m = self.modrm(width, seg)?;
                ins.mnemonic = Mnemonic::Xchg;
                ins.op1 = Some(m.rm);
                ins.op2 = Some(m.reg);
            }

            0x88 | 0x89 => {
                let width = if opcode == 0x89 { Width::Word } else { Width::Byte };
                let m = self.modrm(width, seg)?;
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 = Some(m.rm);
                ins.op2 = Some(m.reg);
            }
            0x8A | 0x8B => {
                let width = if opcode == 0x8B { Width::Word } else { Width::Byte };
                let m = self.modrm(width, seg)?;
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 = Some(m.reg);
                ins.op2 = Some(m.rm);
            }
            0x8C => {
                let m = self.modrm(Width::Word, seg)?;
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 = Some(m.rm);
                ins.op2 =
                    Some(Operand::Seg(SegReg::try_from(m.reg_field & 3)?));
            }
            0x8D => {
                let m = self.modrm(Width::Word, seg)?;
                ins.mnemonic = Mnemonic::Lea;
                ins.op1 = Some(m.reg);
                ins.op2 = Some(m.rm);
            }
            0x8E => {
                let m = self.modrm(Width::Word, seg)?;
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 =
                    Some(Operand::Seg(SegReg::try_from(m.reg_field & 3)?));
                ins.op2 = Some(m.rm);
            }
            0x8F => {
                let m = self.modrm(Width::Word, seg)?;
                ins.mnemonic = Mnemonic::Pop;
                ins.op1 = Some(m.rm);
            }

            0x90 => ins.mnemonic = Mnemonic::Nop,
            0x91..=0x97 => {
                ins.mnemonic = Mnemonic::Xchg;
                ins.op1 = Some(Operand::Reg16(Reg16::Ax));
                ins.op2 = Some(Operand::Reg16(Reg16::try_from(opcode - 0x90)?));
            }

            0x98 => ins.mnemonic = Mnemonic::Cbw,
            0x99 => ins.mnemonic = Mnemonic::Cwd,

            0x9A => {
                let offset = self.u16()?;
                let segment = self.u16()?;
                ins.mnemonic = Mnemonic::Call;
                ins.op1 = Some(Operand::Far {
                    seg: segment,
                    offset,
                });
            }
            0x9B => ins.mnemonic = Mnemonic::Wait,
            0x9C => ins.mnemonic = Mnemonic::Pushf,
            0x9D => ins.mnemonic = Mnemonic::Popf,
            0x9E => ins.mnemonic = Mnemonic::Sahf,
            0x9F => ins.mnemonic = Mnemonic::Lahf,

            0xA0 | 0xA1 => {
                let width = if opcode == 0xA1 { Width::Word } else { Width::Byte };
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 = Some(match width {
                    Width::Byte => Operand::Reg8(Reg8::Al),
                    Width::Word => Operand::Reg16(Reg16::Ax),
                });
                ins.op2 = Some(Operand::Moffs {
                    seg: seg.unwrap_or(SegReg::Ds),
                    offset: self.u16()?,
                    width,
                });
            }
            0xA2 | 0xA3 => {
                let width = if opcode == 0xA3 { Width::Word } else { Width::Byte };
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 = Some(Operand::Moffs {
                    seg: seg.unwrap_or(SegReg::Ds),
                    offset: self.u16()?,
                    width,
                });
                ins.op2 = Some(match width {
                    Width::Byte => Operand::Reg8(Reg8::Al),
                    Width::Word => Operand::Reg16(Reg16::Ax),
                });
            }

            0xA4 => ins.mnemonic = Mnemonic::Movsb,
            0xA5 => ins.mnemonic = Mnemonic::Movsw,
            0xA6 => ins.mnemonic = Mnemonic::Cmpsb,
            0xA7 => ins.mnemonic = Mnemonic::Cmpsw,

            0xA8 => {
                ins.mnemonic = Mnemonic::Test;
                ins.op1 = Some(Operand::Reg8(Reg8::Al));
                ins.op2 = Some(Operand::Imm8(self.u8()?));
            }
            0xA9 => {
                ins.mnemonic = Mnemonic::Test;
                ins.op1 = Some(Operand::Reg16(Reg16::Ax));
                ins.op2 = Some(Operand::Imm16(self.u16()?));
            }

            0xAA => ins.mnemonic = Mnemonic::Stosb,
            0xAB => ins.mnemonic = Mnemonic::Stosw,
            0xAC => ins.mnemonic = Mnemonic::Lodsb,
            0xAD => ins.mnemonic = Mnemonic::Lodsw,
            0xAE => ins.mnemonic = Mnemonic::Scasb,
            0xAF => ins.mnemonic = Mnemonic::Scasw,

            0xB0..=0xB7 => {
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 = Some(Operand::Reg8(Reg8::try_from(opcode - 0xB0)?));
                ins.op2 = Some(Operand::Imm8(self.u8()?));
            }
            0xB8..=0xBF => {
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 = Some(Operand::Reg16(Reg16::try_from(opcode - 0xB8)?));
                ins.op2 = Some(Operand::Imm16(self.u16()?));
            }

            // Shift group, r/m by imm8.
            0xC0 | 0xC1 => {
                let width = if opcode == 0xC1 { Width::Word } else { Width::Byte };
                let m = self.modrm(width, seg)?;
                ins.mnemonic = SHIFT_OPS[m.reg_field as usize];
                ins.op1 = Some(m.rm);
                ins.op2 = Some(Operand::Imm8(self.u8()?));
            }

            0xC2 => {
                ins.mnemonic = Mnemonic::Ret;
                ins.op1 = Some(Operand::Imm16(self.u16()?));
            }
            0xC3 => ins.mnemonic = Mnemonic::Ret,

            0xC4 | 0xC5 => {
                let m = self.modrm(Width::Word, seg)?;
                ins.mnemonic = if opcode == 0xC4 {
                    Mnemonic::Les
                } else {
                    Mnemonic::Lds
                };
                ins.op1 = Some(m.reg);
                ins.op2 = Some(m.rm);
            }

            0xC6 | 0xC7 => {
                let width = if opcode == 0xC7 { Width::Word } else { Width::Byte };
                let m = self.modrm(width, seg)?;
                ins.mnemonic = Mnemonic::Mov;
                ins.op1 = Some(m.rm);
                ins.op2 = Some(match width {
                    Width::Byte => Operand::Imm8(self.u8()?),
                    Width::Word => Operand::Imm16(self.u16()?),
                });
            }

            0xC8 => {
                let size = self.u16()?;
                let level = self.u8()?;
                ins.mnemonic = Mnemonic::Enter;
                ins.op1 = Some(Operand::Imm16(size));
                ins.op2 = Some(Operand::Imm8(level));
            }
            0xC9 => ins.mnemonic = Mnemonic::Leave,

            0xCA => {
                ins.mnemonic = Mnemonic::Retf;
                ins.op1 = Some(Operand::Imm16(self.u16()?));
            }
            0xCB => ins.mnemonic = Mnemonic::Retf,

            0xCC => {
                ins.mnemonic = Mnemonic::Int;
                ins.op1 = Some(Operand::Imm8(3));
            }
            0xCD => {
                let vector = self.u8()?;
                ins.mnemonic = Mnemonic::Int;
                ins.op1 = Some(Operand::Imm8(vector));
                // The overlay manager trap carries a module byte and a
                // 16-bit entry offset after the vector.
                if vector == OVERLAY_INT && self.pos + 2 < self.data.len() {
                    let module = self.u8()?;
                    let entry = self.u16()?;
                    ins.overlay = Some(OverlayTarget { module, entry });
                }
            }
            0xCE => ins.mnemonic = Mnemonic::Into,
            0xCF => ins.mnemonic = Mnemonic::Iret,

            // Shift group, r/m by 1 or by CL.
            0xD0..=0xD3 => {
                let width = if opcode & 1 != 0 { Width::Word } else { Width::Byte };
                let by_cl = opcode >= 0xD2;
                let m = self.modrm(width, seg)?;
                ins.mnemonic = SHIFT_OPS[m.reg_field as usize];
                ins.op1 = Some(m.rm);
                ins.op2 = Some(if by_cl {
                    Operand::Reg8(Reg8::Cl)
                } else {
                    Operand::Imm8(1)
                });
            }

            // AAM/AAD consume an extra base byte, almost always 0x0A.
            0xD4 => {
                ins.mnemonic = Mnemonic::Aam;
                self.u8()?;
            }
            0xD5 => {
                ins.mnemonic = Mnemonic::Aad;
                self.u8()?;
            }

            0xD7 => ins.mnemonic = Mnemonic::Xlat,

            // FPU escapes: consume the ModR/M and keep the unit number.
            0xD8..=0xDF => {
                self.modrm(Width::Byte, seg)?;
                ins.mnemonic = Mnemonic::Esc(opcode - 0xD8);
            }

            0xE0..=0xE3 => {
                ins.mnemonic = match opcode {
                    0xE0 => Mnemonic::Loopnz,
                    0xE1 => Mnemonic::Loopz,
                    0xE2 => Mnemonic::Loop,
                    _ => Mnemonic::Jcxz,
                };
                let delta = self.s8()?;
                ins.op1 = Some(Operand::Rel8(self.rel_target(delta.into())));
            }

            0xE4 | 0xE5 => {
                ins.mnemonic = Mnemonic::In;
                ins.op1 = Some(if opcode == 0xE4 {
                    Operand::Reg8(Reg8::Al)
                } else {
                    Operand::Reg16(Reg16::Ax)
                });
                ins.op2 = Some(Operand::Imm8(self.u8()?));
            }
            0xE6 | 0xE7 => {
                ins.mnemonic = Mnemonic::Out;
                ins.op1 = Some(Operand::Imm8(self.u8()?));
                ins.op2 = Some(if opcode == 0xE6 {
                    Operand::Reg8(Reg8::Al)
                } else {
                    Operand::Reg16(Reg16::Ax)
                });
            }

            0xE8 => {
                let delta = self.s16()?;
                ins.mnemonic = Mnemonic::Call;
                ins.op1 = Some(Operand::Rel16(self.rel_target(delta.into())));
            }
            0xE9 => {
                let delta = self.s16()?;
                ins.mnemonic = Mnemonic::Jmp;
                ins.op1 = Some(Operand::Rel16(self.rel_target(delta.into())));
            }
            0xEA => {
                let offset = self.u16()?;
                let segment = self.u16()?;
                ins.mnemonic = Mnemonic::Jmp;
                ins.op1 = Some(Operand::Far {
                    seg: segment,
                    offset,
                });
            }
            0xEB => {
                let delta = self.s8()?;
                ins.mnemonic = Mnemonic::Jmp;
                ins.op1 = Some(Operand::Rel8(self.rel_target(delta.into())));
            }

            0xEC | 0xED => {
                ins.mnemonic = Mnemonic::In;
                ins.op1 = Some(if opcode == 0xEC {
                    Operand::Reg8(Reg8::Al)
                } else {
                    Operand::Reg16(Reg16::Ax)
                });
                ins.op2 = Some(Operand::Reg16(Reg16::Dx));
            }
            0xEE | 0xEF => {
                ins.mnemonic = Mnemonic::Out;
                ins.op1 = Some(Operand::Reg16(Reg16::Dx));
                ins.op2 = Some(if opcode == 0xEE {
                    Operand::Reg8(Reg8::Al)
                } else {
                    Operand::Reg16(Reg16::Ax)
                });
            }

            0xF4 => ins.mnemonic = Mnemonic::Hlt,
            0xF5 => ins.mnemonic = Mnemonic::Cmc,

            // Group 3: TEST/NOT/NEG/MUL/IMUL/DIV/IDIV.
            0xF6 | 0xF7 => {
                let wide = opcode == 0xF7;
                let width = if wide { Width::Word } else { Width::Byte };
                let m = self.modrm(width, seg)?;
                ins.mnemonic = GROUP3_OPS[m.reg_field as usize];
                ins.op1 = Some(m.rm);
                if m.reg_field <= 1 {
                    ins.op2 = Some(if wide {
                        Operand::Imm16(self.u16()?)
                    } else {
                        Operand::Imm8(self.u8()?)
                    });
                }
            }

            0xF8 => ins.mnemonic = Mnemonic::Clc,
            0xF9 => ins.mnemonic = Mnemonic::Stc,
            0xFA => ins.mnemonic = Mnemonic::Cli,
            0xFB => ins.mnemonic = Mnemonic::Sti,
            0xFC => ins.mnemonic = Mnemonic::Cld,
            0xFD => ins.mnemonic = Mnemonic::Std,

            // Group 4: INC/DEC r/m8.
            0xFE => {
                let m = self.modrm(Width::Byte, seg)?;
                ins.mnemonic = match m.reg_field {
                    0 => Mnemonic::Inc,
                    1 => Mnemonic::Dec,
                    _ => Mnemonic::Bad,
                };
                ins.op1 = Some(m.rm);
            }
            // Group 5: INC/DEC/CALL/JMP/PUSH on r/m16.
            0xFF => {
                let m = self.modrm(Width::Word, seg)?;
                ins.mnemonic = match m.reg_field {
                    0 => Mnemonic::Inc,
                    1 => Mnemonic::Dec,
                    2 => Mnemonic::Call,
                    3 => Mnemonic::CallFar,
                    4 => Mnemonic::Jmp,
                    5 => Mnemonic::JmpFar,
                    6 => Mnemonic::Push,
                    _ => Mnemonic::Bad,
                };
                ins.op1 = Some(m.rm);
            }

            _ => {
                ins.mnemonic = Mnemonic::Db;
                ins.op1 = Some(Operand::Imm8(opcode));
            }
        }
        Ok(())
    }
}
