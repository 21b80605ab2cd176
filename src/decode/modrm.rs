use anyhow::Result;

use super::operand::{MemRef, Operand, Reg16, Reg8, SegReg, Width};
use super::Decoder;

/// (base, index) pairs selected by the r/m field for mod < 3.
const EA_BASES: [(Option<Reg16>, Option<Reg16>); 8] = [
    (Some(Reg16::Bx), Some(Reg16::Si)),
    (Some(Reg16::Bx), Some(Reg16::Di)),
    (Some(Reg16::Bp), Some(Reg16::Si)),
    (Some(Reg16::Bp), Some(Reg16::Di)),
    (Some(Reg16::Si), None),
    (Some(Reg16::Di), None),
    (Some(Reg16::Bp), None),
    (Some(Reg16::Bx), None),
];

/// Default segment for each r/m value, absent an override. Forms that
/// address through the frame pointer default to the stack segment.
const EA_DEFAULT_SEG: [SegReg; 8] = [
    SegReg::Ds,
    SegReg::Ds,
    SegReg::Ss,
    SegReg::Ss,
    SegReg::Ds,
    SegReg::Ds,
    SegReg::Ss,
    SegReg::Ds,
];

/// Decoded ModR/M byte: the reg-field operand, the r/m operand and the raw
/// reg field (which selects the sub-opcode in the group encodings).
pub(super) struct ModRm {
    pub reg_field: u8,
    pub reg: Operand,
    pub rm: Operand,
}

impl Decoder<'_> {
    pub(super) fn modrm(
        &mut self,
        width: Width,
        seg_override: Option<SegReg>,
    ) -> Result<ModRm> {
        let modrm = self.u8()?;
        let mode = modrm >> 6;
        let reg_field = (modrm >> 3) & 7;
        let rm = modrm & 7;

        let reg = register_operand(reg_field, width)?;
        if mode == 3 {
            return Ok(ModRm {
                reg_field,
                reg,
                rm: register_operand(rm, width)?,
            });
        }

        let (mut base, mut index) = EA_BASES[rm as usize];
        let disp;
        let seg;
        if mode == 0 && rm == 6 {
            // [disp16]: a pure 16-bit offset with no base or index
            disp = i32::from(self.u16()?);
            base = None;
            index = None;
            seg = seg_override.unwrap_or(SegReg::Ds);
        } else {
            disp = match mode {
                0 => 0,
                1 => i32::from(self.s8()?),
                _ => i32::from(self.s16()?),
            };
            seg = seg_override.unwrap_or(EA_DEFAULT_SEG[rm as usize]);
        }

        Ok(ModRm {
            reg_field,
            reg,
            rm: Operand::Mem(MemRef {
                base,
                index,
                disp,
                seg,
                width,
            }),
        })
    }
}

fn register_operand(index: u8, width: Width) -> Result<Operand> {
    Ok(match width {
        Width::Byte => Operand::Reg8(Reg8::try_from(index)?),
        Width::Word => Operand::Reg16(Reg16::try_from(index)?),
    })
}
