//! Translation of decoded instructions into target source operating on an
//! explicit CPU state.
//!
//! Every function becomes a routine `void <name>(CPU &cpu)` whose body
//! mirrors the instruction sequence one statement per instruction, with
//! labels for intra-function branch targets and the disassembly text kept
//! as a trailing comment on each line. Lifting is total: anything the
//! translator cannot express becomes a commented placeholder so the
//! surrounding structure survives.

use std::collections::BTreeSet;

use crate::decode::{
    Ins, MemRef, Mnemonic, Operand, Rep, Width, OVERLAY_INT,
};

/// Column where the disassembly comment starts.
const COMMENT_COL: usize = 44;

/// One translated routine.
#[derive(Clone, Debug)]
pub struct LiftedFunction {
    pub name: String,
    pub code: String,
    /// Near and far call targets emitted by this routine.
    pub calls: BTreeSet<String>,
    /// Overlay entry points emitted by this routine.
    pub overlay_calls: BTreeSet<String>,
}

/// Reusable lifter state. One instance translates any number of functions.
#[derive(Debug, Default)]
pub struct Lifter {
    out: Vec<String>,
    indent: usize,
    labels: BTreeSet<u16>,
    calls: BTreeSet<String>,
    overlay_calls: BTreeSet<String>,
}

impl Lifter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one function. `func_start` is the file offset of the
    /// function entry; `instructions` must be decoded relative to it so
    /// that labels and near-call targets resolve.
    pub fn lift_function(
        &mut self,
        name: &str,
        instructions: &[Ins],
        func_start: usize,
    ) -> LiftedFunction {
        self.out.clear();
        self.labels.clear();
        self.calls.clear();
        self.overlay_calls.clear();
        self.indent = 1;

        // First pass: every intra-function branch target needs a label.
        for ins in instructions {
            if ins.mnemonic.is_branch() {
                if let Some(Operand::Rel8(target) | Operand::Rel16(target)) =
                    ins.op1
                {
                    self.labels.insert(target);
                }
            }
        }

        self.out.push(format!("void {name}(CPU &cpu)"));
        self.out.push("{".into());
        for ins in instructions {
            self.lift_instruction(ins, func_start);
        }
        self.out.push("}".into());

        LiftedFunction {
            name: name.to_string(),
            code: self.out.join("\n"),
            calls: std::mem::take(&mut self.calls),
            overlay_calls: std::mem::take(&mut self.overlay_calls),
        }
    }

    fn emit(&mut self, code: &str, comment: Option<&str>) {
        let mut line = format!("{}{}", "    ".repeat(self.indent), code);
        if let Some(comment) = comment {
            if line.len() < COMMENT_COL {
                line.push_str(&" ".repeat(COMMENT_COL - line.len()));
            }
            line.push_str(&format!(" /* {comment} */"));
        }
        self.out.push(line);
    }

    fn emit_label(&mut self, addr: usize) {
        let addr = addr as u16;
        if self.labels.contains(&addr) {
            self.out.push(format!("{}:;", label(addr)));
        }
    }

    fn lift_instruction(&mut self, ins: &Ins, func_start: usize) {
        self.emit_label(ins.addr);

        let is_move_store = matches!(
            ins.mnemonic,
            Mnemonic::Movsb | Mnemonic::Movsw | Mnemonic::Stosb | Mnemonic::Stosw
        );
        let is_scan_compare = matches!(
            ins.mnemonic,
            Mnemonic::Scasb | Mnemonic::Scasw | Mnemonic::Cmpsb | Mnemonic::Cmpsw
        );

        match ins.rep {
            Some(Rep::Rep) if is_move_store => {
                self.emit(
                    "while (cpu.cx != 0) { cpu.cx--;",
                    Some(&format!("rep {}", ins.mnemonic)),
                );
                self.indent += 1;
                self.lift_body(&strip_rep(ins), func_start);
                self.indent -= 1;
                self.emit("}", None);
            }
            Some(Rep::Rep) if is_scan_compare => {
                self.emit(
                    "while (cpu.cx != 0) { cpu.cx--;",
                    Some(&format!("repz {}", ins.mnemonic)),
                );
                self.indent += 1;
                self.lift_body(&strip_rep(ins), func_start);
                self.emit("if (!zf(cpu)) break;", None);
                self.indent -= 1;
                self.emit("}", None);
            }
            Some(Rep::Repnz) if is_scan_compare => {
                self.emit(
                    "while (cpu.cx != 0) { cpu.cx--;",
                    Some(&format!("repnz {}", ins.mnemonic)),
                );
                self.indent += 1;
                self.lift_body(&strip_rep(ins), func_start);
                self.emit("if (zf(cpu)) break;", None);
                self.indent -= 1;
                self.emit("}", None);
            }
            _ => self.lift_body(ins, func_start),
        }
    }

    fn lift_body(&mut self, ins: &Ins, func_start: usize) {
        let orig = ins.to_string();
        let orig = Some(orig.as_str());
        let op1 = ins.op1;
        let op2 = ins.op2;

        match ins.mnemonic {
            // data movement
            Mnemonic::Mov => {
                if let (Some(dst), Some(src)) = (op1, op2) {
                    self.emit(&write(&dst, &read(&src)), orig);
                }
            }
            Mnemonic::Xchg => {
                if let (Some(a), Some(b)) = (op1, op2) {
                    self.emit(
                        &format!(
                            "{{ uint16_t _t = {}; {} {} }}",
                            read(&a),
                            write(&a, &read(&b)),
                            write(&b, "_t")
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Lea => {
                if let (Some(dst), Some(Operand::Mem(mem))) = (op1, op2) {
                    let (_, off) = mem_addr(&mem);
                    self.emit(&write(&dst, &off), orig);
                } else {
                    self.unhandled(ins);
                }
            }
            Mnemonic::Lds | Mnemonic::Les => {
                if let (Some(dst), Some(Operand::Mem(mem))) = (op1, op2) {
                    let (seg, off) = mem_addr(&mem);
                    let loaded = match ins.mnemonic {
                        Mnemonic::Lds => "ds",
                        _ => "es",
                    };
                    self.emit(
                        &format!(
                            "{} = mem_read16(cpu, {seg}, {off});",
                            read(&dst)
                        ),
                        orig,
                    );
                    self.emit(
                        &format!(
                            "cpu.{loaded} = mem_read16(cpu, {seg}, (uint16_t)({off} + 2));"
                        ),
                        None,
                    );
                } else {
                    self.unhandled(ins);
                }
            }
            Mnemonic::Cbw => {
                self.emit("cpu.ax = (uint16_t)(int16_t)(int8_t)cpu.al;", orig);
            }
            Mnemonic::Cwd => {
                self.emit("cpu.dx = (cpu.ax & 0x8000) ? 0xFFFF : 0x0000;", orig);
            }

            // stack
            Mnemonic::Push => {
                if let Some(src) = op1 {
                    self.emit(&format!("push16(cpu, {});", read(&src)), orig);
                }
            }
            Mnemonic::Pop => {
                if let Some(dst) = op1 {
                    self.emit(&write(&dst, "pop16(cpu)"), orig);
                }
            }
            Mnemonic::Pushf => self.emit("push16(cpu, cpu.flags);", orig),
            Mnemonic::Popf => self.emit("cpu.flags = pop16(cpu);", orig),
            Mnemonic::Pusha => {
                self.emit(
                    "{ uint16_t _sp = cpu.sp; push16(cpu, cpu.ax); \
                     push16(cpu, cpu.cx); push16(cpu, cpu.dx); \
                     push16(cpu, cpu.bx); push16(cpu, _sp); \
                     push16(cpu, cpu.bp); push16(cpu, cpu.si); \
                     push16(cpu, cpu.di); }",
                    orig,
                );
            }
            Mnemonic::Popa => {
                self.emit(
                    "cpu.di = pop16(cpu); cpu.si = pop16(cpu); \
                     cpu.bp = pop16(cpu); (void)pop16(cpu); \
                     cpu.bx = pop16(cpu); cpu.dx = pop16(cpu); \
                     cpu.cx = pop16(cpu); cpu.ax = pop16(cpu);",
                    orig,
                );
            }

            // arithmetic
            Mnemonic::Add | Mnemonic::Adc => {
                if let (Some(dst), Some(src)) = (op1, op2) {
                    let bits = width_bits(&dst);
                    let carry = if ins.mnemonic == Mnemonic::Adc {
                        " + cf(cpu)"
                    } else {
                        ""
                    };
                    self.emit(
                        &write(
                            &dst,
                            &format!(
                                "flags_add{bits}(cpu, {}, {}{carry})",
                                read(&dst),
                                read(&src)
                            ),
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Sub | Mnemonic::Sbb => {
                if let (Some(dst), Some(src)) = (op1, op2) {
                    let bits = width_bits(&dst);
                    let carry = if ins.mnemonic == Mnemonic::Sbb {
                        " + cf(cpu)"
                    } else {
                        ""
                    };
                    self.emit(
                        &write(
                            &dst,
                            &format!(
                                "flags_sub{bits}(cpu, {}, {}{carry})",
                                read(&dst),
                                read(&src)
                            ),
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Cmp => {
                if let (Some(a), Some(b)) = (op1, op2) {
                    let bits = width_bits(&a);
                    self.emit(
                        &format!(
                            "flags_cmp{bits}(cpu, {}, {});",
                            read(&a),
                            read(&b)
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Inc | Mnemonic::Dec => {
                if let Some(dst) = op1 {
                    let bits = width_bits(&dst);
                    let helper = if ins.mnemonic == Mnemonic::Inc {
                        "flags_add"
                    } else {
                        "flags_sub"
                    };
                    // inc/dec leave the carry flag untouched
                    self.emit(
                        &format!(
                            "{{ int _cf = cf(cpu); {} if (_cf) cpu.flags |= FLAG_CF; else cpu.flags &= ~FLAG_CF; }}",
                            write(
                                &dst,
                                &format!("{helper}{bits}(cpu, {}, 1)", read(&dst))
                            )
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Neg => {
                if let Some(dst) = op1 {
                    let bits = width_bits(&dst);
                    self.emit(
                        &write(
                            &dst,
                            &format!("flags_sub{bits}(cpu, 0, {})", read(&dst)),
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Mul => {
                if let Some(src) = op1 {
                    if src.width() == Width::Byte {
                        self.emit(
                            &format!(
                                "{{ uint16_t _r = (uint16_t)cpu.al * {}; \
                                 cpu.ax = _r; \
                                 cpu.flags = (cpu.flags & ~(FLAG_CF|FLAG_OF)) | \
                                 (_r > 0xFF ? FLAG_CF|FLAG_OF : 0); }}",
                                read(&src)
                            ),
                            orig,
                        );
                    } else {
                        self.emit(
                            &format!(
                                "{{ uint32_t _r = (uint32_t)cpu.ax * {}; \
                                 cpu.ax = (uint16_t)_r; cpu.dx = (uint16_t)(_r >> 16); \
                                 cpu.flags = (cpu.flags & ~(FLAG_CF|FLAG_OF)) | \
                                 (cpu.dx ? FLAG_CF|FLAG_OF : 0); }}",
                                read(&src)
                            ),
                            orig,
                        );
                    }
                }
            }
            Mnemonic::Imul => {
                if let Some(src) = op1 {
                    if src.width() == Width::Byte {
                        self.emit(
                            &format!(
                                "{{ int16_t _r = (int16_t)(int8_t)cpu.al * (int8_t){}; \
                                 cpu.ax = (uint16_t)_r; \
                                 cpu.flags = (cpu.flags & ~(FLAG_CF|FLAG_OF)) | \
                                 ((uint16_t)_r != (uint16_t)(int16_t)(int8_t)_r ? FLAG_CF|FLAG_OF : 0); }}",
                                read(&src)
                            ),
                            orig,
                        );
                    } else {
                        self.emit(
                            &format!(
                                "{{ int32_t _r = (int32_t)(int16_t)cpu.ax * (int16_t){}; \
                                 cpu.ax = (uint16_t)_r; \
                                 cpu.dx = (uint16_t)((uint32_t)_r >> 16); \
                                 cpu.flags = (cpu.flags & ~(FLAG_CF|FLAG_OF)) | \
                                 ((uint32_t)_r != (uint32_t)(int32_t)(int16_t)_r ? FLAG_CF|FLAG_OF : 0); }}",
                                read(&src)
                            ),
                            orig,
                        );
                    }
                }
            }
            Mnemonic::Div => {
                if let Some(src) = op1 {
                    if src.width() == Width::Byte {
                        self.emit(
                            &format!(
                                "{{ uint16_t _n = cpu.ax; uint8_t _d = {}; \
                                 cpu.al = (uint8_t)(_n / _d); \
                                 cpu.ah = (uint8_t)(_n % _d); }}",
                                read(&src)
                            ),
                            orig,
                        );
                    } else {
                        self.emit(
                            &format!(
                                "{{ uint32_t _n = ((uint32_t)cpu.dx << 16) | cpu.ax; \
                                 uint16_t _d = {}; \
                                 cpu.ax = (uint16_t)(_n / _d); \
                                 cpu.dx = (uint16_t)(_n % _d); }}",
                                read(&src)
                            ),
                            orig,
                        );
                    }
                }
            }
            Mnemonic::Idiv => {
                if let Some(src) = op1 {
                    if src.width() == Width::Byte {
                        self.emit(
                            &format!(
                                "{{ int16_t _n = (int16_t)cpu.ax; int8_t _d = (int8_t){}; \
                                 cpu.al = (uint8_t)(int8_t)(_n / _d); \
                                 cpu.ah = (uint8_t)(int8_t)(_n % _d); }}",
                                read(&src)
                            ),
                            orig,
                        );
                    } else {
                        self.emit(
                            &format!(
                                "{{ int32_t _n = (int32_t)(((uint32_t)cpu.dx << 16) | cpu.ax); \
                                 int16_t _d = (int16_t){}; \
                                 cpu.ax = (uint16_t)(int16_t)(_n / _d); \
                                 cpu.dx = (uint16_t)(int16_t)(_n % _d); }}",
                                read(&src)
                            ),
                            orig,
                        );
                    }
                }
            }

            // logic
            Mnemonic::And | Mnemonic::Or | Mnemonic::Xor => {
                if let (Some(dst), Some(src)) = (op1, op2) {
                    let op = match ins.mnemonic {
                        Mnemonic::And => "&",
                        Mnemonic::Or => "|",
                        _ => "^",
                    };
                    let bits = width_bits(&dst);
                    self.emit(
                        &format!(
                            "{{ uint{bits}_t _r = {} {op} {}; \
                             flags_logic{bits}(cpu, _r); {} }}",
                            read(&dst),
                            read(&src),
                            write(&dst, "_r")
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Test => {
                if let (Some(a), Some(b)) = (op1, op2) {
                    let bits = width_bits(&a);
                    self.emit(
                        &format!(
                            "flags_logic{bits}(cpu, {} & {});",
                            read(&a),
                            read(&b)
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Not => {
                if let Some(dst) = op1 {
                    self.emit(&write(&dst, &format!("~{}", read(&dst))), orig);
                }
            }

            // shifts; the pre-shift value captures the outgoing carry bit
            Mnemonic::Shl | Mnemonic::Sal => {
                if let (Some(dst), Some(count)) = (op1, op2) {
                    let bits = width_bits(&dst);
                    self.emit(
                        &format!(
                            "{{ uint{bits}_t _v = {}; uint8_t _c = {}; \
                             uint{bits}_t _r = _v << _c; \
                             cpu.flags = (cpu.flags & ~FLAG_CF) | \
                             ((_v >> ({bits} - _c)) & 1 ? FLAG_CF : 0); \
                             flags_shift{bits}(cpu, _r); {} }}",
                            read(&dst),
                            read(&count),
                            write(&dst, "_r")
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Shr => {
                if let (Some(dst), Some(count)) = (op1, op2) {
                    let bits = width_bits(&dst);
                    self.emit(
                        &format!(
                            "{{ uint{bits}_t _v = {}; uint8_t _c = {}; \
                             uint{bits}_t _r = _v >> _c; \
                             cpu.flags = (cpu.flags & ~FLAG_CF) | \
                             ((_v >> (_c - 1)) & 1 ? FLAG_CF : 0); \
                             flags_shift{bits}(cpu, _r); {} }}",
                            read(&dst),
                            read(&count),
                            write(&dst, "_r")
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Sar => {
                if let (Some(dst), Some(count)) = (op1, op2) {
                    let bits = width_bits(&dst);
                    let signed = if bits == 8 { "int8_t" } else { "int16_t" };
                    self.emit(
                        &format!(
                            "{{ {signed} _v = ({signed}){}; uint8_t _c = {}; \
                             {signed} _r = _v >> _c; \
                             cpu.flags = (cpu.flags & ~FLAG_CF) | \
                             ((_v >> (_c - 1)) & 1 ? FLAG_CF : 0); \
                             flags_shift{bits}(cpu, (uint{bits}_t)_r); {} }}",
                            read(&dst),
                            read(&count),
                            write(&dst, &format!("(uint{bits}_t)_r"))
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Rol | Mnemonic::Ror | Mnemonic::Rcl | Mnemonic::Rcr => {
                if let (Some(dst), Some(count)) = (op1, op2) {
                    // TODO expand rotates once the flag model settles
                    self.emit(
                        &format!(
                            "/* TODO: {} {}, {} */",
                            ins.mnemonic,
                            read(&dst),
                            read(&count)
                        ),
                        orig,
                    );
                }
            }

            // control flow
            Mnemonic::Jmp => match op1 {
                Some(Operand::Rel8(target) | Operand::Rel16(target)) => {
                    self.labels.insert(target);
                    self.emit(&format!("goto {};", label(target)), orig);
                }
                Some(mem @ Operand::Mem(_)) => {
                    self.emit(
                        &format!(
                            "/* indirect jmp via {} - needs dispatch */",
                            read(&mem)
                        ),
                        orig,
                    );
                }
                _ => {
                    let target = op1
                        .as_ref()
                        .map(|op| op.to_string())
                        .unwrap_or_default();
                    self.emit(&format!("/* jmp {target} */"), orig);
                }
            },
            m if m.cc_helper().is_some() => {
                if let Some(Operand::Rel8(target) | Operand::Rel16(target)) =
                    op1
                {
                    self.labels.insert(target);
                    let cc = m.cc_helper().unwrap_or_default();
                    self.emit(
                        &format!("if ({cc}(cpu)) goto {};", label(target)),
                        orig,
                    );
                }
            }
            Mnemonic::Loop | Mnemonic::Loopz | Mnemonic::Loopnz => {
                if let Some(Operand::Rel8(target) | Operand::Rel16(target)) =
                    op1
                {
                    self.labels.insert(target);
                    let cond = match ins.mnemonic {
                        Mnemonic::Loop => "cpu.cx != 0",
                        Mnemonic::Loopz => "cpu.cx != 0 && zf(cpu)",
                        _ => "cpu.cx != 0 && !zf(cpu)",
                    };
                    self.emit(
                        &format!(
                            "cpu.cx--; if ({cond}) goto {};",
                            label(target)
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Jcxz => {
                if let Some(Operand::Rel8(target) | Operand::Rel16(target)) =
                    op1
                {
                    self.labels.insert(target);
                    self.emit(
                        &format!("if (cpu.cx == 0) goto {};", label(target)),
                        orig,
                    );
                }
            }
            Mnemonic::Call => match op1 {
                Some(Operand::Rel16(target)) => {
                    let target = func_start + target as usize;
                    let name = format!("res_{target:06X}");
                    self.emit(&format!("{name}(cpu);"), orig);
                    self.calls.insert(name);
                }
                Some(Operand::Far { seg, offset }) => {
                    let name = format!("far_{seg:04X}_{offset:04X}");
                    self.emit(&format!("{name}(cpu);"), orig);
                    self.calls.insert(name);
                }
                _ => {
                    let target = op1
                        .as_ref()
                        .map(|op| op.to_string())
                        .unwrap_or_default();
                    self.emit(
                        &format!("/* indirect call {target} - needs dispatch */"),
                        orig,
                    );
                }
            },
            Mnemonic::CallFar | Mnemonic::JmpFar => {
                let what = if ins.mnemonic == Mnemonic::CallFar {
                    "call"
                } else {
                    "jmp"
                };
                let target = op1.as_ref().map(read).unwrap_or_default();
                self.emit(
                    &format!(
                        "/* indirect far {what} via {target} - needs dispatch */"
                    ),
                    orig,
                );
            }
            Mnemonic::Ret | Mnemonic::Retf => {
                if let Some(pop) = op1 {
                    self.emit(
                        &format!("cpu.sp += {}; return;", read(&pop)),
                        orig,
                    );
                } else {
                    self.emit("return;", orig);
                }
            }
            Mnemonic::Int => {
                let vector = match op1 {
                    Some(Operand::Imm8(vector)) => vector,
                    _ => 0,
                };
                match (vector, ins.overlay) {
                    (OVERLAY_INT, Some(target)) => {
                        // resolved statically, no runtime vector dispatch
                        let name = format!(
                            "ovl{:02}_{:04X}",
                            target.module, target.entry
                        );
                        self.emit(
                            &format!("{name}(cpu);"),
                            Some(&format!(
                                "INT 3Fh -> OVL {:02X}:{:04X}",
                                target.module, target.entry
                            )),
                        );
                        self.overlay_calls.insert(name);
                    }
                    (0x21, _) => self.emit("dos_int21(cpu);", orig),
                    (0x10, _) => self.emit("bios_int10(cpu);", orig),
                    (0x16, _) => self.emit("bios_int16(cpu);", orig),
                    (0x33, _) => self.emit("mouse_int33(cpu);", orig),
                    _ => self.emit(
                        &format!("int_handler(cpu, 0x{vector:02X});"),
                        orig,
                    ),
                }
            }

            // string primitives, direction flag controls the stride
            Mnemonic::Movsb => self.emit(
                "mem_write8(cpu, cpu.es, cpu.di, mem_read8(cpu, cpu.ds, cpu.si)); \
                 cpu.si += df(cpu) ? -1 : 1; cpu.di += df(cpu) ? -1 : 1;",
                orig,
            ),
            Mnemonic::Movsw => self.emit(
                "mem_write16(cpu, cpu.es, cpu.di, mem_read16(cpu, cpu.ds, cpu.si)); \
                 cpu.si += df(cpu) ? -2 : 2; cpu.di += df(cpu) ? -2 : 2;",
                orig,
            ),
            Mnemonic::Stosb => self.emit(
                "mem_write8(cpu, cpu.es, cpu.di, cpu.al); \
                 cpu.di += df(cpu) ? -1 : 1;",
                orig,
            ),
            Mnemonic::Stosw => self.emit(
                "mem_write16(cpu, cpu.es, cpu.di, cpu.ax); \
                 cpu.di += df(cpu) ? -2 : 2;",
                orig,
            ),
            Mnemonic::Lodsb => self.emit(
                "cpu.al = mem_read8(cpu, cpu.ds, cpu.si); \
                 cpu.si += df(cpu) ? -1 : 1;",
                orig,
            ),
            Mnemonic::Lodsw => self.emit(
                "cpu.ax = mem_read16(cpu, cpu.ds, cpu.si); \
                 cpu.si += df(cpu) ? -2 : 2;",
                orig,
            ),
            Mnemonic::Scasb => self.emit(
                "flags_cmp8(cpu, cpu.al, mem_read8(cpu, cpu.es, cpu.di)); \
                 cpu.di += df(cpu) ? -1 : 1;",
                orig,
            ),
            Mnemonic::Scasw => self.emit(
                "flags_cmp16(cpu, cpu.ax, mem_read16(cpu, cpu.es, cpu.di)); \
                 cpu.di += df(cpu) ? -2 : 2;",
                orig,
            ),
            Mnemonic::Cmpsb => self.emit(
                "flags_cmp8(cpu, mem_read8(cpu, cpu.ds, cpu.si), mem_read8(cpu, cpu.es, cpu.di)); \
                 cpu.si += df(cpu) ? -1 : 1; cpu.di += df(cpu) ? -1 : 1;",
                orig,
            ),
            Mnemonic::Cmpsw => self.emit(
                "flags_cmp16(cpu, mem_read16(cpu, cpu.ds, cpu.si), mem_read16(cpu, cpu.es, cpu.di)); \
                 cpu.si += df(cpu) ? -2 : 2; cpu.di += df(cpu) ? -2 : 2;",
                orig,
            ),

            // flag manipulation
            Mnemonic::Clc => self.emit("cpu.flags &= ~FLAG_CF;", orig),
            Mnemonic::Stc => self.emit("cpu.flags |= FLAG_CF;", orig),
            Mnemonic::Cmc => self.emit("cpu.flags ^= FLAG_CF;", orig),
            Mnemonic::Cld => self.emit("cpu.flags &= ~FLAG_DF;", orig),
            Mnemonic::Std => self.emit("cpu.flags |= FLAG_DF;", orig),
            Mnemonic::Cli => self.emit("cpu.flags &= ~FLAG_IF;", orig),
            Mnemonic::Sti => self.emit("cpu.flags |= FLAG_IF;", orig),
            Mnemonic::Sahf => {
                self.emit("cpu.flags = (cpu.flags & 0xFF00) | cpu.ah;", orig)
            }
            Mnemonic::Lahf => {
                self.emit("cpu.ah = (uint8_t)(cpu.flags & 0xFF);", orig)
            }

            // misc
            Mnemonic::Nop => self.emit("/* nop */", orig),
            Mnemonic::Xlat => self.emit(
                "cpu.al = mem_read8(cpu, cpu.ds, (uint16_t)(cpu.bx + cpu.al));",
                orig,
            ),
            Mnemonic::Hlt => self.emit("cpu.halted = 1; return;", orig),
            Mnemonic::Iret => {
                self.emit("/* iret - return from interrupt */", orig);
                self.emit("return;", None);
            }
            Mnemonic::Enter => {
                if let Some(Operand::Imm16(size)) = op1 {
                    self.emit(
                        &format!(
                            "push16(cpu, cpu.bp); cpu.bp = cpu.sp; cpu.sp -= 0x{size:X};"
                        ),
                        orig,
                    );
                }
            }
            Mnemonic::Leave => {
                self.emit("cpu.sp = cpu.bp; cpu.bp = pop16(cpu);", orig)
            }
            Mnemonic::In | Mnemonic::Out => {
                self.emit(
                    &format!("/* {} - port I/O stub */", ins),
                    orig,
                );
            }
            Mnemonic::Wait => self.emit("/* wait */", orig),
            Mnemonic::Esc(_) => {
                self.emit(&format!("/* FPU: {ins} */"), orig)
            }
            Mnemonic::Db => {
                let byte = match op1 {
                    Some(Operand::Imm8(byte)) => byte,
                    _ => 0,
                };
                self.emit(&format!("/* data byte: 0x{byte:02X} */"), orig);
            }
            Mnemonic::Daa
            | Mnemonic::Das
            | Mnemonic::Aaa
            | Mnemonic::Aas
            | Mnemonic::Aam
            | Mnemonic::Aad => {
                self.emit(&format!("/* BCD: {ins} - stub */"), orig)
            }

            _ => self.unhandled(ins),
        }
    }

    fn unhandled(&mut self, ins: &Ins) {
        let orig = ins.to_string();
        self.emit(&format!("/* UNHANDLED: {orig} */"), Some(&orig));
    }
}

fn strip_rep(ins: &Ins) -> Ins {
    let mut stripped = ins.clone();
    stripped.rep = None;
    stripped
}

fn label(addr: u16) -> String {
    format!("L_{addr:04X}")
}

fn width_bits(op: &Operand) -> u8 {
    match op.width() {
        Width::Byte => 8,
        Width::Word => 16,
    }
}

/// (segment expression, offset expression) for a memory reference.
fn mem_addr(mem: &MemRef) -> (String, String) {
    let seg = format!("cpu.{}", mem.seg.name());

    let mut parts = Vec::new();
    if let Some(base) = mem.base {
        parts.push(format!("cpu.{}", base.name()));
    }
    if let Some(index) = mem.index {
        parts.push(format!("cpu.{}", index.name()));
    }

    let off = if mem.disp != 0 {
        if parts.is_empty() {
            format!("0x{:X}", mem.disp & 0xFFFF)
        } else {
            let disp = if mem.disp < 0 {
                format!("- 0x{:X}", -mem.disp)
            } else {
                format!("+ 0x{:X}", mem.disp)
            };
            format!("(uint16_t)({} {disp})", parts.join(" + "))
        }
    } else if parts.len() == 1 {
        parts.remove(0)
    } else if !parts.is_empty() {
        format!("(uint16_t)({})", parts.join(" + "))
    } else {
        "0".to_string()
    };

    (seg, off)
}

/// Expression reading an operand's value.
fn read(op: &Operand) -> String {
    match op {
        Operand::Reg8(reg) => format!("cpu.{}", reg.name()),
        Operand::Reg16(reg) => format!("cpu.{}", reg.name()),
        Operand::Seg(seg) => format!("cpu.{}", seg.name()),
        Operand::Imm8(value) => format!("0x{value:X}"),
        Operand::Imm16(value) => format!("0x{value:X}"),
        Operand::Mem(mem) => {
            let (seg, off) = mem_addr(mem);
            match mem.width {
                Width::Byte => format!("mem_read8(cpu, {seg}, {off})"),
                Width::Word => format!("mem_read16(cpu, {seg}, {off})"),
            }
        }
        Operand::Moffs { seg, offset, width } => {
            let seg = format!("cpu.{}", seg.name());
            match width {
                Width::Byte => {
                    format!("mem_read8(cpu, {seg}, 0x{offset:X})")
                }
                Width::Word => {
                    format!("mem_read16(cpu, {seg}, 0x{offset:X})")
                }
            }
        }
        _ => "/* ??? */".to_string(),
    }
}

/// Statement writing `value` to an operand.
fn write(op: &Operand, value: &str) -> String {
    match op {
        Operand::Reg8(reg) => {
            format!("cpu.{} = (uint8_t)({value});", reg.name())
        }
        Operand::Reg16(reg) => {
            format!("cpu.{} = (uint16_t)({value});", reg.name())
        }
        Operand::Seg(seg) => {
            format!("cpu.{} = (uint16_t)({value});", seg.name())
        }
        Operand::Mem(mem) => {
            let (seg, off) = mem_addr(mem);
            match mem.width {
                Width::Byte => format!(
                    "mem_write8(cpu, {seg}, {off}, (uint8_t)({value}));"
                ),
                Width::Word => format!(
                    "mem_write16(cpu, {seg}, {off}, (uint16_t)({value}));"
                ),
            }
        }
        Operand::Moffs { seg, offset, width } => {
            let seg = format!("cpu.{}", seg.name());
            match width {
                Width::Byte => format!(
                    "mem_write8(cpu, {seg}, 0x{offset:X}, (uint8_t)({value}));"
                ),
                Width::Word => format!(
                    "mem_write16(cpu, {seg}, 0x{offset:X}, (uint16_t)({value}));"
                ),
            }
        }
        _ => format!("/* write ??? = {value} */;"),
    }
}
