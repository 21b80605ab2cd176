//! Function boundary detection and call graph construction.
//!
//! Function starts are recognized by the compiler prologue pair
//! `push bp` / `mov bp, sp`, optionally followed by `sub sp, imm` for the
//! local frame. Each function extends to the next detected start (or the
//! region end), and code preceding the first prologue in a region is not
//! recorded.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::decode::{Decoder, Mnemonic, Operand, Reg16};
use crate::strings;
use crate::{ExeImage, OverlayModule};

/// Outgoing direct-call edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CallTarget {
    /// Absolute file offset of a near-call target.
    Near(usize),
    /// Raw (segment, offset) pair of a far call, resolved elsewhere.
    Far { seg: u16, off: u16 },
}

/// A detected function.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Function {
    pub name: String,
    /// Start offset within the file.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
    pub size: usize,
    /// Local stack frame size observed at the prologue.
    pub local_size: u16,
    /// Returns with `retf`.
    pub is_far: bool,
    /// Overlay module index, 0 for resident code.
    pub overlay: u8,
    pub calls: Vec<CallTarget>,
    /// Overlay trap call sites as (module, entry offset) pairs.
    pub overlay_calls: Vec<(u8, u16)>,
    pub called_by: Vec<String>,
    pub inst_count: usize,
    pub category: Option<&'static str>,
}

impl Function {
    pub fn is_overlay(&self) -> bool {
        self.overlay != 0
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Result of the whole analysis pass over one executable.
#[derive(Clone, Debug, Default)]
pub struct Analysis {
    pub functions: Vec<Function>,
    pub overlays: Vec<OverlayModule>,
    pub strings: BTreeMap<usize, String>,
}

impl Analysis {
    /// Run the fixed pipeline: discover overlays, sweep the resident window
    /// and every overlay, complete the call graph, extract and apply the
    /// string categories.
    pub fn run(image: &ExeImage) -> Analysis {
        let overlays = image.find_overlays();

        let resident = image.resident_range();
        let mut functions =
            detect_functions(image.data(), resident.start, resident.end, 0);
        for module in &overlays {
            let range = module.code_range();
            functions.extend(detect_functions(
                image.data(),
                range.start,
                range.end,
                module.index,
            ));
        }

        build_call_graph(&mut functions);

        let string_table = strings::extract(image);
        strings::categorize(&mut functions, &string_table);

        Analysis {
            functions,
            overlays,
            strings: string_table,
        }
    }

    pub fn resident_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_overlay())
    }

    pub fn overlay_functions(
        &self,
        index: u8,
    ) -> impl Iterator<Item = &Function> + '_ {
        self.functions.iter().filter(move |f| f.overlay == index)
    }

    pub fn total_instructions(&self) -> usize {
        self.functions.iter().map(|f| f.inst_count).sum()
    }
}

/// Sweep `[start, end)` of the file and return the detected functions in
/// start order. `overlay` is the owning module index, 0 for resident code.
pub fn detect_functions(
    data: &[u8],
    start: usize,
    end: usize,
    overlay: u8,
) -> Vec<Function> {
    let end = end.min(data.len());
    let start = start.min(end);
    let mut decoder = Decoder::new(&data[start..end], start);
    let instructions = decoder.decode_all();

    let mut functions = Vec::new();
    let mut current: Option<Function> = None;

    for (i, ins) in instructions.iter().enumerate() {
        let is_prologue = ins.mnemonic == Mnemonic::Push
            && ins.op1 == Some(Operand::Reg16(Reg16::Bp))
            && instructions.get(i + 1).is_some_and(|next| {
                next.mnemonic == Mnemonic::Mov
                    && next.op1 == Some(Operand::Reg16(Reg16::Bp))
                    && next.op2 == Some(Operand::Reg16(Reg16::Sp))
            });

        if is_prologue {
            if let Some(mut func) = current.take() {
                func.end = ins.offset;
                func.size = func.end - func.start;
                functions.push(func);
            }

            let mut func = Function {
                start: ins.offset,
                overlay,
                ..Function::default()
            };
            // sub sp, imm right after the prologue pair is the local frame
            if let Some(sub) = instructions.get(i + 2) {
                if sub.mnemonic == Mnemonic::Sub
                    && sub.op1 == Some(Operand::Reg16(Reg16::Sp))
                {
                    match sub.op2 {
                        Some(Operand::Imm8(value)) => {
                            func.local_size = u16::from(value)
                        }
                        Some(Operand::Imm16(value)) => func.local_size = value,
                        _ => {}
                    }
                }
            }
            current = Some(func);
        }

        if let Some(func) = current.as_mut() {
            func.inst_count += 1;

            if ins.mnemonic == Mnemonic::Call {
                match ins.op1 {
                    Some(Operand::Rel16(target)) => {
                        func.calls.push(CallTarget::Near(start + target as usize))
                    }
                    Some(Operand::Far { seg, offset }) => {
                        func.calls.push(CallTarget::Far { seg, off: offset })
                    }
                    _ => {}
                }
            }

            if ins.mnemonic == Mnemonic::Int {
                if let Some(target) = ins.overlay {
                    func.overlay_calls.push((target.module, target.entry));
                }
            }

            if ins.mnemonic == Mnemonic::Retf {
                func.is_far = true;
            }
        }
    }

    if let Some(mut func) = current.take() {
        func.end = end;
        func.size = func.end - func.start;
        functions.push(func);
    }

    for func in &mut functions {
        func.name = if overlay == 0 {
            format!("res_{:06X}", func.start)
        } else {
            format!("ovl{overlay:02}_{:06X}", func.start)
        };
    }
    functions
}

/// Second pass over the completed function list: resolve every near-call
/// target to the function containing it and record the caller, once per
/// caller name. Targets outside every function are dropped. Far and overlay
/// calls stay as raw pairs.
pub fn build_call_graph(functions: &mut [Function]) {
    let mut edges = Vec::new();
    for func in functions.iter() {
        for call in &func.calls {
            if let CallTarget::Near(target) = call {
                if let Some(callee) =
                    functions.iter().position(|f| f.contains(*target))
                {
                    edges.push((callee, func.name.clone()));
                }
            }
        }
    }
    for (callee, caller) in edges {
        let called_by = &mut functions[callee].called_by;
        if !called_by.contains(&caller) {
            called_by.push(caller);
        }
    }
}
