use std::fmt;

/// Instruction mnemonic.
///
/// `Db` is the raw-data pseudo-instruction emitted for unknown opcodes and
/// truncated decodes. `Bad` covers the undefined group 4/5 sub-opcodes.
/// `CallFar`/`JmpFar` are the indirect far forms of group 5; the direct far
/// call/jump keep the plain `Call`/`Jmp` mnemonic with a far operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
    Push,
    Pop,
    Daa,
    Das,
    Aaa,
    Aas,
    Aam,
    Aad,
    Inc,
    Dec,
    Pusha,
    Popa,
    Imul,
    Jo,
    Jno,
    Jb,
    Jae,
    Je,
    Jne,
    Jbe,
    Ja,
    Js,
    Jns,
    Jp,
    Jnp,
    Jl,
    Jge,
    Jle,
    Jg,
    Test,
    Xchg,
    Mov,
    Lea,
    Les,
    Lds,
    Nop,
    Cbw,
    Cwd,
    Call,
    CallFar,
    Jmp,
    JmpFar,
    Wait,
    Pushf,
    Popf,
    Sahf,
    Lahf,
    Movsb,
    Movsw,
    Cmpsb,
    Cmpsw,
    Stosb,
    Stosw,
    Lodsb,
    Lodsw,
    Scasb,
    Scasw,
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sal,
    Sar,
    Ret,
    Retf,
    Enter,
    Leave,
    Int,
    Into,
    Iret,
    Xlat,
    Esc(u8),
    Loopnz,
    Loopz,
    Loop,
    Jcxz,
    In,
    Out,
    Hlt,
    Cmc,
    Not,
    Neg,
    Mul,
    Div,
    Idiv,
    Clc,
    Stc,
    Cli,
    Sti,
    Cld,
    Std,
    Db,
    Bad,
}

impl Mnemonic {
    /// Condition-code predicate helper for the 16 conditional branches.
    pub fn cc_helper(self) -> Option<&'static str> {
        Some(match self {
            Mnemonic::Jo => "cc_o",
            Mnemonic::Jno => "cc_no",
            Mnemonic::Jb => "cc_b",
            Mnemonic::Jae => "cc_ae",
            Mnemonic::Je => "cc_e",
            Mnemonic::Jne => "cc_ne",
            Mnemonic::Jbe => "cc_be",
            Mnemonic::Ja => "cc_a",
            Mnemonic::Js => "cc_s",
            Mnemonic::Jns => "cc_ns",
            Mnemonic::Jp => "cc_p",
            Mnemonic::Jnp => "cc_np",
            Mnemonic::Jl => "cc_l",
            Mnemonic::Jge => "cc_ge",
            Mnemonic::Jle => "cc_le",
            Mnemonic::Jg => "cc_g",
            _ => return None,
        })
    }

    /// True for every mnemonic whose relative operand is an intra-function
    /// branch target (conditional branches, short/near jumps, loop forms).
    pub fn is_branch(self) -> bool {
        self == Mnemonic::Jmp
            || self.cc_helper().is_some()
            || matches!(
                self,
                Mnemonic::Loop
                    | Mnemonic::Loopz
                    | Mnemonic::Loopnz
                    | Mnemonic::Jcxz
            )
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Mnemonic::Add => "add",
            Mnemonic::Or => "or",
            Mnemonic::Adc => "adc",
            Mnemonic::Sbb => "sbb",
            Mnemonic::And => "and",
            Mnemonic::Sub => "sub",
            Mnemonic::Xor => "xor",
            Mnemonic::Cmp => "cmp",
            Mnemonic::Push => "push",
            Mnemonic::Pop => "pop",
            Mnemonic::Daa => "daa",
            Mnemonic::Das => "das",
            Mnemonic::Aaa => "aaa",
            Mnemonic::Aas => "aas",
            Mnemonic::Aam => "aam",
            Mnemonic::Aad => "aad",
            Mnemonic::Inc => "inc",
            Mnemonic::Dec => "dec",
            Mnemonic::Pusha => "pusha",
            Mnemonic::Popa => "popa",
            Mnemonic::Imul => "imul",
            Mnemonic::Jo => "jo",
            Mnemonic::Jno => "jno",
            Mnemonic::Jb => "jb",
            Mnemonic::Jae => "jae",
            Mnemonic::Je => "je",
            Mnemonic::Jne => "jne",
            Mnemonic::Jbe => "jbe",
            Mnemonic::Ja => "ja",
            Mnemonic::Js => "js",
            Mnemonic::Jns => "jns",
            Mnemonic::Jp => "jp",
            Mnemonic::Jnp => "jnp",
            Mnemonic::Jl => "jl",
            Mnemonic::Jge => "jge",
            Mnemonic::Jle => "jle",
            Mnemonic::Jg => "jg",
            Mnemonic::Test => "test",
            Mnemonic::Xchg => "xchg",
            Mnemonic::Mov => "mov",
            Mnemonic::Lea => "lea",
            Mnemonic::Les => "les",
            Mnemonic::Lds => "lds",
            Mnemonic::Nop => "nop",
            Mnemonic::Cbw => "cbw",
            Mnemonic::Cwd => "cwd",
            Mnemonic::Call => "call",
            Mnemonic::CallFar => "call far",
            Mnemonic::Jmp => "jmp",
            Mnemonic::JmpFar => "jmp far",
            Mnemonic::Wait => "wait",
            Mnemonic::Pushf => "pushf",
            Mnemonic::Popf => "popf",
            Mnemonic::Sahf => "sahf",
            Mnemonic::Lahf => "lahf",
            Mnemonic::Movsb => "movsb",
            Mnemonic::Movsw => "movsw",
            Mnemonic::Cmpsb => "cmpsb",
            Mnemonic::Cmpsw => "cmpsw",
            Mnemonic::Stosb => "stosb",
            Mnemonic::Stosw => "stosw",
            Mnemonic::Lodsb => "lodsb",
            Mnemonic::Lodsw => "lodsw",
            Mnemonic::Scasb => "scasb",
            Mnemonic::Scasw => "scasw",
            Mnemonic::Rol => "rol",
            Mnemonic::Ror => "ror",
            Mnemonic::Rcl => "rcl",
            Mnemonic::Rcr => "rcr",
            Mnemonic::Shl => "shl",
            Mnemonic::Shr => "shr",
            Mnemonic::Sal => "sal",
            Mnemonic::Sar => "sar",
            Mnemonic::Ret => "ret",
            Mnemonic::Retf => "retf",
            Mnemonic::Enter => "enter",
            Mnemonic::Leave => "leave",
            Mnemonic::Int => "int",
            Mnemonic::Into => "into",
            Mnemonic::Iret => "iret",
            Mnemonic::Xlat => "xlat",
            Mnemonic::Esc(unit) => return write!(f, "esc_{unit}"),
            Mnemonic::Loopnz => "loopnz",
            Mnemonic::Loopz => "loopz",
            Mnemonic::Loop => "loop",
            Mnemonic::Jcxz => "jcxz",
            Mnemonic::In => "in",
            Mnemonic::Out => "out",
            Mnemonic::Hlt => "hlt",
            Mnemonic::Cmc => "cmc",
            Mnemonic::Not => "not",
            Mnemonic::Neg => "neg",
            Mnemonic::Mul => "mul",
            Mnemonic::Div => "div",
            Mnemonic::Idiv => "idiv",
            Mnemonic::Clc => "clc",
            Mnemonic::Stc => "stc",
            Mnemonic::Cli => "cli",
            Mnemonic::Sti => "sti",
            Mnemonic::Cld => "cld",
            Mnemonic::Std => "std",
            Mnemonic::Db => "db",
            Mnemonic::Bad => "(bad)",
        };
        f.write_str(text)
    }
}
