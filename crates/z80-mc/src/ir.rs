//! Instruction representation: registers, operands, opcodes.
//!
//! These types form the boundary between instruction selection and the
//! encoder. They are deliberately closed enumerations — an unknown register
//! or opcode cannot be constructed, so the encoder's interior dispatch is
//! exhaustive by construction.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::error::SourceLoc;

// ─── Registers ───────────────────────────────────────────────────────────

/// Z80 register.
///
/// Covers the 8-bit main registers, the undocumented halves of the index
/// registers, the 16-bit pairs, the index registers, and the stack pointer.
/// No structural relationship between a pair and its halves is encoded in
/// the type; the encoder matches registers by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Register {
    /// A — 8-bit accumulator.
    A,
    /// B — 8-bit general purpose.
    B,
    /// C — 8-bit general purpose.
    C,
    /// D — 8-bit general purpose.
    D,
    /// E — 8-bit general purpose.
    E,
    /// H — high half of HL.
    H,
    /// L — low half of HL.
    L,
    /// IXH — high half of IX (undocumented).
    Ixh,
    /// IXL — low half of IX (undocumented).
    Ixl,
    /// IYH — high half of IY (undocumented).
    Iyh,
    /// IYL — low half of IY (undocumented).
    Iyl,
    /// BC — 16-bit pair.
    Bc,
    /// DE — 16-bit pair.
    De,
    /// HL — 16-bit pair / main pointer register.
    Hl,
    /// AF — accumulator and flags.
    Af,
    /// IX — 16-bit index register.
    Ix,
    /// IY — 16-bit index register.
    Iy,
    /// SP — stack pointer.
    Sp,
}

impl Register {
    /// The register's assembly name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::D => "D",
            Register::E => "E",
            Register::H => "H",
            Register::L => "L",
            Register::Ixh => "IXH",
            Register::Ixl => "IXL",
            Register::Iyh => "IYH",
            Register::Iyl => "IYL",
            Register::Bc => "BC",
            Register::De => "DE",
            Register::Hl => "HL",
            Register::Af => "AF",
            Register::Ix => "IX",
            Register::Iy => "IY",
            Register::Sp => "SP",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Symbolic expressions ────────────────────────────────────────────────

/// Syntactic classification of a symbolic expression.
///
/// The encoder only ever inspects this classification — a bare symbol
/// reference is distinguishable from anything more complex, which is all the
/// call-target check on `CALL16CC` needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    /// A bare reference to a single symbol.
    SymbolRef,
    /// Anything else: binary/unary operators, target-specific wrappers.
    Complex,
}

/// Opaque handle to an external symbolic expression.
///
/// The expression itself lives in the enclosing assembler; the encoder
/// carries the handle through to the fixup record untouched. The symbol name
/// is kept only so the object-writer boundary can name the offender in
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprRef {
    /// Syntactic kind of the referenced expression.
    pub kind: ExprKind,
    /// Name of the (leading) symbol, for diagnostics. Stored as `Rc<str>`
    /// so cloning into fixup records is a refcount bump, not an allocation.
    pub symbol: Rc<str>,
}

impl ExprRef {
    /// A bare reference to `symbol`.
    #[must_use]
    pub fn symbol(symbol: &str) -> Self {
        Self {
            kind: ExprKind::SymbolRef,
            symbol: Rc::from(symbol),
        }
    }

    /// A complex expression whose leading symbol is `symbol`.
    #[must_use]
    pub fn complex(symbol: &str) -> Self {
        Self {
            kind: ExprKind::Complex,
            symbol: Rc::from(symbol),
        }
    }
}

// ─── Operands ────────────────────────────────────────────────────────────

/// One instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// A register.
    Reg(Register),
    /// A signed immediate. Forms that emit a single byte use the low 8 bits.
    Imm(i64),
    /// An unresolved symbolic expression.
    Expr(ExprRef),
}

impl Operand {
    /// The register, if this operand is one.
    #[must_use]
    pub fn reg(&self) -> Option<Register> {
        match self {
            Operand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    /// The immediate value, if this operand is one.
    #[must_use]
    pub fn imm(&self) -> Option<i64> {
        match self {
            Operand::Imm(v) => Some(*v),
            _ => None,
        }
    }

    /// The expression handle, if this operand is one.
    #[must_use]
    pub fn expr(&self) -> Option<&ExprRef> {
        match self {
            Operand::Expr(e) => Some(e),
            _ => None,
        }
    }
}

// ─── Opcodes ─────────────────────────────────────────────────────────────

/// Opcode identifier, naming one encoding form.
///
/// Form-name suffixes describe the operand shape:
/// `r` register, `i` immediate, `p` pointer (`(HL)`-class indirection),
/// `o` offset (`(IX+d)`/`(IY+d)` indexed), `m` memory (16-bit absolute),
/// `g` general 8-bit register (may be an index half), `a` the accumulator
/// (or, in 16-bit forms, the add-target pair), `b` bit index.
/// So `LD8go` loads an 8-bit register from an indexed memory operand, and
/// `ADD16ao` adds `BC`/`DE` to one of `HL`/`IX`/`IY`.
///
/// `JQ`/`JQCC` are pseudo instructions: jumps to a symbol, lowered at encode
/// time. A handful of 16-bit forms are recognized but deliberately have no
/// encoding; see [`crate::encoder::encode`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    // 8-bit ALU, accumulator forms
    Adc8ai,
    Adc8ao,
    Adc8ap,
    Adc8ar,
    Add8ai,
    Add8ao,
    Add8ap,
    Add8ar,
    And8ai,
    And8ao,
    And8ap,
    And8ar,
    Cp8ai,
    Cp8ao,
    Cp8ap,
    Cp8ar,
    Or8ai,
    Or8ao,
    Or8ap,
    Or8ar,
    Sbc8ai,
    Sbc8ao,
    Sbc8ap,
    Sbc8ar,
    Sub8ai,
    Sub8ao,
    Sub8ap,
    Sub8ar,
    Xor8ai,
    Xor8ao,
    Xor8ap,
    Xor8ar,
    // 16-bit address arithmetic
    Add16Sp,
    Add16aa,
    Add16ao,
    Sbc16Sp,
    Sbc16aa,
    Sbc16ao,
    // Bit test/reset/set
    Bit8bg,
    Bit8bo,
    Bit8bp,
    Res8bg,
    Res8bo,
    Res8bp,
    Set8bg,
    Set8bo,
    Set8bp,
    // Rotates and shifts
    Rl8o,
    Rl8p,
    Rl8r,
    Rlc8o,
    Rlc8p,
    Rlc8r,
    Rr8o,
    Rr8p,
    Rr8r,
    Rrc8o,
    Rrc8p,
    Rrc8r,
    Sla8o,
    Sla8p,
    Sla8r,
    Sra8o,
    Sra8p,
    Sra8r,
    Srl8o,
    Srl8p,
    Srl8r,
    // Increment / decrement
    Inc16Sp,
    Inc16r,
    Inc8o,
    Inc8p,
    Inc8r,
    Dec16Sp,
    Dec16r,
    Dec8o,
    Dec8p,
    Dec8r,
    // 8-bit loads
    Ld8am,
    Ld8gg,
    Ld8xx,
    Ld8yy,
    Ld8go,
    Ld8gp,
    Ld8ma,
    Ld8og,
    Ld8oi,
    Ld8pg,
    Ld8pi,
    Ld8ri,
    // 16-bit loads
    Ld16Sp,
    Ld16am,
    Ld16ma,
    Ld16mo,
    Ld16om,
    Ld16ri,
    // Address generation
    Lea16ro,
    // Stack
    Push16Af,
    Push16r,
    Pop16Af,
    Pop16r,
    // Exchanges
    Ex16De,
    Ex16Sp,
    ExAf,
    Exx,
    // Control flow
    Call16,
    Call16Cc,
    Jp16r,
    Ret16,
    Ret16Cc,
    Reti16,
    Retn16,
    // Block transfer / compare / io
    Ldi16,
    Ldir16,
    Ldd16,
    Lddr16,
    Cpi16,
    Cpir16,
    Cpd16,
    Cpdr16,
    Ini16,
    Inir16,
    Ind16,
    Indr16,
    Outi16,
    Outir16,
    Outd16,
    Outdr16,
    // Zero-operand misc
    Ccf,
    Cpl,
    Di,
    Ei,
    Neg,
    Nop,
    Scf,
    // Recognized, deliberately unencoded
    Adc16Sp,
    Adc16aa,
    Adc16ao,
    Jp16,
    Jp16Cc,
    Jr,
    JrCc,
    Ld16or,
    Ld16pr,
    Ld16ro,
    Ld16rp,
    // Pseudo instructions
    Jq,
    JqCc,
}

impl Opcode {
    /// The canonical form name, as used in diagnostics.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Adc8ai => "ADC8ai",
            Opcode::Adc8ao => "ADC8ao",
            Opcode::Adc8ap => "ADC8ap",
            Opcode::Adc8ar => "ADC8ar",
            Opcode::Add8ai => "ADD8ai",
            Opcode::Add8ao => "ADD8ao",
            Opcode::Add8ap => "ADD8ap",
            Opcode::Add8ar => "ADD8ar",
            Opcode::And8ai => "AND8ai",
            Opcode::And8ao => "AND8ao",
            Opcode::And8ap => "AND8ap",
            Opcode::And8ar => "AND8ar",
            Opcode::Cp8ai => "CP8ai",
            Opcode::Cp8ao => "CP8ao",
            Opcode::Cp8ap => "CP8ap",
            Opcode::Cp8ar => "CP8ar",
            Opcode::Or8ai => "OR8ai",
            Opcode::Or8ao => "OR8ao",
            Opcode::Or8ap => "OR8ap",
            Opcode::Or8ar => "OR8ar",
            Opcode::Sbc8ai => "SBC8ai",
            Opcode::Sbc8ao => "SBC8ao",
            Opcode::Sbc8ap => "SBC8ap",
            Opcode::Sbc8ar => "SBC8ar",
            Opcode::Sub8ai => "SUB8ai",
            Opcode::Sub8ao => "SUB8ao",
            Opcode::Sub8ap => "SUB8ap",
            Opcode::Sub8ar => "SUB8ar",
            Opcode::Xor8ai => "XOR8ai",
            Opcode::Xor8ao => "XOR8ao",
            Opcode::Xor8ap => "XOR8ap",
            Opcode::Xor8ar => "XOR8ar",
            Opcode::Add16Sp => "ADD16SP",
            Opcode::Add16aa => "ADD16aa",
            Opcode::Add16ao => "ADD16ao",
            Opcode::Sbc16Sp => "SBC16SP",
            Opcode::Sbc16aa => "SBC16aa",
            Opcode::Sbc16ao => "SBC16ao",
            Opcode::Bit8bg => "BIT8bg",
            Opcode::Bit8bo => "BIT8bo",
            Opcode::Bit8bp => "BIT8bp",
            Opcode::Res8bg => "RES8bg",
            Opcode::Res8bo => "RES8bo",
            Opcode::Res8bp => "RES8bp",
            Opcode::Set8bg => "SET8bg",
            Opcode::Set8bo => "SET8bo",
            Opcode::Set8bp => "SET8bp",
            Opcode::Rl8o => "RL8o",
            Opcode::Rl8p => "RL8p",
            Opcode::Rl8r => "RL8r",
            Opcode::Rlc8o => "RLC8o",
            Opcode::Rlc8p => "RLC8p",
            Opcode::Rlc8r => "RLC8r",
            Opcode::Rr8o => "RR8o",
            Opcode::Rr8p => "RR8p",
            Opcode::Rr8r => "RR8r",
            Opcode::Rrc8o => "RRC8o",
            Opcode::Rrc8p => "RRC8p",
            Opcode::Rrc8r => "RRC8r",
            Opcode::Sla8o => "SLA8o",
            Opcode::Sla8p => "SLA8p",
            Opcode::Sla8r => "SLA8r",
            Opcode::Sra8o => "SRA8o",
            Opcode::Sra8p => "SRA8p",
            Opcode::Sra8r => "SRA8r",
            Opcode::Srl8o => "SRL8o",
            Opcode::Srl8p => "SRL8p",
            Opcode::Srl8r => "SRL8r",
            Opcode::Inc16Sp => "INC16SP",
            Opcode::Inc16r => "INC16r",
            Opcode::Inc8o => "INC8o",
            Opcode::Inc8p => "INC8p",
            Opcode::Inc8r => "INC8r",
            Opcode::Dec16Sp => "DEC16SP",
            Opcode::Dec16r => "DEC16r",
            Opcode::Dec8o => "DEC8o",
            Opcode::Dec8p => "DEC8p",
            Opcode::Dec8r => "DEC8r",
            Opcode::Ld8am => "LD8am",
            Opcode::Ld8gg => "LD8gg",
            Opcode::Ld8xx => "LD8xx",
            Opcode::Ld8yy => "LD8yy",
            Opcode::Ld8go => "LD8go",
            Opcode::Ld8gp => "LD8gp",
            Opcode::Ld8ma => "LD8ma",
            Opcode::Ld8og => "LD8og",
            Opcode::Ld8oi => "LD8oi",
            Opcode::Ld8pg => "LD8pg",
            Opcode::Ld8pi => "LD8pi",
            Opcode::Ld8ri => "LD8ri",
            Opcode::Ld16Sp => "LD16SP",
            Opcode::Ld16am => "LD16am",
            Opcode::Ld16ma => "LD16ma",
            Opcode::Ld16mo => "LD16mo",
            Opcode::Ld16om => "LD16om",
            Opcode::Ld16ri => "LD16ri",
            Opcode::Lea16ro => "LEA16ro",
            Opcode::Push16Af => "PUSH16AF",
            Opcode::Push16r => "PUSH16r",
            Opcode::Pop16Af => "POP16AF",
            Opcode::Pop16r => "POP16r",
            Opcode::Ex16De => "EX16DE",
            Opcode::Ex16Sp => "EX16SP",
            Opcode::ExAf => "EXAF",
            Opcode::Exx => "EXX",
            Opcode::Call16 => "CALL16",
            Opcode::Call16Cc => "CALL16CC",
            Opcode::Jp16r => "JP16r",
            Opcode::Ret16 => "RET16",
            Opcode::Ret16Cc => "RET16CC",
            Opcode::Reti16 => "RETI16",
            Opcode::Retn16 => "RETN16",
            Opcode::Ldi16 => "LDI16",
            Opcode::Ldir16 => "LDIR16",
            Opcode::Ldd16 => "LDD16",
            Opcode::Lddr16 => "LDDR16",
            Opcode::Cpi16 => "CPI16",
            Opcode::Cpir16 => "CPIR16",
            Opcode::Cpd16 => "CPD16",
            Opcode::Cpdr16 => "CPDR16",
            Opcode::Ini16 => "INI16",
            Opcode::Inir16 => "INIR16",
            Opcode::Ind16 => "IND16",
            Opcode::Indr16 => "INDR16",
            Opcode::Outi16 => "OUTI16",
            Opcode::Outir16 => "OUTIR16",
            Opcode::Outd16 => "OUTD16",
            Opcode::Outdr16 => "OUTDR16",
            Opcode::Ccf => "CCF",
            Opcode::Cpl => "CPL",
            Opcode::Di => "DI",
            Opcode::Ei => "EI",
            Opcode::Neg => "NEG",
            Opcode::Nop => "NOP",
            Opcode::Scf => "SCF",
            Opcode::Adc16Sp => "ADC16SP",
            Opcode::Adc16aa => "ADC16aa",
            Opcode::Adc16ao => "ADC16ao",
            Opcode::Jp16 => "JP16",
            Opcode::Jp16Cc => "JP16CC",
            Opcode::Jr => "JR",
            Opcode::JrCc => "JRCC",
            Opcode::Ld16or => "LD16or",
            Opcode::Ld16pr => "LD16pr",
            Opcode::Ld16ro => "LD16ro",
            Opcode::Ld16rp => "LD16rp",
            Opcode::Jq => "JQ",
            Opcode::JqCc => "JQCC",
        }
    }

    /// Whether this opcode is a pseudo instruction, expanded at encode time.
    #[must_use]
    pub fn is_pseudo(self) -> bool {
        matches!(self, Opcode::Jq | Opcode::JqCc)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// ─── Instructions ────────────────────────────────────────────────────────

/// Mode field constants for [`Instruction::ts_flags`].
///
/// The low two bits of `ts_flags` carry the CPU mode the instruction was
/// selected for. Only [`EZ80_MODE`](ts_flags::EZ80_MODE) is load-bearing:
/// the encoder rejects it.
pub mod ts_flags {
    /// Mask over the mode field.
    pub const MODE_MASK: u32 = 0b11;
    /// Plain Z80 (16-bit) mode.
    pub const Z80_MODE: u32 = 0b01;
    /// EZ80 (24-bit) mode — not supported by this encoder.
    pub const EZ80_MODE: u32 = 0b10;
}

/// One machine instruction, ready for encoding.
///
/// Instances are ephemeral: produced by instruction selection, consumed once
/// by [`crate::encoder::encode`], discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// The opcode form.
    pub opcode: Opcode,
    /// Ordered operands, shapes per the opcode form.
    pub operands: Vec<Operand>,
    /// Source location, propagated onto emitted fixups.
    pub loc: SourceLoc,
    /// Target-specific flags; the low bits carry the mode field.
    pub ts_flags: u32,
}

impl Instruction {
    /// Create an instruction in Z80 mode with a dummy location.
    #[must_use]
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self {
            opcode,
            operands,
            loc: SourceLoc::dummy(),
            ts_flags: ts_flags::Z80_MODE,
        }
    }

    /// Same as [`Instruction::new`] with an explicit source location.
    #[must_use]
    pub fn with_loc(opcode: Opcode, operands: Vec<Operand>, loc: SourceLoc) -> Self {
        Self {
            opcode,
            operands,
            loc,
            ts_flags: ts_flags::Z80_MODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec;

    #[test]
    fn register_names() {
        assert_eq!(Register::Ixh.name(), "IXH");
        assert_eq!(Register::Sp.name(), "SP");
        assert_eq!(format!("{}", Register::Iyl), "IYL");
    }

    #[test]
    fn operand_accessors() {
        assert_eq!(Operand::Reg(Register::A).reg(), Some(Register::A));
        assert_eq!(Operand::Reg(Register::A).imm(), None);
        assert_eq!(Operand::Imm(-5).imm(), Some(-5));
        let e = Operand::Expr(ExprRef::symbol("main"));
        assert_eq!(e.expr().unwrap().kind, ExprKind::SymbolRef);
        assert_eq!(&*e.expr().unwrap().symbol, "main");
    }

    #[test]
    fn expr_kinds() {
        assert_eq!(ExprRef::symbol("x").kind, ExprKind::SymbolRef);
        assert_eq!(ExprRef::complex("x").kind, ExprKind::Complex);
    }

    #[test]
    fn opcode_mnemonics() {
        assert_eq!(Opcode::Add8ar.mnemonic(), "ADD8ar");
        assert_eq!(Opcode::Ld16ri.mnemonic(), "LD16ri");
        assert_eq!(Opcode::Outdr16.mnemonic(), "OUTDR16");
        assert_eq!(format!("{}", Opcode::Jq), "JQ");
    }

    #[test]
    fn pseudo_classification() {
        assert!(Opcode::Jq.is_pseudo());
        assert!(Opcode::JqCc.is_pseudo());
        assert!(!Opcode::Call16.is_pseudo());
        assert!(!Opcode::Jr.is_pseudo());
    }

    #[test]
    fn instruction_defaults_to_z80_mode() {
        let mi = Instruction::new(Opcode::Nop, vec![]);
        assert_eq!(mi.ts_flags & ts_flags::MODE_MASK, ts_flags::Z80_MODE);
    }
}
