//! Z80 instruction encoder.
//!
//! Turns one [`Instruction`] into machine-code bytes plus the fixup records
//! for any symbolic operands. The dispatch is organized as one helper per
//! encoding family (immediate/register/pointer/indexed ALU, rotates, bit
//! ops, the load matrix) driven by small per-family tables of primary
//! opcode bytes, plus shuttle templates for the index-half expansions.
//!
//! Operations on the undocumented index halves `IXH`/`IXL`/`IYH`/`IYL`
//! mostly have no direct encoding when they would collide with `H`/`L`; the
//! encoder emulates them by spilling the index register through the stack
//! into `HL` (or `DE` when `HL` itself participates), operating on the
//! visible half, and unwinding. The exact spill sequences are ABI — size
//! estimators and debuggers downstream pattern-match them — so they must
//! not be "improved".

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{EncodeError, SourceLoc};
use crate::fixup::{Fixup, FixupKind};
use crate::ir::{ts_flags, ExprKind, ExprRef, Instruction, Opcode, Operand, Register};

// ─── Sinks ───────────────────────────────────────────────────────────────

/// Append-only byte writer the encoder emits into.
pub trait ByteSink {
    /// Append one byte.
    fn push_byte(&mut self, byte: u8);
}

impl ByteSink for Vec<u8> {
    #[inline]
    fn push_byte(&mut self, byte: u8) {
        self.push(byte);
    }
}

impl ByteSink for InstrBytes {
    #[inline]
    fn push_byte(&mut self, byte: u8) {
        self.push(byte);
    }
}

/// Append-only writer of fixup records.
pub trait FixupSink {
    /// Append one fixup record.
    fn push_fixup(&mut self, fixup: Fixup);
}

impl FixupSink for Vec<Fixup> {
    #[inline]
    fn push_fixup(&mut self, fixup: Fixup) {
        self.push(fixup);
    }
}

// ─── InstrBytes: stack-allocated instruction buffer ──────────────────────

/// Maximum encoded length of any single instruction.
///
/// The longest real sequences are the cross-index `LD` shuffle (14 bytes)
/// and the `LEA16ro` expansion (up to 18 bytes); 32 leaves headroom and is
/// the bound the encoder guarantees.
pub const MAX_INSTR_LEN: usize = 32;

/// Stack-allocated instruction byte buffer — a [`ByteSink`] that never
/// touches the heap.
#[derive(Clone)]
pub struct InstrBytes {
    data: [u8; MAX_INSTR_LEN],
    len: u8,
}

impl InstrBytes {
    /// Create an empty buffer.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0; MAX_INSTR_LEN],
            len: 0,
        }
    }

    /// Append a single byte.
    ///
    /// # Panics
    ///
    /// Panics if the buffer already holds [`MAX_INSTR_LEN`] bytes.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        assert!(
            (self.len as usize) < MAX_INSTR_LEN,
            "InstrBytes overflow: cannot push beyond {} bytes",
            MAX_INSTR_LEN
        );
        self.data[self.len as usize] = byte;
        self.len += 1;
    }

    /// Number of bytes in the buffer.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert to a heap-allocated `Vec<u8>`.
    #[inline]
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_ref().to_vec()
    }
}

impl Default for InstrBytes {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for InstrBytes {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl AsRef<[u8]> for InstrBytes {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl core::fmt::Debug for InstrBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for InstrBytes {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for InstrBytes {}

impl PartialEq<[u8]> for InstrBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

impl PartialEq<Vec<u8>> for InstrBytes {
    fn eq(&self, other: &Vec<u8>) -> bool {
        **self == **other
    }
}

// ─── Register code tables ────────────────────────────────────────────────

// Stack opcodes the shuttle templates are built from.
const PUSH_HL: u8 = 0xE5;
const POP_HL: u8 = 0xE1;
const PUSH_DE: u8 = 0xD5;
const POP_DE: u8 = 0xD1;

/// Standard r-table code for a main 8-bit register.
fn gpr_code(reg: Register) -> Option<u8> {
    match reg {
        Register::B => Some(0),
        Register::C => Some(1),
        Register::D => Some(2),
        Register::E => Some(3),
        Register::H => Some(4),
        Register::L => Some(5),
        Register::A => Some(7),
        _ => None,
    }
}

/// Prefix byte and H/L r-code for an index half.
///
/// Once the owning index register has been shuttled into `HL`, the half is
/// addressed as `H` (code 4) or `L` (code 5).
fn index_half(reg: Register) -> Option<(u8, u8)> {
    match reg {
        Register::Ixh => Some((0xDD, 4)),
        Register::Ixl => Some((0xDD, 5)),
        Register::Iyh => Some((0xFD, 4)),
        Register::Iyl => Some((0xFD, 5)),
        _ => None,
    }
}

/// Prefix byte for an index register.
fn index_prefix(reg: Register) -> Option<u8> {
    match reg {
        Register::Ix => Some(0xDD),
        Register::Iy => Some(0xFD),
        _ => None,
    }
}

// ─── Emitter ─────────────────────────────────────────────────────────────

/// Tracks the byte position within the instruction being encoded, so fixup
/// offsets are instruction-relative regardless of what the caller's sink
/// already contains.
struct Emitter<'a, B: ByteSink, F: FixupSink> {
    out: &'a mut B,
    fixups: &'a mut F,
    cur: u32,
    loc: SourceLoc,
}

impl<B: ByteSink, F: FixupSink> Emitter<'_, B, F> {
    fn byte(&mut self, byte: u8) {
        self.out.push_byte(byte);
        self.cur += 1;
    }

    fn bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.byte(b);
        }
    }

    /// Record a fixup whose payload starts at the current position. The
    /// placeholder bytes are emitted by the caller afterwards.
    fn fixup(&mut self, value: &ExprRef, kind: FixupKind) {
        self.fixups.push_fixup(Fixup {
            offset_in_instruction: self.cur,
            value: value.clone(),
            kind,
            loc: self.loc,
        });
    }

    /// Emit a 16-bit absolute field: little-endian for an immediate, a
    /// `fixup_16` plus two zero placeholders for an expression.
    fn abs16(
        &mut self,
        mnemonic: &'static str,
        op: &Operand,
        wrong_kind: &'static str,
    ) -> Result<(), EncodeError> {
        match op {
            Operand::Expr(expr) => {
                self.fixup(expr, FixupKind::Fixup16);
                self.byte(0x00);
                self.byte(0x00);
                Ok(())
            }
            Operand::Imm(value) => {
                let value = *value as u16;
                self.byte((value & 0xFF) as u8);
                self.byte((value >> 8) as u8);
                Ok(())
            }
            Operand::Reg(_) => Err(EncodeError::OperandKind {
                mnemonic,
                detail: String::from(wrong_kind),
            }),
        }
    }
}

// ─── Operand shape checks ────────────────────────────────────────────────

fn check_count(mi: &Instruction, expected: usize) -> Result<(), EncodeError> {
    if mi.operands.len() != expected {
        return Err(EncodeError::OperandCount {
            mnemonic: mi.opcode.mnemonic(),
            expected,
            actual: mi.operands.len(),
        });
    }
    Ok(())
}

fn check_nonempty(mi: &Instruction) -> Result<(), EncodeError> {
    if mi.operands.is_empty() {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("Operand missing."),
        });
    }
    Ok(())
}

fn reg_operand(mi: &Instruction, index: usize, msg: &'static str) -> Result<Register, EncodeError> {
    mi.operands[index].reg().ok_or_else(|| EncodeError::OperandKind {
        mnemonic: mi.opcode.mnemonic(),
        detail: String::from(msg),
    })
}

fn imm_operand(mi: &Instruction, index: usize, msg: &'static str) -> Result<i64, EncodeError> {
    mi.operands[index].imm().ok_or_else(|| EncodeError::OperandKind {
        mnemonic: mi.opcode.mnemonic(),
        detail: String::from(msg),
    })
}

fn bit_index(mi: &Instruction, index: usize, msg: &'static str) -> Result<u8, EncodeError> {
    let value = imm_operand(mi, index, "First operand should be immediate.")?;
    if (value as u8) >= 8 {
        return Err(EncodeError::ImmediateRange {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from(msg),
        });
    }
    Ok(value as u8)
}

fn register_class(mi: &Instruction, detail: &'static str) -> EncodeError {
    EncodeError::RegisterClass {
        mnemonic: mi.opcode.mnemonic(),
        detail,
    }
}

/// Prefix for an `(IX+d)`/`(IY+d)` pointer operand.
fn index_prefix_checked(
    mi: &Instruction,
    reg: Register,
    detail: &'static str,
) -> Result<u8, EncodeError> {
    index_prefix(reg).ok_or_else(|| register_class(mi, detail))
}

// ─── Index-half shuttle templates ────────────────────────────────────────

/// Run `body` with the index register owning `prefix` shuttled into `HL`.
///
/// `write_back` additionally copies `HL` back into the index register before
/// unwinding, for operations that modify the half.
fn via_hl<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    prefix: u8,
    write_back: bool,
    body: impl FnOnce(&mut Emitter<'_, B, F>),
) {
    em.byte(PUSH_HL);
    em.byte(prefix);
    em.byte(PUSH_HL); // PUSH IX|IY (prefixed)
    em.byte(POP_HL);
    body(em);
    if write_back {
        em.byte(PUSH_HL);
        em.byte(prefix);
        em.byte(POP_HL); // POP IX|IY (prefixed)
    }
    em.byte(POP_HL);
}

/// Same as [`via_hl`] but shuttling through `DE`, for operations where `HL`
/// itself participates (as `H`/`L` or as the `(HL)` pointer). The half is
/// then addressed as `D` (code 2) or `E` (code 3).
fn via_de<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    prefix: u8,
    write_back: bool,
    body: impl FnOnce(&mut Emitter<'_, B, F>),
) {
    em.byte(PUSH_DE);
    em.byte(prefix);
    em.byte(PUSH_HL); // PUSH IX|IY (prefixed)
    em.byte(POP_DE);
    body(em);
    if write_back {
        em.byte(PUSH_DE);
        em.byte(prefix);
        em.byte(POP_HL); // POP IX|IY (prefixed)
    }
    em.byte(POP_DE);
}

/// `LD` between halves of different index registers: both shuttles nested.
/// The destination register lands in `HL`, the source in `DE`, the move is
/// an ordinary `LD H|L, D|E`, and the unwind restores `DE`, `HL`, and the
/// written index register to their proper values.
fn cross_index_ld<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    dst_prefix: u8,
    dst_code: u8,
    src_prefix: u8,
    src_code: u8,
) {
    em.byte(PUSH_HL);
    em.byte(PUSH_DE);
    em.byte(dst_prefix);
    em.byte(PUSH_HL); // PUSH dst index
    em.byte(POP_HL);
    em.byte(src_prefix);
    em.byte(PUSH_HL); // PUSH src index
    em.byte(POP_DE);
    em.byte(0x40 | (dst_code << 3) | de_code(src_code)); // LD H|L, D|E
    em.byte(PUSH_HL);
    em.byte(dst_prefix);
    em.byte(POP_HL); // POP dst index
    em.byte(POP_DE);
    em.byte(POP_HL);
}

/// `D`/`E` r-code for an index half accessed through the `DE` shuttle.
fn de_code(hl_code: u8) -> u8 {
    hl_code - 2
}

// ─── 8-bit ALU families ──────────────────────────────────────────────────

/// `<OP> A, n` — fixed opcode byte plus the immediate.
fn alu_imm<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    opcode: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 1)?;
    let value = imm_operand(mi, 0, "Operand should be immediate.")?;
    em.byte(opcode);
    em.byte(value as u8);
    Ok(())
}

/// `<OP> A, (IX|IY + d)` — prefix, opcode-6 byte, displacement.
fn alu_idx<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    opcode: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let reg = reg_operand(mi, 0, "First operand should be register.")?;
    let disp = imm_operand(mi, 1, "Second operand should be immediate.")?;
    let prefix = index_prefix_checked(mi, reg, "Allowed registers are IX, IY.")?;
    em.byte(prefix);
    em.byte(opcode);
    em.byte(disp as u8);
    Ok(())
}

/// `<OP> A, (HL)` — the opcode-6 byte; HL is the only accepted pointer.
fn alu_ptr<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    opcode: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 1)?;
    let reg = reg_operand(mi, 0, "Operand should be register.")?;
    if reg != Register::Hl {
        return Err(register_class(mi, "The only allowed register is HL."));
    }
    em.byte(opcode);
    Ok(())
}

/// `<OP> A, r` — base opcode ORed with the r-code. Index halves go through
/// the `HL` shuttle; the result lands in `A`, so no write-back.
fn alu_reg<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    base: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 1)?;
    let reg = reg_operand(mi, 0, "Operand should be register.")?;
    if let Some(code) = gpr_code(reg) {
        em.byte(base | code);
        return Ok(());
    }
    if let Some((prefix, code)) = index_half(reg) {
        via_hl(em, prefix, false, |em| em.byte(base | code));
        return Ok(());
    }
    Err(register_class(mi, "Allowed registers are A, B, C, D, E, H, L."))
}

// ─── Increment / decrement ───────────────────────────────────────────────

/// `INC r` / `DEC r` — `base | (r << 3)`. Index halves modify the half, so
/// the shuttle writes back.
fn inc_dec_reg<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    base: u8,
) -> Result<(), EncodeError> {
    check_nonempty(mi)?;
    let reg = reg_operand(mi, 0, "An operand should be an register.")?;
    if let Some(code) = gpr_code(reg) {
        em.byte(base | (code << 3));
        return Ok(());
    }
    if let Some((prefix, code)) = index_half(reg) {
        via_hl(em, prefix, true, |em| em.byte(base | (code << 3)));
        return Ok(());
    }
    Err(register_class(mi, "Allowed registers are A, B, C, D, E, H, L."))
}

/// `INC (HL|IX|IY)` / `DEC (HL|IX|IY)` — index forms take an implied zero
/// displacement.
fn inc_dec_ptr<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    opcode: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 1)?;
    let reg = reg_operand(mi, 0, "Operand should be register.")?;
    match reg {
        Register::Hl => em.byte(opcode),
        Register::Ix => em.bytes(&[0xDD, opcode, 0x00]),
        Register::Iy => em.bytes(&[0xFD, opcode, 0x00]),
        _ => return Err(register_class(mi, "Allowed registers are HL, IX, IY.")),
    }
    Ok(())
}

/// `INC (IX|IY + d)` / `DEC (IX|IY + d)`.
fn inc_dec_idx<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    opcode: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let reg = reg_operand(mi, 0, "First operand should be register.")?;
    let disp = imm_operand(mi, 1, "Second operand should be immediate.")?;
    let prefix = index_prefix_checked(mi, reg, "Allowed registers are IX, IY.")?;
    em.byte(prefix);
    em.byte(opcode);
    em.byte(disp as u8);
    Ok(())
}

/// `INC rr` / `DEC rr`.
fn inc_dec_pair<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    bc: u8,
    de: u8,
    hl: u8,
) -> Result<(), EncodeError> {
    check_nonempty(mi)?;
    let reg = reg_operand(mi, 0, "An operand should be an register.")?;
    match reg {
        Register::Bc => em.byte(bc),
        Register::De => em.byte(de),
        Register::Hl => em.byte(hl),
        Register::Ix => em.bytes(&[0xDD, hl]),
        Register::Iy => em.bytes(&[0xFD, hl]),
        _ => {
            return Err(register_class(
                mi,
                "Allowed registers are BC, DE, HL, IX, IY.",
            ))
        }
    }
    Ok(())
}

// ─── Rotates and shifts ──────────────────────────────────────────────────

/// `ROT r` — `CB` page, `sub | r`. Index halves write back.
fn rot_reg<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    sub: u8,
) -> Result<(), EncodeError> {
    check_nonempty(mi)?;
    let reg = reg_operand(mi, 0, "An operand should be an register.")?;
    if let Some(code) = gpr_code(reg) {
        em.bytes(&[0xCB, sub | code]);
        return Ok(());
    }
    if let Some((prefix, code)) = index_half(reg) {
        via_hl(em, prefix, true, |em| em.bytes(&[0xCB, sub | code]));
        return Ok(());
    }
    Err(register_class(mi, "Allowed registers are A, B, C, D, E, H, L."))
}

/// `ROT (HL)`.
fn rot_ptr<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    sub: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 1)?;
    let reg = reg_operand(mi, 0, "Operand should be register.")?;
    if reg != Register::Hl {
        return Err(register_class(mi, "The only allowed register is HL."));
    }
    em.bytes(&[0xCB, sub | 6]);
    Ok(())
}

/// `ROT (IX|IY + d)` — prefixed CB page puts the displacement before the
/// sub-opcode.
fn rot_idx<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    sub: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let reg = reg_operand(mi, 0, "First operand should be register.")?;
    let disp = imm_operand(mi, 1, "Second operand should be immediate.")?;
    let prefix = index_prefix_checked(mi, reg, "Allowed registers are IX, IY.")?;
    em.bytes(&[prefix, 0xCB, disp as u8, sub | 6]);
    Ok(())
}

// ─── BIT / RES / SET ─────────────────────────────────────────────────────

/// `BIT|RES|SET b, r` — CB page, `(b << 3) | base | r`.
///
/// On an index half, `BIT` emits the full restore shuffle while `RES`/`SET`
/// end with a single `POP HL` — this asymmetry is part of the emitted-
/// sequence ABI and is preserved as-is.
fn bit_op_reg<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    base: u8,
    restore_shuffle: bool,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let bit = bit_index(mi, 0, "First operand should be in range 0..7.")?;
    let reg = reg_operand(mi, 1, "Second operand should be register.")?;
    if let Some(code) = gpr_code(reg) {
        em.bytes(&[0xCB, (bit << 3) | base | code]);
        return Ok(());
    }
    if let Some((prefix, code)) = index_half(reg) {
        via_hl(em, prefix, restore_shuffle, |em| {
            em.bytes(&[0xCB, (bit << 3) | base | code]);
        });
        return Ok(());
    }
    Err(register_class(mi, "Allowed registers are A, B, C, D, E, H, L."))
}

/// `BIT|RES|SET b, (IX|IY + d)`.
fn bit_op_idx<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    base: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 3)?;
    let bit = bit_index(mi, 0, "First operand should be in range 0..7.")?;
    let reg = reg_operand(mi, 1, "Second operand should be register.")?;
    let disp = imm_operand(mi, 2, "Third operand should be immediate.")?;
    let prefix = index_prefix_checked(mi, reg, "Allowed registers are IX, IY.")?;
    em.bytes(&[prefix, 0xCB, disp as u8, (bit << 3) | base | 6]);
    Ok(())
}

/// `BIT|RES|SET b, (HL)`. `BIT` additionally accepts `(IX)`/`(IY)` with an
/// implied zero displacement.
fn bit_op_ptr<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    base: u8,
    hl_only: bool,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let bit = bit_index(mi, 0, "First operand should be in range 0..7.")?;
    let reg = reg_operand(mi, 1, "Second operand should be register.")?;
    match reg {
        Register::Hl => em.byte(0xCB),
        Register::Ix if !hl_only => em.bytes(&[0xDD, 0xCB, 0x00]),
        Register::Iy if !hl_only => em.bytes(&[0xFD, 0xCB, 0x00]),
        _ if hl_only => return Err(register_class(mi, "The only allowed register is HL.")),
        _ => return Err(register_class(mi, "Allowed registers are HL, IX, IY.")),
    }
    em.byte((bit << 3) | base | 6);
    Ok(())
}

// ─── 8-bit loads ─────────────────────────────────────────────────────────

/// `LD r, r'` — the full register-to-register matrix, index halves
/// included.
fn ld8_reg_reg<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let (Some(dst), Some(src)) = (mi.operands[0].reg(), mi.operands[1].reg()) else {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("Both operands should be registers."),
        });
    };
    let bad = || register_class(mi, "Allowed registers are A, B, C, D, E, H, L.");

    match (gpr_code(dst), index_half(dst)) {
        // Plain destination.
        (Some(d), _) => match (gpr_code(src), index_half(src)) {
            (Some(s), _) => {
                em.byte(0x40 | (d << 3) | s);
                Ok(())
            }
            (None, Some((src_prefix, s))) => {
                if dst == Register::H || dst == Register::L {
                    // HL holds the shuttled source; read the half as D/E.
                    via_de(em, src_prefix, false, |em| {
                        em.byte(0x40 | (d << 3) | de_code(s));
                    });
                } else {
                    via_hl(em, src_prefix, false, |em| em.byte(0x40 | (d << 3) | s));
                }
                Ok(())
            }
            _ => Err(bad()),
        },
        // Index-half destination: the write must be shuttled back.
        (None, Some((dst_prefix, d))) => match (gpr_code(src), index_half(src)) {
            (Some(s), _) => {
                if src == Register::H || src == Register::L {
                    via_de(em, dst_prefix, true, |em| {
                        em.byte(0x40 | (de_code(d) << 3) | s);
                    });
                } else {
                    via_hl(em, dst_prefix, true, |em| em.byte(0x40 | (d << 3) | s));
                }
                Ok(())
            }
            (None, Some((src_prefix, s))) => {
                if src_prefix == dst_prefix {
                    via_hl(em, dst_prefix, true, |em| em.byte(0x40 | (d << 3) | s));
                } else {
                    cross_index_ld(em, dst_prefix, d, src_prefix, s);
                }
                Ok(())
            }
            _ => Err(bad()),
        },
        _ => Err(bad()),
    }
}

/// `LD r, (IX|IY + d)`.
fn ld8_reg_idx<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 3)?;
    let (Some(dst), Some(ptr)) = (mi.operands[0].reg(), mi.operands[1].reg()) else {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("First two operands should be registers."),
        });
    };
    let disp = imm_operand(mi, 2, "Third operand should be immediate.")?;
    let ptr_prefix =
        index_prefix_checked(mi, ptr, "Allowed second operand registers are IX, IY.")?;

    if let Some((dst_prefix, code)) = index_half(dst) {
        via_hl(em, dst_prefix, true, |em| {
            em.byte(ptr_prefix);
            em.byte(0x46 | (code << 3)); // LD H|L, (IX|IY + d)
            em.byte(disp as u8);
        });
        return Ok(());
    }
    let code = gpr_code(dst).ok_or_else(|| {
        register_class(mi, "Allowed first operand registers are A, B, C, D, E, H, L.")
    })?;
    em.byte(ptr_prefix);
    em.byte(0x46 | (code << 3));
    em.byte(disp as u8);
    Ok(())
}

/// `LD (IX|IY + d), r`.
fn ld8_idx_reg<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 3)?;
    let (Some(ptr), Some(src)) = (mi.operands[0].reg(), mi.operands[2].reg()) else {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("First and third operand should be registers."),
        });
    };
    let disp = imm_operand(mi, 1, "Second operand should be immediate.")?;
    let ptr_prefix = index_prefix_checked(mi, ptr, "Allowed first operand registers are IX, IY.")?;

    if let Some((src_prefix, code)) = index_half(src) {
        // Shuttle the source half into H/L, then store through the pointer.
        via_hl(em, src_prefix, true, |em| {
            em.byte(ptr_prefix);
            em.byte(0x70 | code); // LD (IX|IY + d), H|L
            em.byte(disp as u8);
        });
        return Ok(());
    }
    let code = gpr_code(src).ok_or_else(|| {
        register_class(mi, "Allowed third operand registers are A, B, C, D, E, H, L.")
    })?;
    em.byte(ptr_prefix);
    em.byte(0x70 | code);
    em.byte(disp as u8);
    Ok(())
}

/// `LD r, (HL|IX|IY)` — index pointers take an implied zero displacement.
fn ld8_reg_ptr<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let (Some(dst), Some(ptr)) = (mi.operands[0].reg(), mi.operands[1].reg()) else {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("Both operands should be registers."),
        });
    };
    // HL addresses directly; IX/IY go through their prefix with an implied
    // zero displacement.
    let ptr_prefix = match ptr {
        Register::Hl => None,
        Register::Ix | Register::Iy => index_prefix(ptr),
        _ => return Err(register_class(mi, "Allowed registers are HL, IX, IY.")),
    };
    let emit_load = |em: &mut Emitter<'_, B, F>, code: u8| match ptr_prefix {
        None => em.byte(0x46 | (code << 3)),
        Some(prefix) => {
            em.byte(prefix);
            em.byte(0x46 | (code << 3));
            em.byte(0x00);
        }
    };

    if let Some((dst_prefix, code)) = index_half(dst) {
        // HL may be the pointer, so the destination half shuttles via DE.
        via_de(em, dst_prefix, true, |em| emit_load(em, de_code(code)));
        return Ok(());
    }
    let code = gpr_code(dst).ok_or_else(|| {
        register_class(mi, "Allowed first operand registers are A, B, C, D, E, H, L.")
    })?;
    emit_load(em, code);
    Ok(())
}

/// `LD (HL|IX|IY), r` — the store mirror of [`ld8_reg_ptr`].
fn ld8_ptr_reg<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let (Some(ptr), Some(src)) = (mi.operands[0].reg(), mi.operands[1].reg()) else {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("Both operands should be registers."),
        });
    };
    let ptr_prefix = match ptr {
        Register::Hl => None,
        Register::Ix | Register::Iy => index_prefix(ptr),
        _ => return Err(register_class(mi, "Allowed registers are HL, IX, IY.")),
    };
    let emit_store = |em: &mut Emitter<'_, B, F>, code: u8| match ptr_prefix {
        None => em.byte(0x70 | code),
        Some(prefix) => {
            em.byte(prefix);
            em.byte(0x70 | code);
            em.byte(0x00);
        }
    };

    if let Some((src_prefix, code)) = index_half(src) {
        // Memory is written, not the half: read-only DE shuttle.
        via_de(em, src_prefix, false, |em| emit_store(em, de_code(code)));
        return Ok(());
    }
    let code = gpr_code(src).ok_or_else(|| {
        register_class(mi, "Allowed first operand registers are A, B, C, D, E, H, L.")
    })?;
    emit_store(em, code);
    Ok(())
}

/// `LD r, n`.
fn ld8_reg_imm<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let dst = reg_operand(mi, 0, "First operand should be register.")?;
    let value = imm_operand(mi, 1, "Second operand should be immediate.")?;
    if let Some(code) = gpr_code(dst) {
        em.byte(0x06 | (code << 3));
        em.byte(value as u8);
        return Ok(());
    }
    if let Some((prefix, code)) = index_half(dst) {
        via_hl(em, prefix, true, |em| {
            em.byte(0x06 | (code << 3)); // LD H|L, n
            em.byte(value as u8);
        });
        return Ok(());
    }
    Err(register_class(
        mi,
        "Allowed first operand registers are A, B, C, D, E, H, L.",
    ))
}

/// `LD (IX|IY + d), n`.
fn ld8_idx_imm<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 3)?;
    let ptr = reg_operand(mi, 0, "First operand should be register.")?;
    if mi.operands[1].imm().is_none() || mi.operands[2].imm().is_none() {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("Second and third operand should be immediate."),
        });
    }
    let disp = mi.operands[1].imm().unwrap_or(0);
    let value = mi.operands[2].imm().unwrap_or(0);
    let prefix = index_prefix_checked(mi, ptr, "Allowed registers are IX, IY.")?;
    em.bytes(&[prefix, 0x36, disp as u8, value as u8]);
    Ok(())
}

/// `LD (HL|IX|IY), n` — index pointers take an implied zero displacement.
fn ld8_ptr_imm<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let ptr = reg_operand(mi, 0, "First operand should be register.")?;
    let value = imm_operand(mi, 1, "Second operand should be immediate.")?;
    match ptr {
        Register::Hl => em.byte(0x36),
        Register::Ix => em.bytes(&[0xDD, 0x36, 0x00]),
        Register::Iy => em.bytes(&[0xFD, 0x36, 0x00]),
        _ => return Err(register_class(mi, "Allowed registers are HL, IX, IY.")),
    }
    em.byte(value as u8);
    Ok(())
}

// ─── 16-bit loads ────────────────────────────────────────────────────────

/// `LD rr, nn`.
fn ld16_reg_imm<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let dst = reg_operand(mi, 0, "First operand should be register.")?;
    match dst {
        Register::Bc => em.byte(0x01),
        Register::De => em.byte(0x11),
        Register::Hl => em.byte(0x21),
        Register::Ix => em.bytes(&[0xDD, 0x21]),
        Register::Iy => em.bytes(&[0xFD, 0x21]),
        _ => {
            return Err(register_class(
                mi,
                "Allowed registers are BC, DE, HL, IX, IY.",
            ))
        }
    }
    em.abs16(
        mi.opcode.mnemonic(),
        &mi.operands[1],
        "Second operand should be an expression or immediate.",
    )
}

/// `LD (nn), rr`.
fn ld16_mem_reg<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let src = reg_operand(mi, 1, "Second operand should be register.")?;
    match src {
        Register::Bc => em.bytes(&[0xED, 0x43]),
        Register::De => em.bytes(&[0xED, 0x53]),
        Register::Hl => em.bytes(&[0xED, 0x63]),
        Register::Ix => em.bytes(&[0xDD, 0x22]),
        Register::Iy => em.bytes(&[0xFD, 0x22]),
        _ => {
            return Err(register_class(
                mi,
                "Allowed registers are BC, DE, HL, IX, IY.",
            ))
        }
    }
    em.abs16(
        mi.opcode.mnemonic(),
        &mi.operands[0],
        "First operand should be an expression or immediate.",
    )
}

/// `LD rr, (nn)`.
fn ld16_reg_mem<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let dst = reg_operand(mi, 0, "First operand should be register.")?;
    match dst {
        Register::Bc => em.bytes(&[0xED, 0x4B]),
        Register::De => em.bytes(&[0xED, 0x5B]),
        Register::Hl => em.bytes(&[0xED, 0x6B]),
        Register::Ix => em.bytes(&[0xDD, 0x2A]),
        Register::Iy => em.bytes(&[0xFD, 0x2A]),
        _ => {
            return Err(register_class(
                mi,
                "Allowed registers are BC, DE, HL, IX, IY.",
            ))
        }
    }
    em.abs16(
        mi.opcode.mnemonic(),
        &mi.operands[1],
        "Second operand should be an expression or immediate.",
    )
}

/// `LD HL|IX|IY, (nn)` — the short accumulator-pair form.
fn ld16_acc_mem<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let dst = reg_operand(mi, 0, "First operand should be register.")?;
    emit_hl_prefix(em, mi, dst)?;
    em.byte(0x2A);
    em.abs16(
        mi.opcode.mnemonic(),
        &mi.operands[1],
        "Second operand should be an expression or immediate.",
    )
}

/// `LD (nn), HL|IX|IY`.
fn ld16_mem_acc<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let src = reg_operand(mi, 1, "Second operand should be register.")?;
    emit_hl_prefix(em, mi, src)?;
    em.byte(0x22);
    em.abs16(
        mi.opcode.mnemonic(),
        &mi.operands[0],
        "First operand should be an expression or immediate.",
    )
}

/// Emit the `DD`/`FD` prefix for `IX`/`IY`, nothing for `HL`.
fn emit_hl_prefix<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    reg: Register,
) -> Result<(), EncodeError> {
    match reg {
        Register::Hl => Ok(()),
        Register::Ix => {
            em.byte(0xDD);
            Ok(())
        }
        Register::Iy => {
            em.byte(0xFD);
            Ok(())
        }
        _ => Err(register_class(mi, "Allowed registers are HL, IX, IY.")),
    }
}

// ─── Address arithmetic ──────────────────────────────────────────────────

/// Forms written `OP rr, rr` where both operands must name the same
/// register out of `HL`/`IX`/`IY`: `ADD rr, SP`, `ADD rr, rr`, `EX (SP), rr`.
fn same_pair_op<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    opcode: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    if mi.operands[0].reg().is_none() || mi.operands[1].reg().is_none() {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("Both operands should be registers."),
        });
    }
    if mi.operands[0] != mi.operands[1] {
        return Err(register_class(mi, "Both operands should be the same register."));
    }
    let reg = mi.operands[0].reg().unwrap_or(Register::Hl);
    emit_hl_prefix(em, mi, reg)?;
    em.byte(opcode);
    Ok(())
}

/// `ADD HL|IX|IY, BC|DE` — three-address form with a tied destination.
fn add16_pair<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 3)?;
    if mi.operands.iter().any(|op| op.reg().is_none()) {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("All operands should be registers."),
        });
    }
    if mi.operands[0] != mi.operands[1] {
        return Err(register_class(
            mi,
            "First two of the operands should be the same register.",
        ));
    }
    let dst = mi.operands[0].reg().unwrap_or(Register::Hl);
    match dst {
        Register::Hl => {}
        Register::Ix => em.byte(0xDD),
        Register::Iy => em.byte(0xFD),
        _ => {
            return Err(register_class(
                mi,
                "Allowed first two registers are HL, IX, IY.",
            ))
        }
    }
    match mi.operands[2].reg().unwrap_or(Register::Bc) {
        Register::Bc => em.byte(0x09),
        Register::De => em.byte(0x19),
        _ => return Err(register_class(mi, "Allowed last registers are BC, DE.")),
    }
    Ok(())
}

/// `SBC HL, BC|DE`.
fn sbc16_pair<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 1)?;
    let src = reg_operand(mi, 0, "Operand should be register.")?;
    em.byte(0xED);
    match src {
        Register::Bc => em.byte(0x42),
        Register::De => em.byte(0x52),
        _ => return Err(register_class(mi, "Allowed registers are BC, DE.")),
    }
    Ok(())
}

/// `LEA rr, (IX|IY + d)` — expanded through `AF` preservation and `BC` as
/// the zero-extended displacement.
fn lea16<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 3)?;
    if mi.operands[0].reg().is_none() || mi.operands[1].reg().is_none() {
        return Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("First two operands should be registers."),
        });
    }
    let dst = mi.operands[0].reg().unwrap_or(Register::Bc);
    let src = mi.operands[1].reg().unwrap_or(Register::Ix);
    let disp = imm_operand(mi, 2, "Third operand should be immediate.")?;

    let src_prefix = index_prefix(src).ok_or_else(|| {
        register_class(mi, "Allowed registers in the second operand are IX, IY.")
    })?;
    let dst_differs = dst != src;

    em.byte(0xF5); // PUSH AF
    if dst != Register::Bc {
        em.byte(0xC5); // PUSH BC
    }
    em.bytes(&[0x06, 0x00]); // LD B, 0
    em.bytes(&[0x0E, disp as u8]); // LD C, d
    if dst_differs {
        em.bytes(&[src_prefix, PUSH_HL]); // PUSH IX|IY
    }
    em.bytes(&[src_prefix, 0x09]); // ADD IX|IY, BC
    if dst_differs {
        // The sum is parked on the stack and the index register restored.
        em.bytes(&[src_prefix, PUSH_HL]);
        match dst {
            Register::Bc => em.byte(0xC1),
            Register::De => em.byte(0xD1),
            Register::Hl => em.byte(0xE1),
            Register::Ix => em.bytes(&[0xDD, POP_HL]),
            Register::Iy => em.bytes(&[0xFD, POP_HL]),
            _ => {
                return Err(register_class(
                    mi,
                    "Allowed registers in the first operand are BC, DE, HL, IX, IY.",
                ))
            }
        }
        em.bytes(&[src_prefix, POP_HL]); // POP IX|IY
    }
    if dst != Register::Bc {
        em.byte(0xC1); // POP BC
    }
    em.byte(0xF1); // POP AF
    Ok(())
}

// ─── Pseudo instructions ─────────────────────────────────────────────────

/// `JQ <expr>` — unconditional jump to a symbol. Lowered to the long
/// `JP nn` form with a 16-bit fixup, or to `JR e` with a PC-relative fixup
/// under the `short-jumps` feature.
fn pseudo_jq<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 1)?;
    let expr = mi.operands[0].expr().ok_or_else(|| EncodeError::OperandKind {
        mnemonic: mi.opcode.mnemonic(),
        detail: String::from("Operand should be an expression."),
    })?;
    #[cfg(feature = "short-jumps")]
    {
        em.byte(0x18); // JR e
        em.fixup(expr, FixupKind::Fixup8Pcrel);
        em.byte(0x00);
    }
    #[cfg(not(feature = "short-jumps"))]
    {
        em.byte(0xC3); // JP nn
        em.fixup(expr, FixupKind::Fixup16);
        em.byte(0x00);
        em.byte(0x00);
    }
    Ok(())
}

/// `JQCC <expr>, cc` — conditional variant of [`pseudo_jq`]. The short form
/// (`short-cc-jumps`) only reaches the four conditions `JR cc` supports.
fn pseudo_jqcc<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let expr = mi.operands[0].expr().ok_or_else(|| EncodeError::OperandKind {
        mnemonic: mi.opcode.mnemonic(),
        detail: String::from("First operand should be an expression."),
    })?;
    let cc = imm_operand(mi, 1, "Second operand should be immediate.")?;
    #[cfg(feature = "short-cc-jumps")]
    {
        if (cc as u8) >= 4 {
            return Err(EncodeError::ImmediateRange {
                mnemonic: mi.opcode.mnemonic(),
                detail: String::from("Second operand should be in range 0..3."),
            });
        }
        em.byte(((cc as u8) << 3) | 0x20); // JR cc, e
        em.fixup(expr, FixupKind::Fixup8Pcrel);
        em.byte(0x00);
    }
    #[cfg(not(feature = "short-cc-jumps"))]
    {
        if (cc as u8) >= 8 {
            return Err(EncodeError::ImmediateRange {
                mnemonic: mi.opcode.mnemonic(),
                detail: String::from("Second operand should be in range 0..7."),
            });
        }
        em.byte(((cc as u8) << 3) | 0xC2); // JP cc, nn
        em.fixup(expr, FixupKind::Fixup16);
        em.byte(0x00);
        em.byte(0x00);
    }
    Ok(())
}

// ─── Entry point ─────────────────────────────────────────────────────────

/// Encode one instruction, appending machine-code bytes to `out` and fixup
/// records to `fixups`.
///
/// Fixup offsets are relative to the start of this instruction, whatever
/// `out` already contains. On error the sink may hold a partial prefix of
/// the failed instruction; callers treat any failure as fatal and discard
/// the buffer, so nothing is rewound here.
///
/// # Errors
///
/// Returns [`EncodeError`] for a wrong operand count or tag, an immediate
/// out of range, a register the opcode form does not accept, an instruction
/// tagged for EZ80 mode, or one of the recognized-but-unencoded opcode
/// forms.
pub fn encode<B: ByteSink, F: FixupSink>(
    mi: &Instruction,
    out: &mut B,
    fixups: &mut F,
) -> Result<(), EncodeError> {
    if mi.ts_flags & ts_flags::MODE_MASK == ts_flags::EZ80_MODE {
        return Err(EncodeError::Ez80Mode);
    }

    let em = &mut Emitter {
        out,
        fixups,
        cur: 0,
        loc: mi.loc,
    };

    if mi.opcode.is_pseudo() {
        return match mi.opcode {
            Opcode::Jq => pseudo_jq(em, mi),
            Opcode::JqCc => pseudo_jqcc(em, mi),
            _ => unreachable!(),
        };
    }

    match mi.opcode {
        // ── 8-bit ALU ────────────────────────────────────────
        Opcode::Add8ai => alu_imm(em, mi, 0xC6),
        Opcode::Add8ao => alu_idx(em, mi, 0x86),
        Opcode::Add8ap => alu_ptr(em, mi, 0x86),
        Opcode::Add8ar => alu_reg(em, mi, 0x80),
        Opcode::Adc8ai => alu_imm(em, mi, 0xCE),
        Opcode::Adc8ao => alu_idx(em, mi, 0x8E),
        Opcode::Adc8ap => alu_ptr(em, mi, 0x8E),
        Opcode::Adc8ar => alu_reg(em, mi, 0x88),
        Opcode::Sub8ai => alu_imm(em, mi, 0xD6),
        Opcode::Sub8ao => alu_idx(em, mi, 0x96),
        Opcode::Sub8ap => alu_ptr(em, mi, 0x96),
        Opcode::Sub8ar => alu_reg(em, mi, 0x90),
        Opcode::Sbc8ai => alu_imm(em, mi, 0xDE),
        Opcode::Sbc8ao => alu_idx(em, mi, 0x9E),
        Opcode::Sbc8ap => alu_ptr(em, mi, 0x9E),
        Opcode::Sbc8ar => alu_reg(em, mi, 0x98),
        Opcode::And8ai => alu_imm(em, mi, 0xE6),
        Opcode::And8ao => alu_idx(em, mi, 0xA6),
        Opcode::And8ap => alu_ptr(em, mi, 0xA6),
        Opcode::And8ar => alu_reg(em, mi, 0xA0),
        Opcode::Xor8ai => alu_imm(em, mi, 0xEE),
        Opcode::Xor8ao => alu_idx(em, mi, 0xAE),
        Opcode::Xor8ap => alu_ptr(em, mi, 0xAE),
        Opcode::Xor8ar => alu_reg(em, mi, 0xA8),
        Opcode::Or8ai => alu_imm(em, mi, 0xF6),
        Opcode::Or8ao => alu_idx(em, mi, 0xB6),
        Opcode::Or8ap => alu_ptr(em, mi, 0xB6),
        Opcode::Or8ar => alu_reg(em, mi, 0xB0),
        Opcode::Cp8ai => alu_imm(em, mi, 0xFE),
        Opcode::Cp8ao => alu_idx(em, mi, 0xBE),
        Opcode::Cp8ap => alu_ptr(em, mi, 0xBE),
        Opcode::Cp8ar => alu_reg(em, mi, 0xB8),

        // ── 16-bit address arithmetic ────────────────────────
        Opcode::Add16Sp => same_pair_op(em, mi, 0x39),
        Opcode::Add16aa => same_pair_op(em, mi, 0x29),
        Opcode::Add16ao => add16_pair(em, mi),
        Opcode::Sbc16Sp => fixed(em, mi, &[0xED, 0x72]),
        Opcode::Sbc16aa => fixed(em, mi, &[0xED, 0x62]),
        Opcode::Sbc16ao => sbc16_pair(em, mi),

        // ── Bit test / reset / set ───────────────────────────
        Opcode::Bit8bg => bit_op_reg(em, mi, 0x40, true),
        Opcode::Bit8bo => bit_op_idx(em, mi, 0x40),
        Opcode::Bit8bp => bit_op_ptr(em, mi, 0x40, false),
        Opcode::Res8bg => bit_op_reg(em, mi, 0x80, false),
        Opcode::Res8bo => bit_op_idx(em, mi, 0x80),
        Opcode::Res8bp => bit_op_ptr(em, mi, 0x80, true),
        Opcode::Set8bg => bit_op_reg(em, mi, 0xC0, false),
        Opcode::Set8bo => bit_op_idx(em, mi, 0xC0),
        Opcode::Set8bp => bit_op_ptr(em, mi, 0xC0, true),

        // ── Rotates and shifts ───────────────────────────────
        Opcode::Rlc8o => rot_idx(em, mi, 0x00),
        Opcode::Rlc8p => rot_ptr(em, mi, 0x00),
        Opcode::Rlc8r => rot_reg(em, mi, 0x00),
        Opcode::Rrc8o => rot_idx(em, mi, 0x08),
        Opcode::Rrc8p => rot_ptr(em, mi, 0x08),
        Opcode::Rrc8r => rot_reg(em, mi, 0x08),
        Opcode::Rl8o => rot_idx(em, mi, 0x10),
        Opcode::Rl8p => rot_ptr(em, mi, 0x10),
        Opcode::Rl8r => rot_reg(em, mi, 0x10),
        Opcode::Rr8o => rot_idx(em, mi, 0x18),
        Opcode::Rr8p => rot_ptr(em, mi, 0x18),
        Opcode::Rr8r => rot_reg(em, mi, 0x18),
        Opcode::Sla8o => rot_idx(em, mi, 0x20),
        Opcode::Sla8p => rot_ptr(em, mi, 0x20),
        Opcode::Sla8r => rot_reg(em, mi, 0x20),
        Opcode::Sra8o => rot_idx(em, mi, 0x28),
        Opcode::Sra8p => rot_ptr(em, mi, 0x28),
        Opcode::Sra8r => rot_reg(em, mi, 0x28),
        Opcode::Srl8o => rot_idx(em, mi, 0x38),
        Opcode::Srl8p => rot_ptr(em, mi, 0x38),
        Opcode::Srl8r => rot_reg(em, mi, 0x38),

        // ── Increment / decrement ────────────────────────────
        Opcode::Inc16Sp => fixed(em, mi, &[0x33]),
        Opcode::Inc16r => inc_dec_pair(em, mi, 0x03, 0x13, 0x23),
        Opcode::Inc8o => inc_dec_idx(em, mi, 0x34),
        Opcode::Inc8p => inc_dec_ptr(em, mi, 0x34),
        Opcode::Inc8r => inc_dec_reg(em, mi, 0x04),
        Opcode::Dec16Sp => fixed(em, mi, &[0x3B]),
        Opcode::Dec16r => inc_dec_pair(em, mi, 0x0B, 0x1B, 0x2B),
        Opcode::Dec8o => inc_dec_idx(em, mi, 0x35),
        Opcode::Dec8p => inc_dec_ptr(em, mi, 0x35),
        Opcode::Dec8r => inc_dec_reg(em, mi, 0x05),

        // ── 8-bit loads ──────────────────────────────────────
        Opcode::Ld8am => {
            check_count(mi, 1)?;
            em.byte(0x3A);
            em.abs16(
                mi.opcode.mnemonic(),
                &mi.operands[0],
                "Operand should be an expression or immediate.",
            )
        }
        Opcode::Ld8ma => {
            check_count(mi, 1)?;
            em.byte(0x32);
            em.abs16(
                mi.opcode.mnemonic(),
                &mi.operands[0],
                "Operand should be an expression or immediate.",
            )
        }
        Opcode::Ld8gg | Opcode::Ld8xx | Opcode::Ld8yy => ld8_reg_reg(em, mi),
        Opcode::Ld8go => ld8_reg_idx(em, mi),
        Opcode::Ld8og => ld8_idx_reg(em, mi),
        Opcode::Ld8gp => ld8_reg_ptr(em, mi),
        Opcode::Ld8pg => ld8_ptr_reg(em, mi),
        Opcode::Ld8ri => ld8_reg_imm(em, mi),
        Opcode::Ld8oi => ld8_idx_imm(em, mi),
        Opcode::Ld8pi => ld8_ptr_imm(em, mi),

        // ── 16-bit loads ─────────────────────────────────────
        Opcode::Ld16Sp => {
            check_count(mi, 1)?;
            let reg = reg_operand(mi, 0, "Operand should be register.")?;
            emit_hl_prefix(em, mi, reg)?;
            em.byte(0xF9);
            Ok(())
        }
        Opcode::Ld16ri => ld16_reg_imm(em, mi),
        Opcode::Ld16mo => ld16_mem_reg(em, mi),
        Opcode::Ld16om => ld16_reg_mem(em, mi),
        Opcode::Ld16am => ld16_acc_mem(em, mi),
        Opcode::Ld16ma => ld16_mem_acc(em, mi),

        // ── Address generation ───────────────────────────────
        Opcode::Lea16ro => lea16(em, mi),

        // ── Stack ────────────────────────────────────────────
        Opcode::Push16Af => fixed(em, mi, &[0xF5]),
        Opcode::Pop16Af => fixed(em, mi, &[0xF1]),
        Opcode::Push16r => push_pop(em, mi, 0xC5),
        Opcode::Pop16r => push_pop(em, mi, 0xC1),

        // ── Exchanges ────────────────────────────────────────
        Opcode::Ex16De => fixed(em, mi, &[0xEB]),
        Opcode::Ex16Sp => same_pair_op(em, mi, 0xE3),
        Opcode::ExAf => fixed(em, mi, &[0x08]),
        Opcode::Exx => fixed(em, mi, &[0xD9]),

        // ── Control flow ─────────────────────────────────────
        Opcode::Call16 => {
            check_count(mi, 1)?;
            em.byte(0xCD);
            em.abs16(
                mi.opcode.mnemonic(),
                &mi.operands[0],
                "Operand should be an expression or immediate.",
            )
        }
        Opcode::Call16Cc => call16_cc(em, mi),
        Opcode::Jp16r => {
            check_count(mi, 1)?;
            let reg = reg_operand(mi, 0, "Operand should be register.")?;
            emit_hl_prefix(em, mi, reg)?;
            em.byte(0xE9);
            Ok(())
        }
        Opcode::Ret16 => fixed(em, mi, &[0xC9]),
        Opcode::Ret16Cc => {
            check_count(mi, 1)?;
            let cc = imm_operand(mi, 0, "Operand should be immediate.")?;
            if (cc as u8) >= 8 {
                return Err(EncodeError::ImmediateRange {
                    mnemonic: mi.opcode.mnemonic(),
                    detail: String::from("Operand should be in range 0..7."),
                });
            }
            em.byte(((cc as u8) << 3) | 0xC0);
            Ok(())
        }
        Opcode::Reti16 => fixed(em, mi, &[0xED, 0x4D]),
        Opcode::Retn16 => fixed(em, mi, &[0xED, 0x45]),

        // ── Block operations (all on the ED page) ────────────
        Opcode::Ldi16 => fixed(em, mi, &[0xED, 0xA0]),
        Opcode::Ldir16 => fixed(em, mi, &[0xED, 0xB0]),
        Opcode::Ldd16 => fixed(em, mi, &[0xED, 0xA8]),
        Opcode::Lddr16 => fixed(em, mi, &[0xED, 0xB8]),
        Opcode::Cpi16 => fixed(em, mi, &[0xED, 0xA1]),
        Opcode::Cpir16 => fixed(em, mi, &[0xED, 0xB1]),
        Opcode::Cpd16 => fixed(em, mi, &[0xED, 0xA9]),
        Opcode::Cpdr16 => fixed(em, mi, &[0xED, 0xB9]),
        Opcode::Ini16 => fixed(em, mi, &[0xED, 0xA2]),
        Opcode::Inir16 => fixed(em, mi, &[0xED, 0xB2]),
        Opcode::Ind16 => fixed(em, mi, &[0xED, 0xAA]),
        Opcode::Indr16 => fixed(em, mi, &[0xED, 0xBA]),
        Opcode::Outi16 => fixed(em, mi, &[0xED, 0xA3]),
        Opcode::Outir16 => fixed(em, mi, &[0xED, 0xB3]),
        Opcode::Outd16 => fixed(em, mi, &[0xED, 0xAB]),
        Opcode::Outdr16 => fixed(em, mi, &[0xED, 0xBB]),

        // ── Zero-operand misc ────────────────────────────────
        Opcode::Nop => fixed(em, mi, &[0x00]),
        Opcode::Ccf => fixed(em, mi, &[0x3F]),
        Opcode::Scf => fixed(em, mi, &[0x37]),
        Opcode::Cpl => fixed(em, mi, &[0x2F]),
        Opcode::Di => fixed(em, mi, &[0xF3]),
        Opcode::Ei => fixed(em, mi, &[0xFB]),
        Opcode::Neg => fixed(em, mi, &[0xED, 0x44]),

        // ── Recognized, deliberately unencoded ───────────────
        // Whether earlier passes can actually produce these forms is an
        // open question upstream; until that is settled they fail rather
        // than guess an encoding.
        Opcode::Adc16Sp
        | Opcode::Adc16aa
        | Opcode::Adc16ao
        | Opcode::Jp16
        | Opcode::Jp16Cc
        | Opcode::Jr
        | Opcode::JrCc
        | Opcode::Ld16or
        | Opcode::Ld16pr
        | Opcode::Ld16ro
        | Opcode::Ld16rp => Err(EncodeError::NotImplemented {
            mnemonic: mi.opcode.mnemonic(),
        }),

        // Pseudos are handled before this match.
        Opcode::Jq | Opcode::JqCc => unreachable!(),
    }
}

/// Zero-operand instruction with a fixed byte sequence.
fn fixed<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    bytes: &[u8],
) -> Result<(), EncodeError> {
    check_count(mi, 0)?;
    em.bytes(bytes);
    Ok(())
}

/// `PUSH rr` / `POP rr` — base is the BC form; DE/HL step by 0x10, index
/// registers take the HL form behind their prefix.
fn push_pop<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
    base: u8,
) -> Result<(), EncodeError> {
    check_count(mi, 1)?;
    let reg = reg_operand(mi, 0, "Operand should be register.")?;
    match reg {
        Register::Bc => em.byte(base),
        Register::De => em.byte(base + 0x10),
        Register::Hl => em.byte(base + 0x20),
        Register::Ix => em.bytes(&[0xDD, base + 0x20]),
        Register::Iy => em.bytes(&[0xFD, base + 0x20]),
        _ => {
            return Err(register_class(
                mi,
                "Allowed registers are BC, DE, HL, IX, IY.",
            ))
        }
    }
    Ok(())
}

/// `CALL cc, nn` — expression targets must be bare symbol references.
fn call16_cc<B: ByteSink, F: FixupSink>(
    em: &mut Emitter<'_, B, F>,
    mi: &Instruction,
) -> Result<(), EncodeError> {
    check_count(mi, 2)?;
    let cc = imm_operand(mi, 1, "Second operand should be immediate.")?;
    if (cc as u8) >= 8 {
        return Err(EncodeError::ImmediateRange {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("Second operand should be in range 0..7."),
        });
    }
    em.byte(((cc as u8) << 3) | 0xC4);
    match &mi.operands[0] {
        Operand::Expr(expr) => {
            if expr.kind != ExprKind::SymbolRef {
                return Err(EncodeError::OperandKind {
                    mnemonic: mi.opcode.mnemonic(),
                    detail: String::from("First operand expression should be a call target."),
                });
            }
            em.fixup(expr, FixupKind::Fixup16);
            em.byte(0x00);
            em.byte(0x00);
            Ok(())
        }
        Operand::Imm(value) => {
            let value = *value as u16;
            em.byte((value & 0xFF) as u8);
            em.byte((value >> 8) as u8);
            Ok(())
        }
        Operand::Reg(_) => Err(EncodeError::OperandKind {
            mnemonic: mi.opcode.mnemonic(),
            detail: String::from("First operand should be an expression or immediate."),
        }),
    }
}
