//! # z80-mc — Z80 Machine-Code Back End
//!
//! `z80-mc` is the machine-code layer of a Z80 compiler back end: it turns a
//! symbolic [`Instruction`] (opcode + typed operands) into the exact byte
//! sequence a Z80 executes, plus [`Fixup`] records for the byte spans that
//! still depend on unresolved symbols.
//!
//! ## Quick Start
//!
//! ```rust
//! use z80_mc::{encode_to_vec, Instruction, Opcode, Operand, Register};
//!
//! let mi = Instruction::new(Opcode::Add8ar, vec![Operand::Reg(Register::B)]);
//! let (bytes, fixups) = encode_to_vec(&mi).unwrap();
//! assert_eq!(bytes, vec![0x80]);
//! assert!(fixups.is_empty());
//! ```
//!
//! ## Features
//!
//! - **Full ISA coverage** — the 8-bit ALU, load, rotate/shift, bit, stack,
//!   block, and control-flow families, with the irregular `DD`/`FD`/`CB`/`ED`
//!   prefix pages handled per form.
//! - **Index-half synthesis** — operations on `IXH`/`IXL`/`IYH`/`IYL` are
//!   emulated with stack shuttles through `HL`/`DE`; the emitted sequences
//!   are stable ABI.
//! - **Fixups and relocations** — a bit-exact fixup catalog and the mapping
//!   onto Z80 ELF relocation codes.
//! - **`no_std` + `alloc`** — embeddable; `std` only adds `std::error::Error`.
//!
//! Instruction selection, register allocation, parsing, symbol resolution,
//! and object-file serialization live in the surrounding toolchain; this
//! crate is the pure encoding core they share.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An instruction encoder is intrinsically dense with narrowing casts
// (i64→u8 immediates, u16 little-endian splits) and bare hex opcode
// literals (0xCB, 0xFD09). The allowances below acknowledge that instead
// of scattering per-expression attributes.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::missing_errors_doc
)]

extern crate alloc;

/// The instruction encoder: byte/fixup sinks and the opcode dispatch.
pub mod encoder;
/// Error types and source-location tracking.
pub mod error;
/// Fixup kinds, their metadata catalog, and the fixup record.
pub mod fixup;
/// Instruction representation: registers, operands, opcodes.
pub mod ir;
/// Relocation-type mapping and the ELF object-writer contract.
pub mod object;

// Re-exports
pub use encoder::{encode, ByteSink, FixupSink, InstrBytes, MAX_INSTR_LEN};
pub use error::{EncodeError, SourceLoc};
pub use fixup::{force_relocation, Fixup, FixupKind, FixupKindInfo};
pub use ir::{ts_flags, ExprKind, ExprRef, Instruction, Opcode, Operand, Register};
pub use object::{reloc_type, ElfObjectWriter, RelocEntry, RelocType};

use alloc::vec::Vec;

/// Encode one instruction into fresh byte and fixup vectors.
///
/// Convenience wrapper over [`encode`] for callers that do not stream into
/// shared sinks.
///
/// # Errors
///
/// Returns [`EncodeError`] on any shape, range, register-class, or mode
/// violation; see [`encode`].
///
/// # Examples
///
/// ```rust
/// use z80_mc::{encode_to_vec, ExprRef, Instruction, Opcode, Operand};
///
/// let mi = Instruction::new(Opcode::Jq, vec![Operand::Expr(ExprRef::symbol("start"))]);
/// let (bytes, fixups) = encode_to_vec(&mi).unwrap();
/// assert_eq!(bytes, vec![0xC3, 0x00, 0x00]);
/// assert_eq!(fixups[0].offset_in_instruction, 1);
/// ```
pub fn encode_to_vec(mi: &Instruction) -> Result<(Vec<u8>, Vec<Fixup>), EncodeError> {
    let mut bytes = Vec::new();
    let mut fixups = Vec::new();
    encode(mi, &mut bytes, &mut fixups)?;
    Ok((bytes, fixups))
}
