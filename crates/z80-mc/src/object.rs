//! Relocation-type mapping and the ELF object-writer contract.
//!
//! The object writer proper (section layout, symbol table, serialization)
//! lives outside this crate. What lives here is the boundary it depends on:
//! the pure mapping from fixup kinds onto Z80 ELF relocation codes, and the
//! handful of ELF identity values a conforming writer must install.

use alloc::vec::Vec;

use crate::fixup::{Fixup, FixupKind};

// ─── ELF identity ────────────────────────────────────────────────────────

/// ELF machine code for the Zilog Z80.
pub const EM_Z80: u16 = 220;

/// OS/ABI value for standalone (embedded) applications — the default for
/// this toolchain.
pub const ELFOSABI_STANDALONE: u8 = 255;

/// Machine-specific e_flags bit marking plain Z80 (as opposed to derivative
/// cores) object code.
pub const EF_Z80_MACH_Z80: u32 = 0x1;

// ─── Relocation codes ────────────────────────────────────────────────────

/// Z80 ELF relocation types.
///
/// The numeric values are the wire encoding written into relocation entries
/// and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
#[allow(non_camel_case_types)]
pub enum RelocType {
    /// No relocation.
    R_Z80_NONE = 0,
    /// 8-bit absolute.
    R_Z80_8 = 1,
    /// 8-bit indexed-addressing displacement.
    R_Z80_8_DIS = 2,
    /// 8-bit PC-relative.
    R_Z80_8_PCREL = 3,
    /// 16-bit absolute, little-endian.
    R_Z80_16 = 4,
    /// 24-bit absolute.
    R_Z80_24 = 5,
    /// 32-bit absolute.
    R_Z80_32 = 6,
    /// Byte 0 of a wider value.
    R_Z80_BYTE0 = 7,
    /// Byte 1 of a wider value.
    R_Z80_BYTE1 = 8,
    /// Byte 2 of a wider value.
    R_Z80_BYTE2 = 9,
    /// Byte 3 of a wider value.
    R_Z80_BYTE3 = 10,
    /// Low word of a wider value.
    R_Z80_WORD0 = 11,
    /// High word of a wider value.
    R_Z80_WORD1 = 12,
    /// 16-bit absolute, big-endian.
    R_Z80_16_BE = 13,
}

/// Map a fixup kind onto its ELF relocation code.
///
/// Total over [`FixupKind`]: the generic 1/2/4-byte data kinds coalesce onto
/// the same codes as `fixup_8`/`fixup_16`/`fixup_32`.
///
/// # Panics
///
/// Panics if `is_pc_rel` disagrees with the kind — only `fixup_8_pcrel` is
/// PC-relative. The symbol name, when available, is included in the panic
/// message.
#[must_use]
pub fn reloc_type(kind: FixupKind, is_pc_rel: bool, symbol: Option<&str>) -> RelocType {
    assert!(
        is_pc_rel == (kind == FixupKind::Fixup8Pcrel),
        "PC-relative flag mismatch for {} (symbol: {})",
        kind.info().name,
        symbol.unwrap_or("(none)")
    );
    match kind {
        FixupKind::Data1 | FixupKind::Fixup8 => RelocType::R_Z80_8,
        FixupKind::Fixup8Dis => RelocType::R_Z80_8_DIS,
        FixupKind::Fixup8Pcrel => RelocType::R_Z80_8_PCREL,
        FixupKind::Data2 | FixupKind::Fixup16 => RelocType::R_Z80_16,
        FixupKind::Fixup24 => RelocType::R_Z80_24,
        FixupKind::Data4 | FixupKind::Fixup32 => RelocType::R_Z80_32,
        FixupKind::FixupByte0 => RelocType::R_Z80_BYTE0,
        FixupKind::FixupByte1 => RelocType::R_Z80_BYTE1,
        FixupKind::FixupByte2 => RelocType::R_Z80_BYTE2,
        FixupKind::FixupByte3 => RelocType::R_Z80_BYTE3,
        FixupKind::FixupWord0 => RelocType::R_Z80_WORD0,
        FixupKind::FixupWord1 => RelocType::R_Z80_WORD1,
        FixupKind::Fixup16Be => RelocType::R_Z80_16_BE,
    }
}

// ─── Object-writer contract ──────────────────────────────────────────────

/// A relocation entry, ready for the object file's RELA section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelocEntry {
    /// Byte offset of the patched field, instruction-relative as recorded by
    /// the encoder; the caller rebases it onto the section offset.
    pub offset: u32,
    /// The relocation code.
    pub reloc: RelocType,
    /// Name of the target symbol.
    pub symbol: alloc::rc::Rc<str>,
}

/// The ELF header configuration a Z80 object writer installs, and the
/// fixup-to-relocation conversion it performs.
///
/// ELF class 32, little-endian data, explicit addends (RELA): all fixed for
/// this target. The OS/ABI byte is caller-supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfObjectWriter {
    os_abi: u8,
    eflags: u32,
}

impl ElfObjectWriter {
    /// Create a writer with the given OS/ABI byte.
    #[must_use]
    pub fn new(os_abi: u8) -> Self {
        Self { os_abi, eflags: 0 }
    }

    /// The OS/ABI byte for the ELF identification.
    #[must_use]
    pub fn os_abi(&self) -> u8 {
        self.os_abi
    }

    /// ELF machine code: always [`EM_Z80`].
    #[must_use]
    pub fn machine(&self) -> u16 {
        EM_Z80
    }

    /// ELF class: always 32-bit.
    #[must_use]
    pub fn is_64_bit(&self) -> bool {
        false
    }

    /// Data encoding: always little-endian.
    #[must_use]
    pub fn is_little_endian(&self) -> bool {
        true
    }

    /// Relocation style: always explicit addends (RELA).
    #[must_use]
    pub fn has_relocation_addend(&self) -> bool {
        true
    }

    /// Machine-specific header flags accumulated so far.
    #[must_use]
    pub fn header_flags(&self) -> u32 {
        self.eflags
    }

    /// Mark the start of the output stream: ORs the Z80 machine flag into
    /// the header flags.
    pub fn begin_stream(&mut self) {
        self.eflags |= EF_Z80_MACH_Z80;
    }

    /// Convert encoder fixups into relocation entries.
    #[must_use]
    pub fn relocations(&self, fixups: &[Fixup]) -> Vec<RelocEntry> {
        fixups
            .iter()
            .map(|f| RelocEntry {
                offset: f.offset_in_instruction,
                reloc: reloc_type(
                    f.kind,
                    f.kind.info().is_pc_relative,
                    Some(&*f.value.symbol),
                ),
                symbol: f.value.symbol.clone(),
            })
            .collect()
    }
}

impl Default for ElfObjectWriter {
    fn default() -> Self {
        Self::new(ELFOSABI_STANDALONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceLoc;
    use crate::ir::ExprRef;
    use alloc::vec;

    #[test]
    fn mapping_is_total_and_stable() {
        let cases = [
            (FixupKind::Fixup8, RelocType::R_Z80_8),
            (FixupKind::Fixup8Dis, RelocType::R_Z80_8_DIS),
            (FixupKind::Fixup16, RelocType::R_Z80_16),
            (FixupKind::Fixup24, RelocType::R_Z80_24),
            (FixupKind::Fixup32, RelocType::R_Z80_32),
            (FixupKind::FixupByte0, RelocType::R_Z80_BYTE0),
            (FixupKind::FixupByte1, RelocType::R_Z80_BYTE1),
            (FixupKind::FixupByte2, RelocType::R_Z80_BYTE2),
            (FixupKind::FixupByte3, RelocType::R_Z80_BYTE3),
            (FixupKind::FixupWord0, RelocType::R_Z80_WORD0),
            (FixupKind::FixupWord1, RelocType::R_Z80_WORD1),
            (FixupKind::Fixup16Be, RelocType::R_Z80_16_BE),
        ];
        for (kind, expected) in cases {
            assert_eq!(reloc_type(kind, false, None), expected);
        }
        assert_eq!(
            reloc_type(FixupKind::Fixup8Pcrel, true, None),
            RelocType::R_Z80_8_PCREL
        );
    }

    #[test]
    fn data_kinds_coalesce() {
        assert_eq!(reloc_type(FixupKind::Data1, false, None), RelocType::R_Z80_8);
        assert_eq!(reloc_type(FixupKind::Data2, false, None), RelocType::R_Z80_16);
        assert_eq!(reloc_type(FixupKind::Data4, false, None), RelocType::R_Z80_32);
    }

    #[test]
    #[should_panic(expected = "PC-relative flag mismatch")]
    fn pcrel_mismatch_panics() {
        let _ = reloc_type(FixupKind::Fixup16, true, Some("main"));
    }

    #[test]
    fn writer_header_contract() {
        let mut w = ElfObjectWriter::default();
        assert_eq!(w.os_abi(), ELFOSABI_STANDALONE);
        assert_eq!(w.machine(), EM_Z80);
        assert!(!w.is_64_bit());
        assert!(w.is_little_endian());
        assert!(w.has_relocation_addend());
        assert_eq!(w.header_flags(), 0);
        w.begin_stream();
        assert_eq!(w.header_flags() & EF_Z80_MACH_Z80, EF_Z80_MACH_Z80);
    }

    #[test]
    fn fixups_become_relocations() {
        let w = ElfObjectWriter::default();
        let fixups = vec![Fixup {
            offset_in_instruction: 1,
            value: ExprRef::symbol("target"),
            kind: FixupKind::Fixup16,
            loc: SourceLoc::dummy(),
        }];
        let relocs = w.relocations(&fixups);
        assert_eq!(relocs.len(), 1);
        assert_eq!(relocs[0].offset, 1);
        assert_eq!(relocs[0].reloc, RelocType::R_Z80_16);
        assert_eq!(&*relocs[0].symbol, "target");
    }
}
