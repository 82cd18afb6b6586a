//! Fixup kinds, their metadata catalog, and the fixup record.
//!
//! A fixup marks a byte span inside freshly emitted machine code whose final
//! value depends on a not-yet-known symbol address. The encoder appends
//! fixup records alongside zero placeholder bytes; the object writer later
//! turns each record into a relocation entry.

use crate::error::SourceLoc;
use crate::ir::ExprRef;

/// The set of supported fixup kinds.
///
/// The thirteen target-specific kinds come first and their declaration order
/// is ABI: a target kind's position in this list is its wire encoding in the
/// object writer and its row in [`TARGET_FIXUP_INFO`]. The three `Data*`
/// kinds are the architecture-independent 1/2/4-byte data fixups emitted for
/// data directives rather than instructions; the relocation mapper coalesces
/// them onto the same codes as `Fixup8`/`Fixup16`/`Fixup32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FixupKind {
    /// 8-bit absolute.
    Fixup8,
    /// 8-bit indexed-addressing displacement.
    Fixup8Dis,
    /// 8-bit PC-relative branch displacement.
    Fixup8Pcrel,
    /// 16-bit absolute (call/jump/load targets).
    Fixup16,
    /// 24-bit absolute.
    Fixup24,
    /// 32-bit absolute.
    Fixup32,
    /// Byte 0 of a wider value.
    FixupByte0,
    /// Byte 1 of a wider value.
    FixupByte1,
    /// Byte 2 of a wider value.
    FixupByte2,
    /// Byte 3 of a wider value.
    FixupByte3,
    /// Low word of a wider value.
    FixupWord0,
    /// High word of a wider value.
    FixupWord1,
    /// 16-bit absolute, big-endian. In the catalog for ABI stability; no
    /// encoding currently emits it.
    Fixup16Be,
    /// Generic 1-byte data fixup.
    Data1,
    /// Generic 2-byte data fixup.
    Data2,
    /// Generic 4-byte data fixup.
    Data4,
}

/// Metadata describing how a fixup kind patches bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixupKindInfo {
    /// Catalog name of the kind.
    pub name: &'static str,
    /// Bit offset of the patched field within the emitted bytes.
    pub bit_offset: u32,
    /// Width of the patched field in bits.
    pub bit_width: u32,
    /// Whether the patched value is relative to the program counter.
    pub is_pc_relative: bool,
}

/// Metadata for the thirteen target-specific kinds, in ABI order.
///
/// This table must stay in the same order as the target-specific variants of
/// [`FixupKind`].
pub static TARGET_FIXUP_INFO: [FixupKindInfo; 13] = [
    FixupKindInfo {
        name: "fixup_8",
        bit_offset: 0,
        bit_width: 8,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_8_dis",
        bit_offset: 0,
        bit_width: 8,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_8_pcrel",
        bit_offset: 0,
        bit_width: 8,
        is_pc_relative: true,
    },
    FixupKindInfo {
        name: "fixup_16",
        bit_offset: 0,
        bit_width: 16,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_24",
        bit_offset: 0,
        bit_width: 24,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_32",
        bit_offset: 0,
        bit_width: 32,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_byte0",
        bit_offset: 0,
        bit_width: 32,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_byte1",
        bit_offset: 0,
        bit_width: 32,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_byte2",
        bit_offset: 0,
        bit_width: 32,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_byte3",
        bit_offset: 0,
        bit_width: 32,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_word0",
        bit_offset: 0,
        bit_width: 32,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_word1",
        bit_offset: 0,
        bit_width: 32,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "fixup_16_be",
        bit_offset: 0,
        bit_width: 16,
        is_pc_relative: false,
    },
];

/// Metadata for the generic data kinds.
static DATA_FIXUP_INFO: [FixupKindInfo; 3] = [
    FixupKindInfo {
        name: "FK_Data_1",
        bit_offset: 0,
        bit_width: 8,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "FK_Data_2",
        bit_offset: 0,
        bit_width: 16,
        is_pc_relative: false,
    },
    FixupKindInfo {
        name: "FK_Data_4",
        bit_offset: 0,
        bit_width: 32,
        is_pc_relative: false,
    },
];

impl FixupKind {
    /// Wire index of a target-specific kind (0..=12), `None` for the
    /// generic data kinds.
    #[must_use]
    pub fn target_index(self) -> Option<u8> {
        match self {
            FixupKind::Fixup8 => Some(0),
            FixupKind::Fixup8Dis => Some(1),
            FixupKind::Fixup8Pcrel => Some(2),
            FixupKind::Fixup16 => Some(3),
            FixupKind::Fixup24 => Some(4),
            FixupKind::Fixup32 => Some(5),
            FixupKind::FixupByte0 => Some(6),
            FixupKind::FixupByte1 => Some(7),
            FixupKind::FixupByte2 => Some(8),
            FixupKind::FixupByte3 => Some(9),
            FixupKind::FixupWord0 => Some(10),
            FixupKind::FixupWord1 => Some(11),
            FixupKind::Fixup16Be => Some(12),
            FixupKind::Data1 | FixupKind::Data2 | FixupKind::Data4 => None,
        }
    }

    /// Metadata for this kind. Target kinds resolve through
    /// [`TARGET_FIXUP_INFO`]; the generic data kinds through their own
    /// catalog.
    #[must_use]
    pub fn info(self) -> &'static FixupKindInfo {
        match self.target_index() {
            Some(i) => &TARGET_FIXUP_INFO[i as usize],
            None => match self {
                FixupKind::Data1 => &DATA_FIXUP_INFO[0],
                FixupKind::Data2 => &DATA_FIXUP_INFO[1],
                FixupKind::Data4 => &DATA_FIXUP_INFO[2],
                _ => unreachable!(),
            },
        }
    }

    /// Number of placeholder bytes the encoder emits for this kind.
    #[must_use]
    pub fn byte_width(self) -> u32 {
        self.info().bit_width.div_ceil(8)
    }
}

/// Whether a fixup must be recorded as a relocation even when its target
/// expression resolves to an assembly-time constant.
#[must_use]
pub fn force_relocation(kind: FixupKind) -> bool {
    matches!(
        kind,
        FixupKind::Fixup8Dis | FixupKind::Fixup8Pcrel | FixupKind::Fixup16
    )
}

/// One fixup record, emitted by the encoder and consumed by the object
/// writer.
///
/// Records outlive the encoding call that produced them: the encoder appends
/// them to a caller-supplied sink, and the object writer drains that sink
/// once section contents are final.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fixup {
    /// Byte index within the current instruction at which the fixup's
    /// payload begins — recorded before the placeholder bytes are appended.
    pub offset_in_instruction: u32,
    /// The expression whose eventual value patches the payload.
    pub value: ExprRef,
    /// The fixup kind.
    pub kind: FixupKind,
    /// Source location of the originating instruction.
    pub loc: SourceLoc,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [FixupKind; 16] = [
        FixupKind::Fixup8,
        FixupKind::Fixup8Dis,
        FixupKind::Fixup8Pcrel,
        FixupKind::Fixup16,
        FixupKind::Fixup24,
        FixupKind::Fixup32,
        FixupKind::FixupByte0,
        FixupKind::FixupByte1,
        FixupKind::FixupByte2,
        FixupKind::FixupByte3,
        FixupKind::FixupWord0,
        FixupKind::FixupWord1,
        FixupKind::Fixup16Be,
        FixupKind::Data1,
        FixupKind::Data2,
        FixupKind::Data4,
    ];

    #[test]
    fn catalog_order_is_abi() {
        let names: [&str; 13] = [
            "fixup_8",
            "fixup_8_dis",
            "fixup_8_pcrel",
            "fixup_16",
            "fixup_24",
            "fixup_32",
            "fixup_byte0",
            "fixup_byte1",
            "fixup_byte2",
            "fixup_byte3",
            "fixup_word0",
            "fixup_word1",
            "fixup_16_be",
        ];
        for (i, name) in names.iter().enumerate() {
            assert_eq!(TARGET_FIXUP_INFO[i].name, *name);
        }
        for kind in ALL_KINDS {
            if let Some(i) = kind.target_index() {
                assert_eq!(kind.info().name, TARGET_FIXUP_INFO[i as usize].name);
            }
        }
    }

    #[test]
    fn pcrel_flag_only_on_fixup_8_pcrel() {
        for kind in ALL_KINDS {
            assert_eq!(
                kind.info().is_pc_relative,
                kind == FixupKind::Fixup8Pcrel,
                "{}",
                kind.info().name
            );
        }
    }

    #[test]
    fn widths() {
        assert_eq!(FixupKind::Fixup8.byte_width(), 1);
        assert_eq!(FixupKind::Fixup16.byte_width(), 2);
        assert_eq!(FixupKind::Fixup24.byte_width(), 3);
        assert_eq!(FixupKind::Fixup32.byte_width(), 4);
        assert_eq!(FixupKind::FixupWord1.byte_width(), 4);
        assert_eq!(FixupKind::Fixup16Be.byte_width(), 2);
        assert_eq!(FixupKind::Data1.byte_width(), 1);
        assert_eq!(FixupKind::Data2.byte_width(), 2);
        assert_eq!(FixupKind::Data4.byte_width(), 4);
    }

    #[test]
    fn force_relocation_is_exactly_three_kinds() {
        for kind in ALL_KINDS {
            let expected = matches!(
                kind,
                FixupKind::Fixup8Dis | FixupKind::Fixup8Pcrel | FixupKind::Fixup16
            );
            assert_eq!(force_relocation(kind), expected, "{}", kind.info().name);
        }
    }
}
