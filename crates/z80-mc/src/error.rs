//! Error types and source-location tracking for diagnostics.

use alloc::string::String;
use core::fmt;

/// Source location for diagnostics.
///
/// Opaque to the encoder: it is copied verbatim from the instruction onto
/// every fixup the instruction produces, so that downstream consumers (the
/// object writer, linker diagnostics) can attribute a relocation back to the
/// originating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceLoc {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub col: u32,
}

impl SourceLoc {
    /// Create a new source location.
    #[must_use]
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// A dummy location for generated/internal instructions.
    #[must_use]
    pub fn dummy() -> Self {
        Self { line: 0, col: 0 }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Encoding error with the offending mnemonic and a descriptive message.
///
/// Every failure at this layer is fatal: the enclosing driver aborts the
/// translation unit without committing partial output. The encoder therefore
/// never tries to recover — it reports and returns.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncodeError {
    /// Wrong number of operands for the opcode form.
    OperandCount {
        /// The instruction form name.
        mnemonic: &'static str,
        /// Number of operands the form requires.
        expected: usize,
        /// Number of operands actually supplied.
        actual: usize,
    },

    /// An operand has the wrong tag (register vs. immediate vs. expression).
    OperandKind {
        /// The instruction form name.
        mnemonic: &'static str,
        /// Which operand and which tag it should have carried.
        detail: String,
    },

    /// An immediate operand is outside the range the form accepts.
    ImmediateRange {
        /// The instruction form name.
        mnemonic: &'static str,
        /// Which operand and the accepted range.
        detail: String,
    },

    /// A register operand is not in the set this opcode form accepts.
    RegisterClass {
        /// The instruction form name.
        mnemonic: &'static str,
        /// The accepted register set, as a message.
        detail: &'static str,
    },

    /// The instruction is tagged for EZ80 mode, which this encoder rejects.
    Ez80Mode,

    /// The opcode is recognized but has no encoding.
    NotImplemented {
        /// The instruction form name.
        mnemonic: &'static str,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::OperandCount {
                mnemonic,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Invalid number of arguments for instruction {}: {} vs {}.",
                    mnemonic, expected, actual
                )
            }
            EncodeError::OperandKind { mnemonic, detail }
            | EncodeError::ImmediateRange { mnemonic, detail } => {
                write!(f, "{}: {}", mnemonic, detail)
            }
            EncodeError::RegisterClass { mnemonic, detail } => {
                write!(f, "{}: {}", mnemonic, detail)
            }
            EncodeError::Ez80Mode => {
                write!(f, "EZ80 machine instructions not supported.")
            }
            EncodeError::NotImplemented { mnemonic } => {
                write!(f, "{}: Not implemented.", mnemonic)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}
