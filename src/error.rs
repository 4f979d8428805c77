//! Error types for the GCL codec.
//!
//! This module defines all error types used throughout the codec.
//! Every error is fatal to the file being processed and is propagated
//! unmodified to the caller; nothing is retried or recovered internally.

use thiserror::Error;

/// Primary error type for the GCL codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A byte could not be decoded as a known tag in the current position.
    #[error("Unexpected opcode 0x{code:02X} at offset 0x{offset:X}")]
    UnexpectedOpcode { code: u8, offset: usize },

    /// A symbolic name could not be translated to a number, or vice versa.
    #[error("Unresolved {kind} reference: {key}")]
    UnresolvedReference { kind: RefKind, key: String },

    /// A NUL terminator or length invariant failed.
    #[error("Framing violation in {location}: expected 0x{expected:X}, got 0x{actual:X}")]
    FramingViolation {
        location: &'static str,
        expected: u32,
        actual: u32,
    },

    /// The cursor ran past the end of the buffer.
    #[error("Read past end of buffer: offset 0x{offset:X}, length 0x{len:X}")]
    ShortBuffer { offset: usize, len: usize },

    /// A structural invariant of the AST or wire format was broken.
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },
}

/// The name space a cross-reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// Radio dialog names (`rd_*` / `RD_*`).
    Radio,
    /// Voice sample names (`vc*`).
    Voice,
    /// Demo cutscene names (`s*`).
    Demo,
    /// Command or table values with no recognized prefix.
    Table,
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefKind::Radio => "radio",
            RefKind::Voice => "voice",
            RefKind::Demo => "demo",
            RefKind::Table => "table",
        };
        f.write_str(s)
    }
}

impl CodecError {
    /// Shorthand for an [`CodecError::InvariantViolation`].
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        CodecError::InvariantViolation {
            message: message.into(),
        }
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::UnexpectedOpcode {
            code: 0x5A,
            offset: 0x120,
        };
        let msg = err.to_string();
        assert!(msg.contains("5A"));
        assert!(msg.contains("120"));
    }

    #[test]
    fn test_unresolved_reference() {
        let err = CodecError::UnresolvedReference {
            kind: RefKind::Voice,
            key: "vc012345".to_string(),
        };
        assert!(err.to_string().contains("voice"));
        assert!(err.to_string().contains("vc012345"));
    }
}
