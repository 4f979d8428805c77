//! Bytecode codecs.
//!
//! This module hosts the two wire codecs: [`gcx`] for procedure files
//! and [`radio`] for the monolithic dialog archive. Both are pairs of
//! mutually recursive encode/decode procedures over a [`ByteBuffer`];
//! the RADIO codec embeds the GCX expression encoding at its leaves.

pub mod gcx;
pub mod radio;

use crate::buffer::ByteBuffer;
use crate::error::{CodecError, Result};

/// Consume one byte and require it to be NUL.
pub(crate) fn expect_nul(buf: &mut ByteBuffer, location: &'static str) -> Result<()> {
    let actual = buf.read_u8()?;
    if actual != 0 {
        return Err(CodecError::FramingViolation {
            location,
            expected: 0,
            actual: u32::from(actual),
        });
    }
    Ok(())
}

/// Narrow a frame length to one byte.
pub(crate) fn frame_len_u8(len: usize, what: &'static str) -> Result<u8> {
    u8::try_from(len)
        .map_err(|_| CodecError::invariant(format!("{what} frame length {len} exceeds one byte")))
}

/// Narrow a frame length to two bytes.
pub(crate) fn frame_len_u16(len: usize, what: &'static str) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| CodecError::invariant(format!("{what} frame length {len} exceeds two bytes")))
}
