//! GCL Codec - Bidirectional GCX/RADIO bytecode tooling
//!
//! This library decompiles the scripting bytecode of a PlayStation-era
//! stealth-action game into editable ASTs and recompiles those ASTs back
//! into bytecode that is bit-identical to the original files.
//!
//! # Features
//!
//! - **GCX procedure files**: recursive opcode codec over a type-tagged
//!   AST with nested length-prefixed frames and postfix expressions
//! - **RADIO archive**: block-aligned multi-dialog codec embedding the
//!   GCX expression encoding, with font-glyph run detection
//! - **Cross-references**: symbolic names for radio dialogs, voice
//!   samples, and demo cutscenes resolved against the container archives
//! - **Round-trip fidelity**: `compile(decompile(x)) == x` byte for byte
//!   across both the console and PC variants
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gcl_codec::{decompile_gcx, compile_gcx, CodecOptions, NullResolver};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("stage/init/scenerio.gcx")?;
//!     let ast = decompile_gcx(&bytes, &NullResolver)?;
//!     let rebuilt = compile_gcx(&ast, &NullResolver, &CodecOptions::console())?;
//!     assert_eq!(rebuilt, bytes);
//!     Ok(())
//! }
//! ```
//!
//! # Cross-referenced decompilation
//!
//! GCX `TABLE` leaves under `RADIO`, `SOUND`, and `DEMO` commands point
//! into the RADIO.DAT, VOX.DAT, and DEMO.DAT archives. Decompile the
//! radio archive first and feed the resulting tables into a
//! [`CrossRef`] so those leaves come out as symbolic names:
//!
//! ```rust,no_run
//! use gcl_codec::{decompile_radio, decompile_gcx, CodecOptions, CrossRef, NullResolver};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let radio = std::fs::read("RADIO.DAT")?;
//! let dialogs = decompile_radio(&radio, &NullResolver, &CodecOptions::new())?;
//! let xref = CrossRef::new().with_radio_dialogs(&dialogs);
//! let gcx = std::fs::read("stage/s01a/0d90.gcx")?;
//! let ast = decompile_gcx(&gcx, &xref)?;
//! # Ok(())
//! # }
//! ```
//!
//! The codec is single-threaded and fully synchronous; process multiple
//! files in parallel by giving each its own buffers and resolver.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod archive;
pub mod ast;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod resolver;

pub use archive::{pack_blocks, pack_demo, unpack_demo, DatEntry};
pub use ast::{
    Call, CodecOptions, Command, CommandId, Dialog, GclNode, GcxFile, Operation, Operator,
    OptionClause, Procedure, RadioNode, RandCase, Script, TableRef, VarRef,
};
pub use codec::radio::RadioImage;
pub use error::{CodecError, RefKind, Result};
pub use resolver::{CrossRef, NullResolver, Resolver};

/// Decode a GCX procedure file into its AST.
///
/// `TABLE` leaves under `RADIO`, `SOUND`, and `DEMO` commands are
/// rewritten to symbolic names. Unmatched radio offsets stay numeric;
/// an unmatched voice or demo value is an
/// [`CodecError::UnresolvedReference`] when the corresponding archive
/// table is present, and stays numeric otherwise.
pub fn decompile_gcx(data: &[u8], resolver: &dyn Resolver) -> Result<GcxFile> {
    codec::gcx::decompile(data, resolver)
}

/// Encode a GCX AST back into a procedure file.
///
/// Symbolic `TABLE` leaves are resolved through `resolver`; a missing
/// key is an [`CodecError::UnresolvedReference`].
pub fn compile_gcx(
    file: &GcxFile,
    resolver: &dyn Resolver,
    options: &CodecOptions,
) -> Result<Vec<u8>> {
    codec::gcx::compile(file, resolver, options)
}

/// Decode a RADIO archive into its dialogs, names synthesized from the
/// voice codes each dialog references.
pub fn decompile_radio(
    data: &[u8],
    resolver: &dyn Resolver,
    options: &CodecOptions,
) -> Result<Vec<Dialog>> {
    codec::radio::decompile(data, resolver, options)
}

/// Encode dialogs back into a RADIO archive.
///
/// The returned [`RadioImage`] carries the call-descriptor table that
/// GCX `rd_*` references resolve against; feed it to
/// [`CrossRef::with_radio_calls`] before compiling GCX files.
pub fn compile_radio(
    dialogs: &[Dialog],
    resolver: &dyn Resolver,
    options: &CodecOptions,
) -> Result<RadioImage> {
    codec::radio::compile(dialogs, resolver, options)
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_gcx_roundtrip_through_public_api() {
        let file = GcxFile {
            procedures: vec![Procedure {
                id: 0,
                body: GclNode::Cmd(Command {
                    name: CommandId::Mesg,
                    args: vec![GclNode::Byte(0)],
                }),
            }],
            fonts: vec![],
        };
        let bytes = compile_gcx(&file, &NullResolver, &CodecOptions::console()).unwrap();
        let back = decompile_gcx(&bytes, &NullResolver).unwrap();
        assert_eq!(back, file);
        assert_eq!(
            compile_gcx(&back, &NullResolver, &CodecOptions::console()).unwrap(),
            bytes
        );
    }

    #[test]
    fn test_document_roundtrip() {
        let file = GcxFile {
            procedures: vec![Procedure {
                id: 0,
                body: GclNode::Script(Script {
                    body: vec![GclNode::Cmd(Command {
                        name: CommandId::Mesg,
                        args: vec![GclNode::Str("hello".into())],
                    })],
                    no_braces: false,
                }),
            }],
            fonts: vec![],
        };
        let doc = serde_json::to_string(&file).unwrap();
        let back: GcxFile = serde_json::from_str(&doc).unwrap();
        assert_eq!(back, file);
    }
}
