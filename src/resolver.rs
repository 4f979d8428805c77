//! Cross-reference resolution between symbolic names and archive indices.
//!
//! GCX `TABLE` leaves and RADIO voice codes refer into the container
//! archives by block index or packed call descriptor. The [`Resolver`]
//! trait is the seam through which those archives are seen: the codec
//! itself stays stateless across files and borrows a resolver for the
//! duration of one encode or decode.

use std::collections::BTreeMap;

use crate::archive::DatEntry;
use crate::ast::Dialog;

/// Name ⇄ numeric translation for the radio, voice, and demo tables.
///
/// Radio reverse lookups (numeric to name) that return `None` leave the
/// numeric literal in place during decode. Voice and demo reverse
/// lookups are only consulted when the corresponding archive is present
/// ([`Resolver::has_vox`]/[`Resolver::has_demo`]); a miss then is fatal.
/// Forward lookups that return `None` make the encoder fail with an
/// unresolved-reference error.
pub trait Resolver {
    /// Name of the VOX entry at `block_index`, if known.
    fn vox_name(&self, block_index: u32) -> Option<&str>;

    /// Block index of the named VOX entry, if known.
    fn vox_block_index(&self, name: &str) -> Option<u32>;

    /// Name of the DEMO entry at `block_index`, if known.
    fn demo_name(&self, block_index: u32) -> Option<&str>;

    /// Block index of the named DEMO entry, if known.
    fn demo_block_index(&self, name: &str) -> Option<u32>;

    /// Packed call descriptor for the named radio dialog, if known.
    fn radio_call_descriptor(&self, name: &str) -> Option<u32>;

    /// Name of the radio dialog starting at `byte_offset`, if known.
    fn radio_name_at_offset(&self, byte_offset: u32) -> Option<&str>;

    /// Whether a VOX table is present. Used to derive the platform
    /// variant (the PC release ships without a VOX archive) and to make
    /// a failed voice lookup fatal rather than silent.
    fn has_vox(&self) -> bool {
        false
    }

    /// Whether a DEMO table is present. A failed demo lookup is fatal
    /// only when the archive was actually supplied.
    fn has_demo(&self) -> bool {
        false
    }
}

/// A resolver with no tables: all lookups miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl Resolver for NullResolver {
    fn vox_name(&self, _block_index: u32) -> Option<&str> {
        None
    }

    fn vox_block_index(&self, _name: &str) -> Option<u32> {
        None
    }

    fn demo_name(&self, _block_index: u32) -> Option<&str> {
        None
    }

    fn demo_block_index(&self, _name: &str) -> Option<u32> {
        None
    }

    fn radio_call_descriptor(&self, _name: &str) -> Option<u32> {
        None
    }

    fn radio_name_at_offset(&self, _byte_offset: u32) -> Option<&str> {
        None
    }
}

/// Concrete cross-reference tables built from unpacked archives and
/// decompiled or compiled radio data.
#[derive(Debug, Clone, Default)]
pub struct CrossRef {
    vox_by_index: BTreeMap<u32, String>,
    vox_by_name: BTreeMap<String, u32>,
    demo_by_index: BTreeMap<u32, String>,
    demo_by_name: BTreeMap<String, u32>,
    radio_by_offset: BTreeMap<u32, String>,
    radio_calls: BTreeMap<String, u32>,
    has_vox: bool,
    has_demo: bool,
}

impl CrossRef {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the entries of an unpacked VOX archive.
    pub fn with_vox(mut self, entries: &[DatEntry]) -> Self {
        for entry in entries {
            self.vox_by_index
                .insert(entry.block_index(), entry.name.clone());
            self.vox_by_name
                .insert(entry.name.clone(), entry.block_index());
        }
        self.has_vox = true;
        self
    }

    /// Register the entries of an unpacked DEMO archive.
    pub fn with_demo(mut self, entries: &[DatEntry]) -> Self {
        for entry in entries {
            self.demo_by_index
                .insert(entry.block_index(), entry.name.clone());
            self.demo_by_name
                .insert(entry.name.clone(), entry.block_index());
        }
        self.has_demo = true;
        self
    }

    /// Register decompiled dialogs so GCX decoding can map archive
    /// offsets back to dialog names.
    pub fn with_radio_dialogs(mut self, dialogs: &[Dialog]) -> Self {
        for dialog in dialogs {
            self.radio_by_offset
                .insert(dialog.offset, dialog.name.clone());
        }
        self
    }

    /// Register the call-descriptor table produced by a radio compile so
    /// GCX encoding can resolve dialog names.
    pub fn with_radio_calls(mut self, calls: BTreeMap<String, u32>) -> Self {
        self.radio_calls.extend(calls);
        self
    }
}

impl Resolver for CrossRef {
    fn vox_name(&self, block_index: u32) -> Option<&str> {
        self.vox_by_index.get(&block_index).map(String::as_str)
    }

    fn vox_block_index(&self, name: &str) -> Option<u32> {
        self.vox_by_name.get(name).copied()
    }

    fn demo_name(&self, block_index: u32) -> Option<&str> {
        self.demo_by_index.get(&block_index).map(String::as_str)
    }

    fn demo_block_index(&self, name: &str) -> Option<u32> {
        self.demo_by_name.get(name).copied()
    }

    fn radio_call_descriptor(&self, name: &str) -> Option<u32> {
        self.radio_calls.get(name).copied()
    }

    fn radio_name_at_offset(&self, byte_offset: u32) -> Option<&str> {
        self.radio_by_offset.get(&byte_offset).map(String::as_str)
    }

    fn has_vox(&self) -> bool {
        self.has_vox
    }

    fn has_demo(&self) -> bool {
        self.has_demo
    }
}
