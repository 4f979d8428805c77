//! RADIO dialog archive codec.
//!
//! The archive is a run of dialog blocks, each 0x800-aligned on disk:
//! an 8-byte header, a framed op tree, a run of 36-byte font glyphs,
//! and zero padding to the next boundary. Radio ops embed the GCX
//! expression encoding at their leaves.
//!
//! Glyphs carry no length field, so the decoder scans for them with a
//! terminator heuristic: all known glyphs end in three zero bytes except
//! one that ends in `00 14 00`, and an all-zero candidate is padding.
//! The scan must stop before consuming a byte of the next dialog.

use std::collections::BTreeMap;

use crate::ast::{CodecOptions, Dialog, GclNode, RadioNode, RandCase};
use crate::buffer::ByteBuffer;
use crate::codec::{expect_nul, frame_len_u16, gcx};
use crate::error::{CodecError, RefKind, Result};
use crate::resolver::Resolver;

/// Radio opcode tags.
pub mod tag {
    pub const NULL: u8 = 0x00;
    pub const TALK: u8 = 0x01;
    pub const VOICE: u8 = 0x02;
    pub const ANIM: u8 = 0x03;
    pub const ADD_CONTACT: u8 = 0x04;
    pub const MEMSAVE: u8 = 0x05;
    pub const SOUND: u8 = 0x06;
    pub const PROMPT: u8 = 0x07;
    pub const VARSAVE: u8 = 0x08;
    pub const IF: u8 = 0x10;
    pub const ELSE: u8 = 0x11;
    pub const ELSEIF: u8 = 0x12;
    pub const SWITCH: u8 = 0x20;
    pub const SWITCH_CASE: u8 = 0x21;
    pub const SWITCH_DEFAULT: u8 = 0x22;
    pub const RANDSWITCH: u8 = 0x30;
    pub const RANDSWITCH_CASE: u8 = 0x31;
    pub const EVAL: u8 = 0x40;
    pub const RD_SCRIPT: u8 = 0x80;
    pub const ENDLINE: u8 = 0xFF;
}

/// Dialog block alignment.
pub const DIALOG_ALIGN: usize = 0x800;

/// Size of one font glyph record.
pub const GLYPH_SIZE: usize = 36;

/// Above this dialog count the archive is assumed bilingual and call
/// descriptors are shared between adjacent dialog pairs.
pub const BILINGUAL_THRESHOLD: usize = 500;

/// A compiled RADIO archive: the image plus the per-dialog call
/// descriptors that GCX `TABLE` leaves resolve against.
#[derive(Debug, Clone, Default)]
pub struct RadioImage {
    /// The archive bytes.
    pub data: Vec<u8>,
    /// Packed call descriptor per dialog name.
    pub calls: BTreeMap<String, u32>,
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a RADIO archive into its dialogs, names synthesized.
pub fn decompile(
    data: &[u8],
    resolver: &dyn Resolver,
    options: &CodecOptions,
) -> Result<Vec<Dialog>> {
    let mut buf = ByteBuffer::from_vec(data.to_vec());
    let file_size = buf.len();
    let mut dialogs = Vec::new();

    while buf.pos() < file_size {
        let dialog_offset = buf.pos();

        let freq = buf.read_u16()?;
        // In-engine, face size and offset are one u32 split with shifts.
        let face_size = buf.read_u8()?;
        buf.set_pos(buf.pos() + 1);
        let face_offset = buf.read_u16()?;
        let flags = buf.read_u16()?;

        // The body is decoded after the fonts; note where it starts.
        let body_offset = buf.pos();
        let body_size = buf.read_u16_at(body_offset + 1)? as usize;
        buf.set_pos(body_offset + body_size + 1);

        let fonts = scan_fonts(&mut buf)?;
        let fonts_end = buf.pos();

        buf.set_pos(body_offset);
        let body = decode_op(&mut buf, resolver)?;
        buf.set_pos(fonts_end);

        if options.padding {
            buf.set_pos(buf.pos() + (DIALOG_ALIGN - buf.pos() % DIALOG_ALIGN));
        }

        dialogs.push(Dialog {
            name: format!("rd_{:03}", dialog_offset / DIALOG_ALIGN),
            offset: dialog_offset as u32,
            freq,
            face_size,
            face_offset,
            flags,
            data: body,
            fonts,
        });
    }

    synthesize_names(&mut dialogs);
    Ok(dialogs)
}

/// Scan forward over font glyphs using the terminator heuristic.
fn scan_fonts(buf: &mut ByteBuffer) -> Result<Vec<String>> {
    let len = buf.len();
    let mut fonts = Vec::new();
    while buf.pos() < len {
        let glyph_offset = buf.pos();
        let mut sum: u32 = 0;
        for i in 0..GLYPH_SIZE {
            if i >= 33 {
                let b = buf.peek_u8()?;
                if b != 0 && b != 0x14 {
                    buf.set_pos(buf.pos() - i);
                    sum = 0;
                    break;
                }
            }
            if buf.pos() + 1 == len {
                buf.set_pos(buf.pos() - i);
                sum = 0;
                break;
            }
            sum += u32::from(buf.read_u8()?);
        }
        if sum == 0 {
            break;
        }
        buf.set_pos(glyph_offset);
        fonts.push(buf.read_hex(GLYPH_SIZE)?);
    }
    Ok(fonts)
}

/// Decode one radio op.
fn decode_op(buf: &mut ByteBuffer, resolver: &dyn Resolver) -> Result<RadioNode> {
    let tag_offset = buf.pos();
    let code = buf.read_u8()?;

    if code == tag::ENDLINE {
        return Ok(RadioNode::EndLine);
    }

    let size = (buf.read_u16()? as usize).saturating_sub(2);

    let node = match code {
        tag::TALK => {
            let character = buf.read_u16()?;
            let anim = buf.read_u16()?;
            let unk = buf.read_u16()?;
            let text = buf.read_cstring()?;
            RadioNode::Talk {
                character,
                anim,
                unk,
                text,
            }
        }
        tag::VOICE => {
            let voice_code = buf.read_u32()?;
            let name = if voice_code >> 24 == 0xFC {
                // PC variant: synthetic name carrying the low 24 bits.
                format!("vc{:06x}", voice_code & 0x00FF_FFFF)
            } else {
                resolver
                    .vox_name(voice_code)
                    .map(str::to_string)
                    .ok_or_else(|| CodecError::UnresolvedReference {
                        kind: RefKind::Voice,
                        key: format!("0x{voice_code:X}"),
                    })?
            };
            let body = decode_block(buf, resolver, size.saturating_sub(4))?;
            RadioNode::Voice { name, body }
        }
        tag::ANIM => {
            let character = buf.read_u16()?;
            let anim = buf.read_u16()?;
            let unk = buf.read_u16()?;
            RadioNode::Anim {
                character,
                anim,
                unk,
            }
        }
        tag::ADD_CONTACT => {
            let freq = buf.read_u16()?;
            let name = buf.read_cstring()?;
            RadioNode::AddContact { freq, name }
        }
        tag::MEMSAVE => {
            let value = decode_gcl_block(buf, resolver, size.saturating_sub(1))?;
            expect_nul(buf, "MEMSAVE")?;
            RadioNode::MemSave(value)
        }
        tag::SOUND => RadioNode::Sound(buf.read_hex(size)?),
        tag::PROMPT => {
            let value = decode_gcl_block(buf, resolver, size.saturating_sub(1))?;
            expect_nul(buf, "PROMPT")?;
            RadioNode::Prompt(value)
        }
        tag::VARSAVE => {
            let value = decode_gcl_block(buf, resolver, size.saturating_sub(1))?;
            expect_nul(buf, "VARSAVE")?;
            RadioNode::VarSave(value)
        }
        tag::IF => {
            let end = buf.pos() + size;
            let cond = decode_gcl_one(buf, resolver)?;
            let mut body = vec![decode_op(buf, resolver)?];
            while buf.pos() + 1 < end {
                let child = buf.read_u8()?;
                match child {
                    tag::ELSEIF => {
                        let cond = decode_gcl_one(buf, resolver)?;
                        let branch = decode_op(buf, resolver)?;
                        body.push(RadioNode::ElseIf {
                            cond,
                            body: Box::new(branch),
                        });
                    }
                    tag::ELSE => {
                        body.push(RadioNode::Else(vec![decode_op(buf, resolver)?]));
                    }
                    _ => {
                        buf.set_pos(buf.pos() - 1);
                        body.push(decode_op(buf, resolver)?);
                    }
                }
            }
            expect_nul(buf, "IF")?;
            RadioNode::If { cond, body }
        }
        tag::RANDSWITCH => {
            let end = buf.pos() + size;
            let value = buf.read_u16()?;
            let mut cases = Vec::new();
            while buf.pos() + 1 < end {
                let case_offset = buf.pos();
                let case_tag = buf.read_u8()?;
                if case_tag != tag::RANDSWITCH_CASE {
                    return Err(CodecError::UnexpectedOpcode {
                        code: case_tag,
                        offset: case_offset,
                    });
                }
                let case_value = buf.read_u16()?;
                let case_body = decode_op(buf, resolver)?;
                cases.push(RandCase {
                    value: case_value,
                    body: case_body,
                });
            }
            expect_nul(buf, "RANDSWITCH")?;
            RadioNode::RandSwitch { value, cases }
        }
        tag::EVAL => RadioNode::Eval(decode_gcl_one(buf, resolver)?),
        tag::RD_SCRIPT => {
            let body = decode_block(buf, resolver, size.saturating_sub(1))?;
            expect_nul(buf, "RD_SCRIPT")?;
            RadioNode::Script(body)
        }
        // NULL and the SWITCH family are enumerated but never produced.
        _ => {
            return Err(CodecError::UnexpectedOpcode {
                code,
                offset: tag_offset,
            })
        }
    };
    Ok(node)
}

/// Decode radio ops until `size` bytes are consumed.
fn decode_block(buf: &mut ByteBuffer, resolver: &dyn Resolver, size: usize) -> Result<Vec<RadioNode>> {
    let end = buf.pos() + size;
    let mut out = Vec::new();
    while buf.pos() < end {
        out.push(decode_op(buf, resolver)?);
    }
    Ok(out)
}

/// Decode embedded GCX nodes until `size` bytes are consumed.
fn decode_gcl_block(
    buf: &mut ByteBuffer,
    resolver: &dyn Resolver,
    size: usize,
) -> Result<Vec<GclNode>> {
    let end = buf.pos() + size;
    let mut out = Vec::new();
    let mut cmds = Vec::new();
    while buf.pos() < end {
        let node = gcx::decode_node(buf, resolver, &mut cmds)?
            .ok_or_else(|| CodecError::invariant("NUL terminator inside GCX block".to_string()))?;
        out.push(node);
    }
    Ok(out)
}

/// Decode a single embedded GCX node.
fn decode_gcl_one(buf: &mut ByteBuffer, resolver: &dyn Resolver) -> Result<GclNode> {
    let mut cmds = Vec::new();
    gcx::decode_node(buf, resolver, &mut cmds)?
        .ok_or_else(|| CodecError::invariant("NUL terminator where a GCX node was expected".to_string()))
}

// =============================================================================
// Dialog names
// =============================================================================

/// Assign dialog names from voice-code signals.
///
/// The highest `vcHHHHHH` code found in a dialog yields `RD_MM_NL`:
/// `MM` is the top byte in hex, and the middle byte splits into a digit
/// and a letter (0 means no letter, 1 is 'A', 2 is 'B', …). Dialogs
/// without a voice code become `RD_EXTRA_{n}`. On collision the first
/// holder gains an 'a' suffix and later ones 'b', 'c', …; past 26
/// conflicts the dialog index is appended instead.
fn synthesize_names(dialogs: &mut [Dialog]) {
    enum Seen {
        First(usize),
        Conflicts(u32),
    }

    let mut extra_count = 0u32;
    let mut names: BTreeMap<String, Seen> = BTreeMap::new();

    for i in 0..dialogs.len() {
        let mut name = match highest_voice_code(&dialogs[i].data) {
            None => {
                extra_count += 1;
                format!("RD_EXTRA_{extra_count}")
            }
            Some(code) => {
                let vc = format!("{:08X}", code << 8);
                let major = &vc[0..2];
                let minor = &vc[2..3];
                let letter_value = u32::from_str_radix(&vc[3..4], 16).unwrap_or(0);
                let letter = match letter_value {
                    0 => String::new(),
                    v => char::from(b'A' + (v as u8) - 1).to_string(),
                };
                format!("RD_{major}_{minor}{letter}")
            }
        };

        match names.get_mut(&name) {
            None => {
                names.insert(name.clone(), Seen::First(i));
            }
            Some(seen) => {
                if let Seen::First(first) = *seen {
                    dialogs[first].name.push('a');
                    *seen = Seen::Conflicts(0);
                }
                if let Seen::Conflicts(ref mut count) = *seen {
                    *count += 1;
                    if *count > 26 {
                        name.push_str(&format!("_{i}"));
                    } else {
                        name.push(char::from(b'a' + *count as u8));
                    }
                }
            }
        }
        dialogs[i].name = name;
    }
}

/// Find the numerically highest voice code referenced by a dialog tree.
fn highest_voice_code(node: &RadioNode) -> Option<u32> {
    fn walk(node: &RadioNode, best: &mut Option<u32>) {
        match node {
            RadioNode::Voice { name, body } => {
                if let Some(code) = parse_voice_code(name) {
                    if best.map_or(true, |b| b < code) {
                        *best = Some(code);
                    }
                }
                for child in body {
                    walk(child, best);
                }
            }
            RadioNode::If { body, .. } => {
                for child in body {
                    walk(child, best);
                }
            }
            RadioNode::Else(body) | RadioNode::Script(body) => {
                for child in body {
                    walk(child, best);
                }
            }
            RadioNode::ElseIf { body, .. } => walk(body, best),
            RadioNode::RandSwitch { cases, .. } => {
                for case in cases {
                    walk(&case.body, best);
                }
            }
            _ => {}
        }
    }
    let mut best = None;
    walk(node, &mut best);
    best
}

/// Extract the 24-bit code from a voice name (`vcHHHHHH` or
/// `vcHHHHHH.vox`).
fn parse_voice_code(name: &str) -> Option<u32> {
    let rest = name.get(2..)?;
    let rest = rest.strip_suffix(".vox").unwrap_or(rest);
    u32::from_str_radix(rest, 16).ok()
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode dialogs back into a RADIO archive, producing the call
/// descriptor table along the way.
pub fn compile(
    dialogs: &[Dialog],
    resolver: &dyn Resolver,
    options: &CodecOptions,
) -> Result<RadioImage> {
    let is_pc = options.is_pc_version.unwrap_or(!resolver.has_vox());
    let bilingual = dialogs.len() > BILINGUAL_THRESHOLD;

    let mut data = ByteBuffer::new();
    let mut calls = BTreeMap::new();
    let mut last_size = 0u32;
    let mut last_name = String::new();

    for (index, dialog) in dialogs.iter().enumerate() {
        let dialog_offset = data.len();

        let mut block = ByteBuffer::new();
        block.write_u16(dialog.freq);
        block.write_u8(dialog.face_size);
        block.write_u8(0);
        block.write_u16(dialog.face_offset);
        block.write_u16(dialog.flags);
        encode_op(&dialog.data, resolver, is_pc, &mut block)?;
        for glyph in &dialog.fonts {
            block.write_hex(glyph)?;
        }
        if options.padding {
            while (dialog_offset + block.len()) % DIALOG_ALIGN != 0 {
                block.write_u8(0);
            }
        }

        let offset_blocks = (dialog_offset / DIALOG_ALIGN) as u32;
        let size_blocks = (block.len() / DIALOG_ALIGN) as u32;
        data.write_bytes(block.as_slice());

        if bilingual {
            // Adjacent dialogs carry the two languages of one call; both
            // share a descriptor keyed by either name.
            if (index + 1) % 2 == 0 {
                let call = pack_call(last_size, size_blocks, offset_blocks.wrapping_sub(last_size));
                calls.insert(last_name.clone(), call);
                calls.insert(dialog.name.clone(), call);
            }
        } else {
            calls.insert(dialog.name.clone(), pack_call(size_blocks, 0, offset_blocks));
        }
        last_size = size_blocks;
        last_name.clone_from(&dialog.name);
    }

    Ok(RadioImage {
        data: data.into_vec(),
        calls,
    })
}

/// Pack a call descriptor: `{size1, size2, offset}` as `u8 u8 u16`.
fn pack_call(size1: u32, size2: u32, offset: u32) -> u32 {
    ((size1 & 0xFF) << 24) | ((size2 & 0xFF) << 16) | (offset & 0xFFFF)
}

/// Encode one radio op onto `out`.
fn encode_op(
    node: &RadioNode,
    resolver: &dyn Resolver,
    is_pc: bool,
    out: &mut ByteBuffer,
) -> Result<()> {
    // Unframed ops first.
    match node {
        RadioNode::EndLine => {
            out.write_u8(tag::ENDLINE);
            return Ok(());
        }
        RadioNode::Else(body) => {
            out.write_u8(tag::ELSE);
            for child in body {
                encode_op(child, resolver, is_pc, out)?;
            }
            return Ok(());
        }
        RadioNode::ElseIf { cond, body } => {
            out.write_u8(tag::ELSEIF);
            gcx::encode_node(cond, resolver, out)?;
            encode_op(body, resolver, is_pc, out)?;
            return Ok(());
        }
        _ => {}
    }

    let mut payload = ByteBuffer::new();
    let code = match node {
        RadioNode::Talk {
            character,
            anim,
            unk,
            text,
        } => {
            payload.write_u16(*character);
            payload.write_u16(*anim);
            payload.write_u16(*unk);
            payload.write_cstring(text)?;
            tag::TALK
        }
        RadioNode::Voice { name, body } => {
            payload.write_u32(encode_voice_code(name, resolver, is_pc)?);
            for child in body {
                encode_op(child, resolver, is_pc, &mut payload)?;
            }
            tag::VOICE
        }
        RadioNode::Anim {
            character,
            anim,
            unk,
        } => {
            payload.write_u16(*character);
            payload.write_u16(*anim);
            payload.write_u16(*unk);
            tag::ANIM
        }
        RadioNode::AddContact { freq, name } => {
            payload.write_u16(*freq);
            payload.write_cstring(name)?;
            tag::ADD_CONTACT
        }
        RadioNode::MemSave(nodes) => {
            for n in nodes {
                gcx::encode_node(n, resolver, &mut payload)?;
            }
            payload.write_u8(0);
            tag::MEMSAVE
        }
        RadioNode::Sound(bytes) => {
            payload.write_hex(bytes)?;
            tag::SOUND
        }
        RadioNode::Prompt(nodes) => {
            for n in nodes {
                gcx::encode_node(n, resolver, &mut payload)?;
            }
            payload.write_u8(0);
            tag::PROMPT
        }
        RadioNode::VarSave(nodes) => {
            for n in nodes {
                gcx::encode_node(n, resolver, &mut payload)?;
            }
            payload.write_u8(0);
            tag::VARSAVE
        }
        RadioNode::If { cond, body } => {
            gcx::encode_node(cond, resolver, &mut payload)?;
            for child in body {
                encode_op(child, resolver, is_pc, &mut payload)?;
            }
            payload.write_u8(0);
            tag::IF
        }
        RadioNode::RandSwitch { value, cases } => {
            payload.write_u16(*value);
            for case in cases {
                payload.write_u8(tag::RANDSWITCH_CASE);
                payload.write_u16(case.value);
                encode_op(&case.body, resolver, is_pc, &mut payload)?;
            }
            payload.write_u8(0);
            tag::RANDSWITCH
        }
        RadioNode::Eval(node) => {
            gcx::encode_node(node, resolver, &mut payload)?;
            tag::EVAL
        }
        RadioNode::Script(body) => {
            for child in body {
                encode_op(child, resolver, is_pc, &mut payload)?;
            }
            payload.write_u8(0);
            tag::RD_SCRIPT
        }
        RadioNode::Null
        | RadioNode::Switch
        | RadioNode::SwitchCase
        | RadioNode::SwitchDefault => {
            return Err(CodecError::invariant(format!(
                "{node:?} is never produced by the corpus and cannot be encoded"
            )));
        }
        // Handled above.
        RadioNode::EndLine | RadioNode::Else(_) | RadioNode::ElseIf { .. } => unreachable!(),
    };

    out.write_u8(code);
    out.write_u16(frame_len_u16(payload.len() + 2, "radio op")?);
    out.write_bytes(payload.as_slice());
    Ok(())
}

/// Resolve a voice name back to its 32-bit code.
fn encode_voice_code(name: &str, resolver: &dyn Resolver, is_pc: bool) -> Result<u32> {
    if is_pc {
        // `vcHHHHHH` carries its own code under the 0xFC prefix.
        let synthetic = format!("f{}", name.get(1..).unwrap_or_default());
        return u32::from_str_radix(&synthetic, 16).map_err(|_| CodecError::UnresolvedReference {
            kind: RefKind::Voice,
            key: name.to_string(),
        });
    }
    resolver
        .vox_block_index(name)
        .ok_or_else(|| CodecError::UnresolvedReference {
            kind: RefKind::Voice,
            key: name.to_string(),
        })
}
