//! GCX procedure file codec.
//!
//! A GCX file is a header of `(u16 id, u16 offset)` pairs terminated by
//! `(0, 0)`, followed by the procedure data blocks and a trailing font
//! section. The main procedure (id 0) is listed first on disk with its
//! data block prefixed by its own u32 length, but is kept last in the
//! AST by convention.
//!
//! The node codec is a classic recursive descent over a moving cursor.
//! Frame lengths are not fully self-describing; the decoder leans on NUL
//! terminators and the encoder reproduces the original compiler's
//! size-patching quirks (`IF` argument and option lengths, `NO_BRACES`
//! truncation) so that re-encoded files match the corpus byte for byte.

use crate::ast::{
    Call, CodecOptions, Command, CommandId, GclNode, GcxFile, Operation, Operator, OptionClause,
    Procedure, Script, TableRef, VarRef,
};
use crate::buffer::{encode_string, ByteBuffer};
use crate::codec::{frame_len_u16, frame_len_u8};
use crate::error::{CodecError, RefKind, Result};
use crate::resolver::Resolver;

/// GCL opcode tags.
pub mod tag {
    pub const NULL: u8 = 0x00;
    pub const WORD: u8 = 0x01;
    pub const BYTE: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const FLAG: u8 = 0x04;
    pub const STR_ID: u8 = 0x06;
    pub const STR: u8 = 0x07;
    pub const PROC: u8 = 0x08;
    pub const SD_CODE: u8 = 0x09;
    pub const TABLE: u8 = 0x0A;
    pub const VAR: u8 = 0x10;
    pub const ARG: u8 = 0x20;
    pub const EXPR: u8 = 0x30;
    pub const OP: u8 = 0x31;
    pub const SCRIPT: u8 = 0x40;
    pub const OPTION: u8 = 0x50;
    pub const CMD: u8 = 0x60;
    pub const CALL: u8 = 0x70;
}

/// The `DEMO` table sentinel that is never resolved.
pub const DEMO_SENTINEL: u32 = 0xFFFF_FFFF;

// =============================================================================
// Decoding
// =============================================================================

/// Decode a GCX procedure file into its AST.
pub fn decompile(data: &[u8], resolver: &dyn Resolver) -> Result<GcxFile> {
    let mut buf = ByteBuffer::from_vec(data.to_vec());

    let mut pairs: Vec<(u16, u16)> = Vec::new();
    loop {
        let id = buf.read_u16()?;
        let offset = buf.read_u16()?;
        if id == 0 && offset == 0 {
            break;
        }
        pairs.push((id, offset));
    }
    // The main procedure is listed first on disk; parse it last so it
    // lands at the tail of the AST.
    if !pairs.is_empty() {
        pairs.rotate_left(1);
    }
    let header_size = buf.pos();

    let mut cmds = Vec::new();
    let mut procedures = Vec::with_capacity(pairs.len());
    for (id, offset) in pairs {
        if id == 0 {
            // Skip the main procedure's own u32 length prefix.
            buf.set_pos(offset as usize + 8);
        } else {
            buf.set_pos(offset as usize + header_size);
        }
        let body = decode_node(&mut buf, resolver, &mut cmds)?.ok_or_else(|| {
            CodecError::invariant(format!("procedure 0x{id:04X} has an empty body"))
        })?;
        procedures.push(Procedure { id, body });
    }

    let fonts_len = buf.read_u32()? as usize;
    let fonts_end = buf.pos() + fonts_len.saturating_sub(2);
    let mut fonts = Vec::new();
    while buf.pos() < fonts_end {
        fonts.push(buf.read_hex(36)?);
    }

    Ok(GcxFile { procedures, fonts })
}

/// Decode one node. `Ok(None)` means a `GCL_NULL` terminator was read.
pub(crate) fn decode_node(
    buf: &mut ByteBuffer,
    resolver: &dyn Resolver,
    cmds: &mut Vec<CommandId>,
) -> Result<Option<GclNode>> {
    let tag_offset = buf.pos();
    let code = buf.read_u8()?;

    // The top nibble marks a variable; the low nibble is the sub-type.
    if code & 0xF0 == tag::VAR {
        let mut ident = String::with_capacity(6);
        for _ in 0..3 {
            ident.push_str(&format!("{:02X}", buf.read_u8()?));
        }
        let var = VarRef::from_sub_code(code & 0x0F, ident).ok_or(CodecError::UnexpectedOpcode {
            code,
            offset: tag_offset,
        })?;
        return Ok(Some(GclNode::Var(var)));
    }

    let node = match code {
        tag::NULL => return Ok(None),
        tag::WORD => GclNode::Word(buf.read_u16()?),
        tag::BYTE => GclNode::Byte(buf.read_u8()?),
        tag::CHAR => GclNode::Char(char::from(buf.read_u8()?)),
        tag::FLAG => GclNode::Flag(buf.read_u8()? == 1),
        tag::STR_ID => GclNode::StrId(buf.read_u16()?),
        tag::STR => {
            // The declared length is ignored by the engine; read to NUL.
            let _declared = buf.read_u8()?;
            GclNode::Str(buf.read_cstring()?)
        }
        tag::PROC => GclNode::Proc(buf.read_u16()?),
        tag::SD_CODE => GclNode::SdCode(buf.read_u32()?),
        tag::TABLE => {
            let value = buf.read_u32()?;
            GclNode::Table(resolve_table_decode(value, cmds, resolver)?)
        }
        tag::ARG => GclNode::Arg(buf.read_u8()?),
        tag::EXPR => decode_expr(buf, resolver, cmds)?,
        tag::SCRIPT => {
            let size = (buf.read_u16()? as usize).saturating_sub(2);
            let end = buf.pos() + size;
            let mut body = Vec::new();
            while buf.pos() < end {
                match decode_node(buf, resolver, cmds)? {
                    Some(n) => body.push(n),
                    None => break,
                }
            }
            GclNode::Script(Script {
                body,
                no_braces: false,
            })
        }
        tag::OPTION => decode_option(buf, resolver, cmds)?,
        tag::CMD => decode_command(buf, resolver, cmds)?,
        tag::CALL => {
            let size = (buf.read_u8()? as usize).saturating_sub(1);
            let end = buf.pos() + size;
            let proc = buf.read_u16()?;
            let mut args = Vec::new();
            while buf.pos() < end {
                match decode_node(buf, resolver, cmds)? {
                    Some(n) => args.push(n),
                    None => break,
                }
            }
            GclNode::Call(Call { proc, args })
        }
        _ => {
            return Err(CodecError::UnexpectedOpcode {
                code,
                offset: tag_offset,
            })
        }
    };
    Ok(Some(node))
}

/// Decode an expression body: postfix operands folded into a tree,
/// terminated by `OP OP_NULL`.
fn decode_expr(
    buf: &mut ByteBuffer,
    resolver: &dyn Resolver,
    cmds: &mut Vec<CommandId>,
) -> Result<GclNode> {
    let size = buf.read_u8()? as usize;
    let end = (buf.pos() + size).saturating_sub(1);

    let mut operands: Vec<GclNode> = Vec::new();
    while buf.pos() < end {
        if buf.peek_u8()? == tag::OP {
            buf.read_u8()?;
            let op_code = buf.read_u8()?;
            if op_code == 0 {
                break;
            }
            let operator = Operator::from_code(op_code).ok_or_else(|| {
                CodecError::invariant(format!("operator code {op_code} out of range"))
            })?;
            if operands.len() < 2 {
                return Err(CodecError::invariant(
                    "postfix expression underflow".to_string(),
                ));
            }
            let rhs = operands.pop().expect("len checked");
            let lhs = operands.pop().expect("len checked");
            operands.push(GclNode::Op(Operation {
                operator,
                operands: vec![lhs, rhs],
            }));
        } else {
            let node = decode_node(buf, resolver, cmds)?.ok_or_else(|| {
                CodecError::invariant("NUL terminator inside expression".to_string())
            })?;
            operands.push(node);
        }
    }
    Ok(GclNode::Expr(operands))
}

/// Decode an option clause.
///
/// The declared length cannot be trusted, so the body is scanned up to
/// the next NUL or option tag. The declared length still matters twice:
/// a zero byte marks the `NULL_SIZE` annotation, and the delta against a
/// nested script frame reveals a brace-less `elseif`/`else` body.
fn decode_option(
    buf: &mut ByteBuffer,
    resolver: &dyn Resolver,
    cmds: &mut Vec<CommandId>,
) -> Result<GclNode> {
    let letter = char::from(buf.read_u8()?);
    let declared = i64::from(buf.read_u8()?) - 1;

    let mut values = Vec::new();
    loop {
        let code = buf.peek_u8()?;
        if code == 0 || code == tag::OPTION {
            break;
        }
        let value_offset = buf.pos();
        let Some(mut val) = decode_node(buf, resolver, cmds)? else {
            break;
        };
        if cmds.last() == Some(&CommandId::If) {
            if let GclNode::Script(ref mut script) = val {
                let script_size = i64::from(buf.read_u16_at(value_offset + 1)?);
                if script_size + 2 - declared == 1 {
                    script.no_braces = true;
                }
            }
        }
        values.push(val);
    }

    let null_size = declared == -1 && !values.is_empty();
    Ok(GclNode::OptionClause(OptionClause {
        letter,
        values,
        null_size,
    }))
}

/// Decode a command frame.
fn decode_command(
    buf: &mut ByteBuffer,
    resolver: &dyn Resolver,
    cmds: &mut Vec<CommandId>,
) -> Result<GclNode> {
    let size = (buf.read_u16()? as usize).saturating_sub(2);
    let end = buf.pos() + size;

    let id_offset = buf.pos();
    let code = buf.read_u16()?;
    let name = CommandId::from_code(code).ok_or_else(|| {
        CodecError::invariant(format!(
            "unknown command id 0x{code:04X} at offset 0x{id_offset:X}"
        ))
    })?;
    cmds.push(name);

    let args_size = i64::from(buf.read_u8()?);
    let args_end = buf.pos() as i64 + args_size - 1;

    let mut args = Vec::new();
    loop {
        let code = buf.peek_u8()?;
        if code == 0 {
            break;
        }
        match decode_node(buf, resolver, cmds)? {
            Some(n) => args.push(n),
            None => break,
        }
    }

    // An `if` whose body swallowed the command's trailing NUL was written
    // without braces; the declared argument length exposes it.
    if name == CommandId::If && buf.pos() as i64 == args_end {
        if let Some(GclNode::Script(script)) = args.get_mut(1) {
            script.no_braces = true;
        }
    }

    while buf.pos() < end {
        match decode_node(buf, resolver, cmds)? {
            Some(n) => args.push(n),
            None => break,
        }
    }

    cmds.pop();
    Ok(GclNode::Cmd(Command { name, args }))
}

/// Map a raw `TABLE` value to a symbolic name when the enclosing command
/// references one of the archives.
///
/// Unmatched radio offsets keep the literal. Voice and demo values are
/// looked up only when the corresponding archive was supplied, and a
/// miss then is fatal.
fn resolve_table_decode(
    value: u32,
    cmds: &[CommandId],
    resolver: &dyn Resolver,
) -> Result<TableRef> {
    Ok(match cmds.last() {
        Some(CommandId::Radio) => {
            let offset = (value & 0xFFFF) * 0x800;
            match resolver.radio_name_at_offset(offset) {
                Some(name) => TableRef::Name(name.to_string()),
                None => TableRef::Literal(value),
            }
        }
        Some(CommandId::Sound) if resolver.has_vox() => match resolver.vox_name(value) {
            Some(name) => TableRef::Name(name.to_string()),
            None => {
                return Err(CodecError::UnresolvedReference {
                    kind: RefKind::Voice,
                    key: format!("0x{value:X}"),
                })
            }
        },
        Some(CommandId::Demo) if resolver.has_demo() && value != DEMO_SENTINEL => {
            match resolver.demo_name(value) {
                Some(name) => TableRef::Name(name.to_string()),
                None => {
                    return Err(CodecError::UnresolvedReference {
                        kind: RefKind::Demo,
                        key: format!("0x{value:X}"),
                    })
                }
            }
        }
        _ => TableRef::Literal(value),
    })
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a GCX procedure file.
///
/// Two-phase: the procedure data blocks are built first, then the header
/// pairs are laid down with the main procedure first and its data-block
/// length prefix in place. Non-PC variants pad the file to a 4-byte
/// boundary.
pub fn compile(file: &GcxFile, resolver: &dyn Resolver, options: &CodecOptions) -> Result<Vec<u8>> {
    let is_pc = options.is_pc_version.unwrap_or(!resolver.has_vox());

    let mut data = ByteBuffer::new();
    let mut header = ByteBuffer::new();
    let mut procedures_data = ByteBuffer::new();

    for proc in &file.procedures {
        let mut body = ByteBuffer::new();
        encode_node(&proc.body, resolver, &mut body)?;
        if proc.id == 0 {
            data.write_u16(0);
            data.write_u16(frame_len_u16(
                procedures_data.len() + header.len() + 4,
                "main procedure offset",
            )?);
            procedures_data.write_u32(body.len() as u32);
        } else {
            header.write_u16(proc.id);
            header.write_u16(frame_len_u16(procedures_data.len(), "procedure offset")?);
        }
        procedures_data.write_bytes(body.as_slice());
    }

    data.write_bytes(header.as_slice());
    data.write_u32(0);
    data.write_bytes(procedures_data.as_slice());

    let mut fonts_data = ByteBuffer::new();
    for font in &file.fonts {
        fonts_data.write_hex(font)?;
    }
    data.write_u32(fonts_data.len() as u32);
    data.write_bytes(fonts_data.as_slice());

    if !is_pc {
        while data.len() % 4 != 0 {
            data.write_u8(0);
        }
    }
    Ok(data.into_vec())
}

/// Encode one node onto `out`.
pub(crate) fn encode_node(
    node: &GclNode,
    resolver: &dyn Resolver,
    out: &mut ByteBuffer,
) -> Result<()> {
    match node {
        GclNode::Word(v) => {
            out.write_u8(tag::WORD);
            out.write_u16(*v);
        }
        GclNode::Byte(v) => {
            out.write_u8(tag::BYTE);
            out.write_u8(*v);
        }
        GclNode::Char(c) => {
            let v = u32::from(*c);
            if v > 0xFF {
                return Err(CodecError::invariant(format!(
                    "character {c:?} is not representable as a single byte"
                )));
            }
            out.write_u8(tag::CHAR);
            out.write_u8(v as u8);
        }
        GclNode::Flag(b) => {
            out.write_u8(tag::FLAG);
            out.write_u8(u8::from(*b));
        }
        GclNode::StrId(v) => {
            out.write_u8(tag::STR_ID);
            out.write_u16(*v);
        }
        GclNode::Str(s) => {
            let bytes = encode_string(s)?;
            out.write_u8(tag::STR);
            out.write_u8(frame_len_u8(bytes.len(), "STR")?);
            out.write_bytes(&bytes);
        }
        GclNode::Proc(v) => {
            out.write_u8(tag::PROC);
            out.write_u16(*v);
        }
        GclNode::SdCode(v) => {
            out.write_u8(tag::SD_CODE);
            out.write_u32(*v);
        }
        GclNode::Table(t) => {
            out.write_u8(tag::TABLE);
            out.write_u32(resolve_table_encode(t, resolver)?);
        }
        GclNode::Var(var) => {
            let ident = var.ident();
            let valid = ident.len() == 6
                && ident
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c));
            if !valid {
                return Err(CodecError::invariant(format!(
                    "variable identifier {ident:?} is not 6 uppercase hex characters"
                )));
            }
            out.write_u8(tag::VAR | var.sub_code());
            out.write_hex(ident)?;
        }
        GclNode::Arg(v) => {
            out.write_u8(tag::ARG);
            out.write_u8(*v);
        }
        GclNode::Expr(items) => {
            let mut inner = ByteBuffer::new();
            for item in items {
                encode_node(item, resolver, &mut inner)?;
            }
            inner.write_u8(tag::OP);
            inner.write_u8(0);
            out.write_u8(tag::EXPR);
            out.write_u8(frame_len_u8(inner.len() + 1, "EXPR")?);
            out.write_bytes(inner.as_slice());
        }
        GclNode::Op(op) => {
            if op.operands.len() != 2 {
                return Err(CodecError::invariant(format!(
                    "operator {:?} carries {} operand slots, expected 2",
                    op.operator,
                    op.operands.len()
                )));
            }
            encode_node(&op.operands[0], resolver, out)?;
            encode_node(&op.operands[1], resolver, out)?;
            out.write_u8(tag::OP);
            out.write_u8(op.operator.code());
        }
        GclNode::Script(script) => {
            let mut inner = ByteBuffer::new();
            for n in &script.body {
                encode_node(n, resolver, &mut inner)?;
            }
            inner.write_u8(0);
            out.write_u8(tag::SCRIPT);
            out.write_u16(frame_len_u16(inner.len() + 2, "SCRIPT")?);
            let bytes = inner.as_slice();
            if script.no_braces {
                // The length above still counts the dropped byte.
                out.write_bytes(&bytes[..bytes.len() - 1]);
            } else {
                out.write_bytes(bytes);
            }
        }
        GclNode::OptionClause(opt) => {
            out.write_bytes(&encode_option(opt, resolver)?);
        }
        GclNode::Cmd(cmd) => {
            encode_command(cmd, resolver, out)?;
        }
        GclNode::Call(call) => {
            let mut inner = ByteBuffer::new();
            inner.write_u16(call.proc);
            for arg in &call.args {
                encode_node(arg, resolver, &mut inner)?;
            }
            inner.write_u8(0);
            out.write_u8(tag::CALL);
            out.write_u8(frame_len_u8(inner.len() + 1, "CALL")?);
            out.write_bytes(inner.as_slice());
        }
    }
    Ok(())
}

/// Encode an option clause to a standalone byte vector so the enclosing
/// command can patch its length byte.
fn encode_option(opt: &OptionClause, resolver: &dyn Resolver) -> Result<Vec<u8>> {
    let letter = u32::from(opt.letter);
    if letter > 0xFF {
        return Err(CodecError::invariant(format!(
            "option letter {:?} is not a single byte",
            opt.letter
        )));
    }
    let mut inner = ByteBuffer::new();
    for v in &opt.values {
        encode_node(v, resolver, &mut inner)?;
    }
    let mut out = ByteBuffer::new();
    out.write_u8(tag::OPTION);
    out.write_u8(letter as u8);
    if opt.null_size {
        out.write_u8(0);
    } else {
        out.write_u8(frame_len_u8(inner.len() + 1, "OPTION")?);
    }
    out.write_bytes(inner.as_slice());
    Ok(out.into_vec())
}

/// Encode a command frame, applying the `IF` size patches.
fn encode_command(cmd: &Command, resolver: &dyn Resolver, out: &mut ByteBuffer) -> Result<()> {
    let first_option = cmd
        .args
        .iter()
        .position(GclNode::is_option)
        .unwrap_or(cmd.args.len());
    if cmd.args[first_option..].iter().any(|a| !a.is_option()) {
        return Err(CodecError::invariant(format!(
            "{:?} command has arguments after its first option clause",
            cmd.name
        )));
    }

    let mut arg_bytes = ByteBuffer::new();
    for arg in &cmd.args[..first_option] {
        encode_node(arg, resolver, &mut arg_bytes)?;
    }

    let mut args_size = arg_bytes.len() + 1;
    if cmd.name == CommandId::If && cmd.args.len() == 2 {
        args_size += 1;
    }

    let mut option_bytes = ByteBuffer::new();
    for (i, arg) in cmd.args.iter().enumerate() {
        let GclNode::OptionClause(opt) = arg else {
            continue;
        };
        let mut one = encode_option(opt, resolver)?;
        if cmd.name == CommandId::If && i == cmd.args.len() - 1 {
            let bump = (opt.letter == 'i' && opt.values.len() == 2)
                || (opt.letter == 'e' && opt.values.len() == 1);
            if bump {
                one[2] = one[2].wrapping_add(1);
            }
        }
        option_bytes.write_bytes(&one);
    }

    let mut command = ByteBuffer::new();
    command.write_u16(cmd.name.code());
    command.write_u8(frame_len_u8(args_size, "CMD args")?);
    command.write_bytes(arg_bytes.as_slice());
    command.write_bytes(option_bytes.as_slice());
    command.write_u8(0);

    out.write_u8(tag::CMD);
    out.write_u16(frame_len_u16(command.len() + 2, "CMD")?);
    out.write_bytes(command.as_slice());
    Ok(())
}

/// Resolve a `TABLE` leaf back to its 32-bit value.
fn resolve_table_encode(table: &TableRef, resolver: &dyn Resolver) -> Result<u32> {
    match table {
        TableRef::Literal(v) => Ok(*v),
        TableRef::Name(name) => {
            let lower = name.to_ascii_lowercase();
            let (kind, resolved) = if lower.starts_with("rd_") {
                (RefKind::Radio, resolver.radio_call_descriptor(name))
            } else if lower.starts_with("vc") {
                (RefKind::Voice, resolver.vox_block_index(name))
            } else if lower.starts_with('s') {
                (RefKind::Demo, resolver.demo_block_index(name))
            } else {
                (RefKind::Table, None)
            };
            resolved.ok_or_else(|| CodecError::UnresolvedReference {
                kind,
                key: name.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::NullResolver;
    use pretty_assertions::assert_eq;

    fn decode_one(bytes: &[u8]) -> GclNode {
        let mut buf = ByteBuffer::from_vec(bytes.to_vec());
        let mut cmds = Vec::new();
        decode_node(&mut buf, &NullResolver, &mut cmds)
            .unwrap()
            .unwrap()
    }

    fn encode_one(node: &GclNode) -> Vec<u8> {
        let mut out = ByteBuffer::new();
        encode_node(node, &NullResolver, &mut out).unwrap();
        out.into_vec()
    }

    #[test]
    fn test_expr_postfix_addition() {
        // arg0 + arg1 in postfix, closed by the OP_NULL sentinel.
        let bytes = [
            0x30, 0x09, 0x20, 0x00, 0x20, 0x01, 0x31, 0x04, 0x31, 0x00,
        ];
        let node = decode_one(&bytes);
        assert_eq!(
            node,
            GclNode::Expr(vec![GclNode::Op(Operation {
                operator: Operator::Add,
                operands: vec![GclNode::Arg(0), GclNode::Arg(1)],
            })])
        );
        assert_eq!(encode_one(&node), bytes);
    }

    #[test]
    fn test_empty_expr_roundtrip() {
        let bytes = [0x30, 0x03, 0x31, 0x00];
        let node = decode_one(&bytes);
        assert_eq!(node, GclNode::Expr(vec![]));
        assert_eq!(encode_one(&node), bytes);
    }

    #[test]
    fn test_var_roundtrip() {
        let node = GclNode::Var(VarRef::Flag("00AB12".to_string()));
        let bytes = encode_one(&node);
        assert_eq!(bytes, vec![0x14, 0x00, 0xAB, 0x12]);
        assert_eq!(decode_one(&bytes), node);
    }

    #[test]
    fn test_var_identifier_invariant() {
        let node = GclNode::Var(VarRef::Word("ab12".to_string()));
        let mut out = ByteBuffer::new();
        let err = encode_node(&node, &NullResolver, &mut out).unwrap_err();
        assert!(matches!(err, CodecError::InvariantViolation { .. }));
    }

    #[test]
    fn test_string_roundtrip() {
        let node = GclNode::Str("abc\\x80".to_string());
        let bytes = encode_one(&node);
        // Tag, declared length (content + NUL), content, NUL.
        assert_eq!(bytes, vec![0x07, 0x05, b'a', b'b', b'c', 0x80, 0x00]);
        assert_eq!(decode_one(&bytes), node);
    }

    #[test]
    fn test_mesg_command_roundtrip() {
        let node = GclNode::Cmd(Command {
            name: CommandId::Mesg,
            args: vec![GclNode::Byte(0)],
        });
        let bytes = encode_one(&node);
        assert_eq!(
            bytes,
            vec![0x60, 0x00, 0x08, 0x22, 0xFF, 0x03, 0x02, 0x00, 0x00]
        );
        assert_eq!(decode_one(&bytes), node);
    }

    #[test]
    fn test_call_roundtrip() {
        let node = GclNode::Call(Call {
            proc: 0x1234,
            args: vec![GclNode::Word(7)],
        });
        let bytes = encode_one(&node);
        assert_eq!(bytes, vec![0x70, 0x07, 0x12, 0x34, 0x01, 0x00, 0x07, 0x00]);
        assert_eq!(decode_one(&bytes), node);
    }

    fn cond_expr() -> GclNode {
        GclNode::Expr(vec![GclNode::Arg(0)])
    }

    fn script_of(nodes: Vec<GclNode>) -> GclNode {
        GclNode::Script(Script {
            body: nodes,
            no_braces: false,
        })
    }

    fn mesg(value: u8) -> GclNode {
        GclNode::Cmd(Command {
            name: CommandId::Mesg,
            args: vec![GclNode::Byte(value)],
        })
    }

    #[test]
    fn test_if_two_args_gets_args_size_bump() {
        let node = GclNode::Cmd(Command {
            name: CommandId::If,
            args: vec![cond_expr(), script_of(vec![mesg(1)])],
        });
        let bytes = encode_one(&node);
        // cond: 30 05 20 00 31 00 (6 bytes); body script frame is 13
        // bytes. Raw argument payload is 19 bytes; the declared
        // args-length is payload + 1 + the two-argument patch.
        assert_eq!(bytes[5], 19 + 1 + 1);
        assert_eq!(decode_one(&bytes), node);
    }

    #[test]
    fn test_if_with_else_patches_option_length_not_args() {
        let node = GclNode::Cmd(Command {
            name: CommandId::If,
            args: vec![
                cond_expr(),
                script_of(vec![mesg(1)]),
                GclNode::OptionClause(OptionClause {
                    letter: 'e',
                    values: vec![script_of(vec![mesg(2)])],
                    null_size: false,
                }),
            ],
        });
        let bytes = encode_one(&node);
        // Three arguments: no args-size bump.
        assert_eq!(bytes[5], 19 + 1);
        // Option frame follows the two arguments: tag, letter, length.
        let opt_at = 6 + 19;
        assert_eq!(bytes[opt_at], 0x50);
        assert_eq!(bytes[opt_at + 1], b'e');
        // The script value is 13 bytes; declared length is 13 + 1, plus
        // the trailing else patch.
        assert_eq!(bytes[opt_at + 2], 13 + 1 + 1);
        assert_eq!(decode_one(&bytes), node);
    }

    #[test]
    fn test_if_elseif_option_patch() {
        let node = GclNode::Cmd(Command {
            name: CommandId::If,
            args: vec![
                cond_expr(),
                script_of(vec![mesg(1)]),
                GclNode::OptionClause(OptionClause {
                    letter: 'i',
                    values: vec![cond_expr(), script_of(vec![mesg(2)])],
                    null_size: false,
                }),
            ],
        });
        let bytes = encode_one(&node);
        let opt_at = 6 + 19;
        assert_eq!(bytes[opt_at + 1], b'i');
        // 6-byte condition + 13-byte script, + 1, + elseif patch.
        assert_eq!(bytes[opt_at + 2], 19 + 1 + 1);
        assert_eq!(decode_one(&bytes), node);
    }

    #[test]
    fn test_unexpected_opcode() {
        let mut buf = ByteBuffer::from_vec(vec![0x5A]);
        let mut cmds = Vec::new();
        let err = decode_node(&mut buf, &NullResolver, &mut cmds).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedOpcode {
                code: 0x5A,
                offset: 0
            }
        ));
    }

    #[test]
    fn test_minimal_procedure_file_roundtrip() {
        let file = GcxFile {
            procedures: vec![Procedure {
                id: 0,
                body: mesg(0),
            }],
            fonts: vec![],
        };
        let bytes = compile(&file, &NullResolver, &CodecOptions::console()).unwrap();
        #[rustfmt::skip]
        let expected = vec![
            0x00, 0x00, 0x00, 0x04,             // main pair
            0x00, 0x00, 0x00, 0x00,             // header terminator
            0x00, 0x00, 0x00, 0x09,             // main data-block length
            0x60, 0x00, 0x08, 0x22, 0xFF, 0x03, 0x02, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,             // font section length
            0x00, 0x00, 0x00,                   // 4-byte alignment
        ];
        assert_eq!(bytes, expected);

        let back = decompile(&bytes, &NullResolver).unwrap();
        assert_eq!(back, file);
        let again = compile(&back, &NullResolver, &CodecOptions::console()).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_pc_variant_skips_file_padding() {
        let file = GcxFile {
            procedures: vec![Procedure {
                id: 0,
                body: mesg(0),
            }],
            fonts: vec![],
        };
        let bytes = compile(&file, &NullResolver, &CodecOptions::pc()).unwrap();
        assert_eq!(bytes.len(), 25);
        assert_eq!(decompile(&bytes, &NullResolver).unwrap(), file);
    }

    #[test]
    fn test_multi_procedure_layout() {
        let file = GcxFile {
            procedures: vec![
                Procedure {
                    id: 0x1234,
                    body: mesg(1),
                },
                Procedure {
                    id: 0,
                    body: mesg(0),
                },
            ],
            fonts: vec![],
        };
        let bytes = compile(&file, &NullResolver, &CodecOptions::pc()).unwrap();
        // Main pair first, then the sub procedure pair.
        assert_eq!(&bytes[0..2], &[0x00, 0x00]);
        assert_eq!(&bytes[4..6], &[0x12, 0x34]);
        let back = decompile(&bytes, &NullResolver).unwrap();
        assert_eq!(back, file);
        assert_eq!(
            compile(&back, &NullResolver, &CodecOptions::pc()).unwrap(),
            bytes
        );
    }

    #[test]
    fn test_fonts_roundtrip() {
        let glyph = "ab".repeat(36);
        let file = GcxFile {
            procedures: vec![Procedure {
                id: 0,
                body: mesg(0),
            }],
            fonts: vec![glyph.clone(), glyph],
        };
        let bytes = compile(&file, &NullResolver, &CodecOptions::pc()).unwrap();
        let back = decompile(&bytes, &NullResolver).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn test_demo_sentinel_stays_literal() {
        let node = GclNode::Cmd(Command {
            name: CommandId::Demo,
            args: vec![GclNode::Table(TableRef::Literal(DEMO_SENTINEL))],
        });
        let bytes = encode_one(&node);
        assert_eq!(decode_one(&bytes), node);
    }

    fn decode_with(bytes: &[u8], resolver: &dyn Resolver) -> Result<GclNode> {
        let mut buf = ByteBuffer::from_vec(bytes.to_vec());
        let mut cmds = Vec::new();
        decode_node(&mut buf, resolver, &mut cmds).map(|n| n.expect("node"))
    }

    #[test]
    fn test_sound_table_miss_fatal_only_with_vox_table() {
        use crate::archive::DatEntry;
        use crate::resolver::CrossRef;

        let node = GclNode::Cmd(Command {
            name: CommandId::Sound,
            args: vec![GclNode::Table(TableRef::Literal(17))],
        });
        let bytes = encode_one(&node);

        // No VOX table: the value stays numeric.
        assert_eq!(decode_with(&bytes, &NullResolver).unwrap(), node);

        // VOX table present but no entry at block 17: fatal.
        let miss = CrossRef::new().with_vox(&[DatEntry::new("vc000001", 0x800, vec![])]);
        let err = decode_with(&bytes, &miss).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnresolvedReference {
                kind: RefKind::Voice,
                ..
            }
        ));

        // A hit maps to the entry's name.
        let hit = CrossRef::new().with_vox(&[DatEntry::new("vc000011", 17 * 0x800, vec![])]);
        let decoded = decode_with(&bytes, &hit).unwrap();
        assert_eq!(
            decoded,
            GclNode::Cmd(Command {
                name: CommandId::Sound,
                args: vec![GclNode::Table(TableRef::Name("vc000011".into()))],
            })
        );
    }

    #[test]
    fn test_demo_table_miss_fatal_only_with_demo_table() {
        use crate::archive::DatEntry;
        use crate::resolver::CrossRef;

        let node = GclNode::Cmd(Command {
            name: CommandId::Demo,
            args: vec![GclNode::Table(TableRef::Literal(5))],
        });
        let bytes = encode_one(&node);

        // No DEMO table: the value stays numeric.
        assert_eq!(decode_with(&bytes, &NullResolver).unwrap(), node);

        // DEMO table present but no entry at block 5: fatal.
        let xref = CrossRef::new().with_demo(&[DatEntry::new("s0101a0.dmo", 0, vec![])]);
        let err = decode_with(&bytes, &xref).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnresolvedReference {
                kind: RefKind::Demo,
                ..
            }
        ));

        // The sentinel bypasses the lookup even with a table present.
        let sentinel = GclNode::Cmd(Command {
            name: CommandId::Demo,
            args: vec![GclNode::Table(TableRef::Literal(DEMO_SENTINEL))],
        });
        let bytes = encode_one(&sentinel);
        assert_eq!(decode_with(&bytes, &xref).unwrap(), sentinel);
    }

    #[test]
    fn test_platform_derived_from_vox_table() {
        use crate::archive::DatEntry;
        use crate::resolver::CrossRef;

        let file = GcxFile {
            procedures: vec![Procedure {
                id: 0,
                body: mesg(0),
            }],
            fonts: vec![],
        };
        // Platform unset + VOX table present: console variant, so the
        // file gains 4-byte alignment padding.
        let xref = CrossRef::new().with_vox(&[DatEntry::new("vc000001", 0, vec![])]);
        let bytes = compile(&file, &xref, &CodecOptions::new()).unwrap();
        assert_eq!(bytes.len(), 28);

        // Platform unset + no VOX table: PC variant, unpadded.
        let bytes = compile(&file, &NullResolver, &CodecOptions::new()).unwrap();
        assert_eq!(bytes.len(), 25);
    }

    #[test]
    fn test_unresolved_table_name_fails_encode() {
        let node = GclNode::Table(TableRef::Name("vc000001".to_string()));
        let mut out = ByteBuffer::new();
        let err = encode_node(&node, &NullResolver, &mut out).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnresolvedReference {
                kind: RefKind::Voice,
                ..
            }
        ));
    }
}
