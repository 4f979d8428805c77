//! End-to-end round-trip tests across the GCX and RADIO codecs.

use pretty_assertions::assert_eq;

use gcl_codec::{
    compile_gcx, compile_radio, decompile_gcx, decompile_radio, Call, CodecOptions, Command,
    CommandId, CrossRef, Dialog, GclNode, GcxFile, NullResolver, Operation, Operator,
    OptionClause, Procedure, RadioNode, Script, TableRef, VarRef,
};

fn expr(nodes: Vec<GclNode>) -> GclNode {
    GclNode::Expr(nodes)
}

fn op(operator: Operator, lhs: GclNode, rhs: GclNode) -> GclNode {
    GclNode::Op(Operation {
        operator,
        operands: vec![lhs, rhs],
    })
}

fn cmd(name: CommandId, args: Vec<GclNode>) -> GclNode {
    GclNode::Cmd(Command { name, args })
}

fn script(body: Vec<GclNode>) -> GclNode {
    GclNode::Script(Script {
        body,
        no_braces: false,
    })
}

fn script_no_braces(body: Vec<GclNode>) -> GclNode {
    GclNode::Script(Script {
        body,
        no_braces: true,
    })
}

/// A procedure body exercising most of the node set.
fn kitchen_sink_body() -> GclNode {
    script(vec![
        cmd(
            CommandId::Eval,
            vec![expr(vec![op(
                Operator::Assign,
                GclNode::Var(VarRef::Word("00AB12".into())),
                GclNode::Word(42),
            )])],
        ),
        cmd(
            CommandId::If,
            vec![
                expr(vec![op(
                    Operator::Equals,
                    GclNode::Var(VarRef::Flag("000102".into())),
                    GclNode::Flag(true),
                )]),
                script(vec![cmd(CommandId::Mesg, vec![GclNode::Str("yes".into())])]),
                GclNode::OptionClause(OptionClause {
                    letter: 'e',
                    values: vec![script(vec![cmd(
                        CommandId::Mesg,
                        vec![GclNode::Str("no\\x85".into())],
                    )])],
                    null_size: false,
                }),
            ],
        ),
        cmd(
            CommandId::Sound,
            vec![GclNode::Byte(3), GclNode::Table(TableRef::Literal(17))],
        ),
        GclNode::Call(Call {
            proc: 0x4242,
            args: vec![GclNode::Arg(0), GclNode::Char('x'), GclNode::SdCode(9)],
        }),
        cmd(CommandId::Return, vec![]),
    ])
}

#[test]
fn gcx_roundtrip_kitchen_sink() {
    let file = GcxFile {
        procedures: vec![
            Procedure {
                id: 0x4242,
                body: script(vec![cmd(CommandId::Mesg, vec![GclNode::StrId(7)])]),
            },
            Procedure {
                id: 0,
                body: kitchen_sink_body(),
            },
        ],
        fonts: vec!["0f".repeat(36), "a0".repeat(36)],
    };

    for options in [CodecOptions::console(), CodecOptions::pc()] {
        let bytes = compile_gcx(&file, &NullResolver, &options).unwrap();
        if options.is_pc_version == Some(false) {
            assert_eq!(bytes.len() % 4, 0);
        }
        let back = decompile_gcx(&bytes, &NullResolver).unwrap();
        assert_eq!(back, file);
        let again = compile_gcx(&back, &NullResolver, &options).unwrap();
        assert_eq!(again, bytes);
    }
}

#[test]
fn gcx_roundtrip_no_braces_if() {
    // A brace-less `if` body swallows the command terminator; the
    // re-encoded length must equal the original.
    let file = GcxFile {
        procedures: vec![Procedure {
            id: 0,
            body: script(vec![cmd(
                CommandId::If,
                vec![
                    expr(vec![GclNode::Arg(0)]),
                    script_no_braces(vec![cmd(CommandId::Return, vec![])]),
                ],
            )]),
        }],
        fonts: vec![],
    };
    let bytes = compile_gcx(&file, &NullResolver, &CodecOptions::pc()).unwrap();
    let back = decompile_gcx(&bytes, &NullResolver).unwrap();
    assert_eq!(back, file);
    assert_eq!(
        compile_gcx(&back, &NullResolver, &CodecOptions::pc()).unwrap(),
        bytes
    );
}

#[test]
fn gcx_roundtrip_null_size_option() {
    let file = GcxFile {
        procedures: vec![Procedure {
            id: 0,
            body: script(vec![cmd(
                CommandId::Menu,
                vec![
                    GclNode::Byte(1),
                    GclNode::OptionClause(OptionClause {
                        letter: 'x',
                        values: vec![GclNode::Word(5)],
                        null_size: true,
                    }),
                ],
            )]),
        }],
        fonts: vec![],
    };
    let bytes = compile_gcx(&file, &NullResolver, &CodecOptions::pc()).unwrap();
    let back = decompile_gcx(&bytes, &NullResolver).unwrap();
    assert_eq!(back, file);
    assert_eq!(
        compile_gcx(&back, &NullResolver, &CodecOptions::pc()).unwrap(),
        bytes
    );
}

fn tiny_dialog(name: &str, voice_code: u32) -> Dialog {
    Dialog {
        name: name.to_string(),
        offset: 0,
        freq: 14085,
        face_size: 2,
        face_offset: 8,
        flags: 0,
        data: RadioNode::Script(vec![
            RadioNode::Voice {
                name: format!("vc{voice_code:06x}"),
                body: vec![
                    RadioNode::Talk {
                        character: 1,
                        anim: 2,
                        unk: 0,
                        text: "...".into(),
                    },
                    RadioNode::EndLine,
                ],
            },
            RadioNode::EndLine,
        ]),
        fonts: vec![],
    }
}

#[test]
fn radio_single_language_descriptors() {
    let dialogs = vec![
        tiny_dialog("RD_01_1", 0x011000),
        tiny_dialog("RD_01_2", 0x012000),
    ];
    let pc = CodecOptions::pc();
    let image = compile_radio(&dialogs, &NullResolver, &pc).unwrap();
    // {size, 0, offset} in blocks.
    assert_eq!(image.calls["RD_01_1"], 0x0100_0000);
    assert_eq!(image.calls["RD_01_2"], 0x0100_0001);

    let back = decompile_radio(&image.data, &NullResolver, &pc).unwrap();
    assert_eq!(back[0].name, "RD_01_1");
    assert_eq!(back[1].name, "RD_01_2");
    let again = compile_radio(&back, &NullResolver, &pc).unwrap();
    assert_eq!(again.data, image.data);
}

#[test]
fn radio_bilingual_descriptors_are_paired() {
    // Above 500 dialogs the archive is assumed bilingual: adjacent
    // dialogs share one descriptor of the form {A_size, B_size, A_offset}.
    let count = 502;
    let dialogs: Vec<Dialog> = (0..count)
        .map(|i| tiny_dialog(&format!("rd_{i:03}"), 0x010000 + ((i as u32 / 2) << 8)))
        .collect();
    let pc = CodecOptions::pc();
    let image = compile_radio(&dialogs, &NullResolver, &pc).unwrap();

    assert_eq!(image.calls["rd_000"], image.calls["rd_001"]);
    assert_eq!(image.calls["rd_000"], 0x0101_0000);
    assert_eq!(image.calls["rd_002"], image.calls["rd_003"]);
    assert_eq!(image.calls["rd_002"], 0x0101_0002);

    let back = decompile_radio(&image.data, &NullResolver, &pc).unwrap();
    assert_eq!(back.len(), count);
    // Language pairs reference the same scene, so their synthesized
    // names collide into adjacent suffixes and share a descriptor.
    let again = compile_radio(&back, &NullResolver, &pc).unwrap();
    assert_eq!(again.data, image.data);
    assert_eq!(again.calls[&back[0].name], again.calls[&back[1].name]);
}

#[test]
fn gcx_radio_cross_reference() {
    // A RADIO command whose TABLE points at the dialog stored at byte
    // offset 0x80000 (block 0x100) with one-block size.
    let descriptor = 0x0001_0100u32;

    let dialog_stub = Dialog {
        offset: 0x80000,
        ..tiny_dialog("RD_02_1", 0x021000)
    };
    let decode_xref = CrossRef::new().with_radio_dialogs(&[dialog_stub]);
    let encode_xref = CrossRef::new()
        .with_radio_calls([("RD_02_1".to_string(), descriptor)].into_iter().collect());

    let file = GcxFile {
        procedures: vec![Procedure {
            id: 0,
            body: script(vec![cmd(
                CommandId::Radio,
                vec![GclNode::Table(TableRef::Literal(descriptor))],
            )]),
        }],
        fonts: vec![],
    };
    let pc = CodecOptions::pc();
    let bytes = compile_gcx(&file, &NullResolver, &pc).unwrap();

    let decoded = decompile_gcx(&bytes, &decode_xref).unwrap();
    let GclNode::Script(Script { body, .. }) = &decoded.procedures[0].body else {
        panic!("expected script body");
    };
    let GclNode::Cmd(Command { args, .. }) = &body[0] else {
        panic!("expected radio command");
    };
    assert_eq!(args[0], GclNode::Table(TableRef::Name("RD_02_1".into())));

    let rebuilt = compile_gcx(&decoded, &encode_xref, &pc).unwrap();
    assert_eq!(rebuilt, bytes);
}

#[test]
fn gcx_unresolved_radio_name_fails() {
    let file = GcxFile {
        procedures: vec![Procedure {
            id: 0,
            body: script(vec![cmd(
                CommandId::Radio,
                vec![GclNode::Table(TableRef::Name("RD_99_9".into()))],
            )]),
        }],
        fonts: vec![],
    };
    let err = compile_gcx(&file, &NullResolver, &CodecOptions::pc()).unwrap_err();
    assert!(err.to_string().contains("RD_99_9"));
}

#[test]
fn dialog_document_roundtrip() {
    // The structured-document form must preserve everything the codec
    // needs, annotations included.
    let mut dialog = tiny_dialog("RD_02_1", 0x021000);
    dialog.fonts = vec!["12".repeat(36)];
    let json = serde_json::to_string(&dialog).unwrap();
    let back: Dialog = serde_json::from_str(&json).unwrap();
    assert_eq!(back, dialog);

    let pc = CodecOptions::pc();
    let a = compile_radio(&[dialog], &NullResolver, &pc).unwrap();
    let b = compile_radio(&[back], &NullResolver, &pc).unwrap();
    assert_eq!(a.data, b.data);
}
