//! AST types for the GCL scripting language and RADIO dialog archives.
//!
//! Every on-wire opcode is a variant of a sum type, so exhaustive pattern
//! matching covers the whole instruction set. The serde representation is
//! externally tagged — one key per tag, value per payload — which is the
//! structured-document form the surrounding tooling reads and writes.
//!
//! Two annotations exist purely so the encoder can reproduce
//! irregularities observed by the decoder: [`Script::no_braces`] and
//! [`OptionClause::null_size`]. They never change semantics.

use serde::{Deserialize, Serialize};

// =============================================================================
// Operators
// =============================================================================

/// Expression operators.
///
/// Codes 1–3 are unary (one meaningful operand); codes 4–20 are binary.
/// Code 0 is the on-wire `OP_NULL` sentinel terminating an expression and
/// never appears in the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "NEGATE")]
    Negate,
    #[serde(rename = "ISFALSE")]
    IsFalse,
    #[serde(rename = "COMPLEMENT")]
    Complement,
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "SUBTRACT")]
    Subtract,
    #[serde(rename = "MULTIPLY")]
    Multiply,
    #[serde(rename = "DIVIDE")]
    Divide,
    #[serde(rename = "MODULUS")]
    Modulus,
    #[serde(rename = "EQUALS")]
    Equals,
    #[serde(rename = "NOTEQUALS")]
    NotEquals,
    #[serde(rename = "LESSTHAN")]
    LessThan,
    #[serde(rename = "LESSTHANOREQUAL")]
    LessThanOrEqual,
    #[serde(rename = "GREATERTHAN")]
    GreaterThan,
    #[serde(rename = "GREATERTHANOREQUAL")]
    GreaterThanOrEqual,
    #[serde(rename = "BITWISEOR")]
    BitwiseOr,
    #[serde(rename = "BITWISEAND")]
    BitwiseAnd,
    #[serde(rename = "BITWISEXOR")]
    BitwiseXor,
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "ASSIGN")]
    Assign,
}

impl Operator {
    /// The on-wire operator code.
    pub fn code(&self) -> u8 {
        match self {
            Operator::Negate => 1,
            Operator::IsFalse => 2,
            Operator::Complement => 3,
            Operator::Add => 4,
            Operator::Subtract => 5,
            Operator::Multiply => 6,
            Operator::Divide => 7,
            Operator::Modulus => 8,
            Operator::Equals => 9,
            Operator::NotEquals => 10,
            Operator::LessThan => 11,
            Operator::LessThanOrEqual => 12,
            Operator::GreaterThan => 13,
            Operator::GreaterThanOrEqual => 14,
            Operator::BitwiseOr => 15,
            Operator::BitwiseAnd => 16,
            Operator::BitwiseXor => 17,
            Operator::Or => 18,
            Operator::And => 19,
            Operator::Assign => 20,
        }
    }

    /// Look up an operator by its on-wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Operator::Negate,
            2 => Operator::IsFalse,
            3 => Operator::Complement,
            4 => Operator::Add,
            5 => Operator::Subtract,
            6 => Operator::Multiply,
            7 => Operator::Divide,
            8 => Operator::Modulus,
            9 => Operator::Equals,
            10 => Operator::NotEquals,
            11 => Operator::LessThan,
            12 => Operator::LessThanOrEqual,
            13 => Operator::GreaterThan,
            14 => Operator::GreaterThanOrEqual,
            15 => Operator::BitwiseOr,
            16 => Operator::BitwiseAnd,
            17 => Operator::BitwiseXor,
            18 => Operator::Or,
            19 => Operator::And,
            20 => Operator::Assign,
            _ => return None,
        })
    }

    /// Whether the operator consumes a single meaningful operand.
    pub fn is_unary(&self) -> bool {
        self.code() < 4
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Fixed command ids used by `CMD` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandId {
    // Keyword commands
    If,
    Eval,
    Return,
    Foreach,
    // Regular commands
    Mesg,
    Trap,
    Chara,
    Map,
    Mapdef,
    Camera,
    Light,
    Start,
    Load,
    Radio,
    Restart,
    Demo,
    Ntrap,
    Delay,
    Pad,
    Varsave,
    System,
    Sound,
    Menu,
    Rand,
    Func,
    Demodebug,
    Print,
    Jimaku,
}

impl CommandId {
    /// The 16-bit hashed command id stored on the wire.
    pub fn code(&self) -> u16 {
        match self {
            CommandId::If => 0x0d86,
            CommandId::Eval => 0x64c0,
            CommandId::Return => 0xcd3a,
            CommandId::Foreach => 0x7636,
            CommandId::Mesg => 0x22ff,
            CommandId::Trap => 0xd4cb,
            CommandId::Chara => 0x9906,
            CommandId::Map => 0xc091,
            CommandId::Mapdef => 0x7d50,
            CommandId::Camera => 0xeee9,
            CommandId::Light => 0x306a,
            CommandId::Start => 0x9a1f,
            CommandId::Load => 0xc8bb,
            CommandId::Radio => 0x24e1,
            CommandId::Restart => 0xe43c,
            CommandId::Demo => 0xa242,
            CommandId::Ntrap => 0xdbab,
            CommandId::Delay => 0x430d,
            CommandId::Pad => 0xcc85,
            CommandId::Varsave => 0x5c9e,
            CommandId::System => 0x4ad9,
            CommandId::Sound => 0x698d,
            CommandId::Menu => 0x226d,
            CommandId::Rand => 0x925e,
            // Semantics unconfirmed; arguments pass through untouched.
            CommandId::Func => 0xe257,
            CommandId::Demodebug => 0xa2bf,
            CommandId::Print => 0xb96e,
            // "subtitle"
            CommandId::Jimaku => 0xec9d,
        }
    }

    /// Look up a command by its 16-bit id.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0x0d86 => CommandId::If,
            0x64c0 => CommandId::Eval,
            0xcd3a => CommandId::Return,
            0x7636 => CommandId::Foreach,
            0x22ff => CommandId::Mesg,
            0xd4cb => CommandId::Trap,
            0x9906 => CommandId::Chara,
            0xc091 => CommandId::Map,
            0x7d50 => CommandId::Mapdef,
            0xeee9 => CommandId::Camera,
            0x306a => CommandId::Light,
            0x9a1f => CommandId::Start,
            0xc8bb => CommandId::Load,
            0x24e1 => CommandId::Radio,
            0xe43c => CommandId::Restart,
            0xa242 => CommandId::Demo,
            0xdbab => CommandId::Ntrap,
            0x430d => CommandId::Delay,
            0xcc85 => CommandId::Pad,
            0x5c9e => CommandId::Varsave,
            0x4ad9 => CommandId::System,
            0x698d => CommandId::Sound,
            0x226d => CommandId::Menu,
            0x925e => CommandId::Rand,
            0xe257 => CommandId::Func,
            0xa2bf => CommandId::Demodebug,
            0xb96e => CommandId::Print,
            0xec9d => CommandId::Jimaku,
            _ => return None,
        })
    }
}

// =============================================================================
// GCL AST
// =============================================================================

/// A `TABLE` leaf: either a raw 32-bit literal or a symbolic reference
/// (`rd_*`, `vc*`, `s*`) to be resolved against the container archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableRef {
    /// Symbolic name resolved through the cross-reference tables.
    Name(String),
    /// Raw 32-bit value kept as-is.
    Literal(u32),
}

/// A `VAR` leaf: sub-typed variable with a 3-byte identifier rendered as
/// exactly six uppercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarRef {
    #[serde(rename = "WORD")]
    Word(String),
    #[serde(rename = "BYTE")]
    Byte(String),
    #[serde(rename = "CHAR")]
    Char(String),
    #[serde(rename = "FLAG")]
    Flag(String),
    #[serde(rename = "STR_ID")]
    StrId(String),
}

impl VarRef {
    /// The low-nibble sub-type code packed into the `VAR` opcode byte.
    pub fn sub_code(&self) -> u8 {
        match self {
            VarRef::Word(_) => 1,
            VarRef::Byte(_) => 2,
            VarRef::Char(_) => 3,
            VarRef::Flag(_) => 4,
            VarRef::StrId(_) => 6,
        }
    }

    /// Build a variable reference from a sub-type code and identifier.
    pub fn from_sub_code(code: u8, ident: String) -> Option<Self> {
        Some(match code {
            1 => VarRef::Word(ident),
            2 => VarRef::Byte(ident),
            3 => VarRef::Char(ident),
            4 => VarRef::Flag(ident),
            6 => VarRef::StrId(ident),
            _ => return None,
        })
    }

    /// The 6-hex-character identifier.
    pub fn ident(&self) -> &str {
        match self {
            VarRef::Word(s)
            | VarRef::Byte(s)
            | VarRef::Char(s)
            | VarRef::Flag(s)
            | VarRef::StrId(s) => s,
        }
    }
}

/// An operator application with its two operand slots.
///
/// Unary operators (codes 1–3) keep both slots on the wire; only the
/// second is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub operator: Operator,
    pub operands: Vec<GclNode>,
}

/// An ordered block of commands and calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub body: Vec<GclNode>,
    /// The source omitted the braces around this block; the re-encoder
    /// drops the trailing byte to match.
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_braces: bool,
}

/// An option clause: a letter key and its argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionClause {
    pub letter: char,
    pub values: Vec<GclNode>,
    /// The original length byte was zero despite a non-empty body; the
    /// re-encoder writes zero to match.
    #[serde(default, skip_serializing_if = "is_false")]
    pub null_size: bool,
}

/// A command invocation. Options, when present, sit at the tail of `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: CommandId,
    pub args: Vec<GclNode>,
}

/// A procedure call by 16-bit id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub proc: u16,
    pub args: Vec<GclNode>,
}

/// A GCL AST node, one variant per opcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GclNode {
    #[serde(rename = "WORD")]
    Word(u16),
    #[serde(rename = "BYTE")]
    Byte(u8),
    #[serde(rename = "CHAR")]
    Char(char),
    #[serde(rename = "FLAG")]
    Flag(bool),
    #[serde(rename = "STR_ID")]
    StrId(u16),
    #[serde(rename = "STR")]
    Str(String),
    #[serde(rename = "PROC")]
    Proc(u16),
    #[serde(rename = "SD_CODE")]
    SdCode(u32),
    #[serde(rename = "TABLE")]
    Table(TableRef),
    #[serde(rename = "VAR")]
    Var(VarRef),
    #[serde(rename = "ARG")]
    Arg(u8),
    #[serde(rename = "EXPR")]
    Expr(Vec<GclNode>),
    #[serde(rename = "OP")]
    Op(Operation),
    #[serde(rename = "SCRIPT")]
    Script(Script),
    #[serde(rename = "OPTION")]
    OptionClause(OptionClause),
    #[serde(rename = "CMD")]
    Cmd(Command),
    #[serde(rename = "CALL")]
    Call(Call),
}

impl GclNode {
    /// Whether this node is an option clause.
    pub fn is_option(&self) -> bool {
        matches!(self, GclNode::OptionClause(_))
    }
}

/// One procedure of a GCX file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    /// Hashed procedure id; the main procedure uses id 0.
    #[serde(rename = "PROC_ID")]
    pub id: u16,
    #[serde(rename = "PROC_DATA")]
    pub body: GclNode,
}

/// A decoded GCX procedure file.
///
/// The main procedure (id 0) is conventionally stored last here even
/// though its header pair comes first on disk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GcxFile {
    pub procedures: Vec<Procedure>,
    /// Trailing 36-byte font glyphs as hex strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fonts: Vec<String>,
}

// =============================================================================
// RADIO AST
// =============================================================================

/// One branch of a `RANDSWITCH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandCase {
    pub value: u16,
    pub body: RadioNode,
}

/// A RADIO dialog op, one variant per opcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RadioNode {
    /// Present in the opcode enumeration; never produced by the corpus.
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "TALK")]
    Talk {
        character: u16,
        anim: u16,
        unk: u16,
        text: String,
    },
    #[serde(rename = "VOICE")]
    Voice {
        name: String,
        body: Vec<RadioNode>,
    },
    #[serde(rename = "ANIM")]
    Anim { character: u16, anim: u16, unk: u16 },
    #[serde(rename = "ADD_CONTACT")]
    AddContact { freq: u16, name: String },
    #[serde(rename = "MEMSAVE")]
    MemSave(Vec<GclNode>),
    #[serde(rename = "SOUND")]
    Sound(String),
    #[serde(rename = "PROMPT")]
    Prompt(Vec<GclNode>),
    #[serde(rename = "VARSAVE")]
    VarSave(Vec<GclNode>),
    /// Condition plus body; the then-branch comes first in `body`,
    /// followed by any `ELSEIF`/`ELSE` children.
    #[serde(rename = "IF")]
    If {
        cond: GclNode,
        body: Vec<RadioNode>,
    },
    #[serde(rename = "ELSE")]
    Else(Vec<RadioNode>),
    #[serde(rename = "ELSEIF")]
    ElseIf {
        cond: GclNode,
        body: Box<RadioNode>,
    },
    /// Unused by the corpus; rejected by the codec.
    #[serde(rename = "SWITCH")]
    Switch,
    /// Unused by the corpus; rejected by the codec.
    #[serde(rename = "SWITCH_CASE")]
    SwitchCase,
    /// Unused by the corpus; rejected by the codec.
    #[serde(rename = "SWITCH_DEFAULT")]
    SwitchDefault,
    #[serde(rename = "RANDSWITCH")]
    RandSwitch {
        value: u16,
        cases: Vec<RandCase>,
    },
    #[serde(rename = "EVAL")]
    Eval(GclNode),
    #[serde(rename = "RD_SCRIPT")]
    Script(Vec<RadioNode>),
    #[serde(rename = "ENDLINE")]
    EndLine,
}

/// A decoded radio dialog block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Dialog {
    /// Synthesized dialog name (`RD_MM_NL` or `RD_EXTRA_{n}`).
    pub name: String,
    /// Byte offset of the dialog within the archive.
    pub offset: u32,
    /// Radio frequency times 100.
    pub freq: u16,
    /// Portrait size for the speaking character.
    pub face_size: u8,
    /// Portrait offset for the speaking character.
    pub face_offset: u16,
    /// Always zero in the corpus.
    pub flags: u16,
    /// The dialog body tree.
    pub data: RadioNode,
    /// 36-byte font glyphs as hex strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fonts: Vec<String>,
}

// =============================================================================
// Options
// =============================================================================

/// Options for codec behavior.
#[derive(Debug, Clone, Copy)]
pub struct CodecOptions {
    /// Align RADIO dialog blocks to 0x800 boundaries.
    pub padding: bool,
    /// PC variant: no 4-byte GCX file padding, synthetic voice codes.
    /// When unset, derived from the presence of a VOX table in the
    /// resolver.
    pub is_pc_version: Option<bool>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            padding: true,
            is_pc_version: None,
        }
    }
}

impl CodecOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for the PC release.
    pub fn pc() -> Self {
        Self {
            padding: true,
            is_pc_version: Some(true),
        }
    }

    /// Options for the original console release.
    pub fn console() -> Self {
        Self {
            padding: true,
            is_pc_version: Some(false),
        }
    }

    /// Disable 0x800 alignment of RADIO dialogs.
    pub fn without_padding(mut self) -> Self {
        self.padding = false;
        self
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_codes_roundtrip() {
        for code in 1..=20 {
            let op = Operator::from_code(code).unwrap();
            assert_eq!(op.code(), code);
        }
        assert!(Operator::from_code(0).is_none());
        assert!(Operator::from_code(21).is_none());
    }

    #[test]
    fn test_unary_operators() {
        assert!(Operator::Negate.is_unary());
        assert!(Operator::IsFalse.is_unary());
        assert!(Operator::Complement.is_unary());
        assert!(!Operator::Add.is_unary());
        assert!(!Operator::Assign.is_unary());
    }

    #[test]
    fn test_command_codes_roundtrip() {
        assert_eq!(CommandId::from_code(0x22ff), Some(CommandId::Mesg));
        assert_eq!(CommandId::from_code(0x24e1), Some(CommandId::Radio));
        assert_eq!(CommandId::Demo.code(), 0xa242);
        assert!(CommandId::from_code(0xbeef).is_none());
    }

    #[test]
    fn test_node_serializes_one_key_per_tag() {
        let json = serde_json::to_string(&GclNode::Word(5)).unwrap();
        assert_eq!(json, r#"{"WORD":5}"#);

        let json = serde_json::to_string(&GclNode::Var(VarRef::Flag("00AB12".into()))).unwrap();
        assert_eq!(json, r#"{"VAR":{"FLAG":"00AB12"}}"#);
    }

    #[test]
    fn test_table_ref_untagged() {
        let lit: TableRef = serde_json::from_str("16843008").unwrap();
        assert_eq!(lit, TableRef::Literal(16843008));
        let name: TableRef = serde_json::from_str(r#""RD_02_1""#).unwrap();
        assert_eq!(name, TableRef::Name("RD_02_1".into()));
    }

    #[test]
    fn test_annotations_survive_document_roundtrip() {
        let node = GclNode::Script(Script {
            body: vec![],
            no_braces: true,
        });
        let json = serde_json::to_string(&node).unwrap();
        let back: GclNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);

        let plain = serde_json::to_string(&GclNode::Script(Script {
            body: vec![],
            no_braces: false,
        }))
        .unwrap();
        assert!(!plain.contains("no_braces"));
    }
}
