//! CIL opcode table (ECMA-335 Partition III).
//!
//! [`OpCode`] enumerates the instructions understood by the decoder, encoder and rewriter. Each
//! opcode carries static metadata through [`OpCode::info`]: its encoding (single byte, or a second
//! byte after [`FE_PREFIX`]), the kind of operand that follows it, how it affects control flow and
//! its fixed stack behaviour. Mnemonics are available through `strum` (`Display`, `FromStr`,
//! `IntoStaticStr`), using the ECMA-335 spelling (`ldarg.0`, `brtrue.s`, ...).
//!
//! # Examples
//!
//! ```rust
//! use crosspatch::assembly::{FlowType, OpCode, OperandKind};
//!
//! let opcode: OpCode = "brtrue.s".parse().unwrap();
//! assert_eq!(opcode, OpCode::BrTrueS);
//! assert_eq!(opcode.info().byte, 0x2D);
//! assert_eq!(opcode.info().operand, OperandKind::ShortBranch);
//! assert_eq!(opcode.info().flow, FlowType::ConditionalBranch);
//! assert_eq!(opcode.long_form(), Some(OpCode::BrTrue));
//! ```

use std::sync::OnceLock;

use strum::IntoEnumIterator;

/// The first byte of every two-byte opcode.
pub const FE_PREFIX: u8 = 0xFE;

/// The encoded operand that follows an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand present
    None,
    /// Signed 8-bit immediate (`ldc.i4.s`)
    ShortInt32,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// 32-bit floating point immediate
    Float32,
    /// 64-bit floating point immediate
    Float64,
    /// Unsigned 8-bit argument index
    ShortArgument,
    /// Unsigned 16-bit argument index
    Argument,
    /// Unsigned 8-bit local index
    ShortLocal,
    /// Unsigned 16-bit local index
    Local,
    /// Signed 8-bit branch displacement
    ShortBranch,
    /// Signed 32-bit branch displacement
    Branch,
    /// Jump table: `u32` count followed by `i32` displacements
    Switch,
    /// Member reference token naming a method
    Method,
    /// Member reference token naming a field
    Field,
    /// Type specification token
    Type,
    /// User string token
    String,
}

impl OperandKind {
    /// Returns the size in bytes of the encoded operand.
    ///
    /// Returns `None` for the variable-size switch table.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandKind::None => Some(0),
            OperandKind::ShortInt32
            | OperandKind::ShortArgument
            | OperandKind::ShortLocal
            | OperandKind::ShortBranch => Some(1),
            OperandKind::Argument | OperandKind::Local => Some(2),
            OperandKind::Int32
            | OperandKind::Float32
            | OperandKind::Branch
            | OperandKind::Method
            | OperandKind::Field
            | OperandKind::Type
            | OperandKind::String => Some(4),
            OperandKind::Int64 | OperandKind::Float64 => Some(8),
            OperandKind::Switch => None,
        }
    }
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally block
    EndFinally,
    /// Leave protected region (try/catch/finally)
    Leave,
}

impl FlowType {
    /// Returns `true` if execution never falls through to the next instruction.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowType::UnconditionalBranch
                | FlowType::Return
                | FlowType::Throw
                | FlowType::EndFinally
                | FlowType::Leave
        )
    }
}

/// Static metadata of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCodeInfo {
    /// [`FE_PREFIX`] for two-byte opcodes, 0 otherwise
    pub prefix: u8,
    /// The opcode byte (second byte for two-byte opcodes)
    pub byte: u8,
    /// The operand that follows the opcode
    pub operand: OperandKind,
    /// Control flow behaviour
    pub flow: FlowType,
    /// Values popped; calls and `ret` depend on signatures and are computed by the encoder
    pub pops: u8,
    /// Values pushed; calls depend on signatures and are computed by the encoder
    pub pushes: u8,
}

impl OpCodeInfo {
    /// Encoded size of the opcode bytes alone.
    #[must_use]
    pub const fn opcode_size(&self) -> usize {
        if self.prefix == FE_PREFIX {
            2
        } else {
            1
        }
    }
}

macro_rules! opcodes {
    ($($variant:ident => $mnemonic:tt, $prefix:expr, $byte:expr, $operand:ident, $flow:ident, $pops:expr, $pushes:expr;)*) => {
        /// A CIL opcode.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            strum::Display,
            strum::EnumString,
            strum::EnumIter,
            strum::IntoStaticStr,
        )]
        pub enum OpCode {
            $(
                #[doc = concat!("`", $mnemonic, "`")]
                #[strum(serialize = $mnemonic)]
                $variant,
            )*
        }

        impl OpCode {
            /// Static encoding, operand and stack metadata of the opcode.
            #[must_use]
            pub const fn info(self) -> OpCodeInfo {
                match self {
                    $(
                        OpCode::$variant => OpCodeInfo {
                            prefix: $prefix,
                            byte: $byte,
                            operand: OperandKind::$operand,
                            flow: FlowType::$flow,
                            pops: $pops,
                            pushes: $pushes,
                        },
                    )*
                }
            }
        }
    };
}

opcodes! {
    Nop => "nop", 0, 0x00, None, Sequential, 0, 0;
    LdArg0 => "ldarg.0", 0, 0x02, None, Sequential, 0, 1;
    LdArg1 => "ldarg.1", 0, 0x03, None, Sequential, 0, 1;
    LdArg2 => "ldarg.2", 0, 0x04, None, Sequential, 0, 1;
    LdArg3 => "ldarg.3", 0, 0x05, None, Sequential, 0, 1;
    LdLoc0 => "ldloc.0", 0, 0x06, None, Sequential, 0, 1;
    LdLoc1 => "ldloc.1", 0, 0x07, None, Sequential, 0, 1;
    LdLoc2 => "ldloc.2", 0, 0x08, None, Sequential, 0, 1;
    LdLoc3 => "ldloc.3", 0, 0x09, None, Sequential, 0, 1;
    StLoc0 => "stloc.0", 0, 0x0A, None, Sequential, 1, 0;
    StLoc1 => "stloc.1", 0, 0x0B, None, Sequential, 1, 0;
    StLoc2 => "stloc.2", 0, 0x0C, None, Sequential, 1, 0;
    StLoc3 => "stloc.3", 0, 0x0D, None, Sequential, 1, 0;
    LdArgS => "ldarg.s", 0, 0x0E, ShortArgument, Sequential, 0, 1;
    LdArgaS => "ldarga.s", 0, 0x0F, ShortArgument, Sequential, 0, 1;
    StArgS => "starg.s", 0, 0x10, ShortArgument, Sequential, 1, 0;
    LdLocS => "ldloc.s", 0, 0x11, ShortLocal, Sequential, 0, 1;
    LdLocaS => "ldloca.s", 0, 0x12, ShortLocal, Sequential, 0, 1;
    StLocS => "stloc.s", 0, 0x13, ShortLocal, Sequential, 1, 0;
    LdNull => "ldnull", 0, 0x14, None, Sequential, 0, 1;
    LdcI4M1 => "ldc.i4.m1", 0, 0x15, None, Sequential, 0, 1;
    LdcI4_0 => "ldc.i4.0", 0, 0x16, None, Sequential, 0, 1;
    LdcI4_1 => "ldc.i4.1", 0, 0x17, None, Sequential, 0, 1;
    LdcI4_2 => "ldc.i4.2", 0, 0x18, None, Sequential, 0, 1;
    LdcI4_3 => "ldc.i4.3", 0, 0x19, None, Sequential, 0, 1;
    LdcI4_4 => "ldc.i4.4", 0, 0x1A, None, Sequential, 0, 1;
    LdcI4_5 => "ldc.i4.5", 0, 0x1B, None, Sequential, 0, 1;
    LdcI4_6 => "ldc.i4.6", 0, 0x1C, None, Sequential, 0, 1;
    LdcI4_7 => "ldc.i4.7", 0, 0x1D, None, Sequential, 0, 1;
    LdcI4_8 => "ldc.i4.8", 0, 0x1E, None, Sequential, 0, 1;
    LdcI4S => "ldc.i4.s", 0, 0x1F, ShortInt32, Sequential, 0, 1;
    LdcI4 => "ldc.i4", 0, 0x20, Int32, Sequential, 0, 1;
    LdcI8 => "ldc.i8", 0, 0x21, Int64, Sequential, 0, 1;
    LdcR4 => "ldc.r4", 0, 0x22, Float32, Sequential, 0, 1;
    LdcR8 => "ldc.r8", 0, 0x23, Float64, Sequential, 0, 1;
    Dup => "dup", 0, 0x25, None, Sequential, 1, 2;
    Pop => "pop", 0, 0x26, None, Sequential, 1, 0;
    Call => "call", 0, 0x28, Method, Call, 0, 0;
    Ret => "ret", 0, 0x2A, None, Return, 0, 0;
    BrS => "br.s", 0, 0x2B, ShortBranch, UnconditionalBranch, 0, 0;
    BrFalseS => "brfalse.s", 0, 0x2C, ShortBranch, ConditionalBranch, 1, 0;
    BrTrueS => "brtrue.s", 0, 0x2D, ShortBranch, ConditionalBranch, 1, 0;
    BeqS => "beq.s", 0, 0x2E, ShortBranch, ConditionalBranch, 2, 0;
    BgeS => "bge.s", 0, 0x2F, ShortBranch, ConditionalBranch, 2, 0;
    BgtS => "bgt.s", 0, 0x30, ShortBranch, ConditionalBranch, 2, 0;
    BleS => "ble.s", 0, 0x31, ShortBranch, ConditionalBranch, 2, 0;
    BltS => "blt.s", 0, 0x32, ShortBranch, ConditionalBranch, 2, 0;
    BneUnS => "bne.un.s", 0, 0x33, ShortBranch, ConditionalBranch, 2, 0;
    Br => "br", 0, 0x38, Branch, UnconditionalBranch, 0, 0;
    BrFalse => "brfalse", 0, 0x39, Branch, ConditionalBranch, 1, 0;
    BrTrue => "brtrue", 0, 0x3A, Branch, ConditionalBranch, 1, 0;
    Beq => "beq", 0, 0x3B, Branch, ConditionalBranch, 2, 0;
    Bge => "bge", 0, 0x3C, Branch, ConditionalBranch, 2, 0;
    Bgt => "bgt", 0, 0x3D, Branch, ConditionalBranch, 2, 0;
    Ble => "ble", 0, 0x3E, Branch, ConditionalBranch, 2, 0;
    Blt => "blt", 0, 0x3F, Branch, ConditionalBranch, 2, 0;
    BneUn => "bne.un", 0, 0x40, Branch, ConditionalBranch, 2, 0;
    Switch => "switch", 0, 0x45, Switch, Switch, 1, 0;
    LdIndU1 => "ldind.u1", 0, 0x47, None, Sequential, 1, 1;
    LdIndI4 => "ldind.i4", 0, 0x4A, None, Sequential, 1, 1;
    LdIndI8 => "ldind.i8", 0, 0x4C, None, Sequential, 1, 1;
    LdIndR4 => "ldind.r4", 0, 0x4E, None, Sequential, 1, 1;
    LdIndR8 => "ldind.r8", 0, 0x4F, None, Sequential, 1, 1;
    LdIndRef => "ldind.ref", 0, 0x50, None, Sequential, 1, 1;
    StIndRef => "stind.ref", 0, 0x51, None, Sequential, 2, 0;
    StIndI1 => "stind.i1", 0, 0x52, None, Sequential, 2, 0;
    StIndI4 => "stind.i4", 0, 0x54, None, Sequential, 2, 0;
    StIndI8 => "stind.i8", 0, 0x55, None, Sequential, 2, 0;
    StIndR4 => "stind.r4", 0, 0x56, None, Sequential, 2, 0;
    StIndR8 => "stind.r8", 0, 0x57, None, Sequential, 2, 0;
    Add => "add", 0, 0x58, None, Sequential, 2, 1;
    Sub => "sub", 0, 0x59, None, Sequential, 2, 1;
    Mul => "mul", 0, 0x5A, None, Sequential, 2, 1;
    Div => "div", 0, 0x5B, None, Sequential, 2, 1;
    Rem => "rem", 0, 0x5D, None, Sequential, 2, 1;
    And => "and", 0, 0x5F, None, Sequential, 2, 1;
    Or => "or", 0, 0x60, None, Sequential, 2, 1;
    Xor => "xor", 0, 0x61, None, Sequential, 2, 1;
    Shl => "shl", 0, 0x62, None, Sequential, 2, 1;
    Shr => "shr", 0, 0x63, None, Sequential, 2, 1;
    Neg => "neg", 0, 0x65, None, Sequential, 1, 1;
    Not => "not", 0, 0x66, None, Sequential, 1, 1;
    ConvI4 => "conv.i4", 0, 0x69, None, Sequential, 1, 1;
    ConvI8 => "conv.i8", 0, 0x6A, None, Sequential, 1, 1;
    ConvR4 => "conv.r4", 0, 0x6B, None, Sequential, 1, 1;
    ConvR8 => "conv.r8", 0, 0x6C, None, Sequential, 1, 1;
    CallVirt => "callvirt", 0, 0x6F, Method, Call, 0, 0;
    LdStr => "ldstr", 0, 0x72, String, Sequential, 0, 1;
    NewObj => "newobj", 0, 0x73, Method, Call, 0, 0;
    CastClass => "castclass", 0, 0x74, Type, Sequential, 1, 1;
    IsInst => "isinst", 0, 0x75, Type, Sequential, 1, 1;
    Throw => "throw", 0, 0x7A, None, Throw, 1, 0;
    LdFld => "ldfld", 0, 0x7B, Field, Sequential, 1, 1;
    LdFlda => "ldflda", 0, 0x7C, Field, Sequential, 1, 1;
    StFld => "stfld", 0, 0x7D, Field, Sequential, 2, 0;
    LdsFld => "ldsfld", 0, 0x7E, Field, Sequential, 0, 1;
    StsFld => "stsfld", 0, 0x80, Field, Sequential, 1, 0;
    Box => "box", 0, 0x8C, Type, Sequential, 1, 1;
    NewArr => "newarr", 0, 0x8D, Type, Sequential, 1, 1;
    LdLen => "ldlen", 0, 0x8E, None, Sequential, 1, 1;
    LdElema => "ldelema", 0, 0x8F, Type, Sequential, 2, 1;
    LdElemI4 => "ldelem.i4", 0, 0x94, None, Sequential, 2, 1;
    LdElemRef => "ldelem.ref", 0, 0x9A, None, Sequential, 2, 1;
    StElemI4 => "stelem.i4", 0, 0x9E, None, Sequential, 3, 0;
    StElemRef => "stelem.ref", 0, 0xA2, None, Sequential, 3, 0;
    LdElem => "ldelem", 0, 0xA3, Type, Sequential, 2, 1;
    StElem => "stelem", 0, 0xA4, Type, Sequential, 3, 0;
    UnboxAny => "unbox.any", 0, 0xA5, Type, Sequential, 1, 1;
    EndFinally => "endfinally", 0, 0xDC, None, EndFinally, 0, 0;
    Leave => "leave", 0, 0xDD, Branch, Leave, 0, 0;
    LeaveS => "leave.s", 0, 0xDE, ShortBranch, Leave, 0, 0;
    Ceq => "ceq", FE_PREFIX, 0x01, None, Sequential, 2, 1;
    Cgt => "cgt", FE_PREFIX, 0x02, None, Sequential, 2, 1;
    Clt => "clt", FE_PREFIX, 0x04, None, Sequential, 2, 1;
    LdArg => "ldarg", FE_PREFIX, 0x09, Argument, Sequential, 0, 1;
    LdArga => "ldarga", FE_PREFIX, 0x0A, Argument, Sequential, 0, 1;
    StArg => "starg", FE_PREFIX, 0x0B, Argument, Sequential, 1, 0;
    LdLoc => "ldloc", FE_PREFIX, 0x0C, Local, Sequential, 0, 1;
    LdLoca => "ldloca", FE_PREFIX, 0x0D, Local, Sequential, 0, 1;
    StLoc => "stloc", FE_PREFIX, 0x0E, Local, Sequential, 1, 0;
    InitObj => "initobj", FE_PREFIX, 0x15, Type, Sequential, 1, 0;
    Rethrow => "rethrow", FE_PREFIX, 0x1A, None, Throw, 0, 0;
}

type OpCodeLookup = ([Option<OpCode>; 256], [Option<OpCode>; 256]);

static OPCODE_LOOKUP: OnceLock<OpCodeLookup> = OnceLock::new();

fn get_opcode_lookup() -> &'static OpCodeLookup {
    OPCODE_LOOKUP.get_or_init(|| {
        let mut single = [None; 256];
        let mut extended = [None; 256];

        for opcode in OpCode::iter() {
            let info = opcode.info();
            if info.prefix == FE_PREFIX {
                extended[info.byte as usize] = Some(opcode);
            } else {
                single[info.byte as usize] = Some(opcode);
            }
        }

        (single, extended)
    })
}

impl OpCode {
    /// Looks up a single-byte opcode.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        get_opcode_lookup().0[byte as usize]
    }

    /// Looks up a two-byte opcode by its second byte.
    #[must_use]
    pub fn from_extended_byte(byte: u8) -> Option<OpCode> {
        get_opcode_lookup().1[byte as usize]
    }

    /// The ECMA-335 mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// The 32-bit displacement form of a short branch.
    #[must_use]
    pub fn long_form(self) -> Option<OpCode> {
        Some(match self {
            OpCode::BrS => OpCode::Br,
            OpCode::BrFalseS => OpCode::BrFalse,
            OpCode::BrTrueS => OpCode::BrTrue,
            OpCode::BeqS => OpCode::Beq,
            OpCode::BgeS => OpCode::Bge,
            OpCode::BgtS => OpCode::Bgt,
            OpCode::BleS => OpCode::Ble,
            OpCode::BltS => OpCode::Blt,
            OpCode::BneUnS => OpCode::BneUn,
            OpCode::LeaveS => OpCode::Leave,
            _ => return None,
        })
    }
}
