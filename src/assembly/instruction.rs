//! CIL instruction representation.
//!
//! Instructions are held in an editable form: operands carry resolved references
//! ([`crate::metadata::signatures::MethodRef`], [`crate::metadata::signatures::TypeSig`], ...)
//! instead of metadata tokens, and branch operands name their target by [`InstrId`] instead of a
//! byte offset. Offsets and tokens only exist in the encoded form produced by
//! [`crate::assembly::encode_body`] and consumed by [`crate::assembly::decode_body`].
//!
//! # Examples
//!
//! ```rust
//! use crosspatch::assembly::{load_argument, OpCode, Operand};
//!
//! assert_eq!(load_argument(1), (OpCode::LdArg1, Operand::None));
//! assert_eq!(load_argument(7), (OpCode::LdArgS, Operand::Argument(7)));
//! assert_eq!(load_argument(300), (OpCode::LdArg, Operand::Argument(300)));
//! ```

use std::fmt;

use crate::{
    assembly::opcodes::{FlowType, OpCode},
    metadata::signatures::{FieldRef, MethodRef, TypeSig},
};

/// Stable identity of an instruction within its method body.
///
/// Identities survive insertion and removal of other instructions; they are never reused within
/// one [`crate::assembly::InstructionList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The operand of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand present
    None,
    /// 32-bit integer constant (`ldc.i4`, `ldc.i4.s`)
    Int32(i32),
    /// 64-bit integer constant
    Int64(i64),
    /// 32-bit floating point constant
    Float32(f32),
    /// 64-bit floating point constant
    Float64(f64),
    /// String literal (`ldstr`)
    String(String),
    /// Argument slot index
    Argument(u16),
    /// Local variable index
    Local(u16),
    /// Type operand (`newarr`, `box`, `ldelema`, ...)
    Type(TypeSig),
    /// Method operand (`call`, `callvirt`, `newobj`)
    Method(MethodRef),
    /// Field operand (`ldfld`, `stfld`, ...)
    Field(FieldRef),
    /// Branch target
    Target(InstrId),
    /// Switch jump table
    Switch(Vec<InstrId>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int32(value) => write!(f, "{value}"),
            Operand::Int64(value) => write!(f, "{value}"),
            Operand::Float32(value) => write!(f, "{value}"),
            Operand::Float64(value) => write!(f, "{value}"),
            Operand::String(value) => write!(f, "{value:?}"),
            Operand::Argument(index) => write!(f, "arg{index}"),
            Operand::Local(index) => write!(f, "loc{index}"),
            Operand::Type(signature) => write!(f, "{signature}"),
            Operand::Method(method) => write!(f, "{method}"),
            Operand::Field(field) => write!(f, "{field}"),
            Operand::Target(target) => write!(f, "{target}"),
            Operand::Switch(targets) => {
                write!(f, "(")?;
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{target}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A single instruction of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Stable identity within the owning list
    pub id: InstrId,
    /// The opcode
    pub opcode: OpCode,
    /// The operand, matching the opcode's [`crate::assembly::OperandKind`]
    pub operand: Operand,
}

impl Instruction {
    /// How this instruction affects control flow.
    #[must_use]
    pub fn flow(&self) -> FlowType {
        self.opcode.info().flow
    }

    /// Returns `true` if execution never falls through to the next instruction.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.flow().is_terminal()
    }

    /// Branch targets of this instruction, empty for non-branching instructions.
    #[must_use]
    pub fn targets(&self) -> Vec<InstrId> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Replaces every branch target equal to `from` by `to`, returning how many were replaced.
    pub fn retarget(&mut self, from: InstrId, to: InstrId) -> usize {
        match &mut self.operand {
            Operand::Target(target) if *target == from => {
                *target = to;
                1
            }
            Operand::Switch(targets) => {
                let mut count = 0;
                for target in targets.iter_mut().filter(|target| **target == from) {
                    *target = to;
                    count += 1;
                }
                count
            }
            _ => 0,
        }
    }

    /// The argument slot accessed by `ldarg`, `ldarga` and `starg` in any form.
    #[must_use]
    pub fn argument_index(&self) -> Option<u16> {
        match (self.opcode, &self.operand) {
            (OpCode::LdArg0, _) => Some(0),
            (OpCode::LdArg1, _) => Some(1),
            (OpCode::LdArg2, _) => Some(2),
            (OpCode::LdArg3, _) => Some(3),
            (
                OpCode::LdArgS
                | OpCode::LdArg
                | OpCode::LdArgaS
                | OpCode::LdArga
                | OpCode::StArgS
                | OpCode::StArg,
                Operand::Argument(index),
            ) => Some(*index),
            _ => None,
        }
    }

    /// The local slot accessed by `ldloc`, `ldloca` and `stloc` in any form.
    #[must_use]
    pub fn local_index(&self) -> Option<u16> {
        match (self.opcode, &self.operand) {
            (OpCode::LdLoc0 | OpCode::StLoc0, _) => Some(0),
            (OpCode::LdLoc1 | OpCode::StLoc1, _) => Some(1),
            (OpCode::LdLoc2 | OpCode::StLoc2, _) => Some(2),
            (OpCode::LdLoc3 | OpCode::StLoc3, _) => Some(3),
            (
                OpCode::LdLocS
                | OpCode::LdLoc
                | OpCode::LdLocaS
                | OpCode::LdLoca
                | OpCode::StLocS
                | OpCode::StLoc,
                Operand::Local(index),
            ) => Some(*index),
            _ => None,
        }
    }

    /// The called method of `call`, `callvirt` and `newobj`.
    #[must_use]
    pub fn method(&self) -> Option<&MethodRef> {
        match &self.operand {
            Operand::Method(method) => Some(method),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.opcode)?;
        if self.operand != Operand::None {
            write!(f, " {}", self.operand)?;
        }
        Ok(())
    }
}

/// `ldarg` in its shortest form.
#[must_use]
pub fn load_argument(index: u16) -> (OpCode, Operand) {
    match index {
        0 => (OpCode::LdArg0, Operand::None),
        1 => (OpCode::LdArg1, Operand::None),
        2 => (OpCode::LdArg2, Operand::None),
        3 => (OpCode::LdArg3, Operand::None),
        4..=255 => (OpCode::LdArgS, Operand::Argument(index)),
        _ => (OpCode::LdArg, Operand::Argument(index)),
    }
}

/// `ldloc` in its shortest form.
#[must_use]
pub fn load_local(index: u16) -> (OpCode, Operand) {
    match index {
        0 => (OpCode::LdLoc0, Operand::None),
        1 => (OpCode::LdLoc1, Operand::None),
        2 => (OpCode::LdLoc2, Operand::None),
        3 => (OpCode::LdLoc3, Operand::None),
        4..=255 => (OpCode::LdLocS, Operand::Local(index)),
        _ => (OpCode::LdLoc, Operand::Local(index)),
    }
}

/// `stloc` in its shortest form.
#[must_use]
pub fn store_local(index: u16) -> (OpCode, Operand) {
    match index {
        0 => (OpCode::StLoc0, Operand::None),
        1 => (OpCode::StLoc1, Operand::None),
        2 => (OpCode::StLoc2, Operand::None),
        3 => (OpCode::StLoc3, Operand::None),
        4..=255 => (OpCode::StLocS, Operand::Local(index)),
        _ => (OpCode::StLoc, Operand::Local(index)),
    }
}

/// `ldloca` in its shortest form.
#[must_use]
pub fn load_local_address(index: u16) -> (OpCode, Operand) {
    if index <= 255 {
        (OpCode::LdLocaS, Operand::Local(index))
    } else {
        (OpCode::LdLoca, Operand::Local(index))
    }
}

/// `ldc.i4` in its shortest form.
#[must_use]
pub fn load_int32(value: i32) -> (OpCode, Operand) {
    match value {
        -1 => (OpCode::LdcI4M1, Operand::None),
        0 => (OpCode::LdcI4_0, Operand::None),
        1 => (OpCode::LdcI4_1, Operand::None),
        2 => (OpCode::LdcI4_2, Operand::None),
        3 => (OpCode::LdcI4_3, Operand::None),
        4 => (OpCode::LdcI4_4, Operand::None),
        5 => (OpCode::LdcI4_5, Operand::None),
        6 => (OpCode::LdcI4_6, Operand::None),
        7 => (OpCode::LdcI4_7, Operand::None),
        8 => (OpCode::LdcI4_8, Operand::None),
        -128..=127 => (OpCode::LdcI4S, Operand::Int32(value)),
        _ => (OpCode::LdcI4, Operand::Int32(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::{MethodSig, TypeRef};

    #[test]
    fn short_forms() {
        assert_eq!(load_local(2), (OpCode::LdLoc2, Operand::None));
        assert_eq!(load_local(9), (OpCode::LdLocS, Operand::Local(9)));
        assert_eq!(store_local(0), (OpCode::StLoc0, Operand::None));
        assert_eq!(store_local(1000), (OpCode::StLoc, Operand::Local(1000)));
        assert_eq!(load_local_address(3), (OpCode::LdLocaS, Operand::Local(3)));
        assert_eq!(load_int32(-1), (OpCode::LdcI4M1, Operand::None));
        assert_eq!(load_int32(100), (OpCode::LdcI4S, Operand::Int32(100)));
        assert_eq!(load_int32(1000), (OpCode::LdcI4, Operand::Int32(1000)));
    }

    #[test]
    fn slot_indices() {
        let (opcode, operand) = load_argument(2);
        let instruction = Instruction {
            id: InstrId(0),
            opcode,
            operand,
        };
        assert_eq!(instruction.argument_index(), Some(2));
        assert_eq!(instruction.local_index(), None);

        let instruction = Instruction {
            id: InstrId(1),
            opcode: OpCode::LdLocaS,
            operand: Operand::Local(5),
        };
        assert_eq!(instruction.local_index(), Some(5));
    }

    #[test]
    fn retarget_switch() {
        let mut instruction = Instruction {
            id: InstrId(0),
            opcode: OpCode::Switch,
            operand: Operand::Switch(vec![InstrId(1), InstrId(2), InstrId(1)]),
        };
        assert_eq!(instruction.retarget(InstrId(1), InstrId(3)), 2);
        assert_eq!(instruction.targets(), vec![InstrId(3), InstrId(2), InstrId(3)]);
    }

    #[test]
    fn display() {
        let method = MethodRef::new(
            TypeRef::new("Game", "Game", "Player"),
            "Jump",
            MethodSig::new_static(TypeSig::Void, vec![]),
        );
        let instruction = Instruction {
            id: InstrId(4),
            opcode: OpCode::Call,
            operand: Operand::Method(method.clone()),
        };
        assert_eq!(instruction.to_string(), "#4: call [Game]Game.Player::Jump");
        assert_eq!(instruction.method(), Some(&method));
        assert!(!instruction.is_terminal());
    }
}
