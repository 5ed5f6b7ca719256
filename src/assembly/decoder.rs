//! CIL bytecode decoding into editable instruction lists.
//!
//! [`decode_body`] performs a linear sweep over the bytecode of a method body. Every opcode is
//! looked up in the opcode table, its operand is read according to its
//! [`crate::assembly::OperandKind`], metadata tokens are resolved through a [`TokenResolver`] and
//! branch displacements are converted into instruction identities. The returned
//! [`DecodedBody`] maps byte offsets back to identities so exception clauses can be attached to
//! the same instructions.
//!
//! # Examples
//!
//! ```rust
//! use crosspatch::assembly::{decode_body, OpCode, Operand, TokenResolver};
//! use crosspatch::metadata::{signatures::{FieldRef, MethodRef, TypeSig}, token::Token};
//!
//! struct NoTokens;
//! impl TokenResolver for NoTokens {
//!     fn method(&self, token: Token) -> crosspatch::Result<MethodRef> { unreachable!() }
//!     fn field(&self, token: Token) -> crosspatch::Result<FieldRef> { unreachable!() }
//!     fn type_sig(&self, token: Token) -> crosspatch::Result<TypeSig> { unreachable!() }
//!     fn string(&self, token: Token) -> crosspatch::Result<String> { unreachable!() }
//! }
//!
//! // ldarg.0; brtrue.s +1; nop; ret
//! let body = decode_body(&[0x02, 0x2D, 0x01, 0x00, 0x2A], &NoTokens)?;
//! let instructions = body.instructions.as_slice();
//! assert_eq!(instructions[1].opcode, OpCode::BrTrueS);
//! assert_eq!(instructions[1].operand, Operand::Target(instructions[3].id));
//! # Ok::<(), crosspatch::Error>(())
//! ```

use std::collections::BTreeMap;

use crate::{
    assembly::{
        instruction::{InstrId, Instruction, Operand},
        list::InstructionList,
        opcodes::{OpCode, OperandKind, FE_PREFIX},
    },
    file::parser::Parser,
    metadata::{
        signatures::{FieldRef, MethodRef, TypeSig},
        token::Token,
    },
    Result,
};

/// Resolves the metadata tokens embedded in bytecode.
pub trait TokenResolver {
    /// Resolves a member reference token naming a method.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the token does not name a method.
    fn method(&self, token: Token) -> Result<MethodRef>;

    /// Resolves a member reference token naming a field.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the token does not name a field.
    fn field(&self, token: Token) -> Result<FieldRef>;

    /// Resolves a type specification token.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the token does not name a type.
    fn type_sig(&self, token: Token) -> Result<TypeSig>;

    /// Resolves a user string token.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the token does not name a string.
    fn string(&self, token: Token) -> Result<String>;
}

/// Result of decoding a method body.
#[derive(Debug)]
pub struct DecodedBody {
    /// The decoded instructions in order
    pub instructions: InstructionList,
    offsets: BTreeMap<u32, InstrId>,
    code_size: u32,
}

impl DecodedBody {
    /// Maps a byte offset to the instruction starting there.
    ///
    /// The offset one past the last instruction maps to `None`, which is how exception clauses
    /// that extend to the end of the body are expressed.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `offset` is not an instruction boundary.
    pub fn instruction_at(&self, offset: u32) -> Result<Option<InstrId>> {
        if offset == self.code_size {
            return Ok(None);
        }

        match self.offsets.get(&offset) {
            Some(id) => Ok(Some(*id)),
            None => Err(malformed_error!(
                "Offset 0x{:04x} is not an instruction boundary",
                offset
            )),
        }
    }
}

/// A decoded operand whose branch targets are still byte offsets.
enum RawOperand {
    Resolved(Operand),
    Target(u32),
    Switch(Vec<u32>),
}

/// Decodes the bytecode of a method body.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown opcodes, branches into the middle of an
/// instruction or out of the body, and tokens the resolver rejects; [`crate::Error::OutOfBounds`]
/// for truncated operands.
pub fn decode_body(code: &[u8], tokens: &impl TokenResolver) -> Result<DecodedBody> {
    let code_size = u32::try_from(code.len())
        .map_err(|_| malformed_error!("Method body of {} bytes is too large", code.len()))?;

    let mut parser = Parser::new(code);
    let mut raw = Vec::new();
    let mut offsets = BTreeMap::new();

    while parser.has_more_data() {
        let offset = parser.pos() as u32;
        let (opcode, operand) = decode_instruction(&mut parser, tokens)?;

        let id = InstrId(raw.len() as u32);
        offsets.insert(offset, id);
        raw.push((id, opcode, operand));
    }

    let resolve = |offset: u32| -> Result<InstrId> {
        offsets.get(&offset).copied().ok_or_else(|| {
            malformed_error!(
                "Branch target 0x{:04x} is not an instruction boundary",
                offset
            )
        })
    };

    let mut instructions = Vec::with_capacity(raw.len());
    for (id, opcode, operand) in raw {
        let operand = match operand {
            RawOperand::Resolved(operand) => operand,
            RawOperand::Target(offset) => Operand::Target(resolve(offset)?),
            RawOperand::Switch(targets) => Operand::Switch(
                targets
                    .into_iter()
                    .map(resolve)
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        instructions.push(Instruction {
            id,
            opcode,
            operand,
        });
    }

    Ok(DecodedBody {
        instructions: InstructionList::from_instructions(instructions),
        offsets,
        code_size,
    })
}

fn decode_instruction(
    parser: &mut Parser,
    tokens: &impl TokenResolver,
) -> Result<(OpCode, RawOperand)> {
    let first_byte = parser.read_le::<u8>()?;

    let opcode = if first_byte == FE_PREFIX {
        let second_byte = parser.read_le::<u8>()?;
        OpCode::from_extended_byte(second_byte)
            .ok_or_else(|| malformed_error!("Invalid opcode: FE {:02X}", second_byte))?
    } else {
        OpCode::from_byte(first_byte)
            .ok_or_else(|| malformed_error!("Invalid opcode: {:02X}", first_byte))?
    };

    let operand = match opcode.info().operand {
        OperandKind::None => RawOperand::Resolved(Operand::None),
        OperandKind::ShortInt32 => {
            RawOperand::Resolved(Operand::Int32(i32::from(parser.read_le::<i8>()?)))
        }
        OperandKind::Int32 => RawOperand::Resolved(Operand::Int32(parser.read_le::<i32>()?)),
        OperandKind::Int64 => RawOperand::Resolved(Operand::Int64(parser.read_le::<i64>()?)),
        OperandKind::Float32 => RawOperand::Resolved(Operand::Float32(parser.read_le::<f32>()?)),
        OperandKind::Float64 => RawOperand::Resolved(Operand::Float64(parser.read_le::<f64>()?)),
        OperandKind::ShortArgument => {
            RawOperand::Resolved(Operand::Argument(u16::from(parser.read_le::<u8>()?)))
        }
        OperandKind::Argument => RawOperand::Resolved(Operand::Argument(parser.read_le::<u16>()?)),
        OperandKind::ShortLocal => {
            RawOperand::Resolved(Operand::Local(u16::from(parser.read_le::<u8>()?)))
        }
        OperandKind::Local => RawOperand::Resolved(Operand::Local(parser.read_le::<u16>()?)),
        OperandKind::ShortBranch => {
            let displacement = i64::from(parser.read_le::<i8>()?);
            RawOperand::Target(branch_target(parser.pos(), displacement)?)
        }
        OperandKind::Branch => {
            let displacement = i64::from(parser.read_le::<i32>()?);
            RawOperand::Target(branch_target(parser.pos(), displacement)?)
        }
        OperandKind::Switch => {
            let count = parser.read_le::<u32>()? as usize;
            let table_size = count
                .checked_mul(4)
                .ok_or_else(|| malformed_error!("Switch table of {} entries overflows", count))?;
            let end = parser.calc_end_position(table_size)?;

            let mut targets = Vec::with_capacity(count);
            for _ in 0..count {
                let displacement = i64::from(parser.read_le::<i32>()?);
                targets.push(branch_target(end, displacement)?);
            }
            RawOperand::Switch(targets)
        }
        OperandKind::Method => {
            RawOperand::Resolved(Operand::Method(tokens.method(read_token(parser)?)?))
        }
        OperandKind::Field => {
            RawOperand::Resolved(Operand::Field(tokens.field(read_token(parser)?)?))
        }
        OperandKind::Type => {
            RawOperand::Resolved(Operand::Type(tokens.type_sig(read_token(parser)?)?))
        }
        OperandKind::String => {
            RawOperand::Resolved(Operand::String(tokens.string(read_token(parser)?)?))
        }
    };

    Ok((opcode, operand))
}

fn read_token(parser: &mut Parser) -> Result<Token> {
    Ok(Token::new(parser.read_le::<u32>()?))
}

fn branch_target(next_offset: usize, displacement: i64) -> Result<u32> {
    let target = next_offset as i64 + displacement;
    u32::try_from(target).map_err(|_| malformed_error!("Branch target {} is out of range", target))
}
