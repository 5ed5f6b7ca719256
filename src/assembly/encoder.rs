//! CIL bytecode encoding of instruction lists.
//!
//! This is the reverse of [`crate::assembly::decoder`]: [`encode_body`] lays out an
//! [`InstructionList`], converts instruction identities back into branch displacements and
//! requests metadata tokens for every reference operand from a [`TokenAllocator`].
//!
//! # Branch Relaxation
//!
//! Instructions keep the branch form they were decoded or created with. Inserting code can push
//! the target of a short branch (`br.s`, `brtrue.s`, ...) outside the signed 8-bit range, so the
//! layout is computed iteratively: every short branch whose displacement no longer fits is
//! widened to its 32-bit form and the layout is recomputed until it is stable. Widening only
//! ever grows the code, so the iteration terminates.
//!
//! # Stack Depth
//!
//! [`compute_max_stack`] simulates the evaluation stack depth along every control flow edge,
//! starting from the method entry and the entry of each exception handler, and reports the
//! maximum. Call sites use the callee signature; `ret` pops a value for non-void methods.
//!
//! # Examples
//!
//! ```rust
//! use crosspatch::assembly::{compute_max_stack, InstructionList, OpCode, Operand};
//!
//! let mut list = InstructionList::new();
//! list.push(OpCode::LdArg0, Operand::None);
//! list.push(OpCode::LdArg1, Operand::None);
//! list.push(OpCode::Add, Operand::None);
//! list.push(OpCode::Ret, Operand::None);
//!
//! assert_eq!(compute_max_stack(&list, &[], true)?, 2);
//! # Ok::<(), crosspatch::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{
        instruction::{InstrId, Instruction, Operand},
        list::InstructionList,
        opcodes::{FlowType, OpCode, OperandKind, FE_PREFIX},
    },
    file::io::{write_le, write_le_at},
    metadata::{
        signatures::{FieldRef, MethodRef, TypeSig},
        token::Token,
    },
    Result,
};

/// Upper bound of layout passes; each pass widens at least one branch.
const MAX_ITERATIONS: usize = 100;

/// Allocates metadata tokens for the references used by bytecode.
pub trait TokenAllocator {
    /// Returns the member reference token of `method`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the reference cannot be encoded.
    fn method_token(&mut self, method: &MethodRef) -> Result<Token>;

    /// Returns the member reference token of `field`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the reference cannot be encoded.
    fn field_token(&mut self, field: &FieldRef) -> Result<Token>;

    /// Returns the type specification token of `signature`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the signature cannot be encoded.
    fn type_token(&mut self, signature: &TypeSig) -> Result<Token>;

    /// Returns the user string token of `value`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the string heap is full.
    fn string_token(&mut self, value: &str) -> Result<Token>;
}

/// Result of encoding a method body.
#[derive(Debug)]
pub struct EncodedBody {
    /// The bytecode
    pub code: Vec<u8>,
    offsets: HashMap<InstrId, u32>,
}

impl EncodedBody {
    /// Byte offset of an instruction, or the code size for `None` (end of body).
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] if `id` was not part of the encoded list.
    pub fn offset_of(&self, id: Option<InstrId>) -> Result<u32> {
        match id {
            None => u32::try_from(self.code.len())
                .map_err(|_| malformed_error!("Method body is too large")),
            Some(id) => self.offsets.get(&id).copied().ok_or_else(|| {
                crate::Error::InvalidBranch(format!("{id} is not part of the body"))
            }),
        }
    }
}

/// Encodes `instructions` into bytecode.
///
/// # Errors
/// Returns [`crate::Error::InvalidBranch`] for dangling branch targets, and
/// [`crate::Error::Malformed`] for operands that do not match their opcode or do not fit the
/// encoded form.
pub fn encode_body(
    instructions: &InstructionList,
    tokens: &mut impl TokenAllocator,
) -> Result<EncodedBody> {
    instructions.validate_targets()?;

    let mut encoder = BodyEncoder::new(instructions.as_slice());
    encoder.relax_branches()?;
    encoder.emit(tokens)
}

struct BodyEncoder<'a> {
    instructions: &'a [Instruction],
    /// Opcode actually emitted per instruction, after relaxation
    forms: Vec<OpCode>,
    /// Start offset per instruction for the current forms
    starts: Vec<usize>,
    /// Position per identity
    positions: HashMap<InstrId, usize>,
    code_size: usize,
}

impl<'a> BodyEncoder<'a> {
    fn new(instructions: &'a [Instruction]) -> Self {
        let positions = instructions
            .iter()
            .enumerate()
            .map(|(index, instruction)| (instruction.id, index))
            .collect();

        BodyEncoder {
            instructions,
            forms: instructions
                .iter()
                .map(|instruction| instruction.opcode)
                .collect(),
            starts: Vec::with_capacity(instructions.len()),
            positions,
            code_size: 0,
        }
    }

    fn layout(&mut self) -> Result<()> {
        self.starts.clear();
        let mut offset = 0usize;

        for (instruction, form) in self.instructions.iter().zip(&self.forms) {
            self.starts.push(offset);
            offset += instruction_size(*form, &instruction.operand)?;
        }

        self.code_size = offset;
        Ok(())
    }

    fn relax_branches(&mut self) -> Result<()> {
        for _ in 0..MAX_ITERATIONS {
            self.layout()?;

            let mut widened = false;
            for index in 0..self.instructions.len() {
                let form = self.forms[index];
                if form.info().operand != OperandKind::ShortBranch {
                    continue;
                }

                let displacement = self.displacement(index, self.target_of(index)?)?;
                if i8::try_from(displacement).is_err() {
                    self.forms[index] = form.long_form().ok_or_else(|| {
                        malformed_error!("{} has no long form", form.mnemonic())
                    })?;
                    widened = true;
                }
            }

            if !widened {
                return Ok(());
            }
        }

        Err(malformed_error!(
            "Branch layout did not stabilize after {} passes",
            MAX_ITERATIONS
        ))
    }

    fn target_of(&self, index: usize) -> Result<InstrId> {
        match &self.instructions[index].operand {
            Operand::Target(target) => Ok(*target),
            other => Err(malformed_error!(
                "{} expects a branch target, found '{}'",
                self.forms[index].mnemonic(),
                other
            )),
        }
    }

    fn position_of(&self, id: InstrId) -> Result<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or_else(|| crate::Error::InvalidBranch(format!("{id} is not part of the body")))
    }

    /// Displacement from the end of instruction `index` to `target`.
    fn displacement(&self, index: usize, target: InstrId) -> Result<i64> {
        let end = self.starts[index] + instruction_size(self.forms[index], &self.instructions[index].operand)?;
        let target = self.starts[self.position_of(target)?];
        Ok(target as i64 - end as i64)
    }

    fn emit(self, tokens: &mut impl TokenAllocator) -> Result<EncodedBody> {
        let mut code = Vec::with_capacity(self.code_size);

        for (index, instruction) in self.instructions.iter().enumerate() {
            let form = self.forms[index];
            let info = form.info();

            if info.prefix == FE_PREFIX {
                code.push(FE_PREFIX);
            }
            code.push(info.byte);

            self.emit_operand(index, &mut code, tokens)?;
            debug_assert_eq!(
                code.len(),
                self.starts.get(index + 1).copied().unwrap_or(self.code_size),
                "{instruction}"
            );
        }

        let offsets = self
            .instructions
            .iter()
            .zip(&self.starts)
            .map(|(instruction, start)| (instruction.id, *start as u32))
            .collect();

        Ok(EncodedBody { code, offsets })
    }

    fn emit_operand(
        &self,
        index: usize,
        code: &mut Vec<u8>,
        tokens: &mut impl TokenAllocator,
    ) -> Result<()> {
        let form = self.forms[index];
        let operand = &self.instructions[index].operand;
        let kind = form.info().operand;

        match (kind, operand) {
            (OperandKind::None, Operand::None) => {}
            (OperandKind::ShortInt32, Operand::Int32(value)) => {
                let value = i8::try_from(*value).map_err(|_| {
                    malformed_error!("{} operand {} exceeds 8 bits", form.mnemonic(), value)
                })?;
                write_le(code, value);
            }
            (OperandKind::Int32, Operand::Int32(value)) => write_le(code, *value),
            (OperandKind::Int64, Operand::Int64(value)) => write_le(code, *value),
            (OperandKind::Float32, Operand::Float32(value)) => write_le(code, *value),
            (OperandKind::Float64, Operand::Float64(value)) => write_le(code, *value),
            (OperandKind::ShortArgument, Operand::Argument(slot))
            | (OperandKind::ShortLocal, Operand::Local(slot)) => {
                let slot = u8::try_from(*slot).map_err(|_| {
                    malformed_error!("{} operand {} exceeds 8 bits", form.mnemonic(), slot)
                })?;
                write_le(code, slot);
            }
            (OperandKind::Argument, Operand::Argument(slot))
            | (OperandKind::Local, Operand::Local(slot)) => write_le(code, *slot),
            (OperandKind::ShortBranch, Operand::Target(target)) => {
                let displacement = self.displacement(index, *target)?;
                let displacement = i8::try_from(displacement).map_err(|_| {
                    malformed_error!("Short branch displacement {} out of range", displacement)
                })?;
                write_le(code, displacement);
            }
            (OperandKind::Branch, Operand::Target(target)) => {
                let displacement = self.displacement(index, *target)?;
                let displacement = i32::try_from(displacement).map_err(|_| {
                    malformed_error!("Branch displacement {} out of range", displacement)
                })?;
                write_le(code, displacement);
            }
            (OperandKind::Switch, Operand::Switch(targets)) => {
                let count = u32::try_from(targets.len())
                    .map_err(|_| malformed_error!("Switch table is too large"))?;
                write_le(code, count);

                let table_start = code.len();
                code.resize(table_start + targets.len() * 4, 0);
                for (slot, target) in targets.iter().enumerate() {
                    let displacement = self.displacement(index, *target)?;
                    let displacement = i32::try_from(displacement).map_err(|_| {
                        malformed_error!("Switch displacement {} out of range", displacement)
                    })?;
                    write_le_at(code, table_start + slot * 4, displacement)?;
                }
            }
            (OperandKind::Method, Operand::Method(method)) => {
                write_le(code, tokens.method_token(method)?.value());
            }
            (OperandKind::Field, Operand::Field(field)) => {
                write_le(code, tokens.field_token(field)?.value());
            }
            (OperandKind::Type, Operand::Type(signature)) => {
                write_le(code, tokens.type_token(signature)?.value());
            }
            (OperandKind::String, Operand::String(value)) => {
                write_le(code, tokens.string_token(value)?.value());
            }
            (_, operand) => {
                return Err(malformed_error!(
                    "Operand '{}' does not match {}",
                    operand,
                    form.mnemonic()
                ))
            }
        }
        Ok(())
    }
}

fn instruction_size(opcode: OpCode, operand: &Operand) -> Result<usize> {
    let info = opcode.info();
    let operand_size = match info.operand.size() {
        Some(size) => size,
        None => match operand {
            Operand::Switch(targets) => 4 + targets.len() * 4,
            other => {
                return Err(malformed_error!(
                    "{} expects a jump table, found '{}'",
                    opcode.mnemonic(),
                    other
                ))
            }
        },
    };
    Ok(info.opcode_size() + operand_size)
}

/// Values popped and pushed by `instruction`.
fn stack_effect(instruction: &Instruction, returns_value: bool) -> Result<(usize, usize)> {
    let info = instruction.opcode.info();
    match instruction.opcode {
        OpCode::Call | OpCode::CallVirt | OpCode::NewObj => {
            let method = instruction.method().ok_or_else(|| {
                malformed_error!("{} without a method operand", instruction.opcode)
            })?;
            let signature = &method.signature;
            if instruction.opcode == OpCode::NewObj {
                Ok((signature.params.len(), 1))
            } else {
                Ok((
                    signature.arg_count(),
                    usize::from(!signature.return_type.is_void()),
                ))
            }
        }
        OpCode::Ret => Ok((usize::from(returns_value), 0)),
        _ => Ok((usize::from(info.pops), usize::from(info.pushes))),
    }
}

/// Computes the maximum evaluation stack depth of a method body.
///
/// `entries` lists additional entry points with their initial depth: exception handlers start
/// with the caught exception on the stack (depth 1) or with an empty stack (finally and fault).
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on stack underflow, inconsistent depths at a merge point
/// or control flow that runs off the end of the body, and [`crate::Error::InvalidBranch`] for
/// dangling targets.
pub fn compute_max_stack(
    instructions: &InstructionList,
    entries: &[(InstrId, u16)],
    returns_value: bool,
) -> Result<u16> {
    let instructions = instructions.as_slice();
    if instructions.is_empty() {
        return Ok(0);
    }

    let positions: HashMap<InstrId, usize> = instructions
        .iter()
        .enumerate()
        .map(|(index, instruction)| (instruction.id, index))
        .collect();
    let position_of = |id: InstrId| -> Result<usize> {
        positions
            .get(&id)
            .copied()
            .ok_or_else(|| crate::Error::InvalidBranch(format!("{id} is not part of the body")))
    };

    let mut depths: Vec<Option<usize>> = vec![None; instructions.len()];
    let mut worklist = vec![(0usize, 0usize)];
    for (entry, depth) in entries {
        worklist.push((position_of(*entry)?, usize::from(*depth)));
    }

    let mut max_depth = 0usize;
    while let Some((index, depth)) = worklist.pop() {
        let Some(instruction) = instructions.get(index) else {
            return Err(malformed_error!("Control flow runs past the end of the body"));
        };

        match depths[index] {
            Some(known) if known == depth => continue,
            Some(known) => {
                return Err(malformed_error!(
                    "Inconsistent stack depth at {}: {} and {}",
                    instruction,
                    known,
                    depth
                ))
            }
            None => depths[index] = Some(depth),
        }

        let (pops, pushes) = stack_effect(instruction, returns_value)?;
        if depth < pops {
            return Err(malformed_error!(
                "Stack underflow at {}: depth {} but {} pops",
                instruction,
                depth,
                pops
            ));
        }
        let next_depth = depth - pops + pushes;
        max_depth = max_depth.max(depth).max(next_depth);

        match instruction.flow() {
            FlowType::Sequential | FlowType::Call => worklist.push((index + 1, next_depth)),
            FlowType::ConditionalBranch | FlowType::Switch => {
                for target in instruction.targets() {
                    worklist.push((position_of(target)?, next_depth));
                }
                worklist.push((index + 1, next_depth));
            }
            FlowType::UnconditionalBranch => {
                for target in instruction.targets() {
                    worklist.push((position_of(target)?, next_depth));
                }
            }
            FlowType::Leave => {
                for target in instruction.targets() {
                    worklist.push((position_of(target)?, 0));
                }
            }
            FlowType::Return | FlowType::Throw | FlowType::EndFinally => {}
        }
    }

    u16::try_from(max_depth).map_err(|_| malformed_error!("Stack depth {} exceeds u16", max_depth))
}
