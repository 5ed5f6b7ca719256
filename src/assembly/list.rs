//! Ordered, editable instruction sequences.
//!
//! [`InstructionList`] owns the instructions of one method body. Instructions are inserted
//! relative to an anchor instruction and removed by identity; the relative order of untouched
//! instructions never changes and branch operands keep referring to live instructions:
//!
//! - inserting never retargets existing branches
//! - removing an instruction retargets every branch that pointed at it to the instruction that
//!   takes its place (its successor)
//!
//! # Examples
//!
//! ```rust
//! use crosspatch::assembly::{InstructionList, OpCode, Operand};
//!
//! let mut list = InstructionList::new();
//! let ret = list.push(OpCode::Ret, Operand::None);
//! let first = list.insert_before(ret, OpCode::LdcI4_1, Operand::None)?;
//! list.insert_after(first, OpCode::Pop, Operand::None)?;
//!
//! let opcodes: Vec<_> = list.iter().map(|i| i.opcode).collect();
//! assert_eq!(opcodes, [OpCode::LdcI4_1, OpCode::Pop, OpCode::Ret]);
//! # Ok::<(), crosspatch::Error>(())
//! ```

use crate::{
    assembly::{
        instruction::{InstrId, Instruction, Operand},
        opcodes::OpCode,
    },
    Error, Result,
};

/// The instructions of a method body in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionList {
    instructions: Vec<Instruction>,
    next_id: u32,
}

impl InstructionList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        InstructionList::default()
    }

    /// Builds a list from decoded instructions, continuing identity allocation after the
    /// highest identity present.
    pub(crate) fn from_instructions(instructions: Vec<Instruction>) -> Self {
        let next_id = instructions
            .iter()
            .map(|instruction| instruction.id.0 + 1)
            .max()
            .unwrap_or(0);
        InstructionList {
            instructions,
            next_id,
        }
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the list holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterates the instructions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// The instructions as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The first instruction.
    #[must_use]
    pub fn first(&self) -> Option<&Instruction> {
        self.instructions.first()
    }

    /// The last instruction.
    #[must_use]
    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Position of the instruction with identity `id`.
    #[must_use]
    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.instructions
            .iter()
            .position(|instruction| instruction.id == id)
    }

    /// The instruction with identity `id`.
    #[must_use]
    pub fn get(&self, id: InstrId) -> Option<&Instruction> {
        self.position(id).map(|index| &self.instructions[index])
    }

    /// Returns `true` if an instruction with identity `id` is part of the list.
    #[must_use]
    pub fn contains(&self, id: InstrId) -> bool {
        self.position(id).is_some()
    }

    /// The identity of the instruction following `id`.
    #[must_use]
    pub fn successor(&self, id: InstrId) -> Option<InstrId> {
        let index = self.position(id)?;
        self.instructions.get(index + 1).map(|next| next.id)
    }

    /// Appends an instruction and returns its identity.
    ///
    /// Branch operands are not checked; appended code may branch forward to instructions that
    /// are pushed later. Use [`InstructionList::validate_targets`] once the body is complete.
    pub fn push(&mut self, opcode: OpCode, operand: Operand) -> InstrId {
        let instruction = self.create(opcode, operand);
        let id = instruction.id;
        self.instructions.push(instruction);
        id
    }

    /// Inserts an instruction immediately before `anchor`.
    ///
    /// Branches that target `anchor` keep targeting it.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] if `anchor` is not part of the list or the operand
    /// targets an instruction that is not part of the list.
    pub fn insert_before(
        &mut self,
        anchor: InstrId,
        opcode: OpCode,
        operand: Operand,
    ) -> Result<InstrId> {
        let index = self.anchor_position(anchor)?;
        self.insert_at(index, opcode, operand)
    }

    /// Inserts an instruction immediately after `anchor`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] if `anchor` is not part of the list or the operand
    /// targets an instruction that is not part of the list.
    pub fn insert_after(
        &mut self,
        anchor: InstrId,
        opcode: OpCode,
        operand: Operand,
    ) -> Result<InstrId> {
        let index = self.anchor_position(anchor)?;
        self.insert_at(index + 1, opcode, operand)
    }

    /// Removes the instruction `id`.
    ///
    /// Branches that targeted it are retargeted to its successor.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] if `id` is not part of the list, or if it is
    /// targeted by a branch and has no successor to take its place.
    pub fn remove(&mut self, id: InstrId) -> Result<Instruction> {
        let index = self.anchor_position(id)?;
        let successor = self.instructions.get(index + 1).map(|next| next.id);

        match successor {
            Some(successor) => {
                self.retarget(id, successor);
            }
            None if self.is_targeted(id) => {
                return Err(Error::InvalidBranch(format!(
                    "{id} is a branch target and has no successor"
                )));
            }
            None => {}
        }

        Ok(self.instructions.remove(index))
    }

    /// Retargets every branch pointing at `from` to `to`, returning the number of replaced targets.
    pub fn retarget(&mut self, from: InstrId, to: InstrId) -> usize {
        self.instructions
            .iter_mut()
            .map(|instruction| instruction.retarget(from, to))
            .sum()
    }

    /// Returns `true` if any branch targets `id`.
    #[must_use]
    pub fn is_targeted(&self, id: InstrId) -> bool {
        self.instructions
            .iter()
            .any(|instruction| instruction.targets().contains(&id))
    }

    /// Checks that every branch operand refers to an instruction of this list.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] naming the first dangling target.
    pub fn validate_targets(&self) -> Result<()> {
        for instruction in &self.instructions {
            self.check_targets(instruction.id, &instruction.operand)?;
        }
        Ok(())
    }

    fn create(&mut self, opcode: OpCode, operand: Operand) -> Instruction {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        Instruction {
            id,
            opcode,
            operand,
        }
    }

    fn anchor_position(&self, anchor: InstrId) -> Result<usize> {
        self.position(anchor)
            .ok_or_else(|| Error::InvalidBranch(format!("{anchor} is not part of the body")))
    }

    fn insert_at(&mut self, index: usize, opcode: OpCode, operand: Operand) -> Result<InstrId> {
        let instruction = self.create(opcode, operand);
        self.check_targets(instruction.id, &instruction.operand)?;

        let id = instruction.id;
        self.instructions.insert(index, instruction);
        Ok(id)
    }

    fn check_targets(&self, id: InstrId, operand: &Operand) -> Result<()> {
        let targets: &[InstrId] = match operand {
            Operand::Target(target) => std::slice::from_ref(target),
            Operand::Switch(targets) => targets,
            _ => return Ok(()),
        };

        for target in targets {
            if !self.contains(*target) {
                return Err(Error::InvalidBranch(format!(
                    "{id} targets {target}, which is not part of the body"
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a InstructionList {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
