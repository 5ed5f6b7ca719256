//! Method bodies: locals, instructions and exception handlers.

use crate::{
    assembly::{compute_max_stack, InstrId, Instruction, InstructionList, OpCode, Operand},
    metadata::{method::ExceptionHandler, signatures::TypeSig},
    Error, Result,
};

/// The implementation of a method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodBody {
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Zero-initialise locals on entry
    pub init_locals: bool,
    /// Local variable types, indexed by slot
    pub locals: Vec<TypeSig>,
    /// The instructions
    pub instructions: InstructionList,
    /// Exception handler clauses
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Creates a body from `instructions` without locals or handlers.
    #[must_use]
    pub fn new(instructions: InstructionList) -> Self {
        MethodBody {
            instructions,
            ..MethodBody::default()
        }
    }

    /// Declares a new local of type `local_type` and returns its slot.
    ///
    /// Forces `init_locals` on.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the body already has `u16::MAX` locals.
    pub fn add_local(&mut self, local_type: TypeSig) -> Result<u16> {
        let slot = u16::try_from(self.locals.len())
            .map_err(|_| malformed_error!("Too many locals"))?;
        self.locals.push(local_type);
        self.init_locals = true;
        Ok(slot)
    }

    /// Removes an instruction, moving branch targets and handler boundaries that referred to it
    /// onto its successor.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] if the instruction is not part of the body, or is
    /// referenced and has no successor.
    pub fn remove_instruction(&mut self, id: InstrId) -> Result<Instruction> {
        let successor = self.instructions.successor(id);
        if successor.is_none()
            && self
                .exception_handlers
                .iter()
                .any(|handler| handler.starts_at(id))
        {
            return Err(Error::InvalidBranch(format!(
                "{id} starts an exception clause and has no successor"
            )));
        }

        let removed = self.instructions.remove(id)?;
        for handler in &mut self.exception_handlers {
            handler.retarget(id, successor);
        }
        Ok(removed)
    }

    /// Entry points of the exception handlers with their initial stack depth.
    #[must_use]
    pub fn handler_entries(&self) -> Vec<(InstrId, u16)> {
        self.exception_handlers
            .iter()
            .map(|handler| (handler.handler_start, handler.entry_depth()))
            .collect()
    }

    /// Recomputes [`MethodBody::max_stack`] from the instructions.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the stack is unbalanced along some path.
    pub fn update_max_stack(&mut self, returns_value: bool) -> Result<()> {
        self.max_stack =
            compute_max_stack(&self.instructions, &self.handler_entries(), returns_value)?;
        Ok(())
    }

    /// Builds a body from instructions in order, without locals or handlers.
    #[must_use]
    pub fn from_opcodes(code: Vec<(OpCode, Operand)>) -> Self {
        let mut instructions = InstructionList::new();
        for (opcode, operand) in code {
            instructions.push(opcode, operand);
        }
        MethodBody::new(instructions)
    }
}
