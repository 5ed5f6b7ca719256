//! CIL instruction model, bytecode decoding and bytecode encoding.
//!
//! Method bodies are edited as an [`InstructionList`]: instructions with stable identities whose
//! branch operands name their targets by [`InstrId`]. Bytecode only exists at the module image
//! boundary, where [`decode_body`] turns offsets into identities and [`encode_body`] turns them
//! back, widening short branches as needed.
//!
//! # Key Types
//! - [`OpCode`] - The supported CIL opcodes with their encoding and stack behaviour
//! - [`Instruction`] - An opcode with its resolved [`Operand`]
//! - [`InstructionList`] - The ordered, editable instructions of a body
//! - [`TokenResolver`] / [`TokenAllocator`] - Token lookup and allocation at the image boundary
//!
//! # Main Functions
//! - [`decode_body`] - Decode bytecode into an instruction list
//! - [`encode_body`] - Encode an instruction list into bytecode
//! - [`compute_max_stack`] - Compute the maximum evaluation stack depth of a body
//!
//! # Example
//! ```rust
//! use crosspatch::assembly::{load_argument, InstructionList, OpCode, Operand};
//!
//! let mut list = InstructionList::new();
//! let ret = list.push(OpCode::Ret, Operand::None);
//! let (opcode, operand) = load_argument(0);
//! list.insert_before(ret, opcode, operand)?;
//! assert_eq!(list.len(), 2);
//! # Ok::<(), crosspatch::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
mod list;
mod opcodes;

pub use decoder::{decode_body, DecodedBody, TokenResolver};
pub use encoder::{compute_max_stack, encode_body, EncodedBody, TokenAllocator};
pub use instruction::{
    load_argument, load_int32, load_local, load_local_address, store_local, InstrId,
    Instruction, Operand,
};
pub use list::InstructionList;
pub use opcodes::{FlowType, OpCode, OpCodeInfo, OperandKind, FE_PREFIX};
