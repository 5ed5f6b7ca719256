//! # crosspatch Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! crosspatch library.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all crosspatch operations
pub use crate::Error;

/// The result type used throughout crosspatch
pub use crate::Result;

/// The kind of declaration a failed lookup was searching for
pub use crate::DeclarationKind;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Patching
// ================================================================================================

/// Pipeline driver, configuration and report
pub use crate::patcher::{
    AppliedPatch, Diagnostic, HookConventions, PatchConfig, PatchReport, Patcher,
};

/// Hook discovery and parsed requests
pub use crate::patcher::{HookKind, PatchDeclaration, PatchRequest, Scanner};

/// Module cache and resolution
pub use crate::patcher::{ModuleStore, ResolvedMethod, ResolvedType, Resolver};

// ================================================================================================
// Metadata
// ================================================================================================

/// Modules and declarations
pub use crate::metadata::{
    FieldDeclaration, MethodBody, MethodDeclaration, Module, Parameter, TypeDeclaration,
};

/// References and signatures
pub use crate::metadata::{FieldRef, MethodRef, MethodSig, TypeRef, TypeSig};

/// Custom attributes
pub use crate::metadata::{AttributeArgument, CustomAttribute};

/// Metadata tokens
pub use crate::metadata::token::Token;

// ================================================================================================
// Instructions
// ================================================================================================

/// Instruction model
pub use crate::assembly::{InstrId, Instruction, InstructionList, OpCode, Operand};
