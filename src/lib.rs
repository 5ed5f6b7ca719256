// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # crosspatch
//!
//! A binary method-patching engine for compiled modules whose methods are expressed as
//! stack-based CIL bytecode.
//!
//! Hook methods are declared in ordinary modules: a type implementing an interface named like
//! `ICrossPatch` marks its methods with `CrossPatchAttribute(typeof(Target), "Method")` and one
//! of `CrossPrefixAttribute` or `CrossPostfixAttribute`. `crosspatch` finds these hooks, resolves
//! the target method in whichever module declares it, and rewrites the target's instruction
//! stream so the hook runs before the original body (optionally skipping it) or after it
//! (replacing its return value). Patch declarations may also ask for fields to be injected into
//! the target type, tagged with a dependency-injection marker attribute.
//!
//! ## Features
//!
//! - **Module image codec** - Memory-mapped reading and all-or-nothing writing of module images
//! - **Instruction model** - Identity-based branch targets, branch relaxation and max-stack
//!   computation
//! - **Cross-module resolution** - Type references carry their module scope and are resolved
//!   against a module root on demand
//! - **Prefix and postfix weaving** - Result slots, short-circuiting, by-ref returns and
//!   receiver forwarding
//! - **Field injection** - Idempotent, marker-annotated fields for reflection-based injectors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crosspatch::prelude::*;
//!
//! let config = PatchConfig::new("build/Managed", "Zenject-usage.dll");
//! let report = Patcher::new(config).run(&["Mod.Hooks.dll".into()])?;
//!
//! println!("{} patches applied", report.applied.len());
//! for diagnostic in &report.diagnostics {
//!     eprintln!("{}: {}", diagnostic.subject, diagnostic.error);
//! }
//! # Ok::<(), crosspatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - File backends, the bounds-checked [`Parser`] and binary encoding helpers
//! - [`assembly`] - Opcodes, instruction lists, bytecode decoding and encoding
//! - [`metadata`] - Modules, declarations, signatures, custom attributes and the image format
//! - [`patcher`] - Scanning, resolution, injection, rewriting and the [`Patcher`] pipeline
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Codec failures surface as
//! [`Error::Malformed`], [`Error::OutOfBounds`] or [`Error::InvalidBranch`]; patching failures
//! are reported per request in the [`PatchReport`] and never stop later requests.
//!
//! ## Logging
//!
//! `crosspatch` logs through the [`log`](https://docs.rs/log) facade and never installs a
//! logger. Request outcomes are logged at `info`, module handling and weaving at `debug`.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// File access backends and binary I/O
pub mod file;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use crosspatch::prelude::*;
///
/// let module = Module::from_file("Game.dll".as_ref())?;
/// let player = module.find_type("Game.Player")?;
/// println!("{} methods", module.type_at(player)?.methods.len());
/// # Ok::<(), crosspatch::Error>(())
/// ```
pub mod prelude;

/// CIL instructions: opcodes, instruction lists, decoding and encoding
///
/// # Key Types
///
/// - [`assembly::InstructionList`] - Ordered instructions with identity-based branch targets
/// - [`assembly::Instruction`] / [`assembly::Operand`] - A single instruction
/// - [`assembly::OpCode`] - The opcode table with encodings and stack behaviour
///
/// # Main Functions
///
/// - [`assembly::decode_body`] - Decode bytecode into an instruction list
/// - [`assembly::encode_body`] - Encode an instruction list, relaxing branch forms
/// - [`assembly::compute_max_stack`] - Maximum evaluation stack depth over all paths
pub mod assembly;

/// Module metadata and the module image format
pub mod metadata;

/// The patching pipeline
pub mod patcher;

/// `crosspatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

pub use error::{DeclarationKind, Error};
pub use file::{parser::Parser, File};
pub use metadata::Module;
pub use patcher::{
    HookConventions, HookKind, ModuleStore, PatchConfig, PatchReport, PatchRequest, Patcher,
};
