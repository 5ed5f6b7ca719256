//! Module metadata: declarations, references, signatures and the module image format.
//!
//! # Key Components
//!
//! - [`Module`] - A loaded module with its types and a name-keyed declaration index
//! - [`typesystem`] - Type and field declarations
//! - [`method`] - Method declarations, bodies and exception handlers
//! - [`signatures`] - Type references, type signatures and their binary encoding
//! - [`customattributes`] - Custom attribute instances and their arguments
//! - [`token`] - Metadata tokens used by bytecode
//! - [`image`] - The binary module image format
//!
//! # Examples
//!
//! ```rust,no_run
//! use crosspatch::metadata::Module;
//!
//! let module = Module::from_file("Game.dll".as_ref())?;
//! for declaration in module.types() {
//!     println!("{} ({} methods)", declaration.full_name(), declaration.methods.len());
//! }
//! # Ok::<(), crosspatch::Error>(())
//! ```

/// Custom attribute instances
pub mod customattributes;

/// The module image format
pub mod image;

/// Method declarations and bodies
pub mod method;

/// Type references and signatures
pub mod signatures;

/// Metadata tokens
pub mod token;

/// Type and field declarations
pub mod typesystem;

mod module;

pub use customattributes::{AttributeArgument, CustomAttribute};
pub use method::{MethodAttributes, MethodBody, MethodDeclaration, Parameter};
pub use module::Module;
pub use signatures::{FieldRef, MethodRef, MethodSig, TypeRef, TypeSig};
pub use typesystem::{FieldAttributes, FieldDeclaration, TypeAttributes, TypeDeclaration};
