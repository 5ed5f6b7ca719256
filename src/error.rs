use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The kind of declaration a failed lookup was searching for.
///
/// Carried by [`Error::DeclarationNotFound`] so diagnostics can say *what* was missing, not just
/// the name that was searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DeclarationKind {
    /// A type declaration
    #[strum(serialize = "type")]
    Type,
    /// A method declaration
    #[strum(serialize = "method")]
    Method,
    /// A field declaration
    #[strum(serialize = "field")]
    Field,
    /// A constructor of a type
    #[strum(serialize = "constructor")]
    Constructor,
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Patching Errors
/// These are recovered at the request boundary by [`crate::Patcher`] and reported as
/// diagnostics; one failing request never prevents the next one from running.
///
/// - [`Error::DeclarationNotFound`] - A type, method, field or constructor lookup missed
/// - [`Error::ModuleNotFound`] - A module file is missing or does not decode
/// - [`Error::WriteError`] - A mutated module could not be persisted
/// - [`Error::ConflictingHookAnnotation`] - A hook is marked both prefix and postfix
/// - [`Error::MalformedPatchDeclaration`] - A patch annotation is incomplete
/// - [`Error::SignatureMismatch`] - Hook and target signatures are incompatible
/// - [`Error::InvalidMethodBody`] - The target body cannot host the requested hook
///
/// ## Codec Errors
/// - [`Error::Malformed`] - Corrupted or invalid module image
/// - [`Error::OutOfBounds`] - Attempted to read beyond the image boundaries
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::RecursionLimit`] - Signature nesting exceeds the decoder limit
/// - [`Error::InvalidBranch`] - A branch operand does not reference a live instruction
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust,no_run
/// use crosspatch::{Error, metadata::Module};
///
/// match Module::from_file("Game.dll".as_ref()) {
///     Ok(module) => println!("Loaded {}", module.name()),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed module: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A named declaration could not be located where expected.
    ///
    /// Raised while scanning hook modules and while resolving patch targets. The lookup key and
    /// the module that was searched are always included.
    #[error("Failed to find {kind} '{name}' in module '{module}'")]
    DeclarationNotFound {
        /// What kind of declaration was searched for
        kind: DeclarationKind,
        /// The searched name
        name: String,
        /// The module (or `module::Type`) that was searched
        module: String,
    },

    /// A module file does not exist or is not a valid module image.
    #[error("Failed to open module {}: {reason}", path.display())]
    ModuleNotFound {
        /// Path of the module that could not be opened
        path: PathBuf,
        /// Why the open failed
        reason: String,
    },

    /// Persisting a mutated module failed.
    #[error("Failed to write module {}: {source}", path.display())]
    WriteError {
        /// Path of the module that could not be written
        path: PathBuf,
        /// The underlying I/O failure
        source: std::io::Error,
    },

    /// A hook method carries both the prefix and the postfix annotation.
    #[error("Hook '{0}' declares both prefix and postfix, expected exactly one")]
    ConflictingHookAnnotation(String),

    /// A patch declaration is missing required positional arguments or is ill-typed.
    #[error("Malformed patch declaration on '{hook}': {reason}")]
    MalformedPatchDeclaration {
        /// The hook method carrying the declaration
        hook: String,
        /// What is wrong with it
        reason: String,
    },

    /// Hook and target signatures cannot be woven together.
    #[error("Hook '{hook}' does not fit target '{target}': {reason}")]
    SignatureMismatch {
        /// The hook method
        hook: String,
        /// The target method
        target: String,
        /// The incompatibility
        reason: String,
    },

    /// The target method body cannot host the requested hook.
    #[error("Method '{method}' cannot be patched: {reason}")]
    InvalidMethodBody {
        /// The target method
        method: String,
        /// What is wrong with its body
        reason: String,
    },

    /// The module image is damaged and could not be parsed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the image.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// Recursion limit reached while decoding a nested signature.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A branch operand references an instruction that is not part of the body.
    #[error("Invalid branch: {0}")]
    InvalidBranch(String),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}
