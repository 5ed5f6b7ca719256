//! Exception handler clauses of method bodies.
//!
//! Clause boundaries are instruction identities, so they stay attached to the same code while
//! instructions are inserted or removed around them. An end boundary of `None` means the end of
//! the body.

use bitflags::bitflags;

use crate::{assembly::InstrId, metadata::signatures::TypeRef};

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause.
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause.
        const FILTER = 0x0001;
        /// A finally clause.
        const FINALLY = 0x0002;
        /// A fault clause (finally that executes only on exception).
        const FAULT = 0x0004;
    }
}

/// Exception handler defining a protected region and its handler.
///
/// ```text
/// try {
///     // try_start .. try_end
/// }
/// catch (ExceptionType) {
///     // handler_start .. handler_end
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Kind of clause. Filter clauses are rejected when a body is decoded.
    pub flags: ExceptionHandlerFlags,
    /// First protected instruction
    pub try_start: InstrId,
    /// First instruction after the protected region
    pub try_end: Option<InstrId>,
    /// First handler instruction
    pub handler_start: InstrId,
    /// First instruction after the handler
    pub handler_end: Option<InstrId>,
    /// Caught exception type, for typed clauses
    pub catch_type: Option<TypeRef>,
}

impl ExceptionHandler {
    /// Stack depth on entry to the handler: the caught exception for typed clauses.
    #[must_use]
    pub fn entry_depth(&self) -> u16 {
        if self.flags == ExceptionHandlerFlags::EXCEPTION {
            1
        } else {
            0
        }
    }

    /// Replaces every boundary equal to `from` by `to`.
    pub fn retarget(&mut self, from: InstrId, to: Option<InstrId>) {
        if let Some(to) = to {
            if self.try_start == from {
                self.try_start = to;
            }
            if self.handler_start == from {
                self.handler_start = to;
            }
        }
        if self.try_end == Some(from) {
            self.try_end = to;
        }
        if self.handler_end == Some(from) {
            self.handler_end = to;
        }
    }

    /// Returns `true` if a start boundary is `id`.
    #[must_use]
    pub fn starts_at(&self, id: InstrId) -> bool {
        self.try_start == id || self.handler_start == id
    }
}
