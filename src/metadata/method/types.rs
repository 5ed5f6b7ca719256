//! Method attribute flags and parameters.

use bitflags::bitflags;

use crate::metadata::signatures::TypeSig;

/// Bitmask for `ACCESS` state extraction
pub const METHOD_ACCESS_MASK: u16 = 0x0007;

bitflags! {
    /// Method attributes (ECMA-335 II.23.1.10)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this module
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the module
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in the module
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, depending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
    }
}

impl MethodAttributes {
    /// Returns `true` if the access bits equal `access` (one of the access constants).
    #[must_use]
    pub fn has_access(self, access: MethodAttributes) -> bool {
        self.bits() & METHOD_ACCESS_MASK == access.bits()
    }
}

/// A named method parameter. By-reference parameters carry a [`TypeSig::ByRef`] type.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name, as written in source
    pub name: String,
    /// Declared type
    pub param_type: TypeSig,
}

impl Parameter {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, param_type: TypeSig) -> Self {
        Parameter {
            name: name.into(),
            param_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mask() {
        let flags = MethodAttributes::PUBLIC | MethodAttributes::STATIC;
        assert!(flags.has_access(MethodAttributes::PUBLIC));
        assert!(!flags.has_access(MethodAttributes::PRIVATE));
        assert!(!MethodAttributes::ASSEM.has_access(MethodAttributes::PRIVATE));
    }
}
