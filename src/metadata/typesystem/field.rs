//! Field declarations.

use bitflags::bitflags;

use crate::metadata::{customattributes::CustomAttribute, signatures::TypeSig};

bitflags! {
    /// Field attributes (ECMA-335 II.23.1.5)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this module
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the module
        const ASSEMBLY = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in the module
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
    }
}

/// A field declared by a type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: TypeSig,
    /// Attribute flags
    pub flags: FieldAttributes,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl FieldDeclaration {
    /// Creates a field without attributes.
    pub fn new(name: impl Into<String>, field_type: TypeSig, flags: FieldAttributes) -> Self {
        FieldDeclaration {
            name: name.into(),
            field_type,
            flags,
            custom_attributes: Vec::new(),
        }
    }

    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}
