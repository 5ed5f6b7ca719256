//! Type declarations and their members.
//!
//! A [`TypeDeclaration`] owns its methods and fields in declaration order. Member lookups by
//! name go through the owning [`crate::metadata::Module`], which keeps an index over them.

mod field;

pub use field::{FieldAttributes, FieldDeclaration};

use bitflags::bitflags;

use crate::metadata::{
    customattributes::CustomAttribute,
    method::MethodDeclaration,
    signatures::{TypeRef, TypeSig},
};

bitflags! {
    /// Type attributes (ECMA-335 II.23.1.15)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeAttributes: u32 {
        /// Type has public scope
        const PUBLIC = 0x0000_0001;
        /// Nested type with public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Type name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Initialize the type before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

/// A type declared by a module.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDeclaration {
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Attribute flags
    pub flags: TypeAttributes,
    /// The base type, absent for interfaces and `System.Object`
    pub base_type: Option<TypeRef>,
    /// Implemented interfaces
    pub interfaces: Vec<TypeRef>,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Declared methods in order
    pub methods: Vec<MethodDeclaration>,
    /// Declared fields in order
    pub fields: Vec<FieldDeclaration>,
}

impl TypeDeclaration {
    /// Creates an empty public class.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeDeclaration {
            namespace: namespace.into(),
            name: name.into(),
            flags: TypeAttributes::PUBLIC,
            base_type: None,
            interfaces: Vec::new(),
            custom_attributes: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Returns `Namespace.Name`, or just the name for the global namespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns `true` if the type derives from `System.ValueType` or `System.Enum`.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.base_type.as_ref().is_some_and(|base| {
            base.namespace == "System" && (base.name == "ValueType" || base.name == "Enum")
        })
    }

    /// Returns `true` if any implemented interface name contains `fragment`.
    #[must_use]
    pub fn implements_interface_like(&self, fragment: &str) -> bool {
        self.interfaces
            .iter()
            .any(|interface| interface.name.contains(fragment))
    }

    /// The signature of a value of this type, declared in module `scope`.
    #[must_use]
    pub fn signature(&self, scope: &str) -> TypeSig {
        let type_ref = TypeRef::new(scope, self.namespace.clone(), self.name.clone());
        if self.is_value_type() {
            TypeSig::ValueType(type_ref)
        } else {
            TypeSig::Class(type_ref)
        }
    }

    /// All attributes whose type has the simple name `name`.
    pub fn attributes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CustomAttribute> {
        self.custom_attributes
            .iter()
            .filter(move |attribute| attribute.is_named(name))
    }
}
