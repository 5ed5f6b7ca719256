//! Custom attributes attached to types, methods and fields.
//!
//! An attribute is identified by its constructor; the declaring type of the constructor is the
//! attribute type. Only positional (constructor) arguments are modelled, which covers every
//! annotation the patcher reads or writes.

use crate::metadata::signatures::{MethodRef, TypeRef};

/// A positional argument of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArgument {
    /// A `bool` constant
    Bool(bool),
    /// An `int32` constant
    Int32(i32),
    /// A string constant
    String(String),
    /// A `System.Type` argument
    Type(TypeRef),
    /// A single-dimensional array of arguments
    Array(Vec<AttributeArgument>),
    /// A `null` reference (string, type or array)
    Null,
}

impl AttributeArgument {
    /// Returns the string value, if this is a string argument.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeArgument::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the type value, if this is a type argument.
    #[must_use]
    pub fn as_type(&self) -> Option<&TypeRef> {
        match self {
            AttributeArgument::Type(value) => Some(value),
            _ => None,
        }
    }
}

/// A custom attribute instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// The attribute constructor
    pub constructor: MethodRef,
    /// Positional constructor arguments
    pub arguments: Vec<AttributeArgument>,
}

impl CustomAttribute {
    /// Creates an attribute instance.
    #[must_use]
    pub fn new(constructor: MethodRef, arguments: Vec<AttributeArgument>) -> Self {
        CustomAttribute {
            constructor,
            arguments,
        }
    }

    /// The attribute type, i.e. the declaring type of the constructor.
    #[must_use]
    pub fn attribute_type(&self) -> &TypeRef {
        &self.constructor.declaring_type
    }

    /// Returns `true` if the attribute type has the simple name `name`.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.attribute_type().name == name
    }
}
