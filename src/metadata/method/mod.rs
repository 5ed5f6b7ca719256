//! Method declarations, bodies and exception handlers.
//!
//! # Key Types
//! - [`MethodDeclaration`] - A method with its parameters, attributes and optional body
//! - [`MethodBody`] - Locals, instructions and exception handlers
//! - [`MethodAttributes`] - Access and modifier flags
//! - [`ExceptionHandler`] - A try region and its handler, bounded by instruction identities

mod body;
mod exceptions;
mod types;

pub use body::MethodBody;
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};
pub use types::{MethodAttributes, Parameter, METHOD_ACCESS_MASK};

use crate::metadata::{
    customattributes::CustomAttribute,
    signatures::{MethodRef, MethodSig, TypeRef, TypeSig},
};

/// Name of instance constructors.
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// A method declared by a type.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    /// Method name
    pub name: String,
    /// Attribute flags
    pub flags: MethodAttributes,
    /// Declared parameters, excluding the receiver
    pub params: Vec<Parameter>,
    /// Return type, `Void` for none
    pub return_type: TypeSig,
    /// Attached custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// The implementation, absent for abstract methods
    pub body: Option<MethodBody>,
}

impl MethodDeclaration {
    /// Creates a method without attributes or body.
    pub fn new(
        name: impl Into<String>,
        flags: MethodAttributes,
        params: Vec<Parameter>,
        return_type: TypeSig,
    ) -> Self {
        MethodDeclaration {
            name: name.into(),
            flags,
            params,
            return_type,
            custom_attributes: Vec::new(),
            body: None,
        }
    }

    /// Creates a public instance constructor with the given parameters.
    #[must_use]
    pub fn constructor(params: Vec<Parameter>) -> Self {
        MethodDeclaration::new(
            CONSTRUCTOR_NAME,
            MethodAttributes::PUBLIC
                | MethodAttributes::HIDE_BY_SIG
                | MethodAttributes::SPECIAL_NAME
                | MethodAttributes::RTSPECIAL_NAME,
            params,
            TypeSig::Void,
        )
    }

    /// Attaches a body.
    #[must_use]
    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches a custom attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: CustomAttribute) -> Self {
        self.custom_attributes.push(attribute);
        self
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodAttributes::STATIC)
    }

    /// Returns `true` for instance constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME && self.flags.contains(MethodAttributes::RTSPECIAL_NAME)
    }

    /// Returns `true` if the method returns a value.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    /// Number of argument slots, including the receiver of instance methods.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.params.len() + usize::from(!self.is_static())
    }

    /// The calling signature.
    #[must_use]
    pub fn signature(&self) -> MethodSig {
        MethodSig {
            has_this: !self.is_static(),
            return_type: self.return_type.clone(),
            params: self
                .params
                .iter()
                .map(|param| param.param_type.clone())
                .collect(),
        }
    }

    /// A reference to this method as declared by `declaring_type`.
    #[must_use]
    pub fn reference(&self, declaring_type: TypeRef) -> MethodRef {
        MethodRef::new(declaring_type, self.name.clone(), self.signature())
    }

    /// The first attribute whose type has the simple name `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&CustomAttribute> {
        self.custom_attributes
            .iter()
            .find(|attribute| attribute.is_named(name))
    }

    /// All attributes whose type has the simple name `name`.
    pub fn attributes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CustomAttribute> {
        self.custom_attributes
            .iter()
            .filter(move |attribute| attribute.is_named(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_detection() {
        let ctor = MethodDeclaration::constructor(vec![]);
        assert!(ctor.is_constructor());
        assert_eq!(ctor.arg_count(), 1);

        let fake = MethodDeclaration::new(
            CONSTRUCTOR_NAME,
            MethodAttributes::PUBLIC,
            vec![],
            TypeSig::Void,
        );
        assert!(!fake.is_constructor());
    }

    #[test]
    fn signature_of_static() {
        let method = MethodDeclaration::new(
            "Bar",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            vec![Parameter::new("x", TypeSig::I4)],
            TypeSig::Boolean,
        );
        let signature = method.signature();
        assert!(!signature.has_this);
        assert_eq!(signature.params, vec![TypeSig::I4]);
        assert_eq!(method.arg_count(), 1);
        assert!(method.returns_value());
    }
}
