//! Resolution of scoped type references to declarations in other modules.

use std::path::PathBuf;

use log::debug;

use crate::{
    metadata::{FieldRef, MethodRef, TypeRef},
    patcher::{config::PatchConfig, store::ModuleStore},
    Result,
};

/// A type declaration located in an open module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    /// File of the declaring module
    pub module_path: PathBuf,
    /// Index of the declaration within the module
    pub type_index: usize,
    /// Reference to the declaration, scoped to its module
    pub type_ref: TypeRef,
}

/// A method declaration located in an open module.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMethod {
    /// File of the declaring module
    pub module_path: PathBuf,
    /// Index of the declaring type within the module
    pub type_index: usize,
    /// Index of the method within its type
    pub method_index: usize,
    /// Reference to the method as declared
    pub method_ref: MethodRef,
}

/// A field declaration located in an open module.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// File of the declaring module
    pub module_path: PathBuf,
    /// Index of the declaring type within the module
    pub type_index: usize,
    /// Index of the field within its type
    pub field_index: usize,
    /// Reference to the field as declared
    pub field_ref: FieldRef,
}

/// Maps type references onto module files under the configured root.
pub struct Resolver<'c> {
    config: &'c PatchConfig,
}

impl<'c> Resolver<'c> {
    /// Creates a resolver for modules laid out according to `config`.
    #[must_use]
    pub fn new(config: &'c PatchConfig) -> Self {
        Resolver { config }
    }

    /// Locates the declaration of `type_ref`, opening `<root>/<scope>.<extension>` on demand.
    ///
    /// # Errors
    /// Returns [`crate::Error::ModuleNotFound`] if the owning module cannot be opened and
    /// [`crate::Error::DeclarationNotFound`] if it does not declare the type.
    pub fn resolve_type(&self, store: &mut ModuleStore, type_ref: &TypeRef) -> Result<ResolvedType> {
        let module_path = self.config.module_path(&type_ref.scope);
        let module = store.open(&module_path)?;
        let type_index = module.find_type(&type_ref.full_name())?;
        let resolved = module.type_ref(type_index)?;

        debug!("Resolved {} to #{} in {}", type_ref, type_index, module_path.display());
        Ok(ResolvedType {
            module_path,
            type_index,
            type_ref: resolved,
        })
    }

    /// Locates the first method named `name` declared by `owner`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the type declares no such method.
    pub fn resolve_method(
        &self,
        store: &ModuleStore,
        owner: &ResolvedType,
        name: &str,
    ) -> Result<ResolvedMethod> {
        let module = store.module(&owner.module_path)?;
        let method_index = module.find_method(owner.type_index, name)?;
        self.method_at(store, owner, method_index)
    }

    /// Locates the first instance constructor declared by `owner`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the type declares no constructor.
    pub fn resolve_constructor(
        &self,
        store: &ModuleStore,
        owner: &ResolvedType,
    ) -> Result<ResolvedMethod> {
        let module = store.module(&owner.module_path)?;
        let method_index = module.find_constructor(owner.type_index)?;
        self.method_at(store, owner, method_index)
    }

    /// Locates the field named `name` declared by `owner`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the type declares no such field.
    pub fn resolve_field(
        &self,
        store: &ModuleStore,
        owner: &ResolvedType,
        name: &str,
    ) -> Result<ResolvedField> {
        let module = store.module(&owner.module_path)?;
        let field_index = module.find_field(owner.type_index, name)?;
        let field = module
            .type_at(owner.type_index)?
            .fields
            .get(field_index)
            .ok_or_else(|| out_of_bounds_error!())?;

        Ok(ResolvedField {
            module_path: owner.module_path.clone(),
            type_index: owner.type_index,
            field_index,
            field_ref: FieldRef::new(
                owner.type_ref.clone(),
                field.name.clone(),
                field.field_type.clone(),
            ),
        })
    }

    fn method_at(
        &self,
        store: &ModuleStore,
        owner: &ResolvedType,
        method_index: usize,
    ) -> Result<ResolvedMethod> {
        let method = store
            .module(&owner.module_path)?
            .method_at(owner.type_index, method_index)?;

        Ok(ResolvedMethod {
            module_path: owner.module_path.clone(),
            type_index: owner.type_index,
            method_index,
            method_ref: method.reference(owner.type_ref.clone()),
        })
    }
}
