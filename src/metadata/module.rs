//! Modules: the unit of loading, patching and saving.
//!
//! A [`Module`] owns its type declarations and keeps an index over them, keyed by type name and
//! by `(type, member name)`. The index is built when the module is loaded and maintained when
//! types or fields are added. When several members share a name the first declaration wins.
//!
//! # Examples
//!
//! ```rust
//! use crosspatch::metadata::{Module, TypeDeclaration};
//!
//! let mut module = Module::new("Game");
//! module.add_type(TypeDeclaration::new("Game", "Player"));
//!
//! let index = module.find_type("Game.Player")?;
//! assert_eq!(module.type_ref(index)?.to_string(), "[Game]Game.Player");
//! assert!(module.find_type("Game.Enemy").is_err());
//! # Ok::<(), crosspatch::Error>(())
//! ```

use std::{collections::HashMap, path::Path};

use crate::{
    error::DeclarationKind,
    file::File,
    metadata::{
        image,
        method::MethodDeclaration,
        signatures::TypeRef,
        typesystem::{FieldDeclaration, TypeDeclaration},
    },
    Error, Result,
};

/// Name-keyed lookup tables over the declarations of a module.
#[derive(Debug, Clone, Default)]
struct DeclarationIndex {
    types: HashMap<String, usize>,
    methods: HashMap<(usize, String), usize>,
    fields: HashMap<(usize, String), usize>,
}

impl DeclarationIndex {
    fn build(types: &[TypeDeclaration]) -> Self {
        let mut index = DeclarationIndex::default();
        for (type_index, declaration) in types.iter().enumerate() {
            index.insert_type(type_index, declaration);
        }
        index
    }

    fn insert_type(&mut self, type_index: usize, declaration: &TypeDeclaration) {
        self.types
            .entry(declaration.full_name())
            .or_insert(type_index);
        for (method_index, method) in declaration.methods.iter().enumerate() {
            self.methods
                .entry((type_index, method.name.clone()))
                .or_insert(method_index);
        }
        for (field_index, field) in declaration.fields.iter().enumerate() {
            self.fields
                .entry((type_index, field.name.clone()))
                .or_insert(field_index);
        }
    }
}

/// A loaded module.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    references: Vec<String>,
    types: Vec<TypeDeclaration>,
    index: DeclarationIndex,
    dirty: bool,
}

impl Module {
    /// Creates an empty module named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            references: Vec::new(),
            types: Vec::new(),
            index: DeclarationIndex::default(),
            dirty: false,
        }
    }

    pub(crate) fn from_parts(
        name: String,
        references: Vec<String>,
        types: Vec<TypeDeclaration>,
    ) -> Self {
        let index = DeclarationIndex::build(&types);
        Module {
            name,
            references,
            types,
            index,
            dirty: false,
        }
    }

    /// Loads a module image from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be mapped, and codec errors
    /// ([`crate::Error::Malformed`], [`crate::Error::OutOfBounds`], ...) if it is not a valid
    /// module image.
    pub fn from_file(path: &Path) -> Result<Module> {
        let file = File::from_file(path)?;
        image::read_module(file.data())
    }

    /// Loads a module image from a buffer.
    ///
    /// # Errors
    /// Returns codec errors if `data` is not a valid module image.
    pub fn from_mem(data: Vec<u8>) -> Result<Module> {
        let file = File::from_mem(data)?;
        image::read_module(file.data())
    }

    /// Encodes the module into its image format.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::InvalidBranch`] if a method body
    /// cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        image::write_module(self)
    }

    /// Simple name of the module, also the scope of its type references.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the modules this module references.
    #[must_use]
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// All type declarations in order.
    #[must_use]
    pub fn types(&self) -> &[TypeDeclaration] {
        &self.types
    }

    /// Returns `true` if the module was modified since it was loaded or last saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Adds a type declaration and returns its index.
    pub fn add_type(&mut self, declaration: TypeDeclaration) -> usize {
        let type_index = self.types.len();
        self.index.insert_type(type_index, &declaration);
        self.types.push(declaration);
        self.dirty = true;
        type_index
    }

    /// Index of the type named `name`.
    ///
    /// `name` is matched against `Namespace.Name` first; a name without a namespace match falls
    /// back to the first type with that simple name.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the module declares no such type.
    pub fn find_type(&self, name: &str) -> Result<usize> {
        if let Some(type_index) = self.index.types.get(name) {
            return Ok(*type_index);
        }

        self.types
            .iter()
            .position(|declaration| declaration.name == name)
            .ok_or_else(|| self.missing(DeclarationKind::Type, name, None))
    }

    /// The type declaration at `type_index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the index is out of range.
    pub fn type_at(&self, type_index: usize) -> Result<&TypeDeclaration> {
        self.types
            .get(type_index)
            .ok_or_else(|| self.missing(DeclarationKind::Type, &format!("#{type_index}"), None))
    }

    /// A reference to the type at `type_index`, scoped to this module.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the index is out of range.
    pub fn type_ref(&self, type_index: usize) -> Result<TypeRef> {
        let declaration = self.type_at(type_index)?;
        Ok(TypeRef::new(
            self.name.clone(),
            declaration.namespace.clone(),
            declaration.name.clone(),
        ))
    }

    /// Index of the first method named `name` declared by the type at `type_index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the type declares no such method.
    pub fn find_method(&self, type_index: usize, name: &str) -> Result<usize> {
        let declaration = self.type_at(type_index)?;
        self.index
            .methods
            .get(&(type_index, name.to_string()))
            .copied()
            .ok_or_else(|| self.missing(DeclarationKind::Method, name, Some(declaration)))
    }

    /// Index of the first instance constructor of the type at `type_index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the type declares no constructor.
    pub fn find_constructor(&self, type_index: usize) -> Result<usize> {
        let declaration = self.type_at(type_index)?;
        declaration
            .methods
            .iter()
            .position(MethodDeclaration::is_constructor)
            .ok_or_else(|| {
                self.missing(
                    DeclarationKind::Constructor,
                    crate::metadata::method::CONSTRUCTOR_NAME,
                    Some(declaration),
                )
            })
    }

    /// Index of the field named `name` declared by the type at `type_index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the type declares no such field.
    pub fn find_field(&self, type_index: usize, name: &str) -> Result<usize> {
        let declaration = self.type_at(type_index)?;
        self.index
            .fields
            .get(&(type_index, name.to_string()))
            .copied()
            .ok_or_else(|| self.missing(DeclarationKind::Field, name, Some(declaration)))
    }

    /// Returns `true` if the type at `type_index` declares a field named `name`.
    #[must_use]
    pub fn contains_field(&self, type_index: usize, name: &str) -> bool {
        self.index
            .fields
            .contains_key(&(type_index, name.to_string()))
    }

    /// The method at `method_index` of the type at `type_index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if either index is out of range.
    pub fn method_at(&self, type_index: usize, method_index: usize) -> Result<&MethodDeclaration> {
        let declaration = self.type_at(type_index)?;
        declaration.methods.get(method_index).ok_or_else(|| {
            self.missing(
                DeclarationKind::Method,
                &format!("#{method_index}"),
                Some(declaration),
            )
        })
    }

    /// Mutable access to a method. Marks the module as modified.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if either index is out of range.
    pub fn method_mut(
        &mut self,
        type_index: usize,
        method_index: usize,
    ) -> Result<&mut MethodDeclaration> {
        self.method_at(type_index, method_index)?;
        self.dirty = true;
        self.types
            .get_mut(type_index)
            .and_then(|declaration| declaration.methods.get_mut(method_index))
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Adds a field to the type at `type_index` and returns its index. Marks the module as
    /// modified.
    ///
    /// # Errors
    /// Returns [`crate::Error::DeclarationNotFound`] if the type index is out of range and
    /// [`crate::Error::Malformed`] if the type already declares a field of that name.
    pub fn add_field(&mut self, type_index: usize, field: FieldDeclaration) -> Result<usize> {
        let declaration = self.type_at(type_index)?;
        if self.contains_field(type_index, &field.name) {
            return Err(malformed_error!(
                "Type '{}' already declares field '{}'",
                declaration.full_name(),
                field.name
            ));
        }

        let declaration = self
            .types
            .get_mut(type_index)
            .ok_or_else(|| out_of_bounds_error!())?;
        let field_index = declaration.fields.len();
        self.index
            .fields
            .insert((type_index, field.name.clone()), field_index);
        declaration.fields.push(field);
        self.dirty = true;
        Ok(field_index)
    }

    /// Adds `scope` to the referenced modules unless it is already present or names this module.
    /// Returns `true` if the reference list changed.
    pub fn import_scope(&mut self, scope: &str) -> bool {
        if scope == self.name || self.references.iter().any(|known| known == scope) {
            return false;
        }
        self.references.push(scope.to_string());
        self.dirty = true;
        true
    }

    fn missing(
        &self,
        kind: DeclarationKind,
        name: &str,
        declaration: Option<&TypeDeclaration>,
    ) -> Error {
        let module = match declaration {
            Some(declaration) => format!("{}::{}", self.name, declaration.full_name()),
            None => self.name.clone(),
        };
        Error::DeclarationNotFound {
            kind,
            name: name.to_string(),
            module,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        method::{MethodAttributes, Parameter},
        signatures::TypeSig,
        typesystem::FieldAttributes,
    };

    fn sample() -> Module {
        let mut player = TypeDeclaration::new("Game", "Player");
        player.methods.push(MethodDeclaration::new(
            "Jump",
            MethodAttributes::PUBLIC,
            vec![Parameter::new("height", TypeSig::R4)],
            TypeSig::Void,
        ));
        player.methods.push(MethodDeclaration::new(
            "Jump",
            MethodAttributes::PUBLIC,
            vec![],
            TypeSig::Void,
        ));
        player.methods.push(MethodDeclaration::constructor(vec![]));

        let mut module = Module::new("Game");
        module.add_type(player);
        module.mark_clean();
        module
    }

    #[test]
    fn lookups() {
        let module = sample();
        let player = module.find_type("Game.Player").unwrap();
        assert_eq!(module.find_method(player, "Jump").unwrap(), 0);
        assert_eq!(module.find_constructor(player).unwrap(), 2);

        match module.find_method(player, "Run") {
            Err(Error::DeclarationNotFound { kind, name, module }) => {
                assert_eq!(kind, DeclarationKind::Method);
                assert_eq!(name, "Run");
                assert_eq!(module, "Game::Game.Player");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(module.find_type("Player").unwrap(), player);
        assert!(module.find_field(player, "_health").is_err());
        assert!(!module.is_dirty());
    }

    #[test]
    fn add_field_maintains_index() {
        let mut module = sample();
        let player = module.find_type("Game.Player").unwrap();
        let field = FieldDeclaration::new("_stats", TypeSig::I4, FieldAttributes::PRIVATE);

        assert_eq!(module.add_field(player, field.clone()).unwrap(), 0);
        assert!(module.is_dirty());
        assert_eq!(module.find_field(player, "_stats").unwrap(), 0);
        assert!(module.add_field(player, field).is_err());
        assert_eq!(module.types()[player].fields.len(), 1);
    }

    #[test]
    fn import_scope_dedup() {
        let mut module = sample();
        assert!(!module.import_scope("Game"));
        assert!(module.import_scope("Zenject"));
        assert!(!module.import_scope("Zenject"));
        assert_eq!(module.references(), ["Zenject".to_string()]);
    }
}
