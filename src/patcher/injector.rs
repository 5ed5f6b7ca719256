//! Injection of marker-annotated fields into target types.

use log::{debug, info};

use crate::{
    metadata::{CustomAttribute, FieldAttributes, FieldDeclaration, MethodRef, TypeRef},
    patcher::{
        resolver::{ResolvedType, Resolver},
        store::ModuleStore,
    },
    Result,
};

/// Name of the field holding an injected `type_name`: `_` followed by the name with its first
/// character lower-cased.
///
/// # Examples
///
/// ```rust
/// use crosspatch::patcher::injected_field_name;
///
/// assert_eq!(injected_field_name("SignalBus"), "_signalBus");
/// assert_eq!(injected_field_name("x"), "_x");
/// ```
#[must_use]
pub fn injected_field_name(type_name: &str) -> String {
    let mut chars = type_name.chars();
    let mut name = String::with_capacity(type_name.len() + 1);
    name.push('_');
    if let Some(first) = chars.next() {
        name.extend(first.to_lowercase());
        name.push_str(chars.as_str());
    }
    name
}

/// Adds a field of type `injected` to `target`, tagged with an attribute built from `marker`.
///
/// The field is private, non-static and typed as a class or value type according to the
/// resolved declaration of `injected`. The scopes of the marker and of the injected type are
/// imported into the target module. If `target` already declares a field of the same name
/// nothing changes and `None` is returned; otherwise the new field name is returned.
///
/// # Errors
/// Returns [`crate::Error::ModuleNotFound`] or [`crate::Error::DeclarationNotFound`] if
/// `injected` cannot be resolved.
pub fn inject_field(
    store: &mut ModuleStore,
    resolver: &Resolver<'_>,
    target: &ResolvedType,
    injected: &TypeRef,
    marker: &MethodRef,
) -> Result<Option<String>> {
    let name = injected_field_name(&injected.name);
    if store
        .module(&target.module_path)?
        .contains_field(target.type_index, &name)
    {
        debug!("{} already declares {}", target.type_ref, name);
        return Ok(None);
    }

    let resolved = resolver.resolve_type(store, injected)?;
    let field_type = store
        .module(&resolved.module_path)?
        .type_at(resolved.type_index)?
        .signature(&resolved.type_ref.scope);

    let mut field = FieldDeclaration::new(name.clone(), field_type, FieldAttributes::PRIVATE);
    field
        .custom_attributes
        .push(CustomAttribute::new(marker.clone(), Vec::new()));

    let module = store.module_mut(&target.module_path)?;
    module.add_field(target.type_index, field)?;
    module.import_scope(&marker.declaring_type.scope);
    module.import_scope(&resolved.type_ref.scope);

    info!("Injected {} {} into {}", resolved.type_ref, name, target.type_ref);
    Ok(Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::TypeSig,
        test::{marker_constructor, ModuleRoot},
    };

    #[test]
    fn field_names() {
        assert_eq!(injected_field_name("SignalBus"), "_signalBus");
        assert_eq!(injected_field_name("IFoo"), "_iFoo");
        assert_eq!(injected_field_name("Ärger"), "_ärger");
        assert_eq!(injected_field_name(""), "_");
    }

    #[test]
    fn inject_is_idempotent() {
        let root = ModuleRoot::with_game();
        let config = root.config();
        let resolver = Resolver::new(&config);
        let mut store = ModuleStore::new();
        let marker = marker_constructor();

        let player = resolver
            .resolve_type(&mut store, &TypeRef::new("Game", "Game", "Player"))
            .unwrap();
        let inventory = TypeRef::new("Game", "Game", "Inventory");

        let added = inject_field(&mut store, &resolver, &player, &inventory, &marker).unwrap();
        assert_eq!(added.as_deref(), Some("_inventory"));

        let again = inject_field(&mut store, &resolver, &player, &inventory, &marker).unwrap();
        assert_eq!(again, None);

        let module = store.module(&player.module_path).unwrap();
        let fields = &module.type_at(player.type_index).unwrap().fields;
        let injected: Vec<_> = fields.iter().filter(|f| f.name == "_inventory").collect();
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].field_type, TypeSig::Class(inventory));
        assert!(!injected[0].is_static());
        assert!(injected[0].custom_attributes[0].is_named("InjectAttribute"));
        assert_eq!(module.references(), ["Zenject".to_string()]);
    }

    #[test]
    fn value_types_and_foreign_scopes() {
        let root = ModuleRoot::with_game();
        let config = root.config();
        let resolver = Resolver::new(&config);
        let mut store = ModuleStore::new();

        let player = resolver
            .resolve_type(&mut store, &TypeRef::new("Game", "Game", "Player"))
            .unwrap();
        let wallet = TypeRef::new("Game", "Game", "Wallet");
        let bus = TypeRef::new("Zenject", "Zenject", "SignalBus");

        inject_field(&mut store, &resolver, &player, &wallet, &marker_constructor()).unwrap();
        inject_field(&mut store, &resolver, &player, &bus, &marker_constructor()).unwrap();

        let module = store.module(&player.module_path).unwrap();
        let wallet_field = module.find_field(player.type_index, "_wallet").unwrap();
        let declaration = module.type_at(player.type_index).unwrap();
        assert_eq!(
            declaration.fields[wallet_field].field_type,
            TypeSig::ValueType(wallet)
        );
        assert!(module.contains_field(player.type_index, "_signalBus"));
        assert!(module.is_dirty());
        assert_eq!(store.dirty_paths(), vec![player.module_path.clone()]);
    }

    #[test]
    fn unresolvable_type_leaves_target_untouched() {
        let root = ModuleRoot::with_game();
        let config = root.config();
        let resolver = Resolver::new(&config);
        let mut store = ModuleStore::new();

        let player = resolver
            .resolve_type(&mut store, &TypeRef::new("Game", "Game", "Player"))
            .unwrap();
        let ghost = TypeRef::new("Game", "Game", "Ghost");

        assert!(inject_field(&mut store, &resolver, &player, &ghost, &marker_constructor()).is_err());
        assert!(store.dirty_paths().is_empty());
    }
}
