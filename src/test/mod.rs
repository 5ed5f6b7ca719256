//! Shared fixtures for unit tests.
//!
//! Factory functions build declarations the way compiled modules carry them; [`ModuleRoot`]
//! writes a small game and framework module pair into a temporary directory.

use std::{fs, path::PathBuf};

use tempfile::TempDir;

use crate::{
    assembly::{OpCode, Operand},
    metadata::{
        AttributeArgument, CustomAttribute, FieldAttributes, FieldDeclaration, MethodAttributes,
        MethodBody, MethodDeclaration, MethodRef, MethodSig, Module, Parameter, TypeDeclaration,
        TypeRef, TypeSig,
    },
    patcher::{HookKind, PatchConfig, PatchRequest},
};

/// Scope of the annotation types used by hook modules.
pub const ANNOTATION_SCOPE: &str = "CrossPatch";

/// An annotation instance whose type `name` lives in the annotation scope.
pub fn attribute(name: &str, arguments: Vec<AttributeArgument>) -> CustomAttribute {
    let constructor = MethodRef::new(
        TypeRef::new(ANNOTATION_SCOPE, ANNOTATION_SCOPE, name),
        ".ctor",
        MethodSig::new_instance(TypeSig::Void, Vec::new()),
    );
    CustomAttribute::new(constructor, arguments)
}

/// The `Zenject.InjectAttribute` constructor.
pub fn marker_constructor() -> MethodRef {
    MethodRef::new(
        TypeRef::new("Zenject", "Zenject", "InjectAttribute"),
        ".ctor",
        MethodSig::new_instance(TypeSig::Void, Vec::new()),
    )
}

/// A public static method without body.
pub fn hook_method(name: &str, params: Vec<Parameter>, return_type: TypeSig) -> MethodDeclaration {
    MethodDeclaration::new(
        name,
        MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG,
        params,
        return_type,
    )
}

/// A type in the `Hooks` namespace implementing `ICrossPatch`.
pub fn provider_type(name: &str, methods: Vec<MethodDeclaration>) -> TypeDeclaration {
    let mut declaration = TypeDeclaration::new("Hooks", name);
    declaration
        .interfaces
        .push(TypeRef::new(ANNOTATION_SCOPE, ANNOTATION_SCOPE, "ICrossPatch"));
    declaration.methods = methods;
    declaration
}

/// A public static method with the given code.
pub fn static_method(
    name: &str,
    params: Vec<Parameter>,
    return_type: TypeSig,
    code: Vec<(OpCode, Operand)>,
) -> MethodDeclaration {
    hook_method(name, params, return_type).with_body(MethodBody::from_opcodes(code))
}

/// A public instance method with the given code.
pub fn instance_method(
    name: &str,
    params: Vec<Parameter>,
    return_type: TypeSig,
    code: Vec<(OpCode, Operand)>,
) -> MethodDeclaration {
    MethodDeclaration::new(
        name,
        MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
        params,
        return_type,
    )
    .with_body(MethodBody::from_opcodes(code))
}

/// A request weaving the static `Hooks.FooHooks::Hook` into `Game.Foo::<target_method>`.
pub fn request(
    kind: HookKind,
    target_method: &str,
    hook_parameters: Vec<Parameter>,
    return_type: TypeSig,
) -> PatchRequest {
    let signature = MethodSig::new_static(
        return_type,
        hook_parameters
            .iter()
            .map(|param| param.param_type.clone())
            .collect(),
    );

    PatchRequest {
        target_type: TypeRef::new("Game", "Game", "Foo"),
        target_method: target_method.to_string(),
        hook: MethodRef::new(TypeRef::new("Hooks", "Hooks", "FooHooks"), "Hook", signature),
        hook_parameters,
        hook_is_static: true,
        kind,
        inject_types: Vec::new(),
    }
}

fn ret() -> (OpCode, Operand) {
    (OpCode::Ret, Operand::None)
}

/// The `Game` module:
///
/// ```text
/// class Game.Player    { int health; .ctor(); bool CanJump(int x) => true; void Jump(int x) { } }
/// class Game.Inventory { .ctor(); }
/// struct Game.Wallet   { }
/// ```
pub fn game_module() -> Module {
    let mut player = TypeDeclaration::new("Game", "Player");
    player.fields.push(FieldDeclaration::new(
        "health",
        TypeSig::I4,
        FieldAttributes::PRIVATE,
    ));
    player.methods.push(
        MethodDeclaration::constructor(Vec::new()).with_body(MethodBody::from_opcodes(vec![ret()])),
    );
    player.methods.push(instance_method(
        "CanJump",
        vec![Parameter::new("x", TypeSig::I4)],
        TypeSig::Boolean,
        vec![(OpCode::LdcI4_1, Operand::None), ret()],
    ));
    player.methods.push(instance_method(
        "Jump",
        vec![Parameter::new("x", TypeSig::I4)],
        TypeSig::Void,
        vec![(OpCode::Nop, Operand::None), ret()],
    ));

    let mut inventory = TypeDeclaration::new("Game", "Inventory");
    inventory.methods.push(
        MethodDeclaration::constructor(Vec::new()).with_body(MethodBody::from_opcodes(vec![ret()])),
    );

    let mut wallet = TypeDeclaration::new("Game", "Wallet");
    wallet.base_type = Some(TypeRef::new("mscorlib", "System", "ValueType"));

    let mut module = Module::new("Game");
    module.add_type(player);
    module.add_type(inventory);
    module.add_type(wallet);
    module
}

/// The `Zenject` framework module with `InjectAttribute` and `SignalBus`.
pub fn framework_module() -> Module {
    let mut inject = TypeDeclaration::new("Zenject", "InjectAttribute");
    inject.base_type = Some(TypeRef::new("mscorlib", "System", "Attribute"));
    inject.methods.push(
        MethodDeclaration::constructor(Vec::new()).with_body(MethodBody::from_opcodes(vec![ret()])),
    );

    let mut module = Module::new("Zenject");
    module.add_type(inject);
    module.add_type(TypeDeclaration::new("Zenject", "SignalBus"));
    module
}

/// A temporary module root directory.
pub struct ModuleRoot {
    dir: TempDir,
}

impl ModuleRoot {
    /// An empty root.
    pub fn new() -> Self {
        ModuleRoot {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// A root holding `Game.dll` and `Zenject.dll`.
    pub fn with_game() -> Self {
        let root = ModuleRoot::new();
        root.write(&game_module());
        root.write(&framework_module());
        root
    }

    /// Writes `module` to `<root>/<name>.dll` and returns the path.
    pub fn write(&self, module: &Module) -> PathBuf {
        let path = self.path(module.name());
        fs::write(&path, module.to_bytes().unwrap()).unwrap();
        path
    }

    /// Path of the module named `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{name}.dll"))
    }

    /// Reads back the module named `name`.
    pub fn read(&self, name: &str) -> Module {
        Module::from_file(&self.path(name)).unwrap()
    }

    /// A configuration rooted here with `Zenject.dll` as framework module.
    pub fn config(&self) -> PatchConfig {
        PatchConfig::new(self.dir.path(), "Zenject.dll")
    }
}
