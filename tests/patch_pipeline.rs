//! End-to-end tests for the patching pipeline.
//!
//! Each test writes a game module and a hook module into a temporary root, runs the patcher,
//! reloads the rewritten module from disk and executes it.

mod common;

use common::*;
use crosspatch::prelude::*;

fn int(name: &str) -> Parameter {
    Parameter::new(name, TypeSig::I4)
}

/// `static bool Bar(int x) { return true; }`
fn bar() -> MethodDeclaration {
    static_method(
        "Bar",
        vec![int("x")],
        TypeSig::Boolean,
        vec![op(OpCode::LdcI4_1), op(OpCode::Ret)],
    )
}

fn hooks(providers: Vec<TypeDeclaration>) -> Module {
    let mut module = Module::new("Hooks");
    for provider in providers {
        module.add_type(provider);
    }
    module
}

fn run(workspace: &Workspace, hooks: &Module) -> Result<PatchReport> {
    let path = workspace.write(hooks);
    Patcher::new(workspace.config()).run(&[path])
}

#[test]
fn prefix_result_short_circuits() -> Result<()> {
    // static bool Deny(int x, ref bool __result) { __result = false; return false; }
    let deny = static_method(
        "Deny",
        vec![
            int("x"),
            Parameter::new("__result", TypeSig::Boolean.into_by_ref()),
        ],
        TypeSig::Boolean,
        vec![
            op(OpCode::LdArg1),
            op(OpCode::LdcI4_0),
            op(OpCode::StIndI1),
            op(OpCode::LdcI4_0),
            op(OpCode::Ret),
        ],
    )
    .with_attribute(patch(&foo(), "Bar", &[]))
    .with_attribute(prefix());

    let workspace = Workspace::new(game_module(vec![bar()]));
    let hook_module = hooks(vec![provider("BarHooks", vec![deny])]);
    let report = run(&workspace, &hook_module)?;
    assert!(report.is_clean(), "{:?}", report.diagnostics);
    assert_eq!(report.written, vec![workspace.path("Game")]);

    let game = workspace.read("Game");
    let mut machine = Machine::new(&[&game, &hook_module]);
    for x in [0, 5, -3] {
        assert_eq!(
            machine.invoke("Game.Foo", "Bar", vec![Value::Int(x)]),
            Some(Value::Int(0))
        );
    }
    assert_eq!(machine.call_names()[..2], ["Bar", "Deny"]);
    Ok(())
}

#[test]
fn prefix_true_runs_original() -> Result<()> {
    let allow = static_method(
        "Allow",
        vec![int("x")],
        TypeSig::Boolean,
        vec![op(OpCode::LdcI4_1), op(OpCode::Ret)],
    )
    .with_attribute(patch(&foo(), "Bar", &[]))
    .with_attribute(prefix());

    let workspace = Workspace::new(game_module(vec![bar()]));
    let hook_module = hooks(vec![provider("BarHooks", vec![allow])]);
    assert!(run(&workspace, &hook_module)?.is_clean());

    let game = workspace.read("Game");
    let mut machine = Machine::new(&[&game, &hook_module]);
    assert_eq!(
        machine.invoke("Game.Foo", "Bar", vec![Value::Int(9)]),
        Some(Value::Int(1))
    );
    assert_eq!(machine.calls[1], ("Allow".to_string(), vec![Value::Int(9)]));
    Ok(())
}

#[test]
fn postfix_runs_last() -> Result<()> {
    let baz = static_method(
        "Baz",
        vec![int("x")],
        TypeSig::Void,
        vec![op(OpCode::Nop), op(OpCode::Ret)],
    );
    let log = static_method("Log", vec![int("x")], TypeSig::Void, vec![op(OpCode::Ret)])
        .with_attribute(patch(&foo(), "Baz", &[]))
        .with_attribute(postfix());

    let workspace = Workspace::new(game_module(vec![baz]));
    let hook_module = hooks(vec![provider("BazHooks", vec![log])]);
    assert!(run(&workspace, &hook_module)?.is_clean());

    let game = workspace.read("Game");
    let foo_index = game.find_type("Game.Foo")?;
    let baz = game.method_at(foo_index, game.find_method(foo_index, "Baz")?)?;
    let code = baz.body.as_ref().unwrap().instructions.as_slice();
    let tail: Vec<OpCode> = code[code.len() - 2..].iter().map(|i| i.opcode).collect();
    assert_eq!(tail, vec![OpCode::Call, OpCode::Ret]);
    assert_eq!(code[code.len() - 2].method().unwrap().name, "Log");

    let mut machine = Machine::new(&[&game, &hook_module]);
    assert_eq!(machine.invoke("Game.Foo", "Baz", vec![Value::Int(7)]), None);
    assert_eq!(machine.calls[1], ("Log".to_string(), vec![Value::Int(7)]));
    Ok(())
}

#[test]
fn postfix_replaces_return_value() -> Result<()> {
    // static int Score(int x) => x + 1;
    let score = static_method(
        "Score",
        vec![int("x")],
        TypeSig::I4,
        vec![
            op(OpCode::LdArg0),
            op(OpCode::LdcI4_1),
            op(OpCode::Add),
            op(OpCode::Ret),
        ],
    );
    // static int Double(int x) => x * 2;
    let double = static_method(
        "Double",
        vec![int("x")],
        TypeSig::I4,
        vec![
            op(OpCode::LdArg0),
            op(OpCode::LdcI4_2),
            op(OpCode::Mul),
            op(OpCode::Ret),
        ],
    )
    .with_attribute(patch(&foo(), "Score", &[]))
    .with_attribute(postfix());

    let workspace = Workspace::new(game_module(vec![score]));
    let hook_module = hooks(vec![provider("ScoreHooks", vec![double])]);
    assert!(run(&workspace, &hook_module)?.is_clean());

    let game = workspace.read("Game");
    let mut machine = Machine::new(&[&game, &hook_module]);
    assert_eq!(
        machine.invoke("Game.Foo", "Score", vec![Value::Int(3)]),
        Some(Value::Int(6))
    );
    Ok(())
}

#[test]
fn branches_to_first_instruction_skip_the_prefix() -> Result<()> {
    // static int Countdown(int n) { while (n != 0) n = n - 1; return n; }
    let countdown = static_method(
        "Countdown",
        vec![int("n")],
        TypeSig::I4,
        vec![
            op(OpCode::LdArg0),
            (OpCode::BrFalseS, Operand::Target(InstrId(7))),
            op(OpCode::LdArg0),
            op(OpCode::LdcI4_1),
            op(OpCode::Sub),
            (OpCode::StArgS, Operand::Argument(0)),
            (OpCode::BrS, Operand::Target(InstrId(0))),
            op(OpCode::LdArg0),
            op(OpCode::Ret),
        ],
    );
    let tick = static_method("Tick", vec![], TypeSig::Void, vec![op(OpCode::Ret)])
        .with_attribute(patch(&foo(), "Countdown", &[]))
        .with_attribute(prefix());

    let workspace = Workspace::new(game_module(vec![countdown]));
    let hook_module = hooks(vec![provider("LoopHooks", vec![tick])]);
    assert!(run(&workspace, &hook_module)?.is_clean());

    let game = workspace.read("Game");
    let mut machine = Machine::new(&[&game, &hook_module]);
    assert_eq!(
        machine.invoke("Game.Foo", "Countdown", vec![Value::Int(3)]),
        Some(Value::Int(0))
    );
    assert_eq!(machine.call_names(), vec!["Countdown", "Tick"]);
    Ok(())
}

#[test]
fn prefix_fills_by_ref_result() -> Result<()> {
    // static ref int Slot() => ref new int[1][0];
    let slot = static_method(
        "Slot",
        vec![],
        TypeSig::I4.into_by_ref(),
        vec![
            op(OpCode::LdcI4_1),
            (OpCode::NewArr, Operand::Type(TypeSig::I4)),
            op(OpCode::LdcI4_0),
            (OpCode::LdElema, Operand::Type(TypeSig::I4)),
            op(OpCode::Ret),
        ],
    );
    // static bool Redirect(ref int __result) { __result = 42; return false; }
    let redirect = static_method(
        "Redirect",
        vec![Parameter::new("__result", TypeSig::I4.into_by_ref())],
        TypeSig::Boolean,
        vec![
            op(OpCode::LdArg0),
            (OpCode::LdcI4S, Operand::Int32(42)),
            op(OpCode::StIndI4),
            op(OpCode::LdcI4_0),
            op(OpCode::Ret),
        ],
    )
    .with_attribute(patch(&foo(), "Slot", &[]))
    .with_attribute(prefix());

    let workspace = Workspace::new(game_module(vec![slot]));
    let hook_module = hooks(vec![provider("SlotHooks", vec![redirect])]);
    assert!(run(&workspace, &hook_module)?.is_clean());

    let game = workspace.read("Game");
    let mut machine = Machine::new(&[&game, &hook_module]);
    let address = machine.invoke("Game.Foo", "Slot", vec![]).unwrap();
    assert_eq!(machine.load(address), Value::Int(42));
    Ok(())
}

#[test]
fn prefix_receives_instance() -> Result<()> {
    // bool Check(int x) => x > 0;
    let check = instance_method(
        "Check",
        vec![int("x")],
        TypeSig::Boolean,
        vec![
            op(OpCode::LdArg1),
            op(OpCode::LdcI4_0),
            op(OpCode::Cgt),
            op(OpCode::Ret),
        ],
    );
    let observe = static_method(
        "Observe",
        vec![
            Parameter::new("__instance", TypeSig::Class(foo())),
            int("x"),
        ],
        TypeSig::Void,
        vec![op(OpCode::Ret)],
    )
    .with_attribute(patch(&foo(), "Check", &[]))
    .with_attribute(prefix());

    let workspace = Workspace::new(game_module(vec![check]));
    let hook_module = hooks(vec![provider("CheckHooks", vec![observe])]);
    assert!(run(&workspace, &hook_module)?.is_clean());

    let game = workspace.read("Game");
    let mut machine = Machine::new(&[&game, &hook_module]);
    let this = Value::Int(99);
    assert_eq!(
        machine.invoke("Game.Foo", "Check", vec![this, Value::Int(5)]),
        Some(Value::Int(1))
    );
    assert_eq!(
        machine.calls[1],
        ("Observe".to_string(), vec![this, Value::Int(5)])
    );
    Ok(())
}

#[test]
fn injection_is_idempotent_and_failures_are_isolated() -> Result<()> {
    let signal_bus = TypeRef::new("Zenject", "Zenject", "SignalBus");
    let inject_attribute = TypeRef::new("Zenject", "Zenject", "InjectAttribute");

    let good = static_method("Observe", vec![int("x")], TypeSig::Void, vec![op(OpCode::Ret)])
        .with_attribute(patch(&foo(), "Bar", &[signal_bus.clone()]))
        .with_attribute(prefix())
        .with_attribute(annotation(
            "CrossInjectAttribute",
            vec![AttributeArgument::Type(signal_bus.clone())],
        ));
    let missing_type = static_method("Lost", vec![], TypeSig::Void, vec![op(OpCode::Ret)])
        .with_attribute(patch(&TypeRef::new("Game", "Game", "Missing"), "Bar", &[]))
        .with_attribute(prefix());
    // postfix returning void on a bool method: injects first, then fails to weave
    let mismatched = static_method("After", vec![], TypeSig::Void, vec![op(OpCode::Ret)])
        .with_attribute(patch(&foo(), "Bar", &[inject_attribute]))
        .with_attribute(postfix());
    let conflicting = static_method("Both", vec![], TypeSig::Void, vec![op(OpCode::Ret)])
        .with_attribute(patch(&foo(), "Bar", &[]))
        .with_attribute(prefix())
        .with_attribute(postfix());

    let workspace = Workspace::new(game_module(vec![bar()]));
    let hook_module = hooks(vec![provider(
        "MixedHooks",
        vec![good, missing_type, mismatched, conflicting],
    )]);

    let report = run(&workspace, &hook_module)?;
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].injected_fields, vec!["_signalBus".to_string()]);
    assert_eq!(report.diagnostics.len(), 3);
    assert!(matches!(
        report.diagnostics[0].error,
        Error::DeclarationNotFound {
            kind: DeclarationKind::Type,
            ..
        }
    ));
    assert!(matches!(
        report.diagnostics[1].error,
        Error::SignatureMismatch { .. }
    ));
    assert!(matches!(
        report.diagnostics[2].error,
        Error::ConflictingHookAnnotation(_)
    ));

    let game = workspace.read("Game");
    let foo_index = game.find_type("Game.Foo")?;
    assert!(game.contains_field(foo_index, "_signalBus"));
    assert!(!game.contains_field(foo_index, "_injectAttribute"));
    let field = &game.type_at(foo_index)?.fields[game.find_field(foo_index, "_signalBus")?];
    assert_eq!(field.field_type, TypeSig::Class(signal_bus));
    assert!(field.custom_attributes[0].is_named("InjectAttribute"));
    assert_eq!(
        game.references(),
        ["Zenject".to_string(), "Hooks".to_string()]
    );

    // a second run weaves again but never duplicates the field
    let again = run(&workspace, &hook_module)?;
    assert!(again.applied[0].injected_fields.is_empty());
    let game = workspace.read("Game");
    let fields = &game.type_at(foo_index)?.fields;
    assert_eq!(
        fields.iter().filter(|field| field.name == "_signalBus").count(),
        1
    );
    Ok(())
}

#[test]
fn failed_request_leaves_files_untouched() -> Result<()> {
    let workspace = Workspace::new(game_module(vec![bar()]));
    let before = workspace.bytes("Game");

    let mismatched = static_method("After", vec![], TypeSig::Void, vec![op(OpCode::Ret)])
        .with_attribute(patch(
            &foo(),
            "Bar",
            &[TypeRef::new("Zenject", "Zenject", "SignalBus")],
        ))
        .with_attribute(postfix());
    let report = run(&workspace, &hooks(vec![provider("Bad", vec![mismatched])]))?;

    assert!(report.applied.is_empty());
    assert!(report.written.is_empty());
    assert_eq!(workspace.bytes("Game"), before);
    Ok(())
}

#[test]
fn unchecked_signatures_still_weave() -> Result<()> {
    // postfix returning int on a bool method
    let after = static_method(
        "After",
        vec![],
        TypeSig::I4,
        vec![op(OpCode::LdcI4_0), op(OpCode::Ret)],
    )
    .with_attribute(patch(&foo(), "Bar", &[]))
    .with_attribute(postfix());

    let workspace = Workspace::new(game_module(vec![bar()]));
    let hook_module = hooks(vec![provider("Loose", vec![after])]);
    let path = workspace.write(&hook_module);

    let checked = Patcher::new(workspace.config()).run(&[path.clone()])?;
    assert!(matches!(
        checked.diagnostics[0].error,
        Error::SignatureMismatch { .. }
    ));

    let unchecked = Patcher::new(workspace.config().verify_signatures(false)).run(&[path])?;
    assert!(unchecked.is_clean());

    let game = workspace.read("Game");
    let mut machine = Machine::new(&[&game, &hook_module]);
    assert_eq!(
        machine.invoke("Game.Foo", "Bar", vec![Value::Int(1)]),
        Some(Value::Int(0))
    );
    Ok(())
}
