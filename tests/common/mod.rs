//! Shared helpers for the integration tests: module builders, a temporary module root and a
//! small evaluator that executes method bodies.

#![allow(dead_code)]

use std::{collections::HashMap, fs, path::PathBuf};

use crosspatch::prelude::*;
use crosspatch::metadata::{FieldAttributes, MethodAttributes};
use tempfile::TempDir;

pub const ANNOTATIONS: &str = "CrossPatch";

/// An instance of annotation `name` with positional `arguments`.
pub fn annotation(name: &str, arguments: Vec<AttributeArgument>) -> CustomAttribute {
    CustomAttribute::new(
        MethodRef::new(
            TypeRef::new(ANNOTATIONS, ANNOTATIONS, name),
            ".ctor",
            MethodSig::new_instance(TypeSig::Void, Vec::new()),
        ),
        arguments,
    )
}

/// `CrossPatchAttribute(typeof(target), method, inject)`.
pub fn patch(target: &TypeRef, method: &str, inject: &[TypeRef]) -> CustomAttribute {
    let mut arguments = vec![
        AttributeArgument::Type(target.clone()),
        AttributeArgument::String(method.to_string()),
    ];
    if !inject.is_empty() {
        arguments.push(AttributeArgument::Array(
            inject.iter().cloned().map(AttributeArgument::Type).collect(),
        ));
    }
    annotation("CrossPatchAttribute", arguments)
}

pub fn prefix() -> CustomAttribute {
    annotation("CrossPrefixAttribute", Vec::new())
}

pub fn postfix() -> CustomAttribute {
    annotation("CrossPostfixAttribute", Vec::new())
}

pub fn static_method(
    name: &str,
    params: Vec<Parameter>,
    return_type: TypeSig,
    code: Vec<(OpCode, Operand)>,
) -> MethodDeclaration {
    MethodDeclaration::new(
        name,
        MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG,
        params,
        return_type,
    )
    .with_body(MethodBody::from_opcodes(code))
}

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

/// A type in namespace `Mod` implementing `ICrossPatch`.
pub fn provider(name: &str, methods: Vec<MethodDeclaration>) -> TypeDeclaration {
    let mut declaration = TypeDeclaration::new("Mod", name);
    declaration
        .interfaces
        .push(TypeRef::new(ANNOTATIONS, ANNOTATIONS, "ICrossPatch"));
    declaration.methods = methods;
    declaration
}

pub fn op(opcode: OpCode) -> (OpCode, Operand) {
    (opcode, Operand::None)
}

pub fn foo() -> TypeRef {
    TypeRef::new("Game", "Game", "Foo")
}

/// The framework module declaring `Zenject.InjectAttribute` and `Zenject.SignalBus`.
pub fn framework_module() -> Module {
    let mut inject = TypeDeclaration::new("Zenject", "InjectAttribute");
    inject.methods.push(
        MethodDeclaration::constructor(Vec::new())
            .with_body(MethodBody::from_opcodes(vec![op(OpCode::Ret)])),
    );

    let mut module = Module::new("Zenject");
    module.add_type(inject);
    module.add_type(TypeDeclaration::new("Zenject", "SignalBus"));
    module
}

/// The `Game` module with `Game.Foo` declaring `methods` and an `int score` field.
pub fn game_module(methods: Vec<MethodDeclaration>) -> Module {
    let mut foo = TypeDeclaration::new("Game", "Foo");
    foo.fields.push(FieldDeclaration::new(
        "score",
        TypeSig::I4,
        FieldAttributes::PRIVATE,
    ));
    foo.methods = methods;

    let mut module = Module::new("Game");
    module.add_type(foo);
    module
}

/// A temporary module root.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// A root holding `Zenject.dll` and a `Game.dll` built from `game`.
    pub fn new(game: Module) -> Self {
        let workspace = Workspace {
            dir: tempfile::tempdir().unwrap(),
        };
        workspace.write(&framework_module());
        workspace.write(&game);
        workspace
    }

    pub fn write(&self, module: &Module) -> PathBuf {
        let path = self.path(module.name());
        fs::write(&path, module.to_bytes().unwrap()).unwrap();
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{name}.dll"))
    }

    pub fn read(&self, name: &str) -> Module {
        Module::from_file(&self.path(name)).unwrap()
    }

    pub fn bytes(&self, name: &str) -> Vec<u8> {
        fs::read(self.path(name)).unwrap()
    }

    pub fn config(&self) -> PatchConfig {
        PatchConfig::new(self.dir.path(), "Zenject.dll")
    }
}

/// A value on the evaluation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Null,
    /// Address of a heap cell
    Ref(usize),
    /// A single-dimensional array occupying heap cells `start..start + len`
    Array(usize, usize),
}

impl Value {
    pub fn int(self) -> i32 {
        match self {
            Value::Int(value) => value,
            other => panic!("expected an int, found {other:?}"),
        }
    }

    fn cell(self) -> usize {
        match self {
            Value::Ref(cell) => cell,
            other => panic!("expected an address, found {other:?}"),
        }
    }

    fn truthy(self) -> bool {
        !matches!(self, Value::Int(0) | Value::Null)
    }
}

/// Executes method bodies of loaded modules.
///
/// Arguments and locals live in heap cells so `ldloca` addresses can cross call frames. Every
/// executed call is recorded with its arguments. The operand stack must be empty at `ret` of a
/// void method and hold exactly the return value otherwise.
#[derive(Default)]
pub struct Machine {
    methods: HashMap<(String, String), MethodDeclaration>,
    heap: Vec<Value>,
    pub calls: Vec<(String, Vec<Value>)>,
    steps: usize,
}

impl Machine {
    pub fn new(modules: &[&Module]) -> Self {
        let mut machine = Machine::default();
        for module in modules {
            for declaration in module.types() {
                for method in &declaration.methods {
                    machine
                        .methods
                        .entry((declaration.full_name(), method.name.clone()))
                        .or_insert_with(|| method.clone());
                }
            }
        }
        machine
    }

    pub fn load(&self, cell: Value) -> Value {
        self.heap[cell.cell()]
    }

    /// Invokes `type_name::method` with `args`, including the receiver for instance methods.
    pub fn invoke(&mut self, type_name: &str, method: &str, args: Vec<Value>) -> Option<Value> {
        let declaration = self
            .methods
            .get(&(type_name.to_string(), method.to_string()))
            .unwrap_or_else(|| panic!("no method {type_name}::{method}"))
            .clone();
        assert_eq!(declaration.arg_count(), args.len(), "{type_name}::{method}");
        self.calls.push((method.to_string(), args.clone()));

        let body = declaration.body.as_ref().expect("method has a body");
        let arguments: Vec<usize> = args.into_iter().map(|value| self.alloc(value)).collect();
        let locals: Vec<usize> = body
            .locals
            .iter()
            .map(|_| self.alloc(Value::Int(0)))
            .collect();

        let code = body.instructions.as_slice();
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;

        loop {
            self.steps += 1;
            assert!(self.steps < 100_000, "evaluation does not terminate");

            let instruction = &code[pc];
            pc += 1;
            let jump = |target: &InstrId| {
                body.instructions
                    .position(*target)
                    .expect("branch target is part of the body")
            };

            if let Some(index) = instruction.argument_index() {
                let cell = arguments[usize::from(index)];
                match instruction.opcode {
                    OpCode::StArgS | OpCode::StArg => {
                        self.heap[cell] = stack.pop().unwrap();
                    }
                    OpCode::LdArgaS | OpCode::LdArga => stack.push(Value::Ref(cell)),
                    _ => stack.push(self.heap[cell]),
                }
                continue;
            }

            if let Some(index) = instruction.local_index() {
                let cell = locals[usize::from(index)];
                match instruction.opcode {
                    OpCode::StLoc0
                    | OpCode::StLoc1
                    | OpCode::StLoc2
                    | OpCode::StLoc3
                    | OpCode::StLocS
                    | OpCode::StLoc => {
                        self.heap[cell] = stack.pop().unwrap();
                    }
                    OpCode::LdLocaS | OpCode::LdLoca => stack.push(Value::Ref(cell)),
                    _ => stack.push(self.heap[cell]),
                }
                continue;
            }

            match (&instruction.opcode, &instruction.operand) {
                (OpCode::Nop, _) => {}
                (OpCode::LdNull, _) => stack.push(Value::Null),
                (OpCode::LdcI4M1, _) => stack.push(Value::Int(-1)),
                (OpCode::LdcI4_0, _) => stack.push(Value::Int(0)),
                (OpCode::LdcI4_1, _) => stack.push(Value::Int(1)),
                (OpCode::LdcI4_2, _) => stack.push(Value::Int(2)),
                (OpCode::LdcI4_3, _) => stack.push(Value::Int(3)),
                (OpCode::LdcI4S | OpCode::LdcI4, Operand::Int32(value)) => {
                    stack.push(Value::Int(*value));
                }
                (OpCode::Dup, _) => {
                    let top = *stack.last().unwrap();
                    stack.push(top);
                }
                (OpCode::Pop, _) => {
                    stack.pop().unwrap();
                }
                (OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Ceq | OpCode::Cgt, _) => {
                    let right = stack.pop().unwrap().int();
                    let left = stack.pop().unwrap().int();
                    stack.push(Value::Int(match instruction.opcode {
                        OpCode::Add => left.wrapping_add(right),
                        OpCode::Sub => left.wrapping_sub(right),
                        OpCode::Mul => left.wrapping_mul(right),
                        OpCode::Ceq => i32::from(left == right),
                        _ => i32::from(left > right),
                    }));
                }
                (OpCode::Br | OpCode::BrS, Operand::Target(target)) => pc = jump(target),
                (OpCode::BrTrue | OpCode::BrTrueS, Operand::Target(target)) => {
                    if stack.pop().unwrap().truthy() {
                        pc = jump(target);
                    }
                }
                (OpCode::BrFalse | OpCode::BrFalseS, Operand::Target(target)) => {
                    if !stack.pop().unwrap().truthy() {
                        pc = jump(target);
                    }
                }
                (OpCode::NewArr, Operand::Type(_)) => {
                    let len = usize::try_from(stack.pop().unwrap().int()).unwrap();
                    let start = self.heap.len();
                    for _ in 0..len {
                        self.alloc(Value::Int(0));
                    }
                    stack.push(Value::Array(start, len));
                }
                (OpCode::LdElema, Operand::Type(_)) => {
                    let index = usize::try_from(stack.pop().unwrap().int()).unwrap();
                    match stack.pop().unwrap() {
                        Value::Array(start, len) if index < len => {
                            stack.push(Value::Ref(start + index));
                        }
                        other => panic!("ldelema on {other:?}"),
                    }
                }
                (OpCode::LdIndU1 | OpCode::LdIndI4 | OpCode::LdIndRef, _) => {
                    let cell = stack.pop().unwrap().cell();
                    stack.push(self.heap[cell]);
                }
                (OpCode::StIndI1 | OpCode::StIndI4 | OpCode::StIndRef, _) => {
                    let value = stack.pop().unwrap();
                    let cell = stack.pop().unwrap().cell();
                    self.heap[cell] = value;
                }
                (OpCode::Call, Operand::Method(callee)) => {
                    let count = callee.signature.arg_count();
                    let args = stack.split_off(stack.len() - count);
                    let result = self.invoke(
                        &callee.declaring_type.full_name(),
                        &callee.name,
                        args,
                    );
                    if let Some(value) = result {
                        stack.push(value);
                    }
                }
                (OpCode::Ret, _) => {
                    return if declaration.returns_value() {
                        assert_eq!(stack.len(), 1, "unbalanced stack at ret of {method}");
                        stack.pop()
                    } else {
                        assert!(stack.is_empty(), "unbalanced stack at ret of {method}");
                        None
                    };
                }
                (opcode, operand) => panic!("unsupported instruction {opcode} {operand:?}"),
            }
        }
    }

    /// Names of the invoked methods, in call order.
    pub fn call_names(&self) -> Vec<&str> {
        self.calls.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn alloc(&mut self, value: Value) -> usize {
        self.heap.push(value);
        self.heap.len() - 1
    }
}
