//! The module image format.
//!
//! A module image is a little-endian binary file laid out as follows:
//!
//! ```text
//! magic          "XPMI"
//! version        u16 (1)
//! name           string
//! user strings   count, string*
//! type refs      count, {scope string, namespace string, name string}*
//! type specs     count, blob*                       (type signature)
//! member refs    count, {kind u8, parent row, name string, blob}*
//! module refs    count, string*
//! type defs      count, typedef*
//! ```
//!
//! Strings are 7-bit length-prefixed UTF-8, counts and rows are compressed unsigned integers and
//! rows are 1-based with 0 meaning "none". Blobs are a compressed length followed by the bytes.
//! Member reference kinds are [`MEMBER_KIND_METHOD`] and [`MEMBER_KIND_FIELD`]; the blob is the
//! method or field signature.
//!
//! A type definition is
//!
//! ```text
//! flags u32, namespace, name, base type row, interfaces (count, row*), attributes,
//! fields  (count, {flags u16, name, signature blob, attributes}*),
//! methods (count, {flags u16, name, signature blob, parameter names (count, string*),
//!                  attributes, has body u8, body?}*)
//! ```
//!
//! Custom attributes are a count followed by `{constructor member ref row, count, argument*}`,
//! each argument tagged with its element type ([`ARGUMENT_NULL`], `BOOLEAN`, `I4`, `STRING`,
//! [`ARGUMENT_TYPE`], `SZARRAY`). Method bodies store `max_stack u16`, `init_locals u8`, the
//! local types (count, signature*), the bytecode (length, bytes) and the exception clauses
//! (count, `{flags u16, try offset u32, try length u32, handler offset u32, handler length u32,
//! catch type row}`*). Bytecode tokens refer to the member ref (`0x0A`), type spec (`0x1B`) and
//! user string (`0x70`) tables.

mod reader;
mod writer;

pub(crate) use reader::read_module;
pub(crate) use writer::write_module;

/// Image magic.
pub const MAGIC: [u8; 4] = *b"XPMI";
/// Current image version.
pub const VERSION: u16 = 1;
/// Member reference row describing a method.
pub const MEMBER_KIND_METHOD: u8 = 0;
/// Member reference row describing a field.
pub const MEMBER_KIND_FIELD: u8 = 1;
/// Attribute argument tag of a `null` reference.
pub const ARGUMENT_NULL: u8 = 0x00;
/// Attribute argument tag of a type reference.
pub const ARGUMENT_TYPE: u8 = 0x50;

#[cfg(test)]
mod tests {
    use crate::{
        assembly::{InstrId, OpCode, Operand},
        metadata::{
            customattributes::{AttributeArgument, CustomAttribute},
            method::{
                ExceptionHandler, ExceptionHandlerFlags, MethodAttributes, MethodBody,
                MethodDeclaration, Parameter,
            },
            signatures::{
                FieldRef, MethodRef, MethodSig, TypeRef, TypeSig, MAX_RECURSION_DEPTH,
            },
            typesystem::{FieldAttributes, FieldDeclaration, TypeDeclaration},
            Module,
        },
        Error,
    };

    fn attribute_ctor() -> MethodRef {
        MethodRef::new(
            TypeRef::new("Cross", "Cross", "CrossPatchAttribute"),
            ".ctor",
            MethodSig::new_instance(
                TypeSig::Void,
                vec![
                    TypeSig::Class(TypeRef::new("mscorlib", "System", "Type")),
                    TypeSig::String,
                ],
            ),
        )
    }

    fn sample() -> Module {
        let player = TypeRef::new("Game", "Game", "Player");
        let health = FieldRef::new(player.clone(), "health", TypeSig::I4);

        let mut declaration = TypeDeclaration::new("Game", "Player");
        declaration.base_type = Some(TypeRef::new("mscorlib", "System", "Object"));
        declaration
            .interfaces
            .push(TypeRef::new("Cross", "Cross", "ICrossPatch"));
        declaration.custom_attributes.push(CustomAttribute::new(
            attribute_ctor(),
            vec![
                AttributeArgument::Type(player.clone()),
                AttributeArgument::String("Jump".into()),
                AttributeArgument::Array(vec![
                    AttributeArgument::Bool(true),
                    AttributeArgument::Int32(-7),
                    AttributeArgument::Null,
                ]),
            ],
        ));

        let mut field = FieldDeclaration::new("health", TypeSig::I4, FieldAttributes::PRIVATE);
        field.custom_attributes.push(CustomAttribute::new(
            MethodRef::new(
                TypeRef::new("Zenject", "Zenject", "InjectAttribute"),
                ".ctor",
                MethodSig::new_instance(TypeSig::Void, vec![]),
            ),
            vec![],
        ));
        declaration.fields.push(field);

        let end = Operand::Target(InstrId(8));
        let mut body = MethodBody::from_opcodes(vec![
            (OpCode::LdArg0, Operand::None),
            (OpCode::LdFld, Operand::Field(health)),
            (OpCode::Pop, Operand::None),
            (OpCode::LdStr, Operand::String("jump".into())),
            (OpCode::Pop, Operand::None),
            (OpCode::LeaveS, end.clone()),
            (OpCode::Pop, Operand::None),
            (OpCode::LeaveS, end),
            (OpCode::Ret, Operand::None),
        ]);
        body.exception_handlers.push(ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_start: InstrId(0),
            try_end: Some(InstrId(6)),
            handler_start: InstrId(6),
            handler_end: Some(InstrId(8)),
            catch_type: Some(TypeRef::new("mscorlib", "System", "Exception")),
        });
        body.add_local(TypeSig::SzArray(Box::new(TypeSig::String)))
            .unwrap();
        body.update_max_stack(false).unwrap();

        declaration.methods.push(
            MethodDeclaration::new(
                "Jump",
                MethodAttributes::PUBLIC,
                vec![Parameter::new("height", TypeSig::ByRef(Box::new(TypeSig::R4)))],
                TypeSig::Void,
            )
            .with_body(body),
        );
        declaration
            .methods
            .push(MethodDeclaration::constructor(vec![]));

        let mut module = Module::new("Game");
        module.import_scope("mscorlib");
        module.add_type(declaration);
        module
    }

    #[test]
    fn image_roundtrip() {
        let module = sample();
        let bytes = module.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"XPMI");

        let loaded = Module::from_mem(bytes.clone()).unwrap();
        assert_eq!(loaded.name(), "Game");
        assert_eq!(loaded.references(), module.references());
        assert_eq!(loaded.types(), module.types());
        assert!(!loaded.is_dirty());

        assert_eq!(loaded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rejects_bad_header() {
        assert!(matches!(Module::from_mem(vec![]), Err(Error::Empty)));
        assert!(matches!(
            Module::from_mem(b"MZ\x90\x00\x03\x00".to_vec()),
            Err(Error::Malformed { .. })
        ));

        let mut bytes = sample().to_bytes().unwrap();
        bytes[4] = 9;
        assert!(matches!(
            Module::from_mem(bytes),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_truncation_and_trailing_data() {
        let bytes = sample().to_bytes().unwrap();
        for len in [5, bytes.len() / 2, bytes.len() - 1] {
            assert!(Module::from_mem(bytes[..len].to_vec()).is_err());
        }

        let mut padded = bytes;
        padded.push(0);
        assert!(Module::from_mem(padded).is_err());
    }

    #[test]
    fn rejects_deeply_nested_attribute_arguments() {
        let mut argument = AttributeArgument::Int32(1);
        for _ in 0..MAX_RECURSION_DEPTH {
            argument = AttributeArgument::Array(vec![argument]);
        }

        let mut module = sample();
        module
            .method_mut(0, 0)
            .unwrap()
            .custom_attributes
            .push(CustomAttribute::new(attribute_ctor(), vec![argument]));
        let bytes = module.to_bytes().unwrap();

        assert!(matches!(
            Module::from_mem(bytes),
            Err(Error::RecursionLimit(MAX_RECURSION_DEPTH))
        ));
    }
}
