//! Decoding of module images.

use crate::{
    assembly::{decode_body, TokenResolver},
    file::parser::Parser,
    metadata::{
        customattributes::{AttributeArgument, CustomAttribute},
        image::{
            ARGUMENT_NULL, ARGUMENT_TYPE, MAGIC, MEMBER_KIND_FIELD, MEMBER_KIND_METHOD, VERSION,
        },
        method::{
            ExceptionHandler, ExceptionHandlerFlags, MethodAttributes, MethodBody,
            MethodDeclaration, Parameter,
        },
        signatures::{
            FieldRef, MethodRef, SignatureDecoder, TypeRef, TypeRefTable, TypeSig, ELEMENT_TYPE,
            MAX_RECURSION_DEPTH,
        },
        token::{Token, TABLE_MEMBER_REF, TABLE_TYPE_SPEC, TABLE_USER_STRING},
        typesystem::{FieldAttributes, FieldDeclaration, TypeAttributes, TypeDeclaration},
        Module,
    },
    Error::{self, RecursionLimit},
    Result,
};

/// Decodes a complete module image.
pub(crate) fn read_module(data: &[u8]) -> Result<Module> {
    if data.is_empty() {
        return Err(Error::Empty);
    }

    let mut parser = Parser::new(data);
    let magic = parser.read_bytes(MAGIC.len())?;
    if magic != MAGIC {
        return Err(malformed_error!("Invalid module image magic - {:02x?}", magic));
    }

    let version = parser.read_le::<u16>()?;
    if version != VERSION {
        return Err(malformed_error!(
            "Unsupported module image version - {}",
            version
        ));
    }

    let name = parser.read_prefixed_string_utf8()?;
    let tables = ImageTables::read(&mut parser)?;

    let reference_count = parser.read_count()?;
    let mut references = Vec::with_capacity(reference_count);
    for _ in 0..reference_count {
        references.push(parser.read_prefixed_string_utf8()?);
    }

    let type_count = parser.read_count()?;
    let mut types = Vec::with_capacity(type_count);
    for _ in 0..type_count {
        types.push(tables.read_type(&mut parser)?);
    }

    if parser.has_more_data() {
        return Err(malformed_error!(
            "Trailing data after module image at offset {}",
            parser.pos()
        ));
    }

    Ok(Module::from_parts(name, references, types))
}

enum MemberRef {
    Method(MethodRef),
    Field(FieldRef),
}

/// The reference tables of an image; resolves the tokens found in bytecode.
struct ImageTables {
    user_strings: Vec<String>,
    type_refs: TypeRefTable,
    type_specs: Vec<TypeSig>,
    member_refs: Vec<MemberRef>,
}

impl ImageTables {
    fn read(parser: &mut Parser) -> Result<Self> {
        let count = parser.read_count()?;
        let mut user_strings = Vec::with_capacity(count);
        for _ in 0..count {
            user_strings.push(parser.read_prefixed_string_utf8()?);
        }

        let count = parser.read_count()?;
        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            let scope = parser.read_prefixed_string_utf8()?;
            let namespace = parser.read_prefixed_string_utf8()?;
            let name = parser.read_prefixed_string_utf8()?;
            rows.push(TypeRef {
                scope,
                namespace,
                name,
            });
        }
        let type_refs: TypeRefTable = rows.into_iter().collect();

        let count = parser.read_count()?;
        let mut type_specs = Vec::with_capacity(count);
        for _ in 0..count {
            let mut blob = read_blob(parser)?;
            let signature = SignatureDecoder::new(&mut blob, &type_refs).type_signature()?;
            expect_consumed(&blob, "type specification")?;
            type_specs.push(signature);
        }

        let count = parser.read_count()?;
        let mut member_refs = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = parser.read_le::<u8>()?;
            let parent = type_refs.read(parser)?;
            let name = parser.read_prefixed_string_utf8()?;
            let mut blob = read_blob(parser)?;
            let mut decoder = SignatureDecoder::new(&mut blob, &type_refs);

            let member = match kind {
                MEMBER_KIND_METHOD => {
                    MemberRef::Method(MethodRef::new(parent, name, decoder.method_signature()?))
                }
                MEMBER_KIND_FIELD => {
                    MemberRef::Field(FieldRef::new(parent, name, decoder.field_signature()?))
                }
                _ => return Err(malformed_error!("Invalid member reference kind - {}", kind)),
            };
            expect_consumed(&blob, "member reference signature")?;
            member_refs.push(member);
        }

        Ok(ImageTables {
            user_strings,
            type_refs,
            type_specs,
            member_refs,
        })
    }

    fn member(&self, token: Token) -> Result<&MemberRef> {
        if token.table() != TABLE_MEMBER_REF {
            return Err(malformed_error!("Token {} is not a member reference", token));
        }
        row_of(&self.member_refs, token)
    }

    fn read_type(&self, parser: &mut Parser) -> Result<TypeDeclaration> {
        let flags = TypeAttributes::from_bits_retain(parser.read_le::<u32>()?);
        let namespace = parser.read_prefixed_string_utf8()?;
        let name = parser.read_prefixed_string_utf8()?;
        let base_type = self.type_refs.read_optional(parser)?;

        let count = parser.read_count()?;
        let mut interfaces = Vec::with_capacity(count);
        for _ in 0..count {
            interfaces.push(self.type_refs.read(parser)?);
        }

        let custom_attributes = self.read_attributes(parser)?;

        let count = parser.read_count()?;
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let flags = FieldAttributes::from_bits_retain(parser.read_le::<u16>()?);
            let name = parser.read_prefixed_string_utf8()?;
            let mut blob = read_blob(parser)?;
            let field_type = SignatureDecoder::new(&mut blob, &self.type_refs).field_signature()?;
            expect_consumed(&blob, "field signature")?;

            let mut field = FieldDeclaration::new(name, field_type, flags);
            field.custom_attributes = self.read_attributes(parser)?;
            fields.push(field);
        }

        let count = parser.read_count()?;
        let mut methods = Vec::with_capacity(count);
        for _ in 0..count {
            methods.push(self.read_method(parser)?);
        }

        Ok(TypeDeclaration {
            namespace,
            name,
            flags,
            base_type,
            interfaces,
            custom_attributes,
            methods,
            fields,
        })
    }

    fn read_method(&self, parser: &mut Parser) -> Result<MethodDeclaration> {
        let flags = MethodAttributes::from_bits_retain(parser.read_le::<u16>()?);
        let name = parser.read_prefixed_string_utf8()?;
        let mut blob = read_blob(parser)?;
        let signature = SignatureDecoder::new(&mut blob, &self.type_refs).method_signature()?;
        expect_consumed(&blob, "method signature")?;

        if signature.has_this == flags.contains(MethodAttributes::STATIC) {
            return Err(malformed_error!(
                "Method '{}' has a calling convention that contradicts its flags",
                name
            ));
        }

        let count = parser.read_count()?;
        if count != signature.params.len() {
            return Err(malformed_error!(
                "Method '{}' names {} parameters but its signature has {}",
                name,
                count,
                signature.params.len()
            ));
        }
        let mut params = Vec::with_capacity(count);
        for param_type in signature.params {
            params.push(Parameter::new(parser.read_prefixed_string_utf8()?, param_type));
        }

        let mut method = MethodDeclaration::new(name, flags, params, signature.return_type);
        method.custom_attributes = self.read_attributes(parser)?;

        match parser.read_le::<u8>()? {
            0 => {}
            1 => method.body = Some(self.read_body(parser)?),
            other => {
                return Err(malformed_error!(
                    "Invalid body marker {} for method '{}'",
                    other,
                    method.name
                ))
            }
        }
        Ok(method)
    }

    fn read_body(&self, parser: &mut Parser) -> Result<MethodBody> {
        let max_stack = parser.read_le::<u16>()?;
        let init_locals = match parser.read_le::<u8>()? {
            0 => false,
            1 => true,
            other => return Err(malformed_error!("Invalid init_locals value {}", other)),
        };

        let count = parser.read_count()?;
        let mut locals = Vec::with_capacity(count);
        for _ in 0..count {
            locals.push(SignatureDecoder::new(parser, &self.type_refs).type_signature()?);
        }

        let code_size = parser.read_count()?;
        let code = parser.read_bytes(code_size)?;
        let decoded = decode_body(code, self)?;

        let count = parser.read_count()?;
        let mut exception_handlers = Vec::with_capacity(count);
        for _ in 0..count {
            let flags = ExceptionHandlerFlags::from_bits_retain(parser.read_le::<u16>()?);
            let try_offset = parser.read_le::<u32>()?;
            let try_length = parser.read_le::<u32>()?;
            let handler_offset = parser.read_le::<u32>()?;
            let handler_length = parser.read_le::<u32>()?;
            let catch_type = self.type_refs.read_optional(parser)?;

            if flags != ExceptionHandlerFlags::EXCEPTION
                && flags != ExceptionHandlerFlags::FINALLY
                && flags != ExceptionHandlerFlags::FAULT
            {
                return Err(malformed_error!(
                    "Unsupported exception clause flags - 0x{:04x}",
                    flags.bits()
                ));
            }
            if (flags == ExceptionHandlerFlags::EXCEPTION) != catch_type.is_some() {
                return Err(malformed_error!(
                    "Exception clause at 0x{:04x} has an inconsistent catch type",
                    handler_offset
                ));
            }

            let start = |offset: u32| -> Result<_> {
                decoded.instruction_at(offset)?.ok_or_else(|| {
                    malformed_error!("Exception clause starts at the end of the body")
                })
            };
            let end = |offset: u32, length: u32| {
                let end = offset
                    .checked_add(length)
                    .ok_or_else(|| malformed_error!("Exception clause length overflows"))?;
                decoded.instruction_at(end)
            };

            exception_handlers.push(ExceptionHandler {
                flags,
                try_start: start(try_offset)?,
                try_end: end(try_offset, try_length)?,
                handler_start: start(handler_offset)?,
                handler_end: end(handler_offset, handler_length)?,
                catch_type,
            });
        }

        Ok(MethodBody {
            max_stack,
            init_locals,
            locals,
            instructions: decoded.instructions,
            exception_handlers,
        })
    }

    fn read_attributes(&self, parser: &mut Parser) -> Result<Vec<CustomAttribute>> {
        let count = parser.read_count()?;
        let mut attributes = Vec::with_capacity(count);
        for _ in 0..count {
            let constructor = match parser.read_row()? {
                Some(index) => match self.member_refs.get(index) {
                    Some(MemberRef::Method(method)) => method.clone(),
                    _ => {
                        return Err(malformed_error!(
                            "Attribute constructor row {} is not a method",
                            index + 1
                        ))
                    }
                },
                None => return Err(malformed_error!("Attribute without constructor")),
            };

            let argument_count = parser.read_count()?;
            let mut arguments = Vec::with_capacity(argument_count);
            for _ in 0..argument_count {
                arguments.push(self.read_argument(parser, 0)?);
            }
            attributes.push(CustomAttribute::new(constructor, arguments));
        }
        Ok(attributes)
    }

    fn read_argument(&self, parser: &mut Parser, depth: usize) -> Result<AttributeArgument> {
        if depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let tag = parser.read_le::<u8>()?;
        Ok(match tag {
            ARGUMENT_NULL => AttributeArgument::Null,
            ELEMENT_TYPE::BOOLEAN => AttributeArgument::Bool(parser.read_le::<u8>()? != 0),
            ELEMENT_TYPE::I4 => AttributeArgument::Int32(parser.read_le::<i32>()?),
            ELEMENT_TYPE::STRING => AttributeArgument::String(parser.read_prefixed_string_utf8()?),
            ARGUMENT_TYPE => AttributeArgument::Type(self.type_refs.read(parser)?),
            ELEMENT_TYPE::SZARRAY => {
                let count = parser.read_count()?;
                let mut elements = Vec::with_capacity(count);
                for _ in 0..count {
                    elements.push(self.read_argument(parser, depth + 1)?);
                }
                AttributeArgument::Array(elements)
            }
            _ => {
                return Err(malformed_error!(
                    "Unsupported attribute argument tag - 0x{:02x}",
                    tag
                ))
            }
        })
    }
}

impl TokenResolver for ImageTables {
    fn method(&self, token: Token) -> Result<MethodRef> {
        match self.member(token)? {
            MemberRef::Method(method) => Ok(method.clone()),
            MemberRef::Field(_) => Err(malformed_error!("Token {} is not a method", token)),
        }
    }

    fn field(&self, token: Token) -> Result<FieldRef> {
        match self.member(token)? {
            MemberRef::Field(field) => Ok(field.clone()),
            MemberRef::Method(_) => Err(malformed_error!("Token {} is not a field", token)),
        }
    }

    fn type_sig(&self, token: Token) -> Result<TypeSig> {
        if token.table() != TABLE_TYPE_SPEC {
            return Err(malformed_error!("Token {} is not a type specification", token));
        }
        row_of(&self.type_specs, token).cloned()
    }

    fn string(&self, token: Token) -> Result<String> {
        if token.table() != TABLE_USER_STRING {
            return Err(malformed_error!("Token {} is not a user string", token));
        }
        row_of(&self.user_strings, token).cloned()
    }
}

fn row_of<T>(rows: &[T], token: Token) -> Result<&T> {
    (token.row() as usize)
        .checked_sub(1)
        .and_then(|index| rows.get(index))
        .ok_or_else(|| malformed_error!("Token {} references a missing row", token))
}

fn read_blob<'a>(parser: &mut Parser<'a>) -> Result<Parser<'a>> {
    let length = parser.read_count()?;
    Ok(Parser::new(parser.read_bytes(length)?))
}

fn expect_consumed(blob: &Parser, what: &str) -> Result<()> {
    if blob.has_more_data() {
        return Err(malformed_error!(
            "Trailing bytes in {} at offset {}",
            what,
            blob.pos()
        ));
    }
    Ok(())
}
