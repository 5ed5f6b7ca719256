//! Encoding of module images.
//!
//! Type definitions are encoded first into a separate buffer; encoding interns every referenced
//! type, signature, member and string into the [`TableBuilder`], whose tables are then written
//! ahead of the definitions.

use std::collections::HashMap;

use crate::{
    assembly::{encode_body, TokenAllocator},
    file::io::{write_compressed_len, write_compressed_uint, write_le, write_prefixed_string},
    metadata::{
        customattributes::{AttributeArgument, CustomAttribute},
        image::{
            ARGUMENT_NULL, ARGUMENT_TYPE, MAGIC, MEMBER_KIND_FIELD, MEMBER_KIND_METHOD, VERSION,
        },
        method::{MethodBody, MethodDeclaration},
        signatures::{
            encode_field_signature, encode_method_signature, encode_type_sig, FieldRef,
            MethodRef, TypeRef, TypeRefTable, TypeSig, ELEMENT_TYPE,
        },
        token::{Token, TABLE_MEMBER_REF, TABLE_TYPE_SPEC, TABLE_USER_STRING},
        typesystem::TypeDeclaration,
        Module,
    },
    Result,
};

/// Encodes a complete module image.
pub(crate) fn write_module(module: &Module) -> Result<Vec<u8>> {
    let mut tables = TableBuilder::default();

    let mut definitions = Vec::new();
    write_compressed_len(&mut definitions, module.types().len())?;
    for declaration in module.types() {
        tables.write_type(declaration, &mut definitions)?;
    }

    let mut image = Vec::with_capacity(definitions.len() + 256);
    image.extend_from_slice(&MAGIC);
    write_le(&mut image, VERSION);
    write_prefixed_string(&mut image, module.name())?;
    tables.write_tables(&mut image)?;

    write_compressed_len(&mut image, module.references().len())?;
    for reference in module.references() {
        write_prefixed_string(&mut image, reference)?;
    }

    image.extend_from_slice(&definitions);
    Ok(image)
}

/// Deduplicating row storage; rows are 1-based.
#[derive(Default)]
struct Interned<T> {
    rows: Vec<T>,
    index: HashMap<T, u32>,
}

impl<T: Clone + Eq + std::hash::Hash> Interned<T> {
    fn intern(&mut self, value: T) -> Result<u32> {
        if let Some(row) = self.index.get(&value) {
            return Ok(*row);
        }

        let row = u32::try_from(self.rows.len() + 1)
            .map_err(|_| malformed_error!("Metadata table is full"))?;
        self.index.insert(value.clone(), row);
        self.rows.push(value);
        Ok(row)
    }
}

/// Builds the reference tables of an image and hands out tokens for bytecode.
#[derive(Default)]
struct TableBuilder {
    user_strings: Interned<String>,
    type_refs: TypeRefTable,
    /// Encoded type signatures
    type_specs: Interned<Vec<u8>>,
    /// Encoded member reference rows
    member_refs: Interned<Vec<u8>>,
}

impl TableBuilder {
    fn write_tables(&self, image: &mut Vec<u8>) -> Result<()> {
        write_compressed_len(image, self.user_strings.rows.len())?;
        for value in &self.user_strings.rows {
            write_prefixed_string(image, value)?;
        }

        write_compressed_len(image, self.type_refs.len())?;
        for type_ref in self.type_refs.rows() {
            write_prefixed_string(image, &type_ref.scope)?;
            write_prefixed_string(image, &type_ref.namespace)?;
            write_prefixed_string(image, &type_ref.name)?;
        }

        write_compressed_len(image, self.type_specs.rows.len())?;
        for blob in &self.type_specs.rows {
            write_blob(image, blob)?;
        }

        write_compressed_len(image, self.member_refs.rows.len())?;
        for row in &self.member_refs.rows {
            image.extend_from_slice(row);
        }
        Ok(())
    }

    fn type_row(&mut self, type_ref: &TypeRef) -> Result<u32> {
        self.type_refs.intern(type_ref)
    }

    fn method_row(&mut self, method: &MethodRef) -> Result<u32> {
        let mut signature = Vec::new();
        encode_method_signature(&method.signature, &mut signature, &mut self.type_refs)?;
        self.member_row(
            MEMBER_KIND_METHOD,
            &method.declaring_type,
            &method.name,
            &signature,
        )
    }

    fn field_row(&mut self, field: &FieldRef) -> Result<u32> {
        let mut signature = Vec::new();
        encode_field_signature(&field.field_type, &mut signature, &mut self.type_refs)?;
        self.member_row(
            MEMBER_KIND_FIELD,
            &field.declaring_type,
            &field.name,
            &signature,
        )
    }

    fn member_row(
        &mut self,
        kind: u8,
        parent: &TypeRef,
        name: &str,
        signature: &[u8],
    ) -> Result<u32> {
        let mut row = vec![kind];
        write_compressed_uint(&mut row, self.type_row(parent)?)?;
        write_prefixed_string(&mut row, name)?;
        write_blob(&mut row, signature)?;
        self.member_refs.intern(row)
    }

    fn write_type_row(&mut self, type_ref: Option<&TypeRef>, buffer: &mut Vec<u8>) -> Result<()> {
        let row = match type_ref {
            Some(type_ref) => self.type_row(type_ref)?,
            None => 0,
        };
        write_compressed_uint(buffer, row)
    }

    fn write_type(&mut self, declaration: &TypeDeclaration, buffer: &mut Vec<u8>) -> Result<()> {
        write_le(buffer, declaration.flags.bits());
        write_prefixed_string(buffer, &declaration.namespace)?;
        write_prefixed_string(buffer, &declaration.name)?;
        self.write_type_row(declaration.base_type.as_ref(), buffer)?;

        write_compressed_len(buffer, declaration.interfaces.len())?;
        for interface in &declaration.interfaces {
            self.write_type_row(Some(interface), buffer)?;
        }

        self.write_attributes(&declaration.custom_attributes, buffer)?;

        write_compressed_len(buffer, declaration.fields.len())?;
        for field in &declaration.fields {
            write_le(buffer, field.flags.bits());
            write_prefixed_string(buffer, &field.name)?;
            let mut signature = Vec::new();
            encode_field_signature(&field.field_type, &mut signature, &mut self.type_refs)?;
            write_blob(buffer, &signature)?;
            self.write_attributes(&field.custom_attributes, buffer)?;
        }

        write_compressed_len(buffer, declaration.methods.len())?;
        for method in &declaration.methods {
            self.write_method(method, buffer)?;
        }
        Ok(())
    }

    fn write_method(&mut self, method: &MethodDeclaration, buffer: &mut Vec<u8>) -> Result<()> {
        write_le(buffer, method.flags.bits());
        write_prefixed_string(buffer, &method.name)?;
        let mut signature = Vec::new();
        encode_method_signature(&method.signature(), &mut signature, &mut self.type_refs)?;
        write_blob(buffer, &signature)?;

        write_compressed_len(buffer, method.params.len())?;
        for param in &method.params {
            write_prefixed_string(buffer, &param.name)?;
        }

        self.write_attributes(&method.custom_attributes, buffer)?;

        match &method.body {
            Some(body) => {
                buffer.push(1);
                self.write_body(body, buffer)
            }
            None => {
                buffer.push(0);
                Ok(())
            }
        }
    }

    fn write_body(&mut self, body: &MethodBody, buffer: &mut Vec<u8>) -> Result<()> {
        write_le(buffer, body.max_stack);
        write_le(buffer, u8::from(body.init_locals));

        write_compressed_len(buffer, body.locals.len())?;
        for local in &body.locals {
            encode_type_sig(local, buffer, &mut self.type_refs)?;
        }

        let encoded = encode_body(&body.instructions, &mut *self)?;
        write_blob(buffer, &encoded.code)?;

        write_compressed_len(buffer, body.exception_handlers.len())?;
        for handler in &body.exception_handlers {
            let try_offset = encoded.offset_of(Some(handler.try_start))?;
            let try_end = encoded.offset_of(handler.try_end)?;
            let handler_offset = encoded.offset_of(Some(handler.handler_start))?;
            let handler_end = encoded.offset_of(handler.handler_end)?;

            let length = |start: u32, end: u32| {
                end.checked_sub(start).ok_or_else(|| {
                    malformed_error!("Exception clause ends before it starts at 0x{:04x}", start)
                })
            };

            write_le(buffer, handler.flags.bits());
            write_le(buffer, try_offset);
            write_le(buffer, length(try_offset, try_end)?);
            write_le(buffer, handler_offset);
            write_le(buffer, length(handler_offset, handler_end)?);
            self.write_type_row(handler.catch_type.as_ref(), buffer)?;
        }
        Ok(())
    }

    fn write_attributes(
        &mut self,
        attributes: &[CustomAttribute],
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        write_compressed_len(buffer, attributes.len())?;
        for attribute in attributes {
            write_compressed_uint(buffer, self.method_row(&attribute.constructor)?)?;
            write_compressed_len(buffer, attribute.arguments.len())?;
            for argument in &attribute.arguments {
                self.write_argument(argument, buffer)?;
            }
        }
        Ok(())
    }

    fn write_argument(&mut self, argument: &AttributeArgument, buffer: &mut Vec<u8>) -> Result<()> {
        match argument {
            AttributeArgument::Null => buffer.push(ARGUMENT_NULL),
            AttributeArgument::Bool(value) => {
                buffer.push(ELEMENT_TYPE::BOOLEAN);
                buffer.push(u8::from(*value));
            }
            AttributeArgument::Int32(value) => {
                buffer.push(ELEMENT_TYPE::I4);
                write_le(buffer, *value);
            }
            AttributeArgument::String(value) => {
                buffer.push(ELEMENT_TYPE::STRING);
                write_prefixed_string(buffer, value)?;
            }
            AttributeArgument::Type(type_ref) => {
                buffer.push(ARGUMENT_TYPE);
                self.write_type_row(Some(type_ref), buffer)?;
            }
            AttributeArgument::Array(elements) => {
                buffer.push(ELEMENT_TYPE::SZARRAY);
                write_compressed_len(buffer, elements.len())?;
                for element in elements {
                    self.write_argument(element, buffer)?;
                }
            }
        }
        Ok(())
    }
}

impl TokenAllocator for TableBuilder {
    fn method_token(&mut self, method: &MethodRef) -> Result<Token> {
        Token::from_parts(TABLE_MEMBER_REF, self.method_row(method)?)
    }

    fn field_token(&mut self, field: &FieldRef) -> Result<Token> {
        Token::from_parts(TABLE_MEMBER_REF, self.field_row(field)?)
    }

    fn type_token(&mut self, signature: &TypeSig) -> Result<Token> {
        let mut blob = Vec::new();
        encode_type_sig(signature, &mut blob, &mut self.type_refs)?;
        Token::from_parts(TABLE_TYPE_SPEC, self.type_specs.intern(blob)?)
    }

    fn string_token(&mut self, value: &str) -> Result<Token> {
        Token::from_parts(TABLE_USER_STRING, self.user_strings.intern(value.to_string())?)
    }
}

fn write_blob(buffer: &mut Vec<u8>, blob: &[u8]) -> Result<()> {
    write_compressed_len(buffer, blob.len())?;
    buffer.extend_from_slice(blob);
    Ok(())
}
