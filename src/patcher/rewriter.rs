//! Weaving of hook calls into target method bodies.
//!
//! # Postfix
//!
//! The trailing `ret` of the target is replaced by
//!
//! ```text
//! pop                     ; only if the target returns a value
//! ldarg 0 .. ldarg N-1    ; one per hook parameter
//! call  hook
//! ret
//! ```
//!
//! so the hook runs last and its return value becomes the method's return value. Branches to the
//! old `ret` land on the first appended instruction.
//!
//! # Prefix
//!
//! Code is inserted ahead of the first instruction:
//!
//! ```text
//! [ldc.i4.1; newarr T; ldc.i4.0; ldelema T; stloc L]  ; by-ref return with a result slot
//! <hook arguments>                                    ; ldloca L / ldloc L for __result
//! call  hook
//! brtrue first; [ldloc L]; ret                        ; hook returns bool
//! pop                                                 ; hook returns another value
//! ```
//!
//! Branches to the original first instruction keep targeting it.
//!
//! # Unchecked mode
//!
//! With signature checks disabled a hook is woven without comparing its parameters or return
//! type to the target. The woven body must still keep the evaluation stack balanced on every
//! path; a body that does not is rejected with [`crate::Error::InvalidMethodBody`].

use log::debug;

use crate::{
    assembly::{
        load_argument, load_int32, load_local, load_local_address, store_local, OpCode, Operand,
    },
    metadata::{MethodBody, MethodDeclaration, Parameter, TypeRef, TypeSig},
    patcher::{
        config::HookConventions,
        scanner::{HookKind, PatchRequest},
    },
    Error, Result,
};

/// Synthesises hook calls in target method bodies.
pub struct Rewriter<'c> {
    conventions: &'c HookConventions,
    verify_signatures: bool,
}

impl<'c> Rewriter<'c> {
    /// Creates a rewriter; `verify_signatures` enables the hook/target compatibility checks.
    #[must_use]
    pub fn new(conventions: &'c HookConventions, verify_signatures: bool) -> Self {
        Rewriter {
            conventions,
            verify_signatures,
        }
    }

    /// Weaves the hook of `request` into `target`, declared by `declaring_type`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SignatureMismatch`] if the hook does not fit the target and
    /// [`crate::Error::InvalidMethodBody`] if the body cannot host the hook. The target is left
    /// unchanged on error.
    pub fn rewrite(
        &self,
        target: &mut MethodDeclaration,
        declaring_type: &TypeRef,
        request: &PatchRequest,
    ) -> Result<()> {
        let context = Context {
            conventions: self.conventions,
            target: &*target,
            declaring_type,
            request,
        };

        if self.verify_signatures {
            context.verify()?;
        }

        let body = match request.kind {
            HookKind::Prefix => context.prefix()?,
            HookKind::Postfix => context.postfix()?,
        };

        target.body = Some(body);
        debug!("Wove {request}");
        Ok(())
    }
}

/// One hook/target pair being woven.
struct Context<'a> {
    conventions: &'a HookConventions,
    target: &'a MethodDeclaration,
    declaring_type: &'a TypeRef,
    request: &'a PatchRequest,
}

impl Context<'_> {
    fn postfix(&self) -> Result<MethodBody> {
        let mut body = self.body()?;
        let old_return = match body.instructions.last() {
            Some(last) if last.opcode == OpCode::Ret => last.id,
            _ => return Err(self.invalid_body("the last instruction is not ret")),
        };

        if self.target.returns_value() {
            body.instructions.push(OpCode::Pop, Operand::None);
        }
        for index in 0..self.request.hook_parameters.len() {
            let (opcode, operand) = load_argument(self.argument_slot(index)?);
            body.instructions.push(opcode, operand);
        }
        body.instructions
            .push(OpCode::Call, Operand::Method(self.request.hook.clone()));
        body.instructions.push(OpCode::Ret, Operand::None);

        body.remove_instruction(old_return)?;
        self.finish(body)
    }

    fn prefix(&self) -> Result<MethodBody> {
        let mut body = self.body()?;
        let first = body
            .instructions
            .first()
            .map(|instruction| instruction.id)
            .ok_or_else(|| self.invalid_body("the body has no instructions"))?;

        let has_result = self.result_parameter().is_some();
        if has_result && !self.target.returns_value() {
            return Err(self.mismatch(format!(
                "{} on a method returning void",
                self.conventions.result_parameter
            )));
        }

        let hook_returns_bool = is_boolean(&self.request.hook.signature.return_type);
        let result_local = if has_result || (hook_returns_bool && self.target.returns_value()) {
            Some(body.add_local(self.target.return_type.clone())?)
        } else {
            None
        };

        let mut code: Vec<(OpCode, Operand)> = Vec::new();
        let by_ref_return = self.target.return_type.by_ref_target();

        if let (Some(local), Some(element)) = (result_local, by_ref_return) {
            code.push(load_int32(1));
            code.push((OpCode::NewArr, Operand::Type(element.clone())));
            code.push(load_int32(0));
            code.push((OpCode::LdElema, Operand::Type(element.clone())));
            code.push(store_local(local));
        }

        let mut position = 0;
        for param in &self.request.hook_parameters {
            match result_local {
                Some(local) if self.is_result(param) => {
                    if by_ref_return.is_some() {
                        code.push(load_local(local));
                    } else {
                        code.push(load_local_address(local));
                    }
                }
                _ => {
                    code.push(load_argument(self.argument_slot(position)?));
                    position += 1;
                }
            }
        }

        code.push((OpCode::Call, Operand::Method(self.request.hook.clone())));

        if hook_returns_bool {
            code.push((OpCode::BrTrueS, Operand::Target(first)));
            if let Some(local) = result_local {
                code.push(load_local(local));
            }
            code.push((OpCode::Ret, Operand::None));
        } else if !self.request.hook.signature.return_type.is_void() {
            code.push((OpCode::Pop, Operand::None));
        }

        for (opcode, operand) in code {
            body.instructions.insert_before(first, opcode, operand)?;
        }
        self.finish(body)
    }

    /// Checks that the hook can be called with the arguments the woven code passes.
    fn verify(&self) -> Result<()> {
        if !self.request.hook_is_static {
            return Err(self.mismatch("the hook is not static".to_string()));
        }

        let instance = &self.conventions.instance_parameter;
        for (index, param) in self.request.hook_parameters.iter().enumerate() {
            if param.name == *instance && index != 0 {
                return Err(self.mismatch(format!("{instance} must be the first parameter")));
            }
            if param.name == *instance && self.target.is_static() {
                return Err(self.mismatch(format!("{instance} on a static method")));
            }
        }

        let mut position = 0;
        for param in &self.request.hook_parameters {
            if self.request.kind == HookKind::Prefix && self.is_result(param) {
                self.verify_result(param)?;
                continue;
            }

            if position >= self.target.arg_count() {
                return Err(self.mismatch(format!(
                    "the hook takes more arguments than the {} of the target",
                    self.target.arg_count()
                )));
            }
            if !self.fits_argument(position, &param.param_type) {
                return Err(self.mismatch(format!(
                    "parameter '{}' of type {} does not match argument {}",
                    param.name, param.param_type, position
                )));
            }
            position += 1;
        }

        let hook_return = &self.request.hook.signature.return_type;
        if self.request.kind == HookKind::Postfix && *hook_return != self.target.return_type {
            return Err(self.mismatch(format!(
                "the hook returns {} but the target returns {}",
                hook_return, self.target.return_type
            )));
        }
        Ok(())
    }

    fn verify_result(&self, param: &Parameter) -> Result<()> {
        let return_type = &self.target.return_type;
        if return_type.is_void() {
            return Err(self.mismatch(format!(
                "{} on a method returning void",
                self.conventions.result_parameter
            )));
        }

        let expected = if return_type.is_by_ref() {
            return_type.clone()
        } else {
            return_type.clone().into_by_ref()
        };
        if param.param_type != expected {
            return Err(self.mismatch(format!(
                "{} is {} but must be {}",
                param.name, param.param_type, expected
            )));
        }
        Ok(())
    }

    /// Returns `true` if a hook parameter of type `hook_type` can receive target argument
    /// `position`.
    fn fits_argument(&self, position: usize, hook_type: &TypeSig) -> bool {
        if !self.target.is_static() {
            if position == 0 {
                return self.fits_receiver(hook_type);
            }
            return self
                .target
                .params
                .get(position - 1)
                .is_some_and(|param| param.param_type == *hook_type);
        }

        self.target
            .params
            .get(position)
            .is_some_and(|param| param.param_type == *hook_type)
    }

    fn fits_receiver(&self, hook_type: &TypeSig) -> bool {
        let declared = |sig: &TypeSig| sig.type_ref() == Some(self.declaring_type);
        match hook_type {
            TypeSig::Object => true,
            TypeSig::ByRef(inner) => declared(inner),
            other => declared(other),
        }
    }

    fn result_parameter(&self) -> Option<&Parameter> {
        self.request
            .hook_parameters
            .iter()
            .find(|param| self.is_result(param))
    }

    fn is_result(&self, param: &Parameter) -> bool {
        param.name == self.conventions.result_parameter && param.param_type.is_by_ref()
    }

    fn argument_slot(&self, position: usize) -> Result<u16> {
        u16::try_from(position)
            .map_err(|_| self.invalid_body(&format!("argument {position} is out of range")))
    }

    fn body(&self) -> Result<MethodBody> {
        self.target
            .body
            .clone()
            .ok_or_else(|| self.invalid_body("the method has no body"))
    }

    fn finish(&self, mut body: MethodBody) -> Result<MethodBody> {
        body.update_max_stack(self.target.returns_value())
            .map_err(|error| match error {
                Error::Malformed { message, .. } => self.invalid_body(&message),
                other => self.invalid_body(&other.to_string()),
            })?;
        Ok(body)
    }

    fn target_name(&self) -> String {
        format!("{}::{}", self.declaring_type.full_name(), self.target.name)
    }

    fn invalid_body(&self, reason: &str) -> Error {
        Error::InvalidMethodBody {
            method: self.target_name(),
            reason: reason.to_string(),
        }
    }

    fn mismatch(&self, reason: String) -> Error {
        Error::SignatureMismatch {
            hook: self.request.hook_name(),
            target: self.target_name(),
            reason,
        }
    }
}

/// `bool`, or a class or value type named `Boolean` in any case.
fn is_boolean(signature: &TypeSig) -> bool {
    match signature {
        TypeSig::Boolean => true,
        TypeSig::Class(type_ref) | TypeSig::ValueType(type_ref) => {
            type_ref.name.eq_ignore_ascii_case("boolean")
        }
        _ => false,
    }
}
