//! Discovery of hook methods and parsing of their patch annotations.
//!
//! A patch provider is a type implementing an interface whose name contains the configured
//! provider fragment. Every method of a provider that carries at least one patch annotation is a
//! hook; each patch annotation yields one [`PatchRequest`].

use std::fmt;

use crate::{
    metadata::{
        AttributeArgument, CustomAttribute, MethodDeclaration, MethodRef, Module, Parameter,
        TypeDeclaration, TypeRef,
    },
    patcher::config::HookConventions,
    Error, Result,
};

/// Where the hook runs relative to the original body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum HookKind {
    /// Before the original body, optionally skipping it
    #[strum(serialize = "prefix")]
    Prefix,
    /// After the original body, replacing its return
    #[strum(serialize = "postfix")]
    Postfix,
}

/// The positional arguments of one patch annotation: `(Type target, string method[, Type[] inject])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDeclaration {
    /// The type declaring the target method
    pub target_type: TypeRef,
    /// Name of the target method
    pub target_method: String,
    /// Types to inject into the target type
    pub inject_types: Vec<TypeRef>,
}

impl PatchDeclaration {
    /// Parses a patch annotation attached to `hook`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedPatchDeclaration`] if a required argument is missing or
    /// any argument has the wrong type.
    pub fn parse(attribute: &CustomAttribute, hook: &str) -> Result<PatchDeclaration> {
        let malformed = |reason: &str| Error::MalformedPatchDeclaration {
            hook: hook.to_string(),
            reason: reason.to_string(),
        };

        let target_type = attribute
            .arguments
            .first()
            .ok_or_else(|| malformed("missing target type"))?
            .as_type()
            .ok_or_else(|| malformed("target type argument is not a type"))?
            .clone();

        let target_method = attribute
            .arguments
            .get(1)
            .ok_or_else(|| malformed("missing target method name"))?
            .as_str()
            .ok_or_else(|| malformed("target method argument is not a string"))?
            .to_string();

        let inject_types = match attribute.arguments.get(2) {
            None | Some(AttributeArgument::Null) => Vec::new(),
            Some(AttributeArgument::Array(elements)) => elements
                .iter()
                .map(|element| {
                    element
                        .as_type()
                        .cloned()
                        .ok_or_else(|| malformed("injection list holds a non-type element"))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(malformed("injection argument is not a type array")),
        };

        if attribute.arguments.len() > 3 {
            return Err(malformed("too many arguments"));
        }

        Ok(PatchDeclaration {
            target_type,
            target_method,
            inject_types,
        })
    }
}

/// One hook to weave into one target method.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRequest {
    /// The type declaring the target method
    pub target_type: TypeRef,
    /// Name of the target method
    pub target_method: String,
    /// The hook method
    pub hook: MethodRef,
    /// Declared hook parameters, with names
    pub hook_parameters: Vec<Parameter>,
    /// `true` if the hook is static
    pub hook_is_static: bool,
    /// Where the hook runs
    pub kind: HookKind,
    /// Types to inject into the target type, deduplicated in declaration order
    pub inject_types: Vec<TypeRef>,
}

impl PatchRequest {
    /// `Namespace.Type::Method` of the target.
    #[must_use]
    pub fn target_name(&self) -> String {
        format!("{}::{}", self.target_type.full_name(), self.target_method)
    }

    /// `Namespace.Type::Method` of the hook.
    #[must_use]
    pub fn hook_name(&self) -> String {
        format!("{}::{}", self.hook.declaring_type.full_name(), self.hook.name)
    }
}

impl fmt::Display for PatchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.kind,
            self.hook_name(),
            self.target_name()
        )
    }
}

/// Outcome of parsing one patch annotation.
#[derive(Debug)]
pub struct ScannedHook {
    /// `Namespace.Type::Method` of the hook
    pub hook: String,
    /// The parsed request, or why the annotation could not be used
    pub request: Result<PatchRequest>,
}

/// Finds hooks in a module according to a set of naming conventions.
pub struct Scanner<'c> {
    conventions: &'c HookConventions,
}

impl<'c> Scanner<'c> {
    /// Creates a scanner using `conventions`.
    #[must_use]
    pub fn new(conventions: &'c HookConventions) -> Self {
        Scanner { conventions }
    }

    /// Returns `true` if `declaration` is a patch provider.
    #[must_use]
    pub fn is_provider(&self, declaration: &TypeDeclaration) -> bool {
        declaration.implements_interface_like(&self.conventions.provider_interface)
    }

    /// Scans every provider type of `module`, in declaration order.
    ///
    /// Annotations that cannot be parsed produce a [`ScannedHook`] carrying the error, so one
    /// broken hook never hides the others.
    #[must_use]
    pub fn scan(&self, module: &Module) -> Vec<ScannedHook> {
        let mut hooks = Vec::new();
        for (type_index, declaration) in module.types().iter().enumerate() {
            if !self.is_provider(declaration) {
                continue;
            }

            for method in &declaration.methods {
                let hook = format!("{}::{}", declaration.full_name(), method.name);
                for attribute in method.attributes(&self.conventions.patch_attribute) {
                    hooks.push(ScannedHook {
                        hook: hook.clone(),
                        request: self.request(module, type_index, declaration, method, attribute),
                    });
                }
            }
        }
        hooks
    }

    /// The hook kind selected by the annotations of `method`.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConflictingHookAnnotation`] if both kinds are present and
    /// [`crate::Error::MalformedPatchDeclaration`] if neither is.
    pub fn hook_kind(&self, method: &MethodDeclaration, hook: &str) -> Result<HookKind> {
        let prefix = method.attribute(&self.conventions.prefix_attribute).is_some();
        let postfix = method.attribute(&self.conventions.postfix_attribute).is_some();

        match (prefix, postfix) {
            (true, true) => Err(Error::ConflictingHookAnnotation(hook.to_string())),
            (true, false) => Ok(HookKind::Prefix),
            (false, true) => Ok(HookKind::Postfix),
            (false, false) => Err(Error::MalformedPatchDeclaration {
                hook: hook.to_string(),
                reason: format!(
                    "neither {} nor {} is present",
                    self.conventions.prefix_attribute, self.conventions.postfix_attribute
                ),
            }),
        }
    }

    fn request(
        &self,
        module: &Module,
        type_index: usize,
        declaration: &TypeDeclaration,
        method: &MethodDeclaration,
        attribute: &CustomAttribute,
    ) -> Result<PatchRequest> {
        let hook = format!("{}::{}", declaration.full_name(), method.name);
        let kind = self.hook_kind(method, &hook)?;
        let parsed = PatchDeclaration::parse(attribute, &hook)?;

        let mut inject_types = Vec::new();
        let annotated = method
            .attributes(&self.conventions.inject_attribute)
            .chain(declaration.attributes(&self.conventions.inject_attribute));
        let extra = annotated
            .map(|attribute| self.inject_type(attribute, &hook))
            .collect::<Result<Vec<_>>>()?;

        for type_ref in parsed.inject_types.into_iter().chain(extra) {
            if !inject_types.contains(&type_ref) {
                inject_types.push(type_ref);
            }
        }

        Ok(PatchRequest {
            target_type: parsed.target_type,
            target_method: parsed.target_method,
            hook: method.reference(module.type_ref(type_index)?),
            hook_parameters: method.params.clone(),
            hook_is_static: method.is_static(),
            kind,
            inject_types,
        })
    }

    fn inject_type(&self, attribute: &CustomAttribute, hook: &str) -> Result<TypeRef> {
        match attribute.arguments.as_slice() {
            [AttributeArgument::Type(type_ref)] => Ok(type_ref.clone()),
            _ => Err(Error::MalformedPatchDeclaration {
                hook: hook.to_string(),
                reason: format!(
                    "{} expects a single type argument",
                    self.conventions.inject_attribute
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{MethodAttributes, TypeSig},
        test::{attribute, hook_method, provider_type},
    };

    fn player() -> TypeRef {
        TypeRef::new("Game", "Game", "Player")
    }

    fn patch(arguments: Vec<AttributeArgument>) -> CustomAttribute {
        attribute("CrossPatchAttribute", arguments)
    }

    #[test]
    fn parse_declaration() {
        let declaration = PatchDeclaration::parse(
            &patch(vec![
                AttributeArgument::Type(player()),
                AttributeArgument::String("Jump".into()),
                AttributeArgument::Array(vec![AttributeArgument::Type(TypeRef::new(
                    "Game", "Game", "Inventory",
                ))]),
            ]),
            "Hooks.JumpHook::Before",
        )
        .unwrap();

        assert_eq!(declaration.target_type, player());
        assert_eq!(declaration.target_method, "Jump");
        assert_eq!(declaration.inject_types.len(), 1);
    }

    #[test]
    fn parse_rejects_bad_arguments() {
        let cases = [
            vec![],
            vec![AttributeArgument::Type(player())],
            vec![
                AttributeArgument::String("Player".into()),
                AttributeArgument::String("Jump".into()),
            ],
            vec![
                AttributeArgument::Type(player()),
                AttributeArgument::String("Jump".into()),
                AttributeArgument::Int32(1),
            ],
            vec![
                AttributeArgument::Type(player()),
                AttributeArgument::String("Jump".into()),
                AttributeArgument::Array(vec![AttributeArgument::Null]),
            ],
        ];

        for arguments in cases {
            assert!(matches!(
                PatchDeclaration::parse(&patch(arguments), "Hook"),
                Err(Error::MalformedPatchDeclaration { .. })
            ));
        }
    }

    #[test]
    fn scan_collects_requests() {
        let inventory = TypeRef::new("Game", "Game", "Inventory");
        let wallet = TypeRef::new("Game", "Game", "Wallet");

        let method = hook_method(
            "Before",
            vec![Parameter::new("x", TypeSig::I4)],
            TypeSig::Boolean,
        )
        .with_attribute(patch(vec![
            AttributeArgument::Type(player()),
            AttributeArgument::String("Jump".into()),
            AttributeArgument::Array(vec![AttributeArgument::Type(inventory.clone())]),
        ]))
        .with_attribute(patch(vec![
            AttributeArgument::Type(player()),
            AttributeArgument::String("Land".into()),
        ]))
        .with_attribute(attribute("CrossPrefixAttribute", vec![]))
        .with_attribute(attribute(
            "CrossInjectAttribute",
            vec![AttributeArgument::Type(inventory.clone())],
        ));

        let mut provider = provider_type("JumpHooks", vec![method]);
        provider.custom_attributes.push(attribute(
            "CrossInjectAttribute",
            vec![AttributeArgument::Type(wallet.clone())],
        ));

        let mut module = Module::new("Hooks");
        module.add_type(provider);
        let mut bystander = TypeDeclaration::new("Hooks", "NotAProvider");
        bystander.methods.push(
            hook_method("Ignored", vec![], TypeSig::Void)
                .with_attribute(attribute("CrossPrefixAttribute", vec![])),
        );
        module.add_type(bystander);

        let conventions = HookConventions::default();
        let hooks = Scanner::new(&conventions).scan(&module);
        assert_eq!(hooks.len(), 2);

        let first = hooks[0].request.as_ref().unwrap();
        assert_eq!(hooks[0].hook, "Hooks.JumpHooks::Before");
        assert_eq!(first.kind, HookKind::Prefix);
        assert_eq!(first.target_name(), "Game.Player::Jump");
        assert_eq!(first.inject_types, vec![inventory.clone(), wallet.clone()]);
        assert_eq!(first.hook.declaring_type.scope, "Hooks");
        assert!(first.hook_is_static);

        let second = hooks[1].request.as_ref().unwrap();
        assert_eq!(second.target_method, "Land");
        assert_eq!(second.inject_types, vec![inventory, wallet]);
    }

    #[test]
    fn scan_reports_bad_hooks() {
        let target = vec![
            AttributeArgument::Type(player()),
            AttributeArgument::String("Jump".into()),
        ];
        let both = hook_method("Both", vec![], TypeSig::Void)
            .with_attribute(patch(target.clone()))
            .with_attribute(attribute("CrossPrefixAttribute", vec![]))
            .with_attribute(attribute("CrossPostfixAttribute", vec![]));
        let neither = hook_method("Neither", vec![], TypeSig::Void)
            .with_attribute(patch(target.clone()));
        let mut instance = hook_method("Fine", vec![], TypeSig::Void)
            .with_attribute(patch(target))
            .with_attribute(attribute("CrossPostfixAttribute", vec![]));
        instance.flags.remove(MethodAttributes::STATIC);

        let mut module = Module::new("Hooks");
        module.add_type(provider_type("Broken", vec![both, neither, instance]));

        let conventions = HookConventions::default();
        let hooks = Scanner::new(&conventions).scan(&module);
        assert_eq!(hooks.len(), 3);
        assert!(matches!(
            hooks[0].request,
            Err(Error::ConflictingHookAnnotation(ref hook)) if hook == "Hooks.Broken::Both"
        ));
        assert!(matches!(
            hooks[1].request,
            Err(Error::MalformedPatchDeclaration { .. })
        ));
        let fine = hooks[2].request.as_ref().unwrap();
        assert_eq!(fine.kind, HookKind::Postfix);
        assert!(!fine.hook_is_static);
    }
}
