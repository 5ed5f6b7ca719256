//! The patching pipeline.
//!
//! A [`Patcher`] scans hook modules for patch providers, then processes every resulting
//! [`PatchRequest`] in isolation:
//!
//! 1. resolve the target type and method, opening their module on demand
//! 2. inject one marker-annotated field per injection type
//! 3. weave the hook call into the target body
//! 4. commit every modified module to disk and release all module handles
//!
//! A request that fails at any step leaves the files on disk untouched and is reported as a
//! [`Diagnostic`]; later requests still run.
//!
//! # Key Types
//! - [`Patcher`] - Runs the pipeline over a set of hook modules
//! - [`PatchConfig`] / [`HookConventions`] - Where modules live and how hooks are recognised
//! - [`PatchReport`] - Applied patches, per-request diagnostics and written files
//! - [`ModuleStore`] - Per-request cache of open modules with all-or-nothing commit
//! - [`Scanner`] / [`PatchRequest`] - Hook discovery and parsed patch annotations
//! - [`Rewriter`] - Prefix and postfix code synthesis
//!
//! # Examples
//!
//! ```rust,no_run
//! use crosspatch::{PatchConfig, Patcher};
//!
//! let config = PatchConfig::new("build/Managed", "Zenject-usage.dll");
//! let report = Patcher::new(config).run(&["Mod.Hooks.dll".into()])?;
//!
//! for patch in &report.applied {
//!     println!("{} {} -> {}", patch.kind, patch.hook, patch.target);
//! }
//! for diagnostic in &report.diagnostics {
//!     eprintln!("{}: {}", diagnostic.subject, diagnostic.error);
//! }
//! # Ok::<(), crosspatch::Error>(())
//! ```

mod config;
mod injector;
mod resolver;
mod rewriter;
mod scanner;
mod store;

pub use config::{HookConventions, PatchConfig};
pub use injector::{inject_field, injected_field_name};
pub use resolver::{ResolvedField, ResolvedMethod, ResolvedType, Resolver};
pub use rewriter::Rewriter;
pub use scanner::{HookKind, PatchDeclaration, PatchRequest, ScannedHook, Scanner};
pub use store::ModuleStore;

use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::{
    metadata::{MethodRef, Module},
    Error, Result,
};

/// A patch that was woven and, unless in dry-run mode, written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatch {
    /// `Namespace.Type::Method` of the hook
    pub hook: String,
    /// `Namespace.Type::Method` of the target
    pub target: String,
    /// Where the hook runs
    pub kind: HookKind,
    /// Names of the fields added to the target type
    pub injected_fields: Vec<String>,
}

/// A hook module or patch request that could not be processed.
#[derive(Debug)]
pub struct Diagnostic {
    /// The hook module path or the `hook -> target` pair
    pub subject: String,
    /// Why processing failed
    pub error: Error,
}

/// Outcome of a [`Patcher::run`].
#[derive(Debug, Default)]
pub struct PatchReport {
    /// Successfully applied patches, in processing order
    pub applied: Vec<AppliedPatch>,
    /// Failures, in processing order
    pub diagnostics: Vec<Diagnostic>,
    /// Module files that were overwritten
    pub written: Vec<PathBuf>,
}

impl PatchReport {
    /// Returns `true` if no diagnostic was reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Drives scanning, resolution, injection, rewriting and persistence.
pub struct Patcher {
    config: PatchConfig,
}

impl Patcher {
    /// Creates a patcher for `config`.
    #[must_use]
    pub fn new(config: PatchConfig) -> Self {
        Patcher { config }
    }

    /// The configuration of this patcher.
    #[must_use]
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Applies every patch declared in `hook_modules`.
    ///
    /// Relative hook module paths are resolved against the module root. Per-module and
    /// per-request failures are collected in the returned report.
    ///
    /// # Errors
    /// Returns an error only if the injection marker constructor cannot be located in the
    /// framework module, in which case nothing is patched.
    pub fn run(&self, hook_modules: &[PathBuf]) -> Result<PatchReport> {
        let marker = self.marker_constructor()?;
        let mut report = PatchReport::default();

        for path in hook_modules {
            let path = self.config.resolve_path(path);
            let module = match Module::from_file(&path) {
                Ok(module) => module,
                Err(error) => {
                    warn!("Skipping hook module {}: {}", path.display(), error);
                    report.diagnostics.push(Diagnostic {
                        subject: path.display().to_string(),
                        error: Error::ModuleNotFound {
                            path: path.clone(),
                            reason: error.to_string(),
                        },
                    });
                    continue;
                }
            };

            let scanner = Scanner::new(self.config.conventions());
            let hooks = scanner.scan(&module);
            info!("Found {} patch declarations in '{}'", hooks.len(), module.name());

            for scanned in hooks {
                match scanned.request {
                    Ok(request) => self.process(&request, &marker, &mut report),
                    Err(error) => {
                        warn!("Ignoring hook {}: {}", scanned.hook, error);
                        report.diagnostics.push(Diagnostic {
                            subject: scanned.hook,
                            error,
                        });
                    }
                }
            }
        }

        info!(
            "Applied {} patches, {} diagnostics, {} files written",
            report.applied.len(),
            report.diagnostics.len(),
            report.written.len()
        );
        Ok(report)
    }

    /// Applies a single request with a fresh module store.
    ///
    /// On success the modified modules are committed (unless in dry-run mode) and their paths
    /// returned alongside the applied patch. All modules are released either way.
    ///
    /// # Errors
    /// Returns the first error raised while resolving, injecting, rewriting or committing; no
    /// file is written in that case.
    pub fn apply(
        &self,
        request: &PatchRequest,
        marker: &MethodRef,
    ) -> Result<(AppliedPatch, Vec<PathBuf>)> {
        let mut store = ModuleStore::new();
        let result = self.weave(&mut store, request, marker).and_then(|applied| {
            if self.config.is_dry_run() {
                debug!("Dry run, not writing {:?}", store.dirty_paths());
                Ok((applied, Vec::new()))
            } else {
                store.commit().map(|written| (applied, written))
            }
        });

        let released = store.release_all();
        debug!("Released {released} modules after {request}");
        result
    }

    /// Locates the constructor of the configured marker attribute in the framework module.
    ///
    /// # Errors
    /// Returns [`crate::Error::ModuleNotFound`] or [`crate::Error::DeclarationNotFound`] if the
    /// framework module, the attribute type or its constructor is missing.
    pub fn marker_constructor(&self) -> Result<MethodRef> {
        let path = self.config.framework_module();
        let mut store = ModuleStore::new();
        let module = store.open(&path)?;

        let type_index = module.find_type(self.config.marker_attribute())?;
        let ctor_index = module.find_constructor(type_index)?;
        let marker = module
            .method_at(type_index, ctor_index)?
            .reference(module.type_ref(type_index)?);

        debug!("Using marker {} from {}", marker, path.display());
        Ok(marker)
    }

    fn process(&self, request: &PatchRequest, marker: &MethodRef, report: &mut PatchReport) {
        match self.apply(request, marker) {
            Ok((applied, written)) => {
                info!("Applied {request}");
                report.applied.push(applied);
                for path in written {
                    if !report.written.contains(&path) {
                        report.written.push(path);
                    }
                }
            }
            Err(error) => {
                error!("Failed to apply {request}: {error}");
                report.diagnostics.push(Diagnostic {
                    subject: format!("{} -> {}", request.hook_name(), request.target_name()),
                    error,
                });
            }
        }
    }

    fn weave(
        &self,
        store: &mut ModuleStore,
        request: &PatchRequest,
        marker: &MethodRef,
    ) -> Result<AppliedPatch> {
        let resolver = Resolver::new(&self.config);
        let target_type = resolver.resolve_type(store, &request.target_type)?;
        let target = resolver.resolve_method(store, &target_type, &request.target_method)?;

        let mut injected_fields = Vec::new();
        for injected in &request.inject_types {
            if let Some(name) = inject_field(store, &resolver, &target_type, injected, marker)? {
                injected_fields.push(name);
            }
        }

        let rewriter = Rewriter::new(self.config.conventions(), self.config.verifies_signatures());
        let module = store.module_mut(&target.module_path)?;
        rewriter.rewrite(
            module.method_mut(target.type_index, target.method_index)?,
            &target_type.type_ref,
            request,
        )?;
        module.import_scope(&request.hook.declaring_type.scope);

        Ok(AppliedPatch {
            hook: request.hook_name(),
            target: request.target_name(),
            kind: request.kind,
            injected_fields,
        })
    }
}
