//! Patch run configuration.

use std::path::{Path, PathBuf};

/// Names used to recognise patch providers, hook annotations and special hook parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConventions {
    /// Fragment of the interface name that marks a patch-provider type
    pub provider_interface: String,
    /// Annotation declaring the patch target: `(Type, string[, Type[]])`
    pub patch_attribute: String,
    /// Annotation selecting prefix weaving
    pub prefix_attribute: String,
    /// Annotation selecting postfix weaving
    pub postfix_attribute: String,
    /// Annotation adding an injection type: `(Type)`
    pub inject_attribute: String,
    /// Name of the by-reference hook parameter receiving the result slot
    pub result_parameter: String,
    /// Name of the hook parameter receiving the target's receiver
    pub instance_parameter: String,
}

impl Default for HookConventions {
    fn default() -> Self {
        HookConventions {
            provider_interface: "ICrossPatch".to_string(),
            patch_attribute: "CrossPatchAttribute".to_string(),
            prefix_attribute: "CrossPrefixAttribute".to_string(),
            postfix_attribute: "CrossPostfixAttribute".to_string(),
            inject_attribute: "CrossInjectAttribute".to_string(),
            result_parameter: "__result".to_string(),
            instance_parameter: "__instance".to_string(),
        }
    }
}

/// Configuration of a [`crate::Patcher`] run.
///
/// # Examples
///
/// ```rust
/// use crosspatch::PatchConfig;
///
/// let config = PatchConfig::new("build/Managed", "Zenject-usage.dll")
///     .with_marker_attribute("InjectAttribute")
///     .dry_run(true);
///
/// assert_eq!(
///     config.module_path("Game"),
///     std::path::Path::new("build/Managed").join("Game.dll")
/// );
/// assert!(config.is_dry_run());
/// ```
#[derive(Debug, Clone)]
pub struct PatchConfig {
    root: PathBuf,
    framework_module: PathBuf,
    extension: String,
    marker_attribute: String,
    conventions: HookConventions,
    verify_signatures: bool,
    dry_run: bool,
}

impl PatchConfig {
    /// Creates a configuration for modules under `root`.
    ///
    /// `framework_module` supplies the injection marker attribute; relative paths are resolved
    /// against `root`.
    pub fn new(root: impl Into<PathBuf>, framework_module: impl Into<PathBuf>) -> Self {
        PatchConfig {
            root: root.into(),
            framework_module: framework_module.into(),
            extension: "dll".to_string(),
            marker_attribute: "InjectAttribute".to_string(),
            conventions: HookConventions::default(),
            verify_signatures: true,
            dry_run: false,
        }
    }

    /// Sets the module file extension (default `dll`).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the name of the injection marker attribute type (default `InjectAttribute`).
    #[must_use]
    pub fn with_marker_attribute(mut self, name: impl Into<String>) -> Self {
        self.marker_attribute = name.into();
        self
    }

    /// Replaces the hook naming conventions.
    #[must_use]
    pub fn with_conventions(mut self, conventions: HookConventions) -> Self {
        self.conventions = conventions;
        self
    }

    /// Enables or disables hook/target signature checks (default enabled).
    #[must_use]
    pub fn verify_signatures(mut self, enabled: bool) -> Self {
        self.verify_signatures = enabled;
        self
    }

    /// Enables or disables dry-run mode, which patches in memory without writing files.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// The module root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the framework module.
    #[must_use]
    pub fn framework_module(&self) -> PathBuf {
        self.resolve_path(&self.framework_module)
    }

    /// The module file extension.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Name of the injection marker attribute type.
    #[must_use]
    pub fn marker_attribute(&self) -> &str {
        &self.marker_attribute
    }

    /// The hook naming conventions.
    #[must_use]
    pub fn conventions(&self) -> &HookConventions {
        &self.conventions
    }

    /// Returns `true` if signature checks are enabled.
    #[must_use]
    pub fn verifies_signatures(&self) -> bool {
        self.verify_signatures
    }

    /// Returns `true` in dry-run mode.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// File of the module named `scope`: `<root>/<scope>.<extension>`.
    #[must_use]
    pub fn module_path(&self, scope: &str) -> PathBuf {
        self.root.join(format!("{scope}.{}", self.extension))
    }

    /// Resolves `path` against the module root unless it is absolute.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
