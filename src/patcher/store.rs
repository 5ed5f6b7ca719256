//! Path-keyed cache of open modules.
//!
//! A [`ModuleStore`] lives for the processing window of one patch request. Every module the
//! request touches is opened once through the store, mutated in place and written back by
//! [`ModuleStore::commit`] before the store releases it.

use std::{
    collections::HashMap,
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{metadata::Module, Error, Result};

/// Open modules of one patch request, keyed by file path.
#[derive(Debug, Default)]
pub struct ModuleStore {
    modules: HashMap<PathBuf, Module>,
}

impl ModuleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        ModuleStore::default()
    }

    /// Opens the module at `path`, or returns the already open one.
    ///
    /// # Errors
    /// Returns [`crate::Error::ModuleNotFound`] if the file does not exist or does not decode as
    /// a module image.
    pub fn open(&mut self, path: &Path) -> Result<&mut Module> {
        if !self.modules.contains_key(path) {
            let module = Module::from_file(path).map_err(|error| Error::ModuleNotFound {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;
            debug!("Opened module '{}' from {}", module.name(), path.display());
            self.modules.insert(path.to_path_buf(), module);
        }

        self.module_mut(path)
    }

    /// Returns `true` if the module at `path` is open.
    #[must_use]
    pub fn is_open(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    /// The open module at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::ModuleNotFound`] if the module is not open.
    pub fn module(&self, path: &Path) -> Result<&Module> {
        self.modules.get(path).ok_or_else(|| not_open(path))
    }

    /// The open module at `path`, mutably.
    ///
    /// # Errors
    /// Returns [`crate::Error::ModuleNotFound`] if the module is not open.
    pub fn module_mut(&mut self, path: &Path) -> Result<&mut Module> {
        self.modules.get_mut(path).ok_or_else(|| not_open(path))
    }

    /// Paths of the open modules that were modified, in path order.
    #[must_use]
    pub fn dirty_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .modules
            .iter()
            .filter(|(_, module)| module.is_dirty())
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Writes the module at `path` back to its file, overwriting it.
    ///
    /// # Errors
    /// Returns [`crate::Error::ModuleNotFound`] if the module is not open and
    /// [`crate::Error::WriteError`] if it cannot be encoded or written.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let module = self.module_mut(path)?;
        let image = encode(module, path)?;
        fs::write(path, image).map_err(|source| Error::WriteError {
            path: path.to_path_buf(),
            source,
        })?;

        module.mark_clean();
        debug!("Saved module '{}' to {}", module.name(), path.display());
        Ok(())
    }

    /// Writes every modified module back to its file, all or nothing.
    ///
    /// Every image is encoded and written to a sibling temporary file before any original is
    /// touched. Each original is then moved to a sibling backup and replaced by its staged
    /// image. If any step fails, the replaced files are restored from their backups and the
    /// temporary files are removed, so no original file changes. Returns the paths that were
    /// written.
    ///
    /// # Errors
    /// Returns [`crate::Error::WriteError`] naming the module that failed.
    pub fn commit(&mut self) -> Result<Vec<PathBuf>> {
        let paths = self.dirty_paths();

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(paths.len());
        for path in &paths {
            let staging = sibling(path, "tmp");
            let result = self
                .module(path)
                .and_then(|module| encode(module, path))
                .and_then(|image| {
                    fs::write(&staging, image).map_err(|source| Error::WriteError {
                        path: path.clone(),
                        source,
                    })
                });

            if let Err(error) = result {
                discard(&staged);
                let _ = fs::remove_file(&staging);
                return Err(error);
            }
            staged.push((path.clone(), staging));
        }

        let mut replaced: Vec<Replacement> = Vec::with_capacity(staged.len());
        for (index, (path, staging)) in staged.iter().enumerate() {
            match replace(path, staging) {
                Ok(replacement) => replaced.push(replacement),
                Err(source) => {
                    rollback(&replaced);
                    discard(&staged[index..]);
                    return Err(Error::WriteError {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }

        for replacement in &replaced {
            if let Some(backup) = &replacement.backup {
                if let Err(error) = fs::remove_file(backup) {
                    warn!("Failed to remove backup {}: {}", backup.display(), error);
                }
            }
        }

        for path in &paths {
            if let Some(module) = self.modules.get_mut(path) {
                module.mark_clean();
                debug!("Committed module '{}' to {}", module.name(), path.display());
            }
        }
        Ok(paths)
    }

    /// Releases the module at `path`, discarding unsaved changes. Returns `true` if it was open.
    pub fn release(&mut self, path: &Path) -> bool {
        match self.modules.remove(path) {
            Some(module) => {
                if module.is_dirty() {
                    warn!(
                        "Released module '{}' with unsaved changes",
                        module.name()
                    );
                }
                debug!("Released module {}", path.display());
                true
            }
            None => false,
        }
    }

    /// Releases every open module and returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let paths: Vec<PathBuf> = self.modules.keys().cloned().collect();
        paths.iter().filter(|path| self.release(path)).count()
    }

    /// Number of open modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no module is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn not_open(path: &Path) -> Error {
    Error::ModuleNotFound {
        path: path.to_path_buf(),
        reason: "module is not open".to_string(),
    }
}

fn encode(module: &Module, path: &Path) -> Result<Vec<u8>> {
    module.to_bytes().map_err(|error| Error::WriteError {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, error.to_string()),
    })
}

/// A module file that was swapped for its staged image.
struct Replacement {
    path: PathBuf,
    backup: Option<PathBuf>,
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Moves the original at `path` aside and renames `staging` over it. A failed swap leaves the
/// original in place.
fn replace(path: &Path, staging: &Path) -> io::Result<Replacement> {
    let backup = if path.exists() {
        let backup = sibling(path, "bak");
        fs::rename(path, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(error) = fs::rename(staging, path) {
        if let Some(backup) = &backup {
            let _ = fs::rename(backup, path);
        }
        return Err(error);
    }

    Ok(Replacement {
        path: path.to_path_buf(),
        backup,
    })
}

fn rollback(replaced: &[Replacement]) {
    for replacement in replaced.iter().rev() {
        let restored = match &replacement.backup {
            Some(backup) => fs::rename(backup, &replacement.path),
            None => fs::remove_file(&replacement.path),
        };
        if let Err(error) = restored {
            warn!(
                "Failed to restore {}: {}",
                replacement.path.display(),
                error
            );
        }
    }
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (_, staging) in staged {
        let _ = fs::remove_file(staging);
    }
}
