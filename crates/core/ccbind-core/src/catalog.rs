//! Discovery of toolchains and libraries under a dependency root.
//!
//! The catalog is a read-only view of this layout:
//!
//! ```text
//! <deps-root>/
//!   toolchains/<name>/cc/       compiler descriptor dir (config script, bin/)
//!   toolchains/<name>/deps/     gcc, gcc-lib, libc, libc-dev, binutils (each optional)
//!   libs/<name>                 shared artifact dir
//!   libs/<name>_<toolchain>     per-toolchain artifact dir
//! ```
//!
//! Listing a directory that does not exist is an error, not an empty
//! result: a missing root is a misconfiguration, while an empty one simply
//! has nothing in it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ResolveError, Result};
use crate::ident::ToolchainId;

/// File name of a build descriptor.
pub const BUILD_DESCRIPTOR: &str = "BUILD.bazel";

/// File name of a toolchain config script.
pub const CONFIG_SCRIPT: &str = "cc_toolchain_config.bzl";

/// Runtime dependency entries a toolchain may provide under `deps/`.
pub const TOOLCHAIN_DEPS: &[&str] = &["gcc", "gcc-lib", "libc", "libc-dev", "binutils"];

/// List the entry names of `dir`, sorted.
///
/// `operation` names the caller in the error raised when `dir` is absent.
pub fn list_entries(dir: &Path, operation: &'static str) -> Result<BTreeSet<String>> {
    if !dir.is_dir() {
        return Err(ResolveError::MissingDirectory {
            path: dir.to_path_buf(),
            operation,
        });
    }
    let mut names = BTreeSet::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ResolveError::io(dir, e))? {
        let entry = entry.map_err(|e| ResolveError::io(dir, e))?;
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// On-disk paths making up one available toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainPaths {
    /// The toolchain's `cc/` directory.
    pub cc_dir: PathBuf,
    /// Config script shipped in `cc/`, linked instead of generated.
    pub config_script: Option<PathBuf>,
    /// `cc/bin` entries by file name.
    pub binaries: BTreeMap<String, PathBuf>,
    /// Present `deps/` entries by name.
    pub deps: BTreeMap<String, PathBuf>,
}

/// Read-only catalog rooted at a dependency directory.
#[derive(Debug, Clone)]
pub struct PathCatalog {
    root: PathBuf,
}

impl PathCatalog {
    /// Catalog over the dependency root at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The dependency root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/toolchains`.
    pub fn toolchains_dir(&self) -> PathBuf {
        self.root.join("toolchains")
    }

    /// `<root>/libs`.
    pub fn libs_dir(&self) -> PathBuf {
        self.root.join("libs")
    }

    /// Names of all toolchains present on disk.
    pub fn list_toolchains(&self) -> Result<BTreeSet<String>> {
        list_entries(&self.toolchains_dir(), "list toolchains")
    }

    /// Names of all library artifact directories (suffixed and unsuffixed).
    pub fn list_libraries(&self) -> Result<BTreeSet<String>> {
        list_entries(&self.libs_dir(), "list libraries")
    }

    /// Compiler descriptor directory of a toolchain; its existence decides
    /// whether the toolchain is available.
    pub fn cc_dir(&self, id: &ToolchainId) -> PathBuf {
        self.toolchains_dir().join(id.as_str()).join("cc")
    }

    /// Shared (unsuffixed) artifact directory of a library.
    pub fn library_dir(&self, library: &str) -> PathBuf {
        self.libs_dir().join(library)
    }

    /// Per-toolchain artifact directory of a library.
    pub fn library_variant_dir(&self, library: &str, id: &ToolchainId) -> PathBuf {
        self.libs_dir().join(format!("{library}_{id}"))
    }

    /// Collect the paths of an available toolchain, or `None` if its
    /// compiler descriptor directory is absent.
    pub fn toolchain(&self, id: &ToolchainId) -> Result<Option<ToolchainPaths>> {
        let cc_dir = self.cc_dir(id);
        if !cc_dir.is_dir() {
            return Ok(None);
        }

        let config_script = Some(cc_dir.join(CONFIG_SCRIPT)).filter(|p| p.is_file());

        let bin_dir = cc_dir.join("bin");
        let mut binaries = BTreeMap::new();
        if bin_dir.is_dir() {
            for name in list_entries(&bin_dir, "list toolchain binaries")? {
                binaries.insert(name.clone(), bin_dir.join(&name));
            }
        }

        let deps_dir = self.toolchains_dir().join(id.as_str()).join("deps");
        let deps = TOOLCHAIN_DEPS
            .iter()
            .map(|name| ((*name).to_string(), deps_dir.join(name)))
            .filter(|(_, path)| path.exists())
            .collect();

        Ok(Some(ToolchainPaths {
            cc_dir,
            config_script,
            binaries,
            deps,
        }))
    }
}
