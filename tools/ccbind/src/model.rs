//! Declaration model produced by evaluating `ccbind.rhai`.
//!
//! Plain data with no Rhai types. The engine fills a [`DeclModel`], the
//! validator checks it, and the planner turns it into descriptors.

use ccbind_core::ident::{self, ToolchainId};
use ccbind_core::target::TargetSpec;
use serde::{Deserialize, Serialize};

/// Everything declared in `ccbind.rhai`.
///
/// Toolchains and libraries are kept in declaration order; that order
/// drives descriptor emission, alias branches and the registration list.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DeclModel {
    pub project: ProjectDef,
    /// Dependency root, relative to the project root unless absolute.
    pub deps_root: Option<String>,
    /// Output directory, relative to the project root unless absolute.
    pub output_dir: Option<String>,
    pub toolchains: Vec<ToolchainDef>,
    pub libraries: Vec<LibraryDef>,
}

/// Project metadata.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProjectDef {
    pub name: String,
}

/// One declared toolchain.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ToolchainDef {
    pub name: String,
    pub target: TargetSpec,
    pub static_link: bool,
    /// Extra `-isystem` directories for non-dynamic targets.
    pub extra_includes: Vec<String>,
}

/// One declared library.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LibraryDef {
    pub name: String,
    /// Toolchains this library is built for. Empty means every toolchain.
    pub toolchains: Vec<String>,
}

impl ToolchainDef {
    pub fn id(&self) -> ToolchainId {
        ToolchainId::new(self.name.as_str())
    }
}

impl DeclModel {
    pub fn toolchain(&self, name: &str) -> Option<&ToolchainDef> {
        self.toolchains.iter().find(|t| t.name == name)
    }

    pub fn toolchain_mut(&mut self, name: &str) -> Option<&mut ToolchainDef> {
        self.toolchains.iter_mut().find(|t| t.name == name)
    }

    pub fn library_mut(&mut self, name: &str) -> Option<&mut LibraryDef> {
        self.libraries.iter_mut().find(|l| l.name == name)
    }

    pub fn toolchain_ids(&self) -> Vec<ToolchainId> {
        self.toolchains.iter().map(ToolchainDef::id).collect()
    }

    /// The project-wide default toolchain.
    pub fn default_toolchain(&self) -> Option<ToolchainId> {
        ident::default_toolchain(&self.toolchain_ids()).cloned()
    }

    /// Toolchains a library is built for, in toolchain declaration order.
    pub fn library_toolchains(&self, library: &LibraryDef) -> Vec<&ToolchainDef> {
        self.toolchains
            .iter()
            .filter(|t| library.toolchains.is_empty() || library.toolchains.contains(&t.name))
            .collect()
    }

    /// Default branch target for a library's alias.
    ///
    /// The project default when the library is built for it, otherwise the
    /// default among the library's own toolchains.
    pub fn library_default(&self, library: &LibraryDef) -> Option<ToolchainId> {
        let ids: Vec<ToolchainId> = self
            .library_toolchains(library)
            .into_iter()
            .map(ToolchainDef::id)
            .collect();
        match self.default_toolchain() {
            Some(d) if ids.contains(&d) => Some(d),
            _ => ident::default_toolchain(&ids).cloned(),
        }
    }
}
