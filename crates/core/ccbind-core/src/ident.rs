//! Toolchain and library identities and the repository names derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of the repository generated for each toolchain.
pub const TOOLCHAIN_REPO_PREFIX: &str = "cc_toolchain_";

/// Name reserved for the default toolchain.
pub const DEFAULT_TOOLCHAIN: &str = "default";

/// Logical toolchain name (e.g. `default`, `aarch64`).
///
/// One toolchain identity owns one directory namespace and one generated
/// descriptor set, so every path and label derived from it embeds the name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolchainId(String);

impl ToolchainId {
    /// Identity for the toolchain named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The logical name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the repository holding this toolchain's descriptor set.
    pub fn repo_name(&self) -> String {
        format!("{TOOLCHAIN_REPO_PREFIX}{}", self.0)
    }

    /// Exec-root relative prefix for paths inside the toolchain repository.
    pub fn namespace(&self) -> String {
        format!("external/{}", self.repo_name())
    }

    /// Label of the `toolchain` rule registered for this identity.
    pub fn toolchain_label(&self) -> String {
        format!("@{}//:toolchain", self.repo_name())
    }

    /// Label of the `platform` rule emitted for this identity.
    pub fn platform_label(&self) -> String {
        format!("@{}//:platform", self.repo_name())
    }
}

impl fmt::Display for ToolchainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolchainId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Pick the default toolchain: the literal `default` if declared, else the first.
pub fn default_toolchain(declared: &[ToolchainId]) -> Option<&ToolchainId> {
    declared
        .iter()
        .find(|t| t.as_str() == DEFAULT_TOOLCHAIN)
        .or_else(|| declared.first())
}

/// Repository name of a per-toolchain library variant (`<lib>_<toolchain>`).
pub fn library_variant_repo(library: &str, toolchain: &ToolchainId) -> String {
    format!("{library}_{toolchain}")
}

/// Label of the library target inside a variant repository.
pub fn library_variant_label(library: &str, toolchain: &ToolchainId) -> String {
    format!("@{}//:{library}", library_variant_repo(library, toolchain))
}
