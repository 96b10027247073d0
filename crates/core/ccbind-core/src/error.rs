//! Error types for toolchain and library resolution.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors that can occur while resolving toolchains and libraries.
#[derive(Debug)]
pub enum ResolveError {
    /// A target field lies outside the closed set of supported values.
    UnsupportedTarget {
        /// `cpu` or `os`.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Every value accepted for `field`.
        supported: &'static [&'static str],
    },
    /// Neither the per-toolchain nor the shared artifact directory exists.
    LibraryNotFound {
        /// Library name.
        library: String,
        /// Toolchain the variant was requested for.
        toolchain: String,
        /// Directories tried, in lookup order.
        searched: Vec<PathBuf>,
    },
    /// An artifact directory exists but lacks its build descriptor.
    MissingRequiredDescriptorFile {
        /// Expected descriptor path.
        path: PathBuf,
        /// Operation that needed it.
        operation: &'static str,
    },
    /// A directory that must exist for listing is absent.
    MissingDirectory {
        /// The absent directory.
        path: PathBuf,
        /// Operation that needed it.
        operation: &'static str,
    },
    /// The toolchain has no artifacts in this environment.
    ///
    /// Never fatal during resolution: the stub provider turns it into a
    /// descriptor that fails when used.
    ToolchainUnavailable {
        /// Toolchain name.
        toolchain: String,
        /// Directory whose absence made it unavailable.
        missing: PathBuf,
    },
    /// A descriptor template placeholder has no value, or a value has no
    /// placeholder.
    TemplateSlot {
        /// Template name.
        template: &'static str,
        /// The unmatched slot.
        slot: String,
    },
    /// No usable library artifact was found while synthesizing a descriptor.
    NoArtifacts {
        /// Library name.
        library: String,
        /// Directory that was searched.
        path: PathBuf,
        /// Kind of artifact looked for.
        wanted: &'static str,
    },
    /// I/O error while reading the catalog.
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

impl ResolveError {
    /// Wrap an I/O error with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedTarget {
                field,
                value,
                supported,
            } => write!(
                f,
                "unsupported target {field} '{value}' (supported: {})",
                supported.join(", ")
            ),
            Self::LibraryNotFound {
                library,
                toolchain,
                searched,
            } => {
                write!(
                    f,
                    "library '{library}' not found for toolchain '{toolchain}'"
                )?;
                if !searched.is_empty() {
                    let paths: Vec<String> =
                        searched.iter().map(|p| p.display().to_string()).collect();
                    write!(f, " (searched: {})", paths.join(", "))?;
                }
                Ok(())
            }
            Self::MissingRequiredDescriptorFile { path, operation } => write!(
                f,
                "{operation}: required build descriptor missing: {}",
                path.display()
            ),
            Self::MissingDirectory { path, operation } => {
                write!(f, "{operation}: directory not found: {}", path.display())
            }
            Self::ToolchainUnavailable { toolchain, missing } => write!(
                f,
                "toolchain '{toolchain}' is not available in this environment (missing {})",
                missing.display()
            ),
            Self::TemplateSlot { template, slot } => {
                write!(f, "template '{template}': unmatched slot '{slot}'")
            }
            Self::NoArtifacts {
                library,
                path,
                wanted,
            } => write!(
                f,
                "no {wanted} for library '{library}' under {}",
                path.display()
            ),
            Self::Io { path, source } => write!(f, "I/O error at {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
