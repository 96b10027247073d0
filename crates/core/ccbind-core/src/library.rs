//! Library artifact lookup per (library, toolchain) pair.
//!
//! The per-toolchain directory `libs/<lib>_<toolchain>` is preferred; the
//! shared `libs/<lib>` is the fallback. When neither exists the whole
//! library pass fails.

use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::{PathCatalog, BUILD_DESCRIPTOR};
use crate::descriptor::Link;
use crate::error::{ResolveError, Result};
use crate::ident::ToolchainId;

/// Optional entries of an artifact directory, linked only when present.
pub const OPTIONAL_ENTRIES: &[&str] = &["include", "lib", "deps"];

/// A located artifact directory for one (library, toolchain) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDirectory {
    /// Library name.
    pub library: String,
    /// Toolchain the variant serves.
    pub toolchain: ToolchainId,
    /// The directory that was found.
    pub path: PathBuf,
    /// `true` when the unsuffixed shared directory was used.
    pub shared: bool,
    /// Optional entries that exist, by name.
    pub entries: Vec<String>,
}

impl ArtifactDirectory {
    /// Path of the mandatory build descriptor.
    pub fn build_descriptor(&self) -> PathBuf {
        self.path.join(BUILD_DESCRIPTOR)
    }

    /// Symlinks making up the artifact-reference set for this pair.
    pub fn links(&self) -> Vec<Link> {
        std::iter::once(BUILD_DESCRIPTOR)
            .chain(self.entries.iter().map(String::as_str))
            .map(|name| Link {
                dest: PathBuf::from(name),
                source: self.path.join(name),
            })
            .collect()
    }
}

/// Locate the artifact directory for `library` built with toolchain `id`.
pub fn resolve(catalog: &PathCatalog, library: &str, id: &ToolchainId) -> Result<ArtifactDirectory> {
    let suffixed = catalog.library_variant_dir(library, id);
    let shared = catalog.library_dir(library);

    let (path, is_shared) = if suffixed.is_dir() {
        (suffixed, false)
    } else if shared.is_dir() {
        (shared, true)
    } else {
        return Err(ResolveError::LibraryNotFound {
            library: library.to_string(),
            toolchain: id.to_string(),
            searched: vec![suffixed, shared],
        });
    };

    let descriptor = path.join(BUILD_DESCRIPTOR);
    if !descriptor.is_file() {
        return Err(ResolveError::MissingRequiredDescriptorFile {
            path: descriptor,
            operation: "resolve library artifact",
        });
    }

    let entries = OPTIONAL_ENTRIES
        .iter()
        .filter(|name| path.join(name).exists())
        .map(|name| (*name).to_string())
        .collect();

    Ok(ArtifactDirectory {
        library: library.to_string(),
        toolchain: id.clone(),
        path,
        shared: is_shared,
        entries,
    })
}

/// Resolve every (library, toolchain) pair, failing on the first miss.
///
/// Pairs are visited in the given order so the reported error is stable.
pub fn resolve_all<'a>(
    catalog: &PathCatalog,
    pairs: impl IntoIterator<Item = (&'a str, &'a ToolchainId)>,
) -> Result<Vec<ArtifactDirectory>> {
    pairs
        .into_iter()
        .map(|(library, id)| resolve(catalog, library, id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn artifact(root: &Path, dir: &str, entries: &[&str]) {
        let path = root.join("libs").join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(BUILD_DESCRIPTOR), "cc_library(name = \"x\")\n").unwrap();
        for e in entries {
            fs::create_dir_all(path.join(e)).unwrap();
        }
    }

    #[test]
    fn falls_back_to_shared_directory() {
        let dir = tempfile::tempdir().unwrap();
        artifact(dir.path(), "openssl", &[]);
        let catalog = PathCatalog::new(dir.path());

        let found = resolve(&catalog, "openssl", &"aarch64".into()).unwrap();
        assert_eq!(found.path, dir.path().join("libs/openssl"));
        assert!(found.shared);
    }

    #[test]
    fn prefers_suffixed_directory() {
        let dir = tempfile::tempdir().unwrap();
        artifact(dir.path(), "openssl", &[]);
        artifact(dir.path(), "openssl_aarch64", &[]);
        let catalog = PathCatalog::new(dir.path());

        let found = resolve(&catalog, "openssl", &"aarch64".into()).unwrap();
        assert_eq!(found.path, dir.path().join("libs/openssl_aarch64"));
        assert!(!found.shared);
    }

    #[test]
    fn neither_location_is_library_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("libs")).unwrap();
        let catalog = PathCatalog::new(dir.path());

        match resolve(&catalog, "openssl", &"aarch64".into()) {
            Err(ResolveError::LibraryNotFound { library, toolchain, searched }) => {
                assert_eq!(library, "openssl");
                assert_eq!(toolchain, "aarch64");
                assert_eq!(searched.len(), 2);
            }
            other => panic!("expected LibraryNotFound, got {other:?}"),
        }
    }

    #[test]
    fn directory_without_descriptor_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("libs/zlib/include")).unwrap();
        let catalog = PathCatalog::new(dir.path());
        let err = resolve(&catalog, "zlib", &"default".into()).unwrap_err();
        assert!(matches!(err, ResolveError::MissingRequiredDescriptorFile { .. }));
    }

    #[test]
    fn links_only_present_entries() {
        let dir = tempfile::tempdir().unwrap();
        artifact(dir.path(), "zlib_default", &["include", "lib"]);
        let catalog = PathCatalog::new(dir.path());
        let found = resolve(&catalog, "zlib", &"default".into()).unwrap();
        let dests: Vec<_> = found.links().into_iter().map(|l| l.dest).collect();
        assert_eq!(
            dests,
            vec![PathBuf::from("BUILD.bazel"), PathBuf::from("include"), PathBuf::from("lib")]
        );
    }

    #[test]
    fn one_missing_pair_fails_the_whole_pass() {
        let dir = tempfile::tempdir().unwrap();
        artifact(dir.path(), "zlib", &[]);
        let catalog = PathCatalog::new(dir.path());
        let default = ToolchainId::from("default");
        let pairs = [("zlib", &default), ("openssl", &default)];
        let err = resolve_all(&catalog, pairs).unwrap_err();
        assert!(matches!(err, ResolveError::LibraryNotFound { ref library, .. } if library == "openssl"));
    }
}
