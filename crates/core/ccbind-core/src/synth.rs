//! Build descriptor synthesis for prebuilt library trees.
//!
//! Artifact trees coming straight out of a package store usually have
//! `include/`, `lib/` and `deps/` but no build descriptor. This module
//! writes one. The static-archive choice is a heuristic (exact name, then
//! name-prefixed, then the first archive found) and can pick the wrong
//! archive in trees that ship several unrelated ones.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::catalog::list_entries;
use crate::error::{ResolveError, Result};
use crate::starlark;
use crate::template::{Slots, Template};

const LIBRARY_TEMPLATE: Template = Template::new(
    "synthesized library BUILD",
    r#"# Generated by ccbind for library "{{name}}" ({{mode}}). Do not edit.

package(default_visibility = ["//visibility:public"])

cc_library(
    name = {{target_name}},
    srcs = {{srcs}},
    hdrs = {{hdrs}},
    includes = {{includes}},
    linkstatic = {{linkstatic}},
    deps = {{deps}},
)
"#,
);

/// How the synthesized library links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// One static archive.
    Static,
    /// Every shared object in `lib/`.
    Dynamic,
}

impl Linkage {
    /// Lowercase name, as printed in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Archive file name stem for `library`: `zlib` and `libz` both map to `lib<stem>`.
fn archive_stem(library: &str) -> String {
    format!("lib{}", library.strip_prefix("lib").unwrap_or(library))
}

/// Pick the static archive for `library` under `lib_dir`.
///
/// Returns the path relative to `lib_dir`'s parent, e.g. `lib/libz.a`.
pub fn select_archive(lib_dir: &Path, library: &str) -> Option<PathBuf> {
    let stem = archive_stem(library);
    let exact = format!("{stem}.a");

    let archives: Vec<PathBuf> = WalkDir::new(lib_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "a"))
        .map(|e| e.into_path())
        .collect();

    let file_name = |p: &PathBuf| p.file_name().map(|n| n.to_string_lossy().into_owned());

    let chosen = archives
        .iter()
        .find(|p| file_name(p).as_deref() == Some(exact.as_str()))
        .or_else(|| {
            archives
                .iter()
                .find(|p| file_name(p).is_some_and(|n| n.starts_with(&stem)))
        })
        .or_else(|| archives.first())?;

    let base = lib_dir.parent().unwrap_or(lib_dir);
    Some(chosen.strip_prefix(base).unwrap_or(chosen).to_path_buf())
}

/// Shared objects (`*.so`, `*.so.*`) directly under `lib_dir`, sorted.
pub fn shared_objects(lib_dir: &Path) -> Result<Vec<String>> {
    Ok(list_entries(lib_dir, "list shared objects")?
        .into_iter()
        .filter(|name| name.ends_with(".so") || name.contains(".so."))
        .map(|name| format!("lib/{name}"))
        .collect())
}

/// Render a `BUILD.bazel` for the artifact tree at `dir`.
///
/// Nothing is written; the caller decides where the descriptor goes.
pub fn synthesize(dir: &Path, library: &str, linkage: Linkage) -> Result<String> {
    if !dir.is_dir() {
        return Err(ResolveError::MissingDirectory {
            path: dir.to_path_buf(),
            operation: "synthesize library descriptor",
        });
    }
    let lib_dir = dir.join("lib");
    let has_lib = lib_dir.is_dir();

    let srcs: Vec<String> = match linkage {
        Linkage::Static => {
            let archive = has_lib
                .then(|| select_archive(&lib_dir, library))
                .flatten()
                .ok_or_else(|| ResolveError::NoArtifacts {
                    library: library.to_string(),
                    path: lib_dir.clone(),
                    wanted: "static archive",
                })?;
            vec![archive.to_string_lossy().into_owned()]
        }
        Linkage::Dynamic => {
            let objects = if has_lib {
                shared_objects(&lib_dir)?
            } else {
                Vec::new()
            };
            if objects.is_empty() {
                return Err(ResolveError::NoArtifacts {
                    library: library.to_string(),
                    path: lib_dir,
                    wanted: "shared object",
                });
            }
            objects
        }
    };

    let has_include = dir.join("include").is_dir();
    let hdrs = if has_include {
        r#"glob(["include/**"])"#.to_string()
    } else {
        "[]".to_string()
    };
    let includes: &[&str] = if has_include { &["include"] } else { &[] };

    let deps_dir = dir.join("deps");
    let deps: Vec<String> = if deps_dir.is_dir() {
        list_entries(&deps_dir, "list library deps")?
            .into_iter()
            .map(|dep| format!("@{dep}//:{dep}"))
            .collect()
    } else {
        Vec::new()
    };

    let mut slots = Slots::new();
    slots
        .set("name", library)
        .set("mode", linkage.as_str())
        .set("target_name", starlark::string(library))
        .set("srcs", starlark::string_list(&srcs, 8))
        .set("hdrs", hdrs)
        .set("includes", starlark::string_list(includes, 8))
        .set(
            "linkstatic",
            if linkage == Linkage::Static { "True" } else { "False" },
        )
        .set("deps", starlark::string_list(&deps, 8));
    LIBRARY_TEMPLATE.render(&slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for f in files {
            let path = dir.path().join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            if f.ends_with('/') {
                fs::create_dir_all(&path).unwrap();
            } else {
                fs::write(&path, "").unwrap();
            }
        }
        dir
    }

    #[test]
    fn exact_archive_wins() {
        let dir = tree(&["lib/libaaa.a", "lib/libz_extra.a", "lib/libz.a"]);
        let got = select_archive(&dir.path().join("lib"), "z").unwrap();
        assert_eq!(got, PathBuf::from("lib/libz.a"));
    }

    #[test]
    fn lib_prefixed_name_maps_to_same_archive() {
        let dir = tree(&["lib/libz.a"]);
        let got = select_archive(&dir.path().join("lib"), "libz").unwrap();
        assert_eq!(got, PathBuf::from("lib/libz.a"));
    }

    #[test]
    fn prefixed_archive_is_second_choice() {
        let dir = tree(&["lib/libaaa.a", "lib/libssl_static.a", "lib/libssl_pic.a"]);
        let got = select_archive(&dir.path().join("lib"), "ssl").unwrap();
        assert_eq!(got, PathBuf::from("lib/libssl_pic.a"));
    }

    #[test]
    fn first_archive_is_last_resort() {
        let dir = tree(&["lib/sub/libq.a", "lib/libm.a", "lib/README"]);
        let got = select_archive(&dir.path().join("lib"), "ssl").unwrap();
        assert_eq!(got, PathBuf::from("lib/libm.a"));
    }

    #[test]
    fn static_without_archive_fails() {
        let dir = tree(&["lib/libz.so"]);
        let err = synthesize(dir.path(), "z", Linkage::Static).unwrap_err();
        assert!(matches!(err, ResolveError::NoArtifacts { wanted: "static archive", .. }));
    }

    #[test]
    fn dynamic_lists_versioned_objects_sorted() {
        let dir = tree(&["lib/libz.so.1", "lib/libz.so", "lib/libz.a", "lib/libz.so.1.3"]);
        let objects = shared_objects(&dir.path().join("lib")).unwrap();
        assert_eq!(objects, vec!["lib/libz.so", "lib/libz.so.1", "lib/libz.so.1.3"]);
    }

    #[test]
    fn full_static_descriptor() {
        let dir = tree(&["lib/libz.a", "include/zlib.h", "deps/openssl/"]);
        let text = synthesize(dir.path(), "zlib", Linkage::Static).unwrap();
        let expected = r#"cc_library(
    name = "zlib",
    srcs = [
        "lib/libz.a",
    ],
    hdrs = glob(["include/**"]),
    includes = [
        "include",
    ],
    linkstatic = True,
    deps = [
        "@openssl//:openssl",
    ],
)
"#;
        assert!(text.ends_with(expected), "{text}");
    }

    #[test]
    fn headerless_dynamic_descriptor() {
        let dir = tree(&["lib/libfoo.so"]);
        let text = synthesize(dir.path(), "foo", Linkage::Dynamic).unwrap();
        assert!(text.contains("hdrs = [],"));
        assert!(text.contains("includes = [],"));
        assert!(text.contains("linkstatic = False,"));
        assert!(text.contains("deps = [],"));
    }

    #[test]
    fn missing_tree_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = synthesize(&dir.path().join("nope"), "z", Linkage::Dynamic).unwrap_err();
        assert!(matches!(err, ResolveError::MissingDirectory { .. }));
    }
}
