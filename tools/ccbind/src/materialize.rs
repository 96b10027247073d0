//! Writing planned descriptors to the output directory.
//!
//! Output layout:
//!
//! ```text
//! <out>/toolchains.bzl
//! <out>/toolchains/<name>/{BUILD.bazel, cc_toolchain_config.bzl, bin/*, deps/*}
//! <out>/libs/<lib>_<toolchain>/{BUILD.bazel, include, lib, deps}   symlinks
//! <out>/libs/<lib>/BUILD.bazel                                      alias
//! ```
//!
//! Each toolchain directory, and the whole `libs/` directory, is built in
//! a staging directory next to its destination and renamed into place, so
//! a reader never sees half of a descriptor set.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ccbind_core::catalog::BUILD_DESCRIPTOR;
use ccbind_core::descriptor::{self, ConfigScript, ToolchainDescriptor};
use ccbind_core::ident;

use crate::plan::{LibraryPlan, Plan};
use crate::verbose::vprintln;

pub const TOOLCHAINS_DIR: &str = "toolchains";
pub const LIBS_DIR: &str = "libs";
pub const REGISTRATION_FILE: &str = "toolchains.bzl";

/// One entry of a generated tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(String),
    Link(PathBuf),
}

/// A directory written as one unit, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub rel_dir: PathBuf,
    pub nodes: BTreeMap<PathBuf, Node>,
}

/// All generated content of one run.
#[derive(Debug)]
pub struct Outputs {
    pub toolchains: Vec<Tree>,
    /// `None` when the library pass failed.
    pub libraries: Option<Tree>,
    pub registration: String,
}

pub fn toolchain_tree(desc: &ToolchainDescriptor) -> Tree {
    let mut nodes = BTreeMap::new();
    nodes.insert(
        PathBuf::from(BUILD_DESCRIPTOR),
        Node::File(desc.build_file.clone()),
    );
    let script = match desc.config_script {
        ConfigScript::Generated(ref text) => Node::File(text.clone()),
        ConfigScript::Linked(ref source) => Node::Link(source.clone()),
    };
    nodes.insert(PathBuf::from(descriptor::config_script_name()), script);
    for link in &desc.links {
        nodes.insert(link.dest.clone(), Node::Link(link.source.clone()));
    }
    Tree {
        rel_dir: Path::new(TOOLCHAINS_DIR).join(desc.id.as_str()),
        nodes,
    }
}

pub fn library_tree(plan: &LibraryPlan) -> Result<Tree> {
    let mut nodes = BTreeMap::new();
    for variant in &plan.variants {
        let dir = PathBuf::from(ident::library_variant_repo(&variant.library, &variant.toolchain));
        for link in variant.links() {
            nodes.insert(dir.join(&link.dest), Node::Link(link.source));
        }
    }
    for alias in &plan.aliases {
        let text = alias
            .render()
            .with_context(|| format!("failed to render alias for library '{}'", alias.library))?;
        nodes.insert(
            Path::new(&alias.library).join(BUILD_DESCRIPTOR),
            Node::File(text),
        );
    }
    Ok(Tree {
        rel_dir: PathBuf::from(LIBS_DIR),
        nodes,
    })
}

impl Outputs {
    /// Render everything the plan can produce.
    pub fn render(plan: &Plan) -> Result<Self> {
        let provisioned: Vec<_> = plan.provisioned().collect();
        let toolchains = provisioned.iter().map(|p| toolchain_tree(&p.descriptor)).collect();
        let ids: Vec<_> = provisioned.iter().map(|p| p.descriptor.id.clone()).collect();
        let registration = descriptor::registration_list(&ids)?;
        let libraries = match plan.libraries {
            Ok(ref libs) => Some(library_tree(libs)?),
            Err(_) => None,
        };
        Ok(Self {
            toolchains,
            libraries,
            registration,
        })
    }

    /// Write every tree and the registration list under `out`.
    pub fn write(&self, out: &Path) -> Result<()> {
        fs::create_dir_all(out)
            .with_context(|| format!("failed to create output directory {}", out.display()))?;
        for tree in &self.toolchains {
            write_tree(out, tree)?;
        }
        if let Some(ref libs) = self.libraries {
            write_tree(out, libs)?;
        }
        write_file_atomic(&out.join(REGISTRATION_FILE), &self.registration)
    }
}

/// Write `tree` to a staging directory, then swap it into place.
pub fn write_tree(out: &Path, tree: &Tree) -> Result<()> {
    let dest = out.join(&tree.rel_dir);
    let (Some(parent), Some(name)) = (dest.parent(), dest.file_name()) else {
        bail!("invalid output path {}", dest.display());
    };
    let name = name.to_string_lossy();
    let staging = parent.join(format!(".{name}.staging"));
    let retired = parent.join(format!(".{name}.old"));

    for leftover in [&staging, &retired] {
        remove_path(leftover)?;
    }
    fs::create_dir_all(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;

    for (rel, node) in &tree.nodes {
        let path = staging.join(rel);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        match node {
            Node::File(text) => fs::write(&path, text)
                .with_context(|| format!("failed to write {}", path.display()))?,
            Node::Link(source) => symlink(source, &path)?,
        }
    }

    if fs::symlink_metadata(&dest).is_ok() {
        fs::rename(&dest, &retired)
            .with_context(|| format!("failed to move aside {}", dest.display()))?;
    }
    fs::rename(&staging, &dest)
        .with_context(|| format!("failed to move {} into place", dest.display()))?;
    remove_path(&retired)?;
    vprintln!("  wrote {}", dest.display());
    Ok(())
}

/// Write a single file through a temporary sibling and a rename.
pub fn write_file_atomic(path: &Path, contents: &str) -> Result<()> {
    let Some(name) = path.file_name() else {
        bail!("invalid output path {}", path.display());
    };
    let tmp = path.with_file_name(format!(".{}.tmp", name.to_string_lossy()));
    fs::write(&tmp, contents).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))
}

/// Remove toolchain directories that are no longer declared.
pub fn prune_toolchains(out: &Path, declared: &BTreeSet<String>) -> Result<Vec<String>> {
    let dir = out.join(TOOLCHAINS_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut removed = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || declared.contains(&name) {
            continue;
        }
        remove_path(&entry.path())?;
        removed.push(name);
    }
    removed.sort();
    Ok(removed)
}

/// Remove a file, symlink or directory tree; absent paths are fine.
pub fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.with_context(|| format!("failed to remove {}", path.display()))
}

#[cfg(unix)]
fn symlink(source: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, link).with_context(|| {
        format!(
            "failed to link {} -> {}",
            link.display(),
            source.display()
        )
    })
}

#[cfg(not(unix))]
fn symlink(source: &Path, link: &Path) -> Result<()> {
    bail!(
        "cannot link {} -> {}: symlinks are only supported on unix hosts",
        link.display(),
        source.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(rel: &str, nodes: &[(&str, Node)]) -> Tree {
        Tree {
            rel_dir: PathBuf::from(rel),
            nodes: nodes
                .iter()
                .map(|(p, n)| (PathBuf::from(p), n.clone()))
                .collect(),
        }
    }

    #[test]
    fn write_tree_replaces_previous_contents() {
        let out = tempfile::tempdir().unwrap();
        let first = tree(
            "toolchains/default",
            &[
                ("BUILD.bazel", Node::File("one".into())),
                ("stale.txt", Node::File("x".into())),
            ],
        );
        write_tree(out.path(), &first).unwrap();

        let second = tree("toolchains/default", &[("BUILD.bazel", Node::File("two".into()))]);
        write_tree(out.path(), &second).unwrap();

        let dir = out.path().join("toolchains/default");
        assert_eq!(fs::read_to_string(dir.join("BUILD.bazel")).unwrap(), "two");
        assert!(!dir.join("stale.txt").exists());

        let leftovers: Vec<_> = fs::read_dir(out.path().join("toolchains"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("default")]);
    }

    #[cfg(unix)]
    #[test]
    fn links_point_at_sources() {
        let out = tempfile::tempdir().unwrap();
        let src = out.path().join("src-include");
        fs::create_dir_all(&src).unwrap();
        let t = tree("libs", &[("zlib_default/include", Node::Link(src.clone()))]);
        write_tree(out.path(), &t).unwrap();
        let link = out.path().join("libs/zlib_default/include");
        assert_eq!(fs::read_link(&link).unwrap(), src);
    }

    #[test]
    fn prune_removes_only_undeclared_toolchains() {
        let out = tempfile::tempdir().unwrap();
        for name in ["default", "old", ".default.staging"] {
            fs::create_dir_all(out.path().join("toolchains").join(name)).unwrap();
        }
        let keep: BTreeSet<String> = ["default".to_string()].into_iter().collect();
        let removed = prune_toolchains(out.path(), &keep).unwrap();
        assert_eq!(removed, vec!["old"]);
        assert!(out.path().join("toolchains/default").exists());
        assert!(out.path().join("toolchains/.default.staging").exists());
    }

    #[test]
    fn atomic_file_write_leaves_no_temp() {
        let out = tempfile::tempdir().unwrap();
        let path = out.path().join(REGISTRATION_FILE);
        write_file_atomic(&path, "A = []\n").unwrap();
        write_file_atomic(&path, "B = []\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "B = []\n");
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }
}
