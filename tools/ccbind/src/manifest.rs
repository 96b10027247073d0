//! Record of generated outputs, used to detect drift.
//!
//! `<out>/.ccbind-manifest.json` maps every generated file to the SHA-256
//! of its contents and every symlink to its target. `generate --check`
//! renders in memory and compares against it without touching the output.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::materialize::{self, Node, Outputs, REGISTRATION_FILE, Tree};

/// Current schema version. Bump when the manifest format changes.
const MANIFEST_VERSION: u32 = 1;

/// Manifest filename within the output directory.
pub const MANIFEST_FILE: &str = ".ccbind-manifest.json";

/// Generated files and links under one output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// Output-relative path → SHA-256 hex of the contents.
    pub files: BTreeMap<String, String>,
    /// Output-relative path → link target.
    pub links: BTreeMap<String, String>,
}

/// One difference between a manifest and what it is compared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// Expected but not recorded (or not on disk).
    Missing(String),
    /// Recorded but no longer expected.
    Unexpected(String),
    /// Present on both sides with different contents or target.
    Changed(String),
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(p) => write!(f, "missing: {p}"),
            Self::Unexpected(p) => write!(f, "unexpected: {p}"),
            Self::Changed(p) => write!(f, "changed: {p}"),
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            files: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }
}

/// Output-relative key with `/` separators on every host.
fn key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// SHA-256 hash of a byte slice, returned as a hex string.
fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

impl Manifest {
    /// Manifest describing exactly `outputs`.
    pub fn from_outputs(outputs: &Outputs) -> Self {
        let mut manifest = Self::default();
        for tree in outputs.toolchains.iter().chain(outputs.libraries.iter()) {
            manifest.record_tree(tree);
        }
        manifest.record_file(REGISTRATION_FILE, &outputs.registration);
        manifest
    }

    fn record_tree(&mut self, tree: &Tree) {
        for (rel, node) in &tree.nodes {
            let k = key(&tree.rel_dir.join(rel));
            match node {
                Node::File(text) => {
                    self.files.insert(k, hash_bytes(text.as_bytes()));
                }
                Node::Link(source) => {
                    self.links.insert(k, source.to_string_lossy().into_owned());
                }
            }
        }
    }

    pub fn record_file(&mut self, rel: &str, contents: &str) {
        self.files.insert(rel.to_string(), hash_bytes(contents.as_bytes()));
    }

    /// Keep `previous` entries under `prefix`, for units left untouched this run.
    pub fn carry_over(&mut self, previous: &Self, prefix: &str) {
        for (k, v) in previous.files.range(prefix.to_string()..) {
            if !k.starts_with(prefix) {
                break;
            }
            self.files.insert(k.clone(), v.clone());
        }
        for (k, v) in previous.links.range(prefix.to_string()..) {
            if !k.starts_with(prefix) {
                break;
            }
            self.links.insert(k.clone(), v.clone());
        }
    }

    /// Load the manifest from `<out>/.ccbind-manifest.json`.
    ///
    /// Returns `None` if the file is missing or has a version mismatch;
    /// any other read failure is an error.
    pub fn load(out: &Path) -> Result<Option<Self>> {
        let path = out.join(MANIFEST_FILE);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read manifest {}", path.display()));
            }
        };
        let manifest: Self = serde_json::from_str(&data)
            .with_context(|| format!("corrupt manifest {}", path.display()))?;
        Ok((manifest.version == MANIFEST_VERSION).then_some(manifest))
    }

    /// Save the manifest atomically (write to tmp, then rename).
    pub fn save(&self, out: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize manifest")?;
        materialize::write_file_atomic(&out.join(MANIFEST_FILE), &json)
    }

    /// Differences from `self` (recorded) to `expected`.
    pub fn diff(&self, expected: &Self) -> Vec<Drift> {
        let mut drift = Vec::new();
        diff_maps(&self.files, &expected.files, &mut drift);
        diff_maps(&self.links, &expected.links, &mut drift);
        drift
    }

    /// Recorded entries whose on-disk state no longer matches.
    pub fn verify_disk(&self, out: &Path) -> Vec<Drift> {
        let mut drift = Vec::new();
        for (rel, hash) in &self.files {
            match fs::read(out.join(rel)) {
                Ok(data) if &hash_bytes(&data) == hash => {}
                Ok(_) => drift.push(Drift::Changed(rel.clone())),
                Err(_) => drift.push(Drift::Missing(rel.clone())),
            }
        }
        for (rel, target) in &self.links {
            match fs::read_link(out.join(rel)) {
                Ok(actual) if actual.to_string_lossy() == target.as_str() => {}
                Ok(_) => drift.push(Drift::Changed(rel.clone())),
                Err(_) => drift.push(Drift::Missing(rel.clone())),
            }
        }
        drift
    }
}

fn diff_maps(
    recorded: &BTreeMap<String, String>,
    expected: &BTreeMap<String, String>,
    drift: &mut Vec<Drift>,
) {
    for (k, v) in expected {
        match recorded.get(k) {
            None => drift.push(Drift::Missing(k.clone())),
            Some(r) if r != v => drift.push(Drift::Changed(k.clone())),
            Some(_) => {}
        }
    }
    for k in recorded.keys() {
        if !expected.contains_key(k) {
            drift.push(Drift::Unexpected(k.clone()));
        }
    }
}
