//! Toolchain and library resolution engine for ccbind.
//!
//! Given a dependency root laid out as prebuilt toolchain and library
//! trees, this crate computes the effective target of each declared
//! toolchain, assembles its compiler and linker flags, and renders the
//! build descriptors that bind those artifacts into a Bazel workspace:
//! one descriptor set per toolchain (or a stub when the toolchain is not
//! present in this environment), one artifact-reference set per
//! (library, toolchain) pair, and one selector alias per library.
//!
//! Everything here is a pure function of the on-disk catalog and the
//! declarations. Writing the results out is the caller's job.

pub mod alias;
pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod flags;
pub mod ident;
pub mod library;
pub mod platform;
pub mod starlark;
pub mod stub;
pub mod synth;
pub mod target;
pub mod template;

pub use alias::{AliasDescriptor, ToolchainRef};
pub use catalog::{PathCatalog, ToolchainPaths};
pub use descriptor::{ConfigScript, Link, ToolchainDescriptor};
pub use error::{ResolveError, Result};
pub use ident::ToolchainId;
pub use library::ArtifactDirectory;
pub use stub::Provision;
pub use target::{EffectiveTarget, LibcSpec, LinkMode, TargetSpec};
