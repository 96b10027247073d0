//! In-memory plan: every descriptor ccbind would write, computed up front.
//!
//! Toolchains are planned as independent units on the worker pool; one
//! failing unit does not stop the others. The library pass runs once over
//! all libraries and either succeeds as a whole or not at all.

use anyhow::{Context, Result};
use ccbind_core::alias::{self, AliasDescriptor, ToolchainRef};
use ccbind_core::catalog::PathCatalog;
use ccbind_core::descriptor::ToolchainDescriptor;
use ccbind_core::ident::ToolchainId;
use ccbind_core::library::{self, ArtifactDirectory};
use ccbind_core::stub::{self, Provision};
use ccbind_core::target::EffectiveTarget;
use serde::Serialize;

use crate::model::{DeclModel, ToolchainDef};
use crate::pool;
use crate::verbose::{Timer, vprintln};

/// A toolchain that resolved and rendered.
#[derive(Debug)]
pub struct Provisioned {
    pub provision: Provision,
    pub descriptor: ToolchainDescriptor,
}

/// Result of one toolchain unit.
#[derive(Debug)]
pub struct ToolchainOutcome {
    pub id: ToolchainId,
    pub result: Result<Provisioned>,
}

/// Library variants and aliases, all resolved.
#[derive(Debug, Default)]
pub struct LibraryPlan {
    pub variants: Vec<ArtifactDirectory>,
    pub aliases: Vec<AliasDescriptor>,
}

/// Everything a `generate` run would produce.
#[derive(Debug)]
pub struct Plan {
    pub toolchains: Vec<ToolchainOutcome>,
    pub libraries: Result<LibraryPlan>,
}

impl Plan {
    /// Plan all declared toolchains and libraries against `catalog`.
    ///
    /// A missing dependency root fails the whole plan; only a missing
    /// toolchain inside an existing root turns into a stub.
    pub fn build(model: &DeclModel, catalog: &PathCatalog, jobs: usize) -> Result<Self> {
        catalog.list_toolchains().with_context(|| {
            format!("dependency root {} is not usable", catalog.root().display())
        })?;
        let toolchains = {
            let _t = Timer::start("toolchain planning");
            pool::run_all(&model.toolchains, jobs, |tc| ToolchainOutcome {
                id: tc.id(),
                result: plan_toolchain(catalog, tc),
            })
        };
        let libraries = {
            let _t = Timer::start("library planning");
            plan_libraries(model, catalog, &toolchains).context("library pass failed")
        };
        Ok(Self {
            toolchains,
            libraries,
        })
    }

    /// Successfully planned toolchains, in declaration order.
    pub fn provisioned(&self) -> impl Iterator<Item = &Provisioned> {
        self.toolchains.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Number of failed units, counting the library pass as one.
    pub fn failure_count(&self) -> usize {
        self.toolchains.iter().filter(|o| o.result.is_err()).count()
            + usize::from(self.libraries.is_err())
    }

    /// Serializable summary for `resolve --json`.
    pub fn report(&self) -> PlanReport<'_> {
        let toolchains = self
            .toolchains
            .iter()
            .map(|o| match o.result {
                Ok(ref p) => ToolchainReport {
                    name: o.id.as_str(),
                    available: Some(p.provision.is_available()),
                    mode: Some(p.provision.target().link_mode().as_str()),
                    target: Some(p.provision.target()),
                    error: None,
                },
                Err(ref e) => ToolchainReport {
                    name: o.id.as_str(),
                    available: None,
                    mode: None,
                    target: None,
                    error: Some(format!("{e:#}")),
                },
            })
            .collect();
        let (libraries, library_error) = match self.libraries {
            Ok(ref plan) => {
                let reports = plan
                    .aliases
                    .iter()
                    .map(|alias| LibraryReport {
                        alias,
                        variants: plan
                            .variants
                            .iter()
                            .filter(|v| v.library == alias.library)
                            .collect(),
                    })
                    .collect();
                (Some(reports), None)
            }
            Err(ref e) => (None, Some(format!("{e:#}"))),
        };
        PlanReport {
            toolchains,
            libraries,
            library_error,
        }
    }
}

/// JSON view of a [`Plan`].
#[derive(Debug, Serialize)]
pub struct PlanReport<'a> {
    pub toolchains: Vec<ToolchainReport<'a>>,
    pub libraries: Option<Vec<LibraryReport<'a>>>,
    pub library_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolchainReport<'a> {
    pub name: &'a str,
    pub available: Option<bool>,
    pub mode: Option<&'static str>,
    pub target: Option<&'a EffectiveTarget>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LibraryReport<'a> {
    pub alias: &'a AliasDescriptor,
    pub variants: Vec<&'a ArtifactDirectory>,
}

fn plan_toolchain(catalog: &PathCatalog, tc: &ToolchainDef) -> Result<Provisioned> {
    let _t = Timer::start(format!("toolchain {}", tc.name));
    let id = tc.id();
    let provision = stub::provision(catalog, &id, &tc.target, tc.static_link)
        .with_context(|| format!("failed to resolve toolchain '{id}'"))?;
    if let Some(reason) = provision.unavailable_error() {
        vprintln!("  {reason}; emitting stub");
    }
    let descriptor = provision
        .descriptor(&tc.extra_includes)
        .with_context(|| format!("failed to render descriptor for toolchain '{id}'"))?;
    Ok(Provisioned {
        provision,
        descriptor,
    })
}

/// Alias view of a toolchain, carrying the cpu its descriptor registers.
fn alias_ref(outcomes: &[ToolchainOutcome], tc: &ToolchainDef) -> ToolchainRef {
    let id = tc.id();
    let cpu = outcomes
        .iter()
        .find(|o| o.id == id)
        .and_then(|o| o.result.as_ref().ok())
        .map(|p| p.provision.target().cpu().to_string());
    ToolchainRef::new(id, cpu)
}

fn plan_libraries(
    model: &DeclModel,
    catalog: &PathCatalog,
    outcomes: &[ToolchainOutcome],
) -> Result<LibraryPlan> {
    let mut plan = LibraryPlan::default();
    for lib in &model.libraries {
        let toolchains = model.library_toolchains(lib);
        let ids: Vec<ToolchainId> = toolchains.iter().map(|t| t.id()).collect();

        let variants = library::resolve_all(catalog, ids.iter().map(|id| (lib.name.as_str(), id)))?;
        for v in &variants {
            if v.shared {
                vprintln!(
                    "  {} for {}: using shared {}",
                    v.library,
                    v.toolchain,
                    v.path.display()
                );
            }
        }

        let Some(default) = model.library_default(lib) else {
            continue;
        };
        let refs: Vec<_> = toolchains.iter().map(|t| alias_ref(outcomes, t)).collect();
        let alias = alias::generate(&lib.name, &refs, &default);
        let branched = alias.branches.len() + 1;
        if branched < refs.len() {
            vprintln!(
                "  {}: {} of {} toolchains share a cpu constraint or failed to resolve; no alias branch",
                lib.name,
                refs.len() - branched,
                refs.len()
            );
        }

        plan.variants.extend(variants);
        plan.aliases.push(alias);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LibraryDef;
    use ccbind_core::descriptor;
    use std::fs;
    use std::path::Path;

    fn toolchain(name: &str, cpu: Option<&str>) -> ToolchainDef {
        let mut def = ToolchainDef {
            name: name.into(),
            ..Default::default()
        };
        def.target.cpu = cpu.map(Into::into);
        def
    }

    fn deps_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("toolchains")).unwrap();
        dir
    }

    fn available(root: &Path, name: &str) {
        fs::create_dir_all(root.join("toolchains").join(name).join("cc")).unwrap();
    }

    fn library(root: &Path, dir: &str) {
        let path = root.join("libs").join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("BUILD.bazel"), "").unwrap();
    }

    #[test]
    fn failing_unit_does_not_stop_others() {
        let dir = deps_root();
        available(dir.path(), "default");
        let model = DeclModel {
            toolchains: vec![
                toolchain("default", None),
                toolchain("sparc", Some("sparc")),
                toolchain("aarch64", Some("aarch64")),
            ],
            ..Default::default()
        };
        let plan = Plan::build(&model, &PathCatalog::new(dir.path()), 2).unwrap();

        let ok: Vec<_> = plan.provisioned().map(|p| p.provision.id().as_str()).collect();
        assert_eq!(ok, vec!["default", "aarch64"]);
        assert_eq!(plan.failure_count(), 1);
        let err = plan.toolchains[1].result.as_ref().unwrap_err();
        assert!(format!("{err:#}").contains("unsupported target cpu 'sparc'"));

        // aarch64 has no artifacts here and becomes a stub.
        assert!(!plan.toolchains[2].result.as_ref().unwrap().descriptor.available);
    }

    #[test]
    fn library_pass_is_all_or_nothing() {
        let dir = deps_root();
        library(dir.path(), "zlib");
        let model = DeclModel {
            toolchains: vec![toolchain("default", None)],
            libraries: vec![
                LibraryDef {
                    name: "zlib".into(),
                    toolchains: vec![],
                },
                LibraryDef {
                    name: "openssl".into(),
                    toolchains: vec![],
                },
            ],
            ..Default::default()
        };
        let plan = Plan::build(&model, &PathCatalog::new(dir.path()), 1).unwrap();
        let err = plan.libraries.as_ref().unwrap_err();
        assert!(format!("{err:#}").contains("library 'openssl' not found"));
        assert_eq!(plan.failure_count(), 1);
    }

    #[test]
    fn aliases_follow_library_toolchains() {
        let dir = deps_root();
        library(dir.path(), "openssl");
        library(dir.path(), "openssl_aarch64");
        let model = DeclModel {
            toolchains: vec![toolchain("default", None), toolchain("aarch64", Some("aarch64"))],
            libraries: vec![LibraryDef {
                name: "openssl".into(),
                toolchains: vec![],
            }],
            ..Default::default()
        };
        let plan = Plan::build(&model, &PathCatalog::new(dir.path()), 4).unwrap();
        let libs = plan.libraries.as_ref().unwrap();
        assert_eq!(libs.variants.len(), 2);
        assert!(libs.variants[0].shared);
        assert!(!libs.variants[1].shared);
        assert_eq!(libs.aliases[0].all_branches().count(), 2);

        let json = serde_json::to_value(plan.report()).unwrap();
        assert_eq!(json["toolchains"][0]["name"], "default");
        assert_eq!(json["toolchains"][0]["available"], false);
        assert_eq!(json["libraries"][0]["variants"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn alias_branches_match_registered_cpu_constraints() {
        let dir = deps_root();
        library(dir.path(), "zlib");
        let model = DeclModel {
            toolchains: vec![
                toolchain("default", None),
                toolchain("riscv64", None),
                toolchain("cross", Some("aarch64")),
            ],
            libraries: vec![LibraryDef {
                name: "zlib".into(),
                toolchains: vec![],
            }],
            ..Default::default()
        };
        let plan = Plan::build(&model, &PathCatalog::new(dir.path()), 2).unwrap();
        let alias = &plan.libraries.as_ref().unwrap().aliases[0];

        // `riscv64` names no cpu, resolves to the x86_64 baseline and so
        // shares the default's constraint.
        assert_eq!(alias.branches.len(), 1);
        for branch in &alias.branches {
            let owner = plan
                .provisioned()
                .find(|p| branch.actual == format!("@zlib_{}//:zlib", p.descriptor.id))
                .unwrap();
            let registered = descriptor::platform_constraints(owner.provision.target()).unwrap();
            assert_eq!(branch.condition, registered[0]);
            assert!(owner.descriptor.build_file.contains(&branch.condition));
        }
        assert_eq!(alias.branches[0].condition, "@platforms//cpu:aarch64");
    }

    #[test]
    fn missing_deps_root_fails_instead_of_stubbing() {
        let dir = tempfile::tempdir().unwrap();
        let model = DeclModel {
            toolchains: vec![toolchain("default", None)],
            ..Default::default()
        };
        let err = Plan::build(&model, &PathCatalog::new(dir.path().join("typo-deps")), 1)
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("typo-deps"), "{msg}");
        assert!(msg.contains("directory not found"), "{msg}");
    }
}
