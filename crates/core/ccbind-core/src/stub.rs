//! Availability dispatch and stub descriptors.
//!
//! Every requested toolchain is provisioned exactly once: either it is
//! [`Provision::Available`] and goes through the normal emission path, or
//! it is [`Provision::Unavailable`] and gets a stub descriptor. A stub is
//! structurally valid, so the build graph still loads, but its config rule
//! fails as soon as the toolchain is actually used to compile something.

use std::path::PathBuf;

use crate::catalog::{PathCatalog, ToolchainPaths};
use crate::descriptor::{self, ConfigScript, ToolchainDescriptor};
use crate::error::{ResolveError, Result};
use crate::ident::ToolchainId;
use crate::starlark;
use crate::target::{self, EffectiveTarget, TargetSpec};
use crate::template::{Slots, Template};

const STUB_BUILD_TEMPLATE: Template = Template::new(
    "stub BUILD",
    r#"# Generated by ccbind: toolchain "{{name}}" is not available in this environment.
# Any build that selects this toolchain fails with an explanation.

load(":cc_toolchain_config.bzl", "cc_toolchain_config")

package(default_visibility = ["//visibility:public"])

filegroup(
    name = "empty",
    srcs = [],
)

cc_toolchain_config(
    name = "cc_toolchain_config",
)

cc_toolchain(
    name = "cc_toolchain",
    all_files = ":empty",
    ar_files = ":empty",
    as_files = ":empty",
    compiler_files = ":empty",
    dwp_files = ":empty",
    linker_files = ":empty",
    objcopy_files = ":empty",
    strip_files = ":empty",
    toolchain_config = ":cc_toolchain_config",
    toolchain_identifier = {{identifier}},
)

{{registration}}"#,
);

const STUB_CONFIG_TEMPLATE: Template = Template::new(
    "stub config script",
    r#"# Generated by ccbind. Do not edit.

def _unavailable_impl(ctx):
    fail({{message}})

cc_toolchain_config = rule(
    implementation = _unavailable_impl,
    attrs = {},
    provides = [CcToolchainConfigInfo],
)
"#,
);

/// Outcome of provisioning one requested toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provision {
    /// Artifacts exist; emit the real descriptor.
    Available {
        /// Requested toolchain.
        id: ToolchainId,
        /// Its resolved target.
        target: EffectiveTarget,
        /// Artifacts found in the catalog.
        paths: ToolchainPaths,
    },
    /// Artifacts are missing; emit a stub that fails on use.
    Unavailable {
        /// Requested toolchain.
        id: ToolchainId,
        /// Its resolved target; the stub still registers these constraints.
        target: EffectiveTarget,
        /// The absent `cc/` directory.
        missing: PathBuf,
    },
}

impl Provision {
    /// The provisioned toolchain.
    pub fn id(&self) -> &ToolchainId {
        match self {
            Self::Available { id, .. } | Self::Unavailable { id, .. } => id,
        }
    }

    /// Resolved target, present for stubs too.
    pub fn target(&self) -> &EffectiveTarget {
        match self {
            Self::Available { target, .. } | Self::Unavailable { target, .. } => target,
        }
    }

    /// `true` unless this is a stub.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    /// The deferred error a stub raises when used, if this is a stub.
    pub fn unavailable_error(&self) -> Option<ResolveError> {
        match self {
            Self::Available { .. } => None,
            Self::Unavailable { id, missing, .. } => Some(ResolveError::ToolchainUnavailable {
                toolchain: id.to_string(),
                missing: missing.clone(),
            }),
        }
    }

    /// Render the descriptor set for this provision.
    pub fn descriptor(&self, extra_includes: &[String]) -> Result<ToolchainDescriptor> {
        match self {
            Self::Available { id, target, paths } => {
                descriptor::toolchain_descriptor(target, id, paths, extra_includes)
            }
            Self::Unavailable { id, target, missing } => stub_descriptor(id, target, missing),
        }
    }
}

/// Resolve the declared target and check the catalog for artifacts.
///
/// Target errors are fatal for this toolchain; a missing artifact tree is
/// not, it yields [`Provision::Unavailable`].
pub fn provision(
    catalog: &PathCatalog,
    id: &ToolchainId,
    spec: &TargetSpec,
    static_link: bool,
) -> Result<Provision> {
    let target = target::resolve(spec, static_link)?;
    Ok(match catalog.toolchain(id)? {
        Some(paths) => Provision::Available {
            id: id.clone(),
            target,
            paths,
        },
        None => Provision::Unavailable {
            id: id.clone(),
            target,
            missing: catalog.cc_dir(id),
        },
    })
}

fn stub_descriptor(
    id: &ToolchainId,
    target: &EffectiveTarget,
    missing: &std::path::Path,
) -> Result<ToolchainDescriptor> {
    let mut slots = Slots::new();
    slots
        .set("name", id.as_str())
        .set("identifier", starlark::string(&id.repo_name()))
        .set("registration", descriptor::render_registration(target)?);
    let build_file = STUB_BUILD_TEMPLATE.render(&slots)?;

    let message = format!(
        "ccbind: toolchain '{id}' is not available in this environment ({} does not exist). \
         Switch to an environment that provides this toolchain and run `ccbind generate` again.",
        missing.display()
    );
    let mut slots = Slots::new();
    slots.set("message", starlark::string(&message));
    let config_script = STUB_CONFIG_TEMPLATE.render(&slots)?;

    Ok(ToolchainDescriptor {
        id: id.clone(),
        build_file,
        config_script: ConfigScript::Generated(config_script),
        links: Vec::new(),
        available: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn aarch64_spec() -> TargetSpec {
        TargetSpec {
            cpu: Some("aarch64".into()),
            triple: Some("aarch64-unknown-linux-gnu".into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_cc_dir_yields_stub() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("toolchains")).unwrap();
        let catalog = PathCatalog::new(dir.path());
        let id = ToolchainId::from("aarch64");

        let p = provision(&catalog, &id, &aarch64_spec(), false).unwrap();
        assert!(!p.is_available());
        assert!(matches!(
            p.unavailable_error(),
            Some(ResolveError::ToolchainUnavailable { ref toolchain, .. }) if toolchain == "aarch64"
        ));

        let desc = p.descriptor(&[]).unwrap();
        assert!(!desc.available);
        assert!(desc.links.is_empty());
        // Graph construction only needs the rules to exist.
        assert!(desc.build_file.contains("name = \"cc_toolchain\""));
        assert!(desc.build_file.contains("name = \"toolchain\""));
        assert!(desc.build_file.contains(r#""@platforms//cpu:aarch64","#));

        // The failure lives in the rule implementation, which only runs on use.
        let ConfigScript::Generated(script) = desc.config_script else {
            panic!("stub config script must be generated");
        };
        let impl_start = script.find("def _unavailable_impl(ctx):").unwrap();
        let fail_at = script.find("fail(").unwrap();
        assert!(fail_at > impl_start);
        assert_eq!(script.matches("fail(").count(), 1);
        assert!(script.contains("not available in this environment"));
        assert!(script.contains("Switch to an environment"));
        assert!(script.contains(&format!("{}", catalog.cc_dir(&id).display())));
    }

    #[test]
    fn present_cc_dir_is_available() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("toolchains/default/cc")).unwrap();
        let catalog = PathCatalog::new(dir.path());
        let p = provision(&catalog, &"default".into(), &TargetSpec::default(), false).unwrap();
        assert!(p.is_available());
        assert!(p.unavailable_error().is_none());
        let desc = p.descriptor(&[]).unwrap();
        assert!(desc.available);
        assert!(desc.build_file.contains("cc_toolchain_config("));
    }

    #[test]
    fn unsupported_target_is_fatal_even_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = PathCatalog::new(dir.path());
        let spec = TargetSpec {
            cpu: Some("sparc".into()),
            ..Default::default()
        };
        let err = provision(&catalog, &"sparc".into(), &spec, false).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedTarget { .. }));
    }
}
