//! Toolchain descriptor rendering.
//!
//! Renders the build file for one toolchain (config rule, `cc_toolchain`,
//! `toolchain` and `platform` rules) from a resolved target and its
//! assembled flags. Output is a pure function of the inputs; identical
//! inputs always yield byte-identical text.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::catalog::{ToolchainPaths, CONFIG_SCRIPT};
use crate::error::Result;
use crate::flags::FlagSet;
use crate::ident::ToolchainId;
use crate::platform;
use crate::starlark;
use crate::target::EffectiveTarget;
use crate::template::{Slots, Template};

/// Tools referenced by the config rule, in emission order.
pub const TOOLS: &[&str] = &["ar", "cpp", "gcc", "gcov", "ld", "nm", "objcopy", "objdump", "strip"];

const BUILD_TEMPLATE: Template = Template::new(
    "toolchain BUILD",
    r#"# Generated by ccbind for toolchain "{{name}}" ({{mode}}). Do not edit.

load(":cc_toolchain_config.bzl", "cc_toolchain_config")

package(default_visibility = ["//visibility:public"])

filegroup(
    name = "empty",
    srcs = [],
)

filegroup(
    name = "all_files",
    srcs = glob(["bin/**", "deps/**"]),
)

cc_toolchain_config(
    name = "cc_toolchain_config",
    cpu = {{cpu}},
    compiler = "gcc",
    toolchain_identifier = {{identifier}},
    host_system_name = "local",
    target_system_name = {{triple}},
    target_libc = {{libc}},
    abi_version = {{libc}},
    abi_libc_version = {{libc}},
    cxx_builtin_include_directories = {{include_dirs}},
    tool_paths = {{tool_paths}},
    compile_flags = {{compile_flags}},
    cxx_flags = {{cxx_flags}},
    conly_flags = {{conly_flags}},
    link_flags = {{link_flags}},
    link_libs = [],
    opt_compile_flags = {{opt_compile_flags}},
    opt_link_flags = {{opt_link_flags}},
    dbg_compile_flags = {{dbg_compile_flags}},
    unfiltered_compile_flags = {{unfiltered_flags}},
    coverage_compile_flags = ["--coverage"],
    coverage_link_flags = ["--coverage"],
    supports_start_end_lib = False,
)

cc_toolchain(
    name = "cc_toolchain",
    all_files = ":all_files",
    ar_files = ":all_files",
    as_files = ":all_files",
    compiler_files = ":all_files",
    dwp_files = ":empty",
    linker_files = ":all_files",
    objcopy_files = ":all_files",
    strip_files = ":all_files",
    supports_param_files = 1,
    toolchain_config = ":cc_toolchain_config",
    toolchain_identifier = {{identifier}},
)

{{registration}}"#,
);

const REGISTRATION_TEMPLATE: Template = Template::new(
    "toolchain registration",
    r#"toolchain(
    name = "toolchain",
    target_compatible_with = {{constraints}},
    toolchain = ":cc_toolchain",
    toolchain_type = "@bazel_tools//tools/cpp:toolchain_type",
)

platform(
    name = "platform",
    constraint_values = {{constraints}},
)
"#,
);

const REGISTRATION_LIST_TEMPLATE: Template = Template::new(
    "registration list",
    r#"# Generated by ccbind. Do not edit.

CCBIND_TOOLCHAINS = {{toolchains}}

CCBIND_PLATFORMS = {{platforms}}
"#,
);

const CONFIG_SCRIPT_SHIM: &str = r#"# Generated by ccbind. Do not edit.

load("@bazel_tools//tools/cpp:unix_cc_toolchain_config.bzl", _cc_toolchain_config = "cc_toolchain_config")

cc_toolchain_config = _cc_toolchain_config
"#;

/// Flags that keep compiler output independent of the build machine.
const UNFILTERED_FLAGS: &[&str] = &[
    "-no-canonical-prefixes",
    "-Wno-builtin-macro-redefined",
    "-D__DATE__=\"redacted\"",
    "-D__TIMESTAMP__=\"redacted\"",
    "-D__TIME__=\"redacted\"",
];

/// Where a toolchain's config script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScript {
    /// Rendered by ccbind.
    Generated(String),
    /// Shipped with the toolchain; linked into place.
    Linked(PathBuf),
}

/// A symlink to create inside a generated directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Link {
    /// Path relative to the generated directory.
    pub dest: PathBuf,
    /// Absolute path the link points at.
    pub source: PathBuf,
}

/// Complete descriptor set for one toolchain.
///
/// Built fully in memory so that it can be written in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainDescriptor {
    /// Toolchain this set belongs to.
    pub id: ToolchainId,
    /// Rendered `BUILD.bazel`.
    pub build_file: String,
    /// Contents or source of `cc_toolchain_config.bzl`.
    pub config_script: ConfigScript,
    /// Binary and dependency links, sorted by destination.
    pub links: Vec<Link>,
    /// `false` for stub descriptors.
    pub available: bool,
}

/// Resolve tool paths against the binaries a toolchain ships.
///
/// Prefers the triple-prefixed binary (`<triple>-gcc`), then the plain
/// name; when neither exists the plain path is still declared so the
/// failure surfaces when the tool is run.
pub fn tool_paths(triple: &str, binaries: &BTreeMap<String, PathBuf>) -> Vec<(String, String)> {
    TOOLS
        .iter()
        .map(|tool| {
            let prefixed = format!("{triple}-{tool}");
            let file = if binaries.contains_key(&prefixed) {
                prefixed
            } else {
                (*tool).to_string()
            };
            ((*tool).to_string(), format!("bin/{file}"))
        })
        .collect()
}

/// Platform constraint labels (cpu, then os) for a target.
pub fn platform_constraints(target: &EffectiveTarget) -> Result<Vec<String>> {
    Ok(vec![
        platform::cpu_constraint(target.cpu())?,
        platform::os_constraint(target.os())?,
    ])
}

/// Render the `toolchain` and `platform` rules shared by real and stub descriptors.
pub(crate) fn render_registration(target: &EffectiveTarget) -> Result<String> {
    let constraints = platform_constraints(target)?;
    let mut slots = Slots::new();
    slots.set("constraints", starlark::string_list(&constraints, 8));
    REGISTRATION_TEMPLATE.render(&slots)
}

/// Render the build file of an available toolchain.
pub fn emit(
    target: &EffectiveTarget,
    include_paths: &[String],
    flags: &FlagSet,
    id: &ToolchainId,
    tools: &[(String, String)],
) -> Result<String> {
    let mut slots = Slots::new();
    slots
        .set("name", id.as_str())
        .set("mode", target.link_mode().as_str())
        .set("identifier", starlark::string(&id.repo_name()))
        .set("cpu", starlark::string(target.cpu()))
        .set("triple", starlark::string(target.triple()))
        .set("libc", starlark::string(target.libc_name()))
        .set("include_dirs", starlark::string_list(include_paths, 8))
        .set("tool_paths", starlark::string_dict(tools, 8))
        .set("compile_flags", starlark::string_list(&flags.compile, 8))
        .set("cxx_flags", starlark::string_list(&flags.cxx, 8))
        .set("conly_flags", starlark::string_list(&flags.conly, 8))
        .set("link_flags", starlark::string_list(&flags.link, 8))
        .set("opt_compile_flags", starlark::string_list(&flags.opt_compile, 8))
        .set("opt_link_flags", starlark::string_list(&flags.opt_link, 8))
        .set("dbg_compile_flags", starlark::string_list(&flags.dbg_compile, 8))
        .set("unfiltered_flags", starlark::string_list(UNFILTERED_FLAGS, 8))
        .set("registration", render_registration(target)?);
    BUILD_TEMPLATE.render(&slots)
}

/// Assemble the full descriptor set of an available toolchain.
pub fn toolchain_descriptor(
    target: &EffectiveTarget,
    id: &ToolchainId,
    paths: &ToolchainPaths,
    extra_includes: &[String],
) -> Result<ToolchainDescriptor> {
    let includes = crate::flags::include_paths(target, id, extra_includes);
    let flags = FlagSet::assemble(target, id, extra_includes);
    let tools = tool_paths(target.triple(), &paths.binaries);
    let build_file = emit(target, &includes, &flags, id, &tools)?;

    let config_script = match paths.config_script {
        Some(ref script) => ConfigScript::Linked(script.clone()),
        None => ConfigScript::Generated(CONFIG_SCRIPT_SHIM.to_string()),
    };

    let mut links: Vec<Link> = paths
        .binaries
        .iter()
        .map(|(name, source)| Link {
            dest: PathBuf::from("bin").join(name),
            source: source.clone(),
        })
        .chain(paths.deps.iter().map(|(name, source)| Link {
            dest: PathBuf::from("deps").join(name),
            source: source.clone(),
        }))
        .collect();
    links.sort();

    Ok(ToolchainDescriptor {
        id: id.clone(),
        build_file,
        config_script,
        links,
        available: true,
    })
}

/// Render the `toolchains.bzl` list consumed by `register_toolchains`.
///
/// Labels follow declaration order.
pub fn registration_list(ids: &[ToolchainId]) -> Result<String> {
    let toolchains: Vec<String> = ids.iter().map(ToolchainId::toolchain_label).collect();
    let platforms: Vec<String> = ids.iter().map(ToolchainId::platform_label).collect();
    let mut slots = Slots::new();
    slots
        .set("toolchains", starlark::string_list(&toolchains, 4))
        .set("platforms", starlark::string_list(&platforms, 4));
    REGISTRATION_LIST_TEMPLATE.render(&slots)
}

/// File name under which a descriptor's config script is written.
pub fn config_script_name() -> &'static str {
    CONFIG_SCRIPT
}
