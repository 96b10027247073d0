//! Include-path and flag assembly for a resolved target.
//!
//! Each linking mode has a fixed, ordered template. Paths are rooted in the
//! toolchain's own repository namespace so that several toolchains can
//! coexist in one build without their flags colliding. Linkers are
//! order-sensitive: search paths (`-L`) come before binary search paths
//! (`-B`), which come before linker options (`-Wl,`), which come before
//! libraries (`-l`).

use serde::Serialize;

use crate::ident::ToolchainId;
use crate::target::{EffectiveTarget, LinkMode};

/// Ordered flag groups, one per action class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagSet {
    /// All compile actions.
    pub compile: Vec<String>,
    /// C++-only compile actions.
    pub cxx: Vec<String>,
    /// C-only compile actions.
    pub conly: Vec<String>,
    /// Link actions.
    pub link: Vec<String>,
    /// Compile actions in optimized mode.
    pub opt_compile: Vec<String>,
    /// Link actions in optimized mode.
    pub opt_link: Vec<String>,
    /// Compile actions in debug mode.
    pub dbg_compile: Vec<String>,
}

impl FlagSet {
    /// Assemble every flag group for `target` in the `id` namespace.
    pub fn assemble(target: &EffectiveTarget, id: &ToolchainId, extra_includes: &[String]) -> Self {
        let mut compile: Vec<String> = match target.link_mode() {
            LinkMode::BareMetal => strs(&["-ffreestanding", "-fno-stack-protector", "-Wall"]),
            LinkMode::Static | LinkMode::Dynamic => strs(&[
                "-U_FORTIFY_SOURCE",
                "-fstack-protector",
                "-Wall",
                "-Wunused-but-set-parameter",
                "-Wno-free-nonheap-object",
            ]),
        };
        compile.push("-fno-omit-frame-pointer".into());

        // Static and bare-metal builds must not pick up host headers.
        if target.link_mode() != LinkMode::Dynamic {
            compile.push("-nostdinc".into());
            for dir in include_paths(target, id, extra_includes) {
                compile.push("-isystem".into());
                compile.push(dir);
            }
        }

        let mut opt_compile = strs(&[
            "-g0",
            "-O2",
            "-DNDEBUG",
            "-ffunction-sections",
            "-fdata-sections",
        ]);
        if target.fortify_headers().is_some() {
            opt_compile.push("-D_FORTIFY_SOURCE=2".into());
        }

        let opt_link = if target.os() == "macos" {
            strs(&["-Wl,-dead_strip"])
        } else {
            strs(&["-Wl,--gc-sections"])
        };

        Self {
            compile,
            cxx: strs(&["-std=c++17"]),
            conly: strs(&["-std=c11"]),
            link: link_flags(target, id),
            opt_compile,
            opt_link,
            dbg_compile: strs(&["-g"]),
        }
    }
}

/// Builtin include directories, in concatenation order: fixed compiler
/// entries, libc headers, fortify headers, then wrapper-injected extras.
pub fn include_paths(target: &EffectiveTarget, id: &ToolchainId, extra: &[String]) -> Vec<String> {
    let deps = deps_dir(id);
    let mut paths = vec![format!("{deps}/gcc/include"), format!("{deps}/gcc/lib/gcc")];
    if target.libc_present() {
        paths.push(format!("{deps}/libc-dev/include"));
    }
    if let Some(fortify) = target.fortify_headers() {
        paths.push(fortify.to_string());
    }
    paths.extend(extra.iter().cloned());
    paths
}

/// Link flags for the target's linking mode.
///
/// An explicit override in the target spec replaces the template.
pub fn link_flags(target: &EffectiveTarget, id: &ToolchainId) -> Vec<String> {
    if let Some(flags) = target.link_flags_override() {
        return flags.to_vec();
    }

    let deps = deps_dir(id);
    match target.link_mode() {
        LinkMode::BareMetal => vec![
            "-nostdlib".into(),
            "-static".into(),
            format!("-L{deps}/gcc-lib/lib"),
            format!("-B{deps}/binutils/bin"),
            "-lgcc".into(),
        ],
        LinkMode::Static => vec![
            "-static".into(),
            format!("-L{deps}/gcc-lib/lib"),
            format!("-L{deps}/libc/lib"),
            format!("-B{deps}/libc/lib"),
            format!("-B{deps}/binutils/bin"),
            "-lstdc++".into(),
            "-lm".into(),
            "-lc".into(),
            "-lgcc".into(),
        ],
        LinkMode::Dynamic => {
            let mut flags = vec![
                format!("-L{deps}/gcc-lib/lib"),
                format!("-L{deps}/libc/lib"),
                format!("-B{deps}/libc/lib"),
                format!("-B{deps}/binutils/bin"),
            ];
            if target.needs_dynamic_linker() {
                flags.push(format!(
                    "-Wl,--dynamic-linker={deps}/libc/lib/{}",
                    dynamic_linker(target.cpu(), target.libc_name())
                ));
            }
            flags.push(format!("-Wl,-rpath,{deps}/gcc-lib/lib"));
            flags.push("-lstdc++".into());
            flags.push("-lm".into());
            flags
        }
    }
}

/// File name of the runtime loader for `cpu` under `libc`.
pub fn dynamic_linker(cpu: &str, libc: &str) -> String {
    if libc.starts_with("musl") {
        return format!("ld-musl-{}.so.1", musl_arch(cpu));
    }
    match cpu {
        "x86_64" => "ld-linux-x86-64.so.2".into(),
        "aarch64" => "ld-linux-aarch64.so.1".into(),
        "arm" => "ld-linux-armhf.so.3".into(),
        "riscv64" => "ld-linux-riscv64-lp64d.so.1".into(),
        _ => "ld.so.1".into(),
    }
}

fn musl_arch(cpu: &str) -> &str {
    match cpu {
        "arm" => "armhf",
        other => other,
    }
}

fn deps_dir(id: &ToolchainId) -> String {
    format!("{}/deps", id.namespace())
}

fn strs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{resolve, LibcSpec, TargetSpec};

    fn dynamic_target() -> EffectiveTarget {
        resolve(&TargetSpec::default(), false).unwrap()
    }

    fn static_target() -> EffectiveTarget {
        resolve(&TargetSpec::default(), true).unwrap()
    }

    fn bare_metal_target() -> EffectiveTarget {
        let spec = TargetSpec {
            cpu: Some("arm".into()),
            os: Some("none".into()),
            libc: Some(LibcSpec::None),
            ..Default::default()
        };
        resolve(&spec, false).unwrap()
    }

    fn position(flags: &[String], pred: impl Fn(&str) -> bool) -> Option<usize> {
        flags.iter().position(|f| pred(f))
    }

    #[test]
    fn static_link_flags_exact_order() {
        let id = ToolchainId::from("musl");
        let flags = link_flags(&static_target(), &id);
        assert_eq!(
            flags,
            vec![
                "-static",
                "-Lexternal/cc_toolchain_musl/deps/gcc-lib/lib",
                "-Lexternal/cc_toolchain_musl/deps/libc/lib",
                "-Bexternal/cc_toolchain_musl/deps/libc/lib",
                "-Bexternal/cc_toolchain_musl/deps/binutils/bin",
                "-lstdc++",
                "-lm",
                "-lc",
                "-lgcc",
            ]
        );
    }

    #[test]
    fn static_search_paths_precede_libraries() {
        let flags = link_flags(&static_target(), &ToolchainId::from("default"));
        let gcc_lib = position(&flags, |f| f.starts_with("-L") && f.contains("/gcc-lib/")).unwrap();
        let libc = position(&flags, |f| f.starts_with("-L") && f.contains("/libc/")).unwrap();
        let first_lib = position(&flags, |f| f.starts_with("-l")).unwrap();
        let last_search = flags.iter().rposition(|f| f.starts_with("-L")).unwrap();
        let first_bin = position(&flags, |f| f.starts_with("-B")).unwrap();
        assert!(gcc_lib < first_lib && libc < first_lib);
        assert!(last_search < first_bin && first_bin < first_lib);
    }

    #[test]
    fn dynamic_flags_include_dynamic_linker_on_linux() {
        let flags = link_flags(&dynamic_target(), &ToolchainId::from("default"));
        assert_eq!(
            flags,
            vec![
                "-Lexternal/cc_toolchain_default/deps/gcc-lib/lib",
                "-Lexternal/cc_toolchain_default/deps/libc/lib",
                "-Bexternal/cc_toolchain_default/deps/libc/lib",
                "-Bexternal/cc_toolchain_default/deps/binutils/bin",
                "-Wl,--dynamic-linker=external/cc_toolchain_default/deps/libc/lib/ld-linux-x86-64.so.2",
                "-Wl,-rpath,external/cc_toolchain_default/deps/gcc-lib/lib",
                "-lstdc++",
                "-lm",
            ]
        );
    }

    #[test]
    fn dynamic_linker_flag_present_iff_needed() {
        let macos = resolve(
            &TargetSpec {
                cpu: Some("aarch64".into()),
                os: Some("macos".into()),
                ..Default::default()
            },
            false,
        )
        .unwrap();
        let id = ToolchainId::from("x");
        for target in [dynamic_target(), static_target(), bare_metal_target(), macos] {
            let flags = link_flags(&target, &id);
            let has = flags.iter().any(|f| f.contains("--dynamic-linker="));
            assert_eq!(has, target.needs_dynamic_linker(), "{target:?}");
        }
    }

    #[test]
    fn bare_metal_template_wins_over_static() {
        let flags = link_flags(&bare_metal_target(), &ToolchainId::from("bare"));
        assert_eq!(flags[0], "-nostdlib");
        assert!(!flags.iter().any(|f| f.contains("/libc/")));
        assert_eq!(flags.last().map(String::as_str), Some("-lgcc"));
    }

    #[test]
    fn override_replaces_template() {
        let spec = TargetSpec {
            link_flags: Some(vec!["-Wl,-z,now".into(), "-lc".into()]),
            ..Default::default()
        };
        let t = resolve(&spec, true).unwrap();
        assert_eq!(link_flags(&t, &ToolchainId::from("x")), vec!["-Wl,-z,now", "-lc"]);
    }

    #[test]
    fn loader_names() {
        assert_eq!(dynamic_linker("aarch64", "glibc"), "ld-linux-aarch64.so.1");
        assert_eq!(dynamic_linker("mips64", "glibc"), "ld.so.1");
        assert_eq!(dynamic_linker("x86_64", "musl"), "ld-musl-x86_64.so.1");
        assert_eq!(dynamic_linker("arm", "musl"), "ld-musl-armhf.so.1");
    }

    #[test]
    fn include_paths_concatenation_order() {
        let spec = TargetSpec {
            fortify_headers: Some("/fortify/include".into()),
            ..Default::default()
        };
        let t = resolve(&spec, true).unwrap();
        let paths = include_paths(&t, &ToolchainId::from("musl"), &["/wrap/include".into()]);
        assert_eq!(
            paths,
            vec![
                "external/cc_toolchain_musl/deps/gcc/include",
                "external/cc_toolchain_musl/deps/gcc/lib/gcc",
                "external/cc_toolchain_musl/deps/libc-dev/include",
                "/fortify/include",
                "/wrap/include",
            ]
        );
    }

    #[test]
    fn bare_metal_has_no_libc_includes() {
        let paths = include_paths(&bare_metal_target(), &ToolchainId::from("bare"), &[]);
        assert_eq!(paths.len(), 2);
        assert!(!paths.iter().any(|p| p.contains("libc-dev")));
    }

    #[test]
    fn static_compile_flags_isolate_host_headers() {
        let id = ToolchainId::from("musl");
        let set = FlagSet::assemble(&static_target(), &id, &[]);
        let nostdinc = set.compile.iter().position(|f| f == "-nostdinc").unwrap();
        assert_eq!(set.compile[nostdinc + 1], "-isystem");
        assert_eq!(set.compile[nostdinc + 2], "external/cc_toolchain_musl/deps/gcc/include");

        let dynamic = FlagSet::assemble(&dynamic_target(), &id, &[]);
        assert!(!dynamic.compile.iter().any(|f| f == "-nostdinc"));
        assert_eq!(dynamic.link, link_flags(&dynamic_target(), &id));
    }
}
