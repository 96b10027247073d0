//! Target resolution: partial user overrides merged onto a baseline profile.
//!
//! Resolution is a builder: the baseline record for the linking mode is
//! constructed first, each field the caller set is applied on top, and the
//! derived booleans are computed once into an immutable [`EffectiveTarget`].

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::platform;

/// Libc name reported when no libc is linked.
pub const NO_LIBC: &str = "none";

/// Explicit libc selection in a [`TargetSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LibcSpec {
    /// No libc at all (bare-metal).
    None,
    /// A named libc, e.g. `glibc` or `musl`.
    Named(String),
}

/// Partial target description as declared by the user.
///
/// `None` fields keep the baseline value during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Target triple, e.g. `aarch64-unknown-linux-gnu`.
    pub triple: Option<String>,
    /// Target cpu; must map to a platform constraint.
    pub cpu: Option<String>,
    /// Target os; must map to a platform constraint.
    pub os: Option<String>,
    /// Libc choice; `Some(LibcSpec::None)` makes the target bare-metal.
    pub libc: Option<LibcSpec>,
    /// Replaces the assembled link flags verbatim.
    pub link_flags: Option<Vec<String>>,
    /// Path to fortify-headers, added to the builtin include directories.
    pub fortify_headers: Option<String>,
}

/// Fully resolved target.
///
/// Only [`resolve`] constructs this type, which keeps the invariants
/// `is_bare_metal ⇒ is_static` and `needs_dynamic_linker ⇒ !is_static`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveTarget {
    triple: String,
    cpu: String,
    os: String,
    libc_present: bool,
    libc_name: String,
    is_bare_metal: bool,
    is_static: bool,
    needs_dynamic_linker: bool,
    link_flags: Option<Vec<String>>,
    fortify_headers: Option<String>,
}

impl EffectiveTarget {
    /// Target triple.
    pub fn triple(&self) -> &str {
        &self.triple
    }

    /// Target cpu, always in the supported set.
    pub fn cpu(&self) -> &str {
        &self.cpu
    }

    /// Target os, always in the supported set.
    pub fn os(&self) -> &str {
        &self.os
    }

    /// `false` for bare-metal targets.
    pub fn libc_present(&self) -> bool {
        self.libc_present
    }

    /// Libc name, or [`NO_LIBC`] for bare-metal targets.
    pub fn libc_name(&self) -> &str {
        &self.libc_name
    }

    /// Libc was explicitly declared absent.
    pub fn is_bare_metal(&self) -> bool {
        self.is_bare_metal
    }

    /// Static linking was requested, or the target is bare-metal.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Dynamic linux target whose loader must be named at link time.
    pub fn needs_dynamic_linker(&self) -> bool {
        self.needs_dynamic_linker
    }

    /// Declared link flags that replace the template.
    pub fn link_flags_override(&self) -> Option<&[String]> {
        self.link_flags.as_deref()
    }

    /// Fortify-headers include directory, if declared.
    pub fn fortify_headers(&self) -> Option<&str> {
        self.fortify_headers.as_deref()
    }

    /// Linking mode selected for flag assembly.
    pub fn link_mode(&self) -> LinkMode {
        if self.is_bare_metal {
            LinkMode::BareMetal
        } else if self.is_static {
            LinkMode::Static
        } else {
            LinkMode::Dynamic
        }
    }
}

/// Linking mode, in precedence order bare-metal → static → dynamic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkMode {
    /// No libc; `-nostdlib -static`.
    BareMetal,
    /// Fully static against the toolchain's libc.
    Static,
    /// Dynamically linked against the toolchain's libc.
    Dynamic,
}

impl LinkMode {
    /// Name used in descriptors and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BareMetal => "bare-metal",
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Mutable record used while merging; frozen into an [`EffectiveTarget`].
struct TargetBuilder {
    triple: String,
    cpu: String,
    os: String,
    libc: Option<String>,
    link_flags: Option<Vec<String>>,
    fortify_headers: Option<String>,
}

impl TargetBuilder {
    /// musl-like baseline for static toolchains, glibc-like otherwise.
    fn baseline(static_link: bool) -> Self {
        let (triple, libc) = if static_link {
            ("x86_64-unknown-linux-musl", "musl")
        } else {
            ("x86_64-unknown-linux-gnu", "glibc")
        };
        Self {
            triple: triple.into(),
            cpu: "x86_64".into(),
            os: "linux".into(),
            libc: Some(libc.into()),
            link_flags: None,
            fortify_headers: None,
        }
    }

    fn overlay(mut self, spec: &TargetSpec) -> Self {
        if let Some(ref triple) = spec.triple {
            self.triple = triple.clone();
        }
        if let Some(ref cpu) = spec.cpu {
            self.cpu = cpu.clone();
        }
        if let Some(ref os) = spec.os {
            self.os = os.clone();
        }
        match spec.libc {
            Some(LibcSpec::None) => self.libc = None,
            Some(LibcSpec::Named(ref name)) => self.libc = Some(name.clone()),
            None => {}
        }
        if let Some(ref flags) = spec.link_flags {
            self.link_flags = Some(flags.clone());
        }
        if let Some(ref path) = spec.fortify_headers {
            self.fortify_headers = Some(path.clone());
        }
        self
    }

    fn build(self, is_bare_metal: bool, static_link: bool) -> EffectiveTarget {
        let is_static = static_link || is_bare_metal;
        let needs_dynamic_linker = !is_static && !is_bare_metal && self.os == "linux";
        EffectiveTarget {
            libc_present: self.libc.is_some(),
            libc_name: self.libc.unwrap_or_else(|| NO_LIBC.into()),
            triple: self.triple,
            cpu: self.cpu,
            os: self.os,
            is_bare_metal,
            is_static,
            needs_dynamic_linker,
            link_flags: self.link_flags,
            fortify_headers: self.fortify_headers,
        }
    }
}

/// Resolve a partial target against the baseline profile for `static_link`.
///
/// Fails with `UnsupportedTarget` when the merged cpu or os has no platform
/// constraint. Nothing else is validated.
pub fn resolve(spec: &TargetSpec, static_link: bool) -> Result<EffectiveTarget> {
    let merged = TargetBuilder::baseline(static_link).overlay(spec);
    platform::cpu_constraint(&merged.cpu)?;
    platform::os_constraint(&merged.os)?;

    let is_bare_metal = matches!(spec.libc, Some(LibcSpec::None));
    Ok(merged.build(is_bare_metal, static_link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::platform::{SUPPORTED_CPUS, SUPPORTED_OSES};

    fn spec_with(cpu: &str, os: &str, libc: Option<LibcSpec>) -> TargetSpec {
        TargetSpec {
            cpu: Some(cpu.into()),
            os: Some(os.into()),
            libc,
            ..Default::default()
        }
    }

    #[test]
    fn empty_spec_keeps_dynamic_baseline() {
        let t = resolve(&TargetSpec::default(), false).unwrap();
        assert_eq!(t.triple(), "x86_64-unknown-linux-gnu");
        assert_eq!(t.cpu(), "x86_64");
        assert_eq!(t.os(), "linux");
        assert_eq!(t.libc_name(), "glibc");
        assert!(t.libc_present());
        assert!(!t.is_static());
        assert!(t.needs_dynamic_linker());
        assert_eq!(t.link_mode(), LinkMode::Dynamic);
    }

    #[test]
    fn static_flag_selects_musl_baseline() {
        let t = resolve(&TargetSpec::default(), true).unwrap();
        assert_eq!(t.triple(), "x86_64-unknown-linux-musl");
        assert_eq!(t.libc_name(), "musl");
        assert!(t.is_static());
        assert!(!t.is_bare_metal());
        assert!(!t.needs_dynamic_linker());
        assert_eq!(t.link_mode(), LinkMode::Static);
    }

    #[test]
    fn every_set_field_overrides_baseline() {
        let spec = TargetSpec {
            triple: Some("aarch64-unknown-linux-gnu".into()),
            cpu: Some("aarch64".into()),
            os: Some("linux".into()),
            libc: Some(LibcSpec::Named("glibc-2.38".into())),
            link_flags: Some(vec!["-lfoo".into()]),
            fortify_headers: Some("/fortify/include".into()),
        };
        let t = resolve(&spec, false).unwrap();
        assert_eq!(t.triple(), "aarch64-unknown-linux-gnu");
        assert_eq!(t.cpu(), "aarch64");
        assert_eq!(t.libc_name(), "glibc-2.38");
        assert_eq!(t.link_flags_override(), Some(&["-lfoo".to_string()][..]));
        assert_eq!(t.fortify_headers(), Some("/fortify/include"));
    }

    #[test]
    fn explicit_null_libc_is_bare_metal_and_static() {
        let spec = spec_with("arm", "none", Some(LibcSpec::None));
        let t = resolve(&spec, false).unwrap();
        assert!(t.is_bare_metal());
        assert!(t.is_static());
        assert!(!t.libc_present());
        assert_eq!(t.libc_name(), NO_LIBC);
        assert!(!t.needs_dynamic_linker());
        assert_eq!(t.link_mode(), LinkMode::BareMetal);
    }

    #[test]
    fn non_linux_dynamic_target_has_no_dynamic_linker() {
        let t = resolve(&spec_with("aarch64", "macos", None), false).unwrap();
        assert!(!t.is_static());
        assert!(!t.needs_dynamic_linker());
    }

    #[test]
    fn invariants_hold_for_all_valid_combinations() {
        let libcs = [
            None,
            Some(LibcSpec::None),
            Some(LibcSpec::Named("glibc".into())),
            Some(LibcSpec::Named("musl".into())),
        ];
        for cpu in SUPPORTED_CPUS {
            for os in SUPPORTED_OSES {
                for libc in &libcs {
                    for static_link in [false, true] {
                        let t = resolve(&spec_with(cpu, os, libc.clone()), static_link).unwrap();
                        if t.is_bare_metal() {
                            assert!(t.is_static(), "{t:?}");
                        }
                        if t.needs_dynamic_linker() {
                            assert!(!t.is_static(), "{t:?}");
                        }
                        assert_eq!(t.is_bare_metal(), matches!(libc, Some(LibcSpec::None)));
                    }
                }
            }
        }
    }

    #[test]
    fn resolve_is_deterministic() {
        let spec = spec_with("riscv64", "linux", Some(LibcSpec::Named("musl".into())));
        let a = resolve(&spec, true).unwrap();
        let b = resolve(&spec, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn unsupported_cpu_or_os_fails() {
        let err = resolve(&spec_with("sparc64", "linux", None), false).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedTarget { field: "cpu", .. }));

        let err = resolve(&spec_with("x86_64", "windows", None), false).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedTarget { field: "os", .. }));
    }
}
