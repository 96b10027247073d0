//! Mapping of target cpu/os names onto build-system platform constraints.
//!
//! The vocabulary is closed: values outside the supported sets fail with
//! [`ResolveError::UnsupportedTarget`] rather than falling back to a default.

use crate::error::{ResolveError, Result};

/// CPU names with a known platform constraint.
pub const SUPPORTED_CPUS: &[&str] = &["x86_64", "mips64", "aarch64", "arm", "riscv64"];

/// OS names with a known platform constraint.
pub const SUPPORTED_OSES: &[&str] = &["linux", "none", "macos"];

/// Constraint label used for the fallback branch of a selector.
pub const DEFAULT_CONDITION: &str = "//conditions:default";

/// Map a cpu name to its constraint label (`@platforms//cpu:<cpu>`).
pub fn cpu_constraint(cpu: &str) -> Result<String> {
    lookup("cpu", cpu, SUPPORTED_CPUS)
}

/// Map an os name to its constraint label (`@platforms//os:<os>`).
pub fn os_constraint(os: &str) -> Result<String> {
    lookup("os", os, SUPPORTED_OSES)
}

fn lookup(field: &'static str, value: &str, supported: &'static [&'static str]) -> Result<String> {
    if supported.contains(&value) {
        Ok(format!("@platforms//{field}:{value}"))
    } else {
        Err(ResolveError::UnsupportedTarget {
            field,
            value: value.to_string(),
            supported,
        })
    }
}
