//! Selector-based alias generation for libraries.
//!
//! One alias per library dispatches to a per-toolchain variant by cpu
//! constraint, with the default toolchain's variant as the fallback branch.

use serde::Serialize;

use crate::error::Result;
use crate::ident::{self, ToolchainId};
use crate::platform::{self, DEFAULT_CONDITION};
use crate::starlark;
use crate::template::{Slots, Template};

const ALIAS_TEMPLATE: Template = Template::new(
    "library alias",
    r#"# Generated by ccbind for library "{{name}}". Do not edit.

package(default_visibility = ["//visibility:public"])

alias(
    name = {{target_name}},
    actual = select({{selector}}),
)
"#,
);

/// A declared toolchain as seen by the alias generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainRef {
    /// Toolchain identity.
    pub id: ToolchainId,
    /// Resolved target cpu; `None` when the toolchain failed to resolve.
    pub cpu: Option<String>,
}

impl ToolchainRef {
    /// Reference a toolchain with its resolved cpu.
    pub fn new(id: ToolchainId, cpu: Option<String>) -> Self {
        Self { id, cpu }
    }
}

/// One `condition → actual` entry of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    /// Constraint label, or `//conditions:default`.
    pub condition: String,
    /// Label of the library variant selected by `condition`.
    pub actual: String,
}

/// Alias for one library: constraint branches plus exactly one default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasDescriptor {
    /// Library name; also the alias target name.
    pub library: String,
    /// Constraint branches in declaration order.
    pub branches: Vec<Branch>,
    /// Fallback branch pointing at the default toolchain's variant.
    pub default: Branch,
}

impl AliasDescriptor {
    /// All branches in emission order, default last.
    pub fn all_branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.iter().chain(std::iter::once(&self.default))
    }

    /// Render the alias build file.
    pub fn render(&self) -> Result<String> {
        let pairs: Vec<(&str, &str)> = self
            .all_branches()
            .map(|b| (b.condition.as_str(), b.actual.as_str()))
            .collect();
        let mut slots = Slots::new();
        slots
            .set("name", self.library.as_str())
            .set("target_name", starlark::string(&self.library))
            .set("selector", starlark::string_dict(&pairs, 8));
        ALIAS_TEMPLATE.render(&slots)
    }
}

/// Build the alias for `library` over the declared toolchains.
///
/// Toolchains without a resolved cpu get no branch. The default toolchain's
/// cpu constraint belongs to the fallback branch, and a constraint already
/// taken by an earlier toolchain is skipped, since selector keys must be
/// unique.
pub fn generate(library: &str, declared: &[ToolchainRef], default: &ToolchainId) -> AliasDescriptor {
    let constraint =
        |tc: &ToolchainRef| tc.cpu.as_deref().and_then(|cpu| platform::cpu_constraint(cpu).ok());
    let mut taken: Vec<String> = declared
        .iter()
        .filter(|tc| &tc.id == default)
        .filter_map(constraint)
        .collect();

    let mut branches: Vec<Branch> = Vec::new();
    for tc in declared {
        if &tc.id == default {
            continue;
        }
        let Some(condition) = constraint(tc) else {
            continue;
        };
        if taken.contains(&condition) {
            continue;
        }
        taken.push(condition.clone());
        branches.push(Branch {
            condition,
            actual: ident::library_variant_label(library, &tc.id),
        });
    }

    AliasDescriptor {
        library: library.to_string(),
        branches,
        default: Branch {
            condition: DEFAULT_CONDITION.to_string(),
            actual: ident::library_variant_label(library, default),
        },
    }
}
