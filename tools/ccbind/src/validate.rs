//! Post-evaluation validation of the [`DeclModel`].
//!
//! Checks naming (non-empty, unique, safe to embed in repository names)
//! and referential integrity (library toolchain lists name declared
//! toolchains). Target values are not checked here; resolution reports
//! those per toolchain.

use std::collections::{HashMap, HashSet};

use ccbind_core::ident;

use anyhow::{Result, bail, ensure};

use crate::model::DeclModel;

/// Validate a fully populated declaration model.
pub fn validate_model(model: &DeclModel) -> Result<()> {
    validate_project(model)?;
    validate_toolchains(model)?;
    validate_libraries(model)?;
    validate_library_dirs(model)?;
    Ok(())
}

/// Names end up in repository names and paths (`<lib>_<toolchain>`).
fn check_name(kind: &str, name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "{kind} name must not be empty");
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        bail!("{kind} name '{name}' contains invalid character '{bad}'");
    }
    ensure!(
        !name.starts_with('.'),
        "{kind} name '{name}' must not start with '.'"
    );
    Ok(())
}

fn validate_project(model: &DeclModel) -> Result<()> {
    ensure!(!model.project.name.is_empty(), "project name is required");
    Ok(())
}

fn validate_toolchains(model: &DeclModel) -> Result<()> {
    ensure!(
        !model.toolchains.is_empty(),
        "at least one toolchain must be declared"
    );
    let mut seen = HashSet::new();
    for tc in &model.toolchains {
        check_name("toolchain", &tc.name)?;
        ensure!(seen.insert(&tc.name), "toolchain '{}' declared twice", tc.name);
        for dir in &tc.extra_includes {
            ensure!(
                !dir.is_empty(),
                "toolchain '{}' has an empty extra include directory",
                tc.name
            );
        }
    }
    Ok(())
}

fn validate_libraries(model: &DeclModel) -> Result<()> {
    let mut seen = HashSet::new();
    for lib in &model.libraries {
        check_name("library", &lib.name)?;
        ensure!(seen.insert(&lib.name), "library '{}' declared twice", lib.name);
        for tc in &lib.toolchains {
            ensure!(
                model.toolchain(tc).is_some(),
                "library '{}' references toolchain '{tc}' which is not defined",
                lib.name
            );
        }
    }
    Ok(())
}

/// Alias and variant directories share `libs/`; no two may have the same name.
fn validate_library_dirs(model: &DeclModel) -> Result<()> {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut claim = |dir: String, owner: String| -> Result<()> {
        if let Some(first) = owners.get(&dir) {
            bail!("output directory 'libs/{dir}' is claimed by both {first} and {owner}");
        }
        owners.insert(dir, owner);
        Ok(())
    };
    for lib in &model.libraries {
        claim(lib.name.clone(), format!("the alias of library '{}'", lib.name))?;
    }
    for lib in &model.libraries {
        for tc in model.library_toolchains(lib) {
            claim(
                ident::library_variant_repo(&lib.name, &tc.id()),
                format!("library '{}' built for toolchain '{}'", lib.name, tc.name),
            )?;
        }
    }
    Ok(())
}
