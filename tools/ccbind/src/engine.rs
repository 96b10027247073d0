//! Rhai scripting engine for ccbind declarations.
//!
//! Registers the declaration API on a Rhai engine, evaluates
//! `ccbind.rhai`, and produces a [`DeclModel`].
//!
//! ```rhai
//! project("demo");
//! toolchain("default");
//! toolchain("aarch64").cpu("aarch64").triple("aarch64-unknown-linux-gnu");
//! toolchain("bare").cpu("arm").os("none").libc(());
//! library("zlib").toolchains(["default", "aarch64"]);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use ccbind_core::target::LibcSpec;
use rhai::{Array, Dynamic, Engine, EvalAltResult, Position};

use crate::model::{DeclModel, LibraryDef, ToolchainDef};

/// File name of the declaration script at the project root.
pub const SCRIPT_FILE: &str = "ccbind.rhai";

/// Shared model state passed to all builder types.
type SharedModel = Arc<Mutex<DeclModel>>;

/// Canonical paths of scripts already evaluated, for once-only `include`.
type VisitedIncludes = Arc<Mutex<HashSet<PathBuf>>>;

/// Evaluate `ccbind.rhai` under `root` and return the populated model.
pub fn evaluate_script(root: &Path) -> Result<DeclModel> {
    let script_path = root.join(SCRIPT_FILE);
    let source = std::fs::read_to_string(&script_path)
        .with_context(|| format!("failed to read {}", script_path.display()))?;
    let visited = Arc::new(Mutex::new(HashSet::new()));
    if let Ok(canonical) = std::fs::canonicalize(&script_path) {
        lock(&visited)?.insert(canonical);
    }
    evaluate_source(root, &source, &script_path.display().to_string(), visited)
}

/// Evaluate declaration source text with `root` as the project root.
fn evaluate_source(
    root: &Path,
    source: &str,
    origin: &str,
    visited: VisitedIncludes,
) -> Result<DeclModel> {
    let model = Arc::new(Mutex::new(DeclModel::default()));
    let mut engine = Engine::new();
    engine.set_max_expr_depths(64, 64);

    register_project_api(&mut engine, model.clone());
    register_toolchain_api(&mut engine, model.clone());
    register_library_api(&mut engine, model.clone());
    register_helpers(&mut engine, root);
    register_include_api(&mut engine, root, visited)?;

    let mut scope = rhai::Scope::new();
    let ast = engine
        .compile(source)
        .map_err(|e| anyhow!("error compiling {origin}: {e}"))?;
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|e| anyhow!("error evaluating {origin}: {e}"))?;

    // Closures hold clones of the model; release them before unwrapping.
    drop(engine);
    drop(scope);

    Arc::try_unwrap(model)
        .map_err(|_| anyhow!("declaration model still referenced after script evaluation"))?
        .into_inner()
        .map_err(|e| anyhow!("poisoned mutex: {e}"))
}

fn lock<T>(m: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    m.lock().map_err(|e| anyhow!("poisoned mutex: {e}"))
}

/// Convert a script array to strings, rejecting any non-string element.
fn strings(what: &str, arr: Array) -> Result<Vec<String>, Box<EvalAltResult>> {
    arr.into_iter()
        .enumerate()
        .map(|(i, v)| {
            let type_name = v.type_name();
            let shown = v.to_string();
            v.into_string().map_err(|_| {
                Box::new(EvalAltResult::ErrorMismatchDataType(
                    "string".into(),
                    format!("{type_name} `{shown}` at {what}[{i}]"),
                    Position::NONE,
                ))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// project(), deps_root(), output_dir()
// ---------------------------------------------------------------------------

fn register_project_api(engine: &mut Engine, model: SharedModel) {
    let m = model.clone();
    engine.register_fn("project", move |name: &str| {
        m.lock().unwrap().project.name = name.into();
    });

    let m = model.clone();
    engine.register_fn("deps_root", move |path: &str| {
        m.lock().unwrap().deps_root = Some(path.into());
    });

    let m = model;
    engine.register_fn("output_dir", move |path: &str| {
        m.lock().unwrap().output_dir = Some(path.into());
    });
}

// ---------------------------------------------------------------------------
// toolchain() -> ToolchainBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ToolchainBuilder {
    model: SharedModel,
    name: String,
}

impl ToolchainBuilder {
    /// Apply `f` to the declared toolchain and hand the builder back for chaining.
    fn update(&mut self, f: impl FnOnce(&mut ToolchainDef)) -> Self {
        let mut model = self.model.lock().unwrap();
        if let Some(def) = model.toolchain_mut(&self.name) {
            f(def);
        }
        drop(model);
        self.clone()
    }
}

fn register_toolchain_api(engine: &mut Engine, model: SharedModel) {
    engine.register_type_with_name::<ToolchainBuilder>("Toolchain");

    // Redeclaring a toolchain returns a builder for the existing entry.
    let m = model.clone();
    engine.register_fn("toolchain", move |name: &str| -> ToolchainBuilder {
        let mut model = m.lock().unwrap();
        if model.toolchain(name).is_none() {
            model.toolchains.push(ToolchainDef {
                name: name.into(),
                ..Default::default()
            });
        }
        ToolchainBuilder {
            model: m.clone(),
            name: name.into(),
        }
    });

    engine.register_fn("cpu", |b: &mut ToolchainBuilder, cpu: &str| {
        b.update(|t| t.target.cpu = Some(cpu.into()))
    });
    engine.register_fn("os", |b: &mut ToolchainBuilder, os: &str| {
        b.update(|t| t.target.os = Some(os.into()))
    });
    engine.register_fn("triple", |b: &mut ToolchainBuilder, triple: &str| {
        b.update(|t| t.target.triple = Some(triple.into()))
    });

    // libc("musl") names a libc; libc(()) declares a bare-metal target.
    engine.register_fn("libc", |b: &mut ToolchainBuilder, libc: &str| {
        b.update(|t| t.target.libc = Some(LibcSpec::Named(libc.into())))
    });
    engine.register_fn("libc", |b: &mut ToolchainBuilder, _none: ()| {
        b.update(|t| t.target.libc = Some(LibcSpec::None))
    });

    engine.register_fn("static_link", |b: &mut ToolchainBuilder, on: bool| {
        b.update(|t| t.static_link = on)
    });
    engine.register_fn(
        "link_flags",
        |b: &mut ToolchainBuilder, flags: Array| -> Result<ToolchainBuilder, Box<EvalAltResult>> {
            let flags = strings("link_flags", flags)?;
            Ok(b.update(|t| t.target.link_flags = Some(flags)))
        },
    );
    engine.register_fn("fortify_headers", |b: &mut ToolchainBuilder, path: &str| {
        b.update(|t| t.target.fortify_headers = Some(path.into()))
    });
    engine.register_fn(
        "extra_includes",
        |b: &mut ToolchainBuilder, dirs: Array| -> Result<ToolchainBuilder, Box<EvalAltResult>> {
            let dirs = strings("extra_includes", dirs)?;
            Ok(b.update(|t| t.extra_includes.extend(dirs)))
        },
    );
}

// ---------------------------------------------------------------------------
// library() -> LibraryBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LibraryBuilder {
    model: SharedModel,
    name: String,
}

fn register_library_api(engine: &mut Engine, model: SharedModel) {
    engine.register_type_with_name::<LibraryBuilder>("Library");

    let m = model.clone();
    engine.register_fn("library", move |name: &str| -> LibraryBuilder {
        let mut model = m.lock().unwrap();
        if model.library_mut(name).is_none() {
            model.libraries.push(LibraryDef {
                name: name.into(),
                toolchains: Vec::new(),
            });
        }
        LibraryBuilder {
            model: m.clone(),
            name: name.into(),
        }
    });

    engine.register_fn(
        "toolchains",
        |b: &mut LibraryBuilder, names: Array| -> Result<LibraryBuilder, Box<EvalAltResult>> {
            let names = strings("toolchains", names)?;
            let mut model = b.model.lock().unwrap();
            if let Some(lib) = model.library_mut(&b.name) {
                lib.toolchains = names;
            }
            drop(model);
            Ok(b.clone())
        },
    );
}

// ---------------------------------------------------------------------------
// include() custom syntax
// ---------------------------------------------------------------------------

fn include_error(what: String, detail: impl std::fmt::Display) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorSystem(
        what,
        Box::new(std::io::Error::other(detail.to_string())),
    ))
}

fn register_include_api(engine: &mut Engine, root: &Path, visited: VisitedIncludes) -> Result<()> {
    let root_path = root.to_path_buf();

    engine
        .register_custom_syntax(["include", "$expr$"], true, move |context, inputs| {
            let rel_path: String = context
                .eval_expression_tree(&inputs[0])?
                .into_string()
                .map_err(|e| {
                    Box::new(EvalAltResult::ErrorMismatchDataType(
                        "string".into(),
                        e.into(),
                        Position::NONE,
                    ))
                })?;

            // Paths are relative to the project root, not the including file.
            let canonical = std::fs::canonicalize(root_path.join(&rel_path))
                .map_err(|e| include_error(format!("include '{rel_path}'"), e))?;

            {
                let mut seen = visited.lock().unwrap();
                if !seen.insert(canonical.clone()) {
                    return Ok(Dynamic::UNIT);
                }
            }

            let ast = context
                .engine()
                .compile_file(canonical)
                .map_err(|e| include_error(format!("while including '{rel_path}'"), e))?;
            context
                .engine()
                .run_ast_with_scope(context.scope_mut(), &ast)
                .map_err(|e| include_error(format!("while including '{rel_path}'"), e))?;

            Ok(Dynamic::UNIT)
        })
        .map_err(|e| anyhow!("failed to register include syntax: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helper functions available in scripts
// ---------------------------------------------------------------------------

fn register_helpers(engine: &mut Engine, root: &Path) {
    let root_for_project = root.to_path_buf();

    // project_root() -> string
    engine.register_fn("project_root", move || -> String {
        root_for_project.to_string_lossy().into_owned()
    });

    // env("VAR") -> string, empty when unset
    engine.register_fn("env", |var: &str| -> String {
        std::env::var(var).unwrap_or_default()
    });
}
