//! ccbind: binds prebuilt C/C++ toolchains and libraries into Bazel.
//!
//! Pipeline: evaluate ccbind.rhai → validate model → resolve paths →
//!           plan toolchains (parallel) and libraries → write descriptors.

mod cli;
mod config;
mod engine;
mod manifest;
mod materialize;
mod model;
mod plan;
mod pool;
mod validate;
mod verbose;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use ccbind_core::catalog::PathCatalog;
use ccbind_core::synth::{self, Linkage};
use clap::Parser;

use crate::config::ResolvedConfig;
use crate::manifest::Manifest;
use crate::materialize::{LIBS_DIR, Outputs, TOOLCHAINS_DIR};
use crate::plan::Plan;
use crate::verbose::{Timer, Verbosity, dprintln, vprintln};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    verbose::init(Verbosity::from_flags(cli.quiet, cli.verbose));

    match cli.command {
        cli::Command::Resolve(ref args) => cmd_resolve(&cli, args),
        cli::Command::Generate(ref args) => cmd_generate(&cli, args),
        cli::Command::List => cmd_list(&cli),
        cli::Command::Synth(ref args) => cmd_synth(args),
        cli::Command::Clean => cmd_clean(&cli),
    }
}

// ===========================================================================
// Model loading
// ===========================================================================

/// Load and validate the declaration model from `ccbind.rhai`.
fn load_model(root: &Path) -> Result<model::DeclModel> {
    vprintln!("Loading {}...", engine::SCRIPT_FILE);
    let _t = Timer::start("script evaluation");
    let model = engine::evaluate_script(root)?;
    validate::validate_model(&model)?;
    vprintln!(
        "  {} toolchains, {} libraries declared",
        model.toolchains.len(),
        model.libraries.len()
    );
    Ok(model)
}

/// Locate the project, load its model and resolve paths.
fn load_project(cli: &cli::Cli) -> Result<(ResolvedConfig, model::DeclModel)> {
    let root = config::find_project_root()?;
    let model = load_model(&root)?;
    let resolved = config::resolve(cli, &model, &root)?;
    if verbose::enabled(Verbosity::Verbose) {
        config::print_resolved(&resolved);
    }
    Ok((resolved, model))
}

/// Print every failed unit to stderr and turn them into one error.
fn report_failures(plan: &Plan) -> Result<()> {
    for outcome in &plan.toolchains {
        if let Err(ref e) = outcome.result {
            eprintln!("error: {e:#}");
        }
    }
    if let Err(ref e) = plan.libraries {
        eprintln!("error: {e:#}");
    }
    let failed = plan.failure_count();
    if failed > 0 {
        bail!(
            "{failed} of {} units failed",
            plan.toolchains.len() + 1
        );
    }
    Ok(())
}

// ===========================================================================
// Commands
// ===========================================================================

/// Resolve every toolchain and library and print the result.
fn cmd_resolve(cli: &cli::Cli, args: &cli::ResolveArgs) -> Result<()> {
    let (config, model) = load_project(cli)?;
    let catalog = PathCatalog::new(&config.deps_root);
    let plan = Plan::build(&model, &catalog, config.jobs)?;

    if args.json {
        let json = serde_json::to_string_pretty(&plan.report())
            .context("failed to serialize plan")?;
        println!("{json}");
    } else {
        println!("Toolchains:");
        for outcome in &plan.toolchains {
            match outcome.result {
                Ok(ref p) => {
                    let target = p.provision.target();
                    println!(
                        "  {:<16} {:<11} {:<10} {}",
                        outcome.id,
                        if p.provision.is_available() { "available" } else { "stub" },
                        target.link_mode().as_str(),
                        target.triple()
                    );
                }
                Err(_) => println!("  {:<16} failed", outcome.id),
            }
        }
        if let Ok(ref libs) = plan.libraries {
            println!("Libraries:");
            for alias in &libs.aliases {
                println!(
                    "  {:<16} {} branches, default {}",
                    alias.library,
                    alias.all_branches().count(),
                    alias.default.actual
                );
            }
        }
    }
    report_failures(&plan)
}

/// Generate descriptors, or with `--check` compare against the manifest.
fn cmd_generate(cli: &cli::Cli, args: &cli::GenerateArgs) -> Result<()> {
    let (config, model) = load_project(cli)?;
    let catalog = PathCatalog::new(&config.deps_root);
    let plan = Plan::build(&model, &catalog, config.jobs)?;
    let outputs = Outputs::render(&plan)?;
    let previous = Manifest::load(&config.out_dir)?;

    // Units that failed keep whatever the previous run wrote for them.
    let mut manifest = Manifest::from_outputs(&outputs);
    if let Some(ref prev) = previous {
        for outcome in plan.toolchains.iter().filter(|o| o.result.is_err()) {
            manifest.carry_over(prev, &format!("{TOOLCHAINS_DIR}/{}/", outcome.id));
        }
        if plan.libraries.is_err() {
            manifest.carry_over(prev, &format!("{LIBS_DIR}/"));
        }
    }

    if args.check {
        return check_drift(&config, &plan, previous.as_ref(), &manifest);
    }

    {
        let _t = Timer::start("writing outputs");
        outputs.write(&config.out_dir)?;
    }
    for p in plan.provisioned() {
        let kind = if p.descriptor.available { "toolchain" } else { "stub" };
        dprintln!("  {kind:<9} {}", p.descriptor.id);
    }
    if let Ok(ref libs) = plan.libraries {
        for alias in &libs.aliases {
            dprintln!("  {:<9} {}", "library", alias.library);
        }
    }

    let declared: BTreeSet<String> = model.toolchains.iter().map(|t| t.name.clone()).collect();
    for name in materialize::prune_toolchains(&config.out_dir, &declared)? {
        dprintln!("  removed   {name} (no longer declared)");
    }
    manifest.save(&config.out_dir)?;

    report_failures(&plan)?;
    println!(
        "\nGenerated {} toolchains and {} libraries in {}",
        plan.toolchains.len(),
        model.libraries.len(),
        config.out_dir.display()
    );
    Ok(())
}

fn check_drift(
    config: &ResolvedConfig,
    plan: &Plan,
    recorded: Option<&Manifest>,
    expected: &Manifest,
) -> Result<()> {
    report_failures(plan)?;
    let Some(recorded) = recorded else {
        bail!(
            "no manifest in {}; run `ccbind generate` first",
            config.out_dir.display()
        );
    };
    let mut drift = recorded.diff(expected);
    drift.extend(recorded.verify_disk(&config.out_dir));
    if drift.is_empty() {
        dprintln!("Outputs are up to date.");
        return Ok(());
    }
    for d in &drift {
        println!("  {d}");
    }
    bail!(
        "{} generated outputs are out of date; run `ccbind generate`",
        drift.len()
    )
}

/// List what the dependency root provides.
fn cmd_list(cli: &cli::Cli) -> Result<()> {
    let (config, model) = load_project(cli)?;
    let catalog = PathCatalog::new(&config.deps_root);

    let toolchains = catalog.list_toolchains()?;
    let libraries = catalog.list_libraries()?;

    println!("Toolchains in {}:", catalog.toolchains_dir().display());
    for name in &toolchains {
        let mark = if model.toolchain(name).is_some() { "*" } else { " " };
        println!("  {mark} {name}");
    }
    println!("Libraries in {}:", catalog.libs_dir().display());
    for name in &libraries {
        println!("    {name}");
    }
    dprintln!("\n(* = declared in {})", engine::SCRIPT_FILE);
    Ok(())
}

/// Synthesize a descriptor for a prebuilt library tree.
fn cmd_synth(args: &cli::SynthArgs) -> Result<()> {
    let linkage = if args.static_link {
        Linkage::Static
    } else {
        Linkage::Dynamic
    };
    let text = synth::synthesize(&args.dir, &args.name, linkage)
        .with_context(|| format!("failed to synthesize descriptor for '{}'", args.name))?;
    match args.output {
        Some(ref path) => {
            materialize::write_file_atomic(path, &text)?;
            dprintln!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Remove the output directory.
fn cmd_clean(cli: &cli::Cli) -> Result<()> {
    let (config, _model) = load_project(cli)?;
    if config.out_dir.exists() {
        std::fs::remove_dir_all(&config.out_dir)
            .with_context(|| format!("failed to remove {}", config.out_dir.display()))?;
        println!("Removed {}", config.out_dir.display());
    } else {
        println!("Nothing to clean.");
    }
    Ok(())
}
