//! Command-line interface definitions for ccbind.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Bind prebuilt C/C++ toolchains and libraries into a Bazel workspace.
#[derive(Parser)]
#[command(name = "ccbind", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Dependency root holding `toolchains/` and `libs/` (overrides `deps_root()`).
    #[arg(long, global = true)]
    pub deps_root: Option<PathBuf>,

    /// Output directory for generated descriptors (overrides `output_dir()`).
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Suppress per-toolchain output; show only errors and the final summary.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output with timings and lookup diagnostics.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Maximum number of parallel workers (0 or omitted = auto-detect from CPU count).
    #[arg(long, short = 'j', global = true)]
    pub jobs: Option<usize>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Resolve every declared toolchain and print the effective targets.
    Resolve(ResolveArgs),
    /// Generate descriptors for all toolchains and libraries.
    Generate(GenerateArgs),
    /// List the toolchains and libraries present under the dependency root.
    List,
    /// Synthesize a BUILD.bazel for a prebuilt library tree.
    Synth(SynthArgs),
    /// Remove the output directory.
    Clean,
}

/// Arguments for the `resolve` subcommand.
#[derive(Parser)]
pub struct ResolveArgs {
    /// Print the plan as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `generate` subcommand.
#[derive(Parser)]
pub struct GenerateArgs {
    /// Compare against the recorded manifest without writing anything.
    #[arg(long)]
    pub check: bool,
}

/// Arguments for the `synth` subcommand.
#[derive(Parser)]
pub struct SynthArgs {
    /// Library artifact tree (with `lib/`, optional `include/` and `deps/`).
    pub dir: PathBuf,

    /// Library name used for the target and archive lookup.
    #[arg(long)]
    pub name: String,

    /// Link against a static archive instead of shared objects.
    #[arg(long = "static")]
    pub static_link: bool,

    /// Write the descriptor here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}
