//! Project root discovery and resolution of paths and worker counts.
//!
//! Script settings are relative to the project root; command-line
//! overrides are relative to the current directory and take precedence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::cli::Cli;
use crate::engine::SCRIPT_FILE;
use crate::model::DeclModel;

/// Dependency root used when neither the script nor the CLI sets one.
pub const DEFAULT_DEPS_ROOT: &str = "deps";

/// Output directory used when neither the script nor the CLI sets one.
pub const DEFAULT_OUTPUT_DIR: &str = "build/ccbind";

/// Paths and limits every command works from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub root: PathBuf,
    pub deps_root: PathBuf,
    pub out_dir: PathBuf,
    pub jobs: usize,
}

/// Walk up from the current directory to the first one holding `ccbind.rhai`.
pub fn find_project_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    find_root_from(&cwd)
}

fn find_root_from(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        if dir.join(SCRIPT_FILE).is_file() {
            return Ok(dir.to_path_buf());
        }
    }
    bail!(
        "could not find {SCRIPT_FILE} in {} or any parent directory",
        start.display()
    )
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Combine script settings with command-line overrides.
pub fn resolve(cli: &Cli, model: &DeclModel, root: &Path) -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let pick = |flag: &Option<PathBuf>, script: &Option<String>, default: &str| match flag {
        Some(p) => anchor(&cwd, p),
        None => anchor(root, Path::new(script.as_deref().unwrap_or(default))),
    };

    Ok(ResolvedConfig {
        root: root.to_path_buf(),
        deps_root: pick(&cli.deps_root, &model.deps_root, DEFAULT_DEPS_ROOT),
        out_dir: pick(&cli.out, &model.output_dir, DEFAULT_OUTPUT_DIR),
        jobs: worker_count(cli.jobs),
    })
}

/// `-j N`, with 0 or no flag meaning one worker per CPU.
pub fn worker_count(jobs: Option<usize>) -> usize {
    match jobs.unwrap_or(0) {
        0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
        n => n,
    }
}

/// Print the resolved configuration.
pub fn print_resolved(config: &ResolvedConfig) {
    println!("  project root: {}", config.root.display());
    println!("  deps root:    {}", config.deps_root.display());
    println!("  output dir:   {}", config.out_dir.display());
    println!("  workers:      {}", config.jobs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_found_from_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCRIPT_FILE), "").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_root_from(&nested).unwrap(), dir.path());
    }

    #[test]
    fn missing_script_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_root_from(dir.path()).unwrap_err();
        assert!(err.to_string().contains("could not find ccbind.rhai"), "{err}");
    }

    #[test]
    fn relative_paths_anchor_to_base() {
        assert_eq!(anchor(Path::new("/p"), Path::new("deps")), PathBuf::from("/p/deps"));
        assert_eq!(anchor(Path::new("/p"), Path::new("/abs")), PathBuf::from("/abs"));
    }

    #[test]
    fn explicit_worker_count_is_kept() {
        assert_eq!(worker_count(Some(3)), 3);
        assert!(worker_count(None) >= 1);
        assert!(worker_count(Some(0)) >= 1);
    }
}
