//! Workspace developer tasks: thin wrappers around `cargo fmt`/`clippy`/
//! `test` plus a quick sanity sweep over the source tree, invoked as
//! `cargo xtask <command>`.

use std::path::Path;
use std::process::{Command as ProcessCommand, ExitStatus};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "xtask", about = "Workspace developer tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run `cargo fmt --check` across the workspace.
    Fmt {
        #[arg(long)]
        apply: bool,
    },
    /// Run `cargo clippy` with warnings denied across the workspace.
    Clippy,
    /// Run `cargo test` across the workspace.
    Test {
        /// Extra arguments forwarded to `cargo test`.
        #[arg(last = true)]
        extra: Vec<String>,
    },
    /// fmt --check, clippy, then test, stopping at the first failure.
    Ci,
    /// Count source files and lines per crate, for a quick size sanity check.
    Loc,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Fmt { apply } => run_fmt(apply),
        Command::Clippy => run_clippy(),
        Command::Test { extra } => run_test(&extra),
        Command::Ci => run_ci(),
        Command::Loc => run_loc(),
    }
}

fn workspace_root() -> Result<std::path::PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").context("CARGO_MANIFEST_DIR not set")?;
    Path::new(&manifest_dir)
        .ancestors()
        .nth(2)
        .map(|p| p.to_path_buf())
        .context("could not locate workspace root")
}

fn run_cargo(args: &[&str]) -> Result<ExitStatus> {
    let root = workspace_root()?;
    ProcessCommand::new("cargo")
        .args(args)
        .current_dir(&root)
        .status()
        .with_context(|| format!("failed to run `cargo {}`", args.join(" ")))
}

fn run_fmt(apply: bool) -> Result<()> {
    let args: &[&str] = if apply { &["fmt"] } else { &["fmt", "--", "--check"] };
    let status = run_cargo(args)?;
    ensure_success(status, "cargo fmt")
}

fn run_clippy() -> Result<()> {
    let status = run_cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    ensure_success(status, "cargo clippy")
}

fn run_test(extra: &[String]) -> Result<()> {
    let mut args = vec!["test", "--workspace"];
    args.extend(extra.iter().map(|s| s.as_str()));
    let status = run_cargo(&args)?;
    ensure_success(status, "cargo test")
}

fn run_ci() -> Result<()> {
    run_fmt(false)?;
    run_clippy()?;
    run_test(&[])
}

fn ensure_success(status: ExitStatus, what: &str) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        bail!("{what} failed with {status}")
    }
}

fn run_loc() -> Result<()> {
    let root = workspace_root()?;
    let crates_dir = root.join("crates");
    let mut totals: Vec<(String, usize, usize)> = Vec::new();

    for entry in walkdir::WalkDir::new(&crates_dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let crate_name = entry.file_name().to_string_lossy().to_string();
        let src = entry.path().join("src");
        if !src.exists() {
            continue;
        }
        let mut files = 0;
        let mut lines = 0;
        for file in walkdir::WalkDir::new(&src).into_iter().filter_map(|e| e.ok()) {
            if file.path().extension().map(|e| e == "rs").unwrap_or(false) {
                files += 1;
                lines += std::fs::read_to_string(file.path())?.lines().count();
            }
        }
        totals.push((crate_name, files, lines));
    }

    totals.sort();
    for (name, files, lines) in &totals {
        println!("{name:<20} {files:>4} files  {lines:>6} lines");
    }
    Ok(())
}
