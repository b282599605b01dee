//! CLI argument parsing for duplexd.
//!
//! Hand-rolled, matching the teacher's own `cli.rs`: parses `std::env::args()`
//! by hand instead of reaching for `clap`, one `parse_*_args` function per
//! subcommand, `Result<Command>` throughout.

use anyhow::Result;
use std::path::PathBuf;

pub fn print_usage() {
    eprintln!("duplexd - bidirectional directory synchronization daemon");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  duplexd sync --root <DIR> [--mirror <DIR>] [--exclude <PATTERN>]... [--include <PATTERN>]... [--debounce-ms <N>] [--once]");
    eprintln!("  duplexd --version");
    eprintln!("  duplexd --help");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  sync            Run a sync session between a local root and a peer");
    eprintln!();
    eprintln!("Sync arguments:");
    eprintln!("  --root <DIR>        Local sync root (required)");
    eprintln!("  --mirror <DIR>      Loopback demo peer root: run two in-process sessions");
    eprintln!("                      against --root and --mirror over a LoopbackTransport");
    eprintln!("  --exclude <PAT>     Extra exclude pattern (repeatable)");
    eprintln!("  --include <PAT>     Extra include pattern, overrides excludes (repeatable)");
    eprintln!("  --debounce-ms <N>   Filesystem watcher debounce delay (default: 500)");
    eprintln!("  --once              Run the initial reconcile pass and exit");
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Sync {
        root: PathBuf,
        mirror: Option<PathBuf>,
        exclude: Vec<String>,
        include: Vec<String>,
        debounce_ms: u64,
        once: bool,
    },
}

fn parse_required_arg(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    if *i + 1 >= args.len() {
        return Err(anyhow::anyhow!("{flag} requires an argument"));
    }
    let value = args[*i + 1].clone();
    *i += 2;
    Ok(value)
}

fn parse_sync_args(args: &[String]) -> Result<Command> {
    let mut root: Option<PathBuf> = None;
    let mut mirror: Option<PathBuf> = None;
    let mut exclude = Vec::new();
    let mut include = Vec::new();
    let mut debounce_ms: u64 = 500;
    let mut once = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--root" => root = Some(PathBuf::from(parse_required_arg(args, &mut i, "--root")?)),
            "--mirror" => mirror = Some(PathBuf::from(parse_required_arg(args, &mut i, "--mirror")?)),
            "--exclude" => exclude.push(parse_required_arg(args, &mut i, "--exclude")?),
            "--include" => include.push(parse_required_arg(args, &mut i, "--include")?),
            "--debounce-ms" => {
                debounce_ms = parse_required_arg(args, &mut i, "--debounce-ms")?
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid value for --debounce-ms: {e}"))?;
            }
            "--once" => {
                once = true;
                i += 1;
            }
            other => return Err(anyhow::anyhow!("unknown argument: {other}")),
        }
    }

    let root = root.ok_or_else(|| anyhow::anyhow!("--root is required"))?;

    Ok(Command::Sync {
        root,
        mirror,
        exclude,
        include,
        debounce_ms,
        once,
    })
}

/// Parse CLI arguments into a [`Command`]. `print_version` is invoked (and
/// the process exits) on `--version`/`-V`, mirroring the teacher's
/// closure-based version hook so this module never depends on `version.rs`
/// directly.
pub fn parse_args_impl<F>(print_version: F) -> Result<Command>
where
    F: FnOnce(),
{
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        return Err(anyhow::anyhow!("missing command"));
    }

    let command = &args[1];

    if command == "--version" || command == "-V" {
        print_version();
        std::process::exit(0);
    }

    if command == "--help" || command == "-h" {
        print_usage();
        std::process::exit(0);
    }

    match command.as_str() {
        "sync" => parse_sync_args(&args[2..]),
        other => Err(anyhow::anyhow!("unknown command: {other}")),
    }
}
