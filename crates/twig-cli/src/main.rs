//! twig CLI — command-line front end for twig-core.

use std::path::{Path, PathBuf};
use std::process;

use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use twig_core::{Commit, ErrorKind, MergeOutcome, Repository, TwigResult, UnstagedChange};

#[derive(Parser)]
#[command(name = "twig", about = "twig — a small local version-control system", version)]
struct Cli {
    /// Run as if started in this directory.
    #[arg(short = 'C', long = "repo", env = "TWIG_WORK_TREE", global = true)]
    repo: Option<PathBuf>,

    /// Log debug output to stderr (overrides TWIG_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new repository in the working directory.
    Init,

    /// Stage a file for the next commit.
    Add { file: String },

    /// Unstage a file, or stage a tracked file for removal.
    Rm { file: String },

    /// Record staged changes.
    Commit { message: String },

    /// Show first-parent history from HEAD.
    Log,

    /// Show every commit ever made.
    GlobalLog,

    /// Print ids of commits with the given message.
    Find { message: String },

    /// Show branches, staged changes and working-copy changes.
    Status,

    /// Restore files, switch branches, or detach HEAD.
    ///
    /// `checkout -- <file>` restores from HEAD, `checkout <commit> -- <file>`
    /// restores from a commit, `checkout <branch>` switches branches.
    #[command(group(ArgGroup::new("what").required(true).multiple(true).args(["target", "file"])))]
    Checkout {
        /// Branch name, or commit id when restoring a file.
        target: Option<String>,

        /// Detach HEAD at the given commit instead of switching branches.
        #[arg(long, requires = "target", conflicts_with = "file")]
        detach: bool,

        /// File to restore.
        #[arg(last = true)]
        file: Option<String>,
    },

    /// Create a branch at HEAD.
    Branch { name: String },

    /// Delete a branch.
    RmBranch { name: String },

    /// Move the current branch to a commit and check it out.
    Reset { commit: String },

    /// Merge a branch into the current branch.
    Merge { branch: String },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = match cli.repo {
        Some(dir) => dir,
        None => std::env::current_dir().unwrap_or_else(|e| {
            eprintln!("error: cannot determine current directory: {e}");
            process::exit(1);
        }),
    };

    let result = match cli.command {
        Commands::Init => cmd_init(&root),
        Commands::Add { file } => cmd_add(&root, &file),
        Commands::Rm { file } => cmd_rm(&root, &file),
        Commands::Commit { message } => cmd_commit(&root, &message),
        Commands::Log => cmd_log(&root),
        Commands::GlobalLog => cmd_global_log(&root),
        Commands::Find { message } => cmd_find(&root, &message),
        Commands::Status => cmd_status(&root),
        Commands::Checkout {
            target,
            detach,
            file,
        } => cmd_checkout(&root, target, detach, file),
        Commands::Branch { name } => Repository::open(&root).and_then(|r| r.create_branch(&name)),
        Commands::RmBranch { name } => Repository::open(&root).and_then(|r| r.delete_branch(&name)),
        Commands::Reset { commit } => {
            Repository::open(&root).and_then(|r| r.reset(&commit).map(|_| ()))
        }
        Commands::Merge { branch } => cmd_merge(&root, &branch),
    };

    if let Err(e) = result {
        if e.kind() == ErrorKind::Invariant {
            eprintln!("internal error: {e}");
            process::exit(2);
        }
        eprintln!("{e}");
        process::exit(1);
    }
}

/// `TWIG_LOG` takes EnvFilter syntax; `-v` forces debug.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TWIG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_init(root: &Path) -> TwigResult<()> {
    Repository::init(root)?;
    Ok(())
}

fn cmd_add(root: &Path, file: &str) -> TwigResult<()> {
    Repository::open(root)?.add(file)?;
    Ok(())
}

fn cmd_rm(root: &Path, file: &str) -> TwigResult<()> {
    Repository::open(root)?.remove(file)?;
    Ok(())
}

fn cmd_commit(root: &Path, message: &str) -> TwigResult<()> {
    Repository::open(root)?.commit(message)?;
    Ok(())
}

fn cmd_log(root: &Path) -> TwigResult<()> {
    let repo = Repository::open(root)?;
    for commit in repo.history()? {
        print!("{}", format_log_entry(&commit?));
    }
    Ok(())
}

fn cmd_global_log(root: &Path) -> TwigResult<()> {
    let repo = Repository::open(root)?;
    for commit in repo.all_commits()? {
        print!("{}", format_log_entry(&commit?));
    }
    Ok(())
}

fn cmd_find(root: &Path, message: &str) -> TwigResult<()> {
    for id in Repository::open(root)?.find(message)? {
        println!("{id}");
    }
    Ok(())
}

fn cmd_status(root: &Path) -> TwigResult<()> {
    let status = Repository::open(root)?.status()?;

    println!("=== Branches ===");
    for branch in &status.branches {
        if status.current_branch.as_deref() == Some(branch.as_str()) {
            println!("*{branch}");
        } else {
            println!("{branch}");
        }
    }
    println!();

    println!("=== Staged Files ===");
    for path in &status.staged {
        println!("{path}");
    }
    println!();

    println!("=== Removed Files ===");
    for path in &status.removed {
        println!("{path}");
    }
    println!();

    println!("=== Modifications Not Staged For Commit ===");
    for (path, change) in &status.unstaged {
        let label = match change {
            UnstagedChange::Modified => "modified",
            UnstagedChange::Deleted => "deleted",
        };
        println!("{path} ({label})");
    }
    println!();

    println!("=== Untracked Files ===");
    for path in &status.untracked {
        println!("{path}");
    }
    println!();

    Ok(())
}

fn cmd_checkout(
    root: &Path,
    target: Option<String>,
    detach: bool,
    file: Option<String>,
) -> TwigResult<()> {
    let repo = Repository::open(root)?;
    match (target, file) {
        (None, Some(file)) => repo.checkout_file(&file),
        (Some(commit), Some(file)) => repo.checkout_file_at(&commit, &file),
        (Some(commit), None) if detach => repo.checkout_detached(&commit),
        (Some(branch), None) => repo.checkout_branch(&branch),
        (None, None) => unreachable!("clap requires a target or a file"),
    }
}

fn cmd_merge(root: &Path, branch: &str) -> TwigResult<()> {
    match Repository::open(root)?.merge(branch)? {
        MergeOutcome::AlreadyMerged => {
            println!("Given branch is an ancestor of the current branch.");
        }
        MergeOutcome::FastForward { .. } => println!("Current branch fast-forwarded."),
        MergeOutcome::Merged { conflicts, .. } => {
            if !conflicts.is_empty() {
                println!("Encountered a merge conflict.");
            }
        }
    }
    Ok(())
}

fn format_log_entry(commit: &Commit) -> String {
    let mut out = String::from("===\n");
    out.push_str(&format!("commit {}\n", commit.id));
    if commit.is_merge() {
        let short: Vec<&str> = commit.parents.iter().map(|p| &p[..7.min(p.len())]).collect();
        out.push_str(&format!("Merge: {}\n", short.join(" ")));
    }
    out.push_str(&format!("Date: {}\n", format_date(&commit.timestamp)));
    out.push_str(&commit.message);
    out.push_str("\n\n");
    out
}

fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%a %b %-d %H:%M:%S %Y %z").to_string()
}
