use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "replica",
    about = "Inspect repository snapshots through the replica object cache",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Repository settings (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load a repository fixture and summarise it
    Load(LoadArgs),
    /// List the references of a repository fixture
    Refs(RefsArgs),
    /// Show how references differ between two fixtures
    Diff(DiffArgs),
    /// Fetch from a remote described in the fixture and show what moved
    Fetch(FetchArgs),
    /// Pull into the current branch and show what moved
    Pull(PullArgs),
    /// Check whether a name is a valid reference name
    CheckName(CheckNameArgs),
}

#[derive(Args)]
pub struct LoadArgs {
    /// Repository fixture (JSON)
    pub fixture: PathBuf,
}

#[derive(Args)]
pub struct RefsArgs {
    pub fixture: PathBuf,
    /// Only list references of this kind
    #[arg(long)]
    pub kind: Option<RefKind>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum RefKind {
    Branch,
    Remote,
    Tag,
}

#[derive(Args)]
pub struct DiffArgs {
    pub before: PathBuf,
    pub after: PathBuf,
}

#[derive(Args)]
pub struct FetchArgs {
    pub fixture: PathBuf,
    /// Remote to fetch; all remotes when omitted
    #[arg(long)]
    pub remote: Option<String>,
    /// Drop remote branches that no longer exist upstream
    #[arg(long)]
    pub prune: bool,
}

#[derive(Args)]
pub struct PullArgs {
    pub fixture: PathBuf,
    #[arg(long)]
    pub remote: Option<String>,
    /// Remote branch to merge; defaults to the upstream of the current branch
    #[arg(long)]
    pub branch: Option<String>,
}

#[derive(Args)]
pub struct CheckNameArgs {
    pub name: String,
    #[arg(long, default_value = "branch")]
    pub kind: NameKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum NameKind {
    Branch,
    Tag,
    Remote,
    RemoteBranch,
}
