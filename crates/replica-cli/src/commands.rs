use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use replica_accessor::{
    FetchParameters, InMemoryAccessor, PullParameters, RepositoryFixture, RepositoryStateData,
    StatusData,
};
use replica_diff::{ChangeType, RefsDiff, RefsState};
use replica_refs::{
    validate_branch_name, validate_remote_branch_name, validate_remote_name, validate_tag_name,
    Pointer, Reference,
};
use replica_repo::{LoadProgress, Repository, RepositoryConfig, RepositoryLoader};
use replica_types::{Hash, ReferenceType, ReferenceTypes};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Load(args) => cmd_load(args, config, format).await,
        Command::Refs(args) => cmd_refs(args, config, format).await,
        Command::Diff(args) => cmd_diff(args, config, format).await,
        Command::Fetch(args) => cmd_fetch(args, config, format).await,
        Command::Pull(args) => cmd_pull(args, config, format).await,
        Command::CheckName(args) => cmd_check_name(args, format),
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> anyhow::Result<RepositoryConfig> {
    match path {
        Some(path) => RepositoryConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(RepositoryConfig::default()),
    }
}

fn read_fixture(path: &Path) -> anyhow::Result<RepositoryFixture> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    RepositoryFixture::from_json(&json)
        .with_context(|| format!("{} is not a valid repository fixture", path.display()))
}

async fn open_repository(
    path: &Path,
    config: RepositoryConfig,
) -> anyhow::Result<Arc<Repository>> {
    let accessor = Arc::new(InMemoryAccessor::from_fixture(read_fixture(path)?));
    let loader = RepositoryLoader::new(accessor, config)?.with_progress(|progress: LoadProgress| {
        debug!(
            step = progress.index + 1,
            total = progress.total,
            "{}",
            progress.action
        )
    });
    let repository = Arc::new(loader)
        .load_async()
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(repository)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// load
// ---------------------------------------------------------------------------

/// What `replica load` reports about a repository.
#[derive(Debug, Serialize)]
struct LoadSummary {
    head: String,
    detached: bool,
    head_revision: Option<Hash>,
    branches: usize,
    remote_branches: usize,
    tags: usize,
    stashes: usize,
    notes: usize,
    remotes: Vec<String>,
    submodules: usize,
    contributors: usize,
    identity: Option<String>,
    state: RepositoryStateData,
    status: StatusData,
}

impl LoadSummary {
    fn of(repository: &Repository) -> Self {
        let head = repository.head();
        let refs = repository.refs();
        Self {
            head: describe_head(repository),
            detached: head.is_detached(),
            head_revision: head.revision().map(|r| r.hash()),
            branches: refs.heads().count(),
            remote_branches: refs.remotes().count(),
            tags: refs.tags().count(),
            stashes: repository.stash().count(),
            notes: repository.notes().count(),
            remotes: repository.remotes().names(),
            submodules: repository.submodules().count(),
            contributors: repository.users().count(),
            identity: repository.user_identity().map(|user| user.to_string()),
            state: repository.state(),
            status: repository.status().data(),
        }
    }
}

fn describe_head(repository: &Repository) -> String {
    match repository.head().core().pointer() {
        Pointer::Branch(branch) => branch.short_name(),
        Pointer::Unborn(name) => name,
        Pointer::Revision(revision) => revision.hash().short_hex(),
        other => other.full_name(),
    }
}

async fn cmd_load(
    args: LoadArgs,
    config: RepositoryConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let repository = open_repository(&args.fixture, config).await?;
    let summary = LoadSummary::of(&repository);
    if format == OutputFormat::Json {
        return print_json(&summary);
    }

    println!(
        "{} Loaded {}",
        "✓".green().bold(),
        args.fixture.display().to_string().bold()
    );
    match (&summary.head_revision, summary.detached) {
        (Some(hash), true) => println!("  HEAD detached at {}", hash.short_hex().yellow()),
        (Some(hash), false) => println!(
            "  On branch {} ({})",
            summary.head.yellow().bold(),
            hash.short_hex().dimmed()
        ),
        (None, _) => println!(
            "  On branch {} {}",
            summary.head.yellow().bold(),
            "(no commits yet)".dimmed()
        ),
    }
    println!(
        "  References: {} branches, {} remote branches, {} tags, {} stashes",
        summary.branches.to_string().bold(),
        summary.remote_branches.to_string().bold(),
        summary.tags.to_string().bold(),
        summary.stashes.to_string().bold()
    );
    if !summary.remotes.is_empty() {
        println!("  Remotes: {}", summary.remotes.join(", ").cyan());
    }
    if let Some(identity) = &summary.identity {
        println!("  Identity: {identity}");
    }
    println!(
        "  Notes: {}, submodules: {}, contributors: {}",
        summary.notes, summary.submodules, summary.contributors
    );
    if summary.state != RepositoryStateData::Clean {
        println!("  State: {}", format!("{:?}", summary.state).yellow());
    }
    if summary.status.is_clean() {
        println!("  Working tree {}", "clean".green());
    } else {
        println!(
            "  Working tree: {} staged, {} unstaged, {} unmerged",
            summary.status.staged().to_string().yellow(),
            summary.status.unstaged().to_string().yellow(),
            summary.status.unmerged.to_string().red()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// refs
// ---------------------------------------------------------------------------

fn reference_types(kind: Option<RefKind>) -> ReferenceTypes {
    match kind {
        Some(RefKind::Branch) => ReferenceTypes::LOCAL_BRANCHES,
        Some(RefKind::Remote) => ReferenceTypes::REMOTE_BRANCHES,
        Some(RefKind::Tag) => ReferenceTypes::TAGS,
        None => ReferenceTypes::REFERENCES,
    }
}

async fn cmd_refs(
    args: RefsArgs,
    config: RepositoryConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let repository = open_repository(&args.fixture, config).await?;
    let state = RefsState::capture(repository.refs(), reference_types(args.kind));
    if format == OutputFormat::Json {
        return print_json(&state);
    }

    let current = repository
        .head()
        .current_branch()
        .map(|branch| branch.key());
    for entry in state.entries() {
        let name = entry.key.short_name();
        let hash = entry.hash.short_hex();
        match entry.key.reference_type {
            ReferenceType::LocalBranch if current.as_ref() == Some(&entry.key) => {
                println!("* {} {}", name.green().bold(), hash.dimmed())
            }
            ReferenceType::LocalBranch => println!("  {} {}", name, hash.dimmed()),
            ReferenceType::RemoteBranch => println!("  {} {}", name.red(), hash.dimmed()),
            ReferenceType::Tag => println!("  {} {}", name.yellow(), hash.dimmed()),
            _ => println!("  {} {}", entry.key, hash.dimmed()),
        }
    }
    if args.kind.is_none() {
        for stash in repository.stash().all() {
            println!(
                "  {} {}",
                stash.reference_name().cyan(),
                stash.hash().short_hex().dimmed()
            );
        }
    }
    if state.is_empty() {
        println!("No references.");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// diff, fetch, pull
// ---------------------------------------------------------------------------

async fn diff_fixtures(
    before: &Path,
    after: &Path,
    config: RepositoryConfig,
) -> anyhow::Result<RefsDiff> {
    let old = open_repository(before, config.clone()).await?;
    let new = open_repository(after, config).await?;
    Ok(RefsDiff::calculate(
        &RefsState::capture(old.refs(), ReferenceTypes::REFERENCES),
        &RefsState::capture(new.refs(), ReferenceTypes::REFERENCES),
    ))
}

fn print_diff(diff: &RefsDiff, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(diff);
    }
    if diff.is_empty() {
        println!("No reference changes.");
        return Ok(());
    }
    for change in diff {
        let line = change.to_string();
        match change.change_type {
            ChangeType::Added => println!("{}", line.green()),
            ChangeType::Removed => println!("{}", line.red()),
            ChangeType::Moved => println!("{}", line.yellow()),
        }
    }
    println!(
        "{} added, {} removed, {} moved",
        diff.additions(),
        diff.removals(),
        diff.moves()
    );
    Ok(())
}

async fn cmd_diff(
    args: DiffArgs,
    config: RepositoryConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let diff = diff_fixtures(&args.before, &args.after, config).await?;
    print_diff(&diff, format)
}

async fn fetch_fixture(args: &FetchArgs, config: RepositoryConfig) -> anyhow::Result<RefsDiff> {
    let repository = open_repository(&args.fixture, config).await?;
    let parameters = FetchParameters {
        remote: args.remote.clone(),
        prune: args.prune,
        tags: true,
    };
    let diff = repository.fetch(&parameters)?;
    repository.dispose();
    Ok(diff)
}

async fn cmd_fetch(
    args: FetchArgs,
    config: RepositoryConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let diff = fetch_fixture(&args, config).await?;
    if format == OutputFormat::Text {
        let remote = args.remote.as_deref().unwrap_or("all remotes");
        println!("Fetched from {}", remote.bold());
    }
    print_diff(&diff, format)
}

async fn cmd_pull(
    args: PullArgs,
    config: RepositoryConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let repository = open_repository(&args.fixture, config).await?;
    let diff = repository.pull(&PullParameters {
        remote: args.remote,
        branch: args.branch,
    })?;
    if format == OutputFormat::Text {
        println!("Pulled into {}", describe_head(&repository).yellow().bold());
    }
    repository.dispose();
    print_diff(&diff, format)
}

// ---------------------------------------------------------------------------
// check-name
// ---------------------------------------------------------------------------

fn kind_label(kind: NameKind) -> &'static str {
    match kind {
        NameKind::Branch => "branch",
        NameKind::Tag => "tag",
        NameKind::Remote => "remote",
        NameKind::RemoteBranch => "remote branch",
    }
}

fn check_name(name: &str, kind: NameKind) -> replica_refs::Result<()> {
    match kind {
        NameKind::Branch => validate_branch_name(name),
        NameKind::Tag => validate_tag_name(name),
        NameKind::Remote => validate_remote_name(name),
        NameKind::RemoteBranch => validate_remote_branch_name(name),
    }
}

#[derive(Serialize)]
struct NameReport<'a> {
    name: &'a str,
    kind: &'static str,
    valid: bool,
    reason: Option<String>,
}

fn cmd_check_name(args: CheckNameArgs, format: OutputFormat) -> anyhow::Result<()> {
    let label = kind_label(args.kind);
    let result = check_name(&args.name, args.kind);
    match format {
        OutputFormat::Json => print_json(&NameReport {
            name: &args.name,
            kind: label,
            valid: result.is_ok(),
            reason: result.as_ref().err().map(|err| err.to_string()),
        })?,
        OutputFormat::Text if result.is_ok() => println!(
            "{} {} is a valid {} name",
            "✓".green().bold(),
            args.name.bold(),
            label
        ),
        OutputFormat::Text => {}
    }
    result.with_context(|| format!("{:?} is not a valid {label} name", args.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const H1: &str = "1111111111111111111111111111111111111111";
    const H2: &str = "2222222222222222222222222222222222222222";
    const H3: &str = "3333333333333333333333333333333333333333";

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn fixture(main: &str, feature: Option<&str>) -> NamedTempFile {
        let feature = feature
            .map(|hash| format!(r#", "feature": "{hash}""#))
            .unwrap_or_default();
        write_temp(&format!(
            r#"{{
                "revisions": [
                    {{"hash": "{H1}", "subject": "initial"}},
                    {{"hash": "{H2}", "subject": "second", "parents": ["{H1}"]}},
                    {{"hash": "{H3}", "subject": "third", "parents": ["{H2}"]}}
                ],
                "heads": {{"main": "{main}"{feature}}},
                "remote_branches": {{"origin/main": "{H1}"}},
                "tags": [{{"name": "v1", "target": "{H1}"}}],
                "config": [
                    {{"name": "user.name", "value": "Ada"}},
                    {{"name": "user.email", "value": "ada@example.com"}}
                ],
                "remotes": [{{"name": "origin", "fetch_url": "https://example.com/repo.git"}}],
                "upstream": {{"origin": {{"main": "{H2}", "feature": "{H3}"}}}}
            }}"#
        ))
    }

    #[tokio::test]
    async fn load_summarises_fixture() {
        let file = fixture(H2, None);
        let repository = open_repository(file.path(), RepositoryConfig::default())
            .await
            .unwrap();
        let summary = LoadSummary::of(&repository);
        assert_eq!(summary.head, "main");
        assert!(!summary.detached);
        assert_eq!(summary.head_revision, Some(H2.parse().unwrap()));
        assert_eq!(summary.branches, 1);
        assert_eq!(summary.remote_branches, 1);
        assert_eq!(summary.tags, 1);
        assert_eq!(summary.stashes, 0);
        assert_eq!(summary.remotes, vec!["origin".to_string()]);
        assert_eq!(
            summary.identity.as_deref(),
            Some("Ada <ada@example.com>")
        );
        assert_eq!(summary.state, RepositoryStateData::Clean);
    }

    #[tokio::test]
    async fn malformed_fixture_is_reported() {
        let file = write_temp("{ not json");
        let err = open_repository(file.path(), RepositoryConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a valid repository fixture"));
    }

    #[tokio::test]
    async fn diff_between_fixtures() {
        let before = fixture(H1, None);
        let after = fixture(H3, Some(H2));
        let diff = diff_fixtures(before.path(), after.path(), RepositoryConfig::default())
            .await
            .unwrap();
        let summary: Vec<(String, ChangeType)> = diff
            .iter()
            .map(|c| (c.full_name.clone(), c.change_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("refs/heads/feature".to_string(), ChangeType::Added),
                ("refs/heads/main".to_string(), ChangeType::Moved),
            ]
        );
        let moved = &diff.changes[1];
        assert_eq!(moved.old_hash, Some(H1.parse().unwrap()));
        assert_eq!(moved.new_hash, Some(H3.parse().unwrap()));
    }

    #[tokio::test]
    async fn identical_fixtures_have_no_diff() {
        let before = fixture(H2, None);
        let after = fixture(H2, None);
        let diff = diff_fixtures(before.path(), after.path(), RepositoryConfig::default())
            .await
            .unwrap();
        assert!(diff.is_empty());
    }

    #[tokio::test]
    async fn fetch_reports_remote_branch_changes() {
        let file = fixture(H2, None);
        let args = FetchArgs {
            fixture: file.path().to_path_buf(),
            remote: Some("origin".into()),
            prune: false,
        };
        let diff = fetch_fixture(&args, RepositoryConfig::default())
            .await
            .unwrap();
        let names: Vec<(&str, ChangeType)> = diff
            .iter()
            .map(|c| (c.short_name.as_str(), c.change_type))
            .collect();
        assert_eq!(
            names,
            vec![
                ("origin/feature", ChangeType::Added),
                ("origin/main", ChangeType::Moved),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_from_unknown_remote_fails() {
        let file = fixture(H2, None);
        let args = FetchArgs {
            fixture: file.path().to_path_buf(),
            remote: Some("upstream".into()),
            prune: false,
        };
        assert!(fetch_fixture(&args, RepositoryConfig::default())
            .await
            .is_err());
    }

    #[test]
    fn names_are_checked_per_kind() {
        assert!(check_name("feature/login", NameKind::Branch).is_ok());
        assert!(check_name("bad..name", NameKind::Branch).is_err());
        assert!(check_name("v1.0", NameKind::Tag).is_ok());
        assert!(check_name("origin", NameKind::Remote).is_ok());
        assert!(check_name("origin/main", NameKind::Remote).is_err());
        assert!(check_name("origin/main", NameKind::RemoteBranch).is_ok());
        assert!(cmd_check_name(
            CheckNameArgs {
                name: "topic.lock".into(),
                kind: NameKind::Branch,
            },
            OutputFormat::Json,
        )
        .is_err());
    }

    #[test]
    fn config_file_is_optional() {
        assert_eq!(load_config(None).unwrap(), RepositoryConfig::default());

        let file = write_temp("channel_capacity = 16\nload_submodules = false\n");
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.channel_capacity, 16);
        assert!(!config.load_submodules);

        let bad = write_temp("channel_capacity = 0\n");
        assert!(load_config(Some(bad.path())).is_err());
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "replica", "diff", "a.json", "b.json", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Diff(_)));

        let cli = Cli::try_parse_from(["replica", "check-name", "origin", "--kind", "remote"])
            .unwrap();
        match cli.command {
            Command::CheckName(args) => assert_eq!(args.kind, NameKind::Remote),
            _ => panic!("expected check-name"),
        }
    }
}
