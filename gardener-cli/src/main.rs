#![deny(missing_docs)]
//! Gardener command-line interface.
//!
//! Signs in with GitHub, analyzes repository health through the Gardener
//! backend, and reviews generated fixes before they become pull requests.

mod api;
mod config;
mod session;

use api::{ReqwestBackend, SharedSession};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use config::{BackendArgs, ClientConfig, DEFAULT_REDIRECT_URI};
use gardener_core::{
    BatchStatus, CancelHandle, DEFAULT_BATCH_LIMIT, DraftProposal, DraftReview, FixOutcome,
    Gardener, GardenerBackend, GardenerError, PortfolioStatus, Repo, RepoHealth, SessionStore,
    Sleeper, authorize_url, contract_schema_json, describe_fix_status, extract_callback_code,
    health_label, render_batch_markdown, render_draft_markdown, render_json, render_portfolio_markdown,
    render_repos_markdown,
};
use session::{FileSession, auth_store_path};
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "gardener", version, about = "Gardener CLI")]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,
    /// Override the auth session file path.
    #[arg(long, global = true)]
    auth_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Args, Clone, Debug)]
struct LoginArgs {
    /// GitHub OAuth application client id.
    #[arg(long, env = "GITHUB_CLIENT_ID")]
    client_id: String,
    /// Callback URL registered with the OAuth application.
    #[arg(long, env = "GARDENER_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    redirect_uri: String,
}

#[derive(Args, Clone, Debug)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(&["code", "url"])
))]
struct CallbackArgs {
    /// Authorization code returned by GitHub.
    #[arg(long)]
    code: Option<String>,
    /// Full callback URL the browser was redirected to.
    #[arg(long)]
    url: Option<String>,
}

#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
struct CommitSelection {
    /// Draft file to include (repeatable).
    #[arg(long = "file")]
    files: Vec<String>,
    /// Include every draft file.
    #[arg(long)]
    all: bool,
    /// Draft file to leave out (repeatable).
    #[arg(long = "exclude")]
    exclude: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is reachable.
    Health {
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Print the GitHub sign-in URL.
    Login(LoginArgs),
    /// Finish sign-in with the code GitHub redirected back with.
    Callback(CallbackArgs),
    /// Forget the stored session token.
    Logout,
    /// List repositories with their latest health snapshot.
    Repos {
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Analyze a single repository and wait for its health snapshot.
    Analyze {
        /// Repository id.
        repo_id: u64,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Analyze a batch of repositories.
    Garden {
        /// Maximum number of repositories to analyze.
        #[arg(long, default_value_t = DEFAULT_BATCH_LIMIT)]
        limit: u32,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Generate fixes for a repository and wait for the draft.
    Fix {
        /// Repository id.
        repo_id: u64,
        /// Wait for a pull request instead of a reviewable draft.
        #[arg(long)]
        pull_request: bool,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Show a repository's draft awaiting review.
    Review {
        /// Repository id.
        repo_id: u64,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Commit selected draft files as a pull request.
    Commit {
        /// Repository id.
        repo_id: u64,
        #[command(flatten)]
        selection: CommitSelection,
    },
    /// Generate the profile README portfolio.
    Portfolio {
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Print the OpenAPI schemas of the backend payloads.
    Schema {
        /// Write the schema to a file instead of stdout.
        #[arg(long = "report-output")]
        report_output: Option<PathBuf>,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(err) = &result {
        if let Some(GardenerError::Unauthorized { .. }) = err.downcast_ref::<GardenerError>() {
            eprintln!("Session expired or missing. Run `gardener login` to sign in again.");
        }
    }
    result
}

#[cfg(test)]
fn main() {}

#[cfg_attr(test, allow(dead_code))]
async fn run(cli: Cli) -> CliResult<()> {
    if let Commands::Schema { report_output } = &cli.command {
        return run_schema(report_output.clone()).await;
    }
    let session = Arc::new(FileSession::open(auth_store_path(cli.auth_path)?)?);
    let config = ClientConfig::from_args(&cli.backend)?;
    log::debug!("using backend {}", config.base_url);
    let shared: SharedSession = session.clone();
    let gardener = Gardener::new(ReqwestBackend::new(config, shared)?);

    match cli.command {
        Commands::Health { report } => run_health(&gardener, &report).await,
        Commands::Login(args) => {
            let url = authorize_url(&args.client_id, &args.redirect_uri)?;
            println!("Open this URL to sign in with GitHub:\n\n  {url}\n");
            println!("Then run `gardener callback --url <redirected URL>`.");
            Ok(())
        }
        Commands::Callback(args) => {
            let code = match (args.code, args.url) {
                (Some(code), _) => code,
                (None, Some(url)) => extract_callback_code(&url)?,
                (None, None) => return Err("a code or callback url is required".into()),
            };
            gardener.sign_in(&code, session.as_ref()).await?;
            println!("Signed in. Session stored at {}", session.path().display());
            Ok(())
        }
        Commands::Logout => {
            session.clear()?;
            println!("Signed out.");
            Ok(())
        }
        Commands::Repos { report } => {
            require_session(session.as_ref())?;
            run_repos(&gardener, &report).await
        }
        Commands::Analyze { repo_id, report } => {
            require_session(session.as_ref())?;
            let cancel = cancel_on_ctrl_c();
            run_analyze(&gardener, repo_id, &cancel, &report).await
        }
        Commands::Garden { limit, report } => {
            require_session(session.as_ref())?;
            let cancel = cancel_on_ctrl_c();
            run_garden(&gardener, limit, &cancel, &report).await
        }
        Commands::Fix {
            repo_id,
            pull_request,
            report,
        } => {
            require_session(session.as_ref())?;
            let cancel = cancel_on_ctrl_c();
            run_fix(&gardener, repo_id, pull_request, &cancel, &report).await
        }
        Commands::Review { repo_id, report } => {
            require_session(session.as_ref())?;
            run_review(&gardener, repo_id, &report).await
        }
        Commands::Commit { repo_id, selection } => {
            require_session(session.as_ref())?;
            run_commit(&gardener, repo_id, &selection).await.map(|_| ())
        }
        Commands::Portfolio { report } => {
            require_session(session.as_ref())?;
            let cancel = cancel_on_ctrl_c();
            run_portfolio(&gardener, &cancel, &report).await
        }
        Commands::Schema { .. } => Ok(()),
    }
}

/// Fail early when no token is stored.
fn require_session<S: SessionStore + ?Sized>(session: &S) -> CliResult<()> {
    if session.token().is_none() {
        return Err(GardenerError::unauthorized().into());
    }
    Ok(())
}

/// Cancel in-flight polling when the user presses Ctrl-C.
#[cfg_attr(test, allow(dead_code))]
fn cancel_on_ctrl_c() -> CancelHandle {
    let cancel = CancelHandle::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received; cancelling");
            handle.cancel();
        }
    });
    cancel
}

#[cfg_attr(test, allow(dead_code))]
async fn run_health<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    report: &OutputArgs,
) -> CliResult<()> {
    let health = gardener.check_health().await?;
    let contents = match report.format {
        OutputFormat::Json => render_json(&health)?,
        OutputFormat::Text | OutputFormat::Markdown => {
            format!("Backend: {} ({})\n", health.status, health.service)
        }
    };
    emit_output(report, contents).await
}

async fn run_repos<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    report: &OutputArgs,
) -> CliResult<()> {
    let repos = gardener.refresh_repos().await?;
    let contents = match report.format {
        OutputFormat::Text => render_repos_text(&repos),
        OutputFormat::Json => render_json(&repos)?,
        OutputFormat::Markdown => render_repos_markdown(&repos),
    };
    emit_output(report, contents).await
}

#[cfg_attr(test, allow(dead_code))]
async fn run_analyze<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    repo_id: u64,
    cancel: &CancelHandle,
    report: &OutputArgs,
) -> CliResult<()> {
    cancel.until_cancelled(gardener.refresh_repos()).await?;
    let health = gardener.analyze(repo_id, cancel).await?;
    let contents = match report.format {
        OutputFormat::Text => render_health_text(&health),
        OutputFormat::Json => render_json(&health)?,
        OutputFormat::Markdown => {
            let repos: Vec<Repo> = gardener.cache().get(repo_id).into_iter().collect();
            render_repos_markdown(&repos)
        }
    };
    emit_output(report, contents).await
}

#[cfg_attr(test, allow(dead_code))]
async fn run_garden<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    limit: u32,
    cancel: &CancelHandle,
    report: &OutputArgs,
) -> CliResult<()> {
    cancel.until_cancelled(gardener.refresh_repos()).await?;
    let status = gardener.run_batch(limit, cancel).await?;
    let contents = match report.format {
        OutputFormat::Text => render_batch_text(&status),
        OutputFormat::Json => render_json(&status)?,
        OutputFormat::Markdown => render_batch_markdown(&status),
    };
    emit_output(report, contents).await
}

#[cfg_attr(test, allow(dead_code))]
async fn run_fix<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    repo_id: u64,
    pull_request: bool,
    cancel: &CancelHandle,
    report: &OutputArgs,
) -> CliResult<()> {
    cancel.until_cancelled(gardener.refresh_repos()).await?;
    let outcome = if pull_request {
        FixOutcome::PullRequest(gardener.fix_pull_request(repo_id, cancel).await?)
    } else {
        gardener.fix(repo_id, cancel).await?
    };
    let repo = gardener
        .cache()
        .get(repo_id)
        .ok_or_else(|| GardenerError::NotFound(format!("repository {repo_id}")))?;
    let contents = match (&outcome, report.format) {
        (FixOutcome::Draft(draft), OutputFormat::Json) => render_json(&serde_json::json!({
            "repo_id": repo_id,
            "status": describe_fix_status(gardener.fix_status(repo_id), &repo),
            "draft_proposal": draft,
        }))?,
        (FixOutcome::PullRequest(url), OutputFormat::Json) => render_json(&serde_json::json!({
            "repo_id": repo_id,
            "status": describe_fix_status(gardener.fix_status(repo_id), &repo),
            "pr_url": url,
        }))?,
        (FixOutcome::Draft(draft), OutputFormat::Markdown) => {
            render_draft_markdown(&repo, &DraftReview::from_proposal(draft))
        }
        (FixOutcome::Draft(draft), OutputFormat::Text) => render_draft_text(&repo, draft),
        (FixOutcome::PullRequest(url), _) => format!("Pull request opened: {url}\n"),
    };
    emit_output(report, contents).await
}

#[cfg_attr(test, allow(dead_code))]
async fn run_review<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    repo_id: u64,
    report: &OutputArgs,
) -> CliResult<()> {
    gardener.refresh_repos().await?;
    let (repo, draft) = pending_draft(gardener, repo_id)?;
    let contents = match report.format {
        OutputFormat::Text => render_draft_text(&repo, &draft),
        OutputFormat::Json => render_json(&draft)?,
        OutputFormat::Markdown => render_draft_markdown(&repo, &DraftReview::from_proposal(&draft)),
    };
    emit_output(report, contents).await
}

async fn run_commit<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    repo_id: u64,
    selection: &CommitSelection,
) -> CliResult<Option<String>> {
    if !selection.all && selection.files.is_empty() {
        println!("No files selected; nothing committed.");
        return Ok(None);
    }
    gardener.refresh_repos().await?;
    let (_, draft) = pending_draft(gardener, repo_id)?;
    let mut review = select_draft_files(&draft, selection)?;
    let committed = gardener.commit_review(repo_id, &mut review).await?;
    match committed.as_deref() {
        Some(url) => println!("Pull request opened: {url}"),
        None => println!("No files selected; nothing committed."),
    }
    Ok(committed)
}

#[cfg_attr(test, allow(dead_code))]
async fn run_portfolio<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    cancel: &CancelHandle,
    report: &OutputArgs,
) -> CliResult<()> {
    let status = gardener.generate_portfolio(cancel).await?;
    let contents = match report.format {
        OutputFormat::Text => render_portfolio_text(&status),
        OutputFormat::Json => render_json(&status)?,
        OutputFormat::Markdown => render_portfolio_markdown(&status),
    };
    emit_output(report, contents).await
}

async fn run_schema(report_output: Option<PathBuf>) -> CliResult<()> {
    let output = OutputArgs {
        format: OutputFormat::Json,
        report_output,
    };
    emit_output(&output, contract_schema_json()?).await
}

fn pending_draft<B: GardenerBackend, S: Sleeper>(
    gardener: &Gardener<B, S>,
    repo_id: u64,
) -> CliResult<(Repo, DraftProposal)> {
    let repo = gardener.cache().get(repo_id).ok_or_else(|| {
        GardenerError::NotFound(format!("repository {repo_id} is not in your collection"))
    })?;
    let draft = repo
        .draft_proposal
        .clone()
        .filter(|draft| !draft.is_empty())
        .ok_or_else(|| {
            GardenerError::NotFound(format!(
                "repository {repo_id} has no draft awaiting review"
            ))
        })?;
    Ok((repo, draft))
}

/// Turn command-line picks into a review; no picks selects nothing.
fn select_draft_files(draft: &DraftProposal, selection: &CommitSelection) -> CliResult<DraftReview> {
    let mut review = DraftReview::from_proposal(draft);
    if !selection.all {
        for name in &selection.files {
            if !draft.contains_key(name) {
                return Err(
                    GardenerError::InvalidInput(format!("draft has no file named {name}")).into(),
                );
            }
        }
        for name in draft.keys() {
            review.set_included(name, selection.files.contains(name))?;
        }
    }
    for name in &selection.exclude {
        review.set_included(name, false)?;
    }
    Ok(review)
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    } else {
        print!("{contents}");
    }
    Ok(())
}

fn render_repos_text(repos: &[Repo]) -> String {
    let mut output = String::new();
    if repos.is_empty() {
        let _ = writeln!(output, "No repositories found.");
        return output;
    }
    for repo in repos {
        let visibility = if repo.private { "private" } else { "public" };
        let _ = writeln!(output, "{} [{}] ({visibility})", repo.full_name, repo.id);
        match &repo.health {
            Some(health) => {
                let _ = writeln!(
                    output,
                    "  Health: {}/100 ({}), {} issue(s)",
                    health.health_score,
                    health_label(health.health_score),
                    health.issues.len()
                );
            }
            None => {
                let _ = writeln!(output, "  Health: not analyzed");
            }
        }
        let _ = writeln!(output, "  Fix: {}", describe_fix_status(None, repo));
    }
    output
}

#[cfg_attr(test, allow(dead_code))]
fn render_health_text(health: &RepoHealth) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{}: {}/100 ({})",
        health.repo_name,
        health.health_score,
        health_label(health.health_score)
    );
    let _ = writeln!(
        output,
        "Last commit: {}",
        health.last_commit_date.format("%Y-%m-%d")
    );
    if health.issues.is_empty() {
        let _ = writeln!(output, "Issues: none");
    } else {
        let _ = writeln!(output, "Issues:");
        for issue in &health.issues {
            let _ = writeln!(output, "  - {issue}");
        }
    }
    if let Some(url) = health.pending_fix_url.as_deref() {
        let _ = writeln!(output, "Pending fix: {url}");
    }
    output
}

fn render_batch_text(status: &BatchStatus) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Analyzed {}/{} repositories ({}%)",
        status.completed,
        status.total,
        status.progress_percent()
    );
    for health in &status.results {
        let _ = writeln!(
            output,
            "  {}: {}/100 ({})",
            health.repo_name,
            health.health_score,
            health_label(health.health_score)
        );
    }
    output
}

fn render_draft_text(repo: &Repo, draft: &DraftProposal) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Draft ready for {}:", repo.full_name);
    for filename in draft.keys() {
        let _ = writeln!(output, "  - {filename}");
    }
    let _ = writeln!(
        output,
        "Review with `gardener review {0}` and commit with `gardener commit {0} --all`.",
        repo.id
    );
    output
}

fn render_portfolio_text(status: &PortfolioStatus) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Portfolio: {}", status.stage.as_str());
    let _ = writeln!(
        output,
        "Repositories analyzed: {}/{}",
        status.analyzed, status.total_repos
    );
    if let Some(url) = status.pr_url.as_deref() {
        let _ = writeln!(output, "Pull request: {url}");
    }
    if let Some(url) = status.profile_url.as_deref() {
        let _ = writeln!(output, "Profile: {url}");
    }
    for error in &status.errors {
        let _ = writeln!(output, "Error: {error}");
    }
    output
}
