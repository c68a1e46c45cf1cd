//! Report formatting utilities for Gardener outputs.

use std::fmt::Write;

use serde::Serialize;

use crate::domain::{BatchStatus, PortfolioStatus, Repo, RepoHealth};
use crate::draft::{DraftReview, DraftState};
use crate::fix::FixStatus;

/// Health band used to label scores.
pub fn health_label(score: u8) -> &'static str {
    match score {
        80..=u8::MAX => "healthy",
        50..=79 => "needs attention",
        _ => "critical",
    }
}

/// Render the repository collection as Markdown.
pub fn render_repos_markdown(repos: &[Repo]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Gardener Repository Report\n");
    if repos.is_empty() {
        let _ = writeln!(output, "No repositories found.");
        return output;
    }
    for repo in repos {
        let _ = writeln!(output, "## {}\n", repo.full_name);
        let _ = writeln!(output, "- ID: {}", repo.id);
        let _ = writeln!(output, "- URL: {}", repo.html_url);
        let _ = writeln!(
            output,
            "- Visibility: {}",
            if repo.private { "private" } else { "public" }
        );
        if let Some(description) = repo.description.as_deref() {
            let _ = writeln!(output, "- Description: {description}");
        }
        let _ = writeln!(output);
        append_health(&mut output, repo.health.as_ref());
        if let Some(draft) = repo.draft_proposal.as_ref().filter(|draft| !draft.is_empty()) {
            let _ = writeln!(output, "### Draft proposal");
            for filename in draft.keys() {
                let _ = writeln!(output, "- {filename}");
            }
            let _ = writeln!(output);
        }
    }
    output
}

/// Render batch progress and results as Markdown.
pub fn render_batch_markdown(status: &BatchStatus) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Gardener Batch Report\n");
    let _ = writeln!(
        output,
        "- Progress: {}/{} ({}%)",
        status.completed,
        status.total,
        status.progress_percent()
    );
    let _ = writeln!(
        output,
        "- Status: {}\n",
        if status.is_complete() {
            "complete"
        } else {
            "in progress"
        }
    );
    if status.results.is_empty() {
        let _ = writeln!(output, "No results yet.");
        return output;
    }
    for health in &status.results {
        let _ = writeln!(output, "## {}\n", health.repo_name);
        append_health(&mut output, Some(health));
    }
    output
}

/// Render portfolio progress as Markdown.
pub fn render_portfolio_markdown(status: &PortfolioStatus) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Gardener Portfolio Report\n");
    let _ = writeln!(output, "- Stage: {}", status.stage.as_str());
    let _ = writeln!(
        output,
        "- Repositories analyzed: {}/{}",
        status.analyzed, status.total_repos
    );
    if let Some(url) = status.pr_url.as_deref() {
        let _ = writeln!(output, "- Pull request: {url}");
    }
    if let Some(url) = status.profile_url.as_deref() {
        let _ = writeln!(output, "- Profile: {url}");
    }
    let _ = writeln!(output);
    append_list(&mut output, "Errors", &status.errors, "No errors reported.");
    output
}

/// Render a draft review with inclusion flags and file contents.
pub fn render_draft_markdown(repo: &Repo, review: &DraftReview) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Draft for {}\n", repo.full_name);
    match review.state() {
        DraftState::NoDraft => {
            let _ = writeln!(output, "No draft available.");
        }
        DraftState::Committed { pr_url } => {
            let _ = writeln!(output, "Committed: {pr_url}");
        }
        DraftState::PendingReview { files } => {
            let contents = repo.draft_proposal.as_ref();
            for (filename, included) in files {
                let mark = if *included { "x" } else { " " };
                let _ = writeln!(output, "## [{mark}] {filename}\n");
                if let Some(body) = contents.and_then(|draft| draft.get(filename)) {
                    let _ = writeln!(output, "```markdown\n{body}\n```\n");
                }
            }
        }
    }
    output
}

/// One-line summary of a fix status for listings.
pub fn describe_fix_status(status: Option<FixStatus>, repo: &Repo) -> String {
    match (status, repo.pending_fix_url()) {
        (Some(FixStatus::Pending), _) => "fix in progress".to_string(),
        _ if repo.has_draft() => "draft ready for review".to_string(),
        (_, Some(url)) => format!("pull request open: {url}"),
        (Some(FixStatus::Done), None) => "fix delivered".to_string(),
        (None, None) => "no fix requested".to_string(),
    }
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

fn append_health(output: &mut String, health: Option<&RepoHealth>) {
    let Some(health) = health else {
        let _ = writeln!(output, "### Health\nNot analyzed yet.\n");
        return;
    };
    let _ = writeln!(output, "### Health");
    let _ = writeln!(
        output,
        "- Score: {} ({})",
        health.health_score,
        health_label(health.health_score)
    );
    let _ = writeln!(
        output,
        "- Last commit: {}",
        health.last_commit_date.format("%Y-%m-%d")
    );
    if let Some(url) = health.pending_fix_url.as_deref() {
        let _ = writeln!(output, "- Pending fix: {url}");
    }
    let _ = writeln!(output);
    append_list(output, "Issues", &health.issues, "No issues found.");
}

fn append_list(output: &mut String, title: &str, items: &[String], empty_message: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "### {title}\n{empty_message}\n");
        return;
    }
    let _ = writeln!(output, "### {title}");
    for item in items {
        let _ = writeln!(output, "- {item}");
    }
    let _ = writeln!(output);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DraftProposal, PortfolioStage};

    fn sample_repo() -> Repo {
        Repo {
            id: 1,
            name: "demo".to_string(),
            full_name: "octo/demo".to_string(),
            private: true,
            html_url: "https://github.com/octo/demo".to_string(),
            description: Some("Demo service".to_string()),
            health: Some(RepoHealth {
                repo_name: "octo/demo".to_string(),
                repo_id: None,
                health_score: 45,
                issues: vec!["Missing README".to_string()],
                last_commit_date: "2024-03-05T12:00:00Z".parse().expect("date"),
                pending_fix_url: None,
            }),
            draft_proposal: None,
        }
    }

    #[test]
    fn renders_repos_markdown() {
        let output = render_repos_markdown(&[sample_repo()]);
        assert!(output.contains("Gardener Repository Report"));
        assert!(output.contains("## octo/demo"));
        assert!(output.contains("Visibility: private"));
        assert!(output.contains("Score: 45 (critical)"));
        assert!(output.contains("Last commit: 2024-03-05"));
        assert!(output.contains("- Missing README"));
    }

    #[test]
    fn renders_unanalyzed_repo() {
        let mut repo = sample_repo();
        repo.health = None;
        let output = render_repos_markdown(&[repo]);
        assert!(output.contains("Not analyzed yet."));
    }

    #[test]
    fn renders_batch_progress() {
        let status = BatchStatus {
            total: 4,
            completed: 1,
            results: Vec::new(),
        };
        let output = render_batch_markdown(&status);
        assert!(output.contains("Progress: 1/4 (25%)"));
        assert!(output.contains("in progress"));
        assert!(output.contains("No results yet."));
    }

    #[test]
    fn renders_portfolio() {
        let status = PortfolioStatus {
            stage: PortfolioStage::Complete,
            total_repos: 3,
            analyzed: 3,
            pr_url: Some("https://github.com/octo/octo/pull/1".to_string()),
            profile_url: None,
            errors: Vec::new(),
        };
        let output = render_portfolio_markdown(&status);
        assert!(output.contains("Stage: complete"));
        assert!(output.contains("pull/1"));
        assert!(output.contains("No errors reported."));
    }

    #[test]
    fn renders_draft_review_flags() {
        let mut repo = sample_repo();
        let mut draft = DraftProposal::new();
        draft.insert("README.md".to_string(), "# demo".to_string());
        draft.insert("SECURITY.md".to_string(), "report here".to_string());
        repo.draft_proposal = Some(draft.clone());
        let mut review = DraftReview::from_proposal(&draft);
        review.toggle("SECURITY.md").expect("toggle");
        let output = render_draft_markdown(&repo, &review);
        assert!(output.contains("## [x] README.md"));
        assert!(output.contains("## [ ] SECURITY.md"));
        assert!(output.contains("# demo"));
    }

    #[test]
    fn describes_fix_status() {
        let mut repo = sample_repo();
        assert_eq!(describe_fix_status(None, &repo), "no fix requested");
        assert_eq!(
            describe_fix_status(Some(FixStatus::Pending), &repo),
            "fix in progress"
        );
        if let Some(health) = repo.health.as_mut() {
            health.pending_fix_url = Some("https://github.com/octo/demo/pull/2".to_string());
        }
        assert_eq!(
            describe_fix_status(None, &repo),
            "pull request open: https://github.com/octo/demo/pull/2"
        );
        let mut draft = DraftProposal::new();
        draft.insert("README.md".to_string(), "# demo".to_string());
        repo.draft_proposal = Some(draft);
        assert_eq!(
            describe_fix_status(Some(FixStatus::Done), &repo),
            "draft ready for review"
        );
    }

    #[test]
    fn health_labels_cover_bands() {
        assert_eq!(health_label(100), "healthy");
        assert_eq!(health_label(80), "healthy");
        assert_eq!(health_label(50), "needs attention");
        assert_eq!(health_label(0), "critical");
    }

    #[test]
    fn renders_json_payload() {
        let json = render_json(&vec![sample_repo()]).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed[0]["health"]["health_score"], 45);
    }
}
