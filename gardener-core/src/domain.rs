//! Domain entities exchanged with the Gardener backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Proposed file contents keyed by filename, awaiting review.
pub type DraftProposal = BTreeMap<String, String>;

/// A GitHub repository as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Repo {
    /// GitHub repository identifier.
    pub id: u64,
    /// Short repository name.
    pub name: String,
    /// Owner-qualified name (`owner/name`).
    pub full_name: String,
    /// Whether the repository is private.
    pub private: bool,
    /// Canonical GitHub URL.
    pub html_url: String,
    /// Repository description.
    #[serde(default)]
    pub description: Option<String>,
    /// Latest health snapshot, if the repository has been analyzed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<RepoHealth>,
    /// Generated files awaiting review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_proposal: Option<DraftProposal>,
}

impl Repo {
    /// Whether a non-empty draft proposal is attached.
    pub fn has_draft(&self) -> bool {
        self.draft_proposal
            .as_ref()
            .map(|draft| !draft.is_empty())
            .unwrap_or(false)
    }

    /// URL of an already-open remediation pull request.
    pub fn pending_fix_url(&self) -> Option<&str> {
        self.health
            .as_ref()
            .and_then(|health| health.pending_fix_url.as_deref())
    }
}

/// Result of analyzing a single repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RepoHealth {
    /// Repository the snapshot belongs to (short or owner-qualified name).
    pub repo_name: String,
    /// Repository identifier, when the backend echoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<u64>,
    /// Aggregate health score, 0-100.
    pub health_score: u8,
    /// Human-readable issues, most important first.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Timestamp of the last commit seen during analysis.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub last_commit_date: DateTime<Utc>,
    /// Open remediation pull request, if any.
    #[serde(default)]
    pub pending_fix_url: Option<String>,
}

/// Progress of a batch analysis workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct BatchStatus {
    /// Number of repositories in the batch.
    pub total: u32,
    /// Number of repositories processed so far.
    pub completed: u32,
    /// Snapshots produced so far, in completion order.
    #[serde(default)]
    pub results: Vec<RepoHealth>,
}

impl BatchStatus {
    /// A batch is terminal once every item completed. An empty batch never is.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }

    /// Completion percentage, 0 when the total is not yet known.
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let ratio = f64::from(self.completed.min(self.total)) / f64::from(self.total);
        (ratio * 100.0).round() as u8
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthCheckResponse {
    /// Backend status string.
    pub status: String,
    /// Service name.
    pub service: String,
}

/// Request body of `POST /auth/exchange`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthExchangeRequest {
    /// OAuth authorization code from the callback.
    pub code: String,
}

/// Response of `POST /auth/exchange`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthExchangeResponse {
    /// Bearer token for subsequent requests.
    pub access_token: String,
    /// Token type reported by GitHub.
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Response of every workflow trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowResponse {
    /// Opaque workflow handle.
    pub workflow_id: String,
}

/// Request body of `POST /repos/{id}/commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommitRequest {
    /// Draft filenames approved for the pull request.
    pub selected_files: Vec<String>,
}

/// Response of `POST /repos/{id}/commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommitResponse {
    /// Backend status string.
    #[serde(default)]
    pub status: Option<String>,
    /// URL of the opened pull request.
    pub pr_url: String,
}

/// Stage reported by the portfolio workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioStage {
    /// Listing repositories.
    Scanning,
    /// Scoring repositories.
    Analyzing,
    /// Picking highlighted projects.
    Selecting,
    /// Writing the profile README.
    Generating,
    /// Opening the profile pull request.
    Publishing,
    /// Profile is ready.
    Complete,
    /// Workflow gave up.
    Failed,
}

impl PortfolioStage {
    /// Whether the workflow will not progress further.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Stable label for reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::Analyzing => "analyzing",
            Self::Selecting => "selecting",
            Self::Generating => "generating",
            Self::Publishing => "publishing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// Progress of a portfolio generation workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PortfolioStatus {
    /// Current stage.
    pub stage: PortfolioStage,
    /// Repositories considered.
    #[serde(default)]
    pub total_repos: u32,
    /// Repositories analyzed so far.
    #[serde(default)]
    pub analyzed: u32,
    /// Pull request carrying the profile README.
    #[serde(default)]
    pub pr_url: Option<String>,
    /// Published profile URL.
    #[serde(default)]
    pub profile_url: Option<String>,
    /// Errors collected along the way.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Lenient timestamp decoding: the backend emits RFC 3339, naive ISO 8601
/// datetimes (assumed UTC) or bare dates.
mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}
