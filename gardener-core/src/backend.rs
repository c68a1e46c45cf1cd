//! Backend HTTP surface the client depends on.

use std::future::Future;
use std::pin::Pin;

use crate::domain::{
    BatchStatus, CommitResponse, HealthCheckResponse, PortfolioStatus, Repo, WorkflowResponse,
};
use crate::error::Result;

/// Boxed future returned by backend calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Default repository count for a batch analysis.
pub const DEFAULT_BATCH_LIMIT: u32 = 5;

/// Operations exposed by the Gardener backend.
///
/// Implementations attach the session's bearer token and turn a 401 into
/// [`crate::GardenerError::Unauthorized`] after clearing the session.
pub trait GardenerBackend {
    /// `GET /health`.
    fn check_health(&self) -> BackendFuture<'_, HealthCheckResponse>;

    /// `POST /auth/exchange`, returning the bearer token.
    fn exchange_code<'a>(&'a self, code: &'a str) -> BackendFuture<'a, String>;

    /// `GET /repos`.
    fn list_repos(&self) -> BackendFuture<'_, Vec<Repo>>;

    /// `POST /analyze/{repo_id}`.
    fn trigger_analysis(&self, repo_id: u64) -> BackendFuture<'_, WorkflowResponse>;

    /// `POST /garden/start?limit=N`.
    fn start_batch(&self, limit: u32) -> BackendFuture<'_, WorkflowResponse>;

    /// `GET /garden/status/{workflow_id}`.
    fn batch_status<'a>(&'a self, workflow_id: &'a str) -> BackendFuture<'a, BatchStatus>;

    /// `POST /fix/{repo_id}`.
    fn trigger_fix(&self, repo_id: u64) -> BackendFuture<'_, WorkflowResponse>;

    /// `POST /repos/{repo_id}/commit`.
    fn commit_docs<'a>(
        &'a self,
        repo_id: u64,
        selected_files: &'a [String],
    ) -> BackendFuture<'a, CommitResponse>;

    /// `POST /portfolio/generate`.
    fn generate_portfolio(&self) -> BackendFuture<'_, WorkflowResponse>;

    /// `GET /portfolio/status/{workflow_id}`.
    fn portfolio_status<'a>(&'a self, workflow_id: &'a str)
    -> BackendFuture<'a, PortfolioStatus>;
}
