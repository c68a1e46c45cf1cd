#![deny(missing_docs)]
//! Gardener core library.
//!
//! This crate contains the domain types, polling primitives and client-side
//! state that drive the Gardener repository-health workflows.

pub mod backend;
pub mod cache;
pub mod domain;
pub mod draft;
pub mod error;
pub mod fix;
pub mod openapi;
pub mod poll;
pub mod report;
pub mod session;
/// Workflow orchestration over a backend.
pub mod workflow;

pub use backend::{BackendFuture, DEFAULT_BATCH_LIMIT, GardenerBackend};
pub use cache::{RepoCache, SharedRepoCache};
pub use domain::{
    AuthExchangeRequest, AuthExchangeResponse, BatchStatus, CommitRequest, CommitResponse,
    DraftProposal, HealthCheckResponse, PortfolioStage, PortfolioStatus, Repo, RepoHealth,
    WorkflowResponse,
};
pub use draft::{DraftReview, DraftState};
pub use error::{GardenerError, LOGIN_ROUTE, Result};
pub use fix::{FixStatus, FixTracker};
pub use openapi::{ContractDoc, contract_schema_json};
pub use poll::{CancelHandle, PollPolicy, Sleeper, TokioSleeper, poll_until};
pub use report::{
    describe_fix_status, health_label, render_batch_markdown, render_draft_markdown, render_json,
    render_portfolio_markdown, render_repos_markdown,
};
pub use session::{
    MemorySession, SessionStore, authorize_url, extract_callback_code, reject_session,
};
pub use workflow::{FixOutcome, Gardener};
