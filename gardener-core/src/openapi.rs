//! OpenAPI description of the payloads exchanged with the Gardener backend.

use utoipa::OpenApi;

use crate::domain::{
    AuthExchangeRequest, AuthExchangeResponse, BatchStatus, CommitRequest, CommitResponse,
    HealthCheckResponse, PortfolioStage, PortfolioStatus, Repo, RepoHealth, WorkflowResponse,
};
use crate::error::Result;

#[derive(OpenApi)]
#[openapi(
    info(title = "Gardener backend contract"),
    components(
        schemas(
            Repo,
            RepoHealth,
            BatchStatus,
            HealthCheckResponse,
            AuthExchangeRequest,
            AuthExchangeResponse,
            WorkflowResponse,
            CommitRequest,
            CommitResponse,
            PortfolioStage,
            PortfolioStatus
        )
    )
)]
/// Schemas for every request and response body the client relies on.
pub struct ContractDoc;

/// Render the contract schemas as pretty-printed OpenAPI JSON.
pub fn contract_schema_json() -> Result<String> {
    Ok(ContractDoc::openapi().to_pretty_json()?)
}
