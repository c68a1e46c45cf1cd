//! Reqwest implementation of the Gardener backend.

use crate::CliResult;
use crate::config::ClientConfig;
use gardener_core::{
    AuthExchangeRequest, AuthExchangeResponse, BackendFuture, BatchStatus, CommitRequest,
    CommitResponse, GardenerBackend, GardenerError, HealthCheckResponse, PortfolioStatus, Repo,
    SessionStore, WorkflowResponse, reject_session,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

const USER_AGENT: &str = "gardener-cli";
const NGROK_SKIP_WARNING: &str = "ngrok-skip-browser-warning";

/// Shared session handle used by the HTTP client.
pub type SharedSession = Arc<dyn SessionStore + Send + Sync>;

/// Reqwest-backed backend client.
pub struct ReqwestBackend {
    client: Client,
    config: ClientConfig,
    session: SharedSession,
}

impl ReqwestBackend {
    /// Build a client for the configured backend.
    pub fn new(config: ClientConfig, session: SharedSession) -> CliResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(NGROK_SKIP_WARNING, HeaderValue::from_static("true"));
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            session,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.config.endpoint(path))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.config.endpoint(path))
    }

    /// Attach the bearer token, send, and decode the JSON body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> gardener_core::Result<T> {
        let request = match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            log::warn!("backend rejected credentials; clearing session");
            return Err(reject_session(self.session.as_ref()));
        }
        let body = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            let message = error_detail(&body, status);
            if status == StatusCode::NOT_FOUND {
                return Err(GardenerError::NotFound(message));
            }
            return Err(GardenerError::Http {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_slice(&body).map_err(|err| GardenerError::Decode(err.to_string()))
    }
}

impl GardenerBackend for ReqwestBackend {
    fn check_health(&self) -> BackendFuture<'_, HealthCheckResponse> {
        Box::pin(async move { self.send(self.get("health")).await })
    }

    fn exchange_code<'a>(&'a self, code: &'a str) -> BackendFuture<'a, String> {
        Box::pin(async move {
            let request = self.post("auth/exchange").json(&AuthExchangeRequest {
                code: code.to_string(),
            });
            let response: AuthExchangeResponse = self.send(request).await?;
            if response.access_token.trim().is_empty() {
                return Err(GardenerError::Decode(
                    "auth exchange returned an empty token".to_string(),
                ));
            }
            Ok(response.access_token)
        })
    }

    fn list_repos(&self) -> BackendFuture<'_, Vec<Repo>> {
        Box::pin(async move { self.send(self.get("repos")).await })
    }

    fn trigger_analysis(&self, repo_id: u64) -> BackendFuture<'_, WorkflowResponse> {
        Box::pin(async move { self.send(self.post(&format!("analyze/{repo_id}"))).await })
    }

    fn start_batch(&self, limit: u32) -> BackendFuture<'_, WorkflowResponse> {
        Box::pin(async move {
            let request = self.post("garden/start").query(&[("limit", limit)]);
            self.send(request).await
        })
    }

    fn batch_status<'a>(&'a self, workflow_id: &'a str) -> BackendFuture<'a, BatchStatus> {
        Box::pin(async move {
            let path = format!("garden/status/{}", urlencoding::encode(workflow_id));
            self.send(self.get(&path)).await
        })
    }

    fn trigger_fix(&self, repo_id: u64) -> BackendFuture<'_, WorkflowResponse> {
        Box::pin(async move { self.send(self.post(&format!("fix/{repo_id}"))).await })
    }

    fn commit_docs<'a>(
        &'a self,
        repo_id: u64,
        selected_files: &'a [String],
    ) -> BackendFuture<'a, CommitResponse> {
        Box::pin(async move {
            let request = self
                .post(&format!("repos/{repo_id}/commit"))
                .json(&CommitRequest {
                    selected_files: selected_files.to_vec(),
                });
            self.send(request).await
        })
    }

    fn generate_portfolio(&self) -> BackendFuture<'_, WorkflowResponse> {
        Box::pin(async move { self.send(self.post("portfolio/generate")).await })
    }

    fn portfolio_status<'a>(
        &'a self,
        workflow_id: &'a str,
    ) -> BackendFuture<'a, PortfolioStatus> {
        Box::pin(async move {
            let path = format!("portfolio/status/{}", urlencoding::encode(workflow_id));
            self.send(self.get(&path)).await
        })
    }
}

fn transport_error(err: reqwest::Error) -> GardenerError {
    if err.is_timeout() {
        GardenerError::Transport(format!("request timed out: {err}"))
    } else {
        GardenerError::Transport(err.to_string())
    }
}

/// Prefer the backend's `detail` field, fall back to the raw body.
fn error_detail(body: &[u8], status: StatusCode) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(detail) = value.get("detail").and_then(|detail| detail.as_str()) {
            return detail.to_string();
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        text
    }
}
