//! Backend connection settings resolved from flags and the environment.

use crate::CliResult;
use clap::Args;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const API_SUFFIX: &str = "/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/callback";

/// Connection flags shared by every backend command.
#[derive(Args, Clone, Debug)]
pub struct BackendArgs {
    /// Base URL of the Gardener backend (with or without the `/api` suffix).
    #[arg(long, env = "GARDENER_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,
    /// Request timeout in seconds.
    #[arg(long, env = "GARDENER_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout_secs: u64,
}

/// Resolved client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Validate flags into a usable configuration.
    pub fn from_args(args: &BackendArgs) -> CliResult<Self> {
        if args.timeout_secs == 0 {
            return Err("timeout must be at least one second".into());
        }
        Ok(Self {
            base_url: normalize_base_url(&args.api_url)?,
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }

    /// Join an endpoint path onto the API root.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Trim the URL and make sure it ends in exactly one `/api` segment.
fn normalize_base_url(api_url: &str) -> CliResult<String> {
    let trimmed = api_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err("api url is required".into());
    }
    if trimmed.ends_with(API_SUFFIX) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}{API_SUFFIX}"))
    }
}
