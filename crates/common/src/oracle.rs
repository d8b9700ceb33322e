use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// A rendered decision request: the prompt text plus the JSON schema the
/// reply must follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub prompt: String,
    pub schema: Value,
}

/// Abstraction over the external decision oracle (a text-generation service).
///
/// `GeminiClient` in `crates/engine` implements this for production. Tests
/// inject scripted doubles through `Arc<dyn OracleClient>`.
///
/// Implementations hold no per-request state: one handle is shared by every
/// concurrent request. Failures are reported as `Error::OracleUnavailable`
/// or `Error::OracleTimeout`; callers make a single attempt.
#[async_trait]
pub trait OracleClient: Send + Sync {
    /// Submit a request and return the oracle's raw reply text.
    async fn submit(&self, request: &OracleRequest) -> Result<String>;

    /// Short provider/model label for logs and health checks.
    fn name(&self) -> &str;
}
