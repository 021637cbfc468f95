use async_trait::async_trait;

use crate::Result;

/// One text-in/text-out classification request.
#[derive(Clone, Debug, PartialEq)]
pub struct OracleRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Port for the external text oracle (OpenAI today).
///
/// Implementations must map throttling to [`Error::RateLimited`](crate::Error::RateLimited)
/// and transient outages to [`Error::Unavailable`](crate::Error::Unavailable) so the
/// classifier can back off; everything else is treated as a hard failure.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, req: OracleRequest) -> Result<String>;
}
