//! OpenAI adapter for the [`Oracle`] port.
//!
//! Talks to the `chat/completions` endpoint and classifies HTTP failures so the
//! core classifier knows which ones are worth retrying.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use tgw_core::{
    errors::Error,
    oracle::port::{Oracle, OracleRequest},
    Result,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct OpenAiOracle {
    api_key: String,
    base_url: String,
    request_timeout: Duration,
    http: reqwest::Client,
}

impl OpenAiOracle {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::External(format!("openai client build failed: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&self, req: OracleRequest) -> Result<String> {
        let body = request_body(&req);

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.request_timeout)
                } else if e.is_connect() {
                    Error::Unavailable(format!("openai connect error: {e}"))
                } else {
                    Error::External(format!("openai request error: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::Oracle(format!("openai json error: {e}")))?;

        let text = extract_content(&v)?;
        debug!(model = %req.model, chars = text.len(), "openai completion");
        Ok(text)
    }
}

fn request_body(req: &OracleRequest) -> Value {
    json!({
        "model": req.model,
        "messages": [{ "role": "user", "content": req.prompt }],
        "temperature": req.temperature,
        "max_tokens": req.max_tokens,
    })
}

fn classify_status(status: u16, body: &str) -> Error {
    let detail = format!(
        "{status} {}",
        body.chars().take(200).collect::<String>().trim()
    );
    match status {
        429 => Error::RateLimited(detail),
        500..=599 => Error::Unavailable(detail),
        _ => Error::Oracle(detail),
    }
}

/// `choices[0].message.content`, which must be a non-empty string.
fn extract_content(v: &Value) -> Result<String> {
    let text = v
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or("");

    if text.trim().is_empty() {
        return Err(Error::Oracle(
            "openai completion returned no content".to_string(),
        ));
    }
    Ok(text.to_string())
}
