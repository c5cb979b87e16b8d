use anyhow::{bail, Context, Result};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::stream::{collect_story, AssemblyStats, StreamConfig};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";

/// Connection settings for the text-generation endpoint
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    /// Upper bound for the whole request, including streaming the body
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Single-turn request carrying one user prompt
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }
}

/// Raw response body, one transport chunk per item
pub type FragmentStream = BoxStream<'static, Result<Vec<u8>>>;

/// HTTP transport for story generation. One request per story, no retries.
#[derive(Debug, Clone)]
pub struct StoryClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl StoryClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST the prompt and hand back the response body as a byte stream.
    /// A send failure or a non-success status is terminal.
    pub async fn open_stream(&self, prompt: &str) -> Result<FragmentStream> {
        debug!("Sending story request to {} ({} chars)", self.config.endpoint, prompt.len());

        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&ChatRequest::from_prompt(prompt))
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.config.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Story request rejected by {}: {}", self.config.endpoint, status);
            bail!("HTTP error! status: {}", status.as_u16());
        }

        debug!("Story response accepted: {}", status);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(Vec::from).context("Failed to read response body"))
            .boxed();
        Ok(body)
    }

    /// Open the stream and assemble it to completion, handing segments to `sink`
    pub async fn generate<F>(&self, prompt: &str, config: &StreamConfig, sink: F) -> Result<AssemblyStats>
    where
        F: FnMut(&str),
    {
        let fragments = self.open_stream(prompt).await?;
        collect_story(fragments, config, sink).await
    }
}
