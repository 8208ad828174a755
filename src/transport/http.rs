//! HTTP backend for the chat streaming endpoint

use super::{ByteStream, ChatBackend, ChatRequest, TransportError};
use crate::config::ClientConfig;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};

/// Header carrying the knowledge-base id
const KB_ID_HEADER: &str = "X-KB-ID";
/// Header carrying the shared access password of a protected knowledge base
const CREDENTIAL_HEADER: &str = "x-simple-auth-password";

/// Streams chat exchanges over HTTP
pub struct HttpBackend {
    client: Client,
    url: String,
    kb_id: String,
    credential: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        // No client-level timeout: the transport owns the exchange deadline
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        let credential = if config.surface.sends_credential() {
            Some(config.token.clone().unwrap_or_default())
        } else {
            None
        };

        Ok(Self {
            client,
            url: config.endpoint(),
            kb_id: config.kb_id.clone(),
            credential,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .header(KB_ID_HEADER, &self.kb_id)
            .json(request);
        if let Some(credential) = &self.credential {
            builder = builder.header(CREDENTIAL_HEADER, credential);
        }

        let response = builder.send().await?;

        let status = response.status();
        check_status(status)?;

        tracing::debug!(url = %self.url, status = %status, "Chat stream opened");

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|e| TransportError::network(format!("Stream read error: {e}")))
            })
            .boxed())
    }
}

/// A body-less response is an error; an empty body is just an exchange that
/// ends right away
fn check_status(status: StatusCode) -> Result<(), TransportError> {
    if !status.is_success() {
        return Err(TransportError::status(status.as_u16()));
    }
    if status == StatusCode::NO_CONTENT {
        return Err(TransportError::missing_body());
    }
    Ok(())
}
