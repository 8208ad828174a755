//! Mock backend for testing
//!
//! Scripts the body of each exchange so transport and controller behaviour
//! can be exercised without a server.

use super::{ByteStream, ChatBackend, ChatRequest, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One step of a scripted response body
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver these bytes as one read
    Chunk(Bytes),
    /// Wait before the next step
    Delay(Duration),
    /// Fail the read
    Error(TransportError),
    /// Never produce anything again
    Hang,
}

/// How the mock answers one `open` call
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Headers arrive, then the body follows these steps and ends
    Steps(Vec<Step>),
    /// The request fails before any body is available
    Fail(TransportError),
}

impl ScriptedResponse {
    /// A body delivered as the given reads, then closed
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedResponse::Steps(
            chunks
                .into_iter()
                .map(|c| Step::Chunk(Bytes::from(c.into())))
                .collect(),
        )
    }
}

/// Backend that replays queued responses in order
#[derive(Clone, Default)]
pub struct MockBackend {
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    /// Record of all requests made
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next exchange
    pub fn queue(&self, response: ScriptedResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedResponse::Fail(TransportError::network("No mock response queued")));

        match response {
            ScriptedResponse::Fail(error) => Err(error),
            ScriptedResponse::Steps(steps) => Ok(script_body(steps)),
        }
    }
}

fn script_body(steps: Vec<Step>) -> ByteStream {
    stream::iter(steps)
        .then(|step| async move {
            match step {
                Step::Chunk(bytes) => Some(Ok(bytes)),
                Step::Error(error) => Some(Err(error)),
                Step::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    None
                }
                Step::Hang => {
                    futures::future::pending::<()>().await;
                    None
                }
            }
        })
        .filter_map(|item| async move { item })
        .boxed()
}
