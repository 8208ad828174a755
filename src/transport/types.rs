//! Wire types for the chat streaming endpoint

use serde::{Deserialize, Deserializer, Serialize};

/// Which chat surface issues the request.
///
/// The full chat page and the embeddable widget talk to different endpoints
/// and are told apart by the backend through `app_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    #[default]
    Full,
    Widget,
}

impl Surface {
    /// Numeric discriminator sent as `app_type`
    pub fn app_type(self) -> u8 {
        match self {
            Surface::Full => 1,
            Surface::Widget => 2,
        }
    }

    /// Endpoint path relative to the configured base URL
    pub fn path(self) -> &'static str {
        match self {
            Surface::Full => "/client/v1/chat/message",
            Surface::Widget => "/client/v1/chat/widget",
        }
    }

    /// Whether this surface shows retrieval results next to the transcript
    pub fn collects_retrieval_results(self) -> bool {
        matches!(self, Surface::Full)
    }

    /// Whether requests from this surface carry the access credential
    pub fn sends_credential(self) -> bool {
        matches!(self, Surface::Full)
    }
}

impl std::str::FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "web" | "1" => Ok(Surface::Full),
            "widget" | "2" => Ok(Surface::Widget),
            other => Err(format!("unknown surface '{other}' (expected 'full' or 'widget')")),
        }
    }
}

/// Request body for one exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Accumulated nonce from earlier exchanges, empty before the first one
    pub nonce: String,
    /// Accumulated conversation id, empty before the first exchange
    pub conversation_id: String,
    pub app_type: u8,
}

/// One retrieval hit reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkHit {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub node_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
}

/// All hits carried by a single `chunk_result` event
pub type ResultBatch = Vec<ChunkHit>;

/// A decoded application event.
///
/// `ConversationId`, `Nonce` and `Data` carry fragments that have to be
/// concatenated in arrival order. `ChunkResult` carries one whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ConversationId {
        #[serde(default, deserialize_with = "null_as_empty")]
        content: String,
    },
    Nonce {
        #[serde(default, deserialize_with = "null_as_empty")]
        content: String,
    },
    Data {
        #[serde(default, deserialize_with = "null_as_empty")]
        content: String,
    },
    ChunkResult {
        #[serde(default, deserialize_with = "one_or_many")]
        chunk_result: ResultBatch,
    },
    Error {
        #[serde(default, deserialize_with = "null_as_empty")]
        content: String,
    },
    Done,
    /// Any `type` this client does not know about
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::ConversationId { .. } => "conversation_id",
            StreamEvent::Nonce { .. } => "nonce",
            StreamEvent::Data { .. } => "data",
            StreamEvent::ChunkResult { .. } => "chunk_result",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Done => "done",
            StreamEvent::Unknown => "unknown",
        }
    }

    /// Whether this event ends the exchange from the server's side
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error { .. } | StreamEvent::Done)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `chunk_result` arrives either as a single hit object or as an array of hits
fn one_or_many<'de, D>(deserializer: D) -> Result<ResultBatch, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ChunkHit>),
        One(ChunkHit),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::Many(hits)) => hits,
        Some(OneOrMany::One(hit)) => vec![hit],
        None => Vec::new(),
    })
}
