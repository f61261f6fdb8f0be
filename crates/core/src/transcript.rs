use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::selection_tree::ScopeEntry;
use crate::session::{unix_timestamp_millis, SessionContext, SessionError};
use crate::tabular::Record;

const GREETING: &str =
    "Hello! I'm ready to help you query your database. What would you like to know?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub series: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Table(Vec<Record>),
    Chart(Vec<ChartPoint>),
    Metrics(Vec<Metric>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub payload: Option<ResponsePayload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp_unix_ms: u128,
    pub payload: Option<ResponsePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AssistantBackendError {
    message: String,
}

impl AssistantBackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("assistant backend failed: {0}")]
    Backend(#[source] AssistantBackendError),
}

#[async_trait]
pub trait AssistantBackend {
    async fn respond(
        &self,
        prompt: &str,
        scope: &[ScopeEntry],
    ) -> Result<AssistantReply, AssistantBackendError>;
}

#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::with_greeting(GREETING)
    }
}

impl Transcript {
    #[must_use]
    pub fn with_greeting(greeting: &str) -> Self {
        let mut transcript = Self {
            messages: Vec::new(),
            next_id: 1,
        };
        transcript.push(Role::Assistant, greeting.to_string(), None);
        transcript
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Most recent assistant message carrying a table payload.
    #[must_use]
    pub fn latest_table(&self) -> Option<&[Record]> {
        self.messages
            .iter()
            .rev()
            .find_map(|message| match &message.payload {
                Some(ResponsePayload::Table(records)) => Some(records.as_slice()),
                _ => None,
            })
    }

    /// Appends the user turn and the assistant's reply. Blank prompts are
    /// ignored and return `Ok(None)`.
    pub async fn send<B>(
        &mut self,
        session: &SessionContext,
        prompt: &str,
        scope: &[ScopeEntry],
        backend: &B,
    ) -> Result<Option<&ChatMessage>, TranscriptError>
    where
        B: AssistantBackend + ?Sized + Sync,
    {
        session.require_active()?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Ok(None);
        }

        self.push(Role::User, prompt.to_string(), None);
        let reply = backend
            .respond(prompt, scope)
            .await
            .map_err(TranscriptError::Backend)?;
        debug!(
            scope = scope.len(),
            has_payload = reply.payload.is_some(),
            "assistant replied"
        );
        self.push(Role::Assistant, reply.content, reply.payload);
        Ok(self.messages.last())
    }

    fn push(&mut self, role: Role, content: String, payload: Option<ResponsePayload>) {
        self.messages.push(ChatMessage {
            id: self.next_id,
            role,
            content,
            timestamp_unix_ms: unix_timestamp_millis(),
            payload,
        });
        self.next_id += 1;
    }
}
