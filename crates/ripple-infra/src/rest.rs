//! REST client for the conversation directory and message log.
//!
//! A thin adapter over `reqwest`: one shared client, no internal retries.
//! Retry and recovery decisions belong to the session layer, which treats
//! every call here as a single attempt.

use reqwest::StatusCode;
use ripple_core::directory::ConversationDirectory;
use ripple_core::repository::MessageRepository;
use ripple_types::conversation::{ConversationHandle, ConversationSummary};
use ripple_types::error::{FetchError, SendError};
use ripple_types::message::Message;
use ripple_types::participant::{Participant, ParticipantId};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// HTTP adapter implementing the [`MessageRepository`] and
/// [`ConversationDirectory`] ports.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    /// Acting user, sent as `user_id` on directory calls.
    user: ParticipantId,
}

#[derive(Serialize)]
struct CreateMessageBody<'a> {
    sender_id: &'a ParticipantId,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<Uuid>,
}

#[derive(Serialize)]
struct GetOrCreateBody<'a> {
    user_id: &'a ParticipantId,
    peer_id: &'a ParticipantId,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, user: ParticipantId) -> Self {
        Self::with_token(base_url, user, None)
    }

    pub fn with_token(
        base_url: impl Into<String>,
        user: ParticipantId,
        bearer_token: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            bearer_token,
            user,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn fetch_error(err: reqwest::Error) -> FetchError {
    if let Some(status) = err.status() {
        FetchError::Status(status.as_u16())
    } else if err.is_decode() {
        FetchError::Decode(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status(status.as_u16()))
    }
}

impl MessageRepository for RestClient {
    async fn history(
        &self,
        conversation: &ConversationHandle,
    ) -> Result<Vec<Message>, FetchError> {
        let path = format!("/conversation/{conversation}/messages");
        debug!(conversation_id = %conversation, "fetching history");
        let response = self.get(&path).send().await.map_err(fetch_error)?;
        check_status(response.status())?;
        response.json().await.map_err(fetch_error)
    }

    async fn create(
        &self,
        conversation: &ConversationHandle,
        sender: &ParticipantId,
        content: &str,
        correlation_id: Option<Uuid>,
    ) -> Result<Message, SendError> {
        let path = format!("/conversation/{conversation}/messages");
        let body = CreateMessageBody {
            sender_id: sender,
            content,
            correlation_id,
        };
        let response = self
            .post(&path)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Durable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Durable(format!("status {}", status.as_u16())));
        }
        response
            .json()
            .await
            .map_err(|e| SendError::Durable(e.to_string()))
    }
}

impl ConversationDirectory for RestClient {
    async fn get_or_create(
        &self,
        peer: &ParticipantId,
    ) -> Result<ConversationHandle, FetchError> {
        let body = GetOrCreateBody {
            user_id: &self.user,
            peer_id: peer,
        };
        let response = self
            .post("/conversation/get-or-create")
            .json(&body)
            .send()
            .await
            .map_err(fetch_error)?;
        check_status(response.status())?;
        let summary: ConversationSummary = response.json().await.map_err(fetch_error)?;
        Ok(summary.handle)
    }

    async fn participant(&self, id: &ParticipantId) -> Result<Participant, FetchError> {
        let path = format!("/user/{id}");
        let response = self.get(&path).send().await.map_err(fetch_error)?;
        check_status(response.status())?;
        response.json().await.map_err(fetch_error)
    }

    async fn conversations(
        &self,
        user: &ParticipantId,
    ) -> Result<Vec<ConversationSummary>, FetchError> {
        let path = format!("/user/{user}/conversations");
        let response = self.get(&path).send().await.map_err(fetch_error)?;
        check_status(response.status())?;
        response.json().await.map_err(fetch_error)
    }
}
