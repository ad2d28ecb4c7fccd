//! Tenant change notifications.
//!
//! Every committed mutation is described by a [`ChangeMessage`] and handed to
//! a [`ChangePublisher`]. Delivery guarantees belong to the publisher.

use std::fmt::{Display, Formatter, Result as FmtResult};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::info;

use crate::domain::tenants::records::TenantId;

/// Default prefix for change message subjects.
pub const DEFAULT_SUBJECT_PREFIX: &str = "com.infratographer.events";

/// Kind of mutation a message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Identity of whoever requested a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl Display for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A committed change to one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMessage {
    /// Tenant the change is about.
    pub subject_id: TenantId,

    pub event_type: EventType,

    /// Other tenants whose derived state depends on the change.
    #[serde(default)]
    pub additional_subject_ids: Vec<TenantId>,

    /// Requesting actor; absent for unauthenticated callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<ActorId>,

    pub timestamp: Timestamp,
}

impl ChangeMessage {
    pub fn new(
        event_type: EventType,
        subject_id: TenantId,
        additional_subject_ids: Vec<TenantId>,
        actor_id: Option<ActorId>,
    ) -> Self {
        Self {
            subject_id,
            event_type,
            additional_subject_ids,
            actor_id,
            timestamp: Timestamp::now(),
        }
    }

    /// Subject the message is published under, e.g.
    /// `com.infratographer.events.tenants.create.global`.
    #[must_use]
    pub fn subject(&self, prefix: &str) -> String {
        format!("{prefix}.tenants.{}.global", self.event_type)
    }
}

/// Change publisher errors.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The receiving side has gone away.
    #[error("change channel closed")]
    Closed,

    /// The message could not be encoded.
    #[error("failed to encode change message")]
    Encode(#[from] serde_json::Error),
}

#[automock]
#[async_trait]
/// Outbound change notifications.
pub trait ChangePublisher: Send + Sync {
    /// Hands one message to the transport.
    async fn publish(&self, message: ChangeMessage) -> Result<(), PublishError>;
}

/// Publishes change messages as structured log events.
#[derive(Debug, Clone)]
pub struct TracingPublisher {
    prefix: String,
}

impl TracingPublisher {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for TracingPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECT_PREFIX)
    }
}

#[async_trait]
impl ChangePublisher for TracingPublisher {
    async fn publish(&self, message: ChangeMessage) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&message)?;

        info!(
            subject = %message.subject(&self.prefix),
            subject_id = %message.subject_id,
            payload = %payload,
            "published tenant change"
        );

        Ok(())
    }
}

/// Forwards change messages into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: UnboundedSender<ChangeMessage>,
}

impl ChannelPublisher {
    /// Creates a publisher and the receiver its messages arrive on.
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<ChangeMessage>) {
        let (sender, receiver) = unbounded_channel();

        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ChangePublisher for ChannelPublisher {
    async fn publish(&self, message: ChangeMessage) -> Result<(), PublishError> {
        self.sender
            .send(message)
            .map_err(|_closed| PublishError::Closed)
    }
}
