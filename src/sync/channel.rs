use thiserror::Error;
use tokio::sync::broadcast;

use super::command::CommandEnvelope;
use super::event::EventEnvelope;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Channel closed")]
    Closed,

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What became of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Applied locally and handed to the transport; awaiting the echo.
    Sent { correlation_id: String },
    /// The command never left; the local change was rolled back.
    TransportFailed { reason: String },
    /// The server refused the command; the local change was rolled back.
    Rejected { reason: String },
}

impl CommandOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, CommandOutcome::Sent { .. })
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            CommandOutcome::Sent { correlation_id } => Some(correlation_id),
            _ => None,
        }
    }
}

/// Bidirectional link to the board's broadcast server.
///
/// `send` only reports whether the command could be handed over; the result
/// of the operation arrives later as an [`EventEnvelope`] on `subscribe`.
#[async_trait::async_trait]
pub trait SyncChannel: Send + Sync {
    async fn send(&self, envelope: CommandEnvelope) -> Result<(), SyncError>;

    fn subscribe(&self) -> broadcast::Receiver<EventEnvelope>;
}
