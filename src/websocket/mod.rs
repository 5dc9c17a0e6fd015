use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub mod gateway;
pub mod message_types;
pub mod presence;
pub mod session;

pub use gateway::ChatGateway;
pub use message_types::{ClientEvent, ServerEvent};
pub use presence::PresenceRegistry;
pub use session::{ClientSession, SessionState};

/// Unique identifier for one live connection
///
/// A user that reconnects gets a fresh channel id, which lets disconnect
/// handling tell its own presence entry apart from a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbound side of a live connection: serialized frames pushed here are
/// written to the socket in order
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ChannelId,
    sender: UnboundedSender<String>,
}

impl ChannelHandle {
    pub fn open() -> (Self, UnboundedReceiver<String>) {
        let (sender, rx) = unbounded_channel();
        (
            Self {
                id: ChannelId::new(),
                sender,
            },
            rx,
        )
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Queue a frame; false once the connection is gone
    pub fn send(&self, frame: String) -> bool {
        self.sender.send(frame).is_ok()
    }
}
