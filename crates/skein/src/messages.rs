use serde::{Deserialize, Serialize};

/// Object id of [`ChatMessage`].
pub const CHAT_MESSAGE_ID: u32 = 1;
/// Object id of [`Ping`].
pub const PING_ID: u32 = 2;

/// A line of chat. Servers rebroadcast these to every client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: String,
    pub text: String,
}

/// A bare number, logged by the server and not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub number: i32,
}

/// Human-readable name for a known object id.
pub fn object_name(object_id: u32) -> &'static str {
    match object_id {
        CHAT_MESSAGE_ID => "chat",
        PING_ID => "ping",
        _ => "unknown",
    }
}
