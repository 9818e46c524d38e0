use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use skein::frame::{Frame, FrameError, Packet};
use skein::messages::{object_name, ChatMessage, Ping, CHAT_MESSAGE_ID, PING_ID};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Something worth printing on stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Connected {
        peer: String,
        addr: String,
    },
    Disconnected {
        peer: String,
    },
    Chat {
        peer: String,
        timestamp: i64,
        author: String,
        text: String,
    },
    Ping {
        peer: String,
        timestamp: i64,
        number: i32,
    },
    Unknown {
        peer: String,
        object_id: u32,
        payload_size: usize,
    },
    Sent {
        peer: String,
        object_id: u32,
        kind: &'static str,
        count: u32,
    },
}

impl Event {
    /// Decode a received frame by its object id.
    pub fn from_frame(peer: &str, frame: &Frame) -> Result<Self, FrameError> {
        let peer = peer.to_string();
        Ok(match frame.object_id {
            CHAT_MESSAGE_ID => Self::chat(peer, frame.packet()?),
            PING_ID => {
                let packet: Packet<Ping> = frame.packet()?;
                Self::Ping {
                    peer,
                    timestamp: packet.timestamp,
                    number: packet.payload.number,
                }
            }
            object_id => Self::Unknown {
                peer,
                object_id,
                payload_size: frame.payload.len(),
            },
        })
    }

    pub fn chat(peer: String, packet: Packet<ChatMessage>) -> Self {
        Self::Chat {
            peer,
            timestamp: packet.timestamp,
            author: packet.payload.author,
            text: packet.payload.text,
        }
    }

    pub fn sent(peer: String, object_id: u32, count: u32) -> Self {
        Self::Sent {
            peer,
            object_id,
            kind: object_name(object_id),
            count,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Chat { .. } => "chat",
            Self::Ping { .. } => "ping",
            Self::Unknown { .. } => "unknown",
            Self::Sent { .. } => "sent",
        }
    }

    fn peer(&self) -> &str {
        match self {
            Self::Connected { peer, .. }
            | Self::Disconnected { peer }
            | Self::Chat { peer, .. }
            | Self::Ping { peer, .. }
            | Self::Unknown { peer, .. }
            | Self::Sent { peer, .. } => peer,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Connected { addr, .. } => addr.clone(),
            Self::Disconnected { .. } => String::new(),
            Self::Chat { author, text, .. } => format!("{author}: {text}"),
            Self::Ping { number, .. } => number.to_string(),
            Self::Unknown {
                object_id,
                payload_size,
                ..
            } => format!("object {object_id}, {payload_size} bytes"),
            Self::Sent {
                object_id,
                kind,
                count,
                ..
            } => format!("{count} x {kind} (object {object_id})"),
        }
    }
}

pub fn print_event(event: &Event, format: OutputFormat) {
    println!("{}", render(event, format));
}

fn render(event: &Event, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "PEER", "DETAIL"])
                .add_row(vec![
                    event.name().to_string(),
                    event.peer().to_string(),
                    event.detail(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => {
            let detail = event.detail();
            if detail.is_empty() {
                format!("[{}] {}", event.peer(), event.name())
            } else {
                format!("[{}] {} {}", event.peer(), event.name(), detail)
            }
        }
    }
}
