use std::sync::Arc;

use skein::frame::Packet;
use skein::messages::{ChatMessage, CHAT_MESSAGE_ID};
use skein::peer::{Bridge, Server, ServerConfig};
use tracing::{info, warn};

use crate::cmd::{interrupted, ServeArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

pub async fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ServerConfig {
        bind_addr: args.bind,
        ..ServerConfig::default()
    };

    let server = Server::start_with_config(args.port, config, |hooks| {
        hooks
            .on_connected(move |bridge| {
                print_event(
                    &Event::Connected {
                        peer: bridge.to_string(),
                        addr: bridge.peer_addr().to_string(),
                    },
                    format,
                );
            })
            .on_disconnected(move |bridge| {
                print_event(
                    &Event::Disconnected {
                        peer: bridge.to_string(),
                    },
                    format,
                );
            })
            .on_close(|| info!("server closing"))
            .on_packet_received(move |server, bridge| relay(server, bridge, format));
    })
    .await
    .map_err(|err| peer_error("bind failed", err))?;

    info!(addr = %server.local_addr(), "serving");
    interrupted().await?;
    server.close().await;

    Ok(SUCCESS)
}

/// Print one incoming message and rebroadcast it if it is chat.
async fn relay(server: Server, bridge: Arc<Bridge>, format: OutputFormat) -> skein::peer::Result<()> {
    let frame = bridge.read_frame().await?;
    let peer = bridge.to_string();

    if frame.object_id == CHAT_MESSAGE_ID {
        let packet: Packet<ChatMessage> = frame.packet()?;
        let message = packet.payload.clone();
        print_event(&Event::chat(peer, packet), format);
        server.broadcast(&message, CHAT_MESSAGE_ID).await?;
        return Ok(());
    }

    match Event::from_frame(&peer, &frame) {
        Ok(event) => print_event(&event, format),
        Err(err) => {
            warn!(bridge = %peer, object_id = frame.object_id, error = %err, "undecodable message");
            return Err(err.into());
        }
    }
    Ok(())
}
