//! A server, a one-shot sender and a listener in one process.
//!
//! The server prints every message, rebroadcasts chat to all clients and
//! ignores anything it does not recognise. Run with:
//!
//! ```text
//! cargo run -p skein --example chat
//! ```

use std::time::Duration;

use skein::frame::Packet;
use skein::messages::{ChatMessage, Ping, CHAT_MESSAGE_ID, PING_ID};
use skein::peer::{Client, Result, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let server = Server::start(0, |hooks| {
        hooks
            .on_connected(|bridge| println!("[server] {bridge} connected from {}", bridge.peer_addr()))
            .on_disconnected(|bridge| println!("[server] {bridge} disconnected"))
            .on_close(|| println!("[server] closing"))
            .on_packet_received(|server, bridge| async move {
                let frame = bridge.read_frame().await?;
                match frame.object_id {
                    CHAT_MESSAGE_ID => {
                        let packet: Packet<ChatMessage> = frame.packet()?;
                        println!(
                            "[server] {}: {} (sent at {})",
                            packet.payload.author, packet.payload.text, packet.timestamp
                        );
                        server.broadcast(&packet.payload, CHAT_MESSAGE_ID).await?;
                    }
                    PING_ID => {
                        let packet: Packet<Ping> = frame.packet()?;
                        println!("[server] ping {}", packet.payload.number);
                    }
                    other => println!("[server] unknown object id {other}"),
                }
                Ok(())
            });
    })
    .await?;
    let port = server.local_addr().port();

    let listener = Client::start("127.0.0.1", port, |hooks| {
        hooks
            .on_close(|| println!("[listener] closing"))
            .on_packet_received(|bridge| async move {
                let packet: Packet<ChatMessage> = bridge.read_packet().await?;
                println!("[listener] {} says {}", packet.payload.author, packet.payload.text);
                Ok(())
            });
    })
    .await?;

    while server.connection_count() < 1 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let sender = Client::start("127.0.0.1", port, |hooks| {
        hooks.on_close(|| println!("[sender] closing"));
    })
    .await?;
    sender
        .send(
            &ChatMessage {
                author: "sender".into(),
                text: "Hello, skein!".into(),
            },
            CHAT_MESSAGE_ID,
        )
        .await?;
    sender.send(&Ping { number: 42 }, PING_ID).await?;
    sender.close().await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    listener.close().await;
    listener.join().await;
    server.close().await;
    Ok(())
}
