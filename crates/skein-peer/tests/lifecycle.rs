use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skein_codec::CodecError;
use skein_frame::Packet;
use skein_peer::{Client, PeerError, Server, ServerConfig, ServerHooks};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tagged {
    client: u32,
    seq: u32,
}

async fn server(setup: impl FnOnce(&mut ServerHooks)) -> Server {
    let config = ServerConfig {
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..ServerConfig::default()
    };
    Server::start_with_config(0, config, setup)
        .await
        .expect("server should bind")
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

fn counter(hits: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + 'static {
    let hits = Arc::clone(hits);
    move || {
        hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn frames_from_two_clients_arrive_in_send_order() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let server = server(|hooks| {
        hooks.on_packet_received(move |_server, bridge| {
            let tx = tx.clone();
            async move {
                let packet: Packet<Tagged> = bridge.read_packet().await?;
                let _ = tx.send(packet.payload);
                Ok(())
            }
        });
    })
    .await;
    let port = server.local_addr().port();

    let a = Client::start("127.0.0.1", port, |_| {}).await.expect("connect a");
    let b = Client::start("127.0.0.1", port, |_| {}).await.expect("connect b");

    // One sender pauses now and then while the other sends back to back.
    let send_all = |client: &'static str, id: u32, pause_every: Option<u32>, c: Client| async move {
        for seq in 0..50 {
            c.send(&Tagged { client: id, seq }, 1)
                .await
                .unwrap_or_else(|err| panic!("{client} send failed: {err}"));
            if pause_every.is_some_and(|every| seq % every == 0) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }
        c
    };
    let (a, b) = tokio::join!(send_all("a", 0, Some(3), a), send_all("b", 1, None, b));

    let mut next = [0u32; 2];
    for _ in 0..100 {
        let msg = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("frame should arrive")
            .expect("channel open");
        let slot = &mut next[msg.client as usize];
        assert_eq!(msg.seq, *slot, "client {} out of order", msg.client);
        *slot += 1;
    }
    assert_eq!(next, [50, 50]);

    a.close().await;
    b.close().await;
    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn broadcast_reaches_every_client_in_order() {
    let server = server(|_| {}).await;
    let port = server.local_addr().port();

    let mut clients = Vec::new();
    let mut inboxes = Vec::new();
    for _ in 0..3 {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client::start("127.0.0.1", port, move |hooks| {
            hooks.on_packet_received(move |bridge| {
                let tx = tx.clone();
                async move {
                    let frame = bridge.read_frame().await?;
                    let packet: Packet<u32> = frame.packet()?;
                    let _ = tx.send((frame.object_id, packet.payload));
                    Ok(())
                }
            });
        })
        .await
        .expect("client should connect");
        clients.push(client);
        inboxes.push(rx);
    }
    wait_until("three connections", || server.connection_count() == 3).await;

    for i in 0..100u32 {
        let report = server.broadcast(&i, 5).await.expect("encode should succeed");
        assert_eq!(report.delivered, 3);
        assert!(report.is_complete());
    }

    for inbox in &mut inboxes {
        for i in 0..100u32 {
            let received = tokio::time::timeout(WAIT, inbox.recv())
                .await
                .expect("broadcast should arrive")
                .expect("channel open");
            assert_eq!(received, (5, i));
        }
    }

    for client in &clients {
        client.close().await;
    }
    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn client_close_propagates_to_server() {
    let server_connected = Arc::new(AtomicUsize::new(0));
    let server_disconnected = Arc::new(AtomicUsize::new(0));
    let server = {
        let connected = Arc::clone(&server_connected);
        let disconnected = Arc::clone(&server_disconnected);
        server(move |hooks| {
            hooks
                .on_connected(move |_| {
                    connected.fetch_add(1, Ordering::SeqCst);
                })
                .on_disconnected(move |_| {
                    disconnected.fetch_add(1, Ordering::SeqCst);
                })
                .on_packet_received(|_server, bridge| async move {
                    bridge.read_frame().await?;
                    Ok(())
                });
        })
        .await
    };

    let client_connected = Arc::new(AtomicUsize::new(0));
    let client_disconnected = Arc::new(AtomicUsize::new(0));
    let client_closed = Arc::new(AtomicUsize::new(0));
    let client = Client::start("127.0.0.1", server.local_addr().port(), |hooks| {
        hooks
            .on_connected(counter(&client_connected))
            .on_disconnected(counter(&client_disconnected))
            .on_close(counter(&client_closed));
    })
    .await
    .expect("client should connect");

    wait_until("server registration", || server.connection_count() == 1).await;
    assert_eq!(server_connected.load(Ordering::SeqCst), 1);

    client.close().await;
    tokio::time::timeout(WAIT, client.join())
        .await
        .expect("client dispatch should stop");
    assert!(!client.is_connected());
    assert_eq!(client_connected.load(Ordering::SeqCst), 1);
    assert_eq!(client_disconnected.load(Ordering::SeqCst), 1);
    assert_eq!(client_closed.load(Ordering::SeqCst), 1);

    wait_until("server disconnect hook", || {
        server_disconnected.load(Ordering::SeqCst) == 1
    })
    .await;
    assert_eq!(server.connection_count(), 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server_disconnected.load(Ordering::SeqCst), 1);
    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hook_error_ends_the_connection() {
    let server = server(|_| {}).await;
    let client = Client::start("127.0.0.1", server.local_addr().port(), |hooks| {
        hooks.on_packet_received(|bridge| async move {
            let frame = bridge.read_frame().await?;
            if frame.object_id == 99 {
                return Err(CodecError::Message("unroutable object id".into()).into());
            }
            Ok(())
        });
    })
    .await
    .expect("client should connect");

    wait_until("server registration", || server.connection_count() == 1).await;
    server.broadcast("first", 1).await.expect("encode should succeed");
    server.broadcast("poison", 99).await.expect("encode should succeed");

    tokio::time::timeout(WAIT, client.join())
        .await
        .expect("dispatch should stop on hook error");
    assert!(!client.is_connected());
    assert!(client.all_frames_processed());

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_server_hook_still_tears_down_connection() {
    let disconnected = Arc::new(AtomicUsize::new(0));
    let server = {
        let disconnected = Arc::clone(&disconnected);
        server(move |hooks| {
            hooks
                .on_disconnected(move |_| {
                    disconnected.fetch_add(1, Ordering::SeqCst);
                })
                .on_packet_received(|_server, bridge| async move {
                    let frame = bridge.read_frame().await?;
                    if frame.object_id == 13 {
                        panic!("hook cannot handle object id 13");
                    }
                    Ok(())
                });
        })
        .await
    };

    let client_disconnected = Arc::new(AtomicUsize::new(0));
    let client = Client::start("127.0.0.1", server.local_addr().port(), |hooks| {
        hooks
            .on_disconnected(counter(&client_disconnected))
            .on_packet_received(|bridge| async move {
                bridge.read_frame().await?;
                Ok(())
            });
    })
    .await
    .expect("client should connect");
    wait_until("server registration", || server.connection_count() == 1).await;

    client.send("fine", 1).await.expect("send should succeed");
    client.send("boom", 13).await.expect("send should succeed");

    wait_until("server teardown", || {
        server.connection_count() == 0 && disconnected.load(Ordering::SeqCst) == 1
    })
    .await;

    tokio::time::timeout(WAIT, client.join())
        .await
        .expect("client should see the server hang up");
    assert_eq!(client_disconnected.load(Ordering::SeqCst), 1);
    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_client_hook_still_runs_disconnect_hooks() {
    let server = server(|hooks| {
        hooks.on_packet_received(|_server, bridge| async move {
            bridge.read_frame().await?;
            Ok(())
        });
    })
    .await;

    let disconnected = Arc::new(AtomicUsize::new(0));
    let client = Client::start("127.0.0.1", server.local_addr().port(), |hooks| {
        hooks
            .on_disconnected(counter(&disconnected))
            .on_packet_received(|bridge| async move {
                let frame = bridge.read_frame().await?;
                if frame.object_id == 2 {
                    panic!("client hook cannot handle object id 2");
                }
                Ok(())
            });
    })
    .await
    .expect("client should connect");
    wait_until("server registration", || server.connection_count() == 1).await;

    server.broadcast("trigger", 2).await.expect("encode should succeed");

    tokio::time::timeout(WAIT, client.join())
        .await
        .expect("dispatch should stop after a hook panic");
    assert!(!client.is_connected());
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);

    wait_until("server sees client leave", || server.connection_count() == 0).await;
    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_close_stops_accepting() {
    let closed = Arc::new(AtomicUsize::new(0));
    let server = server(|hooks| {
        hooks.on_close(counter(&closed));
    })
    .await;
    let port = server.local_addr().port();

    server.close().await;
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    tokio::time::timeout(WAIT, async {
        while Client::start("127.0.0.1", port, |_| {}).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("listener should stop accepting");
}

#[tokio::test]
async fn startup_after_start_is_rejected() {
    let server = server(|_| {}).await;
    let err = server.startup().await.expect_err("listener already taken");
    assert!(matches!(err, PeerError::AlreadyStarted));
    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn prepared_server_runs_accept_loop_until_closed() {
    let config = ServerConfig {
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..ServerConfig::default()
    };
    let server = Server::prepare_with_config(0, config, |_| {})
        .await
        .expect("server should bind");

    let accept = {
        let server = server.clone();
        tokio::spawn(async move { server.startup().await })
    };

    let client = Client::start("127.0.0.1", server.local_addr().port(), |_| {})
        .await
        .expect("client should connect");
    wait_until("server registration", || server.connection_count() == 1).await;
    assert!(server.all_frames_processed());

    server.close().await;
    tokio::time::timeout(WAIT, accept)
        .await
        .expect("accept loop should stop")
        .expect("task should not panic")
        .expect("accept loop should end cleanly");

    client.close().await;
}
