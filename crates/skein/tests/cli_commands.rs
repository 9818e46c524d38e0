#![cfg(feature = "cli")]

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use skein::frame::Packet;
use skein::messages::{ChatMessage, CHAT_MESSAGE_ID};
use skein::peer::Client;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(10);

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("ephemeral port should be available")
        .port()
}

fn skein() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_skein"));
    cmd.env_remove("SKEIN_HOST")
        .env_remove("SKEIN_PORT")
        .args(["--log-level", "error"]);
    cmd
}

struct ServerProcess(Child);

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_server(port: u16) -> ServerProcess {
    let child = skein()
        .args(["serve", "--bind", "127.0.0.1", "--port", &port.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");
    ServerProcess(child)
}

async fn connect_listener(port: u16) -> (Client, mpsc::UnboundedReceiver<Packet<ChatMessage>>) {
    tokio::time::timeout(WAIT, async {
        loop {
            let (tx, rx) = mpsc::unbounded_channel();
            let started = Client::start("127.0.0.1", port, move |hooks| {
                hooks.on_packet_received(move |bridge| {
                    let tx = tx.clone();
                    async move {
                        let frame = bridge.read_frame().await?;
                        if frame.object_id == CHAT_MESSAGE_ID {
                            let _ = tx.send(frame.packet()?);
                        }
                        Ok(())
                    }
                });
            })
            .await;
            match started {
                Ok(client) => return (client, rx),
                Err(_) => tokio::time::sleep(Duration::from_millis(25)).await,
            }
        }
    })
    .await
    .expect("server should accept connections")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_is_rebroadcast_to_listeners() {
    let port = free_port();
    let _server = spawn_server(port);
    let (listener, mut inbox) = connect_listener(port).await;

    let output = skein()
        .args(["--format", "json", "send", "--port", &port.to_string()])
        .args(["--author", "ada", "--text", "hello", "--count", "2"])
        .output()
        .expect("send should run");
    assert!(output.status.success(), "send failed: {output:?}");

    let line = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    let report: serde_json::Value =
        serde_json::from_str(line.trim()).expect("stdout should be one json event");
    assert_eq!(report["event"], "sent");
    assert_eq!(report["count"], 2);
    assert_eq!(report["kind"], "chat");

    for _ in 0..2 {
        let packet = tokio::time::timeout(WAIT, inbox.recv())
            .await
            .expect("broadcast should arrive")
            .expect("listener still connected");
        assert_eq!(
            packet.payload,
            ChatMessage {
                author: "ada".into(),
                text: "hello".into(),
            }
        );
    }

    listener.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listen_prints_broadcast_chat() {
    let port = free_port();
    let _server = spawn_server(port);
    let (watcher, _inbox) = connect_listener(port).await;
    watcher.close().await;

    let listen = skein()
        .args(["--format", "pretty", "listen", "--port", &port.to_string(), "--count", "1"])
        .stdout(Stdio::piped())
        .spawn()
        .expect("listen should start");

    // Keep sending until the listener has had time to register.
    let stop = Arc::new(AtomicBool::new(false));
    let sender = {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let _ = skein()
                    .args(["send", "--port", &port.to_string(), "--author", "bo", "--text", "hey"])
                    .output();
                std::thread::sleep(Duration::from_millis(50));
            }
        })
    };

    let output = tokio::time::timeout(WAIT, tokio::task::spawn_blocking(move || listen.wait_with_output()))
        .await
        .expect("listen should print a message and exit")
        .expect("wait task should not panic")
        .expect("listen should exit");
    stop.store(true, Ordering::SeqCst);
    let _ = sender.join();

    assert!(output.status.success(), "listen failed: {output:?}");
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    assert!(stdout.contains("chat bo: hey"), "unexpected output: {stdout}");
}

#[test]
fn ping_without_server_fails_with_transport_code() {
    let output = skein()
        .args(["ping", "--port", &free_port().to_string(), "--number", "1"])
        .output()
        .expect("ping should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"), "unexpected stderr: {stderr}");
}

#[test]
fn version_reports_package_version() {
    let output = skein().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("skein {}", env!("CARGO_PKG_VERSION"))
    );

    let extended = skein()
        .args(["version", "--extended"])
        .output()
        .expect("version --extended should run");
    let stdout = String::from_utf8_lossy(&extended.stdout);
    assert!(stdout.contains("frame_header_bytes: 8"));
}
