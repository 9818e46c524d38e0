use skein::frame::Frame;
use skein::peer::Client;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cmd::{interrupted, ListenArgs};
use crate::exit::{frame_error, peer_error, CliResult, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let target = &args.target;

    let client = Client::start(&target.host, target.port, move |hooks| {
        hooks.on_packet_received(move |bridge| {
            let tx = tx.clone();
            async move {
                let frame = bridge.read_frame().await?;
                let _ = tx.send(frame);
                Ok(())
            }
        });
    })
    .await
    .map_err(|err| peer_error("connect failed", err))?;

    let peer = client.bridge().to_string();
    let mut printed = 0usize;

    loop {
        tokio::select! {
            biased;
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                let event = Event::from_frame(&peer, &frame)
                    .map_err(|err| frame_error("decode failed", err))?;
                print_event(&event, format);
                printed = printed.saturating_add(1);

                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            _ = client.bridge().closed() => {
                debug!(bridge = %peer, "server closed the connection");
                break;
            }
            result = interrupted() => {
                result?;
                break;
            }
        }
    }

    client.close().await;
    client.join().await;
    Ok(SUCCESS)
}
