use skein::messages::{Ping, PING_ID};

use crate::cmd::PingArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

pub async fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let client = args.target.connect().await?;
    let sent = client
        .send(&Ping {
            number: args.number,
        }, PING_ID)
        .await;

    let peer = client.bridge().to_string();
    client.close().await;
    client.join().await;
    sent.map_err(|err| peer_error("send failed", err))?;

    print_event(&Event::sent(peer, PING_ID, 1), format);
    Ok(SUCCESS)
}
