use skein::messages::{ChatMessage, CHAT_MESSAGE_ID};

use crate::cmd::SendArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let client = args.target.connect().await?;
    let message = ChatMessage {
        author: args.author,
        text: args.text,
    };

    for _ in 0..args.count {
        client
            .send(&message, CHAT_MESSAGE_ID)
            .await
            .map_err(|err| peer_error("send failed", err))?;
    }

    let peer = client.bridge().to_string();
    client.close().await;
    client.join().await;

    print_event(&Event::sent(peer, CHAT_MESSAGE_ID, args.count), format);
    Ok(SUCCESS)
}
