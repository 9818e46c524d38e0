use std::net::{IpAddr, Ipv4Addr};

use clap::{Args, Subcommand};
use skein::peer::Client;

use crate::exit::{io_error, peer_error, CliResult};
use crate::output::OutputFormat;

pub mod listen;
pub mod ping;
pub mod send;
pub mod serve;
pub mod version;

pub const DEFAULT_PORT: u16 = 9999;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a chat server that rebroadcasts chat messages to every client.
    Serve(ServeArgs),
    /// Connect, send chat messages, then disconnect.
    Send(SendArgs),
    /// Connect and send a single ping.
    Ping(PingArgs),
    /// Connect and print messages broadcast by the server.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format).await,
        Command::Send(args) => send::run(args, format).await,
        Command::Ping(args) => ping::run(args, format).await,
        Command::Listen(args) => listen::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on. 0 picks a free port.
    #[arg(long, short = 'p', env = "SKEIN_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Interface to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Server host name or address.
    #[arg(long, env = "SKEIN_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// Server port.
    #[arg(long, short = 'p', env = "SKEIN_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl TargetArgs {
    /// Connect without packet hooks.
    pub async fn connect(&self) -> CliResult<Client> {
        Client::start(&self.host, self.port, |_| {})
            .await
            .map_err(|err| peer_error("connect failed", err))
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Name shown next to the message.
    #[arg(long)]
    pub author: String,
    /// Message text.
    #[arg(long)]
    pub text: String,
    /// Number of copies to send.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Number to send.
    #[arg(long, allow_negative_numbers = true)]
    pub number: i32,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Resolve on Ctrl-C.
pub async fn interrupted() -> CliResult<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|err| io_error("signal handler setup failed", err))
}
