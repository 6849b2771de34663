use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat server and its HTTP room listing.
    Serve(ServeArgs),
    /// Join a room on a running server.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address for chat connections. Use port 0 for an ephemeral port.
    #[arg(long, env = "ROOM_CHAT_LISTEN", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,

    /// Socket address for the HTTP room listing.
    #[arg(long, env = "ROOM_CHAT_HTTP", default_value = "127.0.0.1:8080")]
    pub http: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Room to join. Created on first join, removed when its last member leaves.
    #[arg(long)]
    pub room: String,

    /// Display name shown to other members.
    #[arg(long)]
    pub name: String,

    /// Address of the chat server.
    #[arg(long, env = "ROOM_CHAT_SERVER", default_value = "127.0.0.1:5000")]
    pub server: SocketAddr,
}
