use anyhow::Result;
use clap::Parser;
use room_hub::HubHandle;
use tokio::net::TcpListener;
use tracing::{info, warn};

use room_chat::{
    cli::{Cli, Command, ServeArgs},
    client, http,
    server::ChatServer,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await?,
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}

/// Resolves on ctrl-c. Each caller gets its own listener.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let (hub, _sequencer) = HubHandle::spawn();

    let http_listener = TcpListener::bind(args.http).await?;
    info!("room listing on http://{}", http_listener.local_addr()?);
    let http_task = tokio::spawn(http::serve(http_listener, hub.clone(), ctrl_c()));

    let server = ChatServer::new(TcpListener::bind(args.listen).await?, hub);
    info!("chat server listening on {}", server.local_addr()?);
    if let Err(err) = server.run_until(ctrl_c()).await {
        warn!("chat server exited with error: {err:?}");
        return Err(err);
    }

    match http_task.await {
        Ok(result) => result,
        Err(err) => Err(err.into()),
    }
}
