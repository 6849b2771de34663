use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Result, bail};
use room_hub::{Client, HubHandle, Message, RoomId};
use tokio::{
    io::{AsyncWrite, BufReader},
    net::{TcpListener, TcpStream},
    select,
    sync::{mpsc, watch},
    task::JoinSet,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::protocol::{ClientFrame, FrameReader, Outbox, ServerFrame, write_frame};

pub const SHUTDOWN_NOTICE: &str = "server shutting down";

/// How long a closing session waits for its queued frames to reach the socket.
const FLUSH_GRACE: Duration = Duration::from_secs(2);

pub struct ChatServer {
    listener: TcpListener,
    hub: HubHandle,
}

impl ChatServer {
    pub fn new(listener: TcpListener, hub: HubHandle) -> Self {
        Self { listener, hub }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Live sessions are then sent [`SHUTDOWN_NOTICE`], unregistered from the
    /// hub and closed; this returns once all of them have finished.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (closing, closed) = watch::channel(());
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session = serve_connection(stream, self.hub.clone(), closed.clone());
                        sessions.spawn(async move {
                            if let Err(err) = session.await {
                                warn!(%peer, error = ?err, "connection ended with error");
                            }
                        });
                    }
                    Err(err) => warn!(error = ?err, "failed to accept connection"),
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        info!(sessions = sessions.len(), "chat server shutting down");
        drop(closing);
        while sessions.join_next().await.is_some() {}
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    hub: HubHandle,
    mut closed: watch::Receiver<()>,
) -> Result<()> {
    let peer = stream.peer_addr()?;
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FrameReader::new(BufReader::new(read_half));

    let hello = select! {
        hello = frames.next::<ClientFrame>() => hello?,
        _ = closed.changed() => return Ok(()),
    };
    let Some(hello) = hello else {
        debug!(%peer, "connection closed before joining");
        return Ok(());
    };
    let (room, name) = match admit(hello) {
        Ok(admitted) => admitted,
        Err(reason) => {
            let rejection = ServerFrame::Error {
                message: reason.to_string(),
            };
            write_frame(&mut write_half, &rejection).await?;
            bail!("handshake rejected: {reason}");
        }
    };

    let (outbox, queued) = Outbox::channel();
    let client = Client::new(hub.next_client_id(), name, room, Arc::new(outbox.clone()));
    // Queued before registering so the acknowledgement precedes the join notice.
    outbox.push(ServerFrame::Joined {
        client_id: client.id(),
        room: client.room().clone(),
    })?;
    let mut writer = tokio::spawn(drain_outbox(queued, write_half));

    hub.register(client.clone());
    info!(%peer, room = %client.room(), client = %client.id(), "client connected");

    let ended = loop {
        let frame = select! {
            frame = frames.next::<ClientFrame>() => frame,
            _ = closed.changed() => {
                let _ = outbox.push(ServerFrame::Error {
                    message: SHUTDOWN_NOTICE.to_string(),
                });
                break Ok(());
            }
        };
        match frame {
            Ok(Some(frame)) => {
                if !dispatch(&hub, &client, &outbox, frame) {
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                debug!(client = %client.id(), error = %err, "malformed frame");
                let _ = outbox.push(ServerFrame::Error {
                    message: "malformed frame".to_string(),
                });
            }
            Err(err) => break Err(err.into()),
        }
    };

    hub.unregister(client.clone());
    info!(%peer, room = %client.room(), client = %client.id(), "client disconnected");

    // The writer stops once the hub has dropped its copy of the handle.
    drop(client);
    drop(outbox);
    if timeout(FLUSH_GRACE, &mut writer).await.is_err() {
        debug!(%peer, "outbox not drained in time");
        writer.abort();
    }

    ended
}

/// Validates the opening frame of a connection.
fn admit(hello: ClientFrame) -> Result<(RoomId, String), &'static str> {
    let ClientFrame::Join { room, name } = hello else {
        return Err("expected join frame first");
    };
    let (room, name) = (room.trim(), name.trim());
    if room.is_empty() || name.is_empty() {
        return Err("room and name cannot be empty");
    }
    Ok((RoomId::from(room), name.to_string()))
}

/// Turns one session frame into a hub intent. Returns false once the
/// connection's outbox is gone.
fn dispatch(hub: &HubHandle, client: &Client, outbox: &Outbox, frame: ClientFrame) -> bool {
    match frame {
        ClientFrame::Chat { content } if content.trim().is_empty() => {}
        ClientFrame::Chat { content } => {
            hub.send(client.room().clone(), Message::text(client, content));
        }
        ClientFrame::Typing => hub.send(client.room().clone(), Message::typing(client)),
        ClientFrame::Join { .. } => {
            let already = ServerFrame::Error {
                message: format!("already joined {}", client.room()),
            };
            return outbox.push(already).is_ok();
        }
    }
    true
}

/// Writes queued frames until the socket fails or every sender is gone.
///
/// Returning drops the queue, so the hub's next delivery to this client fails
/// and it gets evicted.
async fn drain_outbox<W>(mut queued: mpsc::UnboundedReceiver<ServerFrame>, mut socket: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queued.recv().await {
        if let Err(err) = write_frame(&mut socket, &frame).await {
            debug!(error = ?err, "client write failed");
            return;
        }
    }
}
