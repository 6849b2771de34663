use anyhow::{Context, Result};
use room_hub::{Message, MessageKind};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
};
use tracing::{debug, info, warn};

use crate::{
    cli::ClientArgs,
    protocol::{ClientFrame, FrameReader, ServerFrame, write_frame},
};

/// What a line typed at the terminal asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Quit,
    Send(ClientFrame),
}

/// Blank lines ask for nothing.
fn parse_input(line: &str) -> Option<Input> {
    let text = line.trim_end();
    match text.trim_start() {
        "" => None,
        command if command.eq_ignore_ascii_case("/quit") => Some(Input::Quit),
        command if command.eq_ignore_ascii_case("/typing") => {
            Some(Input::Send(ClientFrame::Typing))
        }
        _ => Some(Input::Send(ClientFrame::Chat {
            content: text.to_string(),
        })),
    }
}

/// Joins `args.room` and relays between the terminal and the server until
/// one side hangs up.
pub async fn run(args: ClientArgs) -> Result<()> {
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!(server = %args.server, room = %args.room, "connected");

    let (read_half, mut write_half) = stream.into_split();
    let join = ClientFrame::Join {
        room: args.room,
        name: args.name,
    };
    write_frame(&mut write_half, &join)
        .await
        .context("failed to send join")?;

    // Both readers are line based, so losing a race in `select!` keeps any
    // partly received line for the next iteration.
    let mut incoming = FrameReader::new(BufReader::new(read_half));
    let mut typed = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    loop {
        select! {
            frame = incoming.next::<ServerFrame>() => {
                let Some(frame) = frame.context("failed to read from server")? else {
                    show(&mut stdout, "*** server closed the connection").await?;
                    break;
                };
                let line = render_frame(&frame);
                match frame {
                    ServerFrame::Error { .. } => show(&mut stderr, &line).await?,
                    _ => show(&mut stdout, &line).await?,
                }
            }
            line = typed.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Some(Input::Quit) => {
                        show(&mut stdout, "*** leaving room").await?;
                        break;
                    }
                    Some(Input::Send(frame)) => write_frame(&mut write_half, &frame).await?,
                    None => {}
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(?error, "ctrl-c handler failed");
                }
                break;
            }
        }
    }

    if let Err(error) = write_half.shutdown().await {
        debug!(?error, "connection already closed");
    }
    Ok(())
}

pub fn render_frame(frame: &ServerFrame) -> String {
    match frame {
        ServerFrame::Joined { client_id, room } => {
            format!("*** joined {room} as client {client_id}")
        }
        ServerFrame::Message { message } => render_message(message),
        ServerFrame::Error { message } => format!("!!! {message}"),
    }
}

fn render_message(message: &Message) -> String {
    match message.kind() {
        MessageKind::Join | MessageKind::Leave => format!("*** {}", message.content()),
        MessageKind::Text => format!("<{}> {}", message.sender_name(), message.content()),
        MessageKind::Typing => format!("... {} is typing", message.sender_name()),
    }
}

async fn show<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}
