use std::io;

use room_hub::{ClientId, Deliver, DeliveryError, Message, RoomId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines},
    sync::mpsc,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join { room: String, name: String },
    Chat { content: String },
    Typing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Joined { client_id: ClientId, room: RoomId },
    Message { message: Message },
    Error { message: String },
}

/// Per-connection outbox handed to the hub as the client's delivery handle.
///
/// Sending never waits; a dedicated writer task drains the receiving side onto
/// the socket and drops it when a write fails.
#[derive(Clone)]
pub struct Outbox(mpsc::UnboundedSender<ServerFrame>);

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub fn push(&self, frame: ServerFrame) -> Result<(), DeliveryError> {
        self.0.send(frame).map_err(|_| DeliveryError::Closed)
    }
}

impl Deliver for Outbox {
    fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        self.push(ServerFrame::Message {
            message: message.clone(),
        })
    }
}

/// Line-oriented frame decoder over the read half of a connection.
///
/// `next` is cancel-safe: a partly received line stays buffered inside
/// [`Lines`] until the rest arrives, so it can be raced in `select!`.
pub struct FrameReader<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Next frame, skipping blank lines. `Ok(None)` at end of stream.
    ///
    /// A line that is not a valid frame yields `InvalidData`; the line is
    /// consumed, so reading may continue afterwards.
    pub async fn next<T: DeserializeOwned>(&mut self) -> io::Result<Option<T>> {
        while let Some(line) = self.lines.next_line().await? {
            if let Some(frame) = decode_frame(&line)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

/// Decodes one line; blank lines carry no frame.
pub fn decode_frame<T: DeserializeOwned>(line: &str) -> io::Result<Option<T>> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Encodes a frame as one JSON line, newline included.
pub fn encode_frame<T: Serialize>(frame: &T) -> io::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    Ok(line)
}

pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    writer.write_all(&encode_frame(frame)?).await?;
    writer.flush().await
}
