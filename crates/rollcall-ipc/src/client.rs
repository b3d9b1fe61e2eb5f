//! IPC client implementation

use rollcall_api::{Command, Event, Request, Response, ResponseResult};
use std::collections::VecDeque;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

use crate::{IpcError, IpcResult};

/// A line from the service is either a response or a pushed event
enum Incoming {
    Response(Response),
    Event(Event),
}

/// IPC client for rollcalld
pub struct IpcClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_request_id: u64,
    /// Events that arrived while waiting for a response
    pending: VecDeque<Event>,
}

impl IpcClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
            pending: VecDeque::new(),
        })
    }

    /// Send a command and wait for its response
    pub async fn send(&mut self, command: Command) -> IpcResult<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = Request::new(request_id, command);
        let mut json = serde_json::to_string(&request)?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;

        loop {
            match read_incoming(&mut self.reader).await? {
                Incoming::Response(response) if response.request_id == request_id => {
                    return Ok(response);
                }
                // Id 0 is a rejection of a line the server could not parse
                Incoming::Response(response) if response.request_id == 0 => {
                    return Ok(response);
                }
                Incoming::Response(response) => {
                    debug!(request_id = response.request_id, "Ignoring stale response");
                }
                Incoming::Event(event) => self.pending.push_back(event),
            }
        }
    }

    /// Subscribe to events and consume this client to return an event stream
    pub async fn subscribe(mut self) -> IpcResult<EventStream> {
        let response = self.send(Command::SubscribeEvents).await?;

        if let ResponseResult::Err(e) = response.result {
            return Err(IpcError::ServerError(e.message));
        }

        Ok(EventStream {
            reader: self.reader,
            pending: self.pending,
            _writer: self.writer,
        })
    }
}

/// Stream of events from rollcalld
pub struct EventStream {
    reader: BufReader<OwnedReadHalf>,
    pending: VecDeque<Event>,
    // Dropping the write half would half-close the socket
    _writer: OwnedWriteHalf,
}

impl EventStream {
    /// Wait for the next event
    pub async fn next(&mut self) -> IpcResult<Event> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }

        loop {
            match read_incoming(&mut self.reader).await? {
                Incoming::Event(event) => return Ok(event),
                Incoming::Response(response) => {
                    debug!(request_id = response.request_id, "Ignoring response on event stream");
                }
            }
        }
    }
}

async fn read_incoming(reader: &mut BufReader<OwnedReadHalf>) -> IpcResult<Incoming> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(IpcError::ConnectionClosed);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Responses carry a request id, events a timestamp and payload
        if let Ok(response) = serde_json::from_str::<Response>(trimmed) {
            return Ok(Incoming::Response(response));
        }
        return Ok(Incoming::Event(serde_json::from_str::<Event>(trimmed)?));
    }
}
