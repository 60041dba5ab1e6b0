//! Per-stream delivery task
//!
//! Each stream runs as its own local task fed by an unbounded line
//! queue, so a slow or broken consumer never holds up the others.

use super::address::StreamAddress;
use super::ReconnectPolicy;
use crate::error::StreamError;
use crate::event::{LoopEvent, LoopSender};
use crate::plugin::ActionParser;
use log::{debug, info, trace, warn};
use std::fmt;
use std::future;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;

/// Unique id of a stream within the delivery manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub(crate) u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Input and output halves of one consumer connection
pub struct StreamIo {
    pub reader: Box<dyn AsyncRead + Unpin>,
    pub writer: Box<dyn AsyncWrite + Unpin>,
}

impl StreamIo {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + 'static,
        W: AsyncWrite + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Split one duplex connection
    pub fn split<T>(io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::new(reader, writer)
    }
}

/// Open the connection behind a client address
pub(crate) async fn connect(address: &StreamAddress) -> io::Result<StreamIo> {
    match address {
        StreamAddress::Std => Ok(StreamIo::new(tokio::io::stdin(), tokio::io::stdout())),
        StreamAddress::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port)).await?;
            let (reader, writer) = stream.into_split();
            Ok(StreamIo::new(reader, writer))
        }
        StreamAddress::Unix(path) => {
            let stream = UnixStream::connect(path).await?;
            let (reader, writer) = stream.into_split();
            Ok(StreamIo::new(reader, writer))
        }
    }
}

/// Everything a stream task needs besides its transport
pub(crate) struct StreamContext {
    pub id: StreamId,
    pub name: String,
    pub header: Option<Arc<str>>,
    pub parser: Option<Rc<dyn ActionParser>>,
    pub events: LoopSender,
}

/// How one connected session ended
enum Outcome {
    /// The manager dropped our queue
    Shutdown,
    /// Peer hung up cleanly
    Eof,
    Failed(StreamError),
}

impl StreamContext {
    fn report_failure(&self, err: &StreamError) {
        if err.is_disconnect() {
            debug!("Stream {} disconnected: {}", self.name, err);
        } else {
            warn!("Stream {} failed: {}", self.name, err);
        }
    }

    fn closed(&self) {
        let _ = self.events.send(LoopEvent::StreamClosed(self.id));
    }

    async fn write_line(
        &self,
        writer: &mut (dyn AsyncWrite + Unpin),
        header_sent: &mut bool,
        line: &str,
    ) -> io::Result<()> {
        if !*header_sent {
            if let Some(header) = &self.header {
                writer.write_all(header.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }
            *header_sent = true;
        }
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Drive one connected session until it ends.
    ///
    /// `last` is the most recent line handed to this stream; it is sent
    /// right away so a fresh (or re-established) consumer is never left
    /// blank, and it is kept up to date for the next session.
    async fn serve(
        &self,
        io: StreamIo,
        lines: &mut mpsc::UnboundedReceiver<Arc<str>>,
        last: &mut Option<Arc<str>>,
    ) -> Outcome {
        let StreamIo { reader, mut writer } = io;
        let mut header_sent = false;

        // Anything still queued is newer than `last` and follows in order
        if let Some(line) = last.clone() {
            if let Err(e) = self.write_line(&mut *writer, &mut header_sent, &line).await {
                return Outcome::Failed(e.into());
            }
        }

        let mut inbound: Option<Lines<BufReader<Box<dyn AsyncRead + Unpin>>>> =
            self.parser.as_ref().map(|_| BufReader::new(reader).lines());

        loop {
            tokio::select! {
                line = lines.recv() => {
                    let Some(line) = line else {
                        let _ = writer.flush().await;
                        return Outcome::Shutdown;
                    };
                    *last = Some(Arc::clone(&line));
                    if let Err(e) = self.write_line(&mut *writer, &mut header_sent, &line).await {
                        return Outcome::Failed(e.into());
                    }
                }
                next = next_inbound(&mut inbound) => {
                    match next {
                        Ok(Some(text)) => {
                            if let Err(e) = self.dispatch(&text) {
                                return Outcome::Failed(e);
                            }
                        }
                        Ok(None) => return Outcome::Eof,
                        Err(e) => return Outcome::Failed(e.into()),
                    }
                }
            }
        }
    }

    fn dispatch(&self, text: &str) -> Result<(), StreamError> {
        let Some(parser) = &self.parser else {
            return Ok(());
        };
        match parser.parse(text)? {
            Some(action) => {
                trace!("Stream {} action {:?}", self.name, action);
                let _ = self.events.send(LoopEvent::Action(action));
            }
            None => trace!("Stream {} ignored framing {:?}", self.name, text),
        }
        Ok(())
    }
}

/// Next inbound line, or never when the stream does not read
async fn next_inbound(
    inbound: &mut Option<Lines<BufReader<Box<dyn AsyncRead + Unpin>>>>,
) -> io::Result<Option<String>> {
    match inbound {
        Some(lines) => lines.next_line().await,
        None => future::pending().await,
    }
}

/// Task body for a stream with no reconnection: accepted peers, stdio
pub(crate) async fn run_peer(
    ctx: StreamContext,
    io: StreamIo,
    mut lines: mpsc::UnboundedReceiver<Arc<str>>,
    mut last: Option<Arc<str>>,
) {
    match ctx.serve(io, &mut lines, &mut last).await {
        Outcome::Shutdown => {}
        Outcome::Eof => debug!("Stream {} closed by peer", ctx.name),
        Outcome::Failed(err) => ctx.report_failure(&err),
    }
    ctx.closed();
}

/// Task body for a client stream: connect, serve, and reconnect on
/// failure until the policy gives up
pub(crate) async fn run_client(
    ctx: StreamContext,
    address: StreamAddress,
    policy: ReconnectPolicy,
    mut lines: mpsc::UnboundedReceiver<Arc<str>>,
    mut last: Option<Arc<str>>,
) {
    loop {
        let Some(io) = connect_with_retry(&ctx, &address, &policy).await else {
            break;
        };
        match ctx.serve(io, &mut lines, &mut last).await {
            Outcome::Shutdown => return,
            Outcome::Eof => {
                debug!("Stream {} closed by peer", ctx.name);
                break;
            }
            Outcome::Failed(err) => {
                ctx.report_failure(&err);
                if !address.is_reconnectable() {
                    break;
                }
                info!("Reconnecting stream {}", ctx.name);
            }
        }
    }
    ctx.closed();
}

async fn connect_with_retry(
    ctx: &StreamContext,
    address: &StreamAddress,
    policy: &ReconnectPolicy,
) -> Option<StreamIo> {
    let mut attempt: u8 = 0;
    loop {
        match connect(address).await {
            Ok(io) => {
                debug!("Stream {} connected", ctx.name);
                return Some(io);
            }
            Err(e) => {
                attempt += 1;
                warn!(
                    "Stream {} connect attempt {}/{} failed: {}",
                    ctx.name, attempt, policy.max_attempts, e
                );
                if attempt >= policy.max_attempts || !address.is_reconnectable() {
                    warn!("Giving up on stream {}", ctx.name);
                    return None;
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }
}
