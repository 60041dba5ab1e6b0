//! Delivery manager: fans rendered lines out to every live stream
//!
//! Streams are delivered to in registration order. Each one is an
//! independent failure domain: its task reports back with
//! `LoopEvent::StreamClosed` and nothing else is affected. When the last
//! stream and the last listener are gone the manager asks the event loop
//! to quit.

mod address;
mod server;
mod stream;

pub use address::{ListenAddress, StreamAddress};
pub use server::{Listener, ServerId};
pub use stream::{StreamId, StreamIo};

use crate::constants::{DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, MAX_BACKOFF_FACTOR};
use crate::constants::SHUTDOWN_FLUSH_TIMEOUT;
use crate::event::{LoopEvent, LoopSender};
use crate::plugin::ActionParser;
use log::{debug, info, trace, warn};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use stream::StreamContext;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bounded retry policy for client streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u8,
    pub delay: Duration,
}

impl ReconnectPolicy {
    /// Delay after the given number of consecutive failures
    pub fn delay_for(&self, failures: u8) -> Duration {
        let factor = 1u32
            .checked_shl(u32::from(failures.saturating_sub(1)))
            .unwrap_or(MAX_BACKOFF_FACTOR)
            .min(MAX_BACKOFF_FACTOR);
        self.delay * factor
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

struct StreamEntry {
    id: StreamId,
    name: String,
    lines: mpsc::UnboundedSender<Arc<str>>,
    task: JoinHandle<()>,
}

struct ServerEntry {
    id: ServerId,
    task: JoinHandle<()>,
}

/// Owns every output stream and listening socket
pub struct DeliveryManager {
    streams: Vec<StreamEntry>,
    servers: Vec<ServerEntry>,
    next_id: u64,
    latest: Option<Arc<str>>,
    header: Option<Arc<str>>,
    parser: Option<Rc<dyn ActionParser>>,
    policy: ReconnectPolicy,
    events: LoopSender,
}

impl DeliveryManager {
    pub fn new(
        header: Option<String>,
        parser: Option<Rc<dyn ActionParser>>,
        policy: ReconnectPolicy,
        events: LoopSender,
    ) -> Self {
        Self {
            streams: Vec::new(),
            servers: Vec::new(),
            next_id: 0,
            latest: None,
            header: header.map(Arc::from),
            parser,
            policy,
            events,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn context(&self, id: StreamId, name: String) -> StreamContext {
        StreamContext {
            id,
            name,
            header: self.header.clone(),
            parser: self.parser.clone(),
            events: self.events.clone(),
        }
    }

    /// Add a client stream. It connects (and reconnects) on its own.
    ///
    /// Must be called from within a `LocalSet`.
    pub fn add_client(&mut self, address: StreamAddress) -> StreamId {
        let id = StreamId(self.next_id());
        let name = address.to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = self.context(id, name.clone());
        let task = tokio::task::spawn_local(stream::run_client(
            ctx,
            address,
            self.policy,
            rx,
            self.latest.clone(),
        ));
        info!("Added stream {} ({})", name, id);
        self.streams.push(StreamEntry {
            id,
            name,
            lines: tx,
            task,
        });
        id
    }

    /// Add an already connected peer with no reconnection. It is sent the
    /// latest line straight away.
    ///
    /// Must be called from within a `LocalSet`.
    pub fn add_peer(&mut self, name: impl Into<String>, io: StreamIo) -> StreamId {
        let id = StreamId(self.next_id());
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = self.context(id, name.clone());
        let task = tokio::task::spawn_local(stream::run_peer(ctx, io, rx, self.latest.clone()));
        debug!("Added peer stream {} ({})", name, id);
        self.streams.push(StreamEntry {
            id,
            name,
            lines: tx,
            task,
        });
        id
    }

    /// Start accepting on a bound listener.
    ///
    /// Must be called from within a `LocalSet`.
    pub fn add_server(&mut self, listener: Listener) -> ServerId {
        let id = ServerId(self.next_id());
        let task = tokio::task::spawn_local(server::run_server(id, listener, self.events.clone()));
        self.servers.push(ServerEntry { id, task });
        id
    }

    /// Broadcast a freshly rendered line to every stream
    pub fn put_line(&mut self, line: String) {
        let line: Arc<str> = Arc::from(line);
        self.latest = Some(Arc::clone(&line));
        for stream in &self.streams {
            if stream.lines.send(Arc::clone(&line)).is_err() {
                // Its task already ended; StreamClosed is on its way
                trace!("Stream {} is gone, skipping", stream.name);
            }
        }
    }

    /// Most recent line, if any has been rendered
    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// Forget a stream. Returns whether it was known.
    pub fn remove_stream(&mut self, id: StreamId) -> bool {
        let Some(position) = self.streams.iter().position(|s| s.id == id) else {
            return false;
        };
        let entry = self.streams.remove(position);
        entry.task.abort();
        info!("Removed stream {} ({})", entry.name, id);
        self.quit_if_idle();
        true
    }

    /// Forget a listener. Returns whether it was known.
    pub fn remove_server(&mut self, id: ServerId) -> bool {
        let Some(position) = self.servers.iter().position(|s| s.id == id) else {
            return false;
        };
        let entry = self.servers.remove(position);
        entry.task.abort();
        info!("Removed listener {}", id);
        self.quit_if_idle();
        true
    }

    fn quit_if_idle(&self) {
        if self.is_idle() {
            info!("No streams or listeners left, quitting");
            let _ = self.events.send(LoopEvent::Quit);
        }
    }

    /// No stream and no listener left
    pub fn is_idle(&self) -> bool {
        self.streams.is_empty() && self.servers.is_empty()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.streams.iter().map(|s| s.id).collect()
    }

    /// Stop listening, let streams flush what is queued, then drop them
    pub async fn shutdown(&mut self) {
        for server in self.servers.drain(..) {
            server.task.abort();
        }
        let streams: Vec<StreamEntry> = self.streams.drain(..).collect();
        let mut tasks = Vec::with_capacity(streams.len());
        for entry in streams {
            // Closing the queue lets the task finish its pending writes
            drop(entry.lines);
            tasks.push((entry.name, entry.task));
        }
        let deadline = tokio::time::Instant::now() + SHUTDOWN_FLUSH_TIMEOUT;
        for (name, task) in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout_at(deadline, task).await.is_err() {
                warn!("Stream {} did not flush in time", name);
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionEvent;
    use crate::error::ActionParseError;
    use crate::event::LoopReceiver;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
    use tokio::task::LocalSet;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    struct Plain;

    impl ActionParser for Plain {
        fn parse(&self, line: &str) -> Result<Option<ActionEvent>, ActionParseError> {
            match line.split_once(' ') {
                Some((id, event)) => Ok(Some(ActionEvent::new(id, event))),
                None if line.is_empty() => Ok(None),
                None => Err(ActionParseError::MissingName),
            }
        }
    }

    fn manager(header: Option<&str>, parser: bool) -> (DeliveryManager, LoopReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let parser: Option<Rc<dyn ActionParser>> = if parser { Some(Rc::new(Plain)) } else { None };
        let policy = ReconnectPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(10),
        };
        (
            DeliveryManager::new(header.map(str::to_string), parser, policy, tx),
            rx,
        )
    }

    fn peer(manager: &mut DeliveryManager, name: &str) -> (StreamId, DuplexStream) {
        let (local, remote) = duplex(4096);
        (manager.add_peer(name, StreamIo::split(local)), remote)
    }

    async fn read_line(reader: &mut tokio::io::Lines<BufReader<DuplexStream>>) -> String {
        timeout(WAIT, reader.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .unwrap_or_default()
    }

    async fn closed_stream(rx: &mut LoopReceiver) -> StreamId {
        loop {
            match timeout(WAIT, rx.recv()).await.expect("no event") {
                Some(LoopEvent::StreamClosed(id)) => return id,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            max_attempts: 10,
            delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(9), Duration::from_millis(800));
        assert_eq!(policy.delay_for(200), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_header_sent_once_before_first_line() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, _rx) = manager(Some("HEADER"), false);
                let (_id, remote) = peer(&mut manager, "a");
                let mut lines = BufReader::new(remote).lines();
                manager.put_line("one".to_string());
                manager.put_line("two".to_string());
                assert_eq!(read_line(&mut lines).await, "HEADER");
                assert_eq!(read_line(&mut lines).await, "one");
                assert_eq!(read_line(&mut lines).await, "two");
            })
            .await;
    }

    #[tokio::test]
    async fn test_new_peer_gets_latest_line() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, _rx) = manager(None, false);
                manager.put_line("old".to_string());
                manager.put_line("current".to_string());
                let (_id, remote) = peer(&mut manager, "late");
                let mut lines = BufReader::new(remote).lines();
                assert_eq!(read_line(&mut lines).await, "current");
            })
            .await;
    }

    #[tokio::test]
    async fn test_broken_stream_does_not_affect_others() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, mut rx) = manager(None, false);
                let (a, a_remote) = peer(&mut manager, "a");
                let (_b, b_remote) = peer(&mut manager, "b");
                let mut b_lines = BufReader::new(b_remote).lines();
                drop(a_remote);

                manager.put_line("one".to_string());
                assert_eq!(read_line(&mut b_lines).await, "one");
                assert_eq!(closed_stream(&mut rx).await, a);
                assert!(manager.remove_stream(a));

                manager.put_line("two".to_string());
                manager.put_line("three".to_string());
                assert_eq!(read_line(&mut b_lines).await, "two");
                assert_eq!(read_line(&mut b_lines).await, "three");
                assert_eq!(manager.stream_count(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_client_gives_up_after_bounded_attempts() {
        LocalSet::new()
            .run_until(async {
                // Grab a free port and release it so nothing listens there
                let port = {
                    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
                    listener.local_addr().unwrap().port()
                };
                let (mut manager, mut rx) = manager(None, false);
                let (_b, b_remote) = peer(&mut manager, "b");
                let mut b_lines = BufReader::new(b_remote).lines();
                let tcp = manager.add_client(StreamAddress::Tcp {
                    host: "127.0.0.1".to_string(),
                    port,
                });

                manager.put_line("still here".to_string());
                assert_eq!(read_line(&mut b_lines).await, "still here");
                assert_eq!(closed_stream(&mut rx).await, tcp);
                assert!(manager.remove_stream(tcp));

                manager.put_line("after".to_string());
                assert_eq!(read_line(&mut b_lines).await, "after");
            })
            .await;
    }

    #[tokio::test]
    async fn test_client_connects_and_receives() {
        LocalSet::new()
            .run_until(async {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                let (mut manager, _rx) = manager(Some("H"), false);
                manager.put_line("first".to_string());
                manager.add_client(StreamAddress::Tcp {
                    host: "127.0.0.1".to_string(),
                    port,
                });
                let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
                let mut lines = BufReader::new(socket).lines();
                let header = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
                assert_eq!(header.as_deref(), Some("H"));
                let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
                assert_eq!(line.as_deref(), Some("first"));
            })
            .await;
    }

    fn no_stream_closed(rx: &mut LoopReceiver) -> bool {
        while let Ok(event) = rx.try_recv() {
            if matches!(event, LoopEvent::StreamClosed(_)) {
                return false;
            }
        }
        true
    }

    async fn accept_lines(
        listener: &tokio::net::UnixListener,
    ) -> tokio::io::Lines<BufReader<tokio::net::UnixStream>> {
        let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        BufReader::new(socket).lines()
    }

    #[tokio::test]
    async fn test_client_reconnects_after_consumer_drops() {
        LocalSet::new()
            .run_until(async {
                let dir = tempfile::tempdir().unwrap();
                let path = dir.path().join("bar.sock");
                let listener = tokio::net::UnixListener::bind(&path).unwrap();
                let (mut manager, mut rx) = manager(Some("H"), false);
                let id = manager.add_client(StreamAddress::Unix(path.clone()));

                let mut first = accept_lines(&listener).await;
                manager.put_line("l0".to_string());
                let header = timeout(WAIT, first.next_line()).await.unwrap().unwrap();
                assert_eq!(header.as_deref(), Some("H"));
                let line = timeout(WAIT, first.next_line()).await.unwrap().unwrap();
                assert_eq!(line.as_deref(), Some("l0"));
                drop(first);

                // The write after the hang-up fails and triggers a reconnect
                manager.put_line("l1".to_string());
                let mut second = accept_lines(&listener).await;
                let header = timeout(WAIT, second.next_line()).await.unwrap().unwrap();
                assert_eq!(header.as_deref(), Some("H"));
                let line = timeout(WAIT, second.next_line()).await.unwrap().unwrap();
                assert_eq!(line.as_deref(), Some("l1"));

                manager.put_line("l2".to_string());
                let line = timeout(WAIT, second.next_line()).await.unwrap().unwrap();
                assert_eq!(line.as_deref(), Some("l2"));
                assert!(no_stream_closed(&mut rx));
                assert_eq!(manager.stream_ids(), vec![id]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_successful_connect_resets_attempts() {
        LocalSet::new()
            .run_until(async {
                let dir = tempfile::tempdir().unwrap();
                let path = dir.path().join("bar.sock");
                let (tx, mut rx) = mpsc::unbounded_channel();
                // Attempts land at 0ms, 400ms and 1200ms after a failure
                let policy = ReconnectPolicy {
                    max_attempts: 3,
                    delay: Duration::from_millis(400),
                };
                let mut manager = DeliveryManager::new(None, None, policy, tx);
                let id = manager.add_client(StreamAddress::Unix(path.clone()));

                // Two failed attempts, then the consumer appears
                tokio::time::sleep(Duration::from_millis(600)).await;
                let listener = tokio::net::UnixListener::bind(&path).unwrap();
                let mut lines = accept_lines(&listener).await;
                manager.put_line("first".to_string());
                let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
                assert_eq!(line.as_deref(), Some("first"));

                // Consumer gone again; the stream gets a fresh budget
                drop(lines);
                drop(listener);
                std::fs::remove_file(&path).unwrap();
                manager.put_line("second".to_string());
                tokio::time::sleep(Duration::from_millis(600)).await;
                let listener = tokio::net::UnixListener::bind(&path).unwrap();
                let mut lines = accept_lines(&listener).await;
                let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
                assert_eq!(line.as_deref(), Some("second"));

                assert!(no_stream_closed(&mut rx));
                assert_eq!(manager.stream_ids(), vec![id]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_inbound_actions_reach_the_loop() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, mut rx) = manager(None, true);
                let (_id, mut remote) = peer(&mut manager, "bar");
                remote.write_all(b"\nbattery:BAT0 mouse:1\n").await.unwrap();
                match timeout(WAIT, rx.recv()).await.unwrap() {
                    Some(LoopEvent::Action(action)) => {
                        assert_eq!(action, ActionEvent::new("battery:BAT0", "mouse:1"));
                    }
                    other => panic!("unexpected event {:?}", other),
                }
            })
            .await;
    }

    #[tokio::test]
    async fn test_parse_error_tears_stream_down() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, mut rx) = manager(None, true);
                let (id, mut remote) = peer(&mut manager, "bar");
                remote.write_all(b"garbage\n").await.unwrap();
                assert_eq!(closed_stream(&mut rx).await, id);
            })
            .await;
    }

    #[tokio::test]
    async fn test_clean_eof_closes_stream() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, mut rx) = manager(None, true);
                let (id, remote) = peer(&mut manager, "bar");
                drop(remote);
                assert_eq!(closed_stream(&mut rx).await, id);
            })
            .await;
    }

    #[tokio::test]
    async fn test_last_stream_removed_requests_quit() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, mut rx) = manager(None, false);
                let (a, _a_remote) = peer(&mut manager, "a");
                let (b, _b_remote) = peer(&mut manager, "b");
                manager.remove_stream(a);
                assert!(rx.try_recv().is_err());
                manager.remove_stream(b);
                assert!(matches!(rx.try_recv(), Ok(LoopEvent::Quit)));
                assert!(!manager.remove_stream(b));
            })
            .await;
    }

    #[tokio::test]
    async fn test_listener_keeps_process_alive() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, mut rx) = manager(None, false);
                let address: ListenAddress = "tcp:127.0.0.1:0".parse().unwrap();
                let listener = Listener::bind(&address).await.unwrap();
                manager.add_server(listener);
                let (a, _a_remote) = peer(&mut manager, "a");
                manager.remove_stream(a);
                assert!(rx.try_recv().is_err());
                assert_eq!(manager.server_count(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_accepted_connection_becomes_event() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, mut rx) = manager(None, false);
                let address: ListenAddress = "tcp:127.0.0.1:0".parse().unwrap();
                let listener = Listener::bind(&address).await.unwrap();
                let local = match &listener {
                    Listener::Tcp(l) => l.local_addr().unwrap(),
                    Listener::Unix(_) => unreachable!(),
                };
                let server = manager.add_server(listener);
                let _client = tokio::net::TcpStream::connect(local).await.unwrap();
                match timeout(WAIT, rx.recv()).await.unwrap() {
                    Some(LoopEvent::Accepted { server: from, .. }) => assert_eq!(from, server),
                    other => panic!("unexpected event {:?}", other),
                }
            })
            .await;
    }

    #[tokio::test]
    async fn test_shutdown_flushes_queued_lines() {
        LocalSet::new()
            .run_until(async {
                let (mut manager, _rx) = manager(None, false);
                let (_id, remote) = peer(&mut manager, "a");
                manager.put_line("last words".to_string());
                manager.shutdown().await;
                let mut lines = BufReader::new(remote).lines();
                assert_eq!(read_line(&mut lines).await, "last words");
                assert!(manager.is_idle());
            })
            .await;
    }
}
