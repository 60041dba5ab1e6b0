//! Listening sockets that turn accepted connections into streams

use super::address::ListenAddress;
use super::stream::StreamIo;
use crate::event::{LoopEvent, LoopSender};
use log::{debug, error, info, warn};
use std::fmt;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use tokio::net::{TcpListener, UnixListener};

/// Unique id of a listening socket within the delivery manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerId(pub(crate) u64);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A bound listening socket
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixSocket),
}

/// Unix listener that unlinks its socket file when dropped
pub struct UnixSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl Drop for UnixSocket {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove socket {}: {}", self.path.display(), e);
        }
    }
}

/// Remove a leftover socket file nobody listens on
fn clear_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a socket", path.display()),
        ));
    }
    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("{} is in use by another process", path.display()),
        ));
    }
    debug!("Removing stale socket {}", path.display());
    std::fs::remove_file(path)
}

impl Listener {
    /// Bind the address. A stale unix socket file is replaced; anything
    /// else at the path, or a socket someone still listens on, is an error.
    pub async fn bind(address: &ListenAddress) -> io::Result<Self> {
        match address {
            ListenAddress::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port)).await?;
                Ok(Listener::Tcp(listener))
            }
            ListenAddress::Unix(path) => {
                clear_stale_socket(path)?;
                let listener = UnixListener::bind(path)?;
                Ok(Listener::Unix(UnixSocket {
                    listener,
                    path: path.clone(),
                }))
            }
        }
    }

    /// Human readable local address
    pub fn describe(&self) -> String {
        match self {
            Listener::Tcp(listener) => match listener.local_addr() {
                Ok(addr) => format!("tcp:{}", addr),
                Err(_) => "tcp:?".to_string(),
            },
            Listener::Unix(socket) => format!("unix:{}", socket.path.display()),
        }
    }

    async fn accept(&self) -> io::Result<(String, StreamIo)> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                let (reader, writer) = stream.into_split();
                Ok((format!("tcp:{}", peer), StreamIo::new(reader, writer)))
            }
            Listener::Unix(socket) => {
                let (stream, _) = socket.listener.accept().await?;
                let (reader, writer) = stream.into_split();
                Ok((
                    format!("unix:{}", socket.path.display()),
                    StreamIo::new(reader, writer),
                ))
            }
        }
    }
}

/// Errors that only concern the one connection being accepted
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Accept loop; every peer is handed to the event loop
pub(crate) async fn run_server(id: ServerId, listener: Listener, events: LoopSender) {
    let name = listener.describe();
    info!("Listening on {}", name);
    loop {
        match listener.accept().await {
            Ok((peer, io)) => {
                debug!("Accepted {} on {}", peer, name);
                if events
                    .send(LoopEvent::Accepted {
                        server: id,
                        peer,
                        io,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) if is_transient(&e) => warn!("Accept on {} failed: {}", name, e),
            Err(e) => {
                error!("Listener {} failed: {}", name, e);
                break;
            }
        }
    }
    let _ = events.send(LoopEvent::ServerClosed(id));
}
