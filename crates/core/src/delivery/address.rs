//! Stream and listener addresses: `std`, `tcp:host:port`, `unix:path`

use crate::error::AddressError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where a client stream delivers lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAddress {
    /// Standard output, with standard input for inbound actions
    Std,
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

/// Where a server listens for consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl StreamAddress {
    /// Whether a broken connection is worth re-establishing
    pub fn is_reconnectable(&self) -> bool {
        !matches!(self, StreamAddress::Std)
    }
}

fn parse_tcp(input: &str, rest: &str) -> Result<(String, u16), AddressError> {
    let invalid = || AddressError::InvalidTcp(input.to_string());
    let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

impl FromStr for StreamAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        if s == "std" {
            return Ok(StreamAddress::Std);
        }
        match s.split_once(':') {
            Some(("tcp", rest)) => {
                let (host, port) = parse_tcp(s, rest)?;
                Ok(StreamAddress::Tcp { host, port })
            }
            Some(("unix", "")) => Err(AddressError::MissingPath(s.to_string())),
            Some(("unix", path)) => Ok(StreamAddress::Unix(PathBuf::from(path))),
            _ => Err(AddressError::UnknownKind(s.to_string())),
        }
    }
}

impl FromStr for ListenAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<StreamAddress>()? {
            StreamAddress::Std => Err(AddressError::NotListenable(s.to_string())),
            StreamAddress::Tcp { host, port } => Ok(ListenAddress::Tcp { host, port }),
            StreamAddress::Unix(path) => Ok(ListenAddress::Unix(path)),
        }
    }
}

fn fmt_tcp(f: &mut fmt::Formatter<'_>, host: &str, port: u16) -> fmt::Result {
    if host.contains(':') {
        write!(f, "tcp:[{}]:{}", host, port)
    } else {
        write!(f, "tcp:{}:{}", host, port)
    }
}

impl fmt::Display for StreamAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamAddress::Std => f.write_str("std"),
            StreamAddress::Tcp { host, port } => fmt_tcp(f, host, *port),
            StreamAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Tcp { host, port } => fmt_tcp(f, host, *port),
            ListenAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
