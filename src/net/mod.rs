//! Socket-level handles for the reactor.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Reactor                            │
//! │   descriptor ──▶ Box<dyn Handler>     (one thread, no locks) │
//! └───────┬───────────────────────────────┬──────────────────────┘
//!         │ on_readable                   │ on_readable / on_writable
//!         ▼                               ▼
//! ┌────────────────┐  factory   ┌──────────────────────────────┐
//! │    Listener    │───────────▶│ BufferedStream<Parser>       │
//! │ (TCP v4/v6,    │  Context:: │  inbound ──▶ Parser ──▶ Sink │
//! │  unix path)    │  register  │   outbound ◀── Sink writes   │
//! └────────────────┘            └──────────────────────────────┘
//! ```
//!
//! A [`Listener`] drains its accept queue on every readable event and hands
//! each peer to a factory closure. Whatever handle the factory returns is
//! registered with the same reactor. The usual choice is a
//! [`BufferedStream`] wrapping a [`SentinelParser`](crate::framing::SentinelParser),
//! which delivers newline-terminated records to a sink and queues whatever
//! the sink writes back.
//!
//! # Example
//!
//! ```rust,no_run
//! use linemill::framing::SentinelParser;
//! use linemill::net::{config::ListenerConfig, BufferedStream, Listener, Outbound};
//! use linemill::{Handler, Reactor};
//! use std::net::Ipv4Addr;
//!
//! # fn main() -> linemill::Result<()> {
//! let mut reactor = Reactor::with_defaults()?;
//! let listener = Listener::ipv4(
//!     7000,
//!     Ipv4Addr::UNSPECIFIED,
//!     ListenerConfig::default(),
//!     |stream, _peer| {
//!         let echo = SentinelParser::new(|line: &[u8], out: &mut Outbound| {
//!             out.write(line);
//!             out.write(b"\n");
//!         });
//!         Some(Box::new(BufferedStream::new(stream, echo)) as Box<dyn Handler>)
//!     },
//! )?;
//! reactor.add(listener)?;
//! reactor.run();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod listener;
pub mod stream;

pub use listener::Listener;
pub use stream::{BufferedStream, Outbound};

use std::{
    fmt, io,
    io::{Read, Write},
    net::SocketAddr,
    os::{
        fd::{AsRawFd, RawFd},
        unix::net::SocketAddr as UnixSocketAddr,
    },
};

use mio::net::{TcpStream, UnixStream};

/// An accepted peer connection.
#[derive(Debug)]
pub enum PeerStream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Read for PeerStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PeerStream::Tcp(s) => s.read(buf),
            PeerStream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for PeerStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PeerStream::Tcp(s) => s.write(buf),
            PeerStream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PeerStream::Tcp(s) => s.flush(),
            PeerStream::Unix(s) => s.flush(),
        }
    }
}

impl AsRawFd for PeerStream {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            PeerStream::Tcp(s) => s.as_raw_fd(),
            PeerStream::Unix(s) => s.as_raw_fd(),
        }
    }
}

/// Address of an accepted peer.
#[derive(Debug, Clone)]
pub enum PeerAddr {
    Inet(SocketAddr),
    Unix(UnixSocketAddr),
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddr::Inet(addr) => write!(f, "{addr}"),
            PeerAddr::Unix(addr) => match addr.as_pathname() {
                Some(path) => write!(f, "unix:{}", path.display()),
                None => write!(f, "unix:(unnamed)"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_addr_display() {
        let inet = PeerAddr::Inet("127.0.0.1:9000".parse().unwrap());
        assert_eq!(inet.to_string(), "127.0.0.1:9000");

        let (a, _b) = std::os::unix::net::UnixStream::pair().unwrap();
        let unnamed = PeerAddr::Unix(a.local_addr().unwrap());
        assert_eq!(unnamed.to_string(), "unix:(unnamed)");
    }

    #[test]
    fn test_peer_stream_round_trip() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut a = PeerStream::Unix(a);
        let mut b = PeerStream::Unix(b);
        assert!(a.as_raw_fd() >= 0);

        a.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }
}
