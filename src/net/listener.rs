use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    os::fd::{AsRawFd, OwnedFd, RawFd},
    path::Path,
};

use log::{debug, error, warn};
use mio::net::{TcpListener, UnixListener};
use socket2::{Domain, SockAddr, Socket, Type};

use crate::{
    error::{Error, Result},
    handler::{Context, Handler, Interests, Status},
    net::{config::ListenerConfig, PeerAddr, PeerStream},
};

/// Size of `sun_path` in `sockaddr_un` on Linux; the path plus its
/// terminating NUL must fit.
pub const UNIX_PATH_MAX: usize = 108;

/// Builds the handle for an accepted peer, or rejects the peer with `None`.
/// A rejected peer's socket is closed straight away.
pub type Factory = Box<dyn FnMut(PeerStream, PeerAddr) -> Option<Box<dyn Handler>>>;

enum ListenSocket {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// A listening socket that hands every accepted peer to a factory.
///
/// Always read-interested, never write-interested.
pub struct Listener {
    socket: ListenSocket,
    config: ListenerConfig,
    factory: Factory,
}

impl Listener {
    pub fn bind<F>(addr: SocketAddr, config: ListenerConfig, factory: F) -> Result<Self>
    where
        F: FnMut(PeerStream, PeerAddr) -> Option<Box<dyn Handler>> + 'static,
    {
        let socket = listen_socket(Domain::for_address(addr), &addr.into(), &config)?;
        let listener = TcpListener::from_std(std::net::TcpListener::from(socket));
        debug!("listening on {addr}");
        Ok(Self {
            socket: ListenSocket::Tcp(listener),
            config,
            factory: Box::new(factory),
        })
    }

    pub fn ipv4<F>(port: u16, iface: Ipv4Addr, config: ListenerConfig, factory: F) -> Result<Self>
    where
        F: FnMut(PeerStream, PeerAddr) -> Option<Box<dyn Handler>> + 'static,
    {
        Self::bind(SocketAddr::from((iface, port)), config, factory)
    }

    pub fn ipv6<F>(port: u16, iface: Ipv6Addr, config: ListenerConfig, factory: F) -> Result<Self>
    where
        F: FnMut(PeerStream, PeerAddr) -> Option<Box<dyn Handler>> + 'static,
    {
        Self::bind(SocketAddr::from((iface, port)), config, factory)
    }

    pub fn unix<P, F>(path: P, config: ListenerConfig, factory: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: FnMut(PeerStream, PeerAddr) -> Option<Box<dyn Handler>> + 'static,
    {
        let path = path.as_ref();
        let len = path.as_os_str().len();
        if len >= UNIX_PATH_MAX {
            return Err(Error::UnixPathTooLong {
                len,
                limit: UNIX_PATH_MAX,
            });
        }

        let socket = listen_socket(Domain::UNIX, &SockAddr::unix(path)?, &config)?;
        let listener =
            UnixListener::from_std(std::os::unix::net::UnixListener::from(OwnedFd::from(socket)));
        debug!("listening on unix:{}", path.display());
        Ok(Self {
            socket: ListenSocket::Unix(listener),
            config,
            factory: Box::new(factory),
        })
    }

    /// The bound address of an inet listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            ListenSocket::Tcp(listener) => listener.local_addr().ok(),
            ListenSocket::Unix(_) => None,
        }
    }

    fn accept(&self) -> io::Result<(PeerStream, PeerAddr)> {
        match &self.socket {
            ListenSocket::Tcp(listener) => {
                let (stream, addr) = listener.accept()?;
                if let Err(e) = stream.set_nodelay(self.config.no_delay) {
                    warn!("failed to set TCP_NODELAY for {addr}: {e}");
                }
                Ok((PeerStream::Tcp(stream), PeerAddr::Inet(addr)))
            }
            ListenSocket::Unix(listener) => {
                let (stream, addr) = listener.accept()?;
                Ok((PeerStream::Unix(stream), PeerAddr::Unix(addr)))
            }
        }
    }
}

fn listen_socket(domain: Domain, addr: &SockAddr, config: &ListenerConfig) -> io::Result<Socket> {
    let socket = Socket::new(domain, Type::STREAM, None)?;
    if domain == Domain::IPV6 {
        socket.set_only_v6(config.only_v6)?;
    }
    if domain != Domain::UNIX {
        socket.set_reuse_address(true)?;
    }
    socket.bind(addr)?;
    socket.listen(config.backlog)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

impl Handler for Listener {
    fn descriptor(&self) -> RawFd {
        match &self.socket {
            ListenSocket::Tcp(listener) => listener.as_raw_fd(),
            ListenSocket::Unix(listener) => listener.as_raw_fd(),
        }
    }

    fn interests(&self) -> Interests {
        Interests::READ
    }

    /// Accepts until the queue is empty, so a burst costs one wakeup.
    fn on_readable(&mut self, ctx: &mut Context<'_>) -> Status {
        loop {
            match self.accept() {
                Ok((stream, peer)) => {
                    debug!("accepted {peer} as descriptor {}", stream.as_raw_fd());
                    let label = peer.to_string();
                    match (self.factory)(stream, peer) {
                        Some(handler) => ctx.register(handler),
                        None => debug!("rejected {label}"),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Status::Keep,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(
                        "accept on descriptor {} failed, closing listener: {e}",
                        self.descriptor()
                    );
                    return Status::Drop;
                }
            }
        }
    }

    fn on_writable(&mut self, _ctx: &mut Context<'_>) -> Status {
        Status::Drop
    }
}
