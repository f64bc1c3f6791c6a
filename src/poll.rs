use std::{io, os::fd::RawFd, time::Duration};

use mio::{unix::SourceFd, Events, Poll, Token};

use crate::handler::Interests;

/// Owns the OS readiness-notification context.
///
/// Descriptors are registered through [`SourceFd`] and the descriptor number
/// doubles as the event token, so a readiness event maps straight back to the
/// handle that owns the descriptor.
pub struct PollHandle {
    poller: Poll,
}

impl PollHandle {
    pub fn new() -> io::Result<Self> {
        Ok(PollHandle {
            poller: Poll::new()?,
        })
    }

    pub fn register(&self, fd: RawFd, interests: Interests) -> io::Result<()> {
        let interest = interests.to_mio().ok_or_else(no_interest)?;
        self.poller
            .registry()
            .register(&mut SourceFd(&fd), token(fd), interest)
    }

    pub fn reregister(&self, fd: RawFd, interests: Interests) -> io::Result<()> {
        let interest = interests.to_mio().ok_or_else(no_interest)?;
        self.poller
            .registry()
            .reregister(&mut SourceFd(&fd), token(fd), interest)
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        self.poller.registry().deregister(&mut SourceFd(&fd))
    }

    /// Waits for readiness and returns how many events were stored.
    pub fn poll(&mut self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        self.poller.poll(events, timeout)?;
        Ok(events.iter().count())
    }
}

fn token(fd: RawFd) -> Token {
    Token(fd as usize)
}

fn no_interest() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        "neither read nor write interest requested",
    )
}
