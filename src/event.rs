use mio::{event::Event, Token};
use std::{fmt, os::fd::RawFd};

/// Snapshot of one readiness event, detached from the `Events` buffer so the
/// reactor can mutate its handle map while walking a batch.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    token: Token,
    is_readable: bool,
    is_writable: bool,
    is_read_closed: bool,
    is_write_closed: bool,
    is_error: bool,
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Readiness")
            .field("descriptor", &self.descriptor())
            .field("is_readable", &self.is_readable)
            .field("is_writable", &self.is_writable)
            .field("is_read_closed", &self.is_read_closed)
            .field("is_write_closed", &self.is_write_closed)
            .field("is_error", &self.is_error)
            .finish()
    }
}

impl Readiness {
    /// Tokens are descriptor numbers, see [`crate::poll::PollHandle`].
    pub fn descriptor(&self) -> RawFd {
        self.token.0 as RawFd
    }

    pub fn is_readable(&self) -> bool {
        self.is_readable
    }

    pub fn is_writable(&self) -> bool {
        self.is_writable
    }

    pub fn is_read_closed(&self) -> bool {
        self.is_read_closed
    }

    pub fn is_write_closed(&self) -> bool {
        self.is_write_closed
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }
}

impl From<&Event> for Readiness {
    fn from(event: &Event) -> Self {
        Self {
            token: event.token(),
            is_readable: event.is_readable(),
            is_writable: event.is_writable(),
            is_read_closed: event.is_read_closed(),
            is_write_closed: event.is_write_closed(),
            is_error: event.is_error(),
        }
    }
}

#[cfg(test)]
impl Readiness {
    pub(crate) fn synthetic(fd: RawFd, readable: bool, writable: bool) -> Self {
        Self {
            token: Token(fd as usize),
            is_readable: readable,
            is_writable: writable,
            is_read_closed: false,
            is_write_closed: false,
            is_error: false,
        }
    }

    pub(crate) fn with_error(mut self) -> Self {
        self.is_error = true;
        self
    }

    pub(crate) fn with_read_closed(mut self) -> Self {
        self.is_read_closed = true;
        self
    }
}
