use std::{io, os::fd::RawFd};

use log::{debug, warn};
use mio::Interest;

use crate::poll::PollHandle;

/// Outcome of a readiness callback for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Stop notifying this direction. The handle is removed once both
    /// directions have been dropped.
    Drop,
    /// Keep this direction's interest registered.
    Keep,
}

/// The read/write interest pair of one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interests {
    pub read: bool,
    pub write: bool,
}

impl Interests {
    pub const NONE: Interests = Interests {
        read: false,
        write: false,
    };
    pub const READ: Interests = Interests {
        read: true,
        write: false,
    };
    pub const WRITE: Interests = Interests {
        read: false,
        write: true,
    };
    pub const BOTH: Interests = Interests {
        read: true,
        write: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.read && !self.write
    }

    /// `None` when neither direction is wanted; mio has no empty interest.
    pub fn to_mio(self) -> Option<Interest> {
        match (self.read, self.write) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

/// A connection handle: owns one descriptor and reacts to its readiness.
///
/// The descriptor must stay open for as long as the handle lives and be
/// closed when the handle is dropped. Owning a mio socket type gives that
/// for free.
///
/// ## Readiness contract
///
/// Notification is level-style. Returning [`Status::Keep`] keeps the
/// direction armed, and the callback runs again on a later poll for as long
/// as the descriptor stays ready in that direction. A handle may therefore
/// read or write only part of what is available per callback. Returning
/// [`Status::Drop`] stops notification for that direction.
pub trait Handler {
    /// The owned descriptor. A negative value marks the handle as invalid.
    fn descriptor(&self) -> RawFd;

    /// Interests requested when the handle is registered.
    fn interests(&self) -> Interests;

    fn on_readable(&mut self, ctx: &mut Context<'_>) -> Status;

    fn on_writable(&mut self, ctx: &mut Context<'_>) -> Status;
}

pub(crate) struct HandlerEntry {
    pub handler: Box<dyn Handler>,
    pub interests: Interests,
}

impl HandlerEntry {
    pub fn new(handler: Box<dyn Handler>, interests: Interests) -> Self {
        HandlerEntry {
            handler,
            interests,
        }
    }
}

/// What a handle may ask of its reactor while one of its callbacks runs.
pub struct Context<'a> {
    poll: &'a PollHandle,
    fd: RawFd,
    interests: &'a mut Interests,
    spawned: &'a mut Vec<Box<dyn Handler>>,
    closing: bool,
    fault: Option<(RawFd, io::Error)>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        poll: &'a PollHandle,
        fd: RawFd,
        interests: &'a mut Interests,
        spawned: &'a mut Vec<Box<dyn Handler>>,
    ) -> Self {
        Context {
            poll,
            fd,
            interests,
            spawned,
            closing: false,
            fault: None,
        }
    }

    /// Interests currently registered for the calling handle.
    pub fn interests(&self) -> Interests {
        *self.interests
    }

    /// Turn on write interest and update the OS registration right away.
    ///
    /// Only allowed while read interest is on. Returns whether write
    /// interest is enabled afterwards.
    pub fn enable_write(&mut self) -> bool {
        if self.interests.write {
            return true;
        }
        if !self.interests.read {
            warn!(
                "descriptor {}: write interest requested without read interest",
                self.fd
            );
            return false;
        }
        if self.fault.is_some() {
            return false;
        }

        match self.poll.reregister(self.fd, Interests::BOTH) {
            Ok(()) => {
                self.interests.write = true;
                true
            }
            Err(e) => {
                self.fault = Some((self.fd, e));
                false
            }
        }
    }

    /// Drop both directions once the callback returns, closing the handle.
    pub fn close(&mut self) {
        debug!("descriptor {}: closing", self.fd);
        self.closing = true;
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Hand a new handle to the reactor; it is registered as soon as the
    /// current callback has been applied.
    pub fn register(&mut self, handler: Box<dyn Handler>) {
        self.spawned.push(handler);
    }

    pub(crate) fn take_fault(&mut self) -> Option<(RawFd, io::Error)> {
        self.fault.take()
    }
}
