use std::{collections::HashMap, fmt, io, os::fd::RawFd, result::Result as StdResult, time::Duration};

use log::{debug, error, trace, warn};
use mio::Events;
use thiserror::Error;

use crate::{
    error::{Error, Result},
    event::Readiness,
    handler::{Context, Handler, HandlerEntry, Status},
    poll::PollHandle,
};

pub const DEFAULT_EVENTS_CAPACITY: usize = 256;

/// Reactor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorConfig {
    /// Events collected per wait; a full buffer triggers an immediate re-poll
    pub events_capacity: usize,
    /// Wait bound used by [`Reactor::run`]; `None` blocks until readiness
    pub poll_timeout: Option<Duration>,
}

impl ReactorConfig {
    pub fn builder() -> ReactorConfigBuilder {
        ReactorConfigBuilder::default()
    }
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            poll_timeout: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReactorConfigBuilder {
    events_capacity: Option<usize>,
    poll_timeout: Option<Option<Duration>>,
}

impl ReactorConfigBuilder {
    pub fn events_capacity(mut self, capacity: usize) -> Self {
        self.events_capacity = Some(capacity);
        self
    }

    pub fn poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ReactorConfig {
        let default = ReactorConfig::default();
        ReactorConfig {
            events_capacity: self.events_capacity.unwrap_or(default.events_capacity),
            poll_timeout: self.poll_timeout.unwrap_or(default.poll_timeout),
        }
    }
}

/// Why a handle was refused by [`Reactor::register`].
#[derive(Debug, Error)]
pub enum RejectReason {
    #[error("no handle given")]
    Absent,
    #[error("invalid descriptor {0}")]
    InvalidDescriptor(RawFd),
    #[error("descriptor {0} requests neither read nor write interest")]
    NoInterest(RawFd),
    #[error("descriptor {0} is already registered")]
    DuplicateDescriptor(RawFd),
    #[error("reactor is inactive")]
    Inactive,
    /// The OS refused the registration; the reactor has been wiped.
    #[error("registration of descriptor {fd} failed: {source}")]
    Os {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
}

/// A refused registration. The reactor did not take the handle; it is
/// returned here untouched.
#[derive(Error)]
#[error("handle rejected: {reason}")]
pub struct RegisterError {
    reason: RejectReason,
    handler: Option<Box<dyn Handler>>,
}

impl RegisterError {
    fn new(reason: RejectReason, handler: Option<Box<dyn Handler>>) -> Self {
        Self { reason, handler }
    }

    pub fn reason(&self) -> &RejectReason {
        &self.reason
    }

    pub fn into_reason(self) -> RejectReason {
        self.reason
    }

    pub fn into_handler(self) -> Option<Box<dyn Handler>> {
        self.handler
    }
}

impl fmt::Debug for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterError")
            .field("reason", &self.reason)
            .field("descriptor", &self.handler.as_ref().map(|h| h.descriptor()))
            .finish()
    }
}

impl From<RegisterError> for Error {
    fn from(err: RegisterError) -> Self {
        Error::Rejected(err.reason)
    }
}

/// Single-threaded readiness loop owning every registered handle.
///
/// Handles are keyed by descriptor. A handle lives until both of its
/// directions are dropped, at which point it is deregistered and dropped,
/// closing its descriptor. Any failure of the notification machinery itself
/// wipes the reactor: all handles are dropped and it stays inactive.
pub struct Reactor {
    poll: Option<PollHandle>,
    events: Events,
    handles: HashMap<RawFd, HandlerEntry>,
    config: ReactorConfig,
    fault: Option<Error>,
}

impl Reactor {
    pub fn new(config: ReactorConfig) -> Result<Self> {
        Ok(Self {
            poll: Some(PollHandle::new()?),
            events: Events::with_capacity(config.events_capacity.max(1)),
            handles: HashMap::new(),
            config,
            fault: None,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(ReactorConfig::default())
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// True while at least one handle is registered.
    pub fn is_active(&self) -> bool {
        !self.handles.is_empty()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// The failure that wiped the reactor, if one did.
    pub fn fault(&self) -> Option<&Error> {
        self.fault.as_ref()
    }

    pub fn add<H: Handler + 'static>(&mut self, handler: H) -> StdResult<(), RegisterError> {
        self.register(Some(Box::new(handler)))
    }

    /// Take ownership of a handle and register its interests with the OS.
    ///
    /// ## Errors
    ///
    /// The handle is handed back if it is absent, its descriptor is negative
    /// or already registered, it wants neither direction, or the reactor has
    /// been wiped. If the OS call itself fails the reactor is wiped as well.
    pub fn register(&mut self, handler: Option<Box<dyn Handler>>) -> StdResult<(), RegisterError> {
        let result = self.insert(handler);
        if let Err(RegisterError {
            reason: RejectReason::Os { fd, source },
            ..
        }) = &result
        {
            self.wipe(Error::Registry {
                fd: *fd,
                source: io::Error::new(source.kind(), source.to_string()),
            });
        }
        result
    }

    fn insert(&mut self, handler: Option<Box<dyn Handler>>) -> StdResult<(), RegisterError> {
        let Some(handler) = handler else {
            return Err(RegisterError::new(RejectReason::Absent, None));
        };
        let Some(poll) = self.poll.as_ref() else {
            return Err(RegisterError::new(RejectReason::Inactive, Some(handler)));
        };

        let fd = handler.descriptor();
        if fd < 0 {
            return Err(RegisterError::new(
                RejectReason::InvalidDescriptor(fd),
                Some(handler),
            ));
        }
        let interests = handler.interests();
        if interests.is_empty() {
            return Err(RegisterError::new(RejectReason::NoInterest(fd), Some(handler)));
        }
        if self.handles.contains_key(&fd) {
            return Err(RegisterError::new(
                RejectReason::DuplicateDescriptor(fd),
                Some(handler),
            ));
        }
        if let Err(source) = poll.register(fd, interests) {
            return Err(RegisterError::new(
                RejectReason::Os { fd, source },
                Some(handler),
            ));
        }

        debug!("registered descriptor {fd} with {interests:?}");
        self.handles.insert(fd, HandlerEntry::new(handler, interests));
        Ok(())
    }

    /// Poll until no handle is left.
    pub fn run(&mut self) {
        let timeout = self.config.poll_timeout;
        while self.is_active() {
            self.poll(timeout);
        }
    }

    /// Wait at most `timeout` for readiness and dispatch everything ready.
    ///
    /// `None` waits indefinitely and a zero timeout only collects what is
    /// already pending. When the event buffer comes back full the reactor
    /// polls again without waiting until it no longer does, so a large
    /// backlog is worked off within one call.
    pub fn poll(&mut self, timeout: Option<Duration>) {
        if let Err(fault) = self.poll_once(timeout) {
            self.wipe(fault);
        }
    }

    fn poll_once(&mut self, mut timeout: Option<Duration>) -> Result<()> {
        loop {
            if !self.is_active() {
                return Ok(());
            }
            let Some(poll) = self.poll.as_mut() else {
                return Ok(());
            };

            match poll.poll(&mut self.events, timeout) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
                Err(e) => return Err(Error::Wait(e)),
            }

            let ready: Vec<Readiness> = self.events.iter().map(Readiness::from).collect();
            for readiness in &ready {
                self.dispatch(*readiness)?;
            }

            if ready.len() < self.events.capacity() {
                return Ok(());
            }
            trace!("event buffer full, polling again");
            timeout = Some(Duration::ZERO);
        }
    }

    fn dispatch(&mut self, readiness: Readiness) -> Result<()> {
        let Some(poll) = self.poll.as_ref() else {
            return Ok(());
        };
        let fd = readiness.descriptor();
        let HandlerEntry { handler, interests } = self
            .handles
            .get_mut(&fd)
            .ok_or(Error::UnknownDescriptor(fd))?;
        trace!("{readiness:?}");

        let mut spawned = Vec::new();
        let mut ctx = Context::new(poll, fd, interests, &mut spawned);
        let mut drop_read = false;
        let mut drop_write = false;
        let mut kept = false;

        if readiness.is_readable() && ctx.interests().read {
            drop_read = handler.on_readable(&mut ctx) == Status::Drop;
            kept |= !drop_read;
        }
        if readiness.is_writable() && ctx.interests().write {
            drop_write = handler.on_writable(&mut ctx) == Status::Drop;
            kept |= !drop_write;
        }

        let closing = ctx.is_closing();
        if let Some((fd, source)) = ctx.take_fault() {
            return Err(Error::Registry { fd, source });
        }
        drop(ctx);

        if readiness.is_error() {
            debug!("descriptor {fd}: error reported");
            drop_read = true;
            drop_write = true;
        }
        if readiness.is_read_closed() {
            drop_read = true;
        }
        if readiness.is_write_closed() {
            drop_write = true;
        }

        let mut next = *interests;
        if drop_read || closing {
            next.read = false;
        }
        if drop_write || closing {
            next.write = false;
        }

        if next.is_empty() {
            poll.deregister(fd)
                .map_err(|source| Error::Registry { fd, source })?;
            self.handles.remove(&fd);
            debug!("descriptor {fd} removed");
        } else if next != *interests || kept {
            // mio is edge-triggered; modifying the registration re-arms it so
            // readiness that outlived a KEEP is reported on the next wait
            poll.reregister(fd, next)
                .map_err(|source| Error::Registry { fd, source })?;
            *interests = next;
        }

        for handler in spawned {
            if let Err(err) = self.insert(Some(handler)) {
                match err.reason {
                    RejectReason::Os { fd, source } => return Err(Error::Registry { fd, source }),
                    reason => warn!("dropping new handle: {reason}"),
                }
            }
        }
        Ok(())
    }

    /// Drop every handle and the notification context. Used for failures
    /// that are not any single connection's fault.
    fn wipe(&mut self, fault: Error) {
        error!(
            "reactor failure, dropping {} handles: {fault}",
            self.handles.len()
        );
        self.handles.clear();
        self.poll = None;
        self.fault = Some(fault);
    }
}
