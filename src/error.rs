use std::{io, os::fd::RawFd, result::Result as StdResult};

use thiserror::Error;

use crate::reactor::RejectReason;

pub type Result<T> = StdResult<T, Error>;

/// Errors surfaced by socket setup and by the reactor's fault record.
///
/// Per-connection I/O failures never show up here: they are absorbed by the
/// handle that hit them and turned into a KEEP/DROP status.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unix socket path too long ({len} bytes, limit {limit})")]
    UnixPathTooLong { len: usize, limit: usize },

    /// The readiness wait itself failed.
    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),

    /// Adding, modifying or removing a descriptor's registration failed.
    #[error("registration of descriptor {fd} failed: {source}")]
    Registry {
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    /// A handle was refused by the reactor.
    #[error("registration rejected: {0}")]
    Rejected(RejectReason),

    /// The OS reported readiness for a descriptor the reactor does not own.
    #[error("readiness reported for unknown descriptor {0}")]
    UnknownDescriptor(RawFd),
}
