//! # Linemill
//! A single-threaded, non-blocking network reactor that multiplexes many stream connections
//! through one readiness-polling loop, delivers delimited records to callbacks and buffers
//! outbound data with write interest held only while output is pending.
//!
//! Linemill is built directly on [`mio`]: no async runtime, no worker threads, no locks.
//! Every callback runs on the thread that calls [`Reactor::poll`], so callbacks must never block.
//! ## Features
//! - **One loop, one thread**: all readiness dispatch and all handle callbacks run synchronously
//! - **Owned descriptors**: the reactor owns every handle; a handle's descriptor closes exactly
//!   once, when both its read and write interest have been dropped
//! - **Record framing**: a [`SentinelParser`](framing::SentinelParser) splits the byte stream on
//!   a delimiter byte and never rescans bytes it has already searched
//! - **Write backpressure**: write interest is only registered while output is queued
//! - **Fail fast**: a failure of the notification machinery itself wipes the reactor instead of
//!   limping on with inconsistent state
//! ## Architecture Overview
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌──────────────────┐
//! │  Your loop  │───▶│   Reactor    │───▶│    PollHandle    │
//! │ while active│    │ fd ─▶ handle │    │ (epoll / kqueue) │
//! └─────────────┘    └──────┬───────┘    └──────────────────┘
//!                           │ on_readable / on_writable
//!                           ▼
//!                ┌─────────────────────┐    ┌──────────────┐
//!                │ Listener            │───▶│ factory      │
//!                │ BufferedStream      │───▶│ Parser ▶ Sink│
//!                └─────────────────────┘    └──────────────┘
//! ```
//! ## Quick Start
//!
//! ```rust,no_run
//! use linemill::framing::SentinelParser;
//! use linemill::net::{config::ListenerConfig, BufferedStream, Listener, Outbound};
//! use linemill::{Handler, Reactor};
//! use std::net::Ipv4Addr;
//!
//! fn main() -> linemill::Result<()> {
//!     let mut reactor = Reactor::with_defaults()?;
//!
//!     let listener = Listener::ipv4(
//!         7000,
//!         Ipv4Addr::UNSPECIFIED,
//!         ListenerConfig::default(),
//!         |stream, peer| {
//!             println!("connection from {peer}");
//!             let shout = SentinelParser::new(|line: &[u8], out: &mut Outbound| {
//!                 out.write(&line.to_ascii_uppercase());
//!                 out.write(b"\n");
//!             });
//!             Some(Box::new(BufferedStream::new(stream, shout)) as Box<dyn Handler>)
//!         },
//!     )?;
//!     reactor.add(listener)?;
//!
//!     while reactor.is_active() {
//!         reactor.poll(None);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! - [`Reactor`]: owns the handles and drives the readiness loop
//! - [`Handler`]: the read/write capability every registered handle implements
//! - [`net`]: listening sockets and buffered streams
//! - [`framing`]: record parsers and sinks
//! - [`poll`]: the OS notification context
//! - [`error`]: error types and result handling

pub mod error;
pub mod event;
pub mod framing;
pub mod handler;
pub mod net;
pub mod poll;
pub mod reactor;

pub use error::{Error, Result};
pub use handler::{Context, Handler, Interests, Status};
pub use reactor::{Reactor, ReactorConfig, RegisterError, RejectReason};

/// A convenient prelude module that re-exports commonly used types and traits.
///
/// ```rust
/// use linemill::prelude::*;
/// ```
pub mod prelude {
    pub use crate::framing::{Parser, RecordSink, SentinelParser};
    pub use crate::handler::{Context, Handler, Interests, Status};
    pub use crate::net::{
        config::ListenerConfig, BufferedStream, Listener, Outbound, PeerAddr, PeerStream,
    };
    pub use crate::reactor::{Reactor, ReactorConfig};
}
