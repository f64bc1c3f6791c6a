//! Buffered stream handle: inbound framing and outbound queueing over one
//! connected, non-blocking stream.

use std::{
    io::{self, Read, Write},
    os::fd::{AsRawFd, RawFd},
};

use bytes::{Buf, BytesMut};
use log::{debug, trace};

use crate::{
    framing::Parser,
    handler::{Context, Handler, Interests, Status},
    net::PeerStream,
};

/// Matches the stack buffer size of a typical single `read` per iteration.
pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Bytes waiting to be written to a peer, oldest first.
///
/// The queue notes when it goes from empty to non-empty; the owning stream
/// turns that into a write-interest request on its reactor.
#[derive(Debug, Default)]
pub struct Outbound {
    queue: BytesMut,
    write_requested: bool,
}

impl Outbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.queue.is_empty() {
            self.write_requested = true;
        }
        self.queue.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.queue
    }

    pub(crate) fn consume(&mut self, n: usize) {
        self.queue.advance(n);
    }

    pub(crate) fn take_write_request(&mut self) -> bool {
        std::mem::take(&mut self.write_requested)
    }
}

/// A connected stream driven by the reactor.
///
/// Every readable dispatch drains the socket until it would block, then runs
/// the parser once over everything buffered. Writable dispatches issue a
/// single write of the queued output; write interest is only held while
/// output is pending.
pub struct BufferedStream<P, S = PeerStream> {
    stream: S,
    parser: P,
    inbound: BytesMut,
    outbound: Outbound,
    scratch: Box<[u8]>,
}

impl<P, S> BufferedStream<P, S>
where
    P: Parser,
    S: Read + Write + AsRawFd,
{
    pub fn new(stream: S, parser: P) -> Self {
        Self::with_read_chunk(stream, parser, DEFAULT_READ_CHUNK)
    }

    pub fn with_read_chunk(stream: S, parser: P, read_chunk: usize) -> Self {
        BufferedStream {
            stream,
            parser,
            inbound: BytesMut::new(),
            outbound: Outbound::new(),
            scratch: vec![0; read_chunk.max(1)].into_boxed_slice(),
        }
    }

    /// Queue bytes for the peer, enabling write interest if the queue was idle.
    pub fn write(&mut self, ctx: &mut Context<'_>, bytes: &[u8]) {
        self.outbound.write(bytes);
        self.apply_write_request(ctx);
    }

    /// Direct access to the outbound queue, e.g. to queue a greeting before
    /// the handle is registered.
    pub fn outbound_mut(&mut self) -> &mut Outbound {
        &mut self.outbound
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    fn apply_write_request(&mut self, ctx: &mut Context<'_>) {
        if self.outbound.take_write_request() {
            ctx.enable_write();
        }
    }
}

impl<P, S> Handler for BufferedStream<P, S>
where
    P: Parser,
    S: Read + Write + AsRawFd,
{
    fn descriptor(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn interests(&self) -> Interests {
        Interests {
            read: true,
            write: !self.outbound.is_empty(),
        }
    }

    fn on_readable(&mut self, ctx: &mut Context<'_>) -> Status {
        let fd = self.descriptor();
        let status = loop {
            match self.stream.read(&mut self.scratch) {
                Ok(0) => {
                    debug!("descriptor {fd}: end of stream");
                    break Status::Drop;
                }
                Ok(n) => self.inbound.extend_from_slice(&self.scratch[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Status::Keep,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("descriptor {fd}: read failed: {e}");
                    ctx.close();
                    break Status::Drop;
                }
            }
        };

        // one parse per dispatch, over everything buffered so far
        let consumed = self.parser.parse(&self.inbound, &mut self.outbound);
        self.inbound.advance(consumed);
        trace!(
            "descriptor {fd}: parsed {consumed} bytes, {} buffered",
            self.inbound.len()
        );
        self.apply_write_request(ctx);

        if status == Status::Drop {
            // an unterminated tail is never delivered
            self.inbound.clear();
        }
        status
    }

    fn on_writable(&mut self, ctx: &mut Context<'_>) -> Status {
        if self.outbound.is_empty() {
            return Status::Drop;
        }

        let fd = self.descriptor();
        match self.stream.write(self.outbound.as_bytes()) {
            Ok(0) => {
                debug!("descriptor {fd}: peer accepted no bytes");
                ctx.close();
                Status::Drop
            }
            Ok(n) => {
                self.outbound.consume(n);
                trace!("descriptor {fd}: wrote {n} bytes, {} queued", self.outbound.len());
                if self.outbound.is_empty() {
                    Status::Drop
                } else {
                    Status::Keep
                }
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Status::Keep
            }
            Err(e) => {
                debug!("descriptor {fd}: write failed: {e}");
                ctx.close();
                Status::Drop
            }
        }
    }
}
