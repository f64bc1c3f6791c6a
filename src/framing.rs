//! Record framing over a byte stream.
//!
//! A [`Parser`] is handed the whole unconsumed inbound queue of a connection,
//! forwards every complete record it finds to its [`RecordSink`] and reports
//! how many leading bytes those records covered. Whatever follows stays
//! queued until more bytes arrive.

use crate::net::stream::Outbound;

/// Receives one complete record at a time.
///
/// `out` is the originating connection's outbound queue; anything written to
/// it is flushed back to the same peer.
pub trait RecordSink {
    fn on_record(&mut self, record: &[u8], out: &mut Outbound);
}

impl<F> RecordSink for F
where
    F: FnMut(&[u8], &mut Outbound),
{
    fn on_record(&mut self, record: &[u8], out: &mut Outbound) {
        self(record, out)
    }
}

/// A stateful stream framer.
pub trait Parser {
    /// Consume records from the front of `bytes`.
    ///
    /// Returns the number of bytes covered by the records that were emitted.
    /// The count never splits a record and never exceeds `bytes.len()`. The
    /// caller must drop exactly that many bytes from the front of its buffer
    /// before the next call.
    fn parse(&mut self, bytes: &[u8], out: &mut Outbound) -> usize;
}

pub const DEFAULT_SENTINEL: u8 = b'\n';

/// Splits the stream on a single delimiter byte, which is stripped.
///
/// Bytes already searched without finding the delimiter are remembered, so a
/// long unterminated line arriving in many small reads is scanned once in
/// total rather than once per read.
pub struct SentinelParser<K> {
    sentinel: u8,
    scanned: usize,
    sink: K,
}

impl<K: RecordSink> SentinelParser<K> {
    pub fn new(sink: K) -> Self {
        Self::with_sentinel(sink, DEFAULT_SENTINEL)
    }

    pub fn with_sentinel(sink: K, sentinel: u8) -> Self {
        SentinelParser {
            sentinel,
            scanned: 0,
            sink,
        }
    }

    pub fn sentinel(&self) -> u8 {
        self.sentinel
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }
}

impl<K: RecordSink> Parser for SentinelParser<K> {
    fn parse(&mut self, bytes: &[u8], out: &mut Outbound) -> usize {
        // a stale offset means the caller kept bytes it was told were consumed
        let mut search = if self.scanned <= bytes.len() {
            self.scanned
        } else {
            0
        };
        let mut start = 0;

        while let Some(pos) = bytes[search..].iter().position(|&b| b == self.sentinel) {
            let end = search + pos;
            self.sink.on_record(&bytes[start..end], out);
            start = end + 1;
            search = start;
        }

        self.scanned = bytes.len() - start;
        start
    }
}
