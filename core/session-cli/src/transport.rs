//! Outbound messages as JSON lines on a writer (stdout in practice).

use serde::Serialize;
use std::io::{self, Write};
use tracing::{debug, warn};
use trailhead_core::protocol::OutboundMessage;
use trailhead_core::Transport;

pub struct JsonLinesTransport<W: Write> {
    writer: W,
    sent: usize,
}

impl<W: Write> JsonLinesTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, sent: 0 }
    }

    /// Messages written successfully so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Writes an arbitrary JSON line, outside the protocol stream.
    pub fn write_value<S: Serialize>(&mut self, value: &S) -> io::Result<()> {
        write_line(&mut self.writer, value)
    }
}

impl<W: Write> Transport for JsonLinesTransport<W> {
    fn send(&mut self, message: OutboundMessage) {
        match write_line(&mut self.writer, &message) {
            Ok(()) => {
                self.sent += 1;
                debug!(kind = message.kind(), "Outbound message sent");
            }
            Err(err) => {
                warn!(error = %err, kind = message.kind(), "Failed to send outbound message");
            }
        }
    }
}

fn write_line<W: Write, S: Serialize>(writer: &mut W, value: &S) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
