//! Outbound seam between the controller and whatever carries messages to the
//! process host.

use trailhead_protocol::OutboundMessage;

/// Fire-and-forget sink for outbound messages.
///
/// Implementations own delivery; the controller never retries and never
/// learns whether a send succeeded.
pub trait Transport {
    fn send(&mut self, message: OutboundMessage);
}

/// Records messages in order. Handy for tests and replays.
impl Transport for Vec<OutboundMessage> {
    fn send(&mut self, message: OutboundMessage) {
        self.push(message);
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, message: OutboundMessage) {
        (**self).send(message);
    }
}
