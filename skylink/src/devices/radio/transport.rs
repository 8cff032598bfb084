use crate::components::radio::link::{InboundSink, SendCompletion};
use bytes::Bytes;

/// Outbound side of the radio, usually provided by the flight controller
/// vendor. Sending is fire and forget: the transport must not block the
/// caller and reports the outcome later through the [`SendCompletion`].
pub trait Transport: Send + 'static {
    /// Hand bytes to the aircraft.
    ///
    /// * `bytes`: encoded payload.
    /// * `completion`: must be completed exactly once with the result.
    fn send(&mut self, bytes: Bytes, completion: SendCompletion);

    /// Register where data received from the aircraft goes. The radio
    /// link calls this once before the first send. Any data coming back
    /// from the aircraft means it has landed and the mission is complete.
    ///
    /// * `inbound`: sink for received data.
    fn on_receive(&mut self, inbound: InboundSink) {
        let _ = inbound;
    }
}
