use crate::{
    components::radio::link::PayloadSink,
    messages::radio::payload::{Payload, PositionFix},
};
use log::debug;

/// Forwards the ground station GPS fixes to the radio link so the aircraft
/// can follow the operator.
#[derive(Default)]
pub struct PositionSource {
    /// Most recent fix.
    last_fix: Option<PositionFix>,
    /// Where fixes go, `None` until the radio link is up.
    sink: Option<PayloadSink>,
}

impl PositionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or detach the radio link.
    ///
    /// * `sink`: payload sink of the link, `None` stops forwarding.
    pub fn set_sink(&mut self, sink: Option<PayloadSink>) {
        self.sink = sink;
    }

    /// Store a new fix and forward it.
    ///
    /// * `fix`: position reported by the GPS.
    pub fn on_fix(&mut self, fix: PositionFix) {
        self.last_fix = Some(fix);
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.submit(Payload::Position(fix)) {
                debug!("Dropped position fix {e}");
            }
        }
    }

    /// Most recent fix, even after the link was detached.
    pub fn last_fix(&self) -> Option<PositionFix> {
        self.last_fix
    }
}
