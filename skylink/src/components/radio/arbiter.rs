use crate::messages::radio::payload::{Payload, PayloadCategory};
use log::debug;
use priority_queue::PriorityQueue;
use std::collections::HashMap;

/// Callback fired when the arbiter goes from not ready to ready.
pub type ReadyCallback = Box<dyn FnMut() + Send>;

/// The payload arbiter decides what the radio link sends next. It holds at
/// most one pending payload per [`PayloadCategory`], newer submissions
/// overwrite older unsent ones (latest wins), and [`PayloadArbiter::take_next`]
/// hands them out in priority order, commands first.
///
/// Readiness is latched: the first submission after construction or after
/// [`PayloadArbiter::request_restart`] fires the ready callback once, every
/// further submission leaves it alone.
///
/// The arbiter has no locking of its own. It is owned by the radio link
/// worker and only ever touched from there.
#[derive(Default)]
pub struct PayloadArbiter {
    /// Categories with a pending payload, keyed by their send priority.
    pending: PriorityQueue<PayloadCategory, PayloadCategory>,
    /// The pending payload of each category.
    slots: HashMap<PayloadCategory, Payload>,
    /// Latched once anything has been submitted since the last restart.
    ready: bool,
    /// Notified on the not ready to ready edge.
    ready_callback: Option<ReadyCallback>,
}

impl PayloadArbiter {
    /// Create an empty arbiter with no ready callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload in the slot of its category, replacing whatever was
    /// waiting there. Returns true if this submission made the arbiter ready.
    ///
    /// * `payload`: payload to send later.
    pub fn submit(&mut self, payload: Payload) -> bool {
        let category = payload.category();
        self.slots.insert(category, payload);
        self.pending.push(category, category);

        if self.ready {
            return false;
        }

        debug!("Payload arbiter is ready");
        self.ready = true;
        if let Some(callback) = self.ready_callback.as_mut() {
            callback();
        }
        true
    }

    /// Return the highest priority pending payload. Commands and positions
    /// are removed once returned. The attitude sample is kept: samples arrive
    /// much faster than the link sends, so the same sample may go out on a
    /// few consecutive ticks until a fresher one replaces it.
    pub fn take_next(&mut self) -> Option<Payload> {
        let category = *self.pending.peek()?.0;

        if category == PayloadCategory::Attitude {
            return self.slots.get(&category).copied();
        }

        self.pending.remove(&category);
        self.slots.remove(&category)
    }

    /// Drop every pending payload and clear readiness. The ready callback is
    /// kept so the next submission fires it again.
    pub fn request_restart(&mut self) {
        debug!("Payload arbiter is restarting");
        self.ready = false;
        self.pending.clear();
        self.slots.clear();
    }

    /// Replace the ready callback, `None` removes it.
    ///
    /// * `callback`: called once on every not ready to ready edge.
    pub fn set_ready_callback(&mut self, callback: Option<ReadyCallback>) {
        self.ready_callback = callback;
    }

    /// True once anything has been submitted since the last restart.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of categories with a payload waiting.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
