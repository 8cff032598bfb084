use crate::{
    components::{mission::state_machine::SharedMission, radio::arbiter::PayloadArbiter},
    devices::radio::transport::Transport,
    error::{LinkError, TransportError},
    messages::radio::{codec::PayloadCodec, payload::Payload},
};
use bytes::Bytes;
use futures::StreamExt;
use log::{debug, error, info};
use std::time::Duration;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::time::DelayQueue;

/// Cool-down between a transport failure and the arbiter restart.
pub const RESTART_DELAY: Duration = Duration::from_millis(2000);
/// Telemetry frequency used when nothing else is configured.
pub const DEFAULT_FREQUENCY_HZ: u32 = 20;

/// Delay between two transmit ticks for a telemetry frequency.
///
/// * `frequency_hz`: ticks per second, zero is treated as one.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn send_interval(frequency_hz: u32) -> Duration {
    let frequency_hz = f64::from(frequency_hz.max(1));
    Duration::from_millis((1000.0 / frequency_hz).round() as u64)
}

/// Observable state of the transmit loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// No loop is running. The link waits for the arbiter to become ready.
    Idle,
    /// A loop is sending. `cycle` counts the loops armed since the link
    /// was started.
    Running { cycle: u64 },
}

/// Everything the worker reacts to. All of it goes through one channel so
/// arbiter access, ticks and completions are serialised in program order.
#[derive(Debug)]
enum LinkEvent {
    /// A producer or the mission has a new payload.
    Submit(Payload),
    /// The arbiter became ready.
    Ready,
    /// The transport finished a send issued by the given loop.
    SendCompleted(LoopToken, Result<(), TransportError>),
    /// The aircraft sent data back.
    ExternalData(Bytes),
    /// Stop the worker.
    Shutdown,
}

/// Identifies one armed transmit loop. A tick carrying a token that is
/// no longer the active one belongs to a superseded loop and does nothing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct LoopToken(u64);

/// Work registered on the worker's timer queue.
#[derive(Debug)]
enum Scheduled {
    Tick(LoopToken),
    Restart,
}

/// Cloneable handle used by the mission and the telemetry producers to push
/// payloads into the arbiter. Submissions are forwarded to the link worker,
/// the arbiter itself is never shared.
#[derive(Clone, Debug)]
pub struct PayloadSink {
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl PayloadSink {
    /// Queue a payload for the arbiter.
    ///
    /// * `payload`: payload to submit.
    pub fn submit(&self, payload: Payload) -> Result<(), LinkError> {
        self.events
            .send(LinkEvent::Submit(payload))
            .map_err(|_| LinkError::WorkerStopped)
    }

    /// True while the link worker is running.
    pub fn is_connected(&self) -> bool {
        !self.events.is_closed()
    }
}

#[cfg(test)]
impl PayloadSink {
    /// Sink with no worker behind it. Submissions land in the probe and
    /// fail once the probe is dropped.
    pub(crate) fn detached() -> (Self, PayloadProbe) {
        let (events, received) = mpsc::unbounded_channel();
        (Self { events }, PayloadProbe { received })
    }
}

/// Receiving end of [`PayloadSink::detached`].
#[cfg(test)]
pub(crate) struct PayloadProbe {
    received: mpsc::UnboundedReceiver<LinkEvent>,
}

#[cfg(test)]
impl PayloadProbe {
    /// Next submitted payload, `None` if nothing is waiting.
    pub(crate) fn try_recv(&mut self) -> Option<Payload> {
        while let Ok(event) = self.received.try_recv() {
            if let LinkEvent::Submit(payload) = event {
                return Some(payload);
            }
        }
        None
    }
}

/// Cloneable handle given to the transport for data coming back from the
/// aircraft.
#[derive(Clone, Debug)]
pub struct InboundSink {
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl InboundSink {
    /// Report data received from the aircraft. The content is not
    /// inspected, any data means the mission is complete.
    ///
    /// * `bytes`: received data.
    pub fn data_received(&self, bytes: Bytes) -> Result<(), LinkError> {
        self.events
            .send(LinkEvent::ExternalData(bytes))
            .map_err(|_| LinkError::WorkerStopped)
    }
}

/// Handed to [`Transport::send`] with every payload, the transport completes
/// it once the send has finished.
#[derive(Debug)]
pub struct SendCompletion {
    events: mpsc::UnboundedSender<LinkEvent>,
    /// Loop that issued the send.
    token: LoopToken,
}

impl SendCompletion {
    /// Report the outcome of the send. After the link has been torn down
    /// the result is dropped.
    ///
    /// * `result`: `Ok` if the aircraft accepted the bytes.
    pub fn complete(self, result: Result<(), TransportError>) {
        let _ = self
            .events
            .send(LinkEvent::SendCompleted(self.token, result));
    }
}

/// The radio link owns the payload arbiter and a single worker task that
/// drains it. Once the arbiter becomes ready the worker sends one payload
/// per tick at the configured telemetry frequency. A transport failure
/// stops the loop and, after [`RESTART_DELAY`], restarts the arbiter so
/// the next submission arms a new loop. There is no retry limit, the link
/// keeps recovering for as long as it exists.
pub struct RadioLink {
    /// Channel into the worker.
    events: mpsc::UnboundedSender<LinkEvent>,
    /// Published by the worker on every loop change.
    state: watch::Receiver<LinkState>,
    /// The worker task, joined on shutdown.
    worker: Option<JoinHandle<()>>,
}

impl RadioLink {
    /// Start the worker for a transport. Must be called from within a tokio
    /// runtime.
    ///
    /// * `transport`: where the bytes go.
    /// * `frequency`: telemetry frequency in Hz, changes apply to the next tick.
    /// * `mission`: finished when the aircraft sends data back.
    pub fn start<T: Transport>(
        mut transport: T,
        frequency: watch::Receiver<u32>,
        mission: Option<SharedMission>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Idle);

        transport.on_receive(InboundSink {
            events: events_tx.clone(),
        });

        let mut arbiter = PayloadArbiter::new();
        // The callback only posts, arming happens on the worker's next turn.
        let ready_tx = events_tx.clone();
        arbiter.set_ready_callback(Some(Box::new(move || {
            let _ = ready_tx.send(LinkEvent::Ready);
        })));

        let frequency_hz = *frequency.borrow();
        let worker = LinkWorker {
            arbiter,
            transport,
            events_tx: events_tx.clone(),
            events_rx,
            timers: DelayQueue::new(),
            active: None,
            cycles: 0,
            frequency_hz,
            frequency,
            state: state_tx,
            mission,
        };

        Self {
            events: events_tx,
            state: state_rx,
            worker: Some(tokio::spawn(worker.run())),
        }
    }

    /// Handle for submitting payloads to this link.
    pub fn payload_sink(&self) -> PayloadSink {
        PayloadSink {
            events: self.events.clone(),
        }
    }

    /// Handle for reporting data received from the aircraft.
    pub fn inbound_sink(&self) -> InboundSink {
        InboundSink {
            events: self.events.clone(),
        }
    }

    /// Watch the transmit loop state.
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Tear the link down. Pending ticks and a pending restart are cancelled
    /// and the worker is joined before this returns, so nothing is sent
    /// after it completes.
    pub async fn shutdown(mut self) {
        let _ = self.events.send(LinkEvent::Shutdown);
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!("Radio link worker did not exit cleanly {e}");
            }
        }
    }
}

impl Drop for RadioLink {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

/// State owned by the worker task.
struct LinkWorker<T> {
    arbiter: PayloadArbiter,
    transport: T,
    /// Given out to completions, kept so the channel never closes while
    /// the worker runs.
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
    /// Delayed ticks and restarts, dropped with the worker.
    timers: DelayQueue<Scheduled>,
    /// Token of the running loop, `None` while idle.
    active: Option<LoopToken>,
    cycles: u64,
    frequency_hz: u32,
    frequency: watch::Receiver<u32>,
    state: watch::Sender<LinkState>,
    mission: Option<SharedMission>,
}

impl<T: Transport> LinkWorker<T> {
    async fn run(mut self) {
        let mut frequency_open = true;
        loop {
            tokio::select! {
                biased;
                event = self.events_rx.recv() => match event {
                    Some(LinkEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event),
                },
                Some(expired) = self.timers.next(), if !self.timers.is_empty() => {
                    self.handle_scheduled(expired.into_inner());
                }
                changed = self.frequency.changed(), if frequency_open => {
                    if changed.is_ok() {
                        self.frequency_hz = *self.frequency.borrow_and_update();
                        info!("Telemetry frequency changed to {} Hz", self.frequency_hz);
                    } else {
                        frequency_open = false;
                    }
                }
            }
        }
        self.arbiter.set_ready_callback(None);
        self.timers.clear();
        self.active = None;
        self.state.send_replace(LinkState::Idle);
        debug!("Radio link worker stopped");
    }

    fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Submit(payload) => {
                self.arbiter.submit(payload);
            }
            LinkEvent::Ready => self.arm(),
            LinkEvent::SendCompleted(_, Ok(())) => {}
            LinkEvent::SendCompleted(token, Err(e)) if self.active == Some(token) => {
                self.recover(&e);
            }
            // The loop that sent it already stopped and scheduled its restart.
            LinkEvent::SendCompleted(_, Err(e)) => {
                debug!("Ignoring failure of a stopped loop {e}");
            }
            LinkEvent::ExternalData(bytes) => {
                debug!("Received {} bytes from the aircraft", bytes.len());
                // Observers run under the mission lock, keep them off the worker.
                if let Some(mission) = self.mission.clone() {
                    tokio::spawn(async move {
                        mission.lock().await.finish_mission();
                    });
                }
            }
            LinkEvent::Shutdown => {}
        }
    }

    fn handle_scheduled(&mut self, scheduled: Scheduled) {
        match scheduled {
            Scheduled::Tick(token) => self.tick(token),
            Scheduled::Restart => {
                info!("Restarting payload arbiter after transport failure");
                self.arbiter.request_restart();
            }
        }
    }

    /// Start a new loop, superseding any previous one.
    fn arm(&mut self) {
        self.cycles += 1;
        let token = LoopToken(self.cycles);
        self.active = Some(token);
        self.timers.insert(Scheduled::Tick(token), Duration::ZERO);
        self.state.send_replace(LinkState::Running {
            cycle: self.cycles,
        });
        debug!("Radio link armed, cycle {}", self.cycles);
    }

    fn tick(&mut self, token: LoopToken) {
        if self.active != Some(token) {
            return;
        }

        if let Some(payload) = self.arbiter.take_next() {
            let bytes = PayloadCodec::encode_payload(&payload);
            self.transport.send(
                bytes,
                SendCompletion {
                    events: self.events_tx.clone(),
                    token,
                },
            );
        }

        self.timers
            .insert(Scheduled::Tick(token), send_interval(self.frequency_hz));
    }

    /// Stop sending and restart the arbiter after the cool-down.
    fn recover(&mut self, e: &TransportError) {
        error!("Failed to send payload to the aircraft {e}");
        self.active = None;
        self.timers.insert(Scheduled::Restart, RESTART_DELAY);
        self.state.send_replace(LinkState::Idle);
    }
}
