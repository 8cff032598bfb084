use crate::{
    components::{
        mission::targets::{DetectedTarget, TargetList, TargetObserver},
        radio::link::PayloadSink,
    },
    messages::radio::payload::{CommandKind, Payload},
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::Serialize;
use std::{fmt::Display, sync::Arc};
use strum_macros::{Display as StrumDisplay, IntoStaticStr};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Lifecycle of a mission. The initial state is `Ready` and `Finished` is
/// terminal.
#[derive(StrumDisplay, IntoStaticStr, Serialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    /// Connected to the aircraft, waiting for the start command.
    Ready,
    /// The aircraft is flying the mission.
    Started,
    /// The mission was aborted and the aircraft is landing.
    AbortLanding,
    /// The mission was aborted and the aircraft is hovering.
    AbortMission,
    /// The aircraft confirmed the end of the mission.
    Finished,
}

/// Operations that move a mission between states.
#[derive(StrumDisplay, Copy, Clone, Debug, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum MissionOperation {
    /// Start the mission.
    Start,
    /// Abort the mission by landing.
    AbortLanding,
    /// Abort the mission by hovering.
    AbortMission,
    /// End the mission.
    Finish,
}

impl MissionOperation {
    /// Command that has to reach the aircraft for this operation, if any.
    pub fn command(self) -> Option<CommandKind> {
        match self {
            MissionOperation::Start => Some(CommandKind::StartMission),
            MissionOperation::AbortLanding => Some(CommandKind::AbortLanding),
            MissionOperation::AbortMission => Some(CommandKind::AbortMission),
            MissionOperation::Finish => None,
        }
    }
}

impl MissionState {
    /// State reached by applying `operation`, `None` if the transition is
    /// not allowed from this state.
    ///
    /// * `operation`: requested transition.
    pub fn next(self, operation: MissionOperation) -> Option<MissionState> {
        use MissionOperation as Op;
        use MissionState as State;

        match (self, operation) {
            (State::Ready, Op::Start) => Some(State::Started),
            (State::Started, Op::AbortLanding) => Some(State::AbortLanding),
            (State::Started, Op::AbortMission) => Some(State::AbortMission),
            (State::Started | State::AbortLanding | State::AbortMission, Op::Finish) => {
                Some(State::Finished)
            }
            _ => None,
        }
    }
}

/// Anything that wants to follow the mission state, such as a timer on
/// screen or the operator console.
pub trait MissionStateObserver: Send + Sync {
    /// Called with the new state after every transition, and once with the
    /// current state when the observer is added.
    fn on_state_changed(&self, state: MissionState);
}

/// A mission shared between the operator side and the radio link worker.
pub type SharedMission = Arc<Mutex<Mission>>;

/// The mission owns the lifecycle state of one flight. It is created once
/// per aircraft connection and only changes state through the transition
/// operations. Every transition that needs the aircraft to act pushes the
/// matching command payload to the radio link before the state changes, so
/// the state and the pending command never diverge: without an attached
/// payload sink those transitions are refused.
pub struct Mission {
    /// Unique identifier of the mission, used in logs.
    uuid: Uuid,
    /// Current lifecycle state.
    state: MissionState,
    /// When the mission was started.
    start_time: Option<DateTime<Utc>>,
    /// When the mission finished.
    stop_time: Option<DateTime<Utc>>,
    /// Observers notified in registration order.
    observers: Vec<Arc<dyn MissionStateObserver>>,
    /// Where command payloads go, injected once the radio link exists.
    payloads: Option<PayloadSink>,
    /// Targets detected during the mission.
    targets: TargetList,
}

impl Default for Mission {
    fn default() -> Self {
        Self::new()
    }
}

impl Mission {
    /// Create a mission in the `Ready` state without a payload sink.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            state: MissionState::Ready,
            start_time: None,
            stop_time: None,
            observers: Vec::new(),
            payloads: None,
            targets: TargetList::new(),
        }
    }

    /// Wrap the mission so it can be shared with the radio link.
    pub fn into_shared(self) -> SharedMission {
        Arc::new(Mutex::new(self))
    }

    /// Return the unique identifier of the mission.
    pub fn get_uuid(&self) -> Uuid {
        self.uuid
    }

    /// Set or remove the sink used to send commands to the aircraft.
    ///
    /// * `payloads`: sink of the radio link.
    pub fn attach_payload_sink(&mut self, payloads: Option<PayloadSink>) {
        self.payloads = payloads;
    }

    /// `Ready` to `Started`, sends the start command.
    pub fn start_mission(&mut self) -> bool {
        self.transition(MissionOperation::Start)
    }

    /// `Started` to `AbortLanding`, sends the abort landing command.
    pub fn abort_landing(&mut self) -> bool {
        self.transition(MissionOperation::AbortLanding)
    }

    /// `Started` to `AbortMission`, sends the abort mission command.
    pub fn abort_mission(&mut self) -> bool {
        self.transition(MissionOperation::AbortMission)
    }

    /// Any active state to `Finished`. Also called when the aircraft
    /// reports that it has landed.
    pub fn finish_mission(&mut self) -> bool {
        self.transition(MissionOperation::Finish)
    }

    /// Apply an operation. Returns false and leaves the mission untouched
    /// if the transition is not allowed or its command cannot be queued.
    ///
    /// * `operation`: requested transition.
    pub fn transition(&mut self, operation: MissionOperation) -> bool {
        let Some(next) = self.state.next(operation) else {
            debug!(
                "Mission {} refused {operation} while {}",
                self.uuid, self.state
            );
            return false;
        };

        if let Some(command) = operation.command() {
            let Some(payloads) = &self.payloads else {
                debug!("Mission {} has no radio link for {operation}", self.uuid);
                return false;
            };
            if payloads.submit(Payload::Command(command)).is_err() {
                debug!("Mission {} radio link is gone, {operation} refused", self.uuid);
                return false;
            }
        }

        let now = Utc::now();
        match next {
            MissionState::Started => self.start_time = Some(now),
            MissionState::Finished => self.stop_time = Some(now),
            _ => {}
        }

        info!("Mission {} {} -> {next}", self.uuid, self.state);
        self.state = next;
        self.notify_observers();
        true
    }

    /// Register an observer. It is called right away with the current state
    /// so it does not have to wait for the next transition. Returns false if
    /// the observer was already registered.
    ///
    /// * `observer`: shared observer, compared by pointer.
    pub fn add_observer(&mut self, observer: Arc<dyn MissionStateObserver>) -> bool {
        if self.observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return false;
        }
        observer.on_state_changed(self.state);
        self.observers.push(observer);
        true
    }

    /// Remove an observer, removing one that is not registered does nothing.
    ///
    /// * `observer`: observer passed to [`Mission::add_observer`].
    pub fn remove_observer(&mut self, observer: &Arc<dyn MissionStateObserver>) {
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    fn notify_observers(&self) {
        for observer in &self.observers {
            observer.on_state_changed(self.state);
        }
    }

    /// Record a target detected by the onboard vision system.
    ///
    /// * `target`: detected target.
    pub fn add_target(&mut self, target: DetectedTarget) {
        self.targets.add_target(target);
    }

    /// Follow targets as they are detected.
    ///
    /// * `observer`: shared observer, compared by pointer.
    pub fn add_target_observer(&mut self, observer: Arc<dyn TargetObserver>) -> bool {
        self.targets.add_observer(observer)
    }

    /// Stop following targets.
    ///
    /// * `observer`: observer passed to [`Mission::add_target_observer`].
    pub fn remove_target_observer(&mut self, observer: &Arc<dyn TargetObserver>) {
        self.targets.remove_observer(observer);
    }

    /// Release everything tied to the aircraft connection. Observers are
    /// dropped and the payload sink is detached, the state is kept as is.
    pub fn dispose(&mut self) {
        info!("Mission {} disposed while {}", self.uuid, self.state);
        self.observers.clear();
        self.targets.clear_observers();
        self.payloads = None;
    }

    /// Current state.
    pub fn state(&self) -> MissionState {
        self.state
    }

    /// When the mission was started.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// When the mission finished.
    pub fn stop_time(&self) -> Option<DateTime<Utc>> {
        self.stop_time
    }

    /// Targets detected so far, in arrival order.
    pub fn targets(&self) -> &[DetectedTarget] {
        self.targets.targets()
    }

    /// Time spent in the mission. Counts up from the start while the
    /// mission is active and stops at the finish time.
    ///
    /// * `now`: current time.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        let start = self.start_time?;
        Some(self.stop_time.unwrap_or(now) - start)
    }
}

/// Display wrapper for mission durations as `HH:MM:SS.cc`, hours wrap at a
/// day like a wall clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ElapsedTime(pub Duration);

impl Display for ElapsedTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let millis = self.0.num_milliseconds().max(0);
        let hours = (millis / 3_600_000) % 24;
        let minutes = (millis / 60_000) % 60;
        let seconds = (millis / 1000) % 60;
        let hundredths = (millis % 1000) / 10;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{hundredths:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use crate::components::radio::link::PayloadProbe;
    use std::sync::Mutex as StdMutex;

    /// Observer that records every state it sees.
    #[derive(Default)]
    struct Recorder {
        seen: StdMutex<Vec<MissionState>>,
    }

    impl MissionStateObserver for Recorder {
        fn on_state_changed(&self, state: MissionState) {
            self.seen.lock().unwrap().push(state);
        }
    }

    impl Recorder {
        fn seen(&self) -> Vec<MissionState> {
            self.seen.lock().unwrap().clone()
        }
    }

    /// A mission whose payload sink stays connected while the probe lives.
    fn connected_mission() -> (Mission, PayloadProbe) {
        let (sink, payloads) = PayloadSink::detached();
        let mut mission = Mission::new();
        mission.attach_payload_sink(Some(sink));
        (mission, payloads)
    }

    fn drive_to(mission: &mut Mission, state: MissionState) {
        match state {
            MissionState::Ready => {}
            MissionState::Started => assert!(mission.start_mission()),
            MissionState::AbortLanding => {
                assert!(mission.start_mission());
                assert!(mission.abort_landing());
            }
            MissionState::AbortMission => {
                assert!(mission.start_mission());
                assert!(mission.abort_mission());
            }
            MissionState::Finished => {
                assert!(mission.start_mission());
                assert!(mission.finish_mission());
            }
        }
    }

    const OPERATIONS: [MissionOperation; 4] = [
        MissionOperation::Start,
        MissionOperation::AbortLanding,
        MissionOperation::AbortMission,
        MissionOperation::Finish,
    ];

    #[rstest]
    #[case(MissionState::Ready)]
    #[case(MissionState::Started)]
    #[case(MissionState::AbortLanding)]
    #[case(MissionState::AbortMission)]
    #[case(MissionState::Finished)]
    /// Every (state, operation) pair either follows the transition table or
    /// leaves the mission untouched.
    fn test_transition_table(#[case] from: MissionState) {
        for operation in OPERATIONS {
            let (mut mission, _payloads) = connected_mission();
            drive_to(&mut mission, from);
            let start_time = mission.start_time();

            let accepted = mission.transition(operation);

            match from.next(operation) {
                Some(expected) => {
                    assert!(accepted, "{from} should accept {operation}");
                    assert_eq!(mission.state(), expected);
                }
                None => {
                    assert!(!accepted, "{from} should refuse {operation}");
                    assert_eq!(mission.state(), from);
                    assert_eq!(mission.start_time(), start_time);
                }
            }
        }
    }

    #[rstest]
    #[case(MissionState::Started)]
    #[case(MissionState::AbortLanding)]
    #[case(MissionState::AbortMission)]
    fn test_finish_from_active_states(#[case] from: MissionState) {
        let (mut mission, _payloads) = connected_mission();
        drive_to(&mut mission, from);

        assert!(mission.finish_mission());
        assert_eq!(mission.state(), MissionState::Finished);
        let (start, stop) = (mission.start_time().unwrap(), mission.stop_time().unwrap());
        assert!(stop >= start);
    }

    #[rstest]
    #[case(MissionState::Ready)]
    #[case(MissionState::Finished)]
    fn test_finish_is_refused_when_inactive(#[case] from: MissionState) {
        let (mut mission, _payloads) = connected_mission();
        drive_to(&mut mission, from);
        let stop_time = mission.stop_time();

        assert!(!mission.finish_mission());
        assert_eq!(mission.state(), from);
        assert_eq!(mission.stop_time(), stop_time);
    }

    #[test]
    fn test_transitions_queue_their_commands() {
        let (mut mission, mut payloads) = connected_mission();
        assert!(mission.start_mission());
        assert!(mission.abort_landing());
        assert!(mission.finish_mission());

        assert_eq!(
            payloads.try_recv(),
            Some(Payload::Command(CommandKind::StartMission))
        );
        assert_eq!(
            payloads.try_recv(),
            Some(Payload::Command(CommandKind::AbortLanding))
        );
        // Finishing does not send anything.
        assert_eq!(payloads.try_recv(), None);
    }

    #[test]
    fn test_start_without_radio_link_is_refused() {
        let mut mission = Mission::new();
        assert!(!mission.start_mission());
        assert_eq!(mission.state(), MissionState::Ready);
        assert_eq!(mission.start_time(), None);
    }

    #[test]
    fn test_start_with_stopped_link_is_refused() {
        let (mut mission, payloads) = connected_mission();
        drop(payloads);

        assert!(!mission.start_mission());
        assert_eq!(mission.state(), MissionState::Ready);
    }

    #[test]
    fn test_observers_follow_transitions_in_order() {
        let (mut mission, _payloads) = connected_mission();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        assert!(mission.add_observer(first.clone()));
        mission.start_mission();
        assert!(mission.add_observer(second.clone()));
        mission.abort_mission();

        assert_eq!(
            first.seen(),
            vec![
                MissionState::Ready,
                MissionState::Started,
                MissionState::AbortMission
            ]
        );
        assert_eq!(
            second.seen(),
            vec![MissionState::Started, MissionState::AbortMission]
        );
    }

    #[test]
    fn test_duplicate_observer_is_rejected_and_removal_is_idempotent() {
        let (mut mission, _payloads) = connected_mission();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn MissionStateObserver> = recorder.clone();

        assert!(mission.add_observer(observer.clone()));
        assert!(!mission.add_observer(observer.clone()));
        assert_eq!(recorder.seen().len(), 1);

        mission.remove_observer(&observer);
        mission.remove_observer(&observer);
        mission.start_mission();
        assert_eq!(recorder.seen(), vec![MissionState::Ready]);
    }

    #[test]
    fn test_refused_transition_does_not_notify() {
        let (mut mission, _payloads) = connected_mission();
        let recorder = Arc::new(Recorder::default());
        mission.add_observer(recorder.clone());

        assert!(!mission.abort_landing());
        assert_eq!(recorder.seen(), vec![MissionState::Ready]);
    }

    #[test]
    fn test_dispose_releases_observers_and_keeps_state() {
        let (mut mission, _payloads) = connected_mission();
        let recorder = Arc::new(Recorder::default());
        mission.add_observer(recorder.clone());
        mission.start_mission();

        mission.dispose();
        assert_eq!(mission.state(), MissionState::Started);
        assert_eq!(Arc::strong_count(&recorder), 1);

        // Without the radio link, aborting is refused but finishing is not.
        assert!(!mission.abort_landing());
        assert!(mission.finish_mission());
        assert_eq!(recorder.seen().len(), 2);
    }

    #[test]
    fn test_elapsed_time() {
        let (mut mission, _payloads) = connected_mission();
        assert_eq!(mission.elapsed(Utc::now()), None);

        mission.start_mission();
        let start = mission.start_time().unwrap();
        assert_eq!(
            mission.elapsed(start + Duration::seconds(90)),
            Some(Duration::seconds(90))
        );

        mission.finish_mission();
        let stop = mission.stop_time().unwrap();
        assert_eq!(
            mission.elapsed(stop + Duration::hours(1)),
            Some(stop - start)
        );
    }

    #[rstest]
    #[case(Duration::milliseconds(0), "00:00:00.00")]
    #[case(Duration::milliseconds(1_234), "00:00:01.23")]
    #[case(Duration::seconds(3_723), "01:02:03.00")]
    #[case(Duration::hours(25), "01:00:00.00")]
    fn test_elapsed_time_display(#[case] elapsed: Duration, #[case] expected: &str) {
        assert_eq!(ElapsedTime(elapsed).to_string(), expected);
    }
}
