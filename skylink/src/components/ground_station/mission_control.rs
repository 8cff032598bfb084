use crate::{
    components::{
        mission::{
            state_machine::{Mission, MissionOperation, SharedMission},
            targets::DetectedTarget,
        },
        radio::link::{RadioLink, DEFAULT_FREQUENCY_HZ},
        telemetry::{attitude::AttitudeSource, position::PositionSource},
    },
    devices::radio::udp::UdpTransport,
    error::{ConfigError, TransportError},
    messages::control::station::StationMessage,
    utils::config::from_yaml_file,
};
use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{ffi::OsStr, future::Future, net::SocketAddr, ops::RangeInclusive, sync::Arc};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{watch, Mutex},
    task::JoinSet,
};
use tokio_util::codec::{FramedRead, LinesCodec};
use uuid::Uuid;

/// Telemetry frequencies the aircraft accepts.
pub const FREQUENCY_RANGE_HZ: RangeInclusive<u32> = 5..=60;

/// Check that a telemetry frequency is within [`FREQUENCY_RANGE_HZ`].
///
/// * `frequency_hz`: requested frequency.
pub fn check_frequency(frequency_hz: u32) -> Result<u32, ConfigError> {
    if FREQUENCY_RANGE_HZ.contains(&frequency_hz) {
        Ok(frequency_hz)
    } else {
        Err(ConfigError::FrequencyOutOfRange(frequency_hz))
    }
}

fn default_frequency_hz() -> u32 {
    DEFAULT_FREQUENCY_HZ
}

/// Configuration of the radio link towards the aircraft.
#[derive(Deserialize, Serialize, PartialEq, Eq, Debug, Clone)]
pub struct RadioLinkConfig {
    /// Telemetry frequency in Hz at start up.
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: u32,
    /// Local address of the datagram socket.
    pub bind_address: SocketAddr,
    /// Address of the onboard bridge.
    pub aircraft_address: SocketAddr,
}

impl RadioLinkConfig {
    /// Radio link configuration at the default frequency.
    ///
    /// * `bind_address`: local address, port 0 picks a free one.
    /// * `aircraft_address`: address of the onboard bridge.
    pub fn new(bind_address: SocketAddr, aircraft_address: SocketAddr) -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            bind_address,
            aircraft_address,
        }
    }

    /// Set the telemetry frequency.
    pub fn with_frequency(mut self, frequency_hz: u32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_frequency(self.frequency_hz).map(|_| ())
    }
}

/// Configuration of the mission control service.
#[derive(Deserialize, Serialize, PartialEq, Eq, Debug, Clone)]
pub struct MissionControlConfig {
    /// Name of the mission, shows up in the logs.
    pub mission_id: String,
    /// Port the control listener binds on all interfaces.
    pub port: u16,
    /// Radio link towards the aircraft.
    pub link: RadioLinkConfig,
}

impl MissionControlConfig {
    /// Mission control configuration.
    ///
    /// * `mission_id`: name of the mission.
    /// * `port`: port of the control listener.
    /// * `link`: radio link configuration.
    pub fn new(mission_id: String, port: u16, link: RadioLinkConfig) -> Self {
        Self {
            mission_id,
            port,
            link,
        }
    }

    /// Build the config by reading a file and validate it.
    ///
    /// * `filepath`: path to config.
    pub fn from_file<F: AsRef<OsStr>>(filepath: F) -> Result<Self, ConfigError> {
        let config: Self = from_yaml_file(filepath)?;
        config.link.validate()?;
        Ok(config)
    }
}

/// Component holding the mission of one aircraft and the ground station
/// telemetry producers feeding its radio link.
pub struct MissionControl {
    /// Unique id of the component.
    uuid: Uuid,
    mission_id: String,
    port: u16,
    link_config: RadioLinkConfig,
    mission: SharedMission,
    position: Arc<Mutex<PositionSource>>,
    attitude: Arc<Mutex<AttitudeSource>>,
}

impl MissionControl {
    /// Generate a new component by consuming a config.
    ///
    /// * `config`: `MissionControlConfig`
    pub fn new(config: MissionControlConfig) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            mission_id: config.mission_id,
            port: config.port,
            link_config: config.link,
            mission: Mission::new().into_shared(),
            position: Arc::new(Mutex::new(PositionSource::new())),
            attitude: Arc::new(Mutex::new(AttitudeSource::new())),
        }
    }

    /// Generate a new component by consuming the config stored in a file.
    ///
    /// * `filepath`: filepath to a config.
    pub fn from_config_file<F: AsRef<OsStr>>(filepath: F) -> Result<Self, ConfigError> {
        Ok(Self::new(MissionControlConfig::from_file(filepath)?))
    }

    pub fn get_uuid(&self) -> Uuid {
        self.uuid
    }

    /// The mission, shared with the radio link once the controller runs.
    pub fn mission(&self) -> SharedMission {
        self.mission.clone()
    }

    pub fn position(&self) -> Arc<Mutex<PositionSource>> {
        self.position.clone()
    }

    pub fn attitude(&self) -> Arc<Mutex<AttitudeSource>> {
        self.attitude.clone()
    }
}

/// What each control connection needs to act on a message.
struct Station {
    mission_id: String,
    mission: SharedMission,
    position: Arc<Mutex<PositionSource>>,
    attitude: Arc<Mutex<AttitudeSource>>,
    frequency: watch::Sender<u32>,
}

/// Unit struct for running the mission control component.
pub struct MissionControlController;

impl MissionControlController {
    /// Start the component, listening for control messages on
    /// `0.0.0.0:<port>` until the process receives ctrl-c.
    ///
    /// * `mission_control`: component to run.
    pub async fn start(mission_control: MissionControl) -> Result<(), TransportError> {
        let listener = TcpListener::bind(("0.0.0.0", mission_control.port)).await?;
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for ctrl-c, running until killed {e}");
                std::future::pending::<()>().await;
            }
        };
        Self::serve(mission_control, listener, shutdown).await
    }

    /// Run the component on an already bound listener. Once `shutdown`
    /// resolves the control connections are closed, the radio link is shut
    /// down and the mission is disposed before this returns.
    ///
    /// * `mission_control`: component to run.
    /// * `listener`: control listener.
    /// * `shutdown`: resolves when the aircraft connection is torn down.
    pub async fn serve<S>(
        mission_control: MissionControl,
        listener: TcpListener,
        shutdown: S,
    ) -> Result<(), TransportError>
    where
        S: Future<Output = ()>,
    {
        let transport = UdpTransport::bind(
            mission_control.link_config.bind_address,
            mission_control.link_config.aircraft_address,
        )
        .await?;

        let (frequency_tx, frequency_rx) = watch::channel(mission_control.link_config.frequency_hz);
        let link = RadioLink::start(transport, frequency_rx, Some(mission_control.mission()));
        let sink = link.payload_sink();

        mission_control
            .mission
            .lock()
            .await
            .attach_payload_sink(Some(sink.clone()));
        mission_control
            .position
            .lock()
            .await
            .set_sink(Some(sink.clone()));
        mission_control.attitude.lock().await.set_sink(Some(sink));

        info!(
            "Mission {} control listening on {}",
            mission_control.mission_id,
            listener.local_addr()?
        );

        let station = Arc::new(Station {
            mission_id: mission_control.mission_id,
            mission: mission_control.mission,
            position: mission_control.position,
            attitude: mission_control.attitude,
            frequency: frequency_tx,
        });

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        debug!("Control connection from {peer}");
                        connections.spawn(handle_connection(socket, station.clone()));
                    }
                    Err(e) => warn!("Failed to accept control connection {e}"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!("Mission {} control shutting down", station.mission_id);
        connections.shutdown().await;
        link.shutdown().await;
        station.position.lock().await.set_sink(None);
        station.attitude.lock().await.set_sink(None);
        station.mission.lock().await.dispose();
        Ok(())
    }
}

/// Read newline delimited messages until the peer closes the connection.
///
/// * `socket`: control connection.
/// * `station`: what the messages act on.
async fn handle_connection(socket: TcpStream, station: Arc<Station>) {
    let mut lines = FramedRead::new(socket, LinesCodec::new());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Dropping control connection {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StationMessage>(&line) {
            Ok(message) => handle_message(message, &station).await,
            Err(e) => warn!("Received a malformed request {e}, data: {line:?}"),
        }
    }
    debug!("Control connection closed");
}

async fn handle_message(message: StationMessage, station: &Station) {
    if let Some(reading) = message.sensor_reading() {
        station.attitude.lock().await.on_reading(reading);
        return;
    }

    match message {
        StationMessage::Command { command } => {
            let operation = MissionOperation::from(command);
            let mut mission = station.mission.lock().await;
            if mission.transition(operation) {
                info!("Mission {} is now {}", station.mission_id, mission.state());
            } else {
                warn!(
                    "Mission {} rejected {command} while {}",
                    station.mission_id,
                    mission.state()
                );
            }
        }
        StationMessage::Position(fix) => station.position.lock().await.on_fix(fix),
        StationMessage::Frequency { hz } => match check_frequency(hz) {
            Ok(hz) => {
                station.frequency.send_replace(hz);
            }
            Err(e) => warn!("Ignoring frequency change {e}"),
        },
        StationMessage::Target {
            id,
            latitude,
            longitude,
        } => station
            .mission
            .lock()
            .await
            .add_target(DetectedTarget::new(id, latitude, longitude)),
        StationMessage::Acceleration { .. } | StationMessage::Orientation { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::mission::state_machine::{MissionState, MissionStateObserver},
        messages::radio::payload::PositionFix,
    };
    use crate::test_file_path;
    use rstest::rstest;
    use serial_test::serial;
    use std::{
        fs::OpenOptions,
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::{io::AsyncWriteExt, net::UdpSocket, sync::oneshot, time::timeout};

    const CONFIG_FILE: &str = "/config/components/ground_station/mission_control.yaml";

    fn local_config(aircraft_address: SocketAddr) -> MissionControlConfig {
        MissionControlConfig::new(
            String::from("search-1"),
            0,
            RadioLinkConfig::new("127.0.0.1:0".parse().unwrap(), aircraft_address),
        )
    }

    #[rstest]
    #[case(4, false)]
    #[case(5, true)]
    #[case(20, true)]
    #[case(60, true)]
    #[case(61, false)]
    fn test_frequency_range(#[case] frequency_hz: u32, #[case] valid: bool) {
        let config = RadioLinkConfig::new(
            "127.0.0.1:0".parse().unwrap(),
            "127.0.0.1:14550".parse().unwrap(),
        )
        .with_frequency(frequency_hz);
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn test_frequency_defaults_when_missing() {
        let config: RadioLinkConfig = serde_yaml::from_str(
            "bind_address: 0.0.0.0:14551\naircraft_address: 192.168.1.10:14550\n",
        )
        .unwrap();
        assert_eq!(config.frequency_hz, DEFAULT_FREQUENCY_HZ);
    }

    #[test]
    #[serial]
    fn test_write_component_config_to_file() {
        let config = local_config("192.168.1.10:14550".parse().unwrap());

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(Path::new(&format!(
                "{}{CONFIG_FILE}",
                env!("CARGO_MANIFEST_DIR")
            )))
            .expect("Failed to open file");
        serde_yaml::to_writer(file, &config).expect("Failed to write yaml");
    }

    #[test]
    #[serial]
    fn test_read_component_config_from_file() {
        let read_config = MissionControlConfig::from_file(test_file_path!(
            "/config/components/ground_station/mission_control.yaml"
        ))
        .expect("Failed to read config");

        assert_eq!(
            read_config,
            local_config("192.168.1.10:14550".parse().unwrap()),
            "Failed to read write config"
        );
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(matches!(
            MissionControl::from_config_file("./config/missing.yaml"),
            Err(ConfigError::Missing(_))
        ));
    }

    async fn send_lines(address: SocketAddr, lines: &[&str]) {
        let mut stream = TcpStream::connect(address).await.unwrap();
        for line in lines {
            stream.write_all(line.as_bytes()).await.unwrap();
            stream.write_all(b"\n").await.unwrap();
        }
        stream.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_control_messages_drive_the_mission() {
        let aircraft = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mission_control = MissionControl::new(local_config(aircraft.local_addr().unwrap()));
        let mission = mission_control.mission();
        let position = mission_control.position();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(MissionControlController::serve(
            mission_control,
            listener,
            std::future::pending(),
        ));

        send_lines(
            address,
            &[
                r#"{"type": "command", "command": "start_mission"}"#,
                "this is not json",
                r#"{"type": "position", "latitude": 45.5, "longitude": -73.5}"#,
                r#"{"type": "frequency", "hz": 500}"#,
                r#"{"type": "target", "id": 3, "latitude": 45.51, "longitude": -73.49}"#,
            ],
        )
        .await;

        // The start command reaches the aircraft first.
        let mut buffer = [0u8; 64];
        let len = timeout(Duration::from_secs(2), aircraft.recv(&mut buffer))
            .await
            .expect("No datagram from the station")
            .unwrap();
        assert_eq!(&buffer[..len], &[0x00]);

        timeout(Duration::from_secs(2), async {
            while mission.lock().await.targets().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Target never arrived");

        {
            let guard = mission.lock().await;
            assert_eq!(guard.state(), MissionState::Started);
            assert_eq!(guard.targets()[0].id, 3);
        }
        assert_eq!(
            position.lock().await.last_fix(),
            Some(PositionFix::new(45.5, -73.5))
        );

        server.abort();
    }

    #[tokio::test]
    async fn test_rejected_command_keeps_connection_open() {
        let aircraft = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mission_control = MissionControl::new(local_config(aircraft.local_addr().unwrap()));
        let mission = mission_control.mission();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(MissionControlController::serve(
            mission_control,
            listener,
            std::future::pending(),
        ));

        send_lines(
            address,
            &[
                r#"{"type": "command", "command": "abort_landing"}"#,
                r#"{"type": "command", "command": "start_mission"}"#,
                r#"{"type": "command", "command": "abort_landing"}"#,
            ],
        )
        .await;

        timeout(Duration::from_secs(2), async {
            while mission.lock().await.state() != MissionState::AbortLanding {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Mission never aborted");

        server.abort();
    }

    /// Counts the state changes it is told about.
    #[derive(Default)]
    struct StateCount(AtomicUsize);

    impl MissionStateObserver for StateCount {
        fn on_state_changed(&self, _state: MissionState) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_shutdown_releases_the_mission_and_stops_sending() {
        let aircraft = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mission_control = MissionControl::new(local_config(aircraft.local_addr().unwrap()));
        let mission = mission_control.mission();
        let observer = Arc::new(StateCount::default());
        assert!(mission.lock().await.add_observer(observer.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(MissionControlController::serve(
            mission_control,
            listener,
            async move {
                let _ = stop_rx.await;
            },
        ));

        send_lines(
            address,
            &[
                r#"{"type": "command", "command": "start_mission"}"#,
                r#"{"type": "acceleration", "values": [0.0, 0.0, 9.81]}"#,
            ],
        )
        .await;

        // The command, then the attitude sample on every tick.
        let mut buffer = [0u8; 64];
        for expected_len in [1, 28] {
            let len = timeout(Duration::from_secs(2), aircraft.recv(&mut buffer))
                .await
                .expect("No datagram from the station")
                .unwrap();
            assert_eq!(len, expected_len);
        }

        stop_tx.send(()).unwrap();
        timeout(Duration::from_secs(2), server)
            .await
            .expect("Mission control did not stop")
            .unwrap()
            .unwrap();

        assert_eq!(Arc::strong_count(&observer), 1);
        assert_eq!(observer.0.load(Ordering::SeqCst), 2);
        {
            let mut guard = mission.lock().await;
            assert_eq!(guard.state(), MissionState::Started);
            // The radio link is detached.
            assert!(!guard.abort_landing());
        }

        // Whatever was on the wire before the shutdown, then silence.
        tokio::time::sleep(Duration::from_millis(100)).await;
        while aircraft.try_recv(&mut buffer).is_ok() {}
        assert!(timeout(Duration::from_millis(300), aircraft.recv(&mut buffer))
            .await
            .is_err());
    }

    #[cfg(feature = "hardware_test")]
    #[tokio::test]
    async fn test_start_against_onboard_bridge() {
        let mission_control = MissionControl::from_config_file(test_file_path!(
            "/config/components/ground_station/mission_control.yaml"
        ))
        .expect("Failed to read config");
        let mission = mission_control.mission();
        let server = tokio::spawn(MissionControlController::start(mission_control));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(mission.lock().await.start_mission());
        tokio::time::sleep(Duration::from_secs(2)).await;

        server.abort();
    }
}
