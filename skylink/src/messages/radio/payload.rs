use crate::messages::radio::codec::{
    ATTITUDE_PAYLOAD_LEN, COMMAND_PAYLOAD_LEN, POSITION_PAYLOAD_LEN,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Commands the aircraft understands. Each command is sent as a single
/// magic byte, see [`CommandKind::magic`].
#[derive(
    EnumString,
    IntoStaticStr,
    Display,
    Deserialize,
    Serialize,
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CommandKind {
    /// Take off and start searching.
    StartMission = 0x0,
    /// Abort the mission by landing where the aircraft is.
    AbortLanding = 0x1,
    /// Abort the mission by hovering in place.
    AbortMission = 0x2,
}

impl CommandKind {
    /// Magic number sent to the aircraft for this command.
    pub fn magic(self) -> u8 {
        self as u8
    }
}

/// A position fix from the ground station GPS. Latitude and longitude
/// are always known, every other field depends on the quality of the fix
/// and is encoded as 0.0 when missing.
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq, Default)]
pub struct PositionFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in metres above the WGS84 ellipsoid.
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Bearing in degrees.
    #[serde(default)]
    pub bearing: Option<f32>,
    /// Horizontal accuracy in metres.
    #[serde(default)]
    pub accuracy: Option<f32>,
    /// Ground speed in metres per second.
    #[serde(default)]
    pub speed: Option<f32>,
}

impl PositionFix {
    /// Create a fix with only latitude and longitude known.
    ///
    /// * `latitude`: degrees
    /// * `longitude`: degrees
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }
}

/// One attitude sample, the acceleration and the orientation quaternion.
/// The two groups come from different sensors on their own schedule so a
/// new sample usually only updates one of them.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct AttitudeSample {
    /// Acceleration along x, y and z in m/s^2.
    pub acceleration: [f32; 3],
    /// Rotation quaternion as x, y, z, w.
    pub orientation: [f32; 4],
}

impl AttitudeSample {
    /// New sample that keeps the orientation of `self`.
    pub fn with_acceleration(self, acceleration: [f32; 3]) -> Self {
        Self {
            acceleration,
            ..self
        }
    }

    /// New sample that keeps the acceleration of `self`.
    pub fn with_orientation(self, orientation: [f32; 4]) -> Self {
        Self {
            orientation,
            ..self
        }
    }
}

/// Category of a payload. The arbiter keeps at most one pending payload
/// per category. Ordering is the send priority: a command always goes
/// before a position which always goes before an attitude sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum PayloadCategory {
    /// Lowest priority.
    Attitude,
    /// Position of the ground station.
    Position,
    /// Highest priority.
    Command,
}

/// One discrete unit of data for the radio. The payload only keeps the
/// raw values; the bytes are produced by the codec at the moment of
/// sending so a stale sample is never encoded ahead of time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Payload {
    /// Mission command.
    Command(CommandKind),
    /// Position fix of the ground station.
    Position(PositionFix),
    /// Acceleration and orientation of the ground station.
    Attitude(AttitudeSample),
}

impl Payload {
    /// Which arbiter slot this payload belongs to.
    pub fn category(&self) -> PayloadCategory {
        match self {
            Payload::Command(_) => PayloadCategory::Command,
            Payload::Position(_) => PayloadCategory::Position,
            Payload::Attitude(_) => PayloadCategory::Attitude,
        }
    }

    /// Size in bytes of the encoded payload.
    pub fn encoded_len(&self) -> usize {
        match self {
            Payload::Command(_) => COMMAND_PAYLOAD_LEN,
            Payload::Position(_) => POSITION_PAYLOAD_LEN,
            Payload::Attitude(_) => ATTITUDE_PAYLOAD_LEN,
        }
    }
}

impl From<CommandKind> for Payload {
    fn from(command: CommandKind) -> Self {
        Payload::Command(command)
    }
}

impl From<PositionFix> for Payload {
    fn from(fix: PositionFix) -> Self {
        Payload::Position(fix)
    }
}

impl From<AttitudeSample> for Payload {
    fn from(sample: AttitudeSample) -> Self {
        Payload::Attitude(sample)
    }
}
