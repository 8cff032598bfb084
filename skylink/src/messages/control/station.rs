use crate::{
    components::{mission::state_machine::MissionOperation, telemetry::attitude::SensorReading},
    messages::radio::payload::PositionFix,
};
use serde::Deserialize;
use strum_macros::{Display, EnumString};

/// Mission commands an operator can issue.
#[derive(Deserialize, EnumString, Display, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissionCommand {
    StartMission,
    AbortLanding,
    AbortMission,
    FinishMission,
}

impl From<MissionCommand> for MissionOperation {
    fn from(command: MissionCommand) -> Self {
        match command {
            MissionCommand::StartMission => MissionOperation::Start,
            MissionCommand::AbortLanding => MissionOperation::AbortLanding,
            MissionCommand::AbortMission => MissionOperation::AbortMission,
            MissionCommand::FinishMission => MissionOperation::Finish,
        }
    }
}

/// Message received by the mission control listener, one JSON object per
/// line with a `type` field selecting the variant.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StationMessage {
    /// Operator command for the mission.
    Command { command: MissionCommand },
    /// New GPS fix of the ground station.
    Position(PositionFix),
    /// Accelerometer reading.
    Acceleration { values: [f32; 3] },
    /// Rotation vector reading.
    Orientation { values: [f32; 4] },
    /// Change of the telemetry frequency.
    Frequency { hz: u32 },
    /// Target reported by the vision pipeline.
    Target {
        id: u32,
        latitude: f64,
        longitude: f64,
    },
}

impl StationMessage {
    /// The sensor reading carried by this message, if any.
    pub fn sensor_reading(&self) -> Option<SensorReading> {
        match self {
            StationMessage::Acceleration { values } => Some(SensorReading::Acceleration(*values)),
            StationMessage::Orientation { values } => Some(SensorReading::Orientation(*values)),
            _ => None,
        }
    }
}
