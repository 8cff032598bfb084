/// Components that track the state of the mission itself.
pub mod mission {
    /// Mission lifecycle and its observers.
    pub mod state_machine;
    /// Targets (survivors) detected during the mission.
    pub mod targets;
}
/// Components that decide what goes over the radio and when.
pub mod radio {
    /// Priority based selection of the next payload.
    pub mod arbiter;
    /// The periodic transmitter with automatic recovery.
    pub mod link;
}
/// Producers that turn raw sensor readings into payloads.
pub mod telemetry {
    /// Acceleration and orientation samples.
    pub mod attitude;
    /// GPS position fixes.
    pub mod position;
}
/// Components that run on the ground station host.
pub mod ground_station {
    /// The service wiring the mission, the link and the operator inputs.
    pub mod mission_control;
}

/// Helpful prelude when working with components.
pub mod prelude {
    pub use crate::components::ground_station::mission_control::*;
    pub use crate::components::mission::state_machine::*;
    pub use crate::components::mission::targets::*;
    pub use crate::components::radio::arbiter::*;
    pub use crate::components::radio::link::*;
    pub use crate::components::telemetry::attitude::*;
    pub use crate::components::telemetry::position::*;
}
