/// Binary payloads that are sent to the aircraft over the radio link.
pub mod radio {
    /// Fixed size encoding of the payloads.
    pub mod codec;
    /// The payload variants themselves.
    pub mod payload;
}

/// Messages coming into the ground station from operators and
/// from other processes on the host.
pub mod control {
    /// Station messages are newline delimited JSON. They carry
    /// mission commands, sensor readings and setting changes.
    pub mod station;
}
