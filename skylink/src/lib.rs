/**
The skylink ground station coordinates a search and rescue drone mission over a
low bandwidth radio link. Following the same component pattern as the rest of the
control software, functionality is split into small units: the mission lifecycle,
the payload arbiter that decides what the radio sends next, and the radio link
worker that drains the arbiter at a fixed cadence and recovers from transport
failures on its own.
*/

/// Components in the system are created by grouping together
/// devices and messages into a logical unit that performs some
/// function for the ground station.
pub mod components;
/// Devices that are an atomic unit, in this case the transports
/// that carry bytes to the aircraft.
pub mod devices;
/// Error types shared between components.
pub mod error;
/// Message structure for communication into and out of the
/// ground station, both the binary radio payloads and the
/// JSON control messages.
pub mod messages;
/// Development utilities for configuration files and tests.
pub mod utils;
