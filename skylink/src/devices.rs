/// Devices that carry bytes between the ground station and the aircraft.
/// Their core responsibility does not change with the mission, they only
/// move bytes and report whether that worked.
pub mod radio {
    /// Contract every transport towards the aircraft implements.
    pub mod transport;
    /// Datagram transport towards an onboard bridge.
    pub mod udp;
}
