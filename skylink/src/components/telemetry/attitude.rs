use crate::{
    components::radio::link::PayloadSink,
    messages::radio::payload::{AttitudeSample, Payload},
};
use log::debug;

/// A single reading from one of the motion sensors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SensorReading {
    /// Accelerometer, x, y and z in m/s^2.
    Acceleration([f32; 3]),
    /// Rotation vector as a quaternion x, y, z, w.
    Orientation([f32; 4]),
}

/// Merges accelerometer and rotation readings into attitude samples and
/// forwards every new sample to the radio link. The two sensors report
/// independently, each sample keeps the last value of the other one.
#[derive(Default)]
pub struct AttitudeSource {
    sample: AttitudeSample,
    sink: Option<PayloadSink>,
}

impl AttitudeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or detach the radio link.
    ///
    /// * `sink`: payload sink of the link, `None` stops forwarding.
    pub fn set_sink(&mut self, sink: Option<PayloadSink>) {
        self.sink = sink;
    }

    /// Merge a reading into the current sample and forward the result.
    ///
    /// * `reading`: new sensor value.
    pub fn on_reading(&mut self, reading: SensorReading) {
        self.sample = match reading {
            SensorReading::Acceleration(values) => self.sample.with_acceleration(values),
            SensorReading::Orientation(values) => self.sample.with_orientation(values),
        };

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.submit(Payload::Attitude(self.sample)) {
                debug!("Dropped attitude sample {e}");
            }
        }
    }

    /// The current merged sample.
    pub fn sample(&self) -> AttitudeSample {
        self.sample
    }
}
