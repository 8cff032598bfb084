use crate::messages::radio::payload::{AttitudeSample, Payload, PositionFix};
use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::const_assert_eq;
use tokio_util::codec::Encoder;

/// A command is a single magic byte.
pub const COMMAND_PAYLOAD_LEN: usize = 1;
/// Six floats followed by a null byte.
pub const POSITION_PAYLOAD_LEN: usize = 6 * FLOAT_LEN + 1;
/// Three acceleration floats followed by four quaternion floats.
pub const ATTITUDE_PAYLOAD_LEN: usize = 7 * FLOAT_LEN;

const FLOAT_LEN: usize = std::mem::size_of::<f32>();

// The onboard decoder reads fixed offsets.
const_assert_eq!(POSITION_PAYLOAD_LEN, 25);
const_assert_eq!(ATTITUDE_PAYLOAD_LEN, 28);

/// Encodes payloads into the fixed size buffers understood by the onboard
/// computer. Floats are big endian IEEE-754 single precision. There are no
/// length prefixes or checksums, the vendor link already frames the bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PayloadCodec;

impl PayloadCodec {
    /// Encode a single payload into its own buffer.
    pub fn encode_payload(payload: &Payload) -> Bytes {
        let mut buffer = BytesMut::with_capacity(payload.encoded_len());
        write_payload(payload, &mut buffer);
        buffer.freeze()
    }
}

impl Encoder<Payload> for PayloadCodec {
    type Error = std::io::Error;

    fn encode(&mut self, payload: Payload, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(payload.encoded_len());
        write_payload(&payload, dst);
        Ok(())
    }
}

fn write_payload(payload: &Payload, dst: &mut BytesMut) {
    match payload {
        Payload::Command(command) => dst.put_u8(command.magic()),
        Payload::Position(fix) => write_position(fix, dst),
        Payload::Attitude(sample) => write_attitude(sample, dst),
    }
}

// [ 0 - 3 ] latitude, [ 4 - 7 ] longitude, [ 8 - 11 ] altitude,
// [ 12 - 15 ] bearing, [ 16 - 19 ] accuracy, [ 20 - 23 ] speed, [ 24 ] null
#[allow(clippy::cast_possible_truncation)]
fn write_position(fix: &PositionFix, dst: &mut BytesMut) {
    dst.put_f32(fix.latitude as f32);
    dst.put_f32(fix.longitude as f32);
    dst.put_f32(fix.altitude.unwrap_or_default() as f32);
    dst.put_f32(fix.bearing.unwrap_or_default());
    dst.put_f32(fix.accuracy.unwrap_or_default());
    dst.put_f32(fix.speed.unwrap_or_default());
    dst.put_u8(0x0);
}

// [ 0 - 11 ] acceleration x, y, z, [ 12 - 27 ] quaternion x, y, z, w
fn write_attitude(sample: &AttitudeSample, dst: &mut BytesMut) {
    for value in sample.acceleration.iter().chain(sample.orientation.iter()) {
        dst.put_f32(*value);
    }
}
