//! # FCB Record Decoder
//!
//! Decodes raw radio buffers into [`Record`]s.
//!
//! Layout of an FCB record (little-endian):
//!
//! ```text
//! [type][magic][version][serial][timestamp_ms:4][callsign:7] [payload ...] [radio][rssi][crc][lqi]
//! ```
//!
//! Ground-station GPS records carry no header and no trailer, only the type byte
//! followed by their fixed payload.

use thiserror::Error;

use super::protocol::*;

/// Errors produced while decoding a buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing to decode
    #[error("Empty buffer")]
    Empty,

    /// Buffer shorter than the record kind requires
    #[error("{kind} record too short: expected {expected} bytes, got {actual}")]
    TooShort {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    /// First byte is not a known record identifier
    #[error("Unknown message type {0}")]
    UnknownType(u8),

    /// CLI text is not valid UTF-8
    #[error("CLI text is not valid UTF-8")]
    InvalidUtf8,
}

/// Little-endian cursor over an already length-checked slice
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn i8(&mut self) -> i8 {
        self.u8() as i8
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f64 {
        f32::from_le_bytes(self.take()) as f64
    }

    fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }

    fn bytes(&mut self, n: usize) -> &'a [u8] {
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        out
    }
}

/// Decode the record at the start of `buffer`
///
/// Trailing bytes after a fixed-size record are ignored; use [`decode_one`] to
/// learn how many bytes the record occupied.
///
/// # Errors
///
/// Returns [`DecodeError`] if the buffer is empty, too short for its record kind,
/// starts with an unknown identifier, or carries non-UTF-8 CLI text.
///
/// # Examples
///
/// ```
/// use fcb_groundlink::fcb::decoder::{decode, DecodeError};
///
/// assert_eq!(decode(&[99, 0, 0]), Err(DecodeError::UnknownType(99)));
/// ```
pub fn decode(buffer: &[u8]) -> Result<Record, DecodeError> {
    decode_one(buffer).map(|(record, _)| record)
}

/// Decode the record at the start of `buffer`, returning it with its byte length
pub fn decode_one(buffer: &[u8]) -> Result<(Record, usize), DecodeError> {
    let id = *buffer.first().ok_or(DecodeError::Empty)?;
    let kind = MessageKind::from_id(id);

    match kind {
        MessageKind::Invalid => Err(DecodeError::UnknownType(id)),
        MessageKind::GroundStationGps => decode_ground_station_gps(buffer),
        MessageKind::CliData => decode_fcb(kind, buffer, buffer.len()),
        MessageKind::Orientation | MessageKind::PositionData | MessageKind::AltitudeInfo => {
            let payload = kind.payload_size().unwrap_or(0);
            decode_fcb(kind, buffer, HEADER_SIZE + payload + TRAILER_SIZE)
        }
    }
}

/// Records decoded from one read chunk
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChunk {
    pub records: Vec<Record>,
    /// Bytes consumed by `records`; everything after is discarded
    pub consumed: usize,
    pub error: Option<DecodeError>,
}

impl DecodedChunk {
    /// Number of trailing bytes that could not be decoded
    pub fn dropped(&self, chunk_len: usize) -> usize {
        chunk_len.saturating_sub(self.consumed)
    }
}

/// Decode every back-to-back record in a read chunk
///
/// Decoding stops at the first failure; the remainder of the chunk is discarded
/// and reported as a single error.
pub fn decode_all(chunk: &[u8]) -> DecodedChunk {
    let mut records = Vec::new();
    let mut consumed = 0;

    while consumed < chunk.len() {
        match decode_one(&chunk[consumed..]) {
            Ok((record, used)) => {
                records.push(record);
                consumed += used;
            }
            Err(e) => {
                return DecodedChunk { records, consumed, error: Some(e) };
            }
        }
    }

    DecodedChunk { records, consumed, error: None }
}

/// Decode header, payload and trailer of an FCB record spanning `total` bytes
fn decode_fcb(kind: MessageKind, buffer: &[u8], total: usize) -> Result<(Record, usize), DecodeError> {
    let minimum = total.max(HEADER_SIZE + TRAILER_SIZE);
    if buffer.len() < minimum {
        return Err(DecodeError::TooShort {
            kind,
            expected: minimum,
            actual: buffer.len(),
        });
    }

    let mut fields = FieldMap::new();
    let mut reader = ByteReader::new(&buffer[..total]);

    // Header
    let _id = reader.u8();
    let _magic = reader.u8();
    fields.insert("protocol_version".into(), reader.u8().into());
    fields.insert("serial_number".into(), reader.u8().into());
    fields.insert("fcb_timestamp_ms".into(), reader.u32().into());
    fields.insert("callsign".into(), parse_callsign(reader.bytes(CALLSIGN_SIZE)).into());

    // Payload
    let payload_len = total - HEADER_SIZE - TRAILER_SIZE;
    let mut payload = ByteReader::new(reader.bytes(payload_len));
    match kind {
        MessageKind::Orientation => decode_orientation(&mut payload, &mut fields),
        MessageKind::PositionData => decode_position_data(&mut payload, &mut fields),
        MessageKind::AltitudeInfo => decode_altitude_info(&mut payload, &mut fields),
        MessageKind::CliData => {
            let text = std::str::from_utf8(payload.bytes(payload_len))
                .map_err(|_| DecodeError::InvalidUtf8)?;
            fields.insert("cli_text".into(), text.into());
        }
        MessageKind::GroundStationGps | MessageKind::Invalid => {}
    }

    // Trailer
    let radio_id = reader.u8();
    let rssi = reader.i8();
    let crc_ok = reader.u8() != 0;
    let lqi = reader.u8();

    let record = Record {
        kind,
        fields,
        crc_ok,
        radio: Some(RadioMeta {
            radio_id,
            rssi: (rssi != RSSI_INVALID).then_some(rssi),
            lqi,
        }),
    };

    Ok((record, total))
}

fn decode_orientation(payload: &mut ByteReader<'_>, fields: &mut FieldMap) {
    insert_state(payload.u8(), fields);

    let w = payload.i8() as f64 / QUATERNION_SCALE;
    let x = payload.i8() as f64 / QUATERNION_SCALE;
    let y = payload.i8() as f64 / QUATERNION_SCALE;
    let z = payload.i8() as f64 / QUATERNION_SCALE;
    let (roll, pitch, yaw) = quaternion_to_euler(w, x, y, z);

    fields.insert("quaternion".into(), Value::Array(vec![w.into(), x.into(), y.into(), z.into()]));
    fields.insert("roll".into(), roll.into());
    fields.insert("pitch".into(), pitch.into());
    fields.insert("yaw".into(), yaw.into());

    for name in [
        "gyro_x", "gyro_y", "gyro_z", "accel_x", "accel_y", "accel_z", "mag_x", "mag_y", "mag_z",
    ] {
        fields.insert(name.into(), payload.f32().into());
    }
}

fn decode_position_data(payload: &mut ByteReader<'_>, fields: &mut FieldMap) {
    for name in [
        "temperature",
        "altitude",
        "vertical_speed",
        "latitude",
        "longitude",
        "gps_altitude",
        "battery_voltage",
    ] {
        fields.insert(name.into(), payload.f32().into());
    }
    fields.insert("ground_speed".into(), (payload.f32() * KNOTS_TO_MPS).into());
    fields.insert("course".into(), payload.f32().into());
    fields.insert("gps_time".into(), format_gps_time(payload.u32()).into());
    fields.insert("satellites".into(), payload.u8().into());
    fields.insert("pyro_continuity".into(), expand_pyro_mask(payload.u8()));
    insert_state(payload.u8(), fields);
    fields.insert("bluetooth_connected".into(), (payload.u8() != 0).into());
}

fn decode_altitude_info(payload: &mut ByteReader<'_>, fields: &mut FieldMap) {
    for name in [
        "pressure_1",
        "pressure_2",
        "reference_pressure",
        "ground_elevation",
        "ground_temperature",
        "main_deploy_altitude",
    ] {
        fields.insert(name.into(), payload.f32().into());
    }
}

fn decode_ground_station_gps(buffer: &[u8]) -> Result<(Record, usize), DecodeError> {
    let total = 1 + GROUND_STATION_GPS_PAYLOAD_SIZE;
    if buffer.len() < total {
        return Err(DecodeError::TooShort {
            kind: MessageKind::GroundStationGps,
            expected: total,
            actual: buffer.len(),
        });
    }

    let mut reader = ByteReader::new(&buffer[1..total]);
    let mut fields = FieldMap::new();
    fields.insert("gs_gps_valid".into(), (reader.u8() != 0).into());
    fields.insert("gs_altitude".into(), reader.f32().into());
    fields.insert("gs_pressure".into(), reader.f32().into());
    fields.insert("gs_temperature".into(), reader.f32().into());
    fields.insert("gs_latitude".into(), degrees_minutes_to_decimal(reader.f64()).into());
    fields.insert("gs_longitude".into(), degrees_minutes_to_decimal(reader.f64()).into());

    let record = Record {
        kind: MessageKind::GroundStationGps,
        fields,
        crc_ok: true,
        radio: None,
    };
    Ok((record, total))
}

fn insert_state(index: u8, fields: &mut FieldMap) {
    fields.insert("state_index".into(), index.into());
    fields.insert("state".into(), state_name(index).into());
}

/// Keep ASCII alphanumerics only, then trim
fn parse_callsign(raw: &[u8]) -> String {
    raw.iter()
        .filter(|b| b.is_ascii_alphanumeric() || **b == b' ')
        .map(|&b| b as char)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Expand the pyro continuity bitmask, bit N = channel N
fn expand_pyro_mask(mask: u8) -> Value {
    Value::Array(
        (0..NUM_PYRO_CHANNELS)
            .map(|ch| Value::Bool(mask & (1 << ch) != 0))
            .collect(),
    )
}

fn format_gps_time(epoch: u32) -> String {
    chrono::DateTime::from_timestamp(epoch as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| INVALID_STATE_NAME.to_string())
}

/// Convert a `DDDMM.mmmm` coordinate to decimal degrees
///
/// `sign(v) * (trunc(|v| / 100) + (|v| % 100) / 60)`
pub fn degrees_minutes_to_decimal(value: f64) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    let magnitude = value.abs();
    let degrees = (magnitude / 100.0).trunc();
    let minutes = magnitude % 100.0;
    value.signum() * (degrees + minutes / 60.0)
}

/// Convert a unit quaternion to (roll, pitch, yaw) in degrees
///
/// The pitch `asin` argument is clamped to [-1, 1] since scaled int8 components
/// are not exactly normalized.
pub fn quaternion_to_euler(w: f64, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
    let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
    (roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
}

#[cfg(test)]
pub(crate) mod test_frames {
    //! Builders for well-formed wire buffers, shared with the link tests.

    use super::*;

    pub fn header(id: u8) -> Vec<u8> {
        let mut buf = vec![id, 0xBE, 1, 7];
        buf.extend_from_slice(&123_456u32.to_le_bytes());
        buf.extend_from_slice(b"KD2ABC\0");
        buf
    }

    pub fn trailer(radio_id: u8, rssi: i8, crc_ok: bool) -> [u8; 4] {
        [radio_id, rssi as u8, crc_ok as u8, 87]
    }

    pub fn position_frame(lat: f32, lon: f32, radio_id: u8, crc_ok: bool) -> Vec<u8> {
        let mut buf = header(MSG_ID_POSITION_DATA);
        for v in [21.5f32, 1200.0, -3.5, lat, lon, 1210.0, 7.9, 10.0, 270.0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        buf.extend_from_slice(&[11, 0b0000_0101, 4, 1]);
        buf.extend_from_slice(&trailer(radio_id, -70, crc_ok));
        buf
    }

    pub fn orientation_frame(q: [i8; 4]) -> Vec<u8> {
        let mut buf = header(MSG_ID_ORIENTATION);
        buf.push(3);
        buf.extend(q.iter().map(|&c| c as u8));
        for i in 0..9 {
            buf.extend_from_slice(&(i as f32 * 0.5).to_le_bytes());
        }
        buf.extend_from_slice(&trailer(1, -60, true));
        buf
    }

    pub fn altitude_frame() -> Vec<u8> {
        let mut buf = header(MSG_ID_ALTITUDE_INFO);
        for v in [1013.0f32, 1012.5, 1013.25, 150.0, 18.0, 300.0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&trailer(1, RSSI_INVALID, false));
        buf
    }

    pub fn cli_frame(text: &str) -> Vec<u8> {
        let mut buf = header(MSG_ID_CLI_DATA);
        buf.extend_from_slice(text.as_bytes());
        buf.extend_from_slice(&trailer(1, -55, true));
        buf
    }

    pub fn ground_station_frame(lat_dm: f64, lon_dm: f64) -> Vec<u8> {
        let mut buf = vec![MSG_ID_GROUND_STATION_GPS, 1];
        for v in [95.0f32, 1009.0, 22.0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&lat_dm.to_le_bytes());
        buf.extend_from_slice(&lon_dm.to_le_bytes());
        buf
    }
}
