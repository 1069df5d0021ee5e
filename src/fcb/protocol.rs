//! # FCB Protocol Constants and Types
//!
//! Core protocol definitions for records exchanged with the flight-controller board.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// PositionData record identifier
pub const MSG_ID_POSITION_DATA: u8 = 2;

/// Orientation record identifier
pub const MSG_ID_ORIENTATION: u8 = 3;

/// AltitudeInfo record identifier
pub const MSG_ID_ALTITUDE_INFO: u8 = 4;

/// CliData record identifier
pub const MSG_ID_CLI_DATA: u8 = 5;

/// Ground-station GPS record identifier
pub const MSG_ID_GROUND_STATION_GPS: u8 = 200;

/// Header size: type(1) + magic(1) + version(1) + serial(1) + timestamp(4) + callsign(7)
pub const HEADER_SIZE: usize = 15;

/// Callsign width inside the header
pub const CALLSIGN_SIZE: usize = 7;

/// Trailer size: radio id(1) + rssi(1) + crc flag(1) + lqi(1)
pub const TRAILER_SIZE: usize = 4;

/// Orientation payload size
pub const ORIENTATION_PAYLOAD_SIZE: usize = 41;

/// PositionData payload size
pub const POSITION_DATA_PAYLOAD_SIZE: usize = 44;

/// AltitudeInfo payload size
pub const ALTITUDE_INFO_PAYLOAD_SIZE: usize = 24;

/// Ground-station GPS payload size (flag + 3 × f32 + 2 × f64)
pub const GROUND_STATION_GPS_PAYLOAD_SIZE: usize = 29;

/// Raw RSSI value reported when the radio has no measurement
pub const RSSI_INVALID: i8 = -128;

/// Number of pyro channels reported in the continuity bitmask
pub const NUM_PYRO_CHANNELS: usize = 4;

/// Knots to metres per second
pub const KNOTS_TO_MPS: f64 = 0.514444;

/// Quaternion components are sent as int8 scaled by 100
pub const QUATERNION_SCALE: f64 = 100.0;

/// Radio band switch command id
pub const CMD_RADIO_BAND_SWITCH: u8 = 1;

/// Radio band switch body length (command id + target radio + band)
pub const RADIO_BAND_SWITCH_LENGTH: u8 = 3;

/// Flight state names, indexed by the state byte
pub const STATE_NAMES: &[&str] = &[
    "Init",
    "Pre-flight",
    "Armed",
    "Powered Ascent",
    "Coast",
    "Drogue Descent",
    "Main Descent",
    "Landed",
];

/// Name used for out-of-table state indices
pub const INVALID_STATE_NAME: &str = "Invalid";

/// Look up a flight state name, never failing
pub fn state_name(index: u8) -> &'static str {
    STATE_NAMES
        .get(index as usize)
        .copied()
        .unwrap_or(INVALID_STATE_NAME)
}

/// Kind of record carried by a buffer, selected by its first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Orientation,
    PositionData,
    CliData,
    AltitudeInfo,
    GroundStationGps,
    Invalid,
}

impl MessageKind {
    /// Map a wire identifier to its kind (`Invalid` for anything unknown)
    pub fn from_id(id: u8) -> Self {
        match id {
            MSG_ID_ORIENTATION => Self::Orientation,
            MSG_ID_POSITION_DATA => Self::PositionData,
            MSG_ID_CLI_DATA => Self::CliData,
            MSG_ID_ALTITUDE_INFO => Self::AltitudeInfo,
            MSG_ID_GROUND_STATION_GPS => Self::GroundStationGps,
            _ => Self::Invalid,
        }
    }

    /// Wire identifier, `None` for `Invalid`
    pub fn id(self) -> Option<u8> {
        match self {
            Self::Orientation => Some(MSG_ID_ORIENTATION),
            Self::PositionData => Some(MSG_ID_POSITION_DATA),
            Self::CliData => Some(MSG_ID_CLI_DATA),
            Self::AltitudeInfo => Some(MSG_ID_ALTITUDE_INFO),
            Self::GroundStationGps => Some(MSG_ID_GROUND_STATION_GPS),
            Self::Invalid => None,
        }
    }

    /// Fixed payload size, `None` for variable-length kinds
    pub fn payload_size(self) -> Option<usize> {
        match self {
            Self::Orientation => Some(ORIENTATION_PAYLOAD_SIZE),
            Self::PositionData => Some(POSITION_DATA_PAYLOAD_SIZE),
            Self::AltitudeInfo => Some(ALTITUDE_INFO_PAYLOAD_SIZE),
            Self::GroundStationGps => Some(GROUND_STATION_GPS_PAYLOAD_SIZE),
            Self::CliData | Self::Invalid => None,
        }
    }

    /// Whether the record originates from the ground station rather than the vehicle
    pub fn is_ground_station(self) -> bool {
        matches!(self, Self::GroundStationGps)
    }

    /// Name written to the parsed log
    pub fn name(self) -> &'static str {
        match self {
            Self::Orientation => "Orientation",
            Self::PositionData => "PositionData",
            Self::CliData => "CliData",
            Self::AltitudeInfo => "AltitudeInfo",
            Self::GroundStationGps => "GroundStationGps",
            Self::Invalid => "Invalid",
        }
    }

    /// Inverse of [`MessageKind::name`]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Orientation" => Self::Orientation,
            "PositionData" => Self::PositionData,
            "CliData" => Self::CliData,
            "AltitudeInfo" => Self::AltitudeInfo,
            "GroundStationGps" => Self::GroundStationGps,
            _ => Self::Invalid,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single telemetry field value
///
/// Serialized untagged so the parsed log stays plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Numeric view of the value (ints widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

/// Field name → value mapping of a decoded record
pub type FieldMap = BTreeMap<String, Value>;

/// Radio metadata appended to every FCB record by the relay radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioMeta {
    /// Radio that received the record
    pub radio_id: u8,

    /// Signal strength in dBm, `None` when the radio reported the invalid sentinel
    pub rssi: Option<i8>,

    /// Link quality indicator
    pub lqi: u8,
}

/// A decoded record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record kind
    pub kind: MessageKind,

    /// Decoded fields
    pub fields: FieldMap,

    /// CRC flag reported by the radio layer
    pub crc_ok: bool,

    /// Radio metadata, `None` for ground-station-origin records
    pub radio: Option<RadioMeta>,
}

impl Record {
    /// Fields plus radio metadata, as merged into the telemetry store
    pub fn store_fields(&self) -> FieldMap {
        let mut fields = self.fields.clone();
        if let Some(radio) = self.radio {
            fields.insert("radio_id".to_string(), radio.radio_id.into());
            fields.insert(
                "rssi".to_string(),
                radio.rssi.map_or(Value::Int(RSSI_INVALID as i64), |r| Value::Int(r as i64)),
            );
            fields.insert("lqi".to_string(), radio.lqi.into());
            fields.insert("crc_ok".to_string(), self.crc_ok.into());
        }
        fields
    }

    /// Coordinate pair carried by the record, if any
    pub fn position(&self) -> Option<(f64, f64)> {
        let (lat_key, lon_key) = self.position_keys()?;
        let lat = self.fields.get(lat_key)?.as_f64()?;
        let lon = self.fields.get(lon_key)?.as_f64()?;
        Some((lat, lon))
    }

    /// Replace the coordinate pair (used after GPS filtering)
    pub fn set_position(&mut self, lat: f64, lon: f64) {
        if let Some((lat_key, lon_key)) = self.position_keys() {
            self.fields.insert(lat_key.to_string(), Value::Float(lat));
            self.fields.insert(lon_key.to_string(), Value::Float(lon));
        }
    }

    fn position_keys(&self) -> Option<(&'static str, &'static str)> {
        match self.kind {
            MessageKind::PositionData => Some(("latitude", "longitude")),
            MessageKind::GroundStationGps => Some(("gs_latitude", "gs_longitude")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_roundtrip() {
        for kind in [
            MessageKind::Orientation,
            MessageKind::PositionData,
            MessageKind::CliData,
            MessageKind::AltitudeInfo,
            MessageKind::GroundStationGps,
        ] {
            let id = kind.id().unwrap();
            assert_eq!(MessageKind::from_id(id), kind);
            assert_eq!(MessageKind::from_name(kind.name()), kind);
        }
        assert_eq!(MessageKind::from_id(99), MessageKind::Invalid);
        assert_eq!(MessageKind::Invalid.id(), None);
    }

    #[test]
    fn test_state_name_lookup() {
        assert_eq!(state_name(0), "Init");
        assert_eq!(state_name(7), "Landed");
        assert_eq!(state_name(8), INVALID_STATE_NAME);
        assert_eq!(state_name(255), INVALID_STATE_NAME);
    }

    #[test]
    fn test_only_ground_station_gps_is_ground_origin() {
        assert!(MessageKind::GroundStationGps.is_ground_station());
        assert!(!MessageKind::PositionData.is_ground_station());
        assert!(!MessageKind::CliData.is_ground_station());
    }

    #[test]
    fn test_value_json_untagged() {
        let mut map = FieldMap::new();
        map.insert("alt".to_string(), Value::Float(12.5));
        map.insert("sats".to_string(), Value::Int(9));
        map.insert("armed".to_string(), Value::Bool(true));
        map.insert("state".to_string(), Value::from("Coast"));
        map.insert(
            "pyro".to_string(),
            Value::Array(vec![Value::Bool(true), Value::Bool(false)]),
        );

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"alt":12.5,"armed":true,"pyro":[true,false],"sats":9,"state":"Coast"}"#
        );

        let back: FieldMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_store_fields_include_radio_meta() {
        let record = Record {
            kind: MessageKind::AltitudeInfo,
            fields: FieldMap::new(),
            crc_ok: false,
            radio: Some(RadioMeta { radio_id: 1, rssi: None, lqi: 40 }),
        };
        let fields = record.store_fields();
        assert_eq!(fields["radio_id"], Value::Int(1));
        assert_eq!(fields["rssi"], Value::Int(-128));
        assert_eq!(fields["lqi"], Value::Int(40));
        assert_eq!(fields["crc_ok"], Value::Bool(false));
    }

    #[test]
    fn test_set_position_only_for_position_kinds() {
        let mut record = Record {
            kind: MessageKind::Orientation,
            fields: FieldMap::new(),
            crc_ok: true,
            radio: None,
        };
        record.set_position(1.0, 2.0);
        assert!(record.fields.is_empty());
        assert_eq!(record.position(), None);

        record.kind = MessageKind::GroundStationGps;
        record.set_position(1.0, 2.0);
        assert_eq!(record.position(), Some((1.0, 2.0)));
    }
}
