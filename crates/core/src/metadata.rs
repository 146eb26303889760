use crate::config::MetadataKeys;
use crate::error::{MetadataField, SkipReason};
use crate::packet::read_xmp_packet;
use crate::sanitize::sanitize_component;
use crate::xmp_reader::find_property;
use chrono::{DateTime, NaiveDateTime};
use std::fmt;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIMESTAMP_WITH_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";
const CANONICAL_TIME_FORMAT: &str = "%Y-%m-%d.%H-%M-%S";

/// Fields pulled out of one file's XMP packet. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    pub captured_at: Option<NaiveDateTime>,
    pub device: Option<String>,
}

/// `<device>.<YYYY-MM-DD.HH-MM-SS>`, before any disambiguation suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalName(String);

impl CanonicalName {
    /// `None` when nothing of `device` survives sanitizing.
    pub fn new(device: &str, captured_at: &NaiveDateTime) -> Option<Self> {
        let device = sanitize_component(device);
        if device.is_empty() {
            return None;
        }
        Some(Self(format!(
            "{}.{}",
            device,
            captured_at.format(CANONICAL_TIME_FORMAT)
        )))
    }

    pub fn from_record(record: &MetadataRecord) -> Result<Self, SkipReason> {
        let captured_at = record
            .captured_at
            .as_ref()
            .ok_or(SkipReason::MissingField(MetadataField::CaptureTime))?;
        record
            .device
            .as_deref()
            .and_then(|device| Self::new(device, captured_at))
            .ok_or(SkipReason::MissingField(MetadataField::DeviceModel))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn extract_metadata(path: &Path, keys: &MetadataKeys) -> Result<MetadataRecord, SkipReason> {
    let packet = read_xmp_packet(path)
        .map_err(SkipReason::Unreadable)?
        .ok_or(SkipReason::MissingMetadata)?;
    parse_packet(&packet, keys)
}

pub fn parse_packet(packet: &str, keys: &MetadataKeys) -> Result<MetadataRecord, SkipReason> {
    let captured_at = find_property(packet, &keys.namespace, &keys.timestamp_field)
        .map(|raw| parse_timestamp(&raw))
        .transpose()?;
    let device = find_property(packet, &keys.namespace, &keys.device_field)
        .and_then(|raw| device_identifier(&raw, &keys.version_marker));

    Ok(MetadataRecord {
        captured_at,
        device,
    })
}

/// Parses `YYYY-MM-DDThh:mm:ss.ffffff`. The fraction is optional and a
/// trailing UTC offset is dropped, keeping the camera's wall-clock time.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, SkipReason> {
    let input = raw.trim();
    NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT)
        .or_else(|err| {
            DateTime::parse_from_str(input, TIMESTAMP_WITH_OFFSET_FORMAT)
                .or_else(|_| DateTime::parse_from_rfc3339(input))
                .map(|dt| dt.naive_local())
                .map_err(|_| err)
        })
        .map_err(|source| SkipReason::MalformedTimestamp {
            raw: raw.to_string(),
            source,
        })
}

/// `"NIKON D850 Ver.01.00"` becomes `"NIKON_D850"`.
pub fn device_identifier(creator_tool: &str, version_marker: &str) -> Option<String> {
    let trimmed = creator_tool.trim();
    let model = if version_marker.is_empty() {
        trimmed
    } else {
        trimmed.split(version_marker).next().unwrap_or_default()
    };
    let model = model.replace(' ', "_");
    if model.is_empty() {
        None
    } else {
        Some(model)
    }
}
