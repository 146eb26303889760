use exif::{Context, In, Reader, Tag, Value};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use tracing::debug;

/// TIFF `XMLPacket`, where TIFF-based raw formats (NEF, DNG, ...) keep XMP.
pub const XML_PACKET_TAG: Tag = Tag(Context::Tiff, 700);

const PACKET_OPEN: &[u8] = b"<x:xmpmeta";
const PACKET_CLOSE: &[u8] = b"</x:xmpmeta>";

/// Returns the embedded XMP packet of an image file, if it carries one.
///
/// The container's `XMLPacket` tag is consulted first; files the EXIF reader
/// cannot parse (or that keep XMP elsewhere) are scanned for a raw
/// `x:xmpmeta` block instead.
pub fn read_xmp_packet(path: &Path) -> io::Result<Option<String>> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);

    match Reader::new().read_from_container(&mut buf) {
        Ok(exif) => {
            if let Some(field) = exif.get_field(XML_PACKET_TAG, In::PRIMARY) {
                if let Some(packet) = value_bytes(&field.value).and_then(decode_packet) {
                    return Ok(Some(packet));
                }
            }
        }
        Err(err) => {
            debug!("no EXIF container in {}: {err}", path.display());
        }
    }

    let bytes = fs::read(path)?;
    Ok(find_packet(&bytes).and_then(decode_packet))
}

fn value_bytes(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Byte(bytes) | Value::Undefined(bytes, _) => Some(bytes.as_slice()),
        Value::Ascii(chunks) => chunks.first().map(Vec::as_slice),
        _ => None,
    }
}

fn decode_packet(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn find_packet(bytes: &[u8]) -> Option<&[u8]> {
    let start = find_subslice(bytes, PACKET_OPEN)?;
    let end = find_subslice(&bytes[start..], PACKET_CLOSE)? + start + PACKET_CLOSE.len();
    Some(&bytes[start..end])
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
