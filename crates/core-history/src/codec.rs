//! One history record per line: standard base64 of the trimmed value.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub fn encode_record(value: &str) -> String {
    STANDARD.encode(value.trim())
}

/// Decode one line. `None` for blank lines, malformed base64 or non-UTF-8.
pub fn decode_record(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let bytes = STANDARD.decode(line).ok()?;
    String::from_utf8(bytes).ok()
}
