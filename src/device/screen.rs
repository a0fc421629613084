//! Screen size discovery from screenshots and `wm size` output.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::sync::LazyLock;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

static OVERRIDE_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Override size:\s*(\d+)x(\d+)").expect("Invalid override size regex")
});
static PHYSICAL_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Physical size:\s*(\d+)x(\d+)").expect("Invalid physical size regex")
});

/// Width and height from the IHDR chunk of a base64 PNG.
///
/// Returns `None` for anything that is not a well-formed PNG header.
pub fn png_size(screenshot_b64: &str) -> Option<(i64, i64)> {
    if screenshot_b64.is_empty() {
        return None;
    }
    let bytes = STANDARD.decode(screenshot_b64.trim()).ok()?;
    if bytes.len() < 24 || &bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    if width == 0 || height == 0 {
        return None;
    }
    Some((i64::from(width), i64::from(height)))
}

/// Parse `adb shell wm size` output. An override size wins over the physical one.
pub fn parse_wm_size(output: &str) -> Option<(i64, i64)> {
    let caps = OVERRIDE_SIZE
        .captures(output)
        .or_else(|| PHYSICAL_SIZE.captures(output))?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some((width, height))
}

#[cfg(test)]
pub(crate) fn png_header_b64(width: u32, height: u32) -> String {
    let mut bytes = PNG_SIGNATURE.to_vec();
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    STANDARD.encode(bytes)
}
