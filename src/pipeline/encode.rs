//! Image encoding: inbound payload → base64 `ImageData` for the vision API.
//!
//! HTTP clients send the image as base64, often as a browser data URL
//! (`data:image/png;base64,...`). The prefix is stripped and the payload is
//! re-labelled as `image/jpeg`, so a prefixed and an unprefixed payload
//! produce byte-identical vision requests. The declared MIME type is never
//! validated; vision APIs sniff the real format from the bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// MIME type attached to every forwarded image.
pub const FORWARDED_MIME: &str = "image/jpeg";

/// Return the base64 payload of `image`, dropping a `data:image/...` prefix.
///
/// Everything up to and including the first comma is removed. A string that
/// starts with `data:image/` but has no comma is returned unchanged.
pub fn strip_data_url(image: &str) -> &str {
    if image.starts_with("data:image/") {
        if let Some((_, payload)) = image.split_once(',') {
            return payload;
        }
    }
    image
}

/// Wrap an inbound image (optionally data-URL prefixed) for the vision API.
///
/// `detail: "high"` lets GPT-4-class models tile the image so small print on
/// shipping labels stays legible.
pub fn encode_image(image: &str) -> ImageData {
    let payload = strip_data_url(image);
    debug!("Forwarding image → {} bytes base64", payload.len());
    ImageData::new(payload.to_string(), FORWARDED_MIME).with_detail("high")
}

/// Base64-encode raw image bytes (CLI input read from disk).
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8/5+hHgAHggJ/PchI7wAAAABJRU5ErkJggg==";

    #[test]
    fn strips_png_data_url() {
        let prefixed = format!("data:image/png;base64,{PIXEL}");
        assert_eq!(strip_data_url(&prefixed), PIXEL);
    }

    #[test]
    fn plain_payload_is_untouched() {
        assert_eq!(strip_data_url(PIXEL), PIXEL);
    }

    #[test]
    fn only_first_comma_is_consumed() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,AA,BB"), "AA,BB");
    }

    #[test]
    fn prefix_without_comma_is_kept() {
        assert_eq!(strip_data_url("data:image/png"), "data:image/png");
    }

    #[test]
    fn non_image_data_url_is_not_stripped() {
        let s = "data:text/plain;base64,SGVsbG8=";
        assert_eq!(strip_data_url(s), s);
    }

    #[test]
    fn prefixed_and_plain_payloads_encode_identically() {
        let a = encode_image(&format!("data:image/png;base64,{PIXEL}"));
        let b = encode_image(PIXEL);
        assert_eq!(a, b);
        assert_eq!(a.mime_type, FORWARDED_MIME);
        assert_eq!(a.detail.as_deref(), Some("high"));
    }

    #[test]
    fn encode_bytes_round_trips() {
        let b64 = encode_bytes(&[0xFF, 0xD8, 0xFF]);
        assert_eq!(STANDARD.decode(b64).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }
}
