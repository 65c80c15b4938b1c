//! Instruction prompt sent alongside every image.
//!
//! Kept in one place so tests can inspect it and so callers can see exactly
//! what the model is asked for. Override it via
//! [`crate::config::PipelineConfig::prompt`].

/// Default extraction instruction.
///
/// The reply is parsed strictly as a JSON array of strings, so the prompt
/// insists on "no other text".
pub const DEFAULT_EXTRACTION_PROMPT: &str = "Extract all delivery addresses from this image. \
Return only a JSON array of address strings, no other text. \
Each address should be a complete street address including street number, street name, \
city, state/province, and postal code when visible. \
If no addresses are found, return an empty array.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_demands_bare_json_array() {
        assert!(DEFAULT_EXTRACTION_PROMPT.contains("JSON array"));
        assert!(DEFAULT_EXTRACTION_PROMPT.contains("no other text"));
        assert!(DEFAULT_EXTRACTION_PROMPT.contains("empty array"));
    }
}
