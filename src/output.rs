//! Request and response types shared by the pipeline, the HTTP API and the CLI.

use serde::{Deserialize, Serialize};

/// One extracted address and, when geocoding succeeded, its standardized form
/// and coordinates.
///
/// A *degraded* record (geocoding failed) carries `standardized == original`
/// and zero coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub original: String,
    pub standardized: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl AddressRecord {
    /// Build the record substituted for an address the geocoder could not
    /// resolve.
    pub fn degraded(original: impl Into<String>) -> Self {
        let original = original.into();
        Self {
            standardized: original.clone(),
            original,
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    /// Build a record from the geocoder's chosen candidate.
    pub fn from_match(original: impl Into<String>, m: GeocodeMatch) -> Self {
        Self {
            original: original.into(),
            standardized: m.standardized_address,
            latitude: m.latitude,
            longitude: m.longitude,
        }
    }

    /// `true` when this record was synthesized after a geocoding failure.
    pub fn is_degraded(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0 && self.standardized == self.original
    }
}

/// The top candidate returned by the geocoder for a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub standardized_address: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// Body of `POST /v1/addresses`.
///
/// `image` is base64, optionally prefixed with `data:image/...;base64,`.
/// A missing key decodes as the empty string so it hits the same
/// "Image is required" path as an explicit `""`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionRequest {
    #[serde(default)]
    pub image: String,
}

/// Body of `PUT /v1/geocode-address`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocodeRequest {
    #[serde(default)]
    pub address: String,
}

/// Response of `POST /v1/addresses`, also used for every JSON error body.
///
/// Exactly one of the two fields is present on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn success(addresses: Vec<AddressRecord>) -> Self {
        Self {
            addresses: Some(addresses),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            addresses: None,
            error: Some(message.into()),
        }
    }
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    /// Records in the order the model listed the addresses.
    pub addresses: Vec<AddressRecord>,
    pub stats: PipelineStats,
}

/// Counters and timings for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    /// Addresses returned by the vision model.
    pub extracted: usize,
    /// Addresses the geocoder resolved.
    pub resolved: usize,
    /// Addresses that fell back to a degraded record.
    pub degraded: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub extraction_ms: u64,
    pub resolution_ms: u64,
    pub total_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_record_mirrors_original() {
        let r = AddressRecord::degraded("12 Nowhere Rd");
        assert_eq!(r.original, "12 Nowhere Rd");
        assert_eq!(r.standardized, "12 Nowhere Rd");
        assert_eq!(r.latitude, 0.0);
        assert_eq!(r.longitude, 0.0);
        assert!(r.is_degraded());
    }

    #[test]
    fn record_serialises_with_four_keys() {
        let r = AddressRecord::from_match(
            "1600 Pennsylvania Ave NW, Washington, DC 20500",
            GeocodeMatch {
                standardized_address: "1600 PENNSYLVANIA AVE NW, WASHINGTON, DC, 20500".into(),
                longitude: -77.0365,
                latitude: 38.8977,
            },
        );
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v.as_object().unwrap().len(), 4);
        assert_eq!(v["latitude"], 38.8977);
        assert_eq!(v["longitude"], -77.0365);
        assert!(!r.is_degraded());
    }

    #[test]
    fn success_envelope_omits_error() {
        let json = serde_json::to_string(&ResponseEnvelope::success(vec![])).unwrap();
        assert_eq!(json, r#"{"addresses":[]}"#);
    }

    #[test]
    fn failure_envelope_omits_addresses() {
        let json = serde_json::to_string(&ResponseEnvelope::failure("Image is required")).unwrap();
        assert_eq!(json, r#"{"error":"Image is required"}"#);
    }

    #[test]
    fn missing_image_key_decodes_as_empty() {
        let req: ExtractionRequest = serde_json::from_str("{}").unwrap();
        assert!(req.image.is_empty());
    }
}
