//! Pairing code rendering
//!
//! The transport hands us an opaque one-time pairing payload. Subscribers
//! need something a phone camera can scan, so the payload is encoded as a
//! QR matrix, rasterised to a PNG and shipped as a data URI.

use std::io::Cursor;

use base64ct::{Base64, Encoding};
use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::error::PairingError;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// A scannable pairing image, serialized as a `data:image/png` URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingArtifact {
    data_uri: String,
}

impl PairingArtifact {
    fn from_png(png: &[u8]) -> Self {
        Self {
            data_uri: format!("{DATA_URI_PREFIX}{}", Base64::encode_string(png)),
        }
    }

    pub fn as_data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Decode the PNG bytes back out of the data URI
    pub fn png_bytes(&self) -> Option<Vec<u8>> {
        let encoded = self.data_uri.strip_prefix(DATA_URI_PREFIX)?;
        Base64::decode_vec(encoded).ok()
    }
}

/// Renders pairing payloads as QR code images
///
/// Error correction level and colours are fixed so the same payload always
/// produces the same image.
#[derive(Debug, Clone)]
pub struct PairingCodeEncoder {
    ec_level: EcLevel,
    min_dimension: u32,
}

impl Default for PairingCodeEncoder {
    fn default() -> Self {
        Self {
            ec_level: EcLevel::M,
            min_dimension: 256,
        }
    }
}

impl PairingCodeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&self, payload: &[u8]) -> Result<PairingArtifact, PairingError> {
        if payload.is_empty() {
            return Err(PairingError::EmptyPayload);
        }

        let code = QrCode::with_error_correction_level(payload, self.ec_level)
            .map_err(|e| PairingError::Encode(e.to_string()))?;

        let image = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .min_dimensions(self.min_dimension, self.min_dimension)
            .dark_color(Luma([0u8]))
            .light_color(Luma([255u8]))
            .build();

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| PairingError::Render(e.to_string()))?;

        Ok(PairingArtifact::from_png(&png))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn encode_produces_png_data_uri() {
        let artifact = PairingCodeEncoder::new().encode(b"XYZ").unwrap();

        assert!(artifact.as_data_uri().starts_with("data:image/png;base64,"));
        let png = artifact.png_bytes().unwrap();
        assert_eq!(&png[..8], &PNG_MAGIC);
    }

    #[test]
    fn encode_is_deterministic() {
        let encoder = PairingCodeEncoder::new();
        let first = encoder.encode(b"2@abc,def,ghi").unwrap();
        let second = encoder.encode(b"2@abc,def,ghi").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn different_payloads_produce_different_images() {
        let encoder = PairingCodeEncoder::new();
        let a = encoder.encode(b"payload-a").unwrap();
        let b = encoder.encode(b"payload-b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_payload_is_rejected() {
        let result = PairingCodeEncoder::new().encode(b"");
        assert!(matches!(result, Err(PairingError::EmptyPayload)));
    }

    #[test]
    fn oversized_payload_fails_to_encode() {
        let payload = vec![b'x'; 4096];
        let result = PairingCodeEncoder::new().encode(&payload);
        assert!(matches!(result, Err(PairingError::Encode(_))));
    }

    #[test]
    fn artifact_serializes_as_bare_string() {
        let artifact = PairingCodeEncoder::new().encode(b"XYZ").unwrap();
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json.as_str(), Some(artifact.as_data_uri()));
    }
}
