use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use vantage_contracts::analysis::{
    CameraPlacement, CameraSummaryItem, ImagePayload, MarkerCoordinates, SecurityAnalysis,
};
use vantage_contracts::errors::ServiceError;

use crate::analysis::{AnalysisProvider, AnalysisResponse};
use crate::imagery::{ImageSize, ImageryProvider};

/// Offline imagery: a flat "lot" with a lighter "roof" whose size follows the zoom.
pub struct DryrunImagery;

impl ImageryProvider for DryrunImagery {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn fetch_aerial_image(
        &self,
        address: &str,
        zoom: u8,
        size: ImageSize,
    ) -> Result<ImagePayload, ServiceError> {
        let size = size.clamped();
        let digest = address_digest(address);
        let ground = Rgb([digest[0] / 3, 80 + digest[1] / 4, digest[2] / 4]);
        let roof = Rgb([150 + digest[3] / 3, 140 + digest[4] / 4, 130 + digest[5] / 4]);

        let mut image = RgbImage::from_pixel(size.width, size.height, ground);
        // Each zoom step doubles the footprint; zoom 21 fills half the frame.
        let divisor = 1u32 << u32::from(21u8.saturating_sub(zoom).min(4));
        let roof_w = (size.width / 2 / divisor).max(1);
        let roof_h = (size.height / 2 / divisor).max(1);
        let left = (size.width - roof_w) / 2;
        let top = (size.height - roof_h) / 2;
        for y in top..top + roof_h {
            for x in left..left + roof_w {
                image.put_pixel(x, y, roof);
            }
        }

        let mut encoded = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(|err| ServiceError::imagery_fetch().with_detail(err.to_string()))?;
        Ok(ImagePayload::new("image/png", BASE64.encode(encoded)))
    }
}

const DRYRUN_SPOTS: &[(&str, &str, &str, f64, f64)] = &[
    ("Front door", "Covers the main entrance and the porch.", "Doorbell", 50.0, 62.0),
    ("Driveway corner", "Watches vehicles arriving from the street.", "Bullet", 70.0, 70.0),
    ("Rear garden wall", "Covers the back gate and garden path.", "Dome", 40.0, 32.0),
    ("Side passage", "Closes the blind spot between house and fence.", "Turret", 30.0, 55.0),
];

/// Offline analysis derived from a digest of the address.
pub struct DryrunAnalysis {
    model: String,
}

impl DryrunAnalysis {
    pub const DEFAULT_MODEL: &'static str = "dryrun-analysis-1";

    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

impl Default for DryrunAnalysis {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MODEL)
    }
}

impl AnalysisProvider for DryrunAnalysis {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn analyze(
        &self,
        address: &str,
        image: &ImagePayload,
    ) -> Result<AnalysisResponse, ServiceError> {
        if image.is_empty() {
            return Err(ServiceError::analysis().with_detail("dryrun received an empty image"));
        }
        let digest = address_digest(address);
        let count = 2 + usize::from(digest[0] % 3);
        let placements: Vec<CameraPlacement> = DRYRUN_SPOTS
            .iter()
            .take(count)
            .map(|(location, reason, camera_type, x, y)| CameraPlacement {
                location: (*location).to_string(),
                reason: (*reason).to_string(),
                camera_type: (*camera_type).to_string(),
                coordinates: MarkerCoordinates { x: *x, y: *y },
            })
            .collect();

        // Drawn from the digest, independent of the placements.
        let summary: Vec<CameraSummaryItem> = DRYRUN_TALLY
            .iter()
            .zip(&digest[6..])
            .map(|(camera_type, byte)| CameraSummaryItem {
                camera_type: (*camera_type).to_string(),
                quantity: 1 + u32::from(byte % 2),
            })
            .collect();

        let fingerprint = hex::encode(&digest[..4]);
        let analysis = SecurityAnalysis {
            overview: format!(
                "Offline assessment {fingerprint} for {address}: single dwelling with a front \
                 approach, a rear garden and one side passage."
            ),
            placements,
            camera_summary: Some(summary),
        };
        Ok(AnalysisResponse {
            analysis,
            provider_request: map_object(json!({
                "endpoint": "dryrun-native",
                "address": address,
                "mime_type": image.mime_type,
            })),
            provider_response: map_object(json!({"status": "ok", "model": self.model})),
            warnings: Vec::new(),
        })
    }
}

const DRYRUN_TALLY: &[&str] = &["Dome", "Bullet"];

fn address_digest(address: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(address.trim().to_ascii_lowercase().as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
