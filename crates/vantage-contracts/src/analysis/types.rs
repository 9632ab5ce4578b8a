use serde::{Deserialize, Serialize};

/// Marker position as percentages of the image, measured from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerCoordinates {
    pub x: f64,
    pub y: f64,
}

impl MarkerCoordinates {
    pub fn clamped(&self) -> Self {
        Self {
            x: clamp_percent(self.x),
            y: clamp_percent(self.y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPlacement {
    pub location: String,
    pub reason: String,
    pub camera_type: String,
    pub coordinates: MarkerCoordinates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSummaryItem {
    pub camera_type: String,
    pub quantity: u32,
}

/// Recommendation returned by the analysis model.
///
/// `camera_summary` is whatever tally the model produced; it is never derived
/// from or reconciled against `placements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAnalysis {
    pub overview: String,
    pub placements: Vec<CameraPlacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_summary: Option<Vec<CameraSummaryItem>>,
}

impl SecurityAnalysis {
    pub fn placement(&self, index: usize) -> Option<&CameraPlacement> {
        self.placements.get(index)
    }

    pub fn summary_items(&self) -> &[CameraSummaryItem] {
        self.camera_summary.as_deref().unwrap_or_default()
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
