mod image;
mod schema;
mod types;

pub use image::{strip_data_url_prefix, ImagePayload};
pub use schema::response_schema;
pub use types::{CameraPlacement, CameraSummaryItem, MarkerCoordinates, SecurityAnalysis};
