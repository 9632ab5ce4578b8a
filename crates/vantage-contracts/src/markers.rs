use crate::analysis::MarkerCoordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl MarkerColor {
    const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

pub const MARKER_PALETTE: [MarkerColor; 6] = [
    MarkerColor::rgb(0xEF, 0x44, 0x44),
    MarkerColor::rgb(0x3B, 0x82, 0xF6),
    MarkerColor::rgb(0x10, 0xB9, 0x81),
    MarkerColor::rgb(0xF5, 0x9E, 0x0B),
    MarkerColor::rgb(0x8B, 0x5C, 0xF6),
    MarkerColor::rgb(0xEC, 0x48, 0x99),
];

/// Colour for the marker of placement `index`. Both the overlay raster and the
/// exported report go through here.
pub fn marker_color(index: usize) -> MarkerColor {
    MARKER_PALETTE[index % MARKER_PALETTE.len()]
}

pub fn marker_label(index: usize) -> String {
    (index + 1).to_string()
}

/// Pixel centre of a marker on a `width` x `height` image.
pub fn marker_pixel(coordinates: &MarkerCoordinates, width: u32, height: u32) -> (i64, i64) {
    let clamped = coordinates.clamped();
    let x = (clamped.x / 100.0 * f64::from(width)).round() as i64;
    let y = (clamped.y / 100.0 * f64::from(height)).round() as i64;
    (
        x.min(i64::from(width.saturating_sub(1))),
        y.min(i64::from(height.saturating_sub(1))),
    )
}
