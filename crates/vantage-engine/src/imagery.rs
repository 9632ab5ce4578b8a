use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;
use vantage_contracts::analysis::{strip_data_url_prefix, ImagePayload};
use vantage_contracts::errors::ServiceError;
use vantage_contracts::workflow::clamp_zoom;

use crate::config::EngineConfig;
use crate::http::{error_chain_text, response_json_or_error, truncate_text};

const MAX_STATIC_MAP_SIDE: u32 = 640;
const ERROR_DETAIL_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn clamped(self) -> Self {
        Self {
            width: self.width.clamp(1, MAX_STATIC_MAP_SIDE),
            height: self.height.clamp(1, MAX_STATIC_MAP_SIDE),
        }
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::new(MAX_STATIC_MAP_SIDE, MAX_STATIC_MAP_SIDE)
    }
}

pub trait ImageryProvider: Send + Sync {
    fn name(&self) -> &str;
    fn fetch_aerial_image(
        &self,
        address: &str,
        zoom: u8,
        size: ImageSize,
    ) -> Result<ImagePayload, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageryEndpoints {
    pub geocode_url: String,
    pub static_map_url: String,
}

impl ImageryEndpoints {
    pub fn from_base(api_base: &str) -> Self {
        let base = api_base.trim().trim_end_matches('/');
        Self {
            geocode_url: format!("{base}/geocode/json"),
            static_map_url: format!("{base}/staticmap"),
        }
    }
}

/// Geocodes an address and downloads a satellite tile centred on it.
///
/// Every call issues both requests; nothing is memoised between zoom levels.
pub struct MapsImageryClient {
    endpoints: ImageryEndpoints,
    api_key: Option<String>,
    http: HttpClient,
}

impl MapsImageryClient {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_http(
            ImageryEndpoints::from_base(&config.maps_api_base),
            config.maps_api_key.clone(),
            HttpClient::new(),
        )
    }

    pub fn with_http(
        endpoints: ImageryEndpoints,
        api_key: Option<String>,
        http: HttpClient,
    ) -> Self {
        Self {
            endpoints,
            api_key: api_key
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            http,
        }
    }

    fn geocode(&self, address: &str, api_key: &str) -> Result<Coordinate, ServiceError> {
        let payload = self
            .http
            .get(&self.endpoints.geocode_url)
            .query(&[("address", address), ("key", api_key)])
            .send()
            .context("Geocoding request failed")
            .and_then(|response| response_json_or_error("Geocoding", response))
            .map_err(|err| {
                ServiceError::geocode_transport()
                    .with_detail(error_chain_text(&err, ERROR_DETAIL_MAX_CHARS))
            })?;
        parse_geocode_response(&payload)
    }

    fn fetch_static_image(&self, url: Url) -> Result<ImagePayload, ServiceError> {
        self.download_image(url).map_err(|err| {
            ServiceError::imagery_fetch().with_detail(error_chain_text(&err, ERROR_DETAIL_MAX_CHARS))
        })
    }

    fn download_image(&self, url: Url) -> Result<ImagePayload> {
        let response = self
            .http
            .get(url)
            .send()
            .context("Static map request failed")?;
        let status = response.status();
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or_default().trim().to_string())
            .unwrap_or_else(|| "image/png".to_string());
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "Static map request failed ({}): {}",
                status.as_u16(),
                truncate_text(&body, ERROR_DETAIL_MAX_CHARS)
            );
        }
        if !mime_type.starts_with("image/") {
            bail!("Static map returned {mime_type} instead of an image");
        }
        let bytes = response
            .bytes()
            .context("Static map response body read failed")?;
        if bytes.is_empty() {
            bail!("Static map returned an empty image");
        }
        Ok(ImagePayload::new(mime_type, BASE64.encode(&bytes)))
    }
}

impl ImageryProvider for MapsImageryClient {
    fn name(&self) -> &str {
        "maps"
    }

    fn fetch_aerial_image(
        &self,
        address: &str,
        zoom: u8,
        size: ImageSize,
    ) -> Result<ImagePayload, ServiceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ServiceError::missing_configuration(&[
                crate::config::IMAGERY_KEY_VARS[0].to_string(),
            ]));
        };
        let coordinate = self.geocode(address, api_key)?;
        let url = static_map_url(
            &self.endpoints.static_map_url,
            coordinate,
            zoom,
            size,
            api_key,
        )
        .map_err(|err| {
            ServiceError::imagery_fetch().with_detail(error_chain_text(&err, ERROR_DETAIL_MAX_CHARS))
        })?;
        self.fetch_static_image(url)
    }
}

/// Reads `status` and, when it is `OK`, the first result's location.
pub fn parse_geocode_response(payload: &Value) -> Result<Coordinate, ServiceError> {
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN_ERROR");
    if status != "OK" {
        let detail = payload
            .get("error_message")
            .and_then(Value::as_str)
            .unwrap_or(status);
        return Err(ServiceError::from_geocode_status(status).with_detail(detail));
    }
    let location = payload.pointer("/results/0/geometry/location");
    let lat = location.and_then(|loc| loc.get("lat")).and_then(Value::as_f64);
    let lng = location.and_then(|loc| loc.get("lng")).and_then(Value::as_f64);
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(Coordinate { lat, lng }),
        _ => Err(ServiceError::from_geocode_status("ZERO_RESULTS")
            .with_detail("status OK without a result location")),
    }
}

pub fn static_map_url(
    endpoint: &str,
    coordinate: Coordinate,
    zoom: u8,
    size: ImageSize,
    api_key: &str,
) -> Result<Url> {
    let size = size.clamped();
    let zoom = clamp_zoom(i64::from(zoom));
    let params = [
        ("center", format!("{},{}", coordinate.lat, coordinate.lng)),
        ("zoom", zoom.to_string()),
        ("size", format!("{}x{}", size.width, size.height)),
        ("maptype", "satellite".to_string()),
        ("key", api_key.to_string()),
    ];
    Url::parse_with_params(endpoint, &params)
        .with_context(|| format!("invalid static map endpoint {endpoint}"))
}

pub fn decode_image_bytes(image: &ImagePayload) -> Result<Vec<u8>> {
    BASE64
        .decode(strip_data_url_prefix(&image.data).as_bytes())
        .context("image payload base64 decode failed")
}
