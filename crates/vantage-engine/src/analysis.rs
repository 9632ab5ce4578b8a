use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use vantage_contracts::analysis::{
    response_schema, strip_data_url_prefix, ImagePayload, SecurityAnalysis,
};
use vantage_contracts::errors::ServiceError;

use crate::config::{EngineConfig, ANALYSIS_KEY_VARS};
use crate::http::{error_chain_text, response_json_or_error};

const ERROR_DETAIL_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResponse {
    pub analysis: SecurityAnalysis,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
    pub warnings: Vec<String>,
}

pub trait AnalysisProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn analyze(&self, address: &str, image: &ImagePayload)
        -> Result<AnalysisResponse, ServiceError>;
}

/// One schema-constrained `generateContent` call per analysis. No retries.
pub struct GeminiAnalysisClient {
    api_base: String,
    api_key: Option<String>,
    model: String,
    http: HttpClient,
}

impl GeminiAnalysisClient {
    pub fn new(config: &EngineConfig, model: &str) -> Self {
        Self::with_http(
            &config.gemini_api_base,
            config.gemini_api_key.clone(),
            model,
            HttpClient::new(),
        )
    }

    pub fn with_http(
        api_base: &str,
        api_key: Option<String>,
        model: &str,
        http: HttpClient,
    ) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            model: model.trim().to_string(),
            http,
        }
    }

    fn endpoint_for_model(&self) -> String {
        let model_path = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn request_analysis(
        &self,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<(SecurityAnalysis, Value)> {
        let response = self
            .http
            .post(endpoint)
            .query(&[("key", api_key)])
            .json(payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        let analysis = parse_analysis_response(&response_payload)?;
        Ok((analysis, response_payload))
    }
}

impl AnalysisProvider for GeminiAnalysisClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn analyze(
        &self,
        address: &str,
        image: &ImagePayload,
    ) -> Result<AnalysisResponse, ServiceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ServiceError::missing_configuration(&[
                ANALYSIS_KEY_VARS[0].to_string(),
            ]));
        };
        let endpoint = self.endpoint_for_model();
        let payload = build_analysis_payload(address, image);
        let (analysis, response_payload) = self
            .request_analysis(&endpoint, api_key, &payload)
            .map_err(|err| {
                ServiceError::analysis().with_detail(error_chain_text(&err, ERROR_DETAIL_MAX_CHARS))
            })?;

        let mut provider_request = Map::new();
        provider_request.insert("endpoint".to_string(), Value::String(endpoint));
        provider_request.insert("payload".to_string(), payload);
        let mut provider_response = Map::new();
        provider_response.insert(
            "usage_metadata".to_string(),
            response_payload
                .get("usageMetadata")
                .cloned()
                .unwrap_or(Value::Null),
        );
        provider_response.insert(
            "model_version".to_string(),
            response_payload
                .get("modelVersion")
                .cloned()
                .unwrap_or(Value::Null),
        );
        Ok(AnalysisResponse {
            analysis,
            provider_request,
            provider_response,
            warnings: Vec::new(),
        })
    }
}

pub fn analysis_instruction(address: &str) -> String {
    format!(
        "You are a residential security consultant. The attached image is a top-down satellite \
view of the property at \"{address}\".\n\
\n\
Assess the property and recommend where to install security cameras:\n\
- Identify entry points (doors, gates, garages), driveways, paths, the perimeter and blind spots.\n\
- Cameras must be mounted on the main structure, outbuildings or existing poles and fences that \
belong to the property. Never place a camera in the street, on a neighbouring property or in \
open ground with nothing to mount on.\n\
- Prefer the fewest cameras that still cover every entry point.\n\
\n\
Respond with JSON only:\n\
- overview: a short assessment of the layout and its main exposure points.\n\
- placements: one entry per camera with location (where on the property), reason (what it \
covers and why), cameraType (for example Dome, Bullet, Turret, PTZ, Doorbell) and coordinates \
{{x, y}} giving the mounting point as percentages (0-100) of the image width and height, measured \
from the top-left corner.\n\
- cameraSummary: the number of cameras of each cameraType."
    )
}

/// Request body: instruction text plus the inline image, constrained to the
/// response schema.
pub fn build_analysis_payload(address: &str, image: &ImagePayload) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {"text": analysis_instruction(address)},
                {
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": strip_data_url_prefix(&image.data),
                    }
                },
            ],
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        },
    })
}

/// Joins the text parts of the first candidate and decodes them as the
/// analysis document.
pub fn parse_analysis_response(response_payload: &Value) -> Result<SecurityAnalysis> {
    let parts = response_payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("");
    let text = text.trim();
    if text.is_empty() {
        let reason = response_payload
            .pointer("/candidates/0/finishReason")
            .or_else(|| response_payload.pointer("/promptFeedback/blockReason"))
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        bail!("Gemini returned no analysis text ({reason})");
    }
    serde_json::from_str(text).context("Gemini analysis text is not a valid analysis document")
}
