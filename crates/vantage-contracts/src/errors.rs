use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    MissingConfiguration,
    GeocodeDenied,
    GeocodeZeroResults,
    GeocodeOverLimit,
    GeocodeInvalidRequest,
    GeocodeUnknown,
    GeocodeTransport,
    ImageryFetch,
    Analysis,
    Export,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingConfiguration => "missing_configuration",
            Self::GeocodeDenied => "geocode_denied",
            Self::GeocodeZeroResults => "geocode_zero_results",
            Self::GeocodeOverLimit => "geocode_over_limit",
            Self::GeocodeInvalidRequest => "geocode_invalid_request",
            Self::GeocodeUnknown => "geocode_unknown",
            Self::GeocodeTransport => "geocode_transport",
            Self::ImageryFetch => "imagery_fetch",
            Self::Analysis => "analysis",
            Self::Export => "export",
        }
    }
}

/// Failure surfaced by a client at the controller boundary.
///
/// `message` is what the user sees; `detail` keeps the underlying cause chain
/// for the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.trim().is_empty() {
            self.detail = Some(detail);
        }
        self
    }

    pub fn missing_configuration(keys: &[String]) -> Self {
        Self::new(
            ErrorKind::MissingConfiguration,
            format!("Missing configuration: {}", keys.join(", ")),
        )
    }

    /// Maps a non-OK geocoding status to its error kind and message.
    pub fn from_geocode_status(status: &str) -> Self {
        match status {
            "ZERO_RESULTS" => Self::new(
                ErrorKind::GeocodeZeroResults,
                "No location found for that address. Check the address and try again.",
            ),
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Self::new(
                ErrorKind::GeocodeOverLimit,
                "Geocoding quota exceeded. Please try again later.",
            ),
            "REQUEST_DENIED" => Self::new(
                ErrorKind::GeocodeDenied,
                "Geocoding request was denied. Check that the Geocoding API is enabled for this key.",
            ),
            "INVALID_REQUEST" => Self::new(
                ErrorKind::GeocodeInvalidRequest,
                "The address could not be processed. Try a more specific address.",
            ),
            other => Self::new(
                ErrorKind::GeocodeUnknown,
                format!("Geocoding failed with status: {other}"),
            ),
        }
    }

    pub fn geocode_transport() -> Self {
        Self::new(
            ErrorKind::GeocodeTransport,
            "Could not reach the geocoding service.",
        )
    }

    pub fn imagery_fetch() -> Self {
        Self::new(
            ErrorKind::ImageryFetch,
            "Failed to load satellite imagery. Make sure the Maps Static API is enabled for this key.",
        )
    }

    pub fn analysis() -> Self {
        Self::new(
            ErrorKind::Analysis,
            "Failed to analyze the property image. Please try again.",
        )
    }

    pub fn export() -> Self {
        Self::new(ErrorKind::Export, "Failed to export the report. Please try again.")
    }

    pub fn is_denied(&self) -> bool {
        self.kind == ErrorKind::GeocodeDenied
    }

    /// Text stored in the session. The denied kind carries remediation steps
    /// naming the origin the app is served from.
    pub fn display_message(&self, origin: &str) -> String {
        if !self.is_denied() {
            return self.message.clone();
        }
        let origin = origin.trim().trim_end_matches('/');
        format!(
            "{} To fix it: enable the Geocoding API and the Maps Static API for the key, \
             and if the key has HTTP referrer restrictions add {origin}/* to its allowed referrers.",
            self.message
        )
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ServiceError {}
