use std::env;

use vantage_contracts::errors::ServiceError;

pub const IMAGERY_KEY_VARS: &[&str] = &["MAPS_API_KEY", "GOOGLE_MAPS_API_KEY"];
pub const ANALYSIS_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

const DEFAULT_MAPS_API_BASE: &str = "https://maps.googleapis.com/maps/api";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_ORIGIN: &str = "http://localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub maps_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub maps_api_base: String,
    pub gemini_api_base: String,
    pub analysis_model: String,
    pub origin: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            maps_api_key: None,
            gemini_api_key: None,
            maps_api_base: DEFAULT_MAPS_API_BASE.to_string(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let first_of = |keys: &[&str]| keys.iter().find_map(|key| non_empty(*key));
        let base = |key: &str, default: &str| {
            non_empty(key)
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            maps_api_key: first_of(IMAGERY_KEY_VARS),
            gemini_api_key: first_of(ANALYSIS_KEY_VARS),
            maps_api_base: base("MAPS_API_BASE", DEFAULT_MAPS_API_BASE),
            gemini_api_base: base("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE),
            analysis_model: non_empty("VANTAGE_ANALYSIS_MODEL")
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            origin: non_empty("VANTAGE_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
        }
    }

    /// Names the primary variable of every secret that is not set.
    pub fn missing_keys(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.maps_api_key.is_none() {
            missing.push(IMAGERY_KEY_VARS[0].to_string());
        }
        if self.gemini_api_key.is_none() {
            missing.push(ANALYSIS_KEY_VARS[0].to_string());
        }
        missing
    }

    pub fn require_keys(&self) -> Result<(), ServiceError> {
        let missing = self.missing_keys();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::missing_configuration(&missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use vantage_contracts::errors::ErrorKind;

    use super::EngineConfig;

    fn config_from(pairs: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.missing_keys(), vec!["MAPS_API_KEY", "GEMINI_API_KEY"]);
        let err = config.require_keys().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingConfiguration);
    }

    #[test]
    fn fallback_variables_and_blank_values() {
        let config = config_from(&[
            ("MAPS_API_KEY", "   "),
            ("GOOGLE_MAPS_API_KEY", "maps-key"),
            ("GOOGLE_API_KEY", " gemini-key "),
            ("GEMINI_API_BASE", "http://127.0.0.1:9000/v1/"),
            ("VANTAGE_ORIGIN", "https://cams.example.com"),
        ]);
        assert_eq!(config.maps_api_key.as_deref(), Some("maps-key"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("gemini-key"));
        assert_eq!(config.gemini_api_base, "http://127.0.0.1:9000/v1");
        assert_eq!(config.origin, "https://cams.example.com");
        assert!(config.require_keys().is_ok());
    }
}
