use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{capability}'."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (Some("No model specified; using default.".to_string()), None)
        };

        let candidates = self.registry.by_capability(capability);
        let Some(model) = candidates.first().cloned() else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::ModelSelector;
    use crate::models::{ModelRegistry, ModelSpec};

    fn analysis_model(name: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: "gemini".to_string(),
            capabilities: vec!["analysis".to_string()],
        }
    }

    #[test]
    fn falls_back_when_requested_model_unavailable() {
        let mut models = IndexMap::new();
        models.insert("gemini-fallback".to_string(), analysis_model("gemini-fallback"));
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("missing"), "analysis")
            .unwrap();
        assert_eq!(selection.model.name, "gemini-fallback");
        assert_eq!(selection.requested.as_deref(), Some("missing"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' unavailable for capability 'analysis'.")
        );
    }

    #[test]
    fn no_request_uses_default_with_explanation() {
        let selection = ModelSelector::new(None).select(None, "analysis").unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn explicit_dryrun_model_is_honored() {
        let selection = ModelSelector::new(None)
            .select(Some("dryrun-analysis-1"), "analysis")
            .unwrap();
        assert!(selection.model.is_dryrun());
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn errors_when_no_models_for_capability() {
        let mut models = IndexMap::new();
        models.insert("only".to_string(), analysis_model("only"));
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("only"), "imagery")
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'imagery'.");
    }
}
