use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }

    pub fn is_dryrun(&self) -> bool {
        self.provider == "dryrun"
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    // First entry is the default.
    insert("gemini-2.5-flash", "gemini", &["analysis"]);
    insert("gemini-2.5-pro", "gemini", &["analysis"]);
    insert("gemini-2.0-flash", "gemini", &["analysis"]);
    insert("dryrun-analysis-1", "dryrun", &["analysis"]);

    map
}

#[cfg(test)]
mod tests {
    use super::ModelRegistry;

    #[test]
    fn default_registry_orders_gemini_flash_first() {
        let registry = ModelRegistry::new(None);
        let analysis = registry.by_capability("analysis");
        assert_eq!(analysis[0].name, "gemini-2.5-flash");
        assert!(analysis.iter().any(|model| model.is_dryrun()));
        assert!(registry.by_capability("imagery").is_empty());
    }

    #[test]
    fn ensure_checks_capability() {
        let registry = ModelRegistry::new(None);
        assert!(registry.ensure("gemini-2.5-pro", "analysis").is_some());
        assert!(registry.ensure("gemini-2.5-pro", "imagery").is_none());
        assert!(registry.ensure("missing", "analysis").is_none());
    }
}
