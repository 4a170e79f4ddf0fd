use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::ProviderAdapter;
use crate::anthropic::ANTHROPIC_PROVIDER_NAME;
use crate::openai::OPENAI_PROVIDER_NAME;
use crate::vercel::VERCEL_PROVIDER_NAME;

/// Static routing policy: model-id prefix to an ordered candidate list.
///
/// Selection is a pure function of the model id and the table. An unmatched
/// prefix resolves to the default provider, so selection itself never fails;
/// only the subsequent call can.
#[derive(Debug, Clone)]
pub struct RouteTable {
    prefixes: HashMap<String, Vec<String>>,
    default_provider: String,
}

impl RouteTable {
    pub fn new(
        prefixes: HashMap<String, Vec<String>>,
        default_provider: impl Into<String>,
    ) -> Self {
        Self {
            prefixes,
            default_provider: default_provider.into(),
        }
    }

    /// Prefix of a model id before the first `/`, or the whole id when it has
    /// no namespace segment.
    pub fn selection_key(model: &str) -> &str {
        model.split('/').next().unwrap_or(model)
    }

    /// First candidate for the model id. There is no fallback to later
    /// candidates on call failure; a dispatch fully succeeds or fully fails
    /// with its selected provider.
    pub fn select<'a>(&'a self, model: &str) -> &'a str {
        self.candidates(model)
            .first()
            .map(String::as_str)
            .unwrap_or(&self.default_provider)
    }

    pub fn candidates(&self, model: &str) -> &[String] {
        self.prefixes
            .get(Self::selection_key(model))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        let mut prefixes = HashMap::new();
        for name in [
            ANTHROPIC_PROVIDER_NAME,
            OPENAI_PROVIDER_NAME,
            VERCEL_PROVIDER_NAME,
        ] {
            prefixes.insert(name.to_string(), vec![name.to_string()]);
        }
        Self::new(prefixes, VERCEL_PROVIDER_NAME)
    }
}

/// Routing configuration handed to the dispatcher at startup.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub table: RouteTable,
}

/// Name-keyed set of live adapters.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.providers.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_key_is_prefix_before_first_slash() {
        assert_eq!(RouteTable::selection_key("anthropic/claude-3-sonnet"), "anthropic");
        assert_eq!(RouteTable::selection_key("openai/gpt-4/32k"), "openai");
        assert_eq!(RouteTable::selection_key("gpt-4"), "gpt-4");
    }

    #[test]
    fn select_is_deterministic_per_table() {
        let table = RouteTable::default();
        assert_eq!(table.select("anthropic/claude-3-sonnet"), "anthropic");
        assert_eq!(table.select("anthropic/claude-3-sonnet"), "anthropic");
        assert_eq!(table.select("openai/gpt-4"), "openai");
    }

    #[test]
    fn unmatched_prefix_falls_back_to_default() {
        let table = RouteTable::default();
        assert_eq!(table.select("mistral/mistral-large"), "vercel");
        assert_eq!(table.select("no-namespace-at-all"), "vercel");
    }
}
