/// Static per-provider connection settings resolved at startup.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: trim_trailing_slash(base_url.into()),
            api_key: api_key.into(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = ProviderConfig::new("https://api.example.test/v1/", "key");
        assert_eq!(
            config.endpoint("/chat/completions"),
            "https://api.example.test/v1/chat/completions"
        );
    }
}
