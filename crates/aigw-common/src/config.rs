use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Final, merged global configuration used by the running process.
///
/// Merge order: CLI > ENV > built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Database DSN used for this process.
    pub dsn: String,
    /// Downstream API key accepted by the gateway.
    pub api_key: String,
    /// Dollar allowance every user starts with.
    pub starting_allowance: f64,
}

/// Optional layer used for merging global config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dsn: Option<String>,
    pub api_key: Option<String>,
    pub starting_allowance: Option<f64>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.dsn.is_some() {
            self.dsn = other.dsn;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.starting_allowance.is_some() {
            self.starting_allowance = other.starting_allowance;
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.port.unwrap_or(8000),
            dsn: self.dsn.ok_or(GlobalConfigError::MissingField("dsn"))?,
            api_key: self
                .api_key
                .ok_or(GlobalConfigError::MissingField("api_key"))?,
            starting_allowance: self.starting_allowance.unwrap_or(100.0),
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            host: Some(value.host),
            port: Some(value.port),
            dsn: Some(value.dsn),
            api_key: Some(value.api_key),
            starting_allowance: Some(value.starting_allowance),
        }
    }
}
