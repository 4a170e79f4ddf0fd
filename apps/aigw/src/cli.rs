use clap::Parser;

use aigw_common::GlobalConfigPatch;

#[derive(Parser)]
#[command(name = "aigw")]
pub(crate) struct Cli {
    /// Database DSN, e.g. `sqlite://aigw.db?mode=rwc` or a postgres URL.
    #[arg(long)]
    pub(crate) dsn: Option<String>,
    #[arg(long)]
    pub(crate) host: Option<String>,
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// API key of the default account created at bootstrap.
    #[arg(long)]
    pub(crate) api_key: Option<String>,
    #[arg(long)]
    pub(crate) starting_allowance: Option<f64>,
}

impl Cli {
    pub(crate) fn as_patch(&self) -> GlobalConfigPatch {
        GlobalConfigPatch {
            host: self.host.clone(),
            port: self.port,
            dsn: self.dsn.clone(),
            api_key: self.api_key.clone(),
            starting_allowance: self.starting_allowance,
        }
    }
}

/// Environment layer, below CLI flags in precedence.
pub(crate) fn env_patch() -> GlobalConfigPatch {
    GlobalConfigPatch {
        host: env_string("AIGW_HOST"),
        port: env_string("AIGW_PORT").and_then(|value| value.parse().ok()),
        dsn: env_string("DATABASE_URL"),
        api_key: env_string("GATEWAY_API_KEY"),
        starting_allowance: env_string("AIGW_STARTING_ALLOWANCE")
            .and_then(|value| value.parse().ok()),
    }
}

/// Built-in defaults, lowest precedence. The demo key keeps a fresh checkout
/// usable without configuration.
pub(crate) fn default_patch() -> GlobalConfigPatch {
    GlobalConfigPatch {
        host: None,
        port: None,
        dsn: Some("sqlite://aigw.db?mode=rwc".to_string()),
        api_key: Some("sk-demo".to_string()),
        starting_allowance: None,
    }
}

pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
