use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

mod cli;

use aigw_core::auth::AuthSnapshot;
use aigw_core::{hash_api_key, CostAccountant, Gateway, MemoryAuth, StreamEmulator};
use aigw_provider::anthropic::{AnthropicAdapter, ANTHROPIC_PROVIDER_NAME};
use aigw_provider::openai::{OpenAiAdapter, OPENAI_PROVIDER_NAME};
use aigw_provider::vercel::{VercelAdapter, VERCEL_PROVIDER_NAME};
use aigw_provider::{
    ProviderConfig, ProviderRegistry, RouteTable, UpstreamClient, UpstreamClientConfig,
};
use aigw_router::{build_router, GatewayState};
use aigw_storage::{GatewayStorage, Ledger, PricingSeed};

use crate::cli::{default_patch, env_patch, env_string, Cli};

const DEFAULT_USER_EMAIL: &str = "admin@localhost";

/// Pricing rows inserted on first start; everything else falls back to the
/// in-code default rate table.
const PRICING_SEEDS: &[PricingSeed] = &[
    PricingSeed {
        provider: "anthropic",
        model: "anthropic/claude-3-sonnet-20240229",
        input_cost_per_1k: 0.003,
        output_cost_per_1k: 0.015,
    },
    PricingSeed {
        provider: "anthropic",
        model: "anthropic/claude-3-haiku-20240307",
        input_cost_per_1k: 0.00025,
        output_cost_per_1k: 0.00125,
    },
];

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("aigw failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let mut patch = default_patch();
    patch.overlay(env_patch());
    patch.overlay(cli.as_patch());
    let config = patch.into_config()?;
    info!(host = %config.host, port = config.port, dsn = %config.dsn, "config loaded");

    let storage = Arc::new(GatewayStorage::connect(&config.dsn).await?);
    storage.sync().await?;
    info!("schema synced");

    let salt = env_string("API_KEY_HASH_SALT").unwrap_or_else(|| "default-salt".to_string());
    let default_user = storage
        .ensure_user(DEFAULT_USER_EMAIL, &hash_api_key(&config.api_key, &salt))
        .await?;
    info!(user_id = default_user.id, "default user ensured");

    storage.seed_pricing(PRICING_SEEDS).await?;

    let mut snapshot = AuthSnapshot::default();
    for user in storage.list_users().await? {
        snapshot.insert(user.api_key_hash, user.id, user.organization_id);
    }
    let auth = Arc::new(MemoryAuth::new(salt, snapshot));

    let client = UpstreamClient::new(UpstreamClientConfig::default())?;
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(VercelAdapter::new(
        ProviderConfig::new(
            "https://ai-gateway.vercel.sh/v1",
            env_string("VERCEL_AI_GATEWAY_API_KEY").unwrap_or_default(),
        ),
        client.clone(),
    )));
    registry.register(Arc::new(OpenAiAdapter::new(
        ProviderConfig::new(
            "https://api.openai.com/v1",
            env_string("OPENAI_API_KEY").unwrap_or_default(),
        ),
        client.clone(),
    )));
    registry.register(Arc::new(AnthropicAdapter::new(
        ProviderConfig::new(
            "https://api.anthropic.com/v1",
            env_string("ANTHROPIC_API_KEY").unwrap_or_default(),
        ),
        client,
    )));
    info!(
        providers = ?[VERCEL_PROVIDER_NAME, OPENAI_PROVIDER_NAME, ANTHROPIC_PROVIDER_NAME],
        "registry ready"
    );

    let ledger: Arc<dyn Ledger> = storage.clone();
    let accountant = CostAccountant::with_allowance(ledger, config.starting_allowance);
    let gateway = Arc::new(Gateway::new(registry, RouteTable::default(), accountant));

    let state = GatewayState {
        gateway,
        auth,
        storage,
        emulator: StreamEmulator::new(),
    };
    let app = build_router(state);

    let bind = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aigw=info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
