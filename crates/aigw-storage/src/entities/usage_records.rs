use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// One immutable ledger row per dispatch attempt. The primary key doubles as
/// the public generation id (exposed as `gen_<hex>`); rows are written once
/// and never updated.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: i64,
    pub organization_id: Option<i64>,
    pub provider: String,
    pub model: String,
    /// `chat`, `chat_stream` or `embedding`.
    pub request_kind: String,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub cost_usd: f64,
    pub latency_ms: Option<i64>,
    /// `success`, `error` or `timeout`. Non-success rows carry zero cost.
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
