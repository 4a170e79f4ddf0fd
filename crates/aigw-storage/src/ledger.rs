use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    QueryFilter, QuerySelect, Schema,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entities;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] DbErr),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Chat,
    ChatStream,
    Embedding,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Chat => "chat",
            RequestKind::ChatStream => "chat_stream",
            RequestKind::Embedding => "embedding",
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, RequestKind::ChatStream)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageStatus {
    Success,
    Error,
    Timeout,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Success => "success",
            UsageStatus::Error => "error",
            UsageStatus::Timeout => "timeout",
        }
    }
}

/// One dispatch attempt, ready to be appended to the ledger.
#[derive(Debug, Clone)]
pub struct UsageAttempt {
    pub user_id: i64,
    pub organization_id: Option<i64>,
    pub provider: String,
    pub model: String,
    pub kind: RequestKind,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub cost_usd: f64,
    pub latency_ms: Option<i64>,
    pub status: UsageStatus,
    pub error_message: Option<String>,
}

impl UsageAttempt {
    /// A failed attempt: zero cost, zero tokens, the error text preserved.
    pub fn failed(
        user_id: i64,
        organization_id: Option<i64>,
        model: impl Into<String>,
        kind: RequestKind,
        status: UsageStatus,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            organization_id,
            provider: "unknown".to_string(),
            model: model.into(),
            kind,
            input_tokens: Some(0),
            output_tokens: Some(0),
            total_tokens: Some(0),
            cost_usd: 0.0,
            latency_ms: Some(0),
            status,
            error_message: Some(error_message.into()),
        }
    }
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct SuccessCostRow {
    pub provider: String,
    pub cost_usd: f64,
}

/// Append-only usage ledger plus the pricing lookup that feeds cost
/// calculation. The ledger is the single audit trail: every dispatch attempt
/// lands here exactly once, including failures.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Appends one record and returns its id (the public generation id).
    async fn append(&self, attempt: UsageAttempt) -> StorageResult<Uuid>;

    async fn find(&self, id: Uuid) -> StorageResult<Option<entities::usage_records::Model>>;

    /// Provider/cost pairs of all success records for a user, one row per
    /// record. Balance math happens in the accountant, not in SQL.
    async fn success_costs(&self, user_id: i64) -> StorageResult<Vec<SuccessCostRow>>;

    /// Per-1k input/output rates for an exact (provider, model) pair.
    async fn pricing_rate(&self, provider: &str, model: &str)
    -> StorageResult<Option<(f64, f64)>>;
}

/// Seed row for the pricing table.
#[derive(Debug, Clone)]
pub struct PricingSeed {
    pub provider: &'static str,
    pub model: &'static str,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
}

#[derive(Clone)]
pub struct GatewayStorage {
    db: DatabaseConnection,
}

impl GatewayStorage {
    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        let db = Database::connect(database_url).await?;
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Entity-first schema sync, run once at bootstrap.
    pub async fn sync(&self) -> Result<(), DbErr> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::Users)
            .register(entities::UsageRecords)
            .register(entities::PricingRates)
            .sync(&self.db)
            .await
    }

    pub async fn health(&self) -> Result<(), DbErr> {
        entities::Users::find().one(&self.db).await?;
        Ok(())
    }

    pub async fn find_user_by_key_hash(
        &self,
        api_key_hash: &str,
    ) -> Result<Option<entities::users::Model>, DbErr> {
        entities::Users::find()
            .filter(entities::users::Column::ApiKeyHash.eq(api_key_hash))
            .one(&self.db)
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<entities::users::Model>, DbErr> {
        entities::Users::find().all(&self.db).await
    }

    /// Inserts a new user; an existing email is a conflict, not an upsert.
    pub async fn insert_user(
        &self,
        email: &str,
        api_key_hash: &str,
    ) -> StorageResult<entities::users::Model> {
        let existing = entities::Users::find()
            .filter(entities::users::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(StorageError::Conflict(format!(
                "user {email} already exists"
            )));
        }

        let now = OffsetDateTime::now_utc();
        let active = entities::users::ActiveModel {
            id: ActiveValue::NotSet,
            email: ActiveValue::Set(email.to_string()),
            api_key_hash: ActiveValue::Set(api_key_hash.to_string()),
            organization_id: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        let result = entities::Users::insert(active).exec(&self.db).await?;
        let model = entities::Users::find_by_id(result.last_insert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StorageError::Conflict("inserted user vanished".to_string()))?;
        Ok(model)
    }

    /// Returns the existing user for the email or creates one. Used to seed
    /// the default account at bootstrap.
    pub async fn ensure_user(
        &self,
        email: &str,
        api_key_hash: &str,
    ) -> StorageResult<entities::users::Model> {
        if let Some(user) = entities::Users::find()
            .filter(entities::users::Column::Email.eq(email))
            .one(&self.db)
            .await?
        {
            return Ok(user);
        }
        self.insert_user(email, api_key_hash).await
    }

    /// Inserts pricing rows that are not present yet, keyed by
    /// (provider, model).
    pub async fn seed_pricing(&self, seeds: &[PricingSeed]) -> Result<(), DbErr> {
        for seed in seeds {
            let existing = entities::PricingRates::find()
                .filter(entities::pricing_rates::Column::Provider.eq(seed.provider))
                .filter(entities::pricing_rates::Column::Model.eq(seed.model))
                .one(&self.db)
                .await?;
            if existing.is_some() {
                continue;
            }
            let now = OffsetDateTime::now_utc();
            let active = entities::pricing_rates::ActiveModel {
                id: ActiveValue::NotSet,
                provider: ActiveValue::Set(seed.provider.to_string()),
                model: ActiveValue::Set(seed.model.to_string()),
                input_cost_per_1k: ActiveValue::Set(seed.input_cost_per_1k),
                output_cost_per_1k: ActiveValue::Set(seed.output_cost_per_1k),
                effective_date: ActiveValue::Set(now),
                created_at: ActiveValue::Set(now),
            };
            entities::PricingRates::insert(active).exec(&self.db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for GatewayStorage {
    async fn append(&self, attempt: UsageAttempt) -> StorageResult<Uuid> {
        let id = Uuid::new_v4();
        let active = entities::usage_records::ActiveModel {
            id: ActiveValue::Set(id),
            user_id: ActiveValue::Set(attempt.user_id),
            organization_id: ActiveValue::Set(attempt.organization_id),
            provider: ActiveValue::Set(attempt.provider),
            model: ActiveValue::Set(attempt.model),
            request_kind: ActiveValue::Set(attempt.kind.as_str().to_string()),
            input_tokens: ActiveValue::Set(attempt.input_tokens),
            output_tokens: ActiveValue::Set(attempt.output_tokens),
            total_tokens: ActiveValue::Set(attempt.total_tokens),
            cost_usd: ActiveValue::Set(attempt.cost_usd),
            latency_ms: ActiveValue::Set(attempt.latency_ms),
            status: ActiveValue::Set(attempt.status.as_str().to_string()),
            error_message: ActiveValue::Set(attempt.error_message),
            created_at: ActiveValue::Set(OffsetDateTime::now_utc()),
        };
        entities::UsageRecords::insert(active).exec(&self.db).await?;
        Ok(id)
    }

    async fn find(&self, id: Uuid) -> StorageResult<Option<entities::usage_records::Model>> {
        Ok(entities::UsageRecords::find_by_id(id).one(&self.db).await?)
    }

    async fn success_costs(&self, user_id: i64) -> StorageResult<Vec<SuccessCostRow>> {
        use entities::usage_records::Column;
        let rows = entities::UsageRecords::find()
            .select_only()
            .column(Column::Provider)
            .column(Column::CostUsd)
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Status.eq(UsageStatus::Success.as_str()))
            .into_model::<SuccessCostRow>()
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn pricing_rate(
        &self,
        provider: &str,
        model: &str,
    ) -> StorageResult<Option<(f64, f64)>> {
        use entities::pricing_rates::Column;
        let row = entities::PricingRates::find()
            .filter(Column::Provider.eq(provider))
            .filter(Column::Model.eq(model))
            .one(&self.db)
            .await?;
        Ok(row.map(|rate| (rate.input_cost_per_1k, rate.output_cost_per_1k)))
    }
}
