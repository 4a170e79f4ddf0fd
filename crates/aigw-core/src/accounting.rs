use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use aigw_common::GenerationId;
use aigw_storage::{Ledger, RequestKind, StorageResult, UsageAttempt};

/// Fixed credit allowance every account starts from.
pub const STARTING_ALLOWANCE_USD: f64 = 100.0;

/// Per-1k fallback rates used when the pricing table has no exact
/// (provider, model) row.
const DEFAULT_RATES: &[(&str, f64, f64)] = &[
    ("vercel", 0.001, 0.002),
    ("openai", 0.001, 0.002),
    ("anthropic", 0.003, 0.015),
];

const UNKNOWN_PROVIDER_RATES: (f64, f64) = (0.001, 0.002);

/// Credit balance derived from the ledger on every read. Amounts are display
/// strings with two fraction digits, per the downstream contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub balance: String,
    pub total_used: String,
    pub usage_breakdown: BTreeMap<String, String>,
}

/// Display shape of one ledger record as served by the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationDetails {
    pub id: String,
    pub total_cost: f64,
    pub usage: f64,
    pub created_at: String,
    pub model: String,
    pub provider_name: String,
    pub streamed: bool,
    pub latency: i64,
    pub generation_time: i64,
    pub tokens_prompt: i64,
    pub tokens_completion: i64,
}

/// Owns all ledger writes and the cost math on top of the pricing table.
#[derive(Clone)]
pub struct CostAccountant {
    ledger: Arc<dyn Ledger>,
    allowance: f64,
}

impl CostAccountant {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            allowance: STARTING_ALLOWANCE_USD,
        }
    }

    pub fn with_allowance(ledger: Arc<dyn Ledger>, allowance: f64) -> Self {
        Self { ledger, allowance }
    }

    /// Per-1k (input, output) rates: exact pricing row first, then the
    /// provider-keyed default table, then the unknown-provider fallback.
    pub async fn rate(&self, provider: &str, model: &str) -> StorageResult<(f64, f64)> {
        if let Some(rates) = self.ledger.pricing_rate(provider, model).await? {
            return Ok(rates);
        }
        Ok(default_rate(provider))
    }

    /// `input*rate/1000 + output*rate/1000`, rounded half away from zero to
    /// six decimal places.
    pub async fn cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> StorageResult<f64> {
        let (input_rate, output_rate) = self.rate(provider, model).await?;
        let amount =
            input_tokens as f64 * input_rate / 1000.0 + output_tokens as f64 * output_rate / 1000.0;
        Ok(round_to_6dp(amount))
    }

    /// Appends one ledger record and returns the generation id derived from
    /// it. Called exactly once per dispatch attempt.
    pub async fn log(&self, attempt: UsageAttempt) -> StorageResult<GenerationId> {
        let id = self.ledger.append(attempt).await?;
        Ok(GenerationId::from_ledger_id(id))
    }

    pub async fn balance(&self, user_id: i64) -> StorageResult<BalanceView> {
        let rows = self.ledger.success_costs(user_id).await?;
        let mut total_used = 0.0;
        let mut breakdown: BTreeMap<String, f64> = BTreeMap::new();
        for row in rows {
            total_used += row.cost_usd;
            *breakdown.entry(row.provider).or_insert(0.0) += row.cost_usd;
        }
        Ok(BalanceView {
            balance: format_usd(self.allowance - total_used),
            total_used: format_usd(total_used),
            usage_breakdown: breakdown
                .into_iter()
                .map(|(provider, amount)| (provider, format_usd(amount)))
                .collect(),
        })
    }

    /// Point lookup by ledger id. `None` means the record does not exist;
    /// callers decide how to report that.
    pub async fn generation_details(
        &self,
        id: GenerationId,
    ) -> StorageResult<Option<GenerationDetails>> {
        let Some(record) = self.ledger.find(id.ledger_id()).await? else {
            return Ok(None);
        };
        let latency = record.latency_ms.unwrap_or(0);
        let streamed = record.request_kind == RequestKind::ChatStream.as_str();
        Ok(Some(GenerationDetails {
            id: GenerationId::from_ledger_id(record.id).to_string(),
            total_cost: record.cost_usd,
            usage: record.cost_usd,
            created_at: record
                .created_at
                .format(&Rfc3339)
                .unwrap_or_default(),
            model: record.model,
            provider_name: record.provider,
            streamed,
            latency,
            generation_time: latency,
            tokens_prompt: record.input_tokens.unwrap_or(0),
            tokens_completion: record.output_tokens.unwrap_or(0),
        }))
    }
}

fn default_rate(provider: &str) -> (f64, f64) {
    DEFAULT_RATES
        .iter()
        .find(|(name, _, _)| *name == provider)
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or(UNKNOWN_PROVIDER_RATES)
}

fn round_to_6dp(amount: f64) -> f64 {
    (amount * 1_000_000.0).round() / 1_000_000.0
}

fn format_usd(amount: f64) -> String {
    format!("{amount:.2}")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    use aigw_storage::{
        entities::usage_records, StorageResult, SuccessCostRow, UsageStatus,
    };
    use time::OffsetDateTime;

    /// In-memory ledger double used across the core tests.
    #[derive(Default)]
    pub(crate) struct MemoryLedger {
        pub records: Mutex<Vec<usage_records::Model>>,
        pub pricing: Mutex<Vec<(String, String, f64, f64)>>,
    }

    #[async_trait]
    impl Ledger for MemoryLedger {
        async fn append(&self, attempt: UsageAttempt) -> StorageResult<Uuid> {
            let id = Uuid::new_v4();
            self.records.lock().unwrap().push(usage_records::Model {
                id,
                user_id: attempt.user_id,
                organization_id: attempt.organization_id,
                provider: attempt.provider,
                model: attempt.model,
                request_kind: attempt.kind.as_str().to_string(),
                input_tokens: attempt.input_tokens,
                output_tokens: attempt.output_tokens,
                total_tokens: attempt.total_tokens,
                cost_usd: attempt.cost_usd,
                latency_ms: attempt.latency_ms,
                status: attempt.status.as_str().to_string(),
                error_message: attempt.error_message,
                created_at: OffsetDateTime::now_utc(),
            });
            Ok(id)
        }

        async fn find(&self, id: Uuid) -> StorageResult<Option<usage_records::Model>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|record| record.id == id)
                .cloned())
        }

        async fn success_costs(&self, user_id: i64) -> StorageResult<Vec<SuccessCostRow>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|record| {
                    record.user_id == user_id
                        && record.status == UsageStatus::Success.as_str()
                })
                .map(|record| SuccessCostRow {
                    provider: record.provider.clone(),
                    cost_usd: record.cost_usd,
                })
                .collect())
        }

        async fn pricing_rate(
            &self,
            provider: &str,
            model: &str,
        ) -> StorageResult<Option<(f64, f64)>> {
            Ok(self
                .pricing
                .lock()
                .unwrap()
                .iter()
                .find(|(p, m, _, _)| p == provider && m == model)
                .map(|(_, _, input, output)| (*input, *output)))
        }
    }

    fn success_attempt(provider: &str, cost: f64) -> UsageAttempt {
        UsageAttempt {
            user_id: 1,
            organization_id: None,
            provider: provider.to_string(),
            model: format!("{provider}/some-model"),
            kind: RequestKind::Chat,
            input_tokens: Some(10),
            output_tokens: Some(20),
            total_tokens: Some(30),
            cost_usd: cost,
            latency_ms: Some(120),
            status: UsageStatus::Success,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn unpriced_anthropic_model_uses_default_table() {
        let accountant = CostAccountant::new(Arc::new(MemoryLedger::default()));
        let cost = accountant
            .cost("anthropic", "anthropic/anything-unpriced", 1000, 1000)
            .await
            .unwrap();
        assert_eq!(cost, 0.018);
    }

    #[tokio::test]
    async fn unknown_provider_falls_back_to_generic_rates() {
        let accountant = CostAccountant::new(Arc::new(MemoryLedger::default()));
        let cost = accountant.cost("mystery", "m/x", 1000, 1000).await.unwrap();
        assert_eq!(cost, 0.003);
    }

    #[tokio::test]
    async fn exact_pricing_row_wins_over_defaults() {
        let ledger = Arc::new(MemoryLedger::default());
        ledger.pricing.lock().unwrap().push((
            "anthropic".to_string(),
            "anthropic/claude-3-sonnet".to_string(),
            0.008,
            0.024,
        ));
        let accountant = CostAccountant::new(ledger);
        let cost = accountant
            .cost("anthropic", "anthropic/claude-3-sonnet", 500, 250)
            .await
            .unwrap();
        assert_eq!(cost, 0.01);
    }

    #[tokio::test]
    async fn cost_rounds_to_six_decimal_places() {
        let accountant = CostAccountant::new(Arc::new(MemoryLedger::default()));
        // 123 * 0.003/1000 + 7 * 0.015/1000 = 0.000369 + 0.000105
        let cost = accountant.cost("anthropic", "x", 123, 7).await.unwrap();
        assert_eq!(cost, 0.000474);
        assert!(cost >= 0.0);
    }

    #[tokio::test]
    async fn balance_is_idempotent_and_moves_by_logged_cost() {
        let ledger = Arc::new(MemoryLedger::default());
        let accountant = CostAccountant::new(ledger);
        accountant.log(success_attempt("vercel", 1.5)).await.unwrap();

        let first = accountant.balance(1).await.unwrap();
        let second = accountant.balance(1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total_used, "1.50");
        assert_eq!(first.balance, "98.50");

        accountant.log(success_attempt("anthropic", 0.25)).await.unwrap();
        let third = accountant.balance(1).await.unwrap();
        assert_eq!(third.total_used, "1.75");
        assert_eq!(third.balance, "98.25");
        assert_eq!(third.usage_breakdown.get("vercel").unwrap(), "1.50");
        assert_eq!(third.usage_breakdown.get("anthropic").unwrap(), "0.25");
    }

    #[tokio::test]
    async fn failed_records_do_not_count_toward_balance() {
        let ledger = Arc::new(MemoryLedger::default());
        let accountant = CostAccountant::new(ledger);
        accountant.log(success_attempt("vercel", 2.0)).await.unwrap();
        accountant
            .log(UsageAttempt::failed(
                1,
                None,
                "vercel/some-model",
                RequestKind::Chat,
                UsageStatus::Error,
                "upstream exploded",
            ))
            .await
            .unwrap();
        let view = accountant.balance(1).await.unwrap();
        assert_eq!(view.total_used, "2.00");
    }

    #[tokio::test]
    async fn generation_details_reshape_the_record() {
        let ledger = Arc::new(MemoryLedger::default());
        let accountant = CostAccountant::new(ledger);
        let mut attempt = success_attempt("anthropic", 0.018);
        attempt.kind = RequestKind::ChatStream;
        let id = accountant.log(attempt).await.unwrap();

        let details = accountant.generation_details(id).await.unwrap().unwrap();
        assert_eq!(details.id, id.to_string());
        assert_eq!(details.total_cost, 0.018);
        assert_eq!(details.usage, 0.018);
        assert!(details.streamed);
        assert_eq!(details.latency, 120);
        assert_eq!(details.generation_time, 120);
        assert_eq!(details.tokens_prompt, 10);
        assert_eq!(details.tokens_completion, 20);
    }

    #[tokio::test]
    async fn unknown_generation_id_is_absent_not_zeroed() {
        let accountant = CostAccountant::new(Arc::new(MemoryLedger::default()));
        let missing = accountant
            .generation_details(GenerationId::new())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
