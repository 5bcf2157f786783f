use std::time::Duration;

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{
    BudgetState, Currency, EngineError, GoalProgress, ResultEngine, alerts::AlertKind,
};

mod access;
mod accounts;
mod aggregates;
mod alerts;
mod balances;
mod budgets;
mod categories;
mod families;
mod goals;
mod transactions;

/// Run a block inside a DB transaction, committing on success and rolling
/// back (by drop) on error.
///
/// The body is wrapped in an async block so `?` inside it resolves to the
/// block's result instead of escaping the caller — required for `with_retry!`
/// to observe every failure.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        match sea_orm::TransactionTrait::begin(&$self.database).await {
            Err(err) => Err($crate::EngineError::from(err)),
            Ok($tx) => {
                let result: $crate::ResultEngine<_> = async { $body }.await;
                match result {
                    Ok(value) => match $tx.commit().await {
                        Ok(()) => Ok(value),
                        Err(err) => Err($crate::EngineError::from(err)),
                    },
                    Err(err) => Err(err),
                }
            }
        }
    }};
}

/// Bounded retry-with-backoff around a transactional body.
///
/// Lock-wait and consistency failures are transient: the whole body is
/// re-evaluated (a fresh DB transaction) up to `retry_attempts` times.
/// Waiting on row locks is bounded by the driver (`lock_wait_timeout` is
/// installed on the connection at build time), never by a deadline on the
/// body itself, so a long uncontended mutation runs to completion.
macro_rules! with_retry {
    ($self:expr, $body:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            let outcome = ($body).map_err($crate::EngineError::normalized);
            match outcome {
                Err(err) if err.is_transient() && attempt < $self.config.retry_attempts => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %err, "transient failure, retrying");
                    tokio::time::sleep($self.config.retry_backoff * attempt).await;
                }
                other => break other,
            }
        }
    }};
}

pub(crate) use with_retry;
pub(crate) use with_tx;

/// Operational parameters of the engine.
///
/// These are deployment knobs, not business rules: the defaults match the
/// documented behavior (1 h alert cooldown, 5 s lock wait).
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Currency used when rendering budget alert messages.
    pub currency: Currency,
    /// Minimum gap between two alerts of the same (budget, kind).
    pub alert_cooldown: chrono::Duration,
    /// How long one statement may wait on row locks before the backend
    /// reports busy (surfaced as `LockTimeout`). Installed on the
    /// connection when the engine is built.
    pub lock_wait_timeout: Duration,
    /// Transient failures are retried this many times before surfacing.
    pub retry_attempts: u32,
    /// Base delay between retries (multiplied by the attempt number).
    pub retry_backoff: Duration,
    /// Upper bound accepted for any single amount, in minor units.
    pub max_amount_minor: i64,
    /// Maximum accepted length for sanitized names, in characters.
    pub max_name_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            alert_cooldown: chrono::Duration::hours(1),
            lock_wait_timeout: Duration::from_secs(5),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            max_amount_minor: 1_000_000_000_000,
            max_name_chars: 120,
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    config: EngineConfig,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) fn validate_amount(&self, amount_minor: i64) -> ResultEngine<()> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        if amount_minor > self.config.max_amount_minor {
            return Err(EngineError::InvalidAmount(
                "amount_minor above configured maximum".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn sanitize_name(&self, value: &str, label: &str) -> ResultEngine<String> {
        let normalized: String = value.trim().nfc().collect();
        if normalized.is_empty() {
            return Err(EngineError::Validation(format!(
                "{label} name must not be empty"
            )));
        }
        if normalized.chars().count() > self.config.max_name_chars {
            return Err(EngineError::Validation(format!("{label} name too long")));
        }
        Ok(normalized)
    }
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn parse_entity_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::NotFound(label.to_string()))
}

/// Events surfaced by a committed mutation.
///
/// Alerts are also persisted; goal events exist only in the outcome (and the
/// log) for the caller's notification channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum LedgerEvent {
    GoalCompleted { goal_id: Uuid },
    GoalReopened { goal_id: Uuid },
    BudgetAlert { alert_id: Uuid, budget_id: Uuid, kind: AlertKind },
}

/// One account's balance after a committed mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub account_id: Uuid,
    pub balance_minor: i64,
}

/// Result of a create/update/delete on the transaction ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub transaction_id: Uuid,
    pub updated_balances: Vec<BalanceChange>,
    pub events: Vec<LedgerEvent>,
}

/// Result of a goal contribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionOutcome {
    pub transaction_id: Uuid,
    pub goal_progress: GoalProgress,
    pub updated_balances: Vec<BalanceChange>,
    pub events: Vec<LedgerEvent>,
}

/// Spending snapshot of one budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStatusView {
    pub spent_minor: i64,
    pub remaining_minor: i64,
    pub percent_bp: i64,
    pub status: BudgetState,
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    config: Option<EngineConfig>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Override the default operational parameters.
    pub fn config(mut self, config: EngineConfig) -> EngineBuilder {
        self.config = Some(config);
        self
    }

    /// Construct `Engine`, installing `lock_wait_timeout` as the backend's
    /// busy timeout so lock waits are bounded without capping the mutation
    /// itself.
    pub async fn build(self) -> ResultEngine<Engine> {
        let config = self.config.unwrap_or_default();
        if self.database.get_database_backend() == DatabaseBackend::Sqlite {
            let pragma = format!(
                "PRAGMA busy_timeout = {}",
                config.lock_wait_timeout.as_millis()
            );
            self.database.execute_unprepared(&pragma).await?;
        }
        Ok(Engine {
            database: self.database,
            config,
        })
    }
}
