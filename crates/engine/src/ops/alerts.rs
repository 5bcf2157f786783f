//! Budget alert triggering and retrieval.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::{
    BudgetAlert, Money, ResultEngine, alerts, budgets,
    ops::{Engine, LedgerEvent, access, parse_entity_uuid},
};

impl Engine {
    /// Evaluates one budget against the alert rules and persists a new alert
    /// row when one fires.
    ///
    /// Runs inside the mutation's transaction: the alert commits or rolls
    /// back together with the spending that caused it. The cooldown dedup
    /// keys on (budget, kind), so a threshold alert never suppresses a later
    /// exceeded alert.
    pub(crate) async fn trigger_budget_alert_tx(
        &self,
        db_tx: &impl ConnectionTrait,
        budget: &budgets::Model,
    ) -> ResultEngine<Option<LedgerEvent>> {
        let Some(kind) = alerts::evaluate(
            budget.amount_minor,
            budget.spent_minor,
            budget.alert_threshold_bp,
            budget.alert_enabled,
        ) else {
            return Ok(None);
        };
        let now = Utc::now();
        let cutoff = now - self.config.alert_cooldown;
        let recent = alerts::Entity::find()
            .filter(alerts::Column::BudgetId.eq(budget.id.as_str()))
            .filter(alerts::Column::Kind.eq(kind.as_str()))
            .filter(alerts::Column::TriggeredAt.gt(cutoff))
            .one(db_tx)
            .await?;
        if recent.is_some() {
            tracing::debug!(budget_id = %budget.id, kind = kind.as_str(), "alert within cooldown, skipped");
            return Ok(None);
        }
        let budget_id = parse_entity_uuid(&budget.id, "budget")?;
        let percent_bp = budgets::percent_bp(budget.spent_minor, budget.amount_minor);
        let alert = BudgetAlert {
            id: Uuid::new_v4(),
            budget_id,
            kind,
            level: kind.level(),
            message: alerts::build_message(
                &budget.name,
                kind,
                Money::new(budget.spent_minor),
                Money::new(budget.amount_minor),
                percent_bp,
                self.config.currency,
            ),
            percent_bp,
            triggered_at: now,
        };
        alerts::ActiveModel::from(&alert).insert(db_tx).await?;
        tracing::info!(
            budget_id = %budget.id,
            kind = kind.as_str(),
            percent_bp,
            "budget alert triggered"
        );
        Ok(Some(LedgerEvent::BudgetAlert {
            alert_id: alert.id,
            budget_id,
            kind,
        }))
    }

    /// Alerts of one budget, newest first.
    pub async fn list_budget_alerts(
        &self,
        user_id: &str,
        budget_id: Uuid,
    ) -> ResultEngine<Vec<BudgetAlert>> {
        access::require_budget_view(&self.database, user_id, budget_id).await?;
        let models = alerts::Entity::find()
            .filter(alerts::Column::BudgetId.eq(budget_id.to_string()))
            .order_by_desc(alerts::Column::TriggeredAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(BudgetAlert::try_from).collect()
    }
}
