//! Aggregate maintenance.
//!
//! Every ledger mutation reduces to a list of signed deltas against the
//! denormalized aggregates (account balances, budget spending, goal
//! progress). Edits and deletes first emit the stored transaction's deltas
//! with the sign flipped (a full reversal), then the replacement's deltas;
//! the combined list is coalesced per target and applied once, inside the
//! same transaction as the row write.

use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

use crate::{
    AccountKind, BudgetState, EngineError, GoalStatus, ResultEngine, Transaction, TransactionKind,
    accounts, budgets, goals,
    ops::{BalanceChange, Engine, LedgerEvent, parse_entity_uuid},
};

/// The ledger-relevant fields of one transaction, captured either from a
/// command about to be persisted or from a stored row about to be reversed.
#[derive(Clone, Debug)]
pub(crate) struct TxEffect {
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub account_id: Uuid,
    pub transfer_account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub goal_id: Option<Uuid>,
    pub occurred_on: NaiveDate,
}

impl From<&Transaction> for TxEffect {
    fn from(tx: &Transaction) -> Self {
        Self {
            kind: tx.kind,
            amount_minor: tx.amount_minor,
            account_id: tx.account_id,
            transfer_account_id: tx.transfer_account_id,
            category_id: tx.category_id,
            goal_id: tx.goal_id,
            occurred_on: tx.occurred_on,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum AggregateTarget {
    Account(Uuid),
    Budget(Uuid),
    Goal(Uuid),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Delta {
    pub target: AggregateTarget,
    pub amount_minor: i64,
}

/// Active budget covering `occurred_on` for this category, if any.
///
/// Overlapping active budgets are a data smell the engine tolerates: it
/// logs and charges the most recently started one.
pub(crate) async fn matched_budget(
    db: &impl ConnectionTrait,
    category_id: Uuid,
    occurred_on: NaiveDate,
) -> ResultEngine<Option<budgets::Model>> {
    let candidates = budgets::Entity::find()
        .filter(budgets::Column::CategoryId.eq(category_id.to_string()))
        .filter(budgets::Column::Status.eq(BudgetState::Active.as_str()))
        .filter(budgets::Column::StartsOn.lte(occurred_on))
        .filter(budgets::Column::EndsOn.gte(occurred_on))
        .order_by_desc(budgets::Column::StartsOn)
        .all(db)
        .await?;
    if candidates.len() > 1 {
        tracing::warn!(
            category_id = %category_id,
            count = candidates.len(),
            "multiple active budgets cover the same date, charging the latest"
        );
    }
    Ok(candidates.into_iter().next())
}

/// Signed aggregate deltas of one transaction. `sign` is `1` to apply the
/// transaction, `-1` to reverse it; budget matching is re-resolved against
/// current budget rows in both directions.
pub(crate) async fn effect_deltas(
    db: &impl ConnectionTrait,
    effect: &TxEffect,
    sign: i64,
) -> ResultEngine<Vec<Delta>> {
    let amount = effect.amount_minor * sign;
    let mut deltas = Vec::with_capacity(3);
    match effect.kind {
        TransactionKind::Income => {
            deltas.push(Delta {
                target: AggregateTarget::Account(effect.account_id),
                amount_minor: amount,
            });
        }
        TransactionKind::Expense | TransactionKind::Contribution => {
            deltas.push(Delta {
                target: AggregateTarget::Account(effect.account_id),
                amount_minor: -amount,
            });
        }
        TransactionKind::Transfer => {
            deltas.push(Delta {
                target: AggregateTarget::Account(effect.account_id),
                amount_minor: -amount,
            });
            if let Some(to) = effect.transfer_account_id {
                deltas.push(Delta {
                    target: AggregateTarget::Account(to),
                    amount_minor: amount,
                });
            }
        }
    }
    if effect.kind == TransactionKind::Contribution {
        if let Some(goal_id) = effect.goal_id {
            deltas.push(Delta {
                target: AggregateTarget::Goal(goal_id),
                amount_minor: amount,
            });
        }
    }
    // Expenses and category-tagged contributions count against the budget
    // covering their date. Transfers and incomes never touch budgets.
    if matches!(
        effect.kind,
        TransactionKind::Expense | TransactionKind::Contribution
    ) {
        if let Some(category_id) = effect.category_id {
            if let Some(budget) = matched_budget(db, category_id, effect.occurred_on).await? {
                deltas.push(Delta {
                    target: AggregateTarget::Budget(parse_entity_uuid(&budget.id, "budget")?),
                    amount_minor: amount,
                });
            }
        }
    }
    Ok(deltas)
}

/// Sums deltas per target, keeping first-appearance order and dropping
/// entries that cancel out (a reversal immediately re-applied).
fn coalesce(deltas: Vec<Delta>) -> Vec<Delta> {
    let mut order: Vec<AggregateTarget> = Vec::with_capacity(deltas.len());
    let mut sums: HashMap<AggregateTarget, i64> = HashMap::with_capacity(deltas.len());
    for delta in deltas {
        sums.entry(delta.target)
            .and_modify(|sum| *sum += delta.amount_minor)
            .or_insert_with(|| {
                order.push(delta.target);
                delta.amount_minor
            });
    }
    order
        .into_iter()
        .filter_map(|target| {
            let amount_minor = sums.get(&target).copied().unwrap_or(0);
            (amount_minor != 0).then_some(Delta {
                target,
                amount_minor,
            })
        })
        .collect()
}

impl Engine {
    /// Applies a delta list inside `db_tx`.
    ///
    /// Overdraft is rejected on the final coalesced balance, so an edit that
    /// moves money out and back in the same mutation never trips it.
    /// A delta referencing a missing row is `Consistency`: the aggregate the
    /// reversal expected has disappeared under us.
    pub(crate) async fn apply_ledger_deltas(
        &self,
        db_tx: &impl ConnectionTrait,
        deltas: Vec<Delta>,
    ) -> ResultEngine<(Vec<BalanceChange>, Vec<LedgerEvent>)> {
        let deltas = coalesce(deltas);
        let mut balances = Vec::new();
        let mut events = Vec::new();
        for delta in deltas {
            match delta.target {
                AggregateTarget::Account(account_id) => {
                    let change = self
                        .apply_account_delta(db_tx, account_id, delta.amount_minor)
                        .await?;
                    balances.push(change);
                }
                AggregateTarget::Budget(budget_id) => {
                    let model = self
                        .apply_budget_delta(db_tx, budget_id, delta.amount_minor)
                        .await?;
                    if delta.amount_minor > 0 {
                        if let Some(event) = self.trigger_budget_alert_tx(db_tx, &model).await? {
                            events.push(event);
                        }
                    }
                }
                AggregateTarget::Goal(goal_id) => {
                    if let Some(event) = self
                        .apply_goal_delta(db_tx, goal_id, delta.amount_minor)
                        .await?
                    {
                        events.push(event);
                    }
                }
            }
        }
        Ok((balances, events))
    }

    async fn apply_account_delta(
        &self,
        db_tx: &impl ConnectionTrait,
        account_id: Uuid,
        amount_minor: i64,
    ) -> ResultEngine<BalanceChange> {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| {
                EngineError::Consistency(format!("account {account_id} vanished mid-mutation"))
            })?;
        let kind = AccountKind::try_from(model.kind.as_str())?;
        let balance_minor = model.balance_minor + amount_minor;
        if balance_minor < 0 && !kind.allows_negative() {
            return Err(EngineError::InsufficientFunds(format!(
                "account {} would be overdrawn",
                model.name
            )));
        }
        let active = accounts::ActiveModel {
            id: ActiveValue::Set(model.id),
            balance_minor: ActiveValue::Set(balance_minor),
            ..Default::default()
        };
        active.update(db_tx).await?;
        Ok(BalanceChange {
            account_id,
            balance_minor,
        })
    }

    async fn apply_budget_delta(
        &self,
        db_tx: &impl ConnectionTrait,
        budget_id: Uuid,
        amount_minor: i64,
    ) -> ResultEngine<budgets::Model> {
        let model = budgets::Entity::find_by_id(budget_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| {
                EngineError::Consistency(format!("budget {budget_id} vanished mid-mutation"))
            })?;
        let spent_minor = model.spent_minor + amount_minor;
        if spent_minor < 0 {
            tracing::warn!(budget_id = %budget_id, spent_minor, "budget spending went negative");
        }
        let active = budgets::ActiveModel {
            id: ActiveValue::Set(model.id.clone()),
            spent_minor: ActiveValue::Set(spent_minor),
            ..Default::default()
        };
        let updated = active.update(db_tx).await?;
        Ok(updated)
    }

    async fn apply_goal_delta(
        &self,
        db_tx: &impl ConnectionTrait,
        goal_id: Uuid,
        amount_minor: i64,
    ) -> ResultEngine<Option<LedgerEvent>> {
        let model = goals::Entity::find_by_id(goal_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| {
                EngineError::Consistency(format!("goal {goal_id} vanished mid-mutation"))
            })?;
        let previous = GoalStatus::try_from(model.status.as_str())?;
        let current_amount_minor = model.current_amount_minor + amount_minor;
        let status = crate::goals::derived_status(
            previous,
            current_amount_minor,
            model.target_amount_minor,
        );
        let active = goals::ActiveModel {
            id: ActiveValue::Set(model.id),
            current_amount_minor: ActiveValue::Set(current_amount_minor),
            status: ActiveValue::Set(status.as_str().to_string()),
            ..Default::default()
        };
        active.update(db_tx).await?;
        let event = match (previous, status) {
            (p, GoalStatus::Completed) if p != GoalStatus::Completed => {
                tracing::info!(goal_id = %goal_id, "goal completed");
                Some(LedgerEvent::GoalCompleted { goal_id })
            }
            (GoalStatus::Completed, s) if s != GoalStatus::Completed => {
                tracing::info!(goal_id = %goal_id, "goal reopened");
                Some(LedgerEvent::GoalReopened { goal_id })
            }
            _ => None,
        };
        Ok(event)
    }
}
