//! Full aggregate recomputation.
//!
//! Maintenance path: rebuilds every denormalized aggregate from the live
//! ledger. The incremental deltas keep aggregates exact in normal operation;
//! this exists for recovery after manual data surgery or a crashed backend.

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
};

use crate::{
    GoalStatus, ResultEngine, Transaction, accounts, budgets, goals, transactions,
    ops::{
        BalanceChange, Engine,
        aggregates::{self, AggregateTarget, TxEffect},
        parse_entity_uuid, with_retry, with_tx,
    },
};

impl Engine {
    /// Recomputes every account balance, budget spending, and goal progress
    /// from the live ledger, in one transaction.
    ///
    /// Alerts are not evaluated here: recomputation restates existing
    /// spending, it does not record new spending.
    pub async fn recompute_aggregates(&self) -> ResultEngine<Vec<BalanceChange>> {
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let mut sums: HashMap<AggregateTarget, i64> = HashMap::new();
                let models = transactions::Entity::find()
                    .filter(transactions::Column::DeletedAt.is_null())
                    .order_by_asc(transactions::Column::OccurredOn)
                    .order_by_asc(transactions::Column::CreatedAt)
                    .all(&db_tx)
                    .await?;
                for model in models {
                    let tx = Transaction::try_from(model)?;
                    let deltas =
                        aggregates::effect_deltas(&db_tx, &TxEffect::from(&tx), 1).await?;
                    for delta in deltas {
                        *sums.entry(delta.target).or_insert(0) += delta.amount_minor;
                    }
                }

                let mut changes = Vec::new();
                for model in accounts::Entity::find().all(&db_tx).await? {
                    let account_id = parse_entity_uuid(&model.id, "account")?;
                    let replayed = sums
                        .get(&AggregateTarget::Account(account_id))
                        .copied()
                        .unwrap_or(0);
                    let balance_minor = model.opening_balance_minor + replayed;
                    if balance_minor != model.balance_minor {
                        tracing::warn!(
                            account_id = %model.id,
                            stored = model.balance_minor,
                            replayed = balance_minor,
                            "account balance drifted, correcting"
                        );
                    }
                    let active = accounts::ActiveModel {
                        id: ActiveValue::Set(model.id),
                        balance_minor: ActiveValue::Set(balance_minor),
                        ..Default::default()
                    };
                    active.update(&db_tx).await?;
                    changes.push(BalanceChange {
                        account_id,
                        balance_minor,
                    });
                }

                for model in budgets::Entity::find().all(&db_tx).await? {
                    let budget_id = parse_entity_uuid(&model.id, "budget")?;
                    let spent_minor = sums
                        .get(&AggregateTarget::Budget(budget_id))
                        .copied()
                        .unwrap_or(0);
                    let active = budgets::ActiveModel {
                        id: ActiveValue::Set(model.id),
                        spent_minor: ActiveValue::Set(spent_minor),
                        ..Default::default()
                    };
                    active.update(&db_tx).await?;
                }

                for model in goals::Entity::find().all(&db_tx).await? {
                    let goal_id = parse_entity_uuid(&model.id, "goal")?;
                    let current_amount_minor = sums
                        .get(&AggregateTarget::Goal(goal_id))
                        .copied()
                        .unwrap_or(0);
                    let previous = GoalStatus::try_from(model.status.as_str())?;
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
                    active.update(&db_tx).await?;
                }

                tracing::info!(accounts = changes.len(), "aggregates recomputed from ledger");
                Ok(changes)
            })
        )
    }
}
