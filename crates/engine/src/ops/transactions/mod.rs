//! Ledger transaction operations.
//!
//! Create, update, and delete share one shape validator and one aggregate
//! pipeline. Updates and deletes reverse the stored row's deltas before
//! applying the replacement's, so aggregates stay exact across any edit.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Transaction, TransactionKind, transactions,
    ops::{Engine, access},
};

mod create;
mod delete;
mod update;

/// The referential fields of a transaction, merged from a command and (for
/// edits) the stored row, validated as one unit.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TxShape<'a> {
    pub user_id: &'a str,
    pub kind: TransactionKind,
    pub account_id: Uuid,
    pub transfer_account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub goal_id: Option<Uuid>,
}

/// Kind-specific referential rules.
///
/// Each kind admits exactly the references it needs: stray fields are
/// rejected rather than ignored, so a caller bug surfaces as `Validation`
/// instead of silently dropped data.
pub(crate) async fn validate_shape(
    db: &impl ConnectionTrait,
    shape: TxShape<'_>,
) -> ResultEngine<()> {
    let account = access::require_account(db, shape.user_id, shape.account_id, true).await?;
    match shape.kind {
        TransactionKind::Income | TransactionKind::Expense => {
            if shape.transfer_account_id.is_some() || shape.goal_id.is_some() {
                return Err(EngineError::Validation(format!(
                    "{} transactions take no transfer account or goal",
                    shape.kind.as_str()
                )));
            }
            let category_id = shape.category_id.ok_or_else(|| {
                EngineError::Validation(format!(
                    "{} transactions require a category",
                    shape.kind.as_str()
                ))
            })?;
            let category = access::require_category(db, shape.user_id, category_id).await?;
            if !category.kind.matches(shape.kind) {
                return Err(EngineError::Validation(format!(
                    "category {} cannot label {} transactions",
                    category.name,
                    shape.kind.as_str()
                )));
            }
        }
        TransactionKind::Transfer => {
            if shape.category_id.is_some() || shape.goal_id.is_some() {
                return Err(EngineError::Validation(
                    "transfer transactions take no category or goal".to_string(),
                ));
            }
            let to_id = shape.transfer_account_id.ok_or_else(|| {
                EngineError::Validation(
                    "transfer transactions require a destination account".to_string(),
                )
            })?;
            if to_id == shape.account_id {
                return Err(EngineError::Validation(
                    "transfer needs two distinct accounts".to_string(),
                ));
            }
            let to = access::require_account(db, shape.user_id, to_id, true).await?;
            if to.currency != account.currency {
                return Err(EngineError::CurrencyMismatch(format!(
                    "{} to {}",
                    account.currency.code(),
                    to.currency.code()
                )));
            }
        }
        TransactionKind::Contribution => {
            if shape.transfer_account_id.is_some() {
                return Err(EngineError::Validation(
                    "contribution transactions take no transfer account".to_string(),
                ));
            }
            let goal_id = shape.goal_id.ok_or_else(|| {
                EngineError::Validation("contribution transactions require a goal".to_string())
            })?;
            let goal = access::require_goal_contribute(db, shape.user_id, goal_id).await?;
            if !goal.status.accepts_contributions() {
                return Err(EngineError::GoalInactive(goal.name));
            }
            if let Some(category_id) = shape.category_id {
                let category = access::require_category(db, shape.user_id, category_id).await?;
                if !category.kind.matches(shape.kind) {
                    return Err(EngineError::Validation(format!(
                        "category {} cannot label contribution transactions",
                        category.name
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Loads a live (non-deleted) transaction owned by `user_id`.
pub(crate) async fn require_live_transaction(
    db: &impl ConnectionTrait,
    user_id: &str,
    transaction_id: Uuid,
) -> ResultEngine<Transaction> {
    let model = transactions::Entity::find_by_id(transaction_id.to_string())
        .filter(transactions::Column::UserId.eq(user_id))
        .filter(transactions::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound("transaction".to_string()))?;
    Transaction::try_from(model)
}

impl Engine {
    pub async fn get_transaction(
        &self,
        user_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        require_live_transaction(&self.database, user_id, transaction_id).await
    }

    /// Live transactions of one user, newest first.
    pub async fn list_transactions(&self, user_id: &str) -> ResultEngine<Vec<Transaction>> {
        access::require_user(&self.database, user_id).await?;
        let models = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::DeletedAt.is_null())
            .order_by_desc(transactions::Column::OccurredOn)
            .order_by_desc(transactions::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(Transaction::try_from).collect()
    }
}
