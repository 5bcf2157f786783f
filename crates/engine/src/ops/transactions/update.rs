use sea_orm::{ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::{
    EngineError, ResultEngine, Transaction, UpdateTransactionCmd, transactions,
    ops::{
        Engine, MutationOutcome,
        access,
        aggregates::{self, TxEffect},
        normalize_optional_text, with_retry, with_tx,
    },
};

impl Engine {
    /// Edits a live transaction.
    ///
    /// The stored row's aggregate effects are reversed and the edited row's
    /// applied in the same transaction, so moving an expense between
    /// accounts, categories, or dates never double-counts. The kind of a
    /// transaction is immutable; record a new one instead.
    ///
    /// With `expected_version` set the edit is a compare-and-swap: a
    /// concurrent writer bumping the version first fails this call with
    /// `ConcurrentModification` and no effect.
    pub async fn update_transaction(
        &self,
        cmd: UpdateTransactionCmd,
    ) -> ResultEngine<MutationOutcome> {
        if let Some(amount_minor) = cmd.amount_minor {
            self.validate_amount(amount_minor)?;
        }
        access::require_user(&self.database, &cmd.user_id).await?;
        let cmd = &cmd;
        with_retry!(
            self,
            with_tx!(self, |db_tx| self.update_transaction_tx(&db_tx, cmd).await)
        )
    }

    async fn update_transaction_tx(
        &self,
        db_tx: &impl ConnectionTrait,
        cmd: &UpdateTransactionCmd,
    ) -> ResultEngine<MutationOutcome> {
        let stored =
            super::require_live_transaction(db_tx, &cmd.user_id, cmd.transaction_id).await?;
        if let Some(expected) = cmd.expected_version {
            if expected != stored.version {
                return Err(EngineError::ConcurrentModification(format!(
                    "transaction is at version {}, caller expected {expected}",
                    stored.version
                )));
            }
        }
        let edited = Transaction {
            id: stored.id,
            user_id: stored.user_id.clone(),
            kind: stored.kind,
            amount_minor: cmd.amount_minor.unwrap_or(stored.amount_minor),
            account_id: cmd.account_id.unwrap_or(stored.account_id),
            transfer_account_id: cmd
                .transfer_account_id
                .unwrap_or(stored.transfer_account_id),
            category_id: cmd.category_id.unwrap_or(stored.category_id),
            goal_id: cmd.goal_id.unwrap_or(stored.goal_id),
            occurred_on: cmd.occurred_on.unwrap_or(stored.occurred_on),
            note: match cmd.note.as_deref() {
                Some(note) => normalize_optional_text(Some(note)),
                None => stored.note.clone(),
            },
            deleted_at: None,
            deleted_by: None,
            version: stored.version + 1,
            created_at: stored.created_at,
        };
        super::validate_shape(
            db_tx,
            super::TxShape {
                user_id: &edited.user_id,
                kind: edited.kind,
                account_id: edited.account_id,
                transfer_account_id: edited.transfer_account_id,
                category_id: edited.category_id,
                goal_id: edited.goal_id,
            },
        )
        .await?;

        let mut deltas = aggregates::effect_deltas(db_tx, &TxEffect::from(&stored), -1).await?;
        deltas.extend(aggregates::effect_deltas(db_tx, &TxEffect::from(&edited), 1).await?);

        let mut active = transactions::ActiveModel::from(&edited);
        active.id = ActiveValue::NotSet;
        let result = transactions::Entity::update_many()
            .set(active)
            .filter(transactions::Column::Id.eq(edited.id.to_string()))
            .filter(transactions::Column::Version.eq(stored.version))
            .exec(db_tx)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::ConcurrentModification(
                "transaction was modified concurrently".to_string(),
            ));
        }

        let (updated_balances, events) = self.apply_ledger_deltas(db_tx, deltas).await?;
        tracing::debug!(
            transaction_id = %edited.id,
            version = edited.version,
            "transaction updated"
        );
        Ok(MutationOutcome {
            transaction_id: edited.id,
            updated_balances,
            events,
        })
    }
}
