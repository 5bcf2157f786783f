use chrono::Utc;
use sea_orm::{ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::{
    DeleteTransactionCmd, EngineError, ResultEngine, transactions,
    ops::{
        Engine, MutationOutcome,
        access,
        aggregates::{self, TxEffect},
        with_retry, with_tx,
    },
};

impl Engine {
    /// Soft-deletes a transaction and reverses its aggregate effects.
    ///
    /// The row stays in the ledger (`deleted_at`/`deleted_by` set) so the
    /// history remains auditable; only live rows count toward balances,
    /// spending, and goal progress. Deleting twice is `NotFound`.
    pub async fn delete_transaction(
        &self,
        cmd: DeleteTransactionCmd,
    ) -> ResultEngine<MutationOutcome> {
        access::require_user(&self.database, &cmd.user_id).await?;
        let cmd = &cmd;
        with_retry!(
            self,
            with_tx!(self, |db_tx| self.delete_transaction_tx(&db_tx, cmd).await)
        )
    }

    async fn delete_transaction_tx(
        &self,
        db_tx: &impl ConnectionTrait,
        cmd: &DeleteTransactionCmd,
    ) -> ResultEngine<MutationOutcome> {
        let stored =
            super::require_live_transaction(db_tx, &cmd.user_id, cmd.transaction_id).await?;
        let deltas = aggregates::effect_deltas(db_tx, &TxEffect::from(&stored), -1).await?;

        let active = transactions::ActiveModel {
            deleted_at: ActiveValue::Set(Some(Utc::now())),
            deleted_by: ActiveValue::Set(Some(cmd.user_id.clone())),
            version: ActiveValue::Set(stored.version + 1),
            ..Default::default()
        };
        let result = transactions::Entity::update_many()
            .set(active)
            .filter(transactions::Column::Id.eq(stored.id.to_string()))
            .filter(transactions::Column::Version.eq(stored.version))
            .filter(transactions::Column::DeletedAt.is_null())
            .exec(db_tx)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::ConcurrentModification(
                "transaction was modified concurrently".to_string(),
            ));
        }

        let (updated_balances, events) = self.apply_ledger_deltas(db_tx, deltas).await?;
        tracing::debug!(transaction_id = %stored.id, "transaction deleted");
        Ok(MutationOutcome {
            transaction_id: stored.id,
            updated_balances,
            events,
        })
    }
}
