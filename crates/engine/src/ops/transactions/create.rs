use sea_orm::{ActiveModelTrait, ConnectionTrait};

use crate::{
    CreateTransactionCmd, ResultEngine, Transaction, transactions,
    ops::{
        Engine, MutationOutcome, access,
        aggregates::{self, TxEffect},
        normalize_optional_text, with_retry, with_tx,
    },
};

impl Engine {
    /// Records a ledger transaction and settles every aggregate it touches
    /// in one transaction: account balances, the covering budget's spending
    /// (alerts included), and goal progress.
    pub async fn create_transaction(
        &self,
        cmd: CreateTransactionCmd,
    ) -> ResultEngine<MutationOutcome> {
        self.validate_amount(cmd.amount_minor)?;
        access::require_user(&self.database, &cmd.user_id).await?;
        let cmd = &cmd;
        with_retry!(
            self,
            with_tx!(self, |db_tx| self.create_transaction_tx(&db_tx, cmd).await)
        )
    }

    pub(crate) async fn create_transaction_tx(
        &self,
        db_tx: &impl ConnectionTrait,
        cmd: &CreateTransactionCmd,
    ) -> ResultEngine<MutationOutcome> {
        super::validate_shape(
            db_tx,
            super::TxShape {
                user_id: &cmd.user_id,
                kind: cmd.kind,
                account_id: cmd.account_id,
                transfer_account_id: cmd.transfer_account_id,
                category_id: cmd.category_id,
                goal_id: cmd.goal_id,
            },
        )
        .await?;
        let tx = Transaction::new(
            cmd.user_id.clone(),
            cmd.kind,
            cmd.amount_minor,
            cmd.account_id,
            cmd.transfer_account_id,
            cmd.category_id,
            cmd.goal_id,
            cmd.occurred_on,
            normalize_optional_text(cmd.note.as_deref()),
        )?;
        transactions::ActiveModel::from(&tx).insert(db_tx).await?;
        let deltas = aggregates::effect_deltas(db_tx, &TxEffect::from(&tx), 1).await?;
        let (updated_balances, events) = self.apply_ledger_deltas(db_tx, deltas).await?;
        tracing::debug!(
            transaction_id = %tx.id,
            kind = tx.kind.as_str(),
            amount_minor = tx.amount_minor,
            "transaction recorded"
        );
        Ok(MutationOutcome {
            transaction_id: tx.id,
            updated_balances,
            events,
        })
    }
}
