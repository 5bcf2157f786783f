//! Account operations.

use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

use crate::{
    Account, CreateAccountCmd, EngineError, ResultEngine, accounts,
    ops::{Engine, access, with_retry, with_tx},
};

impl Engine {
    /// Opens an account. The first account of a user becomes the default
    /// regardless of the command; marking a later one default demotes the
    /// previous holder in the same transaction, so exactly one default
    /// exists per user at all times.
    pub async fn create_account(&self, cmd: CreateAccountCmd) -> ResultEngine<Account> {
        let name = self.sanitize_name(&cmd.name, "account")?;
        access::require_user(&self.database, &cmd.user_id).await?;
        let cmd = &cmd;
        let name = &name;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let existing = accounts::Entity::find()
                    .filter(accounts::Column::UserId.eq(cmd.user_id.as_str()))
                    .count(&db_tx)
                    .await?;
                let duplicate = accounts::Entity::find()
                    .filter(accounts::Column::UserId.eq(cmd.user_id.as_str()))
                    .filter(accounts::Column::Name.eq(name.as_str()))
                    .filter(accounts::Column::Archived.eq(false))
                    .one(&db_tx)
                    .await?;
                if duplicate.is_some() {
                    return Err(EngineError::AlreadyExists(name.clone()));
                }
                let mut account = Account::new(
                    cmd.user_id.clone(),
                    name.clone(),
                    cmd.kind,
                    cmd.opening_balance_minor,
                    cmd.currency,
                )?;
                account.is_default = cmd.is_default || existing == 0;
                if account.is_default && existing > 0 {
                    let holders = accounts::Entity::find()
                        .filter(accounts::Column::UserId.eq(cmd.user_id.as_str()))
                        .filter(accounts::Column::IsDefault.eq(true))
                        .all(&db_tx)
                        .await?;
                    for holder in holders {
                        let active = accounts::ActiveModel {
                            id: ActiveValue::Set(holder.id),
                            is_default: ActiveValue::Set(false),
                            ..Default::default()
                        };
                        active.update(&db_tx).await?;
                    }
                }
                accounts::ActiveModel::from(&account).insert(&db_tx).await?;
                tracing::debug!(account_id = %account.id, name = %account.name, "account created");
                Ok(account)
            })
        )
    }

    pub async fn get_account(&self, user_id: &str, account_id: Uuid) -> ResultEngine<Account> {
        access::require_account(&self.database, user_id, account_id, false).await
    }

    /// Accounts of one user, default first, then by name.
    pub async fn list_accounts(&self, user_id: &str) -> ResultEngine<Vec<Account>> {
        access::require_user(&self.database, user_id).await?;
        let models = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .order_by_desc(accounts::Column::IsDefault)
            .order_by_asc(accounts::Column::Name)
            .all(&self.database)
            .await?;
        models.into_iter().map(Account::try_from).collect()
    }

    /// Archives an account. Archived accounts keep their history and
    /// balance but reject new ledger writes.
    pub async fn archive_account(&self, user_id: &str, account_id: Uuid) -> ResultEngine<Account> {
        access::require_user(&self.database, user_id).await?;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let account =
                    access::require_account(&db_tx, user_id, account_id, false).await?;
                if account.archived {
                    return Err(EngineError::Validation(
                        "account is already archived".to_string(),
                    ));
                }
                if account.is_default {
                    return Err(EngineError::Validation(
                        "the default account cannot be archived".to_string(),
                    ));
                }
                let active = accounts::ActiveModel {
                    id: ActiveValue::Set(account.id.to_string()),
                    archived: ActiveValue::Set(true),
                    ..Default::default()
                };
                let model = active.update(&db_tx).await?;
                Account::try_from(model)
            })
        )
    }
}
