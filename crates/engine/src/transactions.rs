//! Transaction primitives.
//!
//! A `Transaction` is the unit of the ledger. Every aggregate in the engine
//! (account balance, budget spent, goal progress) is a sum of signed
//! transaction effects; the ops layer keeps those sums consistent on every
//! insert, edit, and delete.
//!
//! Deletes are soft (`deleted_at`/`deleted_by`) so the ledger stays
//! auditable. `version` supports optimistic concurrency on edits.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
    Contribution,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
            Self::Contribution => "contribution",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            "contribution" => Ok(Self::Contribution),
            other => Err(EngineError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub account_id: Uuid,
    pub transfer_account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub goal_id: Option<Uuid>,
    pub occurred_on: NaiveDate,
    pub note: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        kind: TransactionKind,
        amount_minor: i64,
        account_id: Uuid,
        transfer_account_id: Option<Uuid>,
        category_id: Option<Uuid>,
        goal_id: Option<Uuid>,
        occurred_on: NaiveDate,
        note: Option<String>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            amount_minor,
            account_id,
            transfer_account_id,
            category_id,
            goal_id,
            occurred_on,
            note,
            deleted_at: None,
            deleted_by: None,
            version: 1,
            created_at: Utc::now(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub amount_minor: i64,
    pub account_id: String,
    pub transfer_account_id: Option<String>,
    pub category_id: Option<String>,
    pub goal_id: Option<String>,
    pub occurred_on: Date,
    pub note: Option<String>,
    pub deleted_at: Option<DateTimeUtc>,
    pub deleted_by: Option<String>,
    pub version: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Accounts,
    #[sea_orm(
        belongs_to = "super::goals::Entity",
        from = "Column::GoalId",
        to = "super::goals::Column::Id"
    )]
    Goals,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::goals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Goals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            transfer_account_id: ActiveValue::Set(
                tx.transfer_account_id.map(|id| id.to_string()),
            ),
            category_id: ActiveValue::Set(tx.category_id.map(|id| id.to_string())),
            goal_id: ActiveValue::Set(tx.goal_id.map(|id| id.to_string())),
            occurred_on: ActiveValue::Set(tx.occurred_on),
            note: ActiveValue::Set(tx.note.clone()),
            deleted_at: ActiveValue::Set(tx.deleted_at),
            deleted_by: ActiveValue::Set(tx.deleted_by.clone()),
            version: ActiveValue::Set(tx.version),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let parse = |s: &str, what: &str| {
            Uuid::parse_str(s).map_err(|_| EngineError::NotFound(what.to_string()))
        };
        Ok(Self {
            id: parse(&model.id, "transaction")?,
            user_id: model.user_id,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            account_id: parse(&model.account_id, "account")?,
            transfer_account_id: model
                .transfer_account_id
                .as_deref()
                .map(|s| parse(s, "account"))
                .transpose()?,
            category_id: model
                .category_id
                .as_deref()
                .map(|s| parse(s, "category"))
                .transpose()?,
            goal_id: model
                .goal_id
                .as_deref()
                .map(|s| parse(s, "goal"))
                .transpose()?,
            occurred_on: model.occurred_on,
            note: model.note,
            deleted_at: model.deleted_at,
            deleted_by: model.deleted_by,
            version: model.version,
            created_at: model.created_at,
        })
    }
}
