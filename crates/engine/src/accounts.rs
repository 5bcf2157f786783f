//! Account primitives.
//!
//! An `Account` holds money. Its `balance_minor` is a denormalized aggregate:
//! `opening_balance_minor` plus the signed effect of every non-deleted
//! transaction referencing it, maintained by the ops layer.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
    Investment,
    Cash,
    Other,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Investment => "investment",
            Self::Cash => "cash",
            Self::Other => "other",
        }
    }

    /// Whether the account may carry a negative balance.
    ///
    /// Credit accounts are revolving by nature; every other kind rejects
    /// mutations that would overdraw it.
    #[must_use]
    pub fn allows_negative(self) -> bool {
        matches!(self, Self::Credit)
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit" => Ok(Self::Credit),
            "investment" => Ok(Self::Investment),
            "cash" => Ok(Self::Cash),
            "other" => Ok(Self::Other),
            other => Err(EngineError::Validation(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub kind: AccountKind,
    pub opening_balance_minor: i64,
    pub balance_minor: i64,
    pub currency: Currency,
    pub is_default: bool,
    pub archived: bool,
}

impl Account {
    pub fn new(
        user_id: String,
        name: String,
        kind: AccountKind,
        opening_balance_minor: i64,
        currency: Currency,
    ) -> ResultEngine<Self> {
        if opening_balance_minor < 0 && !kind.allows_negative() {
            return Err(EngineError::InvalidAmount(
                "opening balance must not be negative for this account kind".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            kind,
            opening_balance_minor,
            balance_minor: opening_balance_minor,
            currency,
            is_default: false,
            archived: false,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub kind: String,
    pub opening_balance_minor: i64,
    pub balance_minor: i64,
    pub currency: String,
    pub is_default: bool,
    pub archived: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            user_id: ActiveValue::Set(account.user_id.clone()),
            name: ActiveValue::Set(account.name.clone()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            opening_balance_minor: ActiveValue::Set(account.opening_balance_minor),
            balance_minor: ActiveValue::Set(account.balance_minor),
            currency: ActiveValue::Set(account.currency.code().to_string()),
            is_default: ActiveValue::Set(account.is_default),
            archived: ActiveValue::Set(account.archived),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("account".to_string()))?,
            user_id: model.user_id,
            name: model.name,
            kind: AccountKind::try_from(model.kind.as_str())?,
            opening_balance_minor: model.opening_balance_minor,
            balance_minor: model.balance_minor,
            currency: Currency::try_from(model.currency.as_str()).unwrap_or_default(),
            is_default: model.is_default,
            archived: model.archived,
        })
    }
}
