use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, transactions::TransactionKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// A category can only label transactions of its own direction.
    ///
    /// Contributions may carry an expense category for bookkeeping budgets;
    /// transfers never carry one.
    #[must_use]
    pub fn matches(self, kind: TransactionKind) -> bool {
        match kind {
            TransactionKind::Income => self == Self::Income,
            TransactionKind::Expense | TransactionKind::Contribution => self == Self::Expense,
            TransactionKind::Transfer => false,
        }
    }
}

impl TryFrom<&str> for CategoryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::Validation(format!(
                "invalid category kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub kind: CategoryKind,
    pub monthly_budget_minor: Option<i64>,
}

impl Category {
    pub fn new(
        user_id: String,
        name: String,
        kind: CategoryKind,
        monthly_budget_minor: Option<i64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            kind,
            monthly_budget_minor,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub kind: String,
    pub monthly_budget_minor: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::budgets::Entity")]
    Budgets,
}

impl Related<super::budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Category> for ActiveModel {
    fn from(category: &Category) -> Self {
        Self {
            id: ActiveValue::Set(category.id.to_string()),
            user_id: ActiveValue::Set(category.user_id.clone()),
            name: ActiveValue::Set(category.name.clone()),
            kind: ActiveValue::Set(category.kind.as_str().to_string()),
            monthly_budget_minor: ActiveValue::Set(category.monthly_budget_minor),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("category".to_string()))?,
            user_id: model.user_id,
            name: model.name,
            kind: CategoryKind::try_from(model.kind.as_str())?,
            monthly_budget_minor: model.monthly_budget_minor,
        })
    }
}
