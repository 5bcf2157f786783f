//! Budget primitives.
//!
//! A `Budget` caps spending for one expense category over one period. Its
//! `spent_minor` is a denormalized aggregate maintained by the ops layer:
//! the sum of non-deleted expense amounts whose category and date fall
//! within the budget's category/period.
//!
//! `alert_threshold_bp` is the warning threshold in basis points of the
//! budget amount (8_000 = 80%). Thresholds and percentages are kept as
//! integer basis points end to end so alert math never touches floats.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Basis points in a whole (100%).
pub const FULL_BP: i64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Month,
    Quarter,
    Year,
}

impl BudgetPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    /// Number of whole months the period spans.
    #[must_use]
    pub const fn months(self) -> u32 {
        match self {
            Self::Month => 1,
            Self::Quarter => 3,
            Self::Year => 12,
        }
    }
}

impl TryFrom<&str> for BudgetPeriod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            other => Err(EngineError::Validation(format!(
                "invalid budget period: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetState {
    Active,
    Paused,
    Completed,
}

impl BudgetState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

impl TryFrom<&str> for BudgetState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(EngineError::Validation(format!(
                "invalid budget status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub user_id: String,
    pub family_id: Option<String>,
    pub category_id: Uuid,
    pub name: String,
    pub amount_minor: i64,
    pub spent_minor: i64,
    pub period: BudgetPeriod,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub alert_threshold_bp: i64,
    pub alert_enabled: bool,
    pub status: BudgetState,
}

impl Budget {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        family_id: Option<String>,
        category_id: Uuid,
        name: String,
        amount_minor: i64,
        period: BudgetPeriod,
        starts_on: NaiveDate,
        alert_threshold_bp: i64,
        alert_enabled: bool,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "budget amount_minor must be > 0".to_string(),
            ));
        }
        if !(0..=FULL_BP).contains(&alert_threshold_bp) {
            return Err(EngineError::Validation(
                "alert_threshold must be between 0 and 1".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            family_id,
            category_id,
            name,
            amount_minor,
            spent_minor: 0,
            period,
            starts_on,
            ends_on: period_end(starts_on, period),
            alert_threshold_bp,
            alert_enabled,
            status: BudgetState::Active,
        })
    }

    /// Whether `date` falls inside the budget's period (inclusive bounds).
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.starts_on <= date && date <= self.ends_on
    }

    /// Spending as basis points of the budget amount (0 when amount is 0).
    #[must_use]
    pub fn percent_bp(&self) -> i64 {
        percent_bp(self.spent_minor, self.amount_minor)
    }
}

/// Spending percentage in basis points, 0 for a non-positive denominator.
#[must_use]
pub fn percent_bp(spent_minor: i64, amount_minor: i64) -> i64 {
    if amount_minor > 0 {
        spent_minor.saturating_mul(FULL_BP) / amount_minor
    } else {
        0
    }
}

/// Last day covered by a period starting on `starts_on`.
#[must_use]
pub fn period_end(starts_on: NaiveDate, period: BudgetPeriod) -> NaiveDate {
    let months = period.months();
    starts_on
        .checked_add_months(chrono::Months::new(months))
        .and_then(|d| d.checked_sub_days(chrono::Days::new(1)))
        .unwrap_or(starts_on)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub family_id: Option<String>,
    pub category_id: String,
    pub name: String,
    pub amount_minor: i64,
    pub spent_minor: i64,
    pub period: String,
    pub starts_on: Date,
    pub ends_on: Date,
    pub alert_threshold_bp: i64,
    pub alert_enabled: bool,
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Categories,
    #[sea_orm(has_many = "super::alerts::Entity")]
    Alerts,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::alerts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(budget: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(budget.id.to_string()),
            user_id: ActiveValue::Set(budget.user_id.clone()),
            family_id: ActiveValue::Set(budget.family_id.clone()),
            category_id: ActiveValue::Set(budget.category_id.to_string()),
            name: ActiveValue::Set(budget.name.clone()),
            amount_minor: ActiveValue::Set(budget.amount_minor),
            spent_minor: ActiveValue::Set(budget.spent_minor),
            period: ActiveValue::Set(budget.period.as_str().to_string()),
            starts_on: ActiveValue::Set(budget.starts_on),
            ends_on: ActiveValue::Set(budget.ends_on),
            alert_threshold_bp: ActiveValue::Set(budget.alert_threshold_bp),
            alert_enabled: ActiveValue::Set(budget.alert_enabled),
            status: ActiveValue::Set(budget.status.as_str().to_string()),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("budget".to_string()))?,
            user_id: model.user_id,
            family_id: model.family_id,
            category_id: Uuid::parse_str(&model.category_id)
                .map_err(|_| EngineError::NotFound("category".to_string()))?,
            name: model.name,
            amount_minor: model.amount_minor,
            spent_minor: model.spent_minor,
            period: BudgetPeriod::try_from(model.period.as_str())?,
            starts_on: model.starts_on,
            ends_on: model.ends_on,
            alert_threshold_bp: model.alert_threshold_bp,
            alert_enabled: model.alert_enabled,
            status: BudgetState::try_from(model.status.as_str())?,
        })
    }
}
