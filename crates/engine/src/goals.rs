//! Goal primitives.
//!
//! A `Goal` tracks saving progress toward a target. Its
//! `current_amount_minor` is a denormalized aggregate: the sum of non-deleted
//! contribution transactions referencing it. `Completed` is derived state —
//! the ops layer flips it in both directions as contributions are created,
//! edited, or deleted.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, budgets::percent_bp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    NotStarted,
    InProgress,
    Completed,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the goal still accepts contributions.
    ///
    /// `Completed` stays open on purpose: completion is derived from the
    /// ledger and reverts when an edit drops the total back below target.
    #[must_use]
    pub fn accepts_contributions(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl TryFrom<&str> for GoalStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::Validation(format!(
                "invalid goal status: {other}"
            ))),
        }
    }
}

/// Derives the status a goal should carry for a given progress amount.
///
/// `Cancelled` is sticky; the other states follow the ledger.
#[must_use]
pub fn derived_status(
    current: GoalStatus,
    current_amount_minor: i64,
    target_amount_minor: i64,
) -> GoalStatus {
    if current == GoalStatus::Cancelled {
        return GoalStatus::Cancelled;
    }
    if current_amount_minor >= target_amount_minor {
        GoalStatus::Completed
    } else if current_amount_minor > 0 {
        GoalStatus::InProgress
    } else {
        GoalStatus::NotStarted
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: String,
    pub family_id: Option<String>,
    pub name: String,
    pub target_amount_minor: i64,
    pub current_amount_minor: i64,
    pub target_date: Option<NaiveDate>,
    pub priority: i32,
    pub status: GoalStatus,
    pub is_family_goal: bool,
}

impl Goal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        family_id: Option<String>,
        name: String,
        target_amount_minor: i64,
        target_date: Option<NaiveDate>,
        priority: i32,
    ) -> ResultEngine<Self> {
        if target_amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "goal target_amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            is_family_goal: family_id.is_some(),
            family_id,
            name,
            target_amount_minor,
            current_amount_minor: 0,
            target_date,
            priority,
            status: GoalStatus::NotStarted,
        })
    }
}

/// Progress snapshot returned by goal mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub current_amount_minor: i64,
    pub target_amount_minor: i64,
    pub percent_bp: i64,
    pub completed: bool,
}

impl GoalProgress {
    #[must_use]
    pub fn new(current_amount_minor: i64, target_amount_minor: i64, status: GoalStatus) -> Self {
        Self {
            current_amount_minor,
            target_amount_minor,
            percent_bp: percent_bp(current_amount_minor, target_amount_minor),
            completed: status == GoalStatus::Completed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "goals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub family_id: Option<String>,
    pub name: String,
    pub target_amount_minor: i64,
    pub current_amount_minor: i64,
    pub target_date: Option<Date>,
    pub priority: i32,
    pub status: String,
    pub is_family_goal: bool,
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

impl From<&Goal> for ActiveModel {
    fn from(goal: &Goal) -> Self {
        Self {
            id: ActiveValue::Set(goal.id.to_string()),
            user_id: ActiveValue::Set(goal.user_id.clone()),
            family_id: ActiveValue::Set(goal.family_id.clone()),
            name: ActiveValue::Set(goal.name.clone()),
            target_amount_minor: ActiveValue::Set(goal.target_amount_minor),
            current_amount_minor: ActiveValue::Set(goal.current_amount_minor),
            target_date: ActiveValue::Set(goal.target_date),
            priority: ActiveValue::Set(goal.priority),
            status: ActiveValue::Set(goal.status.as_str().to_string()),
            is_family_goal: ActiveValue::Set(goal.is_family_goal),
        }
    }
}

impl TryFrom<Model> for Goal {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id).map_err(|_| EngineError::NotFound("goal".to_string()))?,
            user_id: model.user_id,
            family_id: model.family_id,
            name: model.name,
            target_amount_minor: model.target_amount_minor,
            current_amount_minor: model.current_amount_minor,
            target_date: model.target_date,
            priority: model.priority,
            status: GoalStatus::try_from(model.status.as_str())?,
            is_family_goal: model.is_family_goal,
        })
    }
}
