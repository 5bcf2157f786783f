//! Budget alert primitives.
//!
//! Alert rows are immutable: once triggered they are never edited, only
//! read back for delivery by an external channel. The evaluation rules are
//! pure functions so they can be tested without a database.
//!
//! Messages are built by concatenating pre-validated fields. User text (the
//! budget name) is only ever appended as opaque data, never interpreted as a
//! format template, so names like `Food 150.00%` or `Rent.Q1.2024` cannot
//! break message construction.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, Money, budgets::FULL_BP};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Threshold,
    Exceeded,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Exceeded => "exceeded",
        }
    }

    #[must_use]
    pub fn level(self) -> AlertLevel {
        match self {
            Self::Threshold => AlertLevel::Warning,
            Self::Exceeded => AlertLevel::Critical,
        }
    }
}

impl TryFrom<&str> for AlertKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "threshold" => Ok(Self::Threshold),
            "exceeded" => Ok(Self::Exceeded),
            other => Err(EngineError::Validation(format!(
                "invalid alert kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Alert rule: exceeded at 100%, threshold at the configured share, else
/// nothing. A zero/negative budget amount never alerts (percentage is 0).
#[must_use]
pub fn evaluate(
    amount_minor: i64,
    spent_minor: i64,
    alert_threshold_bp: i64,
    alert_enabled: bool,
) -> Option<AlertKind> {
    if !alert_enabled {
        return None;
    }
    let percent_bp = crate::budgets::percent_bp(spent_minor, amount_minor);
    if percent_bp >= FULL_BP {
        Some(AlertKind::Exceeded)
    } else if percent_bp >= alert_threshold_bp {
        Some(AlertKind::Threshold)
    } else {
        None
    }
}

/// Renders basis points as a human percentage string ("3005" -> "30.05%").
#[must_use]
pub fn format_percent_bp(percent_bp: i64) -> String {
    let sign = if percent_bp < 0 { "-" } else { "" };
    let abs = percent_bp.unsigned_abs();
    format!("{sign}{}.{:02}%", abs / 100, abs % 100)
}

/// Builds the user-facing alert message by concatenation.
///
/// The budget name is appended verbatim as data; every other fragment is
/// engine-generated. Nothing here is ever passed as a format template.
#[must_use]
pub fn build_message(
    budget_name: &str,
    kind: AlertKind,
    spent: Money,
    amount: Money,
    percent_bp: i64,
    currency: Currency,
) -> String {
    let mut msg = String::with_capacity(96);
    msg.push_str("Budget \"");
    msg.push_str(budget_name);
    match kind {
        AlertKind::Exceeded => msg.push_str("\" exceeded: "),
        AlertKind::Threshold => msg.push_str("\" reached "),
    }
    if kind == AlertKind::Threshold {
        msg.push_str(&format_percent_bp(percent_bp));
        msg.push_str(" of its limit: ");
    }
    msg.push_str(&spent.format(currency));
    msg.push_str(" of ");
    msg.push_str(&amount.format(currency));
    if kind == AlertKind::Exceeded {
        msg.push_str(" (");
        msg.push_str(&format_percent_bp(percent_bp));
        msg.push(')');
    }
    msg
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub id: Uuid,
    pub budget_id: Uuid,
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub message: String,
    pub percent_bp: i64,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budget_alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub budget_id: String,
    pub kind: String,
    pub level: String,
    pub message: String,
    pub percent_bp: i64,
    pub triggered_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budgets::Entity",
        from = "Column::BudgetId",
        to = "super::budgets::Column::Id"
    )]
    Budgets,
}

impl Related<super::budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BudgetAlert> for ActiveModel {
    fn from(alert: &BudgetAlert) -> Self {
        Self {
            id: ActiveValue::Set(alert.id.to_string()),
            budget_id: ActiveValue::Set(alert.budget_id.to_string()),
            kind: ActiveValue::Set(alert.kind.as_str().to_string()),
            level: ActiveValue::Set(alert.level.as_str().to_string()),
            message: ActiveValue::Set(alert.message.clone()),
            percent_bp: ActiveValue::Set(alert.percent_bp),
            triggered_at: ActiveValue::Set(alert.triggered_at),
        }
    }
}

impl TryFrom<Model> for BudgetAlert {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = AlertKind::try_from(model.kind.as_str())?;
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("alert".to_string()))?,
            budget_id: Uuid::parse_str(&model.budget_id)
                .map_err(|_| EngineError::NotFound("budget".to_string()))?,
            kind,
            level: kind.level(),
            message: model.message,
            percent_bp: model.percent_bp,
            triggered_at: model.triggered_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_rules() {
        // 80% threshold on a 1000.00 budget.
        assert_eq!(evaluate(100_000, 75_000, 8000, true), None);
        assert_eq!(evaluate(100_000, 80_000, 8000, true), Some(AlertKind::Threshold));
        assert_eq!(evaluate(100_000, 100_000, 8000, true), Some(AlertKind::Exceeded));
        assert_eq!(evaluate(100_000, 120_000, 8000, true), Some(AlertKind::Exceeded));
        // Disabled or zero-amount budgets never alert.
        assert_eq!(evaluate(100_000, 120_000, 8000, false), None);
        assert_eq!(evaluate(0, 120_000, 8000, true), None);
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(format_percent_bp(3005), "30.05%");
        assert_eq!(format_percent_bp(10_000), "100.00%");
        assert_eq!(format_percent_bp(12_000), "120.00%");
        assert_eq!(format_percent_bp(5), "0.05%");
    }

    #[test]
    fn message_keeps_hostile_names_verbatim() {
        let msg = build_message(
            "Food 150.00%",
            AlertKind::Threshold,
            Money::new(80_000),
            Money::new(100_000),
            8000,
            Currency::Eur,
        );
        assert!(msg.contains("Food 150.00%"));
        assert!(msg.contains("80.00%"));
        assert!(msg.contains("€800.00"));

        let msg = build_message(
            "Rent.Q1.2024",
            AlertKind::Exceeded,
            Money::new(120_000),
            Money::new(100_000),
            12_000,
            Currency::Eur,
        );
        assert!(msg.contains("Rent.Q1.2024"));
        assert!(msg.contains("120.00%"));
    }
}
