//! Command structs for engine operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists. Optional fields default to
//! `None` and are set through builder methods.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    AccountKind, BudgetPeriod, CategoryKind, Currency, TransactionKind,
};

/// Create a ledger transaction of any kind.
#[derive(Clone, Debug)]
pub struct CreateTransactionCmd {
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub account_id: Uuid,
    pub transfer_account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub goal_id: Option<Uuid>,
    pub occurred_on: NaiveDate,
    pub note: Option<String>,
}

impl CreateTransactionCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        kind: TransactionKind,
        amount_minor: i64,
        account_id: Uuid,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            amount_minor,
            account_id,
            transfer_account_id: None,
            category_id: None,
            goal_id: None,
            occurred_on,
            note: None,
        }
    }

    #[must_use]
    pub fn transfer_account_id(mut self, account_id: Uuid) -> Self {
        self.transfer_account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn goal_id(mut self, goal_id: Uuid) -> Self {
        self.goal_id = Some(goal_id);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Update an existing transaction.
///
/// Unset fields keep their current value. The nullable references
/// (`transfer_account_id`, `category_id`, `goal_id`) distinguish "keep"
/// (outer `None`) from "clear" (`Some(None)`), set through the `clear_*`
/// builders. `expected_version` turns the edit into an optimistic
/// compare-and-swap: a stale version fails with `ConcurrentModification`
/// and the caller must refetch.
#[derive(Clone, Debug)]
pub struct UpdateTransactionCmd {
    pub user_id: String,
    pub transaction_id: Uuid,
    pub amount_minor: Option<i64>,
    pub account_id: Option<Uuid>,
    pub transfer_account_id: Option<Option<Uuid>>,
    pub category_id: Option<Option<Uuid>>,
    pub goal_id: Option<Option<Uuid>>,
    pub occurred_on: Option<NaiveDate>,
    pub note: Option<String>,
    pub expected_version: Option<i32>,
}

impl UpdateTransactionCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, transaction_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_id,
            amount_minor: None,
            account_id: None,
            transfer_account_id: None,
            category_id: None,
            goal_id: None,
            occurred_on: None,
            note: None,
            expected_version: None,
        }
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn account_id(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn transfer_account_id(mut self, account_id: Uuid) -> Self {
        self.transfer_account_id = Some(Some(account_id));
        self
    }

    #[must_use]
    pub fn clear_transfer_account(mut self) -> Self {
        self.transfer_account_id = Some(None);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(Some(category_id));
        self
    }

    #[must_use]
    pub fn clear_category(mut self) -> Self {
        self.category_id = Some(None);
        self
    }

    #[must_use]
    pub fn goal_id(mut self, goal_id: Uuid) -> Self {
        self.goal_id = Some(Some(goal_id));
        self
    }

    #[must_use]
    pub fn clear_goal(mut self) -> Self {
        self.goal_id = Some(None);
        self
    }

    #[must_use]
    pub fn occurred_on(mut self, occurred_on: NaiveDate) -> Self {
        self.occurred_on = Some(occurred_on);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn expected_version(mut self, version: i32) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Soft-delete a transaction and reverse its ledger effects.
#[derive(Clone, Debug)]
pub struct DeleteTransactionCmd {
    pub user_id: String,
    pub transaction_id: Uuid,
}

impl DeleteTransactionCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, transaction_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_id,
        }
    }
}

/// Contribute from an account into a goal.
#[derive(Clone, Debug)]
pub struct ContributeCmd {
    pub user_id: String,
    pub goal_id: Uuid,
    pub account_id: Uuid,
    pub amount_minor: i64,
    pub occurred_on: NaiveDate,
    pub note: Option<String>,
    /// Optional expense category mapping the contribution onto a
    /// bookkeeping budget.
    pub category_id: Option<Uuid>,
}

impl ContributeCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        goal_id: Uuid,
        account_id: Uuid,
        amount_minor: i64,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            goal_id,
            account_id,
            amount_minor,
            occurred_on,
            note: None,
            category_id: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Create an account.
#[derive(Clone, Debug)]
pub struct CreateAccountCmd {
    pub user_id: String,
    pub name: String,
    pub kind: AccountKind,
    pub opening_balance_minor: i64,
    pub currency: Currency,
    pub is_default: bool,
}

impl CreateAccountCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            kind,
            opening_balance_minor: 0,
            currency: Currency::default(),
            is_default: false,
        }
    }

    #[must_use]
    pub fn opening_balance_minor(mut self, opening_balance_minor: i64) -> Self {
        self.opening_balance_minor = opening_balance_minor;
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    #[must_use]
    pub fn is_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

/// Create a category.
#[derive(Clone, Debug)]
pub struct CreateCategoryCmd {
    pub user_id: String,
    pub name: String,
    pub kind: CategoryKind,
    pub monthly_budget_minor: Option<i64>,
}

impl CreateCategoryCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            kind,
            monthly_budget_minor: None,
        }
    }

    #[must_use]
    pub fn monthly_budget_minor(mut self, monthly_budget_minor: i64) -> Self {
        self.monthly_budget_minor = Some(monthly_budget_minor);
        self
    }
}

/// Create a budget for one category and period.
#[derive(Clone, Debug)]
pub struct CreateBudgetCmd {
    pub user_id: String,
    pub family_id: Option<String>,
    pub category_id: Uuid,
    pub name: String,
    pub amount_minor: i64,
    pub period: BudgetPeriod,
    pub starts_on: NaiveDate,
    pub alert_threshold_bp: i64,
    pub alert_enabled: bool,
}

impl CreateBudgetCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        category_id: Uuid,
        name: impl Into<String>,
        amount_minor: i64,
        period: BudgetPeriod,
        starts_on: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            family_id: None,
            category_id,
            name: name.into(),
            amount_minor,
            period,
            starts_on,
            alert_threshold_bp: 8000,
            alert_enabled: true,
        }
    }

    #[must_use]
    pub fn family_id(mut self, family_id: impl Into<String>) -> Self {
        self.family_id = Some(family_id.into());
        self
    }

    #[must_use]
    pub fn alert_threshold_bp(mut self, alert_threshold_bp: i64) -> Self {
        self.alert_threshold_bp = alert_threshold_bp;
        self
    }

    #[must_use]
    pub fn alert_enabled(mut self, alert_enabled: bool) -> Self {
        self.alert_enabled = alert_enabled;
        self
    }
}

/// Create a saving goal, personal or family-scoped.
#[derive(Clone, Debug)]
pub struct CreateGoalCmd {
    pub user_id: String,
    pub family_id: Option<String>,
    pub name: String,
    pub target_amount_minor: i64,
    pub target_date: Option<NaiveDate>,
    pub priority: i32,
}

impl CreateGoalCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        target_amount_minor: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            family_id: None,
            name: name.into(),
            target_amount_minor,
            target_date: None,
            priority: 0,
        }
    }

    #[must_use]
    pub fn family_id(mut self, family_id: impl Into<String>) -> Self {
        self.family_id = Some(family_id.into());
        self
    }

    #[must_use]
    pub fn target_date(mut self, target_date: NaiveDate) -> Self {
        self.target_date = Some(target_date);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
