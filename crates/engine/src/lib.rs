//! Core ledger engine: accounts, categories, budgets, goals, families, and
//! the transactions connecting them.
//!
//! Every mutation goes through [`Engine`], which keeps the denormalized
//! aggregates (account balances, budget spending, goal progress) consistent
//! with the ledger inside a single database transaction, and surfaces side
//! effects (budget alerts, goal completion) as events on the outcome.

pub mod accounts;
pub mod alerts;
pub mod budgets;
pub mod categories;
mod commands;
mod currency;
mod error;
pub mod families;
pub mod goals;
mod money;
mod ops;
pub mod transactions;
pub mod users;

pub use accounts::{Account, AccountKind};
pub use alerts::{AlertKind, AlertLevel, BudgetAlert};
pub use budgets::{Budget, BudgetPeriod, BudgetState, FULL_BP};
pub use categories::{Category, CategoryKind};
pub use commands::{
    ContributeCmd, CreateAccountCmd, CreateBudgetCmd, CreateCategoryCmd, CreateGoalCmd,
    CreateTransactionCmd, DeleteTransactionCmd, UpdateTransactionCmd,
};
pub use currency::Currency;
pub use error::EngineError;
pub use families::{Capabilities, Family, FamilyMember, FamilyRole};
pub use goals::{Goal, GoalProgress, GoalStatus};
pub use money::Money;
pub use ops::{
    BalanceChange, BudgetStatusView, ContributionOutcome, Engine, EngineBuilder, EngineConfig,
    LedgerEvent, MutationOutcome,
};
pub use transactions::{Transaction, TransactionKind};

/// Result type alias with the engine error.
pub type ResultEngine<T> = Result<T, EngineError>;
