//! Initial schema migration - creates all tables from scratch.
//!
//! Complete schema for the ledger engine:
//!
//! - `users`: ownership anchor (authentication lives outside the engine)
//! - `families`: shared-finance groups
//! - `family_members`: per-family roles
//! - `accounts`: money holders with a denormalized balance
//! - `categories`: income/expense labels
//! - `budgets`: per-category spending caps with denormalized spending
//! - `goals`: saving targets with denormalized progress
//! - `transactions`: the ledger itself, soft-deleted and versioned
//! - `budget_alerts`: immutable alert log

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
}

#[derive(Iden)]
enum Families {
    Table,
    Id,
    Name,
    CreatedBy,
}

#[derive(Iden)]
enum FamilyMembers {
    Table,
    FamilyId,
    UserId,
    Role,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    UserId,
    Name,
    Kind,
    OpeningBalanceMinor,
    BalanceMinor,
    Currency,
    IsDefault,
    Archived,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    UserId,
    Name,
    Kind,
    MonthlyBudgetMinor,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    UserId,
    FamilyId,
    CategoryId,
    Name,
    AmountMinor,
    SpentMinor,
    Period,
    StartsOn,
    EndsOn,
    AlertThresholdBp,
    AlertEnabled,
    Status,
}

#[derive(Iden)]
enum Goals {
    Table,
    Id,
    UserId,
    FamilyId,
    Name,
    TargetAmountMinor,
    CurrentAmountMinor,
    TargetDate,
    Priority,
    Status,
    IsFamilyGoal,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Kind,
    AmountMinor,
    AccountId,
    TransferAccountId,
    CategoryId,
    GoalId,
    OccurredOn,
    Note,
    DeletedAt,
    DeletedBy,
    Version,
    CreatedAt,
}

#[derive(Iden)]
enum BudgetAlerts {
    Table,
    Id,
    BudgetId,
    Kind,
    Level,
    Message,
    PercentBp,
    TriggeredAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Families and memberships
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Families::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Families::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Families::Name).string().not_null())
                    .col(ColumnDef::new(Families::CreatedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-families-created_by")
                            .from(Families::Table, Families::CreatedBy)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FamilyMembers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FamilyMembers::FamilyId).string().not_null())
                    .col(ColumnDef::new(FamilyMembers::UserId).string().not_null())
                    .col(ColumnDef::new(FamilyMembers::Role).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(FamilyMembers::FamilyId)
                            .col(FamilyMembers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-family_members-family_id")
                            .from(FamilyMembers::Table, FamilyMembers::FamilyId)
                            .to(Families::Table, Families::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-family_members-user_id")
                            .from(FamilyMembers::Table, FamilyMembers::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::UserId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::OpeningBalanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::BalanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(ColumnDef::new(Accounts::IsDefault).boolean().not_null())
                    .col(ColumnDef::new(Accounts::Archived).boolean().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-user_id")
                            .from(Accounts::Table, Accounts::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-user_id")
                    .table(Accounts::Table)
                    .col(Accounts::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::UserId).string().not_null())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::Kind).string().not_null())
                    .col(ColumnDef::new(Categories::MonthlyBudgetMinor).big_integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-user_id")
                            .from(Categories::Table, Categories::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-user_id-name-kind-unique")
                    .table(Categories::Table)
                    .col(Categories::UserId)
                    .col(Categories::Name)
                    .col(Categories::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Budgets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Budgets::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Budgets::UserId).string().not_null())
                    .col(ColumnDef::new(Budgets::FamilyId).string())
                    .col(ColumnDef::new(Budgets::CategoryId).string().not_null())
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(ColumnDef::new(Budgets::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Budgets::SpentMinor).big_integer().not_null())
                    .col(ColumnDef::new(Budgets::Period).string().not_null())
                    .col(ColumnDef::new(Budgets::StartsOn).date().not_null())
                    .col(ColumnDef::new(Budgets::EndsOn).date().not_null())
                    .col(
                        ColumnDef::new(Budgets::AlertThresholdBp)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Budgets::AlertEnabled).boolean().not_null())
                    .col(ColumnDef::new(Budgets::Status).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-user_id")
                            .from(Budgets::Table, Budgets::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-family_id")
                            .from(Budgets::Table, Budgets::FamilyId)
                            .to(Families::Table, Families::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-category_id")
                            .from(Budgets::Table, Budgets::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-category_id-status")
                    .table(Budgets::Table)
                    .col(Budgets::CategoryId)
                    .col(Budgets::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Goals
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Goals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Goals::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Goals::UserId).string().not_null())
                    .col(ColumnDef::new(Goals::FamilyId).string())
                    .col(ColumnDef::new(Goals::Name).string().not_null())
                    .col(
                        ColumnDef::new(Goals::TargetAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Goals::CurrentAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Goals::TargetDate).date())
                    .col(ColumnDef::new(Goals::Priority).integer().not_null())
                    .col(ColumnDef::new(Goals::Status).string().not_null())
                    .col(ColumnDef::new(Goals::IsFamilyGoal).boolean().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-goals-user_id")
                            .from(Goals::Table, Goals::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-goals-family_id")
                            .from(Goals::Table, Goals::FamilyId)
                            .to(Families::Table, Families::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::UserId).string().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::AccountId).string().not_null())
                    .col(ColumnDef::new(Transactions::TransferAccountId).string())
                    .col(ColumnDef::new(Transactions::CategoryId).string())
                    .col(ColumnDef::new(Transactions::GoalId).string())
                    .col(ColumnDef::new(Transactions::OccurredOn).date().not_null())
                    .col(ColumnDef::new(Transactions::Note).string())
                    .col(ColumnDef::new(Transactions::DeletedAt).timestamp())
                    .col(ColumnDef::new(Transactions::DeletedBy).string())
                    .col(ColumnDef::new(Transactions::Version).integer().not_null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-user_id")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-account_id")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-transfer_account_id")
                            .from(Transactions::Table, Transactions::TransferAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-category_id")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-goal_id")
                            .from(Transactions::Table, Transactions::GoalId)
                            .to(Goals::Table, Goals::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-occurred_on")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::OccurredOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-account_id")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-goal_id")
                    .table(Transactions::Table)
                    .col(Transactions::GoalId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Budget alerts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BudgetAlerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BudgetAlerts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BudgetAlerts::BudgetId).string().not_null())
                    .col(ColumnDef::new(BudgetAlerts::Kind).string().not_null())
                    .col(ColumnDef::new(BudgetAlerts::Level).string().not_null())
                    .col(ColumnDef::new(BudgetAlerts::Message).string().not_null())
                    .col(
                        ColumnDef::new(BudgetAlerts::PercentBp)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BudgetAlerts::TriggeredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_alerts-budget_id")
                            .from(BudgetAlerts::Table, BudgetAlerts::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budget_alerts-budget_id-kind-triggered_at")
                    .table(BudgetAlerts::Table)
                    .col(BudgetAlerts::BudgetId)
                    .col(BudgetAlerts::Kind)
                    .col(BudgetAlerts::TriggeredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BudgetAlerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Goals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FamilyMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Families::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
