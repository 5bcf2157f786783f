use std::time::Duration;

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    AccountKind, BudgetPeriod, CategoryKind, CreateAccountCmd, CreateBudgetCmd, CreateCategoryCmd,
    CreateTransactionCmd, Currency, DeleteTransactionCmd, Engine, EngineConfig, EngineError,
    TransactionKind, UpdateTransactionCmd,
};
use migration::MigratorTrait;

async fn engine_with_users(users: &[&str]) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for user in users {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username) VALUES (?)",
            vec![(*user).into()],
        ))
        .await
        .unwrap();
    }
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn expense_updates_balance_and_budget_spending() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(100_000),
        )
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();
    let budget = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            food.id,
            "Groceries",
            50_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap();

    let outcome = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                15_025,
                account.id,
                date(2024, 1, 10),
            )
            .category_id(food.id),
        )
        .await
        .unwrap();

    assert_eq!(outcome.updated_balances.len(), 1);
    assert_eq!(outcome.updated_balances[0].balance_minor, 84_975);
    assert!(outcome.events.is_empty());

    let status = engine.get_budget_status("alice", budget.id).await.unwrap();
    assert_eq!(status.spent_minor, 15_025);
    assert_eq!(status.remaining_minor, 34_975);
    assert_eq!(status.percent_bp, 3005);
}

#[tokio::test]
async fn income_requires_income_category() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account = engine
        .create_account(CreateAccountCmd::new("alice", "Checking", AccountKind::Checking))
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();

    let err = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Income,
                10_000,
                account.id,
                date(2024, 1, 1),
            )
            .category_id(food.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .create_transaction(CreateTransactionCmd::new(
            "alice",
            TransactionKind::Income,
            10_000,
            account.id,
            date(2024, 1, 1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn transfer_round_trip_restores_balances() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let a = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(50_000),
        )
        .await
        .unwrap();
    let b = engine
        .create_account(
            CreateAccountCmd::new("alice", "Savings", AccountKind::Savings)
                .opening_balance_minor(10_000),
        )
        .await
        .unwrap();

    let out = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Transfer,
                20_000,
                a.id,
                date(2024, 2, 1),
            )
            .transfer_account_id(b.id),
        )
        .await
        .unwrap();
    assert_eq!(out.updated_balances.len(), 2);

    engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Transfer,
                20_000,
                b.id,
                date(2024, 2, 2),
            )
            .transfer_account_id(a.id),
        )
        .await
        .unwrap();

    assert_eq!(engine.get_account("alice", a.id).await.unwrap().balance_minor, 50_000);
    assert_eq!(engine.get_account("alice", b.id).await.unwrap().balance_minor, 10_000);
}

#[tokio::test]
async fn transfer_rejects_same_account_and_mixed_currencies() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let eur = engine
        .create_account(
            CreateAccountCmd::new("alice", "Eur", AccountKind::Checking)
                .opening_balance_minor(10_000),
        )
        .await
        .unwrap();
    let usd = engine
        .create_account(
            CreateAccountCmd::new("alice", "Usd", AccountKind::Checking)
                .currency(Currency::Usd),
        )
        .await
        .unwrap();

    let err = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Transfer,
                1000,
                eur.id,
                date(2024, 1, 1),
            )
            .transfer_account_id(eur.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Transfer,
                1000,
                eur.id,
                date(2024, 1, 1),
            )
            .transfer_account_id(usd.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CurrencyMismatch(_)));
}

#[tokio::test]
async fn overdraw_rejected_except_on_credit_accounts() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let checking = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(5_000),
        )
        .await
        .unwrap();
    let credit = engine
        .create_account(CreateAccountCmd::new("alice", "Card", AccountKind::Credit))
        .await
        .unwrap();
    let misc = engine
        .create_category(CreateCategoryCmd::new("alice", "Misc", CategoryKind::Expense))
        .await
        .unwrap();

    let err = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                6_000,
                checking.id,
                date(2024, 1, 1),
            )
            .category_id(misc.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    // Nothing committed.
    assert_eq!(
        engine.get_account("alice", checking.id).await.unwrap().balance_minor,
        5_000
    );
    assert!(engine.list_transactions("alice").await.unwrap().is_empty());

    let out = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                6_000,
                credit.id,
                date(2024, 1, 1),
            )
            .category_id(misc.id),
        )
        .await
        .unwrap();
    assert_eq!(out.updated_balances[0].balance_minor, -6_000);
}

#[tokio::test]
async fn delete_reverses_aggregates_and_is_idempotent_with_recreate() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(100_000),
        )
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();
    let budget = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            food.id,
            "Groceries",
            50_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap();

    let cmd = CreateTransactionCmd::new(
        "alice",
        TransactionKind::Expense,
        15_025,
        account.id,
        date(2024, 1, 10),
    )
    .category_id(food.id);
    let first = engine.create_transaction(cmd.clone()).await.unwrap();

    let deleted = engine
        .delete_transaction(DeleteTransactionCmd::new("alice", first.transaction_id))
        .await
        .unwrap();
    assert_eq!(deleted.updated_balances[0].balance_minor, 100_000);
    let status = engine.get_budget_status("alice", budget.id).await.unwrap();
    assert_eq!(status.spent_minor, 0);

    // Deleting twice is NotFound, and the row no longer lists.
    let err = engine
        .delete_transaction(DeleteTransactionCmd::new("alice", first.transaction_id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(engine.list_transactions("alice").await.unwrap().is_empty());

    // Recreating lands on exactly the same aggregates as the first insert.
    let second = engine.create_transaction(cmd).await.unwrap();
    assert_eq!(second.updated_balances[0].balance_minor, 84_975);
    let status = engine.get_budget_status("alice", budget.id).await.unwrap();
    assert_eq!(status.spent_minor, 15_025);
}

#[tokio::test]
async fn update_moves_expense_between_accounts_without_double_counting() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let a = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(30_000),
        )
        .await
        .unwrap();
    let b = engine
        .create_account(
            CreateAccountCmd::new("alice", "Savings", AccountKind::Savings)
                .opening_balance_minor(30_000),
        )
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();
    let budget = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            food.id,
            "Groceries",
            50_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap();

    let created = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                10_000,
                a.id,
                date(2024, 1, 5),
            )
            .category_id(food.id),
        )
        .await
        .unwrap();

    engine
        .update_transaction(
            UpdateTransactionCmd::new("alice", created.transaction_id).account_id(b.id),
        )
        .await
        .unwrap();

    assert_eq!(engine.get_account("alice", a.id).await.unwrap().balance_minor, 30_000);
    assert_eq!(engine.get_account("alice", b.id).await.unwrap().balance_minor, 20_000);
    // The budget saw a reversal and a re-apply of the same amount.
    let status = engine.get_budget_status("alice", budget.id).await.unwrap();
    assert_eq!(status.spent_minor, 10_000);
}

#[tokio::test]
async fn amount_edit_round_trip_restores_aggregates_exactly() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(100_000),
        )
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();
    let budget = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            food.id,
            "Groceries",
            50_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap();
    let created = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                15_025,
                account.id,
                date(2024, 1, 10),
            )
            .category_id(food.id),
        )
        .await
        .unwrap();

    let raised = engine
        .update_transaction(
            UpdateTransactionCmd::new("alice", created.transaction_id).amount_minor(20_000),
        )
        .await
        .unwrap();
    assert_eq!(raised.updated_balances[0].balance_minor, 80_000);
    let status = engine.get_budget_status("alice", budget.id).await.unwrap();
    assert_eq!(status.spent_minor, 20_000);

    let restored = engine
        .update_transaction(
            UpdateTransactionCmd::new("alice", created.transaction_id).amount_minor(15_025),
        )
        .await
        .unwrap();
    assert_eq!(restored.updated_balances[0].balance_minor, 84_975);
    let status = engine.get_budget_status("alice", budget.id).await.unwrap();
    assert_eq!(status.spent_minor, 15_025);
    assert_eq!(status.percent_bp, 3005);
}

#[tokio::test]
async fn date_edit_rematches_expense_to_the_covering_budget() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(100_000),
        )
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();
    let january = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            food.id,
            "January food",
            50_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap();
    let february = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            food.id,
            "February food",
            50_000,
            BudgetPeriod::Month,
            date(2024, 2, 1),
        ))
        .await
        .unwrap();
    let created = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                15_025,
                account.id,
                date(2024, 1, 10),
            )
            .category_id(food.id),
        )
        .await
        .unwrap();
    assert_eq!(
        engine.get_budget_status("alice", january.id).await.unwrap().spent_minor,
        15_025
    );

    engine
        .update_transaction(
            UpdateTransactionCmd::new("alice", created.transaction_id)
                .occurred_on(date(2024, 2, 10)),
        )
        .await
        .unwrap();

    // The expense left January's budget and landed on February's; the
    // account is untouched by a pure date move.
    assert_eq!(
        engine.get_budget_status("alice", january.id).await.unwrap().spent_minor,
        0
    );
    assert_eq!(
        engine.get_budget_status("alice", february.id).await.unwrap().spent_minor,
        15_025
    );
    assert_eq!(
        engine.get_account("alice", account.id).await.unwrap().balance_minor,
        84_975
    );
}

#[tokio::test]
async fn tight_lock_timeout_leaves_uncontended_mutations_alone() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username) VALUES (?)",
        vec!["alice".into()],
    ))
    .await
    .unwrap();
    // A 1 ms window bounds lock waits only; an uncontended mutation must
    // run to completion however long it takes.
    let engine = Engine::builder()
        .database(db.clone())
        .config(EngineConfig {
            lock_wait_timeout: Duration::from_millis(1),
            ..Default::default()
        })
        .build()
        .await
        .unwrap();

    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(10_000),
        )
        .await
        .unwrap();
    let misc = engine
        .create_category(CreateCategoryCmd::new("alice", "Misc", CategoryKind::Expense))
        .await
        .unwrap();
    let out = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                1_000,
                account.id,
                date(2024, 1, 1),
            )
            .category_id(misc.id),
        )
        .await
        .unwrap();
    assert_eq!(out.updated_balances[0].balance_minor, 9_000);
}

#[tokio::test]
async fn stale_expected_version_is_rejected() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(50_000),
        )
        .await
        .unwrap();
    let misc = engine
        .create_category(CreateCategoryCmd::new("alice", "Misc", CategoryKind::Expense))
        .await
        .unwrap();
    let created = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                1_000,
                account.id,
                date(2024, 3, 1),
            )
            .category_id(misc.id),
        )
        .await
        .unwrap();

    engine
        .update_transaction(
            UpdateTransactionCmd::new("alice", created.transaction_id)
                .amount_minor(2_000)
                .expected_version(1),
        )
        .await
        .unwrap();

    let err = engine
        .update_transaction(
            UpdateTransactionCmd::new("alice", created.transaction_id)
                .amount_minor(3_000)
                .expected_version(1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConcurrentModification(_)));

    let stored = engine
        .get_transaction("alice", created.transaction_id)
        .await
        .unwrap();
    assert_eq!(stored.amount_minor, 2_000);
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn archived_account_rejects_new_transactions() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    engine
        .create_account(CreateAccountCmd::new("alice", "Main", AccountKind::Checking))
        .await
        .unwrap();
    let side = engine
        .create_account(
            CreateAccountCmd::new("alice", "Side", AccountKind::Cash)
                .opening_balance_minor(5_000),
        )
        .await
        .unwrap();
    let misc = engine
        .create_category(CreateCategoryCmd::new("alice", "Misc", CategoryKind::Expense))
        .await
        .unwrap();

    engine.archive_account("alice", side.id).await.unwrap();

    let err = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                1_000,
                side.id,
                date(2024, 1, 1),
            )
            .category_id(misc.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn transactions_are_scoped_to_their_owner() {
    let (engine, _db) = engine_with_users(&["alice", "bob"]).await;
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(10_000),
        )
        .await
        .unwrap();
    let misc = engine
        .create_category(CreateCategoryCmd::new("alice", "Misc", CategoryKind::Expense))
        .await
        .unwrap();
    let created = engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                1_000,
                account.id,
                date(2024, 1, 1),
            )
            .category_id(misc.id),
        )
        .await
        .unwrap();

    // Bob can neither see nor delete Alice's row or account.
    let err = engine
        .get_transaction("bob", created.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    let err = engine
        .delete_transaction(DeleteTransactionCmd::new("bob", created.transaction_id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    let err = engine.get_account("bob", account.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn recompute_matches_incremental_aggregates() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(100_000),
        )
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();
    let salary = engine
        .create_category(CreateCategoryCmd::new("alice", "Salary", CategoryKind::Income))
        .await
        .unwrap();
    engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Income,
                50_000,
                account.id,
                date(2024, 1, 1),
            )
            .category_id(salary.id),
        )
        .await
        .unwrap();
    engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                20_000,
                account.id,
                date(2024, 1, 2),
            )
            .category_id(food.id),
        )
        .await
        .unwrap();

    let changes = engine.recompute_aggregates().await.unwrap();
    let change = changes
        .iter()
        .find(|c| c.account_id == account.id)
        .unwrap();
    assert_eq!(change.balance_minor, 130_000);
    assert_eq!(
        engine.get_account("alice", account.id).await.unwrap().balance_minor,
        130_000
    );
}
