use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    AccountKind, AlertKind, AlertLevel, BudgetPeriod, BudgetState, CategoryKind, CreateAccountCmd,
    CreateBudgetCmd, CreateCategoryCmd, CreateTransactionCmd, Engine, EngineConfig, EngineError,
    LedgerEvent, TransactionKind,
};
use migration::MigratorTrait;

async fn engine_with_config(config: Option<EngineConfig>) -> (Engine, DatabaseConnection) {
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
    let mut builder = Engine::builder().database(db.clone());
    if let Some(config) = config {
        builder = builder.config(config);
    }
    let engine = builder.build().await.unwrap();
    (engine, db)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Fixture {
    account_id: uuid::Uuid,
    category_id: uuid::Uuid,
    budget_id: uuid::Uuid,
}

/// Checking with 5,000.00 and a monthly 1,000.00 budget at an 80% threshold.
async fn budget_fixture(engine: &Engine, budget_name: &str) -> Fixture {
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Checking", AccountKind::Checking)
                .opening_balance_minor(500_000),
        )
        .await
        .unwrap();
    let category = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();
    let budget = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            category.id,
            budget_name,
            100_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap();
    Fixture {
        account_id: account.id,
        category_id: category.id,
        budget_id: budget.id,
    }
}

async fn spend(engine: &Engine, fx: &Fixture, amount_minor: i64, day: u32) -> Vec<LedgerEvent> {
    engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                amount_minor,
                fx.account_id,
                date(2024, 1, day),
            )
            .category_id(fx.category_id),
        )
        .await
        .unwrap()
        .events
}

#[tokio::test]
async fn threshold_alert_fires_exactly_at_the_threshold() {
    let (engine, _db) = engine_with_config(None).await;
    let fx = budget_fixture(&engine, "Groceries").await;

    assert!(spend(&engine, &fx, 75_000, 5).await.is_empty());
    let events = spend(&engine, &fx, 5_000, 6).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        LedgerEvent::BudgetAlert {
            kind: AlertKind::Threshold,
            ..
        }
    ));

    let alerts = engine.list_budget_alerts("alice", fx.budget_id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Threshold);
    assert_eq!(alerts[0].level, AlertLevel::Warning);
    assert_eq!(alerts[0].percent_bp, 8000);
    assert!(alerts[0].message.contains("Groceries"));
    assert!(alerts[0].message.contains("80.00%"));
    assert!(alerts[0].message.contains("€800.00"));
    assert!(alerts[0].message.contains("€1,000.00"));
}

#[tokio::test]
async fn exceeded_alert_is_critical_and_deduplicated_by_cooldown() {
    let (engine, _db) = engine_with_config(None).await;
    let fx = budget_fixture(&engine, "Groceries").await;

    spend(&engine, &fx, 80_000, 5).await;
    let events = spend(&engine, &fx, 40_000, 6).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        LedgerEvent::BudgetAlert {
            kind: AlertKind::Exceeded,
            ..
        }
    ));

    // Still over 100%, but inside the cooldown window: no second alert row.
    assert!(spend(&engine, &fx, 1_000, 7).await.is_empty());

    let alerts = engine.list_budget_alerts("alice", fx.budget_id).await.unwrap();
    assert_eq!(alerts.len(), 2);
    let exceeded = alerts.iter().find(|a| a.kind == AlertKind::Exceeded).unwrap();
    assert_eq!(exceeded.level, AlertLevel::Critical);
    assert_eq!(exceeded.percent_bp, 12_000);
    assert!(exceeded.message.contains("120.00%"));
    assert!(exceeded.message.contains("€1,200.00"));
}

#[tokio::test]
async fn zero_cooldown_lets_alerts_repeat() {
    let config = EngineConfig {
        alert_cooldown: chrono::Duration::zero(),
        ..Default::default()
    };
    let (engine, _db) = engine_with_config(Some(config)).await;
    let fx = budget_fixture(&engine, "Groceries").await;

    spend(&engine, &fx, 120_000, 5).await;
    let events = spend(&engine, &fx, 1_000, 6).await;
    assert_eq!(events.len(), 1);
    let alerts = engine.list_budget_alerts("alice", fx.budget_id).await.unwrap();
    assert_eq!(alerts.iter().filter(|a| a.kind == AlertKind::Exceeded).count(), 2);
}

#[tokio::test]
async fn hostile_budget_names_stay_verbatim_in_messages() {
    let (engine, _db) = engine_with_config(None).await;
    let fx = budget_fixture(&engine, "Food 150.00%").await;

    spend(&engine, &fx, 80_000, 5).await;
    let alerts = engine.list_budget_alerts("alice", fx.budget_id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].message.contains("Food 150.00%"));
    // The real percentage is still rendered alongside the hostile name.
    assert!(alerts[0].message.contains("80.00%"));
}

#[tokio::test]
async fn overlapping_budget_on_same_category_is_rejected() {
    let (engine, _db) = engine_with_config(None).await;
    let fx = budget_fixture(&engine, "Groceries").await;

    let err = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            fx.category_id,
            "Groceries bis",
            50_000,
            BudgetPeriod::Month,
            date(2024, 1, 15),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists(_)));

    // A later period on the same category is fine.
    engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            fx.category_id,
            "Groceries Feb",
            50_000,
            BudgetPeriod::Month,
            date(2024, 2, 1),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn paused_budget_stops_matching_new_expenses() {
    let (engine, _db) = engine_with_config(None).await;
    let fx = budget_fixture(&engine, "Groceries").await;

    spend(&engine, &fx, 10_000, 5).await;
    engine
        .set_budget_status("alice", fx.budget_id, BudgetState::Paused)
        .await
        .unwrap();
    spend(&engine, &fx, 10_000, 6).await;

    let status = engine.get_budget_status("alice", fx.budget_id).await.unwrap();
    assert_eq!(status.spent_minor, 10_000);
    assert_eq!(status.status, BudgetState::Paused);
}

#[tokio::test]
async fn expenses_outside_the_period_do_not_count() {
    let (engine, _db) = engine_with_config(None).await;
    let fx = budget_fixture(&engine, "Groceries").await;

    engine
        .create_transaction(
            CreateTransactionCmd::new(
                "alice",
                TransactionKind::Expense,
                10_000,
                fx.account_id,
                date(2024, 2, 1),
            )
            .category_id(fx.category_id),
        )
        .await
        .unwrap();

    let status = engine.get_budget_status("alice", fx.budget_id).await.unwrap();
    assert_eq!(status.spent_minor, 0);
}

#[tokio::test]
async fn budgets_require_an_expense_category_and_a_valid_threshold() {
    let (engine, _db) = engine_with_config(None).await;
    let salary = engine
        .create_category(CreateCategoryCmd::new("alice", "Salary", CategoryKind::Income))
        .await
        .unwrap();

    let err = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            salary.id,
            "Nope",
            100_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", CategoryKind::Expense))
        .await
        .unwrap();
    let err = engine
        .create_budget(
            CreateBudgetCmd::new(
                "alice",
                food.id,
                "Bad threshold",
                100_000,
                BudgetPeriod::Month,
                date(2024, 1, 1),
            )
            .alert_threshold_bp(10_001),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
