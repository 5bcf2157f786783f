use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    AccountKind, BudgetPeriod, CategoryKind, ContributeCmd, CreateAccountCmd, CreateBudgetCmd,
    CreateCategoryCmd, CreateGoalCmd, DeleteTransactionCmd, Engine, EngineError, FamilyRole,
    GoalStatus, LedgerEvent, UpdateTransactionCmd,
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

async fn funded_account(engine: &Engine, user: &str, balance_minor: i64) -> uuid::Uuid {
    engine
        .create_account(
            CreateAccountCmd::new(user, "Checking", AccountKind::Checking)
                .opening_balance_minor(balance_minor),
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn contributions_complete_the_goal_and_debit_the_account() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account_id = funded_account(&engine, "alice", 110_000).await;
    let goal = engine
        .create_goal(CreateGoalCmd::new("alice", "Vacation", 100_000))
        .await
        .unwrap();

    let first = engine
        .contribute_to_goal(ContributeCmd::new(
            "alice",
            goal.id,
            account_id,
            95_000,
            date(2024, 1, 10),
        ))
        .await
        .unwrap();
    assert!(!first.goal_progress.completed);
    assert_eq!(first.goal_progress.current_amount_minor, 95_000);
    assert_eq!(first.goal_progress.percent_bp, 9500);
    assert!(first.events.is_empty());

    let second = engine
        .contribute_to_goal(ContributeCmd::new(
            "alice",
            goal.id,
            account_id,
            5_000,
            date(2024, 1, 20),
        ))
        .await
        .unwrap();
    assert!(second.goal_progress.completed);
    assert_eq!(second.goal_progress.percent_bp, 10_000);
    assert_eq!(
        second.events,
        vec![LedgerEvent::GoalCompleted { goal_id: goal.id }]
    );
    assert_eq!(second.updated_balances[0].balance_minor, 10_000);
}

#[tokio::test]
async fn deleting_a_contribution_reopens_the_goal() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account_id = funded_account(&engine, "alice", 200_000).await;
    let goal = engine
        .create_goal(CreateGoalCmd::new("alice", "Vacation", 100_000))
        .await
        .unwrap();

    engine
        .contribute_to_goal(ContributeCmd::new(
            "alice",
            goal.id,
            account_id,
            60_000,
            date(2024, 1, 10),
        ))
        .await
        .unwrap();
    let second = engine
        .contribute_to_goal(ContributeCmd::new(
            "alice",
            goal.id,
            account_id,
            40_000,
            date(2024, 1, 20),
        ))
        .await
        .unwrap();
    assert!(second.goal_progress.completed);

    let deleted = engine
        .delete_transaction(DeleteTransactionCmd::new("alice", second.transaction_id))
        .await
        .unwrap();
    assert!(deleted
        .events
        .contains(&LedgerEvent::GoalReopened { goal_id: goal.id }));

    let progress = engine.get_goal_progress("alice", goal.id).await.unwrap();
    assert!(!progress.completed);
    assert_eq!(progress.current_amount_minor, 60_000);
    // The contribution's money is back on the account.
    assert_eq!(deleted.updated_balances[0].balance_minor, 140_000);
}

#[tokio::test]
async fn completed_goals_still_accept_cancelled_ones_refuse() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account_id = funded_account(&engine, "alice", 300_000).await;
    let goal = engine
        .create_goal(CreateGoalCmd::new("alice", "Vacation", 100_000))
        .await
        .unwrap();

    engine
        .contribute_to_goal(ContributeCmd::new(
            "alice",
            goal.id,
            account_id,
            100_000,
            date(2024, 1, 10),
        ))
        .await
        .unwrap();

    // Completion does not close the goal for further saving.
    let over = engine
        .contribute_to_goal(ContributeCmd::new(
            "alice",
            goal.id,
            account_id,
            10_000,
            date(2024, 1, 11),
        ))
        .await
        .unwrap();
    assert_eq!(over.goal_progress.current_amount_minor, 110_000);

    let cancelled = engine.cancel_goal("alice", goal.id).await.unwrap();
    assert_eq!(cancelled.status, GoalStatus::Cancelled);
    let err = engine
        .contribute_to_goal(ContributeCmd::new(
            "alice",
            goal.id,
            account_id,
            1_000,
            date(2024, 1, 12),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::GoalInactive(_)));
}

#[tokio::test]
async fn failed_contribution_leaves_no_trace() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account_id = funded_account(&engine, "alice", 10_000).await;
    let goal = engine
        .create_goal(CreateGoalCmd::new("alice", "Vacation", 100_000))
        .await
        .unwrap();

    let err = engine
        .contribute_to_goal(ContributeCmd::new(
            "alice",
            goal.id,
            account_id,
            20_000,
            date(2024, 1, 10),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    let progress = engine.get_goal_progress("alice", goal.id).await.unwrap();
    assert_eq!(progress.current_amount_minor, 0);
    assert_eq!(
        engine.get_account("alice", account_id).await.unwrap().balance_minor,
        10_000
    );
    assert!(engine.list_transactions("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn categorized_contribution_counts_against_the_budget() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account_id = funded_account(&engine, "alice", 200_000).await;
    let savings = engine
        .create_category(CreateCategoryCmd::new("alice", "Savings", CategoryKind::Expense))
        .await
        .unwrap();
    let budget = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            savings.id,
            "Monthly savings",
            100_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap();
    let goal = engine
        .create_goal(CreateGoalCmd::new("alice", "Vacation", 500_000))
        .await
        .unwrap();

    engine
        .contribute_to_goal(
            ContributeCmd::new("alice", goal.id, account_id, 30_000, date(2024, 1, 10))
                .category_id(savings.id),
        )
        .await
        .unwrap();

    let status = engine.get_budget_status("alice", budget.id).await.unwrap();
    assert_eq!(status.spent_minor, 30_000);
}

#[tokio::test]
async fn clearing_the_bookkeeping_category_releases_budget_spending() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let account_id = funded_account(&engine, "alice", 200_000).await;
    let savings = engine
        .create_category(CreateCategoryCmd::new("alice", "Savings", CategoryKind::Expense))
        .await
        .unwrap();
    let budget = engine
        .create_budget(CreateBudgetCmd::new(
            "alice",
            savings.id,
            "Monthly savings",
            100_000,
            BudgetPeriod::Month,
            date(2024, 1, 1),
        ))
        .await
        .unwrap();
    let goal = engine
        .create_goal(CreateGoalCmd::new("alice", "Vacation", 500_000))
        .await
        .unwrap();
    let outcome = engine
        .contribute_to_goal(
            ContributeCmd::new("alice", goal.id, account_id, 30_000, date(2024, 1, 10))
                .category_id(savings.id),
        )
        .await
        .unwrap();

    engine
        .update_transaction(
            UpdateTransactionCmd::new("alice", outcome.transaction_id).clear_category(),
        )
        .await
        .unwrap();

    let stored = engine
        .get_transaction("alice", outcome.transaction_id)
        .await
        .unwrap();
    assert!(stored.category_id.is_none());
    // The budget releases the spending; account and goal are untouched.
    let status = engine.get_budget_status("alice", budget.id).await.unwrap();
    assert_eq!(status.spent_minor, 0);
    let progress = engine.get_goal_progress("alice", goal.id).await.unwrap();
    assert_eq!(progress.current_amount_minor, 30_000);
    assert_eq!(
        engine.get_account("alice", account_id).await.unwrap().balance_minor,
        170_000
    );
}

#[tokio::test]
async fn family_roles_gate_goal_creation_and_contribution() {
    let (engine, _db) = engine_with_users(&["owner", "admin", "member", "viewer", "stranger"]).await;
    let family = engine.create_family("owner", "Rossi").await.unwrap();
    engine
        .upsert_family_member("owner", &family.id, "admin", FamilyRole::Admin)
        .await
        .unwrap();
    engine
        .upsert_family_member("owner", &family.id, "member", FamilyRole::Member)
        .await
        .unwrap();
    engine
        .upsert_family_member("owner", &family.id, "viewer", FamilyRole::Viewer)
        .await
        .unwrap();

    // Members cannot create family goals, admins can.
    let err = engine
        .create_goal(CreateGoalCmd::new("member", "Car", 100_000).family_id(family.id.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied(_)));
    let goal = engine
        .create_goal(CreateGoalCmd::new("admin", "Car", 100_000).family_id(family.id.clone()))
        .await
        .unwrap();

    // Members contribute from their own accounts; viewers are read-only.
    let member_account = funded_account(&engine, "member", 50_000).await;
    engine
        .contribute_to_goal(ContributeCmd::new(
            "member",
            goal.id,
            member_account,
            10_000,
            date(2024, 1, 10),
        ))
        .await
        .unwrap();
    let viewer_account = funded_account(&engine, "viewer", 50_000).await;
    let err = engine
        .contribute_to_goal(ContributeCmd::new(
            "viewer",
            goal.id,
            viewer_account,
            10_000,
            date(2024, 1, 11),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied(_)));

    // Viewers still see progress; strangers learn nothing.
    let progress = engine.get_goal_progress("viewer", goal.id).await.unwrap();
    assert_eq!(progress.current_amount_minor, 10_000);
    let err = engine.get_goal_progress("stranger", goal.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn personal_goals_are_invisible_to_other_users() {
    let (engine, _db) = engine_with_users(&["alice", "bob"]).await;
    let goal = engine
        .create_goal(CreateGoalCmd::new("alice", "Vacation", 100_000))
        .await
        .unwrap();
    let bob_account = funded_account(&engine, "bob", 50_000).await;

    let err = engine
        .contribute_to_goal(ContributeCmd::new(
            "bob",
            goal.id,
            bob_account,
            10_000,
            date(2024, 1, 10),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
