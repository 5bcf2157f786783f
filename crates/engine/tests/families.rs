use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, EngineError, FamilyRole};
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

#[tokio::test]
async fn creator_becomes_owner() {
    let (engine, _db) = engine_with_users(&["alice"]).await;
    let family = engine.create_family("alice", "Rossi").await.unwrap();
    assert_eq!(family.created_by, "alice");

    let members = engine.list_family_members("alice", &family.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, FamilyRole::Owner);

    let caps = engine.member_capabilities("alice", &family.id).await.unwrap();
    assert!(caps.can_manage_family);
    assert!(caps.can_contribute);
}

#[tokio::test]
async fn role_changes_are_gated_by_the_acting_role() {
    let (engine, _db) = engine_with_users(&["owner", "admin", "member"]).await;
    let family = engine.create_family("owner", "Rossi").await.unwrap();
    engine
        .upsert_family_member("owner", &family.id, "admin", FamilyRole::Admin)
        .await
        .unwrap();
    engine
        .upsert_family_member("owner", &family.id, "member", FamilyRole::Member)
        .await
        .unwrap();

    // Admins manage ordinary members.
    engine
        .upsert_family_member("admin", &family.id, "member", FamilyRole::Viewer)
        .await
        .unwrap();

    // Only owners touch ownership.
    let err = engine
        .upsert_family_member("admin", &family.id, "member", FamilyRole::Owner)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied(_)));

    // Plain members manage nobody.
    let err = engine
        .upsert_family_member("member", &family.id, "admin", FamilyRole::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied(_)));
}

#[tokio::test]
async fn the_last_owner_cannot_be_demoted_or_removed() {
    let (engine, _db) = engine_with_users(&["owner", "admin"]).await;
    let family = engine.create_family("owner", "Rossi").await.unwrap();
    engine
        .upsert_family_member("owner", &family.id, "admin", FamilyRole::Admin)
        .await
        .unwrap();

    let err = engine
        .upsert_family_member("owner", &family.id, "owner", FamilyRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .remove_family_member("owner", &family.id, "owner")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // With a second owner in place the original may step down.
    engine
        .upsert_family_member("owner", &family.id, "admin", FamilyRole::Owner)
        .await
        .unwrap();
    engine
        .remove_family_member("owner", &family.id, "owner")
        .await
        .unwrap();
    let members = engine.list_family_members("admin", &family.id).await.unwrap();
    assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn members_can_leave_on_their_own() {
    let (engine, _db) = engine_with_users(&["owner", "member"]).await;
    let family = engine.create_family("owner", "Rossi").await.unwrap();
    engine
        .upsert_family_member("owner", &family.id, "member", FamilyRole::Member)
        .await
        .unwrap();

    engine
        .remove_family_member("member", &family.id, "member")
        .await
        .unwrap();
    let caps = engine.member_capabilities("member", &family.id).await.unwrap();
    assert!(!caps.can_contribute);
}

#[tokio::test]
async fn non_members_see_nothing() {
    let (engine, _db) = engine_with_users(&["owner", "stranger"]).await;
    let family = engine.create_family("owner", "Rossi").await.unwrap();

    let err = engine
        .list_family_members("stranger", &family.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let caps = engine
        .member_capabilities("stranger", &family.id)
        .await
        .unwrap();
    assert!(!caps.can_manage_family);
    assert!(!caps.can_contribute);
}
