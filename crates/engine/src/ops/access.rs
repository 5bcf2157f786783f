//! Ownership and role checks shared by every operation.
//!
//! Checks run twice by design: once against the connection before any work
//! (fail fast) and once more inside the commit transaction, so a concurrent
//! role change or deletion between the two cannot slip a write through.
//!
//! Lookups scoped to another user answer `NotFound` rather than
//! `PermissionDenied`: the caller learns nothing about rows it does not own.
//! `PermissionDenied` is reserved for rows the caller is allowed to see but
//! not to touch (family-shared goals and budgets).

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    Account, Budget, Category, EngineError, FamilyRole, Goal, ResultEngine, accounts, budgets,
    categories, families, goals, users,
};

pub(crate) async fn require_user(
    db: &impl ConnectionTrait,
    user_id: &str,
) -> ResultEngine<()> {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| EngineError::NotFound(user_id.to_string()))
}

/// Loads an account owned by `user_id`. Archived accounts are visible but
/// reject ledger writes, so callers pass `for_write` accordingly.
pub(crate) async fn require_account(
    db: &impl ConnectionTrait,
    user_id: &str,
    account_id: Uuid,
    for_write: bool,
) -> ResultEngine<Account> {
    let model = accounts::Entity::find_by_id(account_id.to_string())
        .filter(accounts::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
    let account = Account::try_from(model)?;
    if for_write && account.archived {
        return Err(EngineError::Validation(
            "account is archived".to_string(),
        ));
    }
    Ok(account)
}

pub(crate) async fn require_category(
    db: &impl ConnectionTrait,
    user_id: &str,
    category_id: Uuid,
) -> ResultEngine<Category> {
    let model = categories::Entity::find_by_id(category_id.to_string())
        .filter(categories::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound("category".to_string()))?;
    Category::try_from(model)
}

/// Role of `user_id` in `family_id`, `None` when not a member.
pub(crate) async fn family_role(
    db: &impl ConnectionTrait,
    family_id: &str,
    user_id: &str,
) -> ResultEngine<Option<FamilyRole>> {
    let member = families::member::Entity::find_by_id((family_id.to_string(), user_id.to_string()))
        .one(db)
        .await?;
    member
        .map(|m| FamilyRole::try_from(m.role.as_str()))
        .transpose()
}

pub(crate) async fn require_family_role(
    db: &impl ConnectionTrait,
    family_id: &str,
    user_id: &str,
) -> ResultEngine<FamilyRole> {
    family_role(db, family_id, user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("family".to_string()))
}

pub(crate) async fn require_family_manage(
    db: &impl ConnectionTrait,
    family_id: &str,
    user_id: &str,
) -> ResultEngine<FamilyRole> {
    let role = require_family_role(db, family_id, user_id).await?;
    if !role.can_manage_family() {
        return Err(EngineError::PermissionDenied(format!(
            "role {} cannot manage this family",
            role.as_str()
        )));
    }
    Ok(role)
}

/// Loads a goal the caller may contribute to.
///
/// Personal goals are owner-only and scoped out of sight for everyone else.
/// Family goals require membership with contribution rights.
pub(crate) async fn require_goal_contribute(
    db: &impl ConnectionTrait,
    user_id: &str,
    goal_id: Uuid,
) -> ResultEngine<Goal> {
    let model = goals::Entity::find_by_id(goal_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound("goal".to_string()))?;
    let goal = Goal::try_from(model)?;
    match goal.family_id.as_deref() {
        None => {
            if goal.user_id != user_id {
                return Err(EngineError::NotFound("goal".to_string()));
            }
        }
        Some(family_id) => {
            let role = family_role(db, family_id, user_id)
                .await?
                .ok_or_else(|| EngineError::NotFound("goal".to_string()))?;
            if !role.can_contribute() {
                return Err(EngineError::PermissionDenied(format!(
                    "role {} cannot contribute to family goals",
                    role.as_str()
                )));
            }
        }
    }
    Ok(goal)
}

/// Loads a goal the caller may read. Family goals are visible to every
/// member, whatever the role.
pub(crate) async fn require_goal_view(
    db: &impl ConnectionTrait,
    user_id: &str,
    goal_id: Uuid,
) -> ResultEngine<Goal> {
    let model = goals::Entity::find_by_id(goal_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound("goal".to_string()))?;
    let goal = Goal::try_from(model)?;
    match goal.family_id.as_deref() {
        None => {
            if goal.user_id != user_id {
                return Err(EngineError::NotFound("goal".to_string()));
            }
        }
        Some(family_id) => {
            if family_role(db, family_id, user_id).await?.is_none() {
                return Err(EngineError::NotFound("goal".to_string()));
            }
        }
    }
    Ok(goal)
}

/// Loads a budget the caller may read. Family budgets are visible to every
/// member, whatever the role.
pub(crate) async fn require_budget_view(
    db: &impl ConnectionTrait,
    user_id: &str,
    budget_id: Uuid,
) -> ResultEngine<Budget> {
    let model = budgets::Entity::find_by_id(budget_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound("budget".to_string()))?;
    let budget = Budget::try_from(model)?;
    match budget.family_id.as_deref() {
        None => {
            if budget.user_id != user_id {
                return Err(EngineError::NotFound("budget".to_string()));
            }
        }
        Some(family_id) => {
            if family_role(db, family_id, user_id).await?.is_none() {
                return Err(EngineError::NotFound("budget".to_string()));
            }
        }
    }
    Ok(budget)
}

/// Loads a budget the caller may modify (owner, or a managing family role).
pub(crate) async fn require_budget_manage(
    db: &impl ConnectionTrait,
    user_id: &str,
    budget_id: Uuid,
) -> ResultEngine<Budget> {
    let budget = require_budget_view(db, user_id, budget_id).await?;
    if let Some(family_id) = budget.family_id.as_deref() {
        require_family_manage(db, family_id, user_id).await?;
    } else if budget.user_id != user_id {
        return Err(EngineError::NotFound("budget".to_string()));
    }
    Ok(budget)
}
