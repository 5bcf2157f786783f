//! Budget operations.

use sea_orm::{ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    Budget, BudgetState, CategoryKind, CreateBudgetCmd, EngineError, ResultEngine, budgets,
    ops::{BudgetStatusView, Engine, access, with_retry, with_tx},
};

impl Engine {
    /// Creates a budget over one expense category and period.
    ///
    /// Two live budgets may not overlap on the same category: the matcher
    /// charging expenses to budgets must have one unambiguous target per
    /// date. Family budgets require a managing role in that family.
    pub async fn create_budget(&self, cmd: CreateBudgetCmd) -> ResultEngine<Budget> {
        self.validate_amount(cmd.amount_minor)?;
        let name = self.sanitize_name(&cmd.name, "budget")?;
        access::require_user(&self.database, &cmd.user_id).await?;
        if let Some(family_id) = cmd.family_id.as_deref() {
            access::require_family_manage(&self.database, family_id, &cmd.user_id).await?;
        }
        let cmd = &cmd;
        let name = &name;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                if let Some(family_id) = cmd.family_id.as_deref() {
                    access::require_family_manage(&db_tx, family_id, &cmd.user_id).await?;
                }
                let category =
                    access::require_category(&db_tx, &cmd.user_id, cmd.category_id).await?;
                if category.kind != CategoryKind::Expense {
                    return Err(EngineError::Validation(
                        "budgets only apply to expense categories".to_string(),
                    ));
                }
                let budget = Budget::new(
                    cmd.user_id.clone(),
                    cmd.family_id.clone(),
                    cmd.category_id,
                    name.clone(),
                    cmd.amount_minor,
                    cmd.period,
                    cmd.starts_on,
                    cmd.alert_threshold_bp,
                    cmd.alert_enabled,
                )?;
                let overlapping = budgets::Entity::find()
                    .filter(budgets::Column::CategoryId.eq(cmd.category_id.to_string()))
                    .filter(budgets::Column::Status.ne(BudgetState::Completed.as_str()))
                    .filter(budgets::Column::StartsOn.lte(budget.ends_on))
                    .filter(budgets::Column::EndsOn.gte(budget.starts_on))
                    .one(&db_tx)
                    .await?;
                if let Some(existing) = overlapping {
                    return Err(EngineError::AlreadyExists(existing.name));
                }
                budgets::ActiveModel::from(&budget).insert(&db_tx).await?;
                tracing::debug!(budget_id = %budget.id, name = %budget.name, "budget created");
                Ok(budget)
            })
        )
    }

    pub async fn get_budget(&self, user_id: &str, budget_id: Uuid) -> ResultEngine<Budget> {
        access::require_budget_view(&self.database, user_id, budget_id).await
    }

    /// Spending snapshot of one budget.
    pub async fn get_budget_status(
        &self,
        user_id: &str,
        budget_id: Uuid,
    ) -> ResultEngine<BudgetStatusView> {
        let budget = access::require_budget_view(&self.database, user_id, budget_id).await?;
        Ok(BudgetStatusView {
            spent_minor: budget.spent_minor,
            remaining_minor: budget.amount_minor - budget.spent_minor,
            percent_bp: budget.percent_bp(),
            status: budget.status,
        })
    }

    /// Budgets visible to one user (own plus family-shared), newest first.
    pub async fn list_budgets(&self, user_id: &str) -> ResultEngine<Vec<Budget>> {
        access::require_user(&self.database, user_id).await?;
        let models = budgets::Entity::find()
            .filter(budgets::Column::UserId.eq(user_id))
            .order_by_desc(budgets::Column::StartsOn)
            .all(&self.database)
            .await?;
        models.into_iter().map(Budget::try_from).collect()
    }

    /// Pauses, resumes, or completes a budget. Paused and completed budgets
    /// stop matching new expenses; their recorded spending is untouched.
    pub async fn set_budget_status(
        &self,
        user_id: &str,
        budget_id: Uuid,
        status: BudgetState,
    ) -> ResultEngine<Budget> {
        access::require_user(&self.database, user_id).await?;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let budget = access::require_budget_manage(&db_tx, user_id, budget_id).await?;
                let active = budgets::ActiveModel {
                    id: ActiveValue::Set(budget.id.to_string()),
                    status: ActiveValue::Set(status.as_str().to_string()),
                    ..Default::default()
                };
                let model = active.update(&db_tx).await?;
                Budget::try_from(model)
            })
        )
    }
}
