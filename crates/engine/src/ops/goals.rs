//! Goal operations, including the contribution orchestrator.

use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::{
    ContributeCmd, CreateGoalCmd, CreateTransactionCmd, EngineError, Goal, GoalProgress,
    GoalStatus, ResultEngine, TransactionKind, families, goals,
    ops::{ContributionOutcome, Engine, access, with_retry, with_tx},
};

impl Engine {
    /// Creates a saving goal. With `family_id` set the goal is shared with
    /// the family and requires a managing role to create.
    pub async fn create_goal(&self, cmd: CreateGoalCmd) -> ResultEngine<Goal> {
        self.validate_amount(cmd.target_amount_minor)?;
        let name = self.sanitize_name(&cmd.name, "goal")?;
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
                let goal = Goal::new(
                    cmd.user_id.clone(),
                    cmd.family_id.clone(),
                    name.clone(),
                    cmd.target_amount_minor,
                    cmd.target_date,
                    cmd.priority,
                )?;
                goals::ActiveModel::from(&goal).insert(&db_tx).await?;
                tracing::debug!(goal_id = %goal.id, name = %goal.name, "goal created");
                Ok(goal)
            })
        )
    }

    /// Moves money from an account into a goal, atomically.
    ///
    /// One transaction covers the contribution row, the account debit, the
    /// goal progress (status derived, completion surfaced as an event), and
    /// the bookkeeping budget when the command carries an expense category.
    /// Authorization is checked at entry and again inside the transaction.
    pub async fn contribute_to_goal(&self, cmd: ContributeCmd) -> ResultEngine<ContributionOutcome> {
        self.validate_amount(cmd.amount_minor)?;
        access::require_user(&self.database, &cmd.user_id).await?;
        let goal = access::require_goal_contribute(&self.database, &cmd.user_id, cmd.goal_id).await?;
        if !goal.status.accepts_contributions() {
            return Err(EngineError::GoalInactive(goal.name));
        }
        let cmd = &cmd;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let mut tx_cmd = CreateTransactionCmd::new(
                    cmd.user_id.clone(),
                    TransactionKind::Contribution,
                    cmd.amount_minor,
                    cmd.account_id,
                    cmd.occurred_on,
                )
                .goal_id(cmd.goal_id);
                if let Some(category_id) = cmd.category_id {
                    tx_cmd = tx_cmd.category_id(category_id);
                }
                if let Some(note) = cmd.note.as_deref() {
                    tx_cmd = tx_cmd.note(note);
                }
                let outcome = self.create_transaction_tx(&db_tx, &tx_cmd).await?;
                let model = goals::Entity::find_by_id(cmd.goal_id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| {
                        EngineError::Consistency("goal vanished mid-contribution".to_string())
                    })?;
                let goal = Goal::try_from(model)?;
                Ok(ContributionOutcome {
                    transaction_id: outcome.transaction_id,
                    goal_progress: GoalProgress::new(
                        goal.current_amount_minor,
                        goal.target_amount_minor,
                        goal.status,
                    ),
                    updated_balances: outcome.updated_balances,
                    events: outcome.events,
                })
            })
        )
    }

    pub async fn get_goal_progress(
        &self,
        user_id: &str,
        goal_id: Uuid,
    ) -> ResultEngine<GoalProgress> {
        let goal = access::require_goal_view(&self.database, user_id, goal_id).await?;
        Ok(GoalProgress::new(
            goal.current_amount_minor,
            goal.target_amount_minor,
            goal.status,
        ))
    }

    /// Goals visible to one user: their own plus every family-shared goal of
    /// families they belong to, highest priority first.
    pub async fn list_goals(&self, user_id: &str) -> ResultEngine<Vec<Goal>> {
        access::require_user(&self.database, user_id).await?;
        let family_ids: Vec<String> = families::member::Entity::find()
            .filter(families::member::Column::UserId.eq(user_id))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|m| m.family_id)
            .collect();
        let mut visible = Condition::any().add(goals::Column::UserId.eq(user_id));
        if !family_ids.is_empty() {
            visible = visible.add(goals::Column::FamilyId.is_in(family_ids));
        }
        let models = goals::Entity::find()
            .filter(visible)
            .order_by_desc(goals::Column::Priority)
            .order_by_asc(goals::Column::Name)
            .all(&self.database)
            .await?;
        models.into_iter().map(Goal::try_from).collect()
    }

    /// Cancels a goal. Cancelled is terminal: the goal refuses further
    /// contributions and its status no longer follows the ledger.
    pub async fn cancel_goal(&self, user_id: &str, goal_id: Uuid) -> ResultEngine<Goal> {
        access::require_user(&self.database, user_id).await?;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let goal = access::require_goal_contribute(&db_tx, user_id, goal_id).await?;
                if let Some(family_id) = goal.family_id.as_deref() {
                    access::require_family_manage(&db_tx, family_id, user_id).await?;
                }
                if goal.status == GoalStatus::Cancelled {
                    return Err(EngineError::GoalInactive(goal.name));
                }
                let active = goals::ActiveModel {
                    id: ActiveValue::Set(goal.id.to_string()),
                    status: ActiveValue::Set(GoalStatus::Cancelled.as_str().to_string()),
                    ..Default::default()
                };
                let model = active.update(&db_tx).await?;
                Goal::try_from(model)
            })
        )
    }
}
