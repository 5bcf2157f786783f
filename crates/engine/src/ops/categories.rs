//! Category operations.

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::{
    Category, CreateCategoryCmd, EngineError, ResultEngine, categories,
    ops::{Engine, access, with_retry, with_tx},
};

impl Engine {
    /// Creates a category. Names are unique per user and direction.
    pub async fn create_category(&self, cmd: CreateCategoryCmd) -> ResultEngine<Category> {
        if let Some(monthly) = cmd.monthly_budget_minor {
            self.validate_amount(monthly)?;
        }
        let name = self.sanitize_name(&cmd.name, "category")?;
        access::require_user(&self.database, &cmd.user_id).await?;
        let cmd = &cmd;
        let name = &name;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let duplicate = categories::Entity::find()
                    .filter(categories::Column::UserId.eq(cmd.user_id.as_str()))
                    .filter(categories::Column::Name.eq(name.as_str()))
                    .filter(categories::Column::Kind.eq(cmd.kind.as_str()))
                    .one(&db_tx)
                    .await?;
                if duplicate.is_some() {
                    return Err(EngineError::AlreadyExists(name.clone()));
                }
                let category = Category::new(
                    cmd.user_id.clone(),
                    name.clone(),
                    cmd.kind,
                    cmd.monthly_budget_minor,
                );
                categories::ActiveModel::from(&category).insert(&db_tx).await?;
                tracing::debug!(category_id = %category.id, name = %category.name, "category created");
                Ok(category)
            })
        )
    }

    pub async fn list_categories(&self, user_id: &str) -> ResultEngine<Vec<Category>> {
        access::require_user(&self.database, user_id).await?;
        let models = categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .order_by_asc(categories::Column::Kind)
            .order_by_asc(categories::Column::Name)
            .all(&self.database)
            .await?;
        models.into_iter().map(Category::try_from).collect()
    }
}
