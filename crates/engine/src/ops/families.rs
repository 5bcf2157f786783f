//! Family and membership operations.
//!
//! A family always has at least one owner. Role changes and removals that
//! would break that invariant are rejected, and touching an owner's
//! membership is itself owner-only.

use sea_orm::{ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    Capabilities, EngineError, Family, FamilyMember, FamilyRole, ResultEngine, families,
    ops::{Engine, access, with_retry, with_tx},
};

impl Engine {
    /// Creates a family with the creator as its owner.
    pub async fn create_family(&self, user_id: &str, name: &str) -> ResultEngine<Family> {
        let name = self.sanitize_name(name, "family")?;
        access::require_user(&self.database, user_id).await?;
        let name = &name;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let family = Family {
                    id: Uuid::new_v4().to_string(),
                    name: name.clone(),
                    created_by: user_id.to_string(),
                };
                let active = families::family::ActiveModel {
                    id: ActiveValue::Set(family.id.clone()),
                    name: ActiveValue::Set(family.name.clone()),
                    created_by: ActiveValue::Set(family.created_by.clone()),
                };
                active.insert(&db_tx).await?;
                families::member::active_model(&family.id, user_id, FamilyRole::Owner)
                    .insert(&db_tx)
                    .await?;
                tracing::debug!(family_id = %family.id, name = %family.name, "family created");
                Ok(family)
            })
        )
    }

    /// Adds a member or changes their role.
    ///
    /// Requires a managing role; granting or revoking ownership is owner-only.
    pub async fn upsert_family_member(
        &self,
        acting_user_id: &str,
        family_id: &str,
        target_user_id: &str,
        role: FamilyRole,
    ) -> ResultEngine<FamilyMember> {
        access::require_user(&self.database, acting_user_id).await?;
        access::require_user(&self.database, target_user_id).await?;
        access::require_family_manage(&self.database, family_id, acting_user_id).await?;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let acting =
                    access::require_family_manage(&db_tx, family_id, acting_user_id).await?;
                let existing = access::family_role(&db_tx, family_id, target_user_id).await?;
                let touches_ownership =
                    role == FamilyRole::Owner || existing == Some(FamilyRole::Owner);
                if touches_ownership && acting != FamilyRole::Owner {
                    return Err(EngineError::PermissionDenied(
                        "only an owner may grant or revoke ownership".to_string(),
                    ));
                }
                if existing == Some(FamilyRole::Owner)
                    && role != FamilyRole::Owner
                    && self.owner_count(&db_tx, family_id).await? <= 1
                {
                    return Err(EngineError::Validation(
                        "a family must keep at least one owner".to_string(),
                    ));
                }
                let member = FamilyMember {
                    family_id: family_id.to_string(),
                    user_id: target_user_id.to_string(),
                    role,
                };
                let mut active = families::member::active_model(family_id, target_user_id, role);
                if existing.is_some() {
                    active.family_id = ActiveValue::Unchanged(member.family_id.clone());
                    active.user_id = ActiveValue::Unchanged(member.user_id.clone());
                    active.update(&db_tx).await?;
                } else {
                    active.insert(&db_tx).await?;
                }
                tracing::debug!(
                    family_id,
                    user_id = target_user_id,
                    role = role.as_str(),
                    "family member upserted"
                );
                Ok(member)
            })
        )
    }

    /// Removes a member. Members may leave on their own; removing anyone
    /// else requires a managing role, and removing an owner is owner-only.
    pub async fn remove_family_member(
        &self,
        acting_user_id: &str,
        family_id: &str,
        target_user_id: &str,
    ) -> ResultEngine<()> {
        access::require_user(&self.database, acting_user_id).await?;
        with_retry!(
            self,
            with_tx!(self, |db_tx| {
                let acting = access::require_family_role(&db_tx, family_id, acting_user_id).await?;
                let target = access::family_role(&db_tx, family_id, target_user_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(target_user_id.to_string()))?;
                let self_removal = acting_user_id == target_user_id;
                if !self_removal && !acting.can_manage_family() {
                    return Err(EngineError::PermissionDenied(format!(
                        "role {} cannot remove members",
                        acting.as_str()
                    )));
                }
                if target == FamilyRole::Owner {
                    if !self_removal && acting != FamilyRole::Owner {
                        return Err(EngineError::PermissionDenied(
                            "only an owner may remove an owner".to_string(),
                        ));
                    }
                    if self.owner_count(&db_tx, family_id).await? <= 1 {
                        return Err(EngineError::Validation(
                            "a family must keep at least one owner".to_string(),
                        ));
                    }
                }
                families::member::Entity::delete_by_id((
                    family_id.to_string(),
                    target_user_id.to_string(),
                ))
                .exec(&db_tx)
                .await?;
                tracing::debug!(family_id, user_id = target_user_id, "family member removed");
                Ok(())
            })
        )
    }

    /// Members of a family, visible to any member.
    pub async fn list_family_members(
        &self,
        user_id: &str,
        family_id: &str,
    ) -> ResultEngine<Vec<FamilyMember>> {
        access::require_family_role(&self.database, family_id, user_id).await?;
        let models = families::member::Entity::find()
            .filter(families::member::Column::FamilyId.eq(family_id))
            .all(&self.database)
            .await?;
        models.into_iter().map(FamilyMember::try_from).collect()
    }

    /// Capability set of one user in one family; all false for non-members.
    pub async fn member_capabilities(
        &self,
        user_id: &str,
        family_id: &str,
    ) -> ResultEngine<Capabilities> {
        let role = access::family_role(&self.database, family_id, user_id).await?;
        Ok(role.map(Capabilities::from).unwrap_or_default())
    }

    async fn owner_count(
        &self,
        db: &impl sea_orm::ConnectionTrait,
        family_id: &str,
    ) -> ResultEngine<u64> {
        use sea_orm::PaginatorTrait;
        let count = families::member::Entity::find()
            .filter(families::member::Column::FamilyId.eq(family_id))
            .filter(families::member::Column::Role.eq(FamilyRole::Owner.as_str()))
            .count(db)
            .await?;
        Ok(count)
    }
}
