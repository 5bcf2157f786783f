//! Family membership and the role matrix.
//!
//! Authorization for family-shared goals and budgets is a pure function of
//! the caller's role. The ops layer evaluates it at request entry (fail
//! fast) and again inside the commit transaction to close the
//! time-of-check/time-of-use window against concurrent role changes.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl FamilyRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    /// May create family-scoped goals/budgets and manage memberships.
    #[must_use]
    pub fn can_manage_family(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// May contribute to family goals and create transactions against them.
    #[must_use]
    pub fn can_contribute(self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Member)
    }
}

impl TryFrom<&str> for FamilyRole {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            other => Err(EngineError::Validation(format!(
                "invalid family role: {other}"
            ))),
        }
    }
}

/// Capability set resolved for one `(user, family)` pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub can_manage_family: bool,
    pub can_contribute: bool,
}

impl From<FamilyRole> for Capabilities {
    fn from(role: FamilyRole) -> Self {
        Self {
            can_manage_family: role.can_manage_family(),
            can_contribute: role.can_contribute(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: String,
    pub name: String,
    pub created_by: String,
}

impl From<family::Model> for Family {
    fn from(model: family::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            created_by: model.created_by,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub family_id: String,
    pub user_id: String,
    pub role: FamilyRole,
}

impl TryFrom<member::Model> for FamilyMember {
    type Error = EngineError;

    fn try_from(model: member::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            family_id: model.family_id,
            user_id: model.user_id,
            role: FamilyRole::try_from(model.role.as_str())?,
        })
    }
}

pub mod family {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "families")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub name: String,
        pub created_by: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::member::Entity")]
        Members,
    }

    impl Related<super::member::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Members.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod member {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "family_members")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub family_id: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: String,
        pub role: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::family::Entity",
            from = "Column::FamilyId",
            to = "super::family::Column::Id"
        )]
        Family,
    }

    impl Related<super::family::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Family.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}

    pub fn active_model(family_id: &str, user_id: &str, role: FamilyRole) -> ActiveModel {
        ActiveModel {
            family_id: ActiveValue::Set(family_id.to_string()),
            user_id: ActiveValue::Set(user_id.to_string()),
            role: ActiveValue::Set(role.as_str().to_string()),
        }
    }
}
