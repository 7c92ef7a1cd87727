use super::{
    engine,
    model::{RawRights, Rights},
    roles::{Role, RoleInput, RoleName},
};
use crate::{
    error::{Error, Result},
    store::RightsStore,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// User rights grants and role management.
#[derive(Clone)]
pub struct RightsService {
    store: Arc<dyn RightsStore>,
}

impl RightsService {
    #[must_use]
    pub fn new(store: Arc<dyn RightsStore>) -> Self {
        Self { store }
    }

    /// First grant for a user with no rights yet.
    ///
    /// # Errors
    /// Validation errors, `AlreadyHasRights` if the user already holds rights,
    /// `NotFound` for an unknown user.
    #[instrument(skip(self, rights))]
    pub async fn grant_rights_to_user(&self, user_id: Uuid, rights: &RawRights) -> Result<Rights> {
        let rights = Rights::parse_compact(rights)?;

        if self.store.grant_user_rights(user_id, &rights).await? {
            info!("Granted rights");
            return Ok(rights);
        }

        match self.store.user_rights(user_id).await? {
            Some(_) => Err(Error::AlreadyHasRights),
            None => Err(Error::NotFound("user")),
        }
    }

    /// Overwrite a user's rights.
    ///
    /// # Errors
    /// Validation errors or `NotFound` for an unknown user.
    #[instrument(skip(self, rights))]
    pub async fn edit_rights_to_user(&self, user_id: Uuid, rights: &RawRights) -> Result<Rights> {
        let rights = Rights::parse_compact(rights)?;

        if !self.store.replace_user_rights(user_id, &rights).await? {
            return Err(Error::NotFound("user"));
        }

        info!("Replaced rights");
        Ok(rights)
    }

    /// Remove permissions; an empty list removes the whole section.
    ///
    /// # Errors
    /// Validation errors, `SectionNotFound` if the user lacks a listed section,
    /// `NotFound` for an unknown user.
    #[instrument(skip(self, rights))]
    pub async fn revoke_rights_from_user(
        &self,
        user_id: Uuid,
        rights: &RawRights,
    ) -> Result<Rights> {
        let revoked = Rights::parse(rights)?;

        let remaining = self
            .store
            .update_user_rights(user_id, &|current| engine::revoke(&current, &revoked))
            .await?;

        info!(sections = remaining.len(), "Revoked rights");
        Ok(remaining)
    }

    /// Copy a role's rights onto a user, merging or replacing.
    ///
    /// # Errors
    /// `NotFound` for an unknown role or user.
    #[instrument(skip(self))]
    pub async fn assign_role_to_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        merge: bool,
    ) -> Result<Rights> {
        let role = self
            .store
            .role(role_id)
            .await?
            .ok_or(Error::NotFound("role"))?;

        let rights = self
            .store
            .update_user_rights(user_id, &|current| {
                Ok(if merge {
                    engine::merge(&current, &role.rights)
                } else {
                    role.rights.clone()
                })
            })
            .await?;

        info!(role = %role.name, merge, "Assigned role to user");
        Ok(rights)
    }

    /// # Errors
    /// `InvalidRole`, `Validation`, rights validation errors or `Conflict`.
    #[instrument(skip_all)]
    pub async fn add_role(&self, input: &RoleInput) -> Result<Role> {
        let role = validate_role(Uuid::now_v7(), input)?;
        self.store.insert_role(&role).await?;
        info!(role_id = %role.id, role = %role.name, "Created role");
        Ok(role)
    }

    /// # Errors
    /// Same as [`RightsService::add_role`], plus `NotFound`.
    #[instrument(skip(self, input))]
    pub async fn edit_role(&self, role_id: Uuid, input: &RoleInput) -> Result<Role> {
        let role = validate_role(role_id, input)?;
        if !self.store.update_role(&role).await? {
            return Err(Error::NotFound("role"));
        }
        info!(role = %role.name, "Updated role");
        Ok(role)
    }

    /// # Errors
    /// `NotFound` if no role has this id.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, role_id: Uuid) -> Result<()> {
        if !self.store.delete_role(role_id).await? {
            return Err(Error::NotFound("role"));
        }
        info!("Deleted role");
        Ok(())
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn get_roles(&self) -> Result<Vec<Role>> {
        self.store.roles().await
    }

    /// # Errors
    /// `NotFound` if no role has this id.
    pub async fn get_role_rights(&self, role_id: Uuid) -> Result<Rights> {
        self.store
            .role(role_id)
            .await?
            .map(|role| role.rights)
            .ok_or(Error::NotFound("role"))
    }
}

fn validate_role(id: Uuid, input: &RoleInput) -> Result<Role> {
    let name = input.name.trim().parse::<RoleName>()?;
    let localized_name = input.localized_name.trim();
    if localized_name.is_empty() {
        return Err(Error::validation("localized role name is required"));
    }
    let rights = Rights::parse_compact(&input.rights)?;

    Ok(Role {
        id,
        name,
        localized_name: localized_name.to_string(),
        notes: input.notes.trim().to_string(),
        rights,
    })
}
