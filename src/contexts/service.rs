use super::UserContexts;
use crate::{
    error::{Error, Result},
    store::ContextStore,
};
use regex::Regex;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

fn valid_merchant_id(merchant_id: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").is_ok_and(|regex| regex.is_match(merchant_id))
}

#[derive(Clone)]
pub struct ContextService {
    store: Arc<dyn ContextStore>,
}

impl ContextService {
    #[must_use]
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }

    /// Scope a user to a merchant, or make them global.
    ///
    /// # Errors
    /// `Validation` for a missing or malformed merchant id when not global,
    /// `NotFound` for an unknown user.
    #[instrument(skip(self))]
    pub async fn add_user_context(
        &self,
        user_id: Uuid,
        merchant_id: Option<&str>,
        global: bool,
    ) -> Result<UserContexts> {
        if global {
            self.store.set_global_context(user_id, true).await?;
        } else {
            let merchant_id = merchant_id.map(str::trim).unwrap_or_default();
            if !valid_merchant_id(merchant_id) {
                return Err(Error::validation(
                    "merchant id is required unless the context is global",
                ));
            }
            self.store.add_merchant_context(user_id, merchant_id).await?;
        }

        info!("Added user context");
        self.get_user_contexts(user_id).await
    }

    /// Switch the global flag; clearing it keeps explicit merchants.
    ///
    /// # Errors
    /// `NotFound` for an unknown user.
    #[instrument(skip(self))]
    pub async fn edit_user_context(&self, user_id: Uuid, global: bool) -> Result<UserContexts> {
        self.store.set_global_context(user_id, global).await?;
        info!("Edited user context");
        self.get_user_contexts(user_id).await
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn get_user_contexts(&self, user_id: Uuid) -> Result<UserContexts> {
        let rows = self.store.user_contexts(user_id).await?;
        Ok(UserContexts::from_rows(user_id, &rows))
    }

    /// # Errors
    /// `NotFound` if the user is not scoped to this merchant.
    #[instrument(skip(self))]
    pub async fn delete_user_context(&self, user_id: Uuid, merchant_id: &str) -> Result<()> {
        let merchant_id = merchant_id.trim();
        if merchant_id.is_empty()
            || !self
                .store
                .delete_merchant_context(user_id, merchant_id)
                .await?
        {
            return Err(Error::NotFound("user context"));
        }
        info!("Deleted user context");
        Ok(())
    }

    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn delete_all_user_contexts(&self, user_id: Uuid) -> Result<u64> {
        let removed = self.store.delete_user_contexts(user_id).await?;
        info!(removed, "Deleted all user contexts");
        Ok(removed)
    }
}
