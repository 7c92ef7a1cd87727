use crate::{
    auth::{AuthConfig, AuthService},
    clock::Clock,
    contexts::ContextService,
    rights::RightsService,
    store::{ContextStore, CredentialStore, LockoutStore, RightsStore, StoreHealth},
    users::UserService,
};
use std::sync::Arc;

/// Services shared by every handler, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub users: UserService,
    pub rights: RightsService,
    pub contexts: ContextService,
    pub health: Arc<dyn StoreHealth>,
}

impl AppState {
    /// Wire every service to the same backing store.
    #[must_use]
    pub fn new<S>(store: Arc<S>, clock: Arc<dyn Clock>, config: AuthConfig) -> Self
    where
        S: CredentialStore + LockoutStore + RightsStore + ContextStore + StoreHealth + 'static,
    {
        Self {
            auth: AuthService::new(store.clone(), store.clone(), clock, config),
            users: UserService::new(store.clone(), store.clone()),
            rights: RightsService::new(store.clone()),
            contexts: ContextService::new(store.clone()),
            health: store,
        }
    }
}
