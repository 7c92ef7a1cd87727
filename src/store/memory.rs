use super::{
    ContextStore, CredentialStore, FailedLoginRecord, LockoutStore, NewUser, RightsStore,
    RightsUpdate, StoreHealth, UserAccount,
};
use crate::{
    clock::Clock,
    contexts::UserContext,
    error::{Error, Result},
    rights::{Rights, Role},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug)]
struct StoredUser {
    account: UserAccount,
    rights: Rights,
    refresh: Option<(Vec<u8>, DateTime<Utc>)>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, StoredUser>,
    failed_logins: HashMap<String, FailedLoginRecord>,
    roles: HashMap<Uuid, Role>,
    // (user_id, merchant_id) -> global
    contexts: BTreeMap<(Uuid, String), bool>,
}

impl Inner {
    fn phone_taken(&self, phone: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|user| user.account.phone == phone && Some(user.account.id) != except)
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users
            .values()
            .any(|user| user.account.email.as_deref() == Some(email))
    }

    fn role_name_taken(&self, role: &Role) -> bool {
        self.roles
            .values()
            .any(|existing| existing.name == role.name && existing.id != role.id)
    }
}

/// Process-local store implementing every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a user's roles and entitlements, which have no service-level setter.
    pub async fn set_user_claims(&self, id: Uuid, roles: Vec<String>, entitlements: Vec<String>) {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&id) {
            user.account.roles = roles;
            user.account.entitlements = entitlements;
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.phone_taken(&user.phone, None)
            || user
                .email
                .as_deref()
                .is_some_and(|email| inner.email_taken(email))
        {
            return Err(Error::Conflict("user already exists".to_string()));
        }

        let now = Utc::now();
        inner.users.insert(
            user.id,
            StoredUser {
                account: UserAccount {
                    id: user.id,
                    phone: user.phone,
                    email: user.email,
                    password_hash: user.password_hash,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    roles: Vec::new(),
                    entitlements: Vec::new(),
                    created_at: now,
                    updated_at: now,
                },
                rights: Rights::new(),
                refresh: None,
            },
        );
        Ok(())
    }

    async fn user_exists(&self, phone: &str, email: Option<&str>) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.phone_taken(phone, None) || email.is_some_and(|email| inner.email_taken(email)))
    }

    async fn user_by_phone(&self, phone: &str) -> Result<Option<UserAccount>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.account.phone == phone)
            .map(|user| user.account.clone()))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserAccount>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&id).map(|user| user.account.clone()))
    }

    async fn update_credentials(&self, id: Uuid, phone: &str, password_hash: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.phone_taken(phone, Some(id)) {
            return Err(Error::Conflict("phone already in use".to_string()));
        }
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(false);
        };
        user.account.phone = phone.to_string();
        user.account.password_hash = password_hash.to_string();
        user.account.updated_at = Utc::now();
        Ok(true)
    }

    async fn save_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.get_mut(&id).ok_or(Error::NotFound("user"))?;
        user.refresh = Some((token_hash.to_vec(), expires_at));
        Ok(())
    }

    async fn refresh_token_owner(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.values().find_map(|user| match &user.refresh {
            Some((hash, expires_at)) if hash == token_hash && *expires_at > now => {
                Some(user.account.id)
            }
            _ => None,
        }))
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &[u8],
        next: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(false);
        };
        let holds_current = user
            .refresh
            .as_ref()
            .is_some_and(|(hash, _)| hash == current);
        if holds_current {
            user.refresh = Some((next.to_vec(), expires_at));
        }
        Ok(holds_current)
    }

    async fn revoke_refresh_token(&self, token_hash: &[u8]) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let owner = inner.users.values_mut().find(|user| {
            user.refresh
                .as_ref()
                .is_some_and(|(hash, _)| hash == token_hash)
        });
        Ok(owner.map(|user| user.refresh.take()).is_some())
    }
}

#[async_trait]
impl LockoutStore for MemoryStore {
    async fn failed_login(&self, phone: &str) -> Result<Option<FailedLoginRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.failed_logins.get(phone).cloned())
    }

    async fn increment_failed_attempts(&self, phone: &str) -> Result<i32> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .failed_logins
            .entry(phone.to_string())
            .or_insert_with(|| FailedLoginRecord {
                phone: phone.to_string(),
                attempts: 0,
                blocked_until: None,
            });
        record.attempts += 1;
        Ok(record.attempts)
    }

    async fn set_blocked_until(&self, phone: &str, until: Option<DateTime<Utc>>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(record) = inner.failed_logins.get_mut(phone) {
            record.blocked_until = until;
        }
        Ok(())
    }

    async fn purge_failed_logins(&self, phone: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.failed_logins.remove(phone);
        Ok(())
    }
}

#[async_trait]
impl RightsStore for MemoryStore {
    async fn user_rights(&self, user_id: Uuid) -> Result<Option<Rights>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&user_id).map(|user| user.rights.clone()))
    }

    async fn grant_user_rights(&self, user_id: Uuid, rights: &Rights) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&user_id) {
            Some(user) if user.rights.is_empty() => {
                user.rights = rights.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace_user_rights(&self, user_id: Uuid, rights: &Rights) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        user.rights = rights.clone();
        Ok(true)
    }

    async fn update_user_rights(&self, user_id: Uuid, apply: RightsUpdate<'_>) -> Result<Rights> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.get_mut(&user_id).ok_or(Error::NotFound("user"))?;
        let updated = apply(user.rights.clone())?;
        user.rights = updated.clone();
        Ok(updated)
    }

    async fn insert_role(&self, role: &Role) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.role_name_taken(role) {
            return Err(Error::Conflict(format!("role {} already exists", role.name)));
        }
        inner.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.roles.contains_key(&role.id) {
            return Ok(false);
        }
        if inner.role_name_taken(role) {
            return Err(Error::Conflict(format!("role {} already exists", role.name)));
        }
        inner.roles.insert(role.id, role.clone());
        Ok(true)
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.roles.remove(&id).is_some())
    }

    async fn role(&self, id: Uuid) -> Result<Option<Role>> {
        let inner = self.inner.lock().await;
        Ok(inner.roles.get(&id).cloned())
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        let inner = self.inner.lock().await;
        let mut roles: Vec<Role> = inner.roles.values().cloned().collect();
        roles.sort_by_key(|role| role.name.as_str());
        Ok(roles)
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn add_merchant_context(&self, user_id: Uuid, merchant_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&user_id) {
            return Err(Error::NotFound("user"));
        }
        inner.contexts.remove(&(user_id, String::new()));
        inner.contexts.insert((user_id, merchant_id.to_string()), false);
        Ok(())
    }

    async fn set_global_context(&self, user_id: Uuid, global: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&user_id) {
            return Err(Error::NotFound("user"));
        }
        if global {
            inner.contexts.retain(|(owner, _), _| *owner != user_id);
            inner.contexts.insert((user_id, String::new()), true);
        } else {
            inner.contexts.remove(&(user_id, String::new()));
        }
        Ok(())
    }

    async fn user_contexts(&self, user_id: Uuid) -> Result<Vec<UserContext>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .contexts
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|((owner, merchant_id), global)| UserContext {
                user_id: *owner,
                merchant_id: merchant_id.clone(),
                global: *global,
            })
            .collect())
    }

    async fn delete_merchant_context(&self, user_id: Uuid, merchant_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .contexts
            .remove(&(user_id, merchant_id.to_string()))
            .is_some())
    }

    async fn delete_user_contexts(&self, user_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.contexts.len();
        inner.contexts.retain(|(owner, _), _| *owner != user_id);
        Ok(u64::try_from(before - inner.contexts.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: StdMutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: StdMutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rights::{Permission, Section};

    fn new_user(phone: &str, email: Option<&str>) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            email: email.map(str::to_string),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn duplicate_phone_conflicts() {
        let store = MemoryStore::new();
        store.insert_user(new_user("+15550001", None)).await.unwrap();

        let result = store.insert_user(new_user("+15550001", None)).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn refresh_rotation_is_compare_and_swap() {
        let store = MemoryStore::new();
        let user = new_user("+15550002", None);
        let id = user.id;
        store.insert_user(user).await.unwrap();

        let expires = Utc::now() + Duration::days(1);
        store.save_refresh_token(id, b"a", expires).await.unwrap();

        assert!(store.rotate_refresh_token(id, b"a", b"b", expires).await.unwrap());
        assert!(!store.rotate_refresh_token(id, b"a", b"c", expires).await.unwrap());
        assert_eq!(
            store.refresh_token_owner(b"b", Utc::now()).await.unwrap(),
            Some(id)
        );
    }

    #[tokio::test]
    async fn expired_refresh_token_has_no_owner() {
        let store = MemoryStore::new();
        let user = new_user("+15550003", None);
        let id = user.id;
        store.insert_user(user).await.unwrap();

        let now = Utc::now();
        store
            .save_refresh_token(id, b"t", now - Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(store.refresh_token_owner(b"t", now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn grant_only_applies_to_empty_rights() {
        let store = MemoryStore::new();
        let user = new_user("+15550004", None);
        let id = user.id;
        store.insert_user(user).await.unwrap();

        let rights = Rights::from([(Section::Orders, vec![Permission::Read])]);
        assert!(store.grant_user_rights(id, &rights).await.unwrap());
        assert!(!store.grant_user_rights(id, &rights).await.unwrap());
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(31));
        assert_eq!(clock.now() - start, Duration::seconds(31));
    }
}
