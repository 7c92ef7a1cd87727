//! PostgreSQL implementation of the store traits.
//!
//! Every statement runs inside a `db.query` span carrying the operation and
//! the SQL text. Schema lives in `db/sql/01_warden.sql`.

use super::{
    ContextStore, CredentialStore, FailedLoginRecord, LockoutStore, NewUser, RightsStore,
    RightsUpdate, StoreHealth, UserAccount,
};
use crate::{
    contexts::UserContext,
    error::{is_foreign_key_violation, is_unique_violation, Error, Result},
    rights::{Rights, Role, RoleName},
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, Connection, PgPool, Row};
use tracing::{Instrument, Span};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, phone, email, password_hash, first_name, last_name, roles, \
                            entitlements, created_at, updated_at";

fn query_span(operation: &'static str, statement: &str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn account_from_row(row: &PgRow) -> UserAccount {
    UserAccount {
        id: row.get("id"),
        phone: row.get("phone"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        roles: row.get("roles"),
        entitlements: row.get("entitlements"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn role_from_row(row: &PgRow) -> Result<Role> {
    let name: String = row.get("name");
    let name = name
        .parse::<RoleName>()
        .map_err(|_| anyhow!("stored role has unknown name: {name}"))?;
    let Json(rights): Json<Rights> = row.get("rights");

    Ok(Role {
        id: row.get("id"),
        name,
        localized_name: row.get("localized_name"),
        notes: row.get("notes"),
        rights,
    })
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<()> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;

        let ping_span =
            tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<()> {
        let query = r"
            INSERT INTO users (id, phone, email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.phone)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::Conflict("user already exists".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn user_exists(&self, phone: &str, email: Option<&str>) -> Result<bool> {
        let query = "SELECT EXISTS (SELECT 1 FROM users WHERE phone = $1 OR ($2::text IS NOT NULL AND email = $2)) AS found";
        let row = sqlx::query(query)
            .bind(phone)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(row.get("found"))
    }

    async fn user_by_phone(&self, phone: &str) -> Result<Option<UserAccount>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
        let row = sqlx::query(&query)
            .bind(phone)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserAccount>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn update_credentials(&self, id: Uuid, phone: &str, password_hash: &str) -> Result<bool> {
        let query = r"
            UPDATE users
            SET phone = $1, password_hash = $2, updated_at = NOW()
            WHERE id = $3
        ";
        let result = sqlx::query(query)
            .bind(phone)
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::Conflict("phone already in use".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r"
            UPDATE users
            SET refresh_token_hash = $1, refresh_token_expires_at = $2
            WHERE id = $3
        ";
        let done = sqlx::query(query)
            .bind(token_hash)
            .bind(expires_at)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;

        if done.rows_affected() == 0 {
            return Err(Error::NotFound("user"));
        }
        Ok(())
    }

    async fn refresh_token_owner(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        let query = r"
            SELECT id FROM users
            WHERE refresh_token_hash = $1 AND refresh_token_expires_at > $2
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(row.map(|row| row.get("id")))
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &[u8],
        next: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let query = r"
            UPDATE users
            SET refresh_token_hash = $1, refresh_token_expires_at = $2
            WHERE id = $3 AND refresh_token_hash = $4
        ";
        let done = sqlx::query(query)
            .bind(next)
            .bind(expires_at)
            .bind(id)
            .bind(current)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn revoke_refresh_token(&self, token_hash: &[u8]) -> Result<bool> {
        let query = r"
            UPDATE users
            SET refresh_token_hash = NULL, refresh_token_expires_at = NULL
            WHERE refresh_token_hash = $1
        ";
        let done = sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl LockoutStore for PgStore {
    async fn failed_login(&self, phone: &str) -> Result<Option<FailedLoginRecord>> {
        let query = "SELECT phone, attempts, blocked_until FROM failed_logins WHERE phone = $1";
        let row = sqlx::query(query)
            .bind(phone)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        Ok(row.map(|row| FailedLoginRecord {
            phone: row.get("phone"),
            attempts: row.get("attempts"),
            blocked_until: row.get("blocked_until"),
        }))
    }

    async fn increment_failed_attempts(&self, phone: &str) -> Result<i32> {
        // Single statement so concurrent failures never lose an increment.
        let query = r"
            INSERT INTO failed_logins (phone, attempts)
            VALUES ($1, 1)
            ON CONFLICT (phone) DO UPDATE
                SET attempts = failed_logins.attempts + 1, updated_at = NOW()
            RETURNING attempts
        ";
        let row = sqlx::query(query)
            .bind(phone)
            .fetch_one(&self.pool)
            .instrument(query_span("UPSERT", query))
            .await?;
        Ok(row.get("attempts"))
    }

    async fn set_blocked_until(&self, phone: &str, until: Option<DateTime<Utc>>) -> Result<()> {
        let query = r"
            UPDATE failed_logins
            SET blocked_until = $1, updated_at = NOW()
            WHERE phone = $2
        ";
        sqlx::query(query)
            .bind(until)
            .bind(phone)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(())
    }

    async fn purge_failed_logins(&self, phone: &str) -> Result<()> {
        let query = "DELETE FROM failed_logins WHERE phone = $1";
        sqlx::query(query)
            .bind(phone)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RightsStore for PgStore {
    async fn user_rights(&self, user_id: Uuid) -> Result<Option<Rights>> {
        let query = "SELECT rights FROM users WHERE id = $1";
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        Ok(row.map(|row| {
            let Json(rights): Json<Rights> = row.get("rights");
            rights
        }))
    }

    async fn grant_user_rights(&self, user_id: Uuid, rights: &Rights) -> Result<bool> {
        let query = r"
            UPDATE users
            SET rights = $1, updated_at = NOW()
            WHERE id = $2 AND rights = '{}'::jsonb
        ";
        let done = sqlx::query(query)
            .bind(Json(rights))
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn replace_user_rights(&self, user_id: Uuid, rights: &Rights) -> Result<bool> {
        let query = "UPDATE users SET rights = $1, updated_at = NOW() WHERE id = $2";
        let done = sqlx::query(query)
            .bind(Json(rights))
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn update_user_rights(&self, user_id: Uuid, apply: RightsUpdate<'_>) -> Result<Rights> {
        let mut tx = self.pool.begin().await?;

        let query = "SELECT rights FROM users WHERE id = $1 FOR UPDATE";
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .instrument(query_span("SELECT", query))
            .await?;
        let Some(row) = row else {
            return Err(Error::NotFound("user"));
        };
        let Json(current): Json<Rights> = row.get("rights");

        // Dropping the transaction on error rolls it back.
        let updated = apply(current)?;

        let query = "UPDATE users SET rights = $1, updated_at = NOW() WHERE id = $2";
        sqlx::query(query)
            .bind(Json(&updated))
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE", query))
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn insert_role(&self, role: &Role) -> Result<()> {
        let query = r"
            INSERT INTO roles (id, name, localized_name, notes, rights)
            VALUES ($1, $2, $3, $4, $5)
        ";
        let result = sqlx::query(query)
            .bind(role.id)
            .bind(role.name.as_str())
            .bind(&role.localized_name)
            .bind(&role.notes)
            .bind(Json(&role.rights))
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::Conflict(format!("role {} already exists", role.name)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_role(&self, role: &Role) -> Result<bool> {
        let query = r"
            UPDATE roles
            SET name = $1, localized_name = $2, notes = $3, rights = $4, updated_at = NOW()
            WHERE id = $5
        ";
        let result = sqlx::query(query)
            .bind(role.name.as_str())
            .bind(&role.localized_name)
            .bind(&role.notes)
            .bind(Json(&role.rights))
            .bind(role.id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::Conflict(format!("role {} already exists", role.name)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM roles WHERE id = $1";
        let done = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn role(&self, id: Uuid) -> Result<Option<Role>> {
        let query = "SELECT id, name, localized_name, notes, rights FROM roles WHERE id = $1";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        let query = "SELECT id, name, localized_name, notes, rights FROM roles ORDER BY name";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        rows.iter().map(role_from_row).collect()
    }
}

#[async_trait]
impl ContextStore for PgStore {
    async fn add_merchant_context(&self, user_id: Uuid, merchant_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let query = "DELETE FROM user_contexts WHERE user_id = $1 AND merchant_id = ''";
        sqlx::query(query)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE", query))
            .await?;

        let query = r"
            INSERT INTO user_contexts (user_id, merchant_id, global)
            VALUES ($1, $2, FALSE)
            ON CONFLICT (user_id, merchant_id) DO UPDATE SET global = FALSE
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(merchant_id)
            .execute(&mut *tx)
            .instrument(query_span("UPSERT", query))
            .await;

        match result {
            Ok(_) => {}
            Err(err) if is_foreign_key_violation(&err) => return Err(Error::NotFound("user")),
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_global_context(&self, user_id: Uuid, global: bool) -> Result<()> {
        if !global {
            if self.user_by_id(user_id).await?.is_none() {
                return Err(Error::NotFound("user"));
            }
            let query = "DELETE FROM user_contexts WHERE user_id = $1 AND merchant_id = ''";
            sqlx::query(query)
                .bind(user_id)
                .execute(&self.pool)
                .instrument(query_span("DELETE", query))
                .await?;
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let query = "DELETE FROM user_contexts WHERE user_id = $1";
        sqlx::query(query)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE", query))
            .await?;

        let query = "INSERT INTO user_contexts (user_id, merchant_id, global) VALUES ($1, '', TRUE)";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => {}
            Err(err) if is_foreign_key_violation(&err) => return Err(Error::NotFound("user")),
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;
        Ok(())
    }

    async fn user_contexts(&self, user_id: Uuid) -> Result<Vec<UserContext>> {
        let query = r"
            SELECT user_id, merchant_id, global
            FROM user_contexts
            WHERE user_id = $1
            ORDER BY merchant_id
        ";
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        Ok(rows
            .iter()
            .map(|row| UserContext {
                user_id: row.get("user_id"),
                merchant_id: row.get("merchant_id"),
                global: row.get("global"),
            })
            .collect())
    }

    async fn delete_merchant_context(&self, user_id: Uuid, merchant_id: &str) -> Result<bool> {
        let query = "DELETE FROM user_contexts WHERE user_id = $1 AND merchant_id = $2";
        let done = sqlx::query(query)
            .bind(user_id)
            .bind(merchant_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn delete_user_contexts(&self, user_id: Uuid) -> Result<u64> {
        let query = "DELETE FROM user_contexts WHERE user_id = $1";
        let done = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(done.rows_affected())
    }
}
