//! Merchant scoping for users.
//!
//! A user is either global (one unscoped association) or bound to an explicit
//! list of merchants. Rows are stored one per merchant; reads aggregate them.

mod service;

pub use service::ContextService;

use serde::Serialize;
use uuid::Uuid;

/// One stored association. `merchant_id` is empty for the global row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: Uuid,
    pub merchant_id: String,
    pub global: bool,
}

/// Aggregated view of a user's associations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserContexts {
    pub user_id: Uuid,
    pub merchant_ids: Vec<String>,
    pub global: bool,
}

impl UserContexts {
    #[must_use]
    pub fn from_rows(user_id: Uuid, rows: &[UserContext]) -> Self {
        let mut merchant_ids: Vec<String> = rows
            .iter()
            .filter(|row| !row.merchant_id.is_empty())
            .map(|row| row.merchant_id.clone())
            .collect();
        merchant_ids.sort();
        merchant_ids.dedup();

        Self {
            user_id,
            merchant_ids,
            global: rows.iter().any(|row| row.global),
        }
    }

    /// Comma-joined merchant ids.
    #[must_use]
    pub fn joined_merchant_ids(&self) -> String {
        self.merchant_ids.join(",")
    }
}
