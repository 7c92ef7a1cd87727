//! Route handlers.
//!
//! Handlers stay thin: decode the request, call one service operation and let
//! [`crate::Error`] pick the status code.

pub mod auth;
pub mod contexts;
pub mod health;
pub mod principal;
pub mod rights;
pub mod roles;
pub mod users;

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Rights as they travel over the wire: section name to permission names.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(transparent)]
pub struct RightsBody(pub BTreeMap<String, Vec<String>>);

impl From<crate::rights::Rights> for RightsBody {
    fn from(rights: crate::rights::Rights) -> Self {
        Self(rights.to_raw())
    }
}

/// Parse a path id, rejecting anything that is not a UUID with a 400.
pub(crate) fn parse_id(id: &str, what: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(id.trim()).map_err(|_| Error::validation(format!("invalid {what} id")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_only_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {id} "), "user").ok(), Some(id));
        assert!(matches!(
            parse_id("42", "role"),
            Err(Error::Validation(message)) if message == "invalid role id"
        ));
    }
}
