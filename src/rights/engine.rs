//! Rights algebra: per-section union for merges, set difference for revokes.

use super::model::Rights;
use crate::error::{Error, Result};

/// Union `incoming` into `current`, section by section, without duplicates.
#[must_use]
pub fn merge(current: &Rights, incoming: &Rights) -> Rights {
    let mut merged = current.clone();
    for (section, permissions) in incoming.iter() {
        merged.insert(section, permissions.iter().copied());
    }
    merged
}

/// Remove `revoked` from `current`.
///
/// An empty permission set removes the whole section. A section left with no
/// permissions is dropped. Every revoked section must already be present.
///
/// # Errors
/// `SectionNotFound` naming the first revoked section `current` lacks.
pub fn revoke(current: &Rights, revoked: &Rights) -> Result<Rights> {
    let mut remaining = current.clone();
    for (section, permissions) in revoked.iter() {
        let Some(held) = remaining.get_mut(section) else {
            return Err(Error::SectionNotFound(section.to_string()));
        };

        if permissions.is_empty() {
            remaining.remove(section);
            continue;
        }

        held.retain(|permission| !permissions.contains(permission));
        if held.is_empty() {
            remaining.remove(section);
        }
    }
    Ok(remaining)
}
