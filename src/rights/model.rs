use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Wire form of a rights map, validated into [`Rights`] by [`Rights::parse`].
pub type RawRights = BTreeMap<String, Vec<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Section {
    Orders,
    ProductsBase,
    Products,
    Pricelist,
    ProductsAdd,
    Catalog,
    Char,
    History,
}

impl Section {
    pub const ALL: [Self; 8] = [
        Self::Orders,
        Self::ProductsBase,
        Self::Products,
        Self::Pricelist,
        Self::ProductsAdd,
        Self::Catalog,
        Self::Char,
        Self::History,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "ORDERS",
            Self::ProductsBase => "PRODUCTS_BASE",
            Self::Products => "PRODUCTS",
            Self::Pricelist => "PRICELIST",
            Self::ProductsAdd => "PRODUCTS_ADD",
            Self::Catalog => "CATALOG",
            Self::Char => "CHAR",
            Self::History => "HISTORY",
        }
    }
}

impl FromStr for Section {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == value)
            .ok_or_else(|| Error::InvalidSection(value.to_string()))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Read,
    Create,
    Update,
    Delete,
}

impl Permission {
    pub const ALL: [Self; 4] = [Self::Read, Self::Create, Self::Update, Self::Delete];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| Error::InvalidPermission(value.to_string()))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Section to permission-set map held by users and roles.
///
/// Permissions inside a section are a set, so merging never produces
/// duplicates. A section may carry an empty set only transiently, in a revoke
/// request where it means "drop the whole section".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rights(BTreeMap<Section, BTreeSet<Permission>>);

impl Rights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a wire map. Fails on an empty map, an unknown section or an
    /// unknown permission, naming the offending value.
    ///
    /// # Errors
    /// `EmptyRights`, `InvalidSection` or `InvalidPermission`.
    pub fn parse(raw: &RawRights) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::EmptyRights);
        }

        let mut rights = BTreeMap::new();
        for (section, permissions) in raw {
            let section = section.parse::<Section>()?;
            let permissions = permissions
                .iter()
                .map(|permission| permission.parse::<Permission>())
                .collect::<Result<BTreeSet<_>>>()?;
            rights.insert(section, permissions);
        }

        Ok(Self(rights))
    }

    /// Like [`Rights::parse`], but drops sections with no permissions and
    /// rejects the result if nothing is left.
    ///
    /// # Errors
    /// Same as [`Rights::parse`].
    pub fn parse_compact(raw: &RawRights) -> Result<Self> {
        let mut rights = Self::parse(raw)?;
        rights.0.retain(|_, permissions| !permissions.is_empty());
        if rights.is_empty() {
            return Err(Error::EmptyRights);
        }
        Ok(rights)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, section: Section) -> Option<&BTreeSet<Permission>> {
        self.0.get(&section)
    }

    #[must_use]
    pub fn contains(&self, section: Section, permission: Permission) -> bool {
        self.0
            .get(&section)
            .is_some_and(|permissions| permissions.contains(&permission))
    }

    pub fn insert(&mut self, section: Section, permissions: impl IntoIterator<Item = Permission>) {
        self.0.entry(section).or_default().extend(permissions);
    }

    pub fn remove(&mut self, section: Section) -> Option<BTreeSet<Permission>> {
        self.0.remove(&section)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &BTreeSet<Permission>)> {
        self.0.iter().map(|(section, permissions)| (*section, permissions))
    }

    pub(crate) fn get_mut(&mut self, section: Section) -> Option<&mut BTreeSet<Permission>> {
        self.0.get_mut(&section)
    }

    #[must_use]
    pub fn to_raw(&self) -> RawRights {
        self.0
            .iter()
            .map(|(section, permissions)| {
                (
                    section.as_str().to_string(),
                    permissions
                        .iter()
                        .map(|permission| permission.as_str().to_string())
                        .collect(),
                )
            })
            .collect()
    }
}

impl<const N: usize> From<[(Section, Vec<Permission>); N]> for Rights {
    fn from(entries: [(Section, Vec<Permission>); N]) -> Self {
        let mut rights = Self::new();
        for (section, permissions) in entries {
            rights.insert(section, permissions);
        }
        rights
    }
}
