//! Role-based access control.
//!
//! Rights are a map from a fixed set of sections (`ORDERS`, `PRODUCTS`, ...)
//! to a set of permissions (`READ`, `CREATE`, `UPDATE`, `DELETE`). Users hold
//! their own map; roles hold a template that can be merged into or copied over
//! a user's map.

pub mod engine;
pub mod model;
pub mod roles;
pub mod service;

pub use model::{Permission, RawRights, Rights, Section};
pub use roles::{Role, RoleInput, RoleName};
pub use service::RightsService;
