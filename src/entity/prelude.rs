//! Shortcut imports for the entity types.

pub use super::account_links::Entity as AccountLinks;
pub use super::link_codes::Entity as LinkCodes;
