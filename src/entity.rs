//! SeaORM entity definitions for the link store tables.

pub mod prelude;

pub mod account_links;
pub mod link_codes;
