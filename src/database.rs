pub mod connection;
pub mod repository;

pub use connection::{close_connection, establish_connection};
