pub mod bot;
pub mod config;
pub mod database;
pub mod entity;
pub mod linker;
pub mod rank_sync;
