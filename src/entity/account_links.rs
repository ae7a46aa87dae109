//! Account link entity.
//!
//! The permanent association between one game account and one Discord user.
//! Both directions are unique: `player_uuid` is the primary key and
//! `discord_id` carries a unique index, so the bijection is enforced by the
//! database rather than by read-then-write logic.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discord_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub player_uuid: String,

    /// Discord snowflake. Stored signed, converted at the serenity boundary.
    #[sea_orm(unique)]
    pub discord_id: i64,

    /// Set false on creation; the game server flips it when paying out.
    pub gems_rewarded: bool,

    /// Written by the game server whenever the player's rank changes.
    #[sea_orm(column_type = "Text", nullable)]
    pub current_rank: Option<String>,

    /// Written only by the rank syncer, after the Discord roles were updated.
    #[sea_orm(column_type = "Text", nullable)]
    pub last_synced_rank: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
