//! Link code entity.
//!
//! One row per outstanding code. Codes are created by the game server when a
//! player runs `/link` in-game; this bot only ever reads and deletes them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discord_link_codes")]
pub struct Model {
    /// 6-character token, already normalized to uppercase.
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    /// UUID of the game account that requested the code.
    pub player_uuid: String,

    /// The code is redeemable only while `now < expires_at`.
    pub expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
