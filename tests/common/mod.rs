//! Shared fixtures: an in-memory SQLite database carrying the real schema.
#![allow(dead_code)]

use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use vexa_link::entity::{account_links, link_codes};

/// Fresh database with the production migrations applied.
///
/// One pooled connection only: every extra SQLite `:memory:` connection would
/// open its own empty database.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

/// Insert a link code expiring `minutes_from_now` minutes from now (negative
/// for an already-expired code).
pub async fn insert_code(db: &DatabaseConnection, code: &str, player_uuid: &str, minutes_from_now: i64) {
    link_codes::ActiveModel {
        code: Set(code.to_owned()),
        player_uuid: Set(player_uuid.to_owned()),
        expires_at: Set(Utc::now() + Duration::minutes(minutes_from_now)),
    }
    .insert(db)
    .await
    .expect("insert link code");
}

pub async fn insert_link(
    db: &DatabaseConnection,
    player_uuid: &str,
    discord_id: i64,
    current_rank: Option<&str>,
    last_synced_rank: Option<&str>,
) {
    account_links::ActiveModel {
        player_uuid: Set(player_uuid.to_owned()),
        discord_id: Set(discord_id),
        gems_rewarded: Set(false),
        current_rank: Set(current_rank.map(str::to_owned)),
        last_synced_rank: Set(last_synced_rank.map(str::to_owned)),
    }
    .insert(db)
    .await
    .expect("insert account link");
}

pub async fn fetch_link(db: &DatabaseConnection, player_uuid: &str) -> account_links::Model {
    use sea_orm::EntityTrait;
    vexa_link::entity::prelude::AccountLinks::find_by_id(player_uuid)
        .one(db)
        .await
        .expect("query link")
        .expect("link exists")
}
