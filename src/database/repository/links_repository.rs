//! Account link repository.
//!
//! Every operation is a single statement except [`LinksRepository::create_link`],
//! which is the one transaction in the system: the link insert and the
//! consumption of the player's outstanding codes commit or roll back together.

use crate::entity::prelude::*;
use crate::entity::{account_links, link_codes};
use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::*;

pub struct LinksRepository;

impl LinksRepository {
    /// Look up a non-expired link code. Expired or already-consumed codes are
    /// indistinguishable from codes that never existed.
    pub async fn find_valid_code(
        db: &DatabaseConnection,
        code: &str,
    ) -> Result<Option<link_codes::Model>, DbErr> {
        LinkCodes::find()
            .filter(link_codes::Column::Code.eq(code))
            .filter(link_codes::Column::ExpiresAt.gt(Utc::now()))
            .one(db)
            .await
    }

    /// Player UUID a Discord user is linked to, if any.
    pub async fn find_link_by_discord_id(
        db: &DatabaseConnection,
        discord_id: i64,
    ) -> Result<Option<String>, DbErr> {
        let link = AccountLinks::find()
            .filter(account_links::Column::DiscordId.eq(discord_id))
            .one(db)
            .await?;
        Ok(link.map(|l| l.player_uuid))
    }

    /// Discord id a game account is linked to, if any.
    pub async fn find_link_by_player_uuid(
        db: &DatabaseConnection,
        player_uuid: &str,
    ) -> Result<Option<i64>, DbErr> {
        let link = AccountLinks::find_by_id(player_uuid).one(db).await?;
        Ok(link.map(|l| l.discord_id))
    }

    /// Create the permanent link and consume every outstanding code for the
    /// player, atomically.
    ///
    /// Deleting all codes (not just the redeemed one) closes the window where
    /// a stale second code would still redeem after the player is linked. A
    /// unique-constraint violation here means a concurrent redemption won the
    /// race; the caller maps it back to the already-linked outcome.
    pub async fn create_link(
        db: &DatabaseConnection,
        player_uuid: &str,
        discord_id: i64,
    ) -> Result<(), DbErr> {
        let txn = db.begin().await?;

        let link = account_links::ActiveModel {
            player_uuid: Set(player_uuid.to_owned()),
            discord_id: Set(discord_id),
            gems_rewarded: Set(false),
            current_rank: NotSet,
            last_synced_rank: NotSet,
        };
        link.insert(&txn).await?;

        LinkCodes::delete_many()
            .filter(link_codes::Column::PlayerUuid.eq(player_uuid))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    /// All links whose Discord role lags behind the in-game rank: current rank
    /// set, and last synced rank either never written or different.
    pub async fn get_desynced_links(
        db: &DatabaseConnection,
    ) -> Result<Vec<account_links::Model>, DbErr> {
        AccountLinks::find()
            .filter(account_links::Column::CurrentRank.is_not_null())
            .filter(
                Condition::any()
                    .add(account_links::Column::LastSyncedRank.is_null())
                    .add(
                        Expr::col(account_links::Column::LastSyncedRank)
                            .ne(Expr::col(account_links::Column::CurrentRank)),
                    ),
            )
            .all(db)
            .await
    }

    /// Record that the player's Discord role now reflects `rank`.
    pub async fn mark_synced(
        db: &DatabaseConnection,
        player_uuid: &str,
        rank: &str,
    ) -> Result<(), DbErr> {
        AccountLinks::update_many()
            .col_expr(
                account_links::Column::LastSyncedRank,
                Expr::value(rank.to_owned()),
            )
            .filter(account_links::Column::PlayerUuid.eq(player_uuid))
            .exec(db)
            .await?;
        Ok(())
    }
}
