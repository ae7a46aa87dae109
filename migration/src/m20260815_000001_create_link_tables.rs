//! Baseline schema for account linking.
//!
//! Creates two tables:
//! 1. `discord_link_codes` — short-lived codes handed out by `/link` in-game
//! 2. `discord_links` — the permanent account link, one row per player
//!
//! Both uniqueness invariants live in the schema itself (primary key on
//! `player_uuid`, unique index on `discord_id`) so that concurrent
//! redemptions lose at commit time instead of silently double-linking.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiscordLinkCodes::Table)
                    .col(
                        ColumnDef::new(DiscordLinkCodes::Code)
                            .string_len(6)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DiscordLinkCodes::PlayerUuid)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscordLinkCodes::ExpiresAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // createLink deletes by player_uuid, so give it an index
        manager
            .create_index(
                Index::create()
                    .name("idx_discord_link_codes_player")
                    .table(DiscordLinkCodes::Table)
                    .col(DiscordLinkCodes::PlayerUuid)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DiscordLinks::Table)
                    .col(
                        ColumnDef::new(DiscordLinks::PlayerUuid)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DiscordLinks::DiscordId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscordLinks::GemsRewarded)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(DiscordLinks::CurrentRank).string_len(32).null())
                    .col(
                        ColumnDef::new(DiscordLinks::LastSyncedRank)
                            .string_len(32)
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_discord_links_discord_id")
                    .table(DiscordLinks::Table)
                    .col(DiscordLinks::DiscordId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DiscordLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DiscordLinkCodes::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum DiscordLinkCodes {
    Table,
    Code,
    PlayerUuid,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum DiscordLinks {
    Table,
    PlayerUuid,
    DiscordId,
    GemsRewarded,
    CurrentRank,
    LastSyncedRank,
}
