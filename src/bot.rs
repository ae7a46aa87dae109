//! Discord gateway surface: the `/link` slash command and the sync task.

use log::{error, info};
use sea_orm::DatabaseConnection;
use serenity::all::{
    Command, CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    EventHandler, Interaction, Ready, ResolvedValue,
};
use serenity::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Config, SYNC_INTERVAL_SECS};
use crate::linker;
use crate::rank_sync;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";

pub struct Handler {
    db: DatabaseConnection,
    config: Config,
    /// `ready` fires again after a reconnect; the sync task must not.
    sync_started: AtomicBool,
}

impl Handler {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        Self {
            db,
            config,
            sync_started: AtomicBool::new(false),
        }
    }

    async fn handle_link(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
    ) -> Result<(), serenity::Error> {
        // Immediate private acknowledgement; the outcome arrives as one edit.
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(
                    CreateInteractionResponseMessage::new().ephemeral(true),
                ),
            )
            .await?;

        let mut raw_code = String::new();
        for opt in command.data.options() {
            if opt.name == "code" {
                if let ResolvedValue::String(s) = opt.value {
                    raw_code = s.to_owned();
                }
            }
        }

        let discord_id = command.user.id.get() as i64;
        let reply = match linker::redeem(&self.db, &raw_code, discord_id).await {
            Ok(outcome) => outcome.user_message(),
            Err(err) => {
                error!("/link redemption failed for {}: {err}", command.user.id);
                GENERIC_FAILURE
            }
        };

        command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(reply))
            .await?;
        Ok(())
    }
}

fn link_command() -> CreateCommand {
    CreateCommand::new("link")
        .description("Link your Hytale account to Discord")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "code",
                "The link code from /link in-game (e.g. X7K-9M2)",
            )
            .required(true),
        )
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as {}", ready.user.name);

        let registered = match self.config.guild_id {
            Some(guild) => guild
                .set_commands(&ctx.http, vec![link_command()])
                .await
                .map(|_| format!("Registered /link command for guild {guild}")),
            None => Command::create_global_command(&ctx.http, link_command())
                .await
                .map(|_| "Registered /link command globally".to_owned()),
        };
        match registered {
            Ok(msg) => info!("{msg}"),
            Err(err) => error!("Failed to register commands: {err}"),
        }

        if let Some(guild) = self.config.role_sync_guild() {
            if !self.sync_started.swap(true, Ordering::SeqCst) {
                info!(
                    "Rank role sync enabled ({} roles configured, polling every {SYNC_INTERVAL_SECS}s)",
                    self.config.rank_roles.len()
                );
                tokio::spawn(rank_sync::run_sync_loop(
                    self.db.clone(),
                    ctx.http.clone(),
                    guild,
                    self.config.rank_roles.clone(),
                ));
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        if command.data.name != "link" {
            return;
        }

        if let Err(err) = self.handle_link(&ctx, &command).await {
            error!("Error handling /link: {err}");
        }
    }
}
