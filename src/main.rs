//! vexa-link entrypoint.

use log::{error, info};
use migration::{Migrator, MigratorTrait};
use serenity::all::{Client, GatewayIntents};

use vexa_link::bot::Handler;
use vexa_link::config::Config;
use vexa_link::database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return Err(err.into());
        }
    };

    let db = database::establish_connection(&config.db).await?;
    Migrator::up(&db, None).await?;

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;
    let mut client = Client::builder(&config.token, intents)
        .event_handler(Handler::new(db.clone(), config))
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await?;

    // Gateway is down; drain the pool before exiting.
    database::close_connection(db).await?;
    info!("Shutdown complete");
    Ok(())
}
