//! Environment-driven configuration.
//!
//! Only `DISCORD_TOKEN` is required. Everything else falls back to a default
//! (database parameters) or is simply absent (guild id, rank role mappings),
//! in which case the features depending on it stay disabled.

use serenity::model::id::{GuildId, RoleId};
use std::collections::HashMap;
use std::env;
use thiserror::Error;
use url::Url;

/// Fixed period of the rank reconciliation pass.
pub const SYNC_INTERVAL_SECS: u64 = 30;

/// Every rank the game server can hand out. A `RANK_ROLE_<NAME>` variable maps
/// the rank to a Discord role id; ranks without a variable map to no role.
pub const RANK_NAMES: [&str; 12] = [
    "Unranked",
    "Iron",
    "Bronze",
    "Silver",
    "Gold",
    "Platinum",
    "Emerald",
    "Diamond",
    "Master",
    "Grandmaster",
    "Challenger",
    "VexaGod",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DISCORD_TOKEN is required")]
    MissingToken,

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// MySQL connection parameters, shared with the game server.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `DB_HOST`, default `localhost`.
    pub host: String,
    /// `DB_PORT`, default `3306`.
    pub port: u16,
    /// `DB_USER`, default `root`.
    pub user: String,
    /// `DB_PASSWORD`, default empty.
    pub password: String,
    /// `DB_NAME`, default `hyvexa`.
    pub database: String,
}

impl DbConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port_raw = env_or("DB_PORT", "3306");
        let port = port_raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: "DB_PORT".into(),
            value: port_raw.clone(),
        })?;

        Ok(Self {
            host: env_or("DB_HOST", "localhost"),
            port,
            user: env_or("DB_USER", "root"),
            password: env_or("DB_PASSWORD", ""),
            database: env_or("DB_NAME", "hyvexa"),
        })
    }

    /// Build the connection URL through the `url` crate so credentials with
    /// reserved characters are percent-encoded instead of corrupting the URL.
    pub fn connection_url(&self) -> Result<String, String> {
        let mut url = Url::parse("mysql://localhost").map_err(|e| e.to_string())?;
        url.set_host(Some(&self.host))
            .map_err(|e| format!("invalid DB_HOST: {e}"))?;
        url.set_port(Some(self.port))
            .map_err(|()| "invalid DB_PORT".to_string())?;
        url.set_username(&self.user)
            .map_err(|()| "invalid DB_USER".to_string())?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|()| "invalid DB_PASSWORD".to_string())?;
        }
        url.set_path(&self.database);
        Ok(url.into())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token. The process refuses to start without it.
    pub token: String,
    /// Target guild. Enables guild-scoped command registration and role sync.
    pub guild_id: Option<GuildId>,
    /// Rank name to Discord role id, from the `RANK_ROLE_*` variables.
    pub rank_roles: HashMap<String, RoleId>,
    pub db: DbConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = env::var("DISCORD_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let guild_id = match env::var("GUILD_ID") {
            Ok(raw) => Some(GuildId::new(parse_id("GUILD_ID", &raw)?)),
            Err(_) => None,
        };

        let mut rank_roles = HashMap::new();
        for name in RANK_NAMES {
            let key = format!("RANK_ROLE_{}", name.to_uppercase());
            if let Ok(raw) = env::var(&key) {
                rank_roles.insert(name.to_owned(), RoleId::new(parse_id(&key, &raw)?));
            }
        }

        Ok(Self {
            token,
            guild_id,
            rank_roles,
            db: DbConfig::from_env()?,
        })
    }

    /// Guild to reconcile against, when role sync is fully configured.
    pub fn role_sync_guild(&self) -> Option<GuildId> {
        if self.rank_roles.is_empty() {
            return None;
        }
        self.guild_id
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Discord snowflakes are nonzero u64s; anything else is a config mistake.
fn parse_id(key: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(ConfigError::Invalid {
            key: key.to_owned(),
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_url_encodes_credentials() {
        let cfg = DbConfig {
            host: "db.internal".into(),
            port: 3307,
            user: "bot".into(),
            password: "p@ss:word/#".into(),
            database: "hyvexa".into(),
        };
        let url = cfg.connection_url().unwrap();
        assert!(url.starts_with("mysql://bot:"));
        assert!(url.ends_with("@db.internal:3307/hyvexa"));
        assert!(!url.contains("p@ss"));
    }

    #[test]
    fn connection_url_omits_empty_password() {
        let cfg = DbConfig {
            host: "localhost".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            database: "hyvexa".into(),
        };
        assert_eq!(
            cfg.connection_url().unwrap(),
            "mysql://root@localhost:3306/hyvexa"
        );
    }

    #[test]
    fn snowflakes_must_be_nonzero_numbers() {
        assert!(parse_id("GUILD_ID", "123456789").is_ok());
        assert!(parse_id("GUILD_ID", "0").is_err());
        assert!(parse_id("GUILD_ID", "abc").is_err());
        assert!(parse_id("GUILD_ID", "-5").is_err());
    }
}
