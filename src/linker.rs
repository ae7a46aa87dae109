//! Code redemption.
//!
//! Turns a one-time link code into a permanent account link. All business
//! rejections come back as [`RedeemOutcome`] variants with a fixed user-facing
//! message; only infrastructure failures surface as `DbErr`.

use sea_orm::{DatabaseConnection, DbErr, SqlErr};

use crate::database::repository::links_repository::LinksRepository;

/// Result of one redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The normalized input was not a 6-character token.
    InvalidFormat,
    /// No matching non-expired code. Deliberately covers "never existed",
    /// "already consumed" and "expired" alike, so the reply does not reveal
    /// which one applies.
    CodeNotFound,
    /// The calling Discord account already owns a link.
    DiscordAlreadyLinked,
    /// The game account behind the code already owns a link.
    PlayerAlreadyLinked,
    /// Link created; all of the player's outstanding codes were consumed.
    Linked {
        player_uuid: String,
        discord_id: i64,
    },
}

impl RedeemOutcome {
    /// Fixed reply text for each outcome.
    pub fn user_message(&self) -> &'static str {
        match self {
            RedeemOutcome::InvalidFormat => {
                "Invalid code format. Use the 6-character code from `/link` in-game (e.g. X7K-9M2)."
            }
            RedeemOutcome::CodeNotFound => {
                "Invalid or expired code. Generate a new one with `/link` in-game."
            }
            RedeemOutcome::DiscordAlreadyLinked => {
                "Your Discord account is already linked to a game account."
            }
            RedeemOutcome::PlayerAlreadyLinked => {
                "This game account is already linked to another Discord account."
            }
            RedeemOutcome::Linked { .. } => {
                "Account linked successfully! You'll receive **100 vexa** next time you log in to the server."
            }
        }
    }
}

/// Uppercase and strip whitespace and hyphen separators, so `x7k-9m2` and
/// `X7K 9M2` both resolve to `X7K9M2`.
fn normalize_code(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Redeem `raw_code` for the Discord user `discord_id`.
///
/// On success the new link row and the deletion of every outstanding code for
/// the player commit in one transaction, so no rejection path leaves any side
/// effect. A unique-constraint violation at commit means a concurrent
/// redemption won; it is reported as the matching already-linked outcome
/// rather than a generic failure.
pub async fn redeem(
    db: &DatabaseConnection,
    raw_code: &str,
    discord_id: i64,
) -> Result<RedeemOutcome, DbErr> {
    let code = normalize_code(raw_code);
    if code.chars().count() != 6 {
        return Ok(RedeemOutcome::InvalidFormat);
    }

    let Some(code_row) = LinksRepository::find_valid_code(db, &code).await? else {
        return Ok(RedeemOutcome::CodeNotFound);
    };
    let player_uuid = code_row.player_uuid;

    if LinksRepository::find_link_by_discord_id(db, discord_id)
        .await?
        .is_some()
    {
        return Ok(RedeemOutcome::DiscordAlreadyLinked);
    }

    if LinksRepository::find_link_by_player_uuid(db, &player_uuid)
        .await?
        .is_some()
    {
        return Ok(RedeemOutcome::PlayerAlreadyLinked);
    }

    match LinksRepository::create_link(db, &player_uuid, discord_id).await {
        Ok(()) => Ok(RedeemOutcome::Linked {
            player_uuid,
            discord_id,
        }),
        Err(err) => match err.sql_err() {
            // Lost a concurrent race. Re-probe to see which side got linked
            // first; the constraint fired, so one of them must exist.
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                if LinksRepository::find_link_by_discord_id(db, discord_id)
                    .await?
                    .is_some()
                {
                    Ok(RedeemOutcome::DiscordAlreadyLinked)
                } else {
                    Ok(RedeemOutcome::PlayerAlreadyLinked)
                }
            }
            _ => Err(err),
        },
    }
}
