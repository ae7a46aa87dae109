//! Rank role reconciliation.
//!
//! A fixed-interval pass that converges Discord roles with in-game ranks. The
//! pass re-derives the desync set from the store every tick, so a crash or a
//! skipped entry simply heals on the next pass. Entries are synced
//! independently; one bad member never aborts its siblings.

use log::{debug, error, info, warn};
use sea_orm::{DatabaseConnection, DbErr};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::id::{GuildId, RoleId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::SYNC_INTERVAL_SECS;
use crate::database::repository::links_repository::LinksRepository;
use crate::entity::account_links;

/// The slice of the Discord API the syncer touches, behind a trait so passes
/// can run against a fake guild in tests.
#[async_trait]
pub trait RoleGateway: Send + Sync {
    /// Cheap reachability probe; a failure aborts the whole pass.
    async fn guild_available(&self, guild: GuildId) -> Result<(), serenity::Error>;

    /// Roles the member currently holds.
    async fn member_roles(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<RoleId>, serenity::Error>;

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), serenity::Error>;

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), serenity::Error>;
}

#[async_trait]
impl RoleGateway for Http {
    async fn guild_available(&self, guild: GuildId) -> Result<(), serenity::Error> {
        self.get_guild(guild).await.map(|_| ())
    }

    async fn member_roles(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<RoleId>, serenity::Error> {
        let member = self.get_member(guild, user).await?;
        Ok(member.roles)
    }

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), serenity::Error> {
        self.add_member_role(guild, user, role, None).await
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), serenity::Error> {
        self.remove_member_role(guild, user, role, None).await
    }
}

/// Failure that aborts an entire pass before any entry is touched.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("guild {guild} unavailable: {source}")]
    GuildUnavailable {
        guild: GuildId,
        source: serenity::Error,
    },

    #[error("desync query failed: {0}")]
    Store(#[from] DbErr),
}

/// What happened to a single desynced entry.
#[derive(Debug)]
pub enum EntryOutcome {
    /// Roles converged and the rank was recorded as synced. `removed`/`added`
    /// are `None` when the corresponding rank maps to no configured role or
    /// the member did not hold the old role.
    Synced {
        removed: Option<RoleId>,
        added: Option<RoleId>,
    },
    /// The member could not be fetched. Nothing was mutated and the entry
    /// stays in the desync set for the next pass.
    MemberUnavailable { error: serenity::Error },
    /// A role mutation failed, but the rank was still recorded as synced.
    RoleUpdateFailed { error: serenity::Error },
    /// The roles were updated but recording the synced rank failed; the entry
    /// reappears next pass and the role mutations are idempotent.
    MarkFailed { error: DbErr },
}

#[derive(Debug)]
pub struct SyncEntry {
    pub player_uuid: String,
    pub discord_id: i64,
    pub outcome: EntryOutcome,
}

/// Per-entry outcomes of one reconciliation pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub entries: Vec<SyncEntry>,
}

impl SyncReport {
    /// Number of role mutations actually issued against Discord.
    pub fn mutation_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e.outcome {
                EntryOutcome::Synced { removed, added } => {
                    usize::from(removed.is_some()) + usize::from(added.is_some())
                }
                _ => 0,
            })
            .sum()
    }

    pub fn failure_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e.outcome, EntryOutcome::Synced { .. }))
            .count()
    }
}

/// Run one reconciliation pass over the full desync set.
pub async fn run_pass<G>(
    db: &DatabaseConnection,
    gateway: &G,
    guild: GuildId,
    roles: &HashMap<String, RoleId>,
) -> Result<SyncReport, PassError>
where
    G: RoleGateway + ?Sized,
{
    gateway
        .guild_available(guild)
        .await
        .map_err(|source| PassError::GuildUnavailable { guild, source })?;

    let desynced = LinksRepository::get_desynced_links(db).await?;

    let mut report = SyncReport::default();
    for link in desynced {
        // The desync query guarantees a current rank.
        let Some(current_rank) = link.current_rank.clone() else {
            continue;
        };

        let outcome = sync_entry(db, gateway, guild, roles, &link, &current_rank).await;
        match &outcome {
            EntryOutcome::Synced { removed, added } => {
                debug!(
                    "rank sync: {} -> {} (removed {:?}, added {:?})",
                    link.player_uuid, current_rank, removed, added
                );
            }
            EntryOutcome::MemberUnavailable { error } => {
                warn!(
                    "rank sync: failed to fetch member {} ({}): {}",
                    link.discord_id, link.player_uuid, error
                );
            }
            EntryOutcome::RoleUpdateFailed { error } => {
                warn!(
                    "rank sync: role update failed for {} ({}): {}",
                    link.discord_id, link.player_uuid, error
                );
            }
            EntryOutcome::MarkFailed { error } => {
                warn!(
                    "rank sync: failed to mark {} synced: {}",
                    link.player_uuid, error
                );
            }
        }

        report.entries.push(SyncEntry {
            player_uuid: link.player_uuid,
            discord_id: link.discord_id,
            outcome,
        });
    }

    Ok(report)
}

async fn sync_entry<G>(
    db: &DatabaseConnection,
    gateway: &G,
    guild: GuildId,
    roles: &HashMap<String, RoleId>,
    link: &account_links::Model,
    current_rank: &str,
) -> EntryOutcome
where
    G: RoleGateway + ?Sized,
{
    // UserId::new panics on zero; treat a corrupt snowflake as unreachable.
    let user = match u64::try_from(link.discord_id) {
        Ok(id) if id != 0 => UserId::new(id),
        _ => {
            return EntryOutcome::MemberUnavailable {
                error: serenity::Error::Other("stored discord id is not a valid snowflake"),
            }
        }
    };

    let member_roles = match gateway.member_roles(guild, user).await {
        Ok(r) => r,
        Err(error) => return EntryOutcome::MemberUnavailable { error },
    };

    let mut removed = None;
    let mut added = None;
    let mut role_error = None;

    // Remove the role of the previously synced rank, if it maps to one and
    // the member still holds it.
    if let Some(&old_role) = link
        .last_synced_rank
        .as_deref()
        .and_then(|rank| roles.get(rank))
    {
        if member_roles.contains(&old_role) {
            match gateway.remove_role(guild, user, old_role).await {
                Ok(()) => removed = Some(old_role),
                Err(error) => role_error = Some(error),
            }
        }
    }

    if let Some(&new_role) = roles.get(current_rank) {
        match gateway.add_role(guild, user, new_role).await {
            Ok(()) => added = Some(new_role),
            Err(error) => role_error = Some(error),
        }
    }

    // The member was reachable, so the rank counts as synced even when a role
    // mutation failed or the rank maps to no role at all.
    if let Err(error) = LinksRepository::mark_synced(db, &link.player_uuid, current_rank).await {
        return EntryOutcome::MarkFailed { error };
    }

    match role_error {
        Some(error) => EntryOutcome::RoleUpdateFailed { error },
        None => EntryOutcome::Synced { removed, added },
    }
}

/// Tick [`run_pass`] forever. Runs on one task, so passes never overlap even
/// when a pass takes longer than the interval.
pub async fn run_sync_loop(
    db: DatabaseConnection,
    http: Arc<Http>,
    guild: GuildId,
    roles: HashMap<String, RoleId>,
) {
    let mut ticker = interval(Duration::from_secs(SYNC_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match run_pass(&db, http.as_ref(), guild, &roles).await {
            Ok(report) if report.entries.is_empty() => {}
            Ok(report) => {
                info!(
                    "rank sync: {} entries processed, {} role mutations, {} failures",
                    report.entries.len(),
                    report.mutation_count(),
                    report.failure_count()
                );
            }
            Err(err) => error!("rank sync: pass aborted: {err}"),
        }
    }
}
