//! Reconciliation passes against a fake guild.

mod common;

use common::{fetch_link, insert_link, setup_db};
use serenity::async_trait;
use serenity::model::id::{GuildId, RoleId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use vexa_link::rank_sync::{run_pass, EntryOutcome, PassError, RoleGateway};

const P1: &str = "11111111-1111-1111-1111-111111111111";
const P2: &str = "22222222-2222-2222-2222-222222222222";
const D1: i64 = 100_000_000_001;
const D2: i64 = 100_000_000_002;

const GUILD: GuildId = GuildId::new(42);
const GOLD_ROLE: RoleId = RoleId::new(9001);
const PLATINUM_ROLE: RoleId = RoleId::new(9002);

fn rank_roles() -> HashMap<String, RoleId> {
    HashMap::from([
        ("Gold".to_owned(), GOLD_ROLE),
        ("Platinum".to_owned(), PLATINUM_ROLE),
    ])
}

/// In-memory guild. Role mutations are recorded and applied to the fake
/// member list, so a second pass observes the result of the first.
#[derive(Default)]
struct FakeGuild {
    guild_down: bool,
    members: Mutex<HashMap<UserId, Vec<RoleId>>>,
    unreachable: HashSet<UserId>,
    fail_role_updates: bool,
    added: Mutex<Vec<(UserId, RoleId)>>,
    removed: Mutex<Vec<(UserId, RoleId)>>,
}

impl FakeGuild {
    fn with_member(self, user: i64, roles: &[RoleId]) -> Self {
        self.members
            .lock()
            .unwrap()
            .insert(UserId::new(user as u64), roles.to_vec());
        self
    }

    fn mutation_log(&self) -> (Vec<(UserId, RoleId)>, Vec<(UserId, RoleId)>) {
        (
            self.added.lock().unwrap().clone(),
            self.removed.lock().unwrap().clone(),
        )
    }
}

#[async_trait]
impl RoleGateway for FakeGuild {
    async fn guild_available(&self, _guild: GuildId) -> Result<(), serenity::Error> {
        if self.guild_down {
            return Err(serenity::Error::Other("guild unavailable"));
        }
        Ok(())
    }

    async fn member_roles(
        &self,
        _guild: GuildId,
        user: UserId,
    ) -> Result<Vec<RoleId>, serenity::Error> {
        if self.unreachable.contains(&user) {
            return Err(serenity::Error::Other("member fetch failed"));
        }
        self.members
            .lock()
            .unwrap()
            .get(&user)
            .cloned()
            .ok_or(serenity::Error::Other("unknown member"))
    }

    async fn add_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), serenity::Error> {
        if self.fail_role_updates {
            return Err(serenity::Error::Other("role update failed"));
        }
        self.members.lock().unwrap().entry(user).or_default().push(role);
        self.added.lock().unwrap().push((user, role));
        Ok(())
    }

    async fn remove_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), serenity::Error> {
        if self.fail_role_updates {
            return Err(serenity::Error::Other("role update failed"));
        }
        self.members
            .lock()
            .unwrap()
            .entry(user)
            .or_default()
            .retain(|r| *r != role);
        self.removed.lock().unwrap().push((user, role));
        Ok(())
    }
}

#[tokio::test]
async fn swaps_roles_and_marks_synced_on_rank_change() {
    let db = setup_db().await;
    insert_link(&db, P1, D1, Some("Platinum"), Some("Gold")).await;
    let guild = FakeGuild::default().with_member(D1, &[GOLD_ROLE]);

    let report = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();

    assert_eq!(report.entries.len(), 1);
    match report.entries[0].outcome {
        EntryOutcome::Synced { removed, added } => {
            assert_eq!(removed, Some(GOLD_ROLE));
            assert_eq!(added, Some(PLATINUM_ROLE));
        }
        ref other => panic!("unexpected outcome: {other:?}"),
    }

    let (added, removed) = guild.mutation_log();
    assert_eq!(added, vec![(UserId::new(D1 as u64), PLATINUM_ROLE)]);
    assert_eq!(removed, vec![(UserId::new(D1 as u64), GOLD_ROLE)]);
    assert_eq!(fetch_link(&db, P1).await.last_synced_rank.as_deref(), Some("Platinum"));
}

#[tokio::test]
async fn second_pass_performs_no_mutations() {
    let db = setup_db().await;
    insert_link(&db, P1, D1, Some("Platinum"), Some("Gold")).await;
    let guild = FakeGuild::default().with_member(D1, &[GOLD_ROLE]);

    let first = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();
    assert_eq!(first.mutation_count(), 2);

    let second = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();
    assert!(second.entries.is_empty());
    assert_eq!(second.mutation_count(), 0);
}

#[tokio::test]
async fn member_fetch_failure_leaves_the_entry_desynced() {
    let db = setup_db().await;
    insert_link(&db, P1, D1, Some("Platinum"), Some("Gold")).await;
    let mut guild = FakeGuild::default().with_member(D1, &[GOLD_ROLE]);
    guild.unreachable.insert(UserId::new(D1 as u64));

    let report = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();

    assert_eq!(report.entries.len(), 1);
    assert!(matches!(
        report.entries[0].outcome,
        EntryOutcome::MemberUnavailable { .. }
    ));
    let (added, removed) = guild.mutation_log();
    assert!(added.is_empty() && removed.is_empty());
    assert_eq!(fetch_link(&db, P1).await.last_synced_rank.as_deref(), Some("Gold"));

    // Once the member is reachable again the next pass converges.
    guild.unreachable.clear();
    let report = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();
    assert_eq!(report.entries.len(), 1);
    assert_eq!(fetch_link(&db, P1).await.last_synced_rank.as_deref(), Some("Platinum"));
}

#[tokio::test]
async fn unmapped_rank_still_counts_as_synced() {
    let db = setup_db().await;
    // Emerald has no configured role; the Gold role goes away, nothing is added.
    insert_link(&db, P1, D1, Some("Emerald"), Some("Gold")).await;
    let guild = FakeGuild::default().with_member(D1, &[GOLD_ROLE]);

    let report = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();

    match report.entries[0].outcome {
        EntryOutcome::Synced { removed, added } => {
            assert_eq!(removed, Some(GOLD_ROLE));
            assert_eq!(added, None);
        }
        ref other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(fetch_link(&db, P1).await.last_synced_rank.as_deref(), Some("Emerald"));
}

#[tokio::test]
async fn first_sync_only_adds_a_role() {
    let db = setup_db().await;
    insert_link(&db, P1, D1, Some("Gold"), None).await;
    let guild = FakeGuild::default().with_member(D1, &[]);

    let report = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();

    match report.entries[0].outcome {
        EntryOutcome::Synced { removed, added } => {
            assert_eq!(removed, None);
            assert_eq!(added, Some(GOLD_ROLE));
        }
        ref other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn stale_role_not_held_is_not_removed() {
    let db = setup_db().await;
    insert_link(&db, P1, D1, Some("Platinum"), Some("Gold")).await;
    // Someone already stripped the Gold role manually.
    let guild = FakeGuild::default().with_member(D1, &[]);

    let report = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();

    match report.entries[0].outcome {
        EntryOutcome::Synced { removed, added } => {
            assert_eq!(removed, None);
            assert_eq!(added, Some(PLATINUM_ROLE));
        }
        ref other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn unavailable_guild_aborts_the_whole_pass() {
    let db = setup_db().await;
    insert_link(&db, P1, D1, Some("Gold"), None).await;
    let guild = FakeGuild {
        guild_down: true,
        ..FakeGuild::default()
    };

    let err = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap_err();
    assert!(matches!(err, PassError::GuildUnavailable { .. }));
    assert_eq!(fetch_link(&db, P1).await.last_synced_rank, None);
}

#[tokio::test]
async fn role_update_failure_still_marks_the_rank_synced() {
    let db = setup_db().await;
    insert_link(&db, P1, D1, Some("Gold"), None).await;
    let mut guild = FakeGuild::default().with_member(D1, &[]);
    guild.fail_role_updates = true;

    let report = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();

    assert!(matches!(
        report.entries[0].outcome,
        EntryOutcome::RoleUpdateFailed { .. }
    ));
    assert_eq!(fetch_link(&db, P1).await.last_synced_rank.as_deref(), Some("Gold"));
}

#[tokio::test]
async fn one_bad_member_does_not_abort_its_siblings() {
    let db = setup_db().await;
    insert_link(&db, P1, D1, Some("Gold"), None).await;
    insert_link(&db, P2, D2, Some("Platinum"), None).await;
    let mut guild = FakeGuild::default()
        .with_member(D1, &[])
        .with_member(D2, &[]);
    guild.unreachable.insert(UserId::new(D1 as u64));

    let report = run_pass(&db, &guild, GUILD, &rank_roles()).await.unwrap();

    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(fetch_link(&db, P1).await.last_synced_rank, None);
    assert_eq!(fetch_link(&db, P2).await.last_synced_rank.as_deref(), Some("Platinum"));
}
