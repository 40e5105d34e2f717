//! Integration tests for the channel permission backfill.

use chanperm_core::migration::builtin::ADD_CAN_CREATE_TOPICS_GROUP;
use chanperm_core::migration::{
    BackfillConfig, BackfillRunner, BackfillTarget, BatchRange, MigrationConfig, MigrationError,
    MigrationExecutor, MigrationTarget,
};
use chanperm_core::model::{EVERYONE_GROUP_NAME, STREAM_TABLE};
use chanperm_core::storage::UnsetBounds;
use chanperm_core::{Error, GroupId, RealmId, Realms, Store, StreamId, Streams};
use std::cell::Cell;
use std::sync::Arc;

struct TestContext {
    store: Arc<Store>,
}

impl TestContext {
    /// A database migrated up to the nullable column, before the backfill.
    fn new() -> Self {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let executor = MigrationExecutor::new(
            Arc::clone(&store),
            chanperm_core::migration::builtin::registry().unwrap(),
            MigrationConfig::default(),
        )
        .unwrap();
        executor
            .migrate(&MigrationTarget::Named(ADD_CAN_CREATE_TOPICS_GROUP.to_string()))
            .unwrap();
        Self { store }
    }

    /// A realm with its system groups; returns the realm and its everyone group.
    fn realm(&self, string_id: &str) -> (RealmId, GroupId) {
        self.store
            .with_connection(|conn| {
                let realms = Realms::new(conn);
                let realm = realms.create_realm(string_id)?;
                realms.create_system_groups(realm)?;
                let everyone = realms.find_group(realm, EVERYONE_GROUP_NAME, true)?;
                Ok::<_, Error>((realm, everyone.expect("everyone group seeded")))
            })
            .unwrap()
    }

    /// A realm with no groups at all.
    fn bare_realm(&self, string_id: &str) -> RealmId {
        self.store
            .with_connection(|conn| Realms::new(conn).create_realm(string_id))
            .unwrap()
    }

    fn stream(&self, realm: RealmId, name: &str) -> StreamId {
        self.store
            .with_connection(|conn| Streams::new(conn).create(realm, name, None))
            .unwrap()
    }

    fn stream_with_id(&self, id: i64, realm: RealmId) {
        self.store
            .with_connection(|conn| {
                Streams::new(conn).create_with_id(StreamId(id), realm, &format!("stream-{id}"))
            })
            .unwrap();
    }

    fn group_of(&self, stream: StreamId) -> Option<GroupId> {
        self.store
            .with_connection(|conn| Streams::new(conn).can_create_topics_group(stream))
            .unwrap()
    }

    fn count_unset(&self) -> u64 {
        self.store
            .with_connection(|conn| Streams::new(conn).count_unset())
            .unwrap()
    }

    fn run(&self) -> chanperm_core::BackfillReport {
        self.store
            .with_connection(|conn| {
                BackfillRunner::new(BackfillConfig::default()).run(&Streams::new(conn))
            })
            .unwrap()
    }
}

#[test]
fn test_noop_without_unset_rows() {
    let ctx = TestContext::new();
    let (realm, everyone) = ctx.realm("zephyr");
    ctx.store
        .with_connection(|conn| Streams::new(conn).create(realm, "general", Some(everyone)))
        .unwrap();

    let report = ctx.run();
    assert!(report.is_noop());
    assert_eq!(report.rows_updated, 0);
}

#[test]
fn test_noop_on_empty_table() {
    let ctx = TestContext::new();
    let report = ctx.run();
    assert!(report.batches.is_empty());
}

#[test]
fn test_assigns_realm_everyone_group() {
    let ctx = TestContext::new();
    let (realm, everyone) = ctx.realm("zephyr");
    let general = ctx.stream(realm, "general");
    let random = ctx.stream(realm, "random");

    let report = ctx.run();

    assert_eq!(report.rows_updated, 2);
    assert_eq!(ctx.group_of(general), Some(everyone));
    assert_eq!(ctx.group_of(random), Some(everyone));
}

#[test]
fn test_resolve_default_group() {
    let ctx = TestContext::new();
    let (realm, everyone) = ctx.realm("zephyr");
    let bare = ctx.bare_realm("empty");

    ctx.store
        .with_connection(|conn| {
            let streams = Streams::new(conn);
            assert_eq!(streams.resolve_default_group(realm)?, Some(everyone));
            assert_eq!(streams.resolve_default_group(bare)?, None);
            Ok::<_, Error>(())
        })
        .unwrap();
}

#[test]
fn test_second_everyone_group_in_realm_rejected() {
    let ctx = TestContext::new();
    let (realm, everyone) = ctx.realm("zephyr");

    let duplicate = ctx.store.with_connection(|conn| {
        Realms::new(conn).create_group(realm, EVERYONE_GROUP_NAME, true)
    });
    assert!(duplicate.is_err());

    let (groups, default) = ctx
        .store
        .with_connection(|conn| {
            let groups: i64 =
                conn.query_row("SELECT COUNT(*) FROM usergroup WHERE realm_id = ?1", [realm], |row| {
                    row.get(0)
                })?;
            Ok::<_, Error>((groups, Streams::new(conn).resolve_default_group(realm)?))
        })
        .unwrap();
    assert_eq!(groups, 7);
    assert_eq!(default, Some(everyone));
}

#[test]
fn test_non_system_everyone_group_is_ignored() {
    let ctx = TestContext::new();
    let realm = ctx.bare_realm("imposter");
    ctx.store
        .with_connection(|conn| {
            Realms::new(conn).create_group(realm, EVERYONE_GROUP_NAME, false)
        })
        .unwrap();
    let stream = ctx.stream(realm, "general");

    ctx.run();
    assert_eq!(ctx.group_of(stream), None);
}

#[test]
fn test_partition_isolation() {
    let ctx = TestContext::new();
    let (realm_a, everyone_a) = ctx.realm("alpha");
    let (realm_b, everyone_b) = ctx.realm("beta");
    let streams_a: Vec<_> = (0..5).map(|i| ctx.stream(realm_a, &format!("a{i}"))).collect();
    let streams_b: Vec<_> = (0..5).map(|i| ctx.stream(realm_b, &format!("b{i}"))).collect();

    ctx.run();

    for stream in streams_a {
        assert_eq!(ctx.group_of(stream), Some(everyone_a));
    }
    for stream in streams_b {
        assert_eq!(ctx.group_of(stream), Some(everyone_b));
    }
}

#[test]
fn test_batch_boundaries() {
    let ctx = TestContext::new();
    let (realm, everyone) = ctx.realm("zephyr");
    for id in [1, 1500, 2999] {
        ctx.stream_with_id(id, realm);
    }

    let report = ctx.run();

    assert_eq!(
        report.batches,
        vec![
            BatchRange { lower_bound: 1, upper_bound: 1000 },
            BatchRange { lower_bound: 1001, upper_bound: 2000 },
            BatchRange { lower_bound: 2001, upper_bound: 3000 },
        ]
    );
    assert_eq!(report.rows_updated, 3);
    for id in [1, 1500, 2999] {
        assert_eq!(ctx.group_of(StreamId(id)), Some(everyone));
    }
}

#[test]
fn test_unresolvable_row_left_unset() {
    let ctx = TestContext::new();
    let (realm, everyone) = ctx.realm("zephyr");
    let bare = ctx.bare_realm("empty");
    let resolvable = ctx.stream(realm, "general");
    let orphan = ctx.stream(bare, "lonely");

    let report = ctx.run();

    assert_eq!(report.rows_updated, 1);
    assert_eq!(report.remaining_unset, 1);
    assert_eq!(ctx.group_of(resolvable), Some(everyone));
    assert_eq!(ctx.group_of(orphan), None);
}

#[test]
fn test_idempotent() {
    let ctx = TestContext::new();
    let (realm, _) = ctx.realm("zephyr");
    let bare = ctx.bare_realm("empty");
    let streams: Vec<_> = (0..3)
        .map(|i| ctx.stream(realm, &format!("s{i}")))
        .chain([ctx.stream(bare, "orphan")])
        .collect();

    ctx.run();
    let first: Vec<_> = streams.iter().map(|s| ctx.group_of(*s)).collect();

    let second_report = ctx.run();
    let second: Vec<_> = streams.iter().map(|s| ctx.group_of(*s)).collect();

    assert_eq!(first, second);
    assert_eq!(second_report.rows_updated, 0);
}

/// Delegates to [`Streams`] but fails the n-th batch.
struct FlakyStreams<'c> {
    inner: Streams<'c>,
    fail_on: usize,
    calls: Cell<usize>,
}

impl BackfillTarget for FlakyStreams<'_> {
    fn table(&self) -> &str {
        STREAM_TABLE
    }

    fn column(&self) -> &str {
        BackfillTarget::column(&self.inner)
    }

    fn unset_bounds(&self) -> Result<Option<UnsetBounds>, Error> {
        self.inner.unset_bounds()
    }

    fn fill_batch(&self, batch: BatchRange) -> Result<usize, Error> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if call == self.fail_on {
            return Err(Error::InvalidData("simulated storage fault".to_string()));
        }
        self.inner.fill_batch(batch)
    }

    fn count_unset(&self) -> Result<u64, Error> {
        self.inner.count_unset()
    }
}

#[test]
fn test_failed_batch_keeps_committed_batches() {
    let ctx = TestContext::new();
    let (realm, everyone) = ctx.realm("zephyr");
    for id in [1, 1500, 2999] {
        ctx.stream_with_id(id, realm);
    }

    let err = ctx
        .store
        .with_connection(|conn| {
            let flaky = FlakyStreams {
                inner: Streams::new(conn),
                fail_on: 2,
                calls: Cell::new(0),
            };
            BackfillRunner::new(BackfillConfig::default()).run(&flaky)
        })
        .unwrap_err();

    assert!(matches!(
        err,
        MigrationError::BackfillFailed { lower_bound: 1001, upper_bound: 2000, .. }
    ));
    assert_eq!(ctx.group_of(StreamId(1)), Some(everyone));
    assert_eq!(ctx.group_of(StreamId(1500)), None);
    assert_eq!(ctx.count_unset(), 2);

    let report = ctx.run();
    assert_eq!(report.rows_updated, 2);
    assert_eq!(ctx.count_unset(), 0);
}

#[test]
fn test_small_batches() {
    let ctx = TestContext::new();
    let (realm, _) = ctx.realm("zephyr");
    for i in 0..25 {
        ctx.stream(realm, &format!("s{i}"));
    }

    let report = ctx
        .store
        .with_connection(|conn| {
            BackfillRunner::new(BackfillConfig::default().with_batch_size(10))
                .run(&Streams::new(conn))
        })
        .unwrap();

    assert_eq!(report.batches.len(), 3);
    assert_eq!(report.rows_updated, 25);
    assert_eq!(ctx.count_unset(), 0);
}
