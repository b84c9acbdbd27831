//! Batch pipeline scenarios, driven end to end with scripted fakes in
//! place of the remote APIs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cupsync_common::model::{AuthorField, CampaignRecord};
use cupsync_ingest::pipeline::{CampaignSource, SyncPipeline};
use cupsync_ingest::remote::RemoteError;
use cupsync_ingest::services::author_resolver::PlayerDirectory;
use cupsync_ingest::services::campaign_client::{CampaignResponse, PlaylistEntry};
use cupsync_ingest::services::overrides::{OverrideRow, OverrideTable};

const ID_A: &str = "ab12cd34-5678-90ef-ab12-cd34567890ef";

/// Scripted reply for one campaign id.
#[derive(Clone)]
enum Reply {
    Campaign(CampaignResponse),
    Blocked,
    NotFound,
    Network,
}

struct FakeSource {
    replies: HashMap<String, Reply>,
    calls: Arc<AtomicUsize>,
}

impl FakeSource {
    fn new(replies: Vec<(&str, Reply)>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Self {
            replies: replies
                .into_iter()
                .map(|(id, reply)| (id.to_string(), reply))
                .collect(),
            calls: calls.clone(),
        };
        (source, calls)
    }
}

#[async_trait::async_trait]
impl CampaignSource for FakeSource {
    async fn fetch(&self, campaign_id: &str) -> Result<CampaignResponse, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(campaign_id) {
            Some(Reply::Campaign(campaign)) => Ok(campaign.clone()),
            Some(Reply::Blocked) => Err(RemoteError::Blocked),
            Some(Reply::Network) => Err(RemoteError::Network("connection reset".to_string())),
            Some(Reply::NotFound) | None => Err(RemoteError::NotFound),
        }
    }

    fn source_url(&self, campaign_id: &str) -> String {
        format!("https://example.org/#/campaigns/100/{campaign_id}")
    }
}

struct FakePlayers {
    names: HashMap<String, String>,
    calls: Arc<AtomicUsize>,
}

impl FakePlayers {
    fn new(pairs: &[(&str, &str)]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let players = Self {
            names: pairs
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            calls: calls.clone(),
        };
        (players, calls)
    }

    fn empty() -> Self {
        Self {
            names: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl PlayerDirectory for FakePlayers {
    async fn display_name(&self, account_id: &str) -> Result<String, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.names
            .get(account_id)
            .cloned()
            .ok_or_else(|| RemoteError::Network("connection reset".to_string()))
    }
}

fn campaign(name: &str, maps: Vec<(&str, &str, &str)>) -> Reply {
    Reply::Campaign(CampaignResponse {
        name: name.to_string(),
        publish_time: Some("2024-02-04T18:00:00+00:00".to_string()),
        playlist: maps
            .into_iter()
            .map(|(map_name, author, map_uid)| PlaylistEntry {
                name: map_name.to_string(),
                author: author.to_string(),
                author_score: Some(48_231),
                map_uid: map_uid.to_string(),
            })
            .collect(),
    })
}

fn archived(edition: u32) -> CampaignRecord {
    CampaignRecord {
        edition,
        name: format!("Winter Cup {edition}"),
        publish_date: None,
        winner: "Unknown".to_string(),
        display_date: None,
        source_url: format!("https://example.org/#/campaigns/100/{edition}"),
        maps: vec![],
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn new_edition_is_merged_below_the_existing_one() {
    let (source, _) = FakeSource::new(vec![("903", campaign("Winter Cup 3", vec![]))]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());

    let mut records = vec![archived(5)];
    let report = pipeline
        .run(&mut records, &ids(&["903"]), &OverrideTable::new())
        .await;

    let editions: Vec<u32> = records.iter().map(|r| r.edition).collect();
    assert_eq!(editions, vec![5, 3]);
    assert_eq!(report.inserted, 1);
    assert!(!report.aborted);
}

#[tokio::test]
async fn refetching_the_same_campaign_changes_nothing() {
    let reply = campaign("Winter Cup 3", vec![("Ice Valley", "SpeedDemon", "ice-3")]);
    let overrides = OverrideTable::new();

    let (source, _) = FakeSource::new(vec![("903", reply.clone())]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());
    let mut records = vec![archived(5)];
    pipeline.run(&mut records, &ids(&["903"]), &overrides).await;
    let snapshot = records.clone();

    let (source, _) = FakeSource::new(vec![("903", reply)]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());
    let report = pipeline.run(&mut records, &ids(&["903"]), &overrides).await;

    assert_eq!(records, snapshot);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.inserted, 0);
}

#[tokio::test]
async fn soft_block_aborts_the_batch_and_keeps_prior_work() {
    let (source, calls) = FakeSource::new(vec![
        ("a", campaign("Winter Cup 10", vec![])),
        ("b", Reply::Blocked),
        ("c", campaign("Winter Cup 8", vec![])),
        ("d", campaign("Winter Cup 7", vec![])),
        ("e", campaign("Winter Cup 6", vec![])),
    ]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());

    let mut records = Vec::new();
    let report = pipeline
        .run(
            &mut records,
            &ids(&["a", "b", "c", "d", "e"]),
            &OverrideTable::new(),
        )
        .await;

    assert!(report.aborted);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].edition, 10);
    // Nothing after the block was attempted
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn override_winner_beats_the_fetched_default() {
    let (source, _) = FakeSource::new(vec![("907", campaign("Winter Cup 7", vec![]))]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());

    let mut overrides = OverrideTable::new();
    overrides.insert(
        "7".to_string(),
        OverrideRow {
            winner: Some("Alice".to_string()),
            date: None,
        },
    );

    let mut records = Vec::new();
    pipeline.run(&mut records, &ids(&["907"]), &overrides).await;

    assert_eq!(records[0].winner, "Alice");
}

#[tokio::test]
async fn one_identifier_means_one_resolution_call() {
    let maps = vec![
        ("Map 1", ID_A, "m1"),
        ("Map 2", ID_A, "m2"),
        ("Map 3", ID_A, "m3"),
        ("Map 4", ID_A, "m4"),
        ("Map 5", ID_A, "m5"),
    ];
    let (source, _) = FakeSource::new(vec![("909", campaign("Winter Cup 9", maps))]);
    let (players, player_calls) = FakePlayers::new(&[(ID_A, "SpeedDemon")]);
    let mut pipeline = SyncPipeline::new(source, players);

    let mut records = Vec::new();
    pipeline
        .run(&mut records, &ids(&["909"]), &OverrideTable::new())
        .await;

    assert_eq!(player_calls.load(Ordering::SeqCst), 1);
    assert_eq!(records[0].maps.len(), 5);
    for map in &records[0].maps {
        assert_eq!(map.author, AuthorField::Resolved("SpeedDemon".to_string()));
    }
}

#[tokio::test]
async fn a_refetch_never_reverts_a_resolved_author() {
    let reply = campaign("Winter Cup 9", vec![("Ice Valley", ID_A, "ice-9")]);

    // First run resolves the author
    let (source, _) = FakeSource::new(vec![("909", reply.clone())]);
    let (players, _) = FakePlayers::new(&[(ID_A, "SpeedDemon")]);
    let mut pipeline = SyncPipeline::new(source, players);
    let mut records = Vec::new();
    pipeline
        .run(&mut records, &ids(&["909"]), &OverrideTable::new())
        .await;

    // Second run: the player API is down, the re-fetch hands back the raw id
    let (source, _) = FakeSource::new(vec![("909", reply)]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());
    pipeline
        .run(&mut records, &ids(&["909"]), &OverrideTable::new())
        .await;

    assert_eq!(
        records[0].maps[0].author,
        AuthorField::Resolved("SpeedDemon".to_string())
    );
}

#[tokio::test]
async fn per_key_failures_skip_without_stopping_the_batch() {
    let (source, _) = FakeSource::new(vec![
        ("gone", Reply::NotFound),
        ("flaky", Reply::Network),
        ("nameless", campaign("Special Cup", vec![])),
        ("good", campaign("Winter Cup 4", vec![])),
    ]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());

    let mut records = Vec::new();
    let report = pipeline
        .run(
            &mut records,
            &ids(&["gone", "flaky", "nameless", "good"]),
            &OverrideTable::new(),
        )
        .await;

    assert_eq!(report.skipped, 3);
    assert_eq!(report.inserted, 1);
    assert!(!report.aborted);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].edition, 4);
}

#[tokio::test]
async fn duplicate_candidate_ids_are_fetched_once() {
    let (source, calls) = FakeSource::new(vec![("903", campaign("Winter Cup 3", vec![]))]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());

    let mut records = Vec::new();
    pipeline
        .run(
            &mut records,
            &ids(&["903", "903", " 903 "]),
            &OverrideTable::new(),
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn pin_archives_under_the_forced_edition() {
    let (source, _) = FakeSource::new(vec![(
        "9760",
        campaign("Winter Cup Kickoff", vec![("Ice Valley", "SpeedDemon", "ice-1")]),
    )]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());

    let mut records = vec![archived(5)];
    pipeline
        .pin(&mut records, "9760", 1, &OverrideTable::new())
        .await
        .unwrap();

    let editions: Vec<u32> = records.iter().map(|r| r.edition).collect();
    assert_eq!(editions, vec![5, 1]);
    assert_eq!(records[1].name, "Winter Cup Kickoff");
}

#[tokio::test]
async fn pin_refuses_an_edition_that_is_already_archived() {
    let (source, calls) = FakeSource::new(vec![("9760", campaign("Winter Cup Kickoff", vec![]))]);
    let mut pipeline = SyncPipeline::new(source, FakePlayers::empty());

    let mut records = vec![archived(1)];
    let result = pipeline
        .pin(&mut records, "9760", 1, &OverrideTable::new())
        .await;

    assert!(result.is_err());
    assert_eq!(records.len(), 1);
    // Refused before any remote call
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn resolver_soft_block_is_reported_but_does_not_abort_the_batch() {
    struct BlockedPlayers;

    #[async_trait::async_trait]
    impl PlayerDirectory for BlockedPlayers {
        async fn display_name(&self, _account_id: &str) -> Result<String, RemoteError> {
            Err(RemoteError::Blocked)
        }
    }

    let (source, _) = FakeSource::new(vec![
        ("909", campaign("Winter Cup 9", vec![("Ice Valley", ID_A, "ice-9")])),
        ("908", campaign("Winter Cup 8", vec![])),
    ]);
    let mut pipeline = SyncPipeline::new(source, BlockedPlayers);

    let mut records = Vec::new();
    let report = pipeline
        .run(&mut records, &ids(&["909", "908"]), &OverrideTable::new())
        .await;

    assert!(report.resolution_disabled);
    assert!(!report.aborted);
    // Both campaigns merged; the author stayed unresolved
    assert_eq!(records.len(), 2);
    let cup9 = records.iter().find(|r| r.edition == 9).unwrap();
    assert!(cup9.maps[0].author.is_unresolved());
}
