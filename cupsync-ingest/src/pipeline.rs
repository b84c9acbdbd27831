//! Sequential batch pipeline
//!
//! One candidate id at a time: fetch, derive the edition, enrich from the
//! override table, resolve authors, merge. Remote calls are never issued
//! concurrently; the pacing lives inside the clients. A soft block cancels
//! the remaining keys but everything merged so far stays merged.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use cupsync_common::model::{AuthorField, CampaignRecord, MapRecord, UNKNOWN_WINNER};
use cupsync_common::{store, Error, Result};
use tracing::{debug, error, info, warn};

use crate::edition::extract_edition;
use crate::merge::{self, UpsertOutcome};
use crate::remote::RemoteError;
use crate::services::author_resolver::{AuthorResolver, PlayerDirectory};
use crate::services::campaign_client::{CampaignClient, CampaignResponse};
use crate::services::overrides::OverrideTable;

/// Record API seam, implemented by [`CampaignClient`] and by test fakes.
///
/// One call is one terminal outcome; the bounded rate-limit retry happens
/// inside the implementation.
#[async_trait::async_trait]
pub trait CampaignSource: Send + Sync {
    async fn fetch(&self, campaign_id: &str) -> std::result::Result<CampaignResponse, RemoteError>;

    /// Browser URL recorded on the archived record.
    fn source_url(&self, campaign_id: &str) -> String;
}

#[async_trait::async_trait]
impl CampaignSource for CampaignClient {
    async fn fetch(&self, campaign_id: &str) -> std::result::Result<CampaignResponse, RemoteError> {
        CampaignClient::fetch(self, campaign_id).await
    }

    fn source_url(&self, campaign_id: &str) -> String {
        CampaignClient::source_url(self, campaign_id)
    }
}

/// Outcome summary of one batch run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// A soft block cancelled the remaining keys
    pub aborted: bool,
    /// A soft block shut down author resolution partway through
    pub resolution_disabled: bool,
}

impl RunReport {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            fetched: 0,
            inserted: 0,
            replaced: 0,
            unchanged: 0,
            skipped: 0,
            aborted: false,
            resolution_disabled: false,
        }
    }

    pub fn merged(&self) -> usize {
        self.inserted + self.replaced + self.unchanged
    }
}

/// The reconciliation pipeline: one campaign source, one author resolver,
/// both scoped to a single run.
pub struct SyncPipeline<S, D> {
    source: S,
    resolver: AuthorResolver<D>,
}

impl<S: CampaignSource, D: PlayerDirectory> SyncPipeline<S, D> {
    pub fn new(source: S, directory: D) -> Self {
        Self {
            source,
            resolver: AuthorResolver::new(directory),
        }
    }

    /// Run the batch: fetch every candidate id and merge what comes back.
    ///
    /// The store is mutated in place and left sorted; the caller decides
    /// when to persist it. Partial progress survives an abort.
    pub async fn run(
        &mut self,
        records: &mut Vec<CampaignRecord>,
        candidate_ids: &[String],
        overrides: &OverrideTable,
    ) -> RunReport {
        let mut report = RunReport::new();
        let ids = dedupe_ids(candidate_ids);
        info!(total = ids.len(), "Starting campaign sync");

        for (index, campaign_id) in ids.iter().enumerate() {
            debug!(
                index = index + 1,
                total = ids.len(),
                campaign_id = %campaign_id,
                "Fetching campaign"
            );

            let campaign = match self.source.fetch(campaign_id).await {
                Ok(campaign) => campaign,
                Err(err) if err.is_fatal() => {
                    error!(
                        campaign_id = %campaign_id,
                        "Soft block from the campaign API; aborting the batch. \
                         The session needs a credential refresh"
                    );
                    report.aborted = true;
                    break;
                }
                Err(err) => {
                    warn!(campaign_id = %campaign_id, error = %err, "Skipping campaign");
                    report.skipped += 1;
                    continue;
                }
            };
            report.fetched += 1;

            let Some(edition) = extract_edition(&campaign.name) else {
                warn!(
                    campaign_id = %campaign_id,
                    name = %campaign.name,
                    "No edition number in the campaign name, dropping"
                );
                report.skipped += 1;
                continue;
            };

            self.merge_campaign(records, campaign_id, edition, campaign, overrides, &mut report)
                .await;
        }

        store::sort_archive(records);
        report.resolution_disabled = self.resolver.is_disabled();
        report.finished_at = Utc::now();
        report
    }

    /// Fetch one campaign and merge it under an operator-forced edition,
    /// bypassing the name-based extraction. Refuses to touch an edition
    /// that is already archived.
    pub async fn pin(
        &mut self,
        records: &mut Vec<CampaignRecord>,
        campaign_id: &str,
        edition: u32,
        overrides: &OverrideTable,
    ) -> Result<()> {
        if records.iter().any(|r| r.edition == edition) {
            return Err(Error::InvalidInput(format!(
                "edition {edition} is already archived"
            )));
        }

        let campaign = self
            .source
            .fetch(campaign_id)
            .await
            .map_err(|e| Error::Internal(format!("fetch of campaign {campaign_id} failed: {e}")))?;

        info!(
            campaign_id = %campaign_id,
            name = %campaign.name,
            edition = edition,
            "Pinning campaign under a fixed edition"
        );

        let mut report = RunReport::new();
        self.merge_campaign(records, campaign_id, edition, campaign, overrides, &mut report)
            .await;
        store::sort_archive(records);
        Ok(())
    }

    /// Offline pass over the archive; see [`AuthorResolver::resolve_all`].
    pub async fn resolve_archive(&mut self, records: &mut [CampaignRecord]) -> usize {
        self.resolver.resolve_all(records).await
    }

    async fn merge_campaign(
        &mut self,
        records: &mut Vec<CampaignRecord>,
        campaign_id: &str,
        edition: u32,
        campaign: CampaignResponse,
        overrides: &OverrideTable,
        report: &mut RunReport,
    ) {
        let mut record = build_record(edition, self.source.source_url(campaign_id), campaign);
        self.resolver.resolve_record(&mut record).await;

        match merge::upsert(records, record, overrides) {
            UpsertOutcome::Inserted => {
                info!(edition = edition, "Archived new edition");
                report.inserted += 1;
            }
            UpsertOutcome::Replaced => {
                info!(edition = edition, "Refreshed archived edition");
                report.replaced += 1;
            }
            UpsertOutcome::Unchanged => {
                debug!(edition = edition, "Edition unchanged");
                report.unchanged += 1;
            }
        }
    }
}

/// Turn a raw API document into an archive record. Authors are tagged
/// resolved/unresolved here, once, by shape.
fn build_record(edition: u32, source_url: String, campaign: CampaignResponse) -> CampaignRecord {
    CampaignRecord {
        edition,
        name: campaign.name,
        publish_date: campaign.publish_time,
        winner: UNKNOWN_WINNER.to_string(),
        display_date: None,
        source_url,
        maps: campaign
            .playlist
            .into_iter()
            .map(|entry| MapRecord {
                name: entry.name,
                author: AuthorField::from(entry.author),
                author_score: entry.author_score,
                map_id: entry.map_uid,
            })
            .collect(),
    }
}

/// Trim candidate ids, drop blanks, drop duplicates keeping first
/// occurrence (the input is ordered newest-first and stays that way).
fn dedupe_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        let id = id.trim();
        if id.is_empty() || !seen.insert(id.to_string()) {
            continue;
        }
        out.push(id.to_string());
    }
    out
}
