//! Map author resolution with per-run memoization
//!
//! Identical identifiers hit the network at most once per run; every later
//! occurrence is served from the cache. A soft block disables further
//! network resolutions for the rest of the run but keeps everything that
//! was already resolved.

use std::collections::HashMap;

use cupsync_common::model::{AuthorField, CampaignRecord};

use crate::remote::RemoteError;
use crate::services::player_client::PlayerClient;

/// Identifier API seam, implemented by [`PlayerClient`] and by test fakes.
///
/// One call is one terminal outcome; the bounded rate-limit retry happens
/// inside the implementation.
#[async_trait::async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn display_name(&self, account_id: &str) -> Result<String, RemoteError>;
}

#[async_trait::async_trait]
impl PlayerDirectory for PlayerClient {
    async fn display_name(&self, account_id: &str) -> Result<String, RemoteError> {
        self.resolve(account_id).await
    }
}

/// Resolves the `Unresolved` authors of campaign records.
///
/// Owns the run-scoped resolution cache; nothing else reads or writes it.
pub struct AuthorResolver<D> {
    directory: D,
    cache: HashMap<String, String>,
    disabled: bool,
}

impl<D: PlayerDirectory> AuthorResolver<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            cache: HashMap::new(),
            disabled: false,
        }
    }

    /// Whether a soft block has shut down network resolution for this run.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Resolve every unresolved author in the record. Returns how many
    /// authors were newly resolved (cache hits included).
    ///
    /// Failures leave the identifier in place; the record is still merged
    /// and a later run can finish the job.
    pub async fn resolve_record(&mut self, record: &mut CampaignRecord) -> usize {
        let mut resolved = 0;
        for map in &mut record.maps {
            let Some(account_id) = map.author.account_id().map(str::to_owned) else {
                continue;
            };

            if let Some(name) = self.cache.get(&account_id) {
                map.author = AuthorField::Resolved(name.clone());
                resolved += 1;
                continue;
            }
            if self.disabled {
                continue;
            }

            match self.directory.display_name(&account_id).await {
                Ok(name) => {
                    self.cache.insert(account_id, name.clone());
                    map.author = AuthorField::Resolved(name);
                    resolved += 1;
                }
                Err(err) if err.is_fatal() => {
                    tracing::error!(
                        account_id = %account_id,
                        "Soft block from the player API; keeping remaining authors unresolved"
                    );
                    self.disabled = true;
                }
                Err(err) => {
                    tracing::warn!(
                        account_id = %account_id,
                        error = %err,
                        "Resolution failed, keeping the identifier"
                    );
                }
            }
        }
        resolved
    }

    /// Offline pass: resolve outstanding authors across the whole archive.
    /// Returns how many authors were resolved.
    pub async fn resolve_all(&mut self, records: &mut [CampaignRecord]) -> usize {
        let mut resolved = 0;
        for record in records.iter_mut() {
            resolved += self.resolve_record(record).await;
        }
        resolved
    }
}
