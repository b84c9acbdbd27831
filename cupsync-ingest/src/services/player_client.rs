//! Identifier API client
//!
//! Resolves an opaque account identifier to a display name. Paced more
//! conservatively than the campaign endpoint; this one is quicker to
//! throttle bursts.

use std::time::Duration;

use cupsync_common::config::IngestConfig;
use cupsync_common::Result;
use serde::Deserialize;

use crate::remote::{classify_response, with_rate_limit_retry, Pacer, RemoteError};
use crate::services::campaign_client::build_api_client;

/// Player document returned by the identifier API. Only the name fields
/// matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerResponse {
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl PlayerResponse {
    /// The display name, falling back to the plain name field.
    pub fn display_name(&self) -> Option<&str> {
        self.displayname
            .as_deref()
            .or(self.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }
}

/// Client for the keyed player lookup endpoint.
pub struct PlayerClient {
    http_client: reqwest::Client,
    pacer: Pacer,
    api_base_url: String,
    cooldown: Duration,
}

impl PlayerClient {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let http_client = build_api_client(config)?;
        Ok(Self {
            http_client,
            pacer: Pacer::new(Duration::from_millis(config.resolve_pace_ms)),
            api_base_url: config.api_base_url.clone(),
            cooldown: Duration::from_secs(config.cooldown_secs),
        })
    }

    /// Resolve one account id to a display name. Rate-limit failures get
    /// the single cooldown retry.
    pub async fn resolve(&self, account_id: &str) -> std::result::Result<String, RemoteError> {
        with_rate_limit_retry(self.cooldown, || self.resolve_once(account_id)).await
    }

    async fn resolve_once(&self, account_id: &str) -> std::result::Result<String, RemoteError> {
        self.pacer.wait().await;

        let url = format!("{}/player/{}", self.api_base_url, account_id);
        tracing::debug!(account_id = %account_id, "Querying player API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if let Some(err) = classify_response(status, content_type.as_deref()) {
            return Err(err);
        }

        let player: PlayerResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        let name = player
            .display_name()
            .ok_or_else(|| RemoteError::Parse("player document has no display name".to_string()))?;

        tracing::debug!(account_id = %account_id, display_name = %name, "Resolved player");
        Ok(name.to_string())
    }
}
