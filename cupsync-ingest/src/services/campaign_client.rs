//! Campaign record API client

use std::time::Duration;

use cupsync_common::config::IngestConfig;
use cupsync_common::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use serde::Deserialize;

use crate::remote::{classify_response, with_rate_limit_retry, Pacer, RemoteError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw campaign document returned by the record API.
///
/// Fields the API sometimes omits default explicitly instead of failing
/// the whole record.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignResponse {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "publishTime", default)]
    pub publish_time: Option<String>,
    #[serde(default)]
    pub playlist: Vec<PlaylistEntry>,
}

/// One map entry in a campaign's playlist.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "authorScore", default)]
    pub author_score: Option<i64>,
    #[serde(rename = "mapUid", default)]
    pub map_uid: String,
}

/// Client for the keyed campaign lookup endpoint.
pub struct CampaignClient {
    http_client: reqwest::Client,
    pacer: Pacer,
    api_base_url: String,
    site_base_url: String,
    club_id: String,
    cooldown: Duration,
}

impl CampaignClient {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let http_client = build_api_client(config)?;
        Ok(Self {
            http_client,
            pacer: Pacer::new(Duration::from_millis(config.fetch_pace_ms)),
            api_base_url: config.api_base_url.clone(),
            site_base_url: config.site_base_url.clone(),
            club_id: config.club_id.clone(),
            cooldown: Duration::from_secs(config.cooldown_secs),
        })
    }

    /// Fetch one campaign by id. Rate-limit failures get the single
    /// cooldown retry; everything else surfaces as-is.
    pub async fn fetch(&self, campaign_id: &str) -> std::result::Result<CampaignResponse, RemoteError> {
        with_rate_limit_retry(self.cooldown, || self.fetch_once(campaign_id)).await
    }

    /// Browser URL of a campaign on the public site.
    pub fn source_url(&self, campaign_id: &str) -> String {
        format!(
            "{}/#/campaigns/{}/{}",
            self.site_base_url, self.club_id, campaign_id
        )
    }

    async fn fetch_once(&self, campaign_id: &str) -> std::result::Result<CampaignResponse, RemoteError> {
        self.pacer.wait().await;

        let url = format!(
            "{}/campaign/{}/{}",
            self.api_base_url, self.club_id, campaign_id
        );
        tracing::debug!(campaign_id = %campaign_id, url = %url, "Querying campaign API");

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

        let campaign: CampaignResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        tracing::info!(
            campaign_id = %campaign_id,
            name = %campaign.name,
            maps = campaign.playlist.len(),
            "Retrieved campaign"
        );

        Ok(campaign)
    }
}

/// Build the HTTP client for the API host: user agent, timeout, referer,
/// and the session cookie when one is configured.
pub(crate) fn build_api_client(config: &IngestConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        REFERER,
        HeaderValue::from_str(&config.site_base_url)
            .map_err(|e| Error::Config(format!("invalid site base URL: {e}")))?,
    );
    if let Some(cookie) = &config.cookie {
        headers.insert(
            COOKIE,
            HeaderValue::from_str(cookie)
                .map_err(|e| Error::Config(format!("invalid session cookie: {e}")))?,
        );
    }

    reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::Internal(format!("HTTP client build failed: {e}")))
}
