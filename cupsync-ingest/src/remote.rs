//! Remote call failure taxonomy, pacing, and the bounded rate-limit retry
//!
//! Both the campaign and player clients talk to the same host and share one
//! failure taxonomy: a 404 is permanent, a 429 earns exactly one retry after
//! a fixed cooldown, and an HTML body where JSON was expected means the
//! session is being challenged and nothing further will succeed.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

/// Terminal outcome of a remote call that did not produce data.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failure; the key can be retried on a later run
    #[error("Network error: {0}")]
    Network(String),

    /// The key does not exist on the remote; permanent
    #[error("Resource not found")]
    NotFound,

    /// The remote is throttling us
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Soft block: a markup response where structured data was expected.
    /// The session is invalid for every subsequent call, not just this one.
    #[error("Soft block: HTML response where JSON was expected")]
    Blocked,

    /// Any other non-success status
    #[error("API error: status {0}")]
    Api(u16),

    /// The body was served but did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Whether this failure invalidates the whole batch rather than one key.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RemoteError::Blocked)
    }
}

/// Map a response status and content type onto the taxonomy.
///
/// `None` means the body should be parsed as data. The content type is
/// checked first: a well-formed HTML page with status 200 is still a block.
pub fn classify_response(status: u16, content_type: Option<&str>) -> Option<RemoteError> {
    if let Some(ct) = content_type {
        if ct.contains("html") {
            return Some(RemoteError::Blocked);
        }
    }
    match status {
        s if (200..300).contains(&s) => None,
        404 => Some(RemoteError::NotFound),
        429 => Some(RemoteError::RateLimited),
        s => Some(RemoteError::Api(s)),
    }
}

/// Cooperative pacing between consecutive calls to the same host.
///
/// Not a correctness requirement; it keeps us below the thresholds that
/// trigger throttling in the first place.
pub struct Pacer {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait until at least `min_interval` has passed since the last call.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Pacing: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Run a remote call, retrying exactly once after `cooldown` if the first
/// attempt was rate limited. A second `RateLimited` is surfaced as the
/// failure; there is no unbounded retry loop here.
pub async fn with_rate_limit_retry<T, F, Fut>(
    cooldown: Duration,
    mut call: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    match call().await {
        Err(RemoteError::RateLimited) => {
            tracing::warn!(
                cooldown_secs = cooldown.as_secs(),
                "Rate limited, cooling down before the single retry"
            );
            tokio::time::sleep(cooldown).await;
            call().await
        }
        other => other,
    }
}
