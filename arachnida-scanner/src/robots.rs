use crate::fetcher::Fetcher;
use crate::normalize::origin_of;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};
use url::Url;

/// Robots rules are evaluated for the generic agent.
pub const ROBOTS_AGENT: &str = "*";

pub const ROBOTS_TIMEOUT_SECS: u64 = 10;

/// Parsed crawl policy for one origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsPolicy {
    /// No usable robots.txt was found; everything may be fetched.
    AllowAll,
    /// The raw robots.txt body, matched with the longest-rule-wins semantics.
    Rules(String),
}

impl RobotsPolicy {
    pub fn exists(&self) -> bool {
        matches!(self, RobotsPolicy::Rules(_))
    }

    pub fn allows(&self, url: &Url) -> bool {
        match self {
            RobotsPolicy::AllowAll => true,
            RobotsPolicy::Rules(body) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(body, ROBOTS_AGENT, url.as_str())
            }
        }
    }
}

type PolicySlot = Arc<OnceCell<Arc<RobotsPolicy>>>;

/// Per-origin robots.txt cache. Each origin is fetched at most once per run;
/// concurrent callers for the same origin wait on the first fetch.
pub struct RobotsCache {
    fetcher: Fetcher,
    timeout: Duration,
    policies: Mutex<HashMap<String, PolicySlot>>,
}

impl RobotsCache {
    pub fn new(fetcher: Fetcher) -> Self {
        Self::with_timeout(fetcher, Duration::from_secs(ROBOTS_TIMEOUT_SECS))
    }

    pub fn with_timeout(fetcher: Fetcher, timeout: Duration) -> Self {
        Self {
            fetcher,
            timeout,
            policies: Mutex::new(HashMap::new()),
        }
    }

    /// Whether robots policy lets us fetch `url`.
    pub async fn may_fetch(&self, url: &Url) -> bool {
        match self.policy_for(url).await {
            Some(policy) => policy.allows(url),
            None => true,
        }
    }

    /// The cached policy for `url`'s origin, loading it on first use.
    pub async fn policy_for(&self, url: &Url) -> Option<Arc<RobotsPolicy>> {
        let origin = origin_of(url)?;

        let slot = {
            let mut policies = self.policies.lock().await;
            policies.entry(origin.clone()).or_default().clone()
        };

        let policy = slot.get_or_init(|| self.load(origin)).await;
        Some(policy.clone())
    }

    pub async fn cached_origins(&self) -> usize {
        self.policies.lock().await.len()
    }

    async fn load(&self, origin: String) -> Arc<RobotsPolicy> {
        let robots_url = match Url::parse(&origin).and_then(|u| u.join("/robots.txt")) {
            Ok(url) => url,
            Err(e) => {
                debug!("Cannot build robots.txt URL for {}: {}", origin, e);
                return Arc::new(RobotsPolicy::AllowAll);
            }
        };

        let body = match self.fetcher.fetch_with_timeout(&robots_url, Some(self.timeout)).await {
            Ok(response) => self.fetcher.guard(&robots_url, response.text()).await,
            Err(e) => Err(e),
        };

        match body {
            Ok(body) => {
                info!("Loaded robots.txt for {}", origin);
                Arc::new(RobotsPolicy::Rules(body))
            }
            Err(e) => {
                debug!("No robots policy for {} ({}), allowing all", origin, e);
                Arc::new(RobotsPolicy::AllowAll)
            }
        }
    }
}
