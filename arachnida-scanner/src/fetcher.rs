use crate::error::{Result, ScanError};
use reqwest::header::LOCATION;
use reqwest::{Client, Response};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Redirect hops followed before giving up on a request.
pub const MAX_REDIRECTS: usize = 5;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_USER_AGENT: &str = concat!("arachnida/", env!("CARGO_PKG_VERSION"));

/// HTTP GET with redirects followed by hand, so loops inside a single
/// redirect chain can be detected and reported.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration, cancel: CancellationToken) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, cancel })
    }

    /// Fetch `url` and return its body as text.
    pub async fn fetch_text(&self, url: &Url) -> Result<String> {
        let response = self.fetch(url).await?;
        self.guard(url, response.text()).await
    }

    /// Fetch `url`, following up to [`MAX_REDIRECTS`] redirects.
    ///
    /// The returned response always has a 2xx status.
    pub async fn fetch(&self, url: &Url) -> Result<Response> {
        self.fetch_with_timeout(url, None).await
    }

    /// Like [`Fetcher::fetch`] but with a per-request timeout overriding the
    /// client-wide budget.
    pub async fn fetch_with_timeout(&self, url: &Url, timeout: Option<Duration>) -> Result<Response> {
        let mut current = url.clone();
        current.set_fragment(None);

        let mut chain: HashSet<Url> = HashSet::new();
        chain.insert(current.clone());
        let mut hops = 0;

        loop {
            let mut request = self.client.get(current.clone());
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }
            let response = self.guard(&current, request.send()).await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| ScanError::MissingLocation(current.to_string()))?;

                let mut next = current
                    .join(location)
                    .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", location, e)))?;
                next.set_fragment(None);

                if !chain.insert(next.clone()) {
                    return Err(ScanError::RedirectLoop(next.to_string()));
                }

                hops += 1;
                if hops > MAX_REDIRECTS {
                    return Err(ScanError::TooManyRedirects {
                        url: url.to_string(),
                        hops: MAX_REDIRECTS,
                    });
                }

                debug!("Redirect {} -> {} ({}/{})", current, next, hops, MAX_REDIRECTS);
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(ScanError::HttpStatus {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            return Ok(response);
        }
    }

    /// Await a reqwest future, giving up early when the crawl is cancelled
    /// and mapping client timeouts to [`ScanError::Timeout`].
    pub async fn guard<T, F>(&self, url: &Url, fut: F) -> Result<T>
    where
        F: Future<Output = reqwest::Result<T>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ScanError::Cancelled),
            outcome = fut => outcome.map_err(|e| {
                if e.is_timeout() {
                    ScanError::Timeout(url.to_string())
                } else {
                    ScanError::Request(e)
                }
            }),
        }
    }
}
