use crate::error::{Result, ScanError};
use serde::Serialize;
use std::fmt;
use url::Url;

const INDEX_SUFFIXES: [&str; 2] = ["/index.html", "/index"];

/// A URL in canonical form: fragment removed, index documents collapsed to
/// their directory. Used as the dedup key throughout a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Resolve `raw` against `base` (when given) and canonicalize it.
///
/// Scheme and host are lower-cased by the parser; the path keeps its case.
pub fn normalize(raw: &str, base: Option<&Url>) -> Result<NormalizedUrl> {
    let parsed = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", raw, e)))?;

    Ok(normalize_url(parsed))
}

/// Canonicalize an already parsed URL.
pub fn normalize_url(mut url: Url) -> NormalizedUrl {
    url.set_fragment(None);

    if !url.cannot_be_a_base() {
        let path = url.path();
        if let Some(suffix) = INDEX_SUFFIXES.iter().find(|s| path.ends_with(*s)) {
            let collapsed = format!("{}/", &path[..path.len() - suffix.len()]);
            url.set_path(&collapsed);
        }
    }

    NormalizedUrl(url)
}

/// The `scheme://host[:port]` part of a URL, the unit robots policy is cached at.
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
