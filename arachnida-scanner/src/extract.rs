use crate::normalize::{NormalizedUrl, normalize};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// Image extensions worth downloading, compared case-insensitively.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));
static IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("static selector"));

/// Outbound links and candidate images found in one page.
#[derive(Debug, Default, Clone)]
pub struct Extracted {
    /// Distinct links in the order they first appear.
    pub links: Vec<NormalizedUrl>,
    /// In document order; the same image may appear more than once.
    pub images: Vec<Url>,
}

/// Parse `body` and collect links and image URLs, resolved against `base`.
///
/// Malformed markup is parsed best-effort and never fails.
pub fn extract(body: &str, base: &Url) -> Extracted {
    let document = Html::parse_document(body);
    let mut extracted = Extracted::default();
    let mut seen = HashSet::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(link) = resolve_link(base, href)
            && seen.insert(link.clone())
        {
            extracted.links.push(link);
        }
    }

    for element in document.select(&IMAGE_SELECTOR) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        let src = src.trim();
        if src.is_empty() || src.starts_with("data:") {
            continue;
        }
        match base.join(src) {
            Ok(image) if is_http(&image) && has_image_extension(&image) => {
                extracted.images.push(image)
            }
            Ok(image) => debug!("Skipping non-image source {}", image),
            Err(e) => debug!("Unresolvable image source {:?}: {}", src, e),
        }
    }

    extracted
}

fn resolve_link(base: &Url, href: &str) -> Option<NormalizedUrl> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let link = normalize(href, Some(base)).ok()?;
    is_http(link.as_url()).then_some(link)
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// The extension of the URL's last path segment as written, ignoring the query.
pub fn raw_extension(url: &Url) -> Option<&str> {
    let segment = url.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// [`raw_extension`], lower-cased for comparison.
pub fn path_extension(url: &Url) -> Option<String> {
    raw_extension(url).map(str::to_ascii_lowercase)
}

pub fn has_image_extension(url: &Url) -> bool {
    path_extension(url)
        .map(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
