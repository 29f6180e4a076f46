use crate::error::{Result, ScanError};
use crate::extract::raw_extension;
use crate::fetcher::Fetcher;
use crate::result::ImageRecord;
use crate::robots::RobotsCache;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Downloads images into a single destination directory.
pub struct ImageDownloader {
    fetcher: Fetcher,
    robots: Arc<RobotsCache>,
    destination: PathBuf,
}

impl ImageDownloader {
    pub fn new(fetcher: Fetcher, robots: Arc<RobotsCache>, destination: PathBuf) -> Self {
        Self {
            fetcher,
            robots,
            destination,
        }
    }

    pub async fn download(&self, url: &Url) -> Result<ImageRecord> {
        if !self.robots.may_fetch(url).await {
            return Err(ScanError::RobotsDisallowed(url.to_string()));
        }

        let response = self.fetcher.fetch(url).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        if !content_type.as_deref().is_some_and(|ct| ct.contains("image")) {
            return Err(ScanError::NotAnImage {
                url: url.to_string(),
                content_type,
            });
        }

        let bytes = self.fetcher.guard(url, response.bytes()).await?;

        let destination = self.destination.join(image_file_name(url));
        write_atomically(&destination, &bytes).await?;
        info!("Downloaded {} ({} bytes)", url, bytes.len());

        Ok(ImageRecord {
            source: url.to_string(),
            destination,
        })
    }
}

/// What [`prepare_destination`] found at the destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    Created,
    ExistingEmpty,
    /// The directory already held files; callers may want to confirm
    /// before writing into it.
    ExistingNonEmpty,
}

/// Make sure `path` is a directory we can write images into.
pub async fn prepare_destination(path: &Path) -> Result<DestinationState> {
    let failed = |source: std::io::Error| ScanError::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source,
    };

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            let mut entries = tokio::fs::read_dir(path).await.map_err(failed)?;
            if entries.next_entry().await.map_err(failed)?.is_some() {
                Ok(DestinationState::ExistingNonEmpty)
            } else {
                Ok(DestinationState::ExistingEmpty)
            }
        }
        Ok(_) => Err(failed(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "path exists and is not a directory",
        ))),
        Err(_) => {
            tokio::fs::create_dir_all(path).await.map_err(failed)?;
            debug!("Created destination {}", path.display());
            Ok(DestinationState::Created)
        }
    }
}

/// `<sha256 of the url><.ext>`, stable for a given URL and distinct across
/// URLs that share a basename. The extension keeps its original case.
pub fn image_file_name(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    match raw_extension(url) {
        Some(ext) => format!("{:x}.{}", digest, ext),
        None => format!("{:x}", digest),
    }
}

/// Write to a sibling `.part` file and rename it into place so readers never
/// observe a partially written image.
async fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<()> {
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = tokio::fs::write(&partial, bytes).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&partial, destination).await {
        debug!("Rename {} failed: {}", partial.display(), e);
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::DEFAULT_USER_AGENT;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    fn downloader(dir: &Path) -> ImageDownloader {
        let fetcher =
            Fetcher::new(DEFAULT_USER_AGENT, Duration::from_secs(5), CancellationToken::new()).unwrap();
        let robots = Arc::new(RobotsCache::new(fetcher.clone()));
        ImageDownloader::new(fetcher, robots, dir.to_path_buf())
    }

    async fn files_in(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[test]
    fn test_file_name_is_hash_plus_extension() {
        let url = Url::parse("https://ex.com/img/cat.jpeg").unwrap();
        let name = image_file_name(&url);
        assert!(name.ends_with(".jpeg"));
        assert_eq!(name.len(), 64 + 5);
        assert_eq!(name, image_file_name(&url));
    }

    #[test]
    fn test_file_name_keeps_extension_case() {
        let url = Url::parse("https://ex.com/img/Cat.JPG?size=large").unwrap();
        let name = image_file_name(&url);
        assert!(name.ends_with(".JPG"), "got {}", name);
        assert!(!name.contains('?'));
    }

    #[test]
    fn test_same_basename_different_urls_do_not_collide() {
        let a = Url::parse("https://ex.com/a/logo.png").unwrap();
        let b = Url::parse("https://ex.com/b/logo.png").unwrap();
        assert_ne!(image_file_name(&a), image_file_name(&b));
    }

    #[tokio::test]
    async fn test_prepare_destination_states() {
        let root = tempfile::tempdir().unwrap();

        let fresh = root.path().join("new").join("nested");
        assert_eq!(prepare_destination(&fresh).await.unwrap(), DestinationState::Created);
        assert!(fresh.is_dir());
        assert_eq!(prepare_destination(&fresh).await.unwrap(), DestinationState::ExistingEmpty);

        tokio::fs::write(fresh.join("old.jpg"), b"x").await.unwrap();
        assert_eq!(
            prepare_destination(&fresh).await.unwrap(),
            DestinationState::ExistingNonEmpty
        );
    }

    #[tokio::test]
    async fn test_prepare_destination_rejects_a_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("data");
        tokio::fs::write(&file, b"not a dir").await.unwrap();

        let err = prepare_destination(&file).await.unwrap_err();
        assert!(matches!(err, ScanError::DirectoryCreationFailed { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_downloads_image() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/cat.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(JPEG),
            )
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/cat.jpg", mock_server.uri())).unwrap();
        let record = downloader(dir.path()).download(&url).await.unwrap();

        assert_eq!(record.destination, dir.path().join(image_file_name(&url)));
        assert_eq!(tokio::fs::read(&record.destination).await.unwrap(), JPEG);
        assert_eq!(files_in(dir.path()).await, vec![image_file_name(&url)]);
    }

    #[tokio::test]
    async fn test_html_error_page_is_not_written() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/broken.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>not here</html>"),
            )
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/broken.png", mock_server.uri())).unwrap();
        let err = downloader(dir.path()).download(&url).await.unwrap_err();

        assert!(matches!(err, ScanError::NotAnImage { .. }), "got {:?}", err);
        assert!(files_in(dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_robots_disallowed_image_is_skipped() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/private/a.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png".as_slice()),
            )
            .expect(0)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/private/a.png", mock_server.uri())).unwrap();
        let err = downloader(dir.path()).download(&url).await.unwrap_err();

        assert!(matches!(err, ScanError::RobotsDisallowed(_)), "got {:?}", err);
        assert!(files_in(dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_redirected_image_is_saved_under_requested_url() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/old.gif"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/cdn/new.gif"))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/cdn/new.gif"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/gif")
                    .set_body_bytes(b"GIF89a".as_slice()),
            )
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/old.gif", mock_server.uri())).unwrap();
        let record = downloader(dir.path()).download(&url).await.unwrap();
        assert!(record.destination.ends_with(image_file_name(&url)));
    }

    #[tokio::test]
    async fn test_missing_image_is_http_error() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/gone.bmp"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/gone.bmp", mock_server.uri())).unwrap();
        let err = downloader(dir.path()).download(&url).await.unwrap_err();
        assert!(matches!(err, ScanError::HttpStatus { status: 404, .. }), "got {:?}", err);
    }
}
