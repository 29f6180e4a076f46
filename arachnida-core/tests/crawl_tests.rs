// Tests for crawl orchestration

use arachnida_core::crawl::{CrawlOptions, OverwriteMode, execute_crawl};
use arachnida_scanner::{CancellationToken, ScanError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

fn options(url: &str, dir: &std::path::Path) -> CrawlOptions {
    let mut options = CrawlOptions::new(url);
    options.destination = dir.to_path_buf();
    options.timeout_secs = 5;
    options
}

// ============================================================================
// Option Defaults
// ============================================================================

#[test]
fn test_default_options() {
    let options = CrawlOptions::new("http://example.com");
    assert!(!options.recursive);
    assert_eq!(options.max_depth, 5);
    assert_eq!(options.workers, 10);
    assert_eq!(options.timeout_secs, 60);
    assert_eq!(options.destination, std::path::PathBuf::from("./data/"));
    assert_eq!(options.overwrite, OverwriteMode::Prompt);
    assert!(!options.show_progress_bars);
}

// ============================================================================
// End-to-end Crawls
// ============================================================================

#[tokio::test]
async fn test_recursive_crawl_downloads_images() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/gallery">g</a><img src="/top.png">"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gallery"))
        .respond_with(html(r#"<img src="/one.jpg"><img src="/two.gif">"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    for image in ["/top.png", "/one.jpg", "/two.gif"] {
        Mock::given(method("GET"))
            .and(path(image))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"img".as_slice()),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let mut opts = options(&mock_server.uri(), dir.path());
    opts.recursive = true;
    opts.max_depth = 2;

    let report = execute_crawl(opts, None).await.unwrap();

    assert_eq!(report.tree.len(), 2);
    assert_eq!(report.summary.images_found, 3);
    assert_eq!(report.summary.images_saved(), 3);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
}

#[tokio::test]
async fn test_non_recursive_ignores_depth() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/next">n</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("unreachable"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut opts = options(&mock_server.uri(), dir.path());
    opts.max_depth = 4;

    let report = execute_crawl(opts, None).await.unwrap();
    assert_eq!(report.tree.len(), 1);
}

#[tokio::test]
async fn test_refuse_mode_leaves_non_empty_destination_alone() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.jpg"), b"old").unwrap();

    Mock::given(method("GET"))
        .respond_with(html("never"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut opts = options(&mock_server.uri(), dir.path());
    opts.overwrite = OverwriteMode::Refuse;

    let err = execute_crawl(opts, None).await.unwrap_err();
    assert!(matches!(err, ScanError::DestinationRejected(_)), "got {:?}", err);
    assert_eq!(std::fs::read(dir.path().join("keep.jpg")).unwrap(), b"old");
}

#[tokio::test]
async fn test_allow_mode_writes_into_non_empty_destination() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.jpg"), b"old").unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("no images here"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut opts = options(&mock_server.uri(), dir.path());
    opts.overwrite = OverwriteMode::Allow;

    let report = execute_crawl(opts, None).await.unwrap();
    assert_eq!(report.summary.pages_fetched(), 1);
}

#[tokio::test]
async fn test_progress_callback_reports_failures() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<img src="/missing.png">"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let callback = Arc::new(move |msg: String| sink.lock().unwrap().push(msg));

    let report = execute_crawl(options(&mock_server.uri(), dir.path()), Some(callback))
        .await
        .unwrap();

    assert_eq!(report.summary.failures_of("http_error").count(), 1);
    let messages = messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.starts_with("Crawling ")));
    assert!(messages.iter().any(|m| m.contains("/missing.png")));
}

#[tokio::test]
async fn test_cancelled_before_start_returns_empty_report() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(html("slow").set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut opts = options(&mock_server.uri(), dir.path());
    opts.cancel = Some(cancel);

    let report = execute_crawl(opts, None).await.unwrap();
    assert!(report.summary.cancelled);
    assert_eq!(report.summary.images_saved(), 0);
}

#[tokio::test]
async fn test_invalid_url_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = execute_crawl(options("example dot com", dir.path()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::InvalidUrl(_)));
}
