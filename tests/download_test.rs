//! Artifact retriever integration tests
//!
//! Runs the real retriever against a local scripted HTTP server to verify
//! redirect following, auth-header preservation, error mapping, and archive
//! unpacking.

mod support;

use airlift::artifact::{DownloadError, Retriever};
use airlift::model::{ArtifactKind, ArtifactLocator};
use airlift::progress::{NullReporter, ProgressReporter};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use support::{tar_gz_bytes, zip_bytes, Route, TestServer};
use tempfile::TempDir;

#[tokio::test]
async fn test_plain_download_yields_package() {
    let mut routes = HashMap::new();
    routes.insert("/dl/payload.apk".to_string(), Route::ok(b"apk-bytes".to_vec()));
    let server = TestServer::start(routes).await;

    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/dl/payload.apk"));
    let artifact = Retriever::new()
        .retrieve(&locator, tmp.path(), &NullReporter)
        .await
        .unwrap();

    assert_eq!(artifact.size_bytes, 9);
    assert_eq!(
        artifact.kind,
        ArtifactKind::Package {
            extension: "apk".to_string()
        }
    );
    assert_eq!(std::fs::read(&artifact.path).unwrap(), b"apk-bytes");
}

#[tokio::test]
async fn test_redirect_followed_with_auth_preserved() {
    let mut routes = HashMap::new();
    routes.insert("/start".to_string(), Route::redirect("/dl/payload.apk"));
    routes.insert("/dl/payload.apk".to_string(), Route::ok(b"redirected".to_vec()));
    let server = TestServer::start(routes).await;

    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/start")).with_auth("Authorization", "Bearer sekrit");
    let artifact = Retriever::new()
        .retrieve(&locator, tmp.path(), &NullReporter)
        .await
        .unwrap();

    // Size matches the final response body.
    assert_eq!(artifact.size_bytes, b"redirected".len() as u64);

    // The auth header survived the hop to the redirect target.
    let seen = server.last_request_to("/dl/payload.apk").unwrap();
    assert_eq!(seen.headers.get("authorization").map(String::as_str), Some("Bearer sekrit"));
}

#[tokio::test]
async fn test_non_2xx_is_a_download_error() {
    let mut routes = HashMap::new();
    routes.insert("/gone".to_string(), Route::status(404));
    let server = TestServer::start(routes).await;

    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/gone"));
    let err = Retriever::new()
        .retrieve(&locator, tmp.path(), &NullReporter)
        .await
        .unwrap_err();

    match err {
        DownloadError::Http { status, .. } => assert_eq!(status.as_u16(), 404),
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redirect_without_location_is_rejected() {
    let mut routes = HashMap::new();
    routes.insert("/broken".to_string(), Route::status(302));
    let server = TestServer::start(routes).await;

    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/broken"));
    let err = Retriever::new()
        .retrieve(&locator, tmp.path(), &NullReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::MissingLocation { .. }));
}

#[tokio::test]
async fn test_archive_download_unpacks_and_finds_payload() {
    let archive = tar_gz_bytes(&[("app/outputs/payload.apk", b"packaged"), ("app/readme.txt", b"hi")]);
    let mut routes = HashMap::new();
    routes.insert("/artifact".to_string(), Route::ok(archive).header("Content-Disposition", "attachment; filename=\"bundle.tar.gz\""));
    let server = TestServer::start(routes).await;

    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/artifact"));
    let artifact = Retriever::new()
        .retrieve(&locator, tmp.path(), &NullReporter)
        .await
        .unwrap();

    assert!(artifact.path.ends_with("app/outputs/payload.apk"));
    assert_eq!(artifact.size_bytes, b"packaged".len() as u64);
    assert_eq!(std::fs::read(&artifact.path).unwrap(), b"packaged");
}

#[tokio::test]
async fn test_stalled_download_is_abandoned() {
    // The server declares a body but never sends it; with a short stall
    // ceiling the retriever must abandon the transfer rather than hang.
    let mut routes = HashMap::new();
    routes.insert("/slow/payload.apk".to_string(), Route::ok(vec![0u8; 4096]).stalling());
    let server = TestServer::start(routes).await;

    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/slow/payload.apk"));
    let err = Retriever::with_stall_ceiling(Duration::from_millis(100))
        .retrieve(&locator, tmp.path(), &NullReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Stalled));
}

fn unzip_available() -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join("unzip").is_file()))
        .unwrap_or(false)
}

#[tokio::test]
async fn test_zip_download_unpacks_via_host_tool() {
    if !unzip_available() {
        eprintln!("unzip not on PATH, skipping");
        return;
    }

    let archive = zip_bytes(&[("outputs/payload.apk", b"zipped build"), ("readme.txt", b"hi")]);
    let mut routes = HashMap::new();
    routes.insert("/dl/build.zip".to_string(), Route::ok(archive));
    let server = TestServer::start(routes).await;

    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/dl/build.zip"));
    let artifact = Retriever::new()
        .retrieve(&locator, tmp.path(), &NullReporter)
        .await
        .unwrap();

    assert!(artifact.path.ends_with("outputs/payload.apk"));
    assert_eq!(std::fs::read(&artifact.path).unwrap(), b"zipped build");
}

#[tokio::test]
async fn test_archive_without_payload_degrades_to_directory() {
    let archive = tar_gz_bytes(&[("logs/build.log", b"nothing installable")]);
    let mut routes = HashMap::new();
    routes.insert("/artifact".to_string(), Route::ok(archive).header("Content-Disposition", "attachment; filename=\"bundle.tar.gz\""));
    let server = TestServer::start(routes).await;

    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/artifact"));
    let artifact = Retriever::new()
        .retrieve(&locator, tmp.path(), &NullReporter)
        .await
        .unwrap();

    assert!(artifact.is_directory_fallback());
    assert!(artifact.path.join("logs/build.log").exists());
}

/// Recorder that checks progress updates arrive monotonically
struct MonotonicReporter {
    seen: Mutex<Vec<u64>>,
    total: Mutex<Option<u64>>,
}

impl ProgressReporter for MonotonicReporter {
    fn start(&self, total: Option<u64>) {
        *self.total.lock().unwrap() = total;
    }

    fn update(&self, received: u64) {
        self.seen.lock().unwrap().push(received);
    }

    fn finish(&self) {}
}

#[tokio::test]
async fn test_progress_is_monotonic_and_reaches_total() {
    let body = vec![7u8; 64 * 1024];
    let mut routes = HashMap::new();
    routes.insert("/dl/payload.apk".to_string(), Route::ok(body.clone()));
    let server = TestServer::start(routes).await;

    let reporter = MonotonicReporter {
        seen: Mutex::new(Vec::new()),
        total: Mutex::new(None),
    };
    let tmp = TempDir::new().unwrap();
    let locator = ArtifactLocator::new(server.url("/dl/payload.apk"));
    Retriever::new()
        .retrieve(&locator, tmp.path(), &reporter)
        .await
        .unwrap();

    assert_eq!(*reporter.total.lock().unwrap(), Some(body.len() as u64));
    let seen = reporter.seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*seen.last().unwrap(), body.len() as u64);
}
