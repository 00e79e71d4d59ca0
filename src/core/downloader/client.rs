use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use backon::{ExponentialBuilder, Retryable};
use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::download::{file_needs_download, Download, DownloadOutcome, DownloadState};
use crate::core::config::InstallerConfig;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::http::{build_http_client, CredentialProvider};
use crate::core::progress::ProgressReporter;

/// Concurrent, hash-verified downloader.
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    /// Attempts per transfer for transient failures.
    max_attempts: u32,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl Downloader {
    pub fn new(config: &InstallerConfig) -> InstallerResult<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            concurrency: config.concurrency.max(1),
            max_attempts: config.max_attempts.max(1),
            credentials: None,
        })
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn retry_policy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default().with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }

    // ── Single file download ────────────────────────────

    /// Bring `download.dest` to the expected content.
    ///
    /// A valid existing file is kept as-is (only the copy-to step runs).
    /// Otherwise the body is streamed into `<dest>.part`, verified, and renamed
    /// into place. Transient network errors are retried; a hash mismatch is not.
    pub async fn fetch(
        &self,
        download: &mut Download,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> InstallerResult<DownloadOutcome> {
        if cancel.is_cancelled() {
            return Err(InstallerError::Cancelled);
        }

        download.set_state(DownloadState::InProgress);
        match self.fetch_inner(download, progress, cancel).await {
            Ok(outcome) => {
                download.set_state(DownloadState::Verified);
                Ok(outcome)
            }
            Err(e) => {
                download.set_state(DownloadState::Failed);
                Err(e)
            }
        }
    }

    async fn fetch_inner(
        &self,
        download: &Download,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> InstallerResult<DownloadOutcome> {
        progress.file(download.display_name());

        if !download.needs_download().await? {
            debug!("Cache hit: {:?}", download.dest);
            self.copy_verified(download).await?;
            return Ok(DownloadOutcome::CacheHit);
        }

        if let Some(parent) = download.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallerError::io(parent, e))?;
        }

        let guard = PartGuard::new(download.part_path());
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;
        let result = (|| async move {
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            self.transfer(download, progress, cancel).await
        })
        .retry(self.retry_policy())
        .when(|e: &InstallerError| e.is_transient())
        .notify(|e: &InstallerError, delay| {
            warn!("Retrying {} in {:?}: {}", download.url, delay, e);
        })
        .await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) if e.is_transient() => {
                return Err(InstallerError::Network {
                    url: download.url.clone(),
                    attempts: attempts.load(Ordering::SeqCst),
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let part = &guard.path;
        if let Some(expected) = download.size.filter(|n| *n != bytes) {
            progress.rewind(bytes);
            return Err(InstallerError::Integrity {
                url: download.url.clone(),
                path: download.dest.clone(),
                expected: format!("{expected} bytes"),
                actual: format!("{bytes} bytes"),
            });
        }
        if let Some(expected) = &download.checksum {
            let actual = expected.compute_same_kind(part).await?;
            if &actual != expected {
                return Err(InstallerError::Integrity {
                    url: download.url.clone(),
                    path: download.dest.clone(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        if tokio::fs::metadata(&download.dest).await.is_ok() {
            tokio::fs::remove_file(&download.dest)
                .await
                .map_err(|e| InstallerError::io(&download.dest, e))?;
        }
        tokio::fs::rename(part, &download.dest)
            .await
            .map_err(|e| InstallerError::io(&download.dest, e))?;
        guard.disarm();

        self.copy_verified(download).await?;

        debug!("Downloaded: {} -> {:?}", download.url, download.dest);
        Ok(DownloadOutcome::Fetched { bytes })
    }

    /// One attempt: stream the body into the part file, counting bytes as they arrive.
    async fn transfer(
        &self,
        download: &Download,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> InstallerResult<u64> {
        let part = download.part_path();

        let mut request = self.client.get(&download.url);
        if download.requires_auth {
            if let Some(token) = self.credentials.as_ref().and_then(|c| c.access_token()) {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InstallerError::HttpStatus {
                url: download.url.clone(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| InstallerError::io(&part, e))?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        let streamed: InstallerResult<()> = async {
            while let Some(chunk) = body.next().await {
                if cancel.is_cancelled() {
                    return Err(InstallerError::Cancelled);
                }
                let chunk = chunk?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| InstallerError::io(&part, e))?;
                written += chunk.len() as u64;
                progress.add_downloaded(chunk.len() as u64);
            }
            file.flush().await.map_err(|e| InstallerError::io(&part, e))?;
            Ok(())
        }
        .await;
        drop(file);

        if let Err(e) = streamed {
            let _ = tokio::fs::remove_file(&part).await;
            progress.rewind(written);
            return Err(e);
        }

        Ok(written)
    }

    /// Copy verified bytes to the secondary destination unless it already matches.
    async fn copy_verified(&self, download: &Download) -> InstallerResult<()> {
        let Some(copy_to) = &download.copy_to else {
            return Ok(());
        };

        if download.checksum.is_some()
            && !file_needs_download(copy_to, download.size, download.checksum.as_ref()).await?
        {
            return Ok(());
        }

        if let Some(parent) = copy_to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallerError::io(parent, e))?;
        }
        tokio::fs::copy(&download.dest, copy_to)
            .await
            .map_err(|e| InstallerError::io(copy_to, e))?;
        Ok(())
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download many files concurrently using `buffer_unordered`.
    ///
    /// Returns on the first fatal error; transfers still in flight are dropped.
    pub async fn download_batch(
        &self,
        downloads: Vec<Download>,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> InstallerResult<Vec<(Download, DownloadOutcome)>> {
        info!(
            "Starting batch download: {} files, concurrency={}",
            downloads.len(),
            self.concurrency
        );

        let mut results = stream::iter(downloads)
            .map(|mut download| async move {
                let outcome = self.fetch(&mut download, progress, cancel).await?;
                Ok::<_, InstallerError>((download, outcome))
            })
            .buffer_unordered(self.concurrency);

        let mut finished = Vec::new();
        while let Some(result) = results.next().await {
            finished.push(result?);
        }

        Ok(finished)
    }

    // ── Metadata ────────────────────────────────────────

    /// GET and deserialize a JSON document, retrying transient failures.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> InstallerResult<T> {
        (|| async move {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(InstallerError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(response.json::<T>().await?)
        })
        .retry(self.retry_policy())
        .when(|e: &InstallerError| e.is_transient())
        .await
    }
}

/// Deletes a part file when its transfer ends without being renamed into
/// place, including when the owning future is dropped mid-flight.
struct PartGuard {
    path: PathBuf,
    armed: bool,
}

impl PartGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hashing::{hash_bytes, Checksum, HashAlgorithm};
    use crate::core::progress::NoopProgress;
    use httpmock::prelude::*;

    fn downloader() -> Downloader {
        let mut config = InstallerConfig::with_data_dir(std::env::temp_dir());
        config.max_attempts = 3;
        Downloader::new(&config).unwrap()
    }

    fn reporter() -> ProgressReporter {
        ProgressReporter::new(Arc::new(NoopProgress))
    }

    #[tokio::test]
    async fn fetch_verifies_and_copies() {
        let server = MockServer::start_async().await;
        let body = b"library bytes".to_vec();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/lib.jar");
                then.status(200).body(body.clone());
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let sha1 = Checksum::Sha1(hash_bytes(&body, HashAlgorithm::Sha1));
        let mut dl = Download::prepare(
            server.url("/lib.jar"),
            dir.path().join("cache/lib.jar"),
            Some(sha1),
            Some(body.len() as u64),
        )
        .copy_to(dir.path().join("instance/lib.jar"));

        let progress = reporter();
        let outcome = downloader()
            .fetch(&mut dl, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Fetched { bytes: body.len() as u64 });
        assert_eq!(dl.state(), DownloadState::Verified);
        assert_eq!(progress.downloaded(), body.len() as u64);
        assert_eq!(std::fs::read(dir.path().join("instance/lib.jar")).unwrap(), body);
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn cache_hit_makes_no_request_but_still_copies() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/mod.jar");
                then.status(200).body("unused");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("mod.jar");
        std::fs::write(&dest, b"cached").unwrap();
        let md5 = Checksum::Md5(hash_bytes(b"cached", HashAlgorithm::Md5));
        let mut dl = Download::prepare(server.url("/mod.jar"), &dest, Some(md5), Some(6))
            .copy_to(dir.path().join("mods/mod.jar"));

        let outcome = downloader()
            .fetch(&mut dl, &reporter(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::CacheHit);
        assert!(dir.path().join("mods/mod.jar").exists());
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn hash_mismatch_fails_once_and_removes_partial_file() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/bad.jar");
                then.status(200).body("tampered");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let expected = Checksum::Sha1(hash_bytes(b"original", HashAlgorithm::Sha1));
        let mut dl = Download::prepare(
            server.url("/bad.jar"),
            dir.path().join("bad.jar"),
            Some(expected),
            None,
        );

        let err = downloader()
            .fetch(&mut dl, &reporter(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallerError::Integrity { .. }));
        assert_eq!(dl.state(), DownloadState::Failed);
        assert!(!dir.path().join("bad.jar").exists());
        assert!(!dl.part_path().exists());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn wrong_length_body_is_rejected_without_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/short.jar");
                then.status(200).body("12345");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut dl = Download::prepare(server.url("/short.jar"), dir.path().join("short.jar"), None, Some(10));

        let progress = reporter();
        let err = downloader()
            .fetch(&mut dl, &progress, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            InstallerError::Integrity { expected, actual, .. } => {
                assert_eq!(expected, "10 bytes");
                assert_eq!(actual, "5 bytes");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(progress.downloaded(), 0);
        assert!(!dir.path().join("short.jar").exists());
        assert!(!dl.part_path().exists());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_bound() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky.jar");
                then.status(503);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut dl = Download::prepare(server.url("/flaky.jar"), dir.path().join("f.jar"), None, None);

        let err = downloader()
            .fetch(&mut dl, &reporter(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            InstallerError::Network { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.jar");
                then.status(404);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut dl = Download::prepare(server.url("/gone.jar"), dir.path().join("g.jar"), None, None);

        let err = downloader()
            .fetch(&mut dl, &reporter(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallerError::HttpStatus { status: 404, .. }));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn dropped_transfer_leaves_no_part_file() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow.jar");
                then.status(200)
                    .body("slow")
                    .delay(std::time::Duration::from_secs(5));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut dl = Download::prepare(server.url("/slow.jar"), dir.path().join("slow.jar"), None, None);
        std::fs::write(dl.part_path(), b"stale").unwrap();

        let downloader = downloader();
        let progress = reporter();
        let cancel = CancellationToken::new();
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            downloader.fetch(&mut dl, &progress, &cancel),
        )
        .await;

        assert!(timed_out.is_err());
        assert!(!dl.part_path().exists());
        assert!(!dir.path().join("slow.jar").exists());
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut dl = Download::prepare("http://127.0.0.1:9/x", dir.path().join("x"), None, None);

        let err = downloader().fetch(&mut dl, &reporter(), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn authorized_downloads_send_the_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/gated.jar")
                    .header("authorization", "Bearer secret");
                then.status(200).body("ok");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut dl = Download::prepare(server.url("/gated.jar"), dir.path().join("g.jar"), None, None)
            .authorized();

        downloader()
            .with_credentials(Arc::new(crate::core::http::StaticToken("secret".into())))
            .fetch(&mut dl, &reporter(), &CancellationToken::new())
            .await
            .unwrap();

        mock.assert_hits_async(1).await;
    }
}
