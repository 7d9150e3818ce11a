//! Resolution of media references to local files.
//!
//! A reference is either a local path (used in place, never copied) or an
//! HTTP(S) URL, which is streamed into the job's [`WorkingSet`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use rf_core::config::FetchConfig;
use rf_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::workspace::WorkingSet;

/// Where a media reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    Remote(Url),
    Local(PathBuf),
}

impl MediaRef {
    /// Classify `reference`. Only `http`, `https` and `file` URLs are treated
    /// as URLs; everything else (including `C:\...`) is a path.
    pub fn parse(reference: &str) -> Result<Self> {
        match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| Error::Validation(format!("invalid file URL: {reference}"))),
            _ => Ok(Self::Local(PathBuf::from(reference))),
        }
    }
}

/// Whether `reference` has to be downloaded.
pub fn is_remote(reference: &str) -> bool {
    matches!(MediaRef::parse(reference), Ok(MediaRef::Remote(_)))
}

/// Downloads remote inputs into a job's working set.
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
}

impl MediaFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Resolve an optional reference to a local file.
    ///
    /// `label` names the downloaded file (`<label>_<n>.<ext>`). Empty
    /// references resolve to `None`. Each URL is downloaded at most once per
    /// working set.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a local path that does not exist.
    /// - [`Error::Fetch`] for network errors, non-2xx responses and write
    ///   failures; the partial download is removed.
    /// - [`Error::Cancelled`] if `cancel` fires mid-download.
    pub async fn resolve(
        &self,
        reference: Option<&str>,
        label: &str,
        ws: &WorkingSet,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(None);
        };

        let url = match MediaRef::parse(reference)? {
            MediaRef::Local(path) => {
                if !path.is_file() {
                    return Err(Error::Validation(format!(
                        "{label} not found: {}",
                        path.display()
                    )));
                }
                return Ok(Some(path));
            }
            MediaRef::Remote(url) => url,
        };

        if let Some(existing) = ws.fetched(reference) {
            tracing::debug!("{reference} already fetched to {}", existing.display());
            return Ok(Some(existing));
        }

        let dest = ws.file(label, extension_of(&url).unwrap_or(default_extension(label)));
        tracing::info!("Fetching {label} from {reference}");

        let result = tokio::select! {
            res = self.download(reference, url, &dest) => res,
            _ = cancel.cancelled() => Err(Error::cancelled(format!("fetching {label}"))),
        };

        match result {
            Ok(bytes) => {
                tracing::info!("Fetched {label}: {bytes} bytes -> {}", dest.display());
                ws.remember_fetch(reference, &dest);
                Ok(Some(dest))
            }
            Err(e) => {
                ws.release(&dest);
                Err(e)
            }
        }
    }

    async fn download(&self, reference: &str, url: Url, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(reference, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(reference, format!("HTTP {status}")));
        }

        let write_err =
            |e: std::io::Error| Error::fetch(reference, format!("write to {}: {e}", dest.display()));

        let mut file = tokio::fs::File::create(dest).await.map_err(write_err)?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::fetch(reference, e))?
        {
            file.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_err)?;

        Ok(written)
    }
}

/// File extension for a download, taken from the URL path.
fn extension_of(url: &Url) -> Option<&str> {
    Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Extension used when the URL has none. The input video may be delivered
/// as-is, so it gets the output container's extension.
fn default_extension(label: &str) -> &'static str {
    match label {
        "input" => "mp4",
        _ => "dat",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::JobId;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup() -> (tempfile::TempDir, WorkingSet, MediaFetcher) {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkingSet::create(
            &root.path().join("work"),
            &root.path().join("out"),
            JobId::new(),
        )
        .unwrap();
        let fetcher = MediaFetcher::new(&FetchConfig::default()).unwrap();
        (root, ws, fetcher)
    }

    #[test]
    fn classification() {
        assert!(is_remote("https://cdn.example.com/a.mp4"));
        assert!(is_remote("http://localhost:8080/a.mp4"));
        assert!(!is_remote("/tmp/a.mp4"));
        assert!(!is_remote("relative/a.mp4"));
        assert!(!is_remote(r"C:\videos\a.mp4"));
        assert!(!is_remote("file:///tmp/a.mp4"));
        assert_eq!(
            MediaRef::parse("/tmp/a.mp4").unwrap(),
            MediaRef::Local(PathBuf::from("/tmp/a.mp4"))
        );
    }

    #[test]
    fn extension_from_url() {
        let url = Url::parse("https://x/y/clip.MOV?sig=abc").unwrap();
        assert_eq!(extension_of(&url), Some("MOV"));
        let url = Url::parse("https://x/y/stream").unwrap();
        assert_eq!(extension_of(&url), None);
    }

    #[tokio::test]
    async fn extensionless_input_is_saved_as_mp4() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/render/42"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tts/42"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"voice".to_vec()))
            .mount(&server)
            .await;

        let (_root, ws, fetcher) = setup();
        let cancel = CancellationToken::new();

        let input_url = format!("{}/render/42", server.uri());
        let input = fetcher
            .resolve(Some(&input_url), "input", &ws, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(input.extension().unwrap(), "mp4");

        let voice_url = format!("{}/tts/42", server.uri());
        let voice = fetcher
            .resolve(Some(&voice_url), "voiceover", &ws, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(voice.extension().unwrap(), "dat");
    }

    #[tokio::test]
    async fn empty_reference_is_none() {
        let (_root, ws, fetcher) = setup();
        let cancel = CancellationToken::new();
        assert!(fetcher.resolve(None, "music", &ws, &cancel).await.unwrap().is_none());
        assert!(fetcher.resolve(Some("  "), "music", &ws, &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_path_is_used_in_place() {
        let (root, ws, fetcher) = setup();
        let local = root.path().join("in.mp4");
        std::fs::write(&local, b"video").unwrap();

        let resolved = fetcher
            .resolve(local.to_str(), "video", &ws, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved, Some(local));
        assert_eq!(std::fs::read_dir(ws.dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_local_path_is_invalid() {
        let (_root, ws, fetcher) = setup();
        let err = fetcher
            .resolve(Some("/nonexistent/in.mp4"), "video", &ws, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn downloads_once_per_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/bg.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 music".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let (_root, ws, fetcher) = setup();
        let url = format!("{}/media/bg.mp3", server.uri());
        let cancel = CancellationToken::new();

        let first = fetcher
            .resolve(Some(&url), "music", &ws, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert!(ws.contains(&first));
        assert_eq!(first.extension().unwrap(), "mp3");
        assert_eq!(std::fs::read(&first).unwrap(), b"ID3 music");

        let second = fetcher
            .resolve(Some(&url), "music", &ws, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn http_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (_root, ws, fetcher) = setup();
        let url = format!("{}/missing.mp4", server.uri());
        let err = fetcher
            .resolve(Some(&url), "video", &ws, &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            Error::Fetch { reference, message } => {
                assert_eq!(reference, &url);
                assert!(message.contains("404"), "got: {message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_transient());
        assert_eq!(std::fs::read_dir(ws.dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cancellation_stops_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"slow".to_vec())
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let (_root, ws, fetcher) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let url = format!("{}/slow.mp4", server.uri());
        let err = fetcher
            .resolve(Some(&url), "video", &ws, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(ws.fetched(&url).is_none());
    }
}
