//! Streaming downloads requested by `POL_SetupWindow_download`.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

/// Progress reported back to the UI loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DownloadEvent {
    Progress {
        win: String,
        received: u64,
        total: Option<u64>,
    },
    Finished {
        win: String,
    },
    Failed {
        win: String,
        error: String,
    },
}

/// Run one download in the background, reporting on `events`.
pub(crate) fn spawn_download(
    client: reqwest::Client,
    win: String,
    url: String,
    path: PathBuf,
    events: mpsc::UnboundedSender<DownloadEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let span = info_span!("download", window = %win, %url);
    tokio::spawn(
        async move {
            let outcome = tokio::select! {
                () = cancel.cancelled() => Err(anyhow::anyhow!("cancelled")),
                outcome = fetch(&client, &win, &url, &path, &events) => outcome,
            };
            let event = match outcome {
                Ok(received) => {
                    info!(received, path = %path.display(), "download finished");
                    DownloadEvent::Finished { win }
                }
                Err(error) => {
                    let error = format!("{error:#}");
                    warn!(%error, "download failed");
                    DownloadEvent::Failed { win, error }
                }
            };
            let _ = events.send(event);
        }
        .instrument(span),
    )
}

async fn fetch(
    client: &reqwest::Client,
    win: &str,
    url: &str,
    path: &Path,
    events: &mpsc::UnboundedSender<DownloadEvent>,
) -> Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to request {url}"))?
        .error_for_status()
        .with_context(|| format!("server refused {url}"))?;
    let total = response.content_length();

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut stream = response.bytes_stream();
    let mut received = 0u64;

    let _ = events.send(DownloadEvent::Progress {
        win: win.to_owned(),
        received,
        total,
    });
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("download interrupted")?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        received += chunk.len() as u64;
        let _ = events.send(DownloadEvent::Progress {
            win: win.to_owned(),
            received,
            total,
        });
    }
    file.flush()
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(received)
}

/// Whole percent of `received` over `total`, when the size is known.
pub(crate) fn percent(received: u64, total: Option<u64>) -> Option<u8> {
    let total = total.filter(|t| *t > 0)?;
    let pct = received.saturating_mul(100) / total;
    Some(u8::try_from(pct.min(100)).unwrap_or(100))
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a loopback port.
    async fn http_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/setup.exe")
    }

    async fn run(url: String, path: PathBuf) -> Vec<DownloadEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_download(
            reqwest::Client::new(),
            "42".into(),
            url,
            path,
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn download_writes_file_and_reports_progress() {
        let url = http_once("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello").await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/setup.exe");

        let events = run(url, path.clone()).await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        assert_eq!(events.last().unwrap(), &DownloadEvent::Finished { win: "42".into() });
        assert!(events.contains(&DownloadEvent::Progress {
            win: "42".into(),
            received: 5,
            total: Some(5),
        }));
    }

    #[tokio::test]
    async fn http_error_is_reported_as_failure() {
        let url = http_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let dir = tempfile::tempdir().unwrap();

        let events = run(url, dir.path().join("x")).await;
        match events.last().unwrap() {
            DownloadEvent::Failed { win, error } => {
                assert_eq!(win, "42");
                assert!(error.contains("404"), "{error}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn percent_is_clamped_and_optional() {
        assert_eq!(percent(50, Some(200)), Some(25));
        assert_eq!(percent(300, Some(200)), Some(100));
        assert_eq!(percent(10, None), None);
        assert_eq!(percent(10, Some(0)), None);
    }
}
