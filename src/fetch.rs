use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{info, warn};

const NAME_LEN: usize = 10;
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(u16),
    #[error("content is not HTML ({0})")]
    NotHtml(String),
    #[error("failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads a resource and stores it locally.
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<PathBuf, FetchError>;
}

/// Stores HTML responses under `dir` as `<random>.htm`.
pub struct HttpFetcher {
    client: reqwest::Client,
    dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status.as_u16() != 200 {
            return Err(FetchError::Status(status.as_u16()));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_html(&content_type) {
            return Err(FetchError::NotHtml(content_type));
        }

        let body = resp.bytes().await?;
        let path = self.dir.join(random_file_name("htm"));
        tokio::fs::write(&path, &body).await?;
        info!(url = %url, path = %path.display(), bytes = body.len(), "downloaded document");
        Ok(path)
    }
}

/// Fetch and swallow the error, as the crawl treats downloads as optional.
pub async fn download_or_skip<F: Fetch>(fetcher: &F, url: &str) -> Option<PathBuf> {
    match fetcher.fetch(url).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(url = %url, "download failed: {}", e);
            None
        }
    }
}

fn is_html(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

/// Ten random alphanumerics, plus `.ext` when an extension is given.
pub fn random_file_name(extension: &str) -> String {
    let stem: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_LEN)
        .map(char::from)
        .collect();
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// Make sure an output directory exists.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Answers one HTTP request on a local port with `status`, `content_type` and
/// `body`, then closes. Returns the base URL.
#[cfg(test)]
pub(crate) async fn serve_once(status: &str, content_type: &str, body: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    format!("http://{}", addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_names_have_fixed_shape() {
        let name = random_file_name("htm");
        let (stem, ext) = name.split_once('.').unwrap();
        assert_eq!(ext, "htm");
        assert_eq!(stem.len(), NAME_LEN);
        assert!(stem.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(random_file_name("").len(), NAME_LEN);
        assert_ne!(random_file_name("htm"), random_file_name("htm"));
    }

    #[test]
    fn html_content_types() {
        assert!(is_html("text/html; charset=UTF-8"));
        assert!(is_html("Text/HTML"));
        assert!(!is_html("application/pdf"));
        assert!(!is_html(""));
    }

    #[tokio::test]
    async fn html_response_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("200 OK", "text/html; charset=utf-8", "<p>Rule text</p>").await;
        let fetcher = HttpFetcher::new(dir.path()).unwrap();

        let path = fetcher.fetch(&format!("{}/doc", base)).await.unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("htm"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>Rule text</p>");
    }

    #[tokio::test]
    async fn non_200_status_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("404 Not Found", "text/html", "gone").await;
        let fetcher = HttpFetcher::new(dir.path()).unwrap();

        let err = fetcher.fetch(&format!("{}/doc", base)).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn non_html_content_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("200 OK", "application/pdf", "%PDF-1.4").await;
        let fetcher = HttpFetcher::new(dir.path()).unwrap();

        let err = fetcher.fetch(&format!("{}/doc.pdf", base)).await.unwrap_err();
        assert!(matches!(err, FetchError::NotHtml(ref ct) if ct == "application/pdf"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_download_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("500 Internal Server Error", "text/html", "oops").await;
        let fetcher = HttpFetcher::new(dir.path()).unwrap();

        assert_eq!(download_or_skip(&fetcher, &format!("{}/doc", base)).await, None);
    }
}
