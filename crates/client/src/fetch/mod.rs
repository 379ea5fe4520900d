//! Network fetch primitive.
//!
//! [`Fetcher`] is the seam the strategies fetch through. It rejects only when
//! no response arrives (connection failure, timeout, oversize body); HTTP
//! error statuses come back as ordinary responses so the strategies can
//! decide what to do with them.
//!
//! [`HttpFetcher`] is the reqwest-backed implementation:
//! - rustls TLS, gzip/brotli/deflate decoding
//! - Per-request timeout (default: 20s)
//! - Max redirects: 5
//! - Max body bytes: unlimited unless configured, since episodes run long

pub mod url;

use bytes::Bytes;
use dougcast_core::{AppConfig, Error, Method, Request, RequestMode, Response, ResponseType};
use reqwest::{Client, header, header::HeaderMap};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use url::{UrlError, is_same_origin, resolve_asset};

/// The network side of every strategy.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform one network attempt for `request`.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "dougcast-sw/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes, 0 for no limit (default: 0)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "dougcast-sw/0.1".to_string(),
            max_bytes: 0,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn check_size(&self, len: usize) -> Result<(), Error> {
        if self.config.max_bytes > 0 && len > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }
        Ok(())
    }
}

fn to_reqwest_method(method: &Method) -> Result<reqwest::Method, Error> {
    Ok(match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Other(name) => reqwest::Method::from_bytes(name.as_bytes())
            .map_err(|e| Error::Network(format!("invalid method {name}: {e}")))?,
    })
}

/// Flatten a header map, joining repeated values with `, `.
///
/// `set-cookie` is dropped; pages never see it on a fetched response.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        if *name == header::SET_COOKIE {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

fn map_send_error(url: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = request.url.as_str();

        let mut builder = self.http.request(to_reqwest_method(&request.method)?, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| map_send_error(url, e))?;

        let status = response.status();

        if let Some(len) = response.content_length() {
            self.check_size(usize::try_from(len).unwrap_or(usize::MAX))?;
        }

        let final_url = response.url().to_string();
        let headers = collect_headers(response.headers());

        let bytes: Bytes = response.bytes().await.map_err(|e| map_send_error(url, e))?;

        self.check_size(bytes.len())?;

        let response_type = match request.mode {
            RequestMode::SameOrigin | RequestMode::Navigate => ResponseType::Basic,
            RequestMode::Cors | RequestMode::NoCors => ResponseType::Cors,
        };

        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            content_type = headers.get(header::CONTENT_TYPE.as_str()).map(String::as_str),
            "fetched"
        );

        let mut out = Response::new(status.as_u16(), bytes).with_type(response_type).with_url(final_url);
        if let Some(reason) = status.canonical_reason() {
            out.status_text = reason.to_string();
        }
        out.headers = headers;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "dougcast-sw/0.1");
        assert_eq!(config.max_bytes, 0);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "custom/1".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "custom/1");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(&Method::Get).unwrap(), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(&Method::Post).unwrap(), reqwest::Method::POST);
        assert_eq!(to_reqwest_method(&Method::Other("PROPFIND".into())).unwrap().as_str(), "PROPFIND");
        assert!(to_reqwest_method(&Method::Other("BAD METHOD".into())).is_err());
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append(header::LINK, header::HeaderValue::from_static("<a.js>; rel=preload"));
        headers.append(header::LINK, header::HeaderValue::from_static("<b.js>; rel=preload"));
        headers.append(header::SET_COOKIE, header::HeaderValue::from_static("session=1"));
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_bytes(b"audio/mpeg; name=\xe9").unwrap());

        let flat = collect_headers(&headers);
        assert_eq!(flat.get("link").map(String::as_str), Some("<a.js>; rel=preload, <b.js>; rel=preload"));
        assert!(!flat.contains_key("set-cookie"));
        assert!(flat.get("content-type").is_some_and(|v| v.starts_with("audio/mpeg")));
    }

    /// Serve one canned response on a loopback port and return its URL.
    async fn serve_once(body: &'static [u8]) -> ::url::Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
        });
        ::url::Url::parse(&format!("http://{addr}/episode.mp3")).unwrap()
    }

    #[tokio::test]
    async fn test_default_config_accepts_any_body_size() {
        let url = serve_once(&[0u8; 256 * 1024]).await;
        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        let response = fetcher.fetch(&Request::get(url)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), 256 * 1024);
    }

    #[tokio::test]
    async fn test_configured_limit_rejects_large_body() {
        let url = serve_once(b"0123456789").await;
        let fetcher = HttpFetcher::new(FetchConfig { max_bytes: 4, ..Default::default() }).unwrap();
        let err = fetcher.fetch(&Request::get(url)).await.unwrap_err();
        assert_eq!(err.code(), "FETCH_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_http_fetcher_new() {
        let fetcher = HttpFetcher::new(FetchConfig::default());
        assert!(fetcher.is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let fetcher = HttpFetcher::new(FetchConfig { timeout: Duration::from_secs(2), ..Default::default() }).unwrap();
        let request = Request::get(::url::Url::parse("http://127.0.0.1:9/unreachable").unwrap());
        let err = fetcher.fetch(&request).await.unwrap_err();
        assert!(err.is_network());
    }
}
