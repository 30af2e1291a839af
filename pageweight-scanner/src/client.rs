use crate::config::FetchConfig;
use crate::error::{Result, ScanError};
use crate::relay::RelayProfile;
use crate::result::Document;
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Number of relay errors kept in a `FetchFailed` message.
const REPORTED_RELAY_ERRORS: usize = 3;

/// Fetches documents and resource sizes, directly or through relays.
///
/// The size cache and the preferred relay pointer belong to one client
/// instance, so independent analyses never share state.
pub struct FetchClient {
    client: Client,
    config: FetchConfig,
    relays: Vec<RelayProfile>,
    preferred: AtomicUsize,
    size_cache: Mutex<HashMap<String, u64>>,
    last_request: Mutex<Option<Instant>>,
}

impl FetchClient {
    pub fn new(config: FetchConfig, relays: Vec<RelayProfile>) -> Result<Self> {
        if relays.is_empty() {
            return Err(ScanError::NoRelays);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(50) // Connection pooling
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            config,
            relays,
            preferred: AtomicUsize::new(0),
            size_cache: Mutex::new(HashMap::new()),
            last_request: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn relays(&self) -> &[RelayProfile] {
        &self.relays
    }

    /// The relay the next request will start from.
    pub fn preferred_relay(&self) -> &RelayProfile {
        let idx = match self.current_relay() {
            Some((_, idx)) => idx,
            None => self.preferred.load(Ordering::Relaxed),
        };
        &self.relays[idx % self.relays.len()]
    }

    /// Fetch the full content of the root document.
    ///
    /// Relays are tried round-robin from the preferred one; the first relay
    /// that succeeds becomes the preferred relay.
    pub async fn fetch_document(&self, url: &str) -> Result<Document> {
        info!("Fetching document {}", url);

        let start = self.preferred.load(Ordering::Relaxed);
        let mut errors = Vec::new();

        for idx in self.rotation(start) {
            let relay = &self.relays[idx];
            self.pace(self.config.document_request_delay).await;

            match self.relay_get(relay, url, self.config.document_timeout).await {
                Ok(body) => {
                    self.preferred.store(idx, Ordering::Relaxed);
                    let size_bytes = body.len() as u64;
                    info!(
                        "Fetched document {} via {} ({} bytes)",
                        url, relay.name, size_bytes
                    );
                    return Ok(Document {
                        url: url.to_string(),
                        content: String::from_utf8_lossy(&body).into_owned(),
                        size_bytes,
                        relay: relay.name.clone(),
                    });
                }
                Err(e) => {
                    warn!("Relay {} failed for {}: {}", relay.name, url, e);
                    errors.push(format!("{}: {}", relay.name, e));
                }
            }
        }

        if errors.is_empty() {
            return Err(ScanError::NoRelays);
        }

        let recent = &errors[errors.len().saturating_sub(REPORTED_RELAY_ERRORS)..];
        Err(ScanError::FetchFailed {
            url: url.to_string(),
            errors: recent.join("; "),
        })
    }

    /// Byte size of a resource, or 0 when every attempt failed.
    ///
    /// Results (including failures) are cached per URL until `clear_cache`.
    pub async fn fetch_size(&self, url: &str) -> u64 {
        if let Some(size) = self.cached_size(url).await {
            debug!("Cache hit for {} ({} bytes)", url, size);
            return size;
        }

        if self.config.direct_probe
            && let Some(size) = self.probe_direct(url).await
        {
            debug!("Direct probe for {}: {} bytes", url, size);
            self.remember(url, size).await;
            return size;
        }

        let max_retries = self.config.max_retries;
        for attempt in 0..=max_retries {
            let Some((stored, idx)) = self.current_relay() else {
                break;
            };
            let relay = &self.relays[idx];
            self.pace(self.config.min_request_delay).await;

            match self.relay_get(relay, url, self.config.relay_timeout).await {
                Ok(body) => {
                    let size = body.len() as u64;
                    debug!("Fetched {} via {} ({} bytes)", url, relay.name, size);
                    self.remember(url, size).await;
                    return size;
                }
                Err(e) => {
                    self.advance_relay(stored, idx);

                    if attempt == max_retries {
                        warn!(
                            "Giving up on {} after {} attempts: {}",
                            url,
                            attempt + 1,
                            e
                        );
                        break;
                    }

                    let delay = self.retry_delay(&e, attempt);
                    warn!(
                        "Attempt {}/{} for {} via {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        url,
                        relay.name,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // Zero marks a failed fetch so the same run does not retry it.
        self.remember(url, 0).await;
        0
    }

    pub async fn cached_size(&self, url: &str) -> Option<u64> {
        self.size_cache.lock().await.get(url).copied()
    }

    pub async fn cache_len(&self) -> usize {
        self.size_cache.lock().await.len()
    }

    /// Forget every cached size. Call before each new analysis.
    pub async fn clear_cache(&self) {
        let mut cache = self.size_cache.lock().await;
        let removed = cache.len();
        cache.clear();
        debug!("Size cache cleared ({} entries)", removed);
    }

    async fn remember(&self, url: &str, size: u64) {
        self.size_cache.lock().await.insert(url.to_string(), size);
    }

    fn usable(&self, idx: usize) -> bool {
        !self.relays[idx].needs_authorization || self.config.allow_manual_relays
    }

    /// Usable relay indices, starting at `start` and wrapping around once.
    fn rotation(&self, start: usize) -> impl Iterator<Item = usize> + '_ {
        let count = self.relays.len();
        (0..count)
            .map(move |offset| (start + offset) % count)
            .filter(|idx| self.usable(*idx))
    }

    /// The stored pointer and the usable relay it resolves to.
    fn current_relay(&self) -> Option<(usize, usize)> {
        let stored = self.preferred.load(Ordering::Relaxed);
        self.rotation(stored).next().map(|idx| (stored, idx))
    }

    /// Point past `failed` to the next usable relay, unless another task
    /// moved the pointer away from `stored` in the meantime.
    fn advance_relay(&self, stored: usize, failed: usize) {
        let next = self.rotation(failed + 1).next().unwrap_or(failed);
        let _ = self
            .preferred
            .compare_exchange(stored, next, Ordering::Relaxed, Ordering::Relaxed);
    }

    /// 429 backs off exponentially, anything else linearly.
    fn retry_delay(&self, error: &ScanError, attempt: u32) -> Duration {
        if error.is_rate_limited() {
            self.config.rate_limit_delay(attempt)
        } else {
            self.config.failure_delay(attempt)
        }
    }

    /// Keep at least `min_delay` between consecutive requests across all tasks.
    async fn pace(&self, min_delay: Duration) {
        let wait = {
            let mut last = self.last_request.lock().await;
            let now = Instant::now();
            let slot = match *last {
                Some(previous) => (previous + min_delay).max(now),
                None => now,
            };
            *last = Some(slot);
            slot - now
        };

        if !wait.is_zero() {
            debug!("Rate limiting: waiting {:?} before next request", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// HEAD the resource itself and read its Content-Length.
    async fn probe_direct(&self, url: &str) -> Option<u64> {
        let response = match self
            .client
            .head(url)
            .timeout(self.config.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Direct probe failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("Direct probe for {} returned {}", url, response.status());
            return None;
        }

        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|size| *size > 0);

        if size.is_none() {
            debug!("Direct probe for {} had no usable content-length", url);
        }
        size
    }

    async fn relay_get(
        &self,
        relay: &RelayProfile,
        target: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let request_url = relay.request_url(target);
        debug!("GET {} via {}", target, relay.name);

        let response = self
            .client
            .get(&request_url)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                status: status.as_u16(),
                url: request_url,
            });
        }

        let body = response.bytes().await?;
        relay.unwrap_body(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::unwrap_json_contents;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn fast_config() -> FetchConfig {
        FetchConfig {
            document_request_delay: Duration::ZERO,
            min_request_delay: Duration::ZERO,
            rate_limit_backoff: Duration::from_millis(10),
            max_rate_limit_backoff: Duration::from_millis(20),
            failure_backoff: Duration::from_millis(5),
            direct_probe: false,
            ..FetchConfig::default()
        }
    }

    fn relay_at(server: &MockServer, name: &str) -> RelayProfile {
        RelayProfile::prefixed(name, format!("{}/{}?url=", server.uri(), name))
    }

    #[tokio::test]
    async fn test_new_rejects_empty_relay_list() {
        let result = FetchClient::new(fast_config(), Vec::new());
        assert!(matches!(result, Err(ScanError::NoRelays)));
    }

    #[tokio::test]
    async fn test_fetch_document_fails_over_and_prefers_working_relay() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/working"))
            .and(query_param("url", "https://example.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = FetchClient::new(
            fast_config(),
            vec![
                relay_at(&mock_server, "broken"),
                relay_at(&mock_server, "working"),
            ],
        )
        .unwrap();

        let document = client.fetch_document("https://example.com/").await.unwrap();
        assert_eq!(document.content, "<html>hello</html>");
        assert_eq!(document.size_bytes, 18);
        assert_eq!(document.relay, "working");
        assert_eq!(client.preferred_relay().name, "working");

        // The second fetch starts at the working relay and never touches the broken one.
        client.fetch_document("https://example.com/").await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_document_aggregates_errors_when_all_relays_fail() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = FetchClient::new(
            fast_config(),
            vec![
                relay_at(&mock_server, "first"),
                relay_at(&mock_server, "second"),
            ],
        )
        .unwrap();

        let err = client
            .fetch_document("https://example.com/")
            .await
            .unwrap_err();
        match err {
            ScanError::FetchFailed { url, errors } => {
                assert_eq!(url, "https://example.com/");
                assert!(errors.contains("first"), "errors: {}", errors);
                assert!(errors.contains("second"), "errors: {}", errors);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_document_unwraps_json_relay() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"contents":"<p>wrapped</p>"}"#),
            )
            .mount(&mock_server)
            .await;

        let relay = relay_at(&mock_server, "get").with_unwrapper(unwrap_json_contents);
        let client = FetchClient::new(fast_config(), vec![relay]).unwrap();

        let document = client.fetch_document("https://example.com/").await.unwrap();
        assert_eq!(document.content, "<p>wrapped</p>");
        assert_eq!(document.size_bytes, 14);
    }

    #[tokio::test]
    async fn test_manual_relays_are_skipped_by_default() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/manual"))
            .respond_with(ResponseTemplate::new(200).set_body_string("manual"))
            .expect(0)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/open"))
            .respond_with(ResponseTemplate::new(200).set_body_string("open"))
            .mount(&mock_server)
            .await;

        let client = FetchClient::new(
            fast_config(),
            vec![
                relay_at(&mock_server, "manual").requiring_authorization(),
                relay_at(&mock_server, "open"),
            ],
        )
        .unwrap();

        let document = client.fetch_document("https://example.com/").await.unwrap();
        assert_eq!(document.relay, "open");
    }

    #[tokio::test]
    async fn test_fetch_size_is_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 4096]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client =
            FetchClient::new(fast_config(), vec![relay_at(&mock_server, "relay")]).unwrap();

        let url = "https://example.com/app.js";
        assert_eq!(client.fetch_size(url).await, 4096);
        assert_eq!(client.fetch_size(url).await, 4096);
        assert_eq!(client.cached_size(url).await, Some(4096));
        assert_eq!(client.cache_len().await, 1);
    }

    #[tokio::test]
    async fn test_fetch_size_uses_direct_probe_first() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/img/logo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-length", "2048")
                    .set_body_bytes(vec![0u8; 2048]),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 10]))
            .expect(0)
            .mount(&mock_server)
            .await;

        let config = FetchConfig {
            direct_probe: true,
            ..fast_config()
        };
        let client = FetchClient::new(config, vec![relay_at(&mock_server, "relay")]).unwrap();

        let url = format!("{}/img/logo.png", mock_server.uri());
        assert_eq!(client.fetch_size(&url).await, 2048);
    }

    #[tokio::test]
    async fn test_fetch_size_falls_back_to_relay_when_probe_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/blocked.css"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 321]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = FetchConfig {
            direct_probe: true,
            ..fast_config()
        };
        let client = FetchClient::new(config, vec![relay_at(&mock_server, "relay")]).unwrap();

        let url = format!("{}/blocked.css", mock_server.uri());
        assert_eq!(client.fetch_size(&url).await, 321);
    }

    #[tokio::test]
    async fn test_rate_limited_fetch_retries_then_caches_zero() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&mock_server)
            .await;

        let config = FetchConfig {
            rate_limit_backoff: Duration::from_millis(100),
            max_rate_limit_backoff: Duration::from_millis(150),
            failure_backoff: Duration::from_millis(1),
            ..fast_config()
        };
        let client = FetchClient::new(config, vec![relay_at(&mock_server, "relay")]).unwrap();

        let url = "https://example.com/busy.png";
        let started = Instant::now();
        assert_eq!(client.fetch_size(url).await, 0);
        // 100ms then the 150ms cap, nothing after the last attempt
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert_eq!(client.cached_size(url).await, Some(0));

        // Negative result is memoized: no fourth request.
        assert_eq!(client.fetch_size(url).await, 0);
    }

    #[tokio::test]
    async fn test_fetch_size_rotates_relays_on_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 77]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = FetchClient::new(
            fast_config(),
            vec![relay_at(&mock_server, "down"), relay_at(&mock_server, "up")],
        )
        .unwrap();

        assert_eq!(client.fetch_size("https://example.com/a.woff2").await, 77);
        assert_eq!(client.preferred_relay().name, "up");
    }

    #[tokio::test]
    async fn test_server_errors_use_failure_backoff() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let config = FetchConfig {
            rate_limit_backoff: Duration::from_secs(2),
            max_rate_limit_backoff: Duration::from_secs(2),
            failure_backoff: Duration::from_millis(1),
            ..fast_config()
        };
        let client = FetchClient::new(config, vec![relay_at(&mock_server, "relay")]).unwrap();

        let started = Instant::now();
        assert_eq!(client.fetch_size("https://example.com/err.css").await, 0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_retry_delay_depends_on_error_kind() {
        let client = FetchClient::new(fast_config(), vec![RelayProfile::direct()]).unwrap();
        let rate_limited = ScanError::Status {
            status: 429,
            url: "https://relay.test/".to_string(),
        };
        let unavailable = ScanError::Status {
            status: 503,
            url: "https://relay.test/".to_string(),
        };

        assert_eq!(client.retry_delay(&rate_limited, 0), Duration::from_millis(10));
        assert_eq!(client.retry_delay(&rate_limited, 1), Duration::from_millis(20));
        assert_eq!(client.retry_delay(&unavailable, 0), Duration::from_millis(5));
        assert_eq!(client.retry_delay(&unavailable, 1), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_rotation_skips_manual_relays_after_failure() {
        let mock_server = MockServer::start().await;

        for name in ["bad1", "bad2"] {
            Mock::given(method("GET"))
                .and(path(format!("/{}", name)))
                .respond_with(ResponseTemplate::new(503))
                .expect(1)
                .mount(&mock_server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/manual"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 9]))
            .expect(0)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/good"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 42]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = FetchClient::new(
            fast_config(),
            vec![
                relay_at(&mock_server, "bad1"),
                relay_at(&mock_server, "manual").requiring_authorization(),
                relay_at(&mock_server, "bad2"),
                relay_at(&mock_server, "good"),
            ],
        )
        .unwrap();

        assert_eq!(client.fetch_size("https://example.com/a.js").await, 42);
        assert_eq!(client.preferred_relay().name, "good");

        let paths: Vec<String> = mock_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| request.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/bad1", "/bad2", "/good"]);
    }

    #[tokio::test]
    async fn test_preferred_relay_never_reports_manual_relay() {
        let client = FetchClient::new(
            fast_config(),
            vec![
                RelayProfile::prefixed("open", "https://open.test/?url="),
                RelayProfile::prefixed("manual", "https://manual.test/?url=")
                    .requiring_authorization(),
            ],
        )
        .unwrap();

        client.preferred.store(1, Ordering::Relaxed);
        assert_eq!(client.preferred_relay().name, "open");

        // A failure on the relay the pointer resolved to wraps past the manual one.
        client.advance_relay(1, 0);
        assert_eq!(client.preferred.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'z'; 12]))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client =
            FetchClient::new(fast_config(), vec![relay_at(&mock_server, "relay")]).unwrap();

        let url = "https://example.com/x.svg";
        assert_eq!(client.fetch_size(url).await, 12);
        client.clear_cache().await;
        assert_eq!(client.cache_len().await, 0);
        assert_eq!(client.fetch_size(url).await, 12);
    }

    #[tokio::test]
    async fn test_pace_spaces_requests() {
        let client = FetchClient::new(fast_config(), vec![RelayProfile::direct()]).unwrap();
        let started = Instant::now();

        for _ in 0..3 {
            client.pace(Duration::from_millis(40)).await;
        }

        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
