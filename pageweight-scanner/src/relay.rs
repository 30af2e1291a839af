// Relay catalog: interchangeable intermediaries used to reach a target URL

use crate::error::{Result, ScanError};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use url::form_urlencoded;

/// Builds the request URL for a relay from the target URL.
pub type UrlBuilder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Extracts the target's bytes from a relay response body.
pub type Unwrapper = fn(Vec<u8>) -> Result<Vec<u8>>;

/// One relay: a URL template plus an optional response unwrapper.
///
/// Relays form a plain ordered list; failover is index arithmetic over it.
#[derive(Clone)]
pub struct RelayProfile {
    pub name: String,
    build: UrlBuilder,
    unwrap: Option<Unwrapper>,
    pub needs_authorization: bool,
}

impl RelayProfile {
    pub fn new(name: impl Into<String>, build: UrlBuilder) -> Self {
        Self {
            name: name.into(),
            build,
            unwrap: None,
            needs_authorization: false,
        }
    }

    /// Relay reached by appending the percent-encoded target to `prefix`.
    pub fn prefixed(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(
            name,
            Arc::new(move |target: &str| format!("{}{}", prefix, encode(target))),
        )
    }

    /// No intermediary: the target is requested as is.
    pub fn direct() -> Self {
        Self::new("direct", Arc::new(|target: &str| target.to_string()))
    }

    pub fn with_unwrapper(mut self, unwrap: Unwrapper) -> Self {
        self.unwrap = Some(unwrap);
        self
    }

    /// Mark the relay as requiring a manual opt-in (e.g. a demo access page).
    pub fn requiring_authorization(mut self) -> Self {
        self.needs_authorization = true;
        self
    }

    pub fn request_url(&self, target: &str) -> String {
        (self.build)(target)
    }

    pub fn unwrap_body(&self, body: Vec<u8>) -> Result<Vec<u8>> {
        match self.unwrap {
            Some(unwrap) => unwrap(body),
            None => Ok(body),
        }
    }
}

impl fmt::Debug for RelayProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayProfile")
            .field("name", &self.name)
            .field("unwraps", &self.unwrap.is_some())
            .field("needs_authorization", &self.needs_authorization)
            .finish()
    }
}

fn encode(target: &str) -> String {
    form_urlencoded::byte_serialize(target.as_bytes()).collect()
}

#[derive(Deserialize)]
struct JsonEnvelope {
    contents: Option<String>,
}

/// Unwrap `{"contents": "..."}` envelopes returned by JSON relays.
pub fn unwrap_json_contents(body: Vec<u8>) -> Result<Vec<u8>> {
    let envelope: JsonEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ScanError::Relay(format!("invalid JSON envelope: {}", e)))?;
    envelope
        .contents
        .map(String::into_bytes)
        .ok_or_else(|| ScanError::Relay("JSON envelope has no contents".to_string()))
}

/// The built-in relay list, in failover order.
pub fn catalog() -> Vec<RelayProfile> {
    vec![
        RelayProfile::direct(),
        RelayProfile::prefixed("allorigins", "https://api.allorigins.win/raw?url="),
        RelayProfile::prefixed("allorigins-json", "https://api.allorigins.win/get?url=")
            .with_unwrapper(unwrap_json_contents),
        RelayProfile::prefixed("corsproxy", "https://corsproxy.io/?url="),
        RelayProfile::prefixed("codetabs", "https://api.codetabs.com/v1/proxy?quest="),
        RelayProfile::new(
            "cors-anywhere",
            Arc::new(|target: &str| format!("https://cors-anywhere.herokuapp.com/{}", target)),
        )
        .requiring_authorization(),
    ]
}

/// Catalog entries matching `names`, in the order the names were given.
pub fn select(names: &[String]) -> Result<Vec<RelayProfile>> {
    let available = catalog();
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|relay| relay.name.eq_ignore_ascii_case(name))
                .cloned()
                .ok_or_else(|| ScanError::Config(format!("unknown relay '{}'", name)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_relay_encodes_target() {
        let relay = RelayProfile::prefixed("raw", "https://relay.test/raw?url=");
        assert_eq!(
            relay.request_url("https://example.com/a b.js?x=1&y=2"),
            "https://relay.test/raw?url=https%3A%2F%2Fexample.com%2Fa+b.js%3Fx%3D1%26y%3D2"
        );
    }

    #[test]
    fn test_direct_relay_is_identity() {
        let relay = RelayProfile::direct();
        assert_eq!(relay.request_url("https://example.com/"), "https://example.com/");
        assert_eq!(relay.unwrap_body(b"abc".to_vec()).unwrap(), b"abc");
    }

    #[test]
    fn test_json_unwrapper() {
        let body = br#"{"contents":"<html>hi</html>","status":{"http_code":200}}"#.to_vec();
        assert_eq!(unwrap_json_contents(body).unwrap(), b"<html>hi</html>");

        let err = unwrap_json_contents(b"not json".to_vec()).unwrap_err();
        assert!(matches!(err, ScanError::Relay(_)));

        let err = unwrap_json_contents(br#"{"contents":null}"#.to_vec()).unwrap_err();
        assert!(matches!(err, ScanError::Relay(_)));
    }

    #[test]
    fn test_catalog_order_and_flags() {
        let relays = catalog();
        let names: Vec<&str> = relays.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "direct",
                "allorigins",
                "allorigins-json",
                "corsproxy",
                "codetabs",
                "cors-anywhere"
            ]
        );
        assert!(relays.last().unwrap().needs_authorization);
        assert!(relays[..5].iter().all(|r| !r.needs_authorization));
    }

    #[test]
    fn test_select_by_name() {
        let relays = select(&["CodeTabs".to_string(), "direct".to_string()]).unwrap();
        assert_eq!(relays[0].name, "codetabs");
        assert_eq!(relays[1].name, "direct");

        assert!(matches!(
            select(&["nope".to_string()]),
            Err(ScanError::Config(_))
        ));
    }
}
