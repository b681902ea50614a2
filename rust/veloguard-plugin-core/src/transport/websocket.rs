//! WebSocket Transport - header sets for the HTTP upgrade
//!
//! A listening side answers with headers that look like a CDN edge serving a
//! static file. A connecting side presents a browser User-Agent.

use base64::Engine as _;
use serde::Serialize;

/// Default browser identity for the client upgrade request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36 Edg/129.0.0.0";

/// Decoy response headers presented by the listening side, after `Host`.
const SERVER_DECOY_HEADERS: [(&str, &str); 3] = [
    ("content-type", "application/vnd.ms-cab-compressed"),
    ("server", "ECAcc (lac/55D2)"),
    ("etag", "80b93e24a2b0d71:0"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// WebSocket transport configuration. Header order is preserved on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebSocketSettings {
    pub path: String,
    pub headers: Vec<Header>,
}

impl WebSocketSettings {
    pub fn server(path: &str, host: &str) -> Self {
        let mut headers = Vec::with_capacity(SERVER_DECOY_HEADERS.len() + 1);
        headers.push(Header::new("Host", host));
        headers.extend(
            SERVER_DECOY_HEADERS
                .iter()
                .map(|(name, value)| Header::new(*name, *value)),
        );

        Self {
            path: path.to_string(),
            headers,
        }
    }

    /// `user_agent` is base64 (standard alphabet). An undecodable value is
    /// reported and replaced by [`DEFAULT_USER_AGENT`].
    pub fn client(path: &str, host: &str, user_agent: Option<&str>) -> Self {
        let ua = user_agent
            .and_then(decode_user_agent)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Self {
            path: path.to_string(),
            headers: vec![Header::new("Host", host), Header::new("User-Agent", ua)],
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

fn decode_user_agent(encoded: &str) -> Option<String> {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Can not decode provided useragent, using default: {}", e);
            return None;
        }
    };

    match String::from_utf8(bytes) {
        Ok(ua) => Some(ua),
        Err(_) => {
            tracing::warn!("Decoded useragent is not valid UTF-8, using default");
            None
        }
    }
}
