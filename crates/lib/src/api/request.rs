//! Request and response shapes exchanged with the M2X API.

use serde_json::Value;
use std::fmt;

/// HTTP verb of an M2X endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_method(self) -> reqwest::Method {
        match self {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Put => reqwest::Method::PUT,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// A fully bound request: path segments are unescaped; the client encodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub verb: Verb,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Path relative to the API endpoint, e.g. `/devices/abc123`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Blank, `.` and `..` segments would be dropped or resolved away by URL
/// normalization and address a different resource.
pub(crate) fn is_relative_segment(segment: &str) -> bool {
    matches!(segment.trim(), "" | "." | "..")
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.path())
    }
}

/// Response from the API: status, raw body text and the body parsed as JSON when it is JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub raw: String,
    pub json: Option<Value>,
}

impl ApiResponse {
    pub fn new(status: u16, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let json = if raw.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&raw).ok()
        };
        Self { status, raw, json }
    }

    pub fn from_json(status: u16, body: Value) -> Self {
        Self {
            status,
            raw: body.to_string(),
            json: Some(body),
        }
    }

    /// M2X reports failures with 4xx/5xx statuses.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// True when there is a body that could not be parsed as JSON.
    pub fn is_unparsed(&self) -> bool {
        self.json.is_none() && !self.raw.trim().is_empty()
    }
}
