//! Request values handed to the retrying transport layer.

use serde_json::Value;

/// The subset of HTTP methods both inventory APIs use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Patch => write!(f, "PATCH"),
        }
    }
}

/// A fully-formed API request.
///
/// Immutable once built and consumed by a single [`ClientSession::send`]
/// call; the retry attempts are internal iterations of that one call. The
/// session supplies the fixed header set (auth included), so a request only
/// carries what varies per call.
///
/// [`ClientSession::send`]: super::ClientSession::send
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub url: String,
    pub method: Method,
    pub payload: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            payload: None,
            query: Vec::new(),
        }
    }

    pub fn get_with_query(url: impl Into<String>, query: &[(&str, &str)]) -> Self {
        Self {
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Self::get(url)
        }
    }

    pub fn post(url: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            payload,
            query: Vec::new(),
        }
    }

    pub fn patch(url: impl Into<String>, payload: Value) -> Self {
        Self {
            url: url.into(),
            method: Method::Patch,
            payload: Some(payload),
            query: Vec::new(),
        }
    }
}
