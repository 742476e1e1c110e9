//! axum transport adapter.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `stream` | Fallback handler: one SSE subscriber per `GET` |
//! | `admin` | `/health`, `/metrics`, `/publish`, `/channels/close` |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::errors::ServerError;

pub mod admin;
pub mod stream;

/// Maps an incoming request to the channel it subscribes to.
pub type ChannelNamer = Arc<dyn Fn(&Parts) -> String + Send + Sync>;

/// Default namer: the request's URI path (`/news?x=1` subscribes to `/news`).
pub fn path_channel_namer() -> ChannelNamer {
    Arc::new(|parts: &Parts| parts.uri.path().to_owned())
}

/// Validate configured extra headers once, at router build time.
pub fn extra_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ServerError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::try_from(name.as_str()).map_err(|e| ServerError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::try_from(value.as_str()).map_err(|e| ServerError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let _ = map.insert(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[test]
    fn path_namer_ignores_query() {
        let namer = path_channel_namer();
        assert_eq!(namer(&parts("/news?since=4")), "/news");
        assert_eq!(namer(&parts("/")), "/");
    }

    #[test]
    fn custom_namer_can_use_query() {
        let namer: ChannelNamer = Arc::new(|p: &Parts| p.uri.query().unwrap_or("").to_owned());
        assert_eq!(namer(&parts("/sub?room-1")), "room-1");
    }

    #[test]
    fn extra_headers_parsed() {
        let mut raw = BTreeMap::new();
        let _ = raw.insert("Access-Control-Allow-Origin".to_owned(), "*".to_owned());
        let map = extra_headers(&raw).unwrap();
        assert_eq!(map["access-control-allow-origin"], "*");
    }

    #[test]
    fn invalid_header_name_rejected() {
        let mut raw = BTreeMap::new();
        let _ = raw.insert("bad header".to_owned(), "x".to_owned());
        let err = extra_headers(&raw).unwrap_err();
        assert!(matches!(err, ServerError::InvalidHeader { ref name, .. } if name == "bad header"));
    }

    #[test]
    fn invalid_header_value_rejected() {
        let mut raw = BTreeMap::new();
        let _ = raw.insert("X-Test".to_owned(), "line\nbreak".to_owned());
        assert!(extra_headers(&raw).is_err());
    }
}
