//! Mapping of inbound proxy requests onto upstream resource URLs.
//!
//! The URL built here doubles as the cache key, so everything in this module
//! is deterministic: the caller's query string is kept byte for byte and only
//! the content-negotiation parameter is ever appended.

/// Query parameter the upstream API uses for content negotiation.
pub const FORMAT_PARAM: &str = "format";

/// Media type requested from the upstream API.
pub const DEFAULT_FORMAT: &str = "application/ld+json";

/// Response headers that describe the upstream transfer and must never be
/// replayed onto a re-serialized body.
const TRANSFER_HEADERS: [&str; 2] = ["content-length", "transfer-encoding"];

fn encoded_format_pair() -> String {
    format!("{}={}", FORMAT_PARAM, urlencoding::encode(DEFAULT_FORMAT))
}

/// Returns the query string to send upstream.
///
/// A query that already names `format` is returned unchanged; otherwise
/// `format=application%2Fld%2Bjson` is appended.
pub fn with_default_format(raw_query: Option<&str>) -> String {
    let query = raw_query.unwrap_or("").trim_start_matches('?');
    if query.is_empty() {
        return encoded_format_pair();
    }

    let has_format = query.split('&').any(|pair| {
        let key = pair.split('=').next().unwrap_or("");
        urlencoding::decode(key)
            .map(|decoded| decoded == FORMAT_PARAM)
            .unwrap_or(false)
    });

    if has_format {
        query.to_string()
    } else {
        format!("{}&{}", query, encoded_format_pair())
    }
}

/// Builds the upstream URL for the meetings resource or one of its sub-paths.
///
/// `sub_path` is forwarded verbatim, e.g. `MTG-PL-2025-01-20/vote-results`.
pub fn upstream_meetings_url(base: &str, sub_path: &str, raw_query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let sub_path = sub_path.trim_matches('/');
    let query = with_default_format(raw_query);

    if sub_path.is_empty() {
        format!("{}/meetings?{}", base, query)
    } else {
        format!("{}/meetings/{}?{}", base, sub_path, query)
    }
}

/// Builds the upstream URL for a single person record.
///
/// Caller query parameters are never forwarded; the format is always forced.
pub fn upstream_mep_url(base: &str, id: &str) -> String {
    format!(
        "{}/meps/{}?{}",
        base.trim_end_matches('/'),
        urlencoding::encode(id),
        encoded_format_pair()
    )
}

/// Drops headers that would mismatch a re-serialized body.
pub fn filter_headers<I, K, V>(headers: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    headers
        .into_iter()
        .filter(|(name, _)| {
            let name = name.as_ref();
            !TRANSFER_HEADERS
                .iter()
                .any(|blocked| name.eq_ignore_ascii_case(blocked))
        })
        .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
        .collect()
}

/// True for the JSON flavours the upstream API serves.
pub fn is_json_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("application/json") || content_type.contains("application/ld+json")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://data.europarl.europa.eu/api/v2";

    #[test]
    fn test_format_injected_when_missing() {
        assert_eq!(
            with_default_format(Some("year=2025&limit=1")),
            "year=2025&limit=1&format=application%2Fld%2Bjson"
        );
        assert_eq!(with_default_format(None), "format=application%2Fld%2Bjson");
        assert_eq!(with_default_format(Some("")), "format=application%2Fld%2Bjson");
    }

    #[test]
    fn test_existing_format_left_alone() {
        let query = "format=application%2Fjson&year=2025";
        assert_eq!(with_default_format(Some(query)), query);

        // Parameter order is part of the key and must survive untouched.
        let query = "year=2025&format=text%2Fturtle&offset=3";
        assert_eq!(with_default_format(Some(query)), query);
    }

    #[test]
    fn test_format_prefix_is_not_a_format_key() {
        assert_eq!(
            with_default_format(Some("formatted=1")),
            "formatted=1&format=application%2Fld%2Bjson"
        );
    }

    #[test]
    fn test_meetings_urls() {
        assert_eq!(
            upstream_meetings_url(BASE, "", Some("year=2025&limit=1")),
            "https://data.europarl.europa.eu/api/v2/meetings?year=2025&limit=1&format=application%2Fld%2Bjson"
        );
        assert_eq!(
            upstream_meetings_url(BASE, "/", None),
            "https://data.europarl.europa.eu/api/v2/meetings?format=application%2Fld%2Bjson"
        );
        assert_eq!(
            upstream_meetings_url(BASE, "MTG-PL-2025-01-20/vote-results", None),
            "https://data.europarl.europa.eu/api/v2/meetings/MTG-PL-2025-01-20/vote-results?format=application%2Fld%2Bjson"
        );
    }

    #[test]
    fn test_mep_url_forces_format() {
        assert_eq!(
            upstream_mep_url(&format!("{}/", BASE), "12345"),
            "https://data.europarl.europa.eu/api/v2/meps/12345?format=application%2Fld%2Bjson"
        );
    }

    #[test]
    fn test_filter_headers() {
        let filtered = filter_headers(vec![
            ("Content-Type", "application/ld+json"),
            ("Content-Length", "123"),
            ("transfer-encoding", "chunked"),
            ("ETag", "\"abc\""),
        ]);
        assert_eq!(
            filtered,
            vec![
                ("content-type".to_string(), "application/ld+json".to_string()),
                ("etag".to_string(), "\"abc\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type("application/ld+json; charset=utf-8"));
        assert!(is_json_content_type("Application/JSON"));
        assert!(!is_json_content_type("text/html"));
    }
}
