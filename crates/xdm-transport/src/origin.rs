//! Origin and URL helpers.
//!
//! Origins are compared as `scheme://host[:port]` strings, lowercase, with the
//! default port of the scheme omitted.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use url::{form_urlencoded, Url};

use crate::error::{Result, TransportError};

// Any `//` that is not the one following the scheme.
static DOUBLE_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^:/])//+").expect("static regex is valid"));

/// Reduce a URL to the origin messages are addressed to.
///
/// `http`/`https` URLs become `scheme://host[:port]`. Other URLs are returned
/// unchanged. `file:` URLs are rejected: they have no usable origin.
pub fn normalize_location(url: &str) -> Result<String> {
    if url.is_empty() {
        return Err(TransportError::EmptyUrl);
    }
    if url.to_ascii_lowercase().starts_with("file:") {
        return Err(TransportError::UnsupportedScheme("file".to_string()));
    }

    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            Ok(parsed.origin().ascii_serialization())
        }
        _ => Ok(url.to_string()),
    }
}

/// Resolve `url` against `base`, collapsing duplicate slashes and `..`
/// segments.
pub fn resolve_url(url: &str, base: &str) -> Result<String> {
    if url.is_empty() {
        return Err(TransportError::EmptyUrl);
    }

    let collapsed = DOUBLE_SLASH.replace_all(url, "$1/");
    let base_url = Url::parse(base).map_err(|source| TransportError::InvalidUrl {
        url: base.to_string(),
        source,
    })?;
    let resolved = base_url
        .join(&collapsed)
        .map_err(|source| TransportError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

    if resolved.scheme() == "file" {
        return Err(TransportError::UnsupportedScheme("file".to_string()));
    }

    Ok(resolved.to_string())
}

/// Append `params` to the fragment of `url`, starting a fragment if needed.
pub fn append_query_parameters(url: &str, params: &[(&str, &str)]) -> String {
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let joiner = if url.contains('#') { '&' } else { '#' };
    format!("{url}{joiner}{encoded}")
}

/// Decode the `key=value` pairs carried in the fragment of `location`.
pub fn parse_query(location: &str) -> BTreeMap<String, String> {
    let Some((_, fragment)) = location.split_once('#') else {
        return BTreeMap::new();
    };

    form_urlencoded::parse(fragment.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_path_and_default_port() {
        assert_eq!(
            normalize_location("http://Example.COM:80/a/b?c#d").unwrap(),
            "http://example.com"
        );
        assert_eq!(
            normalize_location("https://example.com:443/").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn normalize_keeps_explicit_port() {
        assert_eq!(
            normalize_location("http://localhost:9876/context.html").unwrap(),
            "http://localhost:9876"
        );
    }

    #[test]
    fn normalize_rejects_empty_and_file() {
        assert!(matches!(
            normalize_location(""),
            Err(TransportError::EmptyUrl)
        ));
        assert!(matches!(
            normalize_location("file:///tmp/index.html"),
            Err(TransportError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn normalize_passes_through_non_http() {
        assert_eq!(normalize_location("about:blank").unwrap(), "about:blank");
    }

    #[test]
    fn resolve_relative_path_against_base_directory() {
        let resolved = resolve_url("guest.html", "http://host.test/app/index.html").unwrap();
        assert_eq!(resolved, "http://host.test/app/guest.html");
    }

    #[test]
    fn resolve_root_relative_and_parent_segments() {
        assert_eq!(
            resolve_url("/base/test/../fixture/guest.html", "http://host.test/app/").unwrap(),
            "http://host.test/base/fixture/guest.html"
        );
    }

    #[test]
    fn resolve_collapses_double_slashes() {
        assert_eq!(
            resolve_url("http://guest.test//a//b.html", "http://host.test/").unwrap(),
            "http://guest.test/a/b.html"
        );
    }

    #[test]
    fn resolve_keeps_absolute_urls() {
        assert_eq!(
            resolve_url("https://guest.test/frame.html", "http://host.test/").unwrap(),
            "https://guest.test/frame.html"
        );
    }

    #[test]
    fn resolve_rejects_empty() {
        assert!(matches!(
            resolve_url("", "http://host.test/"),
            Err(TransportError::EmptyUrl)
        ));
    }

    #[test]
    fn append_starts_or_extends_fragment() {
        assert_eq!(
            append_query_parameters("http://a.test/x", &[("xdm_c", "default1"), ("xdm_p", "1")]),
            "http://a.test/x#xdm_c=default1&xdm_p=1"
        );
        assert_eq!(
            append_query_parameters("http://a.test/x#v=1", &[("xdm_p", "1")]),
            "http://a.test/x#v=1&xdm_p=1"
        );
    }

    #[test]
    fn parse_query_decodes_fragment_pairs() {
        let url = append_query_parameters(
            "http://guest.test/frame.html",
            &[("xdm_e", "http://host.test:8080"), ("xdm_c", "default7")],
        );
        let query = parse_query(&url);
        assert_eq!(query.get("xdm_e").map(String::as_str), Some("http://host.test:8080"));
        assert_eq!(query.get("xdm_c").map(String::as_str), Some("default7"));
    }

    #[test]
    fn parse_query_without_fragment_is_empty() {
        assert!(parse_query("http://guest.test/frame.html").is_empty());
    }
}
