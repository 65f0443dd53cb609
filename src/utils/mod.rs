//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Substitute an id into a `{id}` URL template.
///
/// In the path the id is percent-encoded as one segment, so `/`, `?` and
/// spaces survive a round trip. In the query it is form-encoded.
pub fn fill_template(template: &str, id: &str) -> String {
    let in_query = template
        .find("{id}")
        .is_some_and(|at| template[..at].contains('?'));
    let encoded: String = if in_query {
        url::form_urlencoded::byte_serialize(id.as_bytes()).collect()
    } else {
        encode_path_segment(id)
    };
    template.replace("{id}", &encoded)
}

/// Percent-encode a single path segment.
fn encode_path_segment(segment: &str) -> String {
    let Ok(mut url) = Url::parse("http://segment.invalid/") else {
        return url::form_urlencoded::byte_serialize(segment.as_bytes()).collect();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(segment);
    }
    url.path().trim_start_matches('/').to_string()
}

/// Whether a string is an absolute http(s) URL.
pub fn is_absolute_url(s: &str) -> bool {
    Url::parse(s).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}
