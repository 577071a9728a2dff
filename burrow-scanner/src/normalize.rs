//! URL normalisation, signatures and the candidate filter shared by the
//! prober, the external delegate and the deduplicator.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;
use url::form_urlencoded;

/// Characters that must stay encoded after decoding a path, otherwise
/// re-parsing the normalised URL would change its meaning.
const PATH_RESERVED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'\\');

const MAX_URL_LENGTH: usize = 2048;

/// Extensions never worth probing or reporting.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "tif", "tiff", "woff", "woff2",
    "ttf", "eot", "otf", "mp3", "mp4", "m4a", "avi", "mov", "wav", "flac", "ogg", "webm", "mkv",
    "exe", "dmg", "iso", "msi",
];

const SKIPPED_HREF_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "#"];

/// Canonical string form of a URL. Returns `None` for anything that is not
/// an absolute http(s) URL with a host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }

    // Url::port() is already None for the scheme's default port
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    // Segment by segment, so an encoded slash never becomes a separator
    let mut path = parsed
        .path()
        .split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, PATH_RESERVED).to_string()
        })
        .collect::<Vec<_>>()
        .join("/");
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() {
        path.push('/');
    }

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    let query = if pairs.is_empty() {
        String::new()
    } else {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter())
            .finish();
        format!("?{}", encoded)
    };

    Some(format!("{}://{}{}{}{}", scheme, host, port, path, query))
}

/// SHA-256 hex digest of the normalised URL. Unparseable input is hashed
/// verbatim so it still gets a stable signature.
pub fn url_signature(raw: &str) -> String {
    let canonical = normalize_url(raw).unwrap_or_else(|| raw.trim().to_string());
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{:x}", digest)
}

pub fn path_depth(url: &Url) -> usize {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}

/// Scheme, host and port, e.g. `https://example.com:8443`.
pub fn base_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    parsed.host_str()?;
    Some(parsed.origin().ascii_serialization())
}

/// Normalised URL without its query string.
pub fn strip_query(raw: &str) -> String {
    let canonical = normalize_url(raw).unwrap_or_else(|| raw.to_string());
    match canonical.split_once('?') {
        Some((base, _)) => base.to_string(),
        None => canonical,
    }
}

pub fn path_tokens(raw: &str) -> HashSet<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| {
            u.path_segments().map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_lowercase())
                    .collect()
            })
        })
        .unwrap_or_default()
}

pub fn param_names(raw: &str) -> HashSet<String> {
    Url::parse(raw)
        .map(|u| u.query_pairs().map(|(k, _)| k.to_lowercase()).collect())
        .unwrap_or_default()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Candidate filter applied to every URL before it is probed or accepted
/// from the external delegate.
pub fn passes_url_filter(raw: &str) -> bool {
    if raw.len() > MAX_URL_LENGTH {
        return false;
    }
    let Ok(parsed) = Url::parse(raw) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    if parsed.host_str().map(str::is_empty).unwrap_or(true) {
        return false;
    }

    let path = parsed.path().to_lowercase();
    if let Some(last) = path.rsplit('/').next()
        && let Some((_, ext)) = last.rsplit_once('.')
        && EXCLUDED_EXTENSIONS.contains(&ext)
    {
        return false;
    }

    true
}

/// Resolves an href/src/action value against the page it was found on.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || SKIPPED_HREF_PREFIXES.iter().any(|p| href.starts_with(p)) {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    resolved.set_fragment(None);

    Some(resolved.to_string())
}

pub fn is_same_host(url: &str, host: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(host)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_strips_default_port() {
        assert_eq!(
            normalize_url("HTTP://Example.COM:80/Admin/").as_deref(),
            Some("http://example.com/Admin")
        );
        assert_eq!(
            normalize_url("https://example.com:443/").as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(
            normalize_url("https://example.com:8443/x").as_deref(),
            Some("https://example.com:8443/x")
        );
    }

    #[test]
    fn test_normalize_sorts_query_and_drops_fragment() {
        assert_eq!(
            normalize_url("http://h/p?b=2&a=1&a=0#frag").as_deref(),
            Some("http://h/p?a=0&a=1&b=2")
        );
    }

    #[test]
    fn test_normalize_decodes_path() {
        assert_eq!(
            normalize_url("http://h/%61dmin/%7Euser").as_deref(),
            Some("http://h/admin/~user")
        );
        assert_eq!(
            normalize_url("http://h/a/..%2fb").as_deref(),
            Some("http://h/a/..%2Fb")
        );
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert!(normalize_url("ftp://h/").is_none());
        assert!(normalize_url("/relative/path").is_none());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "HTTP://Example.com:80/a/b/?z=1&y=2#x",
            "https://h/%2541/with%20space/",
            "http://h/a%3Fb?q=%26",
            "http://h/caf%C3%A9/",
            "http://h:8080//double//slash//",
            "http://h/a%5Cb",
            "http://h/?",
            "http://h/a/..%2Fb",
            "http://h/a%2f..%2F..%2Fetc",
        ];
        for raw in samples {
            let once = normalize_url(raw).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_signature_ignores_parameter_order() {
        assert_eq!(
            url_signature("http://h/x?a=1&b=2"),
            url_signature("http://h/x?b=2&a=1")
        );
        assert_ne!(url_signature("http://h/x?a=1"), url_signature("http://h/x?a=2"));
    }

    #[test]
    fn test_signature_collapses_trailing_slash() {
        assert_eq!(url_signature("http://h/admin/"), url_signature("http://h/admin"));
        assert_eq!(url_signature("http://h/"), url_signature("http://h"));
    }

    #[test]
    fn test_url_filter() {
        assert!(passes_url_filter("https://example.com/admin/"));
        assert!(passes_url_filter("https://example.com/app.js"));
        assert!(!passes_url_filter("https://example.com/logo.png"));
        assert!(!passes_url_filter("javascript:alert(1)"));
        assert!(!passes_url_filter("ftp://example.com/file"));
        let long = format!("https://example.com/{}", "a".repeat(3000));
        assert!(!passes_url_filter(&long));
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("http://h/dir/page.html", "../other#top").as_deref(),
            Some("http://h/other")
        );
        assert_eq!(resolve_url("http://h/", "mailto:a@b.c"), None);
        assert_eq!(resolve_url("http://h/", "#section"), None);
    }

    #[test]
    fn test_jaccard() {
        let a: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["b", "c"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 1.0);
    }

    #[test]
    fn test_base_url_and_strip_query() {
        assert_eq!(
            base_url("https://example.com:8443/a?b=c").as_deref(),
            Some("https://example.com:8443")
        );
        assert_eq!(strip_query("http://h/x/?id=1"), "http://h/x");
    }
}
