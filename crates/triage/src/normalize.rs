//! URL normalization: turns a raw page identifier into the join key shared
//! by all three sources.
//!
//! The key is `host[:port]` + path + optional `?query`. Scheme and fragment
//! are dropped, the host is lower-cased, path casing is preserved, tracking
//! parameters are removed and the remaining parameters are sorted. Bare
//! paths either take the configured base host or stay in their own
//! host-less key space (`/blog/roses`).
//!
//! Normalization is total: input the `url` crate cannot parse comes back
//! trimmed and lower-cased rather than failing.

use serde::Serialize;
use url::{form_urlencoded, Url};

/// Query parameters removed from every key.
const TRACKING_PARAMS: &[&str] = &[
    "gclid", "gbraid", "wbraid", "dclid", "fbclid", "msclkid", "yclid", "igshid", "mc_cid",
    "mc_eid", "_ga", "_gl", "ref_src",
];

/// Placeholder origin used to parse host-less paths.
const RELATIVE_BASE: &str = "http://relative.invalid/";

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Normalized join identity for a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key with the host stripped: path plus query, `/` for the root.
    pub fn path(&self) -> &str {
        let s = self.0.strip_prefix("//").unwrap_or(&self.0);
        if s.starts_with('/') {
            return s;
        }
        match s.find(&['/', '?'][..]) {
            Some(idx) if s[idx..].starts_with('/') => &s[idx..],
            Some(_) | None => "/",
        }
    }
}

impl std::fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Run-level normalization settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyOptions {
    pub base_host: Option<String>,
    pub strip_all_query: bool,
}

impl KeyOptions {
    pub fn new(base_host: Option<&str>, strip_all_query: bool) -> Self {
        Self {
            base_host: base_host.map(str::to_string),
            strip_all_query,
        }
    }

    pub fn normalize(&self, raw: &str) -> CanonicalKey {
        normalize(raw, self.base_host.as_deref(), self.strip_all_query)
    }
}

// ---------------------------------------------------------------------------
// Normalize
// ---------------------------------------------------------------------------

/// How a trimmed identifier is read.
#[derive(Debug, PartialEq, Eq)]
enum Shape {
    /// `scheme://host/...`
    Absolute,
    /// `//host/...`
    SchemeRelative,
    /// `example.com/...`
    HostFirst,
    /// `/path`, `?query` or a dotless first segment.
    Path,
    /// `mailto:`, `tel:` and other schemes without an authority.
    Opaque,
}

/// Canonicalize `raw` into a join key. Pure and total.
pub fn normalize(raw: &str, base_host: Option<&str>, strip_all_query: bool) -> CanonicalKey {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CanonicalKey(String::new());
    }

    let parsed = match shape(trimmed) {
        Shape::Absolute => Url::parse(trimmed).ok().map(|u| (u, true)),
        Shape::SchemeRelative => Url::parse(&format!("http:{trimmed}")).ok().map(|u| (u, true)),
        Shape::HostFirst => Url::parse(&format!("http://{trimmed}")).ok().map(|u| (u, true)),
        Shape::Opaque => None,
        Shape::Path => {
            let path = if trimmed.starts_with('/') || trimmed.starts_with('?') {
                trimmed.to_string()
            } else {
                format!("/{trimmed}")
            };
            match base_host.and_then(host_of_base) {
                Some(host) => Url::parse(&format!("http://{host}{path}")).ok().map(|u| (u, true)),
                None => Url::parse(RELATIVE_BASE)
                    .and_then(|base| base.join(&path))
                    .ok()
                    .map(|u| (u, false)),
            }
        }
    };

    match parsed {
        Some((url, with_host)) if !with_host || url.host_str().is_some_and(|h| !h.is_empty()) => {
            CanonicalKey(render(&url, with_host, strip_all_query))
        }
        _ => CanonicalKey(trimmed.to_lowercase()),
    }
}

fn shape(s: &str) -> Shape {
    if has_scheme(s) {
        return Shape::Absolute;
    }
    if s.starts_with("//") {
        return Shape::SchemeRelative;
    }
    if has_opaque_scheme(s) {
        return Shape::Opaque;
    }
    if s.starts_with('/') || s.starts_with('?') {
        return Shape::Path;
    }
    let first = s.split(&['/', '?', '#'][..]).next().unwrap_or("");
    if looks_like_host(first) {
        Shape::HostFirst
    } else {
        Shape::Path
    }
}

/// `scheme://` where the scheme is `[A-Za-z][A-Za-z0-9+.-]*`.
fn has_scheme(s: &str) -> bool {
    let Some(idx) = s.find("://") else {
        return false;
    };
    let scheme = &s[..idx];
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// `scheme:` with no `//` after it. A digit after the colon is a port
/// (`localhost:8080`), and a dotted prefix is a host (`example.com:8080`).
fn has_opaque_scheme(s: &str) -> bool {
    let Some(idx) = s.find(':') else {
        return false;
    };
    let (scheme, rest) = (&s[..idx], &s[idx + 1..]);
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-'))
        && !rest.starts_with(|c: char| c.is_ascii_digit())
}

fn looks_like_host(segment: &str) -> bool {
    segment.contains('.')
        || segment.contains(':')
        || segment.starts_with('[')
        || segment.eq_ignore_ascii_case("localhost")
}

/// Reduce a configured base host (`https://Example.com/`, `example.com`) to `host[:port]`.
fn host_of_base(base: &str) -> Option<String> {
    let base = base.trim();
    if base.is_empty() {
        return None;
    }
    let url = if has_scheme(base) {
        Url::parse(base).ok()?
    } else {
        Url::parse(&format!("http://{}", base.trim_start_matches('/'))).ok()?
    };
    host_port(&url)
}

fn host_port(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    // `example.com.` is the same site as `example.com`.
    let host = match host.strip_suffix('.') {
        Some(bare) if !bare.is_empty() => bare.to_string(),
        _ => host,
    };
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

fn render(url: &Url, with_host: bool, strip_all_query: bool) -> String {
    let mut out = String::new();

    if with_host {
        if let Some(host) = host_port(url) {
            // Dotless hosts need a marker or they would re-read as a bare path.
            if !looks_like_host(&host) {
                out.push_str("//");
            }
            out.push_str(&host);
        }
    }

    let path = url.path();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        out.push('/');
    } else {
        out.push_str(trimmed);
    }

    if !strip_all_query {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !is_tracking_param(name))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        if !pairs.is_empty() {
            pairs.sort();
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            out.push('?');
            out.push_str(&query);
        }
    }

    out
}

pub fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> String {
        normalize(raw, None, false).to_string()
    }

    #[test]
    fn lowercases_host_but_not_path() {
        assert_eq!(key("https://Example.COM/Blog/Roses"), "example.com/Blog/Roses");
    }

    #[test]
    fn drops_scheme_and_fragment() {
        assert_eq!(key("http://example.com/a#top"), "example.com/a");
        assert_eq!(key("https://example.com/a"), "example.com/a");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(key("  https://example.com/a  "), "example.com/a");
    }

    #[test]
    fn trailing_slash_removed_except_root() {
        assert_eq!(key("https://example.com/a/"), "example.com/a");
        assert_eq!(key("https://example.com/"), "example.com/");
        assert_eq!(key("https://example.com"), "example.com/");
        assert_eq!(key("/"), "/");
    }

    #[test]
    fn repeated_trailing_slashes_collapse() {
        assert_eq!(key("https://example.com/a//"), "example.com/a");
    }

    #[test]
    fn host_first_without_scheme() {
        assert_eq!(key("Example.com/blog/Roses"), "example.com/blog/Roses");
        assert_eq!(key("localhost:8080/x/"), "localhost:8080/x");
    }

    #[test]
    fn scheme_relative() {
        assert_eq!(key("//Example.com/a"), "example.com/a");
    }

    #[test]
    fn bare_path_without_base_host_keeps_own_key_space() {
        assert_eq!(key("/blog/Roses/"), "/blog/Roses");
        assert_eq!(key("blog/Roses"), "/blog/Roses");
    }

    #[test]
    fn bare_path_takes_base_host() {
        let k = normalize("/blog/Roses", Some("example.com"), false);
        assert_eq!(k.as_str(), "example.com/blog/Roses");
        let k = normalize("/blog/Roses", Some("https://Example.com/"), false);
        assert_eq!(k.as_str(), "example.com/blog/Roses");
    }

    #[test]
    fn base_host_does_not_override_absolute_urls() {
        let k = normalize("https://other.org/a", Some("example.com"), false);
        assert_eq!(k.as_str(), "other.org/a");
    }

    #[test]
    fn strips_tracking_params_always() {
        assert_eq!(
            key("https://example.com/a?utm_source=x&id=7&gclid=abc&UTM_Medium=y"),
            "example.com/a?id=7"
        );
    }

    #[test]
    fn strip_all_query_drops_everything() {
        let k = normalize("https://example.com/a?id=7&p=2", None, true);
        assert_eq!(k.as_str(), "example.com/a");
    }

    #[test]
    fn remaining_params_sorted() {
        assert_eq!(key("https://example.com/a?b=2&a=1"), "example.com/a?a=1&b=2");
    }

    #[test]
    fn keeps_non_default_port_only() {
        assert_eq!(key("https://example.com:443/a"), "example.com/a");
        assert_eq!(key("https://example.com:8443/a"), "example.com:8443/a");
    }

    #[test]
    fn dotless_host_is_marked() {
        assert_eq!(key("http://intranet/wiki/"), "//intranet/wiki");
        assert_eq!(key("//intranet/wiki"), "//intranet/wiki");
    }

    #[test]
    fn non_web_schemes_keep_their_own_key() {
        assert_eq!(key("mailto:X@Y.com"), "mailto:x@y.com");
        assert_eq!(key("tel:+1-555-0100"), "tel:+1-555-0100");
        assert_ne!(key("mailto:x@y.com"), key("https://y.com/"));
        assert_eq!(key("example.com:8080/a"), "example.com:8080/a");
    }

    #[test]
    fn trailing_dot_host_matches_plain_host() {
        assert_eq!(key("http://EXAMPLE.com./a"), "example.com/a");
        assert_eq!(key("example.com./a/"), "example.com/a");
        let k = normalize("/a", Some("example.com."), false);
        assert_eq!(k.as_str(), "example.com/a");
    }

    #[test]
    fn unparseable_degrades_to_lowercased_input() {
        assert_eq!(key("  HTTP://exa mple.com/X "), "http://exa mple.com/x");
    }

    #[test]
    fn empty_input_is_empty_key() {
        assert!(normalize("   ", Some("example.com"), false).is_empty());
    }

    #[test]
    fn query_in_path_with_embedded_url() {
        assert_eq!(
            key("example.com/go?to=http://other.org/x"),
            "example.com/go?to=http%3A%2F%2Fother.org%2Fx"
        );
    }

    #[test]
    fn normalizing_a_key_is_a_no_op() {
        for raw in [
            "http://Example.com/blog/Roses/",
            "/blog/Roses",
            "example.com/a?b=2&a=1&utm_source=z",
            "http://intranet/wiki/",
            "https://example.com:8443/",
            "HTTP://exa mple.com/X",
            "mailto:x@y.com",
            "http://example.com./a",
        ] {
            let once = normalize(raw, None, false);
            let twice = normalize(once.as_str(), None, false);
            assert_eq!(once, twice, "raw = {raw}");
        }
    }

    #[test]
    fn three_spellings_reconcile() {
        let opts = KeyOptions::new(Some("example.com"), false);
        let a = opts.normalize("http://Example.com/blog/Roses/");
        let b = opts.normalize("/blog/Roses");
        let c = opts.normalize("example.com/blog/Roses");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn path_component() {
        assert_eq!(normalize("https://example.com/a/b?x=1", None, false).path(), "/a/b?x=1");
        assert_eq!(normalize("https://example.com", None, false).path(), "/");
        assert_eq!(normalize("/a", None, false).path(), "/a");
        assert_eq!(normalize("http://intranet/w", None, false).path(), "/w");
    }
}
