//! Allowed-origin matching for host ↔ client cross-frame messages.
//!
//! The host configuration carries a list of origin patterns
//! (`https://*.example.com`, `http://localhost:3000`). A message origin is
//! accepted only when it matches one of them. Hostname patterns may contain
//! `*` wildcards; protocol and port must match exactly, with the scheme's
//! default port applied when either side omits one.

use regex::Regex;
use url::Url;

/// A parsed origin pattern: scheme, hostname regex, optional explicit port.
struct OriginPattern {
    scheme: String,
    host_re: Regex,
    port: Option<u16>,
}

impl OriginPattern {
    fn parse(pattern: &str) -> Option<Self> {
        let (scheme, rest) = pattern.split_once("://")?;
        if scheme.is_empty() || rest.is_empty() {
            return None;
        }

        // Patterns are origins; tolerate (and drop) a trailing path.
        let rest = rest.split('/').next()?;

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => (host, Some(port_str.parse::<u16>().ok()?)),
            None => (rest, None),
        };
        if host.is_empty() {
            return None;
        }

        let host_re = host_pattern_to_regex(host)?;
        Some(Self {
            scheme: scheme.to_ascii_lowercase(),
            host_re,
            port,
        })
    }

    /// Effective port for comparison: explicit port, else the scheme default.
    fn effective_port(&self) -> Option<u16> {
        self.port.or(default_port(&self.scheme))
    }

    fn matches_host(&self, host: &str) -> bool {
        self.host_re.is_match(host)
    }
}

/// Translate a hostname pattern with `*` wildcards into an anchored regex.
fn host_pattern_to_regex(host: &str) -> Option<Regex> {
    let mut pattern = String::with_capacity(host.len() + 8);
    pattern.push('^');
    for ch in host.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).ok()
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

/// Check whether `test_origin` is allowed by `allowed_origin_pattern`.
///
/// Rules:
/// - Protocols must match exactly.
/// - Hostnames match against the pattern, `*` acting as a wildcard.
/// - Ports must match after applying scheme defaults.
/// - `localhost` test origins match a pattern whose hostname is `localhost`
///   on any port, as long as protocols match (local development hosts bind
///   arbitrary ports).
///
/// Unparseable patterns or origins never match.
pub fn is_valid_origin(allowed_origin_pattern: &str, test_origin: &str) -> bool {
    let pattern = match OriginPattern::parse(allowed_origin_pattern) {
        Some(p) => p,
        None => return false,
    };
    let test_url = match Url::parse(test_origin) {
        Ok(u) => u,
        Err(_) => return false,
    };

    let test_scheme = test_url.scheme().to_ascii_lowercase();
    let test_host = match test_url.host_str() {
        Some(h) => h.to_ascii_lowercase(),
        None => return false,
    };
    if test_scheme != pattern.scheme {
        return false;
    }

    // localhost: port-insensitive match when the pattern names localhost.
    if test_host == "localhost" && pattern.matches_host("localhost") {
        return true;
    }

    if !pattern.matches_host(&test_host) {
        return false;
    }

    let test_port = test_url.port().or(default_port(&test_scheme));
    match (pattern.effective_port(), test_port) {
        (Some(allowed), Some(actual)) => allowed == actual,
        (None, None) => true,
        _ => false,
    }
}
