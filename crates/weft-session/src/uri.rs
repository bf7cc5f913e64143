//! Base-URI derivation and endpoint paths.
//!
//! A session URL like `https://host/foo/bar` is ambiguous in a multipage
//! deployment: it may mean the page `/` of an app served under `/foo/bar`,
//! or the page `/bar` of an app served under `/foo`. Both prefixes are
//! candidate base URIs; the first to answer the health check wins.

use url::Url;

use weft_core::error::{Error, Result};

/// Health-check endpoint, relative to a base URI.
pub const HEALTH_PATH: &str = "_weft/health";

/// Host-configuration endpoint, relative to a base URI.
pub const HOST_CONFIG_PATH: &str = "_weft/host-config";

/// Websocket endpoint, relative to a base URI.
pub const STREAM_PATH: &str = "_weft/stream";

/// Cached forward-message fetch endpoint, relative to a base URI.
pub const MESSAGE_PATH: &str = "_weft/message";

/// Media asset prefix, relative to a base URI.
pub const MEDIA_PATH: &str = "_weft/media";

/// Custom-component resource prefix, relative to a base URI.
pub const COMPONENT_PATH: &str = "_weft/component";

/// Query parameter selecting static replay mode.
pub const STATIC_APP_ID_PARAM: &str = "staticAppId";

/// Join a relative endpoint path onto a base URI, preserving the base's
/// path prefix and dropping any query/fragment.
pub fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    let suffix = path.trim_start_matches('/');
    url.set_path(&format!("{prefix}/{suffix}"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Candidate base URIs for a session URL, most specific first, at most two.
///
/// `https://host/` yields itself; `https://host/foo/bar` yields
/// `[/foo/bar, /foo]`. Trying more than two prefixes has never been needed
/// in practice and slows down the first connection.
pub fn possible_base_uris(session_url: &Url) -> Result<Vec<Url>> {
    if session_url.cannot_be_a_base() {
        return Err(Error::invalid_uri(format!(
            "'{session_url}' cannot be used as a base URI"
        )));
    }

    let mut base = session_url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let segments: Vec<String> = base
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let with_path = |path: String| {
        let mut url = base.clone();
        url.set_path(&path);
        url
    };

    if segments.is_empty() {
        return Ok(vec![with_path("/".to_string())]);
    }

    let mut candidates = Vec::new();
    let mut parts = segments;
    while !parts.is_empty() {
        candidates.push(with_path(format!("/{}", parts.join("/"))));
        parts.pop();
    }
    candidates.push(with_path("/".to_string()));
    candidates.truncate(2);
    Ok(candidates)
}

/// Build the ws/wss URL for an endpoint under a base URI.
pub fn build_ws_url(base: &Url, path: &str) -> Result<Url> {
    let mut url = join_path(base, path);
    let ws_scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::invalid_uri(format!(
                "cannot derive a websocket scheme from '{other}'"
            )))
        }
    };
    url.set_scheme(ws_scheme)
        .map_err(|_| Error::invalid_uri(format!("cannot set scheme on '{url}'")))?;
    Ok(url)
}

/// Extract the static-app id from the session URL's query string, if the
/// session is a static replay.
pub fn static_app_id(session_url: &Url) -> Option<String> {
    session_url
        .query_pairs()
        .find(|(key, _)| key == STATIC_APP_ID_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
