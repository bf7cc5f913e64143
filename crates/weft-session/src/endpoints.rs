//! The HTTP side-channel used alongside the websocket.
//!
//! Cached-message fetches, file uploads/deletes, and media/page URL
//! construction all go through the [`Endpoints`] trait so the connection
//! layer can be exercised against scripted implementations.

use std::sync::RwLock;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use weft_core::error::{Error, Result};

use crate::uri::{self, COMPONENT_PATH, MEDIA_PATH, MESSAGE_PATH};

/// Characters escaped when a page name becomes a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'{')
    .add(b'}');

/// Non-websocket endpoints used by the session runtime.
#[trait_variant::make(Endpoints: Send)]
pub trait LocalEndpoints {
    /// Record the base URI of the connected server. Called by the live
    /// connection once a candidate passes the health check.
    fn set_base_uri(&self, base: &Url);

    /// Record the static asset base URL for static-replay sessions.
    fn set_static_config_url(&self, url: &str);

    /// Resolve a media URL. Absolute URLs pass through unchanged; relative
    /// ones resolve against the static asset base (static sessions) or the
    /// connected server.
    fn build_media_url(&self, url: &str) -> String;

    /// Build the URL of an app page in a multipage app.
    fn build_app_page_url(&self, page_link_base: Option<&str>, page_name: &str) -> String;

    /// Build the URL of a custom-component resource served by the backend.
    fn build_component_url(&self, component_name: &str, path: &str) -> String;

    /// Fetch the serialized body of a cached forward message by hash.
    async fn fetch_cached_forward_msg(&self, hash: &str) -> Result<Vec<u8>>;

    /// Upload a file to a backend-supplied URL, associated with the session.
    async fn upload_file(
        &self,
        upload_url: &str,
        file_name: &str,
        data: Vec<u8>,
        session_id: &str,
    ) -> Result<()>;

    /// Best-effort delete of a previously uploaded file.
    async fn delete_file(&self, file_url: &str, session_id: &str) -> Result<()>;
}

// ============================================================================
// HttpEndpoints
// ============================================================================

/// TCP connection timeout for side-channel requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-request read timeout for side-channel requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Production [`Endpoints`] implementation over reqwest.
#[derive(Debug)]
pub struct HttpEndpoints {
    client: reqwest::Client,
    base_uri: RwLock<Option<Url>>,
    static_config_url: RwLock<String>,
}

impl HttpEndpoints {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::connection(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_uri: RwLock::new(None),
            static_config_url: RwLock::new(String::new()),
        })
    }

    /// The shared HTTP client, for collaborators that make their own
    /// requests (health pings, static fetches).
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The active server base URI, if one has been selected.
    pub fn base_uri(&self) -> Option<Url> {
        self.base_uri.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn require_base_uri(&self) -> Result<Url> {
        self.base_uri()
            .ok_or_else(|| Error::connection("no active server base URI"))
    }

    fn static_config_url(&self) -> String {
        self.static_config_url
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Resolve `url` against the active base when it is not absolute.
    fn resolve_url(&self, url: &str) -> Result<Url> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        Ok(uri::join_path(&self.require_base_uri()?, url))
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:")
}

impl Endpoints for HttpEndpoints {
    fn set_base_uri(&self, base: &Url) {
        *self.base_uri.write().unwrap_or_else(|e| e.into_inner()) = Some(base.clone());
    }

    fn set_static_config_url(&self, url: &str) {
        *self
            .static_config_url
            .write()
            .unwrap_or_else(|e| e.into_inner()) = url.to_string();
    }

    fn build_media_url(&self, url: &str) -> String {
        if is_absolute(url) {
            return url.to_string();
        }
        let static_base = self.static_config_url();
        if !static_base.is_empty() {
            return format!(
                "{}/{}",
                static_base.trim_end_matches('/'),
                url.trim_start_matches('/')
            );
        }
        match self.base_uri() {
            Some(base) => uri::join_path(&base, &format!("{MEDIA_PATH}/{}", url.trim_start_matches('/')))
                .to_string(),
            None => url.to_string(),
        }
    }

    fn build_app_page_url(&self, page_link_base: Option<&str>, page_name: &str) -> String {
        let encoded = utf8_percent_encode(page_name, PATH_SEGMENT).to_string();
        match page_link_base {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), encoded),
            None => match self.base_uri() {
                Some(base) => uri::join_path(&base, &encoded).to_string(),
                None => encoded,
            },
        }
    }

    fn build_component_url(&self, component_name: &str, path: &str) -> String {
        let encoded = utf8_percent_encode(component_name, PATH_SEGMENT).to_string();
        let relative = format!("{COMPONENT_PATH}/{encoded}/{}", path.trim_start_matches('/'));
        match self.base_uri() {
            Some(base) => uri::join_path(&base, &relative).to_string(),
            None => relative,
        }
    }

    async fn fetch_cached_forward_msg(&self, hash: &str) -> Result<Vec<u8>> {
        let url = uri::join_path(&self.require_base_uri()?, MESSAGE_PATH);
        let response = self
            .client
            .get(url.clone())
            .query(&[("hash", hash)])
            .send()
            .await
            .map_err(|e| Error::connection(format!("cached message fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::http(response.status().as_u16(), url.as_str()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::connection(format!("cached message body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn upload_file(
        &self,
        upload_url: &str,
        file_name: &str,
        data: Vec<u8>,
        session_id: &str,
    ) -> Result<()> {
        let url = self.resolve_url(upload_url)?;
        let response = self
            .client
            .put(url.clone())
            .query(&[("sessionId", session_id), ("fileName", file_name)])
            .body(data)
            .send()
            .await
            .map_err(|e| Error::upload(format!("upload to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::http(response.status().as_u16(), url.as_str()));
        }
        Ok(())
    }

    async fn delete_file(&self, file_url: &str, session_id: &str) -> Result<()> {
        let url = self.resolve_url(file_url)?;
        let response = self
            .client
            .delete(url.clone())
            .query(&[("sessionId", session_id)])
            .send()
            .await
            .map_err(|e| Error::connection(format!("delete of {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::http(response.status().as_u16(), url.as_str()));
        }
        Ok(())
    }
}
