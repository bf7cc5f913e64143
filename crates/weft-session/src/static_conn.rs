//! Static replay connection.
//!
//! Published read-only snapshots are served from static storage instead of
//! a live backend: one blob of serialized forward messages per app id. The
//! static connection resolves the asset base URL, fetches the blob, and
//! replays the decoded messages in order.
//!
//! Dispatch is a synchronous in-order loop over the whole decoded list.
//! Snapshots are authored artifacts and assumed small; a very large one
//! would stall the consumer for the duration of the replay.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use weft_core::error::{Error, Result};
use weft_core::state::ConnectionState;
use weft_core::wire::ForwardMsgList;

use crate::endpoints::Endpoints;
use crate::events::SessionEvent;
use crate::storage::Storage;

/// Default location of the static asset configuration file.
pub const STATIC_ASSET_CONFIG_URL: &str = "https://data.weft.dev/static.json";

/// Storage key caching the resolved static asset base URL.
pub const STATIC_ASSET_URL_KEY: &str = "weft.staticAssetUrl";

/// Timeout for each static-path fetch (config and snapshot).
const STATIC_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct StaticConfig {
    static_url: Option<String>,
}

/// Resolve the static asset base URL: cached local value first, then the
/// remote config file, then empty string (logged, not raised).
pub async fn resolve_static_config_url(
    storage: &dyn Storage,
    client: &reqwest::Client,
    config_url: &str,
) -> String {
    if let Some(cached) = storage.get(STATIC_ASSET_URL_KEY) {
        if !cached.is_empty() {
            debug!("using cached static asset url: {cached}");
            return cached;
        }
    }

    let response =
        match tokio::time::timeout(STATIC_FETCH_TIMEOUT, client.get(config_url).send()).await {
            Ok(Ok(response)) if response.status().is_success() => response,
            Ok(Ok(response)) => {
                error!("failed to fetch static config url: {}", response.status());
                return String::new();
            }
            Ok(Err(err)) => {
                error!("failed to fetch static config url: {err}");
                return String::new();
            }
            Err(_) => {
                error!("static config fetch timed out");
                return String::new();
            }
        };

    match response.json::<StaticConfig>().await {
        Ok(config) => {
            let static_url = config.static_url.unwrap_or_default();
            if !static_url.is_empty() {
                storage.set(STATIC_ASSET_URL_KEY, &static_url);
            }
            static_url
        }
        Err(err) => {
            error!("bad static config payload: {err}");
            String::new()
        }
    }
}

/// Fetch the serialized message blob for a static app.
pub async fn fetch_snapshot(
    client: &reqwest::Client,
    base_url: &str,
    static_app_id: &str,
) -> Result<Vec<u8>> {
    let path = format!(
        "{}/{}/protos.pb",
        base_url.trim_end_matches('/'),
        static_app_id
    );

    let response = tokio::time::timeout(STATIC_FETCH_TIMEOUT, client.get(&path).send())
        .await
        .map_err(|_| Error::timeout(format!("snapshot fetch for '{static_app_id}'")))?
        .map_err(|e| Error::connection(format!("snapshot fetch for '{static_app_id}' failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::http(response.status().as_u16(), path));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::connection(format!("snapshot body read failed: {e}")))?;
    Ok(bytes.to_vec())
}

/// Replay a decoded snapshot, one message at a time, preserving order.
pub async fn dispatch_messages(list: ForwardMsgList, event_tx: &mpsc::Sender<SessionEvent>) {
    for msg in list.messages {
        if event_tx
            .send(SessionEvent::Message(Box::new(msg)))
            .await
            .is_err()
        {
            debug!("static replay consumer went away; stopping dispatch");
            return;
        }
    }
}

/// Establish a static connection: resolve the asset base, fetch and decode
/// the snapshot, replay it, and report `StaticConnected`. Any failure goes
/// to the error surface and the state never reaches `StaticConnected`.
pub async fn establish_static_connection<E: Endpoints>(
    static_app_id: &str,
    storage: &dyn Storage,
    endpoints: &E,
    client: &reqwest::Client,
    config_url: &str,
    event_tx: &mpsc::Sender<SessionEvent>,
) {
    if event_tx
        .send(SessionEvent::state_changed(ConnectionState::StaticConnecting))
        .await
        .is_err()
    {
        return;
    }

    let static_url = resolve_static_config_url(storage, client, config_url).await;
    endpoints.set_static_config_url(&static_url);

    if static_url.is_empty() {
        let _ = event_tx
            .send(SessionEvent::error(format!(
                "Could not resolve the static asset location for app id '{static_app_id}'."
            )))
            .await;
        return;
    }

    let list = match fetch_snapshot(client, &static_url, static_app_id).await {
        Ok(bytes) => match ForwardMsgList::decode(&bytes) {
            Ok(list) => list,
            Err(err) => {
                let _ = event_tx
                    .send(SessionEvent::error(format!(
                        "The snapshot for app id '{static_app_id}' is unreadable: {err}"
                    )))
                    .await;
                return;
            }
        },
        Err(err) => {
            let _ = event_tx
                .send(SessionEvent::error(format!(
                    "Failed to retrieve the app snapshot. Please confirm the id is correct \
                     and try again. Given app id: '{static_app_id}' ({err})"
                )))
                .await;
            return;
        }
    };

    info!(
        "replaying static snapshot '{static_app_id}' ({} messages)",
        list.messages.len()
    );
    dispatch_messages(list, event_tx).await;

    let _ = event_tx
        .send(SessionEvent::state_changed(ConnectionState::StaticConnected))
        .await;
}
