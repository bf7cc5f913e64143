//! Forward-message dedup cache.
//!
//! The backend never resends identical bytes within the retention window:
//! a message flagged `cacheable` is stored under its content hash, and later
//! runs send a hash-only reference instead. A reference to an unknown hash
//! is resolved with one HTTP fetch *before* the message is dispatched, so
//! the delta stream stays strictly ordered.
//!
//! Entries age by run count, not wall clock: each completed run advances the
//! counter, and entries unreferenced for more than `max_age` runs are
//! evicted.

use std::collections::HashMap;

use weft_core::prelude::*;
use weft_core::wire::{ForwardMsg, ForwardMsgPayload};

use crate::endpoints::Endpoints;

#[derive(Debug, Clone)]
struct CacheEntry {
    msg: ForwardMsg,
    /// Run counter value when this entry was last inserted or referenced.
    last_ref_run_count: u32,
}

/// Hash-keyed cache of forward-message bodies, owned by the live
/// connection. One session, one cache; nothing process-wide.
#[derive(Debug, Default)]
pub struct ForwardMsgCache {
    entries: HashMap<String, CacheEntry>,
    run_count: u32,
}

impl ForwardMsgCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    /// Store a message body under its hash. Within a session a hash only
    /// ever maps to one body, so re-insertion just refreshes the age.
    pub fn insert(&mut self, hash: String, msg: ForwardMsg) {
        let run_count = self.run_count;
        self.entries.insert(
            hash,
            CacheEntry {
                msg,
                last_ref_run_count: run_count,
            },
        );
    }

    fn get_and_touch(&mut self, hash: &str) -> Option<ForwardMsg> {
        let entry = self.entries.get_mut(hash)?;
        entry.last_ref_run_count = self.run_count;
        Some(entry.msg.clone())
    }

    /// Advance the run counter and evict entries unreferenced for more than
    /// `max_age` runs.
    pub fn increment_run_count(&mut self, max_age: u32) {
        self.run_count += 1;
        let current = self.run_count;
        self.entries.retain(|hash, entry| {
            let age = current - entry.last_ref_run_count;
            let keep = age <= max_age;
            if !keep {
                debug!("evicting cached message {hash} (age {age} > {max_age})");
            }
            keep
        });
    }

    /// Resolve one incoming message against the cache.
    ///
    /// Non-reference messages are cached when flagged cacheable and passed
    /// through. References resolve to the cached body, fetching it first on
    /// a miss; the resolved message adopts the *reference's* metadata, since
    /// that is what places the body in this run's tree.
    pub async fn process_message<E: Endpoints>(
        &mut self,
        endpoints: &E,
        msg: ForwardMsg,
    ) -> Result<ForwardMsg> {
        let hash = match &msg.payload {
            ForwardMsgPayload::RefHash { hash } => hash.clone(),
            _ => {
                if msg.metadata.cacheable {
                    if let Some(hash) = &msg.hash {
                        self.insert(hash.clone(), msg.clone());
                    }
                }
                return Ok(msg);
            }
        };

        let body = match self.get_and_touch(&hash) {
            Some(cached) => cached,
            None => {
                debug!("message cache miss for {hash}; fetching from server");
                let bytes = endpoints.fetch_cached_forward_msg(&hash).await?;
                let fetched = ForwardMsg::decode(&bytes)?;
                if fetched.is_reference() {
                    return Err(Error::protocol(format!(
                        "cached message {hash} resolved to another reference"
                    )));
                }
                self.insert(hash.clone(), fetched.clone());
                fetched
            }
        };

        Ok(ForwardMsg {
            hash: Some(hash),
            metadata: msg.metadata,
            payload: body.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use url::Url;
    use weft_core::wire::{Delta, ForwardMsgMetadata};
    use weft_core::element::TextElement;
    use weft_core::Element;

    /// Endpoints double that serves canned cached-message bodies and counts
    /// fetches.
    #[derive(Default)]
    struct ScriptedEndpoints {
        bodies: Mutex<HashMap<String, Vec<u8>>>,
        fetches: AtomicUsize,
    }

    impl ScriptedEndpoints {
        fn with_body(hash: &str, msg: &ForwardMsg) -> Self {
            let endpoints = Self::default();
            endpoints
                .bodies
                .lock()
                .unwrap()
                .insert(hash.to_string(), msg.encode().unwrap());
            endpoints
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl Endpoints for ScriptedEndpoints {
        fn set_base_uri(&self, _base: &Url) {}

        fn set_static_config_url(&self, _url: &str) {}

        fn build_media_url(&self, url: &str) -> String {
            url.to_string()
        }

        fn build_app_page_url(&self, _base: Option<&str>, page_name: &str) -> String {
            page_name.to_string()
        }

        fn build_component_url(&self, _component_name: &str, path: &str) -> String {
            path.to_string()
        }

        async fn fetch_cached_forward_msg(&self, hash: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .lock()
                .unwrap()
                .get(hash)
                .cloned()
                .ok_or_else(|| Error::http(404, format!("/_weft/message?hash={hash}")))
        }

        async fn upload_file(
            &self,
            _upload_url: &str,
            _file_name: &str,
            _data: Vec<u8>,
            _session_id: &str,
        ) -> Result<()> {
            unreachable!("not used by cache tests")
        }

        async fn delete_file(&self, _file_url: &str, _session_id: &str) -> Result<()> {
            unreachable!("not used by cache tests")
        }
    }

    fn cacheable_msg(hash: &str, body: &str) -> ForwardMsg {
        ForwardMsg {
            hash: Some(hash.to_string()),
            metadata: ForwardMsgMetadata {
                cacheable: true,
                delta_path: vec![0, 0],
            },
            payload: ForwardMsgPayload::Delta(Delta::NewElement {
                element: Element::Text(TextElement { body: body.into() }),
            }),
        }
    }

    fn reference(hash: &str, path: &[usize]) -> ForwardMsg {
        ForwardMsg {
            hash: None,
            metadata: ForwardMsgMetadata {
                cacheable: false,
                delta_path: path.to_vec(),
            },
            payload: ForwardMsgPayload::RefHash {
                hash: hash.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_cacheable_message_is_inserted_and_passed_through() {
        let mut cache = ForwardMsgCache::new();
        let endpoints = ScriptedEndpoints::default();

        let msg = cacheable_msg("h1", "hello");
        let out = cache.process_message(&endpoints, msg.clone()).await.unwrap();
        assert_eq!(out, msg);
        assert!(cache.contains("h1"));
        assert_eq!(endpoints.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_known_reference_resolves_without_fetch() {
        let mut cache = ForwardMsgCache::new();
        let endpoints = ScriptedEndpoints::default();

        cache
            .process_message(&endpoints, cacheable_msg("h1", "hello"))
            .await
            .unwrap();

        let out = cache
            .process_message(&endpoints, reference("h1", &[0, 3]))
            .await
            .unwrap();

        assert_eq!(endpoints.fetch_count(), 0, "hit must not fetch");
        // The body came from the cache, the placement from the reference.
        assert_eq!(out.metadata.delta_path, vec![0, 3]);
        assert!(matches!(
            out.payload,
            ForwardMsgPayload::Delta(Delta::NewElement { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_reference_fetches_once_then_caches() {
        let mut cache = ForwardMsgCache::new();
        let body = cacheable_msg("h1", "fetched");
        let endpoints = ScriptedEndpoints::with_body("h1", &body);

        cache
            .process_message(&endpoints, reference("h1", &[0, 0]))
            .await
            .unwrap();
        assert_eq!(endpoints.fetch_count(), 1);

        cache
            .process_message(&endpoints, reference("h1", &[0, 1]))
            .await
            .unwrap();
        assert_eq!(endpoints.fetch_count(), 1, "second reference must hit the cache");
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_as_recoverable() {
        let mut cache = ForwardMsgCache::new();
        let endpoints = ScriptedEndpoints::default();

        let err = cache
            .process_message(&endpoints, reference("missing", &[0, 0]))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_entry_at_max_age_survives_but_older_evicts() {
        let mut cache = ForwardMsgCache::new();
        let endpoints = ScriptedEndpoints::default();
        cache
            .process_message(&endpoints, cacheable_msg("h1", "hello"))
            .await
            .unwrap();

        cache.increment_run_count(2);
        cache.increment_run_count(2);
        assert!(cache.contains("h1"), "age == max_age must survive");

        cache.increment_run_count(2);
        assert!(!cache.contains("h1"), "age > max_age must evict");
    }

    #[tokio::test]
    async fn test_reference_refreshes_entry_age() {
        let mut cache = ForwardMsgCache::new();
        let endpoints = ScriptedEndpoints::default();
        cache
            .process_message(&endpoints, cacheable_msg("h1", "hello"))
            .await
            .unwrap();

        cache.increment_run_count(2);
        cache.increment_run_count(2);
        // Touch at age 2; the next two runs leave it at age 2 again.
        cache
            .process_message(&endpoints, reference("h1", &[0, 0]))
            .await
            .unwrap();
        cache.increment_run_count(2);
        cache.increment_run_count(2);
        assert!(cache.contains("h1"));
        assert_eq!(endpoints.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_eviction_forces_refetch() {
        let mut cache = ForwardMsgCache::new();
        let body = cacheable_msg("h1", "hello");
        let endpoints = ScriptedEndpoints::with_body("h1", &body);

        cache
            .process_message(&endpoints, body.clone())
            .await
            .unwrap();
        for _ in 0..3 {
            cache.increment_run_count(2);
        }
        assert!(!cache.contains("h1"));

        cache
            .process_message(&endpoints, reference("h1", &[0, 0]))
            .await
            .unwrap();
        assert_eq!(endpoints.fetch_count(), 1, "post-eviction reference must refetch");
    }

    #[tokio::test]
    async fn test_non_cacheable_message_not_inserted() {
        let mut cache = ForwardMsgCache::new();
        let endpoints = ScriptedEndpoints::default();

        let mut msg = cacheable_msg("h1", "hello");
        msg.metadata.cacheable = false;
        cache.process_message(&endpoints, msg).await.unwrap();
        assert!(cache.is_empty());
    }
}
