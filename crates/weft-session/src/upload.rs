//! File upload client with cancellation.
//!
//! Uploads go to a backend-supplied URL and are associated with the
//! session. A user-initiated cancel is *not* an error: the outcome is
//! [`UploadOutcome::Cancelled`], the error surface stays quiet, and the
//! client best-effort deletes whatever partial data the backend may have
//! already received.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use weft_core::element::FileUploaderElement;
use weft_core::error::{Error, Result};

use crate::endpoints::Endpoints;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancellation handle for an in-flight upload. Clone freely; cancelling
/// any clone cancels the upload.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for checks the current value first, so a cancel that
        // happened before this call resolves immediately.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// How an upload ended, cancellation being a non-error outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a file against the uploader's declared constraints before any
/// bytes move. Failures are per-widget recoverable errors, surfaced inline
/// by the widget; they never touch the connection.
pub fn validate_file(file_name: &str, size_bytes: u64, config: &FileUploaderElement) -> Result<()> {
    let max_bytes = u64::from(config.max_upload_size_mb) * 1024 * 1024;
    if size_bytes > max_bytes {
        return Err(Error::upload(format!(
            "'{file_name}' exceeds the {} MB upload limit",
            config.max_upload_size_mb
        )));
    }

    if !config.allowed_types.is_empty() {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !config.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&extension)) {
            return Err(Error::upload(format!(
                "'{file_name}' has a disallowed type; expected one of: {}",
                config.allowed_types.join(", ")
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Upload `data` to `upload_url`, racing the cancel handle.
///
/// On cancellation the upload future is dropped mid-flight and a
/// best-effort delete is sent for `file_url`, since the backend may already
/// hold partial data. Delete failures are logged, not raised — there is
/// nothing actionable for the user in a failed cleanup.
pub async fn upload_file<E: Endpoints>(
    endpoints: &E,
    upload_url: &str,
    file_url: &str,
    file_name: &str,
    data: Vec<u8>,
    session_id: &str,
    cancel: &CancelHandle,
) -> Result<UploadOutcome> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            debug!("upload of '{file_name}' cancelled");
            if let Err(err) = endpoints.delete_file(file_url, session_id).await {
                debug!("post-cancel cleanup of '{file_url}' failed: {err}");
            }
            Ok(UploadOutcome::Cancelled)
        }

        result = endpoints.upload_file(upload_url, file_name, data, session_id) => {
            result?;
            Ok(UploadOutcome::Completed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use url::Url;
    use weft_core::element::WidgetConfig;

    fn uploader(max_mb: u32, allowed: &[&str]) -> FileUploaderElement {
        FileUploaderElement {
            widget: WidgetConfig::new("u1"),
            label: "Upload".into(),
            allowed_types: allowed.iter().map(|s| s.to_string()).collect(),
            max_upload_size_mb: max_mb,
        }
    }

    // -- validate_file -------------------------------------------------------

    #[test]
    fn test_validate_accepts_within_limits() {
        let config = uploader(10, &["csv", "txt"]);
        assert!(validate_file("data.csv", 1024, &config).is_ok());
        assert!(validate_file("NOTES.TXT", 1024, &config).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversize() {
        let config = uploader(1, &[]);
        let err = validate_file("big.bin", 2 * 1024 * 1024, &config).unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("1 MB"));
    }

    #[test]
    fn test_validate_rejects_disallowed_type() {
        let config = uploader(10, &["csv"]);
        let err = validate_file("image.png", 10, &config).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_validate_no_extension_with_type_filter() {
        let config = uploader(10, &["csv"]);
        assert!(validate_file("README", 10, &config).is_err());
    }

    #[test]
    fn test_validate_any_type_when_unrestricted() {
        let config = uploader(10, &[]);
        assert!(validate_file("anything.xyz", 10, &config).is_ok());
    }

    // -- cancellation --------------------------------------------------------

    /// Endpoints double whose upload never finishes; records deletes.
    #[derive(Default)]
    struct HangingUploadEndpoints {
        deletes: Mutex<Vec<String>>,
        uploads_started: AtomicUsize,
    }

    impl Endpoints for HangingUploadEndpoints {
        fn set_base_uri(&self, _base: &Url) {}
        fn set_static_config_url(&self, _url: &str) {}
        fn build_media_url(&self, url: &str) -> String {
            url.to_string()
        }
        fn build_app_page_url(&self, _base: Option<&str>, page: &str) -> String {
            page.to_string()
        }
        fn build_component_url(&self, _component: &str, path: &str) -> String {
            path.to_string()
        }

        async fn fetch_cached_forward_msg(&self, _hash: &str) -> Result<Vec<u8>> {
            unreachable!("not used by upload tests")
        }

        async fn upload_file(
            &self,
            _upload_url: &str,
            _file_name: &str,
            _data: Vec<u8>,
            _session_id: &str,
        ) -> Result<()> {
            self.uploads_started.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
            unreachable!()
        }

        async fn delete_file(&self, file_url: &str, _session_id: &str) -> Result<()> {
            self.deletes.lock().unwrap().push(file_url.to_string());
            Ok(())
        }
    }

    /// Endpoints double whose upload completes immediately.
    #[derive(Default)]
    struct InstantUploadEndpoints;

    impl Endpoints for InstantUploadEndpoints {
        fn set_base_uri(&self, _base: &Url) {}
        fn set_static_config_url(&self, _url: &str) {}
        fn build_media_url(&self, url: &str) -> String {
            url.to_string()
        }
        fn build_app_page_url(&self, _base: Option<&str>, page: &str) -> String {
            page.to_string()
        }
        fn build_component_url(&self, _component: &str, path: &str) -> String {
            path.to_string()
        }

        async fn fetch_cached_forward_msg(&self, _hash: &str) -> Result<Vec<u8>> {
            unreachable!("not used by upload tests")
        }

        async fn upload_file(
            &self,
            _upload_url: &str,
            _file_name: &str,
            _data: Vec<u8>,
            _session_id: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn delete_file(&self, _file_url: &str, _session_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_completed_upload() {
        let endpoints = InstantUploadEndpoints;
        let cancel = CancelHandle::new();
        let outcome = upload_file(
            &endpoints,
            "/upload/u1",
            "/files/u1",
            "data.csv",
            vec![1, 2, 3],
            "session-1",
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(outcome, UploadOutcome::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_upload_is_not_an_error_and_cleans_up() {
        let endpoints = Arc::new(HangingUploadEndpoints::default());
        let cancel = CancelHandle::new();

        let task = {
            let endpoints = Arc::clone(&endpoints);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                upload_file(
                    endpoints.as_ref(),
                    "/upload/u1",
                    "/files/u1",
                    "slow.bin",
                    vec![0; 1024],
                    "session-1",
                    &cancel,
                )
                .await
            })
        };

        // Let the upload start, then cancel it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, UploadOutcome::Cancelled);
        assert_eq!(
            *endpoints.deletes.lock().unwrap(),
            vec!["/files/u1".to_string()],
            "cancel must best-effort delete partial data"
        );
    }

    #[tokio::test]
    async fn test_pre_cancelled_handle_skips_upload() {
        let endpoints = HangingUploadEndpoints::default();
        let cancel = CancelHandle::new();
        cancel.cancel();

        let outcome = upload_file(
            &endpoints,
            "/upload/u1",
            "/files/u1",
            "never.bin",
            vec![],
            "session-1",
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, UploadOutcome::Cancelled);
        assert_eq!(endpoints.uploads_started.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_handle_is_idempotent() {
        let cancel = CancelHandle::new();
        assert!(!cancel.is_cancelled());
        cancel.cancel();
        cancel.cancel();
        assert!(cancel.is_cancelled());
    }
}
