//! Page sessions: the live resources each routed page holds while mounted.
//!
//! A session acquires its channel on mount and releases it on unmount, so
//! router sequencing guarantees at most one holder per channel.

use std::rc::Rc;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::{Backend, validate_report_filename};
use crate::error::{ApiError, RouteError, TransportError};
use crate::feeds::{ChatFeed, TerminalFeed, post_notice};
use crate::models::{NoticeLevel, ReportEntry, ServerStats};
use crate::result::ResultExt;
use crate::router::{View, routes};
use crate::store::{Store, keys};

/// Runs a detached future on the UI thread.
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

fn mount_failed(view: &str, e: &TransportError) -> RouteError {
    RouteError::MountFailed {
        view: view.to_string(),
        reason: e.to_string(),
    }
}

/// Dashboard: terminal channel plus server statistics.
pub struct DashboardSession {
    store: Store,
    feed: Rc<TerminalFeed>,
    backend: Rc<dyn Backend>,
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("feed", &self.feed)
            .finish_non_exhaustive()
    }
}

impl DashboardSession {
    pub fn new(store: Store, feed: Rc<TerminalFeed>, backend: Rc<dyn Backend>) -> Rc<Self> {
        Rc::new(Self {
            store,
            feed,
            backend,
        })
    }

    /// Refresh server statistics through `spawn` whenever a scan completes.
    pub fn refresh_on_completion(self: &Rc<Self>, spawn: Spawner) {
        let session = Rc::downgrade(self);
        self.feed.set_on_complete(move || {
            if let Some(session) = session.upgrade() {
                spawn(Box::pin(async move {
                    let _ = session.refresh_stats().await;
                }));
            }
        });
    }

    pub fn feed(&self) -> &Rc<TerminalFeed> {
        &self.feed
    }

    /// Restore history, open the terminal channel and pick up any staged scan.
    ///
    /// # Errors
    /// Returns the transport error when the channel cannot be opened.
    pub fn start(&self) -> Result<(), TransportError> {
        self.feed.restore();
        self.feed.connect()?;
        self.feed.consume_pending_scan();
        Ok(())
    }

    pub fn stop(&self) {
        self.feed.disconnect();
    }

    /// Fetch statistics and publish them on `serverStats`.
    ///
    /// # Errors
    /// Returns the backend error; the previous statistics are kept.
    pub async fn refresh_stats(&self) -> Result<ServerStats, ApiError> {
        let stats = self
            .backend
            .stats()
            .await
            .tap_err(|e| warn!(error = %e, "Failed to load stats"))?;
        self.store
            .set_as(keys::SERVER_STATS, &stats, false)
            .or_default_logged("Failed to publish stats");
        debug!(?stats, "Server stats refreshed");
        Ok(stats)
    }
}

#[async_trait(?Send)]
impl<T: ?Sized> View<T> for DashboardSession {
    async fn mount(&self, _target: &T) -> Result<(), RouteError> {
        self.start().map_err(|e| mount_failed(routes::DASHBOARD, &e))?;
        let _ = self.refresh_stats().await;
        Ok(())
    }

    async fn unmount(&self) {
        self.stop();
    }
}

/// Assistant page: the `ai-chat` channel.
#[derive(Debug)]
pub struct ChatSession {
    feed: Rc<ChatFeed>,
}

impl ChatSession {
    pub fn new(feed: Rc<ChatFeed>) -> Rc<Self> {
        Rc::new(Self { feed })
    }

    pub fn feed(&self) -> &Rc<ChatFeed> {
        &self.feed
    }
}

#[async_trait(?Send)]
impl<T: ?Sized> View<T> for ChatSession {
    async fn mount(&self, _target: &T) -> Result<(), RouteError> {
        self.feed
            .connect()
            .map_err(|e| mount_failed(routes::AI, &e))?;
        Ok(())
    }

    async fn unmount(&self) {
        self.feed.disconnect();
    }
}

/// Reports page: listing and deletion through the backend.
pub struct ReportsSession {
    store: Store,
    backend: Rc<dyn Backend>,
}

impl std::fmt::Debug for ReportsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportsSession").finish_non_exhaustive()
    }
}

impl ReportsSession {
    pub fn new(store: Store, backend: Rc<dyn Backend>) -> Rc<Self> {
        Rc::new(Self { store, backend })
    }

    pub fn reports(&self) -> Vec<ReportEntry> {
        self.store.get_as(keys::REPORTS)
    }

    /// Load the report list into `reports`, toggling `isLoading` around the call.
    ///
    /// # Errors
    /// Returns the backend error; the previous list is kept.
    pub async fn load(&self) -> Result<usize, ApiError> {
        self.store.set(keys::IS_LOADING, json!(true), false);
        let result = self.backend.reports().await;
        self.store.set(keys::IS_LOADING, json!(false), false);

        let reports = result.tap_err(|e| warn!(error = %e, "Failed to load reports"))?;
        self.store
            .set_as(keys::REPORTS, &reports, false)
            .or_default_logged("Failed to publish reports");
        Ok(reports.len())
    }

    /// Delete one report and drop it from `reports`.
    ///
    /// # Errors
    /// Returns the backend error; the list is unchanged.
    pub async fn delete(&self, filename: &str) -> Result<(), ApiError> {
        let filename = validate_report_filename(filename)?;
        match self.backend.delete_report(filename).await {
            Ok(()) => {
                info!(filename, "Report deleted");
                self.remove_local(filename);
                post_notice(&self.store, "Report deleted successfully", NoticeLevel::Success);
                Ok(())
            }
            Err(e) => {
                warn!(filename, error = %e, "Failed to delete report");
                post_notice(&self.store, "Failed to delete report", NoticeLevel::Error);
                Err(e)
            }
        }
    }

    /// Delete every listed report, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the first backend error; reports deleted before it stay removed.
    pub async fn delete_all(&self) -> Result<(), ApiError> {
        for report in self.reports() {
            if let Err(e) = self.backend.delete_report(&report.filename).await {
                warn!(filename = %report.filename, error = %e, "Failed to clear reports");
                post_notice(&self.store, "Failed to clear all reports", NoticeLevel::Error);
                return Err(e);
            }
            self.remove_local(&report.filename);
        }
        post_notice(&self.store, "All reports cleared", NoticeLevel::Success);
        Ok(())
    }

    fn remove_local(&self, filename: &str) {
        let remaining: Vec<ReportEntry> = self
            .reports()
            .into_iter()
            .filter(|r| r.filename != filename)
            .collect();
        self.store
            .set_as(keys::REPORTS, &remaining, false)
            .or_default_logged("Failed to publish reports");
    }
}

#[async_trait(?Send)]
impl<T: ?Sized> View<T> for ReportsSession {
    async fn mount(&self, _target: &T) -> Result<(), RouteError> {
        // A failed listing leaves the page up with the previous list.
        let _ = self.load().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::backend::ScriptedBackend;
    use crate::models::Metric;

    fn report(name: &str) -> ReportEntry {
        ReportEntry {
            filename: name.to_string(),
            size: Metric::Count(1),
            created: String::new(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_reports_load_and_delete() {
        let store = Store::in_memory();
        let backend = Rc::new(ScriptedBackend::new());
        backend.push_reports(Ok(vec![report("a.html"), report("b.json")]));
        let session = ReportsSession::new(store.clone(), backend.clone());

        assert_eq!(session.load().await.unwrap(), 2);
        assert_eq!(store.get(keys::IS_LOADING), Some(json!(false)));

        session.delete("a.html").await.unwrap();
        assert_eq!(session.reports(), vec![report("b.json")]);
        assert_eq!(store.get(keys::NOTICE).unwrap()["level"], "success");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failed_delete_keeps_list() {
        let store = Store::in_memory();
        let backend = Rc::new(ScriptedBackend::new());
        backend.push_reports(Ok(vec![report("a.html")]));
        backend.fail_deletes(ApiError::Status {
            status: 500,
            text: "Internal Server Error".to_string(),
        });
        let session = ReportsSession::new(store.clone(), backend);
        session.load().await.unwrap();

        assert!(session.delete("a.html").await.is_err());
        assert!(session.delete_all().await.is_err());
        assert_eq!(session.reports(), vec![report("a.html")]);
        assert_eq!(store.get(keys::NOTICE).unwrap()["level"], "error");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_delete_all_empties_list() {
        let store = Store::in_memory();
        let backend = Rc::new(ScriptedBackend::new());
        backend.push_reports(Ok(vec![report("a.html"), report("b.json")]));
        let session = ReportsSession::new(store, backend.clone());
        session.load().await.unwrap();

        session.delete_all().await.unwrap();
        assert!(session.reports().is_empty());
        assert_eq!(backend.deleted(), vec!["a.html", "b.json"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failed_listing_keeps_previous() {
        let store = Store::in_memory();
        let backend = Rc::new(ScriptedBackend::new());
        backend.push_reports(Ok(vec![report("a.html")]));
        backend.push_reports(Err(ApiError::Network("offline".to_string())));
        let session = ReportsSession::new(store, backend);

        session.load().await.unwrap();
        assert!(session.load().await.is_err());
        assert_eq!(session.reports().len(), 1);
    }
}
