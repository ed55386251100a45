//! HTTP API of the scanning backend.
//!
//! The core only defines the seam; the browser shell implements it over
//! `fetch`. Requests are never retried here.

use std::cell::RefCell;
use std::collections::VecDeque;

use async_trait::async_trait;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{ReportEntry, ServerStats};

pub mod paths {
    pub const STATS: &str = "/api/stats";
    pub const REPORTS: &str = "/api/reports";
    /// Static location reports are served from for viewing.
    pub const REPORT_FILES: &str = "/reports";
}

/// Remote operations used by the console.
#[async_trait(?Send)]
pub trait Backend {
    /// # Errors
    /// `ApiError::Status` for non-success responses, `Network`/`Decode` otherwise.
    async fn stats(&self) -> Result<ServerStats, ApiError>;

    /// # Errors
    /// `ApiError::Status` for non-success responses, `Network`/`Decode` otherwise.
    async fn reports(&self) -> Result<Vec<ReportEntry>, ApiError>;

    /// # Errors
    /// `ApiError::InvalidFilename` before any request is made for a name that
    /// could escape the reports directory.
    async fn delete_report(&self, filename: &str) -> Result<(), ApiError>;
}

/// Reject names that are empty or contain path separators or `..`.
///
/// # Errors
/// Returns `ApiError::InvalidFilename`.
pub fn validate_report_filename(filename: &str) -> Result<&str, ApiError> {
    let invalid = filename.trim().is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\');
    if invalid {
        return Err(ApiError::InvalidFilename(filename.to_string()));
    }
    Ok(filename)
}

/// `DELETE` target for one report, with the name percent-encoded.
///
/// # Errors
/// `InvalidFilename` for an unsafe name, `Network` when the origin does not parse.
pub fn report_url(config: &ClientConfig, filename: &str) -> Result<Url, ApiError> {
    under(config, paths::REPORTS, filename)
}

/// Viewing location for one report.
///
/// # Errors
/// `InvalidFilename` for an unsafe name, `Network` when the origin does not parse.
pub fn report_file_url(config: &ClientConfig, filename: &str) -> Result<Url, ApiError> {
    under(config, paths::REPORT_FILES, filename)
}

fn under(config: &ClientConfig, base: &str, filename: &str) -> Result<Url, ApiError> {
    let filename = validate_report_filename(filename)?;
    let mut url = config
        .api_url(base)
        .map_err(|e| ApiError::Network(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::Network(format!("cannot extend {base}")))?
        .push(filename);
    Ok(url)
}

/// Icon shown next to a report, by extension.
pub fn report_icon(filename: &str) -> &'static str {
    if filename.ends_with(".html") {
        "🌐"
    } else if filename.ends_with(".json") {
        "📊"
    } else {
        "📄"
    }
}

/// Case-insensitive filename filter.
pub fn filter_reports<'a>(reports: &'a [ReportEntry], term: &str) -> Vec<&'a ReportEntry> {
    let term = term.to_lowercase();
    reports
        .iter()
        .filter(|r| r.filename.to_lowercase().contains(&term))
        .collect()
}

/// Backend answering from queued responses; unqueued calls fail with
/// `ApiError::Network`.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    stats: RefCell<VecDeque<Result<ServerStats, ApiError>>>,
    reports: RefCell<VecDeque<Result<Vec<ReportEntry>, ApiError>>>,
    deleted: RefCell<Vec<String>>,
    delete_error: RefCell<Option<ApiError>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stats(&self, response: Result<ServerStats, ApiError>) {
        self.stats.borrow_mut().push_back(response);
    }

    pub fn push_reports(&self, response: Result<Vec<ReportEntry>, ApiError>) {
        self.reports.borrow_mut().push_back(response);
    }

    /// Make every following delete fail with `error`.
    pub fn fail_deletes(&self, error: ApiError) {
        *self.delete_error.borrow_mut() = Some(error);
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }
}

fn unscripted(what: &str) -> ApiError {
    ApiError::Network(format!("no scripted {what} response"))
}

#[async_trait(?Send)]
impl Backend for ScriptedBackend {
    async fn stats(&self) -> Result<ServerStats, ApiError> {
        self.stats
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("stats")))
    }

    async fn reports(&self) -> Result<Vec<ReportEntry>, ApiError> {
        self.reports
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("reports")))
    }

    async fn delete_report(&self, filename: &str) -> Result<(), ApiError> {
        let filename = validate_report_filename(filename)?;
        if let Some(error) = self.delete_error.borrow().clone() {
            return Err(error);
        }
        self.deleted.borrow_mut().push(filename.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::models::Metric;

    #[test]
    fn test_filename_validation() {
        assert!(validate_report_filename("scan_2024.html").is_ok());
        for bad in ["", "  ", "../etc/passwd", "a/b.json", "a\\b.json", ".."] {
            assert_eq!(
                validate_report_filename(bad),
                Err(ApiError::InvalidFilename(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_report_url_encodes_name() {
        let config = ClientConfig::default().with_origin("http://localhost:8000");
        assert_eq!(
            report_url(&config, "scan report.json").unwrap().as_str(),
            "http://localhost:8000/api/reports/scan%20report.json"
        );
        assert_eq!(
            report_file_url(&config, "x.html").unwrap().as_str(),
            "http://localhost:8000/reports/x.html"
        );
        assert!(report_url(&config, "../x").is_err());
    }

    #[test]
    fn test_icons_and_filter() {
        assert_eq!(report_icon("a.html"), "🌐");
        assert_eq!(report_icon("a.json"), "📊");
        assert_eq!(report_icon("a.txt"), "📄");

        let reports = vec![
            ReportEntry {
                filename: "Example_com.html".to_string(),
                size: Metric::Count(10),
                created: String::new(),
            },
            ReportEntry {
                filename: "other.json".to_string(),
                size: Metric::default(),
                created: String::new(),
            },
        ];
        let hits = filter_reports(&reports, "EXAMPLE");
        assert_eq!(hits.len(), 1);
        assert_eq!(filter_reports(&reports, "").len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_scripted_backend() {
        let backend = ScriptedBackend::new();
        backend.push_stats(Ok(ServerStats::default()));
        assert!(backend.stats().await.is_ok());
        assert!(matches!(backend.stats().await, Err(ApiError::Network(_))));

        backend.delete_report("a.html").await.unwrap();
        assert!(backend.delete_report("../a").await.is_err());
        assert_eq!(backend.deleted(), vec!["a.html"]);
    }
}
