//! View router.
//!
//! Exactly one registered view is active at a time. A transition awaits the
//! outgoing view's `unmount`, writes `currentView`, then awaits the incoming
//! view's `mount`, so two views never hold live resources together.
//!
//! Transitions are single-flight: a request made while one is running is
//! parked (a later request replaces an earlier parked one) and executed as
//! soon as the running transition finishes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::RouteError;
use crate::store::{Store, keys};

/// Route names as constants for type safety
pub mod routes {
    pub const DASHBOARD: &str = "dashboard";
    pub const SCANNER: &str = "scanner";
    pub const REPORTS: &str = "reports";
    pub const AI: &str = "ai";
    pub const SETTINGS: &str = "settings";

    pub const ALL: [&str; 5] = [DASHBOARD, SCANNER, REPORTS, AI, SETTINGS];
}

/// Extract a route name from a location hash such as `#ai` or `#/reports`.
///
/// An empty hash yields `default`. The name is not checked against the
/// registered views; the router falls back on unknown names.
pub fn route_from_hash(hash: &str, default: &str) -> String {
    let name = hash.trim_start_matches('#').trim_start_matches('/');
    let name = name.split(['?', '/']).next().unwrap_or_default().trim();
    if name.is_empty() {
        default.to_string()
    } else {
        name.to_string()
    }
}

/// A page the router can activate.
///
/// `T` is the rendering target handed to every mount.
#[async_trait(?Send)]
pub trait View<T: ?Sized> {
    /// Render into `target` and acquire any live resources.
    ///
    /// # Errors
    /// Returns `RouteError::MountFailed` when the view cannot start; it is
    /// still considered active and will be unmounted on the next transition.
    async fn mount(&self, target: &T) -> Result<(), RouteError>;

    /// Release everything acquired by `mount`.
    async fn unmount(&self) {}
}

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The requested view is now active.
    Activated(String),
    /// The requested name was unknown; the default view is active instead.
    Redirected { requested: String, view: String },
    /// The view was already active; nothing ran.
    Unchanged(String),
    /// A transition was in flight; the request runs after it.
    Queued(String),
}

impl NavigationOutcome {
    /// Name of the view this outcome refers to.
    pub fn view(&self) -> &str {
        match self {
            Self::Activated(view) | Self::Unchanged(view) | Self::Queued(view) => view,
            Self::Redirected { view, .. } => view,
        }
    }
}

struct FlightGuard<'a>(&'a Cell<bool>);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Router over views rendering into a `T`.
pub struct Router<T: 'static> {
    store: Store,
    target: T,
    default_view: String,
    views: RefCell<Vec<(String, Rc<dyn View<T>>)>>,
    active: RefCell<Option<String>>,
    in_flight: Cell<bool>,
    parked: RefCell<Option<String>>,
}

impl<T: 'static> std::fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("default_view", &self.default_view)
            .field("active", &self.active.borrow())
            .field("in_flight", &self.in_flight.get())
            .finish()
    }
}

impl<T: 'static> Router<T> {
    pub fn new(store: Store, target: T, default_view: impl Into<String>) -> Self {
        Self {
            store,
            target,
            default_view: default_view.into(),
            views: RefCell::new(Vec::new()),
            active: RefCell::new(None),
            in_flight: Cell::new(false),
            parked: RefCell::new(None),
        }
    }

    /// Register `view` under `name`, replacing any previous registration.
    pub fn register(&self, name: &str, view: Rc<dyn View<T>>) {
        let mut views = self.views.borrow_mut();
        match views.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = view,
            None => views.push((name.to_string(), view)),
        }
    }

    #[must_use]
    pub fn with_view(self, name: &str, view: Rc<dyn View<T>>) -> Self {
        self.register(name, view);
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Name of the active view, `None` before the first navigation.
    pub fn active(&self) -> Option<String> {
        self.active.borrow().clone()
    }

    pub fn is_transitioning(&self) -> bool {
        self.in_flight.get()
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Navigate to `requested`.
    ///
    /// # Errors
    /// Returns `RouteError::NotFound` when neither the requested nor the
    /// default view is registered, and the view's error when the final mount
    /// of this call fails.
    pub async fn navigate(&self, requested: &str) -> Result<NavigationOutcome, RouteError> {
        if self.in_flight.get() {
            debug!(view = requested, "Transition in flight, parking navigation");
            *self.parked.borrow_mut() = Some(requested.to_string());
            return Ok(NavigationOutcome::Queued(requested.to_string()));
        }

        self.in_flight.set(true);
        let _guard = FlightGuard(&self.in_flight);

        let mut outcome = self.transition(requested).await;
        loop {
            let next = self.parked.borrow_mut().take();
            let Some(next) = next else {
                break;
            };
            outcome = self.transition(&next).await;
        }
        outcome
    }

    async fn transition(&self, requested: &str) -> Result<NavigationOutcome, RouteError> {
        let (name, incoming) = self.resolve(requested)?;

        let current = self.active();
        if current.as_deref() == Some(name.as_str()) {
            debug!(view = %name, "View already active");
            return Ok(NavigationOutcome::Unchanged(name));
        }

        if let Some(outgoing_name) = current {
            if let Some(outgoing) = self.lookup(&outgoing_name) {
                debug!(view = %outgoing_name, "Unmounting view");
                outgoing.unmount().await;
            }
        }

        *self.active.borrow_mut() = Some(name.clone());
        self.store.set(keys::CURRENT_VIEW, json!(name), false);
        info!(view = %name, "Mounting view");

        incoming.mount(&self.target).await.map_err(|e| {
            error!(view = %name, error = %e, "View failed to mount");
            e
        })?;

        if name == requested {
            Ok(NavigationOutcome::Activated(name))
        } else {
            Ok(NavigationOutcome::Redirected {
                requested: requested.to_string(),
                view: name,
            })
        }
    }

    fn resolve(&self, requested: &str) -> Result<(String, Rc<dyn View<T>>), RouteError> {
        if let Some(view) = self.lookup(requested) {
            return Ok((requested.to_string(), view));
        }
        warn!(
            view = requested,
            fallback = %self.default_view,
            "{}",
            RouteError::NotFound(requested.to_string())
        );
        self.lookup(&self.default_view)
            .map(|view| (self.default_view.clone(), view))
            .ok_or_else(|| RouteError::NotFound(requested.to_string()))
    }

    fn lookup(&self, name: &str) -> Option<Rc<dyn View<T>>> {
        self.views
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, view)| Rc::clone(view))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    struct LoggingView {
        name: &'static str,
        log: Log,
        yields: usize,
    }

    #[async_trait(?Send)]
    impl View<()> for LoggingView {
        async fn mount(&self, _target: &()) -> Result<(), RouteError> {
            for _ in 0..self.yields {
                tokio::task::yield_now().await;
            }
            self.log.borrow_mut().push(format!("mount:{}", self.name));
            Ok(())
        }

        async fn unmount(&self) {
            self.log.borrow_mut().push(format!("unmount:{}", self.name));
        }
    }

    struct FailingView;

    #[async_trait(?Send)]
    impl View<()> for FailingView {
        async fn mount(&self, _target: &()) -> Result<(), RouteError> {
            Err(RouteError::MountFailed {
                view: routes::REPORTS.to_string(),
                reason: "backend down".to_string(),
            })
        }
    }

    fn router_with(log: &Log, yields: usize) -> (Store, Router<()>) {
        let store = Store::in_memory();
        let router = Router::new(store.clone(), (), routes::DASHBOARD);
        for name in [routes::DASHBOARD, routes::SCANNER, routes::AI, routes::SETTINGS] {
            router.register(
                name,
                Rc::new(LoggingView {
                    name,
                    log: Rc::clone(log),
                    yields,
                }),
            );
        }
        (store, router)
    }

    #[test]
    fn test_route_constants_are_unique() {
        let unique: std::collections::HashSet<_> = routes::ALL.iter().collect();
        assert_eq!(unique.len(), routes::ALL.len());
    }

    #[test]
    fn test_route_from_hash() {
        assert_eq!(route_from_hash("#ai", routes::DASHBOARD), "ai");
        assert_eq!(route_from_hash("#/reports", routes::DASHBOARD), "reports");
        assert_eq!(route_from_hash("#scanner?x=1", routes::DASHBOARD), "scanner");
        assert_eq!(route_from_hash("", routes::DASHBOARD), "dashboard");
        assert_eq!(route_from_hash("#", routes::DASHBOARD), "dashboard");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_unmount_runs_before_mount() {
        let log: Log = Rc::default();
        let (store, router) = router_with(&log, 0);

        router.navigate(routes::DASHBOARD).await.unwrap();
        router.navigate(routes::AI).await.unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["mount:dashboard", "unmount:dashboard", "mount:ai"]
        );
        assert_eq!(store.get(keys::CURRENT_VIEW), Some(json!("ai")));
        assert_eq!(router.active().as_deref(), Some("ai"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_unknown_route_redirects_to_default() {
        let log: Log = Rc::default();
        let (store, router) = router_with(&log, 0);
        router.navigate(routes::AI).await.unwrap();

        let outcome = router.navigate("billing").await.unwrap();

        assert_eq!(
            outcome,
            NavigationOutcome::Redirected {
                requested: "billing".to_string(),
                view: "dashboard".to_string()
            }
        );
        assert_eq!(store.get(keys::CURRENT_VIEW), Some(json!("dashboard")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_missing_default_is_not_found() {
        let router: Router<()> = Router::new(Store::in_memory(), (), routes::DASHBOARD);
        let result = router.navigate("anything").await;
        assert_eq!(result, Err(RouteError::NotFound("anything".to_string())));
        assert_eq!(router.active(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_navigating_to_active_view_is_noop() {
        let log: Log = Rc::default();
        let (_, router) = router_with(&log, 0);
        router.navigate(routes::SCANNER).await.unwrap();

        let outcome = router.navigate(routes::SCANNER).await.unwrap();

        assert_eq!(outcome, NavigationOutcome::Unchanged("scanner".to_string()));
        assert_eq!(*log.borrow(), vec!["mount:scanner"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_request_is_parked_and_runs_after() {
        let log: Log = Rc::default();
        let (_, router) = router_with(&log, 3);

        let (first, second) =
            tokio::join!(router.navigate(routes::SCANNER), router.navigate(routes::AI));

        assert_eq!(second.unwrap(), NavigationOutcome::Queued("ai".to_string()));
        assert_eq!(first.unwrap(), NavigationOutcome::Activated("ai".to_string()));
        assert_eq!(
            *log.borrow(),
            vec!["mount:scanner", "unmount:scanner", "mount:ai"]
        );
        assert!(!router.is_transitioning());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_latest_parked_request_wins() {
        let log: Log = Rc::default();
        let (_, router) = router_with(&log, 3);

        let (_, _, _) = tokio::join!(
            router.navigate(routes::SCANNER),
            router.navigate(routes::AI),
            router.navigate(routes::SETTINGS)
        );

        assert_eq!(
            *log.borrow(),
            vec!["mount:scanner", "unmount:scanner", "mount:settings"]
        );
        assert_eq!(router.active().as_deref(), Some("settings"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_mount_failure_is_reported_and_view_stays_active() {
        let log: Log = Rc::default();
        let (store, router) = router_with(&log, 0);
        router.register(routes::REPORTS, Rc::new(FailingView));

        let result = router.navigate(routes::REPORTS).await;

        assert!(matches!(result, Err(RouteError::MountFailed { .. })));
        assert_eq!(store.get(keys::CURRENT_VIEW), Some(json!("reports")));

        router.navigate(routes::DASHBOARD).await.unwrap();
        assert_eq!(router.active().as_deref(), Some("dashboard"));
        assert!(!router.is_transitioning());
    }
}
