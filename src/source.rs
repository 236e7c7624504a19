use crate::error::{DashboardError, Result};
use crate::schema::DetailRow;
use futures::future::join_all;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Where views come from.
///
/// Implementations return an empty vector for a view without rows and keep
/// [`DashboardError::FetchTimeout`] distinct from other failures.
#[allow(async_fn_in_trait)]
pub trait ViewSource {
    async fn fetch_view(&self, view: &str) -> Result<Vec<DetailRow>>;
}

struct CachedView {
    rows: Vec<DetailRow>,
    fetched_at: Instant,
}

/// Serves repeated fetches of a view from memory until `ttl` elapses.
/// Failed fetches are not cached.
pub struct ViewCache<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedView>>,
}

impl<S: ViewSource> ViewCache<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedView>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lookup(&self, view: &str) -> Option<Vec<DetailRow>> {
        let entries = self.entries();
        let cached = entries.get(view)?;
        if cached.fetched_at.elapsed() < self.ttl {
            Some(cached.rows.clone())
        } else {
            None
        }
    }

    /// Drops every cached view.
    pub fn clear(&self) {
        let mut entries = self.entries();
        debug!("Clearing {} cached views", entries.len());
        entries.clear();
    }

    pub fn invalidate(&self, view: &str) {
        self.entries().remove(view);
    }

    pub fn cached_views(&self) -> usize {
        self.entries().len()
    }
}

impl<S: ViewSource> ViewSource for ViewCache<S> {
    async fn fetch_view(&self, view: &str) -> Result<Vec<DetailRow>> {
        if let Some(rows) = self.lookup(view) {
            debug!("Cache hit for view '{}' ({} rows)", view, rows.len());
            return Ok(rows);
        }

        let rows = self.inner.fetch_view(view).await?;
        self.entries().insert(
            view.to_string(),
            CachedView {
                rows: rows.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(rows)
    }
}

/// Views held in memory; unknown names are empty views.
#[derive(Debug, Default)]
pub struct InMemorySource {
    views: HashMap<String, Vec<DetailRow>>,
    fetches: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, view: impl Into<String>, rows: Vec<DetailRow>) -> Self {
        self.views.insert(view.into(), rows);
        self
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl ViewSource for InMemorySource {
    async fn fetch_view(&self, view: &str) -> Result<Vec<DetailRow>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.views.get(view).cloned().unwrap_or_default())
    }
}

/// Result of fetching one view for a render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Rows(Vec<DetailRow>),
    Empty { view: String },
    TimedOut { view: String, seconds: u64 },
    Failed { view: String, details: String },
}

impl ViewOutcome {
    pub fn rows(&self) -> &[DetailRow] {
        match self {
            ViewOutcome::Rows(rows) => rows,
            _ => &[],
        }
    }

    pub fn has_rows(&self) -> bool {
        matches!(self, ViewOutcome::Rows(_))
    }

    /// Back to the error taxonomy: an empty view becomes
    /// [`DashboardError::EmptyDataset`].
    pub fn into_rows(self) -> Result<Vec<DetailRow>> {
        match self {
            ViewOutcome::Rows(rows) => Ok(rows),
            ViewOutcome::Empty { view } => Err(DashboardError::EmptyDataset(view)),
            ViewOutcome::TimedOut { view, seconds } => {
                Err(DashboardError::FetchTimeout { view, seconds })
            }
            ViewOutcome::Failed { view, details } => {
                Err(DashboardError::FetchFailed { view, details })
            }
        }
    }
}

/// Fetches a view and folds every failure into an outcome the caller can show
/// as an empty state. There is no retry.
pub async fn fetch_outcome<S: ViewSource>(source: &S, view: &str) -> ViewOutcome {
    match source.fetch_view(view).await {
        Ok(rows) if rows.is_empty() => {
            warn!("View '{}' returned no rows", view);
            ViewOutcome::Empty {
                view: view.to_string(),
            }
        }
        Ok(rows) => ViewOutcome::Rows(rows),
        Err(DashboardError::FetchTimeout { view, seconds }) => {
            warn!("Timed out after {}s fetching view '{}'", seconds, view);
            ViewOutcome::TimedOut { view, seconds }
        }
        Err(DashboardError::EmptyDataset(view)) => ViewOutcome::Empty { view },
        Err(e) => {
            warn!("Failed to load view '{}': {}", view, e);
            ViewOutcome::Failed {
                view: view.to_string(),
                details: e.to_string(),
            }
        }
    }
}

/// Fetches several views for one render pass, concurrently on the caller's
/// task. Outcomes keep the order of `views`.
pub async fn fetch_all<S: ViewSource>(source: &S, views: &[&str]) -> Vec<ViewOutcome> {
    join_all(views.iter().map(|view| fetch_outcome(source, view))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowSource;

    impl ViewSource for SlowSource {
        async fn fetch_view(&self, view: &str) -> Result<Vec<DetailRow>> {
            Err(DashboardError::FetchTimeout {
                view: view.to_string(),
                seconds: 120,
            })
        }
    }

    fn source() -> InMemorySource {
        InMemorySource::new().with_view("vw_ventas", vec![DetailRow::new(2025, 1, "A")])
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_fetches() {
        let cache = ViewCache::new(source(), Duration::from_secs(600));
        let first = cache.fetch_view("vw_ventas").await.unwrap();
        let second = cache.fetch_view("vw_ventas").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.inner().fetch_count(), 1);

        cache.clear();
        assert_eq!(cache.cached_views(), 0);
        cache.fetch_view("vw_ventas").await.unwrap();
        assert_eq!(cache.inner().fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let cache = ViewCache::new(source(), Duration::ZERO);
        cache.fetch_view("vw_ventas").await.unwrap();
        cache.fetch_view("vw_ventas").await.unwrap();
        assert_eq!(cache.inner().fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_outcomes() {
        let src = source();
        assert!(fetch_outcome(&src, "vw_ventas").await.has_rows());
        assert_eq!(
            fetch_outcome(&src, "vw_otra").await,
            ViewOutcome::Empty {
                view: "vw_otra".to_string()
            }
        );

        let empty = fetch_outcome(&src, "vw_otra").await.into_rows().unwrap_err();
        assert!(empty.is_empty_state());

        let timed_out = fetch_outcome(&SlowSource, "vw_ventas").await;
        assert!(matches!(timed_out, ViewOutcome::TimedOut { seconds: 120, .. }));
        assert!(matches!(
            timed_out.into_rows(),
            Err(DashboardError::FetchTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_order() {
        let src = source();
        let outcomes = fetch_all(&src, &["vw_otra", "vw_ventas"]).await;
        assert!(!outcomes[0].has_rows());
        assert_eq!(outcomes[1].rows().len(), 1);
    }
}
