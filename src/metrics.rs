use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for observing traversal and routing activity.
///
/// Services and session caches report through this trait. Implementations
/// must be cheap; every call sits on the traversal hot path.
pub trait TraversalMetrics: Send + Sync {
    /// Records one outgoing edge fed to a matcher.
    fn edge_examined(&self);

    /// Records a branch abandoned after a routing failure.
    ///
    /// # Parameters
    /// * `reason` - `"not_found"` or `"connection"`.
    fn branch_pruned(&self, reason: &'static str);

    /// Records a target resolved without leaving the process.
    fn local_resolution(&self);

    /// Records a target resolved through the connection layer.
    fn remote_resolution(&self);

    /// Records a new session opened by the connection layer.
    fn session_opened(&self);

    /// Records a cached session handed out again.
    fn session_reused(&self);

    /// Records a cached session dropped after a failure.
    fn session_invalidated(&self);
}

/// Discards everything.
#[derive(Default)]
pub struct NoopMetrics;

impl TraversalMetrics for NoopMetrics {
    fn edge_examined(&self) {}
    fn branch_pruned(&self, _reason: &'static str) {}
    fn local_resolution(&self) {}
    fn remote_resolution(&self) {}
    fn session_opened(&self) {}
    fn session_reused(&self) {}
    fn session_invalidated(&self) {}
}

/// Thread-safe counters for every [`TraversalMetrics`] event.
#[derive(Default)]
pub struct CounterMetrics {
    /// Edges fed to a matcher.
    pub edges_examined: AtomicU64,
    /// Branches pruned because a node or client was missing.
    pub pruned_not_found: AtomicU64,
    /// Branches pruned because a service was unreachable.
    pub pruned_connection: AtomicU64,
    /// In-process resolutions.
    pub local_resolutions: AtomicU64,
    /// Resolutions through the connection layer.
    pub remote_resolutions: AtomicU64,
    /// Sessions opened.
    pub sessions_opened: AtomicU64,
    /// Sessions served from cache.
    pub sessions_reused: AtomicU64,
    /// Sessions evicted after a failure.
    pub sessions_invalidated: AtomicU64,
}

impl CounterMetrics {
    /// Creates a zeroed counter set.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copies every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            edges_examined: load(&self.edges_examined),
            pruned_not_found: load(&self.pruned_not_found),
            pruned_connection: load(&self.pruned_connection),
            local_resolutions: load(&self.local_resolutions),
            remote_resolutions: load(&self.remote_resolutions),
            sessions_opened: load(&self.sessions_opened),
            sessions_reused: load(&self.sessions_reused),
            sessions_invalidated: load(&self.sessions_invalidated),
        }
    }
}

impl TraversalMetrics for CounterMetrics {
    fn edge_examined(&self) {
        self.edges_examined.fetch_add(1, Ordering::Relaxed);
    }

    fn branch_pruned(&self, reason: &'static str) {
        match reason {
            "not_found" => {
                self.pruned_not_found.fetch_add(1, Ordering::Relaxed);
            }
            "connection" => {
                self.pruned_connection.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn local_resolution(&self) {
        self.local_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    fn remote_resolution(&self) {
        self.remote_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    fn session_reused(&self) {
        self.sessions_reused.fetch_add(1, Ordering::Relaxed);
    }

    fn session_invalidated(&self) {
        self.sessions_invalidated.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of a [`CounterMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Edges fed to a matcher.
    pub edges_examined: u64,
    /// Branches pruned because a node or client was missing.
    pub pruned_not_found: u64,
    /// Branches pruned because a service was unreachable.
    pub pruned_connection: u64,
    /// In-process resolutions.
    pub local_resolutions: u64,
    /// Resolutions through the connection layer.
    pub remote_resolutions: u64,
    /// Sessions opened.
    pub sessions_opened: u64,
    /// Sessions served from cache.
    pub sessions_reused: u64,
    /// Sessions evicted after a failure.
    pub sessions_invalidated: u64,
}

impl MetricsSnapshot {
    /// Total pruned branches.
    pub fn branches_pruned(&self) -> u64 {
        self.pruned_not_found + self.pruned_connection
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
pub fn default_metrics() -> Arc<dyn TraversalMetrics> {
    Arc::new(NoopMetrics)
}
