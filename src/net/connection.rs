//! The connection layer: the only place a process reaches other services.
//!
//! [`ConnectionManager`] is the contract the locator consumes.
//! [`SessionCache`] implements it over any [`Transport`], keeping one live
//! session per `(source client, target service)` pair until a call through
//! it fails.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::graph::handle::ServiceRef;
use crate::location::ClientLocation;
use crate::metrics::{default_metrics, TraversalMetrics};

/// Hands out handles to remote services.
pub trait ConnectionManager: Send + Sync {
    /// Handle to `target_service`, acting on behalf of `source`.
    fn connect(&self, source: &ClientLocation, target_service: &str) -> Result<ServiceRef>;

    /// Drops any cached session from `source` to `target_service`.
    fn invalidate(&self, _source: &ClientLocation, _target_service: &str) {}
}

/// Establishes fresh sessions. The wire itself lives behind this trait.
pub trait Transport: Send + Sync {
    /// Opens a new session to `target_service` for `source`.
    fn open(&self, source: &ClientLocation, target_service: &str) -> Result<ServiceRef>;
}

type SessionKey = (ClientLocation, String);

/// LRU cache of sessions over a [`Transport`].
///
/// The cache lock is not held while a session is being opened, so two
/// concurrent misses for the same key may both open a session; the first
/// one inserted is kept and handed to both callers.
pub struct SessionCache<T> {
    transport: T,
    sessions: Mutex<LruCache<SessionKey, ServiceRef>>,
    metrics: Arc<dyn TraversalMetrics>,
}

impl<T: Transport> SessionCache<T> {
    /// Creates a cache holding at most `capacity` sessions.
    pub fn new(transport: T, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            transport,
            sessions: Mutex::new(LruCache::new(capacity)),
            metrics: default_metrics(),
        }
    }

    /// Reports session events to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<dyn TraversalMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Number of cached sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> ConnectionManager for SessionCache<T> {
    fn connect(&self, source: &ClientLocation, target_service: &str) -> Result<ServiceRef> {
        let key = (source.clone(), target_service.to_owned());
        if let Some(session) = self.sessions.lock().get(&key) {
            self.metrics.session_reused();
            return Ok(Arc::clone(session));
        }

        let opened = self.transport.open(source, target_service)?;
        self.metrics.session_opened();
        info!(source = %source, target = target_service, "connection.session.opened");

        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(&key) {
            debug!(source = %source, target = target_service, "connection.session.raced");
            return Ok(Arc::clone(existing));
        }
        sessions.put(key, Arc::clone(&opened));
        Ok(opened)
    }

    fn invalidate(&self, source: &ClientLocation, target_service: &str) {
        let key = (source.clone(), target_service.to_owned());
        if self.sessions.lock().pop(&key).is_some() {
            self.metrics.session_invalidated();
            info!(source = %source, target = target_service, "connection.session.invalidated");
        }
    }
}

/// Connection manager for a process with no network.
#[derive(Debug, Default, Clone, Copy)]
pub struct Isolated;

impl ConnectionManager for Isolated {
    fn connect(&self, _source: &ClientLocation, target_service: &str) -> Result<ServiceRef> {
        Err(GraphError::connection(target_service, "no network configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::graph::handle::{ClientRef, ServiceHandle};
    use crate::metrics::CounterMetrics;

    struct Stub(String);

    impl ServiceHandle for Stub {
        fn service_name(&self) -> &str {
            &self.0
        }
        fn ping(&self, _sender: &ClientLocation) -> Result<String> {
            Ok(self.0.clone())
        }
        fn lookup_client(&self, _sender: &ClientLocation, name: &str) -> Result<ClientRef> {
            Err(GraphError::not_found("client", name))
        }
        fn create_client(&self, _sender: &ClientLocation, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingTransport {
        opened: AtomicUsize,
    }

    impl Transport for CountingTransport {
        fn open(&self, _source: &ClientLocation, target: &str) -> Result<ServiceRef> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if target == "down" {
                return Err(GraphError::connection(target, "refused"));
            }
            Ok(Arc::new(Stub(target.to_owned())))
        }
    }

    #[test]
    fn sessions_are_reused_per_source_and_target() {
        let metrics = CounterMetrics::new();
        let cache = SessionCache::new(CountingTransport::default(), 8).with_metrics(metrics.clone());
        let a = ClientLocation::new("S1", "a");
        let b = ClientLocation::new("S1", "b");

        cache.connect(&a, "S2").unwrap();
        cache.connect(&a, "S2").unwrap();
        cache.connect(&b, "S2").unwrap();
        assert_eq!(cache.transport().opened.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.snapshot().sessions_reused, 1);

        cache.invalidate(&a, "S2");
        cache.connect(&a, "S2").unwrap();
        assert_eq!(cache.transport().opened.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.snapshot().sessions_invalidated, 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = SessionCache::new(CountingTransport::default(), 8);
        let a = ClientLocation::new("S1", "a");
        assert!(cache.connect(&a, "down").unwrap_err().is_connection_failure());
        assert!(cache.connect(&a, "down").is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.transport().opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn capacity_bounds_the_cache() {
        let cache = SessionCache::new(CountingTransport::default(), 1);
        let a = ClientLocation::new("S1", "a");
        cache.connect(&a, "S2").unwrap();
        cache.connect(&a, "S3").unwrap();
        assert_eq!(cache.len(), 1);
        cache.connect(&a, "S2").unwrap();
        assert_eq!(cache.transport().opened.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn isolated_never_connects() {
        let err = Isolated
            .connect(&ClientLocation::new("S1", "a"), "S2")
            .unwrap_err();
        assert!(err.is_branch_local());
    }
}
