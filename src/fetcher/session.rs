//! Session pool
//!
//! A session is a reusable fetch identity (currently: an optional proxy
//! endpoint). The pool caps how many sessions exist at once and retires a
//! session after it has served `max_usage_count` requests or after a request
//! on it failed, spreading load across identities.

use crate::config::{ProxyConfig, SessionConfig};
use crate::fetcher::FetchError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A fetch identity handed out by the [`SessionPool`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: u64,
    usage_count: u32,
    proxy_url: Option<String>,
}

impl Session {
    pub fn new(id: u64, proxy_url: Option<String>) -> Self {
        Self {
            id,
            usage_count: 0,
            proxy_url,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of completed requests served by this session
    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }
}

struct PoolInner {
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Session>>,
    next_id: AtomicU64,
    retired: AtomicU64,
    max_usage_count: u32,
    proxies: Vec<String>,
}

impl PoolInner {
    fn give_back(&self, mut session: Session, healthy: bool) {
        session.usage_count += 1;

        if !healthy || session.usage_count >= self.max_usage_count {
            self.retired.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "Retiring session {} after {} uses (healthy: {})",
                session.id,
                session.usage_count,
                healthy
            );
            return;
        }

        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
    }
}

/// Fixed-size pool of reusable sessions
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl SessionPool {
    /// Creates a pool from session sizing and proxy settings
    pub fn new(config: &SessionConfig, proxy: &ProxyConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(config.max_pool_size.max(1) as usize)),
                idle: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                retired: AtomicU64::new(0),
                max_usage_count: config.max_usage_count.max(1),
                proxies: proxy.urls.clone(),
            }),
        }
    }

    /// Waits for a free slot and leases a session
    ///
    /// An idle session is reused when available; otherwise a new one is
    /// created, taking the next proxy in rotation.
    pub async fn acquire(&self) -> Result<SessionLease, FetchError> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::SessionPoolClosed)?;

        let reused = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let session = match reused {
            Some(session) => session,
            None => {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                let proxy_url = if self.inner.proxies.is_empty() {
                    None
                } else {
                    let index = (id as usize) % self.inner.proxies.len();
                    Some(self.inner.proxies[index].clone())
                };
                tracing::debug!("Creating session {}", id);
                Session::new(id, proxy_url)
            }
        };

        Ok(SessionLease {
            session,
            returned: false,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Number of sessions created so far
    pub fn created_count(&self) -> u64 {
        self.inner.next_id.load(Ordering::Relaxed)
    }

    /// Number of sessions retired so far
    pub fn retired_count(&self) -> u64 {
        self.inner.retired.load(Ordering::Relaxed)
    }

    /// Number of sessions waiting to be reused
    pub fn idle_count(&self) -> usize {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of leases that could be handed out right now
    pub fn available_slots(&self) -> usize {
        self.inner.permits.available_permits()
    }
}

/// A session on loan from the pool
///
/// Call [`SessionLease::release`] to report the outcome. A lease dropped
/// without being released retires its session.
pub struct SessionLease {
    session: Session,
    returned: bool,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl SessionLease {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session to the pool
    ///
    /// Unhealthy sessions, and sessions that reached their usage ceiling,
    /// are retired instead of reused.
    pub fn release(mut self, healthy: bool) {
        self.returned = true;
        self.pool.give_back(self.session.clone(), healthy);
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if !self.returned {
            self.pool.give_back(self.session.clone(), false);
        }
    }
}
