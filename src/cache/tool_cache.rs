//! Bounded LRU cache of active server bindings
//!
//! The cache is an ordered map from handle to live binding with capacity C
//! and LRU replacement. Connection release can be slow, so evicted
//! bindings are staged inside the critical section and closed only after
//! the lock is dropped.

use crate::agent::AgentTool;
use crate::transport::ServerBinding;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A live connection to a server plus the tools it exposes
pub struct ActiveBinding {
    handle: String,
    binding: Box<dyn ServerBinding>,
}

impl ActiveBinding {
    pub fn new(handle: impl Into<String>, binding: Box<dyn ServerBinding>) -> Self {
        Self {
            handle: handle.into(),
            binding,
        }
    }

    /// Handle of the server this binding belongs to
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Tool descriptors bound to this connection
    pub fn tools(&self) -> Vec<AgentTool> {
        self.binding.tools()
    }

    /// Release the connection. Consumes the binding so release happens
    /// exactly once.
    pub async fn close(self) {
        self.binding.close().await;
    }
}

struct CacheInner {
    /// Handles in recency order, MRU first
    order: Vec<String>,
    map: HashMap<String, ActiveBinding>,
}

impl CacheInner {
    fn promote(&mut self, handle: &str) {
        if let Some(pos) = self.order.iter().position(|h| h == handle) {
            let h = self.order.remove(pos);
            self.order.insert(0, h);
        }
    }

    fn remove(&mut self, handle: &str) -> Option<ActiveBinding> {
        if let Some(pos) = self.order.iter().position(|h| h == handle) {
            self.order.remove(pos);
        }
        self.map.remove(handle)
    }
}

/// Ordered mapping from handle to active binding with LRU replacement
pub struct ToolCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl ToolCache {
    /// Create a cache with the given capacity. Capacity is validated to be
    /// at least 1 by configuration before construction.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                order: Vec::new(),
                map: HashMap::new(),
            }),
        }
    }

    /// Tools of the binding for `handle`, promoting it to MRU. Returns
    /// `None` when absent.
    pub async fn get(&self, handle: &str) -> Option<Vec<AgentTool>> {
        let mut inner = self.inner.lock().await;
        if !inner.map.contains_key(handle) {
            return None;
        }
        inner.promote(handle);
        inner.map.get(handle).map(|b| b.tools())
    }

    /// Install a binding at MRU. Replacing an existing entry releases the
    /// old connection; inserting at capacity evicts and releases the LRU
    /// entry first. Connections are closed after the lock is dropped.
    pub async fn insert(&self, handle: impl Into<String>, binding: Box<dyn ServerBinding>) {
        let handle = handle.into();
        let mut doomed: Vec<ActiveBinding> = Vec::new();

        {
            let mut inner = self.inner.lock().await;
            if inner.map.contains_key(&handle) {
                if let Some(old) = inner.remove(&handle) {
                    doomed.push(old);
                }
            } else if inner.map.len() >= self.capacity {
                if let Some(lru) = inner.order.last().cloned() {
                    debug!("Cache evicting LRU entry '{}'", lru);
                    if let Some(old) = inner.remove(&lru) {
                        doomed.push(old);
                    }
                }
            }

            inner.order.insert(0, handle.clone());
            inner
                .map
                .insert(handle.clone(), ActiveBinding::new(handle.clone(), binding));
        }

        for binding in doomed {
            info!("Releasing evicted binding '{}'", binding.handle());
            binding.close().await;
        }

        debug!("Cache installed binding '{}'", handle);
    }

    /// Promote `handle` to MRU; no-op when absent
    pub async fn touch(&self, handle: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.map.contains_key(handle) {
            inner.promote(handle);
            true
        } else {
            false
        }
    }

    /// Remove and release the binding for `handle`. Returns whether an
    /// entry was removed.
    pub async fn evict(&self, handle: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock().await;
            inner.remove(handle)
        };

        match removed {
            Some(binding) => {
                warn!("Evicting binding '{}' from cache", handle);
                binding.close().await;
                true
            }
            None => false,
        }
    }

    /// Whether `handle` is currently cached
    pub async fn contains(&self, handle: &str) -> bool {
        self.inner.lock().await.map.contains_key(handle)
    }

    /// Cached handles, MRU first
    pub async fn contents(&self) -> Vec<String> {
        self.inner.lock().await.order.clone()
    }

    /// Number of cached bindings
    pub async fn len(&self) -> usize {
        self.inner.lock().await.map.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.map.is_empty()
    }

    /// Snapshot of every cached binding's tools, in MRU order, without
    /// disturbing recency. Used for toolset assembly.
    pub async fn all_tools(&self) -> Vec<AgentTool> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|h| inner.map.get(h))
            .flat_map(|b| b.tools())
            .collect()
    }

    /// Release every connection and clear the map. Used at shutdown.
    pub async fn release_all(&self) {
        let drained: Vec<ActiveBinding> = {
            let mut inner = self.inner.lock().await;
            inner.order.clear();
            inner.map.drain().map(|(_, b)| b).collect()
        };

        for binding in drained {
            binding.close().await;
        }
        info!("Released all cached bindings");
    }
}
