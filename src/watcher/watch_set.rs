//! Watched Address Set
//!
//! Copy-on-write set of deposit addresses. A poll cycle takes one snapshot
//! and filters against it; writers never disturb a snapshot in use.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to the watched addresses. Grows only.
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    addresses: Arc<RwLock<Arc<HashSet<String>>>>,
}

impl WatchSet {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: HashSet<String> = addresses.into_iter().map(Into::into).collect();
        Self {
            addresses: Arc::new(RwLock::new(Arc::new(set))),
        }
    }

    /// Add an address; returns false if it was already watched
    pub async fn add(&self, address: impl Into<String>) -> bool {
        let address = address.into();
        let mut current = self.addresses.write().await;

        if current.contains(&address) {
            return false;
        }

        // Clones only while a cycle still holds the previous snapshot
        Arc::make_mut(&mut *current).insert(address);
        true
    }

    /// Consistent view for one poll cycle
    pub async fn snapshot(&self) -> Arc<HashSet<String>> {
        self.addresses.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.addresses.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Sorted list of watched addresses
    pub async fn list(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.snapshot().await.iter().cloned().collect();
        addresses.sort();
        addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let set = WatchSet::new(["A"]);

        assert!(!set.add("A").await);
        assert!(set.add("B").await);
        assert!(!set.add("B").await);
        assert_eq!(set.list().await, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_snapshot_is_stable() {
        let set = WatchSet::new(["A"]);
        let snapshot = set.snapshot().await;

        set.add("B").await;

        assert!(!snapshot.contains("B"));
        assert!(set.snapshot().await.contains("B"));
    }

    #[tokio::test]
    async fn test_concurrent_adds() {
        let set = WatchSet::default();
        assert!(set.is_empty().await);

        let mut handles = Vec::new();
        for i in 0..16 {
            let set = set.clone();
            handles.push(tokio::spawn(async move {
                let _snapshot = set.snapshot().await;
                set.add(format!("ADDR{}", i)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(set.len().await, 16);
    }
}
