//! Persistent set of already-processed identifiers (URLs, research topics).
//!
//! Stored as a JSON array of strings, rewritten whenever a new identifier is
//! added. Entries are never evicted.

use issola_core::error::StoreError;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use crate::json_file;

#[derive(Default)]
struct Visited {
    /// Insertion order, as written to disk
    order: Vec<String>,
    set: HashSet<String>,
}

/// Guard against reprocessing the same identifier across restarts.
///
/// All reads and writes go through one mutex, so [`VisitGuard::accept`] is
/// an atomic check-and-mark even when several workers share the guard.
pub struct VisitGuard {
    path: Option<PathBuf>,
    state: Mutex<Visited>,
}

impl VisitGuard {
    /// Load the guard from `path`. A missing or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let order: Vec<String> = json_file::load_or_default(&path, "visited log");
        let set = order.iter().cloned().collect();
        debug!(path = %path.display(), count = order.len(), "Visit guard loaded");
        Self {
            path: Some(path),
            state: Mutex::new(Visited { order, set }),
        }
    }

    /// A guard that never touches disk.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            state: Mutex::new(Visited::default()),
        }
    }

    /// Whether `id` has been recorded.
    pub async fn seen(&self, id: &str) -> bool {
        self.state.lock().await.set.contains(id)
    }

    /// Record `id`. Idempotent; only a first insertion rewrites the file.
    pub async fn mark(&self, id: &str) -> Result<(), StoreError> {
        self.accept(id).await.map(|_| ())
    }

    /// Record `id` if it is new. Returns `true` when the caller is the first
    /// to see it and should go ahead with the work.
    pub async fn accept(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.set.contains(id) {
            return Ok(false);
        }

        state.order.push(id.to_string());
        if let Some(path) = &self.path
            && let Err(e) = json_file::write_pretty(path, &state.order)
        {
            state.order.pop();
            return Err(e);
        }
        state.set.insert(id.to_string());
        Ok(true)
    }

    /// The subset of `ids` not yet recorded, in input order.
    pub async fn unseen(&self, ids: Vec<String>) -> Vec<String> {
        let state = self.state.lock().await;
        ids.into_iter().filter(|id| !state.set.contains(id)).collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn accept_is_true_only_once() {
        let guard = VisitGuard::ephemeral();
        assert!(guard.accept("https://a.example").await.unwrap());
        assert!(!guard.accept("https://a.example").await.unwrap());
        assert!(guard.seen("https://a.example").await);
        assert_eq!(guard.len().await, 1);
    }

    #[tokio::test]
    async fn marks_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visited_urls.json");

        let guard = VisitGuard::open(&path);
        guard.mark("https://a.example").await.unwrap();
        guard.mark("https://b.example").await.unwrap();
        guard.mark("https://a.example").await.unwrap();
        drop(guard);

        let on_disk: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec!["https://a.example", "https://b.example"]);

        let reopened = VisitGuard::open(&path);
        assert!(reopened.seen("https://b.example").await);
        assert!(!reopened.seen("https://c.example").await);
    }

    #[tokio::test]
    async fn corrupt_log_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visited_urls.json");
        std::fs::write(&path, "{not json").unwrap();

        let guard = VisitGuard::open(&path);
        assert!(guard.is_empty().await);
        assert!(guard.accept("x").await.unwrap());
    }

    #[tokio::test]
    async fn unseen_filters_in_order() {
        let guard = VisitGuard::ephemeral();
        guard.mark("b").await.unwrap();
        let left = guard
            .unseen(vec!["a".into(), "b".into(), "c".into()])
            .await;
        assert_eq!(left, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn concurrent_accept_admits_exactly_one() {
        let guard = Arc::new(VisitGuard::ephemeral());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let guard = Arc::clone(&guard);
            handles.push(tokio::spawn(async move {
                guard.accept("https://same.example").await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
