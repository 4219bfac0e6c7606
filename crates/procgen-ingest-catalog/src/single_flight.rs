//! Promise-per-key map.
//!
//! The first caller for a key runs the computation; concurrent callers for
//! the same key await that one result. Results, failures included, are kept
//! for the lifetime of the map. The map lock is held only while looking up
//! or inserting the cell, never while the computation runs.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct SingleFlight<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        SingleFlight {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, computing it with `run` if no one has yet.
    pub async fn get_or_run<F, Fut>(&self, key: K, run: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut cells = self.cells.lock();
            cells.entry(key).or_default().clone()
        };
        cell.get_or_init(run).await.clone()
    }

    /// Completed value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let cell = self.cells.lock().get(key).cloned()?;
        cell.get().cloned()
    }

    /// Number of keys requested so far.
    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed entries.
    pub fn completed(&self) -> Vec<(K, V)> {
        let cells: Vec<(K, Arc<OnceCell<V>>)> = self
            .cells
            .lock()
            .iter()
            .map(|(k, c)| (k.clone(), c.clone()))
            .collect();
        cells
            .into_iter()
            .filter_map(|(k, c)| c.get().cloned().map(|v| (k, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let flight = Arc::new(SingleFlight::<&'static str, usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let flight = flight.clone();
            let runs = runs.clone();
            tasks.spawn(async move {
                flight
                    .get_or_run("k", || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        runs.fetch_add(1, Ordering::SeqCst) + 41
                    })
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            assert_eq!(joined.expect("task"), 41);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flight.get(&"k"), Some(41));
    }

    #[tokio::test]
    async fn failures_are_kept() {
        let flight = SingleFlight::<u8, Result<u8, String>>::new();
        let first = flight.get_or_run(1, || async { Err("boom".to_string()) }).await;
        let second = flight.get_or_run(1, || async { Ok(7) }).await;
        assert_eq!(first, second);
        assert_eq!(flight.completed().len(), 1);
    }
}
