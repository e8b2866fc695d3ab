//! Incremental List Loader: a growing displayed prefix of the filtered
//! collection, one page per `load_more`.
//!
//! Loads complete asynchronously and carry the generation token of the
//! collection they were requested for.  Replacing the collection issues a new
//! generation, so a page requested for the old one is dropped on arrival.

use std::sync::Arc;
use std::time::Duration;

use mrga_proto::protocol::Station;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::token::{Token, TokenSource};

const UPDATE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    pub page_size: usize,
    /// Index of the last page appended; 0 after a reset.
    pub cursor: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReady {
    pub generation: Token,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListSnapshot {
    pub displayed: usize,
    pub total: usize,
    pub has_more: bool,
    pub loading: bool,
}

pub struct ListLoader {
    page_size: usize,
    delay: Duration,
    collection: Vec<Arc<Station>>,
    displayed: Vec<Arc<Station>>,
    cursor: usize,
    generations: TokenSource,
    generation: Token,
    in_flight: bool,
    ready_tx: mpsc::UnboundedSender<PageReady>,
    ready_rx: mpsc::UnboundedReceiver<PageReady>,
    updates: broadcast::Sender<ListSnapshot>,
}

impl ListLoader {
    pub fn new(page_size: usize, delay: Duration) -> Self {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let generations = TokenSource::new();
        let generation = generations.issue();
        Self {
            page_size: page_size.max(1),
            delay,
            collection: Vec::new(),
            displayed: Vec::new(),
            cursor: 0,
            generations,
            generation,
            in_flight: false,
            ready_tx,
            ready_rx,
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListSnapshot> {
        self.updates.subscribe()
    }

    pub fn displayed(&self) -> &[Arc<Station>] {
        &self.displayed
    }

    pub fn has_more(&self) -> bool {
        self.displayed.len() < self.collection.len()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn cursor(&self) -> PageCursor {
        PageCursor {
            page_size: self.page_size,
            cursor: self.cursor,
            total: self.collection.len(),
        }
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            displayed: self.displayed.len(),
            total: self.collection.len(),
            has_more: self.has_more(),
            loading: self.in_flight,
        }
    }

    /// Replace the filtered collection and show its first page.
    pub fn set_collection(&mut self, collection: Vec<Arc<Station>>) {
        self.generation = self.generations.issue();
        self.in_flight = false;
        self.cursor = 0;
        let first = self.page_size.min(collection.len());
        self.displayed = collection[..first].to_vec();
        self.collection = collection;
        debug!(
            "ListLoader: generation {} with {} of {} entries",
            self.generation,
            self.displayed.len(),
            self.collection.len()
        );
        self.notify();
    }

    /// Request the next page.  Returns false when ignored (a load is already
    /// in flight, or nothing is left).
    pub fn load_more(&mut self) -> bool {
        if self.in_flight || !self.has_more() {
            debug!(
                "ListLoader: load_more ignored (in_flight={}, has_more={})",
                self.in_flight,
                self.has_more()
            );
            return false;
        }
        self.in_flight = true;
        let ready = PageReady {
            generation: self.generation,
        };
        if self.delay.is_zero() {
            let _ = self.ready_tx.send(ready);
        } else {
            let tx = self.ready_tx.clone();
            let delay = self.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(ready);
            });
        }
        self.notify();
        true
    }

    /// The end-of-list marker scrolled into view.
    pub fn on_marker_visible(&mut self) -> bool {
        self.load_more()
    }

    /// Wait for the next page completion.  Cancel-safe.
    pub async fn next_ready(&mut self) -> Option<PageReady> {
        self.ready_rx.recv().await
    }

    pub fn apply_ready(&mut self, ready: PageReady) {
        if ready.generation != self.generation || !self.in_flight {
            debug!("ListLoader: dropping page for {}", ready.generation);
            return;
        }
        self.in_flight = false;
        let start = self.displayed.len();
        let end = (start + self.page_size).min(self.collection.len());
        self.displayed.extend_from_slice(&self.collection[start..end]);
        self.cursor += 1;
        debug!(
            "ListLoader: page {} appended, showing {}/{}",
            self.cursor,
            self.displayed.len(),
            self.collection.len()
        );
        self.notify();
    }

    pub async fn pump(&mut self) {
        if let Some(ready) = self.next_ready().await {
            self.apply_ready(ready);
        }
    }

    fn notify(&self) {
        let _ = self.updates.send(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(n: u64) -> Vec<Arc<Station>> {
        (1..=n)
            .map(|id| {
                Arc::new(Station {
                    id,
                    name: format!("Station {}", id),
                    ..Default::default()
                })
            })
            .collect()
    }

    fn ids(loader: &ListLoader) -> Vec<u64> {
        loader.displayed().iter().map(|s| s.id).collect()
    }

    #[tokio::test]
    async fn test_pages_grow_to_total() {
        let mut loader = ListLoader::new(20, Duration::ZERO);
        loader.set_collection(collection(45));
        assert_eq!(loader.displayed().len(), 20);
        assert!(loader.has_more());

        assert!(loader.load_more());
        loader.pump().await;
        assert_eq!(loader.displayed().len(), 40);

        assert!(loader.on_marker_visible());
        loader.pump().await;
        assert_eq!(loader.displayed().len(), 45);
        assert!(!loader.has_more());
        assert!(!loader.load_more());

        let expected: Vec<u64> = (1..=45).collect();
        assert_eq!(ids(&loader), expected);
        assert_eq!(loader.cursor().cursor, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_idempotent_while_in_flight() {
        let mut loader = ListLoader::new(5, Duration::from_millis(300));
        loader.set_collection(collection(30));
        assert!(loader.load_more());
        assert!(!loader.load_more());
        assert!(!loader.on_marker_visible());
        assert!(loader.is_loading());

        loader.pump().await;
        assert_eq!(loader.displayed().len(), 10);
        assert!(!loader.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_resets_even_with_load_in_flight() {
        let mut loader = ListLoader::new(5, Duration::from_millis(300));
        loader.set_collection(collection(30));
        loader.load_more();

        loader.set_collection(collection(3));
        assert_eq!(loader.displayed().len(), 3);
        assert_eq!(loader.cursor().cursor, 0);
        assert!(!loader.is_loading());

        // The old generation's page arrives and is dropped.
        loader.pump().await;
        assert_eq!(ids(&loader), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_page_does_not_clear_new_load() {
        let mut loader = ListLoader::new(2, Duration::from_millis(100));
        loader.set_collection(collection(10));
        loader.load_more();
        loader.set_collection(collection(8));
        assert!(loader.load_more());

        while loader.is_loading() {
            loader.pump().await;
        }
        assert_eq!(ids(&loader), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_collection() {
        let mut loader = ListLoader::new(20, Duration::ZERO);
        loader.set_collection(Vec::new());
        assert!(loader.displayed().is_empty());
        assert!(!loader.has_more());
        assert!(!loader.load_more());
    }
}
