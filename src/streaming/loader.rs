//! Async background image loading with a bounded in-flight set
//!
//! The loader owns the only worker-side state in the subsystem: it reads
//! raw store bytes off the caller's thread and hands them back over a
//! channel. It never touches registry or cache structures; the cache polls
//! `poll()` once per frame and applies all state transitions itself.

use crate::cache::entry::EntryId;
use crate::streaming::disk::MIN_STORE_LEN;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Request to read one precompressed image file
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub id: EntryId,
    pub path: PathBuf,
}

/// Result of a background read
#[derive(Debug)]
pub enum LoadOutcome {
    /// Raw store bytes, ready to decompress and upload
    Loaded { id: EntryId, bytes: Vec<u8> },
    /// Open failure or truncated file
    Failed { id: EntryId, error: String },
}

impl LoadOutcome {
    pub fn id(&self) -> EntryId {
        match self {
            LoadOutcome::Loaded { id, .. } => *id,
            LoadOutcome::Failed { id, .. } => *id,
        }
    }
}

/// Concurrent image loader with async I/O
pub struct ImageLoader {
    /// Channel for sending read requests to the worker task
    request_tx: mpsc::UnboundedSender<LoadRequest>,
    /// Channel for receiving completed reads
    result_rx: mpsc::UnboundedReceiver<LoadOutcome>,
    /// Entries currently requested and not yet polled back
    pending: HashSet<EntryId>,
    /// Dedicated runtime driving the worker task
    #[allow(dead_code)]
    runtime: Runtime,
}

impl ImageLoader {
    /// Create a loader running at most `max_concurrent` file reads at once
    pub fn new(max_concurrent: usize) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<LoadRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<LoadOutcome>();

        let runtime = Runtime::new().expect("Failed to create tokio runtime");

        runtime.spawn(async move {
            Self::worker_loop(max_concurrent, &mut request_rx, result_tx).await;
        });

        Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            runtime,
        }
    }

    /// Worker loop enforcing the in-flight cap
    ///
    /// Requests beyond the cap wait in the queue until a read finishes;
    /// nothing is ever rejected.
    async fn worker_loop(
        max_concurrent: usize,
        request_rx: &mut mpsc::UnboundedReceiver<LoadRequest>,
        result_tx: mpsc::UnboundedSender<LoadOutcome>,
    ) {
        use tokio::task::JoinSet;

        let mut active_tasks = JoinSet::new();
        let mut queued: VecDeque<LoadRequest> = VecDeque::new();

        loop {
            tokio::select! {
                Some(request) = request_rx.recv() => {
                    queued.push_back(request);
                }

                Some(result) = active_tasks.join_next(), if !active_tasks.is_empty() => {
                    match result {
                        Ok(outcome) => {
                            let _ = result_tx.send(outcome);
                        }
                        Err(e) => {
                            log::error!("image load task panicked: {}", e);
                        }
                    }
                }

                // exit when the channel closed and no work remains
                else => {
                    if queued.is_empty() && active_tasks.is_empty() {
                        break;
                    }
                }
            }

            while active_tasks.len() < max_concurrent {
                let Some(request) = queued.pop_front() else { break };
                active_tasks.spawn(Self::load_task(request));
            }
        }
    }

    /// Read one store file to its completion or failure
    async fn load_task(request: LoadRequest) -> LoadOutcome {
        match tokio::fs::read(&request.path).await {
            Ok(bytes) if (bytes.len() as u64) < MIN_STORE_LEN => LoadOutcome::Failed {
                id: request.id,
                error: format!("{} had a bad file length", request.path.display()),
            },
            Ok(bytes) => LoadOutcome::Loaded {
                id: request.id,
                bytes,
            },
            Err(e) => LoadOutcome::Failed {
                id: request.id,
                error: e.to_string(),
            },
        }
    }

    /// Queue a background read for an entry
    ///
    /// Returns `false` if a read for this entry is already outstanding.
    pub fn request(&mut self, id: EntryId, path: PathBuf) -> bool {
        if self.pending.contains(&id) {
            return false;
        }

        self.pending.insert(id);
        self.request_tx
            .send(LoadRequest { id, path })
            .expect("image loader worker died");

        true
    }

    /// Poll for completed reads (non-blocking)
    ///
    /// Returns all currently available outcomes.
    pub fn poll(&mut self) -> Vec<LoadOutcome> {
        let mut results = Vec::new();

        while let Ok(outcome) = self.result_rx.try_recv() {
            self.pending.remove(&outcome.id());
            results.push(outcome);
        }

        results
    }

    /// Number of reads requested and not yet polled back
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a read for this entry is outstanding
    pub fn is_pending(&self, id: EntryId) -> bool {
        self.pending.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PixelData;
    use crate::streaming::disk;

    fn wait_for(loader: &mut ImageLoader) -> Vec<LoadOutcome> {
        for _ in 0..500 {
            let results = loader.poll();
            if !results.is_empty() {
                return results;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("timed out waiting for loader results");
    }

    #[test]
    fn test_loader_creation() {
        let loader = ImageLoader::new(4);
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn test_pending_tracking() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut loader = ImageLoader::new(4);
        let id = EntryId::new(5);
        let path = dir.path().join("missing.rki");

        assert!(loader.request(id, path.clone()));
        assert_eq!(loader.pending_count(), 1);
        assert!(loader.is_pending(id));

        // a second request for the same entry is a no-op
        assert!(!loader.request(id, path));
        assert_eq!(loader.pending_count(), 1);
    }

    #[test]
    fn test_load_store_file() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let data = disk::ImageFileData::single(&PixelData::new(8, 8));
        disk::save_image_sync(dir.path(), "rock01", &data).expect("save failed");

        let mut loader = ImageLoader::new(4);
        let id = EntryId::new(1);
        loader.request(id, disk::store_path(dir.path(), "rock01"));

        let results = wait_for(&mut loader);
        assert_eq!(results.len(), 1);
        match &results[0] {
            LoadOutcome::Loaded { id: got, bytes } => {
                assert_eq!(*got, id);
                let image = disk::decompress_image(bytes).expect("decompress failed");
                assert_eq!(image.width, 8);
            }
            other => panic!("expected loaded outcome, got {:?}", other),
        }
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut loader = ImageLoader::new(4);
        let id = EntryId::new(2);
        loader.request(id, dir.path().join("nope.rki"));

        let results = wait_for(&mut loader);
        assert!(matches!(&results[0], LoadOutcome::Failed { id: got, .. } if *got == id));
    }

    #[test]
    fn test_load_truncated_file() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("short.rki");
        std::fs::write(&path, [0u8; 2]).expect("write failed");

        let mut loader = ImageLoader::new(4);
        let id = EntryId::new(3);
        loader.request(id, path);

        let results = wait_for(&mut loader);
        match &results[0] {
            LoadOutcome::Failed { error, .. } => assert!(error.contains("bad file length")),
            other => panic!("expected failed outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_many_requests_beyond_cap() {
        // more requests than the in-flight cap: all complete, none rejected
        let dir = tempfile::tempdir().expect("tempdir failed");
        let data = disk::ImageFileData::single(&PixelData::new(4, 4));
        for i in 0..8 {
            disk::save_image_sync(dir.path(), &format!("img{}", i), &data).expect("save failed");
        }

        let mut loader = ImageLoader::new(2);
        for i in 0..8 {
            loader.request(EntryId::new(i), disk::store_path(dir.path(), &format!("img{}", i)));
        }

        let mut completed = 0;
        for _ in 0..500 {
            completed += loader.poll().len();
            if completed == 8 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(completed, 8);
        assert_eq!(loader.pending_count(), 0);
    }
}
