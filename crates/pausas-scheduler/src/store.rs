//! File-backed document store — the single shared state of the fleet.
//!
//! Three JSON documents keyed by name, each with a sidecar `.lock` file.
//! Writers take an OS advisory exclusive lock around the whole
//! read-modify-write so stateless workers never lose updates to each
//! other. Writes go to a same-directory temp file first and are renamed
//! into place after `sync_data`, so a crash leaves either the old or the
//! new document on disk, never a truncated one. Readers without the lock
//! may observe any committed version.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Queue document name.
pub const QUEUE_DOC: &str = "queue";
/// Scheduler config document name.
pub const CONFIG_DOC: &str = "scheduler_config";
/// Groups document name.
pub const GROUPS_DOC: &str = "groups";

/// Document store rooted at one state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// The state directory this store reads and writes.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn doc_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.lock"))
    }

    /// Read the most recent committed value of a document, or its default
    /// when the file does not exist yet. Never returns partial data: a
    /// document that fails to parse is reported as corrupted.
    pub fn load<D>(&self, name: &str) -> Result<D, StoreError>
    where
        D: DeserializeOwned + Default,
    {
        let path = self.doc_path(name);
        if !path.exists() {
            return Ok(D::default());
        }
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupted {
            name: name.to_string(),
            detail: e.to_string(),
        })
    }

    /// Persist a document atomically, without taking the lock. Admin
    /// tooling uses this for the config and groups documents; the queue
    /// goes through [`FileStore::with_write_lock`].
    pub fn save<D: Serialize>(&self, name: &str, doc: &D) -> Result<(), StoreError> {
        self.write_atomic(name, doc)
    }

    /// Exclusive read-modify-write on one document.
    ///
    /// Acquires the advisory lock, loads the current value, applies `f`,
    /// and — only when `f` asks for it — writes the new value atomically
    /// before releasing the lock. The write is durable on return.
    ///
    /// `f` returns `(persist, result)`: logic errors set `persist = false`
    /// so they leave no trace on disk.
    pub fn with_write_lock<D, R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut D) -> (bool, R),
    ) -> Result<R, StoreError>
    where
        D: Serialize + DeserializeOwned + Default,
    {
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path(name))?;
        lock_file.lock_exclusive()?;

        let result = (|| {
            let mut doc: D = self.load(name)?;
            let (persist, result) = f(&mut doc);
            if persist {
                self.write_atomic(name, &doc)?;
            }
            Ok(result)
        })();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            tracing::warn!("failed to release lock for '{name}': {e}");
        }
        result
    }

    /// Write-temp + sync + rename. The temp file lives next to the target
    /// so the rename stays on one filesystem and is atomic.
    fn write_atomic<D: Serialize>(&self, name: &str, doc: &D) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(doc).map_err(|e| StoreError::Corrupted {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        let path = self.doc_path(name);
        let tmp_path = self.dir.join(format!(".{name}.tmp-{}", std::process::id()));
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(json.as_bytes())?;
        tmp.sync_data()?;
        drop(tmp);
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Unavailable(e)
        })?;
        tracing::debug!("💾 persisted document '{name}' ({} bytes)", json.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DurationKind, PauseRequest, QueueDoc};
    use chrono::TimeZone;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_document_loads_default() {
        let (_dir, store) = store();
        let queue: QueueDoc = store.load(QUEUE_DOC).unwrap();
        assert!(queue.requests.is_empty());
    }

    #[test]
    fn locked_write_is_visible_to_plain_reads() {
        let (_dir, store) = store();
        let at = chrono::Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap();
        store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| {
                let id = queue.allocate_id();
                queue
                    .requests
                    .push(PauseRequest::new(id, "a1", "g1", DurationKind::Short, at));
                (true, ())
            })
            .unwrap();

        let queue: QueueDoc = store.load(QUEUE_DOC).unwrap();
        assert_eq!(queue.requests.len(), 1);
        assert_eq!(queue.requests[0].agent_id, "a1");
    }

    #[test]
    fn discarded_mutation_leaves_no_trace() {
        let (_dir, store) = store();
        store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| {
                queue.next_id = 99;
                (false, ())
            })
            .unwrap();
        let queue: QueueDoc = store.load(QUEUE_DOC).unwrap();
        assert_eq!(queue.next_id, 0);
    }

    #[test]
    fn corrupted_document_is_refused() {
        let (dir, store) = store();
        fs::write(dir.path().join("queue.json"), "{ not json").unwrap();
        let err = store.load::<QueueDoc>(QUEUE_DOC).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (dir, store) = store();
        store
            .with_write_lock(QUEUE_DOC, |_queue: &mut QueueDoc| (true, ()))
            .unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn writers_serialize_under_contention() {
        let (_dir, store) = store();
        let at = chrono::Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap();
        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..5 {
                    store
                        .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| {
                            let id = queue.allocate_id();
                            queue.requests.push(PauseRequest::new(
                                id,
                                &format!("a{worker}-{id}"),
                                "g1",
                                DurationKind::Short,
                                at,
                            ));
                            (true, ())
                        })
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // No lost updates: all 40 inserts landed, ids are unique.
        let queue: QueueDoc = store.load(QUEUE_DOC).unwrap();
        assert_eq!(queue.requests.len(), 40);
        let mut ids: Vec<u64> = queue.requests.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 40);
    }
}
