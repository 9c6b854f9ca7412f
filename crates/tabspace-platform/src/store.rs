//! Durable session storage.
//!
//! [`SessionStore`] is the five-operation surface the engine depends on.
//! The engine owns the in-memory truth and writes through; it never reads
//! the store outside of startup ([`SessionStore::fetch_all`]) and explicit
//! id lookups.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{debug, warn};

use tabspace_types::{Result, Session, SessionId, TabspaceError};

/// Key-value collection of saved session records.
///
/// Implementations assign ids on [`create`](SessionStore::create) and must
/// treat ids as stable for the record's lifetime.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new record, assigning and returning its id.
    ///
    /// Any id already present on `session` is ignored.
    async fn create(&self, session: &Session) -> Result<SessionId>;

    /// Overwrite the record with `session.id`.
    async fn update(&self, session: &Session) -> Result<()>;

    /// Remove a record. Deleting an absent id is a logged no-op.
    async fn delete(&self, id: SessionId) -> Result<()>;

    /// Fetch one record by id.
    async fn get(&self, id: SessionId) -> Result<Option<Session>>;

    /// Fetch every record.
    async fn fetch_all(&self) -> Result<Vec<Session>>;
}

/// In-memory store. The reference implementation, also used in tests.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<SessionId, Session>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, session: &Session) -> Result<SessionId> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut record = session.clone();
        record.id = Some(id);
        self.records.lock().unwrap().insert(id, record);
        debug!(%id, "created session record");
        Ok(id)
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let id = session.id.ok_or(TabspaceError::SessionUnsaved)?;
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&id) {
            return Err(TabspaceError::SessionNotFound(id));
        }
        records.insert(id, session.clone());
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<()> {
        if self.records.lock().unwrap().remove(&id).is_none() {
            warn!(%id, "delete for unknown session record");
        }
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<Session>> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}

/// File-backed store writing one pretty-printed JSON document per session,
/// named `{id}.json`, under a single directory.
pub struct JsonFileStore {
    dir: PathBuf,
    next_id: AtomicI64,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// Scans existing filenames to continue id assignment past the highest
    /// id already on disk.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut max_id = 0;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = parse_record_id(&entry.path()) {
                max_id = max_id.max(id);
            }
        }

        debug!(dir = %dir.display(), max_id, "opened session store");
        Ok(Self {
            dir,
            next_id: AtomicI64::new(max_id + 1),
        })
    }

    fn record_path(&self, id: SessionId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn write_record(&self, session: &Session) -> Result<()> {
        let id = session.id.ok_or(TabspaceError::SessionUnsaved)?;
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(self.record_path(id), json).await?;
        Ok(())
    }
}

fn parse_record_id(path: &Path) -> Option<i64> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(".json")?.parse().ok()
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn create(&self, session: &Session) -> Result<SessionId> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut record = session.clone();
        record.id = Some(id);
        self.write_record(&record).await?;
        debug!(%id, "created session record");
        Ok(id)
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let id = session.id.ok_or(TabspaceError::SessionUnsaved)?;
        if !tokio::fs::try_exists(self.record_path(id))
            .await
            .unwrap_or(false)
        {
            return Err(TabspaceError::SessionNotFound(id));
        }
        self.write_record(session).await
    }

    async fn delete(&self, id: SessionId) -> Result<()> {
        match tokio::fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(%id, "delete for unknown session record");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>> {
        match tokio::fs::read_to_string(self.record_path(id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if parse_record_id(&path).is_none() {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Session>(&content) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed session record");
                }
            }
        }
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabspace_types::{Tab, WindowId};

    fn sample_session(name: &str) -> Session {
        let mut s = Session::transient(WindowId(1), vec![Tab::new("https://a.com")], 7);
        s.name = Some(name.into());
        s
    }

    #[tokio::test]
    async fn memory_create_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.create(&sample_session("a")).await.unwrap();
        let b = store.create(&sample_session("b")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn memory_update_unknown_id_fails() {
        let store = MemoryStore::new();
        let mut s = sample_session("a");
        s.id = Some(SessionId(99));
        let err = store.update(&s).await.unwrap_err();
        assert!(matches!(err, TabspaceError::SessionNotFound(SessionId(99))));
    }

    #[tokio::test]
    async fn memory_update_without_id_fails() {
        let store = MemoryStore::new();
        let err = store.update(&sample_session("a")).await.unwrap_err();
        assert!(matches!(err, TabspaceError::SessionUnsaved));
    }

    #[tokio::test]
    async fn memory_get_and_delete() {
        let store = MemoryStore::new();
        let id = store.create(&sample_session("a")).await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.name.as_deref(), Some("a"));

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
        // Second delete is a no-op.
        store.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        let id = store.create(&sample_session("work")).await.unwrap();
        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.name.as_deref(), Some("work"));

        let all = store.fetch_all().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn file_store_continues_ids_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.create(&sample_session("a")).await.unwrap()
        };

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let second = store.create(&sample_session("b")).await.unwrap();
        assert!(second > first);
        assert_eq!(store.fetch_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn file_store_skips_malformed_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.create(&sample_session("a")).await.unwrap();

        tokio::fs::write(dir.path().join("999.json"), "{not json")
            .await
            .unwrap();

        let all = store.fetch_all().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn file_store_delete_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.delete(SessionId(42)).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.get(SessionId(1)).await.unwrap().is_none());
    }
}
