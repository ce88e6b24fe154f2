//! Active-session registry.
//!
//! One lock guards both indices (by id and by normalized binary path) so
//! insertions and deletions update them atomically. Path normalization must
//! be identical everywhere or the one-session-per-binary invariant breaks.

use super::store::Metadata;
use crate::error::GatewayError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// An active analysis session. Owns its worker socket path for its entire
/// lifetime; the worker manager borrows it.
#[derive(Debug)]
pub struct Session {
    /// Opaque 8-hex-character token, unique among live sessions.
    pub id: String,
    /// Normalized path of the binary under analysis.
    pub binary_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub timeout: Duration,
    /// Unix socket the worker for this session binds.
    pub socket_path: PathBuf,

    last_activity: RwLock<DateTime<Utc>>,
    worker_pid: RwLock<Option<u32>>,
    has_decompiler: RwLock<bool>,
}

impl Session {
    /// Update the last-activity timestamp. Called on every tool call.
    pub fn touch(&self) {
        let mut last = self
            .last_activity
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *last = Utc::now();
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self
            .last_activity
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the session exceeded its idle timeout.
    pub fn is_expired(&self) -> bool {
        let idle = Utc::now() - self.last_activity();
        idle.to_std().map(|d| d > self.timeout).unwrap_or(false)
    }

    pub fn set_worker_pid(&self, pid: u32) {
        let mut slot = self.worker_pid.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(pid);
    }

    pub fn worker_pid(&self) -> Option<u32> {
        *self.worker_pid.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_has_decompiler(&self, value: bool) {
        let mut slot = self
            .has_decompiler
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = value;
    }

    pub fn has_decompiler(&self) -> bool {
        *self
            .has_decompiler
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// The persisted subset of this session's state.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            id: self.id.clone(),
            binary_path: self.binary_path.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity(),
            timeout_secs: self.timeout.as_secs(),
            has_decompiler: self.has_decompiler(),
        }
    }
}

/// Lexically normalize a path: resolve `.` and `..` components and collapse
/// separators without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn allocate_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("ida-worker-{}.sock", short_token()))
}

#[derive(Default)]
struct Indices {
    by_id: HashMap<String, Arc<Session>>,
    by_binary: HashMap<PathBuf, Arc<Session>>,
}

/// Thread-safe registry of active sessions.
pub struct Registry {
    indices: RwLock<Indices>,
    max_sessions: usize,
}

impl Registry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            indices: RwLock::new(Indices::default()),
            max_sessions,
        }
    }

    /// Create a session for the given binary. Fails with `CapacityExceeded`
    /// when the registry is full.
    pub fn create(
        &self,
        binary_path: &Path,
        timeout: Duration,
    ) -> Result<Arc<Session>, GatewayError> {
        let mut indices = self.indices.write().unwrap_or_else(|e| e.into_inner());
        if indices.by_id.len() >= self.max_sessions {
            return Err(GatewayError::CapacityExceeded(self.max_sessions));
        }

        let norm = normalize_path(binary_path);
        let now = Utc::now();
        let session = Arc::new(Session {
            id: short_token(),
            binary_path: norm.clone(),
            created_at: now,
            timeout,
            socket_path: allocate_socket_path(),
            last_activity: RwLock::new(now),
            worker_pid: RwLock::new(None),
            has_decompiler: RwLock::new(false),
        });

        indices.by_id.insert(session.id.clone(), session.clone());
        indices.by_binary.insert(norm, session.clone());
        Ok(session)
    }

    /// Re-insert a session from persisted metadata (server restart). The old
    /// socket is stale, so a fresh socket path is allocated.
    pub fn restore(&self, meta: &Metadata) -> Result<Arc<Session>, GatewayError> {
        let mut indices = self.indices.write().unwrap_or_else(|e| e.into_inner());
        if indices.by_id.len() >= self.max_sessions {
            return Err(GatewayError::CapacityExceeded(self.max_sessions));
        }
        if indices.by_id.contains_key(&meta.id) {
            return Err(GatewayError::DuplicateId(meta.id.clone()));
        }

        let norm = normalize_path(&meta.binary_path);
        let session = Arc::new(Session {
            id: meta.id.clone(),
            binary_path: norm.clone(),
            created_at: meta.created_at,
            timeout: Duration::from_secs(meta.timeout_secs),
            socket_path: allocate_socket_path(),
            last_activity: RwLock::new(meta.last_activity),
            worker_pid: RwLock::new(None),
            has_decompiler: RwLock::new(meta.has_decompiler),
        });

        indices.by_id.insert(session.id.clone(), session.clone());
        indices.by_binary.insert(norm, session.clone());
        Ok(session)
    }

    /// The session currently handling the given binary, if any. Used to
    /// de-duplicate `open_binary` calls.
    pub fn find_by_binary_path(&self, path: &Path) -> Option<Arc<Session>> {
        let indices = self.indices.read().unwrap_or_else(|e| e.into_inner());
        indices.by_binary.get(&normalize_path(path)).cloned()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let indices = self.indices.read().unwrap_or_else(|e| e.into_inner());
        indices.by_id.get(id).cloned()
    }

    pub fn delete(&self, id: &str) {
        let mut indices = self.indices.write().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = indices.by_id.remove(id) {
            indices.by_binary.remove(&session.binary_path);
        }
    }

    pub fn list(&self) -> Vec<Arc<Session>> {
        let indices = self.indices.read().unwrap_or_else(|e| e.into_inner());
        indices.by_id.values().cloned().collect()
    }

    /// Sessions whose idle time exceeds their timeout.
    pub fn expired(&self) -> Vec<Arc<Session>> {
        let indices = self.indices.read().unwrap_or_else(|e| e.into_inner());
        indices
            .by_id
            .values()
            .filter(|s| s.is_expired())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        let indices = self.indices.read().unwrap_or_else(|e| e.into_inner());
        indices.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(4)
    }

    #[test]
    fn create_indexes_by_id_and_path() {
        let reg = registry();
        let sess = reg
            .create(Path::new("/tmp/./x"), Duration::from_secs(60))
            .expect("create");
        assert_eq!(sess.id.len(), 8);
        assert!(sess.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sess.binary_path, PathBuf::from("/tmp/x"));

        assert!(reg.get(&sess.id).is_some());
        let found = reg
            .find_by_binary_path(Path::new("/tmp/x"))
            .expect("indexed by normalized path");
        assert_eq!(found.id, sess.id);
    }

    #[test]
    fn create_and_lookup_normalize_identically() {
        let reg = registry();
        let sess = reg
            .create(Path::new("/data//bins/../bins/app"), Duration::from_secs(60))
            .expect("create");
        let found = reg
            .find_by_binary_path(Path::new("/data/bins/app"))
            .expect("dedup lookup");
        assert_eq!(found.id, sess.id);
    }

    #[test]
    fn capacity_is_enforced() {
        let reg = Registry::new(2);
        reg.create(Path::new("/a"), Duration::from_secs(60))
            .expect("first");
        reg.create(Path::new("/b"), Duration::from_secs(60))
            .expect("second");
        let err = reg
            .create(Path::new("/c"), Duration::from_secs(60))
            .expect_err("registry full");
        assert!(matches!(err, GatewayError::CapacityExceeded(2)));
    }

    #[test]
    fn delete_removes_both_indices() {
        let reg = registry();
        let sess = reg
            .create(Path::new("/tmp/y"), Duration::from_secs(60))
            .expect("create");
        reg.delete(&sess.id);
        assert!(reg.get(&sess.id).is_none());
        assert!(reg.find_by_binary_path(Path::new("/tmp/y")).is_none());
    }

    #[test]
    fn touch_is_monotonic() {
        let reg = registry();
        let sess = reg
            .create(Path::new("/tmp/z"), Duration::from_secs(60))
            .expect("create");
        let before = sess.last_activity();
        sess.touch();
        let after = sess.last_activity();
        assert!(after >= before);
        assert!(after <= Utc::now());
    }

    #[test]
    fn expired_returns_idle_sessions() {
        let reg = registry();
        let fresh = reg
            .create(Path::new("/tmp/fresh"), Duration::from_secs(3600))
            .expect("create");
        let stale = reg
            .create(Path::new("/tmp/stale"), Duration::from_secs(1))
            .expect("create");
        {
            let mut last = stale
                .last_activity
                .write()
                .unwrap_or_else(|e| e.into_inner());
            *last = Utc::now() - chrono::Duration::seconds(2);
        }

        let expired = reg.expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);
        assert!(!fresh.is_expired());
    }

    #[test]
    fn restore_rejects_duplicate_id() {
        let reg = registry();
        let sess = reg
            .create(Path::new("/tmp/app"), Duration::from_secs(60))
            .expect("create");
        let meta = sess.metadata();
        let err = reg.restore(&meta).expect_err("duplicate id");
        assert!(matches!(err, GatewayError::DuplicateId(_)));
    }

    #[test]
    fn restore_allocates_fresh_socket() {
        let reg = registry();
        let sess = reg
            .create(Path::new("/tmp/app"), Duration::from_secs(60))
            .expect("create");
        let meta = sess.metadata();
        let old_socket = sess.socket_path.clone();
        reg.delete(&sess.id);

        let restored = reg.restore(&meta).expect("restore");
        assert_eq!(restored.id, sess.id);
        assert_ne!(restored.socket_path, old_socket);
    }
}
