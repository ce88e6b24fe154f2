//! Durable session metadata.
//!
//! Snapshots are written atomically (temp file + rename) so a crashed write
//! never leaves a truncated JSON file behind, and loaded on startup to
//! restore sessions across gateway restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The persisted fields of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub binary_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Idle timeout in seconds.
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub has_decompiler: bool,
}

/// Persists session metadata so the gateway can recover after restarts.
pub struct Store {
    dir: PathBuf,
    // Serializes writers so concurrent saves of the same session cannot
    // interleave their temp files.
    lock: Mutex<()>,
}

impl Store {
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn save(&self, meta: &Metadata) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let data = serde_json::to_vec_pretty(meta)?;
        let tmp = self.dir.join(format!("{}.json.tmp", meta.id));
        let target = self.dir.join(format!("{}.json", meta.id));
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &target)
    }

    pub fn delete(&self, session_id: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.dir.join(format!("{session_id}.json"));
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// All session snapshots on disk. Entries that fail to decode abort the
    /// load; partial temp files are skipped by extension.
    pub fn load(&self) -> std::io::Result<Vec<Metadata>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut metas = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = std::fs::read(&path)?;
            let meta: Metadata = serde_json::from_slice(&data).map_err(|e| {
                std::io::Error::other(format!("decode {}: {e}", path.display()))
            })?;
            metas.push(meta);
        }
        Ok(metas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> Metadata {
        Metadata {
            id: id.to_string(),
            binary_path: PathBuf::from("/tmp/target"),
            created_at: Utc::now(),
            last_activity: Utc::now(),
            timeout_secs: 14400,
            has_decompiler: true,
        }
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path()).expect("store");

        let meta = sample("ab12cd34");
        store.save(&meta).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded, vec![meta]);
        assert!(dir.path().join("ab12cd34.json").exists());
        assert!(!dir.path().join("ab12cd34.json.tmp").exists());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path()).expect("store");

        let meta = sample("ab12cd34");
        store.save(&meta).expect("save");
        store.delete("ab12cd34").expect("first delete");
        store.delete("ab12cd34").expect("second delete is a no-op");
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path()).expect("store");

        let mut meta = sample("ab12cd34");
        store.save(&meta).expect("save");
        meta.timeout_secs = 60;
        store.save(&meta).expect("overwrite");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].timeout_secs, 60);
    }
}
