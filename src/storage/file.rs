use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::Storage;
use crate::error::{ClientError, ClientResult};

fn sanitize_key(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// One JSON file per key under `root`. Writes go through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> ClientResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| ClientError::storage(format!("cannot create storage dir {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> ClientResult<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() { return Ok(None); }
        let bytes = fs::read(&path)?;
        if bytes.is_empty() { return Ok(None); }
        let v: Value = serde_json::from_slice(&bytes)?;
        debug!(target: "velovis::storage", "loaded key='{}' from {}", key, path.display());
        Ok(Some(v))
    }

    fn save(&self, key: &str, value: &Value) -> ClientResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(target: "velovis::storage", "saved key='{}' to {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
