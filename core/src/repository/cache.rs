use crate::config::default_data_dir;
use crate::model::stats::CachedSnapshot;
use crate::repository::traits::{CacheKey, SnapshotCache};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// One JSON file per mess and month under `<base>/cache`.
#[derive(Clone)]
pub struct FileSnapshotCache {
    base_dir: PathBuf,
}

impl FileSnapshotCache {
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut path = match base_dir {
            Some(p) => p,
            None => default_data_dir()?,
        };
        path.push("cache");
        std::fs::create_dir_all(&path)?;
        Ok(Self { base_dir: path })
    }

    fn path_for(&self, key: &CacheKey) -> Result<PathBuf> {
        if key.mess_id.contains(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_')) {
            return Err(anyhow!("Mess id '{}' cannot be used as a cache key", key.mess_id));
        }
        let filename = format!("snapshot_{}_{}.json", key.mess_id, key.month.file_suffix());
        Ok(self.base_dir.join(filename))
    }
}

#[async_trait]
impl SnapshotCache for FileSnapshotCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSnapshot>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let entry: CachedSnapshot = serde_json::from_str(&content)?;
                Ok(Some(entry))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &CacheKey, entry: &CachedSnapshot) -> Result<()> {
        let path = self.path_for(key)?;
        let content = serde_json::to_string_pretty(entry)?;
        fs::write(path, content).await?;
        Ok(())
    }
}
