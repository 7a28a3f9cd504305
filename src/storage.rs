use crate::error::Result;
use crate::models::SearchResultSet;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination for finished runs.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn save(&self, results: &SearchResultSet) -> Result<()>;
}

/// Writes result sets as indented JSON to a single file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<SearchResultSet> {
        let json = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[async_trait]
impl ResultSink for JsonStore {
    async fn save(&self, results: &SearchResultSet) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(results)?;
        tokio::fs::write(&self.path, json).await?;
        info!(
            "💾 Saved {} listings to {}",
            results.listing_count(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::types::{SearchQuery, TransactionKind};
    use chrono::Utc;

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested/deeper/results.json"));
        let results = SearchResultSet::new(
            SearchQuery::new("SY3 9EB", TransactionKind::Buy),
            Utc::now(),
        );

        store.save(&results).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"Version\": \"1.0\""));
        assert_eq!(store.load().await.unwrap(), results);
    }

    #[tokio::test]
    async fn loading_a_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.is_err());
    }
}
