use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tokio::sync::RwLock;

use super::{CatalogStore, RatingStore};
use crate::{
    error::AppResult,
    models::{Item, ItemId, Rating, UserId},
};

/// On-disk layout of a seed snapshot
#[derive(Debug, Default, Deserialize)]
struct Seed {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    ratings: Vec<Rating>,
}

/// Process-local catalog and rating log
///
/// Nothing is persisted; appended favorites live as long as the store.
pub struct MemoryStore {
    items: Vec<Item>,
    ratings: RwLock<Vec<Rating>>,
}

impl MemoryStore {
    pub fn new(items: Vec<Item>, ratings: Vec<Rating>) -> Self {
        Self {
            items,
            ratings: RwLock::new(ratings),
        }
    }

    /// Loads a JSON snapshot of the form `{"items": [...], "ratings": [...]}`
    pub async fn from_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read seed file {}: {}", path.display(), e))?;
        let seed: Seed = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Failed to parse seed file {}: {}", path.display(), e))?;

        tracing::info!(
            path = %path.display(),
            items = seed.items.len(),
            ratings = seed.ratings.len(),
            "Loaded seed snapshot"
        );

        Ok(Self::new(seed.items, seed.ratings))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn items(&self) -> AppResult<Vec<Item>> {
        Ok(self.items.clone())
    }
}

#[async_trait::async_trait]
impl RatingStore for MemoryStore {
    async fn ratings(&self) -> AppResult<Vec<Rating>> {
        Ok(self.ratings.read().await.clone())
    }

    async fn rated_items(&self, user_id: UserId) -> AppResult<HashSet<ItemId>> {
        let ratings = self.ratings.read().await;
        Ok(ratings
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.item_id)
            .collect())
    }

    async fn append_favorite(&self, favorite: Rating) -> AppResult<()> {
        self.ratings.write().await.push(favorite);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_favorite_is_visible_in_snapshot() {
        let store = MemoryStore::new(vec![], vec![Rating::new(1, 10, 4.0)]);
        store.append_favorite(Rating::new(1, 11, 5.0)).await.unwrap();
        store.append_favorite(Rating::new(1, 11, 5.0)).await.unwrap();

        let ratings = store.ratings().await.unwrap();
        assert_eq!(ratings.len(), 3);
        assert_eq!(ratings[2], Rating::new(1, 11, 5.0));
    }

    #[tokio::test]
    async fn test_rated_items_deduplicates() {
        let store = MemoryStore::new(
            vec![],
            vec![
                Rating::new(1, 10, 4.0),
                Rating::new(1, 10, 2.0),
                Rating::new(2, 12, 3.0),
            ],
        );

        let rated = store.rated_items(1).await.unwrap();
        assert_eq!(rated, HashSet::from([10]));
        assert!(store.rated_items(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "items": [{{"id": 1, "title": "A", "text_features": "space opera"}}],
                "ratings": [{{"user_id": 100, "item_id": 1, "score": 5.0}}]
            }}"#
        )
        .unwrap();

        let store = MemoryStore::from_seed_file(file.path()).await.unwrap();
        assert_eq!(store.items().await.unwrap().len(), 1);
        assert_eq!(store.ratings().await.unwrap(), vec![Rating::new(100, 1, 5.0)]);
    }

    #[tokio::test]
    async fn test_from_seed_file_missing() {
        let result = MemoryStore::from_seed_file("/nonexistent/seed.json").await;
        assert!(result.is_err());
    }
}
