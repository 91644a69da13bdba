use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    db::{CatalogStore, RatingStore},
    error::{AppError, AppResult, EngineError},
    models::{
        FavoriteOutcome, Item, ItemId, ModelStatus, Rating, RetrainStatus, UserId,
    },
    services::{
        content::{ContentOptions, ContentSimilarityIndex},
        evaluation::{self, Metrics},
        latent::{LatentFactorModel, TrainingParams},
    },
};

/// Settings for the recommendation service
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    pub training: TrainingParams,
    pub content: ContentOptions,
    /// Fraction of ratings held out for a start-up accuracy check (0 disables)
    pub holdout_fraction: f64,
}

/// One published version of the collaborative model
#[derive(Debug)]
struct ModelSnapshot {
    run_id: Uuid,
    trained_at: DateTime<Utc>,
    /// Number of favorite appends folded into this model
    generation: u64,
    model: Option<Arc<LatentFactorModel>>,
}

impl ModelSnapshot {
    fn untrained() -> Self {
        Self {
            run_id: Uuid::nil(),
            trained_at: Utc::now(),
            generation: 0,
            model: None,
        }
    }

    fn trained(model: LatentFactorModel, generation: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            generation,
            model: Some(Arc::new(model)),
        }
    }
}

/// Orchestrates the content index and the latent factor model
///
/// Reads work on an `Arc` of the current model snapshot, so a retrain never blocks
/// them for longer than the pointer swap. Retrains run one at a time.
pub struct RecommendationService {
    item_ids: Vec<ItemId>,
    titles: HashMap<ItemId, String>,
    index: ContentSimilarityIndex,
    ratings: Arc<dyn RatingStore>,
    options: ServiceOptions,
    current: RwLock<Arc<ModelSnapshot>>,
    retrain_lock: Mutex<()>,
    appended: AtomicU64,
}

impl RecommendationService {
    /// Loads the catalog, builds the content index and trains the first model.
    ///
    /// An empty rating log is not fatal: the service starts without a collaborative
    /// model and returns empty collaborative results until ratings arrive.
    pub async fn new(
        catalog: &dyn CatalogStore,
        ratings: Arc<dyn RatingStore>,
        options: ServiceOptions,
    ) -> AppResult<Self> {
        let items = catalog.items().await?;
        let content_options = options.content;
        let (items, index) = tokio::task::spawn_blocking(move || {
            let index = ContentSimilarityIndex::build(&items, content_options);
            (items, index)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Content index task failed: {}", e)))?;
        let index = index?;

        let service = Self {
            item_ids: items.iter().map(|item| item.id).collect(),
            titles: items.into_iter().map(|Item { id, title, .. }| (id, title)).collect(),
            index,
            ratings,
            options,
            current: RwLock::new(Arc::new(ModelSnapshot::untrained())),
            retrain_lock: Mutex::new(()),
            appended: AtomicU64::new(0),
        };

        if options.holdout_fraction > 0.0 {
            match service.validate_holdout().await {
                Ok(Some(metrics)) => tracing::info!(
                    rmse = metrics.rmse,
                    mae = metrics.mae,
                    evaluated = metrics.evaluated,
                    skipped = metrics.skipped,
                    "Hold-out validation finished"
                ),
                Ok(None) => tracing::info!("Hold-out validation skipped, no ratings"),
                Err(e) => tracing::warn!(error = %e, "Hold-out validation failed"),
            }
        }

        match service.retrain().await {
            Ok(_) => {}
            Err(AppError::Engine(EngineError::EmptyDataset)) => {
                tracing::warn!("Rating log is empty, starting without a collaborative model");
            }
            Err(e) => return Err(e),
        }

        Ok(service)
    }

    /// Records a favorite as a top-of-scale rating and retrains on the augmented log.
    ///
    /// The append must succeed; a failed retrain is reported in the outcome and leaves
    /// the previous model serving.
    pub async fn record_favorite(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> AppResult<FavoriteOutcome> {
        if !self.titles.contains_key(&item_id) {
            return Err(EngineError::NotFound(item_id).into());
        }

        let rating = Rating::favorite(user_id, item_id, self.options.training.scale);
        self.ratings.append_favorite(rating).await?;
        let generation = self.appended.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(user_id, item_id, generation, "Recorded favorite");

        let retrain = match self.retrain_covering(Some(generation)).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    user_id,
                    item_id,
                    "Retrain after favorite failed, keeping previous model"
                );
                RetrainStatus::Failed
            }
        };

        Ok(FavoriteOutcome {
            rating,
            retrain,
            model_generation: self.snapshot().await.generation,
        })
    }

    /// Rebuilds the latent factor model from the full rating log
    pub async fn retrain(&self) -> AppResult<RetrainStatus> {
        self.retrain_covering(None).await
    }

    /// Top `n` unrated catalog titles for a user by predicted rating.
    ///
    /// Users without rating history get an empty list.
    pub async fn recommend_collaborative(&self, user_id: UserId, n: usize) -> AppResult<Vec<String>> {
        let snapshot = self.snapshot().await;
        let Some(model) = snapshot.model.as_ref() else {
            tracing::debug!(user_id, "No collaborative model trained yet");
            return Ok(Vec::new());
        };

        if !model.knows_user(user_id) {
            tracing::debug!(user_id, "Cold-start user, no collaborative recommendations");
            return Ok(Vec::new());
        }

        let rated = self.ratings.rated_items(user_id).await?;
        let candidates: Vec<ItemId> = self
            .item_ids
            .iter()
            .copied()
            .filter(|id| !rated.contains(id))
            .collect();

        let ids = match model.top_n(user_id, &candidates, n) {
            Ok(ids) => ids,
            Err(EngineError::ColdStart(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            user_id,
            candidates = candidates.len(),
            returned = ids.len(),
            run_id = %snapshot.run_id,
            "Collaborative recommendations"
        );

        Ok(self.titles_for(&ids))
    }

    /// Titles of the `n` items whose text is most similar to `item_id`
    pub async fn recommend_content_based(&self, item_id: ItemId, n: usize) -> AppResult<Vec<String>> {
        let ids = self.index.similar_items(item_id, n)?;
        Ok(self.titles_for(&ids))
    }

    pub async fn status(&self) -> ModelStatus {
        let snapshot = self.snapshot().await;
        let model = snapshot.model.as_deref();

        ModelStatus {
            run_id: snapshot.run_id,
            trained_at: snapshot.trained_at,
            generation: snapshot.generation,
            trained: model.is_some(),
            users: model.map_or(0, LatentFactorModel::n_users),
            items: model.map_or(0, LatentFactorModel::n_items),
            ratings: model.map_or(0, LatentFactorModel::n_ratings),
            catalog_items: self.item_ids.len(),
        }
    }

    pub fn catalog_len(&self) -> usize {
        self.item_ids.len()
    }

    async fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.current.read().await.clone()
    }

    /// Trains and publishes a new model unless one covering `target` is already live
    async fn retrain_covering(&self, target: Option<u64>) -> AppResult<RetrainStatus> {
        let _guard = self.retrain_lock.lock().await;

        if let Some(target) = target {
            let current = self.snapshot().await;
            if current.model.is_some() && current.generation >= target {
                tracing::debug!(
                    requested = target,
                    generation = current.generation,
                    "Favorite already folded into model"
                );
                return Ok(RetrainStatus::Coalesced);
            }
        }

        // Read before loading the log: every append counted here is in the snapshot below.
        let generation = self.appended.load(Ordering::SeqCst);
        let ratings = self.ratings.ratings().await?;
        self.check_integrity(&ratings)?;

        let params = self.options.training;
        let model = tokio::task::spawn_blocking(move || LatentFactorModel::train(&ratings, params))
            .await
            .map_err(|e| AppError::Internal(format!("Training task failed: {}", e)))??;

        let snapshot = ModelSnapshot::trained(model, generation);
        tracing::info!(
            run_id = %snapshot.run_id,
            generation,
            users = snapshot.model.as_ref().map_or(0, |m| m.n_users()),
            ratings = snapshot.model.as_ref().map_or(0, |m| m.n_ratings()),
            "Published new collaborative model"
        );
        *self.current.write().await = Arc::new(snapshot);

        Ok(RetrainStatus::Retrained)
    }

    /// Trains on a hold-out split and scores the held-out ratings
    async fn validate_holdout(&self) -> AppResult<Option<Metrics>> {
        let ratings = self.ratings.ratings().await?;
        if ratings.is_empty() {
            return Ok(None);
        }
        self.check_integrity(&ratings)?;

        let params = self.options.training;
        let fraction = self.options.holdout_fraction;
        let metrics = tokio::task::spawn_blocking(move || {
            let (train, test) = evaluation::train_test_split(&ratings, fraction, params.seed)?;
            let model = LatentFactorModel::train(&train, params)?;
            Ok::<_, EngineError>(evaluation::evaluate(&model, &test))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Validation task failed: {}", e)))??;

        Ok(Some(metrics))
    }

    fn check_integrity(&self, ratings: &[Rating]) -> Result<(), EngineError> {
        match ratings.iter().find(|r| !self.titles.contains_key(&r.item_id)) {
            Some(orphan) => Err(EngineError::DataIntegrity(format!(
                "rating by user {} references item {} which is not in the catalog",
                orphan.user_id, orphan.item_id
            ))),
            None => Ok(()),
        }
    }

    fn titles_for(&self, ids: &[ItemId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.titles.get(id).cloned())
            .collect()
    }
}
