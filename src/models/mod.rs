use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod item;
pub mod rating;

pub use item::Item;
pub use rating::{Rating, RatingScale};

/// Canonical catalog identifier, resolved upstream
pub type ItemId = i64;

/// Canonical user identifier, resolved upstream
pub type UserId = i64;

/// Which signal a recommendation request should use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationMode {
    /// Latent-factor predictions for a user
    Collaborative,
    /// Text similarity to an item
    Content,
}

/// Request body for `POST /api/v1/recommendations`
#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub mode: RecommendationMode,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    #[serde(default)]
    pub n: Option<usize>,
}

/// Ordered titles returned to the client
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResponse {
    pub mode: RecommendationMode,
    pub titles: Vec<String>,
}

/// Request body for `POST /api/v1/favorites`
#[derive(Debug, Deserialize, Serialize)]
pub struct FavoriteRequest {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// How many refreshed recommendations to return
    #[serde(default)]
    pub n: Option<usize>,
}

/// What happened to the model after a favorite was recorded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrainStatus {
    /// A new model was trained and published
    Retrained,
    /// A concurrent retrain already folded this favorite into the model
    Coalesced,
    /// Training failed; the previous model is still serving
    Failed,
}

/// Response for `POST /api/v1/favorites`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteOutcome {
    pub rating: Rating,
    pub retrain: RetrainStatus,
    /// Generation of the model serving after this call
    pub model_generation: u64,
}

/// Body returned by `POST /api/v1/favorites`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteResponse {
    #[serde(flatten)]
    pub outcome: FavoriteOutcome,
    /// Collaborative recommendations from the model serving after the favorite
    pub recommendations: Vec<String>,
}

/// Snapshot of the currently serving model, for `GET /api/v1/model`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelStatus {
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub generation: u64,
    pub trained: bool,
    pub users: usize,
    pub items: usize,
    pub ratings: usize,
    pub catalog_items: usize,
}
