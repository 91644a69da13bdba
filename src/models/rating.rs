use serde::{Deserialize, Serialize};

use super::{ItemId, UserId};

/// One observed (user, item, score) triple from the rating log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub score: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, score: f64) -> Self {
        Self {
            user_id,
            item_id,
            score,
        }
    }

    /// Synthetic rating recorded when a user marks an item as a favorite
    pub fn favorite(user_id: UserId, item_id: ItemId, scale: RatingScale) -> Self {
        Self::new(user_id, item_id, scale.max)
    }
}

/// Inclusive bounds of the rating scale used for training and prediction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RatingScale {
    pub min: f64,
    pub max: f64,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 0.5, max: 5.0 }
    }
}

impl RatingScale {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }

    pub fn contains(&self, score: f64) -> bool {
        score.is_finite() && score >= self.min && score <= self.max
    }

    pub fn clip(&self, score: f64) -> f64 {
        score.clamp(self.min, self.max)
    }
}
