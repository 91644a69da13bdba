//! Biased matrix factorization trained with stochastic gradient descent.
//!
//! The rating of user `u` for item `i` is modelled as
//! `μ + b_u + b_i + p_u · q_i`, fitted on observed ratings only.

use std::collections::{HashMap, HashSet};

use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    error::{EngineError, EngineResult},
    models::{ItemId, Rating, RatingScale, UserId},
};

/// Training hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub scale: RatingScale,
    /// Latent dimension `k`
    pub factors: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    /// Factors start uniformly in `[-init_range, init_range)`
    pub init_range: f64,
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            scale: RatingScale::default(),
            factors: 100,
            epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            init_range: 0.1,
            seed: 42,
        }
    }
}

impl TrainingParams {
    fn validate(&self) -> EngineResult<()> {
        if !self.scale.is_valid() {
            return Err(EngineError::InvalidParams(format!(
                "rating scale [{}, {}] is empty",
                self.scale.min, self.scale.max
            )));
        }
        if self.factors == 0 {
            return Err(EngineError::InvalidParams("factors must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(EngineError::InvalidParams("learning rate must be positive".into()));
        }
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return Err(EngineError::InvalidParams(
                "regularization must be non-negative".into(),
            ));
        }
        if !(self.init_range.is_finite() && self.init_range >= 0.0) {
            return Err(EngineError::InvalidParams("init_range must be non-negative".into()));
        }
        Ok(())
    }
}

/// Trained user and item latent vectors with bias terms
#[derive(Debug, Clone)]
pub struct LatentFactorModel {
    params: TrainingParams,
    global_mean: f64,
    users: HashMap<UserId, usize>,
    items: HashMap<ItemId, usize>,
    user_bias: Array1<f64>,
    item_bias: Array1<f64>,
    user_factors: Array2<f64>,
    item_factors: Array2<f64>,
    rated: Vec<HashSet<ItemId>>,
    n_ratings: usize,
}

impl LatentFactorModel {
    /// Fits the model on every observation in `ratings`.
    ///
    /// Duplicate (user, item) pairs are kept as repeated observations.
    pub fn train(ratings: &[Rating], params: TrainingParams) -> EngineResult<Self> {
        params.validate()?;
        if ratings.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let mut users: HashMap<UserId, usize> = HashMap::new();
        let mut items: HashMap<ItemId, usize> = HashMap::new();
        let mut rated: Vec<HashSet<ItemId>> = Vec::new();
        let mut observations: Vec<(usize, usize, f64)> = Vec::with_capacity(ratings.len());

        for rating in ratings {
            if !params.scale.contains(rating.score) {
                return Err(EngineError::DataIntegrity(format!(
                    "rating {} by user {} for item {} is outside [{}, {}]",
                    rating.score, rating.user_id, rating.item_id, params.scale.min, params.scale.max
                )));
            }

            let next_user = users.len();
            let u = *users.entry(rating.user_id).or_insert(next_user);
            if u == rated.len() {
                rated.push(HashSet::new());
            }
            rated[u].insert(rating.item_id);

            let next_item = items.len();
            let i = *items.entry(rating.item_id).or_insert(next_item);

            observations.push((u, i, rating.score));
        }

        let k = params.factors;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut init = |rows: usize| {
            Array2::from_shape_simple_fn((rows, k), || {
                if params.init_range > 0.0 {
                    rng.gen_range(-params.init_range..params.init_range)
                } else {
                    0.0
                }
            })
        };
        let mut user_factors = init(users.len());
        let mut item_factors = init(items.len());
        let mut user_bias = Array1::<f64>::zeros(users.len());
        let mut item_bias = Array1::<f64>::zeros(items.len());

        let global_mean =
            observations.iter().map(|&(_, _, r)| r).sum::<f64>() / observations.len() as f64;
        let lr = params.learning_rate;
        let reg = params.regularization;

        for epoch in 0..params.epochs {
            observations.shuffle(&mut rng);
            let mut squared_error = 0.0;

            for &(u, i, r) in &observations {
                let dot: f64 = user_factors.row(u).dot(&item_factors.row(i));
                let err = r - (global_mean + user_bias[u] + item_bias[i] + dot);
                squared_error += err * err;

                user_bias[u] += lr * (err - reg * user_bias[u]);
                item_bias[i] += lr * (err - reg * item_bias[i]);

                for f in 0..k {
                    let puf = user_factors[[u, f]];
                    let qif = item_factors[[i, f]];
                    user_factors[[u, f]] += lr * (err * qif - reg * puf);
                    item_factors[[i, f]] += lr * (err * puf - reg * qif);
                }
            }

            tracing::trace!(
                epoch,
                rmse = (squared_error / observations.len() as f64).sqrt(),
                "SGD epoch finished"
            );
        }

        let finite = user_bias.iter().all(|v| v.is_finite())
            && item_bias.iter().all(|v| v.is_finite())
            && user_factors.iter().all(|v| v.is_finite())
            && item_factors.iter().all(|v| v.is_finite());
        if !finite {
            return Err(EngineError::TrainingDiverged {
                epochs: params.epochs,
            });
        }

        tracing::debug!(
            users = users.len(),
            items = items.len(),
            ratings = observations.len(),
            factors = k,
            epochs = params.epochs,
            "Trained latent factor model"
        );

        Ok(Self {
            params,
            global_mean,
            users,
            items,
            user_bias,
            item_bias,
            user_factors,
            item_factors,
            rated,
            n_ratings: observations.len(),
        })
    }

    /// Predicted rating, clipped to the training scale
    pub fn predict(&self, user_id: UserId, item_id: ItemId) -> EngineResult<f64> {
        let u = self.user_index(user_id)?;
        let i = *self.items.get(&item_id).ok_or_else(|| {
            EngineError::ColdStart(format!("item {} has no rating history", item_id))
        })?;
        Ok(self.score(u, i))
    }

    /// Best `n` candidates for a user, highest prediction first.
    ///
    /// Items the user rated during training and items without a learned vector are
    /// skipped. Equal predictions are ordered by ascending item id.
    pub fn top_n(
        &self,
        user_id: UserId,
        candidates: &[ItemId],
        n: usize,
    ) -> EngineResult<Vec<ItemId>> {
        let u = self.user_index(user_id)?;
        let rated = &self.rated[u];

        let mut scored: Vec<(ItemId, f64)> = candidates
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|item_id| !rated.contains(item_id))
            .filter_map(|item_id| {
                self.items
                    .get(&item_id)
                    .map(|&i| (item_id, self.score(u, i)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(n);

        Ok(scored.into_iter().map(|(item_id, _)| item_id).collect())
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn knows_item(&self, item_id: ItemId) -> bool {
        self.items.contains_key(&item_id)
    }

    /// Items the user rated in the training data
    pub fn rated_by(&self, user_id: UserId) -> Option<&HashSet<ItemId>> {
        self.users.get(&user_id).map(|&u| &self.rated[u])
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    pub fn n_ratings(&self) -> usize {
        self.n_ratings
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    fn user_index(&self, user_id: UserId) -> EngineResult<usize> {
        self.users.get(&user_id).copied().ok_or_else(|| {
            EngineError::ColdStart(format!("user {} has no rating history", user_id))
        })
    }

    fn score(&self, u: usize, i: usize) -> f64 {
        let dot: f64 = self.user_factors.row(u).dot(&self.item_factors.row(i));
        self.params
            .scale
            .clip(self.global_mean + self.user_bias[u] + self.item_bias[i] + dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params() -> TrainingParams {
        TrainingParams {
            scale: RatingScale::new(1.0, 5.0),
            factors: 8,
            epochs: 300,
            learning_rate: 0.01,
            regularization: 0.02,
            init_range: 0.1,
            seed: 7,
        }
    }

    /// Two taste clusters: users 1-3 love items 10-11 and hate 20-21, users 4-6 the reverse.
    fn clustered_ratings() -> Vec<Rating> {
        let mut ratings = Vec::new();
        for user in 1..=3 {
            ratings.push(Rating::new(user, 10, 5.0));
            ratings.push(Rating::new(user, 20, 1.0));
        }
        for user in 4..=6 {
            ratings.push(Rating::new(user, 10, 1.0));
            ratings.push(Rating::new(user, 20, 5.0));
        }
        for user in [2, 3] {
            ratings.push(Rating::new(user, 11, 5.0));
            ratings.push(Rating::new(user, 21, 1.0));
        }
        for user in [5, 6] {
            ratings.push(Rating::new(user, 11, 1.0));
            ratings.push(Rating::new(user, 21, 5.0));
        }
        ratings
    }

    #[test]
    fn test_empty_dataset() {
        let result = LatentFactorModel::train(&[], params());
        assert!(matches!(result, Err(EngineError::EmptyDataset)));
    }

    #[test]
    fn test_rejects_out_of_scale_rating() {
        let result = LatentFactorModel::train(&[Rating::new(1, 1, 9.0)], params());
        assert!(matches!(result, Err(EngineError::DataIntegrity(_))));
    }

    #[test]
    fn test_rejects_invalid_params() {
        let mut bad = params();
        bad.factors = 0;
        let result = LatentFactorModel::train(&clustered_ratings(), bad);
        assert!(matches!(result, Err(EngineError::InvalidParams(_))));
    }

    #[test]
    fn test_rejects_negative_init_range() {
        let mut bad = params();
        bad.init_range = -0.1;
        let result = LatentFactorModel::train(&clustered_ratings(), bad);
        assert!(matches!(result, Err(EngineError::InvalidParams(_))));
    }

    #[test]
    fn test_initial_factors_stay_within_init_range() {
        let mut untrained = params();
        untrained.epochs = 0;
        untrained.factors = 32;
        untrained.init_range = 0.05;
        let model = LatentFactorModel::train(&clustered_ratings(), untrained).unwrap();

        let all = model.user_factors.iter().chain(model.item_factors.iter());
        assert!(all.clone().all(|v| (-0.05..0.05).contains(v)));
        assert!(all.clone().any(|v| *v != 0.0));

        untrained.init_range = 0.0;
        let zeroed = LatentFactorModel::train(&clustered_ratings(), untrained).unwrap();
        assert!(zeroed.user_factors.iter().all(|v| *v == 0.0));
        assert!(zeroed.item_factors.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_divergence_is_reported() {
        let mut wild = params();
        wild.learning_rate = 1e6;
        wild.regularization = 0.0;
        let result = LatentFactorModel::train(&clustered_ratings(), wild);
        assert!(matches!(result, Err(EngineError::TrainingDiverged { .. })));
    }

    #[test]
    fn test_learns_cluster_preferences() {
        let model = LatentFactorModel::train(&clustered_ratings(), params()).unwrap();

        // User 1 has not rated 11 or 21; its cluster liked 11 and disliked 21.
        let liked = model.predict(1, 11).unwrap();
        let disliked = model.predict(1, 21).unwrap();
        assert!(liked > disliked, "liked {liked} should exceed disliked {disliked}");

        let other_liked = model.predict(4, 21).unwrap();
        let other_disliked = model.predict(4, 11).unwrap();
        assert!(other_liked > other_disliked);
    }

    #[test]
    fn test_cold_start_user_and_item() {
        let model = LatentFactorModel::train(&clustered_ratings(), params()).unwrap();
        assert!(matches!(model.predict(99, 10), Err(EngineError::ColdStart(_))));
        assert!(matches!(model.predict(1, 999), Err(EngineError::ColdStart(_))));
        assert!(matches!(model.top_n(99, &[10, 11], 5), Err(EngineError::ColdStart(_))));
    }

    #[test]
    fn test_top_n_excludes_rated_and_unknown_items() {
        let model = LatentFactorModel::train(&clustered_ratings(), params()).unwrap();
        let top = model.top_n(1, &[10, 11, 20, 21, 999], 10).unwrap();
        assert_eq!(top, vec![11, 21]);
        assert_eq!(model.top_n(1, &[10, 11, 20, 21], 1).unwrap(), vec![11]);
    }

    #[test]
    fn test_top_n_breaks_ties_by_item_id() {
        let mut flat = params();
        flat.init_range = 0.0;
        let ratings = vec![
            Rating::new(1, 1, 3.0),
            Rating::new(2, 3, 3.0),
            Rating::new(2, 2, 3.0),
        ];
        let model = LatentFactorModel::train(&ratings, flat).unwrap();
        // With zero factors and all-equal ratings every prediction equals the mean.
        assert_eq!(model.top_n(1, &[3, 2], 2).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_duplicate_ratings_are_repeated_observations() {
        let ratings = vec![
            Rating::new(1, 1, 5.0),
            Rating::new(1, 1, 5.0),
            Rating::new(2, 1, 1.0),
        ];
        let model = LatentFactorModel::train(&ratings, params()).unwrap();
        assert_eq!(model.n_ratings(), 3);
        assert_eq!(model.n_users(), 2);
        assert_eq!(model.rated_by(1).unwrap().len(), 1);
        assert!(model.top_n(1, &[1], 5).unwrap().is_empty());
    }

    #[test]
    fn test_training_is_deterministic_for_a_seed() {
        let a = LatentFactorModel::train(&clustered_ratings(), params()).unwrap();
        let b = LatentFactorModel::train(&clustered_ratings(), params()).unwrap();
        assert_eq!(a.predict(1, 21).unwrap(), b.predict(1, 21).unwrap());
    }

    proptest! {
        #[test]
        fn prop_predictions_stay_in_scale(
            raw in prop::collection::vec((0i64..6, 0i64..6, 1u8..=5), 1..40),
            seed in any::<u64>(),
        ) {
            let ratings: Vec<Rating> = raw
                .iter()
                .map(|&(u, i, s)| Rating::new(u, i, s as f64))
                .collect();
            let mut p = params();
            p.epochs = 30;
            p.learning_rate = 0.02;
            p.seed = seed;
            let model = LatentFactorModel::train(&ratings, p).unwrap();

            for r in &ratings {
                for other in &ratings {
                    let score = model.predict(r.user_id, other.item_id).unwrap();
                    prop_assert!((1.0..=5.0).contains(&score));
                }
            }
        }
    }
}
