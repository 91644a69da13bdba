use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;

use crate::{
    error::{EngineError, EngineResult},
    models::Rating,
    services::latent::LatentFactorModel,
};

/// Accuracy of a model on held-out ratings
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Metrics {
    pub rmse: f64,
    pub mae: f64,
    /// Pairs the model could score
    pub evaluated: usize,
    /// Pairs skipped because the user or item was unseen during training
    pub skipped: usize,
}

/// Shuffles with a fixed seed and splits off `test_fraction` of the ratings.
///
/// Returns `(train, test)`.
pub fn train_test_split(
    ratings: &[Rating],
    test_fraction: f64,
    seed: u64,
) -> EngineResult<(Vec<Rating>, Vec<Rating>)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(EngineError::InvalidParams(format!(
            "test fraction {} must be in [0, 1)",
            test_fraction
        )));
    }

    let mut shuffled = ratings.to_vec();
    shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

    let test_len = (shuffled.len() as f64 * test_fraction).round() as usize;
    let train = shuffled.split_off(test_len);
    Ok((train, shuffled))
}

/// RMSE and MAE of `model` over `test`, ignoring cold-start pairs
pub fn evaluate(model: &LatentFactorModel, test: &[Rating]) -> Metrics {
    let mut squared = 0.0;
    let mut absolute = 0.0;
    let mut evaluated = 0;

    for rating in test {
        if let Ok(prediction) = model.predict(rating.user_id, rating.item_id) {
            let err = rating.score - prediction;
            squared += err * err;
            absolute += err.abs();
            evaluated += 1;
        }
    }

    let (rmse, mae) = if evaluated == 0 {
        (f64::NAN, f64::NAN)
    } else {
        (
            (squared / evaluated as f64).sqrt(),
            absolute / evaluated as f64,
        )
    };

    Metrics {
        rmse,
        mae,
        evaluated,
        skipped: test.len() - evaluated,
    }
}
