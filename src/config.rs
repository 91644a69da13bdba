use serde::Deserialize;

use crate::models::RatingScale;
use crate::services::{ContentOptions, ServiceOptions, TrainingParams};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// PostgreSQL connection URL; the in-memory store is used when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// JSON snapshot (`{"items": [...], "ratings": [...]}`) seeding the in-memory store
    #[serde(default)]
    pub seed_path: Option<String>,

    /// Latent factor dimension
    #[serde(default = "default_factors")]
    pub factors: usize,

    /// SGD passes over the rating log
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_regularization")]
    pub regularization: f64,

    /// Half-width of the uniform range initial factors are drawn from
    #[serde(default = "default_init_range")]
    pub init_range: f64,

    #[serde(default = "default_rating_min")]
    pub rating_min: f64,

    #[serde(default = "default_rating_max")]
    pub rating_max: f64,

    /// Seed for factor initialization and shuffling
    #[serde(default = "default_training_seed")]
    pub training_seed: u64,

    /// Drop English stop words when vectorizing item text
    #[serde(default = "default_stop_words")]
    pub stop_words: bool,

    /// Result count when a request does not specify one
    #[serde(default = "default_results")]
    pub default_results: usize,

    /// Upper bound on the result count a request may ask for
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Fraction of ratings held out for an offline accuracy check at start-up (0 disables)
    #[serde(default)]
    pub holdout_fraction: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_factors() -> usize {
    100
}

fn default_epochs() -> usize {
    20
}

fn default_learning_rate() -> f64 {
    0.005
}

fn default_regularization() -> f64 {
    0.02
}

fn default_init_range() -> f64 {
    0.1
}

fn default_rating_min() -> f64 {
    0.5
}

fn default_rating_max() -> f64 {
    5.0
}

fn default_training_seed() -> u64 {
    42
}

fn default_stop_words() -> bool {
    true
}

fn default_results() -> usize {
    10
}

fn default_max_results() -> usize {
    100
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !self.rating_scale().is_valid() {
            anyhow::bail!(
                "RATING_MIN ({}) must be below RATING_MAX ({})",
                self.rating_min,
                self.rating_max
            );
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            anyhow::bail!("HOLDOUT_FRACTION must be in [0, 1)");
        }
        if self.default_results == 0 || self.default_results > self.max_results {
            anyhow::bail!("DEFAULT_RESULTS must be between 1 and MAX_RESULTS");
        }
        Ok(())
    }

    pub fn rating_scale(&self) -> RatingScale {
        RatingScale::new(self.rating_min, self.rating_max)
    }

    pub fn training_params(&self) -> TrainingParams {
        TrainingParams {
            scale: self.rating_scale(),
            factors: self.factors,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            regularization: self.regularization,
            init_range: self.init_range,
            seed: self.training_seed,
        }
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            training: self.training_params(),
            content: ContentOptions {
                stop_words: self.stop_words,
            },
            holdout_fraction: self.holdout_fraction,
        }
    }
}
