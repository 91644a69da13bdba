pub mod content;
pub mod evaluation;
pub mod latent;
pub mod recommendations;

pub use content::{ContentOptions, ContentSimilarityIndex};
pub use evaluation::Metrics;
pub use latent::{LatentFactorModel, TrainingParams};
pub use recommendations::{RecommendationService, ServiceOptions};
