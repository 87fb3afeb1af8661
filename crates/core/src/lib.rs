pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{
    Filters, FreshnessMap, LexicalHit, ScoreExplain, ScoredDocument, SearchHit, VectorHit,
    Weights,
};
