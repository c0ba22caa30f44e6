//! Baselines: per-model reference distributions recorded at training time

mod snapshot;
mod store;

pub use snapshot::{
    BaselineSnapshot, CategoricalFeatureStats, DataQualityBaseline, FeatureStats, GroupStats,
    NumericFeatureStats,
};
pub use store::BaselineStore;
