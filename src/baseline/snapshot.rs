//! Baseline snapshot model and builder

use crate::drift::stats::SummaryStats;
use crate::drift::{compute_histogram, DataQualityStats, Histogram, DEFAULT_BINS};
use crate::error::Result;
use crate::storage::{category_label, is_null, numeric_value, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Reference distribution of a numeric feature (or the score)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericFeatureStats {
    pub histogram: Vec<u64>,
    pub bin_edges: Vec<f64>,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
}

impl NumericFeatureStats {
    /// `None` when there is nothing to describe
    pub fn from_values(values: &[f64]) -> Result<Option<Self>> {
        let Some(stats) = SummaryStats::from_values(values) else {
            return Ok(None);
        };
        let histogram = compute_histogram(values, DEFAULT_BINS, None, None)?;
        Ok(Some(Self {
            histogram: histogram.counts,
            bin_edges: histogram.edges,
            mean: stats.mean,
            std: stats.std,
            min: stats.min,
            max: stats.max,
            p50: stats.p50,
            p95: stats.p95,
        }))
    }

    pub fn to_histogram(&self) -> Histogram {
        Histogram { counts: self.histogram.clone(), edges: self.bin_edges.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalFeatureStats {
    /// Sorted category labels
    pub categories: Vec<String>,
    /// Count per entry of `categories`
    pub counts: Vec<u64>,
    pub unique_count: usize,
}

impl CategoricalFeatureStats {
    fn from_values<'a, I: IntoIterator<Item = &'a Value>>(values: I) -> Self {
        let mut tally: BTreeMap<String, u64> = BTreeMap::new();
        for value in values {
            *tally.entry(category_label(value)).or_insert(0) += 1;
        }
        let unique_count = tally.len();
        let (categories, counts) = tally.into_iter().unzip();
        Self { categories, counts, unique_count }
    }

    pub fn category_set(&self) -> BTreeSet<String> {
        self.categories.iter().cloned().collect()
    }
}

/// Per-feature reference statistics, variant fixed at baseline creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeatureStats {
    Numeric(NumericFeatureStats),
    Categorical(CategoricalFeatureStats),
}

impl FeatureStats {
    pub fn as_numeric(&self) -> Option<&NumericFeatureStats> {
        match self {
            FeatureStats::Numeric(stats) => Some(stats),
            FeatureStats::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&CategoricalFeatureStats> {
        match self {
            FeatureStats::Categorical(stats) => Some(stats),
            FeatureStats::Numeric(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeatureStats::Numeric(_) => "numeric",
            FeatureStats::Categorical(_) => "categorical",
        }
    }
}

/// Group membership counts for one protected attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub groups: Vec<String>,
    pub group_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityBaseline {
    pub null_rates: BTreeMap<String, f64>,
    pub total_samples: usize,
}

fn default_score_field() -> String {
    "risk_score".to_string()
}

/// Training-time reference for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub sample_size: usize,
    pub feature_stats: BTreeMap<String, FeatureStats>,
    #[serde(default)]
    pub score_stats: Option<NumericFeatureStats>,
    /// Record key the score stats were read from
    #[serde(default = "default_score_field")]
    pub score_field: String,
    #[serde(default)]
    pub fairness_stats: BTreeMap<String, GroupStats>,
    #[serde(default)]
    pub data_quality: DataQualityBaseline,
}

impl BaselineSnapshot {
    /// Summarise a reference batch.
    ///
    /// The first non-null value of a feature decides its variant: numbers and
    /// booleans make it numeric, anything else categorical. Later values of
    /// the wrong kind are ignored. A feature that is null everywhere only gets
    /// a null rate.
    pub fn build(
        model_id: &str,
        records: &[Record],
        feature_names: &[String],
        score_field: &str,
        protected_attributes: &[String],
    ) -> Result<Self> {
        let total = records.len();
        let mut feature_stats = BTreeMap::new();
        let mut null_rates = BTreeMap::new();

        for name in feature_names {
            let present: Vec<&Value> = records
                .iter()
                .filter_map(|r| r.get(name))
                .filter(|v| !v.is_null())
                .collect();
            let null_count = total - present.len();
            let null_rate = if total == 0 { 0.0 } else { null_count as f64 / total as f64 };
            null_rates.insert(name.clone(), null_rate);

            let Some(first) = present.first() else {
                continue;
            };
            let stats = if numeric_value(first).is_some() {
                let values: Vec<f64> = present.iter().filter_map(|v| numeric_value(v)).collect();
                NumericFeatureStats::from_values(&values)?.map(FeatureStats::Numeric)
            } else {
                Some(FeatureStats::Categorical(CategoricalFeatureStats::from_values(
                    present.iter().copied(),
                )))
            };
            if let Some(stats) = stats {
                feature_stats.insert(name.clone(), stats);
            }
        }

        let scores: Vec<f64> = records
            .iter()
            .filter_map(|r| r.get(score_field))
            .filter_map(numeric_value)
            .collect();
        let score_stats = NumericFeatureStats::from_values(&scores)?;

        let fairness_stats = protected_attributes
            .iter()
            .map(|attr| {
                let mut group_counts: BTreeMap<String, u64> = BTreeMap::new();
                for value in records.iter().map(|r| r.get(attr)).filter(|v| !is_null(*v)).flatten() {
                    *group_counts.entry(category_label(value)).or_insert(0) += 1;
                }
                let groups = group_counts.keys().cloned().collect();
                (attr.clone(), GroupStats { groups, group_counts })
            })
            .collect();

        Ok(Self {
            model_id: model_id.to_string(),
            created_at: Utc::now(),
            sample_size: total,
            feature_stats,
            score_stats,
            score_field: score_field.to_string(),
            fairness_stats,
            data_quality: DataQualityBaseline { null_rates, total_samples: total },
        })
    }

    /// Every feature the baseline tracks, including all-null ones
    pub fn feature_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> =
            self.feature_stats.keys().chain(self.data_quality.null_rates.keys()).collect();
        names.into_iter().cloned().collect()
    }

    pub fn protected_attributes(&self) -> Vec<String> {
        self.fairness_stats.keys().cloned().collect()
    }

    /// The baseline side of a data-quality comparison
    pub fn data_quality_stats(&self) -> DataQualityStats {
        DataQualityStats {
            null_rates: self.data_quality.null_rates.clone(),
            categories: self
                .feature_stats
                .iter()
                .filter_map(|(name, stats)| Some((name.clone(), stats.as_categorical()?.category_set())))
                .collect(),
        }
    }
}
