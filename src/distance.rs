//! # Distance Functions
//!
//! [`DistanceFunction`] is the backend-agnostic metric vocabulary. Each
//! adapter owns a [`MetricTable`] that maps it onto the backend's native
//! token. Most backends fix the metric when the collection is created, so the
//! lookup happens once while connecting and an unsupported metric never gets
//! as far as a read or write.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{VectorStoreError, VectorStoreResult};

/// Metric used to rank neighbours.
///
/// Several names used across backends are accepted as aliases when parsing:
/// `l2`/`euclid` for [`Euclidean`](DistanceFunction::Euclidean),
/// `max_inner_product`/`ip` for [`Dot`](DistanceFunction::Dot) and `l1` for
/// [`Manhattan`](DistanceFunction::Manhattan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFunction {
    Cosine,
    #[serde(alias = "l2", alias = "euclid")]
    Euclidean,
    #[serde(alias = "max_inner_product", alias = "ip", alias = "dotproduct")]
    Dot,
    #[serde(alias = "l1")]
    Manhattan,
    Hamming,
    Jaccard,
}

impl DistanceFunction {
    pub const ALL: [DistanceFunction; 6] = [
        DistanceFunction::Cosine,
        DistanceFunction::Euclidean,
        DistanceFunction::Dot,
        DistanceFunction::Manhattan,
        DistanceFunction::Hamming,
        DistanceFunction::Jaccard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceFunction::Cosine => "cosine",
            DistanceFunction::Euclidean => "euclidean",
            DistanceFunction::Dot => "dot",
            DistanceFunction::Manhattan => "manhattan",
            DistanceFunction::Hamming => "hamming",
            DistanceFunction::Jaccard => "jaccard",
        }
    }
}

impl fmt::Display for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceFunction {
    type Err = VectorStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(DistanceFunction::Cosine),
            "euclidean" | "euclid" | "l2" => Ok(DistanceFunction::Euclidean),
            "dot" | "max_inner_product" | "ip" | "dotproduct" => Ok(DistanceFunction::Dot),
            "manhattan" | "l1" => Ok(DistanceFunction::Manhattan),
            "hamming" => Ok(DistanceFunction::Hamming),
            "jaccard" => Ok(DistanceFunction::Jaccard),
            _ => Err(VectorStoreError::configuration("distance_function")),
        }
    }
}

/// Finite mapping from [`DistanceFunction`] to a backend's native metric.
#[derive(Debug, Clone, Copy)]
pub struct MetricTable {
    backend: &'static str,
    entries: &'static [(DistanceFunction, &'static str)],
}

impl MetricTable {
    pub const fn new(backend: &'static str, entries: &'static [(DistanceFunction, &'static str)]) -> Self {
        Self { backend, entries }
    }

    /// Native token for `metric`, or `UnsupportedMetric` listing what this
    /// backend does support.
    pub fn resolve(&self, metric: DistanceFunction) -> VectorStoreResult<&'static str> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == metric)
            .map(|(_, native)| *native)
            .ok_or_else(|| VectorStoreError::UnsupportedMetric {
                backend: self.backend,
                metric,
                supported: self.supported(),
            })
    }

    pub fn supported(&self) -> Vec<DistanceFunction> {
        self.entries.iter().map(|(metric, _)| *metric).collect()
    }

    pub fn supports(&self, metric: DistanceFunction) -> bool {
        self.entries.iter().any(|(candidate, _)| *candidate == metric)
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}
