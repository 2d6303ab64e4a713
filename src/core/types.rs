//! Core data types for distgbt.
//!
//! Feature values, labels and weights are single precision like the input
//! shards they come from; everything that is accumulated (gradients,
//! histograms, margins) is double precision.

use crate::core::error::{GbtError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw feature value type.
pub type FeatureValue = f32;

/// Target value and sample weight type.
pub type Label = f32;

/// Histogram and gradient accumulation type.
pub type Hist = f64;

/// Feature index type for identifying features in the dataset.
pub type FeatureIndex = usize;

/// Bin index type for discretized feature values.
pub type BinIndex = u32;

/// Tree node identifier (index into the node arena).
pub type NodeId = usize;

/// Boosting round number.
pub type Round = usize;

/// First and second order derivative of the loss for one row and output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GradientPair {
    pub grad: Hist,
    pub hess: Hist,
}

impl GradientPair {
    pub fn new(grad: Hist, hess: Hist) -> Self {
        GradientPair { grad, hess }
    }
}

/// Compute device the histogram and split math runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// CPU-based computation
    #[default]
    Cpu,
    /// CUDA device; recognised but not compiled in
    Cuda,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => write!(f, "cpu"),
            DeviceType::Cuda => write!(f, "cuda"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = GbtError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "cpu" => Ok(DeviceType::Cpu),
            // "cuda:0", "gpu" and friends all name an accelerator
            "cuda" | "gpu" => Ok(DeviceType::Cuda),
            other if other.starts_with("cuda:") => Ok(DeviceType::Cuda),
            _ => Err(GbtError::invalid_parameter(
                "device",
                s,
                "expected 'cpu' or 'cuda'",
            )),
        }
    }
}

/// Node expansion order used by the tree grower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowPolicy {
    /// Expand level by level (FIFO)
    #[default]
    DepthWise,
    /// Expand the pending node with the highest gain first
    LossGuide,
}

impl fmt::Display for GrowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowPolicy::DepthWise => write!(f, "depthwise"),
            GrowPolicy::LossGuide => write!(f, "lossguide"),
        }
    }
}

impl FromStr for GrowPolicy {
    type Err = GbtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "depthwise" => Ok(GrowPolicy::DepthWise),
            "lossguide" => Ok(GrowPolicy::LossGuide),
            _ => Err(GbtError::invalid_parameter(
                "grow_policy",
                s,
                "expected 'depthwise' or 'lossguide'",
            )),
        }
    }
}

/// Objective family selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjectiveKind {
    #[default]
    #[serde(rename = "reg:squarederror")]
    SquaredError,
    #[serde(rename = "binary:logistic")]
    Logistic,
    #[serde(rename = "multi:softprob", alias = "multi:softmax")]
    Softmax,
    #[serde(rename = "rank:pairwise")]
    RankPairwise,
    #[serde(rename = "rank:ndcg")]
    RankNdcg,
}

impl ObjectiveKind {
    /// Whether the objective needs query groups.
    pub fn is_ranking(&self) -> bool {
        matches!(self, ObjectiveKind::RankPairwise | ObjectiveKind::RankNdcg)
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectiveKind::SquaredError => "reg:squarederror",
            ObjectiveKind::Logistic => "binary:logistic",
            ObjectiveKind::Softmax => "multi:softprob",
            ObjectiveKind::RankPairwise => "rank:pairwise",
            ObjectiveKind::RankNdcg => "rank:ndcg",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ObjectiveKind {
    type Err = GbtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "reg:squarederror" | "regression" => Ok(ObjectiveKind::SquaredError),
            "binary:logistic" | "binary" => Ok(ObjectiveKind::Logistic),
            "multi:softprob" | "multi:softmax" | "multiclass" => Ok(ObjectiveKind::Softmax),
            "rank:pairwise" => Ok(ObjectiveKind::RankPairwise),
            "rank:ndcg" | "lambdarank" => Ok(ObjectiveKind::RankNdcg),
            _ => Err(GbtError::invalid_parameter(
                "objective",
                s,
                "unknown objective",
            )),
        }
    }
}

/// Feature importance flavours reported by a trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportanceType {
    /// Number of splits using the feature
    #[default]
    Weight,
    /// Average gain of the splits using the feature
    Gain,
    /// Average cover of the splits using the feature
    Cover,
    /// Summed gain
    TotalGain,
    /// Summed cover
    TotalCover,
}

impl FromStr for ImportanceType {
    type Err = GbtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "weight" => Ok(ImportanceType::Weight),
            "gain" => Ok(ImportanceType::Gain),
            "cover" => Ok(ImportanceType::Cover),
            "total_gain" => Ok(ImportanceType::TotalGain),
            "total_cover" => Ok(ImportanceType::TotalCover),
            _ => Err(GbtError::invalid_parameter(
                "importance_type",
                s,
                "expected one of weight, gain, cover, total_gain, total_cover",
            )),
        }
    }
}
