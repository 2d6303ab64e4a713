//! Per-round learning rates.

use crate::core::error::{GbtError, Result};
use std::fmt;
use std::sync::Arc;

/// Learning rate as a function of the global round index.
#[derive(Clone)]
pub enum LearningRateSchedule {
    Constant(f64),
    /// One rate per round; rounds past the end reuse the last entry
    PerRound(Vec<f64>),
    Custom(Arc<dyn Fn(usize) -> f64 + Send + Sync>),
}

impl LearningRateSchedule {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(usize) -> f64 + Send + Sync + 'static,
    {
        LearningRateSchedule::Custom(Arc::new(f))
    }

    /// `initial * decay^round`
    pub fn exponential(initial: f64, decay: f64) -> Self {
        LearningRateSchedule::custom(move |round| initial * decay.powi(round as i32))
    }

    /// Rate for `round`; must be finite and positive.
    pub fn rate(&self, round: usize) -> Result<f64> {
        let rate = match self {
            LearningRateSchedule::Constant(rate) => *rate,
            LearningRateSchedule::PerRound(rates) => rates
                .get(round)
                .or_else(|| rates.last())
                .copied()
                .ok_or_else(|| {
                    GbtError::invalid_parameter("learning_rate", "[]", "schedule is empty")
                })?,
            LearningRateSchedule::Custom(f) => f(round),
        };
        if !(rate.is_finite() && rate > 0.0) {
            return Err(GbtError::invalid_parameter(
                "learning_rate",
                rate,
                format!("schedule returned an invalid rate for round {}", round),
            ));
        }
        Ok(rate)
    }
}

impl fmt::Debug for LearningRateSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningRateSchedule::Constant(rate) => {
                f.debug_tuple("Constant").field(rate).finish()
            }
            LearningRateSchedule::PerRound(rates) => {
                f.debug_tuple("PerRound").field(rates).finish()
            }
            LearningRateSchedule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
