//! Regularized gain and leaf weight formulas.

use crate::config::Config;
use crate::tree::histogram::GradStats;

/// Regularization parameters shared by split search and leaf computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitParams {
    pub lambda: f64,
    pub alpha: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub max_delta_step: f64,
}

impl Default for SplitParams {
    fn default() -> Self {
        SplitParams::from_config(&Config::default())
    }
}

/// Soft-threshold a gradient sum by the L1 penalty.
#[inline]
fn threshold_l1(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

impl SplitParams {
    pub fn from_config(config: &Config) -> Self {
        SplitParams {
            lambda: config.lambda,
            alpha: config.alpha,
            gamma: config.gamma,
            min_child_weight: config.min_child_weight,
            max_delta_step: config.max_delta_step,
        }
    }

    /// Optimal leaf weight `-G/(H+λ)` with L1 and delta-step clipping.
    ///
    /// A node without hessian mass gets weight 0.
    #[inline]
    pub fn leaf_weight(&self, stats: &GradStats) -> f64 {
        if stats.hess <= 0.0 || stats.hess + self.lambda <= 0.0 {
            return 0.0;
        }
        let w = -threshold_l1(stats.grad, self.alpha) / (stats.hess + self.lambda);
        if self.max_delta_step > 0.0 {
            w.clamp(-self.max_delta_step, self.max_delta_step)
        } else {
            w
        }
    }

    /// Structure score of a node, `G²/(H+λ)` in the unclipped case.
    #[inline]
    pub fn node_score(&self, stats: &GradStats) -> f64 {
        if stats.hess + self.lambda <= 0.0 {
            return 0.0;
        }
        let g = threshold_l1(stats.grad, self.alpha);
        if self.max_delta_step == 0.0 {
            g * g / (stats.hess + self.lambda)
        } else {
            let w = self.leaf_weight(stats);
            -(2.0 * g * w + (stats.hess + self.lambda) * w * w)
        }
    }

    /// Loss reduction of splitting `parent` into `left` and `right`, net of γ.
    #[inline]
    pub fn split_gain(&self, left: &GradStats, right: &GradStats, parent: &GradStats) -> f64 {
        0.5 * (self.node_score(left) + self.node_score(right) - self.node_score(parent))
            - self.gamma
    }

    /// Whether a child carries enough hessian mass.
    #[inline]
    pub fn child_ok(&self, child: &GradStats) -> bool {
        child.count > 0.0 && child.hess >= self.min_child_weight
    }
}
