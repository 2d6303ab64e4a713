//! Early stopping on a validation metric.
//!
//! The monitor is an explicit state machine: `Improving` after a round that
//! beats the best score by more than the tolerance, `Stale(n)` after `n`
//! rounds in a row without such an improvement, and `Stopped` once `n`
//! reaches the patience. A NaN score never counts as an improvement.

use crate::core::types::Round;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoppingState {
    Improving,
    Stale(usize),
    Stopped,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    tolerance: f64,
    maximize: bool,
    best: Option<(Round, f64)>,
    state: StoppingState,
}

impl EarlyStopping {
    pub fn new(patience: usize, tolerance: f64, maximize: bool) -> Self {
        EarlyStopping {
            patience,
            tolerance,
            maximize,
            best: None,
            state: StoppingState::Improving,
        }
    }

    /// Feed the score of `round` and return the new state.
    pub fn update(&mut self, round: Round, score: f64) -> StoppingState {
        if self.state == StoppingState::Stopped {
            return self.state;
        }
        if self.improves(score) {
            self.best = Some((round, score));
            self.state = StoppingState::Improving;
            return self.state;
        }
        let stale = match self.state {
            StoppingState::Stale(n) => n + 1,
            _ => 1,
        };
        self.state = if stale >= self.patience {
            log::info!(
                "Stopping after round {}: no improvement in {} rounds, best round {:?}",
                round,
                stale,
                self.best_round()
            );
            StoppingState::Stopped
        } else {
            StoppingState::Stale(stale)
        };
        self.state
    }

    fn improves(&self, score: f64) -> bool {
        if score.is_nan() {
            return false;
        }
        match self.best {
            None => true,
            Some((_, best)) if self.maximize => score > best + self.tolerance,
            Some((_, best)) => score < best - self.tolerance,
        }
    }

    pub fn state(&self) -> StoppingState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == StoppingState::Stopped
    }

    pub fn best_round(&self) -> Option<Round> {
        self.best.map(|(round, _)| round)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best.map(|(_, score)| score)
    }
}
