//! Gradient boosting: the training loop, the model it produces, learning
//! rate schedules and early stopping.

pub mod early_stopping;
pub mod ensemble;
pub mod gbdt;
pub mod schedule;

pub use early_stopping::{EarlyStopping, StoppingState};
pub use ensemble::Model;
pub use gbdt::{
    train, train_with_communicator, validation_name, EvalHistory, EvalScore, GradientBooster,
    RoundObserver, RoundSummary, TrainOptions, TrainResult,
};
pub use schedule::LearningRateSchedule;
