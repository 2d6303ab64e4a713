//! Core infrastructure module for distgbt.
//!
//! This module provides the foundational components shared by every other
//! part of the crate:
//!
//! - [`types`]: Fundamental data types and enumerations
//! - [`constants`]: Configuration defaults and format constants
//! - [`error`]: Error handling and error types
//!
//! ```rust
//! use distgbt::core::{
//!     constants::DEFAULT_LEARNING_RATE,
//!     error::{GbtError, Result},
//!     types::{GrowPolicy, ObjectiveKind},
//! };
//!
//! let policy: GrowPolicy = "lossguide".parse()?;
//! assert_eq!(policy, GrowPolicy::LossGuide);
//! assert_eq!(ObjectiveKind::default(), ObjectiveKind::SquaredError);
//! assert!(DEFAULT_LEARNING_RATE > 0.0);
//! # Ok::<(), GbtError>(())
//! ```

pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::{GbtError, Result};
pub use types::*;
