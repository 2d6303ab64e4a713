//! Configuration management for distgbt.
//!
//! [`Config`] holds every training hyperparameter together with the
//! distributed settings (worker count, collective timeout, shard skew
//! tolerance). Values can come from code via [`ConfigBuilder`], from JSON or
//! TOML files, from `DISTGBT_*` environment variables, or from string pairs via
//! [`Config::set_param`].

pub mod core;
pub mod params;

pub use self::core::{Config, ConfigBuilder};
pub use params::canonical_name;
