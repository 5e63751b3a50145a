//! Publisher Configuration Module
//!
//! Camera, detector, geometry and publishing settings loaded from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `FACEVEC_CONFIG` environment variable (path to TOML file)
//! 3. `facevec.toml` in the current working directory
//! 4. Built-in defaults
//!
//! ## Usage
//!
//! The loaded config is owned by `main` and handed to
//! [`AppContext::from_config`](crate::pipeline::AppContext::from_config); nothing
//! reads it through a global.
//!
//! ```ignore
//! let mut config = FacevecConfig::load(args.config.as_deref())?;
//! args.apply_overrides(&mut config);
//! config.validate()?;
//! let ctx = AppContext::from_config(&config)?;
//! ```

mod facevec_config;
pub mod defaults;
pub mod validation;

pub use facevec_config::*;
