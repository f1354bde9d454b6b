//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`CouncilParams`]: round loop control (termination policy, timeouts, streaming)
//! - [`CouncilConfig`]: roster, judge, models and params in one container

pub mod council_config;
pub mod council_params;

pub use council_config::CouncilConfig;
pub use council_params::CouncilParams;
