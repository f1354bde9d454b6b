//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`]: language models a persona can be routed to
//! - [`model_config::ModelConfig`]: model selection per council role
//! - [`query::Query`]: a validated query to pose to the council
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod model;
pub mod model_config;
pub mod query;
