//! Prompt domain
//!
//! Templates for the worker and judge prompts of each round.

mod template;

pub use template::PromptTemplate;
