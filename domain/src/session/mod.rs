//! Session domain.
//!
//! - [`entities::Session`]: one ongoing or concluded debate
//! - [`entities::Message`]: a single message sent to a completion gateway
//! - [`stream::StreamEvent`]: incremental output from a streaming completion

pub mod entities;
pub mod stream;
