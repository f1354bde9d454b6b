//! Progress rendering while a round runs

pub mod reporter;
