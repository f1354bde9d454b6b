//! Query value object

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A query to be debated by the council (Value Object)
///
/// Always non-empty after trimming. Construction is fallible so that an empty
/// query is rejected before any session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Query {
    content: String,
}

impl Query {
    /// Create a new query, rejecting empty or whitespace-only text
    pub fn new(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::InvalidInput("query cannot be empty".to_string()));
        }
        Ok(Self { content })
    }

    /// Try to create a new query, returning None if invalid
    pub fn try_new(content: impl Into<String>) -> Option<Self> {
        Self::new(content).ok()
    }

    /// Get the query content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume and return the inner content
    pub fn into_content(self) -> String {
        self.content
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl TryFrom<String> for Query {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Query::new(s)
    }
}

impl TryFrom<&str> for Query {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Query::new(s)
    }
}

impl From<Query> for String {
    fn from(q: Query) -> Self {
        q.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_creation() {
        let q = Query::new("How should I price my product?").unwrap();
        assert_eq!(q.content(), "How should I price my product?");
    }

    #[test]
    fn test_empty_query_is_invalid_input() {
        let err = Query::new("").unwrap_err();
        assert!(err.is_invalid_input());
        assert!(Query::try_new("   \n\t").is_none());
    }

    #[test]
    fn test_deserialize_rejects_empty() {
        assert!(serde_json::from_str::<Query>("\"  \"").is_err());
        let q: Query = serde_json::from_str("\"What is Rust?\"").unwrap();
        assert_eq!(q.to_string(), "What is Rust?");
    }
}
