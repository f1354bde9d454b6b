//! Request and response bodies of the HTTP API

use council_application::RunRoundRequest;
use council_domain::SessionId;
use serde::{Deserialize, Serialize};

/// `POST /api/council/run-round`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRoundBody {
    pub query: String,
    pub previous_critique: Option<String>,
    pub session_id: Option<i64>,
    pub round: Option<u32>,
}

impl From<RunRoundBody> for RunRoundRequest {
    fn from(body: RunRoundBody) -> Self {
        RunRoundRequest::new(body.query)
            .with_session(body.session_id.map(SessionId::new))
            .with_round(body.round)
            .with_critique(body.previous_critique)
    }
}

/// `POST /api/council/sessions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSessionBody {
    pub query: String,
    pub session_id: Option<i64>,
}

/// Error body for every non-2xx response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_round_body_is_camel_case() {
        let body: RunRoundBody = serde_json::from_str(
            r#"{"query":"q","previousCritique":"be brief","sessionId":4,"round":2}"#,
        )
        .unwrap();
        let request = RunRoundRequest::from(body);

        assert_eq!(request.query, "q");
        assert_eq!(request.previous_critique.as_deref(), Some("be brief"));
        assert_eq!(request.session_id, Some(SessionId::new(4)));
        assert_eq!(request.round, Some(2));
    }

    #[test]
    fn test_optional_fields_default_to_none() {
        let body: RunRoundBody = serde_json::from_str(r#"{"query":"q"}"#).unwrap();
        assert!(body.session_id.is_none());
        assert!(body.round.is_none());
        assert!(body.previous_critique.is_none());
    }
}
