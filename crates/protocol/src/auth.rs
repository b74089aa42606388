//! Authentication challenge data and the caller's decision.

use serde::{Deserialize, Serialize};

/// Server or proxy authentication challenge forwarded to the caller.
///
/// The challenge itself carries no responder; the caller answers through
/// the session that surfaced it, and at most one answer is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallengeInfo {
    /// URL the challenge was issued for.
    pub url: String,
    /// `false` when credentials for this target were already rejected once.
    pub first_attempt: bool,
    /// `true` for proxy challenges, `false` for origin challenges.
    pub is_proxy: bool,
    /// Authentication scheme, e.g. `basic` or `digest`.
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub realm: String,
}

/// Caller's answer to an authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthDecision {
    /// Retry the request with these credentials.
    Credentials { username: String, password: String },
    /// Abandon authentication; the transport fails the request.
    Cancel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_is_tagged_on_the_wire() {
        let decision = AuthDecision::Credentials {
            username: "user".to_string(),
            password: "hunter2".to_string(),
        };
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["type"], "credentials");
        assert_eq!(value["username"], "user");

        let cancel = serde_json::to_value(AuthDecision::Cancel).unwrap();
        assert_eq!(cancel["type"], "cancel");
    }
}
