//! Redirect notification data and the caller's decision.

use serde::{Deserialize, Serialize};

use crate::request::Method;

/// Where the transport wants to go next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectInfo {
    pub new_url: String,
    pub new_method: Method,
    /// Status of the redirect response, e.g. 301 or 302.
    pub status: u16,
}

/// Caller's reply before the transport may follow a redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectDecision {
    /// Header names to strip from the re-issued request.
    #[serde(default)]
    pub removed_headers: Vec<String>,
}

impl RedirectDecision {
    /// Follow the redirect with the request headers unchanged.
    pub fn follow() -> Self {
        Self::default()
    }

    /// Marks a header for removal before the request is re-issued.
    pub fn remove_header(mut self, name: impl Into<String>) -> Self {
        self.removed_headers.push(name.into());
        self
    }
}
